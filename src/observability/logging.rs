//! # Structured Logging
//!
//! Installs the global `tracing` subscriber: a registry with an `EnvFilter` and one
//! formatting layer, JSON or text, writing to stdout or a file.
//!
//! `RUST_LOG` directives are honoured on top of the configured level.
//!
//! ## Rust Concepts Used
//!
//! - **Trait objects**: both formats are boxed into one `Layer` type so a single
//!   registry expression covers every combination
//! - **`try_init`**: a second initialisation in the same process (tests, embedders) is
//!   reported and ignored instead of panicking

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::core::error::GatewayResult;
use crate::observability::config::{LogConfig, LogFormat, LogOutput};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber described by `config`
pub fn init_logging(config: &LogConfig) -> GatewayResult<()> {
    let level = config.level()?;
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let layer = match &config.output {
        LogOutput::Stdout => format_layer(config.format, std::io::stdout),
        LogOutput::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            format_layer(config.format, Mutex::new(file))
        }
    };

    if let Err(error) = Registry::default().with(layer).with(env_filter).try_init() {
        warn!(error = %error, "Tracing subscriber already initialized, skipping initialization");
    }
    Ok(())
}

fn format_layer<W>(format: LogFormat, writer: W) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => fmt::layer().with_target(true).with_writer(writer).boxed(),
    }
}
