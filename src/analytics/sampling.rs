//! # Message Sampling
//!
//! Streaming APIs can carry an unbounded number of messages, so only a sample of them is
//! reported. Three strategies exist:
//!
//! - **Count**: the first message, then every Nth (default 100, minimum 10)
//! - **Probability**: each message with a fixed probability (default 0.01, at most 0.5)
//! - **Temporal**: the first message, then at most one per period (default and minimum 1s)
//!
//! Out-of-range values are clamped and unparsable ones fall back to the default.

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::analytics::definition::{Sampling, SamplingType};
use crate::context::message::Message;

pub const DEFAULT_COUNT: u64 = 100;
pub const MIN_COUNT: u64 = 10;
pub const DEFAULT_PROBABILITY: f64 = 0.01;
pub const MAX_PROBABILITY: f64 = 0.5;
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Decides whether a message gets reported
pub trait MessageSamplingStrategy: Send + Sync + fmt::Debug {
    /// `ordinal` is the message's 1-based position in the exchange, `elapsed_millis` the time
    /// since the last recorded message (`None` when nothing was recorded yet)
    fn is_recordable(&self, message: &Message, ordinal: i64, elapsed_millis: Option<u64>) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountMessageSamplingStrategy {
    count: u64,
}

impl CountMessageSamplingStrategy {
    pub fn new(count: u64) -> Self {
        Self {
            count: count.max(MIN_COUNT),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for CountMessageSamplingStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_COUNT)
    }
}

impl MessageSamplingStrategy for CountMessageSamplingStrategy {
    fn is_recordable(&self, _message: &Message, ordinal: i64, _elapsed_millis: Option<u64>) -> bool {
        ordinal == 1 || (ordinal > 0 && ordinal as u64 % self.count == 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityMessageSamplingStrategy {
    probability: f64,
}

impl ProbabilityMessageSamplingStrategy {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, MAX_PROBABILITY),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Default for ProbabilityMessageSamplingStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_PROBABILITY)
    }
}

impl MessageSamplingStrategy for ProbabilityMessageSamplingStrategy {
    fn is_recordable(&self, _message: &Message, _ordinal: i64, _elapsed_millis: Option<u64>) -> bool {
        rand::thread_rng().gen::<f64>() < self.probability
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalMessageSamplingStrategy {
    period: Duration,
}

impl TemporalMessageSamplingStrategy {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for TemporalMessageSamplingStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD)
    }
}

impl MessageSamplingStrategy for TemporalMessageSamplingStrategy {
    fn is_recordable(&self, _message: &Message, _ordinal: i64, elapsed_millis: Option<u64>) -> bool {
        match elapsed_millis {
            None => true,
            Some(elapsed) => elapsed >= self.period.as_millis() as u64,
        }
    }
}

/// Build the strategy described by `sampling`, defaulting to count sampling
pub fn strategy_for(sampling: Option<&Sampling>) -> Arc<dyn MessageSamplingStrategy> {
    let Some(sampling) = sampling else {
        return Arc::new(CountMessageSamplingStrategy::default());
    };
    let value = sampling.value.as_deref().map(str::trim);

    match sampling.sampling_type {
        SamplingType::Count => {
            let count = parse_or_default(value, DEFAULT_COUNT, |raw| raw.parse::<u64>().ok());
            Arc::new(CountMessageSamplingStrategy::new(count))
        }
        SamplingType::Probability => {
            let probability = parse_or_default(value, DEFAULT_PROBABILITY, |raw| {
                raw.parse::<f64>().ok().filter(|p| p.is_finite())
            });
            Arc::new(ProbabilityMessageSamplingStrategy::new(probability))
        }
        SamplingType::Temporal => {
            let period = parse_or_default(value, DEFAULT_PERIOD, |raw| humantime::parse_duration(raw).ok());
            Arc::new(TemporalMessageSamplingStrategy::new(period))
        }
    }
}

fn parse_or_default<T, F>(value: Option<&str>, default: T, parse: F) -> T
where
    T: fmt::Debug,
    F: FnOnce(&str) -> Option<T>,
{
    match value {
        None | Some("") => default,
        Some(raw) => parse(raw).unwrap_or_else(|| {
            warn!(value = %raw, default = ?default, "Invalid message sampling value, using default");
            default
        }),
    }
}
