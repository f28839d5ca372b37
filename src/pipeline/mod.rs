//! Exchange orchestration across policy chains and the endpoint.

pub mod executor;

pub use executor::{render_failure, EndpointInvoker, ExchangeExecutor};
