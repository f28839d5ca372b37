//! Metric names recorded through the `metrics` facade.
//!
//! The crate never installs a recorder; the embedding process decides where these go.

use metrics::{describe_counter, describe_histogram, Unit};

pub const POLICY_EXECUTIONS_TOTAL: &str = "gateway_policy_executions_total";
pub const POLICY_FAILURES_TOTAL: &str = "gateway_policy_failures_total";
pub const CHAIN_INTERRUPTIONS_TOTAL: &str = "gateway_chain_interruptions_total";
pub const CHAIN_DURATION_SECONDS: &str = "gateway_chain_duration_seconds";

pub const MESSAGES_OBSERVED_TOTAL: &str = "gateway_messages_observed_total";
pub const MESSAGES_RECORDED_TOTAL: &str = "gateway_messages_recorded_total";
pub const MESSAGES_LOGGED_TOTAL: &str = "gateway_messages_logged_total";
pub const REPORTER_FAILURES_TOTAL: &str = "gateway_reporter_failures_total";

pub const CONNECTOR_CLIENTS_BUILT_TOTAL: &str = "gateway_connector_clients_built_total";
pub const CONNECTOR_CLIENTS_CLOSED_TOTAL: &str = "gateway_connector_clients_closed_total";

pub const EXCHANGES_TOTAL: &str = "gateway_exchanges_total";

/// Register units and descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!(POLICY_EXECUTIONS_TOTAL, Unit::Count, "Policy hooks invoked, by phase");
    describe_counter!(POLICY_FAILURES_TOTAL, Unit::Count, "Policy hooks that raised a fault, by phase");
    describe_counter!(CHAIN_INTERRUPTIONS_TOTAL, Unit::Count, "Policy chains stopped by an interruption");
    describe_histogram!(CHAIN_DURATION_SECONDS, Unit::Seconds, "Policy chain execution time");
    describe_counter!(MESSAGES_OBSERVED_TOTAL, Unit::Count, "Messages seen by analytics interceptors");
    describe_counter!(MESSAGES_RECORDED_TOTAL, Unit::Count, "Messages selected for metrics reporting");
    describe_counter!(MESSAGES_LOGGED_TOTAL, Unit::Count, "Messages reported with a message log");
    describe_counter!(REPORTER_FAILURES_TOTAL, Unit::Count, "Analytics records a reporter refused");
    describe_counter!(CONNECTOR_CLIENTS_BUILT_TOTAL, Unit::Count, "Downstream clients constructed");
    describe_counter!(CONNECTOR_CLIENTS_CLOSED_TOTAL, Unit::Count, "Downstream clients released");
    describe_counter!(EXCHANGES_TOTAL, Unit::Count, "Exchanges driven to completion, by outcome");
}
