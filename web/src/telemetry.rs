//! Tracing and Prometheus setup for the booking server.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `booking.transitions.total{operation, to}` - Committed status changes
//! - `booking.rejections.total{operation, reason}` - Operations refused by the state machine
//! - `booking.assignment.unmatched.total` - Assignment attempts with no capable provider

use metrics::describe_counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. Calling this twice is a
/// no-op rather than a panic.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}

/// Describe the booking counters so the exporter emits `HELP` lines.
///
/// Call once after the recorder is installed.
pub fn register_booking_metrics() {
    describe_counter!(
        "booking.transitions.total",
        "Committed booking status changes by operation and target status"
    );
    describe_counter!(
        "booking.rejections.total",
        "Booking operations refused by the state machine, by operation and error code"
    );
    describe_counter!(
        "booking.assignment.unmatched.total",
        "Assignment attempts that found no available capable provider"
    );
}

/// Install the Prometheus recorder and describe the booking counters.
///
/// # Errors
///
/// Fails if a global recorder is already installed.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_booking_metrics();
    Ok(handle)
}
