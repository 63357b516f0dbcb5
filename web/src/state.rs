//! Application state for Axum handlers.

use fieldserve_core::machine::BookingStateMachine;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloning is cheap; the state machine is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The booking state machine every handler dispatches to
    pub machine: Arc<BookingStateMachine>,
    /// Prometheus render handle; `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("machine", &self.machine)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    /// Create a new application state without a metrics endpoint.
    #[must_use]
    pub fn new(machine: BookingStateMachine) -> Self {
        Self {
            machine: Arc::new(machine),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
