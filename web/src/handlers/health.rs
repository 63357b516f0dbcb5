//! Health check and metrics endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

#![allow(clippy::unused_async)] // Axum handlers are async by contract

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the ledger is inconsistent
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Number of bookings held
    pub bookings: usize,
    /// Number of providers free right now
    pub available_providers: usize,
    /// Broken booking/provider invariants, if any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

/// Liveness plus a ledger consistency check.
///
/// # Status Codes
///
/// - 200 OK: every invariant holds
/// - 503 Service Unavailable: bookings and provider availability disagree
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0",
///   "bookings": 12,
///   "availableProviders": 2
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.machine.snapshot();
    let violations = snapshot.violations();

    let status = if violations.is_empty() {
        StatusCode::OK
    } else {
        tracing::error!(count = violations.len(), "Ledger invariants violated");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if violations.is_empty() { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            bookings: snapshot.bookings.len(),
            available_providers: snapshot.providers.iter().filter(|p| p.available).count(),
            violations,
        }),
    )
}

/// Prometheus exposition of the booking counters.
///
/// # Errors
///
/// 404 when metrics are disabled.
pub async fn metrics(State(state): State<AppState>) -> WebResult<String> {
    state
        .metrics
        .as_ref()
        .map(metrics_exporter_prometheus::PrometheusHandle::render)
        .ok_or_else(|| AppError::not_found("Metrics are disabled"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldserve_core::machine::BookingStateMachine;
    use fieldserve_core::registry::{InMemoryProviderRegistry, default_roster};

    fn state() -> AppState {
        AppState::new(
            BookingStateMachine::builder()
                .providers(InMemoryProviderRegistry::with_providers(default_roster()))
                .build(),
        )
    }

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, Json(body)) = health_check(State(state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.available_providers, 3);
        assert!(body.violations.is_empty());
    }

    #[tokio::test]
    async fn test_metrics_disabled_is_not_found() {
        let err = metrics(State(state())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
