//! Provider endpoints.

#![allow(clippy::unused_async)] // Axum handlers are async by contract

use crate::state::AppState;
use axum::{Json, extract::State};
use fieldserve_core::types::Provider;

/// Every provider with its current availability.
///
/// ```text
/// GET /providers
/// ```
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<Provider>> {
    Json(state.machine.providers())
}
