//! HTTP route table.
//!
//! The booking API lives under a configurable prefix (`/api` by default);
//! `/health` and `/metrics` are always served at the root.

use crate::handlers::{self, bookings, events, providers};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Booking API routes, without a prefix.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/assign", post(bookings::assign_booking))
        .route(
            "/bookings/:id/provider/:action",
            post(bookings::provider_action),
        )
        .route("/bookings/:id/complete", post(bookings::complete_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:id/no-show", post(bookings::no_show_booking))
        .route("/bookings/:id/retry", post(bookings::retry_booking))
        .route(
            "/bookings/:id/admin/override",
            post(bookings::override_booking),
        )
        .route("/bookings/:id/events", get(events::booking_timeline))
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::booking_timeline))
        .route("/providers", get(providers::list_providers))
}

/// Build the full application router.
///
/// `prefix` must be empty or start with `/` and not end with one, e.g. `/api`.
pub fn build_router(state: AppState, prefix: &str) -> Router {
    let api = if prefix.is_empty() {
        api_routes()
    } else {
        Router::new().nest(prefix, api_routes())
    };

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
