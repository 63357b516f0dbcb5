//! Audit log endpoints.
//!
//! - `GET /bookings/:id/events` - One booking's timeline, oldest first
//! - `GET /events/:id` - Same as above, keyed by booking id
//! - `GET /events` - All events, newest first, filtered by `bookingId`, `actor`, `status`, `limit`

#![allow(clippy::unused_async)] // Axum handlers are async by contract

use crate::WebResult;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use fieldserve_core::event_log::EventQuery;
use fieldserve_core::types::{Actor, BookingEvent, BookingId, BookingStatus};
use serde::Deserialize;

/// Query parameters for listing events.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    /// Only events for this booking
    pub booking_id: Option<String>,
    /// Only events caused by this actor
    pub actor: Option<String>,
    /// Only events into this status
    pub status: Option<String>,
    /// Maximum number of events (default 100)
    pub limit: Option<usize>,
}

impl ListEventsQuery {
    fn into_query(self) -> WebResult<EventQuery> {
        let mut query = EventQuery::default();
        if let Some(booking_id) = self.booking_id.filter(|id| !id.is_empty()) {
            query = query.for_booking(BookingId::new(booking_id));
        }
        if let Some(actor) = self.actor.filter(|actor| !actor.is_empty()) {
            query = query.by_actor(actor.parse::<Actor>()?);
        }
        if let Some(status) = self.status.filter(|status| !status.is_empty()) {
            query = query.into_status(status.parse::<BookingStatus>()?);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        Ok(query)
    }
}

/// A booking's history, oldest first. Unknown ids give an empty list.
pub async fn booking_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<BookingEvent>> {
    Json(state.machine.timeline(&BookingId::new(id)))
}

/// Filtered events, newest first.
///
/// # Errors
///
/// 400 for an unknown `actor` or `status`, or a non-numeric `limit`.
pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<ListEventsQuery>, QueryRejection>,
) -> WebResult<Json<Vec<BookingEvent>>> {
    let Query(query) = query?;
    let query = query.into_query()?;
    Ok(Json(state.machine.events(&query)))
}
