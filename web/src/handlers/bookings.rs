//! Booking API endpoints.
//!
//! - `GET  /bookings` - List bookings, filtered by `status`, `providerId`, `customerName`
//! - `GET  /bookings/:id` - Get one booking
//! - `POST /bookings` - Submit a booking
//! - `POST /bookings/:id/assign` - Match to an available provider
//! - `POST /bookings/:id/provider/:action` - Provider `accept` or `reject`
//! - `POST /bookings/:id/complete` - Finish the job
//! - `POST /bookings/:id/cancel` - Cancel
//! - `POST /bookings/:id/no-show` - Mark no-show
//! - `POST /bookings/:id/retry` - Revive and match again
//! - `POST /bookings/:id/admin/override` - Force a status

#![allow(clippy::unused_async)] // Axum handlers are async by contract

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use fieldserve_core::store::BookingFilter;
use fieldserve_core::types::{Actor, Booking, BookingId, BookingStatus, NewBooking, ProviderId};
use serde::Deserialize;

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for listing bookings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBookingsQuery {
    /// Only bookings in this status
    pub status: Option<String>,
    /// Only bookings held by this provider
    pub provider_id: Option<String>,
    /// Case-insensitive substring of the customer name
    pub customer_name: Option<String>,
}

impl ListBookingsQuery {
    fn into_filter(self) -> WebResult<BookingFilter> {
        let mut filter = BookingFilter::all();
        if let Some(status) = non_empty(self.status) {
            filter = filter.with_status(status.parse::<BookingStatus>()?);
        }
        if let Some(provider_id) = non_empty(self.provider_id) {
            filter = filter.with_provider(ProviderId::new(provider_id));
        }
        if let Some(name) = non_empty(self.customer_name) {
            filter = filter.with_customer_name(name);
        }
        Ok(filter)
    }
}

/// Body for provider accept/reject.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderActionRequest {
    /// Provider performing the action
    pub provider_id: Option<String>,
}

/// Body for cancellation. Every field is optional, and so is the body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    /// `CUSTOMER` (default) or `PROVIDER`
    pub cancelled_by: Option<String>,
    /// Free-text reason
    pub reason: Option<String>,
}

/// Body for an admin override.
#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    /// Target status name, e.g. `CANCELLED`
    pub status: Option<String>,
    /// Free-text reason
    pub reason: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// List bookings.
///
/// # Errors
///
/// 400 if `status` is not a known status name.
pub async fn list_bookings(
    State(state): State<AppState>,
    query: Result<Query<ListBookingsQuery>, QueryRejection>,
) -> WebResult<Json<Vec<Booking>>> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    Ok(Json(state.machine.bookings(&filter)))
}

/// Get one booking.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<Booking>> {
    Ok(Json(state.machine.booking(&BookingId::new(id))?))
}

/// Submit a booking.
///
/// # Errors
///
/// 400 if `service` or `address` is missing.
pub async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<NewBooking>, JsonRejection>,
) -> WebResult<(StatusCode, Json<Booking>)> {
    let Json(request) = payload?;
    let booking = state.machine.create(request)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Match a pending booking to a provider.
///
/// # Errors
///
/// 503 with the updated booking and `retryable` when nobody matched; 400 if
/// the booking is not pending; 404 for an unknown id.
pub async fn assign_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<Booking>> {
    Ok(Json(state.machine.assign(&BookingId::new(id))?))
}

/// Provider `accept` or `reject`.
///
/// # Errors
///
/// 400 for any other action or a missing `providerId`; 403 if the provider is
/// not the one assigned; 400 if the booking is not assigned.
pub async fn provider_action(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
    payload: Result<Json<ProviderActionRequest>, JsonRejection>,
) -> WebResult<Json<Booking>> {
    let Json(request) = payload?;
    let id = BookingId::new(id);
    let provider_id = non_empty(request.provider_id)
        .map(ProviderId::new)
        .ok_or_else(|| AppError::bad_request("providerId is required"))?;

    let booking = match action.as_str() {
        "accept" => state.machine.accept(&id, &provider_id)?,
        "reject" => state.machine.reject(&id, &provider_id)?,
        _ => return Err(AppError::bad_request("Invalid action. Use 'accept' or 'reject'")),
    };
    Ok(Json(booking))
}

/// Finish an in-progress booking.
///
/// # Errors
///
/// 400 unless the booking is in progress; 404 for an unknown id.
pub async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<Booking>> {
    Ok(Json(state.machine.complete(&BookingId::new(id))?))
}

/// Cancel a booking.
///
/// # Errors
///
/// 400 if the booking is completed or cancelled already, or if
/// `cancelledBy` is not `CUSTOMER` or `PROVIDER`.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<CancelRequest>>,
) -> WebResult<Json<Booking>> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let actor = match non_empty(request.cancelled_by) {
        Some(raw) => raw.parse::<Actor>()?,
        None => Actor::Customer,
    };
    let reason = non_empty(request.reason);

    Ok(Json(state.machine.cancel(&BookingId::new(id), actor, reason)?))
}

/// Mark a booking as a no-show.
///
/// # Errors
///
/// 400 unless the booking is assigned or in progress.
pub async fn no_show_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<Booking>> {
    Ok(Json(state.machine.no_show(&BookingId::new(id))?))
}

/// Revive a failed or pending booking and try to match it.
///
/// # Errors
///
/// 400 unless the booking is failed or pending.
pub async fn retry_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<Booking>> {
    Ok(Json(state.machine.retry(&BookingId::new(id))?))
}

/// Force a booking into any status.
///
/// # Errors
///
/// 400 for a missing or unknown status, or for `ASSIGNED`/`IN_PROGRESS` on a
/// booking without a provider.
pub async fn override_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> WebResult<Json<Booking>> {
    let Json(request) = payload?;
    let target = request.status.unwrap_or_default().parse::<BookingStatus>()?;
    let reason = non_empty(request.reason);

    Ok(Json(
        state
            .machine
            .override_status(&BookingId::new(id), target, reason)?,
    ))
}
