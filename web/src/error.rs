//! Error types for web handlers.
//!
//! This module bridges [`BookingError`] and HTTP responses, implementing
//! Axum's `IntoResponse` trait.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fieldserve_core::BookingError;
use fieldserve_core::types::Booking;
use serde::Serialize;
use std::fmt;

const NO_PROVIDERS: &str = "No providers available";

/// Application error type for web handlers.
///
/// Every response carries `{code, message}`. A failed assignment also carries
/// the committed booking and whether assigning again can still work.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Booking>, AppError> {
///     let booking = state.machine.booking(&id)?;
///     Ok(Json(booking))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Booking state after a failed assignment
    unassigned: Option<Unassigned>,
}

#[derive(Debug)]
struct Unassigned {
    booking: Box<Booking>,
    retryable: bool,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            unassigned: None,
        }
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// HTTP status of the response
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
    /// Short summary of a failed assignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Booking as committed after a failed assignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    booking: Option<Box<Booking>>,
    /// Whether another assignment attempt may succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() && self.unassigned.is_none() {
            tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                "Internal server error"
            );
        } else if self.status.is_client_error() {
            tracing::debug!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                "Request rejected"
            );
        }

        let (error, booking, retryable) = match self.unassigned {
            Some(Unassigned { booking, retryable }) => {
                (Some(NO_PROVIDERS.to_string()), Some(booking), Some(retryable))
            }
            None => (None, None, None),
        };

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            error,
            booking,
            retryable,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let status = match &err {
            BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookingError::InvalidTransition { .. } | BookingError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            BookingError::AuthorizationMismatch { .. } => StatusCode::FORBIDDEN,
            BookingError::NoProviderAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        let mut app = Self::new(status, err.to_string(), err.code());

        if let BookingError::NoProviderAvailable { booking, retryable } = err {
            app.unassigned = Some(Unassigned { booking, retryable });
        }
        app
    }
}

/// Malformed JSON bodies get the same `{code, message}` shape as everything else.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text(), "BAD_REQUEST")
    }
}

/// Bad query strings get the same shape too.
impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text(), "BAD_REQUEST")
    }
}
