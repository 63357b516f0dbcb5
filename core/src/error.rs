//! Error taxonomy for booking operations.
//!
//! Every variant is a caller-facing outcome rather than a crash: the request
//! layer turns each one into a structured response.

use crate::types::{Booking, BookingId, BookingStatus, Operation, ProviderId};
use std::fmt;
use thiserror::Error;

/// Kind of record a lookup failed to find
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    /// A booking
    Booking,
    /// A provider
    Provider,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Booking => f.write_str("Booking"),
            Self::Provider => f.write_str("Provider"),
        }
    }
}

/// Failures reported by the booking state machine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    /// Unknown booking or provider id
    #[error("{entity} {id} not found")]
    NotFound {
        /// What was looked up
        entity: Entity,
        /// The id that did not resolve
        id: String,
    },

    /// The operation is not permitted from the booking's current status
    #[error("Cannot {operation} booking {booking_id} in {current} status")]
    InvalidTransition {
        /// Attempted operation
        operation: Operation,
        /// Target booking
        booking_id: BookingId,
        /// Status the booking was in
        current: BookingStatus,
    },

    /// The acting provider is not the one assigned to the booking
    #[error("Provider {provider_id} is not assigned to booking {booking_id}")]
    AuthorizationMismatch {
        /// Target booking
        booking_id: BookingId,
        /// Provider that attempted the action
        provider_id: ProviderId,
    },

    /// Malformed input or an unknown override target
    #[error("{0}")]
    Validation(String),

    /// Assignment found no provider.
    ///
    /// Unlike the other variants this one is reported *after* the booking was
    /// updated: the retry counter moved and, when `retryable` is false, the
    /// booking is now `Failed`.
    #[error(
        "No providers available for booking {} (attempt {} of {})",
        booking.id,
        booking.retry_count,
        booking.max_retries
    )]
    NoProviderAvailable {
        /// The booking as committed after the miss
        booking: Box<Booking>,
        /// Whether another `assign` may still succeed
        retryable: bool,
    },
}

impl BookingError {
    /// Shorthand for a missing booking
    #[must_use]
    pub fn booking_not_found(id: &BookingId) -> Self {
        Self::NotFound {
            entity: Entity::Booking,
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing provider
    #[must_use]
    pub fn provider_not_found(id: &ProviderId) -> Self {
        Self::NotFound {
            entity: Entity::Provider,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code, used for metric labels and response bodies
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AuthorizationMismatch { .. } => "AUTHORIZATION_MISMATCH",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NoProviderAvailable { .. } => "NO_PROVIDER_AVAILABLE",
        }
    }
}

/// Result alias for booking operations
pub type Result<T, E = BookingError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_names_current_status() {
        let err = BookingError::InvalidTransition {
            operation: Operation::Complete,
            booking_id: BookingId::new("b-1"),
            current: BookingStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Cannot complete booking b-1 in PENDING status"
        );
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_not_found_display() {
        let err = BookingError::provider_not_found(&ProviderId::new("p9"));
        assert_eq!(err.to_string(), "Provider p9 not found");
    }
}
