//! Matching a pending booking to a provider.

use crate::registry::ProviderRegistry;
use crate::types::{Booking, Provider};

/// Result of a matching attempt. Not finding anyone is an ordinary outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// A provider that can take the booking right now
    Matched(Provider),
    /// Nobody available covers the requested service
    Unmatched,
}

impl MatchOutcome {
    /// The matched provider, if any
    #[must_use]
    pub fn into_provider(self) -> Option<Provider> {
        match self {
            Self::Matched(provider) => Some(provider),
            Self::Unmatched => None,
        }
    }
}

/// First-available matcher.
///
/// Scans the registry in its iteration order and takes the first provider that
/// is available and covers the booking's service. No load balancing and no
/// rating weighting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentEngine;

impl AssignmentEngine {
    /// Creates a new `AssignmentEngine`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Look for a provider for `booking`
    #[must_use]
    pub fn find_match(&self, booking: &Booking, registry: &dyn ProviderRegistry) -> MatchOutcome {
        let outcome = registry
            .find_available_for_service(&booking.service)
            .map_or(MatchOutcome::Unmatched, MatchOutcome::Matched);

        match &outcome {
            MatchOutcome::Matched(provider) => tracing::debug!(
                booking_id = %booking.id,
                provider_id = %provider.id,
                service = %booking.service,
                "Matched provider"
            ),
            MatchOutcome::Unmatched => tracing::debug!(
                booking_id = %booking.id,
                service = %booking.service,
                "No provider matched"
            ),
        }

        outcome
    }
}
