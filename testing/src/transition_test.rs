//! Ergonomic testing utilities for the booking reducer
//!
//! This module provides a fluent API for testing transitions with readable
//! Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // TransitionTest is the natural name

use crate::mocks::test_clock;
use fieldserve_core::environment::Clock;
use fieldserve_core::error::BookingError;
use fieldserve_core::reducer::{
    BookingCommand, BookingReducer, EventDraft, Outcome, ProviderEffect, TransitionContext,
};
use fieldserve_core::retry::RetryPolicy;
use fieldserve_core::types::Booking;

/// Type alias for booking assertion functions
type BookingAssertion = Box<dyn FnOnce(&Booking)>;

/// Type alias for event assertion functions
type EventAssertion = Box<dyn FnOnce(&[EventDraft])>;

/// Type alias for provider effect assertion functions
type EffectAssertion = Box<dyn FnOnce(&[ProviderEffect])>;

/// Type alias for error assertion functions
type ErrorAssertion = Box<dyn FnOnce(&BookingError)>;

/// Fluent API for testing [`BookingReducer`] with Given-When-Then syntax
///
/// # Example
///
/// ```
/// use fieldserve_testing::{fixtures, TransitionTest};
/// use fieldserve_core::reducer::BookingCommand;
/// use fieldserve_core::types::BookingStatus;
///
/// TransitionTest::new()
///     .given_booking(fixtures::pending_booking("b1", "plumbing"))
///     .when(BookingCommand::Assign { candidate: None })
///     .then_booking(|booking| {
///         assert_eq!(booking.status, BookingStatus::Pending);
///         assert_eq!(booking.retry_count, 1);
///     })
///     .then_unmatched(true)
///     .run();
/// ```
pub struct TransitionTest {
    reducer: BookingReducer,
    context: TransitionContext,
    booking: Option<Booking>,
    command: Option<BookingCommand>,
    booking_assertions: Vec<BookingAssertion>,
    event_assertions: Vec<EventAssertion>,
    effect_assertions: Vec<EffectAssertion>,
    error_assertion: Option<ErrorAssertion>,
    outcome: Option<Outcome>,
}

impl Default for TransitionTest {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionTest {
    /// Create a new transition test at the test clock's time with the
    /// default retry policy
    #[must_use]
    pub fn new() -> Self {
        Self {
            reducer: BookingReducer::new(),
            context: TransitionContext::new(test_clock().now(), RetryPolicy::default()),
            booking: None,
            command: None,
            booking_assertions: Vec::new(),
            event_assertions: Vec::new(),
            effect_assertions: Vec::new(),
            error_assertion: None,
            outcome: None,
        }
    }

    /// Set the retry policy
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.context.policy = policy;
        self
    }

    /// Set the booking before the command (Given)
    #[must_use]
    pub fn given_booking(mut self, booking: Booking) -> Self {
        self.booking = Some(booking);
        self
    }

    /// Set the command to test (When)
    #[must_use]
    pub fn when(mut self, command: BookingCommand) -> Self {
        self.command = Some(command);
        self
    }

    /// Add an assertion about the resulting booking (Then)
    #[must_use]
    pub fn then_booking<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&Booking) + 'static,
    {
        self.booking_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the drafted events (Then)
    #[must_use]
    pub fn then_events<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[EventDraft]) + 'static,
    {
        self.event_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about provider availability changes (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[ProviderEffect]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Expect assignment to come up empty (Then)
    #[must_use]
    pub const fn then_unmatched(mut self, retryable: bool) -> Self {
        self.outcome = Some(Outcome::Unmatched { retryable });
        self
    }

    /// Expect the command to be rejected (Then)
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&BookingError) + 'static,
    {
        self.error_assertion = Some(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if the booking or command is not set, if the command fails
    /// when success was expected (or the reverse), or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let booking = self
            .booking
            .expect("Booking must be set with given_booking()");
        let command = self.command.expect("Command must be set with when()");

        let result = self.reducer.reduce(&booking, command, &self.context);

        if let Some(assertion) = self.error_assertion {
            match result {
                Err(error) => assertion(&error),
                Ok(transition) => panic!(
                    "Expected the command to be rejected, but it moved the booking to {}",
                    transition.final_status()
                ),
            }
            return;
        }

        let transition = match result {
            Ok(transition) => transition,
            Err(error) => panic!("Expected the command to succeed, but it failed: {error}"),
        };

        assert_eq!(
            transition.outcome,
            self.outcome.unwrap_or(Outcome::Applied),
            "Unexpected outcome"
        );

        for assertion in self.booking_assertions {
            assertion(&transition.booking);
        }

        for assertion in self.event_assertions {
            assertion(transition.events.as_slice());
        }

        for assertion in self.effect_assertions {
            assertion(transition.provider_effects.as_slice());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::assert_draft_hops;
    use crate::fixtures::{pending_booking, provider};
    use fieldserve_core::types::{Actor, BookingStatus, ProviderId};

    #[test]
    fn test_assign_with_candidate() {
        TransitionTest::new()
            .given_booking(pending_booking("b1", "plumbing"))
            .when(BookingCommand::Assign {
                candidate: Some(provider("p1", "Ramesh Kumar", &["plumbing"])),
            })
            .then_booking(|booking| {
                assert_eq!(booking.status, BookingStatus::Assigned);
                assert_eq!(booking.provider_id, Some(ProviderId::new("p1")));
            })
            .then_effects(|effects| {
                assert_eq!(effects, [ProviderEffect::Reserve(ProviderId::new("p1"))]);
            })
            .then_events(|events| {
                assert_draft_hops(events, &[(Some(BookingStatus::Pending), BookingStatus::Assigned)]);
                assert_eq!(events[0].actor, Actor::System);
            })
            .run();
    }

    #[test]
    fn test_complete_from_pending_is_rejected() {
        TransitionTest::new()
            .given_booking(pending_booking("b1", "plumbing"))
            .when(BookingCommand::Complete)
            .then_error(|error| {
                assert_eq!(error.code(), "INVALID_TRANSITION");
            })
            .run();
    }

    #[test]
    fn test_last_miss_fails_booking() {
        let mut booking = pending_booking("b1", "roofing");
        booking.retry_count = 2;

        TransitionTest::new()
            .given_booking(booking)
            .when(BookingCommand::Assign { candidate: None })
            .then_unmatched(false)
            .then_booking(|booking| assert_eq!(booking.status, BookingStatus::Failed))
            .run();
    }
}
