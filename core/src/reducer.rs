//! Pure booking transitions.
//!
//! [`BookingReducer`] turns `(booking, command, context)` into a
//! [`Transition`]: the next booking value, the provider availability changes it
//! implies, and the audit events to record. It performs no I/O and touches no
//! shared state, so every row of the transition table can be tested on plain
//! values. [`BookingStateMachine`](crate::machine::BookingStateMachine) applies
//! the result atomically.

use crate::error::{BookingError, Result};
use crate::retry::RetryPolicy;
use crate::types::{
    Actor, Booking, BookingId, BookingStatus, Metadata, NewBooking, Operation, Provider,
    ProviderId,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use smallvec::SmallVec;

// ============================================================================
// Commands
// ============================================================================

/// Every operation that can be applied to an existing booking
#[derive(Clone, Debug, PartialEq)]
pub enum BookingCommand {
    /// Attach `candidate`, or count a miss if there is none
    Assign {
        /// Provider chosen by the assignment engine
        candidate: Option<Provider>,
    },
    /// The assigned provider takes the job
    Accept {
        /// Provider performing the action
        provider_id: ProviderId,
    },
    /// The assigned provider turns the job down
    Reject {
        /// Provider performing the action
        provider_id: ProviderId,
    },
    /// The job is done
    Complete,
    /// Call the booking off
    Cancel {
        /// Who is cancelling, `Customer` or `Provider`
        actor: Actor,
        /// Optional explanation
        reason: Option<String>,
    },
    /// Nobody showed up
    NoShow,
    /// Back to pending, then attach `candidate` if there is one
    Retry {
        /// Provider chosen by the assignment engine
        candidate: Option<Provider>,
    },
    /// Force `target`
    Override {
        /// Status to force
        target: BookingStatus,
        /// Optional explanation
        reason: Option<String>,
    },
}

impl BookingCommand {
    /// The operation this command performs
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Assign { .. } => Operation::Assign,
            Self::Accept { .. } => Operation::Accept,
            Self::Reject { .. } => Operation::Reject,
            Self::Complete => Operation::Complete,
            Self::Cancel { .. } => Operation::Cancel,
            Self::NoShow => Operation::NoShow,
            Self::Retry { .. } => Operation::Retry,
            Self::Override { .. } => Operation::Override,
        }
    }
}

// ============================================================================
// Transition output
// ============================================================================

/// A change to a provider's availability
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEffect {
    /// Mark busy; the provider must currently be available
    Reserve(ProviderId),
    /// Mark available
    Release(ProviderId),
}

/// An audit event before it has an id, timestamp, or sequence
#[derive(Clone, Debug, PartialEq)]
pub struct EventDraft {
    /// Status before (`None` for creation)
    pub from: Option<BookingStatus>,
    /// Status after
    pub to: BookingStatus,
    /// Who caused it
    pub actor: Actor,
    /// Human-readable reason
    pub reason: String,
    /// Extra context
    pub metadata: Metadata,
}

impl EventDraft {
    fn new(
        from: Option<BookingStatus>,
        to: BookingStatus,
        actor: Actor,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to,
            actor,
            reason: reason.into(),
            metadata: Metadata::new(),
        }
    }

    fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// How the command turned out
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The command did what it asked
    Applied,
    /// Assignment found nobody; the miss was recorded
    Unmatched {
        /// Whether the booking is still pending
        retryable: bool,
    },
}

/// Everything one command changes, as plain values
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// The booking after the command
    pub booking: Booking,
    /// Availability changes, applied in order
    pub provider_effects: SmallVec<[ProviderEffect; 2]>,
    /// Events to append, in order
    pub events: SmallVec<[EventDraft; 2]>,
    /// Result classification
    pub outcome: Outcome,
}

impl Transition {
    fn new(booking: Booking) -> Self {
        Self {
            booking,
            provider_effects: SmallVec::new(),
            events: SmallVec::new(),
            outcome: Outcome::Applied,
        }
    }

    /// Status the booking ends in
    #[must_use]
    pub const fn final_status(&self) -> BookingStatus {
        self.booking.status
    }

    fn record(&mut self, event: EventDraft) {
        self.booking.status = event.to;
        self.events.push(event);
    }

    fn release_provider(&mut self) -> Option<ProviderId> {
        self.booking.provider_name = None;
        let released = self.booking.provider_id.take()?;
        self.provider_effects
            .push(ProviderEffect::Release(released.clone()));
        Some(released)
    }

    fn attach_provider(&mut self, provider: &Provider, reason: &str) {
        let from = self.booking.status;
        self.booking.provider_id = Some(provider.id.clone());
        self.booking.provider_name = Some(provider.name.clone());
        self.provider_effects
            .push(ProviderEffect::Reserve(provider.id.clone()));
        self.record(
            EventDraft::new(Some(from), BookingStatus::Assigned, Actor::System, reason)
                .with("providerId", json!(provider.id))
                .with("providerName", json!(provider.name)),
        );
    }
}

/// Inputs a transition needs from outside the booking
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionContext {
    /// Timestamp for `updated_at` and friends
    pub now: DateTime<Utc>,
    /// Retry ceiling and revive behaviour
    pub policy: RetryPolicy,
}

impl TransitionContext {
    /// Creates a new `TransitionContext`
    #[must_use]
    pub const fn new(now: DateTime<Utc>, policy: RetryPolicy) -> Self {
        Self { now, policy }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// The booking transition table, as code
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Build the first transition of a booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] if the request is missing required fields.
    pub fn create(
        &self,
        id: BookingId,
        request: NewBooking,
        ctx: &TransitionContext,
    ) -> Result<Transition> {
        request.validate()?;

        let booking = Booking::from_request(id, request, ctx.policy.ceiling, ctx.now);
        let event = EventDraft::new(None, BookingStatus::Pending, Actor::Customer, "Booking created")
            .with("service", json!(booking.service))
            .with("address", json!(booking.address));

        let mut transition = Transition::new(booking);
        transition.record(event);
        Ok(transition)
    }

    /// Apply `command` to `booking`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for a cancel by an actor other than a
    ///   customer or provider, or an override into a provider-holding status
    ///   without a provider.
    /// - [`BookingError::AuthorizationMismatch`] when accept/reject comes from a
    ///   provider that is not assigned.
    /// - [`BookingError::InvalidTransition`] when the table forbids the
    ///   operation from the current status.
    pub fn reduce(
        &self,
        booking: &Booking,
        command: BookingCommand,
        ctx: &TransitionContext,
    ) -> Result<Transition> {
        let operation = command.operation();

        Self::validate(booking, &command)?;

        if !operation.permits(booking.status) {
            return Err(BookingError::InvalidTransition {
                operation,
                booking_id: booking.id.clone(),
                current: booking.status,
            });
        }

        let mut next = booking.clone();
        next.updated_at = ctx.now;
        let mut transition = Transition::new(next);

        match command {
            BookingCommand::Assign { candidate } => {
                Self::assign(&mut transition, candidate.as_ref(), "Auto-assigned provider");
            }
            BookingCommand::Accept { provider_id } => {
                transition.record(
                    EventDraft::new(
                        Some(BookingStatus::Assigned),
                        BookingStatus::InProgress,
                        Actor::Provider,
                        "Provider accepted booking",
                    )
                    .with("providerId", json!(provider_id)),
                );
            }
            BookingCommand::Reject { provider_id } => {
                transition.release_provider();
                transition.booking.retry_count = transition.booking.retry_count.saturating_add(1);
                let retry_count = transition.booking.retry_count;
                transition.record(
                    EventDraft::new(
                        Some(BookingStatus::Assigned),
                        BookingStatus::Pending,
                        Actor::Provider,
                        "Provider rejected booking",
                    )
                    .with("providerId", json!(provider_id))
                    .with("retryCount", json!(retry_count)),
                );
                if transition.booking.retries_exhausted() {
                    transition.record(
                        EventDraft::new(
                            Some(BookingStatus::Pending),
                            BookingStatus::Failed,
                            Actor::System,
                            "Max retries reached after provider rejection",
                        )
                        .with("retryCount", json!(retry_count)),
                    );
                }
            }
            BookingCommand::Complete => {
                let released = transition.release_provider();
                transition.booking.completed_at = Some(ctx.now);
                transition.record(
                    EventDraft::new(
                        Some(BookingStatus::InProgress),
                        BookingStatus::Completed,
                        Actor::Provider,
                        "Service completed",
                    )
                    .with("providerId", json!(released)),
                );
            }
            BookingCommand::Cancel { actor, reason } => {
                let from = booking.status;
                let released = transition.release_provider();
                transition.booking.cancelled_by = Some(actor);
                transition.booking.cancellation_reason = Some(
                    reason
                        .clone()
                        .unwrap_or_else(|| "No reason provided".to_string()),
                );
                let mut event = EventDraft::new(
                    Some(from),
                    BookingStatus::Cancelled,
                    actor,
                    reason.unwrap_or_else(|| "Booking cancelled".to_string()),
                );
                if let Some(provider_id) = released {
                    event = event.with("releasedProviderId", json!(provider_id));
                }
                transition.record(event);
            }
            BookingCommand::NoShow => {
                let from = booking.status;
                let released = transition.release_provider();
                transition.record(
                    EventDraft::new(Some(from), BookingStatus::NoShow, Actor::System, "Provider no-show")
                        .with("providerId", json!(released)),
                );
            }
            BookingCommand::Retry { candidate } => {
                let from = booking.status;
                if ctx.policy.reset_on_revive {
                    transition.booking.retry_count = 0;
                }
                let retry_count = transition.booking.retry_count;
                transition.record(
                    EventDraft::new(Some(from), BookingStatus::Pending, Actor::System, "Retry initiated")
                        .with("retryCount", json!(retry_count)),
                );
                if let Some(provider) = candidate {
                    transition.attach_provider(&provider, "Auto-assigned on retry");
                }
            }
            BookingCommand::Override { target, reason } => {
                Self::override_status(&mut transition, target, reason, ctx.now);
            }
        }

        Ok(transition)
    }

    fn validate(booking: &Booking, command: &BookingCommand) -> Result<()> {
        match command {
            BookingCommand::Accept { provider_id } | BookingCommand::Reject { provider_id }
                if !booking.is_assigned_to(provider_id) =>
            {
                Err(BookingError::AuthorizationMismatch {
                    booking_id: booking.id.clone(),
                    provider_id: provider_id.clone(),
                })
            }
            BookingCommand::Cancel { actor, .. }
                if !matches!(actor, Actor::Customer | Actor::Provider) =>
            {
                Err(BookingError::Validation(format!(
                    "Bookings can only be cancelled by CUSTOMER or PROVIDER, not {actor}"
                )))
            }
            BookingCommand::Override { target, .. }
                if target.holds_provider() && booking.provider_id.is_none() =>
            {
                Err(BookingError::Validation(format!(
                    "Cannot override booking {} to {target} without an assigned provider",
                    booking.id
                )))
            }
            _ => Ok(()),
        }
    }

    fn assign(transition: &mut Transition, candidate: Option<&Provider>, reason: &str) {
        if let Some(provider) = candidate {
            transition.attach_provider(provider, reason);
            return;
        }

        let booking = &mut transition.booking;
        booking.retry_count = booking.retry_count.saturating_add(1);
        let retry_count = booking.retry_count;
        let exhausted = booking.retries_exhausted();

        transition.record(
            EventDraft::new(
                Some(BookingStatus::Pending),
                BookingStatus::Pending,
                Actor::System,
                if exhausted {
                    "No providers available"
                } else {
                    "No providers available, will retry"
                },
            )
            .with("retryCount", json!(retry_count)),
        );

        if exhausted {
            transition.record(
                EventDraft::new(
                    Some(BookingStatus::Pending),
                    BookingStatus::Failed,
                    Actor::System,
                    "No providers available after max retries",
                )
                .with("retryCount", json!(retry_count)),
            );
        }

        transition.outcome = Outcome::Unmatched {
            retryable: !exhausted,
        };
    }

    fn override_status(
        transition: &mut Transition,
        target: BookingStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) {
        let from = transition.booking.status;
        let reason = reason.unwrap_or_else(|| "Admin override".to_string());

        let released = if target.holds_provider() {
            None
        } else {
            transition.release_provider()
        };

        let booking = &mut transition.booking;
        if target == BookingStatus::Completed {
            booking.completed_at.get_or_insert(now);
        } else {
            booking.completed_at = None;
        }
        if target == BookingStatus::Cancelled {
            booking.cancelled_by = Some(Actor::Admin);
            booking.cancellation_reason = Some(reason.clone());
        } else {
            booking.cancelled_by = None;
            booking.cancellation_reason = None;
        }

        let mut event = EventDraft::new(Some(from), target, Actor::Admin, reason);
        if let Some(provider_id) = released {
            event = event.with("releasedProviderId", json!(provider_id));
        }
        transition.record(event);
    }
}
