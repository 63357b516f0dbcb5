//! The booking state machine.
//!
//! Every externally triggered action enters here. The machine holds one lock
//! over the provider registry, booking store, and event log together, so a
//! booking transition and the provider availability flip it causes are never
//! observed half-applied.
//!
//! # Flow of one operation
//!
//! 1. Take the ledger lock
//! 2. Load the booking (`NotFound` otherwise)
//! 3. Run the assignment engine if the operation needs a candidate
//! 4. Ask [`BookingReducer`] for the [`Transition`] (pure, may reject)
//! 5. Check the transition's provider effects against the registry
//! 6. Apply effects, store the booking, append the events
//!
//! Nothing is written before step 6, and step 6 cannot fail.

use crate::assignment::AssignmentEngine;
use crate::environment::BookingEnvironment;
use crate::error::{BookingError, Result};
use crate::event_log::{EventLog, EventQuery, InMemoryEventLog};
use crate::reducer::{
    BookingCommand, BookingReducer, Outcome, ProviderEffect, Transition, TransitionContext,
};
use crate::registry::{InMemoryProviderRegistry, ProviderRegistry};
use crate::retry::RetryPolicy;
use crate::store::{BookingFilter, BookingStore, InMemoryBookingStore};
use crate::types::{
    Actor, Booking, BookingEvent, BookingId, BookingStatus, EventId, NewBooking, Operation,
    Provider, ProviderId,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// Ledger
// ============================================================================

/// The three tables, always locked together
struct Ledger {
    providers: Box<dyn ProviderRegistry>,
    bookings: Box<dyn BookingStore>,
    events: Box<dyn EventLog>,
}

impl Ledger {
    fn booking(&self, id: &BookingId) -> Result<Booking> {
        self.bookings
            .get(id)
            .ok_or_else(|| BookingError::booking_not_found(id))
    }

    /// Reject effects that cannot be applied, before anything is written.
    fn check_effects(&self, transition: &Transition) -> Result<()> {
        for effect in &transition.provider_effects {
            if let ProviderEffect::Reserve(id) = effect {
                let provider = self
                    .providers
                    .find_by_id(id)
                    .ok_or_else(|| BookingError::provider_not_found(id))?;
                if !provider.available {
                    return Err(BookingError::Validation(format!(
                        "Provider {id} is no longer available"
                    )));
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self, transition: Transition, env: &BookingEnvironment) -> Booking {
        let Transition {
            booking,
            provider_effects,
            events,
            ..
        } = transition;

        for effect in provider_effects {
            match effect {
                ProviderEffect::Reserve(id) => {
                    self.providers.mark_busy(&id);
                }
                ProviderEffect::Release(id) => {
                    if !self.providers.mark_available(&id) {
                        tracing::warn!(
                            booking_id = %booking.id,
                            provider_id = %id,
                            "Released provider is not in the registry"
                        );
                    }
                }
            }
        }

        let now = booking.updated_at;
        for draft in events {
            let stored = self.events.append(BookingEvent {
                id: EventId::new(env.ids.next_id()),
                booking_id: booking.id.clone(),
                sequence: 0,
                old_status: draft.from,
                new_status: draft.to,
                actor: draft.actor,
                reason: draft.reason,
                metadata: draft.metadata,
                timestamp: now,
            });
            tracing::debug!(
                booking_id = %stored.booking_id,
                sequence = stored.sequence,
                from = ?stored.old_status,
                to = %stored.new_status,
                actor = %stored.actor,
                "Recorded booking event"
            );
        }

        self.bookings.put(booking.clone());
        booking
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// A consistent copy of providers and bookings, taken under the ledger lock.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    /// Every provider, in registry order
    pub providers: Vec<Provider>,
    /// Every booking, in submission order
    pub bookings: Vec<Booking>,
}

impl LedgerSnapshot {
    /// Describe every broken booking/provider invariant. Empty when consistent.
    ///
    /// Checks that a booking references a provider iff it is `Assigned` or
    /// `InProgress`, that no provider is held by two active bookings, and that
    /// a provider is unavailable iff an active booking holds it.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut holders: HashMap<&ProviderId, &BookingId> = HashMap::new();

        for booking in &self.bookings {
            match (&booking.provider_id, booking.status.holds_provider()) {
                (Some(provider_id), true) => {
                    if let Some(other) = holders.insert(provider_id, &booking.id) {
                        problems.push(format!(
                            "provider {provider_id} is held by both {other} and {}",
                            booking.id
                        ));
                    }
                }
                (Some(provider_id), false) => problems.push(format!(
                    "booking {} is {} but still references provider {provider_id}",
                    booking.id, booking.status
                )),
                (None, true) => problems.push(format!(
                    "booking {} is {} without a provider",
                    booking.id, booking.status
                )),
                (None, false) => {}
            }
        }

        for provider in &self.providers {
            match (provider.available, holders.get(&provider.id)) {
                (true, Some(holder)) => problems.push(format!(
                    "provider {} is available but held by {holder}",
                    provider.id
                )),
                (false, None) => problems.push(format!(
                    "provider {} is busy but no active booking holds it",
                    provider.id
                )),
                _ => {}
            }
        }

        problems
    }

    /// Whether [`violations`](Self::violations) is empty
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.violations().is_empty()
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Coordinates bookings against the provider pool.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```
/// use fieldserve_core::machine::BookingStateMachine;
/// use fieldserve_core::registry::{default_roster, InMemoryProviderRegistry};
/// use fieldserve_core::types::{BookingStatus, NewBooking};
///
/// # fn main() -> Result<(), fieldserve_core::BookingError> {
/// let machine = BookingStateMachine::builder()
///     .providers(InMemoryProviderRegistry::with_providers(default_roster()))
///     .build();
///
/// let booking = machine.create(NewBooking::new("plumbing", "12 Main St"))?;
/// let booking = machine.assign(&booking.id)?;
/// assert_eq!(booking.status, BookingStatus::Assigned);
/// # Ok(())
/// # }
/// ```
pub struct BookingStateMachine {
    ledger: Mutex<Ledger>,
    env: BookingEnvironment,
    engine: AssignmentEngine,
    reducer: BookingReducer,
    policy: RetryPolicy,
}

impl std::fmt::Debug for BookingStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingStateMachine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl BookingStateMachine {
    /// Start building a state machine. Unset parts default to in-memory
    /// storage, the system clock, UUID ids, and the default retry policy.
    #[must_use]
    pub fn builder() -> BookingStateMachineBuilder {
        BookingStateMachineBuilder::default()
    }

    /// The retry policy in force
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // Transitions never panic between check and write, so a poisoned
        // ledger is still consistent.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self) -> TransitionContext {
        TransitionContext::new(self.env.clock.now(), self.policy)
    }

    fn candidate(&self, ledger: &Ledger, booking: &Booking, operation: Operation) -> Option<Provider> {
        if !operation.permits(booking.status) {
            return None;
        }
        self.engine
            .find_match(booking, ledger.providers.as_ref())
            .into_provider()
    }

    /// Load, reduce, check, commit.
    fn transition<F>(&self, id: &BookingId, operation: Operation, command: F) -> Result<Booking>
    where
        F: FnOnce(&Self, &Ledger, &Booking) -> BookingCommand,
    {
        let mut ledger = self.lock();
        let current = ledger.booking(id)?;
        let from = current.status;
        let command = command(self, &ledger, &current);

        let transition = self
            .reducer
            .reduce(&current, command, &self.context())
            .and_then(|transition| {
                ledger.check_effects(&transition)?;
                Ok(transition)
            })
            .inspect_err(|error| Self::record_rejection(operation, id, error))?;

        let outcome = transition.outcome;
        let booking = ledger.commit(transition, &self.env);
        drop(ledger);

        metrics::counter!(
            "booking.transitions.total",
            "operation" => operation.as_str(),
            "to" => booking.status.as_str()
        )
        .increment(1);
        tracing::info!(
            booking_id = %booking.id,
            operation = %operation,
            from = %from,
            to = %booking.status,
            retry_count = booking.retry_count,
            "Booking transitioned"
        );

        match outcome {
            Outcome::Applied => Ok(booking),
            Outcome::Unmatched { retryable } => {
                metrics::counter!("booking.assignment.unmatched.total").increment(1);
                Err(BookingError::NoProviderAvailable {
                    booking: Box::new(booking),
                    retryable,
                })
            }
        }
    }

    fn record_rejection(operation: Operation, id: &BookingId, error: &BookingError) {
        metrics::counter!(
            "booking.rejections.total",
            "operation" => operation.as_str(),
            "reason" => error.code()
        )
        .increment(1);
        tracing::warn!(
            booking_id = %id,
            operation = %operation,
            error = %error,
            "Booking operation rejected"
        );
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Submit a new booking in `Pending`.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] if `service` or `address` is blank.
    #[tracing::instrument(skip_all, fields(service = %request.service))]
    pub fn create(&self, request: NewBooking) -> Result<Booking> {
        let id = BookingId::new(self.env.ids.next_id());
        let transition = self
            .reducer
            .create(id.clone(), request, &self.context())
            .inspect_err(|error| Self::record_rejection(Operation::Create, &id, error))?;

        let booking = self.lock().commit(transition, &self.env);

        metrics::counter!(
            "booking.transitions.total",
            "operation" => Operation::Create.as_str(),
            "to" => BookingStatus::Pending.as_str()
        )
        .increment(1);
        tracing::info!(booking_id = %booking.id, service = %booking.service, "Booking created");
        Ok(booking)
    }

    /// Match a pending booking to the first available capable provider.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] for an unknown booking.
    /// - [`BookingError::InvalidTransition`] unless the booking is `Pending`.
    /// - [`BookingError::NoProviderAvailable`] when nobody matched. The miss
    ///   is already recorded: the retry counter went up and, once the ceiling
    ///   is reached, the booking is `Failed` and `retryable` is false.
    #[tracing::instrument(skip_all, fields(booking_id = %id))]
    pub fn assign(&self, id: &BookingId) -> Result<Booking> {
        self.transition(id, Operation::Assign, |machine, ledger, booking| {
            BookingCommand::Assign {
                candidate: machine.candidate(ledger, booking, Operation::Assign),
            }
        })
    }

    /// The assigned provider takes the job.
    ///
    /// # Errors
    ///
    /// `NotFound`, `AuthorizationMismatch` if `provider_id` is not the
    /// assigned provider, `InvalidTransition` unless `Assigned`.
    #[tracing::instrument(skip_all, fields(booking_id = %id, provider_id = %provider_id))]
    pub fn accept(&self, id: &BookingId, provider_id: &ProviderId) -> Result<Booking> {
        self.transition(id, Operation::Accept, |_, _, _| BookingCommand::Accept {
            provider_id: provider_id.clone(),
        })
    }

    /// The assigned provider turns the job down. The provider is freed, the
    /// booking goes back to `Pending` and counts a retry, failing at the
    /// ceiling.
    ///
    /// # Errors
    ///
    /// Same as [`accept`](Self::accept).
    #[tracing::instrument(skip_all, fields(booking_id = %id, provider_id = %provider_id))]
    pub fn reject(&self, id: &BookingId, provider_id: &ProviderId) -> Result<Booking> {
        self.transition(id, Operation::Reject, |_, _, _| BookingCommand::Reject {
            provider_id: provider_id.clone(),
        })
    }

    /// Finish an in-progress job and free the provider.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidTransition` unless `InProgress`.
    #[tracing::instrument(skip_all, fields(booking_id = %id))]
    pub fn complete(&self, id: &BookingId) -> Result<Booking> {
        self.transition(id, Operation::Complete, |_, _, _| BookingCommand::Complete)
    }

    /// Cancel a booking that is not already completed or cancelled.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` if `actor` is not a customer or provider,
    /// `InvalidTransition` from `Completed` or `Cancelled`.
    #[tracing::instrument(skip_all, fields(booking_id = %id, actor = %actor))]
    pub fn cancel(&self, id: &BookingId, actor: Actor, reason: Option<String>) -> Result<Booking> {
        self.transition(id, Operation::Cancel, |_, _, _| BookingCommand::Cancel {
            actor,
            reason,
        })
    }

    /// Mark an assigned or in-progress booking as a no-show.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidTransition` unless `Assigned` or `InProgress`.
    #[tracing::instrument(skip_all, fields(booking_id = %id))]
    pub fn no_show(&self, id: &BookingId) -> Result<Booking> {
        self.transition(id, Operation::NoShow, |_, _, _| BookingCommand::NoShow)
    }

    /// Revive a `Failed` or `Pending` booking and try to match it straight
    /// away. Finding nobody is not an error here; the booking stays `Pending`.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidTransition` unless `Failed` or `Pending`.
    #[tracing::instrument(skip_all, fields(booking_id = %id))]
    pub fn retry(&self, id: &BookingId) -> Result<Booking> {
        self.transition(id, Operation::Retry, |machine, ledger, booking| {
            BookingCommand::Retry {
                candidate: machine.candidate(ledger, booking, Operation::Retry),
            }
        })
    }

    /// Force a status. Leaving `Assigned`/`InProgress` frees the provider.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Validation` when forcing `Assigned`/`InProgress` onto a
    /// booking that holds no provider.
    #[tracing::instrument(skip_all, fields(booking_id = %id, target = %target))]
    pub fn override_status(
        &self,
        id: &BookingId,
        target: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking> {
        self.transition(id, Operation::Override, |_, _, _| BookingCommand::Override {
            target,
            reason,
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Fetch one booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown id.
    pub fn booking(&self, id: &BookingId) -> Result<Booking> {
        self.lock().booking(id)
    }

    /// Bookings matching `filter`, in submission order
    #[must_use]
    pub fn bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        self.lock().bookings.list(filter)
    }

    /// Events matching `query`, newest first
    #[must_use]
    pub fn events(&self, query: &EventQuery) -> Vec<BookingEvent> {
        self.lock().events.query(query)
    }

    /// A booking's full history, oldest first. Empty for unknown ids.
    #[must_use]
    pub fn timeline(&self, id: &BookingId) -> Vec<BookingEvent> {
        self.lock().events.timeline(id)
    }

    /// Every provider, in registry order
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        self.lock().providers.list()
    }

    /// Fetch one provider.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown id.
    pub fn provider(&self, id: &ProviderId) -> Result<Provider> {
        self.lock()
            .providers
            .find_by_id(id)
            .ok_or_else(|| BookingError::provider_not_found(id))
    }

    /// Providers and bookings read under one lock
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        let ledger = self.lock();
        LedgerSnapshot {
            providers: ledger.providers.list(),
            bookings: ledger.bookings.list(&BookingFilter::all()),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`BookingStateMachine`].
#[derive(Default)]
pub struct BookingStateMachineBuilder {
    providers: Option<Box<dyn ProviderRegistry>>,
    bookings: Option<Box<dyn BookingStore>>,
    events: Option<Box<dyn EventLog>>,
    env: Option<BookingEnvironment>,
    policy: Option<RetryPolicy>,
}

impl BookingStateMachineBuilder {
    /// Provider registry (defaults to an empty in-memory registry)
    #[must_use]
    pub fn providers(mut self, registry: impl ProviderRegistry + 'static) -> Self {
        self.providers = Some(Box::new(registry));
        self
    }

    /// Booking store (defaults to in-memory)
    #[must_use]
    pub fn bookings(mut self, store: impl BookingStore + 'static) -> Self {
        self.bookings = Some(Box::new(store));
        self
    }

    /// Event log (defaults to in-memory)
    #[must_use]
    pub fn events(mut self, log: impl EventLog + 'static) -> Self {
        self.events = Some(Box::new(log));
        self
    }

    /// Clock and id generator (defaults to [`BookingEnvironment::production`])
    #[must_use]
    pub fn environment(mut self, env: BookingEnvironment) -> Self {
        self.env = Some(env);
        self
    }

    /// Retry policy (defaults to [`RetryPolicy::default`])
    #[must_use]
    pub const fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Build the state machine.
    #[must_use]
    pub fn build(self) -> BookingStateMachine {
        let ledger = Ledger {
            providers: self
                .providers
                .unwrap_or_else(|| Box::new(InMemoryProviderRegistry::new())),
            bookings: self
                .bookings
                .unwrap_or_else(|| Box::new(InMemoryBookingStore::new())),
            events: self
                .events
                .unwrap_or_else(|| Box::new(InMemoryEventLog::new())),
        };

        BookingStateMachine {
            ledger: Mutex::new(ledger),
            env: self.env.unwrap_or_else(BookingEnvironment::production),
            engine: AssignmentEngine::new(),
            reducer: BookingReducer::new(),
            policy: self.policy.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_roster;
    use crate::types::Capabilities;

    fn machine() -> BookingStateMachine {
        BookingStateMachine::builder()
            .providers(InMemoryProviderRegistry::with_providers(default_roster()))
            .build()
    }

    #[test]
    fn test_assign_marks_provider_busy() {
        let machine = machine();
        let booking = machine.create(NewBooking::new("carpentry", "4 Elm Rd")).unwrap();
        let booking = machine.assign(&booking.id).unwrap();

        assert_eq!(booking.provider_id, Some(ProviderId::new("p3")));
        assert!(!machine.provider(&ProviderId::new("p3")).unwrap().available);
        assert!(machine.snapshot().is_consistent());
    }

    #[test]
    fn test_rejected_operation_writes_nothing() {
        let machine = machine();
        let booking = machine.create(NewBooking::new("plumbing", "4 Elm Rd")).unwrap();
        let before = machine.events(&EventQuery::default()).len();

        let err = machine.complete(&booking.id).unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
        assert_eq!(machine.events(&EventQuery::default()).len(), before);
        assert_eq!(machine.booking(&booking.id).unwrap(), booking);
    }

    #[test]
    fn test_unknown_booking_is_not_found() {
        let err = machine().assign(&BookingId::new("missing")).unwrap_err();
        assert_eq!(err, BookingError::booking_not_found(&BookingId::new("missing")));
    }

    #[test]
    fn test_snapshot_reports_orphaned_busy_provider() {
        let mut registry = InMemoryProviderRegistry::with_providers([Provider::new(
            ProviderId::new("p1"),
            "Orphan",
            Capabilities::Unrestricted,
        )]);
        registry.mark_busy(&ProviderId::new("p1"));
        let machine = BookingStateMachine::builder().providers(registry).build();

        let violations = machine.snapshot().violations();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("busy"));
    }
}
