//! # Fieldserve Testing
//!
//! Testing utilities and helpers for the booking state machine.
//!
//! This crate provides:
//! - Deterministic clocks and id generators
//! - Provider and booking fixtures
//! - A Given-When-Then harness for the pure reducer
//! - Ledger and history assertions
//! - proptest strategies for random operation sequences
//!
//! ## Example
//!
//! ```
//! use fieldserve_testing::{assertions, fixtures};
//! use fieldserve_core::types::NewBooking;
//!
//! let machine = fixtures::test_machine();
//! let booking = machine.create(NewBooking::new("plumbing", "1 High St")).unwrap();
//! machine.assign(&booking.id).unwrap();
//!
//! assertions::assert_ledger_consistent(&machine);
//! assertions::assert_valid_history(&machine.timeline(&booking.id));
//! ```

use chrono::{DateTime, Utc};
use fieldserve_core::environment::{Clock, IdGenerator};

pub mod transition_test;

pub use transition_test::TransitionTest;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use chrono::Duration;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use fieldserve_testing::mocks::FixedClock;
    /// use fieldserve_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    #[allow(clippy::expect_used)]
    pub(crate) fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Clock that moves forward by a fixed step on every read
    ///
    /// The first read returns `start`.
    #[derive(Debug)]
    pub struct SteppingClock {
        start: DateTime<Utc>,
        step: Duration,
        ticks: AtomicU64,
    }

    impl SteppingClock {
        /// Create a clock starting at `start` that advances by `step`
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: Duration) -> Self {
            Self {
                start,
                step,
                ticks: AtomicU64::new(0),
            }
        }

        /// One second per read, starting at 2025-01-01 00:00:00 UTC
        #[must_use]
        pub fn per_second() -> Self {
            Self::new(epoch(), Duration::seconds(1))
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            let tick = i32::try_from(tick).unwrap_or(i32::MAX);
            self.start + self.step * tick
        }
    }

    /// Predictable ids: `{prefix}-1`, `{prefix}-2`, ...
    ///
    /// # Example
    ///
    /// ```
    /// use fieldserve_testing::mocks::SequentialIdGenerator;
    /// use fieldserve_core::environment::IdGenerator;
    ///
    /// let ids = SequentialIdGenerator::new("bk");
    /// assert_eq!(ids.next_id(), "bk-1");
    /// assert_eq!(ids.next_id(), "bk-2");
    /// ```
    #[derive(Debug)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator with the given prefix
        #[must_use]
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(1),
            }
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new("id")
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n}", self.prefix)
        }
    }
}

/// Ready-made providers, bookings, and state machines
pub mod fixtures {
    use super::mocks::{SequentialIdGenerator, test_clock};
    use fieldserve_core::environment::BookingEnvironment;
    use fieldserve_core::machine::BookingStateMachine;
    use fieldserve_core::registry::{InMemoryProviderRegistry, default_roster};
    use fieldserve_core::retry::RetryPolicy;
    use fieldserve_core::types::{
        Booking, BookingId, Capabilities, NewBooking, Provider, ProviderId,
    };
    use std::sync::Arc;

    /// Fixed clock and sequential ids
    #[must_use]
    pub fn test_environment() -> BookingEnvironment {
        BookingEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(SequentialIdGenerator::default()),
        )
    }

    /// A provider covering only `services`
    #[must_use]
    pub fn provider(id: &str, name: &str, services: &[&str]) -> Provider {
        Provider::new(
            ProviderId::new(id),
            name,
            Capabilities::restricted(services.iter().copied()),
        )
    }

    /// A provider that takes any job
    #[must_use]
    pub fn handyman(id: &str) -> Provider {
        Provider::new(ProviderId::new(id), "Handyman", Capabilities::Unrestricted)
    }

    /// A `Pending` booking as `create` would produce it
    #[must_use]
    pub fn pending_booking(id: &str, service: &str) -> Booking {
        Booking::from_request(
            BookingId::new(id),
            NewBooking::new(service, "221B Baker Street").customer("Asha Rao"),
            RetryPolicy::default().ceiling,
            super::mocks::epoch(),
        )
    }

    /// A state machine over `providers` with a fixed clock and sequential ids
    #[must_use]
    pub fn machine_with(
        providers: impl IntoIterator<Item = Provider>,
        policy: RetryPolicy,
    ) -> BookingStateMachine {
        BookingStateMachine::builder()
            .providers(InMemoryProviderRegistry::with_providers(providers))
            .environment(test_environment())
            .policy(policy)
            .build()
    }

    /// A state machine over the default roster
    #[must_use]
    pub fn test_machine() -> BookingStateMachine {
        machine_with(default_roster(), RetryPolicy::default())
    }
}

/// Assertions over a whole ledger or event history
pub mod assertions {
    use fieldserve_core::machine::BookingStateMachine;
    use fieldserve_core::reducer::EventDraft;
    use fieldserve_core::types::{BookingEvent, BookingStatus};

    /// Assert every booking/provider invariant holds
    ///
    /// # Panics
    ///
    /// Panics listing each violation found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_ledger_consistent(machine: &BookingStateMachine) {
        let violations = machine.snapshot().violations();
        assert!(
            violations.is_empty(),
            "Ledger is inconsistent:\n  {}",
            violations.join("\n  ")
        );
    }

    /// Assert one booking's timeline forms an unbroken chain
    ///
    /// The first event is the creation (`None -> Pending`), each later event
    /// starts where the previous ended, and sequences strictly increase.
    ///
    /// # Panics
    ///
    /// Panics on the first broken link.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_valid_history(timeline: &[BookingEvent]) {
        let Some(first) = timeline.first() else {
            panic!("Expected at least a creation event, but the timeline is empty");
        };
        assert_eq!(
            (first.old_status, first.new_status),
            (None, BookingStatus::Pending),
            "Timeline must start with creation"
        );

        for pair in timeline.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert_eq!(
                next.old_status,
                Some(prev.new_status),
                "Event {} starts at {:?} but the previous event ended at {}",
                next.id,
                next.old_status,
                prev.new_status
            );
            assert!(
                next.sequence > prev.sequence,
                "Event {} has sequence {} after {}",
                next.id,
                next.sequence,
                prev.sequence
            );
            assert!(next.timestamp >= prev.timestamp, "Timeline goes back in time");
        }
    }

    /// Assert the `(from, to)` pairs of a list of events
    ///
    /// # Panics
    ///
    /// Panics if the hops differ.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_hops(events: &[BookingEvent], expected: &[(Option<BookingStatus>, BookingStatus)]) {
        let hops: Vec<_> = events
            .iter()
            .map(|event| (event.old_status, event.new_status))
            .collect();
        assert_eq!(hops, expected, "Unexpected event hops");
    }

    /// [`assert_hops`] for events that have not been stored yet
    ///
    /// # Panics
    ///
    /// Panics if the hops differ.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_draft_hops(events: &[EventDraft], expected: &[(Option<BookingStatus>, BookingStatus)]) {
        let hops: Vec<_> = events.iter().map(|event| (event.from, event.to)).collect();
        assert_eq!(hops, expected, "Unexpected event hops");
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use fieldserve_core::machine::BookingStateMachine;
    use fieldserve_core::types::{Actor, BookingId, BookingStatus, NewBooking, ProviderId};
    use proptest::prelude::*;

    /// One caller action against a growing set of bookings.
    ///
    /// Booking indexes are taken modulo the number of bookings created so far,
    /// so every generated sequence is applicable.
    #[derive(Debug, Clone)]
    pub enum Step {
        /// Submit a booking for a service
        Create(String),
        /// Run assignment
        Assign(usize),
        /// Accept, either as the assigned provider or as an impostor
        Accept(usize, bool),
        /// Reject as the assigned provider
        Reject(usize),
        /// Complete
        Complete(usize),
        /// Cancel as the given actor
        Cancel(usize, Actor),
        /// Mark no-show
        NoShow(usize),
        /// Retry
        Retry(usize),
        /// Admin override to the given status
        Override(usize, BookingStatus),
    }

    impl Step {
        /// Apply the step. Errors are expected and ignored; only the state
        /// left behind matters.
        pub fn apply(&self, machine: &BookingStateMachine, bookings: &mut Vec<BookingId>) {
            if let Self::Create(service) = self {
                if let Ok(booking) = machine.create(NewBooking::new(service.as_str(), "1 Test Road")) {
                    bookings.push(booking.id);
                }
                return;
            }
            if bookings.is_empty() {
                return;
            }
            let pick = |index: &usize| &bookings[index % bookings.len()];

            let _ = match self {
                Self::Create(_) => return,
                Self::Assign(i) => machine.assign(pick(i)),
                Self::Accept(i, genuine) => {
                    let id = pick(i);
                    let provider = machine
                        .booking(id)
                        .ok()
                        .and_then(|booking| booking.provider_id)
                        .filter(|_| *genuine)
                        .unwrap_or_else(|| ProviderId::new("impostor"));
                    machine.accept(id, &provider)
                }
                Self::Reject(i) => {
                    let id = pick(i);
                    let provider = machine
                        .booking(id)
                        .ok()
                        .and_then(|booking| booking.provider_id)
                        .unwrap_or_else(|| ProviderId::new("impostor"));
                    machine.reject(id, &provider)
                }
                Self::Complete(i) => machine.complete(pick(i)),
                Self::Cancel(i, actor) => machine.cancel(pick(i), *actor, None),
                Self::NoShow(i) => machine.no_show(pick(i)),
                Self::Retry(i) => machine.retry(pick(i)),
                Self::Override(i, target) => {
                    machine.override_status(pick(i), *target, Some("property".to_string()))
                }
            };
        }
    }

    /// Services the default roster covers, plus one nobody does
    pub fn arb_service() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("plumbing".to_string()),
            Just("electrical".to_string()),
            Just("cleaning".to_string()),
            Just("carpentry".to_string()),
            Just("roofing".to_string()),
        ]
    }

    /// Any booking status
    pub fn arb_status() -> impl Strategy<Value = BookingStatus> {
        prop::sample::select(BookingStatus::ALL.to_vec())
    }

    /// Any actor
    pub fn arb_actor() -> impl Strategy<Value = Actor> {
        prop::sample::select(vec![Actor::Customer, Actor::Provider, Actor::System, Actor::Admin])
    }

    /// Any step, weighted towards creating and assigning
    pub fn arb_step() -> impl Strategy<Value = Step> {
        let index = 0..16usize;
        prop_oneof![
            3 => arb_service().prop_map(Step::Create),
            3 => index.clone().prop_map(Step::Assign),
            2 => (index.clone(), any::<bool>()).prop_map(|(i, genuine)| Step::Accept(i, genuine)),
            1 => index.clone().prop_map(Step::Reject),
            1 => index.clone().prop_map(Step::Complete),
            1 => (index.clone(), arb_actor()).prop_map(|(i, actor)| Step::Cancel(i, actor)),
            1 => index.clone().prop_map(Step::NoShow),
            1 => index.clone().prop_map(Step::Retry),
            1 => (index, arb_status()).prop_map(|(i, status)| Step::Override(i, status)),
        ]
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIdGenerator, SteppingClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_stepping_clock_advances() {
        let clock = SteppingClock::per_second();
        let first = clock.now();
        let second = clock.now();
        assert_eq!(second - first, chrono::Duration::seconds(1));
        assert_eq!(first, test_clock().now());
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIdGenerator::new("evt");
        assert_eq!(ids.next_id(), "evt-1");
        assert_eq!(ids.next_id(), "evt-2");
    }

    #[test]
    fn test_fixture_machine_starts_consistent() {
        let machine = fixtures::test_machine();
        assert_eq!(machine.providers().len(), 3);
        assertions::assert_ledger_consistent(&machine);
    }
}
