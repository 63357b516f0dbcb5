//! Append-only audit log of booking transitions.
//!
//! The log stamps each event with a sequence number on append. Ordering is by
//! `(timestamp, sequence)`, so two transitions committed within the same clock
//! tick still come back in the order they happened.

use crate::types::{Actor, BookingEvent, BookingId, BookingStatus};

/// Default number of events returned by [`EventQuery`].
pub const DEFAULT_EVENT_LIMIT: usize = 100;

/// Filter for the general event listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Only events for this booking
    pub booking_id: Option<BookingId>,
    /// Only events caused by this actor
    pub actor: Option<Actor>,
    /// Only events that moved a booking *into* this status
    pub status: Option<BookingStatus>,
    /// Maximum number of events returned
    pub limit: usize,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            booking_id: None,
            actor: None,
            status: None,
            limit: DEFAULT_EVENT_LIMIT,
        }
    }
}

impl EventQuery {
    /// Restrict to one booking
    #[must_use]
    pub fn for_booking(mut self, booking_id: BookingId) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    /// Restrict to one actor
    #[must_use]
    pub const fn by_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Restrict to transitions into `status`
    #[must_use]
    pub const fn into_status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Cap the number of results
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, event: &BookingEvent) -> bool {
        self.booking_id
            .as_ref()
            .is_none_or(|id| &event.booking_id == id)
            && self.actor.is_none_or(|actor| event.actor == actor)
            && self.status.is_none_or(|status| event.new_status == status)
    }
}

/// Append-only event storage.
///
/// There is deliberately no update or delete.
pub trait EventLog: Send {
    /// Store an event, assigning its sequence number. Returns the stored copy.
    fn append(&mut self, event: BookingEvent) -> BookingEvent;

    /// Matching events, newest first, at most `query.limit`
    fn query(&self, query: &EventQuery) -> Vec<BookingEvent>;

    /// Every event for one booking, oldest first
    fn timeline(&self, booking_id: &BookingId) -> Vec<BookingEvent>;

    /// Number of stored events
    fn len(&self) -> usize;

    /// Whether the log is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Vec`-backed log
#[derive(Debug, Clone)]
pub struct InMemoryEventLog {
    events: Vec<BookingEvent>,
    next_sequence: u64,
}

impl InMemoryEventLog {
    /// Creates an empty log
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            next_sequence: 1,
        }
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&mut self, mut event: BookingEvent) -> BookingEvent {
        event.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.events.push(event.clone());
        event
    }

    fn query(&self, query: &EventQuery) -> Vec<BookingEvent> {
        let mut matched: Vec<BookingEvent> = self
            .events
            .iter()
            .filter(|event| query.matches(event))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.sequence.cmp(&a.sequence))
        });
        matched.truncate(query.limit);
        matched
    }

    fn timeline(&self, booking_id: &BookingId) -> Vec<BookingEvent> {
        let mut matched: Vec<BookingEvent> = self
            .events
            .iter()
            .filter(|event| &event.booking_id == booking_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.sequence.cmp(&b.sequence))
        });
        matched
    }

    fn len(&self) -> usize {
        self.events.len()
    }
}
