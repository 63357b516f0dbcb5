//! Booking storage.

use crate::types::{Booking, BookingId, BookingStatus, ProviderId};
use std::collections::HashMap;

/// Read-side filter for listing bookings.
///
/// Unset fields match everything. `customer_name` is a case-insensitive
/// substring match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    /// Only bookings in this status
    pub status: Option<BookingStatus>,
    /// Only bookings assigned to this provider
    pub provider_id: Option<ProviderId>,
    /// Only bookings whose customer name contains this text
    pub customer_name: Option<String>,
}

impl BookingFilter {
    /// A filter that matches every booking
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a status
    #[must_use]
    pub const fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to a provider
    #[must_use]
    pub fn with_provider(mut self, provider_id: ProviderId) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    /// Restrict to customer names containing `needle`
    #[must_use]
    pub fn with_customer_name(mut self, needle: impl Into<String>) -> Self {
        self.customer_name = Some(needle.into());
        self
    }

    /// Whether `booking` passes the filter
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        if self.status.is_some_and(|status| booking.status != status) {
            return false;
        }
        if let Some(provider_id) = &self.provider_id {
            if booking.provider_id.as_ref() != Some(provider_id) {
                return false;
            }
        }
        if let Some(needle) = &self.customer_name {
            if !booking
                .customer_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Storage for booking records.
///
/// Bookings are never deleted; `put` inserts or replaces.
pub trait BookingStore: Send {
    /// Fetch one booking
    fn get(&self, id: &BookingId) -> Option<Booking>;

    /// Insert or replace a booking
    fn put(&mut self, booking: Booking);

    /// Bookings matching `filter`, in submission order
    fn list(&self, filter: &BookingFilter) -> Vec<Booking>;
}

/// `HashMap`-backed store that remembers submission order
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingStore {
    order: Vec<BookingId>,
    records: HashMap<BookingId, Booking>,
}

impl InMemoryBookingStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookingStore for InMemoryBookingStore {
    fn get(&self, id: &BookingId) -> Option<Booking> {
        self.records.get(id).cloned()
    }

    fn put(&mut self, booking: Booking) {
        if !self.records.contains_key(&booking.id) {
            self.order.push(booking.id.clone());
        }
        self.records.insert(booking.id.clone(), booking);
    }

    fn list(&self, filter: &BookingFilter) -> Vec<Booking> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|booking| filter.matches(booking))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewBooking;
    use chrono::Utc;

    fn booking(id: &str, customer: &str) -> Booking {
        Booking::from_request(
            BookingId::new(id),
            NewBooking::new("plumbing", "1 High St").customer(customer),
            3,
            Utc::now(),
        )
    }

    #[test]
    fn test_put_replaces_without_reordering() {
        let mut store = InMemoryBookingStore::new();
        store.put(booking("a", "Asha"));
        store.put(booking("b", "Bilal"));

        let mut updated = booking("a", "Asha");
        updated.status = BookingStatus::Cancelled;
        store.put(updated);

        let ids: Vec<String> = store
            .list(&BookingFilter::all())
            .into_iter()
            .map(|b| b.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(
            store.get(&BookingId::new("a")).map(|b| b.status),
            Some(BookingStatus::Cancelled)
        );
    }

    #[test]
    fn test_customer_filter_is_case_insensitive_substring() {
        let mut store = InMemoryBookingStore::new();
        store.put(booking("a", "Priya Nair"));
        store.put(booking("b", "Rahul Mehta"));

        let found = store.list(&BookingFilter::all().with_customer_name("NAIR"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, BookingId::new("a"));
    }

    #[test]
    fn test_status_and_provider_filters_combine() {
        let mut store = InMemoryBookingStore::new();
        let mut assigned = booking("a", "Asha");
        assigned.status = BookingStatus::Assigned;
        assigned.provider_id = Some(ProviderId::new("p1"));
        store.put(assigned);
        store.put(booking("b", "Bilal"));

        let filter = BookingFilter::all()
            .with_status(BookingStatus::Assigned)
            .with_provider(ProviderId::new("p1"));
        assert_eq!(store.list(&filter).len(), 1);

        let filter = BookingFilter::all().with_provider(ProviderId::new("p2"));
        assert!(store.list(&filter).is_empty());
    }
}
