//! Domain types for field-service booking coordination.
//!
//! Bookings progress through seven statuses:
//! `Pending → Assigned → InProgress → Completed`, with `Cancelled`, `Failed`
//! and `NoShow` as the other terminal exits. Which operation may run from which
//! status is decided in exactly one place, [`Operation::permits`].

use crate::error::BookingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Free-form audit metadata attached to an event.
///
/// A `BTreeMap` keeps serialized output stable across runs.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Customer name used when a booking is submitted without one.
pub const GUEST_CUSTOMER_NAME: &str = "Guest Customer";

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a booking
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    /// Creates a new `BookingId` from a string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Creates a new `ProviderId` from a string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an audit event
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new `EventId` from a string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A requested kind of service, e.g. `plumbing`.
///
/// Always stored trimmed and lowercased so matching against provider
/// capabilities is case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ServiceType(String);

impl ServiceType {
    /// Creates a normalized `ServiceType`
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    /// Returns the normalized name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the normalized name is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for ServiceType {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<ServiceType> for String {
    fn from(service: ServiceType) -> Self {
        service.0
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status, actors and operations
// ============================================================================

/// Lifecycle status of a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Submitted, waiting for a provider
    Pending,
    /// Matched to a provider who has not yet accepted
    Assigned,
    /// Provider accepted and the job is underway
    InProgress,
    /// Job finished
    Completed,
    /// Cancelled by the customer or provider
    Cancelled,
    /// Gave up after exhausting the retry ceiling
    Failed,
    /// Provider or customer did not show up
    NoShow,
}

impl BookingStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Assigned,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
        Self::Failed,
        Self::NoShow,
    ];

    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::NoShow => "NO_SHOW",
        }
    }

    /// Terminal statuses are only left through admin override (or cancel,
    /// for `Failed` and `NoShow`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Failed | Self::NoShow
        )
    }

    /// Whether a booking in this status references a provider.
    #[must_use]
    pub const fn holds_provider(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|status| status.as_str()).collect();
                BookingError::Validation(format!(
                    "Invalid status '{s}'. Valid statuses: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// Party responsible for a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    /// The customer who made the booking
    Customer,
    /// A field provider
    Provider,
    /// The coordinator itself
    System,
    /// An operator using the override escape hatch
    Admin,
}

impl Actor {
    /// Wire name of the actor
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Provider => "PROVIDER",
            Self::System => "SYSTEM",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Actor {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Self::Customer),
            "PROVIDER" => Ok(Self::Provider),
            "SYSTEM" => Ok(Self::System),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(BookingError::Validation(format!(
                "Invalid actor '{s}'. Valid actors: CUSTOMER, PROVIDER, SYSTEM, ADMIN"
            ))),
        }
    }
}

/// Externally triggered operations on a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Submit a new booking
    Create,
    /// Match a pending booking to a provider
    Assign,
    /// Provider accepts an assignment
    Accept,
    /// Provider turns an assignment down
    Reject,
    /// Provider finishes the job
    Complete,
    /// Customer or provider calls the booking off
    Cancel,
    /// Nobody showed up
    NoShow,
    /// Revive a pending or failed booking and try matching again
    Retry,
    /// Force a status, bypassing the table
    Override,
}

impl Operation {
    /// The transition table.
    ///
    /// Returns whether this operation may run against a booking currently in
    /// `status`. `Create` never applies to an existing booking.
    #[must_use]
    pub const fn permits(self, status: BookingStatus) -> bool {
        use BookingStatus as S;

        match self {
            Self::Create => false,
            Self::Assign => matches!(status, S::Pending),
            Self::Accept | Self::Reject => matches!(status, S::Assigned),
            Self::Complete => matches!(status, S::InProgress),
            Self::Cancel => !matches!(status, S::Completed | S::Cancelled),
            Self::NoShow => matches!(status, S::Assigned | S::InProgress),
            Self::Retry => matches!(status, S::Failed | S::Pending),
            Self::Override => true,
        }
    }

    /// Short name used in error messages and metric labels
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Assign => "assign",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::NoShow => "no_show",
            Self::Retry => "retry",
            Self::Override => "override",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Which services a provider will take on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "serviceTypes", rename_all = "camelCase")]
pub enum Capabilities {
    /// Takes any service type
    Unrestricted,
    /// Takes only the listed service types
    Restricted(BTreeSet<ServiceType>),
}

impl Capabilities {
    /// Builds a restricted capability set from service names.
    ///
    /// An empty list means the provider declared nothing, which is treated as
    /// `Unrestricted`.
    #[must_use]
    pub fn restricted<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<ServiceType> = services
            .into_iter()
            .map(ServiceType::new)
            .filter(|service| !service.is_empty())
            .collect();

        if set.is_empty() {
            Self::Unrestricted
        } else {
            Self::Restricted(set)
        }
    }

    /// Whether the capability set covers `service`
    #[must_use]
    pub fn admits(&self, service: &ServiceType) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Restricted(services) => services.contains(service),
        }
    }
}

/// A field service professional
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Provider identifier
    pub id: ProviderId,
    /// Display name
    pub name: String,
    /// Free to take a new booking
    pub available: bool,
    /// Services the provider takes on
    pub capabilities: Capabilities,
    /// Contact phone
    #[serde(default)]
    pub phone: String,
    /// Customer rating, informational only
    #[serde(default)]
    pub rating: f32,
}

impl Provider {
    /// Creates an available provider with no contact details
    #[must_use]
    pub fn new(id: ProviderId, name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            id,
            name: name.into(),
            available: true,
            capabilities,
            phone: String::new(),
            rating: 0.0,
        }
    }

    /// Sets the contact phone
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    /// Sets the rating
    #[must_use]
    pub const fn with_rating(mut self, rating: f32) -> Self {
        self.rating = rating;
        self
    }

    /// Whether this provider can be handed a booking for `service` right now
    #[must_use]
    pub fn can_take(&self, service: &ServiceType) -> bool {
        self.available && self.capabilities.admits(service)
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Input for submitting a booking, before validation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    /// Requested service type
    #[serde(default)]
    pub service: String,
    /// Service address
    #[serde(default)]
    pub address: String,
    /// Customer name (defaults to a guest placeholder)
    pub customer_name: Option<String>,
    /// Customer phone (defaults to empty)
    pub customer_phone: Option<String>,
    /// Requested time (defaults to submission time)
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl NewBooking {
    /// Creates a request with only the required fields
    #[must_use]
    pub fn new(service: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            address: address.into(),
            ..Self::default()
        }
    }

    /// Sets the customer name
    #[must_use]
    pub fn customer(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    /// Checks the required fields
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if `service` or `address` is blank.
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.service.trim().is_empty() || self.address.trim().is_empty() {
            return Err(BookingError::Validation(
                "Service and address are required fields".to_string(),
            ));
        }
        Ok(())
    }
}

/// A customer request for a service, tracked through its lifecycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// Requested service
    pub service: ServiceType,
    /// Service address
    pub address: String,
    /// Customer name
    pub customer_name: String,
    /// Customer phone
    pub customer_phone: String,
    /// When the customer wants the job done
    pub scheduled_time: DateTime<Utc>,
    /// Current status
    pub status: BookingStatus,
    /// Assigned provider, set iff status is `Assigned` or `InProgress`
    pub provider_id: Option<ProviderId>,
    /// Display name of the assigned provider at assignment time
    pub provider_name: Option<String>,
    /// Assignment misses and provider rejections so far
    pub retry_count: u32,
    /// Retry ceiling captured at creation
    pub max_retries: u32,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Last transition time
    pub updated_at: DateTime<Utc>,
    /// Set when the booking reaches `Completed`
    pub completed_at: Option<DateTime<Utc>>,
    /// Who cancelled, set only on cancellation
    pub cancelled_by: Option<Actor>,
    /// Why it was cancelled, set only on cancellation
    pub cancellation_reason: Option<String>,
}

impl Booking {
    /// Builds a pending booking from an already validated request
    #[must_use]
    pub fn from_request(
        id: BookingId,
        request: NewBooking,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let customer_name = request
            .customer_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| GUEST_CUSTOMER_NAME.to_string());

        Self {
            id,
            service: ServiceType::new(&request.service),
            address: request.address,
            customer_name,
            customer_phone: request.customer_phone.unwrap_or_default(),
            scheduled_time: request.scheduled_time.unwrap_or(now),
            status: BookingStatus::Pending,
            provider_id: None,
            provider_name: None,
            retry_count: 0,
            max_retries,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_by: None,
            cancellation_reason: None,
        }
    }

    /// Whether the retry ceiling has been reached
    #[must_use]
    pub const fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Whether `provider_id` is the provider assigned to this booking
    #[must_use]
    pub fn is_assigned_to(&self, provider_id: &ProviderId) -> bool {
        self.provider_id.as_ref() == Some(provider_id)
    }
}

// ============================================================================
// Audit events
// ============================================================================

/// An immutable record of one status transition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    /// Event identifier
    pub id: EventId,
    /// Booking the event documents
    pub booking_id: BookingId,
    /// Position in the log, assigned on append
    pub sequence: u64,
    /// Status before the transition (`None` for creation)
    pub old_status: Option<BookingStatus>,
    /// Status after the transition
    pub new_status: BookingStatus,
    /// Who caused it
    pub actor: Actor,
    /// Human-readable reason
    pub reason: String,
    /// Extra context
    pub metadata: Metadata,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_matches_lifecycle() {
        use BookingStatus as S;

        let allowed = |op: Operation| -> Vec<BookingStatus> {
            S::ALL.into_iter().filter(|s| op.permits(*s)).collect()
        };

        assert_eq!(allowed(Operation::Create), Vec::<BookingStatus>::new());
        assert_eq!(allowed(Operation::Assign), vec![S::Pending]);
        assert_eq!(allowed(Operation::Accept), vec![S::Assigned]);
        assert_eq!(allowed(Operation::Reject), vec![S::Assigned]);
        assert_eq!(allowed(Operation::Complete), vec![S::InProgress]);
        assert_eq!(
            allowed(Operation::Cancel),
            vec![S::Pending, S::Assigned, S::InProgress, S::Failed, S::NoShow]
        );
        assert_eq!(allowed(Operation::NoShow), vec![S::Assigned, S::InProgress]);
        assert_eq!(allowed(Operation::Retry), vec![S::Pending, S::Failed]);
        assert_eq!(allowed(Operation::Override), S::ALL.to_vec());
    }

    #[test]
    fn test_status_round_trips_through_wire_name() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().ok(), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_lists_valid_names() {
        let err = "DONE".parse::<BookingStatus>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("DONE"));
        assert!(message.contains("IN_PROGRESS"));
        assert!(message.contains("NO_SHOW"));
    }

    #[test]
    fn test_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&BookingStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn test_service_type_is_normalized() {
        assert_eq!(ServiceType::new("  Plumbing ").as_str(), "plumbing");
        let parsed: ServiceType = serde_json::from_str("\"ELECTRICAL\"").unwrap();
        assert_eq!(parsed.as_str(), "electrical");
    }

    #[test]
    fn test_empty_capability_list_is_unrestricted() {
        let empty: [&str; 0] = [];
        assert_eq!(Capabilities::restricted(empty), Capabilities::Unrestricted);
        assert!(Capabilities::Unrestricted.admits(&ServiceType::new("roofing")));
    }

    #[test]
    fn test_restricted_capabilities_only_admit_listed_services() {
        let caps = Capabilities::restricted(["Plumbing", "electrical"]);
        assert!(caps.admits(&ServiceType::new("plumbing")));
        assert!(!caps.admits(&ServiceType::new("cleaning")));
    }

    #[test]
    fn test_capabilities_json_shape() {
        let caps = Capabilities::restricted(["plumbing"]);
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"mode": "restricted", "serviceTypes": ["plumbing"]})
        );
        let unrestricted = serde_json::to_value(Capabilities::Unrestricted).unwrap();
        assert_eq!(unrestricted, serde_json::json!({"mode": "unrestricted"}));
    }

    #[test]
    fn test_new_booking_requires_service_and_address() {
        assert!(NewBooking::new("plumbing", "12 Main St").validate().is_ok());
        assert!(NewBooking::new("", "12 Main St").validate().is_err());
        assert!(NewBooking::new("plumbing", "   ").validate().is_err());
    }

    #[test]
    fn test_booking_defaults_customer_details() {
        let now = Utc::now();
        let booking = Booking::from_request(
            BookingId::new("b1"),
            NewBooking::new("Plumbing", "12 Main St"),
            3,
            now,
        );
        assert_eq!(booking.customer_name, GUEST_CUSTOMER_NAME);
        assert_eq!(booking.customer_phone, "");
        assert_eq!(booking.scheduled_time, now);
        assert_eq!(booking.service.as_str(), "plumbing");
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.retry_count, 0);
    }

    #[test]
    fn test_actor_parsing_is_case_insensitive() {
        assert_eq!("provider".parse::<Actor>().ok(), Some(Actor::Provider));
        assert!("robot".parse::<Actor>().is_err());
    }
}
