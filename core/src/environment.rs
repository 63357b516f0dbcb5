//! Environment module - Dependency injection traits
//!
//! The state machine never reads the wall clock or mints ids on its own.
//! Both come in through [`BookingEnvironment`] so tests can pin them down.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use fieldserve_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let earlier = clock.now();
/// assert!(clock.now() >= earlier);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of collision-free opaque identifiers
pub trait IdGenerator: Send + Sync {
    /// Produce a fresh id
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Environment dependencies for the booking state machine
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Clock for booking and event timestamps
    pub clock: Arc<dyn Clock>,
    /// Generator for booking and event ids
    pub ids: Arc<dyn IdGenerator>,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }

    /// System clock and random UUIDs
    #[must_use]
    pub fn production() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(UuidGenerator))
    }
}

impl std::fmt::Debug for BookingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEnvironment").finish_non_exhaustive()
    }
}
