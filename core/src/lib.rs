//! # Fieldserve Core
//!
//! Booking lifecycle and provider assignment for a home-services marketplace.
//!
//! A customer submits a booking for a service at an address. The system
//! matches it to an available provider with the right capability, the provider
//! accepts or rejects, and the job ends completed, cancelled, failed, or as a
//! no-show. Every status change is appended to an audit log.
//!
//! ## Layout
//!
//! - [`types`]: ids, statuses, actors, providers, bookings, events
//! - [`reducer`]: the pure transition table `(booking, command) -> transition`
//! - [`machine`]: applies transitions atomically against the stores
//! - [`registry`], [`store`], [`event_log`]: the three stores behind traits
//! - [`assignment`]: first-available provider matching
//! - [`retry`]: retry ceiling and revive behaviour
//! - [`environment`]: injected clock and id generator
//!
//! ## Architecture
//!
//! - Functional core: [`reducer::BookingReducer`] performs no I/O
//! - Imperative shell: [`machine::BookingStateMachine`] owns all mutation
//! - Dependency injection via [`environment::BookingEnvironment`]
//!
//! ## Example
//!
//! ```
//! use fieldserve_core::machine::BookingStateMachine;
//! use fieldserve_core::registry::{default_roster, InMemoryProviderRegistry};
//! use fieldserve_core::types::{BookingStatus, NewBooking};
//!
//! # fn main() -> Result<(), fieldserve_core::BookingError> {
//! let machine = BookingStateMachine::builder()
//!     .providers(InMemoryProviderRegistry::with_providers(default_roster()))
//!     .build();
//!
//! let booking = machine.create(NewBooking::new("electrical", "7 Park Lane"))?;
//! let booking = machine.assign(&booking.id)?;
//! let Some(provider) = booking.provider_id.clone() else {
//!     return Ok(());
//! };
//! let booking = machine.accept(&booking.id, &provider)?;
//! let booking = machine.complete(&booking.id)?;
//!
//! assert_eq!(booking.status, BookingStatus::Completed);
//! assert_eq!(machine.timeline(&booking.id).len(), 4);
//! # Ok(())
//! # }
//! ```

pub mod assignment;
pub mod environment;
pub mod error;
pub mod event_log;
pub mod machine;
pub mod reducer;
pub mod registry;
pub mod retry;
pub mod store;
pub mod types;

pub use error::{BookingError, Result};
pub use machine::{BookingStateMachine, LedgerSnapshot};
pub use types::{
    Actor, Booking, BookingEvent, BookingId, BookingStatus, NewBooking, Operation, Provider,
    ProviderId, ServiceType,
};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
