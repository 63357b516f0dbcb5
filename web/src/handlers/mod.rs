//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by resource.

pub mod bookings;
pub mod events;
pub mod health;
pub mod providers;

// Re-export common handler utilities
pub use health::{health_check, metrics};
