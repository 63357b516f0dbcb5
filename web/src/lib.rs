//! HTTP shell around the Fieldserve booking state machine.
//!
//! Handlers are thin: parse the request, call one
//! [`BookingStateMachine`](fieldserve_core::BookingStateMachine) operation,
//! and map the result or [`BookingError`](fieldserve_core::BookingError)
//! into a response.
//!
//! # Status Codes
//!
//! | Error                   | Status |
//! |-------------------------|--------|
//! | `Validation`            | 400    |
//! | `InvalidTransition`     | 400    |
//! | `AuthorizationMismatch` | 403    |
//! | `NotFound`              | 404    |
//! | `NoProviderAvailable`   | 503    |
//!
//! # Example
//!
//! ```no_run
//! use fieldserve_core::BookingStateMachine;
//! use fieldserve_web::{AppState, build_router};
//!
//! # async fn run() -> std::io::Result<()> {
//! let state = AppState::new(BookingStateMachine::builder().build());
//! let app = build_router(state, "/api");
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:4000").await?;
//! axum::serve(listener, app).await
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod telemetry;

// Re-export key types for convenience
pub use config::Config;
pub use error::AppError;
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
