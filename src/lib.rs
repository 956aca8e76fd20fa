//! College transport booking: an HTTP/JSON service that owns the seat and
//! one-time-code rules, and the student-facing client that talks to it.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod otp;
pub mod services;
pub mod state;

pub use error::{FieldErrors, ServiceError};
pub use state::AppState;
