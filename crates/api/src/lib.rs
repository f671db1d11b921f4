// API crate clippy configuration
#![allow(clippy::single_match)] // Clearer in some cases
#![allow(clippy::needless_borrows_for_generic_args)] // Sometimes needed for clarity
// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Payroll API Library
//!
//! Authentication and abuse-control surface of the payroll backend: token
//! issuance and verification, logout/revocation, sessions, login rate
//! limiting, brute-force lockout and password reset.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
