//! Authentication module for the bus tracking server
//!
//! Signup and login, opaque session tokens, bearer extraction with role
//! checks, and login rate limiting.

pub mod extractor;
pub mod handlers;
mod rate_limit;
mod service;
pub mod validation;

pub use extractor::{AuthenticatedUser, DriverUser, ParentUser, StaffUser, StudentUser};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use service::AuthService;
