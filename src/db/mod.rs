//! Database module for the bus tracking server
//!
//! Row models, the `TrackingStore` data-access trait and its MySQL
//! implementation. Schema lives in `migrations/`.

pub mod models;
pub mod operations;
pub mod store;

pub use models::{Role, User, UserProfile, UserSession};
pub use operations::DbOperations;
pub use store::TrackingStore;

#[cfg(test)]
pub use store::MockTrackingStore;
