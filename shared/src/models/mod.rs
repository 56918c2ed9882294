//! Data models
//!
//! Rows of the hosted data service as the storefront reads them. Embedded
//! relations (customer, items, rider) are optional so the same types serve
//! both joined queries and raw change-feed records.

pub mod notification;
pub mod order;
pub mod restaurant;
pub mod user;

// Re-exports
pub use notification::*;
pub use order::*;
pub use restaurant::*;
pub use user::*;
