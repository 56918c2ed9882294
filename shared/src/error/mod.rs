//! Unified error codes for the storefront
//!
//! - [`ErrorCode`]: Standardized numeric codes for every failure the client can surface
//! - [`ErrorCategory`]: Classification of codes by domain
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Restaurant errors
//! - 4xxx: Order errors
//! - 5xxx: Notification errors
//! - 6xxx: Realtime errors
//! - 9xxx: System errors

mod category;
mod codes;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
