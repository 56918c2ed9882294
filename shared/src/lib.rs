//! Shared types for the vendor storefront
//!
//! Domain models, the order status machine, change-feed event types and the
//! unified error codes used by both `store-client` and `store-app`.

pub mod error;
pub mod models;
pub mod realtime;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ErrorCategory, ErrorCode};
pub use models::{
    NewNotification, Notification, Order, OrderItem, OrderPatch, OrderStatus, Restaurant,
    UserType, VendorProfile, VendorUser,
};
pub use realtime::{ChangeEvent, ChangeFilter, ChangeKind};
