//! Store Client - backend access for the vendor storefront
//!
//! Talks to the hosted auth, data and realtime APIs, or to an in-memory
//! stand-in with the same behaviour.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod orders;
pub mod query;
pub mod realtime;
pub mod service;
pub mod session;

pub use auth::VendorAuth;
pub use client::StoreClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpService;
pub use memory::MemoryService;
pub use orders::{MutationOutcome, NotificationOutcome, OrderClient, OrderCommand};
pub use realtime::{OrderSubscriptions, SocketChangeFeed, Subscription};
pub use service::{AuthService, AuthSession, AuthUser, ChangeFeed, ChangeStream, DataService};
pub use session::{SessionStore, SessionStoreError};

// Re-export shared types for convenience
pub use shared::{Order, OrderPatch, OrderStatus, Restaurant, VendorProfile, VendorUser};
