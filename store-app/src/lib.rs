//! Vendor storefront application
//!
//! Login flow, live order dashboard, text rendering and the offline demo
//! backend. The `vendor-store` binary wires these to a terminal.

pub mod alerts;
pub mod config;
pub mod dashboard;
pub mod demo;
pub mod logger;
pub mod login;
pub mod render;
pub mod watch;

pub use alerts::{Alert, AlertKind, AlertSender};
pub use config::AppConfig;
pub use dashboard::{Dashboard, DashboardError, DashboardState, Phase};
pub use login::{LoginError, LoginFlow, Route, startup_route};
pub use watch::WatchCommand;
