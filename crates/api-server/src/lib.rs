#![warn(clippy::unwrap_used)]

pub mod rest;
pub mod server;

pub use rest::{AppState, NotificationKind};
pub use server::{auction_router, notification_router, ApiServer};
