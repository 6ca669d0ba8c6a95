//! Switchboard - realtime voice concierge gateway
//!
//! Bridges carrier media streams to a realtime speech model over
//! websockets, keeps an in-memory log of call sessions, and fans
//! dashboard notifications out to connected clients.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
