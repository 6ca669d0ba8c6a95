//! API interface implementations

pub mod calls_handler;
pub mod dto;
pub mod hub;
pub mod media_handler;
pub mod metrics_handler;
pub mod monitoring;
pub mod notifications_handler;
pub mod router;
pub mod ws_handler;

pub use calls_handler::AppState;
pub use hub::{HubEvent, Notification, NotificationHub, Severity};
pub use metrics_handler::init_metrics;
pub use monitoring::SystemHealth;
pub use router::build_router;
pub use ws_handler::WsState;
