//! Interface layer - External interfaces (API, WebSocket, etc.)
//!
//! This layer handles:
//! - REST API endpoints
//! - WebSocket connections for carrier media and dashboard notifications
//! - Request/response formatting

pub mod api;
