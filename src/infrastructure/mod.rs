//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Wire protocols spoken on the two websocket legs
//! - The relay bridge joining them
//! - External service integrations (carrier REST API, tool endpoints)

pub mod bridge;
pub mod provider;
pub mod streams;
pub mod tools;
