//! Domain layer - Core business logic and rules
//!
//! This layer contains:
//! - Entities: Call sessions with a validated lifecycle
//! - Value Objects: Typed identifiers shared across contexts
//! - Domain Services: The call registry and its fallback chain
//! - Repository Interfaces: Ports for tenant and provider lookups

pub mod auth;
pub mod registry;
pub mod session;
pub mod shared;
pub mod tenant;
pub mod tool;

// Re-export commonly used types
pub use shared::{DomainError, Result};
