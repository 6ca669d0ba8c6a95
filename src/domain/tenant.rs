//! Tenant voice profiles
//!
//! Each tenant configures how their concierge answers: the agent
//! instructions, the synthesis voice, and an optional greeting line.
//! The directory trait is the seam where the dashboard's tenant store
//! plugs in; the in-memory implementation is seeded from configuration.

use crate::domain::shared::{Result, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-tenant voice agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantVoiceProfile {
    pub tenant_id: TenantId,
    pub name: String,
    /// Agent instructions injected into the speech session
    pub instructions: String,
    /// Synthesis voice override
    #[serde(default)]
    pub voice: Option<String>,
    /// Opening line the agent should lead with
    #[serde(default)]
    pub greeting: Option<String>,
}

/// Lookup seam for tenant profiles
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find(&self, tenant_id: &TenantId) -> Result<Option<TenantVoiceProfile>>;

    /// Number of known tenants
    async fn count(&self) -> usize;
}

/// Directory backed by profiles from the config file
pub struct InMemoryTenantDirectory {
    profiles: HashMap<TenantId, TenantVoiceProfile>,
}

impl InMemoryTenantDirectory {
    pub fn from_profiles(profiles: Vec<TenantVoiceProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|p| (p.tenant_id.clone(), p))
            .collect();
        Self { profiles }
    }

    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }
}

#[async_trait::async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find(&self, tenant_id: &TenantId) -> Result<Option<TenantVoiceProfile>> {
        Ok(self.profiles.get(tenant_id).cloned())
    }

    async fn count(&self) -> usize {
        self.profiles.len()
    }
}
