/// System health reporting
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use super::calls_handler::AppState;
use crate::domain::session::CallStatus;

/// Call activity snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHealth {
    pub active_calls: usize,
    pub total_calls: usize,
    pub completed_calls: usize,
    pub failed_calls: usize,
    pub failure_rate_percent: f64,
}

/// Notification hub snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubHealth {
    pub open_rooms: usize,
}

/// Telephony provider snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub mock_mode: bool,
}

/// Tenant configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantHealth {
    pub configured: usize,
}

/// Complete system health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: String, // "healthy", "degraded", "unhealthy"
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub calls: CallHealth,
    pub hub: HubHealth,
    pub provider: ProviderHealth,
    pub tenants: TenantHealth,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl SystemHealth {
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        Self {
            status: "healthy".to_string(),
            timestamp: now,
            uptime_seconds: 0,
            calls: CallHealth {
                active_calls: 0,
                total_calls: 0,
                completed_calls: 0,
                failed_calls: 0,
                failure_rate_percent: 0.0,
            },
            hub: HubHealth { open_rooms: 0 },
            provider: ProviderHealth { mock_mode: false },
            tenants: TenantHealth { configured: 0 },
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Check overall health status
    pub fn check_health(&mut self) {
        self.warnings.clear();
        self.errors.clear();

        // Check call failure rate
        if self.calls.total_calls > 0 {
            let failure_rate =
                (self.calls.failed_calls as f64 / self.calls.total_calls as f64) * 100.0;
            self.calls.failure_rate_percent = failure_rate;
            if failure_rate > 10.0 {
                self.warnings
                    .push(format!("High call failure rate: {:.1}%", failure_rate));
            }
            if failure_rate > 25.0 {
                self.errors
                    .push(format!("Critical call failure rate: {:.1}%", failure_rate));
            }
        }

        // A mock provider answers dial requests without placing calls
        if self.provider.mock_mode {
            self.warnings
                .push("Telephony provider is in mock mode".to_string());
        }

        if self.tenants.configured == 0 {
            self.warnings
                .push("No tenant voice profiles configured".to_string());
        }

        // Update overall status
        self.status = if !self.errors.is_empty() {
            "unhealthy".to_string()
        } else if !self.warnings.is_empty() {
            "degraded".to_string()
        } else {
            "healthy".to_string()
        };
    }
}

impl Default for SystemHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Get detailed system health
pub async fn get_system_health(State(state): State<AppState>) -> impl IntoResponse {
    info!("Fetching system health");

    let mut health = SystemHealth::new();
    health.uptime_seconds = state.started_at.elapsed().unwrap_or_default().as_secs();

    health.calls.active_calls = state.registry.active_count();
    health.calls.total_calls = state.registry.total_count();
    health.calls.completed_calls = state.registry.count_by_status(CallStatus::Completed);
    health.calls.failed_calls = state.registry.count_by_status(CallStatus::Failed);

    health.hub.open_rooms = state.hub.room_count();
    health.provider.mock_mode = state.provider.is_mock();
    health.tenants.configured = state.tenants.count().await;

    health.check_health();

    (StatusCode::OK, Json(health)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_health_creation() {
        let health = SystemHealth::new();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.warnings.len(), 0);
        assert_eq!(health.errors.len(), 0);
    }

    #[test]
    fn test_health_check_warns_on_failure_rate() {
        let mut health = SystemHealth::new();
        health.tenants.configured = 2;
        health.calls.total_calls = 20;
        health.calls.completed_calls = 17;
        health.calls.failed_calls = 3;
        health.check_health();

        assert_eq!(health.status, "degraded");
        assert!(health.warnings.len() > 0);
        assert!(health.errors.is_empty());
    }

    #[test]
    fn test_health_check_errors_on_critical_failure_rate() {
        let mut health = SystemHealth::new();
        health.tenants.configured = 2;
        health.calls.total_calls = 10;
        health.calls.completed_calls = 6;
        health.calls.failed_calls = 4;
        health.check_health();

        assert_eq!(health.status, "unhealthy");
        assert!(health.errors.len() > 0);
    }

    #[test]
    fn test_health_check_flags_mock_provider() {
        let mut health = SystemHealth::new();
        health.tenants.configured = 1;
        health.provider.mock_mode = true;
        health.check_health();

        assert_eq!(health.status, "degraded");
        assert!(health
            .warnings
            .iter()
            .any(|w| w.contains("mock")));
    }

    #[test]
    fn test_health_check_clean_instance_is_healthy() {
        let mut health = SystemHealth::new();
        health.tenants.configured = 3;
        health.calls.total_calls = 5;
        health.calls.completed_calls = 5;
        health.check_health();

        assert_eq!(health.status, "healthy");
    }
}
