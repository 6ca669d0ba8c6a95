//! Notification publish API handler

use super::calls_handler::AppState;
use super::dto::ApiResponse;
use super::hub::{HubEvent, Notification, Severity};
use crate::domain::shared::{TenantId, UserId};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Publish request; exactly one recipient field must be set
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub link: Option<String>,
}

fn default_severity() -> Severity {
    Severity::Info
}

/// Publish response
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    /// How many connected sockets received the notification
    pub delivered: usize,
}

/// Push a notification into a user or tenant room. Publishing to a room
/// nobody has joined succeeds with zero deliveries.
pub async fn publish_notification(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<ApiResponse<PublishResponse>>, StatusCode> {
    info!("API: Publishing notification '{}'", request.title);

    let mut notification = Notification::new(request.title, request.message, request.severity);
    if let Some(link) = request.link {
        notification = notification.with_link(link);
    }
    let event = HubEvent::notification(&notification);

    let delivered = match (request.user_id, request.tenant_id) {
        (Some(user_id), None) => state.hub.publish_to_user(&UserId::new(user_id), event),
        (None, Some(tenant_id)) => state
            .hub
            .publish_to_tenant(&TenantId::new(tenant_id), event),
        _ => {
            return Ok(Json(ApiResponse::error(
                "exactly one of user_id or tenant_id is required".to_string(),
            )));
        }
    };

    Ok(Json(ApiResponse::success(PublishResponse { delivered })))
}
