//! Call API handlers

use super::dto::{ApiResponse, CallListResponse, CallResponse, DialRequest, DialResponse};
use super::hub::NotificationHub;
use crate::domain::registry::{CallRegistry, CallStatusView};
use crate::domain::session::{CallDirection, CallStatus};
use crate::domain::shared::{DomainError, TenantId};
use crate::domain::tenant::TenantDirectory;
use crate::infrastructure::bridge::RelayBridge;
use crate::infrastructure::provider::CarrierClient;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{error, info};

/// Shared state handed to every API handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CallRegistry>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub provider: Arc<CarrierClient>,
    pub hub: Arc<NotificationHub>,
    pub bridge: Arc<RelayBridge>,
    pub started_at: SystemTime,
}

/// Query parameters for listing calls
#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    pub tenant_id: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

/// Place an outbound call through the telephony provider
pub async fn dial_call(
    State(state): State<AppState>,
    Json(request): Json<DialRequest>,
) -> Result<Json<ApiResponse<DialResponse>>, StatusCode> {
    info!(
        "API: Dialing {} (tenant: {})",
        request.to,
        request.tenant_id.as_deref().unwrap_or("-")
    );

    if request.to.trim().is_empty() {
        return Ok(Json(ApiResponse::error(
            "destination number is required".to_string(),
        )));
    }

    let provider_sid = match state.provider.originate(&request.to).await {
        Ok(sid) => sid,
        Err(e) => {
            error!("API: Failed to originate call: {}", e);
            return Ok(Json(ApiResponse::error(e.to_string())));
        }
    };

    let tenant_id = request.tenant_id.map(TenantId::new);
    let call_sid = state.registry.record_call(
        tenant_id,
        request.from.clone(),
        Some(request.to.clone()),
        CallDirection::Outbound,
    );
    if let Err(e) = state.registry.set_provider_sid(&call_sid, provider_sid.clone()) {
        error!("API: Failed to attach provider sid: {}", e);
    }

    Ok(Json(ApiResponse::success(DialResponse {
        call_sid: call_sid.to_string(),
        provider_sid,
        status: "initiated".to_string(),
    })))
}

/// List call records, newest first
pub async fn list_calls(
    State(state): State<AppState>,
    Query(query): Query<ListCallsQuery>,
) -> Result<Json<ApiResponse<CallListResponse>>, StatusCode> {
    info!(
        "API: Listing calls (tenant: {})",
        query.tenant_id.as_deref().unwrap_or("all")
    );

    let tenant = query.tenant_id.map(TenantId::new);
    let mut records = state.registry.get_logs(tenant.as_ref());

    if let Some(ref status_str) = query.status {
        let status = match status_str.as_str() {
            "initiated" => Some(CallStatus::Initiated),
            "in_progress" => Some(CallStatus::InProgress),
            "completed" => Some(CallStatus::Completed),
            "failed" => Some(CallStatus::Failed),
            _ => None,
        };
        if let Some(status) = status {
            records.retain(|r| r.status == status);
        }
    }

    let total = records.len();
    let calls: Vec<CallResponse> = records
        .into_iter()
        .take(query.limit)
        .map(|r| r.into())
        .collect();

    Ok(Json(ApiResponse::success(CallListResponse { calls, total })))
}

/// Query parameters for a status lookup
#[derive(Debug, Deserialize)]
pub struct CallStatusQuery {
    pub tenant_id: Option<String>,
}

/// Get the status of one call, falling back to the provider for
/// identifiers the relay never saw
pub async fn get_call_status(
    State(state): State<AppState>,
    Path(call_sid): Path<String>,
    Query(query): Query<CallStatusQuery>,
) -> Result<Json<ApiResponse<CallStatusView>>, StatusCode> {
    info!("API: Getting status for call {}", call_sid);

    let tenant = query.tenant_id.map(TenantId::new);
    match state.registry.get_status(&call_sid, tenant.as_ref()).await {
        Ok(view) => Ok(Json(ApiResponse::success(view))),
        Err(DomainError::NotFound(_)) => Ok(Json(ApiResponse::error(format!(
            "Call {} not found",
            call_sid
        )))),
        Err(e) => {
            error!("API: Failed to get call status: {}", e);
            Ok(Json(ApiResponse::error(e.to_string())))
        }
    }
}
