//! Call API DTOs

use crate::domain::session::CallRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Call record response
#[derive(Debug, Serialize, Deserialize)]
pub struct CallResponse {
    pub call_sid: String,
    pub tenant_id: Option<String>,
    pub caller: Option<String>,
    pub callee: Option<String>,
    pub direction: String,
    pub status: String,
    pub stream_sid: Option<String>,
    pub provider_sid: Option<String>,
    pub booking_ref: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    /// Elapsed seconds; still ticking for live calls
    pub duration_seconds: i64,
}

impl From<CallRecord> for CallResponse {
    fn from(record: CallRecord) -> Self {
        let duration_seconds = record.duration_seconds();
        CallResponse {
            call_sid: record.call_sid.to_string(),
            tenant_id: record.tenant_id.map(|t| t.to_string()),
            caller: record.caller,
            callee: record.callee,
            direction: record.direction.as_str().to_string(),
            status: record.status.as_str().to_string(),
            stream_sid: record.stream_sid.map(|s| s.to_string()),
            provider_sid: record.provider_sid,
            booking_ref: record.booking_ref,
            started_at: record.started_at,
            ended_at: record.ended_at,
            end_reason: record.end_reason,
            duration_seconds,
        }
    }
}

/// Call list response
#[derive(Debug, Serialize, Deserialize)]
pub struct CallListResponse {
    pub calls: Vec<CallResponse>,
    pub total: usize,
}

/// Outbound dial request
#[derive(Debug, Deserialize)]
pub struct DialRequest {
    /// E.164 destination number
    pub to: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
}

/// Outbound dial response
#[derive(Debug, Serialize, Deserialize)]
pub struct DialResponse {
    pub call_sid: String,
    pub provider_sid: String,
    pub status: String,
}
