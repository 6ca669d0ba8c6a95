//! Call session domain model
//!
//! A session record captures one call attempt through the relay for
//! dashboards and status lookups. Records live in memory only.

use crate::domain::shared::{CallSid, DomainError, Result, StreamSid, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Carrier-originated media stream into the relay
    Inbound,
    /// Call placed through the provider API
    Outbound,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Inbound => "inbound",
            CallDirection::Outbound => "outbound",
        }
    }
}

/// Call session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Session recorded, no media yet
    Initiated,
    /// Media is flowing through the relay
    InProgress,
    /// Session ended cleanly
    Completed,
    /// Transport failure or watchdog kill
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Initiated => "initiated",
            CallStatus::InProgress => "in_progress",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::Failed)
    }
}

/// One call attempt tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_sid: CallSid,
    pub tenant_id: Option<TenantId>,
    pub caller: Option<String>,
    pub callee: Option<String>,
    pub direction: CallDirection,
    pub status: CallStatus,

    /// Carrier stream attached once the media socket starts
    pub stream_sid: Option<StreamSid>,
    /// Provider-side identifier for outbound calls
    pub provider_sid: Option<String>,
    /// Reference captured from a successful booking tool call
    pub booking_ref: Option<String>,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
}

impl CallRecord {
    pub fn new(
        tenant_id: Option<TenantId>,
        caller: Option<String>,
        callee: Option<String>,
        direction: CallDirection,
    ) -> Self {
        Self {
            call_sid: CallSid::new(),
            tenant_id,
            caller,
            callee,
            direction,
            status: CallStatus::Initiated,
            stream_sid: None,
            provider_sid: None,
            booking_ref: None,
            started_at: Utc::now(),
            ended_at: None,
            end_reason: None,
        }
    }

    /// Mark the first media frame. Idempotent while the call is live.
    pub fn mark_in_progress(&mut self) -> Result<()> {
        match self.status {
            CallStatus::Initiated => {
                self.status = CallStatus::InProgress;
                Ok(())
            }
            CallStatus::InProgress => Ok(()),
            other => Err(DomainError::InvalidStateTransition(format!(
                "cannot start media on a {} call",
                other.as_str()
            ))),
        }
    }

    /// Mark a clean end of the session.
    pub fn mark_completed(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition(format!(
                "call already ended as {}",
                self.status.as_str()
            )));
        }
        self.status = CallStatus::Completed;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Mark a failed end of the session.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition(format!(
                "call already ended as {}",
                self.status.as_str()
            )));
        }
        self.status = CallStatus::Failed;
        self.ended_at = Some(Utc::now());
        self.end_reason = Some(reason.into());
        Ok(())
    }

    /// Seconds between start and end, or start and now for live calls.
    pub fn duration_seconds(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0)
    }
}
