//! Call session registry
//!
//! An append-only, in-memory log of every call attempt seen by the
//! relay. Records are never removed; terminal updates mutate them in
//! place. Status lookups consult the local log first and fall back to
//! the telephony provider for calls this process never saw.

use crate::domain::session::{CallDirection, CallRecord, CallStatus};
use crate::domain::shared::{CallSid, DomainError, Result, StreamSid, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Call status as reported by the remote provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCallStatus {
    pub sid: String,
    pub status: String,
    pub duration_seconds: Option<i64>,
}

/// Remote lookup seam for calls not present in the local log
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProviderStatusLookup: Send + Sync {
    async fn fetch_status(&self, call_sid: &str) -> Result<Option<RemoteCallStatus>>;
}

/// Where a status answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    Registry,
    Provider,
}

/// Answer for a status query, from either source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStatusView {
    pub call_sid: String,
    pub status: String,
    pub source: StatusSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<CallDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_ref: Option<String>,
}

impl CallStatusView {
    fn from_record(record: &CallRecord) -> Self {
        Self {
            call_sid: record.call_sid.to_string(),
            status: record.status.as_str().to_string(),
            source: StatusSource::Registry,
            tenant_id: record.tenant_id.clone(),
            caller: record.caller.clone(),
            direction: Some(record.direction),
            duration_seconds: Some(record.duration_seconds()),
            started_at: Some(record.started_at),
            booking_ref: record.booking_ref.clone(),
        }
    }

    fn from_remote(remote: RemoteCallStatus) -> Self {
        Self {
            call_sid: remote.sid,
            status: remote.status,
            source: StatusSource::Provider,
            tenant_id: None,
            caller: None,
            direction: None,
            duration_seconds: remote.duration_seconds,
            started_at: None,
            booking_ref: None,
        }
    }
}

/// In-memory call log with a provider fallback for status queries
pub struct CallRegistry {
    records: Mutex<Vec<CallRecord>>,
    provider: Arc<dyn ProviderStatusLookup>,
}

impl CallRegistry {
    pub fn new(provider: Arc<dyn ProviderStatusLookup>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            provider,
        }
    }

    /// Append a new call record and return its sid.
    pub fn record_call(
        &self,
        tenant_id: Option<TenantId>,
        caller: Option<String>,
        callee: Option<String>,
        direction: CallDirection,
    ) -> CallSid {
        let record = CallRecord::new(tenant_id, caller, callee, direction);
        let sid = record.call_sid;
        self.records.lock().unwrap().push(record);
        sid
    }

    /// Attach the carrier stream id once the media socket has started.
    pub fn attach_stream(&self, call_sid: &CallSid, stream_sid: StreamSid) -> Result<()> {
        self.with_record(call_sid, |record| {
            record.stream_sid = Some(stream_sid);
            Ok(())
        })
    }

    /// Remember the provider-side sid for an outbound call.
    pub fn set_provider_sid(&self, call_sid: &CallSid, provider_sid: String) -> Result<()> {
        self.with_record(call_sid, |record| {
            record.provider_sid = Some(provider_sid);
            Ok(())
        })
    }

    pub fn mark_in_progress(&self, call_sid: &CallSid) -> Result<()> {
        self.with_record(call_sid, |record| record.mark_in_progress())
    }

    pub fn mark_completed(&self, call_sid: &CallSid) -> Result<()> {
        self.with_record(call_sid, |record| record.mark_completed())
    }

    pub fn mark_failed(&self, call_sid: &CallSid, reason: &str) -> Result<()> {
        self.with_record(call_sid, |record| record.mark_failed(reason))
    }

    /// Link a booking reference returned by a successful tool call.
    pub fn link_booking(&self, call_sid: &CallSid, reference: String) -> Result<()> {
        self.with_record(call_sid, |record| {
            record.booking_ref = Some(reference);
            Ok(())
        })
    }

    /// Snapshot of a single record, if this process has seen the call.
    pub fn find(&self, call_sid: &CallSid) -> Option<CallRecord> {
        let records = self.records.lock().unwrap();
        records.iter().find(|r| r.call_sid == *call_sid).cloned()
    }

    /// Scan the log, optionally scoped to one tenant, newest first.
    pub fn get_logs(&self, tenant: Option<&TenantId>) -> Vec<CallRecord> {
        let records = self.records.lock().unwrap();
        let mut logs: Vec<CallRecord> = records
            .iter()
            .filter(|r| match tenant {
                Some(t) => r.tenant_id.as_ref() == Some(t),
                None => true,
            })
            .cloned()
            .collect();
        logs.reverse();
        logs
    }

    /// Resolve one call's status: local record first, provider second.
    pub async fn get_status(
        &self,
        call_sid: &str,
        tenant: Option<&TenantId>,
    ) -> Result<CallStatusView> {
        let local = {
            let records = self.records.lock().unwrap();
            records
                .iter()
                .filter(|r| match tenant {
                    Some(t) => r.tenant_id.as_ref() == Some(t),
                    None => true,
                })
                .find(|r| {
                    r.call_sid.to_string() == call_sid
                        || r.provider_sid.as_deref() == Some(call_sid)
                })
                .map(CallStatusView::from_record)
        };

        if let Some(view) = local {
            return Ok(view);
        }

        match self.provider.fetch_status(call_sid).await? {
            Some(remote) => Ok(CallStatusView::from_remote(remote)),
            None => Err(DomainError::NotFound(format!("call {}", call_sid))),
        }
    }

    /// Number of calls that have not reached a terminal status.
    pub fn active_count(&self) -> usize {
        let records = self.records.lock().unwrap();
        records.iter().filter(|r| !r.status.is_terminal()).count()
    }

    pub fn total_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Count of records currently in the given status.
    pub fn count_by_status(&self, status: CallStatus) -> usize {
        let records = self.records.lock().unwrap();
        records.iter().filter(|r| r.status == status).count()
    }

    fn with_record<F>(&self, call_sid: &CallSid, f: F) -> Result<()>
    where
        F: FnOnce(&mut CallRecord) -> Result<()>,
    {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.call_sid == *call_sid) {
            Some(record) => f(record),
            None => Err(DomainError::NotFound(format!("call {}", call_sid))),
        }
    }
}
