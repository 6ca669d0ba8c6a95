//! Room-scoped notification fan-out
//!
//! Dashboard clients join rooms keyed `user:{id}` and `tenant:{id}` when
//! their socket authenticates. Publishing to a room is fire-and-forget
//! broadcast; nobody listening means the notification is dropped, and the
//! room itself is reclaimed the next time a publish finds it dead.

use crate::domain::session::CallRecord;
use crate::domain::shared::{TenantId, UserId};
use crate::infrastructure::bridge::SessionEventSink;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Per-room broadcast buffer. Slow dashboards lag rather than block.
const ROOM_BUFFER: usize = 64;

/// Notification severity shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One dashboard notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            link: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Frame pushed to connected dashboard sockets
#[derive(Debug, Clone, Serialize)]
pub struct HubEvent {
    pub event: String,
    pub data: Value,
}

impl HubEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn notification(notification: &Notification) -> Self {
        let data = serde_json::to_value(notification).unwrap_or(Value::Null);
        Self::new("notification:new", data)
    }
}

/// In-process notification hub
pub struct NotificationHub {
    rooms: Mutex<HashMap<String, broadcast::Sender<HubEvent>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn user_room(user_id: &UserId) -> String {
        format!("user:{}", user_id)
    }

    fn tenant_room(tenant_id: &TenantId) -> String {
        format!("tenant:{}", tenant_id)
    }

    /// Join a room, creating it on first use.
    fn join(&self, room: &str) -> broadcast::Receiver<HubEvent> {
        let mut rooms = self.rooms.lock().unwrap();
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_BUFFER).0)
            .subscribe()
    }

    pub fn join_user(&self, user_id: &UserId) -> broadcast::Receiver<HubEvent> {
        self.join(&Self::user_room(user_id))
    }

    pub fn join_tenant(&self, tenant_id: &TenantId) -> broadcast::Receiver<HubEvent> {
        self.join(&Self::tenant_room(tenant_id))
    }

    /// Publish to one room. Returns the number of sockets that received
    /// the event; a missing room delivers to nobody, and a room whose
    /// last subscriber has hung up is removed on the spot.
    fn publish(&self, room: &str, event: HubEvent) -> usize {
        let mut rooms = self.rooms.lock().unwrap();
        let delivered = match rooms.get(room) {
            Some(tx) => match tx.send(event) {
                Ok(count) => count,
                Err(_) => {
                    rooms.remove(room);
                    0
                }
            },
            None => 0,
        };

        counter!("hub_notifications_published_total").increment(1);
        debug!(room, delivered, "hub publish");
        delivered
    }

    pub fn publish_to_user(&self, user_id: &UserId, event: HubEvent) -> usize {
        self.publish(&Self::user_room(user_id), event)
    }

    pub fn publish_to_tenant(&self, tenant_id: &TenantId, event: HubEvent) -> usize {
        self.publish(&Self::tenant_room(tenant_id), event)
    }

    /// Rooms currently held open by at least one subscriber.
    pub fn room_count(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionEventSink for NotificationHub {
    async fn session_started(&self, record: &CallRecord) {
        if let Some(tenant_id) = &record.tenant_id {
            let event = HubEvent::new(
                "call:started",
                json!({
                    "callSid": record.call_sid.to_string(),
                    "from": record.caller,
                    "direction": record.direction.as_str(),
                    "startedAt": record.started_at,
                }),
            );
            self.publish_to_tenant(tenant_id, event);
        }
    }

    async fn session_ended(&self, record: &CallRecord) {
        if let Some(tenant_id) = &record.tenant_id {
            let event = HubEvent::new(
                "call:completed",
                json!({
                    "callSid": record.call_sid.to_string(),
                    "status": record.status.as_str(),
                    "durationSeconds": record.duration_seconds(),
                    "bookingRef": record.booking_ref,
                }),
            );
            self.publish_to_tenant(tenant_id, event);
        }
    }
}
