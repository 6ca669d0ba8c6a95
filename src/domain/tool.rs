//! Tool-call domain model
//!
//! The speech model can request named function calls mid-conversation.
//! Each tool is declared with a JSON-schema parameter block and a
//! backend describing how the call is carried out. Outcomes are data,
//! never errors: a failed call flows back into the conversation as a
//! structured failure so the agent can recover verbally.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::shared::Result;

/// How a tool call is carried out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ToolBackend {
    /// POST the arguments to a tenant-supplied webhook
    Webhook { url: String },
    /// Call a generic HTTP API with the given method
    Api { method: String, url: String },
    /// Dispatch to a handler registered in this process
    Builtin,
}

/// A tool the speech model may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema for the arguments object
    pub parameters: Value,
    pub backend: ToolBackend,
    /// Per-tool timeout override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// One requested call, as decoded from the model's function-call frame
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
    /// The model's id for this call, echoed back with the output
    pub upstream_call_id: String,
}

/// Result of a tool call, success or structured failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Booking reference in the result payload, if the tool returned one.
    pub fn booking_ref(&self) -> Option<&str> {
        let result = self.result.as_ref()?;
        result
            .get("bookingId")
            .or_else(|| result.get("booking_id"))
            .and_then(Value::as_str)
    }
}

/// In-process tool implementation
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, arguments: &Value) -> Result<Value>;
}
