//! Tool execution boundary
//!
//! Named functions the speech model may call mid-conversation. Tools
//! are declared in config with a JSON schema and a backend; the
//! executor turns every failure mode (unknown tool, HTTP error,
//! non-2xx, timeout, handler error) into a structured outcome so the
//! conversation keeps going.

use crate::domain::shared::{DomainError, Result};
use crate::domain::tool::{ToolBackend, ToolDefinition, ToolHandler, ToolInvocation, ToolOutcome};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runs declared tools on behalf of relay sessions
pub struct ToolExecutor {
    definitions: Vec<ToolDefinition>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    client: reqwest::Client,
}

impl ToolExecutor {
    pub fn new(definitions: Vec<ToolDefinition>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| DomainError::Internal(format!("http client init failed: {}", err)))?;
        Ok(Self {
            definitions,
            handlers: HashMap::new(),
            client,
        })
    }

    /// Plug an in-process implementation behind a `builtin` tool.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Declared tools, in config order.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Run one invocation to a structured outcome. Never raises; the
    /// model gets `{success:false, error}` and the call continues.
    pub async fn execute(&self, invocation: &ToolInvocation) -> ToolOutcome {
        let definition = match self.definitions.iter().find(|d| d.name == invocation.name) {
            Some(definition) => definition,
            None => {
                warn!(tool = %invocation.name, "model requested an undeclared tool");
                return ToolOutcome::failure(format!("unknown tool: {}", invocation.name));
            }
        };

        let timeout = Duration::from_secs(definition.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let work = self.run_backend(definition, &invocation.arguments);
        match tokio::time::timeout(timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    tool = %definition.name,
                    timeout_secs = timeout.as_secs(),
                    "tool call timed out"
                );
                ToolOutcome::failure(format!("tool timed out after {}s", timeout.as_secs()))
            }
        }
    }

    async fn run_backend(&self, definition: &ToolDefinition, arguments: &Value) -> ToolOutcome {
        match &definition.backend {
            ToolBackend::Webhook { url } => self.call_http("POST", url, definition, arguments).await,
            ToolBackend::Api { method, url } => {
                self.call_http(method, url, definition, arguments).await
            }
            ToolBackend::Builtin => match self.handlers.get(&definition.name) {
                Some(handler) => match handler.handle(arguments).await {
                    Ok(result) => ToolOutcome::ok(result),
                    Err(err) => ToolOutcome::failure(err.to_string()),
                },
                None => {
                    warn!(tool = %definition.name, "builtin tool has no registered handler");
                    ToolOutcome::failure(format!("no handler registered for {}", definition.name))
                }
            },
        }
    }

    async fn call_http(
        &self,
        method: &str,
        url: &str,
        definition: &ToolDefinition,
        arguments: &Value,
    ) -> ToolOutcome {
        let method = match reqwest::Method::from_bytes(method.to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => return ToolOutcome::failure(format!("unsupported method: {}", method)),
        };

        debug!(tool = %definition.name, %url, "calling tool endpoint");
        let request = self.client.request(method.clone(), url);
        let request = if method == reqwest::Method::GET {
            request.query(&flatten_query(arguments))
        } else {
            request.json(arguments)
        };

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(result) => ToolOutcome::ok(result),
                    Err(err) => ToolOutcome::failure(format!("unreadable tool response: {}", err)),
                }
            }
            Ok(response) => {
                ToolOutcome::failure(format!("tool endpoint returned {}", response.status()))
            }
            Err(err) => ToolOutcome::failure(format!("tool request failed: {}", err)),
        }
    }
}

/// GET backends receive the arguments as query parameters.
fn flatten_query(arguments: &Value) -> Vec<(String, String)> {
    match arguments.as_object() {
        Some(map) => map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect(),
        None => Vec::new(),
    }
}
