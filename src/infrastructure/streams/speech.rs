//! Speech-model realtime protocol
//!
//! JSON frames exchanged with the realtime speech endpoint. Inbound
//! frames are `type`-tagged events; only the handful the relay acts on
//! are modeled, everything else decodes as `Unknown` and is ignored.

use crate::domain::tool::{ToolDefinition, ToolOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events arriving from the speech model
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum SpeechFrame {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    /// One chunk of synthesized agent audio
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        delta: String,
        #[serde(default)]
        item_id: Option<String>,
    },
    /// Full transcript of a finished agent turn
    #[serde(rename = "response.audio_transcript.done")]
    TranscriptDone { transcript: String },
    /// The model wants a tool call; arguments arrive as a JSON string
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(rename = "response.done")]
    ResponseDone,
    #[serde(rename = "error")]
    ServerError {
        #[serde(default)]
        error: Option<ErrorDetail>,
    },
    #[serde(other)]
    Unknown,
}

/// Error payload attached to a model `error` frame
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Commands the relay sends to the speech model
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SpeechCommand {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend { audio: String },
    #[serde(rename = "conversation.item.create")]
    ItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate,
}

/// Session parameters. Every field is optional so an update can carry
/// only the keys it intends to change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,
}

impl SessionConfig {
    /// Full session setup sent once when the upstream socket opens.
    /// Telephony audio is 8 kHz mu-law in both directions.
    pub fn baseline(
        instructions: &str,
        voice: &str,
        temperature: f32,
        tools: Option<Vec<ToolSchema>>,
    ) -> Self {
        Self {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: Some(instructions.to_string()),
            voice: Some(voice.to_string()),
            input_audio_format: Some("g711_ulaw".to_string()),
            output_audio_format: Some("g711_ulaw".to_string()),
            turn_detection: Some(TurnDetection::server_vad()),
            temperature: Some(temperature),
            tools,
        }
    }

    /// Narrow tenant update: only the keys the tenant overrides.
    pub fn refinement(instructions: String, voice: Option<String>) -> Self {
        Self {
            instructions: Some(instructions),
            voice,
            ..Self::default()
        }
    }
}

/// Voice-activity turn detection
#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

impl TurnDetection {
    pub fn server_vad() -> Self {
        Self {
            kind: "server_vad".to_string(),
        }
    }
}

/// Tool declaration in the model's function schema format
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDefinition> for ToolSchema {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            kind: "function".to_string(),
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.parameters.clone(),
        }
    }
}

/// Conversation items the relay creates
#[derive(Debug, Clone, Serialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub call_id: String,
    pub output: String,
}

impl ConversationItem {
    /// Tool result handed back to the model, outcome encoded as JSON.
    pub fn function_call_output(call_id: &str, outcome: &ToolOutcome) -> Self {
        let output = serde_json::to_string(outcome)
            .unwrap_or_else(|_| r#"{"success":false,"error":"unencodable result"}"#.to_string());
        Self {
            kind: "function_call_output".to_string(),
            call_id: call_id.to_string(),
            output,
        }
    }
}
