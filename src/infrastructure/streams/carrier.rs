//! Carrier media-stream protocol
//!
//! JSON frames exchanged with the telephony carrier's media websocket.
//! Field names follow the carrier's camelCase wire format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Frames arriving from (and sent to) the carrier socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierFrame {
    /// Handshake frame sent once after connect
    Connected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    /// Stream metadata, sent once before any media
    Start {
        #[serde(rename = "streamSid", default, skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        start: StartMeta,
    },
    /// One chunk of caller audio, or agent audio when outbound
    Media {
        #[serde(rename = "streamSid", default, skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
    /// End of the stream
    Stop {
        #[serde(rename = "streamSid", default, skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop: Option<StopMeta>,
    },
    #[serde(other)]
    Unknown,
}

impl CarrierFrame {
    /// Agent audio wrapped for the carrier, addressed to one stream.
    pub fn outbound_media(stream_sid: &str, payload: String) -> Self {
        CarrierFrame::Media {
            stream_sid: Some(stream_sid.to_string()),
            media: MediaPayload { payload },
        }
    }
}

/// Metadata of a starting stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMeta {
    pub stream_sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<String>,
    /// Free-form parameters attached by the dashboard's call wiring
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_parameters: HashMap<String, String>,
}

impl StartMeta {
    pub fn tenant_id(&self) -> Option<&str> {
        self.custom_parameters.get("tenantId").map(String::as_str)
    }

    pub fn caller(&self) -> Option<&str> {
        self.custom_parameters.get("from").map(String::as_str)
    }
}

/// Base64 audio payload. Opaque to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

/// Trailing metadata on a stop frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_frame() {
        let json = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZ123",
            "start": {
                "streamSid": "MZ123",
                "accountSid": "AC999",
                "callSid": "CA777",
                "tracks": ["inbound"],
                "customParameters": {"tenantId": "t1", "from": "+15550100"}
            }
        }"#;

        let frame: CarrierFrame = serde_json::from_str(json).unwrap();
        match frame {
            CarrierFrame::Start { start, .. } => {
                assert_eq!(start.stream_sid, "MZ123");
                assert_eq!(start.tenant_id(), Some("t1"));
                assert_eq!(start.caller(), Some("+15550100"));
            }
            other => panic!("expected start frame, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_start_without_custom_parameters() {
        let json = r#"{"event":"start","start":{"streamSid":"MZ1"}}"#;
        let frame: CarrierFrame = serde_json::from_str(json).unwrap();
        match frame {
            CarrierFrame::Start { start, .. } => {
                assert_eq!(start.tenant_id(), None);
                assert!(start.custom_parameters.is_empty());
            }
            other => panic!("expected start frame, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_media_ignores_extra_fields() {
        let json = r#"{
            "event": "media",
            "streamSid": "MZ123",
            "media": {"track": "inbound", "chunk": "4", "timestamp": "80", "payload": "AAAA"}
        }"#;

        let frame: CarrierFrame = serde_json::from_str(json).unwrap();
        match frame {
            CarrierFrame::Media { media, .. } => assert_eq!(media.payload, "AAAA"),
            other => panic!("expected media frame, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_minimal_stop() {
        let frame: CarrierFrame = serde_json::from_str(r#"{"event":"stop"}"#).unwrap();
        assert!(matches!(frame, CarrierFrame::Stop { .. }));
    }

    #[test]
    fn test_unknown_event_is_tolerated() {
        let frame: CarrierFrame =
            serde_json::from_str(r#"{"event":"mark","mark":{"name":"beep"}}"#).unwrap();
        assert!(matches!(frame, CarrierFrame::Unknown));
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        assert!(serde_json::from_str::<CarrierFrame>("{\"event\":").is_err());
        assert!(serde_json::from_str::<CarrierFrame>(r#"{"no_event":true}"#).is_err());
    }

    #[test]
    fn test_outbound_media_wire_shape() {
        let frame = CarrierFrame::outbound_media("MZ123", "c29tZSBhdWRpbw==".to_string());
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "media",
                "streamSid": "MZ123",
                "media": {"payload": "c29tZSBhdWRpbw=="}
            })
        );
    }
}
