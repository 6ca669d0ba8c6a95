//! Media relay bridge
//!
//! Joins one carrier media socket to one realtime speech socket and
//! shuttles frames between them for the lifetime of a call.

pub mod relay;
pub mod transport;

pub use relay::{RelayBridge, RelaySettings, SessionEventSink};
pub use transport::{
    CarrierSocket, MediaTransport, RealtimeConnector, SpeechSocket, TransportError,
    UpstreamConnector,
};
