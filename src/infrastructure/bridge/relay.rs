//! Relay session loop
//!
//! One `RelayBridge::run` call owns one call: it dials the speech
//! endpoint, configures the session in two phases (generic first,
//! tenant refinement once the carrier `start` frame names a tenant),
//! then shuttles audio until either side closes, a transport fails, or
//! the idle watchdog fires.

use super::transport::{MediaTransport, TransportError, UpstreamConnector};
use crate::domain::registry::CallRegistry;
use crate::domain::session::{CallDirection, CallRecord};
use crate::domain::shared::{CallSid, StreamSid, TenantId};
use crate::domain::tenant::TenantDirectory;
use crate::domain::tool::{ToolInvocation, ToolOutcome};
use crate::infrastructure::streams::carrier::{CarrierFrame, StartMeta};
use crate::infrastructure::streams::decoded_audio_len;
use crate::infrastructure::streams::speech::{
    ConversationItem, SessionConfig, SpeechCommand, SpeechFrame, ToolSchema,
};
use crate::infrastructure::tools::ToolExecutor;
use metrics::{counter, gauge, histogram};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Listener for session lifecycle announcements. The dashboard
/// notification hub implements this on the interface side.
#[async_trait::async_trait]
pub trait SessionEventSink: Send + Sync {
    async fn session_started(&self, record: &CallRecord);
    async fn session_ended(&self, record: &CallRecord);
}

/// Tunables for relay sessions
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Watchdog window; any socket frame resets it
    pub idle_timeout: Duration,
    /// Agent prompt used until a tenant profile refines it
    pub default_instructions: String,
    pub default_voice: String,
    pub temperature: f32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(90),
            default_instructions:
                "You are a friendly phone assistant answering a call for a business. \
                 Keep replies short and conversational."
                    .to_string(),
            default_voice: "alloy".to_string(),
            temperature: 0.8,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Carrier sent a `stop` frame
    CleanStop,
    /// Carrier socket closed without a `stop`
    DownstreamClosed,
    /// Speech socket closed
    UpstreamClosed,
    /// Either socket reported an error
    TransportFailed,
    /// Watchdog fired
    IdleTimeout,
}

impl SessionEnd {
    fn is_clean(&self) -> bool {
        matches!(
            self,
            SessionEnd::CleanStop | SessionEnd::DownstreamClosed | SessionEnd::UpstreamClosed
        )
    }

    fn reason(&self) -> &'static str {
        match self {
            SessionEnd::CleanStop => "stream stop",
            SessionEnd::DownstreamClosed => "caller hangup",
            SessionEnd::UpstreamClosed => "assistant closed",
            SessionEnd::TransportFailed => "transport failure",
            SessionEnd::IdleTimeout => "idle timeout",
        }
    }
}

/// Per-call state gathered while the session runs
#[derive(Default)]
struct LiveSession {
    call_sid: Option<CallSid>,
    stream_sid: Option<StreamSid>,
    tenant_id: Option<TenantId>,
    media_seen: bool,
}

/// What woke the session loop up
enum Wake {
    Carrier(Option<Result<String, TransportError>>),
    Speech(Option<Result<String, TransportError>>),
    Tool(String, ToolOutcome),
    Idle,
}

/// Bidirectional relay between one carrier stream and one speech session
pub struct RelayBridge {
    registry: Arc<CallRegistry>,
    tenants: Arc<dyn TenantDirectory>,
    tools: Arc<ToolExecutor>,
    events: Arc<dyn SessionEventSink>,
    connector: Arc<dyn UpstreamConnector>,
    settings: RelaySettings,
}

impl RelayBridge {
    pub fn new(
        registry: Arc<CallRegistry>,
        tenants: Arc<dyn TenantDirectory>,
        tools: Arc<ToolExecutor>,
        events: Arc<dyn SessionEventSink>,
        connector: Arc<dyn UpstreamConnector>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            registry,
            tenants,
            tools,
            events,
            connector,
            settings,
        }
    }

    /// Drive one call to completion. Consumes the carrier socket; both
    /// legs are closed by the time this returns.
    pub async fn run<D: MediaTransport>(&self, mut downstream: D) {
        counter!("relay_sessions_total").increment(1);

        let mut upstream = match self.connector.connect().await {
            Ok(socket) => socket,
            Err(err) => {
                warn!("dropping carrier socket, speech endpoint unreachable: {}", err);
                downstream.close().await;
                return;
            }
        };

        gauge!("relay_active_sessions").increment(1.0);

        let baseline = SpeechCommand::SessionUpdate {
            session: SessionConfig::baseline(
                &self.settings.default_instructions,
                &self.settings.default_voice,
                self.settings.temperature,
                self.tool_schemas(),
            ),
        };

        let mut session = LiveSession::default();
        let end = match self.send_upstream(&mut upstream, &baseline).await {
            Ok(()) => self.pump(&mut downstream, &mut upstream, &mut session).await,
            Err(err) => {
                warn!("could not configure speech session: {}", err);
                SessionEnd::TransportFailed
            }
        };

        downstream.close().await;
        upstream.close().await;
        gauge!("relay_active_sessions").decrement(1.0);

        self.finish(&session, end).await;
    }

    async fn pump<D, U>(
        &self,
        downstream: &mut D,
        upstream: &mut U,
        session: &mut LiveSession,
    ) -> SessionEnd
    where
        D: MediaTransport,
        U: MediaTransport,
    {
        let (tool_tx, mut tool_rx) = mpsc::channel::<(String, ToolOutcome)>(8);
        let idle = sleep(self.settings.idle_timeout);
        tokio::pin!(idle);

        loop {
            let wake = tokio::select! {
                frame = downstream.recv() => Wake::Carrier(frame),
                frame = upstream.recv() => Wake::Speech(frame),
                Some((call_id, outcome)) = tool_rx.recv() => Wake::Tool(call_id, outcome),
                () = &mut idle => Wake::Idle,
            };

            match wake {
                Wake::Carrier(frame) => {
                    idle.as_mut().reset(Instant::now() + self.settings.idle_timeout);
                    match frame {
                        None => {
                            info!(call_sid = ?session.call_sid, "carrier closed the media stream");
                            return SessionEnd::DownstreamClosed;
                        }
                        Some(Err(err)) => {
                            warn!("carrier socket error: {}", err);
                            return SessionEnd::TransportFailed;
                        }
                        Some(Ok(text)) => {
                            match self.on_carrier_frame(&text, upstream, session).await {
                                Ok(Some(end)) => return end,
                                Ok(None) => {}
                                Err(err) => {
                                    warn!("speech socket send failed: {}", err);
                                    return SessionEnd::TransportFailed;
                                }
                            }
                        }
                    }
                }
                Wake::Speech(frame) => {
                    idle.as_mut().reset(Instant::now() + self.settings.idle_timeout);
                    match frame {
                        None => {
                            info!(call_sid = ?session.call_sid, "speech service closed the session");
                            return SessionEnd::UpstreamClosed;
                        }
                        Some(Err(err)) => {
                            warn!("speech socket error: {}", err);
                            return SessionEnd::TransportFailed;
                        }
                        Some(Ok(text)) => {
                            match self.on_speech_frame(&text, downstream, session, &tool_tx).await {
                                Ok(()) => {}
                                Err(err) => {
                                    warn!("carrier socket send failed: {}", err);
                                    return SessionEnd::TransportFailed;
                                }
                            }
                        }
                    }
                }
                Wake::Tool(call_id, outcome) => {
                    if let Err(err) = self.on_tool_outcome(call_id, outcome, upstream, session).await
                    {
                        warn!("could not return tool result to the model: {}", err);
                        return SessionEnd::TransportFailed;
                    }
                }
                Wake::Idle => {
                    warn!(
                        call_sid = ?session.call_sid,
                        timeout_secs = self.settings.idle_timeout.as_secs(),
                        "no traffic inside the idle window, closing both legs"
                    );
                    return SessionEnd::IdleTimeout;
                }
            }
        }
    }

    async fn on_carrier_frame<U: MediaTransport>(
        &self,
        text: &str,
        upstream: &mut U,
        session: &mut LiveSession,
    ) -> Result<Option<SessionEnd>, TransportError> {
        let frame = match serde_json::from_str::<CarrierFrame>(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("dropping malformed carrier frame: {}", err);
                counter!("relay_frames_dropped_total").increment(1);
                return Ok(None);
            }
        };

        match frame {
            CarrierFrame::Connected { protocol, .. } => {
                debug!(?protocol, "carrier handshake");
                Ok(None)
            }
            CarrierFrame::Start { start, .. } => {
                self.on_stream_start(start, upstream, session).await?;
                Ok(None)
            }
            CarrierFrame::Media { media, .. } => {
                if !session.media_seen {
                    session.media_seen = true;
                    if let Some(call_sid) = &session.call_sid {
                        if let Err(err) = self.registry.mark_in_progress(call_sid) {
                            warn!("could not mark call in progress: {}", err);
                        }
                    }
                }
                counter!("relay_frames_forwarded_total", "direction" => "inbound").increment(1);
                counter!("relay_audio_bytes_total", "direction" => "inbound")
                    .increment(decoded_audio_len(&media.payload) as u64);
                self.send_upstream(
                    upstream,
                    &SpeechCommand::InputAudioAppend {
                        audio: media.payload,
                    },
                )
                .await?;
                Ok(None)
            }
            CarrierFrame::Stop { .. } => {
                info!(call_sid = ?session.call_sid, "carrier ended the stream");
                Ok(Some(SessionEnd::CleanStop))
            }
            CarrierFrame::Unknown => {
                debug!("ignoring unrecognized carrier event");
                counter!("relay_frames_dropped_total").increment(1);
                Ok(None)
            }
        }
    }

    async fn on_stream_start<U: MediaTransport>(
        &self,
        start: StartMeta,
        upstream: &mut U,
        session: &mut LiveSession,
    ) -> Result<(), TransportError> {
        let tenant_id = start.tenant_id().map(TenantId::new);
        let caller = start.caller().map(str::to_string);
        let stream_sid = StreamSid::new(start.stream_sid);

        let call_sid =
            self.registry
                .record_call(tenant_id.clone(), caller, None, CallDirection::Inbound);
        if let Err(err) = self.registry.attach_stream(&call_sid, stream_sid.clone()) {
            warn!("could not attach stream to call record: {}", err);
        }

        info!(
            %call_sid,
            stream_sid = %stream_sid,
            tenant_id = tenant_id.as_ref().map(|t| t.as_str()).unwrap_or("-"),
            "media stream started"
        );

        session.call_sid = Some(call_sid);
        session.stream_sid = Some(stream_sid);
        session.tenant_id = tenant_id.clone();

        if let Some(tenant_id) = tenant_id {
            let refinement = self.tenant_refinement(&tenant_id).await;
            self.send_upstream(
                upstream,
                &SpeechCommand::SessionUpdate {
                    session: refinement,
                },
            )
            .await?;
        }

        if let Some(record) = self.registry.find(&call_sid) {
            self.events.session_started(&record).await;
        }
        Ok(())
    }

    /// Tenant override for the second `session.update`. An unknown or
    /// unreachable tenant keeps the call going on the default prompt.
    async fn tenant_refinement(&self, tenant_id: &TenantId) -> SessionConfig {
        match self.tenants.find(tenant_id).await {
            Ok(Some(profile)) => {
                let instructions = match profile.greeting {
                    Some(greeting) => format!(
                        "{}\nOpen the call with: \"{}\"",
                        profile.instructions, greeting
                    ),
                    None => profile.instructions,
                };
                SessionConfig::refinement(instructions, profile.voice)
            }
            Ok(None) => {
                warn!(tenant_id = %tenant_id, "unknown tenant on stream start, keeping default prompt");
                SessionConfig::refinement(self.settings.default_instructions.clone(), None)
            }
            Err(err) => {
                warn!(tenant_id = %tenant_id, "tenant lookup failed ({}), keeping default prompt", err);
                SessionConfig::refinement(self.settings.default_instructions.clone(), None)
            }
        }
    }

    async fn on_speech_frame<D: MediaTransport>(
        &self,
        text: &str,
        downstream: &mut D,
        session: &mut LiveSession,
        tool_tx: &mpsc::Sender<(String, ToolOutcome)>,
    ) -> Result<(), TransportError> {
        let frame = match serde_json::from_str::<SpeechFrame>(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("dropping malformed speech frame: {}", err);
                counter!("relay_frames_dropped_total").increment(1);
                return Ok(());
            }
        };

        match frame {
            SpeechFrame::AudioDelta { delta, .. } => match &session.stream_sid {
                Some(stream_sid) => {
                    counter!("relay_frames_forwarded_total", "direction" => "outbound")
                        .increment(1);
                    counter!("relay_audio_bytes_total", "direction" => "outbound")
                        .increment(decoded_audio_len(&delta) as u64);
                    let frame = CarrierFrame::outbound_media(stream_sid.as_str(), delta);
                    let text = serde_json::to_string(&frame)
                        .map_err(|err| TransportError::Encode(err.to_string()))?;
                    downstream.send_text(text).await
                }
                None => {
                    debug!("dropping agent audio, no carrier stream yet");
                    counter!("relay_frames_dropped_total").increment(1);
                    Ok(())
                }
            },
            SpeechFrame::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => {
                self.dispatch_tool(call_id, name, arguments, tool_tx, session);
                Ok(())
            }
            SpeechFrame::TranscriptDone { transcript } => {
                info!(call_sid = ?session.call_sid, transcript = %transcript, "agent turn finished");
                Ok(())
            }
            SpeechFrame::ServerError { error } => {
                warn!(?error, "speech service reported an error");
                Ok(())
            }
            SpeechFrame::SessionCreated
            | SpeechFrame::SessionUpdated
            | SpeechFrame::ResponseDone => {
                debug!("speech session event");
                Ok(())
            }
            SpeechFrame::Unknown => {
                debug!("ignoring unrecognized speech event");
                Ok(())
            }
        }
    }

    /// Run the tool off the session loop; the outcome re-enters the
    /// loop through the tool channel.
    fn dispatch_tool(
        &self,
        call_id: String,
        name: String,
        arguments: String,
        tool_tx: &mpsc::Sender<(String, ToolOutcome)>,
        session: &LiveSession,
    ) {
        let arguments = match serde_json::from_str::<Value>(&arguments) {
            Ok(value) => value,
            Err(err) => {
                warn!(tool = %name, "unparseable tool arguments: {}", err);
                let _ = tool_tx.try_send((
                    call_id,
                    ToolOutcome::failure("arguments were not valid JSON"),
                ));
                return;
            }
        };

        info!(call_sid = ?session.call_sid, tool = %name, "model requested a tool call");
        let invocation = ToolInvocation {
            name,
            arguments,
            upstream_call_id: call_id,
        };
        let executor = self.tools.clone();
        let tx = tool_tx.clone();
        tokio::spawn(async move {
            let outcome = executor.execute(&invocation).await;
            let _ = tx.send((invocation.upstream_call_id, outcome)).await;
        });
    }

    async fn on_tool_outcome<U: MediaTransport>(
        &self,
        call_id: String,
        outcome: ToolOutcome,
        upstream: &mut U,
        session: &LiveSession,
    ) -> Result<(), TransportError> {
        let label = if outcome.success { "success" } else { "failure" };
        counter!("tool_invocations_total", "outcome" => label).increment(1);

        if outcome.success {
            if let (Some(call_sid), Some(reference)) = (&session.call_sid, outcome.booking_ref()) {
                if let Err(err) = self.registry.link_booking(call_sid, reference.to_string()) {
                    warn!("could not link booking to call: {}", err);
                }
            }
        }

        let item = ConversationItem::function_call_output(&call_id, &outcome);
        self.send_upstream(upstream, &SpeechCommand::ItemCreate { item })
            .await?;
        self.send_upstream(upstream, &SpeechCommand::ResponseCreate)
            .await
    }

    async fn send_upstream<U: MediaTransport>(
        &self,
        upstream: &mut U,
        command: &SpeechCommand,
    ) -> Result<(), TransportError> {
        let text = serde_json::to_string(command)
            .map_err(|err| TransportError::Encode(err.to_string()))?;
        upstream.send_text(text).await
    }

    fn tool_schemas(&self) -> Option<Vec<ToolSchema>> {
        let definitions = self.tools.definitions();
        if definitions.is_empty() {
            None
        } else {
            Some(definitions.iter().map(ToolSchema::from).collect())
        }
    }

    async fn finish(&self, session: &LiveSession, end: SessionEnd) {
        let call_sid = match &session.call_sid {
            Some(sid) => sid,
            None => {
                debug!("relay session ended before any stream start ({})", end.reason());
                return;
            }
        };

        let result = if end.is_clean() {
            self.registry.mark_completed(call_sid)
        } else {
            self.registry.mark_failed(call_sid, end.reason())
        };
        if let Err(err) = result {
            warn!("could not finalize call record: {}", err);
        }

        if let Some(record) = self.registry.find(call_sid) {
            histogram!("call_duration_seconds").record(record.duration_seconds() as f64);
            info!(
                %call_sid,
                status = record.status.as_str(),
                reason = end.reason(),
                duration_secs = record.duration_seconds(),
                "relay session finished"
            );
            self.events.session_ended(&record).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_ends() {
        assert!(SessionEnd::CleanStop.is_clean());
        assert!(SessionEnd::DownstreamClosed.is_clean());
        assert!(SessionEnd::UpstreamClosed.is_clean());
        assert!(!SessionEnd::TransportFailed.is_clean());
        assert!(!SessionEnd::IdleTimeout.is_clean());
    }

    #[test]
    fn test_end_reasons_are_stable() {
        assert_eq!(SessionEnd::IdleTimeout.reason(), "idle timeout");
        assert_eq!(SessionEnd::CleanStop.reason(), "stream stop");
    }

    #[test]
    fn test_default_settings() {
        let settings = RelaySettings::default();
        assert_eq!(settings.idle_timeout, Duration::from_secs(90));
        assert_eq!(settings.default_voice, "alloy");
        assert!(!settings.default_instructions.is_empty());
    }
}
