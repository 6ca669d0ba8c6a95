//! Dashboard notification WebSocket handler

use super::hub::{HubEvent, NotificationHub};
use crate::domain::auth::TokenVerifier;
use crate::domain::shared::{TenantId, UserId};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use metrics::gauge;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// How far a slow dashboard may fall behind before frames are shed
const OUTBOUND_BUFFER: usize = 64;

/// Shared state for the notification socket route
#[derive(Clone)]
pub struct WsState {
    pub hub: Arc<NotificationHub>,
    pub verifier: Arc<TokenVerifier>,
}

/// Lifecycle of one dashboard connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPhase {
    Connecting,
    Authenticated {
        user_id: UserId,
        tenant_id: Option<TenantId>,
    },
    Anonymous,
    /// Rooms are joined; zero rooms for anonymous connections
    JoinedRooms {
        rooms: usize,
    },
    Disconnected,
}

impl ClientPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ClientPhase::Authenticated { .. })
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Decide what a client may hear based on its token. A bad or missing
/// token is not an error; the socket stays open but joins no rooms.
fn authenticate(verifier: &TokenVerifier, token: Option<&str>) -> ClientPhase {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return ClientPhase::Anonymous,
    };

    match verifier.verify(token) {
        Ok(claims) => ClientPhase::Authenticated {
            user_id: UserId::new(claims.sub),
            tenant_id: claims.tenant_id.map(TenantId::new),
        },
        Err(e) => {
            warn!("Dashboard socket token rejected: {}", e);
            ClientPhase::Anonymous
        }
    }
}

/// WebSocket upgrade handler for `GET /ws?token=...`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<WsState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

/// Handle an individual dashboard connection
async fn handle_socket(socket: WebSocket, state: WsState, token: Option<String>) {
    let mut phase = ClientPhase::Connecting;
    debug!(?phase, "Dashboard client connecting");

    phase = authenticate(&state.verifier, token.as_deref());

    // Join rooms before the hello frame so no notification published
    // after the handshake can be missed.
    let mut room_rxs: Vec<broadcast::Receiver<HubEvent>> = Vec::new();
    match &phase {
        ClientPhase::Authenticated { user_id, tenant_id } => {
            room_rxs.push(state.hub.join_user(user_id));
            if let Some(tenant_id) = tenant_id {
                room_rxs.push(state.hub.join_tenant(tenant_id));
            }
            info!(user_id = %user_id, "Dashboard client authenticated");
        }
        _ => {
            info!("Dashboard client connected anonymously");
        }
    }
    let authenticated = phase.is_authenticated();
    phase = ClientPhase::JoinedRooms {
        rooms: room_rxs.len(),
    };
    debug!(?phase, "Dashboard client ready");

    gauge!("hub_connected_clients").increment(1.0);

    let (mut sender, mut receiver) = socket.split();

    // Greet the client so it can tell whether its token was honored
    let hello = HubEvent::new("hello", json!({ "authenticated": authenticated }));
    if let Ok(text) = serde_json::to_string(&hello) {
        if sender.send(Message::Text(text)).await.is_err() {
            gauge!("hub_connected_clients").decrement(1.0);
            return;
        }
    }

    // Funnel every joined room into one outbound queue
    let (out_tx, mut out_rx) = mpsc::channel::<HubEvent>(OUTBOUND_BUFFER);
    let mut forwarders = Vec::new();
    for mut room_rx in room_rxs {
        let out_tx = out_tx.clone();
        forwarders.push(tokio::spawn(async move {
            loop {
                match room_rx.recv().await {
                    Ok(event) => {
                        if out_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Dashboard client lagging, notifications dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }
    drop(out_tx);

    // Push hub events out to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        debug!("Dashboard client send failed, closing");
                        return;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize hub event: {}", e);
                }
            }
        }
        // Anonymous sockets have no rooms; hold the connection open
        // anyway until the client hangs up.
        std::future::pending::<()>().await;
    });

    // Drain the client side; everything except close is ignored
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!("Ignoring dashboard client message: {}", text);
                }
                Message::Close(_) => {
                    debug!("Dashboard client requested close");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
            }
        }
    });

    // Wait for either task to finish, then clean up the other
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }

    phase = ClientPhase::Disconnected;
    gauge!("hub_connected_clients").decrement(1.0);
    debug!(?phase, "Dashboard client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auth::Claims;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(secret: &str, sub: &str, tenant_id: Option<&str>) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            tenant_id: tenant_id.map(|t| t.to_string()),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_authenticates() {
        let verifier = TokenVerifier::new("secret");
        let token = mint("secret", "user-7", Some("acme"));

        let phase = authenticate(&verifier, Some(&token));
        match phase {
            ClientPhase::Authenticated { user_id, tenant_id } => {
                assert_eq!(user_id.as_str(), "user-7");
                assert_eq!(tenant_id.unwrap().as_str(), "acme");
            }
            other => panic!("expected authenticated phase, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_token_is_anonymous() {
        let verifier = TokenVerifier::new("secret");
        assert_eq!(authenticate(&verifier, None), ClientPhase::Anonymous);
        assert_eq!(authenticate(&verifier, Some("")), ClientPhase::Anonymous);
    }

    #[test]
    fn test_bad_token_is_anonymous_not_fatal() {
        let verifier = TokenVerifier::new("secret");
        let forged = mint("other-secret", "user-7", None);
        assert_eq!(
            authenticate(&verifier, Some(&forged)),
            ClientPhase::Anonymous
        );
    }

    #[test]
    fn test_disabled_verifier_keeps_everyone_anonymous() {
        let verifier = TokenVerifier::new("");
        let token = mint("secret", "user-7", None);
        assert_eq!(
            authenticate(&verifier, Some(&token)),
            ClientPhase::Anonymous
        );
    }
}
