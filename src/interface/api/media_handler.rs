//! Carrier media stream WebSocket handler
//!
//! The telephony provider opens one socket per live call and streams
//! audio frames over it. Each upgrade hands the socket to the relay
//! bridge, which owns it for the life of the call.

use super::calls_handler::AppState;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tracing::info;

use crate::infrastructure::bridge::CarrierSocket;

/// WebSocket upgrade handler for `GET /media-stream`
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_media_socket(socket, state))
}

async fn handle_media_socket(socket: WebSocket, state: AppState) {
    info!("Carrier media stream connected");
    state.bridge.run(CarrierSocket::new(socket)).await;
    info!("Carrier media stream closed");
}
