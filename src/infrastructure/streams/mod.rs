//! Wire protocols spoken by the relay
//!
//! Both sides of the bridge speak JSON text frames over websockets:
//! the carrier side tags frames with `event`, the speech-model side
//! with `type`. Frames with tags this build does not know about decode
//! into an explicit `Unknown` variant so new peer versions never kill
//! a session.

pub mod carrier;
pub mod speech;

use base64::Engine;

/// Decoded byte length of a base64 audio payload, 0 when it does not
/// decode. Used for size accounting only; payloads stay opaque.
pub fn decoded_audio_len(payload: &str) -> usize {
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map(|bytes| bytes.len())
        .unwrap_or(0)
}
