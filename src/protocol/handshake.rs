//! Channel encryption handshake.
//!
//! ```text
//! Disconnected -> AwaitingEncryptRequest -> AwaitingEncryptResult -> Ready
//! ```
//!
//! The server opens with `ChannelEncryptRequest`. The client answers with a
//! fresh 32-byte session key wrapped under the universe's RSA key, in the
//! layout `[ciphertext][crc32(ciphertext) LE][0u32]`. When the server
//! confirms with an OK `ChannelEncryptResult`, the key is handed to the
//! transport and the temporary copy is dropped.
//!
//! [`ChannelHandshake`] holds the state for one connection attempt. It
//! performs no I/O; the client feeds it decoded messages and writes out
//! what it returns.

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::emsg::{EResult, EUniverse};
use crate::protocol::message::StructMessage;
use crate::protocol::messages::{
    MsgChannelEncryptRequest, MsgChannelEncryptResponse, MsgChannelEncryptResult,
};
use crate::utils::crypto::{SessionKey, UniverseKeys};
use tracing::{debug, instrument};
use zeroize::Zeroize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Disconnected,
    AwaitingEncryptRequest,
    AwaitingEncryptResult,
    Ready,
}

/// Per-connection handshake state. The pending session key is zeroed when
/// the handshake completes, resets, or is dropped.
#[derive(Debug)]
pub struct ChannelHandshake {
    state: HandshakeState,
    expected_universe: EUniverse,
    pending_key: Option<SessionKey>,
}

impl ChannelHandshake {
    /// A handshake waiting for the server's encryption request.
    pub fn new(expected_universe: EUniverse) -> Self {
        Self {
            state: HandshakeState::AwaitingEncryptRequest,
            expected_universe,
            pending_key: None,
        }
    }

    /// A handshake that has not started.
    pub fn idle(expected_universe: EUniverse) -> Self {
        Self {
            state: HandshakeState::Disconnected,
            expected_universe,
            pending_key: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == HandshakeState::Ready
    }

    pub fn expected_universe(&self) -> EUniverse {
        self.expected_universe
    }

    /// Answers the server's encryption request.
    ///
    /// # Errors
    /// `HandshakeError` when no request is expected or the universe does
    /// not match; `SecurityError` when the session key cannot be wrapped.
    #[instrument(skip(self, request, keys), fields(universe = ?request.universe))]
    pub fn handle_encrypt_request(
        &mut self,
        request: &MsgChannelEncryptRequest,
        keys: &UniverseKeys,
    ) -> Result<StructMessage<MsgChannelEncryptResponse>> {
        if self.state != HandshakeState::AwaitingEncryptRequest {
            return Err(ProtocolError::HandshakeError(
                constants::ERR_UNEXPECTED_ENCRYPT_REQUEST.into(),
            ));
        }

        if request.universe != self.expected_universe {
            return Err(ProtocolError::HandshakeError(format!(
                "invalid universe {:?}, expected {:?}",
                request.universe, self.expected_universe
            )));
        }

        let key = SessionKey::generate();
        let mut encrypted = keys.encrypt(request.universe, key.as_bytes())?;
        let payload = encrypt_response_payload(&encrypted);
        encrypted.zeroize();

        self.pending_key = Some(key);
        self.state = HandshakeState::AwaitingEncryptResult;

        debug!(payload_len = payload.len(), "Answering channel encryption request");

        Ok(StructMessage::new(MsgChannelEncryptResponse::default(), payload))
    }

    /// Completes the handshake and releases the session key for the transport.
    ///
    /// # Errors
    /// `HandshakeError` when the result is not OK, arrives out of order, or
    /// no key is pending.
    #[instrument(skip(self, result), fields(result = ?result.result))]
    pub fn handle_encrypt_result(&mut self, result: &MsgChannelEncryptResult) -> Result<SessionKey> {
        if self.state != HandshakeState::AwaitingEncryptResult {
            return Err(ProtocolError::HandshakeError(format!(
                "unexpected encryption result in state {:?}",
                self.state
            )));
        }

        if result.result != EResult::OK {
            self.reset();
            return Err(ProtocolError::HandshakeError(format!(
                "encryption failed: {:?}",
                result.result
            )));
        }

        let key = self.pending_key.take().ok_or_else(|| {
            ProtocolError::HandshakeError(constants::ERR_SESSION_KEY_NOT_FOUND.into())
        })?;

        self.state = HandshakeState::Ready;
        debug!("Channel encryption established");
        Ok(key)
    }

    /// Drops any pending key and returns to `Disconnected`.
    pub fn reset(&mut self) {
        self.pending_key = None;
        self.state = HandshakeState::Disconnected;
    }
}

/// `[ciphertext][crc32(ciphertext) LE][4 zero bytes]`
pub fn encrypt_response_payload(encrypted_key: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(encrypted_key.len() + 8);
    payload.extend_from_slice(encrypted_key);
    payload.extend_from_slice(&crc32fast::hash(encrypted_key).to_le_bytes());
    payload.extend_from_slice(&[0u8; 4]);
    payload
}
