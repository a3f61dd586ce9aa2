//! # TCP Transport
//!
//! One framed TCP connection per session. Frames are
//! `[u32 LE length][u32 LE "VT01"][payload]`; once the channel handshake
//! installs a session key every payload is AES-encrypted in both
//! directions.
//!
//! A [`TcpConnection`] is split into a [`ConnectionReader`] and a
//! [`ConnectionWriter`] so one task can own each direction. Both halves
//! share an [`EncryptionState`] with the code that completes the handshake.

use crate::config::ConnectionConfig;
use crate::core::codec::FrameCodec;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::crypto::{SessionCipher, SESSION_KEY_LEN};
use crate::utils::timeout::with_timeout_error;
use bytes::{Bytes, BytesMut};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tokio::net::{TcpSocket, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument};

type FramedStream = Framed<TcpStream, FrameCodec>;

/// The transport cipher, shared between the reader, the writer and the
/// handshake. `None` means frames travel in plaintext.
#[derive(Debug, Default)]
pub struct EncryptionState {
    cipher: RwLock<Option<SessionCipher>>,
}

impl EncryptionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or clears the session key.
    ///
    /// `None` reverts to plaintext. A key can be installed only once per
    /// connection and must be exactly 32 bytes.
    ///
    /// # Errors
    /// `InvalidKeyLength` for a wrongly sized key, `SecurityError` when a
    /// key is already installed.
    pub fn set_encryption_key(&self, key: Option<&[u8]>) -> Result<()> {
        let mut cipher = self
            .cipher
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.into()))?;

        let Some(key) = key else {
            *cipher = None;
            return Ok(());
        };

        if key.len() != SESSION_KEY_LEN {
            return Err(ProtocolError::InvalidKeyLength(key.len()));
        }
        if cipher.is_some() {
            return Err(ProtocolError::SecurityError(
                constants::ERR_KEY_ALREADY_SET.into(),
            ));
        }

        *cipher = Some(SessionCipher::new(key)?);
        Ok(())
    }

    /// Installs an already-built cipher, under the same once-only rule.
    pub fn install(&self, new_cipher: SessionCipher) -> Result<()> {
        let mut cipher = self
            .cipher
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.into()))?;
        if cipher.is_some() {
            return Err(ProtocolError::SecurityError(
                constants::ERR_KEY_ALREADY_SET.into(),
            ));
        }
        *cipher = Some(new_cipher);
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.read().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Encrypts an outbound payload, or returns it untouched in plaintext mode.
    pub fn encrypt(&self, payload: Bytes) -> Result<Bytes> {
        let cipher = self
            .cipher
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.into()))?;
        match cipher.as_ref() {
            Some(cipher) => Ok(Bytes::from(cipher.encrypt(&payload)?)),
            None => Ok(payload),
        }
    }

    /// Decrypts an inbound frame, or freezes it untouched in plaintext mode.
    pub fn decrypt(&self, frame: BytesMut) -> Result<Bytes> {
        let cipher = self
            .cipher
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.into()))?;
        match cipher.as_ref() {
            Some(cipher) => Ok(Bytes::from(cipher.decrypt(&frame)?)),
            None => Ok(frame.freeze()),
        }
    }
}

/// A connected, framed TCP stream.
pub struct TcpConnection {
    framed: FramedStream,
    peer_addr: SocketAddr,
    encryption: Arc<EncryptionState>,
}

impl TcpConnection {
    /// Opens a connection to `addr`, honouring the connect timeout and the
    /// optional local bind address.
    #[instrument(skip(config))]
    pub async fn connect(addr: SocketAddr, config: &ConnectionConfig) -> Result<Self> {
        let bind = config
            .bind_address
            .as_deref()
            .map(|raw| {
                raw.parse::<SocketAddr>().map_err(|e| {
                    ProtocolError::ConfigError(format!("invalid bind address {raw:?}: {e}"))
                })
            })
            .transpose()?;

        let stream = with_timeout_error(
            async {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                if let Some(local) = bind {
                    socket.bind(local)?;
                }
                Ok::<_, ProtocolError>(socket.connect(addr).await?)
            },
            config.connect_timeout,
        )
        .await?;

        info!(peer = %addr, "TCP connection established");
        Self::from_stream(stream, config.max_payload_size)
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream, max_payload: usize) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new(max_payload)),
            peer_addr,
            encryption: Arc::new(EncryptionState::new()),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn encryption(&self) -> Arc<EncryptionState> {
        Arc::clone(&self.encryption)
    }

    /// Splits into independently owned read and write halves.
    pub fn split(self) -> (ConnectionReader, ConnectionWriter) {
        let (sink, stream) = self.framed.split();
        (
            ConnectionReader {
                stream,
                encryption: Arc::clone(&self.encryption),
            },
            ConnectionWriter {
                sink,
                encryption: self.encryption,
            },
        )
    }
}

/// Receive side of a [`TcpConnection`].
pub struct ConnectionReader {
    stream: SplitStream<FramedStream>,
    encryption: Arc<EncryptionState>,
}

impl ConnectionReader {
    /// Reads the next frame and returns its decrypted payload along with the
    /// number of bytes the frame carried on the wire.
    ///
    /// # Errors
    /// `ConnectionClosed` at end of stream; framing and cipher errors as
    /// reported by the codec and [`EncryptionState::decrypt`].
    pub async fn read(&mut self) -> Result<(Bytes, usize)> {
        let frame = self
            .stream
            .next()
            .await
            .ok_or(ProtocolError::ConnectionClosed)??;
        let wire_len = frame.len();
        let payload = self.encryption.decrypt(frame)?;
        debug!(wire_len, len = payload.len(), "frame received");
        Ok((payload, wire_len))
    }
}

/// Send side of a [`TcpConnection`]. Only one task may own it.
pub struct ConnectionWriter {
    sink: SplitSink<FramedStream, Bytes>,
    encryption: Arc<EncryptionState>,
}

impl ConnectionWriter {
    /// Encrypts and frames `payload`, returning the bytes written after
    /// encryption.
    pub async fn write(&mut self, payload: Bytes) -> Result<usize> {
        let sealed = self.encryption.encrypt(payload)?;
        let wire_len = sealed.len();
        self.sink.send(sealed).await?;
        Ok(wire_len)
    }

    /// Flushes and shuts down the write side of the socket.
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::TCP_CONNECTION_MAGIC;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_key_length_is_checked() {
        let state = EncryptionState::new();
        assert!(matches!(
            state.set_encryption_key(Some(&[0u8; 16])),
            Err(ProtocolError::InvalidKeyLength(16))
        ));
        assert!(!state.is_encrypted());
    }

    #[test]
    fn test_key_can_be_set_once() {
        let state = EncryptionState::new();
        state.set_encryption_key(Some(&[1u8; 32])).unwrap();
        assert!(state.is_encrypted());
        assert!(state.set_encryption_key(Some(&[2u8; 32])).is_err());

        // clearing is always allowed, and re-arms the slot
        state.set_encryption_key(None).unwrap();
        assert!(!state.is_encrypted());
        state.set_encryption_key(Some(&[2u8; 32])).unwrap();
    }

    #[test]
    fn test_plaintext_passthrough() {
        let state = EncryptionState::new();
        let out = state.encrypt(Bytes::from_static(b"hello")).unwrap();
        assert_eq!(&out[..], b"hello");
        let back = state.decrypt(BytesMut::from(&b"hello"[..])).unwrap();
        assert_eq!(&back[..], b"hello");
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let state = EncryptionState::new();
        state.set_encryption_key(Some(&[9u8; 32])).unwrap();
        let sealed = state.encrypt(Bytes::from_static(b"hello")).unwrap();
        assert_ne!(&sealed[..], b"hello");
        assert_eq!(sealed.len() % 16, 0);
        let opened = state.decrypt(BytesMut::from(&sealed[..])).unwrap();
        assert_eq!(&opened[..], b"hello");
    }

    #[tokio::test]
    async fn test_frames_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 8];
            socket.read_exact(&mut header).await.unwrap();
            let len = u32::from_le_bytes(header[..4].try_into().unwrap()) as usize;
            assert_eq!(
                u32::from_le_bytes(header[4..].try_into().unwrap()),
                TCP_CONNECTION_MAGIC
            );
            let mut body = vec![0u8; len];
            socket.read_exact(&mut body).await.unwrap();

            // echo it back in the same frame
            socket.write_all(&header).await.unwrap();
            socket.write_all(&body).await.unwrap();
            body
        });

        let connection = TcpConnection::connect(addr, &ConnectionConfig::default())
            .await
            .unwrap();
        assert_eq!(connection.peer_addr(), addr);
        let (mut reader, mut writer) = connection.split();

        let written = writer.write(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(written, 4);

        let (payload, wire_len) = reader.read().await.unwrap();
        assert_eq!(&payload[..], b"ping");
        assert_eq!(wire_len, 4);
        assert_eq!(server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_closed_stream_reports_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let connection = TcpConnection::connect(addr, &ConnectionConfig::default())
            .await
            .unwrap();
        let (mut reader, _writer) = connection.split();
        server.await.unwrap();

        assert!(matches!(
            reader.read().await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}
