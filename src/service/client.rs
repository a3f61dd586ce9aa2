//! # Client Session Core
//!
//! [`Client`] owns one CM session at a time: the TCP connection, the
//! channel handshake, the reader and writer tasks and the heartbeat.
//!
//! ## Tasks
//! ```text
//! reader:    frame -> decrypt -> Packet -> system handlers -> Dispatcher
//! writer:    queue -> serialize -> encrypt -> frame
//! heartbeat: timer -> queue
//! ```
//!
//! Only the reader touches the receive half and only the writer touches
//! the send half. [`Client::write`] never blocks; it stamps the session
//! onto the message and enqueues it. Writes made while disconnected are
//! dropped.
//!
//! Inbound packets are handled one at a time, in arrival order, on the
//! reader task. Handlers run inline and must not block.
//!
//! ## Failure Model
//! Transport and handshake errors emit [`Event::Fatal`] and tear the
//! session down; the client can then connect again. Errors confined to a
//! single packet emit [`Event::Error`] and the session carries on.
//!
//! ## Example
//! ```rust,no_run
//! use steam_protocol::config::ClientConfig;
//! use steam_protocol::service::client::Client;
//! use steam_protocol::service::events::Event;
//! use tokio_stream::StreamExt;
//!
//! # async fn run() -> steam_protocol::error::Result<()> {
//! let client = Client::new(ClientConfig::default())?;
//! let mut events = client.events().expect("first call");
//! client.connect().await?;
//!
//! while let Some(event) = events.next().await {
//!     if let Event::Connected = event {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{ClientConfig, DEFAULT_HEARTBEAT_SECONDS};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::emsg::EMsg;
use crate::protocol::gc::GcPacket;
use crate::protocol::handshake::ChannelHandshake;
use crate::protocol::job::JobId;
use crate::protocol::message::{Message, ProtoMessage};
use crate::protocol::messages::{MsgChannelEncryptRequest, MsgChannelEncryptResult};
use crate::protocol::packet::Packet;
use crate::protocol::proto::{CMsgClientCMList, CMsgClientHeartBeat, CMsgMulti};
use crate::service::directory::{self, ServerDirectory};
use crate::service::events::Event;
use crate::service::machine_id::{MachineIdProvider, SystemMachineId};
use crate::service::{auth, gc};
use crate::steamid::SteamId;
use crate::transport::tcp::{ConnectionReader, ConnectionWriter, EncryptionState, TcpConnection};
use crate::utils::compression;
use crate::utils::crypto::{SessionCipher, UniverseKeys};
use crate::utils::metrics::Metrics;
use bytes::{Buf, Bytes};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, instrument, trace, warn};

/// Stream of [`Event`]s handed out by [`Client::events`].
pub type EventStream = UnboundedReceiverStream<Event>;

type OutboundQueue = mpsc::UnboundedSender<Box<dyn Message>>;

/// Deepest `Multi` nesting that is unpacked.
pub const MAX_MULTI_DEPTH: usize = 8;

/// Handle to a CM client. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    universe_keys: UniverseKeys,
    directory: ServerDirectory,
    machine_id: Arc<dyn MachineIdProvider>,

    session_id: AtomicI32,
    steam_id: AtomicU64,
    current_job_id: AtomicU64,
    generation: AtomicU64,
    web_login_nonce: Mutex<Option<String>>,

    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,

    handlers: Dispatcher<Client, Packet>,
    gc_handlers: Dispatcher<Client, GcPacket>,

    state: Mutex<ConnectionState>,
    metrics: Metrics,
}

/// Everything guarded by the connection lock.
struct ConnectionState {
    session: Option<Session>,
    handshake: ChannelHandshake,
    heartbeat: Option<JoinHandle<()>>,
}

/// One live connection.
struct Session {
    generation: u64,
    peer: SocketAddr,
    queue: OutboundQueue,
    encryption: Arc<EncryptionState>,
    reader: JoinHandle<()>,
}

/// Assembles a [`Client`] with non-default collaborators.
pub struct ClientBuilder {
    config: ClientConfig,
    universe_keys: UniverseKeys,
    machine_id: Arc<dyn MachineIdProvider>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            universe_keys: UniverseKeys::builtin(),
            machine_id: Arc::new(SystemMachineId::default()),
        }
    }

    /// RSA keys used to wrap the session key.
    pub fn universe_keys(mut self, keys: UniverseKeys) -> Self {
        self.universe_keys = keys;
        self
    }

    /// Source of the machine fingerprint sent with log-on.
    pub fn machine_id(mut self, provider: impl MachineIdProvider + 'static) -> Self {
        self.machine_id = Arc::new(provider);
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> Result<Client> {
        self.config.validate_strict()?;
        let directory = ServerDirectory::new(self.config.directory.clone())?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let universe = self.config.connection.universe;

        let client = Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                universe_keys: self.universe_keys,
                directory,
                machine_id: self.machine_id,
                session_id: AtomicI32::new(0),
                steam_id: AtomicU64::new(0),
                current_job_id: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                web_login_nonce: Mutex::new(None),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                handlers: Dispatcher::new(),
                gc_handlers: Dispatcher::new(),
                state: Mutex::new(ConnectionState {
                    session: None,
                    handshake: ChannelHandshake::idle(universe),
                    heartbeat: None,
                }),
                metrics: Metrics::new(),
            }),
        };

        // built-in subsystems see packets before user handlers
        client.register_packet_handler(auth::handle_packet)?;
        client.register_packet_handler(gc::handle_packet)?;
        Ok(client)
    }
}

impl Client {
    /// A client with the built-in universe keys and the system machine id.
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Takes the event stream. Only the first call returns `Some`.
    ///
    /// The stream must be drained continuously; it is never closed while
    /// the client is alive.
    pub fn events(&self) -> Option<EventStream> {
        lock(&self.inner.events_rx)
            .take()
            .map(UnboundedReceiverStream::new)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn directory(&self) -> &ServerDirectory {
        &self.inner.directory
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Registers a handler that sees every inbound packet, after the
    /// built-in handlers and in registration order.
    pub fn register_packet_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&Client, &Packet) + Send + Sync + 'static,
    {
        self.inner.handlers.register(handler)
    }

    /// Registers a handler for inbound Game Coordinator messages.
    pub fn register_gc_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&Client, &GcPacket) + Send + Sync + 'static,
    {
        self.inner.gc_handlers.register(handler)
    }

    pub fn next_job_id(&self) -> JobId {
        JobId(
            self.inner
                .current_job_id
                .fetch_add(1, Ordering::Relaxed)
                .wrapping_add(1),
        )
    }

    pub fn steam_id(&self) -> SteamId {
        SteamId::from_u64(self.inner.steam_id.load(Ordering::Acquire))
    }

    pub fn session_id(&self) -> i32 {
        self.inner.session_id.load(Ordering::Acquire)
    }

    /// One-time nonce from the last successful log-on, for web sign-in.
    pub fn web_login_nonce(&self) -> Option<String> {
        lock(&self.inner.web_login_nonce).clone()
    }

    pub fn connected(&self) -> bool {
        self.state().session.is_some()
    }

    /// Address of the current server, if connected.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.state().session.as_ref().map(|s| s.peer)
    }

    /// Whether the current session has completed the channel handshake.
    pub fn is_encrypted(&self) -> bool {
        self.state()
            .session
            .as_ref()
            .is_some_and(|s| s.encryption.is_encrypted())
    }

    /// Connects to a random CM server and returns its address.
    ///
    /// Servers come from the directory cache once it is initialized, and
    /// from the static fallback list before that.
    pub async fn connect(&self) -> Result<SocketAddr> {
        let addr = if self.inner.directory.is_initialized() {
            self.inner.directory.get_random()?
        } else {
            directory::random_fallback()?
        };
        self.connect_to(addr).await?;
        Ok(addr)
    }

    /// Connects to `addr`, dropping any existing session first.
    ///
    /// Returns once the TCP connection is up; [`Event::Connected`] follows
    /// when the channel handshake completes.
    #[instrument(skip(self))]
    pub async fn connect_to(&self, addr: SocketAddr) -> Result<()> {
        self.disconnect();
        let connection = TcpConnection::connect(addr, &self.inner.config.connection).await?;
        self.inner.metrics.connection_established();
        self.attach(connection);
        Ok(())
    }

    /// Starts a session on an established connection.
    fn attach(&self, connection: TcpConnection) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let peer = connection.peer_addr();
        let encryption = connection.encryption();
        let (reader, writer) = connection.split();
        let (queue, outbound) = mpsc::unbounded_channel();
        let weak = Arc::downgrade(&self.inner);

        let replaced = {
            let mut state = self.state();
            state.handshake = ChannelHandshake::new(self.inner.config.connection.universe);
            if let Some(heartbeat) = state.heartbeat.take() {
                heartbeat.abort();
            }

            tokio::spawn(write_loop(weak.clone(), generation, writer, outbound));
            let reader = tokio::spawn(read_loop(weak, generation, reader));

            state.session.replace(Session {
                generation,
                peer,
                queue,
                encryption,
                reader,
            })
        };

        if let Some(old) = replaced {
            old.reader.abort();
            self.emit(Event::Disconnected);
        }
        debug!(%peer, generation, "session attached");
    }

    /// Closes the connection, stops the heartbeat and emits
    /// [`Event::Disconnected`]. Does nothing when not connected.
    pub fn disconnect(&self) {
        self.disconnect_session(None);
    }

    /// Tears down the current session, or only the session numbered
    /// `generation` when one is given. Returns whether anything was closed.
    fn disconnect_session(&self, generation: Option<u64>) -> bool {
        let session = {
            let mut state = self.state();
            match (&state.session, generation) {
                (None, _) => return false,
                (Some(current), Some(g)) if current.generation != g => return false,
                _ => {}
            }
            state.handshake.reset();
            if let Some(heartbeat) = state.heartbeat.take() {
                heartbeat.abort();
            }
            state.session.take()
        };

        if let Some(session) = session {
            // dropping the queue lets the writer drain and close the socket
            session.reader.abort();
            drop(session.queue);
            info!(peer = %session.peer, "disconnected");
            self.emit(Event::Disconnected);
            return true;
        }
        false
    }

    /// Stamps the session onto `msg` and queues it for sending.
    pub fn write<M: Message + 'static>(&self, msg: M) {
        self.write_boxed(Box::new(msg));
    }

    pub fn write_boxed(&self, mut msg: Box<dyn Message>) {
        msg.header_mut()
            .set_session(self.session_id(), self.steam_id());

        let state = self.state();
        let Some(session) = &state.session else {
            debug!(emsg = %msg.emsg(), "write ignored while disconnected");
            return;
        };
        if session.queue.send(msg).is_err() {
            debug!("write queue already closed");
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        // the receiver only goes away together with the client
        let _ = self.inner.events_tx.send(event);
    }

    /// Reports a non-fatal error.
    pub(crate) fn report(&self, err: ProtocolError) {
        warn!(error = %err, "packet error");
        self.emit(Event::Error(err));
    }

    /// Reports a fatal error and disconnects the current session.
    pub(crate) fn fatal(&self, err: ProtocolError) {
        error!(error = %err, "fatal session error");
        self.inner.metrics.fatal_error();
        self.emit(Event::Fatal(err));
        self.disconnect();
    }

    /// Like [`Client::fatal`], but ignored when session `generation` has
    /// already been replaced.
    fn fatal_session(&self, generation: u64, err: ProtocolError) {
        let current = self
            .state()
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation);
        if !current {
            debug!(generation, error = %err, "error from a closed session");
            return;
        }

        error!(error = %err, "fatal session error");
        self.inner.metrics.fatal_error();
        self.emit(Event::Fatal(err));
        self.disconnect_session(Some(generation));
    }

    pub(crate) fn set_session_id(&self, session_id: i32) {
        self.inner.session_id.store(session_id, Ordering::Release);
    }

    pub(crate) fn set_steam_id(&self, steam_id: SteamId) {
        self.inner.steam_id.store(steam_id.as_u64(), Ordering::Release);
    }

    pub(crate) fn set_web_login_nonce(&self, nonce: Option<String>) {
        *lock(&self.inner.web_login_nonce) = nonce;
    }

    pub(crate) fn machine_id(&self) -> &dyn MachineIdProvider {
        self.inner.machine_id.as_ref()
    }

    pub(crate) fn gc_handlers(&self) -> &Dispatcher<Client, GcPacket> {
        &self.inner.gc_handlers
    }

    /// Starts sending heartbeats every `seconds`, replacing any previous
    /// timer. Zero falls back to the default interval.
    pub(crate) fn start_heartbeat(&self, seconds: u32) {
        let seconds = if seconds == 0 {
            DEFAULT_HEARTBEAT_SECONDS
        } else {
            seconds
        };
        let interval = Duration::from_secs(u64::from(seconds));
        let weak = Arc::downgrade(&self.inner);

        let mut state = self.state();
        if state.session.is_none() {
            return;
        }

        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let client = Client { inner };
                client.write(ProtoMessage::new(
                    EMsg::ClientHeartBeat,
                    CMsgClientHeartBeat::default(),
                ));
                client.inner.metrics.heartbeat_sent();
                trace!("heartbeat queued");
            }
        });

        if let Some(previous) = state.heartbeat.replace(task) {
            previous.abort();
        }
        debug!(seconds, "heartbeat started");
    }

    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        lock(&self.inner.state)
    }

    /// Decodes one inbound payload and handles it.
    ///
    /// Until the channel is encrypted only the two handshake messages are
    /// accepted; anything else is dropped.
    fn handle_frame(&self, data: Bytes) {
        match Packet::new(data) {
            Ok(packet) => {
                let emsg = packet.emsg();
                let handshake_msg =
                    matches!(emsg, EMsg::ChannelEncryptRequest | EMsg::ChannelEncryptResult);
                if !handshake_msg && !self.state().handshake.is_ready() {
                    debug!(%emsg, "dropping packet received before encryption");
                    return;
                }
                self.handle_packet(&packet, 0)
            }
            Err(e) => {
                self.inner.metrics.decode_error();
                self.report(e);
            }
        }
    }

    /// Runs the system handlers for `packet`, then every registered handler.
    /// `depth` counts the `Multi` bundles the packet was nested in.
    fn handle_packet(&self, packet: &Packet, depth: usize) {
        trace!(%packet, "packet received");

        match packet.emsg() {
            EMsg::ChannelEncryptRequest => self.handle_encrypt_request(packet),
            EMsg::ChannelEncryptResult => self.handle_encrypt_result(packet),
            EMsg::Multi => self.handle_multi(packet, depth),
            EMsg::ClientCMList => self.handle_cm_list(packet),
            _ => {}
        }

        if let Err(e) = self.inner.handlers.dispatch(self, packet) {
            self.report(e);
        }
    }

    fn handle_encrypt_request(&self, packet: &Packet) {
        let request = match packet.read_struct::<MsgChannelEncryptRequest>() {
            Ok(msg) => msg.body,
            Err(e) => return self.fatal(e),
        };

        let response = self
            .state()
            .handshake
            .handle_encrypt_request(&request, &self.inner.universe_keys);

        match response {
            Ok(response) => self.write(response),
            Err(e) => {
                self.inner.metrics.handshake_failed();
                self.fatal(e);
            }
        }
    }

    fn handle_encrypt_result(&self, packet: &Packet) {
        let result = match packet.read_struct::<MsgChannelEncryptResult>() {
            Ok(msg) => msg.body,
            Err(e) => return self.fatal(e),
        };

        let installed = {
            let mut state = self.state();
            state
                .handshake
                .handle_encrypt_result(&result)
                .and_then(|key| match &state.session {
                    Some(session) => session
                        .encryption
                        .install(SessionCipher::from_session_key(&key)),
                    None => Err(ProtocolError::NotConnected),
                })
        };

        match installed {
            Ok(()) => {
                self.inner.metrics.handshake_success();
                info!("channel encrypted");
                self.emit(Event::Connected);
            }
            Err(e) => {
                self.inner.metrics.handshake_failed();
                self.fatal(e);
            }
        }
    }

    /// Unpacks a batch of sub-packets and handles each in order.
    ///
    /// A malformed length aborts the rest of the batch. A sub-packet that
    /// fails to decode is reported and skipped. Bundles nested deeper than
    /// [`MAX_MULTI_DEPTH`] are dropped whole.
    fn handle_multi(&self, packet: &Packet, depth: usize) {
        if depth >= MAX_MULTI_DEPTH {
            self.inner.metrics.decode_error();
            return self.report(ProtocolError::DecodeError(format!(
                "{} ({MAX_MULTI_DEPTH})",
                constants::ERR_MULTI_DEPTH
            )));
        }

        let body = match packet.read_proto::<CMsgMulti>() {
            Ok(msg) => msg.body,
            Err(e) => return self.report(e),
        };

        let size_unzipped = body.size_unzipped() as usize;
        let raw = body.message_body.unwrap_or_default();
        let payload = if size_unzipped > 0 {
            match compression::decompress_sized(&raw, size_unzipped) {
                Ok(inflated) => inflated,
                Err(e) => return self.report(e),
            }
        } else {
            raw
        };

        self.inner.metrics.multi_unpacked();
        let mut cursor = Bytes::from(payload);
        while cursor.has_remaining() {
            if cursor.remaining() < 4 {
                return self.report(ProtocolError::DecodeError(
                    constants::ERR_MULTI_LENGTH.into(),
                ));
            }
            let len = cursor.get_u32_le() as usize;
            if len > cursor.remaining() {
                return self.report(ProtocolError::DecodeError(format!(
                    "{}: {len} bytes announced, {} left",
                    constants::ERR_MULTI_LENGTH,
                    cursor.remaining()
                )));
            }

            match Packet::new(cursor.split_to(len)) {
                Ok(sub) => self.handle_packet(&sub, depth + 1),
                Err(e) => {
                    self.inner.metrics.decode_error();
                    self.report(e);
                }
            }
        }
    }

    fn handle_cm_list(&self, packet: &Packet) {
        let body = match packet.read_proto::<CMsgClientCMList>() {
            Ok(msg) => msg.body,
            Err(e) => return self.report(e),
        };

        let servers = cm_list_addresses(&body);
        debug!(count = servers.len(), "server list received");
        self.emit(Event::ServerList(servers));
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("steam_id", &self.steam_id())
            .field("session_id", &self.session_id())
            .field("connected", &self.connected())
            .finish()
    }
}

/// Pairs big-endian IPv4 values with their ports. Extra entries on either
/// side are ignored.
pub fn cm_list_addresses(list: &CMsgClientCMList) -> Vec<SocketAddr> {
    list.cm_addresses
        .iter()
        .zip(&list.cm_ports)
        .filter_map(|(&ip, &port)| {
            let port = u16::try_from(port).ok()?;
            Some(SocketAddr::from((Ipv4Addr::from(ip), port)))
        })
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn read_loop(inner: Weak<ClientInner>, generation: u64, mut reader: ConnectionReader) {
    loop {
        let result = reader.read().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let client = Client { inner };

        match result {
            Ok((data, wire_len)) => {
                client.inner.metrics.message_received(wire_len as u64);
                client.handle_frame(data);
            }
            Err(e) => {
                client.fatal_session(generation, e);
                return;
            }
        }
    }
}

async fn write_loop(
    inner: Weak<ClientInner>,
    generation: u64,
    mut writer: ConnectionWriter,
    mut outbound: mpsc::UnboundedReceiver<Box<dyn Message>>,
) {
    while let Some(msg) = outbound.recv().await {
        let emsg = msg.emsg();
        let result = writer.write(msg.to_bytes()).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };

        match result {
            Ok(wire_len) => {
                inner.metrics.message_sent(wire_len as u64);
                trace!(%emsg, wire_len, "message sent");
            }
            Err(e) => {
                Client { inner }.fatal_session(generation, e);
                return;
            }
        }
    }

    if let Err(e) = writer.close().await {
        debug!(error = %e, "closing write half failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn test_cm_list_pairs_addresses_with_ports() {
        let list = CMsgClientCMList {
            cm_addresses: vec![0xA2FE_C106, 0x7F00_0001],
            cm_ports: vec![27017, 27018, 27019],
        };
        let servers = cm_list_addresses(&list);
        assert_eq!(
            servers,
            vec![
                "162.254.193.6:27017".parse::<SocketAddr>().unwrap(),
                "127.0.0.1:27018".parse().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_job_ids_start_at_one() {
        let client = Client::new(ClientConfig::default()).unwrap();
        assert_eq!(client.next_job_id(), JobId(1));
        assert_eq!(client.next_job_id(), JobId(2));
        assert_eq!(client.clone().next_job_id(), JobId(3));
    }

    #[tokio::test]
    async fn test_fresh_client_state() {
        let client = Client::new(ClientConfig::default()).unwrap();
        assert!(!client.connected());
        assert!(!client.is_encrypted());
        assert_eq!(client.session_id(), 0);
        assert_eq!(client.steam_id(), SteamId::from_u64(0));
        assert_eq!(client.web_login_nonce(), None);
        assert!(client.peer_addr().is_none());

        assert!(client.events().is_some());
        assert!(client.events().is_none());
    }

    #[tokio::test]
    async fn test_write_and_disconnect_while_disconnected_are_ignored() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let mut events = client.events().unwrap();

        client.write(ProtoMessage::new(
            EMsg::ClientHeartBeat,
            CMsgClientHeartBeat::default(),
        ));
        client.disconnect();
        client.emit(Event::Connected);

        // the only event is the one emitted by hand
        assert!(matches!(events.next().await, Some(Event::Connected)));
        assert_eq!(client.metrics().snapshot().messages_sent, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = ClientConfig::default();
        config.login.client_language.clear();
        assert!(Client::new(config).is_err());
    }

    fn multi_around(inner: &[u8]) -> Bytes {
        let mut batch = Vec::with_capacity(inner.len() + 4);
        batch.extend_from_slice(&(inner.len() as u32).to_le_bytes());
        batch.extend_from_slice(inner);
        ProtoMessage::new(
            EMsg::Multi,
            CMsgMulti {
                size_unzipped: Some(0),
                message_body: Some(batch),
            },
        )
        .to_bytes()
    }

    fn nested_multi(layers: usize) -> Bytes {
        let heartbeat =
            ProtoMessage::new(EMsg::ClientHeartBeat, CMsgClientHeartBeat::default()).to_bytes();
        (0..layers).fold(heartbeat, |inner, _| multi_around(&inner))
    }

    #[tokio::test]
    async fn test_deeply_nested_multi_is_dropped() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let mut events = client.events().unwrap();

        let packet = Packet::new(nested_multi(100)).unwrap();
        client.handle_packet(&packet, 0);

        match events.next().await {
            Some(Event::Error(ProtocolError::DecodeError(msg))) => {
                assert!(msg.contains(constants::ERR_MULTI_DEPTH));
            }
            other => panic!("expected a decode error, got {other:?}"),
        }
        let snapshot = client.metrics().snapshot();
        assert_eq!(snapshot.multis_unpacked, MAX_MULTI_DEPTH as u64);
        assert_eq!(snapshot.decode_errors, 1);
    }

    #[tokio::test]
    async fn test_multi_within_depth_is_unpacked() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let packet = Packet::new(nested_multi(MAX_MULTI_DEPTH)).unwrap();
        client.handle_packet(&packet, 0);

        let snapshot = client.metrics().snapshot();
        assert_eq!(snapshot.multis_unpacked, MAX_MULTI_DEPTH as u64);
        assert_eq!(snapshot.decode_errors, 0);
    }

    #[tokio::test]
    async fn test_frames_before_encryption_are_dropped() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let mut events = client.events().unwrap();

        client.handle_frame(nested_multi(1));
        client.handle_frame(
            ProtoMessage::new(
                EMsg::ClientCMList,
                CMsgClientCMList {
                    cm_addresses: vec![0x7F00_0001],
                    cm_ports: vec![27017],
                },
            )
            .to_bytes(),
        );
        client.emit(Event::Disconnected);

        assert!(matches!(events.next().await, Some(Event::Disconnected)));
        assert_eq!(client.metrics().snapshot().multis_unpacked, 0);
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_reported_not_fatal() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let mut events = client.events().unwrap();
        client.handle_frame(Bytes::from_static(&[1, 2]));

        match events.next().await {
            Some(Event::Error(e)) => assert!(!e.is_fatal()),
            other => panic!("expected a non-fatal error, got {other:?}"),
        }
        assert_eq!(client.metrics().snapshot().decode_errors, 1);
    }
}
