//! # CM Server Directory
//!
//! Cache of connection-manager addresses fetched from the Steam Web API
//! directory endpoint. Until the cache is initialized, callers draw from a
//! small static list of well-known servers.
//!
//! ## Usage
//! ```rust,no_run
//! # async fn run() -> steam_protocol::error::Result<()> {
//! use steam_protocol::config::DirectoryConfig;
//! use steam_protocol::service::directory::ServerDirectory;
//!
//! let directory = ServerDirectory::new(DirectoryConfig::default())?;
//! let count = directory.initialize().await?;
//! let addr = directory.get_random()?;
//! println!("{count} servers, picked {addr}");
//! # Ok(())
//! # }
//! ```

use crate::config::DirectoryConfig;
use crate::error::{ProtocolError, Result};
use crate::utils::metrics::Timer;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Well-known CM servers, tagged by region.
pub const FALLBACK_SERVERS: &[(&str, &str)] = &[
    ("us-west", "162.254.193.6:27017"),
    ("eu-central", "155.133.248.52:27017"),
    ("us-east", "162.254.197.40:27017"),
    ("eu-west", "146.66.152.10:27017"),
    ("us-central", "208.78.164.9:27017"),
];

/// Every parseable address of [`FALLBACK_SERVERS`].
pub fn fallback_servers() -> Vec<SocketAddr> {
    FALLBACK_SERVERS
        .iter()
        .filter_map(|(_, addr)| addr.parse().ok())
        .collect()
}

/// A random entry of [`FALLBACK_SERVERS`].
pub fn random_fallback() -> Result<SocketAddr> {
    fallback_servers()
        .choose(&mut rand::thread_rng())
        .copied()
        .ok_or_else(|| ProtocolError::DirectoryError("no fallback servers".into()))
}

#[derive(Debug, Deserialize)]
struct DirectoryEnvelope {
    response: DirectoryResponse,
}

#[derive(Debug, Deserialize)]
struct DirectoryResponse {
    #[serde(default)]
    serverlist: Vec<String>,
    #[serde(default)]
    result: i32,
    #[serde(default)]
    message: Option<String>,
}

/// Parses a `GetCMList` JSON body into socket addresses.
///
/// Unparseable entries are skipped.
///
/// # Errors
/// `DirectoryError` when the body is malformed, `result` is not 1, or no
/// usable address remains.
pub fn parse_response(body: &str) -> Result<Vec<SocketAddr>> {
    let envelope: DirectoryEnvelope = serde_json::from_str(body)
        .map_err(|e| ProtocolError::DirectoryError(format!("malformed directory response: {e}")))?;
    let response = envelope.response;

    if response.result != 1 {
        return Err(ProtocolError::DirectoryError(format!(
            "directory returned result {}: {}",
            response.result,
            response.message.unwrap_or_default()
        )));
    }

    let servers: Vec<SocketAddr> = response
        .serverlist
        .iter()
        .filter_map(|entry| match entry.parse() {
            Ok(addr) => Some(addr),
            Err(_) => {
                debug!(entry = %entry, "skipping unparseable server entry");
                None
            }
        })
        .collect();

    if servers.is_empty() {
        return Err(ProtocolError::DirectoryError(
            "directory returned no servers".into(),
        ));
    }
    Ok(servers)
}

/// Cached list of CM servers.
#[derive(Debug)]
pub struct ServerDirectory {
    config: DirectoryConfig,
    http: reqwest::Client,
    servers: RwLock<Vec<SocketAddr>>,
    initialized: AtomicBool,
}

impl ServerDirectory {
    /// Creates an empty, uninitialized directory.
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProtocolError::DirectoryError(e.to_string()))?;

        Ok(Self {
            config,
            http,
            servers: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
        })
    }

    /// Fetches the server list and replaces the cache with it.
    ///
    /// Returns the number of servers cached. On failure the previous cache
    /// is left untouched.
    #[instrument(skip(self), fields(cell_id = self.config.cell_id))]
    pub async fn initialize(&self) -> Result<usize> {
        let _timer = Timer::start("directory_fetch");
        let response = self
            .http
            .get(&self.config.url)
            .query(&[("cellid", self.config.cell_id)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProtocolError::DirectoryError(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| ProtocolError::DirectoryError(e.to_string()))?;

        let servers = match parse_response(&body) {
            Ok(servers) => servers,
            Err(e) => {
                warn!(error = %e, "directory lookup failed");
                return Err(e);
            }
        };

        let count = servers.len();
        self.set_servers(servers);
        info!(count, "server directory initialized");
        Ok(count)
    }

    /// Same as [`initialize`](Self::initialize); provided for periodic use.
    pub async fn refresh(&self) -> Result<usize> {
        self.initialize().await
    }

    /// Replaces the cache, e.g. with a list pushed over a CM connection.
    /// An empty list clears the cache and marks it uninitialized.
    pub fn set_servers(&self, servers: Vec<SocketAddr>) {
        let initialized = !servers.is_empty();
        match self.servers.write() {
            Ok(mut cache) => *cache = servers,
            Err(poisoned) => *poisoned.into_inner() = servers,
        }
        self.initialized.store(initialized, Ordering::Release);
    }

    pub fn servers(&self) -> Vec<SocketAddr> {
        match self.servers.read() {
            Ok(cache) => cache.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Picks a random cached server.
    ///
    /// # Errors
    /// `DirectoryError` when the cache is empty.
    pub fn get_random(&self) -> Result<SocketAddr> {
        self.servers()
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| ProtocolError::DirectoryError("server directory is empty".into()))
    }
}
