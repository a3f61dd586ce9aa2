//! # Client Configuration
//!
//! Settings for the CM connection, the log-on request, the server
//! directory and logging, grouped into one [`ClientConfig`].
//!
//! A config can be built from defaults, read from TOML (`from_toml`,
//! `from_file`) or seeded from `STEAM_PROTOCOL_*` environment variables
//! (`from_env`). [`ClientConfig::validate`] collects every problem at once;
//! [`Client::new`](crate::service::client::Client::new) refuses a config
//! that reports any.

use crate::error::{ProtocolError, Result};
use crate::protocol::emsg::EUniverse;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Frame magic ("VT01" read as a little-endian u32)
pub const TCP_CONNECTION_MAGIC: u32 = 0x3130_5456;

/// Largest frame payload accepted by default (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Protocol version advertised in the log-on request
pub const PROTOCOL_VERSION: u32 = 65575;

/// Heartbeat interval used when the server does not dictate one
pub const DEFAULT_HEARTBEAT_SECONDS: u32 = 9;

/// Default CM directory endpoint
pub const DEFAULT_DIRECTORY_URL: &str = "https://api.steampowered.com/ISteamDirectory/GetCMList/v1/";

const ENV_PREFIX: &str = "STEAM_PROTOCOL_";

fn config_error(context: &str, err: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::ConfigError(format!("{context}: {err}"))
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub login: LoginConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Reads and parses a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error(&format!("cannot read {}", path.display()), e))?;
        Self::from_toml(&text)
    }

    /// Parses TOML text. Missing sections fall back to their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| config_error("invalid TOML", e))
    }

    /// Defaults overridden by `STEAM_PROTOCOL_*` variables.
    ///
    /// Numeric variables that fail to parse are ignored; an unknown
    /// universe name is an error since connecting to the wrong realm
    /// cannot succeed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("CONNECT_TIMEOUT_MS") {
            config.connection.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(name) = env_var("UNIVERSE") {
            config.connection.universe = parse_universe(&name)?;
        }
        if let Some(url) = env_var("DIRECTORY_URL") {
            config.directory.url = url;
        }
        if let Some(cell) = env_parse::<u32>("CELL_ID") {
            config.directory.cell_id = cell;
        }
        if let Some(language) = env_var("LANGUAGE") {
            config.login.client_language = language;
        }

        Ok(config)
    }

    /// Defaults with a closure applied on top.
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// The default configuration rendered as TOML, for seeding a config file.
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| config_error("cannot render TOML", e))?;
        let path = path.as_ref();
        std::fs::write(path, text)
            .map_err(|e| config_error(&format!("cannot write {}", path.display()), e))
    }

    /// Every problem found across all sections; empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        self.connection
            .validate()
            .into_iter()
            .chain(self.login.validate())
            .chain(self.directory.validate())
            .chain(self.logging.validate())
            .collect()
    }

    /// Like [`validate`](Self::validate), folding the problems into one error.
    pub fn validate_strict(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(ProtocolError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            problems.join("\n  - ")
        )))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|raw| raw.trim().parse().ok())
}

fn parse_universe(name: &str) -> Result<EUniverse> {
    match name.trim().to_ascii_lowercase().as_str() {
        "public" => Ok(EUniverse::Public),
        "beta" => Ok(EUniverse::Beta),
        "internal" => Ok(EUniverse::Internal),
        "dev" => Ok(EUniverse::Dev),
        other => Err(ProtocolError::ConfigError(format!(
            "Unknown universe in {ENV_PREFIX}UNIVERSE: {other}"
        ))),
    }
}

/// Socket and framing settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Bound on the TCP connect, in milliseconds when serialized
    #[serde(with = "millis")]
    pub connect_timeout: Duration,

    /// Universe the server must advertise in its encryption request
    pub universe: EUniverse,

    /// Largest frame payload the codec accepts
    pub max_payload_size: usize,

    /// Local address to bind before connecting
    #[serde(default)]
    pub bind_address: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: timeout::DEFAULT_TIMEOUT,
            universe: EUniverse::Public,
            max_payload_size: MAX_PAYLOAD_SIZE,
            bind_address: None,
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.connect_timeout < Duration::from_millis(100) {
            problems.push("Connect timeout too short (minimum: 100ms)".to_owned());
        } else if self.connect_timeout > Duration::from_secs(300) {
            problems.push("Connect timeout too long (maximum: 300s)".to_owned());
        }

        if self.universe == EUniverse::Invalid {
            problems.push("Universe cannot be 'invalid'".to_owned());
        }

        match self.max_payload_size {
            n if n < 1024 => problems.push(format!("Max payload size too small: {n} bytes (minimum: 1 KB)")),
            n if n > 100 * 1024 * 1024 => {
                problems.push(format!("Max payload size too large: {n} bytes (maximum: 100 MB)"))
            }
            _ => {}
        }

        if let Some(bind) = &self.bind_address {
            if bind.parse::<std::net::SocketAddr>().is_err() {
                problems.push(format!("Invalid bind address '{bind}' (expected ip:port)"));
            }
        }

        problems
    }
}

/// Fields copied into every log-on request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginConfig {
    pub client_language: String,

    pub protocol_version: u32,

    /// Ask the server for a login key so later log-ons can skip the password
    pub should_remember_password: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            client_language: "english".into(),
            protocol_version: PROTOCOL_VERSION,
            should_remember_password: false,
        }
    }
}

impl LoginConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.client_language.trim().is_empty() {
            problems.push("Client language cannot be empty".to_owned());
        }
        if self.protocol_version == 0 {
            problems.push("Protocol version must be greater than 0".to_owned());
        }
        problems
    }
}

/// Where and how the CM server list is fetched
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    pub url: String,

    /// Cell id sent with the request; the directory favours servers near it
    pub cell_id: u32,

    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DIRECTORY_URL.into(),
            cell_id: 0,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl DirectoryConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.url.is_empty() {
            problems.push("Directory URL cannot be empty".to_owned());
        } else if !["http://", "https://"].iter().any(|scheme| self.url.starts_with(scheme)) {
            problems.push(format!("Directory URL must be http(s): '{}'", self.url));
        }

        if self.request_timeout < Duration::from_millis(100) {
            problems.push("Directory request timeout too short (minimum: 100ms)".to_owned());
        }

        problems
    }
}

/// Settings for [`init_logging`](crate::utils::logging::init_logging)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Tag attached to the startup log line
    pub app_name: String,

    /// Level used when `RUST_LOG` is unset
    #[serde(with = "level_name")]
    pub log_level: Level,

    pub log_to_console: bool,

    /// Emit JSON lines instead of the human-readable format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: "steam-protocol".into(),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let len = self.app_name.len();
        if len == 0 {
            vec!["Application name cannot be empty".to_owned()]
        } else if len > 64 {
            vec![format!("Application name too long: {len} characters (maximum: 64)")]
        } else {
            Vec::new()
        }
    }
}

/// `Duration` as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// `tracing::Level` as its lowercase name
mod level_name {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| D::Error::custom(format!("unknown log level '{name}'")))
    }
}
