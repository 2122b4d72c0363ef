//! Server configuration: defaults, the flat key=value file, and the CLI
//! port override.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration, populated once at startup and read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IPv4 address the listener binds to.
    pub bind_address: Ipv4Addr,
    /// TCP port the listener binds to.
    pub port: u16,
    /// Cap on simultaneously active rooms.
    pub max_rooms: usize,
    /// Cap on simultaneously connected clients.
    pub max_clients: usize,
    /// How long a vacated slot stays reconnect-eligible.
    pub disconnect_grace: Duration,
    /// Interval between heartbeat sweeps. Not a config-file key; tests
    /// shorten it programmatically.
    pub heartbeat_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: 10_000,
            max_rooms: 16,
            max_clients: 128,
            disconnect_grace: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a flat key=value file. A missing file
    /// yields the defaults; unknown keys and unparsable values are
    /// ignored (the latter with a warning).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(_) => {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> Self {
        let mut config = Self::default();
        for (lineno, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    config.apply(key.trim(), value.trim())
                }
                None => tracing::warn!(
                    line = lineno + 1,
                    "configuration line is not key=value, skipping"
                ),
            }
        }
        config
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "PORT" => match value.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(value, "invalid PORT, keeping default"),
            },
            "MAX_ROOMS" => match value.parse() {
                Ok(n) => self.max_rooms = n,
                Err(_) => tracing::warn!(value, "invalid MAX_ROOMS, keeping default"),
            },
            "MAX_CLIENTS" => match value.parse() {
                Ok(n) => self.max_clients = n,
                Err(_) => tracing::warn!(value, "invalid MAX_CLIENTS, keeping default"),
            },
            "BIND_ADDRESS" => match value.parse() {
                Ok(addr) => self.bind_address = addr,
                Err(_) => tracing::warn!(value, "invalid BIND_ADDRESS, keeping default"),
            },
            "DISCONNECT_GRACE" => match value.parse() {
                Ok(secs) => self.disconnect_grace = Duration::from_secs(secs),
                Err(_) => {
                    tracing::warn!(value, "invalid DISCONNECT_GRACE, keeping default")
                }
            },
            _ => tracing::debug!(key, "ignoring unknown configuration key"),
        }
    }

    /// The `address:port` string the listener binds to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

// =========================================================================
// Tests
// =========================================================================
