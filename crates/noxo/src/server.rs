//! `NoxoServer` builder and accept loop.
//!
//! This is the entry point for running the server. It ties the layers
//! together: transport → protocol → session → room.

use std::sync::Arc;

use noxo_room::RoomRegistry;
use noxo_session::ClientRegistry;
use noxo_transport::TcpLineListener;
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{heartbeat, ServerConfig, ServerError};

/// Shared server state passed to each connection worker.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The two
/// mutexes are the server's only locks; when both are needed, the client
/// lock is taken before the room lock, consistently.
pub(crate) struct ServerState {
    pub(crate) clients: Mutex<ClientRegistry>,
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,no_run
/// use noxo::{NoxoServer, ServerConfig};
///
/// # async fn run() -> Result<(), noxo::ServerError> {
/// let server = NoxoServer::builder()
///     .config(ServerConfig::default())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct NoxoServerBuilder {
    bind_addr: Option<String>,
    config: ServerConfig,
}

impl NoxoServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: None,
            config: ServerConfig::default(),
        }
    }

    /// Overrides the listen address (otherwise taken from the config).
    /// Tests bind to `127.0.0.1:0` for an ephemeral port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Sets the server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build(self) -> Result<NoxoServer, ServerError> {
        let addr = self
            .bind_addr
            .unwrap_or_else(|| self.config.socket_addr());
        let listener = TcpLineListener::bind(&addr).await?;

        let state = Arc::new(ServerState {
            clients: Mutex::new(ClientRegistry::new(self.config.max_clients)),
            rooms: Mutex::new(RoomRegistry::new(self.config.max_rooms)),
            config: self.config,
        });
        Ok(NoxoServer { listener, state })
    }
}

impl Default for NoxoServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running noxo server.
///
/// Call [`run()`](Self::run) to start the heartbeat task and accept
/// connections.
pub struct NoxoServer {
    listener: TcpLineListener,
    state: Arc<ServerState>,
}

impl NoxoServer {
    /// Creates a new builder.
    pub fn builder() -> NoxoServerBuilder {
        NoxoServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the server: spawns the heartbeat/pruner task, then accepts
    /// connections and spawns a worker per client until the process is
    /// terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        heartbeat::spawn(Arc::clone(&self.state));
        tracing::info!("noxo server running");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(handle_connection(conn, state));
                }
                Err(err) => {
                    tracing::error!(%err, "accept failed");
                }
            }
        }
    }
}
