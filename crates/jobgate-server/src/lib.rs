use std::net::SocketAddr;
use std::sync::Arc;

use jobgate_engine::{LogSink, MemoryRegistry, MemoryStorage, SeedData, SubmissionEngine};
pub use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub mod api;
pub mod config;
pub mod envelope;
mod error;

pub use config::{LogConfig, ServerConfig};
pub use error::{Result, ServerError};

/// Shared state handed to every request handler
pub struct AppState {
    pub engine: Arc<SubmissionEngine>,
}

impl AppState {
    pub fn new(engine: Arc<SubmissionEngine>) -> Self {
        Self { engine }
    }

    /// Build an engine over in-memory collaborators seeded from the
    /// configured seed file, if any.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let seed = match &config.seed_path {
            Some(path) => {
                info!(path = %path.display(), "loading seed data");
                SeedData::load(path).map_err(|e| ServerError::Config(e.to_string()))?
            }
            None => SeedData::default(),
        };

        let engine = SubmissionEngine::new(
            Arc::new(MemoryStorage::from_seed(&seed)),
            Arc::new(LogSink),
            Arc::new(MemoryRegistry::new(seed.instances)),
        )?
        .with_policy(config.scheduling);

        Ok(Self::new(Arc::new(engine)))
    }
}

pub struct ServerBuilder {
    listen_address: Option<SocketAddr>,
    state: Option<Arc<AppState>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            listen_address: None,
            state: None,
        }
    }

    pub fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = Some(listen_address);
        self
    }

    pub fn with_state(mut self, state: Arc<AppState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> Result<Server> {
        let listen_address = self.listen_address.ok_or(ServerError::MissingListenAddress)?;
        let state = self.state.ok_or(ServerError::MissingState)?;
        Ok(Server {
            listen_address,
            state,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Server {
    listen_address: SocketAddr,
    state: Arc<AppState>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    pub fn router(&self) -> axum::Router {
        api::router(self.state.clone())
    }

    /// Serve until `cancel_token` is cancelled
    pub async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;

        match listener.local_addr() {
            Ok(addr) => info!("HTTP API listening on {}", addr),
            Err(e) => error!("Failed to get local address: {}", e),
        }

        let signal = async move {
            cancel_token.cancelled().await;
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;

        info!("Server shutdown complete");
        Ok(())
    }
}
