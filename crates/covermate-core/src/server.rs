//! Server runtime: wires configuration, tools, and transports together.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use covermate_config::{AppConfig, ConfigError};

use crate::http::{self, HttpState};
use crate::mcp::{self, CovermateService, ProtocolError};
use crate::process::{CommandRunner, HostRunner};
use crate::tools::{ToolContext, ToolRegistry};

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// Errors from the server runtime.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// The covermate server: one tool context behind HTTP or stdio.
pub struct Server {
    config: AppConfig,
    ctx: Arc<ToolContext>,
    registry: Arc<ToolRegistry>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl Server {
    /// Build a server that runs commands on the host.
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        Self::with_runner(config, Arc::new(HostRunner))
    }

    /// Build a server with a custom command runner.
    pub fn with_runner(
        config: AppConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let ctx = ToolContext::from_config(&config, runner)?;
        info!(
            root = %ctx.maven.paths().root.display(),
            report = %ctx.report_path().display(),
            "Project resolved"
        );
        let ctx = Arc::new(ctx);
        let registry = Arc::new(ToolRegistry::with_defaults(Arc::clone(&ctx)));
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            config,
            ctx,
            registry,
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Bind the configured address and serve HTTP until shutdown or Ctrl-C.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = format!(
            "{}:{}",
            self.config.server.listen_addr, self.config.server.listen_port
        );
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.run_on(listener).await
    }

    /// Serve HTTP on an already-bound listener until shutdown or Ctrl-C.
    pub async fn run_on(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!(
            version = %crate::build_info::version_string(),
            "covermate server starting"
        );

        let state = Arc::new(HttpState::new(Arc::clone(&self.registry)));
        let shutdown_rx = self.shutdown_tx.subscribe();

        let tx = self.shutdown_tx.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, initiating graceful shutdown");
                let _ = tx.send(ShutdownSignal);
            }
        });

        let result = http::serve(listener, state, shutdown_rx).await;
        ctrl_c.abort();
        result?;

        info!("Server stopped");
        Ok(())
    }

    /// Speak the tool protocol on stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> Result<(), ServerError> {
        mcp::serve_stdio(CovermateService::new(Arc::clone(&self.ctx))).await?;
        Ok(())
    }

    /// Request a graceful shutdown of the HTTP server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_server_creation() {
        let server = Server::new(AppConfig::default()).unwrap();
        assert_eq!(server.config().server.listen_port, 8000);
        assert_eq!(server.registry().names().len(), 5);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.project.root = String::new();
        assert!(matches!(
            Server::new(config),
            Err(ServerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_http() {
        let server = Arc::new(Server::new(AppConfig::default()).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let running = Arc::clone(&server);
        let handle = tokio::spawn(async move { running.run_on(listener).await });

        // Give the server a moment to subscribe before signalling.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        server.shutdown();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
