//! HTTP server configuration and startup

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

use overwatch_collector::QueryService;
use overwatch_core::ServerConfig;

use crate::routes::build_router;

/// HTTP server wrapper
pub struct HttpServer {
    config: ServerConfig,
    query: QueryService,
}

impl HttpServer {
    pub fn new(config: ServerConfig, query: QueryService) -> Self {
        Self { config, query }
    }

    /// Get server address
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr = self.config.socket_addr()?;
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))
    }

    /// Serve on an already bound listener until `shutdown` fires
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        let local = listener.local_addr()?;
        info!("HTTP server listening on {}", local);

        axum::serve(listener, build_router(self.query.clone()))
            .with_graceful_shutdown(async {
                shutdown.await.ok();
                info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }

    /// Bind and serve with graceful shutdown
    pub async fn start_with_shutdown(&self, shutdown: oneshot::Receiver<()>) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}

/// Builder for server configuration
pub struct HttpServerBuilder {
    config: ServerConfig,
    query: Option<QueryService>,
}

impl HttpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            query: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn query(mut self, query: QueryService) -> Self {
        self.query = Some(query);
        self
    }

    /// Returns `None` until a query service is supplied
    pub fn build(self) -> Option<HttpServer> {
        self.query.map(|query| HttpServer::new(self.config, query))
    }
}

impl Default for HttpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
