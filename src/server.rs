use crate::config::ProxyConfig;
use crate::proxy::ProxyHandler;
use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub struct ProxyServer {
    config: Arc<ProxyConfig>,
    handler: Arc<ProxyHandler>,
}

impl ProxyServer {
    /// Create a new proxy server
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let config = Arc::new(config);
        let handler = Arc::new(ProxyHandler::new((*config).clone())?);

        Ok(Self { config, handler })
    }

    /// Run the proxy server
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .listen_addr()
            .parse()
            .context("Invalid listen address")?;

        let listener = TcpListener::bind(&addr)
            .await
            .context(format!("Failed to bind to {}", addr))?;

        info!(
            "Proxy server listening on {} (auth: {}, allowed patterns: {})",
            addr,
            self.config.auth_enabled(),
            self.config.allowed_hosts.len()
        );

        let server = Arc::new(self);

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let server = Arc::clone(&server);

            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                    error!("Connection error from {}: {}", peer_addr, e);
                }
            });
        }
    }

    /// Handle a single connection
    async fn handle_connection(
        &self,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        let io = TokioIo::new(stream);
        let handler: Arc<ProxyHandler> = Arc::clone(&self.handler);

        let service = service_fn(move |req| {
            let handler = Arc::clone(&handler);
            async move { Ok::<_, Infallible>(handler.handle_request(req, peer_addr).await) }
        });

        http1::Builder::new()
            .serve_connection(io, service)
            .await
            .context("Failed to serve connection")?;

        Ok(())
    }
}
