// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge server lifecycle: bind, serve in a background task, shut down on
// request. In-flight requests are allowed to finish.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::ServerStatus;

use crate::api::create_router;
use crate::state::AppState;

pub struct BridgeServer {
    /// Address to bind, e.g. `0.0.0.0:3001`.
    listen_addr: String,
    status: ServerStatus,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl BridgeServer {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            local_addr: None,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// The bound address once running (useful when binding port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind and start serving. Calling this while running is a no-op.
    pub async fn start(&mut self, state: AppState) -> Result<SocketAddr> {
        if let (ServerStatus::Running, Some(addr)) = (self.status, self.local_addr) {
            debug!(addr = %addr, "bridge server already running");
            return Ok(addr);
        }

        self.status = ServerStatus::Starting;
        let listener = match TcpListener::bind(&self.listen_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Error;
                return Err(PrintError::Config(format!("bind {}: {}", self.listen_addr, e)));
            }
        };
        let addr = listener.local_addr()?;

        let app = create_router(state);
        let shutdown = Arc::clone(&self.shutdown_signal);
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "bridge server terminated");
            }
        });

        info!(addr = %addr, "bridge server listening");
        self.task_handle = Some(handle);
        self.local_addr = Some(addr);
        self.status = ServerStatus::Running;
        Ok(addr)
    }

    /// Stop accepting connections and wait for the serve task to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!("stopping bridge server");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| PrintError::Config(format!("server task join: {e}")))?;
        }

        self.local_addr = None;
        self.status = ServerStatus::Stopped;
        info!("bridge server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escbridge_core::BridgeConfig;
    use escbridge_print::InMemoryPrinterRegistry;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn state() -> AppState {
        AppState::new(
            BridgeConfig::default(),
            Box::new(InMemoryPrinterRegistry::new()),
        )
    }

    #[tokio::test]
    async fn serves_health_then_stops() {
        let mut server = BridgeServer::new("127.0.0.1:0");
        assert_eq!(server.status(), ServerStatus::Stopped);

        let addr = server.start(state()).await.unwrap();
        assert_eq!(server.status(), ServerStatus::Running);
        assert_eq!(server.local_addr(), Some(addr));

        let mut socket = TcpStream::connect(addr).await.unwrap();
        socket
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        socket.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"service\":\"escbridge\""));

        server.stop().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn bind_failure_marks_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let mut server = BridgeServer::new(addr.to_string());
        assert!(matches!(server.start(state()).await, Err(PrintError::Config(_))));
        assert_eq!(server.status(), ServerStatus::Error);
    }

    #[tokio::test]
    async fn stop_when_stopped_is_noop() {
        let mut server = BridgeServer::new("127.0.0.1:0");
        server.stop().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Stopped);
    }
}
