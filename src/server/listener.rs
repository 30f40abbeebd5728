//! Viewer WebSocket listener
//!
//! Handles the TCP accept loop and runs one viewer session per WebSocket
//! connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::{Result, WallError};
use crate::registry::Broadcaster;
use crate::server::config::ServerConfig;
use crate::session::{ViewerSession, ViewerTransport};

/// Outbound half of a viewer WebSocket
struct WsTransport {
    sink: SplitSink<WebSocketStream<TcpStream>, Message>,
}

impl ViewerTransport for WsTransport {
    async fn send(&mut self, payload: &str) -> Result<()> {
        self.sink
            .send(Message::text(payload.to_owned()))
            .await
            .map_err(|e| WallError::Transport(e.to_string()))
    }
}

/// Live wall WebSocket server
pub struct WallServer {
    config: ServerConfig,
    broadcaster: Arc<Broadcaster>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl WallServer {
    /// Create a server feeding viewers from `broadcaster`
    pub fn new(config: ServerConfig, broadcaster: Arc<Broadcaster>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            broadcaster,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server until the process exits
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Bind and run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve viewers on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, path = %self.config.path, "Wall server listening");

        let tick_handle = self.broadcaster.spawn_session_tick();
        let stats_handle = self.spawn_stats_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        tick_handle.abort();
        if let Some(handle) = stats_handle {
            handle.abort();
        }

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let permit = match self.connection_semaphore {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let config = self.config.clone();
        let broadcaster = Arc::clone(&self.broadcaster);

        tokio::spawn(async move {
            if let Err(e) = serve_viewer(socket, config, broadcaster, permit).await {
                tracing::debug!(
                    connection_id = connection_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(connection_id = connection_id, "Connection closed");
        });
    }

    fn spawn_stats_task(&self) -> Option<JoinHandle<()>> {
        if self.config.stats_interval.is_zero() {
            return None;
        }

        let broadcaster = Arc::clone(&self.broadcaster);
        let period = self.config.stats_interval;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let stats = broadcaster.stats();
                tracing::info!(
                    viewers = stats.current_viewers,
                    total_viewers = stats.total_viewers,
                    items = stats.items_published,
                    item_rate = stats.item_rate(),
                    malformed = stats.malformed_items,
                    queue_drops = stats.queue_drops,
                    upstream_connects = stats.upstream_connects,
                    upstream_failures = stats.upstream_failures,
                    "Wall stats"
                );
            }
        }))
    }
}

/// Run one viewer connection to completion
async fn serve_viewer(
    socket: TcpStream,
    config: ServerConfig,
    broadcaster: Arc<Broadcaster>,
    _permit: Option<OwnedSemaphorePermit>,
) -> Result<()> {
    let path = config.path;
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let ws = timeout(
        config.handshake_timeout,
        tokio_tungstenite::accept_hdr_async(socket, check_path),
    )
    .await
    .map_err(|_| WallError::Timeout("websocket handshake"))?
    .map_err(|e| WallError::Transport(e.to_string()))?;

    let session = Arc::new(ViewerSession::connect(&broadcaster));
    let (sink, mut source) = ws.split();

    // Inbound frames are ignored; the reader only watches for the close
    let reader_session = Arc::clone(&session);
    let reader = tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        reader_session.disconnect();
    });

    let mut transport = WsTransport { sink };
    let delivered = session.deliver(&mut transport).await;

    reader.abort();
    session.disconnect();
    let _ = transport.sink.close().await;

    tracing::debug!(
        viewer_id = %session.id(),
        connected_secs = session.connected_for().as_secs(),
        dropped = session.dropped(),
        "Viewer session ended"
    );

    delivered
}
