//! TCP accept loop and per-connection HTTP serving.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Serve HTTP/1.1 and HTTP/2 on every accepted connection
//! - Apply header size and header read limits at the connection level
//! - Drain live connections on shutdown, bounded by a timeout

use std::net::SocketAddr;
use std::time::Duration;

use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::{conn::auto::Builder, graceful::GracefulShutdown},
    service::TowerToHyperService,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use super::connection::ConnectionTracker;
use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Connection-level settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub max_header_bytes: usize,
    pub header_read_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_header_bytes: config.max_header_bytes(),
            header_read_timeout: config.read_header_timeout(),
            idle_timeout: config.idle_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    fn builder(&self) -> Builder<TokioExecutor> {
        let mut builder = Builder::new(TokioExecutor::new());

        let mut http1 = builder.http1();
        http1.timer(TokioTimer::new()).max_buf_size(self.max_header_bytes);
        if let Some(timeout) = self.header_read_timeout {
            http1.header_read_timeout(timeout);
        }

        let mut http2 = builder.http2();
        http2.timer(TokioTimer::new());
        if let Some(interval) = self.idle_timeout {
            http2.keep_alive_interval(interval);
        }

        builder
    }
}

/// Bind a TCP listener on `addr`.
pub async fn bind(addr: &str) -> Result<TcpListener, ListenerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    let local_addr = listener.local_addr().map_err(ListenerError::LocalAddr)?;
    tracing::info!(address = %local_addr, "listener bound");

    Ok(listener)
}

/// Serve `app` on `listener` until `shutdown` fires, then drain.
///
/// Draining stops after `settings.shutdown_timeout`; connections still open
/// at that point are abandoned.
pub async fn serve(
    listener: TcpListener,
    app: axum::Router,
    settings: ConnectionSettings,
    mut shutdown: broadcast::Receiver<()>,
) {
    let builder = settings.builder();
    let graceful = GracefulShutdown::new();
    let tracker = ConnectionTracker::new();

    loop {
        let (stream, peer_addr): (_, SocketAddr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            },
            _ = shutdown.recv() => break,
        };

        let guard = tracker.track(peer_addr);

        let service = TowerToHyperService::new(app.clone());
        let conn = builder
            .serve_connection_with_upgrades(TokioIo::new(stream), service)
            .into_owned();
        let conn = graceful.watch(conn);

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(
                    connection_id = %guard.id(),
                    peer_addr = %guard.peer(),
                    error = %e,
                    "connection error"
                );
            }
            drop(guard);
        });
    }

    drop(listener);
    tracing::info!(
        connections = tracker.active_count(),
        timeout_ms = settings.shutdown_timeout.as_millis() as u64,
        "draining connections"
    );

    match tokio::time::timeout(settings.shutdown_timeout, graceful.shutdown()).await {
        Ok(()) => tracing::info!("all connections closed"),
        Err(_) => tracing::warn!(
            connections = tracker.active_count(),
            "drain timed out, abandoning open connections"
        ),
    }
}
