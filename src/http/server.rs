//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Own the route table, start hooks, metrics handles and shutdown coordinator
//! - Assemble the axum Router (health check, adapted routes, layers)
//! - Run start hooks, then serve until the shutdown signal resolves
//! - Start and stop the task sampler with the server

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinError;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use thiserror::Error;

use crate::config::ServerConfig;
use crate::envelope::BoxError;
use crate::handler::bind::BindLimits;
use crate::lifecycle::{shutdown_signal, Shutdown};
use crate::net::{self, ConnectionSettings, ListenerError};
use crate::observability::{ServerMetrics, TaskSampler};
use crate::pipeline::Pipeline;
use crate::routing::{RouteError, RouteTable, Router, Routes};

/// Runs once, in registration order, right before the server starts serving.
pub type StartHook = Box<dyn FnOnce(&mut Server) -> Result<(), BoxError> + Send>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("start hook {index} failed: {source}")]
    Hook {
        index: usize,
        #[source]
        source: BoxError,
    },

    #[error("failed to add routes: {0}")]
    Routes(#[from] RouteError),

    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}

/// One HTTP server instance.
pub struct Server {
    config: ServerConfig,
    table: RouteTable,
    hooks: Vec<StartHook>,
    metrics: Arc<ServerMetrics>,
    shutdown: Shutdown,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            table: RouteTable::new(),
            hooks: Vec::new(),
            metrics: Arc::new(ServerMetrics::new()),
            shutdown: Shutdown::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Handle for stopping a running server from elsewhere.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Direct access to the registration interface.
    pub fn routes_mut(&mut self) -> &mut dyn Router {
        &mut self.table
    }

    /// Queue a hook to run before serving.
    pub fn on_start<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnOnce(&mut Server) -> Result<(), BoxError> + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Register a route table. Bindings made before a failure stay registered.
    pub fn add_routes(&mut self, routes: &dyn Routes) -> Result<(), RouteError> {
        routes.register(&mut self.table).inspect_err(|e| {
            tracing::error!(error = %e, "failed to add routes");
        })
    }

    /// Assemble the axum Router for everything registered so far.
    #[allow(deprecated)]
    pub fn router(&self) -> axum::Router {
        let limits = BindLimits {
            max_body_bytes: self.config.max_body_bytes,
            read_timeout: self.config.read_timeout(),
        };
        let pipeline = Arc::new(Pipeline::new(self.metrics.clone(), limits));
        let ping = self.config.ping_path();

        let mut router = self.table.into_axum(pipeline, ping.as_deref());
        // A transport cutoff: the request task still runs to completion and
        // records its outcome.
        if let Some(timeout) = self.config.write_timeout() {
            router = router.layer(TimeoutLayer::new(timeout));
        }
        if self.config.debug {
            router = router.layer(TraceLayer::new_for_http());
        }
        router
    }

    fn run_hooks(&mut self) -> Result<(), ServerError> {
        let mut index = 0;
        while !self.hooks.is_empty() {
            let hooks = std::mem::take(&mut self.hooks);
            for hook in hooks {
                hook(self).map_err(|source| ServerError::Hook { index, source })?;
                index += 1;
            }
        }
        Ok(())
    }

    /// Serve on `listener` until `signal` resolves, then drain for at most
    /// the configured shutdown timeout.
    pub async fn run<F>(mut self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        self.run_hooks()?;

        let app = self.router();
        for (method, path) in self.table.bindings() {
            tracing::debug!(method = %method, path = %path, "route bound");
        }

        let local_addr = listener.local_addr().map_err(ListenerError::LocalAddr)?;
        tracing::info!(
            address = %local_addr,
            routes = self.table.len(),
            "http server is starting"
        );

        let sampler = TaskSampler::new(
            self.metrics.clone(),
            self.config.observability.sample_interval(),
        )
        .spawn(self.shutdown.subscribe());

        let mut serving = tokio::spawn(net::serve(
            listener,
            app,
            ConnectionSettings::from_config(&self.config),
            self.shutdown.subscribe(),
        ));

        let result = tokio::select! {
            _ = signal => {
                self.shutdown.trigger();
                (&mut serving).await
            }
            finished = &mut serving => {
                self.shutdown.trigger();
                finished
            }
        };

        sampler.await?;
        result?;

        tracing::info!("http server stopped");
        Ok(())
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = net::bind(&self.config.addr).await?;
        self.run(listener, shutdown_signal()).await
    }
}
