//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Log server implementation
//!
//! The LogServer ties the pieces together. It owns the listener and the access filter, runs the
//! accept loop, and hands every admitted connection to the WorkerSupervisor.

use crate::{
    AccessFilter, MessageSink, Result, SecureListener, ServerConfig, ServerMetrics,
    ServerSnapshot, ServiceError, ShutdownReport, TlsIdentity, WorkerSupervisor,
};
use metrics::counter;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Back-off after a failed `accept()`
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Secure log collection server
///
/// A server is started once and shut down once.
///
/// # Example
///
/// ```no_run
/// use seclog_service::{LogServer, ServerConfig, StdoutSink};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::default().with_cert_path("cert.pem");
///     let server = LogServer::bind(config).await?;
///
///     server.start(Arc::new(StdoutSink::new())).await?;
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await?;
///
///     Ok(())
/// }
/// ```
pub struct LogServer {
    config: ServerConfig,
    filter: Arc<AccessFilter>,
    supervisor: Arc<WorkerSupervisor>,
    metrics: Arc<ServerMetrics>,
    /// Moved into the accept loop by `start`; dropped with it so the socket closes on shutdown
    listener: Mutex<Option<SecureListener>>,
    local_addr: SocketAddr,
    started_at: Instant,
    running: AtomicBool,
    accept_stop: CancellationToken,
    accept_handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogServer {
    /// Load TLS material and the allow-list, then bind
    ///
    /// Every startup failure surfaces here, before any connection is served.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate().map_err(ServiceError::Config)?;

        let identity = TlsIdentity::load(&config.cert_path, config.key_path())?;
        let filter = match &config.allow_list {
            Some(path) => AccessFilter::load(path)?,
            None => AccessFilter::allow_all(),
        };
        let listener = SecureListener::bind(config.bind_address, &identity).await?;

        Ok(Self::from_parts(config, listener, filter))
    }

    /// Assemble a server from an already bound listener
    pub fn from_parts(config: ServerConfig, listener: SecureListener, filter: AccessFilter) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        let supervisor = Arc::new(WorkerSupervisor::new(
            config.worker_config(),
            metrics.clone(),
        ));
        let local_addr = listener.local_addr();

        info!(
            address = %local_addr,
            allow_list = filter.is_enabled(),
            max_connections = config.max_connections,
            "Log server bound"
        );

        Self {
            config,
            filter: Arc::new(filter),
            supervisor,
            metrics,
            listener: Mutex::new(Some(listener)),
            local_addr,
            started_at: Instant::now(),
            running: AtomicBool::new(false),
            accept_stop: CancellationToken::new(),
            accept_handle: Mutex::new(None),
        }
    }

    /// Start accepting connections
    ///
    /// Every decoded message is handed to `sink`.
    pub async fn start(&self, sink: Arc<dyn MessageSink>) -> Result<()> {
        let Some(listener) = self.listener.lock().await.take() else {
            return Err(if self.accept_stop.is_cancelled() {
                ServiceError::ShutDown
            } else {
                ServiceError::AlreadyRunning
            });
        };
        self.running.store(true, Ordering::SeqCst);

        info!(address = %self.local_addr, "Starting log server");

        let accept_loop = AcceptLoop {
            listener,
            filter: self.filter.clone(),
            supervisor: self.supervisor.clone(),
            metrics: self.metrics.clone(),
            sink,
            max_connections: self.config.max_connections,
            stop: self.accept_stop.clone(),
        };
        *self.accept_handle.lock().await = Some(tokio::spawn(accept_loop.run()));

        Ok(())
    }

    /// Stop accepting, then shut every worker down
    ///
    /// Workers get `shutdown_timeout` to finish before they are aborted.
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::ServerNotRunning);
        }

        info!("Shutting down log server");
        self.accept_stop.cancel();

        if let Some(handle) = self.accept_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Accept loop ended abnormally");
            }
        }

        let report = self.supervisor.shutdown(self.config.shutdown_timeout).await;
        info!(
            cancelled = report.cancelled,
            forced = report.forced,
            "Log server shutdown complete"
        );
        Ok(report)
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live workers
    pub fn worker_count(&self) -> usize {
        self.supervisor.worker_count()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_workers: self.supervisor.worker_count(),
            total_connections: self.metrics.total_connections(),
            bind_address: self.local_addr,
            uptime: self.started_at.elapsed(),
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Get the worker supervisor
    pub fn supervisor(&self) -> Arc<WorkerSupervisor> {
        self.supervisor.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for LogServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogServer")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("worker_count", &self.worker_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

impl Drop for LogServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            warn!("LogServer dropped while still running");
            self.accept_stop.cancel();
            self.supervisor.cancel_all();
        }
    }
}

/// State owned by the accept loop task
struct AcceptLoop {
    listener: SecureListener,
    filter: Arc<AccessFilter>,
    supervisor: Arc<WorkerSupervisor>,
    metrics: Arc<ServerMetrics>,
    sink: Arc<dyn MessageSink>,
    max_connections: usize,
    stop: CancellationToken,
}

impl AcceptLoop {
    async fn run(self) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                result = self.listener.accept() => result,
            };

            match accepted {
                Ok((stream, peer)) => {
                    if !self.filter.is_allowed(&peer) {
                        info!(peer_addr = %peer, "Rejected peer not in allow-list");
                        self.reject();
                        continue;
                    }

                    if self.supervisor.worker_count() >= self.max_connections {
                        warn!(
                            peer_addr = %peer,
                            max_connections = self.max_connections,
                            "Connection limit reached, rejecting connection"
                        );
                        self.reject();
                        continue;
                    }

                    let handshake = self.listener.handshake(stream, peer);
                    let handle = self.supervisor.spawn(peer, handshake, self.sink.clone());
                    debug!(worker_id = %handle.id(), peer_addr = %peer, "Connection handed off");
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    self.metrics.transport_error();
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Accept loop terminated");
    }

    /// The stream was dropped by the caller; only the bookkeeping remains
    fn reject(&self) {
        self.metrics.connection_rejected();
        counter!("seclog.connections.rejected").increment(1);
    }
}
