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

//! Worker supervisor
//!
//! The supervisor is responsible for:
//! - Spawning one task per connection and registering it
//! - Deregistering each worker exactly once when its task ends, however it ends
//! - Cancelling workers and waiting for them on shutdown
//!
//! The registry entry is inserted before the task is spawned and removed by a guard the task
//! owns, so a live connection always has exactly one entry.

use crate::{
    ConnectionWorker, MessageSink, PeerInfo, Result, ServerMetrics, ServiceError, Transport,
    WorkerConfig, WorkerId, WorkerInfo, WorkerOutcome, WorkerState,
};
use dashmap::DashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bound on waiting for aborted workers to be dropped
const ABORT_WAIT: Duration = Duration::from_secs(1);

/// Registry entry for one worker
struct WorkerEntry {
    peer_addr: SocketAddr,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    abort: Option<AbortHandle>,
    created_at: Instant,
}

impl WorkerEntry {
    fn info(&self, id: WorkerId) -> WorkerInfo {
        WorkerInfo {
            id,
            state: WorkerState::from_u8(self.state.load(Ordering::Acquire)),
            peer_addr: self.peer_addr,
            created_at: self.created_at,
        }
    }
}

/// Shared between the supervisor and every worker task
struct Registry {
    workers: DashMap<WorkerId, WorkerEntry>,
    /// Signalled whenever the registry becomes empty
    idle: Notify,
    metrics: Arc<ServerMetrics>,
}

impl Registry {
    fn remove(&self, id: WorkerId) -> Option<WorkerEntry> {
        let (_, entry) = self.workers.remove(&id)?;
        self.metrics.connection_closed(entry.created_at.elapsed());
        if self.workers.is_empty() {
            self.idle.notify_waiters();
        }
        Some(entry)
    }
}

/// Deregisters its worker when dropped, including on panic and abort
struct DoneGuard {
    id: WorkerId,
    registry: Arc<Registry>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        if self.registry.remove(self.id).is_some() {
            debug!(worker_id = %self.id, "Worker deregistered");
        }
    }
}

/// Handle to a spawned worker
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    join: JoinHandle<WorkerOutcome>,
}

impl WorkerHandle {
    /// Worker ID
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Wait for the worker to finish
    ///
    /// Returns `None` if the worker was aborted or panicked.
    pub async fn join(self) -> Option<WorkerOutcome> {
        self.join.await.ok()
    }
}

/// Outcome of [`WorkerSupervisor::shutdown`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that were registered when shutdown began
    pub cancelled: usize,
    /// Workers still running after the grace period, aborted
    pub forced: usize,
}

impl ShutdownReport {
    /// Check if every worker stopped within the grace period
    pub fn is_clean(&self) -> bool {
        self.forced == 0
    }
}

/// Worker supervisor
pub struct WorkerSupervisor {
    registry: Arc<Registry>,
    /// Next worker ID (monotonically increasing, never reused)
    next_id: AtomicU64,
    /// Parent of every worker's cancellation token
    root: CancellationToken,
    config: WorkerConfig,
}

impl WorkerSupervisor {
    /// Create a new supervisor
    pub fn new(config: WorkerConfig, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            registry: Arc::new(Registry {
                workers: DashMap::new(),
                idle: Notify::new(),
                metrics,
            }),
            next_id: AtomicU64::new(1),
            root: CancellationToken::new(),
            config,
        }
    }

    /// Spawn a worker for a connection
    ///
    /// `handshake` yields the transport the worker reads from. Workers spawned after
    /// [`shutdown`](Self::shutdown) started are cancelled immediately.
    pub fn spawn<H, T>(
        &self,
        peer_addr: SocketAddr,
        handshake: H,
        sink: Arc<dyn MessageSink>,
    ) -> WorkerHandle
    where
        H: Future<Output = Result<T>> + Send + 'static,
        T: Transport + 'static,
    {
        let id = WorkerId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let state = Arc::new(AtomicU8::new(WorkerState::Handshaking.as_u8()));
        let cancel = self.root.child_token();

        self.registry.workers.insert(
            id,
            WorkerEntry {
                peer_addr,
                state: state.clone(),
                cancel: cancel.clone(),
                abort: None,
                created_at: Instant::now(),
            },
        );
        self.registry.metrics.connection_opened();

        let peer = PeerInfo {
            worker_id: id,
            addr: peer_addr,
        };
        let worker = ConnectionWorker::new(
            peer,
            self.config,
            sink,
            self.registry.metrics.clone(),
            state,
            cancel,
        );
        let guard = DoneGuard {
            id,
            registry: self.registry.clone(),
        };

        let join = tokio::spawn(async move {
            let _guard = guard;
            worker.run(handshake).await
        });

        // The task may already have finished and removed its entry
        if let Some(mut entry) = self.registry.workers.get_mut(&id) {
            entry.abort = Some(join.abort_handle());
        }
        debug!(worker_id = %id, peer_addr = %peer_addr, "Worker spawned");

        WorkerHandle { id, join }
    }

    /// Deregister a worker
    ///
    /// Called by the worker task on exit. Returns `false` if the worker was already removed.
    pub fn on_worker_done(&self, id: WorkerId) -> bool {
        self.registry.remove(id).is_some()
    }

    /// Request cancellation of a single worker
    pub fn cancel_worker(&self, id: WorkerId) -> Result<()> {
        let entry = self
            .registry
            .workers
            .get(&id)
            .ok_or(ServiceError::WorkerNotFound(id))?;
        entry.cancel.cancel();
        Ok(())
    }

    /// Number of registered workers
    pub fn worker_count(&self) -> usize {
        self.registry.workers.len()
    }

    /// IDs of all registered workers
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.registry.workers.iter().map(|e| *e.key()).collect()
    }

    /// Snapshot of one worker
    pub fn worker_info(&self, id: WorkerId) -> Option<WorkerInfo> {
        self.registry.workers.get(&id).map(|e| e.info(id))
    }

    /// Snapshot of every worker
    pub fn all_worker_info(&self) -> Vec<WorkerInfo> {
        self.registry
            .workers
            .iter()
            .map(|e| e.value().info(*e.key()))
            .collect()
    }

    /// Check if shutdown has started
    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Signal cancellation to every worker without waiting
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// Wait until no worker is registered
    ///
    /// Returns `false` if workers remain after `limit`.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let notified = self.registry.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent removal cannot be missed
            notified.as_mut().enable();
            if self.registry.workers.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.registry.workers.is_empty();
            }
        }
    }

    /// Cancel every worker and wait for them
    ///
    /// Workers still registered after `grace` are aborted and awaited, so their connections are
    /// closed by the time this returns. The registry is empty when this returns.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let cancelled = self.worker_count();
        info!(workers = cancelled, "Shutting down workers");
        self.cancel_all();

        let mut forced = 0;
        if !self.wait_idle(grace).await {
            for entry in self.registry.workers.iter() {
                if let Some(abort) = &entry.abort {
                    abort.abort();
                }
                warn!(
                    worker_id = %entry.key(),
                    peer_addr = %entry.peer_addr,
                    "Aborting worker after grace period"
                );
                forced += 1;
            }

            // Aborted tasks drop their connection and deregister when the runtime reaps them
            if !self.wait_idle(ABORT_WAIT).await {
                for id in self.worker_ids() {
                    if self.registry.remove(id).is_some() {
                        warn!(worker_id = %id, "Aborted worker did not exit, removed");
                    }
                }
            }
        }

        let report = ShutdownReport { cancelled, forced };
        info!(cancelled, forced, "Workers shut down");
        report
    }
}

impl std::fmt::Debug for WorkerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSupervisor")
            .field("workers", &self.worker_count())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
