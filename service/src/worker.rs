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

//! Connection worker implementation
//!
//! A worker owns exactly one connection for its whole life:
//!
//! ```text
//! Handshaking -> Reading -> Closing -> Closed
//!                   \-----> Failed  -> Closed
//! ```
//!
//! The handshake runs inside the worker, the reading loop forwards every complete message to
//! the sink, and the connection is closed on every exit path.

use crate::{
    LogConnection, MessageSink, PeerInfo, Result, ServerMetrics, ServiceError, Transport,
    WorkerConfig, WorkerState,
};
use metrics::counter;
use seclog_codec::Message;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::select;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How a worker ended
#[derive(Debug)]
pub enum WorkerOutcome {
    /// The peer closed the stream on a frame boundary
    Closed,
    /// Handshake, protocol or transport failure
    Failed(ServiceError),
    /// Cancellation was requested
    Cancelled,
}

impl WorkerOutcome {
    /// Check if the worker ended without an error
    pub fn is_success(&self) -> bool {
        !matches!(self, WorkerOutcome::Failed(_))
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerOutcome::Closed => write!(f, "closed"),
            WorkerOutcome::Failed(e) => write!(f, "failed: {e}"),
            WorkerOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Connection worker that manages a single connection's lifecycle
pub struct ConnectionWorker {
    peer: PeerInfo,
    config: WorkerConfig,
    sink: Arc<dyn MessageSink>,
    metrics: Arc<ServerMetrics>,
    /// Shared with the supervisor registry for lock-free state queries
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
}

impl ConnectionWorker {
    /// Create a new connection worker
    pub fn new(
        peer: PeerInfo,
        config: WorkerConfig,
        sink: Arc<dyn MessageSink>,
        metrics: Arc<ServerMetrics>,
        state: Arc<AtomicU8>,
        cancel: CancellationToken,
    ) -> Self {
        state.store(WorkerState::Handshaking.as_u8(), Ordering::Release);
        Self {
            peer,
            config,
            sink,
            metrics,
            state,
            cancel,
        }
    }

    /// Get the current state
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, new_state: WorkerState) {
        self.state.store(new_state.as_u8(), Ordering::Release);
    }

    /// Run the worker to completion
    ///
    /// `handshake` produces the transport. It is bounded by the handshake timeout and raced
    /// against cancellation like every read.
    #[instrument(skip_all, fields(worker_id = %self.peer.worker_id, peer_addr = %self.peer.addr))]
    pub async fn run<H, T>(self, handshake: H) -> WorkerOutcome
    where
        H: Future<Output = Result<T>> + Send,
        T: Transport + 'static,
    {
        let transport = select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Cancelled during handshake");
                self.set_state(WorkerState::Closed);
                return WorkerOutcome::Cancelled;
            }
            result = timeout(self.config.handshake_timeout, handshake) => match result {
                Ok(Ok(transport)) => transport,
                Ok(Err(e)) => return self.handshake_failed(e).await,
                Err(_) => {
                    self.metrics.timeout_error();
                    return self.handshake_failed(ServiceError::HandshakeTimeout(self.peer.addr)).await;
                }
            },
        };

        let mut connection =
            LogConnection::wrap(Box::new(transport), self.peer, self.config.max_frame_length);
        self.sink.on_connect(&self.peer).await;
        self.set_state(WorkerState::Reading);
        info!("Connection ready");

        let outcome = self.read_loop(&mut connection).await;

        match &outcome {
            WorkerOutcome::Failed(e) => {
                self.set_state(WorkerState::Failed);
                self.record_failure(e);
                self.sink.on_error(&self.peer, e).await;
            }
            _ => self.set_state(WorkerState::Closing),
        }
        self.sink.on_disconnect(&self.peer).await;

        let messages = connection.messages_received();
        if let Err(e) = connection.close(self.config.close_timeout).await {
            debug!(error = %e, "Error while closing connection");
        }
        self.set_state(WorkerState::Closed);
        info!(messages, outcome = %outcome, "Connection closed");

        outcome
    }

    async fn read_loop(&self, connection: &mut LogConnection) -> WorkerOutcome {
        loop {
            select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Cancellation requested");
                    return WorkerOutcome::Cancelled;
                }
                result = read_next(connection, self.config.read_timeout) => match result {
                    Ok(Some(message)) => self.deliver(message).await,
                    Ok(None) => {
                        debug!("Peer closed connection");
                        return WorkerOutcome::Closed;
                    }
                    Err(e) => return WorkerOutcome::Failed(e),
                },
            }
        }
    }

    /// Hand one message to the sink; failures are reported and reading continues
    async fn deliver(&self, message: Message) {
        self.metrics.message_received(message.len());
        if let Err(e) = self.sink.handle(&self.peer, message).await {
            self.metrics.sink_error();
            counter!("seclog.errors.sink").increment(1);
            warn!(error = %e, "Sink failed to handle message");
            self.sink.on_error(&self.peer, &ServiceError::Sink(e)).await;
        }
    }

    async fn handshake_failed(&self, error: ServiceError) -> WorkerOutcome {
        self.set_state(WorkerState::Failed);
        self.metrics.handshake_error();
        counter!("seclog.errors.handshake").increment(1);
        warn!(error = %error, "TLS handshake failed");
        self.sink.on_error(&self.peer, &error).await;
        self.set_state(WorkerState::Closed);
        WorkerOutcome::Failed(error)
    }

    fn record_failure(&self, error: &ServiceError) {
        match error {
            ServiceError::ReadTimeout => {
                self.metrics.timeout_error();
                warn!("Read timed out");
            }
            e if e.is_protocol_error() => {
                self.metrics.protocol_error();
                warn!(error = %e, "Protocol violation");
            }
            e => {
                self.metrics.transport_error();
                warn!(error = %e, "Transport error");
            }
        }
    }
}

async fn read_next(
    connection: &mut LogConnection,
    read_timeout: Option<Duration>,
) -> Result<Option<Message>> {
    match read_timeout {
        Some(limit) => timeout(limit, connection.next_message())
            .await
            .map_err(|_| ServiceError::ReadTimeout)?,
        None => connection.next_message().await,
    }
}

impl fmt::Debug for ConnectionWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
