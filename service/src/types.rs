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

//! Core types for the log collection service

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Unique identifier for a worker (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Create a new worker ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Worker state (stored as atomic u8 for lock-free state management)
///
/// ```text
/// Handshaking -> Reading -> Closing -> Closed
///                   \-----> Failed  -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// TLS handshake in progress
    Handshaking = 0,
    /// Decoding frames and forwarding them to the sink
    Reading = 1,
    /// Peer ended the stream or cancellation was requested
    Closing = 2,
    /// A protocol or transport error ended the connection
    Failed = 3,
    /// Connection released
    Closed = 4,
}

impl WorkerState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Handshaking,
            1 => Self::Reading,
            2 => Self::Closing,
            3 => Self::Failed,
            _ => Self::Closed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the worker is on its way out
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Failed | Self::Closed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshaking => write!(f, "handshaking"),
            Self::Reading => write!(f, "reading"),
            Self::Closing => write!(f, "closing"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Identity of the peer behind a connection, handed to the sink with every message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    /// Worker serving the connection
    pub worker_id: WorkerId,
    /// Remote socket address
    pub addr: SocketAddr,
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.addr, self.worker_id)
    }
}

/// Worker information snapshot (for non-blocking queries)
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// Worker ID
    pub id: WorkerId,
    /// Current state
    pub state: WorkerState,
    /// Peer address
    pub peer_addr: SocketAddr,
    /// When the worker was spawned
    pub created_at: Instant,
}

impl WorkerInfo {
    /// How long the worker has been alive
    pub fn duration(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Number of live workers
    pub active_workers: usize,
    /// Total connections handed to workers since start
    pub total_connections: u64,
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Server uptime
    pub uptime: Duration,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogServer {{ active: {}, total: {}, addr: {}, uptime: {:?} }}",
            self.active_workers, self.total_connections, self.bind_address, self.uptime
        )
    }
}
