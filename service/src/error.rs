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

//! Error types for the log collection service

use crate::types::WorkerId;
use seclog_codec::FrameError;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Log service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The listening socket could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Requested bind address
        address: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Certificate material could not be read or parsed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Private key material could not be read or parsed
    #[error("Private key error: {0}")]
    PrivateKey(String),

    /// rustls rejected the certificate/key pair
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// The allow-list file exists but could not be read
    #[error("Failed to read allow-list {path}: {source}")]
    AllowList {
        /// Allow-list path
        path: PathBuf,
        /// Underlying read error
        #[source]
        source: std::io::Error,
    },

    /// The configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The TLS handshake with a peer failed
    #[error("TLS handshake with {peer} failed: {source}")]
    Handshake {
        /// Peer address
        peer: SocketAddr,
        /// Underlying handshake error
        #[source]
        source: std::io::Error,
    },

    /// The TLS handshake did not finish in time
    #[error("TLS handshake with {0} timed out")]
    HandshakeTimeout(SocketAddr),

    /// Framing error from the codec layer
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error from the underlying socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No frame arrived within the read timeout
    #[error("Read timed out")]
    ReadTimeout,

    /// The sink rejected a message; the connection keeps reading
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Worker with the given ID was not found
    #[error("Worker {0} not found")]
    WorkerNotFound(WorkerId),

    /// Server is already running
    #[error("Server already running")]
    AlreadyRunning,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was shut down and cannot be started again
    #[error("Server has been shut down")]
    ShutDown,
}

/// Failure reported by a message sink
///
/// Sink failures never end the connection. The worker reports them and keeps reading.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink no longer accepts messages
    #[error("Sink closed")]
    Closed,

    /// The sink failed to write the message
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other sink-specific failure
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Check if the error is fatal at startup
    ///
    /// Only bind, certificate and configuration errors prevent the service from running.
    /// Everything else is contained within a single connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::Bind { .. }
                | ServiceError::Certificate(_)
                | ServiceError::PrivateKey(_)
                | ServiceError::Tls(_)
                | ServiceError::AllowList { .. }
                | ServiceError::Config(_)
        )
    }

    /// Check if the error is a handshake failure
    pub fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Handshake { .. } | ServiceError::HandshakeTimeout(_)
        )
    }

    /// Check if the peer violated the framing protocol
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, ServiceError::Frame(e) if e.is_protocol_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.2:4000".parse().unwrap()
    }

    #[test]
    fn test_error_is_fatal() {
        let bind = ServiceError::Bind {
            address: "127.0.0.1:8514".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_fatal());
        assert!(ServiceError::Certificate("missing".into()).is_fatal());
        assert!(!ServiceError::HandshakeTimeout(peer()).is_fatal());
        assert!(!ServiceError::Frame(FrameError::TruncatedHeader { received: 2 }).is_fatal());
    }

    #[test]
    fn test_error_classification() {
        assert!(ServiceError::HandshakeTimeout(peer()).is_handshake_error());
        assert!(
            ServiceError::Frame(FrameError::TruncatedPayload {
                expected: 4,
                received: 1
            })
            .is_protocol_error()
        );
        assert!(!ServiceError::Frame(FrameError::ConnectionClosed).is_protocol_error());
        assert!(!ServiceError::ReadTimeout.is_protocol_error());
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::WorkerNotFound(WorkerId::new(42));
        assert_eq!(err.to_string(), "Worker worker-42 not found");

        let err = ServiceError::HandshakeTimeout(peer());
        assert_eq!(err.to_string(), "TLS handshake with 10.0.0.2:4000 timed out");

        assert_eq!(SinkError::Other("disk full".into()).to_string(), "disk full");
    }
}
