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

//! Server and worker configuration
//!
//! # Example
//!
//! ```
//! use seclog_service::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::new("0.0.0.0:8514".parse().unwrap())
//!     .with_cert_path("/etc/seclog/server.pem")
//!     .with_allow_list("/etc/seclog/whitelist")
//!     .with_read_timeout(Some(Duration::from_secs(300)));
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.key_path(), config.cert_path.as_path());
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default port for the log service
pub const DEFAULT_PORT: u16 = 8514;

/// Server configuration
///
/// Everything the listener, access filter and workers need is passed in through this struct.
/// Use the builder pattern methods to customize the configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// PEM file holding the server certificate chain
    pub cert_path: PathBuf,

    /// PEM file holding the private key
    ///
    /// When unset the key is read from `cert_path`.
    pub key_path: Option<PathBuf>,

    /// Whitespace separated allow-list file
    ///
    /// `None`, or a path that does not exist, disables filtering.
    pub allow_list: Option<PathBuf>,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Upper bound for the TLS handshake of one connection
    pub handshake_timeout: Duration,

    /// Upper bound for receiving one complete frame (`None` waits forever)
    pub read_timeout: Option<Duration>,

    /// Grace period for workers during shutdown before they are aborted
    pub shutdown_timeout: Duration,

    /// Upper bound for closing a connection gracefully
    pub close_timeout: Duration,

    /// Largest accepted frame payload (`None` accepts the full 32-bit range)
    pub max_frame_length: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            cert_path: PathBuf::from("cert.pem"),
            key_path: None,
            allow_list: None,
            max_connections: 1024,
            handshake_timeout: Duration::from_secs(10),
            read_timeout: None,
            shutdown_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(1),
            max_frame_length: None,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the certificate path
    pub fn with_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_path = path.into();
        self
    }

    /// Set a separate private key path
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Set the allow-list path
    pub fn with_allow_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.allow_list = Some(path.into());
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the per-frame read timeout
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the close timeout
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set the maximum frame payload length
    pub fn with_max_frame_length(mut self, max: Option<u32>) -> Self {
        self.max_frame_length = max;
        self
    }

    /// Path the private key is read from
    pub fn key_path(&self) -> &Path {
        self.key_path.as_deref().unwrap_or(&self.cert_path)
    }

    /// Worker settings derived from this configuration
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            handshake_timeout: self.handshake_timeout,
            read_timeout: self.read_timeout,
            close_timeout: self.close_timeout,
            max_frame_length: self.max_frame_length,
        }
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.handshake_timeout.is_zero() {
            return Err("handshake_timeout must be greater than 0".to_string());
        }

        if self.read_timeout.is_some_and(|t| t.is_zero()) {
            return Err("read_timeout must be greater than 0".to_string());
        }

        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be greater than 0".to_string());
        }

        if self.close_timeout.is_zero() {
            return Err("close_timeout must be greater than 0".to_string());
        }

        if self.max_frame_length == Some(0) {
            return Err("max_frame_length must be greater than 0".to_string());
        }

        if self.cert_path.as_os_str().is_empty() {
            return Err("cert_path must not be empty".to_string());
        }

        Ok(())
    }
}

/// Per-connection worker settings
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Upper bound for the handshake future
    pub handshake_timeout: Duration,
    /// Upper bound for receiving one complete frame
    pub read_timeout: Option<Duration>,
    /// Upper bound for closing the transport
    pub close_timeout: Duration,
    /// Largest accepted frame payload
    pub max_frame_length: Option<u32>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        ServerConfig::default().worker_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), DEFAULT_PORT);
        assert_eq!(config.max_connections, 1024);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.read_timeout.is_none());
        assert!(config.allow_list.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_path_defaults_to_cert_path() {
        let config = ServerConfig::default().with_cert_path("/tmp/both.pem");
        assert_eq!(config.key_path(), Path::new("/tmp/both.pem"));

        let config = config.with_key_path("/tmp/key.pem");
        assert_eq!(config.key_path(), Path::new("/tmp/key.pem"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ServerConfig::new("127.0.0.1:9000".parse().unwrap())
            .with_max_connections(8)
            .with_read_timeout(Some(Duration::from_secs(30)))
            .with_max_frame_length(Some(1 << 20));

        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.max_connections, 8);

        let worker = config.worker_config();
        assert_eq!(worker.read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(worker.max_frame_length, Some(1 << 20));
        assert_eq!(worker.close_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.max_connections = 0;
        assert!(config.validate().is_err());

        config.max_connections = 1;
        config.read_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());

        config.read_timeout = None;
        config.max_frame_length = Some(0);
        assert!(config.validate().is_err());

        config.max_frame_length = None;
        config.handshake_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
