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

//! Secure log collection service
//!
//! Clients open a TLS connection and stream length-prefixed log messages. The service admits
//! peers by source address, runs one isolated worker per connection and forwards every complete
//! message to a [`MessageSink`].
//!
//! # Architecture
//!
//! ```text
//! LogServer
//!     ├── SecureListener   (bind, accept, TLS handshake)
//!     ├── AccessFilter     (allow-list, checked before the handshake)
//!     └── WorkerSupervisor (registry, cancellation, shutdown)
//!             ↓
//!         ConnectionWorker → LogConnection → MessageSink
//! ```
//!
//! Errors inside one connection stay inside its worker. Only startup errors (bind, certificate,
//! allow-list, configuration) are returned to the caller of [`LogServer::bind`].
//!
//! # Example
//!
//! ```no_run
//! use seclog_service::{LogServer, ServerConfig, TracingSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("0.0.0.0:8514".parse()?)
//!         .with_cert_path("server.pem")
//!         .with_allow_list("whitelist");
//!
//!     let server = LogServer::bind(config).await?;
//!     server.start(Arc::new(TracingSink)).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     let report = server.shutdown().await?;
//!     println!("{} workers stopped, {} aborted", report.cancelled, report.forced);
//!     Ok(())
//! }
//! ```

mod access;
mod config;
mod connection;
mod error;
mod listener;
mod metrics;
mod server;
mod sink;
mod supervisor;
mod tls;
mod types;
mod worker;

pub use access::AccessFilter;
pub use config::{DEFAULT_PORT, ServerConfig, WorkerConfig};
pub use connection::{BoxTransport, LogConnection, Transport};
pub use error::{Result, ServiceError, SinkError};
pub use listener::SecureListener;
pub use self::metrics::{MetricsSnapshot, ServerMetrics};
pub use server::LogServer;
pub use sink::{CallbackSink, ChannelSink, MessageSink, StdoutSink, TracingSink};
pub use supervisor::{ShutdownReport, WorkerHandle, WorkerSupervisor};
pub use tls::TlsIdentity;
pub use types::{PeerInfo, ServerSnapshot, WorkerId, WorkerInfo, WorkerState};
pub use worker::{ConnectionWorker, WorkerOutcome};

pub use seclog_codec::Message;
