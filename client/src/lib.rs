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

//! # Seclog Client
//!
//! Emits log messages to a seclog server over TLS. Each message travels as one frame: a
//! 4-byte big-endian length followed by the payload.
//!
//! ## Features
//!
//! - **Lazy Connect** - The TLS connection opens on the first send
//! - **Reconnect on Failure** - A failed write drops the connection; the next send dials again
//! - **Clean Close** - `close` sends TLS close_notify so the server sees an orderly end
//!
//! ## Quick Start
//!
//! ```no_run
//! use seclog_client::{ClientConfig, LogClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("localhost", 8514);
//!     let mut client = LogClient::with_ca_file(config, "ca.pem")?;
//!
//!     client.send("disk usage at 91%").await?;
//!     client.close().await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;

pub use client::{LogClient, connector_from_file, connector_from_pem};
pub use config::{ClientConfig, DEFAULT_PORT};
pub use error::{ClientError, Result};
