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

//! Command line surface

use clap::{Args, Parser, Subcommand};
use seclog_client::ClientConfig;
use seclog_service::{DEFAULT_PORT, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Secure log collection over TLS
#[derive(Parser, Debug)]
#[command(name = "seclog", version)]
#[command(about = "Secure length-framed log collection over TLS", long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the log server
    Serve(ServeArgs),
    /// Read lines from stdin and send each as one message
    Client(ClientArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// PEM file with the certificate chain, and the key unless --key is given
    #[arg(long, default_value = "cert.pem")]
    pub cert: PathBuf,

    /// PEM file with the private key
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// File of permitted peer addresses; a missing file admits everyone
    #[arg(long, alias = "whitelist")]
    pub allow_list: Option<PathBuf>,

    #[arg(long, default_value_t = 1024)]
    pub max_connections: usize,

    /// Seconds allowed for a TLS handshake
    #[arg(long, default_value_t = 10)]
    pub handshake_timeout: u64,

    /// Seconds a connection may stay silent; unlimited when absent
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Seconds workers get to finish on shutdown
    #[arg(long, default_value_t = 5)]
    pub shutdown_timeout: u64,

    /// Largest accepted frame payload in bytes
    #[arg(long)]
    pub max_frame_length: Option<u32>,
}

impl ServeArgs {
    /// Map the flags onto a server configuration
    pub fn server_config(&self, bind_address: SocketAddr) -> ServerConfig {
        let mut config = ServerConfig::new(bind_address)
            .with_cert_path(&self.cert)
            .with_max_connections(self.max_connections)
            .with_handshake_timeout(Duration::from_secs(self.handshake_timeout))
            .with_read_timeout(self.read_timeout.map(Duration::from_secs))
            .with_shutdown_timeout(Duration::from_secs(self.shutdown_timeout))
            .with_max_frame_length(self.max_frame_length);
        if let Some(key) = &self.key {
            config = config.with_key_path(key);
        }
        if let Some(allow_list) = &self.allow_list {
            config = config.with_allow_list(allow_list);
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    #[arg(long, default_value = "localhost")]
    pub host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// PEM file with the certificates to trust
    #[arg(long, default_value = "cert.pem")]
    pub ca: PathBuf,

    /// Name expected in the server certificate (defaults to --host)
    #[arg(long)]
    pub server_name: Option<String>,

    /// Seconds allowed for connect plus handshake
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,
}

impl ClientArgs {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.host, self.port)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout));
        if let Some(name) = &self.server_name {
            config = config.with_server_name(name);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["seclog", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 8514);

        let config = args.server_config("0.0.0.0:8514".parse().unwrap());
        assert_eq!(config.cert_path, PathBuf::from("cert.pem"));
        assert_eq!(config.key_path(), PathBuf::from("cert.pem").as_path());
        assert_eq!(config.allow_list, None);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "seclog",
            "--log-level",
            "debug",
            "serve",
            "--port",
            "9000",
            "--cert",
            "server.pem",
            "--key",
            "server.key",
            "--whitelist",
            "allowed.txt",
            "--read-timeout",
            "30",
            "--max-frame-length",
            "65536",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        let config = args.server_config("127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.key_path(), PathBuf::from("server.key").as_path());
        assert_eq!(config.allow_list, Some(PathBuf::from("allowed.txt")));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.max_frame_length, Some(65536));
    }

    #[test]
    fn test_client_flags() {
        let cli = Cli::try_parse_from([
            "seclog",
            "client",
            "--host",
            "10.1.2.3",
            "--server-name",
            "logs.internal",
        ])
        .unwrap();
        let Command::Client(args) = cli.command else {
            panic!("expected client");
        };

        let config = args.client_config();
        assert_eq!(config.address(), "10.1.2.3:8514");
        assert_eq!(config.server_name(), "logs.internal");
        assert_eq!(args.ca, PathBuf::from("cert.pem"));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["seclog"]).is_err());
    }
}
