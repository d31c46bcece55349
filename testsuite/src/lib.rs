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

//! Shared fixtures for end-to-end tests
//!
//! Every fixture mints a fresh CA and a `localhost` leaf, so tests never share key material.

use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
use seclog_client::{ClientConfig, LogClient};
use seclog_service::{
    AccessFilter, ChannelSink, LogServer, Message, PeerInfo, SecureListener, ServerConfig,
    TlsIdentity,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Throwaway certificate authority with one server certificate
pub struct TestPki {
    /// CA certificate clients trust
    pub ca_pem: String,
    /// Leaf certificate for `localhost`
    pub cert_pem: String,
    /// Leaf private key
    pub key_pem: String,
}

impl TestPki {
    pub fn localhost() -> Self {
        let ca_key = KeyPair::generate().expect("ca key");
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).expect("ca params");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).expect("ca cert");

        let leaf_key = KeyPair::generate().expect("leaf key");
        let leaf = CertificateParams::new(vec!["localhost".to_string()])
            .expect("leaf params")
            .signed_by(&leaf_key, &ca, &ca_key)
            .expect("leaf cert");

        Self {
            ca_pem: ca.pem(),
            cert_pem: leaf.pem(),
            key_pem: leaf_key.serialize_pem(),
        }
    }

    pub fn identity(&self) -> TlsIdentity {
        TlsIdentity::from_pem(self.cert_pem.as_bytes(), self.key_pem.as_bytes())
            .expect("server identity")
    }

    /// Client for `addr` that trusts this CA and expects `localhost`
    pub fn client(&self, addr: SocketAddr) -> LogClient {
        let config = ClientConfig::new(addr.ip().to_string(), addr.port())
            .with_server_name("localhost")
            .with_connect_timeout(Duration::from_secs(5));
        LogClient::with_ca_pem(config, self.ca_pem.as_bytes()).expect("client")
    }
}

/// A started server plus the receiving end of its sink
pub struct TestServer {
    pub pki: TestPki,
    pub server: LogServer,
    pub messages: mpsc::Receiver<(PeerInfo, Message)>,
}

impl TestServer {
    /// Start a server on an ephemeral loopback port
    pub async fn start(config: ServerConfig, filter: AccessFilter) -> Self {
        let pki = TestPki::localhost();
        let listener = SecureListener::bind(config.bind_address, &pki.identity())
            .await
            .expect("bind");
        let server = LogServer::from_parts(config, listener, filter);

        let (sink, messages) = ChannelSink::new(4096);
        server.start(Arc::new(sink)).await.expect("start");

        Self {
            pki,
            server,
            messages,
        }
    }

    /// Default configuration, everyone admitted
    pub async fn open() -> Self {
        Self::start(loopback(), AccessFilter::allow_all()).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn client(&self) -> LogClient {
        self.pki.client(self.addr())
    }

    /// Next delivered message, or `None` after five quiet seconds
    pub async fn next_message(&mut self) -> Option<(PeerInfo, String)> {
        let (peer, message) = tokio::time::timeout(Duration::from_secs(5), self.messages.recv())
            .await
            .ok()??;
        Some((peer, message.to_text().into_owned()))
    }
}

/// Server configuration bound to an ephemeral loopback port
pub fn loopback() -> ServerConfig {
    ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
}

/// Poll `check` until it holds or five seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
