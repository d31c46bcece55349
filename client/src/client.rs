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

//! TLS log client

use crate::{ClientConfig, ClientError, Result};
use rustls::RootCertStore;
use rustls::pki_types::ServerName;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

/// Build a connector that trusts the certificates in a PEM bundle
pub fn connector_from_pem(ca_pem: &[u8]) -> Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    let mut reader = ca_pem;
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|e| ClientError::Certificate(e.to_string()))?;
        roots
            .add(cert)
            .map_err(|e| ClientError::Certificate(e.to_string()))?;
    }
    if roots.is_empty() {
        return Err(ClientError::Certificate(
            "no certificates found in PEM input".to_string(),
        ));
    }

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Build a connector from a PEM CA file
pub fn connector_from_file(path: impl AsRef<Path>) -> Result<TlsConnector> {
    let path = path.as_ref();
    let pem = std::fs::read(path)
        .map_err(|e| ClientError::Certificate(format!("{}: {}", path.display(), e)))?;
    connector_from_pem(&pem)
}

/// Client that emits framed log messages over TLS
///
/// The connection is opened on the first `send`. A failed write drops it, and the next `send`
/// dials again.
///
/// # Example
///
/// ```no_run
/// use seclog_client::{ClientConfig, LogClient};
///
/// # async fn example() -> seclog_client::Result<()> {
/// let config = ClientConfig::new("logs.example.com", 8514);
/// let mut client = LogClient::with_ca_file(config, "ca.pem")?;
///
/// client.send("service started").await?;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct LogClient {
    config: ClientConfig,
    connector: TlsConnector,
    server_name: ServerName<'static>,
    stream: Option<TlsStream<TcpStream>>,
    messages_sent: u64,
}

impl LogClient {
    /// Create a client around an existing connector
    pub fn new(config: ClientConfig, connector: TlsConnector) -> Result<Self> {
        config.validate().map_err(ClientError::Config)?;
        let name = config.server_name().to_string();
        let server_name = ServerName::try_from(name.clone())
            .map_err(|_| ClientError::InvalidServerName(name))?;

        Ok(Self {
            config,
            connector,
            server_name,
            stream: None,
            messages_sent: 0,
        })
    }

    /// Create a client that trusts the CA certificates in `path`
    pub fn with_ca_file(config: ClientConfig, path: impl AsRef<Path>) -> Result<Self> {
        Self::new(config, connector_from_file(path)?)
    }

    /// Create a client that trusts the CA certificates in a PEM bundle
    pub fn with_ca_pem(config: ClientConfig, ca_pem: &[u8]) -> Result<Self> {
        Self::new(config, connector_from_pem(ca_pem)?)
    }

    /// Open the TLS connection if it is not already open
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let address = self.config.address();
        let connector = self.connector.clone();
        let server_name = self.server_name.clone();
        let connecting = async move {
            let tcp = TcpStream::connect(&address).await?;
            tcp.set_nodelay(true)?;
            connector.connect(server_name, tcp).await
        };

        let stream = tokio::time::timeout(self.config.connect_timeout, connecting)
            .await
            .map_err(|_| ClientError::ConnectionTimeout)??;

        info!(address = %self.config.address(), "Connected to log server");
        self.stream = Some(stream);
        Ok(())
    }

    /// Send one message as one frame
    ///
    /// Oversized messages are refused before any connection attempt.
    pub async fn send(&mut self, message: impl AsRef<[u8]>) -> Result<()> {
        let frame = seclog_codec::encode(message)?;

        self.connect().await?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(ClientError::NotConnected);
        };

        if let Err(e) = write_flush(stream, &frame).await {
            warn!(error = %e, "Send failed, dropping connection");
            self.stream = None;
            return Err(e.into());
        }

        self.messages_sent += 1;
        debug!(bytes = frame.len(), "Message sent");
        Ok(())
    }

    /// Send TLS close_notify and close the connection
    ///
    /// Closing an unconnected client does nothing.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            info!(messages = self.messages_sent, "Disconnected from log server");
        }
        Ok(())
    }

    /// Check if a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Messages successfully written since the client was created
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for LogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogClient")
            .field("address", &self.config.address())
            .field("connected", &self.is_connected())
            .field("messages_sent", &self.messages_sent)
            .finish()
    }
}

async fn write_flush(stream: &mut TlsStream<TcpStream>, frame: &[u8]) -> io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use seclog_codec::{FrameError, read_frame};
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    struct Pki {
        ca_pem: String,
        acceptor: TlsAcceptor,
    }

    fn pki() -> Pki {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let leaf = CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .signed_by(&leaf_key, &ca, &ca_key)
            .unwrap();

        let chain: Vec<CertificateDer<'static>> = vec![leaf.der().clone()];
        let key: PrivateKeyDer<'static> = PrivatePkcs8KeyDer::from(leaf_key.serialize_der()).into();
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .unwrap();

        Pki {
            ca_pem: ca.pem(),
            acceptor: TlsAcceptor::from(Arc::new(config)),
        }
    }

    #[test]
    fn test_connector_rejects_empty_pem() {
        let err = connector_from_pem(b"not a certificate").err().expect("expected an error");
        assert!(matches!(err, ClientError::Certificate(_)));
    }

    #[test]
    fn test_missing_ca_file() {
        let err = connector_from_file("/nonexistent/ca.pem").err().expect("expected an error");
        assert!(matches!(err, ClientError::Certificate(_)));
    }

    #[test]
    fn test_invalid_server_name() {
        let pki = pki();
        let config = ClientConfig::default().with_server_name("not a host name");
        let err = LogClient::with_ca_pem(config, pki.ca_pem.as_bytes()).unwrap_err();
        assert!(matches!(err, ClientError::InvalidServerName(_)));
    }

    #[tokio::test]
    async fn test_close_without_connection() {
        let pki = pki();
        let mut client = LogClient::with_ca_pem(ClientConfig::default(), pki.ca_pem.as_bytes())
            .unwrap();
        assert!(!client.is_connected());
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let pki = pki();
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ClientConfig::new("127.0.0.1", port).with_server_name("localhost");
        let mut client = LogClient::with_ca_pem(config, pki.ca_pem.as_bytes()).unwrap();

        let err = client.send("hello").await.unwrap_err();
        assert_eq!(err, ClientError::ConnectionRefused);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_send_and_close() {
        let pki = pki();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = pki.acceptor.clone();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(tcp).await.unwrap();
            let mut received = Vec::new();
            loop {
                match read_frame(&mut tls).await {
                    Ok(message) => received.push(message.to_text().into_owned()),
                    Err(FrameError::ConnectionClosed) => break,
                    Err(e) => panic!("unexpected frame error: {e}"),
                }
            }
            received
        });

        let config = ClientConfig::new("127.0.0.1", port).with_server_name("localhost");
        let mut client = LogClient::with_ca_pem(config, pki.ca_pem.as_bytes()).unwrap();
        client.send("first").await.unwrap();
        assert!(client.is_connected());
        client.send("").await.unwrap();
        client.send("third").await.unwrap();
        client.close().await.unwrap();

        assert_eq!(client.messages_sent(), 3);
        assert_eq!(server.await.unwrap(), vec!["first", "", "third"]);
    }

    #[tokio::test]
    async fn test_untrusted_server_is_refused() {
        let trusted = pki();
        let other = pki();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = other.acceptor.clone();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let _ = acceptor.accept(tcp).await;
        });

        let config = ClientConfig::new("127.0.0.1", port).with_server_name("localhost");
        let mut client = LogClient::with_ca_pem(config, trusted.ca_pem.as_bytes()).unwrap();
        let err = client.send("secret").await.unwrap_err();
        assert!(matches!(err, ClientError::Tls(_)));
        assert!(!client.is_connected());
    }
}
