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

//! TLS listening socket
//!
//! Accepting and handshaking are separate steps. The accept loop only calls
//! [`SecureListener::accept`], and the handshake future returned by
//! [`SecureListener::handshake`] is driven by the worker that owns the connection.

use crate::{Result, ServiceError, TlsIdentity};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{debug, info};

/// Bound TCP listener plus the TLS acceptor for its connections
pub struct SecureListener {
    inner: TcpListener,
    acceptor: TlsAcceptor,
    local_addr: SocketAddr,
}

impl SecureListener {
    /// Bind the address with the given identity
    ///
    /// The identity is turned into an acceptor before binding, so invalid certificate material
    /// fails without touching the socket.
    pub async fn bind(address: SocketAddr, identity: &TlsIdentity) -> Result<Self> {
        let acceptor = identity.acceptor()?;
        Self::with_acceptor(address, acceptor).await
    }

    /// Bind the address with a prepared acceptor
    pub async fn with_acceptor(address: SocketAddr, acceptor: TlsAcceptor) -> Result<Self> {
        let inner = TcpListener::bind(address)
            .await
            .map_err(|source| ServiceError::Bind { address, source })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| ServiceError::Bind { address, source })?;

        info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner,
            acceptor,
            local_addr,
        })
    }

    /// Wait for the next raw connection
    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        debug!(peer_addr = %peer, "Connection accepted");
        Ok((stream, peer))
    }

    /// Server side TLS handshake for an accepted connection
    ///
    /// The returned future owns everything it needs and can be moved into the worker task.
    pub fn handshake(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> impl Future<Output = Result<TlsStream<TcpStream>>> + Send + 'static {
        let acceptor = self.acceptor.clone();
        async move {
            acceptor
                .accept(stream)
                .await
                .map_err(|source| ServiceError::Handshake { peer, source })
        }
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl std::fmt::Debug for SecureListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureListener")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn identity() -> TlsIdentity {
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        TlsIdentity::from_pem(cert.pem().as_bytes(), key.serialize_pem().as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = SecureListener::bind("127.0.0.1:0".parse().unwrap(), &identity())
            .await
            .unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_address_in_use() {
        let identity = identity();
        let first = SecureListener::bind("127.0.0.1:0".parse().unwrap(), &identity)
            .await
            .unwrap();

        let err = SecureListener::bind(first.local_addr(), &identity)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Bind { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_handshake_failure_is_per_connection() {
        use tokio::io::AsyncWriteExt;

        let listener = SecureListener::bind("127.0.0.1:0".parse().unwrap(), &identity())
            .await
            .unwrap();
        let addr = listener.local_addr();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"this is not a client hello").await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let (stream, peer) = listener.accept().await.unwrap();
        let err = listener.handshake(stream, peer).await.unwrap_err();
        assert!(err.is_handshake_error());
        client.await.unwrap();

        // The listener keeps accepting
        let next = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        assert!(listener.accept().await.is_ok());
        next.await.unwrap();
    }
}
