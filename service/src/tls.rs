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

//! Server TLS identity
//!
//! Certificates and keys are PEM encoded. The certificate chain and the private key may live in
//! the same file.

use crate::{Result, ServiceError};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fmt;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Certificate chain and private key presented to clients
pub struct TlsIdentity {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsIdentity {
    /// Load the identity from PEM files
    pub fn load(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();

        let cert_pem = std::fs::read(cert_path).map_err(|e| {
            ServiceError::Certificate(format!("failed to read {}: {e}", cert_path.display()))
        })?;
        let key_pem = if key_path == cert_path {
            cert_pem.clone()
        } else {
            std::fs::read(key_path).map_err(|e| {
                ServiceError::PrivateKey(format!("failed to read {}: {e}", key_path.display()))
            })?
        };

        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Parse the identity from in-memory PEM
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let certs = rustls_pemfile::certs(&mut BufReader::new(cert_pem))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ServiceError::Certificate(format!("failed to parse certificates: {e}")))?;
        if certs.is_empty() {
            return Err(ServiceError::Certificate("no certificates found".into()));
        }

        let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
            .map_err(|e| ServiceError::PrivateKey(format!("failed to parse private key: {e}")))?
            .ok_or_else(|| ServiceError::PrivateKey("no private key found".into()))?;

        Ok(Self { certs, key })
    }

    /// Number of certificates in the chain
    pub fn chain_len(&self) -> usize {
        self.certs.len()
    }

    /// Build the rustls server configuration
    ///
    /// Uses the ring provider directly rather than a process-wide default. Clients are not
    /// asked for certificates.
    pub fn server_config(&self) -> Result<Arc<rustls::ServerConfig>> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(self.certs.clone(), self.key.clone_key())?;
        Ok(Arc::new(config))
    }

    /// Build an acceptor for this identity
    pub fn acceptor(&self) -> Result<TlsAcceptor> {
        Ok(TlsAcceptor::from(self.server_config()?))
    }
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("chain_len", &self.certs.len())
            .field("key", &"<redacted>")
            .finish()
    }
}
