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

//! Address based admission control
//!
//! The allow-list is a plain text file of whitespace separated host entries, loaded once at
//! startup. Matching is host-only: the peer port is never compared.

use crate::{Result, ServiceError};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use tracing::{debug, info, warn};

/// Immutable allow-list of peer hosts
#[derive(Debug, Clone, Default)]
pub struct AccessFilter {
    entries: Option<HashSet<IpAddr>>,
}


impl AccessFilter {
    /// A filter that admits every peer
    pub fn allow_all() -> Self {
        Self { entries: None }
    }

    /// Build a filter from host entries
    ///
    /// Entries must be IP addresses and match by address equality. Anything else, such as a
    /// host name or an address with a port, can never match a peer and is skipped with a
    /// warning. An empty list admits nobody.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = HashSet::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match entry.parse::<IpAddr>() {
                Ok(addr) => {
                    parsed.insert(canonical(addr));
                }
                Err(_) => warn!(entry, "Ignoring allow-list entry that is not an IP address"),
            }
        }
        Self {
            entries: Some(parsed),
        }
    }

    /// Parse the contents of an allow-list file
    pub fn parse(text: &str) -> Self {
        Self::from_entries(text.split_whitespace())
    }

    /// Load an allow-list file
    ///
    /// A missing file disables filtering. Any other read error is returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let filter = Self::parse(&text);
                info!(path = %path.display(), entries = filter.len(), "Loaded allow-list");
                Ok(filter)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No allow-list found, accepting all peers");
                Ok(Self::allow_all())
            }
            Err(source) => Err(ServiceError::AllowList {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Check whether filtering is active
    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Number of configured entries
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, HashSet::len)
    }

    /// Check whether the list is configured but empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a peer may connect
    pub fn is_allowed(&self, peer: &SocketAddr) -> bool {
        let Some(entries) = &self.entries else {
            return true;
        };
        let allowed = entries.contains(&canonical(peer.ip()));
        if !allowed {
            debug!(peer_addr = %peer, "Peer not in allow-list");
        }
        allowed
    }
}

/// IPv4 peers accepted on a dual-stack socket show up as `::ffff:a.b.c.d`
fn canonical(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}
