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

//! Framed log connection

use crate::{PeerInfo, Result, ServiceError};
use futures_util::StreamExt;
use metrics::{counter, gauge, histogram};
use seclog_codec::{FrameCodec, FrameError, Message};
use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tracing::{debug, instrument, trace, warn};

/// Byte stream a connection can be read from
///
/// Implemented for every `AsyncRead + AsyncWrite + Unpin + Send` type, so TLS streams, plain
/// TCP streams and in-memory duplex pipes all qualify.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Boxed transport owned by a connection
pub type BoxTransport = Box<dyn Transport>;

/// A live connection decoding length-prefixed messages
///
/// Owned exclusively by one worker. Consuming [`close`](LogConnection::close) or dropping the
/// connection releases the transport, so it can only be released once.
pub struct LogConnection {
    peer: PeerInfo,
    framed: Framed<BoxTransport, FrameCodec>,
    created_at: Instant,
    messages_received: u64,
    bytes_received: u64,
}

impl LogConnection {
    /// Wrap a transport
    #[instrument(skip(transport), fields(worker_id = %peer.worker_id, peer_addr = %peer.addr))]
    pub fn wrap(transport: BoxTransport, peer: PeerInfo, max_frame_length: Option<u32>) -> Self {
        let codec = match max_frame_length {
            Some(max) => FrameCodec::with_max_frame_length(max),
            None => FrameCodec::new(),
        };

        counter!("seclog.connections.total").increment(1);
        gauge!("seclog.connections.active").increment(1.0);
        debug!("Connection established");

        Self {
            peer,
            framed: Framed::new(transport, codec),
            created_at: Instant::now(),
            messages_received: 0,
            bytes_received: 0,
        }
    }

    /// Peer identity
    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    /// When the connection was wrapped
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Messages decoded so far
    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    /// Payload bytes decoded so far
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Read the next complete message
    ///
    /// Returns `Ok(None)` when the peer closed the stream on a frame boundary. A stream that ends
    /// inside a frame yields [`FrameError::TruncatedHeader`] or [`FrameError::TruncatedPayload`].
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        let start = Instant::now();
        match self.framed.next().await {
            Some(Ok(message)) => {
                self.messages_received += 1;
                self.bytes_received += message.len() as u64;
                counter!("seclog.messages.received").increment(1);
                counter!("seclog.bytes.received").increment(message.len() as u64);
                histogram!("seclog.message.receive_duration").record(start.elapsed().as_secs_f64());
                trace!(length = message.len(), "Frame received");
                Ok(Some(message))
            }
            Some(Err(FrameError::Io(e))) if e.kind() == ErrorKind::UnexpectedEof => {
                // TLS peers that drop TCP without close_notify
                let err = self.framed.codec().eof_error(self.framed.read_buffer().len());
                if err.is_clean_close() {
                    debug!("Peer closed without close_notify");
                    Ok(None)
                } else {
                    counter!("seclog.errors.protocol").increment(1);
                    Err(err.into())
                }
            }
            Some(Err(e)) => {
                if e.is_protocol_error() {
                    counter!("seclog.errors.protocol").increment(1);
                } else {
                    counter!("seclog.errors.transport").increment(1);
                }
                Err(e.into())
            }
            None => Ok(None),
        }
    }

    /// Shut the transport down, waiting at most `timeout`
    #[instrument(skip(self), fields(worker_id = %self.peer.worker_id))]
    pub async fn close(mut self, timeout: Duration) -> Result<()> {
        let result = tokio::time::timeout(timeout, self.framed.get_mut().shutdown()).await;
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Ok(Err(e)) => Err(ServiceError::Io(e)),
            Err(_) => {
                warn!("Close timed out, dropping connection");
                Ok(())
            }
        }
    }
}

impl Drop for LogConnection {
    fn drop(&mut self) {
        gauge!("seclog.connections.active").decrement(1.0);
        histogram!("seclog.connection.duration").record(self.created_at.elapsed().as_secs_f64());
    }
}

impl std::fmt::Debug for LogConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogConnection")
            .field("peer", &self.peer)
            .field("messages_received", &self.messages_received)
            .field("bytes_received", &self.bytes_received)
            .finish_non_exhaustive()
    }
}
