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

//! Message sinks
//!
//! A sink receives every complete message decoded by a worker. It is shared by all workers, so
//! implementations must tolerate concurrent calls. Messages from one connection arrive in wire
//! order because each worker awaits `handle` before decoding the next frame.

use crate::{PeerInfo, ServiceError, SinkError};
use async_trait::async_trait;
use seclog_codec::Message;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tracing::info;

/// Destination for decoded log messages
///
/// # Example
///
/// ```
/// use seclog_service::{MessageSink, PeerInfo, SinkError};
/// use seclog_codec::Message;
/// use async_trait::async_trait;
///
/// struct CountingSink(std::sync::atomic::AtomicUsize);
///
/// #[async_trait]
/// impl MessageSink for CountingSink {
///     async fn handle(&self, _peer: &PeerInfo, _message: Message) -> Result<(), SinkError> {
///         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageSink: Send + Sync + 'static {
    /// Handle one complete message
    ///
    /// Errors are logged by the worker and passed to `on_error`; the worker then continues
    /// with the next frame.
    async fn handle(&self, peer: &PeerInfo, message: Message) -> Result<(), SinkError>;

    /// Called after the handshake, before the first message
    async fn on_connect(&self, _peer: &PeerInfo) {}

    /// Called when `handle` fails, and when a connection fails during the handshake or read
    async fn on_error(&self, _peer: &PeerInfo, _error: &ServiceError) {}

    /// Called once the worker stops reading, for every connection that reached `on_connect`
    async fn on_disconnect(&self, _peer: &PeerInfo) {}
}

/// Writes each message to standard output as one line
#[derive(Debug)]
pub struct StdoutSink {
    stdout: Mutex<tokio::io::Stdout>,
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutSink {
    /// Create a sink writing to the process stdout
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl MessageSink for StdoutSink {
    async fn handle(&self, _peer: &PeerInfo, message: Message) -> Result<(), SinkError> {
        let mut line = Vec::with_capacity(message.len() + 1);
        line.extend_from_slice(message.as_bytes());
        line.push(b'\n');

        // Lines from different connections must not interleave
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(&line).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Logs each message through `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl MessageSink for TracingSink {
    async fn handle(&self, peer: &PeerInfo, message: Message) -> Result<(), SinkError> {
        info!(
            worker_id = %peer.worker_id,
            peer_addr = %peer.addr,
            length = message.len(),
            message = %message.to_text(),
            "Log message"
        );
        Ok(())
    }
}

/// Forwards messages to an mpsc channel
///
/// Useful for embedding the service in a larger application and for tests. A full channel
/// applies backpressure to the sending worker only.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<(PeerInfo, Message)>,
}

impl ChannelSink {
    /// Create a sink and the receiving half of its channel
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<(PeerInfo, Message)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Wrap an existing sender
    pub fn from_sender(tx: mpsc::Sender<(PeerInfo, Message)>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn handle(&self, peer: &PeerInfo, message: Message) -> Result<(), SinkError> {
        self.tx
            .send((*peer, message))
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Closure based sink
///
/// # Example
///
/// ```
/// use seclog_service::CallbackSink;
///
/// let sink = CallbackSink::new(|peer, message| {
///     println!("{}: {}", peer.addr, message.to_text());
///     Ok(())
/// });
/// ```
pub struct CallbackSink {
    on_message:
        Box<dyn Fn(&PeerInfo, Message) -> Result<(), SinkError> + Send + Sync + 'static>,
}

impl CallbackSink {
    /// Create a sink from a message callback
    pub fn new<F>(on_message: F) -> Self
    where
        F: Fn(&PeerInfo, Message) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        Self {
            on_message: Box::new(on_message),
        }
    }
}

impl std::fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageSink for CallbackSink {
    async fn handle(&self, peer: &PeerInfo, message: Message) -> Result<(), SinkError> {
        (self.on_message)(peer, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkerId;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn peer() -> PeerInfo {
        PeerInfo {
            worker_id: WorkerId::new(7),
            addr: "127.0.0.1:5000".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new(8);
        for text in ["one", "two", "three"] {
            sink.handle(&peer(), Message::from(text)).await.unwrap();
        }

        for expected in ["one", "two", "three"] {
            let (from, message) = rx.recv().await.unwrap();
            assert_eq!(from, peer());
            assert_eq!(message.as_bytes(), expected.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        let err = sink.handle(&peer(), Message::from("lost")).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[tokio::test]
    async fn test_callback_sink() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sink = CallbackSink::new(move |_, message| {
            counter.fetch_add(message.len(), Ordering::SeqCst);
            Ok(())
        });

        sink.handle(&peer(), Message::from("abcd")).await.unwrap();
        sink.handle(&peer(), Message::from("ef")).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_tracing_sink_logs_message() {
        TracingSink
            .handle(&peer(), Message::from("disk almost full"))
            .await
            .unwrap();
        assert!(logs_contain("disk almost full"));
        assert!(logs_contain("worker-7"));
    }

    #[tokio::test]
    async fn test_default_hooks_are_noops() {
        let sink = TracingSink;
        sink.on_connect(&peer()).await;
        sink.on_error(&peer(), &ServiceError::ReadTimeout).await;
        sink.on_disconnect(&peer()).await;
    }
}
