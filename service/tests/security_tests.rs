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

//! Hostile and malformed input tests

use seclog_codec::{FrameError, write_frame};
use seclog_service::{
    ChannelSink, ServerMetrics, ServiceError, WorkerConfig, WorkerOutcome, WorkerSupervisor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, duplex};

fn supervisor(config: WorkerConfig) -> (WorkerSupervisor, Arc<ServerMetrics>) {
    let metrics = Arc::new(ServerMetrics::new());
    (WorkerSupervisor::new(config, metrics.clone()), metrics)
}

#[tokio::test]
async fn test_binary_payload_delivered_verbatim() {
    let (supervisor, _) = supervisor(WorkerConfig::default());
    let (sink, mut rx) = ChannelSink::new(4);
    let (mut client, server) = duplex(1024);
    supervisor.spawn(
        "127.0.0.1:1".parse().unwrap(),
        async move { Ok(server) },
        Arc::new(sink),
    );

    let payload: Vec<u8> = (0..=255u8).chain([0, 0, 0, 0]).collect();
    write_frame(&mut client, &payload).await.unwrap();

    let (_, message) = rx.recv().await.unwrap();
    assert_eq!(message.as_bytes(), payload.as_slice());
}

#[tokio::test]
async fn test_oversized_frame_is_refused() {
    let config = WorkerConfig {
        max_frame_length: Some(1024),
        ..Default::default()
    };
    let (supervisor, metrics) = supervisor(config);
    let (sink, mut rx) = ChannelSink::new(4);
    let (mut client, server) = duplex(1024);
    let handle = supervisor.spawn(
        "127.0.0.1:1".parse().unwrap(),
        async move { Ok(server) },
        Arc::new(sink),
    );

    write_frame(&mut client, b"small").await.unwrap();
    // Announce 1 MiB; the worker must fail on the header alone
    client.write_all(&(1u32 << 20).to_be_bytes()).await.unwrap();

    let outcome = handle.join().await.unwrap();
    assert!(matches!(
        outcome,
        WorkerOutcome::Failed(ServiceError::Frame(FrameError::FrameTooLarge {
            length: 1048576,
            max: 1024
        }))
    ));
    assert_eq!(rx.recv().await.unwrap().1.as_bytes(), b"small");
    assert_eq!(metrics.snapshot().protocol_errors, 1);
}

#[tokio::test]
async fn test_huge_header_without_payload() {
    let (supervisor, _) = supervisor(WorkerConfig::default());
    let (sink, mut rx) = ChannelSink::new(4);
    let (mut client, server) = duplex(1024);
    let handle = supervisor.spawn(
        "127.0.0.1:1".parse().unwrap(),
        async move { Ok(server) },
        Arc::new(sink),
    );

    client.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
    client.write_all(b"only a little").await.unwrap();
    drop(client);

    let outcome = handle.join().await.unwrap();
    assert!(matches!(
        outcome,
        WorkerOutcome::Failed(ServiceError::Frame(FrameError::TruncatedPayload {
            expected: 4294967295,
            received: 13
        }))
    ));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_slow_loris_is_cut_off_by_read_timeout() {
    let config = WorkerConfig {
        read_timeout: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let (supervisor, metrics) = supervisor(config);
    let (sink, _rx) = ChannelSink::new(4);
    let (mut client, server) = duplex(1024);
    let handle = supervisor.spawn(
        "127.0.0.1:1".parse().unwrap(),
        async move { Ok(server) },
        Arc::new(sink),
    );

    // A header, then nothing
    client.write_all(&[0, 0, 0, 10]).await.unwrap();

    let outcome = handle.join().await.unwrap();
    assert!(matches!(outcome, WorkerOutcome::Failed(ServiceError::ReadTimeout)));
    assert_eq!(metrics.snapshot().timeout_errors, 1);
    assert_eq!(supervisor.worker_count(), 0);
}
