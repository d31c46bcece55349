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

//! Benchmarks for frame encoding and decoding

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use seclog_codec::{FrameCodec, Message};
use tokio_util::codec::{Decoder, Encoder};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in [16, 256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut codec = FrameCodec::new();
            let mut buffer = BytesMut::with_capacity(size + 4);
            let message = Message::from(vec![b'x'; size]);

            b.iter(|| {
                buffer.clear();
                codec
                    .encode(black_box(message.clone()), &mut buffer)
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [16, 256, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut wire = BytesMut::new();
            FrameCodec::new()
                .encode(Message::from(vec![b'x'; size]), &mut wire)
                .unwrap();

            b.iter(|| {
                let mut codec = FrameCodec::new();
                let mut src = wire.clone();
                black_box(codec.decode(&mut src).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_decode_fragmented(c: &mut Criterion) {
    let mut wire = BytesMut::new();
    FrameCodec::new()
        .encode(Message::from(vec![b'x'; 4096]), &mut wire)
        .unwrap();

    c.bench_function("decode_fragmented_64", |b| {
        b.iter(|| {
            let mut codec = FrameCodec::new();
            let mut src = BytesMut::new();
            let mut decoded = None;
            for chunk in wire.chunks(64) {
                src.extend_from_slice(chunk);
                if let Some(message) = codec.decode(&mut src).unwrap() {
                    decoded = Some(message);
                }
            }
            black_box(decoded)
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_decode_fragmented);
criterion_main!(benches);
