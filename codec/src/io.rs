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

//! Reader and writer helpers for both cooperative and blocking transports.
//!
//! Both readers treat a transport `UnexpectedEof` exactly like a zero-length read, since TLS
//! stacks report a peer that dropped TCP without `close_notify` that way.

use crate::codec::{READ_CHUNK, header_for};
use crate::{FrameError, FrameResult, HEADER_LEN, Message};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use bytes::BytesMut;
use std::io::{ErrorKind, Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read exactly one frame from an async reader.
///
/// Keeps reading until the full payload has been accumulated, however the transport splits
/// it. Returns [`FrameError::ConnectionClosed`] if the stream ends before any header byte.
pub async fn read_frame<R>(reader: &mut R) -> FrameResult<Message>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]).await {
            Ok(0) => return Err(FrameError::at_eof(None, filled)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(FrameError::at_eof(None, filled));
            }
            Err(e) => return Err(e.into()),
        }
    }

    let length = BigEndian::read_u32(&header);
    let expected = length as usize;
    let mut payload = BytesMut::with_capacity(expected.min(READ_CHUNK));
    while payload.len() < expected {
        let remaining = expected - payload.len();
        payload.reserve(remaining.min(READ_CHUNK));
        let mut limited = (&mut *reader).take(remaining as u64);
        match limited.read_buf(&mut payload).await {
            Ok(0) => return Err(FrameError::at_eof(Some(length), payload.len())),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(FrameError::at_eof(Some(length), payload.len()));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Message::from(payload.freeze()))
}

/// Write one frame to an async writer and flush it.
pub async fn write_frame<W>(writer: &mut W, message: impl AsRef<[u8]>) -> FrameResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = crate::encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one frame from a blocking reader.
///
/// Same semantics as [`read_frame`]. `Interrupted` reads are retried.
pub fn read_frame_blocking<R>(reader: &mut R) -> FrameResult<Message>
where
    R: Read + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) => return Err(FrameError::at_eof(None, filled)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(FrameError::at_eof(None, filled));
            }
            Err(e) => return Err(e.into()),
        }
    }

    let length = BigEndian::read_u32(&header);
    let expected = length as usize;
    let mut payload = Vec::with_capacity(expected.min(READ_CHUNK));
    while payload.len() < expected {
        let start = payload.len();
        let chunk = (expected - start).min(READ_CHUNK);
        payload.resize(start + chunk, 0);
        match reader.read(&mut payload[start..]) {
            Ok(0) => return Err(FrameError::at_eof(Some(length), start)),
            Ok(n) => payload.truncate(start + n),
            Err(e) if e.kind() == ErrorKind::Interrupted => payload.truncate(start),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(FrameError::at_eof(Some(length), start));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Message::from(payload))
}

/// Write one frame to a blocking writer and flush it.
pub fn write_frame_blocking<W>(writer: &mut W, message: impl AsRef<[u8]>) -> FrameResult<()>
where
    W: Write + ?Sized,
{
    let payload = message.as_ref();
    // Validates the length before anything reaches the writer
    header_for(payload.len())?;
    writer.write_u32::<BigEndian>(payload.len() as u32)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Async reader that hands out at most `chunk` bytes per poll.
    struct ChunkedReader {
        data: Vec<u8>,
        position: usize,
        chunk: usize,
    }

    impl ChunkedReader {
        fn new(data: impl Into<Vec<u8>>, chunk: usize) -> Self {
            Self {
                data: data.into(),
                position: 0,
                chunk,
            }
        }
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let end = (self.position + self.chunk)
                .min(self.data.len())
                .min(self.position + buf.remaining());
            let start = self.position;
            buf.put_slice(&self.data[start..end]);
            self.position = end;
            Poll::Ready(Ok(()))
        }
    }

    /// Blocking reader that hands out at most `chunk` bytes per call.
    struct ChunkedBlocking(Cursor<Vec<u8>>, usize);

    impl Read for ChunkedBlocking {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let limit = buf.len().min(self.1);
            Read::read(&mut self.0, &mut buf[..limit])
        }
    }

    fn frames(payloads: &[&[u8]]) -> Vec<u8> {
        payloads
            .iter()
            .flat_map(|p| crate::encode(p).unwrap().to_vec())
            .collect()
    }

    #[tokio::test]
    async fn test_read_frame_whole() {
        let mut reader = ChunkedReader::new(frames(&[b"hello"]), 1024);
        let message = read_frame(&mut reader).await.unwrap();
        assert_eq!(message.as_bytes(), b"hello");
    }

    #[tokio::test]
    async fn test_read_frame_byte_at_a_time() {
        let mut reader = ChunkedReader::new(frames(&[b"fragmented payload", b"next"]), 1);
        assert_eq!(
            read_frame(&mut reader).await.unwrap().as_bytes(),
            b"fragmented payload"
        );
        assert_eq!(read_frame(&mut reader).await.unwrap().as_bytes(), b"next");
        assert!(read_frame(&mut reader).await.unwrap_err().is_clean_close());
    }

    #[tokio::test]
    async fn test_read_frame_does_not_consume_next_frame() {
        let mut reader = ChunkedReader::new(frames(&[b"a", b"bb", b"ccc"]), 64);
        for expected in [&b"a"[..], b"bb", b"ccc"] {
            assert_eq!(read_frame(&mut reader).await.unwrap().as_bytes(), expected);
        }
    }

    #[tokio::test]
    async fn test_read_frame_end_of_stream_classification() {
        let mut empty = ChunkedReader::new(Vec::new(), 8);
        assert!(matches!(
            read_frame(&mut empty).await,
            Err(FrameError::ConnectionClosed)
        ));

        let mut partial_header = ChunkedReader::new(vec![0, 0], 8);
        assert!(matches!(
            read_frame(&mut partial_header).await,
            Err(FrameError::TruncatedHeader { received: 2 })
        ));

        let mut partial_payload = ChunkedReader::new(vec![0, 0, 0, 8, b'a', b'b'], 1);
        assert!(matches!(
            read_frame(&mut partial_payload).await,
            Err(FrameError::TruncatedPayload {
                expected: 8,
                received: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(16);
        let writer = tokio::spawn(async move {
            write_frame(&mut client, b"a message longer than the duplex buffer")
                .await
                .unwrap();
        });
        let message = read_frame(&mut server).await.unwrap();
        assert_eq!(
            message.as_bytes(),
            b"a message longer than the duplex buffer"
        );
        writer.await.unwrap();
    }

    #[test]
    fn test_blocking_round_trip_in_chunks() {
        let mut wire = Vec::new();
        write_frame_blocking(&mut wire, b"blocking").unwrap();
        write_frame_blocking(&mut wire, b"").unwrap();

        let mut reader = ChunkedBlocking(Cursor::new(wire), 3);
        assert_eq!(read_frame_blocking(&mut reader).unwrap().as_bytes(), b"blocking");
        assert!(read_frame_blocking(&mut reader).unwrap().is_empty());
        assert!(read_frame_blocking(&mut reader).unwrap_err().is_clean_close());
    }

    #[test]
    fn test_blocking_truncation() {
        let mut reader = Cursor::new(vec![0u8]);
        assert!(matches!(
            read_frame_blocking(&mut reader),
            Err(FrameError::TruncatedHeader { received: 1 })
        ));

        let mut reader = Cursor::new(vec![0u8, 0, 0, 3, b'x']);
        assert!(matches!(
            read_frame_blocking(&mut reader),
            Err(FrameError::TruncatedPayload {
                expected: 3,
                received: 1
            })
        ));
    }
}
