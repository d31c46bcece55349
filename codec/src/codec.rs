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

use crate::{FrameError, FrameResult, Message};
use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Size of the big-endian length header.
pub const HEADER_LEN: usize = 4;

/// Largest payload a frame header can describe.
pub const MAX_MESSAGE_LEN: usize = u32::MAX as usize;

/// Upper bound on buffer growth per decode call.
///
/// A header can announce up to 4 GiB; the buffer grows with the bytes that actually arrive.
pub(crate) const READ_CHUNK: usize = 64 * 1024;

/// Encode a message into a standalone frame.
///
/// Fails with [`FrameError::MessageTooLarge`] if the payload does not fit a 32-bit header.
pub fn encode(message: impl AsRef<[u8]>) -> FrameResult<Bytes> {
    let payload = message.as_ref();
    let header = header_for(payload.len())?;
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_slice(&header);
    frame.put_slice(payload);
    Ok(frame.freeze())
}

pub(crate) fn header_for(length: usize) -> FrameResult<[u8; HEADER_LEN]> {
    let length = u32::try_from(length).map_err(|_| FrameError::MessageTooLarge { length })?;
    let mut header = [0u8; HEADER_LEN];
    BigEndian::write_u32(&mut header, length);
    Ok(header)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for the four header bytes
    #[default]
    Header,
    /// Header consumed, waiting for this many payload bytes
    Payload(u32),
}

/// Tokio codec for length-prefixed log frames.
///
/// The decoder consumes the header as soon as it is complete and then waits for the payload,
/// so a partially received frame never leaves the codec.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    max_frame_length: Option<u32>,
    state: DecoderState,
}

impl FrameCodec {
    /// Creates a codec that accepts the full 32-bit length range.
    pub fn new() -> FrameCodec {
        FrameCodec::default()
    }

    /// Creates a codec that rejects frames announcing more than `max` payload bytes.
    pub fn with_max_frame_length(max: u32) -> FrameCodec {
        FrameCodec {
            max_frame_length: Some(max),
            state: DecoderState::Header,
        }
    }

    /// Configured maximum payload length, if any.
    pub fn max_frame_length(&self) -> Option<u32> {
        self.max_frame_length
    }

    /// Returns `true` while the decoder holds part of a frame.
    ///
    /// Bytes still in the read buffer are not tracked here; combine with the buffer length.
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecoderState::Payload(_))
    }

    /// Classify an end of stream with `buffered` unread bytes left in the read buffer.
    pub fn eof_error(&self, buffered: usize) -> FrameError {
        match self.state {
            DecoderState::Header => FrameError::at_eof(None, buffered),
            DecoderState::Payload(length) => FrameError::at_eof(Some(length), buffered),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, Self::Error> {
        let length = match self.state {
            DecoderState::Header => {
                if src.len() < HEADER_LEN {
                    src.reserve(HEADER_LEN - src.len());
                    return Ok(None);
                }
                let length = BigEndian::read_u32(&src[..HEADER_LEN]);
                if let Some(max) = self.max_frame_length {
                    if length > max {
                        return Err(FrameError::FrameTooLarge { length, max });
                    }
                }
                src.advance(HEADER_LEN);
                self.state = DecoderState::Payload(length);
                length
            }
            DecoderState::Payload(length) => length,
        };

        let expected = length as usize;
        if src.len() < expected {
            src.reserve((expected - src.len()).min(READ_CHUNK));
            return Ok(None);
        }

        self.state = DecoderState::Header;
        let payload = src.split_to(expected).freeze();
        trace!(length = expected, "Decoded frame");
        Ok(Some(Message::from(payload)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if src.is_empty() && !self.is_mid_frame() {
            return Ok(None);
        }
        let err = self.eof_error(src.len());
        self.state = DecoderState::Header;
        src.clear();
        Err(err)
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&[u8]>>::encode(self, item.as_bytes(), dst)
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = header_for(item.len())?;
        dst.reserve(HEADER_LEN + item.len());
        dst.put_slice(&header);
        dst.put_slice(item);
        Ok(())
    }
}
