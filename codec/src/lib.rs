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

//! # Seclog Frame Codec
//!
//! This crate implements the wire framing used between log emitters and the seclog
//! collector. Every log message travels as one frame:
//!
//! ```text
//! +----------------------+---------------------------+
//! | length: u32 (BE)     | payload: `length` bytes   |
//! +----------------------+---------------------------+
//! ```
//!
//! There is no acknowledgement, heartbeat or trailer. A connection that closes on a frame
//! boundary ends cleanly; one that closes inside a frame is a protocol violation.
//!
//! ## Core Components
//!
//! ### [`FrameCodec`]
//!
//! Implements [`Encoder`](tokio_util::codec::Encoder) and
//! [`Decoder`](tokio_util::codec::Decoder) so it can drive a
//! [`Framed`](tokio_util::codec::Framed) transport. The decoder buffers partial frames
//! internally and only yields a [`Message`] once the full payload has arrived.
//!
//! ### [`read_frame`] / [`write_frame`]
//!
//! Direct reader/writer helpers for callers that do not want a `Framed` transport, in both
//! async and blocking flavours. The readers keep reading until the whole frame has been
//! accumulated, regardless of how the network fragments it.
//!
//! ## Usage Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use seclog_codec::{FrameCodec, Message};
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let mut codec = FrameCodec::new();
//! let mut buffer = BytesMut::new();
//! codec.encode(Message::from("service started"), &mut buffer).unwrap();
//!
//! assert_eq!(&buffer[..4], &[0, 0, 0, 15]);
//! let message = codec.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(message.as_bytes(), b"service started");
//! ```

mod codec;
mod io;
mod message;
mod result;

pub use codec::{FrameCodec, HEADER_LEN, MAX_MESSAGE_LEN, encode};
pub use io::{read_frame, read_frame_blocking, write_frame, write_frame_blocking};
pub use message::Message;
pub use result::{FrameError, FrameResult};
