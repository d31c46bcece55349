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

/// Result Type for Frame Operations
pub type FrameResult<T> = Result<T, FrameError>;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended on a frame boundary.
    ///
    /// This is the normal end of a connection, not a failure. It is surfaced as an error by
    /// [`read_frame`](crate::read_frame) only because that function must return a message.
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended after part of a length header.
    #[error("stream ended after {received} of 4 header bytes")]
    TruncatedHeader {
        /// Header bytes received before the stream ended (1 to 3)
        received: usize,
    },

    /// The stream ended before the announced payload was complete.
    #[error("stream ended after {received} of {expected} payload bytes")]
    TruncatedPayload {
        /// Payload length announced by the header
        expected: usize,
        /// Payload bytes received before the stream ended
        received: usize,
    },

    /// A message cannot be represented by a 32-bit length header.
    #[error("message of {length} bytes exceeds the 32-bit frame limit")]
    MessageTooLarge {
        /// Length of the rejected message
        length: usize,
    },

    /// A received header announced more bytes than the configured maximum.
    #[error("frame of {length} bytes exceeds the configured maximum of {max}")]
    FrameTooLarge {
        /// Length announced by the header
        length: u32,
        /// Configured maximum
        max: u32,
    },

    /// An I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Returns `true` if this error marks a clean end of stream.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, FrameError::ConnectionClosed)
    }

    /// Returns `true` if the peer violated the framing protocol.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            FrameError::TruncatedHeader { .. }
                | FrameError::TruncatedPayload { .. }
                | FrameError::FrameTooLarge { .. }
        )
    }

    /// Classify the end of a stream from the decoder position.
    ///
    /// `header` is the announced payload length once all four header bytes were seen, and
    /// `buffered` counts the bytes received for the section currently being read.
    pub(crate) fn at_eof(header: Option<u32>, buffered: usize) -> FrameError {
        match header {
            None if buffered == 0 => FrameError::ConnectionClosed,
            None => FrameError::TruncatedHeader { received: buffered },
            Some(length) => FrameError::TruncatedPayload {
                expected: length as usize,
                received: buffered,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_classification() {
        assert!(FrameError::at_eof(None, 0).is_clean_close());
        assert!(matches!(
            FrameError::at_eof(None, 3),
            FrameError::TruncatedHeader { received: 3 }
        ));
        assert!(matches!(
            FrameError::at_eof(Some(10), 2),
            FrameError::TruncatedPayload {
                expected: 10,
                received: 2
            }
        ));
        // A complete header with nothing after it is still a truncated payload
        assert!(matches!(
            FrameError::at_eof(Some(10), 0),
            FrameError::TruncatedPayload { received: 0, .. }
        ));
    }

    #[test]
    fn test_error_predicates() {
        assert!(!FrameError::ConnectionClosed.is_protocol_error());
        assert!(FrameError::TruncatedHeader { received: 1 }.is_protocol_error());
        assert!(FrameError::FrameTooLarge { length: 10, max: 5 }.is_protocol_error());
        assert!(!FrameError::MessageTooLarge { length: 0 }.is_protocol_error());
    }

    #[test]
    fn test_error_display() {
        let err = FrameError::TruncatedPayload {
            expected: 12,
            received: 4,
        };
        assert_eq!(err.to_string(), "stream ended after 4 of 12 payload bytes");
    }
}
