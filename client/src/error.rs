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

//! Client error types

use seclog_codec::FrameError;
use std::fmt;
use std::io;

/// Client error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// I/O error
    Io(String),

    /// Connect or TLS handshake did not finish in time
    ConnectionTimeout,

    /// Connection refused
    ConnectionRefused,

    /// Connection closed by server
    ConnectionClosed,

    /// Not connected
    NotConnected,

    /// TLS setup or handshake failure
    Tls(String),

    /// Trust anchors could not be loaded
    Certificate(String),

    /// Host name is not a valid TLS server name
    InvalidServerName(String),

    /// Message does not fit in one frame
    MessageTooLarge(usize),

    /// Invalid client configuration
    Config(String),
}

impl ClientError {
    /// Whether the connection was lost and a later send may reconnect
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::ConnectionRefused | Self::ConnectionTimeout | Self::Io(_)
        )
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::ConnectionTimeout => write!(f, "Connection timeout"),
            Self::ConnectionRefused => write!(f, "Connection refused"),
            Self::ConnectionClosed => write!(f, "Connection closed by server"),
            Self::NotConnected => write!(f, "Not connected"),
            Self::Tls(msg) => write!(f, "TLS error: {}", msg),
            Self::Certificate(msg) => write!(f, "Certificate error: {}", msg),
            Self::InvalidServerName(name) => write!(f, "Invalid server name: {}", name),
            Self::MessageTooLarge(length) => {
                write!(f, "Message of {} bytes does not fit in a frame", length)
            }
            Self::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut => Self::ConnectionTimeout,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::ConnectionClosed,
            io::ErrorKind::InvalidData => Self::Tls(error.to_string()),
            _ => Self::Io(error.to_string()),
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(error: FrameError) -> Self {
        match error {
            FrameError::MessageTooLarge { length } => Self::MessageTooLarge(length),
            FrameError::Io(e) => e.into(),
            other => Self::Io(other.to_string()),
        }
    }
}

impl From<rustls::Error> for ClientError {
    fn from(error: rustls::Error) -> Self {
        Self::Tls(error.to_string())
    }
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
