// SPDX-License-Identifier: MPL-2.0
use std::fmt;

#[derive(Debug, Clone)]
pub enum Error {
    Io(String),
    Config(String),
    Transport(String),
    Protocol(String),
    Session(SessionError),
}

/// Specific error types for watch-session lifecycle violations.
///
/// These are sequencing errors on the client side, as opposed to
/// transport failures which are expected and recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A session-start was requested while another session is already
    /// active for the same video and `forceNew` was not set.
    AlreadyActive,

    /// An operation required an open session but none exists.
    NoActiveSession,

    /// An operation was attempted on a session that has already reached
    /// its terminal completed state.
    AlreadyCompleted,

    /// A resume decision arrived but no resume prompt is pending.
    NoPendingPrompt,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyActive => {
                write!(f, "a watch session is already active for this video")
            }
            SessionError::NoActiveSession => write!(f, "no active watch session"),
            SessionError::AlreadyCompleted => write!(f, "watch session is already completed"),
            SessionError::NoPendingPrompt => write!(f, "no resume prompt is pending"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O Error: {}", e),
            Error::Config(e) => write!(f, "Config Error: {}", e),
            Error::Transport(e) => write!(f, "Transport Error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol Error: {}", e),
            Error::Session(e) => write!(f, "Session Error: {}", e),
        }
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Error::Session(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
