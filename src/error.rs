//! Error types for the IRC client session.
//!
//! This module defines the failures a session can surface: transport
//! errors, fatal registration outcomes, line parsing failures and
//! internal relation-consistency faults.

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake failed or the server name was unusable.
    #[error("tls error: {0}")]
    Tls(String),

    /// Registration with the server failed.
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),

    /// The user/channel store disagreed with itself.
    #[error("internal consistency fault: {0}")]
    Consistency(#[from] ConsistencyError),

    /// A caller waiting for a stale channel mode was released without an answer.
    #[error("waiting for the mode of {channel} was interrupted")]
    ModeWaitInterrupted {
        /// The channel whose mode was requested.
        channel: String,
    },

    /// The channel is not known to the session.
    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    /// The connection is gone.
    #[error("not connected")]
    Disconnected,

    /// The configured character encoding is not available.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Fatal outcomes of the registration phase.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistrationError {
    /// Nickname collision and automatic nick change is disabled.
    #[error("nickname in use: {nick}")]
    NicknameInUse {
        /// The nickname the server refused.
        nick: String,
    },

    /// The server answered with an error numeric before welcoming us.
    #[error("server rejected registration with {code}: {line}")]
    Rejected {
        /// The numeric reply code.
        code: u16,
        /// The raw line.
        line: String,
    },

    /// A capability handler gave up.
    #[error("capability handler {handler} failed: {reason}")]
    Capability {
        /// Name of the handler.
        handler: String,
        /// What went wrong.
        reason: String,
    },

    /// The socket closed before the server welcomed us.
    #[error("connection closed before registration completed")]
    ConnectionClosed,
}

/// Failure to split a raw line into source, command and parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LineParseError {
    /// Line was empty.
    #[error("empty line")]
    Empty,

    /// Parsing stopped before a command was found.
    #[error("parsing failed at position {position} while {context}")]
    Malformed {
        /// Byte position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: &'static str,
    },
}

/// The two directions of a user/channel relation disagree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{relation} relation disagrees for {user} on {channel}")]
pub struct ConsistencyError {
    /// Which relation (membership, op, voice, ...).
    pub relation: &'static str,
    /// Nick of the affected user, or its id when unknown.
    pub user: String,
    /// Name of the affected channel, or its id when unknown.
    pub channel: String,
}
