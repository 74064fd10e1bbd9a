//! Error types for the TMI protocol library.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Line exceeded maximum allowed length.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Actual line length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Failed to parse an IRC line.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The invalid line.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },

    /// A command was missing a parameter its Twitch variant requires.
    #[error("{command} is missing parameter #{index}: {raw}")]
    MissingParameter {
        /// Command name.
        command: &'static str,
        /// Zero-based parameter index.
        index: usize,
        /// The offending raw line.
        raw: String,
    },

    /// A tag carried a value that could not be interpreted.
    #[error("invalid value {value:?} for tag {tag}: {raw}")]
    InvalidTagValue {
        /// Tag key.
        tag: &'static str,
        /// The offending value.
        value: String,
        /// The offending raw line.
        raw: String,
    },

    /// Channel name does not match the Twitch login format.
    #[error("invalid channel name: {0:?}")]
    InvalidChannelName(String),
}

/// Errors encountered when splitting a line into its IRC components.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Parsing stopped at a specific position.
    #[error("parse error at position {position}: {context}")]
    ParseContext {
        /// Byte offset where parsing failed.
        position: usize,
        /// What the parser expected.
        context: String,
    },
}
