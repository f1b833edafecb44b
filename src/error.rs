//! Error types for reflash.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for reflash operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (TCP/telnet connection, raw I/O)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session-level errors (login handshake, prompt waits, transcript)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Pattern-table errors
    #[error("Pattern table error: {0}")]
    Table(#[from] TableError),
}

/// Transport layer errors (telnet connection, raw stream I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to the console address
    #[error("Connection failed to {address}: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// TCP connect did not complete in time
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// I/O error on the stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session layer errors (handshake, authentication, prompt waits).
#[derive(Error, Debug)]
pub enum SessionError {
    /// The remote side reported the connection was refused
    #[error("Connection refused by {address}")]
    ConnectionRefused { address: String },

    /// No recognizable prompt appeared within the startup window
    #[error("No prompt recognized within {0:?} of connecting")]
    NoInitialPrompt(Duration),

    /// Login/password exchange never reached the shell prompt
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// A prompt wait elapsed where the caller treats timeout as an error
    #[error("Prompt not seen within {0:?}")]
    PromptTimeout(Duration),

    /// The stream ended while waiting for a pattern
    #[error("End of stream while awaiting a pattern")]
    Eof,

    /// Invalid prompt or table regex
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Transcript file error
    #[error("Transcript error: {0}")]
    Transcript(#[source] io::Error),
}

/// Pattern-table construction and evaluation errors.
#[derive(Error, Debug)]
pub enum TableError {
    /// Every table must carry a timeout step; open-ended waits are
    /// rejected before the first await.
    #[error("Pattern table has no timeout step")]
    MissingTimeoutStep,
}

/// Result type alias using reflash's Error.
pub type Result<T> = std::result::Result<T, Error>;
