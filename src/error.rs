//! Error types for hgwire.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for all hgwire operations.
#[derive(Debug, Error)]
pub enum HgwireError {
    /// Caller-supplied argument was unusable (empty repo path, empty argv,
    /// oversized input chunk).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Repository path does not exist or does not contain a `.hg` directory.
    #[error("not a Mercurial repository: {}", .0.display())]
    InvalidRepository(PathBuf),

    /// The `hg` executable could not be started.
    #[error("command server could not be started: {0}")]
    ServerUnavailable(#[source] std::io::Error),

    /// The hello frame was missing, malformed, or lacked a required field.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Protocol violation (unknown mandatory channel, malformed frame).
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Pipe read/write error or premature EOF. The session is poisoned and
    /// should be closed.
    #[error("transport failed: {0}")]
    Transport(#[from] std::io::Error),

    /// A command exited non-zero where zero was expected.
    #[error("command failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        /// Exit code reported on the result channel.
        exit_code: i32,
        /// Captured output-channel bytes, decoded as UTF-8.
        stdout: String,
        /// Captured error-channel bytes, decoded as UTF-8.
        stderr: String,
    },

    /// The session was used after `close`.
    #[error("session is closed")]
    SessionClosed,

    /// Command output did not match the expected shape (version banner).
    #[error("unparseable command output: {0}")]
    Parse(String),
}

/// Result type alias using HgwireError.
pub type Result<T> = std::result::Result<T, HgwireError>;
