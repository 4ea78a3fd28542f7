//! Error types for ferrexpect.

use std::io;
use thiserror::Error;

/// Boxed error returned by `then` callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for ferrexpect operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid regex pattern in a matcher configuration
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The read deadline elapsed before data arrived
    #[error("Read deadline exceeded")]
    Timeout,

    /// The reader's cancellation token fired before data arrived
    #[error("Read cancelled")]
    Cancelled,

    /// Error returned by the underlying stream, passed through unchanged
    #[error("Upstream error: {0}")]
    Upstream(#[source] io::Error),

    /// The background reader thread could not be started
    #[error("Failed to start reader thread: {0}")]
    Spawn(#[source] io::Error),

    /// A `then` callback failed
    #[error("Callback failed: {0}")]
    Callback(#[source] BoxError),

    /// The stream ended without any matcher accepting the output
    #[error("Stream ended before a match ({} bytes read)", .output.len())]
    NoMatch { output: Vec<u8> },

    /// An expect call stopped early; `output` is what it had already read
    #[error("Expect stopped after {} bytes: {source}", .output.len())]
    Interrupted {
        output: Vec<u8>,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether the read failed because its deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Interrupted { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Whether the read failed because its context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Interrupted { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Output an expect call had read before failing, if any was kept.
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            Error::NoMatch { output } | Error::Interrupted { output, .. } => {
                Some(output.as_slice())
            }
            _ => None,
        }
    }

    /// Timeouts and cancellations leave the stream intact; a later read may succeed.
    pub fn is_temporary(&self) -> bool {
        self.is_timeout() || self.is_cancelled()
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Upstream(e) => e,
            Error::Timeout => io::Error::new(io::ErrorKind::TimedOut, err),
            Error::Cancelled => io::Error::other(err),
            Error::NoMatch { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            Error::InvalidPattern(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            Error::Spawn(e) => e,
            Error::Callback(_) => io::Error::other(err),
            Error::Interrupted { source, .. } => io::Error::from(*source),
        }
    }
}

/// Result type alias using ferrexpect's Error.
pub type Result<T> = std::result::Result<T, Error>;
