//! Error types for the GeoPack writer.

use std::fmt;
use std::io;

/// The result type used throughout GeoPack.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for GeoPack write operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred. Fatal: the partial file must be discarded
    /// and regenerated.
    Io(io::Error),

    /// The caller violated the section protocol: an operation illegal for
    /// the current section kind, a mismatched close, or an unbalanced
    /// stack at file close.
    Protocol(String),

    /// A value does not fit its reserved patch slot (e.g. a shift larger
    /// than a 4-byte slot allows). The run is abandoned.
    LimitExceeded(String),

    /// An invalid argument was provided.
    InvalidArgument(String),
}

impl Error {
    /// Creates a new protocol violation error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new limit exceeded error.
    pub fn limit(msg: impl Into<String>) -> Self {
        Error::LimitExceeded(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Protocol(msg) => write!(f, "Protocol violation: {}", msg),
            Error::LimitExceeded(msg) => write!(f, "Limit exceeded: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
