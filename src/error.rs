//! Error types for proxylink

use std::io;

use thiserror::Error;

/// Main error type for proxylink
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Timeout")]
    Timeout,

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

impl Error {
    /// Build the `io::Error` returned by reads and writes on a closed endpoint.
    pub fn closed() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, Error::ConnectionClosed)
    }

    /// Check whether an `io::Error` is the closed error.
    ///
    /// Both a local `close()` and an interrupted session (cancellation,
    /// outbound failure) report it. Transport failures of the outbound are
    /// not forwarded to the caller; they only end the session.
    pub fn is_closed(err: &io::Error) -> bool {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<Error>())
            .is_some_and(|e| matches!(e, Error::ConnectionClosed))
    }
}

/// Result type alias for proxylink
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_error_roundtrip() {
        let err = Error::closed();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(Error::is_closed(&err));
    }

    #[test]
    fn test_plain_io_error_is_not_closed() {
        let err = io::Error::new(io::ErrorKind::NotConnected, "peer went away");
        assert!(!Error::is_closed(&err));
        assert!(!Error::is_closed(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }
}
