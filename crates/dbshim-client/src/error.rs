//! Client error types.

use dbshim_types::TypeError;
use thiserror::Error;

/// Errors that can occur during connection, command or reader operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The cancellation token was signaled before or during the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The driver failed to establish or maintain the session.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The driver produced a token stream the reader cannot follow.
    ///
    /// This points at a driver bug and will not go away on retry.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// `open` was called on a connection that is already open.
    #[error("connection is already open")]
    AlreadyOpen,

    /// The operation requires an open connection.
    #[error("connection is not open")]
    NotOpen,

    /// Opening the connection did not finish within the connect timeout.
    #[error("connection timed out")]
    ConnectionTimeout,

    /// The command could not be executed as given.
    #[error("command error: {0}")]
    Command(String),

    /// The server rejected the batch.
    #[error("server error {number}: {message}")]
    Server {
        /// Error number.
        number: i32,
        /// Error class/severity (0-25).
        class: u8,
        /// Error state.
        state: u8,
        /// Error message.
        message: String,
    },

    /// The command did not finish within the command timeout.
    #[error("command timed out")]
    CommandTimeout,

    /// A field was addressed with an index outside the current result set.
    #[error("column index {index} out of range (result set has {count} columns)")]
    ColumnOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of columns in the current result set.
        count: usize,
    },

    /// No column of the current result set has the given name.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// Field access before the first successful `read`, or after the last.
    #[error("no current row")]
    NoCurrentRow,

    /// The reader has been closed.
    #[error("reader is closed")]
    ReaderClosed,

    /// A field could not be converted to the requested type.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// The layer an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A cancellation signal was observed.
    Cancelled,
    /// Opening, closing or holding the session failed.
    Connection,
    /// Executing a command failed.
    Command,
    /// Reading a result failed.
    Reader,
}

impl Error {
    /// Which layer this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Connection(_)
            | Self::Protocol(_)
            | Self::AlreadyOpen
            | Self::NotOpen
            | Self::ConnectionTimeout
            | Self::Config(_) => ErrorKind::Connection,
            Self::Command(_) | Self::Server { .. } | Self::CommandTimeout => ErrorKind::Command,
            Self::ColumnOutOfRange { .. }
            | Self::ColumnNotFound(_)
            | Self::NoCurrentRow
            | Self::ReaderClosed
            | Self::Type(_) => ErrorKind::Reader,
        }
    }

    /// Check if this error indicates a misbehaving driver.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Check if this error was caused by a cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is transient and may succeed on a later attempt.
    ///
    /// The facade never retries by itself.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout | Self::CommandTimeout | Self::Connection(_)
        )
    }

    /// Check if this is a server error with a specific number.
    #[must_use]
    pub fn is_server_error(&self, number: i32) -> bool {
        matches!(self, Self::Server { number: n, .. } if *n == number)
    }

    /// Get the error class/severity if this is a server error.
    #[must_use]
    pub fn class(&self) -> Option<u8> {
        match self {
            Self::Server { class, .. } => Some(*class),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_grouping() {
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(Error::AlreadyOpen.kind(), ErrorKind::Connection);
        assert_eq!(Error::CommandTimeout.kind(), ErrorKind::Command);
        assert_eq!(Error::Protocol("x".into()).kind(), ErrorKind::Connection);
        assert_eq!(
            Error::Type(TypeError::UnexpectedNull).kind(),
            ErrorKind::Reader
        );
        assert_eq!(
            Error::ColumnOutOfRange { index: 3, count: 1 }.kind(),
            ErrorKind::Reader
        );
    }

    #[test]
    fn test_server_error_helpers() {
        let err = Error::Server {
            number: 208,
            class: 16,
            state: 1,
            message: "Invalid object name 'Persons'.".into(),
        };
        assert!(err.is_server_error(208));
        assert!(!err.is_server_error(102));
        assert_eq!(err.class(), Some(16));
        assert!(!err.is_transient());
        assert_eq!(Error::Cancelled.class(), None);
    }

    #[test]
    fn test_protocol_error_is_not_transient() {
        let err = Error::Protocol("driver sent a row before result set metadata".into());
        assert!(err.is_protocol_error());
        assert!(!err.is_transient());
        assert!(Error::Connection("reset".into()).is_transient());
        assert!(!Error::Connection("reset".into()).is_protocol_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::Cancelled.to_string(), "operation cancelled");
        assert_eq!(
            Error::ColumnOutOfRange { index: 2, count: 1 }.to_string(),
            "column index 2 out of range (result set has 1 columns)"
        );
    }
}
