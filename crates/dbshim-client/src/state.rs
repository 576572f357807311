//! Connection and reader states.
//!
//! ## Connection
//!
//! ```text
//! Closed -> Open    (via open())
//! Open   -> Closed  (via close(), drop, or a reader opened with CLOSE_CONNECTION)
//! ```
//!
//! ## Reader
//!
//! ```text
//! InResultSet  -> BetweenResults (end of the current set)
//! BetweenResults -> InResultSet  (next_result() found another set)
//! *            -> Exhausted      (end of batch, or batch cancelled)
//! *            -> Closed         (close())
//! ```

use std::fmt;

/// Whether a connection currently holds a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session.
    #[default]
    Closed,
    /// A session is established.
    Open,
}

impl ConnectionState {
    /// Check if the connection holds a session.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
        })
    }
}

/// Position of a reader within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReaderState {
    /// Rows of the current result set may follow.
    InResultSet,
    /// The current result set has ended; more may follow.
    BetweenResults,
    /// The batch has no more output.
    Exhausted,
    /// `close()` has been called.
    Closed,
}

impl ReaderState {
    /// Whether the batch may still deliver tokens.
    pub(crate) fn is_streaming(self) -> bool {
        matches!(self, Self::InResultSet | Self::BetweenResults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
        assert!(ConnectionState::Open.is_open());
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    #[test]
    fn test_reader_streaming() {
        assert!(ReaderState::InResultSet.is_streaming());
        assert!(ReaderState::BetweenResults.is_streaming());
        assert!(!ReaderState::Exhausted.is_streaming());
        assert!(!ReaderState::Closed.is_streaming());
    }
}
