//! Driver seam.
//!
//! The facade never speaks a wire protocol itself. A [`Driver`] opens
//! [`Session`]s, and a session answers each submitted batch with an ordered
//! stream of [`Token`]s:
//!
//! ```text
//! submit("SELECT a FROM t; UPDATE t SET a = 1; SELECT b FROM u;")
//!
//!   Metadata[a]  Row  Row  Done(None)      -- first result set
//!   Done(Some(2))                          -- UPDATE, no result set
//!   Metadata[b]  Row  Done(None)           -- second result set
//!   <end of stream>
//! ```
//!
//! `next_token` returns `Ok(None)` once the batch is fully consumed. Server
//! errors are returned from `next_token` (or `submit`) as
//! [`Error::Server`](crate::Error::Server).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dbshim_types::SqlValue;

use crate::error::Result;

/// Opens sessions against a database server.
#[async_trait]
pub trait Driver: Send + Sync + fmt::Debug {
    /// Short name of the backing system, recorded on trace spans.
    fn name(&self) -> &str;

    /// Open a session. The connection string is passed through untouched.
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn Session>>;
}

/// One live session with a database server.
///
/// A session runs at most one batch at a time. The facade guarantees it
/// only calls `submit` after the previous batch's stream has ended (by
/// draining it or calling `cancel`).
#[async_trait]
pub trait Session: Send {
    /// Send a batch. Returns once the server has accepted it.
    async fn submit(&mut self, sql: &str) -> Result<()>;

    /// Next token of the current batch, or `None` at end of batch.
    async fn next_token(&mut self) -> Result<Option<Token>>;

    /// Abort the current batch and discard whatever it has not yet
    /// delivered. Must be a no-op when no batch is in flight.
    async fn cancel(&mut self) -> Result<()>;

    /// End the session.
    async fn close(&mut self) -> Result<()>;
}

/// One element of a batch response.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Start of a result set.
    Metadata(Arc<[Column]>),
    /// A row of the current result set.
    Row(Vec<SqlValue>),
    /// End of one statement.
    Done(Done),
}

/// Completion of one statement in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Done {
    /// Rows affected, when the statement reports a count.
    pub rows_affected: Option<u64>,
}

impl Done {
    /// A statement that reported a row count.
    #[must_use]
    pub fn with_count(rows: u64) -> Self {
        Self {
            rows_affected: Some(rows),
        }
    }

    /// A statement that did not report a row count.
    #[must_use]
    pub fn without_count() -> Self {
        Self::default()
    }
}

/// Result set column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Column {
    /// Column name (may be empty for unnamed expressions).
    pub name: String,
    /// SQL type name (e.g., "INT", "NVARCHAR").
    pub type_name: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
}

impl Column {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
        }
    }

    /// Set whether the column is nullable.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}
