//! Forward-only reader over the result sets of one batch.
//!
//! Rows are pulled from the session one token at a time. A reader visits
//! result sets in statement order and rows in server order:
//!
//! ```rust,ignore
//! let mut reader = command.execute_reader().await?;
//! loop {
//!     while reader.read().await? {
//!         if !reader.is_null(0).await? {
//!             let name: String = reader.get(0).await?;
//!             println!("{name}");
//!         }
//!     }
//!     if !reader.next_result().await? {
//!         break;
//!     }
//! }
//! reader.close().await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dbshim_types::{FromSql, SqlValue};
use tracing::{Instrument, Span};

use crate::behavior::CommandBehavior;
use crate::cancel::{self, CancellationToken};
use crate::connection::Connection;
use crate::driver::{Column, Done, Session, Token};
use crate::error::{Error, Result};
use crate::state::ReaderState;

/// Where a reader stands in its batch's token stream.
pub(crate) struct Position {
    behavior: CommandBehavior,
    state: ReaderState,
    columns: Arc<[Column]>,
    row: Option<Vec<SqlValue>>,
    /// Metadata of the next result set, seen while finishing the current one.
    lookahead: Option<Token>,
    result_index: usize,
    rows_in_set: u64,
    records_affected: Option<u64>,
}

impl Position {
    pub(crate) fn new(behavior: CommandBehavior) -> Self {
        Self {
            behavior,
            state: ReaderState::BetweenResults,
            columns: Arc::from(Vec::new()),
            row: None,
            lookahead: None,
            result_index: 0,
            rows_in_set: 0,
            records_affected: None,
        }
    }

    pub(crate) fn field_count(&self) -> usize {
        self.columns.len()
    }

    async fn next(&mut self, session: &mut dyn Session) -> Result<Option<Token>> {
        match self.lookahead.take() {
            Some(token) => Ok(Some(token)),
            None => session.next_token().await,
        }
    }

    fn count(&mut self, done: Done) {
        if let Some(rows) = done.rows_affected {
            let total = self.records_affected.unwrap_or(0).saturating_add(rows);
            self.records_affected = Some(total);
        }
    }

    /// Position on the first result set of a freshly submitted batch.
    pub(crate) async fn start(&mut self, session: &mut dyn Session) -> Result<()> {
        self.seek_result_set(session).await
    }

    /// Skip statement completions until the next result set begins or the
    /// batch ends.
    async fn seek_result_set(&mut self, session: &mut dyn Session) -> Result<()> {
        self.row = None;
        loop {
            match self.next(session).await? {
                Some(Token::Metadata(columns)) => {
                    self.columns = columns;
                    self.rows_in_set = 0;
                    self.state = ReaderState::InResultSet;
                    return Ok(());
                }
                Some(Token::Done(done)) => self.count(done),
                Some(Token::Row(_)) => {
                    return Err(Error::Protocol(
                        "driver sent a row before result set metadata".into(),
                    ));
                }
                None => {
                    self.state = ReaderState::Exhausted;
                    return Ok(());
                }
            }
        }
    }

    /// Pull the next row of the current set.
    async fn advance_row(&mut self, session: &mut dyn Session) -> Result<bool> {
        match self.next(session).await? {
            Some(Token::Row(values)) => {
                self.row = Some(values);
                self.rows_in_set += 1;
                Ok(true)
            }
            Some(Token::Done(done)) => {
                self.count(done);
                self.row = None;
                self.state = ReaderState::BetweenResults;
                Ok(false)
            }
            Some(metadata @ Token::Metadata(_)) => {
                self.lookahead = Some(metadata);
                self.row = None;
                self.state = ReaderState::BetweenResults;
                Ok(false)
            }
            None => {
                self.row = None;
                self.state = ReaderState::Exhausted;
                Ok(false)
            }
        }
    }

    pub(crate) async fn read(&mut self, session: &mut dyn Session) -> Result<bool> {
        if self.state != ReaderState::InResultSet {
            self.row = None;
            return Ok(false);
        }
        if self.behavior.single_row() && self.rows_in_set > 0 {
            self.drain(session).await?;
            return Ok(false);
        }
        self.advance_row(session).await
    }

    pub(crate) async fn next_result(&mut self, session: &mut dyn Session) -> Result<bool> {
        while self.state == ReaderState::InResultSet {
            self.advance_row(session).await?;
        }
        if self.state != ReaderState::BetweenResults {
            return Ok(false);
        }
        if self.behavior.single_result() {
            self.drain(session).await?;
            return Ok(false);
        }
        self.seek_result_set(session).await?;
        if self.state == ReaderState::InResultSet {
            self.result_index += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume the rest of the batch, keeping row counts.
    pub(crate) async fn drain(&mut self, session: &mut dyn Session) -> Result<()> {
        self.row = None;
        while let Some(token) = self.next(session).await? {
            if let Token::Done(done) = token {
                self.count(done);
            }
        }
        self.state = ReaderState::Exhausted;
        Ok(())
    }

    /// Give up on the batch without consuming it.
    pub(crate) fn abandon(&mut self) {
        self.lookahead = None;
        self.row = None;
        if self.state.is_streaming() {
            self.state = ReaderState::Exhausted;
        }
    }

    pub(crate) fn value(&self, index: usize) -> Result<&SqlValue> {
        if self.state == ReaderState::Closed {
            return Err(Error::ReaderClosed);
        }
        let count = self.columns.len();
        if index >= count {
            return Err(Error::ColumnOutOfRange { index, count });
        }
        let row = self.row.as_ref().ok_or(Error::NoCurrentRow)?;
        row.get(index).ok_or(Error::ColumnOutOfRange {
            index,
            count: row.len(),
        })
    }
}

/// A forward-only cursor over the result sets of one command execution.
///
/// The reader borrows the command's connection until it is dropped. Call
/// [`close`](Self::close) to consume the rest of the batch; dropping an
/// unclosed reader leaves the remainder to be discarded before the next
/// command runs.
pub struct DataReader<'a> {
    connection: &'a mut Connection,
    pos: Position,
    limit: Duration,
    span: Span,
}

impl<'a> DataReader<'a> {
    pub(crate) fn new(
        connection: &'a mut Connection,
        pos: Position,
        limit: Duration,
        span: Span,
    ) -> Self {
        Self {
            connection,
            pos,
            limit,
            span,
        }
    }

    /// Advance to the next row of the current result set.
    ///
    /// Returns `false` at the end of the set; call
    /// [`next_result`](Self::next_result) to move on.
    pub async fn read(&mut self) -> Result<bool> {
        self.read_inner(None).await
    }

    /// [`read`](Self::read), observing a cancellation token.
    pub async fn read_cancellable(&mut self, token: &CancellationToken) -> Result<bool> {
        self.read_inner(Some(token)).await
    }

    /// Advance to the next result set. Returns `false` when the batch has
    /// no further result sets.
    pub async fn next_result(&mut self) -> Result<bool> {
        self.next_result_inner(None).await
    }

    /// [`next_result`](Self::next_result), observing a cancellation token.
    pub async fn next_result_cancellable(&mut self, token: &CancellationToken) -> Result<bool> {
        self.next_result_inner(Some(token)).await
    }

    /// Whether field `index` of the current row is NULL.
    pub async fn is_null(&self, index: usize) -> Result<bool> {
        self.is_null_inner(index, None)
    }

    /// [`is_null`](Self::is_null), observing a cancellation token.
    pub async fn is_null_cancellable(
        &self,
        index: usize,
        token: &CancellationToken,
    ) -> Result<bool> {
        self.is_null_inner(index, Some(token))
    }

    /// Field `index` of the current row, converted to `T`.
    ///
    /// # Errors
    ///
    /// [`Error::Type`] when the value cannot be converted,
    /// [`Error::ColumnOutOfRange`] for a bad index, [`Error::NoCurrentRow`]
    /// when no row is current and [`Error::ReaderClosed`] after close.
    pub async fn get<T: FromSql>(&self, index: usize) -> Result<T> {
        self.get_inner(index, None)
    }

    /// [`get`](Self::get), observing a cancellation token.
    pub async fn get_cancellable<T: FromSql>(
        &self,
        index: usize,
        token: &CancellationToken,
    ) -> Result<T> {
        self.get_inner(index, Some(token))
    }

    /// Raw field `index` of the current row.
    pub fn value(&self, index: usize) -> Result<&SqlValue> {
        self.pos.value(index)
    }

    /// Number of columns in the current result set.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.pos.field_count()
    }

    /// Column metadata of the current result set.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.pos.columns
    }

    /// Index of the column called `name`. An exact match wins over a
    /// case-insensitive one.
    pub fn ordinal(&self, name: &str) -> Result<usize> {
        let columns = &self.pos.columns;
        columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Zero-based index of the current result set.
    #[must_use]
    pub fn result_index(&self) -> usize {
        self.pos.result_index
    }

    /// Rows changed by the statements consumed so far, or `-1` when none of
    /// them reported a count. Final once the reader is closed.
    #[must_use]
    pub fn records_affected(&self) -> i64 {
        self.pos
            .records_affected
            .map_or(-1, |rows| i64::try_from(rows).unwrap_or(i64::MAX))
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pos.state == ReaderState::Closed
    }

    /// Consume the rest of the batch and close the reader. With
    /// [`CommandBehavior::CLOSE_CONNECTION`] the connection is closed too.
    ///
    /// Closing a closed reader does nothing.
    pub async fn close(&mut self) -> Result<()> {
        self.close_inner(None).await
    }

    pub(crate) async fn read_inner(&mut self, token: Option<&CancellationToken>) -> Result<bool> {
        cancel::check(token)?;
        self.ensure_not_closed()?;
        if self.pos.state != ReaderState::InResultSet {
            self.pos.row = None;
            return Ok(false);
        }
        let session = match self.connection.session_mut() {
            Ok(session) => session,
            Err(e) => {
                self.pos.abandon();
                return Err(e);
            }
        };
        let result = cancel::run(
            token,
            self.limit,
            || Error::CommandTimeout,
            self.pos.read(session),
        )
        .instrument(self.span.clone())
        .await;
        self.settle(result).await
    }

    async fn next_result_inner(&mut self, token: Option<&CancellationToken>) -> Result<bool> {
        cancel::check(token)?;
        self.ensure_not_closed()?;
        if !self.pos.state.is_streaming() {
            return Ok(false);
        }
        let session = match self.connection.session_mut() {
            Ok(session) => session,
            Err(e) => {
                self.pos.abandon();
                return Err(e);
            }
        };
        let result = cancel::run(
            token,
            self.limit,
            || Error::CommandTimeout,
            self.pos.next_result(session),
        )
        .instrument(self.span.clone())
        .await;
        let advanced = self.settle(result).await?;
        if advanced {
            self.span.in_scope(|| {
                tracing::debug!(
                    result_index = self.pos.result_index,
                    columns = self.pos.field_count(),
                    "next result set"
                );
            });
        }
        Ok(advanced)
    }

    fn is_null_inner(&self, index: usize, token: Option<&CancellationToken>) -> Result<bool> {
        cancel::check(token)?;
        Ok(self.pos.value(index)?.is_null())
    }

    fn get_inner<T: FromSql>(&self, index: usize, token: Option<&CancellationToken>) -> Result<T> {
        cancel::check(token)?;
        Ok(T::from_sql(self.pos.value(index)?)?)
    }

    pub(crate) async fn close_inner(&mut self, token: Option<&CancellationToken>) -> Result<()> {
        if self.pos.state == ReaderState::Closed {
            return Ok(());
        }

        let drained = if self.pos.state.is_streaming() {
            match self.connection.session_mut() {
                Ok(session) => {
                    let result = cancel::run(
                        token,
                        self.limit,
                        || Error::CommandTimeout,
                        self.pos.drain(session),
                    )
                    .instrument(self.span.clone())
                    .await;
                    self.settle(result).await
                }
                Err(e) => {
                    self.pos.abandon();
                    Err(e)
                }
            }
        } else {
            Ok(())
        };
        self.pos.state = ReaderState::Closed;
        self.pos.row = None;

        self.span.in_scope(|| {
            tracing::debug!(
                records_affected = self.records_affected(),
                "reader closed"
            );
        });

        let closed = if self.pos.behavior.closes_connection() {
            self.connection.close().await
        } else {
            Ok(())
        };
        drained.and(closed)
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.pos.state == ReaderState::Closed {
            Err(Error::ReaderClosed)
        } else {
            Ok(())
        }
    }

    /// Bring the session back to a known state after a failed step.
    async fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.pos.abandon();
            if cancel::is_interruption(e) {
                self.connection
                    .abort_batch()
                    .instrument(self.span.clone())
                    .await;
            } else {
                self.connection.mark_needs_drain();
            }
        }
        result
    }
}

impl Drop for DataReader<'_> {
    fn drop(&mut self) {
        if self.pos.state == ReaderState::Closed {
            return;
        }
        if self.pos.behavior.closes_connection() {
            self.connection.release();
        } else if self.pos.state.is_streaming() {
            self.connection.mark_needs_drain();
        }
    }
}

impl fmt::Debug for DataReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataReader")
            .field("connection_id", &self.connection.connection_id())
            .field("behavior", &self.pos.behavior)
            .field("state", &self.pos.state)
            .field("result_index", &self.pos.result_index)
            .field("field_count", &self.pos.field_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::VecDeque;

    use async_trait::async_trait;

    use super::*;

    struct Scripted {
        tokens: VecDeque<Token>,
    }

    impl Scripted {
        fn new(tokens: Vec<Token>) -> Self {
            Self {
                tokens: tokens.into(),
            }
        }
    }

    #[async_trait]
    impl Session for Scripted {
        async fn submit(&mut self, _sql: &str) -> Result<()> {
            Ok(())
        }

        async fn next_token(&mut self) -> Result<Option<Token>> {
            Ok(self.tokens.pop_front())
        }

        async fn cancel(&mut self) -> Result<()> {
            self.tokens.clear();
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn metadata(names: &[&str]) -> Token {
        let columns: Vec<Column> = names.iter().map(|n| Column::new(*n, "NVARCHAR")).collect();
        Token::Metadata(Arc::from(columns))
    }

    fn row(value: &str) -> Token {
        Token::Row(vec![SqlValue::from(value)])
    }

    fn two_sets() -> Vec<Token> {
        vec![
            metadata(&["Name"]),
            row("Adam"),
            row("Eve"),
            Token::Done(Done::without_count()),
            Token::Done(Done::with_count(3)),
            metadata(&["Id"]),
            Token::Row(vec![SqlValue::Int(7)]),
            Token::Done(Done::without_count()),
        ]
    }

    async fn collect(pos: &mut Position, session: &mut Scripted) -> Vec<Vec<SqlValue>> {
        let mut seen = Vec::new();
        loop {
            while pos.read(session).await.unwrap() {
                seen.push(pos.row.clone().unwrap());
            }
            if !pos.next_result(session).await.unwrap() {
                break;
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_visits_every_row_in_order() {
        let mut session = Scripted::new(two_sets());
        let mut pos = Position::new(CommandBehavior::DEFAULT);
        pos.start(&mut session).await.unwrap();
        assert_eq!(pos.field_count(), 1);

        let seen = collect(&mut pos, &mut session).await;
        assert_eq!(
            seen,
            vec![
                vec![SqlValue::from("Adam")],
                vec![SqlValue::from("Eve")],
                vec![SqlValue::Int(7)],
            ]
        );
        assert_eq!(pos.result_index, 1);
        assert_eq!(pos.records_affected, Some(3));
        assert_eq!(pos.state, ReaderState::Exhausted);
    }

    #[tokio::test]
    async fn test_single_result_hides_later_sets() {
        let mut session = Scripted::new(two_sets());
        let mut pos = Position::new(CommandBehavior::SINGLE_RESULT);
        pos.start(&mut session).await.unwrap();

        let seen = collect(&mut pos, &mut session).await;
        assert_eq!(seen.len(), 2);
        assert_eq!(pos.result_index, 0);
        // the rest of the batch is still consumed
        assert_eq!(pos.records_affected, Some(3));
        assert!(session.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_single_row() {
        let mut session = Scripted::new(two_sets());
        let mut pos = Position::new(CommandBehavior::SINGLE_ROW);
        pos.start(&mut session).await.unwrap();

        assert!(pos.read(&mut session).await.unwrap());
        assert_eq!(pos.value(0).unwrap(), "Adam");
        assert!(!pos.read(&mut session).await.unwrap());
        assert!(!pos.next_result(&mut session).await.unwrap());
        assert_eq!(pos.state, ReaderState::Exhausted);
    }

    #[tokio::test]
    async fn test_batch_without_result_sets() {
        let mut session = Scripted::new(vec![
            Token::Done(Done::with_count(2)),
            Token::Done(Done::with_count(5)),
        ]);
        let mut pos = Position::new(CommandBehavior::DEFAULT);
        pos.start(&mut session).await.unwrap();

        assert_eq!(pos.state, ReaderState::Exhausted);
        assert_eq!(pos.field_count(), 0);
        assert!(!pos.read(&mut session).await.unwrap());
        assert_eq!(pos.records_affected, Some(7));
    }

    #[tokio::test]
    async fn test_row_before_metadata_is_rejected() {
        let mut session = Scripted::new(vec![row("Adam")]);
        let mut pos = Position::new(CommandBehavior::DEFAULT);
        let err = pos.start(&mut session).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_row_counts_saturate() {
        let mut session = Scripted::new(vec![
            Token::Done(Done::with_count(u64::MAX)),
            Token::Done(Done::with_count(1)),
        ]);
        let mut pos = Position::new(CommandBehavior::DEFAULT);
        pos.start(&mut session).await.unwrap();
        assert_eq!(pos.records_affected, Some(u64::MAX));
    }

    #[tokio::test]
    async fn test_field_access_errors() {
        let mut session = Scripted::new(two_sets());
        let mut pos = Position::new(CommandBehavior::DEFAULT);
        pos.start(&mut session).await.unwrap();

        assert!(matches!(pos.value(0), Err(Error::NoCurrentRow)));
        assert!(pos.read(&mut session).await.unwrap());
        assert!(matches!(
            pos.value(1),
            Err(Error::ColumnOutOfRange { index: 1, count: 1 })
        ));

        pos.abandon();
        assert_eq!(pos.state, ReaderState::Exhausted);
        assert!(matches!(pos.value(0), Err(Error::NoCurrentRow)));

        pos.state = ReaderState::Closed;
        assert!(matches!(pos.value(0), Err(Error::ReaderClosed)));
    }

    #[tokio::test]
    async fn test_drain_counts_remaining_statements() {
        let mut session = Scripted::new(two_sets());
        let mut pos = Position::new(CommandBehavior::DEFAULT);
        pos.start(&mut session).await.unwrap();
        assert!(pos.read(&mut session).await.unwrap());

        pos.drain(&mut session).await.unwrap();
        assert_eq!(pos.records_affected, Some(3));
        assert!(session.tokens.is_empty());
        assert!(matches!(pos.value(0), Err(Error::NoCurrentRow)));
    }
}
