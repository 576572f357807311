//! Commands.

use std::fmt;
use std::time::Duration;

use dbshim_types::SqlValue;
use tracing::Instrument;

use crate::behavior::CommandBehavior;
use crate::cancel::{self, CancellationToken};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::instrumentation;
use crate::reader::{DataReader, Position};

/// Command text bound to a connection.
///
/// The command borrows its connection for its whole lifetime, and each
/// reader it produces borrows the command, so a connection never has two
/// batches in flight.
pub struct Command<'c> {
    connection: &'c mut Connection,
    text: String,
    timeout: Option<Duration>,
}

impl<'c> Command<'c> {
    pub(crate) fn new(connection: &'c mut Connection, text: String) -> Self {
        Self {
            connection,
            text,
            timeout: None,
        }
    }

    /// The command text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the command text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Set the command text, builder style.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Time allowed for each round trip of this command. Defaults to the
    /// connection's command timeout; zero means no limit.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
            .unwrap_or(self.connection.config().timeouts.command_timeout)
    }

    /// Override the command timeout for this command.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// The connection this command is bound to.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        self.connection
    }

    /// Execute the command and return a reader positioned on the first
    /// result set.
    pub async fn execute_reader(&mut self) -> Result<DataReader<'_>> {
        self.open_reader(CommandBehavior::DEFAULT, None).await
    }

    /// Execute the command with the given reader behavior.
    pub async fn execute_reader_with(
        &mut self,
        behavior: CommandBehavior,
    ) -> Result<DataReader<'_>> {
        self.open_reader(behavior, None).await
    }

    /// Execute the command with the given reader behavior, observing a
    /// cancellation token.
    pub async fn execute_reader_cancellable(
        &mut self,
        behavior: CommandBehavior,
        token: &CancellationToken,
    ) -> Result<DataReader<'_>> {
        self.open_reader(behavior, Some(token)).await
    }

    /// Execute the command and return the first column of the first row of
    /// the first result set, or [`SqlValue::Null`] when there is no row.
    ///
    /// The rest of the batch is consumed before returning.
    pub async fn execute_scalar(&mut self) -> Result<SqlValue> {
        self.scalar(None).await
    }

    /// [`execute_scalar`](Self::execute_scalar), observing a cancellation
    /// token.
    pub async fn execute_scalar_cancellable(
        &mut self,
        token: &CancellationToken,
    ) -> Result<SqlValue> {
        self.scalar(Some(token)).await
    }

    /// Execute the command and return the number of rows affected.
    ///
    /// Returns `-1` when no statement in the batch reported a row count,
    /// for example a batch that only declares variables.
    pub async fn execute_non_query(&mut self) -> Result<i64> {
        self.non_query(None).await
    }

    /// [`execute_non_query`](Self::execute_non_query), observing a
    /// cancellation token.
    pub async fn execute_non_query_cancellable(
        &mut self,
        token: &CancellationToken,
    ) -> Result<i64> {
        self.non_query(Some(token)).await
    }

    async fn scalar(&mut self, token: Option<&CancellationToken>) -> Result<SqlValue> {
        let mut reader = self.open_reader(CommandBehavior::DEFAULT, token).await?;
        let value = if reader.read_inner(token).await? && reader.field_count() > 0 {
            reader.value(0)?.clone()
        } else {
            SqlValue::Null
        };
        reader.close_inner(token).await?;
        Ok(value)
    }

    async fn non_query(&mut self, token: Option<&CancellationToken>) -> Result<i64> {
        let mut reader = self.open_reader(CommandBehavior::DEFAULT, token).await?;
        reader.close_inner(token).await?;
        Ok(reader.records_affected())
    }

    async fn open_reader(
        &mut self,
        behavior: CommandBehavior,
        token: Option<&CancellationToken>,
    ) -> Result<DataReader<'_>> {
        cancel::check(token)?;
        if self.text.trim().is_empty() {
            return Err(Error::Command("command text has not been set".into()));
        }
        let limit = self.timeout();
        let connection = &mut *self.connection;
        let sql = self.text.as_str();
        let span = instrumentation::execute_span(
            connection.driver_name(),
            connection.connection_id(),
            sql,
            &connection.config().sanitization,
        );

        let mut position = Position::new(behavior);
        let started = {
            let session = connection
                .ready_session(token, limit)
                .instrument(span.clone())
                .await?;
            cancel::run(token, limit, || Error::CommandTimeout, async {
                session.submit(sql).await?;
                position.start(session).await
            })
            .instrument(span.clone())
            .await
        };

        if let Err(err) = started {
            if cancel::is_interruption(&err) {
                connection.abort_batch().instrument(span).await;
            } else {
                connection.mark_needs_drain();
            }
            return Err(err);
        }

        span.in_scope(|| {
            tracing::debug!(
                columns = position.field_count(),
                behavior = ?behavior,
                "reader opened"
            );
        });
        Ok(DataReader::new(connection, position, limit, span))
    }
}

impl fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text)
            .field("timeout", &self.timeout())
            .field("connection_id", &self.connection.connection_id())
            .finish()
    }
}
