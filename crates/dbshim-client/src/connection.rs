//! Connections.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::Instrument;

use crate::cancel::{self, CancellationToken};
use crate::command::Command;
use crate::config::Config;
use crate::driver::{Driver, Session};
use crate::error::{Error, Result};
use crate::instrumentation;
use crate::state::ConnectionState;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A connection to a database server.
///
/// Created closed. [`open`](Self::open) establishes a session through the
/// driver; [`close`](Self::close) (or dropping the connection) releases it.
///
/// Commands borrow the connection mutably, so at most one command or
/// reader is active on a connection at any time.
///
/// # Example
///
/// ```rust,ignore
/// let mut connection = Connection::new(driver, "Server=localhost;Database=test");
/// connection.open().await?;
///
/// let mut command = connection.create_command_with_text("SELECT TOP(1) Name FROM Person;");
/// let name = command.execute_scalar().await?;
///
/// connection.close().await?;
/// ```
pub struct Connection {
    driver: Arc<dyn Driver>,
    config: Config,
    session: Option<Box<dyn Session>>,
    id: u64,
    /// A reader was dropped before its batch ended.
    needs_drain: bool,
}

impl Connection {
    /// Create a closed connection.
    pub fn new(driver: Arc<dyn Driver>, config: impl Into<Config>) -> Self {
        Self {
            driver,
            config: config.into(),
            session: None,
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            needs_drain: false,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if self.session.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Whether a session is established.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// The configuration this connection was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process-unique id, recorded on trace spans.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.id
    }

    /// Name of the driver backing this connection.
    #[must_use]
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Open the connection.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyOpen`] if the connection is open,
    /// [`Error::ConnectionTimeout`] if the driver does not finish within the
    /// connect timeout, or the driver's own error.
    pub async fn open(&mut self) -> Result<()> {
        self.open_inner(None).await
    }

    /// Open the connection, observing a cancellation token.
    ///
    /// An already-signaled token fails immediately with
    /// [`Error::Cancelled`] without contacting the driver.
    pub async fn open_cancellable(&mut self, token: &CancellationToken) -> Result<()> {
        self.open_inner(Some(token)).await
    }

    async fn open_inner(&mut self, token: Option<&CancellationToken>) -> Result<()> {
        cancel::check(token)?;
        if self.session.is_some() {
            return Err(Error::AlreadyOpen);
        }
        self.config.validate()?;

        let span = instrumentation::open_span(
            self.driver.name(),
            self.id,
            &self.config.application_name,
        );
        let session = cancel::run(
            token,
            self.config.timeouts.connect_timeout,
            || Error::ConnectionTimeout,
            self.driver.connect(&self.config.connection_string),
        )
        .instrument(span)
        .await?;

        self.session = Some(session);
        self.needs_drain = false;
        tracing::info!(
            connection_id = self.id,
            driver = self.driver.name(),
            "connection opened"
        );
        Ok(())
    }

    /// Close the connection. Closing a closed connection does nothing.
    ///
    /// The session is released even when the driver reports an error while
    /// closing it; that error is returned.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        self.needs_drain = false;

        let span = instrumentation::close_span(self.driver.name(), self.id);
        let result = session.close().instrument(span).await;
        match &result {
            Ok(()) => tracing::info!(connection_id = self.id, "connection closed"),
            Err(e) => tracing::warn!(
                connection_id = self.id,
                error = %e,
                "session reported an error while closing"
            ),
        }
        result
    }

    /// Create a command with no text bound to this connection.
    pub fn create_command(&mut self) -> Command<'_> {
        Command::new(self, String::new())
    }

    /// Create a command bound to this connection.
    pub fn create_command_with_text(&mut self, text: impl Into<String>) -> Command<'_> {
        Command::new(self, text.into())
    }

    /// The live session, after discarding any batch left behind by a
    /// dropped reader.
    ///
    /// The attention request for that batch runs under `token` and `limit`
    /// like the command itself. If it is interrupted the batch stays marked
    /// and the next command tries again.
    pub(crate) async fn ready_session(
        &mut self,
        token: Option<&CancellationToken>,
        limit: Duration,
    ) -> Result<&mut (dyn Session + 'static)> {
        if self.needs_drain {
            let session = self.session.as_deref_mut().ok_or(Error::NotOpen)?;
            let result = cancel::run(token, limit, || Error::CommandTimeout, session.cancel()).await;
            match result {
                Ok(()) => {
                    self.needs_drain = false;
                    tracing::debug!(connection_id = self.id, "abandoned batch discarded");
                }
                Err(e) if cancel::is_interruption(&e) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        connection_id = self.id,
                        error = %e,
                        "attention failed, releasing session"
                    );
                    self.release();
                    return Err(e);
                }
            }
        }
        self.session.as_deref_mut().ok_or(Error::NotOpen)
    }

    /// The live session.
    pub(crate) fn session_mut(&mut self) -> Result<&mut (dyn Session + 'static)> {
        self.session.as_deref_mut().ok_or(Error::NotOpen)
    }

    /// Send an attention request for the current batch.
    ///
    /// A session that cannot be interrupted is no longer in a known state
    /// and is released.
    pub(crate) async fn abort_batch(&mut self) {
        self.needs_drain = false;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let result = session.cancel().await;
        match result {
            Ok(()) => tracing::debug!(connection_id = self.id, "batch aborted"),
            Err(e) => {
                tracing::warn!(
                    connection_id = self.id,
                    error = %e,
                    "attention failed, releasing session"
                );
                self.session = None;
            }
        }
    }

    /// Remember that the current batch must be discarded before the next one.
    pub(crate) fn mark_needs_drain(&mut self) {
        if self.session.is_some() {
            self.needs_drain = true;
        }
    }

    /// Release the session without waiting on the driver.
    pub(crate) fn release(&mut self) {
        if self.session.take().is_some() {
            self.needs_drain = false;
            tracing::debug!(connection_id = self.id, "session released");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.session.is_some() {
            tracing::debug!(connection_id = self.id, "connection dropped while open");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("driver", &self.driver.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
