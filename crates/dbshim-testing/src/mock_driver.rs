//! Scripted in-memory driver.
//!
//! A [`MockDriver`] opens sessions that answer each submitted batch from a
//! table of [`MockResponse`]s keyed by the batch's SQL text (trimmed, exact
//! match). Batches with no scripted response get the default response, or a
//! server error when there is none.
//!
//! Latency is simulated with `tokio::time::sleep`, so tests running with
//! paused time (`#[tokio::test(start_paused = true)]`) finish instantly.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbshim_client::{Column, SqlValue};
//! use dbshim_testing::{MockDriver, MockResponse};
//!
//! let driver = MockDriver::builder()
//!     .with_response(
//!         "SELECT Id FROM Orders",
//!         MockResponse::rows(
//!             vec![Column::new("Id", "INT")],
//!             vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]],
//!         ),
//!     )
//!     .with_response("DELETE FROM Orders", MockResponse::affected(2))
//!     .with_row_latency(Duration::from_millis(5))
//!     .build();
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dbshim_client::{Column, Done, Driver, Error, Result, Session, SqlValue, Token};
use parking_lot::Mutex;

/// Scripted answer to one batch.
#[derive(Clone)]
pub enum MockResponse {
    /// A result set.
    Rows {
        /// Column definitions.
        columns: Vec<Column>,
        /// Row data.
        rows: Vec<Vec<SqlValue>>,
    },

    /// A single unnamed column holding one value.
    Scalar(SqlValue),

    /// A statement that reports a row count (INSERT/UPDATE/DELETE).
    RowsAffected(u64),

    /// A statement that reports no row count (DECLARE, SET, ...).
    NoCount,

    /// Fail the batch with a server error.
    Error {
        /// Error number.
        number: i32,
        /// Error message.
        message: String,
        /// Severity class.
        class: u8,
    },

    /// Several statements answered in order.
    Batch(Vec<MockResponse>),

    /// Compute the response from the submitted SQL.
    Custom(Arc<dyn Fn(&str) -> MockResponse + Send + Sync>),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows { columns, rows } => f
                .debug_struct("Rows")
                .field("columns", columns)
                .field("rows", &rows.len())
                .finish(),
            Self::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
            Self::RowsAffected(n) => f.debug_tuple("RowsAffected").field(n).finish(),
            Self::NoCount => f.write_str("NoCount"),
            Self::Error {
                number,
                message,
                class,
            } => f
                .debug_struct("Error")
                .field("number", number)
                .field("message", message)
                .field("class", class)
                .finish(),
            Self::Batch(parts) => f.debug_tuple("Batch").field(parts).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// Create a scalar response.
    pub fn scalar(value: impl Into<SqlValue>) -> Self {
        Self::Scalar(value.into())
    }

    /// Create a multi-row response.
    pub fn rows(columns: Vec<Column>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self::Rows { columns, rows }
    }

    /// Create a rows affected response.
    pub fn affected(count: u64) -> Self {
        Self::RowsAffected(count)
    }

    /// Create a response for a statement without a row count.
    pub fn no_count() -> Self {
        Self::NoCount
    }

    /// Create an error response with severity class 16.
    pub fn error(number: i32, message: impl Into<String>) -> Self {
        Self::Error {
            number,
            message: message.into(),
            class: 16,
        }
    }

    /// Create a multi-statement response.
    pub fn batch(parts: Vec<MockResponse>) -> Self {
        Self::Batch(parts)
    }

    /// Create a response computed from the submitted SQL.
    pub fn custom(f: impl Fn(&str) -> MockResponse + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    fn render(&self, sql: &str, out: &mut VecDeque<Step>) {
        match self {
            Self::Rows { columns, rows } => {
                out.push_back(Step::Token(Token::Metadata(Arc::from(columns.clone()))));
                out.extend(rows.iter().map(|row| Step::Token(Token::Row(row.clone()))));
                out.push_back(Step::Token(Token::Done(Done::without_count())));
            }
            Self::Scalar(value) => {
                let column = Column::new("", value.type_name());
                out.push_back(Step::Token(Token::Metadata(Arc::from(vec![column]))));
                out.push_back(Step::Token(Token::Row(vec![value.clone()])));
                out.push_back(Step::Token(Token::Done(Done::without_count())));
            }
            Self::RowsAffected(n) => out.push_back(Step::Token(Token::Done(Done::with_count(*n)))),
            Self::NoCount => out.push_back(Step::Token(Token::Done(Done::without_count()))),
            Self::Error {
                number,
                message,
                class,
            } => out.push_back(Step::Fail {
                number: *number,
                message: message.clone(),
                class: *class,
            }),
            Self::Batch(parts) => {
                for part in parts {
                    part.render(sql, out);
                }
            }
            Self::Custom(f) => f(sql).render(sql, out),
        }
    }
}

/// One scheduled output of a session.
#[derive(Debug, Clone)]
enum Step {
    Token(Token),
    Fail {
        number: i32,
        message: String,
        class: u8,
    },
}

#[derive(Debug)]
struct MockConfig {
    name: String,
    responses: HashMap<String, MockResponse>,
    default_response: Option<MockResponse>,
    connect_latency: Duration,
    latency: Duration,
    row_latency: Duration,
    cancel_latency: Duration,
    connect_error: Option<String>,
}

impl MockConfig {
    fn respond(&self, sql: &str) -> VecDeque<Step> {
        let mut steps = VecDeque::new();
        match self.responses.get(sql.trim()).or(self.default_response.as_ref()) {
            Some(response) => response.render(sql, &mut steps),
            None => steps.push_back(Step::Fail {
                number: 50000,
                message: format!("no scripted response for: {}", sql.trim()),
                class: 16,
            }),
        }
        steps
    }
}

#[derive(Debug, Default)]
struct MockStats {
    connect_attempts: AtomicUsize,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    active_sessions: AtomicUsize,
    cancellations: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

/// Builder for [`MockDriver`].
#[derive(Debug)]
pub struct MockDriverBuilder {
    config: MockConfig,
}

impl MockDriverBuilder {
    /// Create a new builder with no scripted responses.
    pub fn new() -> Self {
        Self {
            config: MockConfig {
                name: "mock".to_string(),
                responses: HashMap::new(),
                default_response: None,
                connect_latency: Duration::ZERO,
                latency: Duration::ZERO,
                row_latency: Duration::ZERO,
                cancel_latency: Duration::ZERO,
                connect_error: None,
            },
        }
    }

    /// Add a response for a specific batch.
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        let sql: String = sql.into();
        self.config.responses.insert(sql.trim().to_string(), response);
        self
    }

    /// Set the response for batches without a scripted response.
    #[must_use]
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.config.default_response = Some(response);
        self
    }

    /// Set the driver name recorded on trace spans.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Delay every connect by `latency`.
    #[must_use]
    pub fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.config.connect_latency = latency;
        self
    }

    /// Delay the start of every batch's response by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.config.latency = latency;
        self
    }

    /// Delay every row by `latency`.
    #[must_use]
    pub fn with_row_latency(mut self, latency: Duration) -> Self {
        self.config.row_latency = latency;
        self
    }

    /// Delay every attention request by `latency`.
    #[must_use]
    pub fn with_cancel_latency(mut self, latency: Duration) -> Self {
        self.config.cancel_latency = latency;
        self
    }

    /// Make every connect attempt fail with `message`.
    #[must_use]
    pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
        self.config.connect_error = Some(message.into());
        self
    }

    /// Build the driver.
    pub fn build(self) -> Arc<MockDriver> {
        Arc::new(MockDriver {
            config: Arc::new(self.config),
            stats: Arc::new(MockStats::default()),
        })
    }
}

impl Default for MockDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory driver answering batches from a script.
#[derive(Debug)]
pub struct MockDriver {
    config: Arc<MockConfig>,
    stats: Arc<MockStats>,
}

impl MockDriver {
    /// Create a new builder for the mock driver.
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// Number of times `connect` was called.
    pub fn connect_attempts(&self) -> usize {
        self.stats.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of sessions successfully opened.
    pub fn sessions_opened(&self) -> usize {
        self.stats.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of sessions ended with an explicit `close`.
    pub fn sessions_closed(&self) -> usize {
        self.stats.sessions_closed.load(Ordering::SeqCst)
    }

    /// Number of sessions that have not been dropped yet.
    pub fn active_sessions(&self) -> usize {
        self.stats.active_sessions.load(Ordering::SeqCst)
    }

    /// Number of attention requests received.
    pub fn cancellations(&self) -> usize {
        self.stats.cancellations.load(Ordering::SeqCst)
    }

    /// Every batch submitted so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.stats.executed.lock().clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn connect(&self, _connection_string: &str) -> Result<Box<dyn Session>> {
        self.stats.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.config.connect_latency.is_zero() {
            tokio::time::sleep(self.config.connect_latency).await;
        }
        if let Some(message) = &self.config.connect_error {
            return Err(Error::Connection(message.clone()));
        }

        let id = self.stats.sessions_opened.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.active_sessions.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session = id, "mock session opened");
        Ok(Box::new(MockSession {
            id,
            config: Arc::clone(&self.config),
            stats: Arc::clone(&self.stats),
            pending: VecDeque::new(),
            closed: false,
        }))
    }
}

struct MockSession {
    id: usize,
    config: Arc<MockConfig>,
    stats: Arc<MockStats>,
    pending: VecDeque<Step>,
    closed: bool,
}

#[async_trait]
impl Session for MockSession {
    async fn submit(&mut self, sql: &str) -> Result<()> {
        if self.closed {
            return Err(Error::Connection("session is closed".into()));
        }
        if !self.pending.is_empty() {
            return Err(Error::Command(
                "a batch is already in flight on this session".into(),
            ));
        }
        self.stats.executed.lock().push(sql.to_string());
        tracing::trace!(session = self.id, sql, "mock batch submitted");

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        self.pending = self.config.respond(sql);
        Ok(())
    }

    async fn next_token(&mut self) -> Result<Option<Token>> {
        if matches!(self.pending.front(), Some(Step::Token(Token::Row(_))))
            && !self.config.row_latency.is_zero()
        {
            tokio::time::sleep(self.config.row_latency).await;
        }
        match self.pending.pop_front() {
            Some(Step::Token(token)) => Ok(Some(token)),
            Some(Step::Fail {
                number,
                message,
                class,
            }) => {
                self.pending.clear();
                Err(Error::Server {
                    number,
                    class,
                    state: 1,
                    message,
                })
            }
            None => Ok(None),
        }
    }

    async fn cancel(&mut self) -> Result<()> {
        self.stats.cancellations.fetch_add(1, Ordering::SeqCst);
        if !self.config.cancel_latency.is_zero() {
            tokio::time::sleep(self.config.cancel_latency).await;
        }
        self.pending.clear();
        tracing::trace!(session = self.id, "mock batch cancelled");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.pending.clear();
            self.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.stats.active_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
