//! # dbshim-client
//!
//! Async connection, command and reader facade with cooperative
//! cancellation.
//!
//! The facade sits between application code and a database driver. It owns
//! the connection lifecycle, runs command text in reader, scalar or
//! non-query mode, and exposes a forward-only [`DataReader`] over the
//! result sets a batch produces. Every suspending operation has a
//! `_cancellable` variant that observes a [`CancellationToken`].
//!
//! ## Lifecycle
//!
//! ```text
//! Connection: Closed -> Open (open()) -> Closed (close() / drop)
//! Command:    borrows an open Connection
//! DataReader: borrows the Command's Connection until dropped
//! ```
//!
//! Because a command borrows its connection mutably, only one batch can be
//! in flight on a connection; the compiler rejects a second one.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbshim_client::{CancellationToken, CommandBehavior, Connection};
//!
//! let mut connection = Connection::new(driver, connection_string);
//! let token = CancellationToken::new();
//! connection.open_cancellable(&token).await?;
//!
//! let mut command = connection.create_command_with_text("SELECT Name FROM Person;");
//! let mut reader = command
//!     .execute_reader_cancellable(CommandBehavior::CLOSE_CONNECTION, &token)
//!     .await?;
//! while reader.read_cancellable(&token).await? {
//!     if !reader.is_null_cancellable(0, &token).await? {
//!         let name: String = reader.get_cancellable(0, &token).await?;
//!         println!("{name}");
//!     }
//! }
//! reader.close().await?;
//! ```
//!
//! ## Drivers
//!
//! The facade never speaks a wire protocol. Implement [`Driver`] and
//! [`Session`] to plug a backend in; `dbshim-testing` ships a scripted
//! in-memory driver.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod behavior;
pub mod cancel;
pub mod command;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod instrumentation;
pub mod reader;
pub mod state;

pub use behavior::CommandBehavior;
pub use cancel::CancellationToken;
pub use command::Command;
pub use config::{Config, TimeoutConfig};
pub use connection::Connection;
pub use dbshim_types::{FromSql, SqlValue, TypeError};
pub use driver::{Column, Done, Driver, Session, Token};
pub use error::{Error, ErrorKind, Result};
pub use instrumentation::SanitizationConfig;
pub use reader::DataReader;
pub use state::ConnectionState;
