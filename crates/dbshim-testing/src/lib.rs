//! # dbshim-testing
//!
//! Test infrastructure for the dbshim facade.
//!
//! This crate provides an in-memory [`MockDriver`] that answers batches from
//! a script, and fixtures that stand up a small seeded test database on top
//! of it. No server or network is involved.
//!
//! ## Features
//!
//! - Responses keyed by exact SQL text, with a fallback response
//! - Multi-statement batches, row counts and server errors
//! - Optional connect, response and per-row latency (works with paused time)
//! - Connect failure injection
//! - Statistics: connect attempts, sessions, attention requests, statements
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbshim_client::Connection;
//! use dbshim_testing::{MockDriver, MockResponse};
//!
//! #[tokio::test]
//! async fn test_scalar() {
//!     let driver = MockDriver::builder()
//!         .with_response("SELECT 1", MockResponse::scalar(1))
//!         .build();
//!
//!     let mut connection = Connection::new(driver.clone(), "Server=mock");
//!     connection.open().await.unwrap();
//!     let value = connection
//!         .create_command_with_text("SELECT 1")
//!         .execute_scalar()
//!         .await
//!         .unwrap();
//!     assert_eq!(value, 1);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_driver;

pub use fixtures::{TestDatabase, create_test_database};
pub use mock_driver::{MockDriver, MockDriverBuilder, MockResponse};
