//! # dbshim-types
//!
//! Field values and typed extraction for the dbshim facade.
//!
//! A driver hands rows to the facade as ordered sequences of [`SqlValue`].
//! Callers pull typed values back out through [`FromSql`], which is what
//! `DataReader::get::<T>()` dispatches to.
//!
//! ## Features
//!
//! - `chrono` (default): date/time values via chrono
//! - `uuid` (default): UNIQUEIDENTIFIER values via uuid
//! - `decimal` (default): DECIMAL/NUMERIC values via rust_decimal
//! - `json`: JSON values via serde_json
//!
//! ## Conversions
//!
//! | Stored value | Extracts as |
//! |--------------|-------------|
//! | `Bool` | `bool` |
//! | `TinyInt` | `u8`, `i16`, `i32`, `i64` |
//! | `SmallInt` | `i16`, `i32`, `i64` |
//! | `Int` | `i32`, `i64` |
//! | `BigInt` | `i64` |
//! | `Float` | `f32`, `f64` |
//! | `Double` | `f64` |
//! | `String` | `String` |
//! | `Binary` | `Vec<u8>`, `bytes::Bytes` |
//! | `Null` | `Option<T>` only |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod from_sql;
pub mod value;

pub use error::TypeError;
pub use from_sql::FromSql;
pub use value::SqlValue;
