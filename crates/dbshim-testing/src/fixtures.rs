//! Test database fixtures.
//!
//! [`create_test_database`] stands up a mock database holding one table:
//!
//! ```text
//! Person(Name NVARCHAR(MAX) NULL)
//!   Adam
//!   Eve
//!   NULL
//!   Cain
//!   Abel
//! ```

use std::sync::Arc;

use dbshim_client::{Column, Config, Connection, SqlValue};

use crate::mock_driver::{MockDriver, MockDriverBuilder, MockResponse};

/// Rows of the seeded `Person` table, in insertion order.
pub const PERSON_NAMES: &[Option<&str>] = &[
    Some("Adam"),
    Some("Eve"),
    None,
    Some("Cain"),
    Some("Abel"),
];

/// Query returning every row of `Person`.
pub const SELECT_PERSONS: &str = "SELECT Name FROM Person;";

/// Query returning the first row of `Person`.
pub const SELECT_FIRST_PERSON: &str = "SELECT TOP(1) Name FROM Person;";

/// A batch that declares a variable and reports no row count.
pub const DECLARE_NAME: &str = "DECLARE @Name NVARCHAR(MAX) = 'Adam';";

const CONNECTION_STRING: &str = "Server=mock;Database=dbshim_test;Application Name=dbshim-testing";

/// A seeded mock database.
#[derive(Debug, Clone)]
pub struct TestDatabase {
    driver: Arc<MockDriver>,
    connection_string: String,
}

impl TestDatabase {
    /// Driver builder answering the `Person` queries. Add latency or more
    /// responses before passing it to [`from_builder`](Self::from_builder).
    pub fn builder() -> MockDriverBuilder {
        let rows = PERSON_NAMES
            .iter()
            .map(|name| vec![SqlValue::from(*name)])
            .collect();
        let first = PERSON_NAMES
            .first()
            .copied()
            .flatten()
            .map_or(SqlValue::Null, SqlValue::from);

        MockDriver::builder()
            .with_name("mock-sqlserver")
            .with_response(
                SELECT_PERSONS,
                MockResponse::rows(vec![person_name_column()], rows),
            )
            .with_response(
                SELECT_FIRST_PERSON,
                MockResponse::rows(vec![person_name_column()], vec![vec![first]]),
            )
            .with_response(DECLARE_NAME, MockResponse::no_count())
    }

    /// Create a test database backed by `builder`.
    pub fn from_builder(builder: MockDriverBuilder) -> Self {
        Self {
            driver: builder.build(),
            connection_string: CONNECTION_STRING.to_string(),
        }
    }

    /// The driver serving this database.
    pub fn driver(&self) -> Arc<MockDriver> {
        Arc::clone(&self.driver)
    }

    /// Connection string for this database.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Configuration for connecting to this database.
    pub fn config(&self) -> Config {
        Config::new(self.connection_string.clone())
    }

    /// A new, closed connection to this database.
    pub fn connection(&self) -> Connection {
        Connection::new(self.driver.clone(), self.config())
    }
}

/// Create the seeded `Person` test database.
pub fn create_test_database() -> TestDatabase {
    TestDatabase::from_builder(TestDatabase::builder())
}

fn person_name_column() -> Column {
    Column::new("Name", "NVARCHAR")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_person_is_adam() {
        assert_eq!(PERSON_NAMES.first(), Some(&Some("Adam")));
        assert!(PERSON_NAMES.contains(&None));
    }

    #[test]
    fn test_connection_starts_closed() {
        let db = create_test_database();
        let connection = db.connection();
        assert!(!connection.is_open());
        assert_eq!(connection.config().connection_string, db.connection_string());
        assert_eq!(connection.driver_name(), "mock-sqlserver");
    }
}
