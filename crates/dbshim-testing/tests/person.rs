//! Connection, command and reader round trips against the seeded `Person`
//! database.
//!
//! Every scenario runs twice: once through the plain methods and once
//! through the `_cancellable` variants with a token that is never signaled.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use dbshim_client::{CancellationToken, CommandBehavior, DataReader, Result};
use dbshim_testing::create_test_database;
use dbshim_testing::fixtures::{DECLARE_NAME, PERSON_NAMES, SELECT_FIRST_PERSON, SELECT_PERSONS};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Visit every row of every result set, returning the non-NULL names.
async fn read_names(reader: &mut DataReader<'_>) -> Result<Vec<String>> {
    let mut names = Vec::new();
    loop {
        while reader.read().await? {
            if !reader.is_null(0).await? {
                names.push(reader.get::<String>(0).await?);
            }
        }
        if !reader.next_result().await? {
            break;
        }
    }
    Ok(names)
}

async fn read_names_cancellable(
    reader: &mut DataReader<'_>,
    token: &CancellationToken,
) -> Result<Vec<String>> {
    let mut names = Vec::new();
    loop {
        while reader.read_cancellable(token).await? {
            if !reader.is_null_cancellable(0, token).await? {
                names.push(reader.get_cancellable::<String>(0, token).await?);
            }
        }
        if !reader.next_result_cancellable(token).await? {
            break;
        }
    }
    Ok(names)
}

fn expected_names() -> Vec<String> {
    PERSON_NAMES
        .iter()
        .flatten()
        .map(|name| (*name).to_string())
        .collect()
}

// =============================================================================
// Reader
// =============================================================================

#[tokio::test]
async fn test_reader_no_token() {
    init_tracing();
    let db = create_test_database();
    let mut connection = db.connection();
    connection.open().await.unwrap();

    let mut command = connection.create_command();
    command.set_text(SELECT_PERSONS);
    let mut reader = command.execute_reader().await.unwrap();
    let names = read_names(&mut reader).await.unwrap();
    reader.close().await.unwrap();
    drop(reader);

    assert_eq!(names, expected_names());
    assert!(connection.is_open());
    connection.close().await.unwrap();
}

#[tokio::test]
async fn test_reader_with_token() {
    let token = CancellationToken::new();
    let db = create_test_database();
    let mut connection = db.connection();
    connection.open_cancellable(&token).await.unwrap();

    let mut command = connection.create_command_with_text(SELECT_PERSONS);
    let mut reader = command
        .execute_reader_cancellable(CommandBehavior::DEFAULT, &token)
        .await
        .unwrap();
    let names = read_names_cancellable(&mut reader, &token).await.unwrap();
    reader.close().await.unwrap();
    drop(reader);

    assert_eq!(names, expected_names());
    assert!(connection.is_open());
}

#[tokio::test]
async fn test_reader_with_behavior_token() {
    let token = CancellationToken::new();
    let db = create_test_database();
    let driver = db.driver();
    let mut connection = db.connection();
    connection.open_cancellable(&token).await.unwrap();

    let mut command = connection.create_command_with_text(SELECT_PERSONS);
    let mut reader = command
        .execute_reader_cancellable(CommandBehavior::CLOSE_CONNECTION, &token)
        .await
        .unwrap();
    let names = read_names_cancellable(&mut reader, &token).await.unwrap();
    reader.close().await.unwrap();
    drop(reader);

    assert_eq!(names, expected_names());
    assert!(!connection.is_open());
    assert_eq!(driver.sessions_closed(), 1);
}

#[tokio::test]
async fn test_reader_with_behavior_no_token() {
    let db = create_test_database();
    let driver = db.driver();
    let mut connection = db.connection();
    connection.open().await.unwrap();

    let mut command = connection.create_command_with_text(SELECT_PERSONS);
    let mut reader = command
        .execute_reader_with(CommandBehavior::CLOSE_CONNECTION)
        .await
        .unwrap();
    let names = read_names(&mut reader).await.unwrap();
    // dropped without close: the connection is released all the same
    drop(reader);

    assert_eq!(names, expected_names());
    assert!(!connection.is_open());
    assert_eq!(driver.active_sessions(), 0);
}

// =============================================================================
// Scalar
// =============================================================================

#[tokio::test]
async fn test_scalar_no_token() {
    let db = create_test_database();
    let mut connection = db.connection();
    connection.open().await.unwrap();

    let mut command = connection.create_command_with_text(SELECT_FIRST_PERSON);
    let value = command.execute_scalar().await.unwrap();
    assert_eq!(value, "Adam");
}

#[tokio::test]
async fn test_scalar_with_token() {
    let token = CancellationToken::new();
    let db = create_test_database();
    let mut connection = db.connection();
    connection.open_cancellable(&token).await.unwrap();

    let mut command = connection.create_command_with_text(SELECT_FIRST_PERSON);
    let value = command.execute_scalar_cancellable(&token).await.unwrap();
    assert_eq!(value, "Adam");
}

// =============================================================================
// Non-query
// =============================================================================

#[tokio::test]
async fn test_non_query_no_token() {
    let db = create_test_database();
    let mut connection = db.connection();
    connection.open().await.unwrap();

    let mut command = connection.create_command_with_text(DECLARE_NAME);
    let value = command.execute_non_query().await.unwrap();
    assert_eq!(value, -1);
}

#[tokio::test]
async fn test_non_query_with_token() {
    let token = CancellationToken::new();
    let db = create_test_database();
    let mut connection = db.connection();
    connection.open_cancellable(&token).await.unwrap();

    let mut command = connection.create_command_with_text(DECLARE_NAME);
    let value = command.execute_non_query_cancellable(&token).await.unwrap();
    assert_eq!(value, -1);
}

#[tokio::test]
async fn test_commands_run_back_to_back() {
    let db = create_test_database();
    let mut connection = db.connection();
    connection.open().await.unwrap();

    for _ in 0..3 {
        let mut command = connection.create_command_with_text(SELECT_FIRST_PERSON);
        assert_eq!(command.execute_scalar().await.unwrap(), "Adam");
        command.set_text(DECLARE_NAME);
        assert_eq!(command.execute_non_query().await.unwrap(), -1);
    }

    assert_eq!(db.driver().executed().len(), 6);
    assert_eq!(db.driver().cancellations(), 0);
}
