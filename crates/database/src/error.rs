use std::time::Duration;

use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[source] sqlx::Error),

    #[error("Database query failed: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("HTTP request to the database failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("The database answered with status {status}: {body}")]
    StatusError { status: u16, body: String },

    #[error("The database did not answer within {0:?}")]
    Timeout(Duration),

    #[error("The database client has been closed")]
    Closed,

    #[error("Invalid table schema: {0}")]
    SchemaError(#[from] CoreError),

    #[error("An error occurred during JSON serialization: {0}")]
    JsonError(#[from] serde_json::Error),
}
