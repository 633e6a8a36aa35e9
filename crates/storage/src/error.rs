use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid object storage configuration: {0}")]
    ConfigError(String),

    #[error("Object storage request failed: {0}")]
    RequestError(String),

    #[error("Object storage did not answer within {0:?}")]
    Timeout(Duration),

    #[error("The object storage client has been closed")]
    Closed,
}
