use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Malformed schema tag on column '{column}': entry '{entry}' is not a key=value pair")]
    MalformedSchemaTag { column: String, entry: String },

    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),
}
