use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("{entity} with id {id} was not found")]
    NotFound { entity: &'static str, id: i64 },
}
