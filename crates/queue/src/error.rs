use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to the message broker: {0}")]
    ConnectionError(#[source] lapin::Error),

    #[error("Message broker channel operation failed: {0}")]
    ChannelError(#[from] lapin::Error),

    #[error("The message broker client has been closed")]
    Closed,
}
