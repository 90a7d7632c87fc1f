use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid recurrence: {0}")]
    InvalidRecurrence(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
