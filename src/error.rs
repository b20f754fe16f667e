use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("duplicate row key: {0}")]
    DuplicateKey(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("decomposition failed: {0}")]
    Decomposition(String),
}

pub type Result<T> = std::result::Result<T, AggregateError>;
