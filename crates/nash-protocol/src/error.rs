use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Empty field: {0}")]
    EmptyField(&'static str),

    #[error("Invalid {field} dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}
