use thiserror::Error;

pub type Result<T> = std::result::Result<T, ValidatorError>;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model error: {0}")]
    Model(#[from] nash_nn::NnError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] nash_protocol::ProtocolError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Membership source error: {0}")]
    Membership(String),

    #[error("Weight publication failed: {0}")]
    Publish(String),

    #[error("Ground-truth oracle error: {0}")]
    Oracle(String),

    #[error("Model persistence error: {0}")]
    Persistence(String),

    #[error("Incompatible model architecture: {0}")]
    IncompatibleModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
