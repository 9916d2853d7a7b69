use thiserror::Error;

pub type Result<T> = std::result::Result<T, MinerError>;

#[derive(Debug, Error)]
pub enum MinerError {
    #[error("Invalid challenge: {0}")]
    InvalidChallenge(#[from] nash_protocol::ProtocolError),

    #[error("Model error: {0}")]
    Model(#[from] nash_nn::NnError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
