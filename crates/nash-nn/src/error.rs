use thiserror::Error;

pub type Result<T> = std::result::Result<T, NnError>;

#[derive(Debug, Error)]
pub enum NnError {
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value produced by {0}")]
    NonFinite(&'static str),

    #[error("Invalid layer configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Parameter layout mismatch: {0}")]
    LayoutMismatch(String),
}

pub(crate) fn ensure_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(NnError::DimensionMismatch {
            context,
            expected,
            actual,
        });
    }
    Ok(())
}
