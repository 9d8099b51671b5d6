use thiserror::Error;

/// Error taxonomy for the coding core.
///
/// `IoFailure` is never constructed inside this crate; it exists so that
/// file-loading collaborators built on top of `Params::from_file`-style
/// helpers can report into the same type.
#[derive(Debug, Error)]
pub enum SncError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    #[error("io failure: {0}")]
    IoFailure(String),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    #[error("not ready: {0}")]
    NotReady(String),
}

impl From<&'static str> for SncError {
    fn from(s: &'static str) -> Self {
        SncError::InvalidParameter(s.to_string())
    }
}

impl From<String> for SncError {
    fn from(s: String) -> Self {
        SncError::InvalidParameter(s)
    }
}
