/// Errors raised while setting up or running a transpose benchmark.
///
/// Numeric divergence between the plan and the reference is not an error:
/// it is reported through [`crate::oracle::OracleReport`].
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("invalid arguments: {0}")]
    Argument(String),

    #[error("failed to allocate {bytes} bytes of aligned memory")]
    Allocation { bytes: usize },

    #[error("could not build thread pool: {0}")]
    ThreadPool(String),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        BenchError::Argument(msg.into())
    }

    /// True for errors caused by what the user typed.
    pub fn is_argument(&self) -> bool {
        matches!(self, BenchError::Argument(_))
    }
}

/// Convenience alias for `Result<T, BenchError>`.
pub type Result<T> = std::result::Result<T, BenchError>;
