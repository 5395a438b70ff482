use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolverError>;

/// Recoverable failures of the underlying decision procedure.
///
/// Precondition violations (asserting a constant-false constraint, a fresh
/// binding failing the debug check) are programming errors and panic instead
/// of surfacing here.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("core solver failure: {0}")]
    Backend(String),
    #[error("core solver timed out after {seconds:.3}s")]
    Timeout { seconds: f64 },
    #[error("query aborted: {0}")]
    Aborted(String),
}
