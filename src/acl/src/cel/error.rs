//! Error types for CEL operations

use crate::error::AclError;
use thiserror::Error;

/// CEL operation errors
#[derive(Error, Debug)]
pub enum CelError {
    #[error("CEL compilation failed: {0}")]
    CompilationError(String),

    #[error("CEL evaluation failed: {0}")]
    EvaluationError(String),

    #[error("Failed to bind variable '{0}'")]
    VariableBinding(String),

    #[error("Expression did not return boolean result")]
    NonBooleanResult,
}

/// Result type for CEL operations
pub type Result<T> = std::result::Result<T, CelError>;

impl From<CelError> for AclError {
    fn from(err: CelError) -> Self {
        match err {
            CelError::CompilationError(_) => AclError::RuleInstantiation(err.to_string()),
            other => AclError::Evaluation(other.to_string()),
        }
    }
}
