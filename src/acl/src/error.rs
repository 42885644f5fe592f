//! Error types for the access control engine

use thiserror::Error;

/// Access control errors
#[derive(Debug, Error)]
pub enum AclError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A configured rule could not be turned into a working rule instance
    #[error("Rule instantiation failed: {0}")]
    RuleInstantiation(String),

    /// A rule predicate or filter contribution failed
    #[error("Rule evaluation failed: {0}")]
    Evaluation(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rule set provider failure, including unusable seed data
    #[error("Rule provider error: {0}")]
    Provider(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for access control operations
pub type Result<T> = std::result::Result<T, AclError>;
