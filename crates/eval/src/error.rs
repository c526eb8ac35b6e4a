//! Error taxonomy for filter construction and configuration.
//!
//! Evaluation itself never fails: bad record data resolves to `false` or
//! `Value::Null`. Only building a tree (or loading configuration) can
//! produce one of these errors.

/// Errors raised while constructing filters and expressions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// A tree was assembled incorrectly, e.g. an arithmetic node with an
    /// unset operand or a literal wrapping another literal.
    #[error("invalid construction: {0}")]
    InvalidConstruction(String),

    /// A filter was configured with arguments it cannot accept, e.g. an
    /// empty Like wildcard or an unknown distance unit.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A function name is not present in the registry.
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    /// Engine configuration could not be read or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FilterError {
    pub fn construction(message: impl Into<String>) -> Self {
        FilterError::InvalidConstruction(message.into())
    }

    pub fn argument(message: impl Into<String>) -> Self {
        FilterError::InvalidArgument(message.into())
    }
}

/// Result type for construction-time operations.
pub type Result<T> = std::result::Result<T, FilterError>;
