/*!
# Unified Error Type

This module provides a unified error enum that consolidates all of this crate's
failure modes for better ergonomics and error-handling consistency.
*/

use std::error::Error;
use std::fmt;

/// Unified error type for all knnmesh operations.
///
/// Per the error-handling design: degenerate-but-expected conditions (an empty
/// partition, a disconnected subgraph during medoid recomputation) are handled
/// locally and never surface as a variant here. Only configuration mistakes and
/// resource failures do.
#[derive(Debug)]
pub enum KnnMeshError {
    /// A configuration parameter failed validation at construction or setter time.
    Configuration { field: String, message: String },

    /// A precondition was violated at call time (e.g. an arithmetic overflow guard).
    Precondition(String),

    /// I/O or (de)serialization failure.
    Resource(String),
}

impl KnnMeshError {
    /// Creates a configuration error for the named field.
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        KnnMeshError::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a precondition-violation error.
    pub fn precondition(message: impl Into<String>) -> Self {
        KnnMeshError::Precondition(message.into())
    }

    /// Creates a resource (I/O, serialization) error.
    pub fn resource(message: impl Into<String>) -> Self {
        KnnMeshError::Resource(message.into())
    }
}

impl fmt::Display for KnnMeshError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KnnMeshError::Configuration { field, message } => {
                write!(f, "invalid configuration for `{}`: {}", field, message)
            }
            KnnMeshError::Precondition(msg) => write!(f, "precondition violated: {}", msg),
            KnnMeshError::Resource(msg) => write!(f, "resource error: {}", msg),
        }
    }
}

impl Error for KnnMeshError {}

impl From<std::io::Error> for KnnMeshError {
    fn from(e: std::io::Error) -> Self {
        KnnMeshError::Resource(e.to_string())
    }
}

impl From<serde_json::Error> for KnnMeshError {
    fn from(e: serde_json::Error) -> Self {
        KnnMeshError::Resource(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for KnnMeshError {
    fn from(e: bincode::error::EncodeError) -> Self {
        KnnMeshError::Resource(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for KnnMeshError {
    fn from(e: bincode::error::DecodeError) -> Self {
        KnnMeshError::Resource(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KnnMeshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KnnMeshError::configuration("k", "must be greater than zero");
        assert_eq!(
            format!("{}", err),
            "invalid configuration for `k`: must be greater than zero"
        );

        let err = KnnMeshError::precondition("similarity callback unavailable");
        assert_eq!(
            format!("{}", err),
            "precondition violated: similarity callback unavailable"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: KnnMeshError = io_err.into();
        assert!(matches!(err, KnnMeshError::Resource(_)));
    }
}
