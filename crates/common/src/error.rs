//! Error types for the shared appliance types

use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing shared types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid product version: {0:?}")]
    InvalidVersion(String),

    #[error("Unknown {kind}: {name}")]
    UnknownName { kind: &'static str, name: String },

    #[error("Field {field} expects a {expected} value")]
    FieldType {
        field: String,
        expected: &'static str,
    },
}
