//! Shared error definitions for engine primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the engine crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided run identifier could not be parsed.
    #[error("invalid run id: {source}")]
    InvalidRunId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Tool identifier failed validation.
    #[error("invalid tool id `{id}`: {reason}")]
    InvalidToolId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Parameter specification failed validation.
    #[error("invalid parameter spec `{name}`: {reason}")]
    InvalidParameterSpec {
        /// Name of the offending parameter.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool descriptor failed validation.
    #[error("invalid tool descriptor: {reason}")]
    InvalidDescriptor {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
