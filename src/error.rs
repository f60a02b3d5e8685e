//! Error type for table construction, insertion, and typed access.

use crate::payload::Kind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// A table needs at least one bucket.
    #[error("bucket count must be at least 1")]
    ZeroBuckets,

    #[error("identifier must not be empty")]
    EmptyIdentifier,

    /// Inserts are refused once the table has been torn down.
    #[error("table has been torn down")]
    TornDown,

    #[error("no slot named `{identifier}`")]
    Missing { identifier: String },

    #[error("slot `{identifier}` holds {found:?}, expected {expected:?}")]
    KindMismatch {
        identifier: String,
        expected: Kind,
        found: Kind,
    },

    /// The slot has the right kind but its value is some other Rust type.
    #[error("slot `{identifier}` does not hold the requested type")]
    TypeMismatch { identifier: String },
}

pub type Result<T> = std::result::Result<T, TableError>;
