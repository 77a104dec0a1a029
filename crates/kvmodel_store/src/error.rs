//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a store connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The connection is closed or the store is unreachable.
    #[error("not connected to store")]
    NotConnected,

    /// A command addressed a key holding a different kind of value.
    #[error("WRONGTYPE operation against key {key} holding the wrong kind of value")]
    WrongType {
        /// The offending key.
        key: String,
    },

    /// A counter command found a value that is not an integer.
    #[error("value at {key} is not an integer or out of range")]
    NotAnInteger {
        /// The offending key.
        key: String,
    },

    /// No procedure is registered under the handle's digest.
    #[error("no procedure loaded for digest {digest}")]
    UnknownProcedure {
        /// Digest the caller asked for.
        digest: String,
    },

    /// A procedure aborted; none of its writes were applied.
    #[error("procedure {name} failed: {message}")]
    ProcedureFailed {
        /// Procedure name.
        name: String,
        /// Reason reported by the procedure.
        message: String,
    },

    /// The store refused the command.
    #[error("command rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Creates a procedure failed error.
    pub fn procedure_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProcedureFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a wrong type error.
    pub fn wrong_type(key: impl Into<String>) -> Self {
        Self::WrongType { key: key.into() }
    }
}
