//! Error types for kvmodel core.

use thiserror::Error;

/// Result type for core operations.
pub type OrmResult<T> = Result<T, OrmError>;

/// Errors that can occur in entity engine operations.
///
/// A lookup that finds nothing is not an error; it returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum OrmError {
    /// The store was unreachable or rejected a command.
    #[error("store error: {0}")]
    Store(#[from] kvmodel_store::StoreError),

    /// Procedure arguments could not be packed.
    #[error("codec error: {0}")]
    Codec(#[from] kvmodel_codec::CodecError),

    /// A stored record could not be turned back into an entity.
    #[error("malformed {type_name} record {id}: {message}")]
    MalformedRecord {
        /// Entity type.
        type_name: String,
        /// Entity id.
        id: String,
        /// What was wrong with it.
        message: String,
    },

    /// The store answered with a reply of an unexpected kind.
    #[error("unexpected {found} reply to {command}")]
    UnexpectedReply {
        /// Command that was sent.
        command: &'static str,
        /// Kind of reply received.
        found: &'static str,
    },

    /// A member list referenced an id with no record.
    #[error("member {id} of list {list} has no record")]
    MissingMember {
        /// Member list name.
        list: String,
        /// Unresolvable id.
        id: String,
    },

    /// An id, field or list name would corrupt the key layout.
    #[error("invalid key part {part:?}: {reason}")]
    InvalidKeyPart {
        /// The offending value.
        part: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl OrmError {
    /// Creates a malformed record error.
    pub fn malformed_record(
        type_name: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedRecord {
            type_name: type_name.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates an unexpected reply error.
    pub fn unexpected_reply(command: &'static str, reply: &kvmodel_store::Reply) -> Self {
        Self::UnexpectedReply {
            command,
            found: reply.kind(),
        }
    }
}
