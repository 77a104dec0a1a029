//! Store-side procedures.
//!
//! A procedure is code the store runs on its own side of the connection, with
//! exclusive access to the keyspace for the duration of the call. It sees the
//! keyspace only through [`ProcedureContext`], issuing the same [`Command`]s a
//! client would.

use crate::command::{Command, Reply};
use crate::error::StoreResult;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::fmt;

/// Command sink available to a running procedure.
pub trait ProcedureContext {
    /// Run one command against the keyspace.
    ///
    /// # Errors
    ///
    /// Returns the same errors a client command would.
    fn call(&mut self, command: Command) -> StoreResult<Reply>;
}

/// A unit of work the store executes indivisibly.
///
/// # Invariants
///
/// - No other command observes the keyspace between two `call`s of one invocation
/// - If `invoke` returns an error, none of its writes remain visible
pub trait Procedure: Send + Sync {
    /// Stable procedure name.
    fn name(&self) -> &str;

    /// Bumped whenever the procedure's behavior changes, so a store never
    /// confuses two versions under one digest.
    fn revision(&self) -> u32 {
        1
    }

    /// Run the procedure.
    ///
    /// `keys` carries optional key hints; `args` are the positional argument
    /// slots, each an opaque byte string.
    ///
    /// # Errors
    ///
    /// Any error aborts the invocation.
    fn invoke(
        &self,
        ctx: &mut dyn ProcedureContext,
        keys: &[String],
        args: &[Bytes],
    ) -> StoreResult<Reply>;
}

/// Reference to a procedure loaded on a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcedureHandle {
    name: String,
    digest: String,
}

impl ProcedureHandle {
    /// Handle for `procedure`. The digest depends only on name and revision.
    pub fn for_procedure(procedure: &dyn Procedure) -> Self {
        Self {
            name: procedure.name().to_string(),
            digest: procedure_digest(procedure.name(), procedure.revision()),
        }
    }

    /// Procedure name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex digest the store indexes procedures by.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for ProcedureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, &self.digest[..12.min(self.digest.len())])
    }
}

fn procedure_digest(name: &str, revision: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(revision.to_be_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
