//! Store connection trait definition.

use crate::command::{Command, Reply};
use crate::error::StoreResult;
use crate::procedure::{Procedure, ProcedureHandle};
use bytes::Bytes;
use std::sync::Arc;

/// A blocking request/response connection to a key-value store.
///
/// Connections are **opaque transports**: they do not know about entities,
/// key layouts or argument envelopes. The object mapper owns all of that.
///
/// # Invariants
///
/// - Each `run` is atomic with respect to every other command
/// - `exec_procedure` runs the whole procedure as one indivisible step
/// - Connections must be `Send + Sync` so one can serve several engines
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and embedded use
pub trait StoreConnection: Send + Sync {
    /// Runs one command and returns its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or rejects the command.
    fn run(&self, command: Command) -> StoreResult<Reply>;

    /// Registers a procedure and returns the handle used to invoke it.
    ///
    /// Loading the same procedure twice yields the same handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn load_procedure(&self, procedure: Arc<dyn Procedure>) -> StoreResult<ProcedureHandle>;

    /// Invokes a loaded procedure.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::UnknownProcedure`] if the handle's digest is
    /// not loaded, or the procedure's own error (with no writes applied).
    fn exec_procedure(
        &self,
        handle: &ProcedureHandle,
        keys: &[String],
        args: &[Bytes],
    ) -> StoreResult<Reply>;

    /// Checks if the connection is usable.
    fn is_connected(&self) -> bool;
}

impl<C: StoreConnection + ?Sized> StoreConnection for Arc<C> {
    fn run(&self, command: Command) -> StoreResult<Reply> {
        (**self).run(command)
    }

    fn load_procedure(&self, procedure: Arc<dyn Procedure>) -> StoreResult<ProcedureHandle> {
        (**self).load_procedure(procedure)
    }

    fn exec_procedure(
        &self,
        handle: &ProcedureHandle,
        keys: &[String],
        args: &[Bytes],
    ) -> StoreResult<Reply> {
        (**self).exec_procedure(handle, keys, args)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
