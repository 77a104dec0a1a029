//! Atomic procedures and their executor.
//!
//! The save and remove procedures run on the store side. Each one touches the
//! primary record, collection membership, unique indexes and secondary indexes
//! of a single entity inside one invocation, so no reader ever sees a subset
//! of those structures updated.

mod remove;
mod save;

pub use remove::RemoveProcedure;
pub use save::SaveProcedure;

use crate::error::OrmResult;
use crate::keys::KeyNamer;
use kvmodel_codec::{Decode, Metadata};
use kvmodel_store::{
    Bytes, Command, Procedure, ProcedureContext, ProcedureHandle, Reply, StoreConnection,
    StoreError, StoreResult,
};
use std::sync::Arc;
use tracing::{info, warn};

/// A procedure registered on one connection.
///
/// Owned by the engine that registered it; there is no process-wide registry.
pub struct ProcedureExecutor {
    procedure: Arc<dyn Procedure>,
    handle: ProcedureHandle,
}

impl ProcedureExecutor {
    /// Load `procedure` on `conn`.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be reached.
    pub fn register(conn: &dyn StoreConnection, procedure: Arc<dyn Procedure>) -> OrmResult<Self> {
        let handle = conn.load_procedure(Arc::clone(&procedure))?;
        info!(procedure = %handle, "registered store procedure");
        Ok(Self { procedure, handle })
    }

    /// The handle the store knows the procedure by.
    pub fn handle(&self) -> &ProcedureHandle {
        &self.handle
    }

    /// Run the procedure with positional `args`.
    ///
    /// If the store has forgotten the procedure (for example after a restart)
    /// it is loaded again and the call retried once. No other retries happen.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and the procedure's own failure.
    pub fn execute(
        &self,
        conn: &dyn StoreConnection,
        keys: &[String],
        args: &[Bytes],
    ) -> OrmResult<Reply> {
        match conn.exec_procedure(&self.handle, keys, args) {
            Err(StoreError::UnknownProcedure { .. }) => {
                warn!(procedure = %self.handle, "procedure missing on store, reloading");
                conn.load_procedure(Arc::clone(&self.procedure))?;
                Ok(conn.exec_procedure(&self.handle, keys, args)?)
            }
            other => Ok(other?),
        }
    }
}

impl std::fmt::Debug for ProcedureExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureExecutor")
            .field("handle", &self.handle)
            .finish()
    }
}

/// Decode argument slot `index` of procedure `name`.
fn decode_arg<T: Decode>(name: &str, args: &[Bytes], index: usize) -> StoreResult<T> {
    let bytes = args.get(index).ok_or_else(|| {
        StoreError::procedure_failed(name, format!("missing argument {}", index + 1))
    })?;
    T::decode(bytes).map_err(|e| {
        StoreError::procedure_failed(name, format!("argument {}: {e}", index + 1))
    })
}

fn expect_args(name: &str, args: &[Bytes], count: usize) -> StoreResult<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(StoreError::procedure_failed(
            name,
            format!("expected {count} arguments, got {}", args.len()),
        ))
    }
}

/// Primary record key from metadata, deriving it when the caller did not.
fn record_key(meta: &Metadata) -> String {
    meta.key
        .clone()
        .unwrap_or_else(|| KeyNamer::new(&meta.name).model_key(&meta.id))
}

fn string_reply(reply: Reply) -> Option<String> {
    reply.into_string()
}

/// Take `id` out of every secondary-index set listed in its index memo, then
/// drop the memo.
fn revert_indices(
    ctx: &mut dyn ProcedureContext,
    keys: &KeyNamer<'_>,
    id: &str,
) -> StoreResult<()> {
    let memo = keys.index_memo_key(id);
    for index_key in ctx.call(Command::smembers(&memo))?.into_strings() {
        ctx.call(Command::srem(index_key, id))?;
    }
    ctx.call(Command::del(vec![memo]))?;
    Ok(())
}

/// Delete `field`'s unique entry for `value` if it still points at `id`.
fn release_unique(
    ctx: &mut dyn ProcedureContext,
    keys: &KeyNamer<'_>,
    id: &str,
    field: &str,
    value: &str,
) -> StoreResult<()> {
    let unique_key = keys.unique_field_key(field);
    let owner = string_reply(ctx.call(Command::hget(&unique_key, value))?);
    if owner.as_deref() == Some(id) {
        ctx.call(Command::hdel(unique_key, vec![value.to_string()]))?;
    }
    Ok(())
}

/// Field → value pairs from an HGETALL reply.
fn hash_pairs(reply: Reply) -> Vec<(String, String)> {
    let flat = reply.into_strings();
    flat.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}
