//! Store-side remove.

use super::{decode_arg, expect_args, hash_pairs, record_key, release_unique, revert_indices};
use crate::keys::KeyNamer;
use kvmodel_codec::{Metadata, TrackedKeys, UniqueMap};
use kvmodel_store::{Bytes, Command, Procedure, ProcedureContext, Reply, StoreResult};

/// Deletes one entity and everything derived from it.
///
/// Arguments, in order:
/// 1. [`Metadata`] (`name`, `id`, `key`)
/// 2. [`UniqueMap`] of the caller's view of the unique values
/// 3. [`TrackedKeys`]: suffixes of keys owned by the entity (`key:<suffix>`)
///
/// Unique entries are released from both the supplied map and the values the
/// store recorded at save time, each only while it still points at this id.
/// Replies with integer `1` if a primary record was deleted, `0` otherwise.
#[derive(Debug, Clone)]
pub struct RemoveProcedure {
    name: String,
}

impl RemoveProcedure {
    /// Remove procedure registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Procedure for RemoveProcedure {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(
        &self,
        ctx: &mut dyn ProcedureContext,
        _keys: &[String],
        args: &[Bytes],
    ) -> StoreResult<Reply> {
        expect_args(&self.name, args, 3)?;
        let meta: Metadata = decode_arg(&self.name, args, 0)?;
        let uniques: UniqueMap = decode_arg(&self.name, args, 1)?;
        let tracked: TrackedKeys = decode_arg(&self.name, args, 2)?;

        let keys = KeyNamer::new(&meta.name);
        let id = meta.id.as_str();
        let key = record_key(&meta);

        revert_indices(ctx, &keys, id)?;

        let unique_memo = keys.unique_memo_key(id);
        let recorded = hash_pairs(ctx.call(Command::hgetall(&unique_memo))?);
        let declared = uniques.0.iter().map(|(f, v)| (f.clone(), v.clone()));
        for (field, value) in declared.chain(recorded) {
            release_unique(ctx, &keys, id, &field, &value)?;
        }
        ctx.call(Command::del(vec![unique_memo]))?;

        let owned: Vec<String> = tracked
            .0
            .iter()
            .map(|suffix| format!("{key}:{suffix}"))
            .collect();
        if !owned.is_empty() {
            ctx.call(Command::del(owned))?;
        }

        let deleted = ctx
            .call(Command::del(vec![key]))?
            .as_integer()
            .unwrap_or(0);
        ctx.call(Command::srem(keys.collection_key(), id))?;

        Ok(Reply::Integer(deleted.min(1)))
    }
}
