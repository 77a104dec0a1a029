//! Store-side save.

use super::{
    decode_arg, expect_args, hash_pairs, record_key, release_unique, revert_indices,
};
use crate::keys::KeyNamer;
use crate::model::ID_ATTRIBUTE;
use kvmodel_codec::{AttributePairs, IndexPairs, Metadata, UniqueMap};
use kvmodel_store::{Bytes, Command, Procedure, ProcedureContext, Reply, StoreResult};

/// Writes one entity and every structure derived from it.
///
/// Arguments, in order:
/// 1. [`Metadata`] (`name`, `id`)
/// 2. [`AttributePairs`]
/// 3. [`IndexPairs`]
/// 4. [`UniqueMap`]
///
/// Replies with the id as a bulk string.
///
/// Previous secondary-index entries of the id are reverted before the new ones
/// are written. A unique entry whose value changed is released only if it
/// still points at this id; a value currently held by another id is taken
/// over (last writer wins).
#[derive(Debug, Clone)]
pub struct SaveProcedure {
    name: String,
}

impl SaveProcedure {
    /// Save procedure registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Procedure for SaveProcedure {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(
        &self,
        ctx: &mut dyn ProcedureContext,
        _keys: &[String],
        args: &[Bytes],
    ) -> StoreResult<Reply> {
        expect_args(&self.name, args, 4)?;
        let meta: Metadata = decode_arg(&self.name, args, 0)?;
        let attributes: AttributePairs = decode_arg(&self.name, args, 1)?;
        let indices: IndexPairs = decode_arg(&self.name, args, 2)?;
        let uniques: UniqueMap = decode_arg(&self.name, args, 3)?;

        let keys = KeyNamer::new(&meta.name);
        let id = meta.id.as_str();
        let key = record_key(&meta);

        let mut record: Vec<(String, String)> = attributes
            .0
            .into_iter()
            .filter(|(name, _)| name != ID_ATTRIBUTE)
            .collect();
        record.push((ID_ATTRIBUTE.to_string(), id.to_string()));
        ctx.call(Command::del(vec![key.clone()]))?;
        ctx.call(Command::hset(key, record))?;
        ctx.call(Command::sadd(keys.collection_key(), id))?;

        revert_indices(ctx, &keys, id)?;
        let memo = keys.index_memo_key(id);
        for (field, value) in &indices.0 {
            let index_key = keys.indexed_field_key(field, value);
            ctx.call(Command::sadd(&index_key, id))?;
            ctx.call(Command::sadd(&memo, index_key))?;
        }

        let unique_memo = keys.unique_memo_key(id);
        for (field, old_value) in hash_pairs(ctx.call(Command::hgetall(&unique_memo))?) {
            if uniques.0.get(&field) != Some(&old_value) {
                release_unique(ctx, &keys, id, &field, &old_value)?;
            }
        }
        ctx.call(Command::del(vec![unique_memo.clone()]))?;
        for (field, value) in &uniques.0 {
            ctx.call(Command::hset(
                keys.unique_field_key(field),
                vec![(value.clone(), id.to_string())],
            ))?;
        }
        if !uniques.0.is_empty() {
            ctx.call(Command::hset(
                unique_memo,
                uniques.0.into_iter().collect(),
            ))?;
        }

        Ok(Reply::Bulk(meta.id))
    }
}
