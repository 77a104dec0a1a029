//! The entity engine.

use crate::config::{MissingMemberPolicy, OrmConfig};
use crate::error::{OrmError, OrmResult};
use crate::keys::{check_key_part, check_list_name, KeyNamer};
use crate::model::{declared_pairs, AttributeMap, Model, ID_ATTRIBUTE};
use crate::procedure::{ProcedureExecutor, RemoveProcedure, SaveProcedure};
use kvmodel_codec::{AttributePairs, Encode, IndexPairs, Metadata, TrackedKeys, UniqueMap};
use kvmodel_store::{Command, Reply, StoreConnection};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps [`Model`] types onto a key-value store.
///
/// Reads go straight to the store with plain commands. Saves and removes are
/// each a single store-side procedure call, so every structure derived from an
/// entity changes together.
///
/// The engine holds no locks and caches nothing; any number of engines may
/// share one connection across threads.
///
/// # Example
///
/// ```rust,ignore
/// let orm = Orm::new(InMemoryStore::new())?;
///
/// let mut user = User::with_email("a@x.com");
/// let id = orm.save(&mut user)?;
///
/// let found: Option<User> = orm.find_by_unique_field("email", "a@x.com")?;
/// assert_eq!(found.map(|u| u.id), Some(id));
/// ```
pub struct Orm<C: StoreConnection> {
    conn: C,
    config: OrmConfig,
    save: ProcedureExecutor,
    remove: ProcedureExecutor,
}

impl<C: StoreConnection> Orm<C> {
    /// Creates an engine with default configuration.
    ///
    /// # Errors
    ///
    /// Fails if the procedures cannot be registered on the store.
    pub fn new(conn: C) -> OrmResult<Self> {
        Self::with_config(conn, OrmConfig::default())
    }

    /// Creates an engine and registers its procedures on `conn`.
    ///
    /// # Errors
    ///
    /// Fails if the procedures cannot be registered on the store.
    pub fn with_config(conn: C, config: OrmConfig) -> OrmResult<Self> {
        let save = ProcedureExecutor::register(
            &conn,
            Arc::new(SaveProcedure::new(config.save_procedure.clone())),
        )?;
        let remove = ProcedureExecutor::register(
            &conn,
            Arc::new(RemoveProcedure::new(config.remove_procedure.clone())),
        )?;
        Ok(Self {
            conn,
            config,
            save,
            remove,
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// The engine's configuration.
    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    // Lookups

    /// Loads the entity stored under `id`.
    ///
    /// Returns `Ok(None)` if there is no record.
    pub fn find_by_id<M: Model>(&self, id: &str) -> OrmResult<Option<M>> {
        self.check_part(id)?;
        let keys = KeyNamer::of::<M>();
        let reply = self.run(Command::hgetall(keys.model_key(id)))?;
        let flat = match reply {
            reply @ Reply::Array(_) => reply.into_strings(),
            other => return Err(OrmError::unexpected_reply("HGETALL", &other)),
        };
        if flat.is_empty() {
            debug!(type_name = M::type_name(), id, "record not found");
            return Ok(None);
        }
        if flat.len() % 2 != 0 {
            return Err(OrmError::malformed_record(
                M::type_name(),
                id,
                "odd number of hash elements",
            ));
        }

        let mut map: AttributeMap = flat
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        map.insert(ID_ATTRIBUTE.to_string(), id.to_string());

        let mut model = M::default();
        model.from_attribute_map(&map)?;
        Ok(Some(model))
    }

    /// Loads the entity holding `value` for unique attribute `field`.
    ///
    /// This is two reads: the unique index, then the record. An entity removed
    /// between them yields `Ok(None)`.
    pub fn find_by_unique_field<M: Model>(
        &self,
        field: &str,
        value: &str,
    ) -> OrmResult<Option<M>> {
        self.check_part(field)?;
        let keys = KeyNamer::of::<M>();
        match self.read_id(Command::hget(keys.unique_field_key(field), value))? {
            Some(id) => self.find_by_id(&id),
            None => Ok(None),
        }
    }

    /// Whether `id` is a live member of `M`'s collection.
    pub fn exists_by_id<M: Model>(&self, id: &str) -> OrmResult<bool> {
        let keys = KeyNamer::of::<M>();
        let reply = self.run(Command::sismember(keys.collection_key(), id))?;
        Ok(self.integer("SISMEMBER", reply)? == 1)
    }

    /// Ids in the secondary index for `field == value`, numeric ids in numeric
    /// order first, then any others lexically.
    pub fn find_ids_by_indexed_field<M: Model>(
        &self,
        field: &str,
        value: &str,
    ) -> OrmResult<Vec<String>> {
        self.check_part(field)?;
        let keys = KeyNamer::of::<M>();
        let index_key = keys.indexed_field_key(field, value);
        let mut ids = self.strings("SMEMBERS", Command::smembers(index_key))?;
        ids.sort_by(|a, b| compare_ids(a, b));
        Ok(ids)
    }

    /// Entities whose indexed attribute `field` equals `value`.
    ///
    /// Ids whose record disappeared after the index read are left out.
    pub fn find_by_indexed_field<M: Model>(&self, field: &str, value: &str) -> OrmResult<Vec<M>> {
        let mut found = Vec::new();
        for id in self.find_ids_by_indexed_field::<M>(field, value)? {
            if let Some(model) = self.find_by_id(&id)? {
                found.push(model);
            }
        }
        Ok(found)
    }

    /// Every live id of type `M`, ordered like [`Self::find_ids_by_indexed_field`].
    pub fn all_ids<M: Model>(&self) -> OrmResult<Vec<String>> {
        let keys = KeyNamer::of::<M>();
        let mut ids = self.strings("SMEMBERS", Command::smembers(keys.collection_key()))?;
        ids.sort_by(|a, b| compare_ids(a, b));
        Ok(ids)
    }

    /// Number of live entities of type `M`.
    pub fn count<M: Model>(&self) -> OrmResult<usize> {
        let keys = KeyNamer::of::<M>();
        let reply = self.run(Command::scard(keys.collection_key()))?;
        self.length("SCARD", reply)
    }

    // Writes

    /// Persists `model`, minting an id first if it has none.
    ///
    /// The id is taken from the type's counter with its own atomic increment;
    /// if the save procedure then fails, that id is burnt, never reused. The
    /// minted id is stamped on `model` only once the save succeeded.
    ///
    /// Returns the entity's id.
    pub fn save<M: Model>(&self, model: &mut M) -> OrmResult<String> {
        let keys = KeyNamer::of::<M>();
        let id = if model.is_new() {
            let reply = self.run(Command::incr(keys.collection_id_key()))?;
            self.integer("INCR", reply)?.to_string()
        } else {
            self.check_part(model.id())?;
            model.id().to_string()
        };

        let attributes = model.to_attribute_map();
        let indices = declared_pairs(M::declared_index_attributes(), &attributes);
        let uniques = declared_pairs(M::declared_unique_attributes(), &attributes);
        for (field, value) in &indices {
            self.check_part(field)?;
            self.check_part(value)?;
        }
        for (field, _) in &uniques {
            self.check_part(field)?;
        }

        let args = [
            Metadata::new(M::type_name(), id.as_str()).encode()?,
            AttributePairs(attributes.into_iter().collect()).encode()?,
            IndexPairs(indices).encode()?,
            UniqueMap(uniques.into_iter().collect()).encode()?,
        ];
        let reply = self.save.execute(&self.conn, &[], &args)?;
        let saved_id = match reply {
            Reply::Bulk(saved) => saved,
            other => return Err(OrmError::unexpected_reply("save procedure", &other)),
        };

        if model.is_new() {
            model.set_id(saved_id.clone());
        }
        debug!(type_name = M::type_name(), id = %saved_id, "saved");
        Ok(saved_id)
    }

    /// Deletes `model` with its unique and secondary index entries and the
    /// member lists it declares.
    ///
    /// Returns whether a record was deleted. Removing an unsaved entity is a
    /// no-op returning `false`.
    pub fn remove<M: Model>(&self, model: &M) -> OrmResult<bool> {
        if model.is_new() {
            return Ok(false);
        }
        self.check_part(model.id())?;
        let keys = KeyNamer::of::<M>();
        let attributes = model.to_attribute_map();
        let uniques = declared_pairs(M::declared_unique_attributes(), &attributes);

        let args = [
            Metadata::new(M::type_name(), model.id())
                .with_key(keys.model_key(model.id()))
                .encode()?,
            UniqueMap(uniques.into_iter().collect()).encode()?,
            TrackedKeys(
                M::declared_member_lists()
                    .iter()
                    .map(|list| (*list).to_string())
                    .collect(),
            )
            .encode()?,
        ];
        let reply = self.remove.execute(&self.conn, &[], &args)?;
        let deleted = self.integer("remove procedure", reply)? == 1;
        debug!(type_name = M::type_name(), id = model.id(), deleted, "removed");
        Ok(deleted)
    }

    // Ordered members

    /// Appends `member_id` to `model`'s list `list_name`. Returns the new length.
    pub fn push_member<M: Model>(
        &self,
        model: &M,
        list_name: &str,
        member_id: &str,
    ) -> OrmResult<usize> {
        let key = self.member_key(model, list_name)?;
        let reply = self.run(Command::rpush(key, member_id))?;
        self.length("RPUSH", reply)
    }

    /// Removes every occurrence of `member_id` from the list. Returns how many
    /// were removed.
    pub fn remove_member<M: Model>(
        &self,
        model: &M,
        list_name: &str,
        member_id: &str,
    ) -> OrmResult<usize> {
        let key = self.member_key(model, list_name)?;
        let reply = self.run(Command::lrem(key, 0, member_id))?;
        self.length("LREM", reply)
    }

    /// Member ids in list order.
    pub fn member_ids<M: Model>(&self, model: &M, list_name: &str) -> OrmResult<Vec<String>> {
        let key = self.member_key(model, list_name)?;
        self.strings("LRANGE", Command::lrange(key, 0, -1))
    }

    /// Whether `member_id` appears in the list.
    pub fn has_member<M: Model>(
        &self,
        model: &M,
        list_name: &str,
        member_id: &str,
    ) -> OrmResult<bool> {
        Ok(self
            .member_ids(model, list_name)?
            .iter()
            .any(|id| id == member_id))
    }

    /// Loads the members of `model`'s list `list_name`, in list order.
    ///
    /// Ids without a record are skipped or reported according to
    /// [`OrmConfig::missing_members`]. An empty or absent list yields an empty
    /// vector.
    pub fn list_ordered_members<M: Model, S: Model>(
        &self,
        model: &M,
        list_name: &str,
    ) -> OrmResult<Vec<S>> {
        let ids = self.member_ids(model, list_name)?;
        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            match self.find_by_id::<S>(&id)? {
                Some(member) => members.push(member),
                None => match self.config.missing_members {
                    MissingMemberPolicy::Skip => {
                        warn!(
                            type_name = M::type_name(),
                            list = list_name,
                            member = %id,
                            "skipping member without record"
                        );
                    }
                    MissingMemberPolicy::Error => {
                        return Err(OrmError::MissingMember {
                            list: list_name.to_string(),
                            id,
                        });
                    }
                },
            }
        }
        Ok(members)
    }

    /// Whether any member of the list has indexed attribute `field == value`.
    ///
    /// Reads the list and the member type's index separately; not atomic with
    /// respect to concurrent writes.
    pub fn has_member_with_indexed_field<M: Model, S: Model>(
        &self,
        model: &M,
        list_name: &str,
        field: &str,
        value: &str,
    ) -> OrmResult<bool> {
        let members = self.member_ids(model, list_name)?;
        if members.is_empty() {
            return Ok(false);
        }
        let indexed: BTreeSet<String> = self
            .find_ids_by_indexed_field::<S>(field, value)?
            .into_iter()
            .collect();
        Ok(members.iter().any(|id| indexed.contains(id)))
    }

    // Helpers

    fn run(&self, command: Command) -> OrmResult<Reply> {
        Ok(self.conn.run(command)?)
    }

    fn integer(&self, command: &'static str, reply: Reply) -> OrmResult<i64> {
        reply
            .as_integer()
            .ok_or_else(|| OrmError::unexpected_reply(command, &reply))
    }

    /// Non-negative integer reply as a length.
    fn length(&self, command: &'static str, reply: Reply) -> OrmResult<usize> {
        match reply {
            Reply::Integer(n) => {
                usize::try_from(n).map_err(|_| OrmError::unexpected_reply(command, &reply))
            }
            other => Err(OrmError::unexpected_reply(command, &other)),
        }
    }

    fn strings(&self, command: &'static str, request: Command) -> OrmResult<Vec<String>> {
        match self.run(request)? {
            reply @ Reply::Array(_) => Ok(reply.into_strings()),
            other => Err(OrmError::unexpected_reply(command, &other)),
        }
    }

    fn read_id(&self, command: Command) -> OrmResult<Option<String>> {
        match self.run(command)? {
            Reply::Nil => Ok(None),
            Reply::Bulk(id) if id.is_empty() => Ok(None),
            Reply::Bulk(id) => Ok(Some(id)),
            other => Err(OrmError::unexpected_reply("HGET", &other)),
        }
    }

    fn member_key<M: Model>(&self, model: &M, list_name: &str) -> OrmResult<String> {
        if self.config.validate_key_parts {
            check_list_name(list_name)?;
        }
        self.check_part(model.id())?;
        if model.is_new() {
            return Err(OrmError::InvalidKeyPart {
                part: String::new(),
                reason: "entity has no id yet",
            });
        }
        Ok(KeyNamer::of::<M>().submodel_collection_key(model.id(), list_name))
    }

    fn check_part(&self, part: &str) -> OrmResult<()> {
        if self.config.validate_key_parts {
            check_key_part(part)?;
        }
        Ok(())
    }
}

impl<C: StoreConnection + std::fmt::Debug> std::fmt::Debug for Orm<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orm")
            .field("conn", &self.conn)
            .field("config", &self.config)
            .field("save", &self.save)
            .field("remove", &self.remove)
            .finish()
    }
}

/// Numeric ids in numeric order, before non-numeric ids in lexical order.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
