//! In-memory store for testing and embedded use.

use crate::command::{Command, Reply};
use crate::connection::StoreConnection;
use crate::error::{StoreError, StoreResult};
use crate::procedure::{Procedure, ProcedureContext, ProcedureHandle};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A value held under one key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Str(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
    List(Vec<String>),
}

/// The key → value map plus command semantics.
///
/// Containers that become empty are removed, so a key exists exactly when it
/// holds data.
#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
}

impl Keyspace {
    fn apply(&mut self, command: Command) -> StoreResult<Reply> {
        if command.is_read_only() {
            return self.query(&command);
        }
        match command {
            Command::HSet { key, pairs } => {
                let hash = self.hash_mut(&key)?;
                let mut added = 0;
                for (field, value) in pairs {
                    if hash.insert(field, value).is_none() {
                        added += 1;
                    }
                }
                self.drop_if_empty(&key);
                Ok(Reply::Integer(added))
            }
            Command::HDel { key, fields } => {
                let removed = match self.entries.get_mut(&key) {
                    None => 0,
                    Some(Entry::Hash(hash)) => {
                        fields.iter().filter(|f| hash.remove(*f).is_some()).count()
                    }
                    Some(_) => return Err(StoreError::wrong_type(key)),
                };
                self.drop_if_empty(&key);
                Ok(Reply::Integer(removed as i64))
            }
            Command::Del { keys } => {
                let removed = keys
                    .iter()
                    .filter(|k| self.entries.remove(*k).is_some())
                    .count();
                Ok(Reply::Integer(removed as i64))
            }
            Command::SAdd { key, members } => {
                let set = self.set_mut(&key)?;
                let added = members.into_iter().filter(|m| set.insert(m.clone())).count();
                Ok(Reply::Integer(added as i64))
            }
            Command::SRem { key, members } => {
                let removed = match self.entries.get_mut(&key) {
                    None => 0,
                    Some(Entry::Set(set)) => members.iter().filter(|m| set.remove(*m)).count(),
                    Some(_) => return Err(StoreError::wrong_type(key)),
                };
                self.drop_if_empty(&key);
                Ok(Reply::Integer(removed as i64))
            }
            Command::Incr { key } => {
                let current = match self.entries.get(&key) {
                    None => 0,
                    Some(Entry::Str(s)) => s
                        .parse::<i64>()
                        .map_err(|_| StoreError::NotAnInteger { key: key.clone() })?,
                    Some(_) => return Err(StoreError::wrong_type(key)),
                };
                let next = current
                    .checked_add(1)
                    .ok_or_else(|| StoreError::NotAnInteger { key: key.clone() })?;
                self.entries.insert(key, Entry::Str(next.to_string()));
                Ok(Reply::Integer(next))
            }
            Command::RPush { key, values } => {
                let list = self.list_mut(&key)?;
                list.extend(values);
                Ok(Reply::Integer(list.len() as i64))
            }
            Command::LRem { key, count, value } => {
                let removed = match self.entries.get_mut(&key) {
                    None => 0,
                    Some(Entry::List(list)) => remove_from_list(list, count, &value),
                    Some(_) => return Err(StoreError::wrong_type(key)),
                };
                self.drop_if_empty(&key);
                Ok(Reply::Integer(removed as i64))
            }
            other => Err(StoreError::Rejected(format!(
                "{} is not a write command",
                other.name()
            ))),
        }
    }

    fn query(&self, command: &Command) -> StoreResult<Reply> {
        match command {
            Command::HGetAll { key } => match self.entries.get(key) {
                None => Ok(Reply::Array(Vec::new())),
                Some(Entry::Hash(hash)) => Ok(Reply::bulk_array(
                    hash.iter().flat_map(|(f, v)| [f.clone(), v.clone()]),
                )),
                Some(_) => Err(StoreError::wrong_type(key.clone())),
            },
            Command::HGet { key, field } => match self.entries.get(key) {
                None => Ok(Reply::Nil),
                Some(Entry::Hash(hash)) => Ok(hash
                    .get(field)
                    .map_or(Reply::Nil, |v| Reply::Bulk(v.clone()))),
                Some(_) => Err(StoreError::wrong_type(key.clone())),
            },
            Command::SIsMember { key, member } => match self.entries.get(key) {
                None => Ok(Reply::Integer(0)),
                Some(Entry::Set(set)) => Ok(Reply::Integer(i64::from(set.contains(member)))),
                Some(_) => Err(StoreError::wrong_type(key.clone())),
            },
            Command::SMembers { key } => match self.entries.get(key) {
                None => Ok(Reply::Array(Vec::new())),
                Some(Entry::Set(set)) => Ok(Reply::bulk_array(set.iter().cloned())),
                Some(_) => Err(StoreError::wrong_type(key.clone())),
            },
            Command::SCard { key } => match self.entries.get(key) {
                None => Ok(Reply::Integer(0)),
                Some(Entry::Set(set)) => Ok(Reply::Integer(set.len() as i64)),
                Some(_) => Err(StoreError::wrong_type(key.clone())),
            },
            Command::LRange { key, start, stop } => match self.entries.get(key) {
                None => Ok(Reply::Array(Vec::new())),
                Some(Entry::List(list)) => Ok(Reply::bulk_array(
                    list_range(list, *start, *stop).iter().cloned(),
                )),
                Some(_) => Err(StoreError::wrong_type(key.clone())),
            },
            other => Err(StoreError::Rejected(format!(
                "{} is not a read command",
                other.name()
            ))),
        }
    }

    fn hash_mut(&mut self, key: &str) -> StoreResult<&mut BTreeMap<String, String>> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()))
        {
            Entry::Hash(hash) => Ok(hash),
            _ => Err(StoreError::wrong_type(key)),
        }
    }

    fn set_mut(&mut self, key: &str) -> StoreResult<&mut BTreeSet<String>> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(set) => Ok(set),
            _ => Err(StoreError::wrong_type(key)),
        }
    }

    fn list_mut(&mut self, key: &str) -> StoreResult<&mut Vec<String>> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(Vec::new()))
        {
            Entry::List(list) => Ok(list),
            _ => Err(StoreError::wrong_type(key)),
        }
    }

    fn drop_if_empty(&mut self, key: &str) {
        let empty = match self.entries.get(key) {
            Some(Entry::Hash(h)) => h.is_empty(),
            Some(Entry::Set(s)) => s.is_empty(),
            Some(Entry::List(l)) => l.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }
}

fn remove_from_list(list: &mut Vec<String>, count: i64, value: &str) -> usize {
    let limit = if count == 0 {
        usize::MAX
    } else {
        usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX)
    };
    let mut removed = 0;
    if count >= 0 {
        list.retain(|item| {
            if removed < limit && item == value {
                removed += 1;
                false
            } else {
                true
            }
        });
    } else {
        let mut i = list.len();
        while i > 0 && removed < limit {
            i -= 1;
            if list[i] == value {
                list.remove(i);
                removed += 1;
            }
        }
    }
    removed
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn list_range(list: &[String], start: i64, stop: i64) -> &[String] {
    let len = list.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return &[];
    }
    &list[start as usize..=stop as usize]
}

/// Records the prior state of every key a procedure writes so a failed
/// invocation can be rolled back.
struct JournalContext<'a> {
    keyspace: &'a mut Keyspace,
    saved: HashMap<String, Option<Entry>>,
}

impl<'a> JournalContext<'a> {
    fn new(keyspace: &'a mut Keyspace) -> Self {
        Self {
            keyspace,
            saved: HashMap::new(),
        }
    }

    fn rollback(self) {
        for (key, entry) in self.saved {
            match entry {
                Some(entry) => {
                    self.keyspace.entries.insert(key, entry);
                }
                None => {
                    self.keyspace.entries.remove(&key);
                }
            }
        }
    }
}

impl ProcedureContext for JournalContext<'_> {
    fn call(&mut self, command: Command) -> StoreResult<Reply> {
        for key in command.written_keys() {
            if !self.saved.contains_key(key) {
                let prior = self.keyspace.entries.get(key).cloned();
                self.saved.insert(key.to_string(), prior);
            }
        }
        self.keyspace.apply(command)
    }
}

/// An in-memory key-value store.
///
/// All commands and whole procedure invocations are serialised through one
/// lock, which gives procedures the same indivisibility a single-threaded
/// store server provides. Suitable for:
/// - Unit and integration tests
/// - Embedded use where no external store is available
///
/// # Example
///
/// ```rust
/// use kvmodel_store::{Command, InMemoryStore, Reply, StoreConnection};
///
/// let store = InMemoryStore::new();
/// assert_eq!(store.run(Command::incr("user:id")).unwrap(), Reply::Integer(1));
/// assert_eq!(store.run(Command::incr("user:id")).unwrap(), Reply::Integer(2));
/// ```
pub struct InMemoryStore {
    keyspace: RwLock<Keyspace>,
    procedures: RwLock<HashMap<String, Arc<dyn Procedure>>>,
    connected: AtomicBool,
    commands: AtomicU64,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keyspace: RwLock::new(Keyspace::default()),
            procedures: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
            commands: AtomicU64::new(0),
        }
    }

    /// Simulates losing or regaining the connection.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Forgets every loaded procedure, as a store restart would.
    pub fn flush_procedures(&self) {
        self.procedures.write().clear();
    }

    /// Number of client commands and procedure invocations served.
    pub fn commands_executed(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    /// Whether `key` currently holds data.
    pub fn contains_key(&self, key: &str) -> bool {
        self.keyspace.read().entries.contains_key(key)
    }

    /// Every key starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keyspace
            .read()
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of keys holding data.
    pub fn key_count(&self) -> usize {
        self.keyspace.read().entries.len()
    }

    fn ensure_connected(&self) -> StoreResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("keys", &self.key_count())
            .field("procedures", &self.procedures.read().len())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl StoreConnection for InMemoryStore {
    fn run(&self, command: Command) -> StoreResult<Reply> {
        self.ensure_connected()?;
        self.commands.fetch_add(1, Ordering::Relaxed);
        if command.is_read_only() {
            self.keyspace.read().query(&command)
        } else {
            self.keyspace.write().apply(command)
        }
    }

    fn load_procedure(&self, procedure: Arc<dyn Procedure>) -> StoreResult<ProcedureHandle> {
        self.ensure_connected()?;
        let handle = ProcedureHandle::for_procedure(procedure.as_ref());
        self.procedures
            .write()
            .insert(handle.digest().to_string(), procedure);
        tracing::debug!(procedure = %handle, "procedure loaded");
        Ok(handle)
    }

    fn exec_procedure(
        &self,
        handle: &ProcedureHandle,
        keys: &[String],
        args: &[Bytes],
    ) -> StoreResult<Reply> {
        self.ensure_connected()?;
        let procedure = self
            .procedures
            .read()
            .get(handle.digest())
            .cloned()
            .ok_or_else(|| StoreError::UnknownProcedure {
                digest: handle.digest().to_string(),
            })?;
        self.commands.fetch_add(1, Ordering::Relaxed);

        let mut keyspace = self.keyspace.write();
        let mut ctx = JournalContext::new(&mut *keyspace);
        match procedure.invoke(&mut ctx, keys, args) {
            Ok(reply) => Ok(reply),
            Err(err) => {
                ctx.rollback();
                tracing::debug!(procedure = %handle, error = %err, "procedure rolled back");
                Err(match err {
                    StoreError::ProcedureFailed { .. } => err,
                    other => StoreError::procedure_failed(procedure.name(), other.to_string()),
                })
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(reply: Reply) -> Vec<String> {
        reply.into_strings()
    }

    #[test]
    fn hash_set_get_and_getall() {
        let store = InMemoryStore::new();
        let pairs = vec![("email".into(), "a@x.com".into()), ("id".into(), "1".into())];
        assert_eq!(store.run(Command::hset("user:1", pairs)).unwrap(), Reply::Integer(2));
        assert_eq!(
            store.run(Command::hget("user:1", "email")).unwrap(),
            Reply::Bulk("a@x.com".into())
        );
        assert_eq!(store.run(Command::hget("user:1", "nope")).unwrap(), Reply::Nil);
        assert_eq!(
            strings(store.run(Command::hgetall("user:1")).unwrap()),
            vec!["email", "a@x.com", "id", "1"]
        );
        assert!(strings(store.run(Command::hgetall("user:2")).unwrap()).is_empty());
    }

    #[test]
    fn empty_containers_disappear() {
        let store = InMemoryStore::new();
        store.run(Command::sadd("user:all", "1")).unwrap();
        store.run(Command::srem("user:all", "1")).unwrap();
        assert!(!store.contains_key("user:all"));

        store
            .run(Command::hset("h", vec![("f".into(), "v".into())]))
            .unwrap();
        store.run(Command::hdel("h", vec!["f".into()])).unwrap();
        assert_eq!(store.key_count(), 0);
    }

    #[test]
    fn set_membership() {
        let store = InMemoryStore::new();
        assert_eq!(store.run(Command::sadd("s", "1")).unwrap(), Reply::Integer(1));
        assert_eq!(store.run(Command::sadd("s", "1")).unwrap(), Reply::Integer(0));
        assert_eq!(store.run(Command::sismember("s", "1")).unwrap(), Reply::Integer(1));
        assert_eq!(store.run(Command::sismember("s", "2")).unwrap(), Reply::Integer(0));
        assert_eq!(store.run(Command::scard("s")).unwrap(), Reply::Integer(1));
    }

    #[test]
    fn incr_counts_from_one() {
        let store = InMemoryStore::new();
        for expected in 1..=3 {
            assert_eq!(store.run(Command::incr("user:id")).unwrap(), Reply::Integer(expected));
        }
    }

    #[test]
    fn incr_on_hash_is_wrong_type() {
        let store = InMemoryStore::new();
        store
            .run(Command::hset("k", vec![("f".into(), "v".into())]))
            .unwrap();
        assert!(matches!(
            store.run(Command::incr("k")),
            Err(StoreError::WrongType { .. })
        ));
    }

    #[test]
    fn list_push_range_and_remove() {
        let store = InMemoryStore::new();
        for id in ["3", "1", "2", "1"] {
            store.run(Command::rpush("user:1:posts", id)).unwrap();
        }
        assert_eq!(
            strings(store.run(Command::lrange("user:1:posts", 0, -1)).unwrap()),
            vec!["3", "1", "2", "1"]
        );
        assert_eq!(
            strings(store.run(Command::lrange("user:1:posts", 1, 2)).unwrap()),
            vec!["1", "2"]
        );
        assert_eq!(
            strings(store.run(Command::lrange("user:1:posts", -2, -1)).unwrap()),
            vec!["2", "1"]
        );
        assert!(strings(store.run(Command::lrange("user:1:posts", 5, 9)).unwrap()).is_empty());

        assert_eq!(
            store.run(Command::lrem("user:1:posts", -1, "1")).unwrap(),
            Reply::Integer(1)
        );
        assert_eq!(
            strings(store.run(Command::lrange("user:1:posts", 0, -1)).unwrap()),
            vec!["3", "1", "2"]
        );
        assert_eq!(
            store.run(Command::lrem("user:1:posts", 0, "1")).unwrap(),
            Reply::Integer(1)
        );
    }

    #[test]
    fn disconnected_store_fails() {
        let store = InMemoryStore::new();
        store.set_connected(false);
        assert_eq!(store.run(Command::incr("x")), Err(StoreError::NotConnected));
        store.set_connected(true);
        assert!(store.run(Command::incr("x")).is_ok());
    }

    struct WriteThenFail;

    impl Procedure for WriteThenFail {
        fn name(&self) -> &str {
            "write_then_fail"
        }

        fn invoke(
            &self,
            ctx: &mut dyn ProcedureContext,
            _keys: &[String],
            _args: &[Bytes],
        ) -> StoreResult<Reply> {
            ctx.call(Command::sadd("user:all", "9"))?;
            ctx.call(Command::del(vec!["keep".into()]))?;
            // fails: "user:all" is a set
            ctx.call(Command::incr("user:all"))
        }
    }

    #[test]
    fn failed_procedure_leaves_no_writes() {
        let store = InMemoryStore::new();
        store.run(Command::sadd("keep", "x")).unwrap();
        let handle = store.load_procedure(Arc::new(WriteThenFail)).unwrap();

        let err = store.exec_procedure(&handle, &[], &[]).unwrap_err();
        assert!(matches!(err, StoreError::ProcedureFailed { .. }));
        assert!(!store.contains_key("user:all"));
        assert!(store.contains_key("keep"));
    }

    #[test]
    fn flushed_procedure_is_unknown() {
        let store = InMemoryStore::new();
        let handle = store.load_procedure(Arc::new(WriteThenFail)).unwrap();
        store.flush_procedures();
        assert!(matches!(
            store.exec_procedure(&handle, &[], &[]),
            Err(StoreError::UnknownProcedure { .. })
        ));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn full_range_returns_whole_list(list in prop::collection::vec("[a-c]", 0..16)) {
                prop_assert_eq!(list_range(&list, 0, -1), &list[..]);
            }

            #[test]
            fn range_is_clamped(
                list in prop::collection::vec("[a-c]", 0..16),
                start in 0i64..20,
                stop in 0i64..20,
            ) {
                let got = list_range(&list, start, stop);
                let len = list.len() as i64;
                let expected_len = if start > stop || start >= len {
                    0
                } else {
                    stop.min(len - 1) - start + 1
                };
                prop_assert_eq!(got.len() as i64, expected_len);
            }

            #[test]
            fn remove_all_keeps_order(list in prop::collection::vec("[a-c]", 0..16)) {
                let mut remaining = list.clone();
                let removed = remove_from_list(&mut remaining, 0, "a");
                let expected: Vec<String> = list.iter().filter(|s| *s != "a").cloned().collect();
                prop_assert_eq!(removed, list.len() - expected.len());
                prop_assert_eq!(remaining, expected);
            }
        }
    }
}
