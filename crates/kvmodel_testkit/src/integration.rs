//! Cross-crate integration test helpers.
//!
//! [`IntegrationHarness`] drives an engine over an in-memory store while
//! keeping a reference model of what every derived structure should contain,
//! and checks the two agree.

use crate::fixtures::{test_orm, TestOrm, User};
use crate::generators::{UserOperation, USER_SLOTS};
use kvmodel_core::{KeyNamer, Model};
use kvmodel_store::{Command, StoreConnection};
use std::collections::{BTreeMap, BTreeSet};

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The engine under test.
    pub orm: TestOrm,
    /// Saved users by id.
    users: BTreeMap<String, User>,
    /// Expected unique email owners.
    owners: BTreeMap<String, String>,
    /// Ids ever minted, in order.
    minted: Vec<String>,
    /// Id held by each operation slot.
    slots: [Option<String>; USER_SLOTS],
}

impl IntegrationHarness {
    /// Creates a new integration harness over a fresh store.
    pub fn new() -> Self {
        Self {
            orm: test_orm(),
            users: BTreeMap::new(),
            owners: BTreeMap::new(),
            minted: Vec::new(),
            slots: Default::default(),
        }
    }

    /// Saves a user and tracks the expected index state.
    pub fn save(&mut self, user: &mut User) {
        let was_new = user.is_new();
        let previous = self.users.get(&user.id).map(|u| u.email.clone());
        let id = self.orm.save(user).expect("Failed to save user");

        if was_new {
            self.minted.push(id.clone());
        }
        if let Some(old) = previous.filter(|old| *old != user.email) {
            if self.owners.get(&old) == Some(&id) {
                self.owners.remove(&old);
            }
        }
        self.owners.insert(user.email.clone(), id.clone());
        self.users.insert(id, user.clone());
    }

    /// Removes a user and updates tracking.
    pub fn remove(&mut self, user: &User) {
        let existed = self.users.remove(&user.id).is_some();
        let deleted = self.orm.remove(user).expect("Failed to remove user");
        assert_eq!(deleted, existed, "remove result for {}", user.id);
        self.owners.retain(|_, owner| *owner != user.id);
    }

    /// Applies one generated operation.
    pub fn apply(&mut self, op: &UserOperation) {
        match op {
            UserOperation::Save { slot, email, city } => {
                let mut user = match &self.slots[*slot] {
                    Some(id) => self.users[id].clone(),
                    None => User::default(),
                };
                user.email = email.clone();
                user.city = city.clone();
                self.save(&mut user);
                self.slots[*slot] = Some(user.id);
            }
            UserOperation::Remove { slot } => {
                if let Some(id) = self.slots[*slot].take() {
                    let user = self.users[&id].clone();
                    self.remove(&user);
                }
            }
            UserOperation::Find { slot } => {
                if let Some(id) = &self.slots[*slot] {
                    let found: Option<User> = self.orm.find_by_id(id).expect("Failed to find user");
                    assert_eq!(found.as_ref(), self.users.get(id));
                }
            }
        }
    }

    /// Verifies every derived structure matches the tracked users.
    pub fn verify_all(&self) {
        let ids: BTreeSet<String> = self
            .orm
            .all_ids::<User>()
            .expect("Failed to list ids")
            .into_iter()
            .collect();
        let expected: BTreeSet<String> = self.users.keys().cloned().collect();
        assert_eq!(ids, expected, "collection membership");

        for (id, user) in &self.users {
            let found: Option<User> = self.orm.find_by_id(id).expect("Failed to find user");
            assert_eq!(found.as_ref(), Some(user), "record {id}");
        }

        for (email, owner) in &self.owners {
            let found: Option<User> = self
                .orm
                .find_by_unique_field("email", email)
                .expect("Failed to find by email");
            assert_eq!(found.map(|u| u.id).as_ref(), Some(owner), "owner of {email}");
        }

        let mut by_city: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (id, user) in &self.users {
            by_city.entry(user.city.as_str()).or_default().push(id.clone());
        }
        for city in ["Oslo", "Bergen", "Tromso", "Bodo"] {
            let mut expected = by_city.remove(city).unwrap_or_default();
            expected.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));
            let ids = self
                .orm
                .find_ids_by_indexed_field::<User>("city", city)
                .expect("Failed to read index");
            assert_eq!(ids, expected, "index for {city}");
        }

        let keys = KeyNamer::of::<User>();
        let unique_hash = self
            .orm
            .connection()
            .run(Command::hgetall(keys.unique_field_key("email")))
            .expect("Failed to read unique index")
            .into_strings();
        assert_eq!(unique_hash.len() / 2, self.owners.len(), "unique index size");
    }

    /// Verifies minted ids increase strictly.
    pub fn verify_ids_increase(&self) {
        let numbers: Vec<u64> = self
            .minted
            .iter()
            .map(|id| id.parse().expect("Minted id is not numeric"))
            .collect();
        assert!(numbers.windows(2).all(|w| w[0] < w[1]), "ids {numbers:?}");
    }

    /// Returns the count of tracked users.
    pub fn tracked_count(&self) -> usize {
        self.users.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_basic() {
        let mut harness = IntegrationHarness::new();
        let mut user = User::new("a@x.com", "Oslo");
        harness.save(&mut user);
        assert_eq!(harness.tracked_count(), 1);
        harness.verify_all();

        harness.remove(&user);
        assert_eq!(harness.tracked_count(), 0);
        harness.verify_all();
    }

    #[test]
    fn test_harness_unique_takeover() {
        let mut harness = IntegrationHarness::new();
        let mut first = User::new("a@x.com", "Oslo");
        let mut second = User::new("a@x.com", "Bergen");
        harness.save(&mut first);
        harness.save(&mut second);
        harness.verify_all();

        first.email = "b@x.com".to_string();
        harness.save(&mut first);
        harness.verify_all();
        harness.verify_ids_increase();
    }
}
