//! Property-based test generators using proptest.
//!
//! Strategies produce values that are valid key parts (no `:`), so they can be
//! used with key-part validation on or off.

use crate::fixtures::{Post, User};
use kvmodel_core::AttributeMap;
use proptest::prelude::*;

/// Strategy for generating email addresses.
pub fn email_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9.]{0,11}@[a-z]{1,8}\\.(com|org|no)")
        .expect("Invalid regex")
}

/// Strategy for generating city names from a small pool, so index sets are
/// shared between entities.
pub fn city_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Oslo", "Bergen", "Tromso", "Bodo"]).prop_map(str::to_string)
}

/// Strategy for generating valid key parts: ids, field names and values.
pub fn key_part_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9@._-]{1,24}").expect("Invalid regex")
}

/// Strategy for generating attribute maps.
pub fn attribute_map_strategy() -> impl Strategy<Value = AttributeMap> {
    prop::collection::btree_map(key_part_strategy(), any::<String>(), 0..8)
}

/// Strategy for generating unsaved users.
pub fn user_strategy() -> impl Strategy<Value = User> {
    (email_strategy(), city_strategy(), any::<u32>())
        .prop_map(|(email, city, age)| User::new(email, city).with_age(age))
}

/// Strategy for generating unsaved posts.
pub fn post_strategy() -> impl Strategy<Value = Post> {
    (
        "[a-z ]{1,20}",
        prop::sample::select(vec!["rust", "go", "zig"]),
    )
        .prop_map(|(title, tag)| Post::new(title, tag))
}

/// An operation against a small pool of user slots.
#[derive(Debug, Clone)]
pub enum UserOperation {
    /// Save the user in `slot` with new values, creating it if the slot is
    /// empty.
    Save {
        /// Slot index.
        slot: usize,
        /// New email.
        email: String,
        /// New city.
        city: String,
    },
    /// Remove the user in `slot`, if any.
    Remove {
        /// Slot index.
        slot: usize,
    },
    /// Look the user in `slot` up by id.
    Find {
        /// Slot index.
        slot: usize,
    },
}

/// Number of user slots operations refer to.
pub const USER_SLOTS: usize = 4;

/// Strategy for generating user operations.
///
/// Emails come from a small pool so unique values collide across slots.
pub fn user_operation_strategy() -> impl Strategy<Value = UserOperation> {
    let slot = 0..USER_SLOTS;
    let email =
        prop::sample::select(vec!["a@x.com", "b@x.com", "c@x.com"]).prop_map(str::to_string);
    prop_oneof![
        3 => (slot.clone(), email, city_strategy())
            .prop_map(|(slot, email, city)| UserOperation::Save { slot, email, city }),
        1 => slot.clone().prop_map(|slot| UserOperation::Remove { slot }),
        1 => slot.prop_map(|slot| UserOperation::Find { slot }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<UserOperation>> {
    prop::collection::vec(user_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
