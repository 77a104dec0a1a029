//! Test fixtures and engine helpers.
//!
//! Provides fixture models and convenience functions for setting up an
//! engine over a fresh in-memory store.

use kvmodel_core::{AttributeMap, Model, Orm, OrmConfig, OrmError, OrmResult};
use kvmodel_store::InMemoryStore;
use std::sync::Arc;

/// Engine over a shared in-memory store, as used throughout the tests.
pub type TestOrm = Orm<Arc<InMemoryStore>>;

/// A user with a unique email, an indexed city and a list of posts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct User {
    /// Entity id; empty until saved.
    pub id: String,
    /// Unique.
    pub email: String,
    /// Indexed.
    pub city: String,
    /// Stored as a decimal string.
    pub age: u32,
}

impl User {
    /// Name of the user's post list.
    pub const POSTS: &'static str = "posts";

    /// Unsaved user.
    pub fn new(email: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            email: email.into(),
            city: city.into(),
            age: 0,
        }
    }

    /// Sets the age.
    #[must_use]
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = age;
        self
    }
}

impl Model for User {
    fn type_name() -> &'static str {
        "user"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn to_attribute_map(&self) -> AttributeMap {
        AttributeMap::from([
            ("email".to_string(), self.email.clone()),
            ("city".to_string(), self.city.clone()),
            ("age".to_string(), self.age.to_string()),
        ])
    }

    fn from_attribute_map(&mut self, map: &AttributeMap) -> OrmResult<()> {
        self.id = map.get("id").cloned().unwrap_or_default();
        self.email = map.get("email").cloned().unwrap_or_default();
        self.city = map.get("city").cloned().unwrap_or_default();
        self.age = match map.get("age") {
            Some(age) => age.parse().map_err(|e| {
                OrmError::malformed_record(Self::type_name(), self.id.clone(), format!("age: {e}"))
            })?,
            None => 0,
        };
        Ok(())
    }

    fn declared_index_attributes() -> &'static [&'static str] {
        &["city"]
    }

    fn declared_unique_attributes() -> &'static [&'static str] {
        &["email"]
    }

    fn declared_member_lists() -> &'static [&'static str] {
        &[Self::POSTS]
    }
}

/// A post with an indexed tag.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Post {
    /// Entity id; empty until saved.
    pub id: String,
    /// Title.
    pub title: String,
    /// Indexed.
    pub tag: String,
}

impl Post {
    /// Unsaved post.
    pub fn new(title: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            tag: tag.into(),
        }
    }
}

impl Model for Post {
    fn type_name() -> &'static str {
        "post"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn to_attribute_map(&self) -> AttributeMap {
        AttributeMap::from([
            ("title".to_string(), self.title.clone()),
            ("tag".to_string(), self.tag.clone()),
        ])
    }

    fn from_attribute_map(&mut self, map: &AttributeMap) -> OrmResult<()> {
        self.id = map.get("id").cloned().unwrap_or_default();
        self.title = map.get("title").cloned().unwrap_or_default();
        self.tag = map.get("tag").cloned().unwrap_or_default();
        Ok(())
    }

    fn declared_index_attributes() -> &'static [&'static str] {
        &["tag"]
    }
}

/// Creates an engine over a new in-memory store.
pub fn test_orm() -> TestOrm {
    test_orm_with_config(OrmConfig::default())
}

/// Creates an engine with `config` over a new in-memory store.
pub fn test_orm_with_config(config: OrmConfig) -> TestOrm {
    Orm::with_config(Arc::new(InMemoryStore::new()), config).expect("Failed to create engine")
}

/// Runs a test with an engine over a new in-memory store.
///
/// # Example
///
/// ```rust,ignore
/// use kvmodel_testkit::with_test_orm;
///
/// #[test]
/// fn my_test() {
///     with_test_orm(|orm| {
///         assert_eq!(orm.count::<User>().unwrap(), 0);
///     });
/// }
/// ```
pub fn with_test_orm<F, R>(f: F) -> R
where
    F: FnOnce(&TestOrm) -> R,
{
    let orm = test_orm();
    f(&orm)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Saves `count` users, alternating between two cities.
    pub fn populated_users(orm: &TestOrm, count: usize) -> Vec<User> {
        (0..count)
            .map(|i| {
                let city = if i % 2 == 0 { "Oslo" } else { "Bergen" };
                let mut user = User::new(format!("user{i}@example.com"), city);
                orm.save(&mut user).expect("Failed to save user");
                user
            })
            .collect()
    }

    /// Saves a user and `count` posts, pushed onto the user's post list in
    /// creation order.
    pub fn user_with_posts(orm: &TestOrm, count: usize) -> (User, Vec<Post>) {
        let mut user = User::new("author@example.com", "Oslo");
        orm.save(&mut user).expect("Failed to save user");

        let posts = (0..count)
            .map(|i| {
                let tag = if i % 2 == 0 { "rust" } else { "go" };
                let mut post = Post::new(format!("post {i}"), tag);
                orm.save(&mut post).expect("Failed to save post");
                orm.push_member(&user, User::POSTS, &post.id)
                    .expect("Failed to push post");
                post
            })
            .collect();
        (user, posts)
    }
}
