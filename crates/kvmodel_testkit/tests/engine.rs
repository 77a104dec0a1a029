//! Engine properties across the codec, store and core crates.

use kvmodel_core::{AttributeMap, MissingMemberPolicy, Model, OrmConfig, OrmError, OrmResult};
use kvmodel_testkit::prelude::*;
use proptest::prelude::*;

/// An entity with free-form attributes.
#[derive(Debug, Default, Clone, PartialEq)]
struct Record {
    id: String,
    attributes: AttributeMap,
}

impl Model for Record {
    fn type_name() -> &'static str {
        "record"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn to_attribute_map(&self) -> AttributeMap {
        self.attributes.clone()
    }

    fn from_attribute_map(&mut self, map: &AttributeMap) -> OrmResult<()> {
        self.attributes = map.clone();
        self.id = self.attributes.remove("id").unwrap_or_default();
        Ok(())
    }
}

#[test]
fn unique_lookup_scenario() {
    with_test_orm(|orm| {
        let mut user = User::new("a@x.com", "Oslo");
        assert_eq!(orm.save(&mut user).unwrap(), "1");

        let found: User = orm.find_by_unique_field("email", "a@x.com").unwrap().unwrap();
        assert_eq!(found.id, "1");

        orm.remove(&found).unwrap();
        assert!(orm.find_by_id::<User>("1").unwrap().is_none());
        assert!(orm
            .find_by_unique_field::<User>("email", "a@x.com")
            .unwrap()
            .is_none());
    });
}

#[test]
fn removing_owner_drops_its_list_but_not_members() {
    let orm = test_orm();
    let (user, posts) = scenarios::user_with_posts(&orm, 3);
    orm.remove(&user).unwrap();

    assert!(orm.member_ids(&user, User::POSTS).unwrap().is_empty());
    for post in &posts {
        assert!(orm.exists_by_id::<Post>(&post.id).unwrap());
    }
}

#[test]
fn dangling_member_policy() {
    let orm = test_orm_with_config(OrmConfig::new().missing_members(MissingMemberPolicy::Error));
    let (user, posts) = scenarios::user_with_posts(&orm, 2);
    orm.remove(&posts[0]).unwrap();

    assert!(matches!(
        orm.list_ordered_members::<User, Post>(&user, User::POSTS),
        Err(OrmError::MissingMember { .. })
    ));

    let lenient = test_orm();
    let (user, posts) = scenarios::user_with_posts(&lenient, 2);
    lenient.remove(&posts[0]).unwrap();
    let loaded: Vec<Post> = lenient.list_ordered_members(&user, User::POSTS).unwrap();
    assert_eq!(loaded, vec![posts[1].clone()]);
}

#[test]
fn removing_everything_leaves_only_counters() {
    let orm = test_orm();
    let users = scenarios::populated_users(&orm, 6);
    for user in &users {
        orm.remove(user).unwrap();
    }
    assert_eq!(orm.connection().key_count(), 1);
    assert!(orm.connection().contains_key("user:id"));
}

#[test]
fn procedures_survive_store_flush() {
    let orm = test_orm();
    orm.connection().flush_procedures();
    let users = scenarios::populated_users(&orm, 2);
    assert!(orm.exists_by_id::<User>(&users[1].id).unwrap());
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn operation_sequences_keep_layout_consistent(ops in operation_sequence_strategy(1, 40)) {
        let mut harness = IntegrationHarness::new();
        for op in &ops {
            harness.apply(op);
            harness.verify_all();
        }
        harness.verify_ids_increase();
    }

    #[test]
    fn saved_user_is_found_by_every_route(user in user_strategy()) {
        let orm = test_orm();
        let mut user = user;
        let id = orm.save(&mut user).unwrap();

        prop_assert!(orm.exists_by_id::<User>(&id).unwrap());
        prop_assert_eq!(orm.find_by_id::<User>(&id).unwrap(), Some(user.clone()));
        prop_assert_eq!(
            orm.find_by_unique_field::<User>("email", &user.email).unwrap(),
            Some(user.clone())
        );
        prop_assert_eq!(
            orm.find_ids_by_indexed_field::<User>("city", &user.city).unwrap(),
            vec![id]
        );
    }

    #[test]
    fn attributes_round_trip(attributes in attribute_map_strategy()) {
        let orm = test_orm();
        let mut record = Record { id: String::new(), attributes };
        let id = orm.save(&mut record).unwrap();

        let found: Record = orm.find_by_id(&id).unwrap().unwrap();
        let mut expected = record.attributes.clone();
        expected.remove("id");
        prop_assert_eq!(found.attributes, expected);
        prop_assert_eq!(found.id, id);
    }

    #[test]
    fn member_lists_keep_push_order(posts in prop::collection::vec(post_strategy(), 0..12)) {
        let orm = test_orm();
        let mut owner = User::new("owner@x.com", "Oslo");
        orm.save(&mut owner).unwrap();

        let mut saved = Vec::new();
        for mut post in posts {
            orm.save(&mut post).unwrap();
            orm.push_member(&owner, User::POSTS, &post.id).unwrap();
            saved.push(post);
        }

        let loaded: Vec<Post> = orm.list_ordered_members(&owner, User::POSTS).unwrap();
        prop_assert_eq!(loaded, saved);
    }

    #[test]
    fn validated_engine_accepts_generated_parts(
        email in email_strategy(),
        city in key_part_strategy()
    ) {
        let orm = test_orm_with_config(OrmConfig::new().validate_key_parts(true));
        let mut user = User::new(email, city.clone());
        let id = orm.save(&mut user).unwrap();
        prop_assert_eq!(orm.find_ids_by_indexed_field::<User>("city", &city).unwrap(), vec![id]);
    }
}
