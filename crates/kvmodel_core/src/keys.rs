//! Key derivation.
//!
//! Every physical key is the entity type name joined to fixed literals and
//! caller-supplied parts with `:`. Nothing is escaped: ids, field names and
//! list names must not contain `:`, and list names must not start with `_`
//! (reserved for the per-entity memo keys). [`crate::OrmConfig::validate_key_parts`]
//! turns these constraints into runtime checks.

use crate::error::{OrmError, OrmResult};
use crate::model::Model;

/// Separator between key parts.
pub const SEPARATOR: char = ':';

/// Prefix reserved for keys the engine keeps per entity.
pub const RESERVED_PREFIX: char = '_';

/// Derives key names for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyNamer<'a> {
    type_name: &'a str,
}

impl<'a> KeyNamer<'a> {
    /// Key namer for an explicit type name.
    pub const fn new(type_name: &'a str) -> Self {
        Self { type_name }
    }

    /// Key namer for model type `M`.
    pub fn of<M: Model>() -> KeyNamer<'static> {
        KeyNamer::new(M::type_name())
    }

    /// The type name keys are derived from.
    pub fn type_name(&self) -> &'a str {
        self.type_name
    }

    /// Primary record: `type:id`.
    pub fn model_key(&self, id: &str) -> String {
        format!("{}:{id}", self.type_name)
    }

    /// Set of live ids: `type:all`.
    pub fn collection_key(&self) -> String {
        format!("{}:all", self.type_name)
    }

    /// Id counter: `type:id`.
    pub fn collection_id_key(&self) -> String {
        format!("{}:id", self.type_name)
    }

    /// Unique index hash for one field: `type:uniques:field`.
    pub fn unique_field_key(&self, field: &str) -> String {
        format!("{}:uniques:{field}", self.type_name)
    }

    /// Secondary index set for one field value: `type:indices:field:value`.
    pub fn indexed_field_key(&self, field: &str, value: &str) -> String {
        format!("{}:indices:{field}:{value}", self.type_name)
    }

    /// Ordered sub-entity list: `type:id:list`.
    pub fn submodel_collection_key(&self, id: &str, list_name: &str) -> String {
        format!("{}:{list_name}", self.model_key(id))
    }

    /// Secondary-index keys the entity is listed in: `type:id:_indices`.
    pub fn index_memo_key(&self, id: &str) -> String {
        format!("{}:_indices", self.model_key(id))
    }

    /// Unique values the entity holds: `type:id:_uniques`.
    pub fn unique_memo_key(&self, id: &str) -> String {
        format!("{}:_uniques", self.model_key(id))
    }
}

/// Reject a key part containing the separator.
pub fn check_key_part(part: &str) -> OrmResult<()> {
    if part.contains(SEPARATOR) {
        return Err(OrmError::InvalidKeyPart {
            part: part.to_string(),
            reason: "contains the key separator",
        });
    }
    Ok(())
}

/// Reject a member list name that is unusable as a key suffix.
pub fn check_list_name(list_name: &str) -> OrmResult<()> {
    check_key_part(list_name)?;
    if list_name.is_empty() {
        return Err(OrmError::InvalidKeyPart {
            part: String::new(),
            reason: "list name is empty",
        });
    }
    if list_name.starts_with(RESERVED_PREFIX) {
        return Err(OrmError::InvalidKeyPart {
            part: list_name.to_string(),
            reason: "list names starting with '_' are reserved",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        let keys = KeyNamer::new("user");
        assert_eq!(keys.model_key("7"), "user:7");
        assert_eq!(keys.collection_key(), "user:all");
        assert_eq!(keys.collection_id_key(), "user:id");
        assert_eq!(keys.unique_field_key("email"), "user:uniques:email");
        assert_eq!(
            keys.indexed_field_key("city", "Oslo"),
            "user:indices:city:Oslo"
        );
        assert_eq!(keys.submodel_collection_key("7", "posts"), "user:7:posts");
        assert_eq!(keys.index_memo_key("7"), "user:7:_indices");
        assert_eq!(keys.unique_memo_key("7"), "user:7:_uniques");
    }

    #[test]
    fn distinct_type_names_do_not_collide() {
        let a = KeyNamer::new("user");
        let b = KeyNamer::new("post");
        assert_ne!(a.model_key("1"), b.model_key("1"));
        assert_ne!(a.collection_key(), b.collection_key());
    }

    #[test]
    fn separator_in_part_rejected() {
        assert!(check_key_part("a@x.com").is_ok());
        assert!(matches!(
            check_key_part("a:b"),
            Err(OrmError::InvalidKeyPart { .. })
        ));
    }

    #[test]
    fn reserved_list_names_rejected() {
        assert!(check_list_name("posts").is_ok());
        assert!(check_list_name("_indices").is_err());
        assert!(check_list_name("").is_err());
        assert!(check_list_name("a:b").is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn model_keys_split_back_into_parts(
                type_name in "[a-z]{1,8}",
                id in "[0-9a-z]{1,8}",
            ) {
                let keys = KeyNamer::new(&type_name);
                let key = keys.model_key(&id);
                let parts: Vec<&str> = key.split(SEPARATOR).collect();
                prop_assert_eq!(parts, vec![type_name.as_str(), id.as_str()]);
                prop_assert!(keys.index_memo_key(&id).starts_with(&key));
            }
        }
    }
}
