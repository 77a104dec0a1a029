//! Entity codec contract.

use crate::error::OrmResult;
use std::collections::BTreeMap;

/// Attribute name → string value. Ordered so argument envelopes are
/// deterministic.
pub type AttributeMap = BTreeMap<String, String>;

/// Name of the attribute the engine reserves for the entity id.
pub const ID_ATTRIBUTE: &str = "id";

/// Trait for types that can be persisted by [`crate::Orm`].
///
/// Implementors must provide:
/// - `type_name()`: constant per type, the root of every key
/// - `id()` / `set_id()`: empty until first save, immutable afterwards
/// - `to_attribute_map()` / `from_attribute_map()`: the entity's own codec
///
/// and may declare indexed and unique attributes and owned member lists.
///
/// # Example
///
/// ```rust
/// use kvmodel_core::{AttributeMap, Model, OrmResult};
///
/// #[derive(Default)]
/// struct User {
///     id: String,
///     email: String,
/// }
///
/// impl Model for User {
///     fn type_name() -> &'static str {
///         "user"
///     }
///
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn set_id(&mut self, id: String) {
///         self.id = id;
///     }
///
///     fn to_attribute_map(&self) -> AttributeMap {
///         AttributeMap::from([("email".to_string(), self.email.clone())])
///     }
///
///     fn from_attribute_map(&mut self, map: &AttributeMap) -> OrmResult<()> {
///         self.id = map.get("id").cloned().unwrap_or_default();
///         self.email = map.get("email").cloned().unwrap_or_default();
///         Ok(())
///     }
///
///     fn declared_unique_attributes() -> &'static [&'static str] {
///         &["email"]
///     }
/// }
/// ```
pub trait Model: Default {
    /// Entity type name. Must not contain `:`.
    fn type_name() -> &'static str;

    /// Current id; empty for an entity that was never saved.
    fn id(&self) -> &str;

    /// Stamp the id minted on first save.
    fn set_id(&mut self, id: String);

    /// Attributes to persist. An `id` entry, if present, is overridden by the
    /// engine with the real id.
    fn to_attribute_map(&self) -> AttributeMap;

    /// Update `self` from a stored record. The map always contains `id`.
    ///
    /// # Errors
    ///
    /// Implementations return [`crate::OrmError::MalformedRecord`] when a stored
    /// value cannot be parsed.
    fn from_attribute_map(&mut self, map: &AttributeMap) -> OrmResult<()>;

    /// Attributes kept in secondary index sets.
    fn declared_index_attributes() -> &'static [&'static str] {
        &[]
    }

    /// Attributes kept in unique value → id lookups.
    fn declared_unique_attributes() -> &'static [&'static str] {
        &[]
    }

    /// Member lists owned by the entity, deleted when it is removed.
    fn declared_member_lists() -> &'static [&'static str] {
        &[]
    }

    /// Whether the entity has never been saved.
    fn is_new(&self) -> bool {
        self.id().is_empty()
    }
}

/// Pairs of `(attribute, value)` for the declared names that are present in
/// `attributes`. Absent attributes are skipped.
pub(crate) fn declared_pairs(
    declared: &[&str],
    attributes: &AttributeMap,
) -> Vec<(String, String)> {
    declared
        .iter()
        .filter_map(|name| {
            attributes
                .get(*name)
                .map(|value| ((*name).to_string(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_pairs_skip_absent_attributes() {
        let attributes = AttributeMap::from([
            ("email".to_string(), "a@x.com".to_string()),
            ("city".to_string(), String::new()),
        ]);
        let pairs = declared_pairs(&["email", "city", "phone"], &attributes);
        assert_eq!(
            pairs,
            vec![
                ("email".to_string(), "a@x.com".to_string()),
                ("city".to_string(), String::new()),
            ]
        );
    }
}
