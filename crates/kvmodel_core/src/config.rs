//! Engine configuration.

use serde::{Deserialize, Serialize};

/// What [`crate::Orm::list_ordered_members`] does with a member id that has no
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingMemberPolicy {
    /// Leave the id out of the result.
    #[default]
    Skip,
    /// Fail with [`crate::OrmError::MissingMember`].
    Error,
}

/// Configuration for an [`crate::Orm`] engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Name the save procedure is registered under.
    pub save_procedure: String,

    /// Name the remove procedure is registered under.
    pub remove_procedure: String,

    /// Handling of dangling ids in member lists.
    pub missing_members: MissingMemberPolicy,

    /// Reject ids, field names and list names that would break the key
    /// layout before sending anything to the store.
    pub validate_key_parts: bool,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            save_procedure: "kvmodel.save".to_string(),
            remove_procedure: "kvmodel.remove".to_string(),
            missing_members: MissingMemberPolicy::Skip,
            validate_key_parts: false,
        }
    }
}

impl OrmConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the missing member policy.
    #[must_use]
    pub const fn missing_members(mut self, policy: MissingMemberPolicy) -> Self {
        self.missing_members = policy;
        self
    }

    /// Sets whether key parts are validated.
    #[must_use]
    pub const fn validate_key_parts(mut self, value: bool) -> Self {
        self.validate_key_parts = value;
        self
    }

    /// Sets the procedure names.
    #[must_use]
    pub fn procedure_names(mut self, save: impl Into<String>, remove: impl Into<String>) -> Self {
        self.save_procedure = save.into();
        self.remove_procedure = remove.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = OrmConfig::default();
        assert_eq!(config.missing_members, MissingMemberPolicy::Skip);
        assert!(!config.validate_key_parts);
        assert_ne!(config.save_procedure, config.remove_procedure);
    }

    #[test]
    fn builder_pattern() {
        let config = OrmConfig::new()
            .missing_members(MissingMemberPolicy::Error)
            .validate_key_parts(true)
            .procedure_names("app.save", "app.remove");

        assert_eq!(config.missing_members, MissingMemberPolicy::Error);
        assert!(config.validate_key_parts);
        assert_eq!(config.save_procedure, "app.save");
        assert_eq!(config.remove_procedure, "app.remove");
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: OrmConfig =
            serde_json::from_str(r#"{ "missing_members": "error" }"#).unwrap();
        assert_eq!(config.missing_members, MissingMemberPolicy::Error);
        assert_eq!(config.save_procedure, OrmConfig::default().save_procedure);
    }
}
