//! Association configuration - registry-wide defaults for declarations

use serde::{Deserialize, Serialize};

use crate::error::AssociationResult;

/// Foreign key naming conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyConvention {
    /// modelId (e.g., userId)
    #[default]
    CamelCase,
    /// model_id (e.g., user_id)
    Underscore,
}

/// Registry-wide configuration for association declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Convention used when a foreign key name has to be inferred
    pub foreign_key_convention: ForeignKeyConvention,
    /// Whether association hooks fire when a declaration does not say
    pub hooks_by_default: bool,
    /// Whether default table names are the plural of the model name
    pub pluralize_table_names: bool,
    /// Whether reading the deprecated registry accessor on options logs a warning
    pub warn_on_deprecated_access: bool,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            foreign_key_convention: ForeignKeyConvention::CamelCase,
            hooks_by_default: false,
            pluralize_table_names: true,
            warn_on_deprecated_access: true,
        }
    }
}

impl AssociationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML document; missing keys keep their defaults
    pub fn from_yaml_str(source: &str) -> AssociationResult<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Build configuration from `ELIF_ASSOCIATIONS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("ELIF_ASSOCIATIONS_FOREIGN_KEY_CONVENTION") {
            match value.to_lowercase().as_str() {
                "underscore" | "snake_case" => {
                    config.foreign_key_convention = ForeignKeyConvention::Underscore
                }
                "camel_case" | "camelcase" => {
                    config.foreign_key_convention = ForeignKeyConvention::CamelCase
                }
                other => tracing::warn!("Ignoring unknown foreign key convention: {}", other),
            }
        }
        if let Some(flag) = lookup("ELIF_ASSOCIATIONS_HOOKS").and_then(|v| parse_flag(&v)) {
            config.hooks_by_default = flag;
        }
        if let Some(flag) = lookup("ELIF_ASSOCIATIONS_PLURALIZE_TABLES").and_then(|v| parse_flag(&v)) {
            config.pluralize_table_names = flag;
        }
        if let Some(flag) = lookup("ELIF_ASSOCIATIONS_WARN_DEPRECATED").and_then(|v| parse_flag(&v)) {
            config.warn_on_deprecated_access = flag;
        }

        config
    }

    pub fn with_foreign_key_convention(mut self, convention: ForeignKeyConvention) -> Self {
        self.foreign_key_convention = convention;
        self
    }

    pub fn with_hooks_by_default(mut self, enabled: bool) -> Self {
        self.hooks_by_default = enabled;
        self
    }

    pub fn with_pluralize_table_names(mut self, enabled: bool) -> Self {
        self.pluralize_table_names = enabled;
        self
    }

    pub fn with_warn_on_deprecated_access(mut self, enabled: bool) -> Self {
        self.warn_on_deprecated_access = enabled;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AssociationConfig::default();
        assert_eq!(config.foreign_key_convention, ForeignKeyConvention::CamelCase);
        assert!(!config.hooks_by_default);
        assert!(config.pluralize_table_names);
        assert!(config.warn_on_deprecated_access);
    }

    #[test]
    fn test_from_yaml_keeps_defaults_for_missing_keys() {
        let config = AssociationConfig::from_yaml_str(
            "foreign_key_convention: underscore\nhooks_by_default: true\n",
        )
        .unwrap();

        assert_eq!(config.foreign_key_convention, ForeignKeyConvention::Underscore);
        assert!(config.hooks_by_default);
        assert!(config.pluralize_table_names);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_convention() {
        assert!(AssociationConfig::from_yaml_str("foreign_key_convention: kebab").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("ELIF_ASSOCIATIONS_FOREIGN_KEY_CONVENTION", "snake_case"),
            ("ELIF_ASSOCIATIONS_HOOKS", "yes"),
            ("ELIF_ASSOCIATIONS_PLURALIZE_TABLES", "off"),
            ("ELIF_ASSOCIATIONS_WARN_DEPRECATED", "maybe"),
        ]
        .into_iter()
        .collect();

        let config = AssociationConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.foreign_key_convention, ForeignKeyConvention::Underscore);
        assert!(config.hooks_by_default);
        assert!(!config.pluralize_table_names);
        // unparseable flags keep the default
        assert!(config.warn_on_deprecated_access);
    }

    #[test]
    fn test_builder_pattern() {
        let config = AssociationConfig::new()
            .with_foreign_key_convention(ForeignKeyConvention::Underscore)
            .with_hooks_by_default(true)
            .with_pluralize_table_names(false)
            .with_warn_on_deprecated_access(false);

        assert_eq!(config.foreign_key_convention, ForeignKeyConvention::Underscore);
        assert!(config.hooks_by_default);
        assert!(!config.pluralize_table_names);
        assert!(!config.warn_on_deprecated_access);
    }
}
