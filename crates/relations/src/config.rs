//! Relation engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::relations::inference::ForeignKeyConvention;

/// Environment variable selecting the foreign key naming convention
pub const ENV_FK_CONVENTION: &str = "ELIF_RELATIONS_FK_CONVENTION";

/// Environment variable bounding the keys sent in one inclusion query
pub const ENV_MAX_INCLUSION_KEYS: &str = "ELIF_RELATIONS_MAX_INCLUSION_KEYS";

/// Settings shared by every resolver and inclusion resolver built against a registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationConfig {
    /// Naming convention used to infer unset foreign keys
    pub foreign_key_convention: ForeignKeyConvention,
    /// Maximum number of distinct keys put into a single inclusion query.
    /// `None` sends every key of a batch in one query.
    pub max_inclusion_keys: Option<usize>,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            foreign_key_convention: ForeignKeyConvention::CamelCase,
            max_inclusion_keys: None,
        }
    }
}

impl RelationConfig {
    /// Parse a configuration document; missing fields keep their defaults
    pub fn from_json(source: &str) -> ModelResult<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from the defaults overridden by environment variables
    pub fn from_env() -> ModelResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_FK_CONVENTION) {
            config.foreign_key_convention = ForeignKeyConvention::parse(&value).ok_or_else(|| {
                ModelError::Configuration(format!(
                    "{} has unknown foreign key convention '{}'",
                    ENV_FK_CONVENTION, value
                ))
            })?;
        }

        if let Ok(value) = std::env::var(ENV_MAX_INCLUSION_KEYS) {
            let max = value.trim().parse::<usize>().map_err(|e| {
                ModelError::Configuration(format!("{} must be a positive integer: {}", ENV_MAX_INCLUSION_KEYS, e))
            })?;
            config.max_inclusion_keys = Some(max);
        }

        config.validate()?;
        Ok(config)
    }

    /// Use a different foreign key naming convention
    pub fn with_foreign_key_convention(mut self, convention: ForeignKeyConvention) -> Self {
        self.foreign_key_convention = convention;
        self
    }

    /// Bound the number of keys sent in one inclusion query
    pub fn with_max_inclusion_keys(mut self, max: usize) -> Self {
        self.max_inclusion_keys = Some(max);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ModelResult<()> {
        if self.max_inclusion_keys == Some(0) {
            return Err(ModelError::Configuration(
                "max_inclusion_keys must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelationConfig::default();
        assert_eq!(config.foreign_key_convention, ForeignKeyConvention::CamelCase);
        assert_eq!(config.max_inclusion_keys, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config = RelationConfig::from_json(r#"{"foreign_key_convention": "underscore"}"#).unwrap();
        assert_eq!(config.foreign_key_convention, ForeignKeyConvention::Underscore);
        assert_eq!(config.max_inclusion_keys, None);

        let config = RelationConfig::from_json(r#"{"max_inclusion_keys": 50}"#).unwrap();
        assert_eq!(config.max_inclusion_keys, Some(50));
    }

    #[test]
    fn test_config_rejects_zero_batch() {
        let err = RelationConfig::from_json(r#"{"max_inclusion_keys": 0}"#).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_config_builder() {
        let config = RelationConfig::default()
            .with_foreign_key_convention(ForeignKeyConvention::PascalCase)
            .with_max_inclusion_keys(10);
        assert_eq!(config.foreign_key_convention, ForeignKeyConvention::PascalCase);
        assert_eq!(config.max_inclusion_keys, Some(10));
    }
}
