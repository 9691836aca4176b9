//! Model Registry - runtime storage of model definitions and their relations

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::RelationConfig;
use crate::error::{ModelError, ModelResult};
use crate::model::definition::ModelDefinition;
use crate::relations::metadata::{RelationDefinition, RelationType};

/// Thread-safe registry of model definitions, keyed by model name.
///
/// Relation targets are looked up here lazily, so models can be registered
/// in any order. Cloning the registry shares the underlying storage.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Arc<DashMap<String, Arc<ModelDefinition>>>,
    config: Arc<RelationConfig>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Create an empty registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(RelationConfig::default())
    }

    /// Create an empty registry with the given configuration
    pub fn with_config(config: RelationConfig) -> Self {
        Self {
            models: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Global registry instance for the application
    pub fn global() -> &'static ModelRegistry {
        static GLOBAL_REGISTRY: std::sync::OnceLock<ModelRegistry> = std::sync::OnceLock::new();
        GLOBAL_REGISTRY.get_or_init(ModelRegistry::new)
    }

    pub fn config(&self) -> &RelationConfig {
        &self.config
    }

    /// Register a model definition.
    ///
    /// Definitions are static once registered; registering a second model
    /// under the same name is rejected.
    pub fn register(&self, definition: ModelDefinition) -> ModelResult<Arc<ModelDefinition>> {
        if definition.name.is_empty() {
            return Err(ModelError::Configuration("Model name cannot be empty".to_string()));
        }

        for relation in definition.relations() {
            if relation.source() != definition.name {
                return Err(ModelError::Configuration(format!(
                    "Relation '{}' on model '{}' declares source '{}'",
                    relation.name(),
                    definition.name,
                    relation.source()
                )));
            }
        }

        let name = definition.name.clone();
        let definition = Arc::new(definition);
        match self.models.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(ModelError::Configuration(format!(
                "Model '{}' is already registered",
                entry.key()
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                tracing::debug!(model = %entry.key(), relations = definition.relations().len(), "registered model");
                entry.insert(definition.clone());
                Ok(definition)
            }
        }
    }

    /// Get a model definition by name
    pub fn get(&self, model_name: &str) -> Option<Arc<ModelDefinition>> {
        self.models.get(model_name).map(|entry| entry.value().clone())
    }

    /// Check if a model is registered
    pub fn contains(&self, model_name: &str) -> bool {
        self.models.contains_key(model_name)
    }

    /// Get relation metadata by model and property name
    pub fn relation(&self, model_name: &str, property: &str) -> Option<RelationDefinition> {
        self.models.get(model_name)?.relation(property).cloned()
    }

    /// Get all relations declared on a model
    pub fn relations_of(&self, model_name: &str) -> Vec<RelationDefinition> {
        self.models
            .get(model_name)
            .map(|model| model.relations().to_vec())
            .unwrap_or_default()
    }

    /// Names of all registered models, sorted
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Get statistics about the registry
    pub fn stats(&self) -> RegistryStats {
        let mut relation_type_counts = HashMap::new();
        let mut total_relations = 0;

        for entry in self.models.iter() {
            for relation in entry.value().relations() {
                *relation_type_counts.entry(relation.relation_type()).or_insert(0) += 1;
                total_relations += 1;
            }
        }

        RegistryStats {
            total_models: self.models.len(),
            total_relations,
            relation_type_counts,
        }
    }

    /// Remove every registered model
    pub fn clear(&self) {
        self.models.clear();
    }
}

/// Statistics about the model registry
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub total_models: usize,
    pub total_relations: usize,
    pub relation_type_counts: HashMap<RelationType, usize>,
}

impl RegistryStats {
    /// Get the most common relation type
    pub fn most_common_relation_type(&self) -> Option<(RelationType, usize)> {
        self.relation_type_counts
            .iter()
            .max_by_key(|(_, count)| *count)
            .map(|(rel_type, count)| (*rel_type, *count))
    }
}
