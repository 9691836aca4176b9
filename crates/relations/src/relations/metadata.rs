//! Relation Metadata - declared and resolved descriptors for every relation kind

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::InvalidRelationError;
use crate::model::definition::ModelDefinition;
use crate::model::registry::ModelRegistry;

/// Defines the kind of relation between two models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    /// One-to-many, the target holds the foreign key
    HasMany,
    /// One-to-one, the target holds the foreign key
    HasOne,
    /// Many-to-one, the source holds the foreign key
    BelongsTo,
    EmbedsOne,
    EmbedsMany,
    ReferencesOne,
    ReferencesMany,
}

impl RelationType {
    /// Returns true if this relation returns a collection
    pub fn targets_many(self) -> bool {
        matches!(self, Self::HasMany | Self::EmbedsMany | Self::ReferencesMany)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HasMany => "hasMany",
            Self::HasOne => "hasOne",
            Self::BelongsTo => "belongsTo",
            Self::EmbedsOne => "embedsOne",
            Self::EmbedsMany => "embedsMany",
            Self::ReferencesOne => "referencesOne",
            Self::ReferencesMany => "referencesMany",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deferred reference to a model, looked up by name in a [`ModelRegistry`]
/// only when the relation is used. Models may therefore reference each other
/// regardless of registration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeResolver {
    model: String,
}

impl TypeResolver {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Look the referenced model up in `registry`
    pub fn resolve(&self, registry: &ModelRegistry) -> Option<Arc<ModelDefinition>> {
        registry.get(&self.model)
    }
}

impl From<&str> for TypeResolver {
    fn from(model: &str) -> Self {
        Self::new(model)
    }
}

impl From<String> for TypeResolver {
    fn from(model: String) -> Self {
        Self::new(model)
    }
}

/// Fields shared by every relation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationBase {
    /// Property name of the relation on the source model
    pub name: String,
    /// Name of the source model
    #[serde(default)]
    pub source: String,
    pub target: Option<TypeResolver>,
    pub key_from: Option<String>,
    pub key_to: Option<String>,
}

impl RelationBase {
    pub fn new(source: &str, name: &str, target: impl Into<TypeResolver>) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            target: Some(target.into()),
            key_from: None,
            key_to: None,
        }
    }
}

/// Join model of a hasMany-through relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughDefinition {
    pub model: Option<TypeResolver>,
    /// Join model property pointing at the source
    pub key_from: Option<String>,
    /// Join model property pointing at the target
    pub key_to: Option<String>,
}

impl ThroughDefinition {
    pub fn new(model: impl Into<TypeResolver>) -> Self {
        Self {
            model: Some(model.into()),
            key_from: None,
            key_to: None,
        }
    }

    pub fn with_key_from(mut self, key: &str) -> Self {
        self.key_from = Some(key.to_string());
        self
    }

    pub fn with_key_to(mut self, key: &str) -> Self {
        self.key_to = Some(key.to_string());
        self
    }
}

/// Relation metadata as declared on a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelationDefinition {
    HasMany {
        #[serde(flatten)]
        base: RelationBase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        through: Option<ThroughDefinition>,
    },
    HasOne(RelationBase),
    BelongsTo(RelationBase),
    EmbedsOne(RelationBase),
    EmbedsMany(RelationBase),
    ReferencesOne(RelationBase),
    ReferencesMany(RelationBase),
}

impl RelationDefinition {
    pub fn has_many(source: &str, name: &str, target: &str) -> Self {
        Self::HasMany {
            base: RelationBase::new(source, name, target),
            through: None,
        }
    }

    pub fn has_many_through(source: &str, name: &str, target: &str, through: ThroughDefinition) -> Self {
        Self::HasMany {
            base: RelationBase::new(source, name, target),
            through: Some(through),
        }
    }

    pub fn has_one(source: &str, name: &str, target: &str) -> Self {
        Self::HasOne(RelationBase::new(source, name, target))
    }

    pub fn belongs_to(source: &str, name: &str, target: &str) -> Self {
        Self::BelongsTo(RelationBase::new(source, name, target))
    }

    pub fn embeds_one(source: &str, name: &str, target: &str) -> Self {
        Self::EmbedsOne(RelationBase::new(source, name, target))
    }

    pub fn embeds_many(source: &str, name: &str, target: &str) -> Self {
        Self::EmbedsMany(RelationBase::new(source, name, target))
    }

    pub fn references_one(source: &str, name: &str, target: &str) -> Self {
        Self::ReferencesOne(RelationBase::new(source, name, target))
    }

    pub fn references_many(source: &str, name: &str, target: &str) -> Self {
        Self::ReferencesMany(RelationBase::new(source, name, target))
    }

    /// Set the source-side key
    pub fn with_key_from(mut self, key: &str) -> Self {
        self.base_mut().key_from = Some(key.to_string());
        self
    }

    /// Set the target-side key
    pub fn with_key_to(mut self, key: &str) -> Self {
        self.base_mut().key_to = Some(key.to_string());
        self
    }

    /// Replace the target reference; `None` models a missing resolver
    pub fn with_target(mut self, target: Option<TypeResolver>) -> Self {
        self.base_mut().target = target;
        self
    }

    pub fn relation_type(&self) -> RelationType {
        match self {
            Self::HasMany { .. } => RelationType::HasMany,
            Self::HasOne(_) => RelationType::HasOne,
            Self::BelongsTo(_) => RelationType::BelongsTo,
            Self::EmbedsOne(_) => RelationType::EmbedsOne,
            Self::EmbedsMany(_) => RelationType::EmbedsMany,
            Self::ReferencesOne(_) => RelationType::ReferencesOne,
            Self::ReferencesMany(_) => RelationType::ReferencesMany,
        }
    }

    pub fn targets_many(&self) -> bool {
        self.relation_type().targets_many()
    }

    pub fn base(&self) -> &RelationBase {
        match self {
            Self::HasMany { base, .. } => base,
            Self::HasOne(base)
            | Self::BelongsTo(base)
            | Self::EmbedsOne(base)
            | Self::EmbedsMany(base)
            | Self::ReferencesOne(base)
            | Self::ReferencesMany(base) => base,
        }
    }

    pub fn base_mut(&mut self) -> &mut RelationBase {
        match self {
            Self::HasMany { base, .. } => base,
            Self::HasOne(base)
            | Self::BelongsTo(base)
            | Self::EmbedsOne(base)
            | Self::EmbedsMany(base)
            | Self::ReferencesOne(base)
            | Self::ReferencesMany(base) => base,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn source(&self) -> &str {
        &self.base().source
    }

    pub fn through(&self) -> Option<&ThroughDefinition> {
        match self {
            Self::HasMany { through, .. } => through.as_ref(),
            _ => None,
        }
    }

    /// Build the error reported for this definition
    pub fn invalid(&self, reason: impl Into<String>) -> InvalidRelationError {
        InvalidRelationError::new(self.relation_type(), self.source(), self.name(), reason)
    }

    /// Look up the source and target models shared by every resolver
    pub(crate) fn resolve_models(
        &self,
        registry: &ModelRegistry,
    ) -> Result<(Arc<ModelDefinition>, Arc<ModelDefinition>), InvalidRelationError> {
        let base = self.base();
        let target = base
            .target
            .as_ref()
            .ok_or_else(|| self.invalid("target must be a type resolver"))?;

        let source = if base.source.is_empty() {
            None
        } else {
            registry.get(&base.source)
        };
        let source = source.ok_or_else(|| self.invalid("source model must be defined"))?;

        let target_model = target.resolve(registry).ok_or_else(|| {
            self.invalid(format!("target model {} is not registered", target.model_name()))
        })?;

        Ok((source, target_model))
    }
}

/// Fully specified relation: both models are resolved and both keys are set
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRelation {
    pub relation_type: RelationType,
    pub name: String,
    pub source: Arc<ModelDefinition>,
    pub target: Arc<ModelDefinition>,
    pub key_from: String,
    pub key_to: String,
}

impl ResolvedRelation {
    fn to_base(&self) -> RelationBase {
        RelationBase {
            name: self.name.clone(),
            source: self.source.name.clone(),
            target: Some(TypeResolver::new(self.target.name.clone())),
            key_from: Some(self.key_from.clone()),
            key_to: Some(self.key_to.clone()),
        }
    }
}

macro_rules! resolved_relation {
    ($(#[$meta:meta])* $name:ident, $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub relation: ResolvedRelation,
        }

        impl $name {
            /// Turn the resolved descriptor back into a complete definition
            pub fn to_definition(&self) -> RelationDefinition {
                RelationDefinition::$variant(self.relation.to_base())
            }
        }

        impl Deref for $name {
            type Target = ResolvedRelation;

            fn deref(&self) -> &ResolvedRelation {
                &self.relation
            }
        }
    };
}

resolved_relation!(
    /// Resolved belongsTo: `key_from` lives on the source, `key_to` is the target primary key
    ResolvedBelongsTo,
    BelongsTo
);
resolved_relation!(
    /// Resolved hasOne: `key_from` is the source primary key, `key_to` lives on the target
    ResolvedHasOne,
    HasOne
);

/// Resolved hasMany: `key_from` is the source primary key, `key_to` lives on the target
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHasMany {
    pub relation: ResolvedRelation,
}

impl ResolvedHasMany {
    pub fn to_definition(&self) -> RelationDefinition {
        RelationDefinition::HasMany {
            base: self.relation.to_base(),
            through: None,
        }
    }
}

impl Deref for ResolvedHasMany {
    type Target = ResolvedRelation;

    fn deref(&self) -> &ResolvedRelation {
        &self.relation
    }
}

/// Resolved join model of a hasMany-through relation
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedThrough {
    pub model: Arc<ModelDefinition>,
    pub key_from: String,
    pub key_to: String,
}

/// Resolved hasMany-through: `key_to` is the target primary key
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHasManyThrough {
    pub relation: ResolvedRelation,
    pub through: ResolvedThrough,
}

impl ResolvedHasManyThrough {
    pub fn to_definition(&self) -> RelationDefinition {
        RelationDefinition::HasMany {
            base: self.relation.to_base(),
            through: Some(ThroughDefinition {
                model: Some(TypeResolver::new(self.through.model.name.clone())),
                key_from: Some(self.through.key_from.clone()),
                key_to: Some(self.through.key_to.clone()),
            }),
        }
    }
}

impl Deref for ResolvedHasManyThrough {
    type Target = ResolvedRelation;

    fn deref(&self) -> &ResolvedRelation {
        &self.relation
    }
}
