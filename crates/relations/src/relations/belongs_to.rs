//! BelongsTo Relation - the source row holds the foreign key of its target

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{InvalidRelationError, ModelResult};
use crate::model::entity::{key_value, DataObject, Entity, Options};
use crate::model::registry::ModelRegistry;
use crate::query::constraint::constrain_filter_with_data;
use crate::query::filter::Inclusion;
use crate::repository::RepositoryGetter;

use super::helpers::{
    collect_foreign_keys, create_constraint_from_source, find_by_foreign_keys_in_batches,
    flatten_targets_of_one_to_one_relation, is_empty_key,
};
use super::inclusion::{reject_through_scope, to_values, InclusionResolver};
use super::metadata::{RelationDefinition, RelationType, ResolvedBelongsTo, ResolvedRelation};

/// Resolve belongsTo metadata.
///
/// `key_from` is kept when the source declares it, otherwise it is inferred
/// from the target name (`Customer` -> `customerId`). `key_to` is kept when
/// the target declares it, otherwise it is the target primary key.
pub fn resolve_belongs_to_metadata(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
) -> Result<ResolvedBelongsTo, InvalidRelationError> {
    if definition.relation_type() != RelationType::BelongsTo {
        return Err(definition.invalid("relation type must be BelongsTo"));
    }

    let (source, target) = definition.resolve_models(registry)?;
    let base = definition.base();

    let key_from = match &base.key_from {
        Some(key) if source.has_property(key) => key.clone(),
        _ => registry.config().foreign_key_convention.foreign_key_for(&target.name),
    };
    if !source.has_property(&key_from) {
        return Err(definition.invalid(format!(
            "source model {} is missing definition of foreign key {}",
            source.name, key_from
        )));
    }

    let key_to = match &base.key_to {
        Some(key) if target.has_property(key) => key.clone(),
        _ => target
            .primary_key()
            .map(str::to_string)
            .ok_or_else(|| definition.invalid(format!("{} does not have any primary key (id property)", target.name)))?,
    };

    tracing::debug!(
        relation = %definition.name(),
        source = %source.name,
        target = %target.name,
        key_from = %key_from,
        key_to = %key_to,
        "resolved belongsTo relation"
    );

    Ok(ResolvedBelongsTo {
        relation: ResolvedRelation {
            relation_type: RelationType::BelongsTo,
            name: definition.name().to_string(),
            source,
            target,
            key_from,
            key_to,
        },
    })
}

/// Target repository scoped to the row one source points at
pub struct DefaultBelongsToRepository<T: Entity> {
    target: RepositoryGetter<T>,
    constraint: DataObject,
}

impl<T: Entity> DefaultBelongsToRepository<T> {
    pub fn new(target: RepositoryGetter<T>, constraint: DataObject) -> Self {
        Self { target, constraint }
    }

    /// The target row, `None` when it does not exist
    pub async fn get(&self, options: &Options) -> ModelResult<Option<T>> {
        let repository = self.target.get().await?;
        let filter = constrain_filter_with_data(None, &self.constraint).limit(1);
        let mut found = repository.find(Some(filter), options).await?;
        Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
    }
}

/// Reads the target of a belongsTo relation for a given source
#[derive(Clone)]
pub struct BelongsToAccessor<S: Entity, T: Entity> {
    meta: Arc<ResolvedBelongsTo>,
    target: RepositoryGetter<T>,
    source: RepositoryGetter<S>,
    max_inclusion_keys: Option<usize>,
}

impl<S: Entity, T: Entity> BelongsToAccessor<S, T> {
    pub fn metadata(&self) -> &ResolvedBelongsTo {
        &self.meta
    }

    /// Target of the source row with id `source_id`.
    ///
    /// The source row is loaded to read its current foreign key, so a stale
    /// key held by the caller is never used. A missing source row is an error;
    /// a source without a foreign key yields `None`.
    pub async fn get(&self, source_id: &Value, options: &Options) -> ModelResult<Option<T>> {
        let source_repository = self.source.get().await?;
        let source = source_repository.find_by_id(source_id, options).await?;

        match key_value(&source, &self.meta.key_from) {
            Some(foreign_key) => self.get_by_foreign_key(foreign_key, options).await,
            None => Ok(None),
        }
    }

    /// Target whose primary key is `foreign_key`, skipping the source lookup
    pub async fn get_by_foreign_key(&self, foreign_key: impl Into<Value>, options: &Options) -> ModelResult<Option<T>> {
        let foreign_key = foreign_key.into();
        if is_empty_key(&foreign_key) {
            tracing::trace!(relation = %self.meta.name, "empty foreign key, no target");
            return Ok(None);
        }

        let constraint = create_constraint_from_source(&self.meta, foreign_key);
        DefaultBelongsToRepository::new(self.target.clone(), constraint)
            .get(options)
            .await
    }

    pub fn inclusion_resolver(&self) -> BelongsToInclusionResolver<T> {
        BelongsToInclusionResolver {
            meta: self.meta.clone(),
            target: self.target.clone(),
            max_inclusion_keys: self.max_inclusion_keys,
        }
    }
}

/// Resolve `definition` and build its accessor
pub fn create_belongs_to_accessor<S: Entity, T: Entity>(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
    target: RepositoryGetter<T>,
    source: RepositoryGetter<S>,
) -> Result<BelongsToAccessor<S, T>, InvalidRelationError> {
    let meta = resolve_belongs_to_metadata(definition, registry)?;
    Ok(BelongsToAccessor {
        meta: Arc::new(meta),
        target,
        source,
        max_inclusion_keys: registry.config().max_inclusion_keys,
    })
}

#[derive(Clone)]
pub struct BelongsToInclusionResolver<T: Entity> {
    meta: Arc<ResolvedBelongsTo>,
    target: RepositoryGetter<T>,
    max_inclusion_keys: Option<usize>,
}

impl<T: Entity> BelongsToInclusionResolver<T> {
    /// The target of every entity, positionally aligned with `entities`.
    /// Entities without a foreign key get `None` and add nothing to the query.
    pub async fn fetch<S: Entity>(
        &self,
        entities: &[S],
        inclusion: &Inclusion,
        options: &Options,
    ) -> ModelResult<Vec<Option<T>>> {
        reject_through_scope(inclusion)?;
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let (source_ids, keys) = collect_foreign_keys(entities, &self.meta.key_from);
        let repository = self.target.get().await?;
        let found = find_by_foreign_keys_in_batches(
            repository.as_ref(),
            &self.meta.key_to,
            keys,
            self.max_inclusion_keys,
            inclusion.scope.as_ref(),
            options,
        )
        .await?;

        Ok(flatten_targets_of_one_to_one_relation(&source_ids, found, &self.meta.key_to))
    }
}

#[async_trait]
impl<S: Entity, T: Entity> InclusionResolver<S> for BelongsToInclusionResolver<T> {
    fn relation_name(&self) -> &str {
        &self.meta.name
    }

    async fn resolve(&self, entities: &[S], inclusion: &Inclusion, options: &Options) -> ModelResult<Vec<Value>> {
        to_values(self.fetch(entities, inclusion, options).await?)
    }
}
