//! HasOne Relation - one source row owns at most one target row

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{InvalidRelationError, ModelResult};
use crate::model::entity::{Count, DataObject, Entity, Options};
use crate::model::registry::ModelRegistry;
use crate::query::constraint::{constrain_data_object, constrain_filter_with_data, constrain_where_with_data};
use crate::query::filter::{Filter, Inclusion};
use crate::repository::RepositoryGetter;

use super::has_many::resolve_target_owned_keys;
use super::helpers::{
    collect_source_keys, create_constraint_from_source, find_by_foreign_keys_in_batches,
    flatten_targets_of_one_to_one_relation,
};
use super::inclusion::{reject_through_scope, to_values, InclusionResolver};
use super::metadata::{RelationDefinition, RelationType, ResolvedHasOne};

/// Resolve hasOne metadata; keys follow the hasMany rules
pub fn resolve_has_one_metadata(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
) -> Result<ResolvedHasOne, InvalidRelationError> {
    let relation = resolve_target_owned_keys(definition, registry, RelationType::HasOne, "HasOne")?;
    Ok(ResolvedHasOne { relation })
}

/// Target repository scoped to the single row of one source
pub struct DefaultHasOneRepository<T: Entity> {
    target: RepositoryGetter<T>,
    constraint: DataObject,
}

impl<T: Entity> DefaultHasOneRepository<T> {
    pub fn new(target: RepositoryGetter<T>, constraint: DataObject) -> Self {
        Self { target, constraint }
    }

    pub fn constraint(&self) -> &DataObject {
        &self.constraint
    }

    /// The related row, `None` when the source has none
    pub async fn get(&self, filter: Option<Filter>, options: &Options) -> ModelResult<Option<T>> {
        let repository = self.target.get().await?;
        let filter = constrain_filter_with_data(filter, &self.constraint).limit(1);
        let mut found = repository.find(Some(filter), options).await?;
        Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
    }

    /// Create the related row
    pub async fn create(&self, data: DataObject, options: &Options) -> ModelResult<T> {
        let data = constrain_data_object(data, &self.constraint)?;
        let repository = self.target.get().await?;
        repository.create(data, options).await
    }

    /// Delete the related row
    pub async fn delete(&self, options: &Options) -> ModelResult<Count> {
        let repository = self.target.get().await?;
        repository
            .delete_all(constrain_where_with_data(None, &self.constraint), options)
            .await
    }

    /// Update the related row
    pub async fn patch(&self, data: DataObject, options: &Options) -> ModelResult<Count> {
        let data = constrain_data_object(data, &self.constraint)?;
        let repository = self.target.get().await?;
        repository
            .update_all(data, constrain_where_with_data(None, &self.constraint), options)
            .await
    }
}

/// Builds [`DefaultHasOneRepository`] instances for one relation
#[derive(Clone)]
pub struct HasOneRepositoryFactory<T: Entity> {
    meta: Arc<ResolvedHasOne>,
    target: RepositoryGetter<T>,
    max_inclusion_keys: Option<usize>,
}

impl<T: Entity> HasOneRepositoryFactory<T> {
    pub fn metadata(&self) -> &ResolvedHasOne {
        &self.meta
    }

    pub fn for_source(&self, fk_value: impl Into<Value>) -> DefaultHasOneRepository<T> {
        let constraint = create_constraint_from_source(&self.meta, fk_value);
        DefaultHasOneRepository::new(self.target.clone(), constraint)
    }

    pub fn inclusion_resolver(&self) -> HasOneInclusionResolver<T> {
        HasOneInclusionResolver {
            meta: self.meta.clone(),
            target: self.target.clone(),
            max_inclusion_keys: self.max_inclusion_keys,
        }
    }
}

pub fn create_has_one_repository_factory<T: Entity>(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
    target: RepositoryGetter<T>,
) -> Result<HasOneRepositoryFactory<T>, InvalidRelationError> {
    let meta = resolve_has_one_metadata(definition, registry)?;
    Ok(HasOneRepositoryFactory {
        meta: Arc::new(meta),
        target,
        max_inclusion_keys: registry.config().max_inclusion_keys,
    })
}

#[derive(Clone)]
pub struct HasOneInclusionResolver<T: Entity> {
    meta: Arc<ResolvedHasOne>,
    target: RepositoryGetter<T>,
    max_inclusion_keys: Option<usize>,
}

impl<T: Entity> HasOneInclusionResolver<T> {
    /// The related row of every entity, positionally aligned with `entities`
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

        let (source_ids, keys) = collect_source_keys(entities, &self.meta.key_from);
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
impl<S: Entity, T: Entity> InclusionResolver<S> for HasOneInclusionResolver<T> {
    fn relation_name(&self) -> &str {
        &self.meta.name
    }

    async fn resolve(&self, entities: &[S], inclusion: &Inclusion, options: &Options) -> ModelResult<Vec<Value>> {
        to_values(self.fetch(entities, inclusion, options).await?)
    }
}
