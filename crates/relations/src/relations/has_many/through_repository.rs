//! HasMany-through repository, factory and inclusion resolver

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{InvalidRelationError, ModelError, ModelResult};
use crate::model::entity::{key_value, key_values, Count, DataObject, Entity, Options};
use crate::model::registry::ModelRegistry;
use crate::query::constraint::{constrain_data_object, constrain_filter, constrain_filter_with_data, constrain_where, constrain_where_with_data};
use crate::query::filter::{Filter, Inclusion, Where};
use crate::relations::helpers::{collect_source_keys, deduplicate, find_by_foreign_keys_in_batches, lookup_key};
use crate::relations::inclusion::{reject_through_scope, to_values, InclusionResolver};
use crate::relations::metadata::{RelationDefinition, ResolvedHasManyThrough};
use crate::repository::RepositoryGetter;

use super::through::{
    create_target_constraint_from_through, create_through_constraint_from_source,
    create_through_constraint_from_target, create_through_fk_constraint_from_source,
    get_target_ids_from_target_models, resolve_has_many_through_metadata,
};

/// Extra input for writes that also create a join row
#[derive(Debug, Clone, Default)]
pub struct ThroughCreateOptions {
    /// Additional properties of the join row
    pub through_data: DataObject,
    /// Options forwarded to the join-model repository
    pub through_options: Options,
}

/// Targets of one source, reached through join rows
pub struct DefaultHasManyThroughRepository<T: Entity, J: Entity> {
    meta: Arc<ResolvedHasManyThrough>,
    source_key: Value,
    target: RepositoryGetter<T>,
    through: RepositoryGetter<J>,
}

impl<T: Entity, J: Entity> DefaultHasManyThroughRepository<T, J> {
    pub fn new(
        meta: Arc<ResolvedHasManyThrough>,
        source_key: Value,
        target: RepositoryGetter<T>,
        through: RepositoryGetter<J>,
    ) -> Self {
        Self {
            meta,
            source_key,
            target,
            through,
        }
    }

    fn source_constraint(&self) -> DataObject {
        create_through_constraint_from_source(&self.meta, self.source_key.clone())
    }

    async fn find_through_rows(&self, options: &Options) -> ModelResult<Vec<J>> {
        let repository = self.through.get().await?;
        repository
            .find(Some(constrain_filter_with_data(None, &self.source_constraint())), options)
            .await
    }

    /// Create a target row and the join row linking it to the source
    pub async fn create(&self, data: DataObject, options: &Options, through: ThroughCreateOptions) -> ModelResult<T> {
        let target_repository = self.target.get().await?;
        let created = target_repository.create(data, options).await?;
        let target_key = key_value(&created, &self.meta.key_to).ok_or_else(|| {
            ModelError::Validation(format!(
                "created {} has no value for {}",
                self.meta.target.name, self.meta.key_to
            ))
        })?;

        self.link(&target_key, through).await?;
        Ok(created)
    }

    /// Targets linked to the source and matching `filter`
    pub async fn find(&self, filter: Option<Filter>, options: &Options) -> ModelResult<Vec<T>> {
        let through_rows = self.find_through_rows(options).await?;
        if through_rows.is_empty() {
            return Ok(Vec::new());
        }

        let constraint = create_target_constraint_from_through(&self.meta, &through_rows);
        let repository = self.target.get().await?;
        repository.find(Some(constrain_filter(filter, &constraint)), options).await
    }

    /// Delete linked targets matching `where_clause` together with their join rows
    pub async fn delete(&self, where_clause: Option<Where>, options: &Options) -> ModelResult<Count> {
        let through_rows = self.find_through_rows(options).await?;
        if through_rows.is_empty() {
            return Ok(Count::default());
        }

        let target_repository = self.target.get().await?;
        let through_repository = self.through.get().await?;
        let linked = create_target_constraint_from_through(&self.meta, &through_rows);

        match where_clause {
            None => {
                through_repository
                    .delete_all(Where::from_data(&self.source_constraint()), options)
                    .await?;
                target_repository.delete_all(Some(linked), options).await
            }
            Some(where_clause) => {
                let filter = Filter::new().with_where(constrain_where(Some(where_clause), &linked));
                let targets = target_repository.find(Some(filter), options).await?;
                let target_ids = get_target_ids_from_target_models(&self.meta, &targets);
                if target_ids.is_empty() {
                    return Ok(Count::default());
                }

                let through_where = create_through_constraint_from_target(&self.meta, target_ids.clone())?;
                through_repository
                    .delete_all(constrain_where_with_data(Some(through_where), &self.source_constraint()), options)
                    .await?;
                target_repository
                    .delete_all(Some(Where::eq_or_inq(&self.meta.key_to, target_ids)), options)
                    .await
            }
        }
    }

    /// Update linked targets matching `where_clause`
    pub async fn patch(&self, data: DataObject, where_clause: Option<Where>, options: &Options) -> ModelResult<Count> {
        let through_rows = self.find_through_rows(options).await?;
        if through_rows.is_empty() {
            return Ok(Count::default());
        }

        let linked = create_target_constraint_from_through(&self.meta, &through_rows);
        let repository = self.target.get().await?;
        repository
            .update_all(data, Some(constrain_where(where_clause, &linked)), options)
            .await
    }

    /// Link an existing target to the source by creating a join row
    pub async fn link(&self, target_key: &Value, through: ThroughCreateOptions) -> ModelResult<J> {
        let keys = create_through_fk_constraint_from_source(&self.meta, self.source_key.clone(), target_key.clone());
        let data = constrain_data_object(through.through_data, &keys)?;
        let repository = self.through.get().await?;
        repository.create(data, &through.through_options).await
    }

    /// Remove the join rows between the source and one target
    pub async fn unlink(&self, target_key: &Value, options: &Options) -> ModelResult<Count> {
        let target_where = create_through_constraint_from_target(&self.meta, vec![target_key.clone()])?;
        let repository = self.through.get().await?;
        repository
            .delete_all(constrain_where_with_data(Some(target_where), &self.source_constraint()), options)
            .await
    }

    /// Remove every join row of the source; targets are kept
    pub async fn unlink_all(&self, options: &Options) -> ModelResult<Count> {
        let repository = self.through.get().await?;
        repository
            .delete_all(Where::from_data(&self.source_constraint()), options)
            .await
    }
}

/// Builds [`DefaultHasManyThroughRepository`] instances for one relation
#[derive(Clone)]
pub struct HasManyThroughRepositoryFactory<T: Entity, J: Entity> {
    meta: Arc<ResolvedHasManyThrough>,
    target: RepositoryGetter<T>,
    through: RepositoryGetter<J>,
    max_inclusion_keys: Option<usize>,
}

impl<T: Entity, J: Entity> HasManyThroughRepositoryFactory<T, J> {
    pub fn metadata(&self) -> &ResolvedHasManyThrough {
        &self.meta
    }

    /// Repository of the targets linked to the source whose `key_from` is `fk_value`
    pub fn for_source(&self, fk_value: impl Into<Value>) -> DefaultHasManyThroughRepository<T, J> {
        DefaultHasManyThroughRepository::new(
            self.meta.clone(),
            fk_value.into(),
            self.target.clone(),
            self.through.clone(),
        )
    }

    pub fn inclusion_resolver(&self) -> HasManyThroughInclusionResolver<T, J> {
        HasManyThroughInclusionResolver {
            meta: self.meta.clone(),
            target: self.target.clone(),
            through: self.through.clone(),
            max_inclusion_keys: self.max_inclusion_keys,
        }
    }
}

pub fn create_has_many_through_repository_factory<T: Entity, J: Entity>(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
    target: RepositoryGetter<T>,
    through: RepositoryGetter<J>,
) -> Result<HasManyThroughRepositoryFactory<T, J>, InvalidRelationError> {
    let meta = resolve_has_many_through_metadata(definition, registry)?;
    Ok(HasManyThroughRepositoryFactory {
        meta: Arc::new(meta),
        target,
        through,
        max_inclusion_keys: registry.config().max_inclusion_keys,
    })
}

/// Loads the targets of many sources with one join-row query and one target query
#[derive(Clone)]
pub struct HasManyThroughInclusionResolver<T: Entity, J: Entity> {
    meta: Arc<ResolvedHasManyThrough>,
    target: RepositoryGetter<T>,
    through: RepositoryGetter<J>,
    max_inclusion_keys: Option<usize>,
}

impl<T: Entity, J: Entity> HasManyThroughInclusionResolver<T, J> {
    /// Targets of every entity, grouped per entity in input order.
    ///
    /// Within a group targets keep the order of the target query, so an
    /// `order` in the inclusion scope is honored. `through_scope` is rejected.
    pub async fn fetch<S: Entity>(
        &self,
        entities: &[S],
        inclusion: &Inclusion,
        options: &Options,
    ) -> ModelResult<Vec<Vec<T>>> {
        reject_through_scope(inclusion)?;
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let (source_ids, source_keys) = collect_source_keys(entities, &self.meta.key_from);
        let through_repository = self.through.get().await?;
        let through_rows = find_by_foreign_keys_in_batches(
            through_repository.as_ref(),
            &self.meta.through.key_from,
            source_keys,
            self.max_inclusion_keys,
            None,
            options,
        )
        .await?;

        // source key -> keys of the targets it is linked to
        let mut links: HashMap<String, HashSet<String>> = HashMap::new();
        let mut target_keys = Vec::new();
        for row in &through_rows {
            let fields = [self.meta.through.key_from.as_str(), self.meta.through.key_to.as_str()];
            let mut keys = key_values(row, &fields).into_iter();
            let (Some(Some(source_key)), Some(Some(target_key))) = (keys.next(), keys.next()) else {
                continue;
            };
            links
                .entry(lookup_key(&source_key))
                .or_default()
                .insert(lookup_key(&target_key));
            target_keys.push(target_key);
        }

        let target_repository = self.target.get().await?;
        let targets = find_by_foreign_keys_in_batches(
            target_repository.as_ref(),
            &self.meta.key_to,
            deduplicate(target_keys),
            self.max_inclusion_keys,
            inclusion.scope.as_ref(),
            options,
        )
        .await?;

        // target key -> positions in the target fetch
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, target) in targets.iter().enumerate() {
            if let Some(key) = key_value(target, &self.meta.key_to) {
                positions.entry(lookup_key(&key)).or_default().push(index);
            }
        }

        Ok(source_ids
            .iter()
            .map(|source_id| {
                let Some(linked) = source_id.as_ref().and_then(|id| links.get(&lookup_key(id))) else {
                    return Vec::new();
                };
                let mut indexes: Vec<usize> = linked
                    .iter()
                    .filter_map(|key| positions.get(key))
                    .flatten()
                    .copied()
                    .collect();
                indexes.sort_unstable();
                indexes.into_iter().map(|index| targets[index].clone()).collect()
            })
            .collect())
    }
}

#[async_trait]
impl<S: Entity, T: Entity, J: Entity> InclusionResolver<S> for HasManyThroughInclusionResolver<T, J> {
    fn relation_name(&self) -> &str {
        &self.meta.name
    }

    async fn resolve(&self, entities: &[S], inclusion: &Inclusion, options: &Options) -> ModelResult<Vec<Value>> {
        to_values(self.fetch(entities, inclusion, options).await?)
    }
}
