//! HasMany Relation - one source row owns many target rows through a foreign key on the target

pub mod through;
pub mod through_repository;

pub use through::*;
pub use through_repository::*;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{InvalidRelationError, ModelResult};
use crate::model::entity::{Count, DataObject, Entity, Options};
use crate::model::registry::ModelRegistry;
use crate::query::constraint::{constrain_data_object, constrain_filter_with_data, constrain_where_with_data};
use crate::query::filter::{Filter, Inclusion, Where};
use crate::repository::RepositoryGetter;

use super::helpers::{
    collect_source_keys, create_constraint_from_source, find_by_foreign_keys_in_batches,
    flatten_targets_of_one_to_many_relation,
};
use super::inclusion::{reject_through_scope, to_values, InclusionResolver};
use super::metadata::{RelationDefinition, RelationType, ResolvedHasMany, ResolvedRelation};

/// Resolve the keys of a relation whose foreign key lives on the target (hasMany, hasOne).
///
/// `key_from` defaults to the source primary key, `key_to` to the inferred
/// `<source>Id` property, which the target must declare.
pub(crate) fn resolve_target_owned_keys(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
    expected: RelationType,
    expected_label: &str,
) -> Result<ResolvedRelation, InvalidRelationError> {
    if definition.relation_type() != expected {
        return Err(definition.invalid(format!("relation type must be {}", expected_label)));
    }

    let (source, target) = definition.resolve_models(registry)?;
    let base = definition.base();

    let key_from = match &base.key_from {
        Some(key) if source.has_property(key) => key.clone(),
        Some(key) => {
            return Err(definition.invalid(format!(
                "source model {} is missing definition of property {}",
                source.name, key
            )))
        }
        None => source
            .primary_key()
            .map(str::to_string)
            .ok_or_else(|| definition.invalid(format!("{} does not have any primary key (id property)", source.name)))?,
    };

    let key_to = match &base.key_to {
        Some(key) => key.clone(),
        None => registry.config().foreign_key_convention.foreign_key_for(&source.name),
    };
    if !target.has_property(&key_to) {
        return Err(definition.invalid(format!(
            "target model {} is missing definition of foreign key {}",
            target.name, key_to
        )));
    }

    tracing::debug!(
        relation = %definition.name(),
        source = %source.name,
        target = %target.name,
        key_from = %key_from,
        key_to = %key_to,
        "resolved {} relation",
        expected
    );

    Ok(ResolvedRelation {
        relation_type: expected,
        name: definition.name().to_string(),
        source,
        target,
        key_from,
        key_to,
    })
}

/// Resolve hasMany metadata. A `through` declaration is not looked at here;
/// through relations resolve with
/// [`resolve_has_many_through_metadata`](through::resolve_has_many_through_metadata).
pub fn resolve_has_many_metadata(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
) -> Result<ResolvedHasMany, InvalidRelationError> {
    let relation = resolve_target_owned_keys(definition, registry, RelationType::HasMany, "HasMany")?;
    Ok(ResolvedHasMany { relation })
}

/// Target repository scoped to the rows of one source
pub struct DefaultHasManyRepository<T: Entity> {
    target: RepositoryGetter<T>,
    constraint: DataObject,
}

impl<T: Entity> DefaultHasManyRepository<T> {
    pub fn new(target: RepositoryGetter<T>, constraint: DataObject) -> Self {
        Self { target, constraint }
    }

    pub fn constraint(&self) -> &DataObject {
        &self.constraint
    }

    /// Create a target row owned by the source
    pub async fn create(&self, data: DataObject, options: &Options) -> ModelResult<T> {
        let data = constrain_data_object(data, &self.constraint)?;
        let repository = self.target.get().await?;
        repository.create(data, options).await
    }

    /// Find the source's rows matching `filter`
    pub async fn find(&self, filter: Option<Filter>, options: &Options) -> ModelResult<Vec<T>> {
        let repository = self.target.get().await?;
        repository
            .find(Some(constrain_filter_with_data(filter, &self.constraint)), options)
            .await
    }

    /// Delete the source's rows matching `where_clause`
    pub async fn delete(&self, where_clause: Option<Where>, options: &Options) -> ModelResult<Count> {
        let repository = self.target.get().await?;
        repository
            .delete_all(constrain_where_with_data(where_clause, &self.constraint), options)
            .await
    }

    /// Update the source's rows matching `where_clause`
    pub async fn patch(&self, data: DataObject, where_clause: Option<Where>, options: &Options) -> ModelResult<Count> {
        let data = constrain_data_object(data, &self.constraint)?;
        let repository = self.target.get().await?;
        repository
            .update_all(data, constrain_where_with_data(where_clause, &self.constraint), options)
            .await
    }
}

/// Builds [`DefaultHasManyRepository`] instances for one relation
#[derive(Clone)]
pub struct HasManyRepositoryFactory<T: Entity> {
    meta: Arc<ResolvedHasMany>,
    target: RepositoryGetter<T>,
    max_inclusion_keys: Option<usize>,
}

impl<T: Entity> HasManyRepositoryFactory<T> {
    pub fn metadata(&self) -> &ResolvedHasMany {
        &self.meta
    }

    /// Repository of the rows owned by the source whose `key_from` is `fk_value`
    pub fn for_source(&self, fk_value: impl Into<Value>) -> DefaultHasManyRepository<T> {
        let constraint = create_constraint_from_source(&self.meta, fk_value);
        DefaultHasManyRepository::new(self.target.clone(), constraint)
    }

    pub fn inclusion_resolver(&self) -> HasManyInclusionResolver<T> {
        HasManyInclusionResolver {
            meta: self.meta.clone(),
            target: self.target.clone(),
            max_inclusion_keys: self.max_inclusion_keys,
        }
    }
}

/// Resolve `definition` and build its repository factory
pub fn create_has_many_repository_factory<T: Entity>(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
    target: RepositoryGetter<T>,
) -> Result<HasManyRepositoryFactory<T>, InvalidRelationError> {
    let meta = resolve_has_many_metadata(definition, registry)?;
    Ok(HasManyRepositoryFactory {
        meta: Arc::new(meta),
        target,
        max_inclusion_keys: registry.config().max_inclusion_keys,
    })
}

/// Loads the targets of many sources with one query
#[derive(Clone)]
pub struct HasManyInclusionResolver<T: Entity> {
    meta: Arc<ResolvedHasMany>,
    target: RepositoryGetter<T>,
    max_inclusion_keys: Option<usize>,
}

impl<T: Entity> HasManyInclusionResolver<T> {
    /// Targets of every entity, grouped per entity in input order
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

        Ok(flatten_targets_of_one_to_many_relation(&source_ids, found, &self.meta.key_to))
    }
}

#[async_trait]
impl<S: Entity, T: Entity> InclusionResolver<S> for HasManyInclusionResolver<T> {
    fn relation_name(&self) -> &str {
        &self.meta.name
    }

    async fn resolve(&self, entities: &[S], inclusion: &Inclusion, options: &Options) -> ModelResult<Vec<Value>> {
        to_values(self.fetch(entities, inclusion, options).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::definition::{ModelDefinition, PropertyType};
    use crate::testing::{getter, row, InMemoryRepository};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry
            .register(
                ModelDefinition::new("Customer")
                    .id_property("id", PropertyType::Number)
                    .has_many("orders", "Order"),
            )
            .unwrap();
        registry
            .register(
                ModelDefinition::new("Order")
                    .id_property("id", PropertyType::Number)
                    .property_of("customerId", PropertyType::Number)
                    .property_of("description", PropertyType::String),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_resolve_infers_keys() {
        let registry = registry();
        let definition = registry.relation("Customer", "orders").unwrap();

        let meta = resolve_has_many_metadata(&definition, &registry).unwrap();

        assert_eq!(meta.key_from, "id");
        assert_eq!(meta.key_to, "customerId");
        assert_eq!(meta.target.name, "Order");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let registry = registry();
        let definition = registry.relation("Customer", "orders").unwrap();

        let meta = resolve_has_many_metadata(&definition, &registry).unwrap();
        let again = resolve_has_many_metadata(&meta.to_definition(), &registry).unwrap();

        assert_eq!(meta, again);
    }

    #[test]
    fn test_resolve_rejects_wrong_type() {
        let registry = registry();
        let definition = RelationDefinition::has_one("Customer", "orders", "Order");

        let err = resolve_has_many_metadata(&definition, &registry).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Invalid hasOne definition for Customer#orders: relation type must be HasMany"
        );
    }

    #[test]
    fn test_resolve_rejects_missing_foreign_key() {
        let registry = registry();
        let definition = RelationDefinition::has_many("Customer", "orders", "Order").with_key_to("ownerId");

        let err = resolve_has_many_metadata(&definition, &registry).unwrap_err();

        assert_eq!(err.reason, "target model Order is missing definition of foreign key ownerId");
    }

    #[test]
    fn test_resolve_rejects_source_without_primary_key() {
        let registry = registry();
        registry
            .register(ModelDefinition::new("Guest").property_of("name", PropertyType::String))
            .unwrap();
        registry
            .register(ModelDefinition::new("Visit").property_of("guestId", PropertyType::Number))
            .unwrap();
        let definition = RelationDefinition::has_many("Guest", "visits", "Visit");

        let err = resolve_has_many_metadata(&definition, &registry).unwrap_err();

        assert_eq!(err.reason, "Guest does not have any primary key (id property)");
    }

    #[tokio::test]
    async fn test_scoped_repository_crud() {
        let registry = registry();
        let orders = InMemoryRepository::shared("Order", "id");
        orders.insert(json!({"id": 1, "customerId": 1, "description": "first"}));
        orders.insert(json!({"id": 2, "customerId": 2, "description": "other"}));

        let definition = registry.relation("Customer", "orders").unwrap();
        let factory = create_has_many_repository_factory(&definition, &registry, getter(&orders)).unwrap();
        let customer_orders = factory.for_source(1);
        let options = Options::new();

        let created = customer_orders
            .create(row(json!({"description": "second"})), &options)
            .await
            .unwrap();
        assert_eq!(created["customerId"], json!(1));

        let found = customer_orders.find(None, &options).await.unwrap();
        assert_eq!(found.len(), 2);

        let patched = customer_orders
            .patch(row(json!({"description": "updated"})), Some(Where::eq("id", 1)), &options)
            .await
            .unwrap();
        assert_eq!(patched.count, 1);

        let deleted = customer_orders.delete(None, &options).await.unwrap();
        assert_eq!(deleted.count, 2);
        assert_eq!(orders.rows().len(), 1);
        assert_eq!(orders.rows()[0]["description"], json!("other"));
    }

    #[tokio::test]
    async fn test_create_rejects_other_source_key() {
        let registry = registry();
        let orders = InMemoryRepository::shared("Order", "id");
        let definition = registry.relation("Customer", "orders").unwrap();
        let factory = create_has_many_repository_factory(&definition, &registry, getter(&orders)).unwrap();

        let err = factory
            .for_source(1)
            .create(row(json!({"customerId": 2})), &Options::new())
            .await
            .unwrap_err();

        assert_eq!(err, ModelError::InvalidArgument("property \"customerId\" cannot be changed".to_string()));
        assert!(orders.rows().is_empty());
    }

    #[tokio::test]
    async fn test_find_merges_caller_filter() {
        let registry = registry();
        let orders = InMemoryRepository::shared("Order", "id");
        orders.insert(json!({"id": 1, "customerId": 1, "description": "a"}));
        orders.insert(json!({"id": 2, "customerId": 1, "description": "b"}));
        orders.insert(json!({"id": 3, "customerId": 2, "description": "a"}));

        let definition = registry.relation("Customer", "orders").unwrap();
        let factory = create_has_many_repository_factory(&definition, &registry, getter(&orders)).unwrap();

        let found = factory
            .for_source(1)
            .find(Some(Filter::new().where_eq("description", "a")), &Options::new())
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], json!(1));
    }
}
