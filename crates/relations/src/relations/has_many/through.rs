//! HasMany-through metadata resolution and join-model constraint helpers
//!
//! A through relation reaches its targets in two hops: join rows are selected
//! by their `through.key_from`, then targets by the `through.key_to` values of
//! those join rows.

use serde_json::Value;

use crate::error::{InvalidRelationError, ModelError, ModelResult};
use crate::model::entity::{key_value, DataObject, Entity};
use crate::model::registry::ModelRegistry;
use crate::query::filter::Where;
use crate::relations::helpers::deduplicate;
use crate::relations::metadata::{
    RelationDefinition, RelationType, ResolvedHasManyThrough, ResolvedRelation, ResolvedThrough,
};

/// Resolve hasMany-through metadata.
///
/// The target must have a primary key, which `key_to` defaults to. The join
/// model keys default to `<source>Id` and `<target>Id` and must be declared
/// on the join model; the join model itself needs no primary key.
pub fn resolve_has_many_through_metadata(
    definition: &RelationDefinition,
    registry: &ModelRegistry,
) -> Result<ResolvedHasManyThrough, InvalidRelationError> {
    if definition.relation_type() != RelationType::HasMany {
        return Err(definition.invalid("relation type must be HasMany"));
    }
    let through = definition
        .through()
        .ok_or_else(|| definition.invalid("through must be specified"))?;
    let through_resolver = through
        .model
        .as_ref()
        .ok_or_else(|| definition.invalid("through.model must be a type resolver"))?;

    let (source, target) = definition.resolve_models(registry)?;
    let through_model = through_resolver.resolve(registry).ok_or_else(|| {
        definition.invalid(format!("through model {} is not registered", through_resolver.model_name()))
    })?;

    let target_primary_key = target.primary_key().ok_or_else(|| {
        definition.invalid(format!(
            "target model {} does not have any primary key (id property)",
            target.name
        ))
    })?;

    let base = definition.base();
    let key_to = match &base.key_to {
        Some(key) if target.has_property(key) => key.clone(),
        Some(key) => {
            return Err(definition.invalid(format!(
                "target model {} is missing definition of property {}",
                target.name, key
            )))
        }
        None => target_primary_key.to_string(),
    };
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

    let convention = registry.config().foreign_key_convention;
    let through_key_from = through
        .key_from
        .clone()
        .unwrap_or_else(|| convention.foreign_key_for(&source.name));
    if !through_model.has_property(&through_key_from) {
        return Err(definition.invalid(format!(
            "through model {} is missing definition of source foreign key",
            through_model.name
        )));
    }
    let through_key_to = through
        .key_to
        .clone()
        .unwrap_or_else(|| convention.foreign_key_for(&target.name));
    if !through_model.has_property(&through_key_to) {
        return Err(definition.invalid(format!(
            "through model {} is missing definition of target foreign key",
            through_model.name
        )));
    }

    tracing::debug!(
        relation = %definition.name(),
        source = %source.name,
        target = %target.name,
        through = %through_model.name,
        key_from = %key_from,
        key_to = %key_to,
        through_key_from = %through_key_from,
        through_key_to = %through_key_to,
        "resolved hasMany-through relation"
    );

    Ok(ResolvedHasManyThrough {
        relation: ResolvedRelation {
            relation_type: RelationType::HasMany,
            name: definition.name().to_string(),
            source,
            target,
            key_from,
            key_to,
        },
        through: ResolvedThrough {
            model: through_model,
            key_from: through_key_from,
            key_to: through_key_to,
        },
    })
}

/// `{through.key_from: fk_value}`, selecting the join rows of one source
pub fn create_through_constraint_from_source(meta: &ResolvedHasManyThrough, fk_value: impl Into<Value>) -> DataObject {
    let mut constraint = DataObject::new();
    constraint.insert(meta.through.key_from.clone(), fk_value.into());
    constraint
}

/// Distinct target keys referenced by `through_instances`, in first-occurrence order
pub fn get_target_keys_from_through_models<J: Entity>(meta: &ResolvedHasManyThrough, through_instances: &[J]) -> Vec<Value> {
    deduplicate(
        through_instances
            .iter()
            .filter_map(|through| key_value(through, &meta.through.key_to)),
    )
}

/// Where clause selecting the targets referenced by `through_instances`.
///
/// A single distinct key yields an equality, several an `inq`.
pub fn create_target_constraint_from_through<J: Entity>(meta: &ResolvedHasManyThrough, through_instances: &[J]) -> Where {
    Where::eq_or_inq(&meta.key_to, get_target_keys_from_through_models(meta, through_instances))
}

/// Distinct `key_to` values of already fetched targets
pub fn get_target_ids_from_target_models<T: Entity>(meta: &ResolvedHasManyThrough, targets: &[T]) -> Vec<Value> {
    deduplicate(targets.iter().filter_map(|target| key_value(target, &meta.key_to)))
}

/// Where clause selecting the join rows that point at `fk_values`.
///
/// An empty list is rejected: the resulting query would match every join row.
pub fn create_through_constraint_from_target(meta: &ResolvedHasManyThrough, fk_values: Vec<Value>) -> ModelResult<Where> {
    if fk_values.is_empty() {
        return Err(ModelError::invalid_argument("\"fkValue\" must be provided"));
    }
    Ok(Where::eq_or_inq(&meta.through.key_to, fk_values))
}

/// Join row keys linking the source `source_key` to the target `target_key`
pub fn create_through_fk_constraint_from_source(
    meta: &ResolvedHasManyThrough,
    source_key: Value,
    target_key: Value,
) -> DataObject {
    let mut constraint = DataObject::new();
    constraint.insert(meta.through.key_from.clone(), source_key);
    constraint.insert(meta.through.key_to.clone(), target_key);
    constraint
}
