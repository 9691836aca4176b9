//! Relation Helpers - key extraction, batched fetches and result alignment
//!
//! Everything here except the fetch functions is pure.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::ModelResult;
use crate::model::entity::{key_value, DataObject, Entity, Options};
use crate::query::constraint::constrain_filter;
use crate::query::filter::{Filter, Where};
use crate::repository::EntityCrudRepository;

use super::metadata::ResolvedRelation;

/// Canonical string form of a key value, used to hash JSON values.
/// `1` and `"1"` map to different keys.
pub fn lookup_key(value: &Value) -> String {
    value.to_string()
}

/// True for key values that do not reference anything: `null`, `false`, `0` and `""`
pub fn is_empty_key(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Remove duplicate values, keeping the first occurrence of each
pub fn deduplicate<I>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = Value>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(lookup_key(value)))
        .collect()
}

/// `{key_to: value}`, the constraint selecting the targets related to one source
pub fn create_constraint_from_source(meta: &ResolvedRelation, value: impl Into<Value>) -> DataObject {
    let mut constraint = DataObject::new();
    constraint.insert(meta.key_to.clone(), value.into());
    constraint
}

/// Fetch every row of `repository` whose `fk_field` is one of `fk_values`, in one query.
///
/// `scope` adds criteria of its own; its `limit`/`skip` apply to the whole
/// batch, not per key. An empty `fk_values` returns without querying.
pub async fn find_by_foreign_keys<T: Entity>(
    repository: &dyn EntityCrudRepository<T>,
    fk_field: &str,
    fk_values: Vec<Value>,
    scope: Option<&Filter>,
    options: &Options,
) -> ModelResult<Vec<T>> {
    if fk_values.is_empty() {
        tracing::trace!(fk_field, "no foreign key values, skipping fetch");
        return Ok(Vec::new());
    }

    let key_count = fk_values.len();
    let constraint = Where::eq_or_inq(fk_field, fk_values);
    let filter = constrain_filter(scope.cloned(), &constraint);
    let found = repository.find(Some(filter), options).await?;

    tracing::debug!(fk_field, keys = key_count, rows = found.len(), "fetched rows by foreign keys");
    Ok(found)
}

/// [`find_by_foreign_keys`] split into sequential queries of at most `batch_size` keys
pub async fn find_by_foreign_keys_in_batches<T: Entity>(
    repository: &dyn EntityCrudRepository<T>,
    fk_field: &str,
    fk_values: Vec<Value>,
    batch_size: Option<usize>,
    scope: Option<&Filter>,
    options: &Options,
) -> ModelResult<Vec<T>> {
    let batch_size = match batch_size {
        Some(size) if size > 0 && fk_values.len() > size => size,
        _ => return find_by_foreign_keys(repository, fk_field, fk_values, scope, options).await,
    };

    let mut found = Vec::new();
    for chunk in fk_values.chunks(batch_size) {
        found.extend(find_by_foreign_keys(repository, fk_field, chunk.to_vec(), scope, options).await?);
    }
    Ok(found)
}

/// Keys of `entities` for a batched fetch.
///
/// Returns one slot per entity (`None` when the key is `null` or absent) and
/// the distinct keys to query, in first-occurrence order. Any other value,
/// `0` included, is a key.
pub fn collect_source_keys<E: Entity>(entities: &[E], field: &str) -> (Vec<Option<Value>>, Vec<Value>) {
    collect_keys(entities, field, |_| true)
}

/// Like [`collect_source_keys`], but also treats empty foreign keys
/// ([`is_empty_key`]) as referencing nothing. Used where the key lives on the
/// source and points at the target.
pub fn collect_foreign_keys<E: Entity>(entities: &[E], field: &str) -> (Vec<Option<Value>>, Vec<Value>) {
    collect_keys(entities, field, |value| !is_empty_key(value))
}

fn collect_keys<E, F>(entities: &[E], field: &str, keep: F) -> (Vec<Option<Value>>, Vec<Value>)
where
    E: Entity,
    F: Fn(&Value) -> bool,
{
    let source_ids: Vec<Option<Value>> = entities
        .iter()
        .map(|entity| key_value(entity, field).filter(|value| keep(value)))
        .collect();
    let keys = deduplicate(source_ids.iter().flatten().cloned());
    (source_ids, keys)
}

/// Align targets of a one-to-one relation with `source_ids`.
///
/// The result has exactly one slot per source id: the first target whose
/// `target_key` equals the id, or `None`.
pub fn flatten_targets_of_one_to_one_relation<T: Entity>(
    source_ids: &[Option<Value>],
    targets: Vec<T>,
    target_key: &str,
) -> Vec<Option<T>> {
    let mut lookup: HashMap<String, T> = HashMap::new();
    for target in targets {
        if let Some(key) = key_value(&target, target_key) {
            lookup.entry(lookup_key(&key)).or_insert(target);
        }
    }

    source_ids
        .iter()
        .map(|id| id.as_ref().and_then(|id| lookup.get(&lookup_key(id)).cloned()))
        .collect()
}

/// Group targets of a one-to-many relation under `source_ids`.
///
/// Each slot holds every target whose `target_key` equals the source id, in
/// fetch order; sources without matches get an empty list.
pub fn flatten_targets_of_one_to_many_relation<T: Entity>(
    source_ids: &[Option<Value>],
    targets: Vec<T>,
    target_key: &str,
) -> Vec<Vec<T>> {
    let mut lookup: HashMap<String, Vec<T>> = HashMap::new();
    for target in targets {
        if let Some(key) = key_value(&target, target_key) {
            lookup.entry(lookup_key(&key)).or_default().push(target);
        }
    }

    source_ids
        .iter()
        .map(|id| {
            id.as_ref()
                .and_then(|id| lookup.get(&lookup_key(id)).cloned())
                .unwrap_or_default()
        })
        .collect()
}
