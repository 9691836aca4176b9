//! Constraint utilities - merge a relation's key constraint into caller input

use serde_json::Value;

use super::filter::{Filter, Where};
use crate::error::{ModelError, ModelResult};
use crate::model::entity::DataObject;

/// Merge `constraint` into the where clause of `filter`
pub fn constrain_filter(filter: Option<Filter>, constraint: &Where) -> Filter {
    let mut filter = filter.unwrap_or_default();
    filter.where_clause = Some(constrain_where(filter.where_clause.take(), constraint));
    filter
}

/// Combine `where_clause` with `constraint` so both must hold
pub fn constrain_where(where_clause: Option<Where>, constraint: &Where) -> Where {
    match where_clause {
        Some(existing) => existing.and(constraint.clone()),
        None => constraint.clone(),
    }
}

/// [`constrain_where`] for a `{key: value}` constraint; an empty constraint leaves `where_clause` as is
pub fn constrain_where_with_data(where_clause: Option<Where>, constraint: &DataObject) -> Option<Where> {
    match Where::from_data(constraint) {
        Some(constraint) => Some(constrain_where(where_clause, &constraint)),
        None => where_clause,
    }
}

/// [`constrain_filter`] for a `{key: value}` constraint
pub fn constrain_filter_with_data(filter: Option<Filter>, constraint: &DataObject) -> Filter {
    let mut filter = filter.unwrap_or_default();
    filter.where_clause = constrain_where_with_data(filter.where_clause.take(), constraint);
    filter
}

/// Apply the key/value pairs of `constraint` to `data`.
///
/// Fails when `data` already carries one of the constrained keys with a
/// different value; the related row cannot be moved through a scoped repository.
pub fn constrain_data_object(mut data: DataObject, constraint: &DataObject) -> ModelResult<DataObject> {
    for (key, value) in constraint {
        if let Some(existing) = data.get(key) {
            if !existing.is_null() && !same_key(existing, value) {
                return Err(ModelError::invalid_argument(format!(
                    "property \"{}\" cannot be changed",
                    key
                )));
            }
        }
        data.insert(key.clone(), value.clone());
    }
    Ok(data)
}

/// [`constrain_data_object`] applied to every element
pub fn constrain_data_objects(data: Vec<DataObject>, constraint: &DataObject) -> ModelResult<Vec<DataObject>> {
    data.into_iter()
        .map(|item| constrain_data_object(item, constraint))
        .collect()
}

/// Key values match when equal, or when their plain string forms are equal (`1` and `"1"`)
fn same_key(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    plain_string(left) == plain_string(right)
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
