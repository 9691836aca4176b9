//! Inclusion - eager loading of related rows for a batch of source entities
//!
//! Every relation factory hands out a typed inclusion resolver. The query
//! layer works with them through the object-safe [`InclusionResolver`] trait,
//! keyed by relation name in an [`InclusionResolverRegistry`].

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::model::entity::{DataObject, Entity, Options};
use crate::query::filter::Inclusion;

/// Batch loader of one relation for source entities of type `S`
#[async_trait]
pub trait InclusionResolver<S: Entity>: Send + Sync {
    /// Name of the relation property this resolver fills in
    fn relation_name(&self) -> &str;

    /// Fetch the related rows of `entities`.
    ///
    /// Returns exactly one value per entity, in input order: `null` or an
    /// object for one-to-one relations, an array for one-to-many relations.
    async fn resolve(&self, entities: &[S], inclusion: &Inclusion, options: &Options) -> ModelResult<Vec<Value>>;
}

/// Reject a join-model scope, which no resolver applies
pub(crate) fn reject_through_scope(inclusion: &Inclusion) -> ModelResult<()> {
    if inclusion.through_scope.is_some() {
        return Err(ModelError::invalid_argument(format!(
            "throughScope is not supported when including \"{}\"",
            inclusion.relation
        )));
    }
    Ok(())
}

/// Serialize typed inclusion results, one value per source entity
pub(crate) fn to_values<R: serde::Serialize>(results: Vec<R>) -> ModelResult<Vec<Value>> {
    results
        .into_iter()
        .map(|result| serde_json::to_value(result).map_err(ModelError::from))
        .collect()
}

/// Relation name to inclusion resolver mapping of one source repository
pub struct InclusionResolverRegistry<S: Entity> {
    resolvers: DashMap<String, Arc<dyn InclusionResolver<S>>>,
}

impl<S: Entity> Default for InclusionResolverRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Entity> InclusionResolverRegistry<S> {
    pub fn new() -> Self {
        Self {
            resolvers: DashMap::new(),
        }
    }

    /// Register `resolver` under its relation name, replacing any previous one
    pub fn register<R>(&self, resolver: R)
    where
        R: InclusionResolver<S> + 'static,
    {
        let name = resolver.relation_name().to_string();
        tracing::debug!(relation = %name, "registered inclusion resolver");
        self.resolvers.insert(name, Arc::new(resolver));
    }

    pub fn get(&self, relation: &str) -> Option<Arc<dyn InclusionResolver<S>>> {
        self.resolvers.get(relation).map(|entry| entry.value().clone())
    }

    pub fn has(&self, relation: &str) -> bool {
        self.resolvers.contains_key(relation)
    }

    /// Registered relation names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resolvers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Serialize `entities` and attach every requested relation under its name.
    ///
    /// Each inclusion costs the queries of one resolver call, however many
    /// entities are given. Unknown relation names are rejected before any fetch.
    pub async fn resolve(
        &self,
        entities: &[S],
        inclusions: &[Inclusion],
        options: &Options,
    ) -> ModelResult<Vec<DataObject>> {
        let mut resolvers = Vec::with_capacity(inclusions.len());
        for inclusion in inclusions {
            let resolver = self.get(&inclusion.relation).ok_or_else(|| {
                ModelError::invalid_argument(format!(
                    "relation \"{}\" has no inclusion resolver",
                    inclusion.relation
                ))
            })?;
            resolvers.push((inclusion, resolver));
        }

        let mut rows = entities
            .iter()
            .map(|entity| match serde_json::to_value(entity)? {
                Value::Object(row) => Ok(row),
                other => Err(ModelError::Serialization(format!(
                    "entity serialized to {} instead of an object",
                    other
                ))),
            })
            .collect::<ModelResult<Vec<DataObject>>>()?;

        if entities.is_empty() {
            return Ok(rows);
        }

        for (inclusion, resolver) in resolvers {
            let related = resolver.resolve(entities, inclusion, options).await?;
            if related.len() != rows.len() {
                return Err(ModelError::Validation(format!(
                    "inclusion resolver for \"{}\" returned {} results for {} entities",
                    inclusion.relation,
                    related.len(),
                    rows.len()
                )));
            }
            for (row, value) in rows.iter_mut().zip(related) {
                row.insert(inclusion.relation.clone(), value);
            }
        }

        Ok(rows)
    }
}
