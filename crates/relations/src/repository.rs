//! Repository abstraction consumed by the relation engine
//!
//! The engine never talks to a store directly. It is handed repositories
//! (usually through a [`Getter`]) and forwards filters, where clauses and data
//! built from relation metadata.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ModelResult;
use crate::model::entity::{Count, DataObject, Entity, Options};
use crate::query::filter::{Filter, Where};

/// CRUD operations over the rows of one model
#[async_trait]
pub trait EntityCrudRepository<T: Entity>: Send + Sync {
    /// Find all rows matching `filter`
    async fn find(&self, filter: Option<Filter>, options: &Options) -> ModelResult<Vec<T>>;

    /// Find a row by primary key; a missing row is an error
    async fn find_by_id(&self, id: &Value, options: &Options) -> ModelResult<T>;

    /// Create a row from `data`
    async fn create(&self, data: DataObject, options: &Options) -> ModelResult<T>;

    /// Apply `data` to every row matching `where_clause`
    async fn update_all(&self, data: DataObject, where_clause: Option<Where>, options: &Options) -> ModelResult<Count>;

    /// Delete every row matching `where_clause`
    async fn delete_all(&self, where_clause: Option<Where>, options: &Options) -> ModelResult<Count>;
}

type GetterFuture<R> = Pin<Box<dyn Future<Output = ModelResult<Arc<R>>> + Send>>;
type GetterFn<R> = dyn Fn() -> GetterFuture<R> + Send + Sync;

/// Asynchronous, repeatable lookup of a shared value such as a repository.
///
/// Relation factories hold getters instead of repositories so that models
/// referring to each other can be wired in any order.
pub struct Getter<R: ?Sized> {
    inner: Arc<GetterFn<R>>,
}

impl<R: ?Sized + Send + Sync + 'static> Getter<R> {
    /// Create a getter from an async function
    pub fn new<F, Fut>(getter: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ModelResult<Arc<R>>> + Send + 'static,
    {
        let inner: Arc<GetterFn<R>> = Arc::new(move || -> GetterFuture<R> { Box::pin(getter()) });
        Self { inner }
    }

    /// Create a getter that always yields `value`
    pub fn fixed(value: Arc<R>) -> Self {
        Self::new(move || {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    pub async fn get(&self) -> ModelResult<Arc<R>> {
        (self.inner)().await
    }
}

impl<R: ?Sized> Clone for Getter<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: ?Sized> fmt::Debug for Getter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getter").finish_non_exhaustive()
    }
}

/// Getter of a type-erased repository for `T`
pub type RepositoryGetter<T> = Getter<dyn EntityCrudRepository<T>>;

/// Wrap a concrete repository in a [`RepositoryGetter`]
pub fn repository_getter<T, R>(repository: Arc<R>) -> RepositoryGetter<T>
where
    T: Entity,
    R: EntityCrudRepository<T> + 'static,
{
    let repository: Arc<dyn EntityCrudRepository<T>> = repository;
    Getter::fixed(repository)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fixed_getter() {
        let getter: Getter<String> = Getter::fixed(Arc::new("repo".to_string()));
        assert_eq!(getter.get().await.unwrap().as_str(), "repo");
        assert_eq!(getter.clone().get().await.unwrap().as_str(), "repo");
    }

    #[tokio::test]
    async fn test_getter_is_evaluated_on_every_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let getter: Getter<usize> = Getter::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Arc::new(n)) }
        });

        assert_eq!(*getter.get().await.unwrap(), 0);
        assert_eq!(*getter.get().await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_getter_error_is_returned_as_is() {
        let getter: Getter<String> =
            Getter::new(|| async { Err(ModelError::Database("datasource offline".to_string())) });
        assert_eq!(
            getter.get().await.unwrap_err(),
            ModelError::Database("datasource offline".to_string())
        );
    }
}
