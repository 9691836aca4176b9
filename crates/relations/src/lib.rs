//! # elif-relations: Relation Engine for elif.rs models
//!
//! Turns declarative relation metadata (hasMany, hasOne, belongsTo and
//! hasMany-through) into:
//!
//! - resolved descriptors, with foreign keys inferred by convention and
//!   validated against the model definitions in a [`ModelRegistry`];
//! - constrained repositories and accessors that scope CRUD calls on a target
//!   repository to the rows related to one source;
//! - inclusion resolvers that eager-load related rows for a whole batch of
//!   source entities with one query per relation hop.
//!
//! Storage stays behind the [`EntityCrudRepository`] trait.

pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod relations;
pub mod repository;

#[cfg(test)]
mod testing;

// Re-export core traits and types
pub use config::*;
pub use error::*;
pub use model::*;
pub use query::*;
pub use relations::*;
pub use repository::*;
