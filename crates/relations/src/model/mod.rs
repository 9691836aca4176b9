//! Model metadata consumed by the relation engine

pub mod definition;
pub mod entity;
pub mod registry;

pub use definition::*;
pub use entity::*;
pub use registry::*;
