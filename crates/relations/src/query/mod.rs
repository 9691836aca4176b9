//! Filter, where clause and constraint values built by the relation engine

pub mod constraint;
pub mod filter;
pub mod types;

pub use constraint::*;
pub use filter::*;
pub use types::*;
