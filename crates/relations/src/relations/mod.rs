//! Relations Module - metadata resolution, constrained repositories and inclusion

pub mod metadata;
pub mod inference;
pub mod helpers;
pub mod inclusion;

pub mod belongs_to;
pub mod has_one;
pub mod has_many;


// Re-export metadata and helper types
pub use metadata::*;
pub use inference::*;
pub use helpers::*;
pub use inclusion::*;

// Re-export relation kinds
pub use belongs_to::*;
pub use has_one::*;
pub use has_many::*;
