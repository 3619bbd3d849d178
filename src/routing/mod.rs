//! Argument routing: which tokens go to which workspace.
//!
//! path      -> classify / resolve / normalize / relative_to
//! attribute -> WorkspaceRoot + attribute (first containing root wins)
//! assign    -> Assignment (per-workspace lists + unassigned bucket)
//! policy    -> PathPolicy / NoPathsPolicy (CLI value enums)
//!
pub mod assign;
pub mod attribute;
pub mod path;
pub mod policy;

pub use assign::{Assignment, UNASSIGNED, assign};
pub use policy::{NoPathsPolicy, PathPolicy};
