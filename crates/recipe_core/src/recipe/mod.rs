//! Recipe documents: parse, resolve, render.
//!
//! # Responsibility
//! - Own the single one-way transition from unresolved document to resolved
//!   descriptor.
//! - Provide the canonical serialized form used for diffing and auditing.
//!
//! # Invariants
//! - `load(render(d)) == d` for descriptors needing no further substitution,
//!   resolved for the same target platform.

pub mod document;
mod load;
mod render;

pub use document::{RecipeDocument, RequirementEntry, VariableUse};
pub use load::{load, ConstraintPolicy, LoadOptions};
pub use render::render;
