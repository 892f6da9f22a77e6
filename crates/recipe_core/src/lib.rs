//! Package recipe descriptors.
//!
//! Parses a declarative build recipe, resolves it against an explicit
//! environment and target platform, and renders the canonical form consumed
//! by external packaging tools.

pub mod env;
pub mod error;
pub mod logging;
pub mod model;
pub mod platform;
pub mod recipe;

pub use env::{Environment, ReferenceKind, VariableReference};
pub use error::{RecipeResult, ValidationError};
pub use logging::{default_log_level, init_logging, log_recipe_session, logging_status};
pub use model::descriptor::{
    derive_build_string, AboutMetadata, BuildInfo, PackageDescriptor, TestSpec,
};
pub use model::requirement::Requirement;
pub use platform::{Platform, PlatformPredicate};
pub use recipe::{load, render, ConstraintPolicy, LoadOptions, RecipeDocument, VariableUse};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
