//! Recipe validation error taxonomy.
//!
//! # Invariants
//! - Every failure names the offending field or environment variable.
//! - Errors are all-or-nothing; no partially resolved descriptor escapes.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RecipeResult<T> = Result<T, ValidationError>;

/// Failure raised while loading or re-validating a package descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required literal field is absent or empty. Holds the dotted field path.
    MissingField(String),
    /// Required environment variable was unset at resolution time, or empty
    /// where a value is mandatory.
    UnresolvedSubstitution { variable: String, field: String },
    /// Structural failure: bad JSON, missing section, unknown key, bad token.
    MalformedRecipe(String),
    InvalidName(String),
    DuplicateRequirement(String),
    UnknownPlatform(String),
}

impl ValidationError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecipe(message.into())
    }

    /// Returns the environment variable this error names, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::UnresolvedSubstitution { variable, .. } => Some(variable.as_str()),
            _ => None,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "recipe field must not be empty: {field}"),
            Self::UnresolvedSubstitution { variable, field } => write!(
                f,
                "environment variable `{variable}` has no value (required by {field})"
            ),
            Self::MalformedRecipe(message) => write!(f, "malformed recipe: {message}"),
            Self::InvalidName(value) => write!(f, "package name is invalid: {value}"),
            Self::DuplicateRequirement(value) => {
                write!(f, "build requirement is duplicated: {value}")
            }
            Self::UnknownPlatform(value) => write!(
                f,
                "target platform is unknown: {value} (expected linux|osx|win)"
            ),
        }
    }
}

impl Error for ValidationError {}

impl From<serde_json::Error> for ValidationError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedRecipe(value.to_string())
    }
}
