//! Target platforms and build-entry platform predicates.

use crate::error::{RecipeResult, ValidationError};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Build target a recipe is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Linux,
    Osx,
    Win,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Osx => "osx",
            Self::Win => "win",
        }
    }

    /// Platform of the running process, falling back to `linux` for other unixes.
    pub fn host() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Win,
            "macos" => Self::Osx,
            _ => Self::Linux,
        }
    }

    pub fn is_unix(self) -> bool {
        matches!(self, Self::Linux | Self::Osx)
    }

    fn from_identifier(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linux" | "linux-64" | "linux64" => Some(Self::Linux),
            "osx" | "macos" | "darwin" | "osx-64" | "osx-arm64" => Some(Self::Osx),
            "win" | "windows" | "win32" | "win-64" | "win64" => Some(Self::Win),
            _ => None,
        }
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_identifier(value)
            .ok_or_else(|| ValidationError::UnknownPlatform(value.trim().to_string()))
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition restricting a build requirement to matching targets.
///
/// Grammar: `linux | osx | win | unix | not <predicate>`. Repeated `not`
/// prefixes cancel in pairs, so a parsed predicate nests at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformPredicate {
    Is(Platform),
    Unix,
    Not(Box<PlatformPredicate>),
}

impl PlatformPredicate {
    /// Parses a predicate; `field` is used to locate errors.
    pub fn parse(value: &str, field: &str) -> RecipeResult<Self> {
        let mut rest = value.trim();
        let mut negated = false;
        while let Some(inner) = rest.strip_prefix("not ") {
            rest = inner.trim_start();
            negated = !negated;
        }

        let base = if rest.eq_ignore_ascii_case("unix") {
            Self::Unix
        } else {
            Platform::from_identifier(rest)
                .map(Self::Is)
                .ok_or_else(|| {
                    ValidationError::malformed(format!(
                        "unknown platform predicate `{rest}` in {field}"
                    ))
                })?
        };
        Ok(if negated {
            Self::Not(Box::new(base))
        } else {
            base
        })
    }

    pub fn matches(&self, platform: Platform) -> bool {
        match self {
            Self::Is(expected) => *expected == platform,
            Self::Unix => platform.is_unix(),
            Self::Not(inner) => !inner.matches(platform),
        }
    }
}

impl Display for PlatformPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Is(platform) => write!(f, "{platform}"),
            Self::Unix => f.write_str("unix"),
            Self::Not(inner) => write!(f, "not {inner}"),
        }
    }
}
