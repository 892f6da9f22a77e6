//! Build requirement entries.

use crate::platform::{Platform, PlatformPredicate};
use std::collections::BTreeSet;

/// One build requirement: a package or toolchain spec, optionally gated to
/// matching target platforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Unconditional(String),
    PlatformGated {
        spec: String,
        predicate: PlatformPredicate,
    },
}

impl Requirement {
    pub fn unconditional(spec: impl Into<String>) -> Self {
        Self::Unconditional(spec.into())
    }

    pub fn gated(spec: impl Into<String>, predicate: PlatformPredicate) -> Self {
        Self::PlatformGated {
            spec: spec.into(),
            predicate,
        }
    }

    pub fn spec(&self) -> &str {
        match self {
            Self::Unconditional(spec) | Self::PlatformGated { spec, .. } => spec,
        }
    }

    pub fn predicate(&self) -> Option<&PlatformPredicate> {
        match self {
            Self::Unconditional(_) => None,
            Self::PlatformGated { predicate, .. } => Some(predicate),
        }
    }

    /// Unconditional entries apply everywhere.
    pub fn applies_to(&self, platform: Platform) -> bool {
        self.predicate()
            .map_or(true, |predicate| predicate.matches(platform))
    }
}

/// Keeps the first entry for each spec, preserving order.
pub(crate) fn retain_first_by_spec(entries: Vec<Requirement>) -> Vec<Requirement> {
    let mut seen = BTreeSet::<String>::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.spec().to_string()))
        .collect()
}
