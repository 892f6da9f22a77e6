//! Resolved package descriptor.
//!
//! # Responsibility
//! - Hold the fully resolved build/host/run/test/about contract.
//! - Re-check descriptor invariants after programmatic mutation.
//!
//! # Invariants
//! - String fields hold resolved values verbatim; a `${` inside one is data,
//!   not a reference, and is escaped on render.
//! - `name`, `version` and `source_path` are non-empty.
//! - `build_requirements` holds each spec at most once.
//! - `build.string` is derived from `build.tag` and `build.interpreter_version`.
//!
//! # See also
//! - `crate::recipe` for the unresolved form and the load/render pair.

use crate::env::Environment;
use crate::error::{RecipeResult, ValidationError};
use crate::model::requirement::Requirement;
use crate::recipe::{self, LoadOptions};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Build number, variant tag and the derived build string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub number: u32,
    /// Variant label, e.g. `cpu`.
    pub tag: String,
    /// Interpreter the package is built against, e.g. `3.8`.
    pub interpreter_version: String,
    /// Derived label, e.g. `py38_cpu`.
    pub string: String,
}

impl BuildInfo {
    pub fn new(number: u32, tag: impl Into<String>, interpreter_version: impl Into<String>) -> Self {
        let tag = tag.into();
        let interpreter_version = interpreter_version.into();
        let string = derive_build_string(&tag, &interpreter_version);
        Self {
            number,
            tag,
            interpreter_version,
            string,
        }
    }
}

/// Combines a build tag with the interpreter's major and minor version.
///
/// `("cpu", "3.8")` gives `py38_cpu`; `("", "3.10.4")` gives `py310`.
pub fn derive_build_string(tag: &str, interpreter_version: &str) -> String {
    let digits: String = interpreter_version
        .trim()
        .split('.')
        .take(2)
        .collect::<Vec<_>>()
        .concat();
    let tag = tag.trim();
    if tag.is_empty() {
        format!("py{digits}")
    } else {
        format!("py{digits}_{tag}")
    }
}

/// Post-build smoke test declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSpec {
    /// Importable module names.
    pub imports: BTreeSet<String>,
    /// Source directories shipped with the test environment.
    pub source_files: Vec<String>,
    /// Test-only dependencies.
    pub requires: BTreeSet<String>,
}

/// Metadata attached to the final distributable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AboutMetadata {
    pub home: String,
    pub license: String,
    pub license_file: String,
    pub summary: String,
}

/// Fully resolved package recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    pub source_path: PathBuf,
    pub build: BuildInfo,
    /// Entries applicable to the target platform, in recipe order.
    pub build_requirements: Vec<Requirement>,
    pub host_requirements: BTreeSet<String>,
    pub run_requirements: BTreeSet<String>,
    pub test: TestSpec,
    pub about: AboutMetadata,
}

impl PackageDescriptor {
    /// Parses and resolves `recipe_source`. See [`recipe::load`].
    pub fn load(
        recipe_source: &str,
        environment: &Environment,
        options: &LoadOptions,
    ) -> RecipeResult<Self> {
        recipe::load(recipe_source, environment, options)
    }

    /// Canonical JSON form. See [`recipe::render`].
    pub fn render(&self) -> RecipeResult<String> {
        recipe::render(self)
    }

    pub fn build_requirement_specs(&self) -> Vec<&str> {
        self.build_requirements.iter().map(Requirement::spec).collect()
    }

    /// Re-checks descriptor invariants without re-parsing.
    pub fn validate(&self) -> RecipeResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("package.name".to_string()));
        }
        if !is_valid_package_name(self.name.trim()) {
            return Err(ValidationError::InvalidName(self.name.clone()));
        }
        if self.version.trim().is_empty() {
            return Err(ValidationError::MissingField("package.version".to_string()));
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingField("source.path".to_string()));
        }
        if self.build.interpreter_version.trim().is_empty() {
            return Err(ValidationError::MissingField(
                "build.interpreter_version".to_string(),
            ));
        }
        let expected = derive_build_string(&self.build.tag, &self.build.interpreter_version);
        if self.build.string != expected {
            return Err(ValidationError::malformed(format!(
                "build.string `{}` does not match derived `{expected}`",
                self.build.string
            )));
        }

        let mut seen = BTreeSet::<&str>::new();
        for (index, requirement) in self.build_requirements.iter().enumerate() {
            let spec = requirement.spec();
            if spec.trim().is_empty() {
                return Err(ValidationError::malformed(format!(
                    "empty entry in requirements.build[{index}]"
                )));
            }
            if !seen.insert(spec) {
                return Err(ValidationError::DuplicateRequirement(spec.to_string()));
            }
        }

        require_non_empty_entries(&self.host_requirements, "requirements.host")?;
        require_non_empty_entries(&self.run_requirements, "requirements.run")?;
        require_non_empty_entries(&self.test.imports, "test.imports")?;
        require_non_empty_entries(&self.test.source_files, "test.source_files")?;
        require_non_empty_entries(&self.test.requires, "test.requires")?;
        Ok(())
    }
}

fn require_non_empty_entries<'a>(
    entries: impl IntoIterator<Item = &'a String>,
    section: &str,
) -> RecipeResult<()> {
    if entries.into_iter().any(|entry| entry.trim().is_empty()) {
        return Err(ValidationError::malformed(format!("empty entry in {section}")));
    }
    Ok(())
}

/// Package index identifier: lowercase ASCII, digits and single `._-`
/// separators, starting with a letter or digit.
pub fn is_valid_package_name(value: &str) -> bool {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }

    let mut prev_separator = false;
    for c in chars {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            prev_separator = false;
            continue;
        }
        if c == '.' || c == '_' || c == '-' {
            if prev_separator {
                return false;
            }
            prev_separator = true;
            continue;
        }
        return false;
    }
    !prev_separator
}
