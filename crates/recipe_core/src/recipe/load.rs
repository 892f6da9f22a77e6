//! Recipe resolution: substitution, platform gating and validation.
//!
//! # Invariants
//! - Resolution is a pure function of recipe text, environment and options.
//! - Gated build entries are evaluated before substitution, so an entry for
//!   another platform never fails on variables it alone references.
//! - The returned descriptor has passed `PackageDescriptor::validate()`.

use crate::env::{references, substitute, Environment};
use crate::error::{RecipeResult, ValidationError};
use crate::model::descriptor::{AboutMetadata, BuildInfo, PackageDescriptor, TestSpec};
use crate::model::requirement::{retain_first_by_spec, Requirement};
use crate::platform::{Platform, PlatformPredicate};
use crate::recipe::document::{RecipeDocument, RequirementEntry};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Behavior for `requirements.run` entries whose references leave them
/// without a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConstraintPolicy {
    /// Drop entries that expand to nothing.
    #[default]
    OmitWhenUnset,
    /// Fail with `UnresolvedSubstitution` when an optional reference is unset
    /// or an entry expands to nothing because its variable is empty.
    RequireSet,
}

/// Caller-supplied resolution settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub platform: Platform,
    pub run_constraints: ConstraintPolicy,
}

impl LoadOptions {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            run_constraints: ConstraintPolicy::default(),
        }
    }

    /// Builds options from a target identifier such as `linux` or `win-64`.
    pub fn for_target(identifier: &str) -> RecipeResult<Self> {
        Ok(Self::new(identifier.parse()?))
    }

    pub fn with_run_constraints(mut self, policy: ConstraintPolicy) -> Self {
        self.run_constraints = policy;
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new(Platform::host())
    }
}

/// Parses `recipe_source` and resolves it against `environment`.
///
/// # Errors
/// - `MalformedRecipe` when the document shape is wrong.
/// - `UnresolvedSubstitution` when a required variable is unset.
/// - `MissingField` / `InvalidName` when resolved identity fields are unusable.
pub fn load(
    recipe_source: &str,
    environment: &Environment,
    options: &LoadOptions,
) -> RecipeResult<PackageDescriptor> {
    let result = RecipeDocument::parse(recipe_source)
        .and_then(|document| document.resolve(environment, options));
    match &result {
        Ok(descriptor) => info!(
            "event=recipe_load module=recipe status=ok name={} version={} platform={} build_requirements={} host_requirements={} run_requirements={}",
            descriptor.name,
            descriptor.version,
            options.platform,
            descriptor.build_requirements.len(),
            descriptor.host_requirements.len(),
            descriptor.run_requirements.len()
        ),
        Err(err) => warn!(
            "event=recipe_load module=recipe status=error platform={} error={}",
            options.platform, err
        ),
    }
    result
}

impl RecipeDocument {
    /// Substitutes references and evaluates platform predicates.
    pub fn resolve(
        &self,
        environment: &Environment,
        options: &LoadOptions,
    ) -> RecipeResult<PackageDescriptor> {
        let resolver = Resolver {
            environment,
            options,
        };

        let build = BuildInfo::new(
            self.build.number,
            resolver.scalar(&self.build.tag, "build.tag")?,
            resolver.scalar(&self.build.interpreter_version, "build.interpreter_version")?,
        );

        let descriptor = PackageDescriptor {
            name: resolver.scalar(&self.package.name, "package.name")?,
            version: resolver.scalar(&self.package.version, "package.version")?,
            source_path: PathBuf::from(resolver.scalar(&self.source.path, "source.path")?),
            build,
            build_requirements: resolver.build_requirements(&self.requirements.build)?,
            host_requirements: resolver
                .entries(&self.requirements.host, "requirements.host", false)?
                .into_iter()
                .collect(),
            run_requirements: resolver
                .entries(
                    &self.requirements.run,
                    "requirements.run",
                    options.run_constraints == ConstraintPolicy::RequireSet,
                )?
                .into_iter()
                .collect(),
            test: TestSpec {
                imports: resolver
                    .entries(&self.test.imports, "test.imports", false)?
                    .into_iter()
                    .collect(),
                source_files: resolver.entries(
                    &self.test.source_files,
                    "test.source_files",
                    false,
                )?,
                requires: resolver
                    .entries(&self.test.requires, "test.requires", false)?
                    .into_iter()
                    .collect(),
            },
            about: AboutMetadata {
                home: resolver.scalar(&self.about.home, "about.home")?,
                license: resolver.scalar(&self.about.license, "about.license")?,
                license_file: resolver.scalar(&self.about.license_file, "about.license_file")?,
                summary: resolver.scalar(&self.about.summary, "about.summary")?,
            },
        };

        descriptor.validate()?;
        Ok(descriptor)
    }
}

struct Resolver<'a> {
    environment: &'a Environment,
    options: &'a LoadOptions,
}

impl Resolver<'_> {
    fn scalar(&self, template: &str, field: &str) -> RecipeResult<String> {
        Ok(substitute(template, field, self.environment)?.value)
    }

    fn build_requirements(&self, entries: &[RequirementEntry]) -> RecipeResult<Vec<Requirement>> {
        let mut resolved = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let field = format!("requirements.build[{index}]");
            if entry.spec().trim().is_empty() {
                return Err(ValidationError::malformed(format!("empty entry in {field}")));
            }

            let predicate = match entry {
                RequirementEntry::Plain(_) => None,
                RequirementEntry::Gated(gated) => {
                    Some(PlatformPredicate::parse(&gated.only_on, &field)?)
                }
            };
            if let Some(predicate) = &predicate {
                if !predicate.matches(self.options.platform) {
                    debug!(
                        "event=requirement_gated module=recipe field={} spec={} only_on={} platform={}",
                        field,
                        entry.spec(),
                        predicate,
                        self.options.platform
                    );
                    continue;
                }
            }

            let spec = substitute(entry.spec(), &field, self.environment)?
                .value
                .trim()
                .to_string();
            if spec.is_empty() {
                continue;
            }
            resolved.push(match predicate {
                None => Requirement::unconditional(spec),
                Some(predicate) => Requirement::gated(spec, predicate),
            });
        }
        Ok(retain_first_by_spec(resolved))
    }

    /// Resolves list entries, dropping those that expand to nothing.
    ///
    /// With `strict`, an unset optional reference is treated as required and
    /// an entry that expands to nothing is an error.
    fn entries(&self, entries: &[String], section: &str, strict: bool) -> RecipeResult<Vec<String>> {
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.trim().is_empty() {
                return Err(ValidationError::malformed(format!(
                    "empty entry in {section}"
                )));
            }
            let substitution = substitute(entry, section, self.environment)?;
            if strict {
                if let Some(variable) = substitution.unset_optional.into_iter().next() {
                    return Err(ValidationError::UnresolvedSubstitution {
                        variable,
                        field: section.to_string(),
                    });
                }
            }
            let value = substitution.value.trim();
            if value.is_empty() && strict {
                return Err(empty_expansion(entry, section)?);
            }
            if value.is_empty() {
                debug!(
                    "event=requirement_omitted module=recipe field={} template={}",
                    section, entry
                );
                continue;
            }
            resolved.push(value.to_string());
        }
        Ok(resolved)
    }
}

/// Error for a strict entry whose references all expanded to empty values.
fn empty_expansion(entry: &str, section: &str) -> RecipeResult<ValidationError> {
    let reference = references(entry, section)?.into_iter().next();
    Ok(match reference {
        Some(reference) => ValidationError::UnresolvedSubstitution {
            variable: reference.name,
            field: section.to_string(),
        },
        None => ValidationError::malformed(format!("empty entry in {section}")),
    })
}
