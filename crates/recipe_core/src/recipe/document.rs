//! Unresolved recipe document schema.
//!
//! The JSON layout shared by recipe input and rendered output. String values
//! may carry `${...}` references until resolved.

use crate::env::{references, ReferenceKind};
use crate::error::RecipeResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parsed, not yet substituted, recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeDocument {
    pub package: PackageSection,
    pub source: SourceSection,
    pub build: BuildSection,
    pub requirements: RequirementsSection,
    #[serde(default)]
    pub test: TestSection,
    pub about: AboutSection,
}

/// Missing `name`/`version` keys parse as empty so validation can name them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub interpreter_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementsSection {
    #[serde(default)]
    pub build: Vec<RequirementEntry>,
    #[serde(default)]
    pub host: Vec<String>,
    #[serde(default)]
    pub run: Vec<String>,
}

/// Build entry as written: a bare spec string, or a spec with a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementEntry {
    Plain(String),
    Gated(GatedEntry),
}

impl RequirementEntry {
    pub fn spec(&self) -> &str {
        match self {
            Self::Plain(spec) => spec,
            Self::Gated(entry) => &entry.spec,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatedEntry {
    pub spec: String,
    /// Platform predicate, e.g. `win` or `not osx`.
    pub only_on: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSection {
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub source_files: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AboutSection {
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub license_file: String,
    #[serde(default)]
    pub summary: String,
}

/// How one environment variable is used across a recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableUse {
    /// True when at least one reference has no optional marker or fallback.
    pub required: bool,
    /// Fallback of the first `${NAME:-fallback}` reference, if any.
    pub fallback: Option<String>,
    /// Dotted recipe paths referencing the variable, in document order.
    pub fields: Vec<String>,
}

impl RecipeDocument {
    pub fn parse(text: &str) -> RecipeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Collects every referenced environment variable, keyed by name.
    pub fn referenced_variables(&self) -> RecipeResult<BTreeMap<String, VariableUse>> {
        let mut found = BTreeMap::<String, VariableUse>::new();
        for (field, template) in self.templates() {
            for reference in references(template, &field)? {
                let usage = found.entry(reference.name.clone()).or_default();
                match reference.kind {
                    ReferenceKind::Required => usage.required = true,
                    ReferenceKind::Fallback(fallback) if usage.fallback.is_none() => {
                        usage.fallback = Some(fallback);
                    }
                    _ => {}
                }
                if !usage.fields.contains(&field) {
                    usage.fields.push(field.clone());
                }
            }
        }
        Ok(found)
    }

    /// Every substitutable string with its dotted field path.
    fn templates(&self) -> Vec<(String, &str)> {
        let mut out = vec![
            ("package.name".to_string(), self.package.name.as_str()),
            ("package.version".to_string(), self.package.version.as_str()),
            ("source.path".to_string(), self.source.path.as_str()),
            ("build.tag".to_string(), self.build.tag.as_str()),
            (
                "build.interpreter_version".to_string(),
                self.build.interpreter_version.as_str(),
            ),
        ];
        for (index, entry) in self.requirements.build.iter().enumerate() {
            out.push((format!("requirements.build[{index}]"), entry.spec()));
        }
        let lists: [(&str, &Vec<String>); 5] = [
            ("requirements.host", &self.requirements.host),
            ("requirements.run", &self.requirements.run),
            ("test.imports", &self.test.imports),
            ("test.source_files", &self.test.source_files),
            ("test.requires", &self.test.requires),
        ];
        for (section, entries) in lists {
            out.extend(
                entries
                    .iter()
                    .map(|entry| (section.to_string(), entry.as_str())),
            );
        }
        out.extend([
            ("about.home".to_string(), self.about.home.as_str()),
            ("about.license".to_string(), self.about.license.as_str()),
            (
                "about.license_file".to_string(),
                self.about.license_file.as_str(),
            ),
            ("about.summary".to_string(), self.about.summary.as_str()),
        ]);
        out
    }
}
