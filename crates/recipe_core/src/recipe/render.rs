//! Canonical rendering of a resolved descriptor.
//!
//! Output uses the recipe schema, so a rendered descriptor loads back to an
//! equal value for the same target platform. Every substituted string is
//! escaped, so a literal `${` in a resolved value survives the reload.

use crate::env::escape;
use crate::error::RecipeResult;
use crate::model::descriptor::PackageDescriptor;
use crate::model::requirement::Requirement;
use crate::recipe::document::{
    AboutSection, BuildSection, GatedEntry, PackageSection, RecipeDocument, RequirementEntry,
    RequirementsSection, SourceSection, TestSection,
};

fn escape_all<'a>(values: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    values.into_iter().map(|value| escape(value)).collect()
}

/// Pretty JSON; sets are emitted in lexical order, lists in stored order.
pub fn render(descriptor: &PackageDescriptor) -> RecipeResult<String> {
    Ok(serde_json::to_string_pretty(&RecipeDocument::from(
        descriptor,
    ))?)
}

impl From<&PackageDescriptor> for RecipeDocument {
    fn from(descriptor: &PackageDescriptor) -> Self {
        Self {
            package: PackageSection {
                name: escape(&descriptor.name),
                version: escape(&descriptor.version),
            },
            source: SourceSection {
                path: escape(&descriptor.source_path.to_string_lossy()),
            },
            build: BuildSection {
                number: descriptor.build.number,
                tag: escape(&descriptor.build.tag),
                interpreter_version: escape(&descriptor.build.interpreter_version),
            },
            requirements: RequirementsSection {
                build: descriptor
                    .build_requirements
                    .iter()
                    .map(RequirementEntry::from)
                    .collect(),
                host: escape_all(&descriptor.host_requirements),
                run: escape_all(&descriptor.run_requirements),
            },
            test: TestSection {
                imports: escape_all(&descriptor.test.imports),
                source_files: escape_all(&descriptor.test.source_files),
                requires: escape_all(&descriptor.test.requires),
            },
            about: AboutSection {
                home: escape(&descriptor.about.home),
                license: escape(&descriptor.about.license),
                license_file: escape(&descriptor.about.license_file),
                summary: escape(&descriptor.about.summary),
            },
        }
    }
}

impl From<&Requirement> for RequirementEntry {
    fn from(requirement: &Requirement) -> Self {
        match requirement {
            Requirement::Unconditional(spec) => Self::Plain(escape(spec)),
            Requirement::PlatformGated { spec, predicate } => Self::Gated(GatedEntry {
                spec: escape(spec),
                only_on: predicate.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::render;
    use crate::model::descriptor::{AboutMetadata, BuildInfo, PackageDescriptor, TestSpec};
    use crate::model::requirement::Requirement;
    use crate::platform::{Platform, PlatformPredicate};
    use std::path::PathBuf;

    fn descriptor() -> PackageDescriptor {
        PackageDescriptor {
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            source_path: PathBuf::from("/src"),
            build: BuildInfo::new(2, "cpu", "3.8"),
            build_requirements: vec![
                Requirement::gated("vs2017_win-64", PlatformPredicate::Is(Platform::Win)),
                Requirement::unconditional("cmake"),
            ],
            host_requirements: ["setuptools", "python"]
                .into_iter()
                .map(String::from)
                .collect(),
            run_requirements: ["tqdm", "python"].into_iter().map(String::from).collect(),
            test: TestSpec::default(),
            about: AboutMetadata::default(),
        }
    }

    #[test]
    fn renders_sets_sorted_and_gates_inline() {
        let rendered = render(&descriptor()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["requirements"]["host"][0], "python");
        assert_eq!(value["requirements"]["host"][1], "setuptools");
        assert_eq!(value["requirements"]["build"][0]["spec"], "vs2017_win-64");
        assert_eq!(value["requirements"]["build"][0]["only_on"], "win");
        assert_eq!(value["requirements"]["build"][1], "cmake");
        assert_eq!(value["build"]["number"], 2);
    }

    #[test]
    fn escapes_literal_dollar_brace() {
        let mut descriptor = descriptor();
        descriptor.source_path = PathBuf::from("/builds/${CI_JOB_ID}/text");
        descriptor.build_requirements[1] = Requirement::unconditional("cmake${X}");

        let value: serde_json::Value =
            serde_json::from_str(&render(&descriptor).unwrap()).unwrap();
        assert_eq!(value["source"]["path"], "/builds/$${CI_JOB_ID}/text");
        assert_eq!(value["requirements"]["build"][1], "cmake$${X}");
    }

    #[test]
    fn rendering_is_stable() {
        let first = render(&descriptor()).unwrap();
        let second = render(&descriptor()).unwrap();
        assert_eq!(first, second);
    }
}
