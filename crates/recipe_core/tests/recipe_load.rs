use recipe_core::{
    load, ConstraintPolicy, Environment, LoadOptions, PackageDescriptor, Platform,
    PlatformPredicate, Requirement, ValidationError,
};

const TORCHTEXT_RECIPE: &str = include_str!("../../../recipes/torchtext.json");

fn base_env() -> Environment {
    Environment::from_pairs([
        ("BUILD_VERSION", "0.9.0"),
        ("SOURCE_ROOT_DIR", "/src"),
        ("CONDA_PYTORCH_CONSTRAINT", "pytorch==1.5"),
    ])
}

fn load_for(platform: Platform, env: &Environment) -> Result<PackageDescriptor, ValidationError> {
    load(TORCHTEXT_RECIPE, env, &LoadOptions::new(platform))
}

#[test]
fn linux_example_resolves_expected_descriptor() {
    let descriptor = load_for(Platform::Linux, &base_env()).unwrap();

    assert_eq!(descriptor.name, "torchtext");
    assert_eq!(descriptor.version, "0.9.0");
    assert_eq!(descriptor.source_path.to_str(), Some("/src"));
    assert_eq!(descriptor.build.string, "py38_cpu");
    assert_eq!(descriptor.build_requirement_specs(), vec!["cmake"]);
    assert!(descriptor.run_requirements.contains("pytorch==1.5"));
    assert!(descriptor.run_requirements.contains("requests"));
    assert!(descriptor.run_requirements.contains("tqdm"));
    assert_eq!(
        descriptor.host_requirements.iter().collect::<Vec<_>>(),
        vec!["cpuonly", "python", "setuptools"]
    );
    assert!(descriptor.test.imports.contains("torchtext.datasets"));
    assert_eq!(descriptor.test.source_files, vec!["test"]);
    assert_eq!(descriptor.about.license, "BSD");
}

#[test]
fn windows_example_keeps_both_compilers_and_cmake() {
    let descriptor = load_for(Platform::Win, &base_env()).unwrap();

    assert_eq!(
        descriptor.build_requirement_specs(),
        vec!["c-compiler", "cxx-compiler", "cmake"]
    );
    assert_eq!(
        descriptor.build_requirements[0],
        Requirement::gated("c-compiler", PlatformPredicate::Is(Platform::Win))
    );
}

#[test]
fn missing_build_version_names_variable() {
    let env = Environment::from_pairs([("SOURCE_ROOT_DIR", "/src")]);
    let err = load_for(Platform::Linux, &env).unwrap_err();
    assert_eq!(
        err,
        ValidationError::UnresolvedSubstitution {
            variable: "BUILD_VERSION".to_string(),
            field: "package.version".to_string(),
        }
    );
}

#[test]
fn missing_source_root_names_variable() {
    let env = Environment::from_pairs([("BUILD_VERSION", "0.9.0")]);
    let err = load_for(Platform::Osx, &env).unwrap_err();
    assert_eq!(err.variable(), Some("SOURCE_ROOT_DIR"));
    assert!(err.to_string().contains("SOURCE_ROOT_DIR"));
}

#[test]
fn optional_constraints_are_absent_when_unset_or_empty() {
    let mut env = Environment::from_pairs([("BUILD_VERSION", "0.9.0"), ("SOURCE_ROOT_DIR", "/src")]);
    env.set("CONDA_EXTRA_BUILD_CONSTRAINT", "");

    let descriptor = load_for(Platform::Linux, &env).unwrap();
    assert_eq!(descriptor.host_requirements.len(), 3);
    assert_eq!(
        descriptor.run_requirements.iter().collect::<Vec<_>>(),
        vec!["python", "requests", "tqdm"]
    );
}

#[test]
fn host_build_constraint_is_substituted_when_set() {
    let env = base_env()
        .with("CONDA_PYTORCH_BUILD_CONSTRAINT", "pytorch==1.5")
        .with("CONDA_EXTRA_BUILD_CONSTRAINT", "mkl<2021");

    let descriptor = load_for(Platform::Linux, &env).unwrap();
    assert!(descriptor.host_requirements.contains("pytorch==1.5"));
    assert!(descriptor.host_requirements.contains("mkl<2021"));
}

#[test]
fn strict_policy_requires_run_constraint() {
    let env = Environment::from_pairs([("BUILD_VERSION", "0.9.0"), ("SOURCE_ROOT_DIR", "/src")]);
    let options = LoadOptions::new(Platform::Linux).with_run_constraints(ConstraintPolicy::RequireSet);

    let err = load(TORCHTEXT_RECIPE, &env, &options).unwrap_err();
    assert_eq!(
        err,
        ValidationError::UnresolvedSubstitution {
            variable: "CONDA_PYTORCH_CONSTRAINT".to_string(),
            field: "requirements.run".to_string(),
        }
    );

    let ok = load(TORCHTEXT_RECIPE, &base_env(), &options).unwrap();
    assert!(ok.run_requirements.contains("pytorch==1.5"));
}

#[test]
fn strict_policy_rejects_empty_run_constraint() {
    let env = base_env().with("CONDA_PYTORCH_CONSTRAINT", "");
    let options = LoadOptions::new(Platform::Linux).with_run_constraints(ConstraintPolicy::RequireSet);

    let err = load(TORCHTEXT_RECIPE, &env, &options).unwrap_err();
    assert_eq!(
        err,
        ValidationError::UnresolvedSubstitution {
            variable: "CONDA_PYTORCH_CONSTRAINT".to_string(),
            field: "requirements.run".to_string(),
        }
    );

    let lenient = load_for(Platform::Linux, &env).unwrap();
    assert!(!lenient.run_requirements.iter().any(|entry| entry.contains("pytorch")));
}

#[test]
fn environment_values_may_contain_dollar_brace() {
    let env = base_env().with("SOURCE_ROOT_DIR", "/builds/${CI_JOB_ID}/text");
    let descriptor = load_for(Platform::Linux, &env).unwrap();

    assert_eq!(descriptor.source_path.to_str(), Some("/builds/${CI_JOB_ID}/text"));
    assert!(descriptor.validate().is_ok());
}

#[test]
fn escaped_dollar_brace_in_recipe_is_literal() {
    let recipe = TORCHTEXT_RECIPE.replacen("\"BSD\"", "\"$${LICENSE_ID}\"", 1);
    let descriptor = load_for(Platform::Linux, &base_env()).unwrap();
    assert_eq!(descriptor.about.license, "BSD");

    let descriptor = load(&recipe, &base_env(), &LoadOptions::new(Platform::Linux)).unwrap();
    assert_eq!(descriptor.about.license, "${LICENSE_ID}");
}

#[test]
fn interpreter_version_fallback_can_be_overridden() {
    let env = base_env().with("PYTHON_VERSION", "3.10");
    let descriptor = load_for(Platform::Linux, &env).unwrap();
    assert_eq!(descriptor.build.interpreter_version, "3.10");
    assert_eq!(descriptor.build.string, "py310_cpu");
}

#[test]
fn duplicate_set_entries_collapse() {
    let recipe = r#"{
        "package": { "name": "demo", "version": "1.0" },
        "source": { "path": "/src" },
        "build": { "tag": "", "interpreter_version": "3.8" },
        "requirements": {
            "host": ["python", "python", "${PY?}"],
            "run": ["tqdm", "tqdm ", "${PY:-python}", "python"]
        },
        "about": {}
    }"#;
    let descriptor = load(recipe, &Environment::new(), &LoadOptions::new(Platform::Linux)).unwrap();
    assert_eq!(descriptor.host_requirements.len(), 1);
    assert_eq!(
        descriptor.run_requirements.iter().collect::<Vec<_>>(),
        vec!["python", "tqdm"]
    );
    assert_eq!(descriptor.build.string, "py38");
}

#[test]
fn matching_gated_entry_appears_exactly_once() {
    let recipe = r#"{
        "package": { "name": "demo", "version": "1.0" },
        "source": { "path": "/src" },
        "build": { "tag": "cpu", "interpreter_version": "3.8" },
        "requirements": {
            "build": [
                { "spec": "ninja", "only_on": "unix" },
                "ninja",
                { "spec": "msbuild", "only_on": "not unix" },
                { "spec": "${WIN_SDK}", "only_on": "win" }
            ]
        },
        "about": {}
    }"#;
    let options = LoadOptions::new(Platform::Osx);
    let descriptor = load(recipe, &Environment::new(), &options).unwrap();

    assert_eq!(descriptor.build_requirement_specs(), vec!["ninja"]);
    assert_eq!(
        descriptor.build_requirements[0].predicate(),
        Some(&PlatformPredicate::Unix)
    );

    let err = load(recipe, &Environment::new(), &LoadOptions::new(Platform::Win)).unwrap_err();
    assert_eq!(err.variable(), Some("WIN_SDK"));
}

#[test]
fn empty_name_is_missing_field() {
    let recipe = TORCHTEXT_RECIPE.replacen("\"name\": \"torchtext\"", "\"name\": \"\"", 1);
    let err = load(&recipe, &base_env(), &LoadOptions::new(Platform::Linux)).unwrap_err();
    assert_eq!(err, ValidationError::MissingField("package.name".to_string()));
}

#[test]
fn malformed_recipes_are_rejected() {
    let options = LoadOptions::new(Platform::Linux);
    let env = base_env();

    let not_json = load("package: torchtext", &env, &options).unwrap_err();
    assert!(matches!(not_json, ValidationError::MalformedRecipe(_)));

    let missing_about = r#"{
        "package": { "name": "demo", "version": "1.0" },
        "source": { "path": "/src" },
        "build": { "interpreter_version": "3.8" },
        "requirements": {}
    }"#;
    let err = load(missing_about, &env, &options).unwrap_err();
    assert!(matches!(err, ValidationError::MalformedRecipe(msg) if msg.contains("about")));

    let bad_predicate = TORCHTEXT_RECIPE.replacen("\"only_on\": \"win\"", "\"only_on\": \"plan9\"", 1);
    let err = load(&bad_predicate, &env, &options).unwrap_err();
    assert!(matches!(err, ValidationError::MalformedRecipe(msg) if msg.contains("plan9")));

    let empty_entry = TORCHTEXT_RECIPE.replacen("\"tqdm\"", "\"\"", 1);
    let err = load(&empty_entry, &env, &options).unwrap_err();
    assert!(matches!(err, ValidationError::MalformedRecipe(msg) if msg.contains("requirements.run")));
}

#[test]
fn unknown_target_identifier_is_rejected() {
    let err = LoadOptions::for_target("vax").unwrap_err();
    assert_eq!(err, ValidationError::UnknownPlatform("vax".to_string()));
    assert_eq!(
        LoadOptions::for_target("win-64").unwrap().platform,
        Platform::Win
    );
}
