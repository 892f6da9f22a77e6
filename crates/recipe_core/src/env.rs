//! Explicit environment mapping and `${...}` substitution.
//!
//! # Responsibility
//! - Carry the variable set a recipe resolves against as a plain value.
//! - Expand substitution tokens inside one recipe string at a time.
//!
//! # Invariants
//! - Resolution never reads ambient process state; only
//!   [`Environment::from_process`] touches `std::env`, and only when called.
//! - A variable that is set to the empty string counts as set.
//! - Expansion is single-pass: substituted values are never re-scanned.
//!
//! Token grammar:
//! - `${NAME}` required
//! - `${NAME?}` optional, unset expands to the empty string
//! - `${NAME:-fallback}` unset expands to `fallback`
//! - `$${` literal `${`

use crate::error::{RecipeResult, ValidationError};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\$\{|\$\{([^}]*)\}").expect("token pattern must compile")
});

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(\?|:-(.*))?$").expect("reference pattern must compile")
});

const ESCAPED_OPEN: &str = "$${";
const OPEN: &str = "${";

/// Variable name to value mapping used for one recipe resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Snapshots the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped. Intended
    /// for executable entry points only; library code takes an `Environment`
    /// parameter instead.
    pub fn from_process() -> Self {
        let mut skipped = 0usize;
        let environment: Self = std::env::vars_os()
            .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                _ => {
                    skipped += 1;
                    None
                }
            })
            .collect();
        if skipped > 0 {
            warn!("event=env_capture module=env status=partial skipped_non_utf8={skipped}");
        }
        environment
    }

    /// Sets one variable, returning the previous value when present.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(name.into(), value.into())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// How a reference behaves when its variable is unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    Required,
    Optional,
    Fallback(String),
}

/// One `${...}` token found in a recipe string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    pub name: String,
    pub kind: ReferenceKind,
}

impl VariableReference {
    pub fn is_required(&self) -> bool {
        matches!(self.kind, ReferenceKind::Required)
    }
}

/// Result of expanding one template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub value: String,
    /// Optional (`${NAME?}`) references whose variable was unset.
    pub unset_optional: Vec<String>,
}

enum Token {
    EscapedOpen,
    Reference(VariableReference),
}

/// Lists every reference in `template`, in order of appearance.
///
/// `field` is the dotted recipe path used in error messages.
pub fn references(template: &str, field: &str) -> RecipeResult<Vec<VariableReference>> {
    Ok(scan(template, field)?
        .into_iter()
        .filter_map(|(_, _, token)| match token {
            Token::Reference(reference) => Some(reference),
            Token::EscapedOpen => None,
        })
        .collect())
}

/// Expands every reference in `template` against `env`.
pub fn substitute(template: &str, field: &str, env: &Environment) -> RecipeResult<Substitution> {
    let mut value = String::with_capacity(template.len());
    let mut unset_optional = Vec::new();
    let mut cursor = 0;

    for (start, end, token) in scan(template, field)? {
        value.push_str(&template[cursor..start]);
        cursor = end;
        let reference = match token {
            Token::EscapedOpen => {
                value.push_str(OPEN);
                continue;
            }
            Token::Reference(reference) => reference,
        };
        match (env.get(&reference.name), reference.kind) {
            (Some(resolved), _) => value.push_str(resolved),
            (None, ReferenceKind::Fallback(fallback)) => value.push_str(&fallback),
            (None, ReferenceKind::Optional) => unset_optional.push(reference.name),
            (None, ReferenceKind::Required) => {
                return Err(ValidationError::UnresolvedSubstitution {
                    variable: reference.name,
                    field: field.to_string(),
                });
            }
        }
    }
    value.push_str(&template[cursor..]);

    Ok(Substitution {
        value,
        unset_optional,
    })
}

/// Escapes a literal value so [`substitute`] reproduces it unchanged.
pub fn escape(value: &str) -> String {
    value.replace(OPEN, ESCAPED_OPEN)
}

fn scan(template: &str, field: &str) -> RecipeResult<Vec<(usize, usize, Token)>> {
    let mut found = Vec::new();
    let mut cursor = 0;

    for captures in TOKEN_RE.captures_iter(template) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        ensure_no_open_token(&template[cursor..whole.start()], field)?;
        let token = match captures.get(1) {
            None => Token::EscapedOpen,
            Some(body) => Token::Reference(parse_reference(body.as_str(), field)?),
        };
        found.push((whole.start(), whole.end(), token));
        cursor = whole.end();
    }
    ensure_no_open_token(&template[cursor..], field)?;

    Ok(found)
}

fn parse_reference(body: &str, field: &str) -> RecipeResult<VariableReference> {
    let Some(captures) = REFERENCE_RE.captures(body) else {
        return Err(ValidationError::malformed(format!(
            "invalid substitution `${{{body}}}` in {field}"
        )));
    };
    let name = captures[1].to_string();
    let kind = match (captures.get(2).map(|m| m.as_str()), captures.get(3)) {
        (None, _) => ReferenceKind::Required,
        (Some("?"), _) => ReferenceKind::Optional,
        (Some(_), Some(fallback)) => ReferenceKind::Fallback(fallback.as_str().to_string()),
        (Some(_), None) => ReferenceKind::Fallback(String::new()),
    };
    Ok(VariableReference { name, kind })
}

fn ensure_no_open_token(segment: &str, field: &str) -> RecipeResult<()> {
    if segment.contains(OPEN) {
        return Err(ValidationError::malformed(format!(
            "unterminated substitution in {field}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{escape, references, substitute, Environment, ReferenceKind, ValidationError};

    fn env() -> Environment {
        Environment::from_pairs([("BUILD_VERSION", "0.9.0"), ("EMPTY", "")])
    }

    #[test]
    fn expands_required_reference() {
        let out = substitute("v${BUILD_VERSION}", "package.version", &env()).unwrap();
        assert_eq!(out.value, "v0.9.0");
        assert!(out.unset_optional.is_empty());
    }

    #[test]
    fn missing_required_reference_names_variable_and_field() {
        let err = substitute("${SOURCE_ROOT_DIR}", "source.path", &env()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnresolvedSubstitution {
                variable: "SOURCE_ROOT_DIR".to_string(),
                field: "source.path".to_string(),
            }
        );
    }

    #[test]
    fn optional_reference_expands_to_empty_and_is_reported() {
        let out = substitute("${CONDA_PYTORCH_CONSTRAINT?}", "requirements.run", &env()).unwrap();
        assert_eq!(out.value, "");
        assert_eq!(out.unset_optional, vec!["CONDA_PYTORCH_CONSTRAINT"]);
    }

    #[test]
    fn set_but_empty_variable_counts_as_set() {
        let out = substitute("${EMPTY}", "requirements.host", &env()).unwrap();
        assert_eq!(out.value, "");
        assert!(out.unset_optional.is_empty());
    }

    #[test]
    fn fallback_applies_only_when_unset() {
        let out = substitute("${PYTHON_VERSION:-3.8}", "build", &env()).unwrap();
        assert_eq!(out.value, "3.8");

        let env = env().with("PYTHON_VERSION", "3.10");
        let out = substitute("${PYTHON_VERSION:-3.8}", "build", &env).unwrap();
        assert_eq!(out.value, "3.10");
    }

    #[test]
    fn rejects_unterminated_and_invalid_tokens() {
        let err = substitute("${BUILD_VERSION", "package.version", &env()).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedRecipe(_)));

        let err = substitute("${1BAD}", "package.version", &env()).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedRecipe(_)));
    }

    #[test]
    fn lists_references_in_order() {
        let found = references("${A}-${B?}-$${NOT_A_REF}-${C:-x}", "field").unwrap();
        let names: Vec<&str> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(found[0].is_required());
        assert_eq!(found[1].kind, ReferenceKind::Optional);
        assert_eq!(found[2].kind, ReferenceKind::Fallback("x".to_string()));
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let env = env().with("SOURCE_ROOT_DIR", "/builds/${CI_JOB_ID}/text");
        let out = substitute("${SOURCE_ROOT_DIR}", "source.path", &env).unwrap();
        assert_eq!(out.value, "/builds/${CI_JOB_ID}/text");
    }

    #[test]
    fn escaped_values_substitute_back_unchanged() {
        for literal in ["/builds/${CI_JOB_ID}/text", "$${x}", "plain", "$", "${"] {
            let out = substitute(&escape(literal), "source.path", &Environment::new()).unwrap();
            assert_eq!(out.value, literal);
        }
    }

    #[cfg(unix)]
    #[test]
    fn from_process_skips_non_utf8_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var("RECIPE_ENV_TEST_BAD", OsStr::from_bytes(b"f\xffo"));
        std::env::set_var("RECIPE_ENV_TEST_GOOD", "ok");

        let captured = Environment::from_process();
        std::env::remove_var("RECIPE_ENV_TEST_BAD");
        std::env::remove_var("RECIPE_ENV_TEST_GOOD");

        assert_eq!(captured.get("RECIPE_ENV_TEST_BAD"), None);
        assert_eq!(captured.get("RECIPE_ENV_TEST_GOOD"), Some("ok"));
    }
}
