//! Consistency checks between a formal domain and its NL interface.
//!
//! Three ordered checks, all case-insensitive on keys: cardinality of the
//! mapping against the symbol set, key coverage, and arity agreement between
//! declared parameters and `{argN}` placeholder occurrences.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use super::{ArtifactValidator, ValidationResult};
use crate::Result;
use crate::extract::NlInterface;
use crate::pddl::DomainParser;
use crate::scratch::ScratchHandle;

static ARG_TOKEN: OnceLock<Regex> = OnceLock::new();

fn arg_token() -> &'static Regex {
    ARG_TOKEN.get_or_init(|| Regex::new(r"\{arg\d+\}").expect("placeholder pattern"))
}

/// Count `{argN}` placeholder occurrences in a template. Occurrences, not
/// distinct tokens: a template reusing `{arg0}` twice counts twice.
pub fn placeholder_count(template: &str) -> usize {
    arg_token().find_iter(template).count()
}

/// Checks a candidate name-to-template mapping against the symbols of an
/// already-validated domain.
pub struct InterfaceValidator {
    parser: Arc<dyn DomainParser>,
    domain: String,
}

impl InterfaceValidator {
    pub fn new(parser: Arc<dyn DomainParser>, domain: impl Into<String>) -> Self {
        Self {
            parser,
            domain: domain.into(),
        }
    }

    fn check_consistency(
        symbols: &BTreeMap<String, usize>,
        mapping: &NlInterface,
    ) -> ValidationResult {
        let templates: BTreeMap<String, &String> = mapping
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        let counts: BTreeMap<String, usize> = templates
            .iter()
            .map(|(k, v)| (k.clone(), placeholder_count(v)))
            .collect();
        // lowercase key -> (declared name, arity)
        let symbol_keys: BTreeMap<String, (String, usize)> = symbols
            .iter()
            .map(|(k, v)| (k.to_lowercase(), (k.clone(), *v)))
            .collect();

        if symbol_keys.len() != counts.len() {
            if symbol_keys.len() < counts.len() {
                let redundant: Vec<&str> = counts
                    .keys()
                    .filter(|k| !symbol_keys.contains_key(*k))
                    .map(String::as_str)
                    .collect();
                return ValidationResult::fail(format!(
                    "The number of keys in natural language interface is not equal to the number of actions and predicates in the pddl. Redundant Keys: {}",
                    redundant.join(",")
                ));
            }
            let missing: Vec<&str> = symbol_keys
                .keys()
                .filter(|k| !counts.contains_key(*k))
                .map(String::as_str)
                .collect();
            return ValidationResult::fail(format!(
                "The number of keys in natural language interface is not equal to the number of actions and predicates in the pddl. Missing Keys: {}",
                missing.join(",")
            ));
        }

        for (lower, (name, arity)) in &symbol_keys {
            let Some(count) = counts.get(lower) else {
                return ValidationResult::fail(format!(
                    "Key \"{name}\" is not in natural language interface"
                ));
            };
            if count != arity {
                let sent = templates.get(lower).map(|s| s.as_str()).unwrap_or("");
                return ValidationResult::fail(format!(
                    "The arity of \"{name}\" should be {arity}, but the arity of \"{name}\" in natural language interface \"{sent}\" is {count}"
                ));
            }
        }

        ValidationResult::pass()
    }
}

#[async_trait]
impl ArtifactValidator<NlInterface> for InterfaceValidator {
    async fn check(
        &self,
        artifact: &NlInterface,
        scratch: &ScratchHandle,
    ) -> Result<ValidationResult> {
        let path = scratch.materialize(&self.domain)?;
        let parsed = self.parser.parse(path).await;
        scratch.cleanup();
        match parsed {
            Ok(table) => Ok(Self::check_consistency(&table.merged(), artifact)),
            Err(e) => Ok(ValidationResult::fail(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::{ParseError, SymbolTable};
    use crate::scratch::WorkerId;
    use std::path::Path;

    fn symbols() -> BTreeMap<String, usize> {
        let mut s = BTreeMap::new();
        s.insert("at".to_string(), 2);
        s.insert("walk".to_string(), 3);
        s
    }

    fn mapping(entries: &[(&str, &str)]) -> NlInterface {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_placeholder_count_occurrences_not_distinct() {
        assert_eq!(placeholder_count("{arg0} is at {arg1}"), 2);
        assert_eq!(placeholder_count("{arg0} and {arg0} again"), 2);
        assert_eq!(placeholder_count("no placeholders"), 0);
        assert_eq!(placeholder_count("{arg} {argx} {arg10}"), 1);
    }

    #[test]
    fn test_consistent_mapping_passes() {
        let m = mapping(&[
            ("at", "{arg0} is at {arg1}"),
            ("walk", "{arg0} walks from {arg1} to {arg2}"),
        ]);
        let verdict = InterfaceValidator::check_consistency(&symbols(), &m);
        assert!(verdict.passed);
        assert!(verdict.diagnostic.is_empty());
    }

    #[test]
    fn test_keys_checked_case_insensitively() {
        let m = mapping(&[
            ("At", "{arg0} is at {arg1}"),
            ("WALK", "{arg0} walks from {arg1} to {arg2}"),
        ]);
        assert!(InterfaceValidator::check_consistency(&symbols(), &m).passed);
    }

    #[test]
    fn test_missing_key_named_in_diagnostic() {
        let m = mapping(&[("at", "{arg0} is at {arg1}")]);
        let verdict = InterfaceValidator::check_consistency(&symbols(), &m);
        assert!(!verdict.passed);
        assert!(verdict.diagnostic.contains("Missing Keys: walk"));
        assert!(!verdict.diagnostic.contains("at,"));
    }

    #[test]
    fn test_redundant_key_named_only_when_mapping_larger() {
        let m = mapping(&[
            ("at", "{arg0} is at {arg1}"),
            ("walk", "{arg0} walks from {arg1} to {arg2}"),
            ("fly", "{arg0} flies"),
        ]);
        let verdict = InterfaceValidator::check_consistency(&symbols(), &m);
        assert!(!verdict.passed);
        assert!(verdict.diagnostic.contains("Redundant Keys: fly"));
        assert!(!verdict.diagnostic.contains("walk"));
    }

    #[test]
    fn test_arity_mismatch_reports_expected_observed_and_template() {
        let m = mapping(&[
            ("at", "{arg0} is at {arg1}"),
            ("walk", "{arg0} walks"),
        ]);
        let verdict = InterfaceValidator::check_consistency(&symbols(), &m);
        assert!(!verdict.passed);
        assert!(
            verdict
                .diagnostic
                .contains("The arity of \"walk\" should be 3")
        );
        assert!(verdict.diagnostic.contains("\"{arg0} walks\""));
        assert!(verdict.diagnostic.contains("is 1"));
    }

    #[test]
    fn test_duplicate_placeholder_counts_twice() {
        let mut s = BTreeMap::new();
        s.insert("same".to_string(), 2);
        let m = mapping(&[("same", "{arg0} equals {arg0}")]);
        assert!(InterfaceValidator::check_consistency(&s, &m).passed);
    }

    struct StubParser;

    #[async_trait]
    impl DomainParser for StubParser {
        async fn parse(&self, _path: &Path) -> std::result::Result<SymbolTable, ParseError> {
            let mut t = SymbolTable::default();
            t.predicates.insert("at".to_string(), 2);
            t.actions.insert("walk".to_string(), 3);
            Ok(t)
        }
    }

    #[tokio::test]
    async fn test_full_check_with_parser() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchHandle::new(dir.path(), WorkerId(0));
        let validator = InterfaceValidator::new(Arc::new(StubParser), "(define (domain t))");

        let good = mapping(&[
            ("at", "{arg0} is at {arg1}"),
            ("walk", "{arg0} walks from {arg1} to {arg2}"),
        ]);
        let verdict = validator.check(&good, &scratch).await.unwrap();
        assert!(verdict.passed);
        assert!(!scratch.path().exists());

        let bad = mapping(&[("at", "{arg0} is at {arg1}"), ("walk", "{arg0} walks")]);
        let verdict = validator.check(&bad, &scratch).await.unwrap();
        assert!(!verdict.passed);
        assert!(verdict.diagnostic.contains("walk"));
        assert!(!scratch.path().exists());
    }
}
