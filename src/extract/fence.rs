//! Fenced PDDL block extraction.

use std::sync::OnceLock;

use regex::Regex;

use super::{ExtractError, Extracted, Extractor};

static PDDL_FENCE: OnceLock<Regex> = OnceLock::new();
static DOMAIN_NAME: OnceLock<Regex> = OnceLock::new();

fn pddl_fence() -> &'static Regex {
    PDDL_FENCE.get_or_init(|| Regex::new(r"(?s)```pddl\s*\n(.*?)```").expect("fence pattern"))
}

/// Extract the interior of the first ```` ```pddl ```` fenced block.
///
/// The first block is authoritative; later blocks are ignored
/// deterministically. Absence is a recoverable [`ExtractError`].
pub fn extract_pddl(text: &str) -> Result<String, ExtractError> {
    pddl_fence()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| ExtractError::MissingBlock {
            tag: "pddl".to_string(),
        })
}

/// Pull the domain name out of `(define (domain name ...)`, if present.
pub fn domain_name(pddl: &str) -> Option<String> {
    let re = DOMAIN_NAME
        .get_or_init(|| Regex::new(r"\(define \(domain\s+(\S+)").expect("domain pattern"));
    re.captures(pddl)
        .map(|c| c[1].trim_end_matches(')').to_string())
}

/// Extractor for fenced PDDL artifacts.
#[derive(Debug, Default, Clone, Copy)]
pub struct PddlExtractor;

impl Extractor for PddlExtractor {
    type Artifact = String;

    fn extract(&self, response: &str) -> Result<Extracted<String>, ExtractError> {
        let text = extract_pddl(response)?;
        Ok(Extracted {
            raw: text.clone(),
            value: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_pddl_simple() {
        let response = "Here is the domain:\n```pddl\n(define (domain test))\n```\nDone.";
        let pddl = extract_pddl(response).unwrap();
        assert_eq!(pddl, "(define (domain test))");
    }

    #[test]
    fn test_extract_pddl_trims_interior() {
        let response = "```pddl\n\n  (define (domain t))  \n\n```";
        let pddl = extract_pddl(response).unwrap();
        assert_eq!(pddl, "(define (domain t))");
    }

    #[test]
    fn test_extract_pddl_first_block_wins() {
        let response = "```pddl\nfirst\n```\ntext\n```pddl\nsecond\n```";
        assert_eq!(extract_pddl(response).unwrap(), "first");
    }

    #[test]
    fn test_extract_pddl_missing_block() {
        let err = extract_pddl("no code here").unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingBlock {
                tag: "pddl".to_string()
            }
        );
        assert!(err.to_string().contains("```pddl```"));
    }

    #[test]
    fn test_extract_pddl_wrong_tag() {
        let response = "```python\nprint('hi')\n```";
        assert!(extract_pddl(response).is_err());
    }

    #[test]
    fn test_extract_pddl_multiline() {
        let response = "```pddl\n(define (domain walk)\n  (:predicates (at ?x ?y))\n)\n```";
        let pddl = extract_pddl(response).unwrap();
        assert!(pddl.contains("(:predicates (at ?x ?y))"));
    }

    #[test]
    fn test_domain_name() {
        let pddl = "(define (domain spanner)\n  (:requirements :typing))";
        assert_eq!(domain_name(pddl), Some("spanner".to_string()));
    }

    #[test]
    fn test_domain_name_trailing_paren() {
        assert_eq!(domain_name("(define (domain tiny))"), Some("tiny".to_string()));
    }

    #[test]
    fn test_domain_name_absent() {
        assert_eq!(domain_name("(define (problem p1))"), None);
    }

    #[test]
    fn test_pddl_extractor_keeps_raw() {
        let extracted = PddlExtractor
            .extract("```pddl\n(define (domain t))\n```")
            .unwrap();
        assert_eq!(extracted.raw, extracted.value);
    }
}
