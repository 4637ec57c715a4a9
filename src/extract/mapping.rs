//! Name-to-template mapping extraction.
//!
//! The model returns the natural-language interface as a dict literal inside
//! a ```` ```python ```` fence. A dedicated literal parser with an explicit
//! grammar stands in for evaluating model text: only a flat string-to-string
//! dict is accepted, anything else is an extraction error.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use super::{ExtractError, Extracted, Extractor};

/// Symbol name to sentence template, e.g.
/// `"walk" -> "{arg0} walks from {arg1} to {arg2}"`.
pub type NlInterface = BTreeMap<String, String>;

static PYTHON_FENCE: OnceLock<Regex> = OnceLock::new();

fn python_fence() -> &'static Regex {
    PYTHON_FENCE.get_or_init(|| Regex::new(r"(?s)```python\s*\n(.*?)```").expect("fence pattern"))
}

/// Extractor for fenced name-to-template mapping artifacts.
#[derive(Debug, Default, Clone, Copy)]
pub struct MappingExtractor;

impl Extractor for MappingExtractor {
    type Artifact = NlInterface;

    fn extract(&self, response: &str) -> Result<Extracted<NlInterface>, ExtractError> {
        let raw = python_fence()
            .captures(response)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .ok_or_else(|| ExtractError::MissingBlock {
                tag: "python".to_string(),
            })?;
        let value = parse_mapping(&raw)?;
        Ok(Extracted { raw, value })
    }
}

/// Parse a flat dict literal: `{'key': "value", ...}`.
///
/// Grammar: `'{' (string ':' string ',')* '}'` with single- or double-quoted
/// strings, backslash escapes and an optional trailing comma. Nested values,
/// numbers or bare identifiers are rejected.
pub fn parse_mapping(text: &str) -> Result<NlInterface, ExtractError> {
    let mut scanner = Scanner::new(text);
    scanner.skip_ws();
    scanner.expect('{')?;
    let mut map = NlInterface::new();
    loop {
        scanner.skip_ws();
        if scanner.eat('}') {
            break;
        }
        let key = scanner.string()?;
        scanner.skip_ws();
        scanner.expect(':')?;
        scanner.skip_ws();
        let value = scanner.string()?;
        map.insert(key, value);
        scanner.skip_ws();
        if scanner.eat(',') {
            continue;
        }
        scanner.skip_ws();
        scanner.expect('}')?;
        break;
    }
    scanner.skip_ws();
    if !scanner.at_end() {
        return Err(syntax("trailing content after closing brace"));
    }
    Ok(map)
}

fn syntax(message: impl Into<String>) -> ExtractError {
    ExtractError::MappingSyntax(message.into())
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ExtractError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(syntax(format!("expected '{expected}'")))
        }
    }

    fn string(&mut self) -> Result<String, ExtractError> {
        let quote = match self.chars.next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(syntax("expected a quoted string")),
        };
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(syntax("unterminated string literal")),
                Some('\\') => match self.chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err(syntax("unterminated escape")),
                },
                Some(c) if c == quote => break,
                Some(c) => out.push(c),
            }
        }
        Ok(out)
    }

    fn at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_double_quoted() {
        let map = parse_mapping(r#"{"at": "{arg0} is at {arg1}"}"#).unwrap();
        assert_eq!(map["at"], "{arg0} is at {arg1}");
    }

    #[test]
    fn test_parse_single_quoted() {
        let map = parse_mapping("{'walk': '{arg0} walks from {arg1} to {arg2}'}").unwrap();
        assert_eq!(map["walk"], "{arg0} walks from {arg1} to {arg2}");
    }

    #[test]
    fn test_parse_multiple_entries_and_trailing_comma() {
        let text = "{\n  'at': '{arg0} is at {arg1}',\n  'walk': '{arg0} walks',\n}";
        let map = parse_mapping(text).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_parse_escapes() {
        let map = parse_mapping(r#"{"say": "it\'s \"here\"\nnow"}"#).unwrap();
        assert_eq!(map["say"], "it's \"here\"\nnow");
    }

    #[test]
    fn test_parse_empty_dict() {
        assert!(parse_mapping("{}").unwrap().is_empty());
    }

    #[test]
    fn test_reject_non_dict() {
        assert!(parse_mapping("[1, 2]").is_err());
        assert!(parse_mapping("just text").is_err());
    }

    #[test]
    fn test_reject_non_string_value() {
        let err = parse_mapping("{'at': 2}").unwrap_err();
        assert!(matches!(err, ExtractError::MappingSyntax(_)));
    }

    #[test]
    fn test_reject_trailing_garbage() {
        assert!(parse_mapping("{'a': 'b'} extra").is_err());
    }

    #[test]
    fn test_reject_unterminated_string() {
        assert!(parse_mapping("{'a': 'b").is_err());
    }

    #[test]
    fn test_extractor_missing_fence() {
        let err = MappingExtractor.extract("no fence").unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingBlock {
                tag: "python".to_string()
            }
        );
    }

    #[test]
    fn test_extractor_first_block_wins() {
        let response = "```python\n{'a': 'x'}\n```\n```python\n{'b': 'y'}\n```";
        let extracted = MappingExtractor.extract(response).unwrap();
        assert!(extracted.value.contains_key("a"));
        assert!(!extracted.value.contains_key("b"));
    }

    #[test]
    fn test_extractor_keeps_raw_block() {
        let response = "Sure:\n```python\n{'at': '{arg0} is at {arg1}'}\n```";
        let extracted = MappingExtractor.extract(response).unwrap();
        assert_eq!(extracted.raw, "{'at': '{arg0} is at {arg1}'}");
        assert_eq!(extracted.value["at"], "{arg0} is at {arg1}");
    }

    #[test]
    fn test_extractor_bad_literal_is_syntax_error() {
        let response = "```python\nprint('not a dict')\n```";
        let err = MappingExtractor.extract(response).unwrap_err();
        assert!(matches!(err, ExtractError::MappingSyntax(_)));
    }
}
