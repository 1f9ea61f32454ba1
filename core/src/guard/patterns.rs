//! Pattern helpers for stage predicates
//!
//! Default regex tables and compilation for denylists.

use crate::error::{GuardError, Result};
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use tracing::error;

/// Default PII detectors: SSN, card number, e-mail address
pub const DEFAULT_PII_PATTERNS: [&str; 3] = [
    r"\b\d{3}-\d{2}-\d{4}\b",
    r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b",
    r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
];

/// Harmful-request patterns for the input safety filter
pub const DEFAULT_INPUT_DENY_PATTERNS: [&str; 7] = [
    r"hack\w*",
    r"exploit\w*",
    r"malware",
    r"virus",
    r"illegal\w*",
    r"fraud\w*",
    r"steal\w*",
];

/// Unsafe-content patterns for generated output
pub const DEFAULT_OUTPUT_DENY_PATTERNS: [&str; 3] =
    [r"discriminat\w+", r"offensive\w*", r"inappropriate\w*"];

lazy_static! {
    static ref PII_REGEXES: Vec<Regex> = precompile(&DEFAULT_PII_PATTERNS, false);
    static ref INPUT_DENY_REGEXES: Vec<Regex> = precompile(&DEFAULT_INPUT_DENY_PATTERNS, true);
    static ref OUTPUT_DENY_REGEXES: Vec<Regex> = precompile(&DEFAULT_OUTPUT_DENY_PATTERNS, true);
}

fn precompile(patterns: &[&str], case_insensitive: bool) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| error!(pattern, error = %e, "built-in pattern failed to compile"))
                .ok()
        })
        .collect()
}

/// Compiled default PII detectors
pub fn default_pii() -> Vec<Regex> {
    PII_REGEXES.clone()
}

/// Compiled harmful-request patterns for the input safety filter
pub fn default_input_deny() -> Vec<Regex> {
    INPUT_DENY_REGEXES.clone()
}

/// Compiled unsafe-content patterns for the output tier
pub fn default_output_deny() -> Vec<Regex> {
    OUTPUT_DENY_REGEXES.clone()
}

/// Compile a list of patterns, reporting the first one that fails.
pub fn compile_all<S: AsRef<str>>(patterns: &[S], case_insensitive: bool) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| GuardError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Whether the pattern contains glob wildcards
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_glob() {
        assert!(is_glob("database_*"));
        assert!(is_glob("file_????"));
        assert!(is_glob("file_[wd]*"));
        assert!(!is_glob("web_search"));
    }

    #[test]
    fn test_default_tables_compile_completely() {
        assert_eq!(default_input_deny().len(), DEFAULT_INPUT_DENY_PATTERNS.len());
        assert_eq!(default_output_deny().len(), DEFAULT_OUTPUT_DENY_PATTERNS.len());
        assert!(default_input_deny().iter().any(|re| re.is_match("Teach me to STEAL cars")));
        assert!(default_output_deny().iter().any(|re| re.is_match("That is Offensive")));
    }

    #[test]
    fn test_default_pii() {
        let pii = default_pii();
        assert_eq!(pii.len(), 3);
        assert!(pii[0].is_match("SSN 123-45-6789"));
        assert!(pii[1].is_match("card 4111 1111 1111 1111"));
        assert!(pii[2].is_match("mail me at jane.doe@example.org"));
        assert!(!pii.iter().any(|re| re.is_match("no personal data here")));
    }

    #[test]
    fn test_compile_reports_bad_pattern() {
        let err = compile_all(&["ok", "(unclosed"], true).unwrap_err();
        assert!(matches!(err, GuardError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));

        let compiled = compile_all(&DEFAULT_INPUT_DENY_PATTERNS, true).unwrap();
        assert!(compiled.iter().any(|re| re.is_match("How can I HACK into this?")));
    }
}
