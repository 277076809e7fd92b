use std::collections::BTreeMap;
use std::fmt;

use regex::bytes::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};

use crate::error::CrawlError;

/// A compiled set of search terms.
///
/// Built once per crawl from a comma-separated list. Each trimmed term is a
/// regex alternative and the whole pattern is case-insensitive. Empty terms
/// are kept as empty alternatives, which match at every position; use
/// [`CrawlRequest::validate`](crate::CrawlRequest::validate) to reject them
/// up front.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    regex: Regex,
}

impl TermMatcher {
    pub fn compile(raw_terms: &str) -> Result<Self, CrawlError> {
        let pattern = raw_terms
            .split(',')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("|");
        let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
        Ok(Self { regex })
    }

    /// Every non-overlapping occurrence in `content`, in order.
    pub fn find_all(&self, content: &[u8]) -> Vec<String> {
        self.regex
            .find_iter(content)
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
            .collect()
    }

    pub fn is_match(&self, content: &[u8]) -> bool {
        self.regex.is_match(content)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// One distinct matched text and how often it occurred in a file.
///
/// Displays and serializes as `"<text> - <count>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

impl fmt::Display for TermCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.term, self.count)
    }
}

impl Serialize for TermCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Group raw occurrences by exact text (case-sensitive), sorted by text.
pub fn aggregate_terms<S: AsRef<str>>(occurrences: &[S]) -> Vec<TermCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for occurrence in occurrences {
        *counts.entry(occurrence.as_ref()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(term, count)| TermCount { term: term.to_string(), count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive() {
        let m = TermMatcher::compile("Foo").unwrap();
        for content in ["foo", "FOO", "fOo", "xxFooxx"] {
            assert!(m.is_match(content.as_bytes()), "{content}");
        }
        assert!(!m.is_match(b"fo o"));
    }

    #[test]
    fn terms_are_trimmed_alternatives() {
        let m = TermMatcher::compile(" foo ,bar  ").unwrap();
        assert_eq!(m.as_str(), "foo|bar");
        assert_eq!(m.find_all(b"Foo bar Foo"), vec!["Foo", "bar", "Foo"]);
    }

    #[test]
    fn no_match_is_empty() {
        let m = TermMatcher::compile("eval").unwrap();
        assert!(m.find_all(b"<?php echo 1;").is_empty());
    }

    #[test]
    fn empty_term_matches_everything() {
        let m = TermMatcher::compile("foo,").unwrap();
        assert!(m.is_match(b"nothing relevant"));
    }

    #[test]
    fn invalid_pattern_is_configuration_error() {
        let err = TermMatcher::compile("foo, (bar").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn non_utf8_content_is_searched() {
        let m = TermMatcher::compile("base64_decode").unwrap();
        let content = b"\xff\xfe base64_decode(\xc3";
        assert_eq!(m.find_all(content), vec!["base64_decode"]);
    }

    #[test]
    fn aggregation_counts_exact_text() {
        let counts = aggregate_terms(&["Foo", "bar", "Foo", "foo"]);
        let shown: Vec<String> = counts.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["Foo - 2", "bar - 1", "foo - 1"]);
        assert_eq!(counts.iter().map(|c| c.count).sum::<usize>(), 4);
    }

    #[test]
    fn term_count_serializes_as_text() {
        let tc = TermCount { term: "eval".into(), count: 3 };
        assert_eq!(serde_json::to_string(&tc).unwrap(), r#""eval - 3""#);
    }
}
