// src/expect/expectation.rs

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};

use crate::errors::{CrossrunError, Result};
use crate::outcome::{ActionResult, Outcome, ResultValue};

pub const TAG_FLAKY: &str = "flaky";
pub const TAG_LARGE: &str = "large";

/// Expected result for an action (or for any output matching `pattern`).
#[derive(Debug, Clone)]
pub struct Expectation {
    pub result: ActionResult,
    /// `None` matches any output.
    pattern: Option<Regex>,
    pub tags: BTreeSet<String>,
    pub description: Option<String>,
    pub bug: Option<u64>,
}

impl Expectation {
    pub fn new(
        result: ActionResult,
        pattern: Option<&str>,
        tags: BTreeSet<String>,
        description: Option<String>,
        bug: Option<u64>,
    ) -> Result<Self> {
        Ok(Self {
            result,
            pattern: pattern.map(full_match).transpose()?,
            tags,
            description,
            bug,
        })
    }

    /// Expect success, with no tags.
    pub fn success() -> Self {
        Self {
            result: ActionResult::Success,
            pattern: None,
            tags: BTreeSet::new(),
            description: None,
            bug: None,
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn is_flaky(&self) -> bool {
        self.tags.contains(TAG_FLAKY)
    }

    pub fn is_large(&self) -> bool {
        self.tags.contains(TAG_LARGE)
    }

    /// Same result, and the whole output matches the pattern.
    pub fn matches(&self, outcome: &Outcome) -> bool {
        outcome.result == self.result
            && self
                .pattern
                .as_ref()
                .is_none_or(|p| p.is_match(&outcome.output()))
    }

    /// Classify `result` against this expectation.
    pub fn classify(&self, result: ActionResult) -> ResultValue {
        if result == self.result {
            ResultValue::Ok
        } else if result == ActionResult::Unsupported {
            ResultValue::Ignore
        } else if self.is_flaky() {
            ResultValue::Warning
        } else {
            ResultValue::Fail
        }
    }
}

fn full_match(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(&format!(r"\A(?:{pattern})\z"))
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| CrossrunError::Expectation(format!("invalid pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classification_depends_only_on_results_and_tags() {
        let expect_fail = Expectation::new(ActionResult::ExecFailed, None, tags(&[]), None, None).unwrap();
        assert_eq!(expect_fail.classify(ActionResult::ExecFailed), ResultValue::Ok);
        assert_eq!(expect_fail.classify(ActionResult::Success), ResultValue::Fail);
        assert_eq!(expect_fail.classify(ActionResult::Unsupported), ResultValue::Ignore);

        let flaky = Expectation::new(ActionResult::Success, None, tags(&["flaky"]), None, None).unwrap();
        assert_eq!(flaky.classify(ActionResult::Timeout), ResultValue::Warning);
        assert_eq!(flaky.classify(ActionResult::Success), ResultValue::Ok);
    }

    #[test]
    fn pattern_must_match_the_whole_output() {
        let e = Expectation::new(
            ActionResult::ExecFailed,
            Some(".*OutOfMemoryError.*"),
            tags(&[]),
            None,
            None,
        )
        .unwrap();
        let hit = Outcome::new(
            "a",
            ActionResult::ExecFailed,
            vec!["starting".into(), "java.lang.OutOfMemoryError".into(), "done".into()],
        );
        assert!(e.matches(&hit));

        let partial = Expectation::new(ActionResult::ExecFailed, Some("OutOfMemoryError"), tags(&[]), None, None)
            .unwrap();
        assert!(!partial.matches(&hit));

        let wrong_result = Outcome::new("a", ActionResult::Timeout, hit.output_lines.clone());
        assert!(!e.matches(&wrong_result));
    }

    #[test]
    fn invalid_pattern_is_an_expectation_error() {
        let err = Expectation::new(ActionResult::Success, Some("(unclosed"), tags(&[]), None, None).unwrap_err();
        assert!(matches!(err, CrossrunError::Expectation(_)));
    }
}
