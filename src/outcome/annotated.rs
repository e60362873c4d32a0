// src/outcome/annotated.rs

use std::collections::BTreeMap;

use crate::expect::Expectation;

use super::{ActionResult, Outcome, ResultValue};

/// How the current value relates to the most recent previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// No history for this name.
    New,
    Unchanged,
    /// Was OK, is not any more.
    Regressed,
    /// Was not OK, is now.
    Fixed,
    /// Differs, neither side OK.
    Changed,
}

/// A fresh outcome with its expectation and the results previous runs
/// recorded for the same name, keyed by run timestamp.
#[derive(Debug, Clone)]
pub struct AnnotatedOutcome {
    pub outcome: Outcome,
    pub expectation: Expectation,
    previous: BTreeMap<String, ActionResult>,
}

impl AnnotatedOutcome {
    pub fn new(
        outcome: Outcome,
        expectation: Expectation,
        previous: BTreeMap<String, ActionResult>,
    ) -> Self {
        Self {
            outcome,
            expectation,
            previous,
        }
    }

    pub fn name(&self) -> &str {
        &self.outcome.name
    }

    pub fn result_value(&self) -> ResultValue {
        self.expectation.classify(self.outcome.result)
    }

    /// The most recent previous result, classified against today's
    /// expectation.
    pub fn previous_result_value(&self) -> Option<ResultValue> {
        self.previous
            .values()
            .next_back()
            .map(|r| self.expectation.classify(*r))
    }

    /// Not OK, or different from last time.
    pub fn is_noteworthy(&self) -> bool {
        let current = self.result_value();
        current != ResultValue::Ok
            || self
                .previous_result_value()
                .is_some_and(|previous| previous != current)
    }

    pub fn change(&self) -> Change {
        let current = self.result_value();
        match self.previous_result_value() {
            None => Change::New,
            Some(previous) if previous == current => Change::Unchanged,
            Some(ResultValue::Ok) => Change::Regressed,
            Some(_) if current == ResultValue::Ok => Change::Fixed,
            Some(_) => Change::Changed,
        }
    }

    /// One character per run, oldest first, ending with the current run:
    /// `.` OK, `F` FAIL, `W` WARNING, `I` IGNORE.
    pub fn history_string(&self, max_previous: usize) -> String {
        let skip = self.previous.len().saturating_sub(max_previous);
        self.previous
            .values()
            .skip(skip)
            .map(|r| self.expectation.classify(*r))
            .chain(std::iter::once(self.result_value()))
            .map(|v| match v {
                ResultValue::Ok => '.',
                ResultValue::Fail => 'F',
                ResultValue::Warning => 'W',
                ResultValue::Ignore => 'I',
            })
            .collect()
    }
}
