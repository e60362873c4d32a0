// src/outcome/mod.rs

//! Results of running actions, and their history across runs.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub mod annotated;
pub mod store;

pub use annotated::{AnnotatedOutcome, Change};
pub use store::OutcomeStore;

/// Raw result of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionResult {
    Success,
    ExecFailed,
    CompileFailed,
    Timeout,
    /// The action cannot run here (missing source, unknown entry point, ...).
    Unsupported,
    /// Infrastructure problem while preparing or running the action.
    Error,
}

impl ActionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionResult::Success => "SUCCESS",
            ActionResult::ExecFailed => "EXEC_FAILED",
            ActionResult::CompileFailed => "COMPILE_FAILED",
            ActionResult::Timeout => "TIMEOUT",
            ActionResult::Unsupported => "UNSUPPORTED",
            ActionResult::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(ActionResult::Success),
            "EXEC_FAILED" => Some(ActionResult::ExecFailed),
            "COMPILE_FAILED" => Some(ActionResult::CompileFailed),
            "TIMEOUT" => Some(ActionResult::Timeout),
            "UNSUPPORTED" => Some(ActionResult::Unsupported),
            "ERROR" => Some(ActionResult::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a result against its expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultValue {
    Ok,
    Fail,
    /// Unexpected, but the expectation is known to be flaky.
    Warning,
    /// The action did not run here.
    Ignore,
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResultValue::Ok => "OK",
            ResultValue::Fail => "FAIL",
            ResultValue::Warning => "WARNING",
            ResultValue::Ignore => "IGNORE",
        })
    }
}

/// Result of executing one action (or one test inside it) once.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub name: String,
    pub result: ActionResult,
    pub output_lines: Vec<String>,
    pub timestamp: DateTime<Local>,
}

impl Outcome {
    pub fn new(name: impl Into<String>, result: ActionResult, output_lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            result,
            output_lines,
            timestamp: Local::now(),
        }
    }

    pub fn output(&self) -> String {
        self.output_lines.join("\n")
    }
}
