// src/report.rs

//! Console output: streamed outcome lines and the end-of-run summary.
//!
//! Diagnostics go through `tracing` to stderr; everything here is written to
//! stdout (or any `Write` in tests).

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::outcome::{AnnotatedOutcome, Change};

/// Receives one line per recorded outcome, as soon as it is known.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, outcome_name: &str, result_line: &str);
}

/// Prints `name: RESULT (VALUE)` lines.
#[derive(Debug)]
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> OutcomeSink for ConsoleSink<W> {
    fn record(&self, outcome_name: &str, result_line: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A closed stdout must not fail the run.
        let _ = writeln!(out, "{outcome_name}: {result_line}");
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub successes: usize,
    pub failures: usize,
    pub skipped: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub counters: Counters,
    pub jar_suggestions: BTreeSet<PathBuf>,
    pub elapsed: Duration,
}

/// Outcomes that are unexpected now or differ from the previous run, with
/// their history and output.
pub fn print_noteworthy<W: Write>(
    out: &mut W,
    annotated: &[AnnotatedOutcome],
    max_history: usize,
) -> io::Result<()> {
    let noteworthy: Vec<_> = annotated.iter().filter(|a| a.is_noteworthy()).collect();
    if noteworthy.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "noteworthy results ({}):", noteworthy.len())?;
    for a in noteworthy {
        let change = match a.change() {
            Change::New => "new",
            Change::Unchanged => "unchanged",
            Change::Regressed => "regressed",
            Change::Fixed => "fixed",
            Change::Changed => "changed",
        };
        writeln!(
            out,
            "  {} {} ({}) [{}] history {}",
            a.name(),
            a.outcome.result,
            a.result_value(),
            change,
            a.history_string(max_history)
        )?;
        if let Some(description) = &a.expectation.description {
            writeln!(out, "    expected: {description}")?;
        }
        if let Some(bug) = a.expectation.bug {
            writeln!(out, "    bug: {bug}")?;
        }
        for line in &a.outcome.output_lines {
            writeln!(out, "    | {line}")?;
        }
    }
    Ok(())
}

pub fn print_summary<W: Write>(out: &mut W, summary: &Summary) -> io::Result<()> {
    let c = &summary.counters;
    writeln!(out)?;
    writeln!(
        out,
        "outcomes: {} succeeded, {} failed, {} skipped, {} warnings ({:.1}s)",
        c.successes,
        c.failures,
        c.skipped,
        c.warnings,
        summary.elapsed.as_secs_f64()
    )?;
    if !summary.jar_suggestions.is_empty() {
        writeln!(out, "missing classes may be provided by:")?;
        for jar in &summary.jar_suggestions {
            writeln!(out, "  {}", jar.display())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::expect::Expectation;
    use crate::outcome::{ActionResult, Outcome};

    #[test]
    fn console_sink_writes_one_line_per_outcome() {
        let sink = ConsoleSink::new(Vec::new());
        sink.record("a.B#test", "SUCCESS (OK)");
        sink.record("a.C", "EXEC_FAILED (FAIL)");
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "a.B#test: SUCCESS (OK)\na.C: EXEC_FAILED (FAIL)\n");
    }

    #[test]
    fn only_noteworthy_outcomes_are_printed() {
        let failing = AnnotatedOutcome::new(
            Outcome::new("a.Fails", ActionResult::ExecFailed, vec!["boom".into()]),
            Expectation::success(),
            BTreeMap::new(),
        );
        let passing = AnnotatedOutcome::new(
            Outcome::new("a.Passes", ActionResult::Success, vec![]),
            Expectation::success(),
            BTreeMap::new(),
        );

        let mut out = Vec::new();
        print_noteworthy(&mut out, &[failing, passing], 10).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("a.Fails EXEC_FAILED (FAIL) [new]"));
        assert!(text.contains("    | boom"));
        assert!(!text.contains("a.Passes"));
    }

    #[test]
    fn summary_lists_jar_suggestions() {
        let summary = Summary {
            counters: Counters {
                successes: 3,
                failures: 1,
                ..Default::default()
            },
            jar_suggestions: [PathBuf::from("/libs/junit.jar")].into_iter().collect(),
            elapsed: Duration::from_millis(1500),
        };
        let mut out = Vec::new();
        print_summary(&mut out, &summary).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("3 succeeded, 1 failed, 0 skipped, 0 warnings (1.5s)"));
        assert!(text.contains("  /libs/junit.jar"));
    }
}
