// tests/expectations_and_history.rs

use chrono::{Local, TimeZone};

use crossrun::expect::ExpectationStore;
use crossrun::outcome::{ActionResult, Change, Outcome, OutcomeStore, ResultValue};
use crossrun::types::{ModeKind, Variant};

fn write(dir: &std::path::Path, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn exact_name_beats_pattern_beats_enclosing_class() {
    let dir = tempfile::tempdir().unwrap();
    let known = write(
        dir.path(),
        "known.json",
        r#"[
          { "description": "exact", "result": "EXEC_FAILED", "name": "a.B#flaky", "tags": ["flaky"] },
          { "description": "pattern", "result": "EXEC_FAILED", "pattern": ".*device offline.*" },
          { "description": "class", "result": "TIMEOUT", "name": "a.B", "tags": ["large"] }
        ]"#,
    );
    let host_only = write(
        dir.path(),
        "host.json",
        r#"[{ "result": "UNSUPPORTED", "name": "a.C", "modes": ["host"] }]"#,
    );
    let store = ExpectationStore::parse(&[known, host_only], ModeKind::Device, Variant::X64).unwrap();

    let offline = Outcome::new(
        "a.B#flaky",
        ActionResult::ExecFailed,
        vec!["error: device offline".into()],
    );
    assert_eq!(store.get(&offline).description.as_deref(), Some("exact"));
    assert_eq!(store.get(&offline).classify(ActionResult::ExecFailed), ResultValue::Ok);
    assert_eq!(store.get(&offline).classify(ActionResult::Success), ResultValue::Warning);

    let other = Outcome::new(
        "a.B#other",
        ActionResult::ExecFailed,
        vec!["error: device offline".into()],
    );
    assert_eq!(store.get(&other).description.as_deref(), Some("pattern"));

    let slow = Outcome::new("a.B#slow", ActionResult::Timeout, vec![]);
    assert_eq!(store.get(&slow).description.as_deref(), Some("class"));
    assert!(store.get_by_name("a.B#slow").is_large());

    // The host-only rule does not apply in device mode.
    let c = Outcome::new("a.C", ActionResult::Unsupported, vec![]);
    assert_eq!(store.get(&c).result, ActionResult::Success);
    assert_eq!(store.get(&c).classify(c.result), ResultValue::Ignore);
}

#[test]
fn duplicate_names_across_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let first = write(dir.path(), "first.json", r#"[{ "name": "a.B" }]"#);
    let second = write(dir.path(), "second.json", r#"[{ "name": "a.B", "result": "TIMEOUT" }]"#);
    let err = ExpectationStore::parse(&[first, second], ModeKind::Jvm, Variant::X32).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("second.json") && msg.contains("a.B"), "{msg}");
}

#[test]
fn regression_is_noteworthy_and_stable_success_is_not() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutcomeStore::new(dir.path(), 10);
    let expectations = ExpectationStore::new(ModeKind::Jvm, Variant::X32);
    let yesterday = Local.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
    store
        .write_at(
            &[
                Outcome::new("a.Stable", ActionResult::Success, vec![]),
                Outcome::new("a.Regresses", ActionResult::Success, vec![]),
                Outcome::new("a.Fixed", ActionResult::ExecFailed, vec![]),
            ],
            yesterday,
        )
        .unwrap();

    let annotated = store
        .annotate(
            vec![
                Outcome::new("a.Stable", ActionResult::Success, vec![]),
                Outcome::new("a.Regresses", ActionResult::Timeout, vec![]),
                Outcome::new("a.Fixed", ActionResult::Success, vec![]),
            ],
            &expectations,
        )
        .unwrap();

    let by_name = |name: &str| annotated.iter().find(|a| a.name() == name).unwrap();
    assert!(!by_name("a.Stable").is_noteworthy());
    assert_eq!(by_name("a.Stable").change(), Change::Unchanged);
    assert!(by_name("a.Regresses").is_noteworthy());
    assert_eq!(by_name("a.Regresses").change(), Change::Regressed);
    assert_eq!(by_name("a.Regresses").history_string(10), ".F");
    assert!(by_name("a.Fixed").is_noteworthy());
    assert_eq!(by_name("a.Fixed").change(), Change::Fixed);
    assert_eq!(
        by_name("a.Fixed").previous_result_value(),
        Some(ResultValue::Fail)
    );
}

#[test]
fn only_the_newest_runs_are_retained() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutcomeStore::new(dir.path(), 10);
    for minute in 0..15 {
        let at = Local.with_ymd_and_hms(2026, 5, 1, 12, minute, 0).unwrap();
        let result = if minute % 2 == 0 {
            ActionResult::Success
        } else {
            ActionResult::ExecFailed
        };
        store.write_at(&[Outcome::new("a.B", result, vec![])], at).unwrap();
    }

    let mut files: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files.len(), 10);
    assert_eq!(files[0], "outcomes-20260501T120500000.json");
    assert_eq!(files[9], "outcomes-20260501T121400000.json");

    let runs = store.read().unwrap();
    assert_eq!(runs.len(), 10);
    assert_eq!(runs[0].timestamp, "20260501T120500000");
}
