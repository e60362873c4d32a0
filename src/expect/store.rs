// src/expect/store.rs

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{CrossrunError, Result};
use crate::outcome::{ActionResult, Outcome};
use crate::types::{ModeKind, Variant};

use super::expectation::Expectation;

/// One rule as written in an expectation file.
///
/// ```json
/// [
///   {
///     "description": "OOM on 32-bit hosts",
///     "result": "EXEC_FAILED",
///     "names": ["com.example.BigTest#testHuge"],
///     "tags": ["large"],
///     "modes_variants": [["host", "x32"]],
///     "bug": 1234
///   },
///   { "result": "EXEC_FAILED", "pattern": ".*device offline.*", "tags": ["flaky"] }
/// ]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    bug: Option<u64>,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    modes: Vec<ModeKind>,
    #[serde(default)]
    modes_variants: Vec<(ModeKind, Variant)>,
}

impl RawRule {
    fn applies_to(&self, mode: ModeKind, variant: Variant) -> bool {
        (self.modes.is_empty() || self.modes.contains(&mode))
            && (self.modes_variants.is_empty() || self.modes_variants.contains(&(mode, variant)))
    }
}

/// Expectations for the current mode and variant.
#[derive(Debug, Clone)]
pub struct ExpectationStore {
    mode: ModeKind,
    variant: Variant,
    /// Rules keyed by exact action, class or package name.
    outcomes: HashMap<String, Expectation>,
    /// Pattern-only rules, in declaration order.
    failures: Vec<Expectation>,
    default: Expectation,
}

impl ExpectationStore {
    pub fn new(mode: ModeKind, variant: Variant) -> Self {
        Self {
            mode,
            variant,
            outcomes: HashMap::new(),
            failures: Vec::new(),
            default: Expectation::success(),
        }
    }

    /// Load every file in order. Duplicate names across files are an error.
    pub fn parse<P: AsRef<Path>>(files: &[P], mode: ModeKind, variant: Variant) -> Result<Self> {
        let mut store = Self::new(mode, variant);
        for file in files {
            let file = file.as_ref();
            let contents = fs::read_to_string(file).map_err(|e| {
                CrossrunError::Expectation(format!("reading {}: {e}", file.display()))
            })?;
            store.add_rules(&contents, &file.display().to_string())?;
        }
        info!(
            exact = store.outcomes.len(),
            patterns = store.failures.len(),
            "expectations loaded"
        );
        Ok(store)
    }

    /// Add the rules of one JSON document; `source` names it in errors.
    pub fn add_rules(&mut self, json: &str, source: &str) -> Result<()> {
        let rules: Vec<RawRule> = serde_json::from_str(json)
            .map_err(|e| CrossrunError::Expectation(format!("{source}: {e}")))?;

        for rule in rules {
            if !rule.applies_to(self.mode, self.variant) {
                debug!(source, names = ?rule.names, "rule excluded for this mode");
                continue;
            }
            self.add_rule(rule, source)?;
        }
        Ok(())
    }

    fn add_rule(&mut self, rule: RawRule, source: &str) -> Result<()> {
        let result = match rule.result.as_deref() {
            None => ActionResult::Success,
            Some(s) => ActionResult::parse(s).ok_or_else(|| {
                CrossrunError::Expectation(format!("{source}: unknown result '{s}'"))
            })?,
        };

        let mut names = rule.names;
        if let Some(name) = rule.name {
            names.push(name);
        }

        let expectation = Expectation::new(
            result,
            rule.pattern.as_deref(),
            rule.tags,
            rule.description,
            rule.bug,
        )?;

        if names.is_empty() {
            if expectation.pattern().is_none() {
                return Err(CrossrunError::Expectation(format!(
                    "{source}: rule needs a name, names or a pattern"
                )));
            }
            self.failures.push(expectation);
            return Ok(());
        }

        for name in names {
            if self.outcomes.contains_key(&name) {
                return Err(CrossrunError::Expectation(format!(
                    "{source}: duplicate expectation for '{name}'"
                )));
            }
            self.outcomes.insert(name, expectation.clone());
        }
        Ok(())
    }

    /// Expectation for an outcome.
    ///
    /// 1. exact name;
    /// 2. first pattern rule whose result and pattern match;
    /// 3. enclosing class, then package, and so on;
    /// 4. expect success.
    pub fn get(&self, outcome: &Outcome) -> &Expectation {
        if let Some(exact) = self.outcomes.get(&outcome.name) {
            return exact;
        }

        if let Some(failure) = self.failures.iter().find(|e| e.matches(outcome)) {
            return failure;
        }

        self.get_by_name(&outcome.name)
    }

    /// Expectation by name alone, walking `.`/`#` prefixes.
    pub fn get_by_name(&self, name: &str) -> &Expectation {
        let mut current = name;
        loop {
            if let Some(e) = self.outcomes.get(current) {
                return e;
            }
            match current.rfind(['.', '#']) {
                Some(idx) => current = &current[..idx],
                None => return &self.default,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ResultValue;

    fn store(json: &str) -> ExpectationStore {
        let mut store = ExpectationStore::new(ModeKind::Device, Variant::X32);
        store.add_rules(json, "test.json").unwrap();
        store
    }

    fn outcome(name: &str, result: ActionResult, output: &str) -> Outcome {
        Outcome::new(name, result, output.lines().map(String::from).collect())
    }

    #[test]
    fn exact_name_beats_matching_pattern_rule() {
        let store = store(
            r#"[
                {"result": "EXEC_FAILED", "pattern": ".*Segmentation fault.*", "tags": ["flaky"],
                 "description": "any segfault"},
                {"result": "EXEC_FAILED", "name": "libcore.CrashTest", "description": "known crash"}
            ]"#,
        );
        let crash = outcome("libcore.CrashTest", ActionResult::ExecFailed, "Segmentation fault");
        let e = store.get(&crash);
        assert_eq!(e.description.as_deref(), Some("known crash"));
        assert_eq!(e.classify(crash.result), ResultValue::Ok);

        let other = outcome("libcore.OtherTest", ActionResult::ExecFailed, "Segmentation fault");
        assert_eq!(store.get(&other).description.as_deref(), Some("any segfault"));
    }

    #[test]
    fn pattern_rule_beats_package_prefix() {
        let store = store(
            r#"[
                {"result": "EXEC_FAILED", "names": ["libcore"]},
                {"result": "TIMEOUT", "pattern": ".*hung.*", "tags": ["flaky"]}
            ]"#,
        );
        let hung = outcome("libcore.net.UrlTest#testGet", ActionResult::Timeout, "hung in read");
        assert!(store.get(&hung).is_flaky());

        let other = outcome("libcore.net.UrlTest#testGet", ActionResult::ExecFailed, "boom");
        assert_eq!(store.get(&other).result, ActionResult::ExecFailed);
    }

    #[test]
    fn walks_method_class_package() {
        let store = store(r#"[{"result": "EXEC_FAILED", "name": "a.b.C"}]"#);
        assert_eq!(store.get_by_name("a.b.C#m").result, ActionResult::ExecFailed);
        assert_eq!(store.get_by_name("a.b.D#m").result, ActionResult::Success);
    }

    #[test]
    fn rules_for_other_modes_are_absent() {
        let store = store(
            r#"[
                {"result": "EXEC_FAILED", "name": "a.B", "modes": ["jvm"]},
                {"result": "TIMEOUT", "name": "a.C", "modes_variants": [["device", "x64"]]},
                {"result": "TIMEOUT", "name": "a.D", "modes_variants": [["device", "x32"]]}
            ]"#,
        );
        assert_eq!(store.get_by_name("a.B").result, ActionResult::Success);
        assert_eq!(store.get_by_name("a.C").result, ActionResult::Success);
        assert_eq!(store.get_by_name("a.D").result, ActionResult::Timeout);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut store = ExpectationStore::new(ModeKind::Jvm, Variant::X32);
        store
            .add_rules(r#"[{"result": "EXEC_FAILED", "name": "a.B"}]"#, "one.json")
            .unwrap();
        let err = store
            .add_rules(r#"[{"result": "TIMEOUT", "name": "a.B"}]"#, "two.json")
            .unwrap_err();
        assert!(matches!(err, CrossrunError::Expectation(msg) if msg.contains("two.json")));
    }

    #[test]
    fn unknown_result_is_rejected() {
        let mut store = ExpectationStore::new(ModeKind::Jvm, Variant::X32);
        assert!(store
            .add_rules(r#"[{"result": "MAYBE", "name": "a"}]"#, "x.json")
            .is_err());
    }
}
