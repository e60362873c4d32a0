// tests/config_errors.rs

use std::io::Write;

use crossrun::config::load_and_validate;
use crossrun::errors::CrossrunError;
use crossrun::types::{ModeKind, TargetKind};

fn load(toml: &str) -> Result<crossrun::config::ConfigFile, CrossrunError> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    load_and_validate(file.path())
}

fn config_error(toml: &str) -> String {
    match load(toml) {
        Err(CrossrunError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn full_config_loads_with_defaults() {
    let cfg = load(
        r#"
        [run]
        mode = "device"
        target = "bridge"
        variant = "x64"
        expectations = ["known.json"]

        [bridge]
        serial = "emulator-5554"

        [toolchain]
        classpath = ["libs/junit.jar"]

        [action.MathTest]
        target_class = "com.example.MathTest"
        source = "tests/MathTest.java"
        "#,
    )
    .unwrap();

    assert_eq!(cfg.run.mode, ModeKind::Device);
    assert_eq!(cfg.run.target, TargetKind::Bridge);
    assert_eq!(cfg.run.timeout_secs, 60);
    assert_eq!(cfg.run.retention, 10);
    assert_eq!(cfg.bridge.executable, "adb");
    assert_eq!(cfg.toolchain.dexer, "d8");
    assert_eq!(
        cfg.action["MathTest"].target_class.as_deref(),
        Some("com.example.MathTest")
    );
}

#[test]
fn semantic_errors_are_reported() {
    assert!(config_error("[run]\nmode = \"jvm\"\n").contains("at least one"));

    let msg = config_error("[run]\ntarget = \"ssh\"\n[action.A]\n");
    assert!(msg.contains("[ssh]"), "{msg}");

    let msg = config_error("[run]\nmode = \"device\"\n[action.A]\n");
    assert!(msg.contains("local target"), "{msg}");

    let msg = config_error("[run]\nmode = \"jvm\"\ntarget = \"bridge\"\n[action.A]\n");
    assert!(msg.contains("requires the local target"), "{msg}");

    let msg = config_error(
        "[run]\nmode = \"activity\"\ntarget = \"bridge\"\nvm_args = [\"-Xmx1g\"]\n[action.A]\n",
    );
    assert!(msg.contains("vm_args"), "{msg}");

    let msg = config_error("[run]\nconcurrency = 0\n[action.A]\n");
    assert!(msg.contains("concurrency"), "{msg}");
}

#[test]
fn unknown_mode_is_a_parse_error() {
    assert!(matches!(
        load("[run]\nmode = \"wasm\"\n[action.A]\n"),
        Err(CrossrunError::TomlError(_))
    ));
}

#[test]
fn invoke_with_is_split_with_shell_quoting() {
    let cfg = load(
        "[run]\nmode = \"jvm\"\ninvoke_with = \"valgrind --tool='a b'\"\n[action.A]\n",
    )
    .unwrap();
    assert_eq!(
        cfg.run.invoke_with_argv().unwrap(),
        vec!["valgrind", "--tool=a b"]
    );

    let msg = config_error("[run]\ninvoke_with = \"strace 'unterminated\"\n[action.A]\n");
    assert!(msg.contains("invoke_with"), "{msg}");
}

#[test]
fn missing_config_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(crossrun::config::DEFAULT_CONFIG_FILE);
    match load_and_validate(&path) {
        Err(CrossrunError::ConfigError(msg)) => assert!(msg.contains("Crossrun.toml"), "{msg}"),
        other => panic!("expected a config error, got {other:?}"),
    }
}
