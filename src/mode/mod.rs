// src/mode/mod.rs

//! How an action runs once it is on a target: which runtime, which install
//! and cleanup steps, and how its command line is built.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::cache::{FileCache, Md5Cache};
use crate::config::{ConfigFile, ToolchainSection};
use crate::engine::{Task, TaskOutcome};
use crate::errors::Result;
use crate::exec::{ExitStatus, ProcessOutput};
use crate::outcome::{ActionResult, Outcome};
use crate::target::{ScriptBuilder, Target};
use crate::types::ModeKind;

pub mod dex;
pub mod vm_command;

pub use dex::Dexer;
pub use vm_command::{VmCommandBuilder, VmFlavor};

/// In-band marker a runner prints to report one test: `%%%outcome <name> <RESULT>`.
pub const OUTCOME_MARKER: &str = "%%%outcome ";

/// Last line the activity host appends to its outcome file: `%%%exit <code>`.
pub const EXIT_MARKER: &str = "%%%exit ";

/// Outcome file of an activity run, inside the action directory.
pub const ACTIVITY_OUTCOME_FILE: &str = "outcomes.log";

const ACTIVITY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where the runtime classpath comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClasspathSource {
    /// Host jars, used in place.
    LocalJars,
    /// Toolchain jars dexed and pushed to `<run_dir>/classpath`.
    PushedDexJars,
    /// Jars already on the device, by name.
    DeviceBootClasspath,
    /// Only the action's own jar; the host application provides the rest.
    None,
}

impl ModeKind {
    pub fn needs_dex(&self) -> bool {
        !matches!(self, ModeKind::Jvm)
    }

    pub fn accepts_vm_args(&self) -> bool {
        !matches!(self, ModeKind::Activity)
    }

    /// A single host activity runs one action at a time.
    pub fn max_concurrency(&self) -> usize {
        match self {
            ModeKind::Activity => 1,
            _ => usize::MAX,
        }
    }

    pub fn classpath_source(&self) -> ClasspathSource {
        match self {
            ModeKind::Jvm => ClasspathSource::LocalJars,
            ModeKind::Host | ModeKind::Device => ClasspathSource::PushedDexJars,
            ModeKind::AppProcess => ClasspathSource::DeviceBootClasspath,
            ModeKind::Activity => ClasspathSource::None,
        }
    }

    pub fn flavor(&self) -> VmFlavor {
        match self {
            ModeKind::Jvm => VmFlavor::Jvm,
            ModeKind::Host | ModeKind::Device => VmFlavor::Art,
            ModeKind::AppProcess => VmFlavor::AppProcess,
            ModeKind::Activity => VmFlavor::ActivityManager,
        }
    }
}

/// A mode bound to one run: target, toolchain and run-wide options.
#[derive(Debug)]
pub struct Mode {
    kind: ModeKind,
    target: Arc<Target>,
    toolchain: ToolchainSection,
    dexer: Dexer,
    run_dir: String,
    local_dir: PathBuf,
    timeout_secs: u64,
    large_timeout_multiplier: u32,
    clean_before: bool,
    clean_after: bool,
    vm_args: Vec<String>,
    target_args: Vec<String>,
    debug_port: Option<u16>,
    profile: bool,
    invoke_with: Vec<String>,
    device_user: OnceLock<String>,
}

impl Mode {
    /// Relative toolchain jars are resolved against `base_dir`.
    pub fn new(
        config: &ConfigFile,
        target: Arc<Target>,
        cache: Arc<dyn FileCache>,
        base_dir: &Path,
    ) -> Result<Self> {
        let mut toolchain = config.toolchain.clone();
        toolchain.classpath = toolchain
            .classpath
            .iter()
            .map(|p| base_dir.join(p))
            .collect();

        let run = &config.run;
        Ok(Self {
            kind: run.mode,
            target,
            dexer: Dexer::new(toolchain.dexer.clone(), Md5Cache::new("dex", cache)),
            toolchain,
            run_dir: run.run_dir.to_string_lossy().trim_end_matches('/').to_string(),
            local_dir: base_dir.join(&run.local_dir),
            timeout_secs: run.timeout_secs,
            large_timeout_multiplier: run.large_timeout_multiplier,
            clean_before: run.clean_before,
            clean_after: run.clean_after,
            vm_args: run.vm_args.clone(),
            target_args: run.target_args.clone(),
            debug_port: run.debug_port,
            profile: run.profile,
            invoke_with: run.invoke_with_argv()?,
            device_user: OnceLock::new(),
        })
    }

    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    pub fn target(&self) -> &Arc<Target> {
        &self.target
    }

    pub fn run_dir(&self) -> &str {
        &self.run_dir
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn dexer(&self) -> &Dexer {
        &self.dexer
    }

    pub fn toolchain(&self) -> &ToolchainSection {
        &self.toolchain
    }

    fn classpath_dir(&self) -> String {
        format!("{}/classpath", self.run_dir)
    }

    /// The action's private directory on the target.
    pub fn action_dir(&self, action: &Action) -> String {
        action
            .user_dir()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/{}", self.run_dir, action.name))
    }

    /// Location of the action's jar on the target.
    pub fn action_jar(&self, action: &Action) -> String {
        format!("{}/{}", self.action_dir(action), action.jar_name())
    }

    /// Wall-clock limit for one execution; `None` when disabled.
    pub fn timeout(&self, use_large_timeout: bool) -> Option<Duration> {
        if self.timeout_secs == 0 {
            return None;
        }
        let factor = if use_large_timeout {
            u64::from(self.large_timeout_multiplier)
        } else {
            1
        };
        Some(Duration::from_secs(self.timeout_secs.saturating_mul(factor)))
    }

    /// Clean and create the run directory, then record the device user.
    pub async fn prepare_target(&self) -> Result<()> {
        self.target.prepare(&self.run_dir, self.clean_before).await?;
        if matches!(self.kind, ModeKind::Host | ModeKind::Device) {
            // The runtime compiles into ANDROID_DATA/dalvik-cache.
            self.target
                .mkdirs(&format!("{}/android-data/dalvik-cache", self.run_dir))
                .await?;
        }
        if self.kind != ModeKind::Jvm {
            let user = self.target.device_user_name().await?;
            debug!(user = %user, "device user resolved");
            let _ = self.device_user.set(user);
        }
        Ok(())
    }

    /// One-time setup shared by every action.
    pub fn install_tasks(self: &Arc<Self>) -> Vec<Task> {
        if self.kind.classpath_source() != ClasspathSource::PushedDexJars {
            return Vec::new();
        }
        self.toolchain
            .classpath
            .iter()
            .map(|jar| {
                let file_name = jar_file_name(jar);
                let mode = Arc::clone(self);
                let jar = jar.clone();
                let name = format!("install classpath {file_name}");
                Task::new(name, async move {
                    let dexed = mode.local_dir.join("classpath").join(&file_name);
                    mode.dexer.dex(&jar, &dexed).await?;
                    mode.target.mkdirs(&mode.classpath_dir()).await?;
                    mode.target
                        .push(&dexed, &format!("{}/{file_name}", mode.classpath_dir()))
                        .await?;
                    Ok(TaskOutcome::Success)
                })
            })
            .collect()
    }

    /// Names of [`Mode::install_tasks`], for wiring dependencies.
    pub fn install_task_names(&self) -> Vec<String> {
        if self.kind.classpath_source() != ClasspathSource::PushedDexJars {
            return Vec::new();
        }
        self.toolchain
            .classpath
            .iter()
            .map(|jar| format!("install classpath {}", jar_file_name(jar)))
            .collect()
    }

    /// Push the built artifact (and resources) into the action's directory,
    /// which must already exist.
    pub fn install_action_tasks(self: &Arc<Self>, action: &Action, artifact: PathBuf) -> Vec<Task> {
        let mode = Arc::clone(self);
        let action = action.clone();
        vec![Task::new(format!("install {}", action.name), async move {
            let dir = mode.action_dir(&action);
            mode.target.push(&artifact, &mode.action_jar(&action)).await?;
            if let Some(resources) = &action.resource_dir {
                mode.target
                    .push(resources, &format!("{dir}/resources"))
                    .await?;
            }
            info!(action = %action.name, "installed");
            Ok(TaskOutcome::Success)
        })]
    }

    /// The task that runs the action. Its outcomes go to `record`.
    pub fn execute_action_task<F>(
        self: &Arc<Self>,
        action: &Action,
        use_large_timeout: bool,
        record: F,
    ) -> Task
    where
        F: Fn(Outcome) + Send + Sync + 'static,
    {
        let mode = Arc::clone(self);
        let action = action.clone();
        Task::new(format!("run {}", action.name), async move {
            let outcomes = mode.execute(&action, use_large_timeout).await?;
            let all_succeeded = outcomes.iter().all(|o| o.result == ActionResult::Success);
            for outcome in outcomes {
                record(outcome);
            }
            Ok(if all_succeeded {
                TaskOutcome::Success
            } else {
                TaskOutcome::Failed
            })
        })
    }

    /// Run the action once and turn its output into outcomes.
    pub async fn execute(&self, action: &Action, use_large_timeout: bool) -> Result<Vec<Outcome>> {
        if action.target_class.is_none() {
            return Ok(vec![Outcome::new(
                action.name.clone(),
                ActionResult::Unsupported,
                vec!["no target class".to_string()],
            )]);
        }
        if let Some(port) = self.debug_port {
            if let Err(e) = self.target.forward_tcp(port).await {
                warn!(action = %action.name, port, error = %e, "port forwarding failed; continuing");
            }
        }

        let workdir = self.action_dir(action);
        let vm = self.new_vm_command_builder(action, &workdir);
        let mut script = self.target.script_builder().working_dir(workdir);
        for (key, value) in vm.environment() {
            script = script.env(key, value);
        }
        let script = script.tokens(vm.build());

        let timeout = self.timeout(use_large_timeout);
        info!(action = %action.name, ?timeout, "executing");
        if self.kind == ModeKind::Activity {
            return self.execute_activity(action, &script, timeout).await;
        }
        let output = self.target.run_script(&script, timeout).await?;
        Ok(parse_outcomes(&action.name, &output))
    }

    /// `am start` returns once the activity is up, so the result comes from
    /// the outcome file the host application writes.
    async fn execute_activity(
        &self,
        action: &Action,
        launch: &ScriptBuilder,
        timeout: Option<Duration>,
    ) -> Result<Vec<Outcome>> {
        let outcome_file = self.activity_outcome_file(action);
        self.target.rm(&outcome_file).await?;

        let deadline = timeout.map(|t| Instant::now() + t);
        let launched = self.target.run_script(launch, timeout).await?;
        if !launched.success() {
            return Ok(parse_outcomes(&action.name, &launched));
        }

        let read = self.target.script_builder().tokens(["cat", outcome_file.as_str()]);
        loop {
            let contents = self.target.run_script(&read, None).await?;
            let lines = if contents.success() { contents.lines } else { Vec::new() };
            if let Some(output) = finished_activity(&lines) {
                return Ok(parse_outcomes(&action.name, &output));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(action = %action.name, "activity did not finish in time");
                let output = ProcessOutput {
                    status: ExitStatus::TimedOut,
                    lines,
                };
                return Ok(parse_outcomes(&action.name, &output));
            }
            tokio::time::sleep(ACTIVITY_POLL_INTERVAL).await;
        }
    }

    fn activity_outcome_file(&self, action: &Action) -> String {
        format!("{}/{ACTIVITY_OUTCOME_FILE}", self.action_dir(action))
    }

    pub fn cleanup_tasks(self: &Arc<Self>, action: &Action) -> Vec<Task> {
        if !self.clean_after {
            return Vec::new();
        }
        let mode = Arc::clone(self);
        let action = action.clone();
        vec![Task::new(format!("cleanup {}", action.name), async move {
            mode.target.rm(&mode.action_dir(&action)).await?;
            Ok(TaskOutcome::Success)
        })]
    }

    pub fn new_vm_command_builder(&self, action: &Action, workdir: &str) -> VmCommandBuilder {
        let executable = match self.kind {
            ModeKind::Jvm => self.toolchain.java.clone(),
            ModeKind::Host | ModeKind::Device => self.toolchain.runtime.clone(),
            ModeKind::AppProcess => self.toolchain.app_process.clone(),
            ModeKind::Activity => "am".to_string(),
        };

        let mut builder = VmCommandBuilder::new(self.kind.flavor(), executable)
            .classpath(self.runtime_classpath(action))
            .user_dir(workdir)
            .args(action.args.iter().cloned())
            .args(self.target_args.iter().cloned());
        if let Some(class) = &action.target_class {
            builder = builder.main_class(class.clone());
        }

        if self.kind == ModeKind::Activity {
            return builder
                .activity(&self.toolchain.activity_package, &self.toolchain.activity_class)
                .outcome_file(self.activity_outcome_file(action));
        }

        builder = builder
            .vm_args(self.vm_args.iter().cloned())
            .debug_port(self.debug_port)
            .profile(self.profile)
            .invoke_with(self.invoke_with.clone());

        if let Some(user) = self.device_user.get() {
            builder = builder.vm_args([format!("-Duser.name={user}")]);
        }
        if matches!(self.kind, ModeKind::Host | ModeKind::Device) {
            builder = builder.env("ANDROID_DATA", format!("{}/android-data", self.run_dir));
            if self.kind == ModeKind::Device && !self.toolchain.device_boot_classpath.is_empty() {
                builder = builder.boot_classpath(self.toolchain.device_boot_classpath.iter().cloned());
            }
        }
        builder
    }

    /// Classpath the action runs with, in resolution order.
    pub fn runtime_classpath(&self, action: &Action) -> Vec<String> {
        let mut classpath: Vec<String> = match self.kind.classpath_source() {
            ClasspathSource::LocalJars => self
                .toolchain
                .classpath
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            ClasspathSource::PushedDexJars => self
                .toolchain
                .classpath
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| format!("{}/{}", self.classpath_dir(), n.to_string_lossy()))
                .collect(),
            ClasspathSource::DeviceBootClasspath => self.toolchain.device_boot_classpath.clone(),
            ClasspathSource::None => Vec::new(),
        };
        classpath.push(self.action_jar(action));
        classpath
    }
}

fn jar_file_name(jar: &Path) -> String {
    jar.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| jar.to_string_lossy().into_owned())
}

/// The activity's output once its outcome file ends with [`EXIT_MARKER`].
fn finished_activity(lines: &[String]) -> Option<ProcessOutput> {
    let (last, rest) = lines.split_last()?;
    let code = last.strip_prefix(EXIT_MARKER)?.trim().parse().ok()?;
    Some(ProcessOutput {
        status: ExitStatus::Exited(code),
        lines: rest.to_vec(),
    })
}

/// Split output into per-test outcomes using [`OUTCOME_MARKER`] lines.
///
/// Output before a marker belongs to that marker's outcome. Without markers,
/// or when the process did not exit cleanly, an outcome named after the
/// action reports the process result.
pub fn parse_outcomes(action_name: &str, output: &ProcessOutput) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    let mut buffer: Vec<String> = Vec::new();

    for line in &output.lines {
        if let Some(rest) = line.strip_prefix(OUTCOME_MARKER) {
            let mut parts = rest.split_whitespace();
            if let (Some(name), Some(result)) =
                (parts.next(), parts.next().and_then(ActionResult::parse))
            {
                outcomes.push(Outcome::new(name, result, mem::take(&mut buffer)));
                continue;
            }
        }
        buffer.push(line.clone());
    }

    let process_result = match output.status {
        ExitStatus::TimedOut => ActionResult::Timeout,
        ExitStatus::Exited(0) => ActionResult::Success,
        ExitStatus::Exited(_) => ActionResult::ExecFailed,
    };
    if outcomes.is_empty() || process_result != ActionResult::Success {
        outcomes.push(Outcome::new(action_name, process_result, buffer));
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfigFile;
    use crate::target::LocalTarget;

    fn mode(kind: ModeKind, configure: impl FnOnce(&mut RawConfigFile)) -> Arc<Mode> {
        let mut raw = RawConfigFile::default();
        raw.run.mode = kind;
        raw.run.run_dir = "/data/run".into();
        raw.toolchain.classpath = vec!["libs/junit.jar".into()];
        raw.toolchain.device_boot_classpath = vec!["/system/framework/core.jar".into()];
        configure(&mut raw);
        let config = ConfigFile::new_unchecked(raw);
        Arc::new(Mode::new(
            &config,
            Arc::new(Target::Local(LocalTarget)),
            crate::cache::open(None),
            Path::new("/proj"),
        )
        .unwrap())
    }

    fn action() -> Action {
        let mut action = Action::new("MathTest").with_target_class("a.MathTest");
        action.assign_user_dir("/data/run");
        action
    }

    fn output(status: ExitStatus, lines: &[&str]) -> ProcessOutput {
        ProcessOutput {
            status,
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn per_kind_facts() {
        assert!(!ModeKind::Jvm.needs_dex());
        assert!(ModeKind::Activity.needs_dex());
        assert!(!ModeKind::Activity.accepts_vm_args());
        assert_eq!(ModeKind::Activity.max_concurrency(), 1);
        assert_eq!(ModeKind::Device.max_concurrency(), usize::MAX);
    }

    #[test]
    fn classpath_sources_differ_by_kind() {
        let a = action();
        assert_eq!(
            mode(ModeKind::Jvm, |_| {}).runtime_classpath(&a),
            vec!["/proj/libs/junit.jar", "/data/run/MathTest/MathTest.jar"]
        );
        assert_eq!(
            mode(ModeKind::Device, |_| {}).runtime_classpath(&a),
            vec!["/data/run/classpath/junit.jar", "/data/run/MathTest/MathTest.jar"]
        );
        assert_eq!(
            mode(ModeKind::AppProcess, |_| {}).runtime_classpath(&a),
            vec!["/system/framework/core.jar", "/data/run/MathTest/MathTest.jar"]
        );
        assert_eq!(
            mode(ModeKind::Activity, |_| {}).runtime_classpath(&a),
            vec!["/data/run/MathTest/MathTest.jar"]
        );
    }

    #[test]
    fn large_timeout_is_scaled_and_zero_disables() {
        let m = mode(ModeKind::Jvm, |raw| {
            raw.run.timeout_secs = 30;
            raw.run.large_timeout_multiplier = 4;
        });
        assert_eq!(m.timeout(false), Some(Duration::from_secs(30)));
        assert_eq!(m.timeout(true), Some(Duration::from_secs(120)));

        let m = mode(ModeKind::Jvm, |raw| raw.run.timeout_secs = 0);
        assert_eq!(m.timeout(true), None);
    }

    #[test]
    fn only_dexing_modes_install_classpath_jars() {
        assert!(mode(ModeKind::Jvm, |_| {}).install_tasks().is_empty());
        let names = mode(ModeKind::Host, |_| {}).install_task_names();
        assert_eq!(names, vec!["install classpath junit.jar"]);
        let tasks = mode(ModeKind::Host, |_| {}).install_tasks();
        assert_eq!(tasks[0].name(), "install classpath junit.jar");
    }

    #[test]
    fn activity_ignores_vm_options() {
        let m = mode(ModeKind::Activity, |raw| raw.run.debug_port = Some(8000));
        let argv = m.new_vm_command_builder(&action(), "/data/run/MathTest").build();
        assert_eq!(argv[0], "am");
        assert!(!argv.iter().any(|a| a.contains("jdwp")));
    }

    #[test]
    fn markers_split_output_into_outcomes() {
        let out = output(
            ExitStatus::Exited(0),
            &[
                "setting up",
                "%%%outcome a.MathTest#testAdd SUCCESS",
                "expected 4 but was 5",
                "%%%outcome a.MathTest#testSub EXEC_FAILED",
            ],
        );
        let outcomes = parse_outcomes("MathTest", &out);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "a.MathTest#testAdd");
        assert_eq!(outcomes[0].output_lines, vec!["setting up"]);
        assert_eq!(outcomes[1].result, ActionResult::ExecFailed);
        assert_eq!(outcomes[1].output_lines, vec!["expected 4 but was 5"]);
    }

    #[test]
    fn process_status_becomes_the_action_outcome() {
        let ok = parse_outcomes("A", &output(ExitStatus::Exited(0), &["hi"]));
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].result, ActionResult::Success);

        let timed_out = parse_outcomes(
            "A",
            &output(ExitStatus::TimedOut, &["%%%outcome A#t SUCCESS", "stuck"]),
        );
        assert_eq!(timed_out.len(), 2);
        assert_eq!(timed_out[1].name, "A");
        assert_eq!(timed_out[1].result, ActionResult::Timeout);

        let crashed = parse_outcomes("A", &output(ExitStatus::Exited(134), &[]));
        assert_eq!(crashed[0].result, ActionResult::ExecFailed);
    }

    #[tokio::test]
    async fn executes_on_the_local_target() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().to_string_lossy().into_owned();

        // A stand-in runtime that reports one passing test.
        let runtime = dir.path().join("fake-java");
        std::fs::write(&runtime, "#!/bin/sh\necho \"%%%outcome Echo#one SUCCESS\"\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let m = mode(ModeKind::Jvm, |raw| {
            raw.run.run_dir = run_dir.clone().into();
            raw.toolchain.java = runtime.to_string_lossy().into_owned();
            raw.toolchain.classpath.clear();
        });
        let mut action = Action::new("Echo").with_target_class("a.Echo");
        action.assign_user_dir(&run_dir);
        std::fs::create_dir_all(dir.path().join("Echo")).unwrap();

        let outcomes = m.execute(&action, false).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].name, "Echo#one");
        assert_eq!(outcomes[0].result, ActionResult::Success);
    }

    /// A bridge that runs `shell` scripts locally with a fake `am` on PATH.
    /// `am` reports through the outcome file after it has returned, the way
    /// a real activity does.
    fn activity_mode(dir: &Path, am_report: &str, timeout_secs: u64) -> (Arc<Mode>, Action) {
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let write = |path: PathBuf, body: String| {
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            }
        };
        write(
            bin.join("am"),
            format!(
                r#"log=""
while [ $# -gt 0 ]; do
  [ "$1" = "outcome_file" ] && log="$2"
  shift
done
( sleep 0.3; {am_report} ) >/dev/null 2>&1 &
echo "Status: ok""#
            ),
        );
        let adb = dir.join("fake-adb");
        write(
            adb.clone(),
            format!(
                "[ \"$1\" = shell ] || exit 0\nPATH=\"{}:$PATH\" exec sh -c \"$2\"",
                bin.display()
            ),
        );

        let run_dir = dir.join("run").to_string_lossy().into_owned();
        let mut raw = RawConfigFile::default();
        raw.action.insert("Act".into(), Default::default());
        raw.run.mode = ModeKind::Activity;
        raw.run.run_dir = run_dir.clone().into();
        raw.run.timeout_secs = timeout_secs;
        let config = ConfigFile::new_unchecked(raw);
        let target = Target::Bridge(crate::target::BridgeTarget::new(adb.to_string_lossy(), None));
        let mode = Mode::new(&config, Arc::new(target), crate::cache::open(None), dir).unwrap();

        let mut action = Action::new("Act").with_target_class("a.Act");
        action.assign_user_dir(&run_dir);
        std::fs::create_dir_all(mode.action_dir(&action)).unwrap();
        (Arc::new(mode), action)
    }

    #[tokio::test]
    async fn activity_results_come_from_the_outcome_file() {
        let dir = tempfile::tempdir().unwrap();
        let (m, action) = activity_mode(
            dir.path(),
            r#"echo "%%%outcome Act#one SUCCESS" >> "$log"; echo boom >> "$log"; echo "%%%outcome Act#two EXEC_FAILED" >> "$log"; echo "%%%exit 1" >> "$log""#,
            10,
        );

        let outcomes = m.execute(&action, false).await.unwrap();
        let results: Vec<_> = outcomes.iter().map(|o| (o.name.as_str(), o.result)).collect();
        assert_eq!(
            results,
            vec![
                ("Act#one", ActionResult::Success),
                ("Act#two", ActionResult::ExecFailed),
                ("Act", ActionResult::ExecFailed),
            ]
        );
        assert_eq!(outcomes[1].output_lines, vec!["boom"]);
    }

    #[tokio::test]
    async fn silent_activity_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let (m, action) = activity_mode(dir.path(), r#"echo "%%%outcome Act#one SUCCESS" >> "$log""#, 1);

        let outcomes = m.execute(&action, false).await.unwrap();
        let last = outcomes.last().unwrap();
        assert_eq!(last.name, "Act");
        assert_eq!(last.result, ActionResult::Timeout);
    }

    #[test]
    fn outcome_file_is_finished_only_by_the_exit_line() {
        let lines = |ls: &[&str]| ls.iter().map(|l| l.to_string()).collect::<Vec<_>>();
        assert!(finished_activity(&lines(&["%%%outcome A SUCCESS"])).is_none());
        assert!(finished_activity(&[]).is_none());
        let done = finished_activity(&lines(&["x", "%%%exit 0"])).unwrap();
        assert_eq!(done.status, ExitStatus::Exited(0));
        assert_eq!(done.lines, vec!["x"]);
    }

    #[tokio::test]
    async fn failed_port_forward_does_not_stop_the_action() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = dir.path().join("fake-java");
        std::fs::write(&runtime, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let adb = dir.path().join("fake-adb");
        std::fs::write(
            &adb,
            "#!/bin/sh\n[ \"$1\" = forward ] && exit 1\n[ \"$1\" = shell ] && exec sh -c \"$2\"\nexit 0\n",
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&adb, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let run_dir = dir.path().to_string_lossy().into_owned();
        let mut raw = RawConfigFile::default();
        raw.action.insert("A".into(), Default::default());
        raw.run.mode = ModeKind::Device;
        raw.run.run_dir = run_dir.clone().into();
        raw.run.debug_port = Some(8700);
        raw.toolchain.runtime = runtime.to_string_lossy().into_owned();
        let config = ConfigFile::new_unchecked(raw);
        let target = Target::Bridge(crate::target::BridgeTarget::new(adb.to_string_lossy(), None));
        let m = Mode::new(&config, Arc::new(target), crate::cache::open(None), dir.path()).unwrap();

        let mut action = Action::new("A").with_target_class("a.A");
        action.assign_user_dir(&run_dir);
        std::fs::create_dir_all(dir.path().join("A")).unwrap();

        let outcomes = m.execute(&action, false).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].result, ActionResult::Success);
    }

    #[tokio::test]
    async fn missing_target_class_is_unsupported() {
        let m = mode(ModeKind::Jvm, |_| {});
        let outcomes = m.execute(&Action::new("NoMain"), false).await.unwrap();
        assert_eq!(outcomes[0].result, ActionResult::Unsupported);
    }
}
