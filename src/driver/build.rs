// src/driver/build.rs

//! Compiling, archiving and (when the mode needs it) dexing one action.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::action::Action;
use crate::engine::{Task, TaskOutcome};
use crate::errors::{CrossrunError, Result};
use crate::exec::ProcessCommand;
use crate::outcome::ActionResult;

use super::run::Run;

/// `<local_dir>/<action>`.
pub fn action_local_dir(run: &Run, action: &Action) -> PathBuf {
    run.mode.local_dir().join(&action.name)
}

/// The jar that is installed on the target.
pub fn artifact_path(run: &Run, action: &Action) -> PathBuf {
    action_local_dir(run, action).join(action.jar_name())
}

/// `build <action>`: fails without running anything downstream when the
/// action cannot be built, after recording why.
pub fn build_task(run: &Arc<Run>, action: &Action) -> Task {
    let run = Arc::clone(run);
    let action = action.clone();
    Task::new(format!("build {}", action.name), async move {
        build(&run, &action).await
    })
}

async fn build(run: &Arc<Run>, action: &Action) -> Result<TaskOutcome> {
    let Some(source) = action.source.as_deref() else {
        run.record_result(&action.name, ActionResult::Unsupported, vec!["no source".into()]);
        return Ok(TaskOutcome::Failed);
    };
    if action.target_class.is_none() {
        run.record_result(
            &action.name,
            ActionResult::Unsupported,
            vec!["no target class".into()],
        );
        return Ok(TaskOutcome::Failed);
    }
    let sources = match java_sources(source) {
        Ok(sources) if !sources.is_empty() => sources,
        Ok(_) => {
            run.record_result(
                &action.name,
                ActionResult::Unsupported,
                vec![format!("no sources under {}", source.display())],
            );
            return Ok(TaskOutcome::Failed);
        }
        Err(e) => {
            run.record_result(
                &action.name,
                ActionResult::Unsupported,
                vec![format!("{}: {e}", source.display())],
            );
            return Ok(TaskOutcome::Failed);
        }
    };

    let dir = action_local_dir(run, action);
    let classes = dir.join("classes");
    match tokio::fs::remove_dir_all(&classes).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(&classes).await?;

    let toolchain = run.mode.toolchain();
    let mut compile = ProcessCommand::new(toolchain.compiler.clone())
        .arg("-d")
        .arg(classes.to_string_lossy());
    if !toolchain.classpath.is_empty() {
        compile = compile.arg("-classpath").arg(join_paths(&toolchain.classpath));
    }
    let output = compile
        .args(sources.iter().map(|s| s.to_string_lossy().into_owned()))
        .run()
        .await?;
    if !output.success() {
        warn!(action = %action.name, "compile failed");
        let text = output.text();
        let suggest_from = Arc::clone(run);
        if let Err(e) = tokio::task::spawn_blocking(move || suggest_from.suggest_jars(&text)).await {
            warn!(action = %action.name, error = %e, "class index lookup failed");
        }
        run.record_result(&action.name, ActionResult::CompileFailed, output.lines);
        return Ok(TaskOutcome::Failed);
    }

    let needs_dex = run.mode.kind().needs_dex();
    let artifact = artifact_path(run, action);
    let classes_jar = if needs_dex {
        dir.join(format!("{}.classes.jar", action.name))
    } else {
        artifact.clone()
    };
    let archive = ProcessCommand::new(toolchain.archiver.clone())
        .arg("cf")
        .arg(classes_jar.to_string_lossy())
        .arg("-C")
        .arg(classes.to_string_lossy())
        .arg(".")
        .run()
        .await?;
    if !archive.success() {
        return Err(CrossrunError::Target(format!(
            "archiving {} failed: {}",
            action.name,
            archive.text()
        )));
    }

    if needs_dex {
        run.mode.dexer().dex(&classes_jar, &artifact).await?;
    }
    info!(action = %action.name, artifact = %artifact.display(), "built");
    Ok(TaskOutcome::Success)
}

/// `source` itself, or every `.java` file below it, sorted.
fn java_sources(source: &Path) -> io::Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(source)?;
    if !metadata.is_dir() {
        return Ok(vec![source.to_path_buf()]);
    }
    let mut sources: Vec<PathBuf> = WalkDir::new(source)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "java"))
        .collect();
    sources.sort();
    Ok(sources)
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
