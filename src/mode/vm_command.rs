// src/mode/vm_command.rs

//! Command lines for the supported runtimes.

use std::collections::BTreeMap;

/// Runtime family; decides flag syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmFlavor {
    /// A host JVM (`java`).
    Jvm,
    /// The Android runtime started directly (`dalvikvm`).
    Art,
    /// `app_process <vm args> <dir> <class>`, classpath via `CLASSPATH`.
    AppProcess,
    /// `am start` against a host activity that owns the VM.
    ActivityManager,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmCommandBuilder {
    flavor: VmFlavor,
    executable: String,
    classpath: Vec<String>,
    boot_classpath: Vec<String>,
    vm_args: Vec<String>,
    debug_port: Option<u16>,
    profile: bool,
    invoke_with: Vec<String>,
    env: BTreeMap<String, String>,
    user_dir: Option<String>,
    main_class: Option<String>,
    args: Vec<String>,
    activity: Option<String>,
    outcome_file: Option<String>,
}

impl VmCommandBuilder {
    pub fn new(flavor: VmFlavor, executable: impl Into<String>) -> Self {
        Self {
            flavor,
            executable: executable.into(),
            classpath: Vec::new(),
            boot_classpath: Vec::new(),
            vm_args: Vec::new(),
            debug_port: None,
            profile: false,
            invoke_with: Vec::new(),
            env: BTreeMap::new(),
            user_dir: None,
            main_class: None,
            args: Vec::new(),
            activity: None,
            outcome_file: None,
        }
    }

    pub fn classpath<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classpath.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn boot_classpath<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.boot_classpath.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn vm_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vm_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn debug_port(mut self, port: Option<u16>) -> Self {
        self.debug_port = port;
        self
    }

    pub fn profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    /// Wrapper command line placed in front of the executable.
    pub fn invoke_with<I, S>(mut self, wrapper: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invoke_with = wrapper.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn user_dir(mut self, dir: impl Into<String>) -> Self {
        self.user_dir = Some(dir.into());
        self
    }

    pub fn main_class(mut self, class: impl Into<String>) -> Self {
        self.main_class = Some(class.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `<package>/<class>` of the host activity.
    pub fn activity(mut self, package: &str, class: &str) -> Self {
        self.activity = Some(format!("{package}/{class}"));
        self
    }

    /// File the host application appends outcome markers to.
    pub fn outcome_file(mut self, path: impl Into<String>) -> Self {
        self.outcome_file = Some(path.into());
        self
    }

    /// Environment to set around the command.
    pub fn environment(&self) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        if self.flavor == VmFlavor::AppProcess && !self.classpath.is_empty() {
            env.insert("CLASSPATH".to_string(), self.classpath.join(":"));
        }
        env
    }

    pub fn build(&self) -> Vec<String> {
        let mut argv = self.invoke_with.clone();
        argv.push(self.executable.clone());

        if self.flavor == VmFlavor::ActivityManager {
            self.push_activity_args(&mut argv);
            return argv;
        }

        if let Some(port) = self.debug_port {
            argv.extend(self.debug_args(port));
        }
        if self.profile {
            argv.extend(self.profile_args());
        }
        if !self.boot_classpath.is_empty() && self.flavor != VmFlavor::Jvm {
            argv.push(format!("-Xbootclasspath:{}", self.boot_classpath.join(":")));
        }
        if !self.classpath.is_empty() && self.flavor != VmFlavor::AppProcess {
            argv.push("-classpath".to_string());
            argv.push(self.classpath.join(":"));
        }
        argv.extend(self.vm_args.iter().cloned());

        match self.flavor {
            VmFlavor::AppProcess => {
                argv.push(self.user_dir.clone().unwrap_or_else(|| "/".to_string()));
            }
            _ => {
                if let Some(dir) = &self.user_dir {
                    argv.push(format!("-Duser.dir={dir}"));
                }
            }
        }

        if let Some(class) = &self.main_class {
            argv.push(class.clone());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn debug_args(&self, port: u16) -> Vec<String> {
        let options = format!("transport=dt_socket,address={port},server=y,suspend=y");
        match self.flavor {
            VmFlavor::Jvm => vec![format!("-agentlib:jdwp={options}")],
            _ => vec![
                "-XjdwpProvider:internal".to_string(),
                format!("-XjdwpOptions:{options}"),
            ],
        }
    }

    fn profile_args(&self) -> Vec<String> {
        let dir = self.user_dir.as_deref().unwrap_or(".");
        match self.flavor {
            VmFlavor::Jvm => vec![format!(
                "-XX:StartFlightRecording=filename={dir}/profile.jfr"
            )],
            _ => vec![
                "-Xmethod-trace".to_string(),
                format!("-Xmethod-trace-file:{dir}/profile.trace"),
            ],
        }
    }

    fn push_activity_args(&self, argv: &mut Vec<String>) {
        argv.extend(["start", "-W", "-S"].map(String::from));
        if let Some(component) = &self.activity {
            argv.push("-n".to_string());
            argv.push(component.clone());
        }
        let mut extra = |key: &str, value: String| {
            argv.push("--es".to_string());
            argv.push(key.to_string());
            argv.push(value);
        };
        if let Some(class) = &self.main_class {
            extra("class", class.clone());
        }
        if !self.classpath.is_empty() {
            extra("classpath", self.classpath.join(":"));
        }
        if let Some(dir) = &self.user_dir {
            extra("user_dir", dir.clone());
        }
        if let Some(file) = &self.outcome_file {
            extra("outcome_file", file.clone());
        }
        if !self.args.is_empty() {
            argv.push("--esa".to_string());
            argv.push("args".to_string());
            argv.push(self.args.join(","));
        }
    }
}
