use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How an action is run once it is on a target.
///
/// - `Jvm`: a host JVM running plain class files.
/// - `Host`: the Android runtime built for the host, running dex files.
/// - `Device`: the Android runtime on a device, invoked directly.
/// - `AppProcess`: the device's `app_process` zygote entry point.
/// - `Activity`: a host application on the device runs the action inside an
///   Activity; the application owns the VM, so only one action runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Jvm,
    Host,
    Device,
    AppProcess,
    Activity,
}

impl Default for ModeKind {
    fn default() -> Self {
        ModeKind::Jvm
    }
}

impl ModeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeKind::Jvm => "jvm",
            ModeKind::Host => "host",
            ModeKind::Device => "device",
            ModeKind::AppProcess => "app_process",
            ModeKind::Activity => "activity",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jvm" => Ok(ModeKind::Jvm),
            "host" => Ok(ModeKind::Host),
            "device" => Ok(ModeKind::Device),
            "app_process" => Ok(ModeKind::AppProcess),
            "activity" => Ok(ModeKind::Activity),
            other => Err(format!(
                "invalid mode: {other} (expected jvm, host, device, app_process or activity)"
            )),
        }
    }
}

/// Instruction-set variant the runtime is started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    X32,
    X64,
}

impl Default for Variant {
    fn default() -> Self {
        Variant::X32
    }
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::X32 => "x32",
            Variant::X64 => "x64",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x32" => Ok(Variant::X32),
            "x64" => Ok(Variant::X64),
            other => Err(format!("invalid variant: {other} (expected x32 or x64)")),
        }
    }
}

/// Where actions are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Local,
    Ssh,
    Bridge,
}

impl Default for TargetKind {
    fn default() -> Self {
        TargetKind::Local
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Local => "local",
            TargetKind::Ssh => "ssh",
            TargetKind::Bridge => "bridge",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_kind_round_trips_through_display() {
        for kind in [
            ModeKind::Jvm,
            ModeKind::Host,
            ModeKind::Device,
            ModeKind::AppProcess,
            ModeKind::Activity,
        ] {
            assert_eq!(kind.to_string().parse::<ModeKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert!("arm".parse::<Variant>().is_err());
    }
}
