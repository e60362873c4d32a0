// src/target/script.rs

//! One-line shell scripts that run unchanged under `sh -c`, `ssh` and the
//! device bridge's `shell`.

/// Characters that expand in some shell (brace, history, tilde, glob, comment)
/// and so always get quoted.
const EXPANDING: &[char] = &['{', '}', '!', '^', '#', '~', '[', ']'];

/// Quote one token so the destination shell sees it as a single word.
pub fn escape(token: &str) -> String {
    let quoted = shell_words::quote(token);
    if quoted.starts_with('\'') || !token.contains(EXPANDING) {
        return quoted.into_owned();
    }
    format!("'{token}'")
}

/// Builder for a single grouped script argument.
///
/// The resulting command line is the target's prefix followed by exactly one
/// argument holding the whole script. Transports that concatenate argv
/// (`ssh`, `adb shell`) therefore see the same text a local `sh -c` would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBuilder {
    prefix: Vec<String>,
    working_dir: Option<String>,
    env: Vec<(String, String)>,
    tokens: Vec<String>,
}

impl ScriptBuilder {
    pub fn new(prefix: Vec<String>) -> Self {
        Self {
            prefix,
            working_dir: None,
            env: Vec::new(),
            tokens: Vec::new(),
        }
    }

    /// Prepend `cd <dir> &&`.
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Prepend an inline `KEY=VALUE` assignment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    pub fn tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// The escaped script text.
    pub fn script(&self) -> String {
        let mut parts = Vec::new();
        if let Some(dir) = &self.working_dir {
            parts.push(format!("cd {} &&", escape(dir)));
        }
        for (key, value) in &self.env {
            parts.push(format!("{key}={}", escape(value)));
        }
        parts.extend(self.tokens.iter().map(|t| escape(t)));
        parts.join(" ")
    }

    /// Transport prefix plus the script as one argument.
    pub fn command_line(&self) -> Vec<String> {
        let mut argv = self.prefix.clone();
        argv.push(self.script());
        argv
    }
}
