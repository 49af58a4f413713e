//! Engine launch settings.

use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use serde::{Deserialize, Serialize};

/// Launch settings for a GTP engine subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineProfile {
    /// Executable to launch
    pub program: String,

    /// Arguments passed to the engine
    pub args: Vec<String>,

    /// Working directory for the engine process
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl EngineProfile {
    /// Create a profile with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), working_dir: None, env: Vec::new() }
    }

    /// Add an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set all arguments at once.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Spawn the engine with piped stdin/stdout. The engine's stderr is
    /// discarded; GTP traffic only flows on stdin/stdout.
    pub(crate) fn spawn(&self) -> io::Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        command.spawn()
    }
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self::new("gnugo").with_arg("--mode").with_arg("gtp")
    }
}
