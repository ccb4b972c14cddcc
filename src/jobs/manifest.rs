//! # Job manifests.
//!
//! A [`Manifest`] is the parsed, declarative description of one job. On
//! disk it is a JSON document with PascalCase keys:
//!
//! ```json
//! { "Label": "org.example.worker",
//!   "ProgramArguments": ["/usr/local/bin/worker", "--foreground"],
//!   "KeepAlive": true }
//! ```
//!
//! ## Rules
//! - `Label` is mandatory, non-empty, case-sensitive, and opaque.
//! - At least one of `Program` / `ProgramArguments` must name an executable.
//! - Unknown keys are tolerated for forward compatibility.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::ManagerError;

/// Unique identifier of a job within a manager.
///
/// Treated opaquely: no namespace or reverse-DNS convention is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    /// Wraps an already-validated label string.
    ///
    /// Labels arriving through manifests or requests are validated at the
    /// parse boundary; callers here must pass a non-empty string.
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        debug_assert!(!s.is_empty(), "labels must not be empty");
        Label(s)
    }

    /// The label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(de::Error::custom("Label must not be empty"));
        }
        Ok(Label(s))
    }
}

/// Declarative description of one job.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    /// Unique job identifier.
    pub label: Label,
    /// Author-set disable switch. May be overridden by a persisted
    /// `Enabled` override in the state document.
    #[serde(default)]
    pub disabled: bool,
    /// Executable to run. When absent, `ProgramArguments[0]` is used.
    #[serde(default)]
    pub program: Option<String>,
    /// Full argument vector, `argv[0]` included.
    #[serde(default)]
    pub program_arguments: Vec<String>,
    /// Working directory for the child process.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Extra environment variables for the child process.
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    /// Append-mode redirection target for the child's standard output.
    #[serde(default)]
    pub standard_out_path: Option<PathBuf>,
    /// Append-mode redirection target for the child's standard error.
    #[serde(default)]
    pub standard_error_path: Option<PathBuf>,
    /// Start the process as soon as the job is bootstrapped.
    #[serde(default = "default_run_at_load")]
    pub run_at_load: bool,
    /// Restart the process whenever it exits, throttled.
    #[serde(default)]
    pub keep_alive: bool,
    /// Seconds between keep-alive restarts. Falls back to the manager's
    /// configured default when absent.
    #[serde(default)]
    pub throttle_interval: Option<u64>,
}

fn default_run_at_load() -> bool {
    true
}

impl Manifest {
    /// Resolves the program and its arguments.
    ///
    /// `Program` wins as the executable; `ProgramArguments` supplies
    /// `argv[1..]` either way. Returns `None` when the manifest names
    /// neither.
    pub fn argv(&self) -> Option<(String, Vec<String>)> {
        match (&self.program, self.program_arguments.as_slice()) {
            (Some(program), []) => Some((program.clone(), Vec::new())),
            (Some(program), args) => Some((program.clone(), args[1..].to_vec())),
            (None, []) => None,
            (None, args) => Some((args[0].clone(), args[1..].to_vec())),
        }
    }

    /// The keep-alive restart throttle, with `default` applied when the
    /// manifest does not set one.
    pub fn throttle(&self, default: std::time::Duration) -> std::time::Duration {
        self.throttle_interval
            .map(std::time::Duration::from_secs)
            .unwrap_or(default)
    }
}

/// Reads a manifest file into a raw JSON document.
pub fn parse(path: &Path) -> Result<serde_json::Value, ManagerError> {
    let origin = path.display().to_string();
    let data = fs::read_to_string(path).map_err(|err| ManagerError::InvalidManifest {
        origin: origin.clone(),
        reason: err.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|err| ManagerError::InvalidManifest {
        origin,
        reason: err.to_string(),
    })
}
