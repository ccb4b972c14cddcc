//! # Error types used by the jobvisor manager and job engine.
//!
//! This module defines three error enums:
//!
//! - [`ManagerError`] policy rejections and configuration errors raised by the manager.
//! - [`JobError`] errors raised by the job engine while spawning or signalling processes.
//! - [`StateError`] failures of the on-disk state document store.
//!
//! All types provide an `as_label` method returning a short stable tag for logs.

use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced by the manager.
///
/// These represent rejected administrative operations: loads refused by
/// policy, lookups of labels that are not loaded, and failures of the
/// manager's own collaborators (state document, admin socket).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ManagerError {
    /// A load was requested after shutdown began.
    #[error("refusing to load while the manager is shutting down")]
    ShuttingDown,

    /// A job with the same label is already loaded or pending.
    #[error("a job with label '{label}' is already loaded")]
    DuplicateLabel {
        /// The duplicate label.
        label: String,
    },

    /// The manifest's own `Disabled` key gated the load.
    #[error("job '{label}' is disabled by its manifest")]
    DisabledByManifest { label: String },

    /// A persisted override (`Enabled=false`) gated the load.
    #[error("job '{label}' is disabled in the state document")]
    DisabledByState { label: String },

    /// The label is not present in the active job table.
    #[error("no job with label '{label}' is loaded")]
    UnknownJob { label: String },

    /// The signal name or number could not be resolved.
    #[error("unknown signal '{name}'")]
    UnknownSignal { name: String },

    /// The manifest could not be read or did not describe a job.
    #[error("manifest at {origin}: {reason}")]
    InvalidManifest {
        /// Path or caller-supplied origin string, for log context.
        origin: String,
        reason: String,
    },

    /// A load path does not exist.
    #[error("load path does not exist: {path}")]
    MissingPath { path: PathBuf },

    /// The job refused or failed the requested operation.
    #[error("failed to unload job '{label}'")]
    UnloadFailed { label: String },

    /// A job-engine failure, with the label for context.
    #[error("job '{label}': {source}")]
    Job { label: String, source: JobError },

    /// State document store failure.
    #[error(transparent)]
    State(#[from] StateError),

    /// Admin socket could not be bound or configured.
    #[error("admin socket error: {0}")]
    Socket(#[source] std::io::Error),
}

impl ManagerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ManagerError::ShuttingDown => "manager_shutting_down",
            ManagerError::DuplicateLabel { .. } => "manager_duplicate_label",
            ManagerError::DisabledByManifest { .. } => "manager_disabled_by_manifest",
            ManagerError::DisabledByState { .. } => "manager_disabled_by_state",
            ManagerError::UnknownJob { .. } => "manager_unknown_job",
            ManagerError::UnknownSignal { .. } => "manager_unknown_signal",
            ManagerError::InvalidManifest { .. } => "manager_invalid_manifest",
            ManagerError::MissingPath { .. } => "manager_missing_path",
            ManagerError::UnloadFailed { .. } => "manager_unload_failed",
            ManagerError::Job { .. } => "manager_job_error",
            ManagerError::State(_) => "manager_state_error",
            ManagerError::Socket(_) => "manager_socket_error",
        }
    }
}

/// # Errors produced by the job engine.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JobError {
    /// The manifest names neither `Program` nor `ProgramArguments`.
    #[error("manifest has no program to execute")]
    NoProgram,

    /// Spawning the job's program failed.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// A standard output or error redirection target could not be opened.
    #[error("failed to open {path}: {source}")]
    Redirect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A signal was requested for a job with no live process.
    #[error("job has no running process")]
    NotRunning,

    /// `kill(2)` failed.
    #[error("kill failed: {0}")]
    Kill(#[source] nix::errno::Errno),
}

impl JobError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::NoProgram => "job_no_program",
            JobError::Spawn { .. } => "job_spawn_failed",
            JobError::Redirect { .. } => "job_redirect_failed",
            JobError::NotRunning => "job_not_running",
            JobError::Kill(_) => "job_kill_failed",
        }
    }
}

/// # Errors produced by the state document store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed state document at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The document carries a schema version this build does not understand.
    #[error("unsupported schema version {found} in {path}")]
    SchemaVersion { path: PathBuf, found: i64 },
}

impl StateError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::Read { .. } => "state_read_failed",
            StateError::Write { .. } => "state_write_failed",
            StateError::Parse { .. } => "state_parse_failed",
            StateError::SchemaVersion { .. } => "state_schema_version",
        }
    }
}
