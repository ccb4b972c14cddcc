//! # Job engine: one supervised process.
//!
//! A [`Job`] owns the lifecycle of a single manifest-described process:
//!
//! ```text
//! Loaded ──bootstrap/start──► Running ──process exit──► Exited
//!   │                           │                         │
//!   │ unload                    │ unload + exit           │ unload / keep-alive restart
//!   ▼                           ▼                         ▼
//! Unloaded ◄─────────────────────────────────────────── (Running again)
//! ```
//!
//! ## Rules
//! - `Unloaded` is terminal. On reaching it the job emits a `delete_job`
//!   message so its owner can evict it; eviction is never immediate.
//! - Exit notifications arrive through the wakeup channel: when a process
//!   is spawned, its child handle moves into a reaper task that awaits the
//!   exit and reports it. The job itself only keeps the pid.
//! - A forced unload kills with SIGKILL synchronously and skips the
//!   `delete_job` message; the caller destroys the job directly.

use std::fs::OpenOptions;
use std::process::{ExitStatus, Stdio};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde_json::json;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::JobError;
use crate::events::{EventSender, IpcMessage, WakeEvent};
use crate::jobs::manifest::{Label, Manifest};

/// States of the per-job lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Passed validation; no process has been started yet.
    Loaded,
    /// A child process is running.
    Running,
    /// The process exited; the job may be restarted or unloaded.
    Exited,
    /// Terminal. The job is awaiting eviction from the registry.
    Unloaded,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Loaded => "loaded",
            JobState::Running => "running",
            JobState::Exited => "exited",
            JobState::Unloaded => "unloaded",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One supervised job.
pub(crate) struct Job {
    manifest: Manifest,
    origin: String,
    state: JobState,
    pid: u32,
    last_exit_status: i32,
    unload_requested: bool,
    events: EventSender,
    reaper: Option<CancellationToken>,
}

impl Job {
    /// Creates a job in `Loaded` state.
    ///
    /// `origin` is the manifest path (or a caller-supplied tag) used in
    /// logs and dumps.
    pub fn new(manifest: Manifest, origin: String, events: EventSender) -> Self {
        Self {
            manifest,
            origin,
            state: JobState::Loaded,
            pid: 0,
            last_exit_status: 0,
            unload_requested: false,
            events,
            reaper: None,
        }
    }

    pub fn label(&self) -> &Label {
        &self.manifest.label
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Pid of the live process, or 0 when none is running.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn last_exit_status(&self) -> i32 {
        self.last_exit_status
    }

    pub fn unload_requested(&self) -> bool {
        self.unload_requested
    }

    /// Fired once when the job is promoted from pending to active.
    pub fn bootstrap(&mut self) {
        debug_assert_eq!(self.state, JobState::Loaded);
        if !self.manifest.run_at_load {
            debug!(label = %self.label(), "loaded but RunAtLoad is false; not starting");
            return;
        }
        if let Err(err) = self.start() {
            error!(label = %self.label(), error = %err, "failed to start job");
        }
    }

    /// Spawns the job's process and hands the child to a reaper task.
    pub fn start(&mut self) -> Result<(), JobError> {
        let (program, args) = self.manifest.argv().ok_or(JobError::NoProgram)?;
        let mut cmd = Command::new(&program);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(self.redirect(self.manifest.standard_out_path.as_deref())?);
        cmd.stderr(self.redirect(self.manifest.standard_error_path.as_deref())?);
        if let Some(dir) = &self.manifest.working_directory {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.manifest.environment_variables);

        let mut child = cmd.spawn().map_err(|source| JobError::Spawn {
            program: program.clone(),
            source,
        })?;
        self.pid = child.id().unwrap_or(0);
        self.state = JobState::Running;

        let token = CancellationToken::new();
        self.reaper = Some(token.clone());
        let label = self.manifest.label.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    // Owner force-killed the process; reap without reporting.
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                result = child.wait() => {
                    if let Ok(status) = result {
                        events.send(WakeEvent::ChildExited { label, status });
                    }
                }
            }
        });

        info!(label = %self.label(), pid = self.pid, program = %program, "job started");
        Ok(())
    }

    fn redirect(&self, path: Option<&std::path::Path>) -> Result<Stdio, JobError> {
        let Some(path) = path else {
            return Ok(Stdio::null());
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| JobError::Redirect {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Stdio::from(file))
    }

    /// Records a child exit reported by the reaper.
    ///
    /// Returns `true` when the owner should schedule a keep-alive restart.
    pub fn handle_process_exit(&mut self, status: ExitStatus) -> bool {
        self.pid = 0;
        self.reaper = None;
        self.last_exit_status = exit_code(status);
        debug!(
            label = %self.label(),
            exit_status = self.last_exit_status,
            "child process exited"
        );
        if self.unload_requested {
            self.mark_unloaded();
            return false;
        }
        self.state = JobState::Exited;
        self.manifest.keep_alive
    }

    /// Requests that this job leave the manager.
    ///
    /// A running process is signalled (SIGTERM, or SIGKILL when `force`)
    /// and the job stays registered until its exit is reported. An idle job
    /// reaches `Unloaded` immediately.
    pub fn unload(&mut self, force: bool) -> bool {
        self.unload_requested = true;
        match self.state {
            JobState::Running => {
                let sig = if force { Signal::SIGKILL } else { Signal::SIGTERM };
                match self.send_signal(sig) {
                    Ok(()) => true,
                    Err(err) => {
                        error!(label = %self.label(), error = %err, "failed to signal job for unload");
                        false
                    }
                }
            }
            JobState::Loaded | JobState::Exited => {
                self.mark_unloaded();
                true
            }
            JobState::Unloaded => true,
        }
    }

    /// Destroys the job's process without waiting.
    ///
    /// No `delete_job` message is emitted; the caller removes the job
    /// directly afterwards.
    pub fn force_unload(&mut self) {
        self.unload_requested = true;
        if self.pid != 0 {
            let _ = signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGKILL);
            self.pid = 0;
        }
        if let Some(token) = self.reaper.take() {
            token.cancel();
        }
        self.state = JobState::Unloaded;
    }

    /// Sends an arbitrary signal to the live process.
    pub fn kill(&mut self, sig: Signal) -> Result<(), JobError> {
        self.send_signal(sig)
    }

    fn send_signal(&self, sig: Signal) -> Result<(), JobError> {
        if self.pid == 0 {
            return Err(JobError::NotRunning);
        }
        signal::kill(Pid::from_raw(self.pid as i32), sig).map_err(JobError::Kill)
    }

    /// Diagnostic document for the `dump` operation.
    pub fn dump(&self) -> serde_json::Value {
        json!({
            "Label": self.label().as_str(),
            "Origin": self.origin,
            "State": self.state.as_str(),
            "PID": self.pid,
            "LastExitStatus": self.last_exit_status,
            "UnloadRequested": self.unload_requested,
            "Manifest": serde_json::to_value(&self.manifest).unwrap_or(serde_json::Value::Null),
        })
    }

    fn mark_unloaded(&mut self) {
        self.state = JobState::Unloaded;
        info!(label = %self.label(), "job unloaded");
        self.events
            .send(WakeEvent::Ipc(IpcMessage::DeleteJob(self.label().clone())));
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}
