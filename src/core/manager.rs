//! # Manager: the top-level supervision state machine.
//!
//! The [`Manager`] owns everything: the domain it operates in, the state
//! document, the event reactor, the admin channel, and every job. External
//! inputs (signals, admin requests, child exits, timers) surface as events;
//! each event is dispatched to completion before the next is drawn, so no
//! handler ever observes a half-applied transition.
//!
//! ## Architecture
//! ```text
//! Domain ──► Manager::new()
//!               │
//!  start_running() ──► BootManager action:
//!               │        ├──► install signal listeners
//!               │        ├──► bind admin socket (<statedir>/rpc.sock)
//!               │        ├──► load default manifests from the domain
//!               │        └──► promote pending ──► bootstrap each job
//!               │
//!  run_main_loop() / run_once():
//!               │        handle_event() ──► wait_for_event ──► dispatch
//!               │
//!  stop_running() ──► BeginShutdown action:
//!                        ├──► unbind admin socket (no new loads)
//!                        ├──► discard never-started pending jobs
//!                        └──► request unload of every active job
//! ```
//!
//! ## Rules
//! - Loads are two-phase: validation stages a job in the pending table;
//!   a start request promotes the whole batch at once.
//! - Unload is not immediate: the job leaves the registry only when its
//!   own machine reaches `Unloaded` and the resulting `delete_job`
//!   message is processed.
//! - During graceful shutdown the event wait is capped so the drain polls
//!   even without external events.
//! - A second shutdown signal escalates: remaining processes are killed
//!   and the manager finishes immediately.

use std::fs;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::fsm::{self, Action, Guards, ManagerState, ManagerTrigger};
use crate::core::registry::Registry;
use crate::domain::Domain;
use crate::error::{ManagerError, StateError};
use crate::events::{EventManager, IpcMessage, RpcTurn, SignalEvent, TimerKey, WakeEvent};
use crate::jobs::manifest;
use crate::jobs::{Job, JobState, Label, Manifest};
use crate::rpc::{self, Channel, Request, Response};
use crate::signals;
use crate::state::{StateFile, STATE_FILE_NAME};

/// The top-level service manager.
///
/// Owns the state document, the event reactor, the admin channel, and every
/// job, pending or active. Dropping the manager unbinds the admin socket
/// and destroys any remaining child processes.
pub struct Manager {
    domain: Domain,
    cfg: Config,
    state: ManagerState,
    state_file: StateFile,
    registry: Registry,
    eventmgr: EventManager,
    channel: Channel,
    boot_error: Option<ManagerError>,
}

impl Manager {
    /// Creates a manager for `domain` with default configuration.
    pub fn new(domain: Domain) -> Result<Self, ManagerError> {
        Self::with_config(domain, Config::default())
    }

    /// Creates a manager for `domain` with explicit configuration.
    pub fn with_config(domain: Domain, cfg: Config) -> Result<Self, ManagerError> {
        let state_file = Self::create_or_open_statefile(&domain)?;
        Ok(Self {
            domain,
            cfg,
            state: ManagerState::Unconfigured,
            state_file,
            registry: Registry::new(),
            eventmgr: EventManager::new(),
            channel: Channel::new(),
            boot_error: None,
        })
    }

    /// Opens `<statedir>/state.json`, creating the directory first when
    /// running unprivileged. Root is expected to have the state directory
    /// pre-provisioned by the administrator.
    fn create_or_open_statefile(domain: &Domain) -> Result<StateFile, ManagerError> {
        let statedir = domain.statedir();
        if !nix::unistd::getuid().is_root() && !statedir.exists() {
            debug!(path = %statedir.display(), "creating state directory");
            fs::create_dir_all(statedir).map_err(|source| StateError::Write {
                path: statedir.to_path_buf(),
                source,
            })?;
        }
        let path = statedir.join(STATE_FILE_NAME);
        Ok(StateFile::open(path, StateFile::default_document())?)
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// The domain this manager operates in.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Sorted labels of jobs staged but not yet started.
    pub fn pending_labels(&self) -> Vec<Label> {
        self.registry.pending_labels()
    }

    /// Sorted labels of active jobs.
    pub fn active_labels(&self) -> Vec<Label> {
        self.registry.active_labels()
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Requests the transition out of `Unconfigured` into `Running`.
    ///
    /// Returns an error when the admin socket could not be bound. The
    /// manager still enters `Running` and supervises its jobs; it just has
    /// no admin surface until restarted.
    pub fn start_running(&mut self) -> Result<(), ManagerError> {
        self.execute(ManagerTrigger::StartRequested);
        match self.boot_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Requests graceful shutdown (or immediate finish before start).
    pub fn stop_running(&mut self) {
        self.execute(ManagerTrigger::StopRequested);
    }

    /// Pumps events until the manager reaches `Finished`.
    pub async fn run_main_loop(&mut self) {
        assert!(
            self.state != ManagerState::Unconfigured,
            "start_running() must be called first"
        );
        while self.handle_event(None).await {}
    }

    /// Pumps at most one event. Returns `false` once the manager finished.
    pub async fn run_once(&mut self, timeout: Option<Duration>) -> bool {
        assert!(
            self.state != ManagerState::Unconfigured,
            "start_running() must be called first"
        );
        self.handle_event(timeout).await
    }

    /// Waits for and dispatches one event according to the current state.
    pub async fn handle_event(&mut self, timeout: Option<Duration>) -> bool {
        match self.state {
            ManagerState::Unconfigured => {
                panic!("handle_event() called before the manager started")
            }
            ManagerState::Running => {
                debug!(?timeout, "waiting for an event");
                if let Some(event) = self.eventmgr.wait_for_event(timeout).await {
                    self.dispatch(event);
                }
            }
            ManagerState::GracefulShutdown => {
                if self.registry.active_is_empty() {
                    self.execute(ManagerTrigger::AllJobsExited);
                } else {
                    let cap = self.cfg.shutdown_poll;
                    let bounded = timeout.map_or(cap, |t| t.min(cap));
                    debug!(
                        remaining = self.registry.active_len(),
                        "shutting down: waiting for an event"
                    );
                    if let Some(event) = self.eventmgr.wait_for_event(Some(bounded)).await {
                        self.dispatch(event);
                    }
                }
            }
            ManagerState::Finished => {}
        }
        self.state != ManagerState::Finished
    }

    fn execute(&mut self, trigger: ManagerTrigger) {
        let guards = Guards {
            pending_empty: self.registry.pending_is_empty(),
        };
        let Some(transition) = fsm::plan(self.state, trigger, &guards) else {
            debug!(state = %self.state, trigger = %trigger, "trigger ignored: no transition");
            return;
        };
        let from = self.state;
        self.state = transition.to;
        debug!(trigger = %trigger, from = %from, to = %transition.to, "state changed");
        match transition.action {
            Action::None => {}
            Action::BootManager => self.boot(),
            Action::PromotePending => self.start_all_jobs(),
            Action::BeginShutdown => self.begin_shutdown(),
            Action::NoteAllExited => info!("all jobs have exited"),
        }
    }

    fn boot(&mut self) {
        if let Err(err) = self.eventmgr.install_signal_listeners() {
            error!(error = %err, "failed to install signal listeners");
        }
        if let Err(err) = self.start_admin_channel() {
            error!(error = %err, "failed to bind the admin socket");
            self.boot_error = Some(err);
        }
        self.load_default_manifests();
        self.start_all_jobs();
    }

    fn start_admin_channel(&mut self) -> Result<(), ManagerError> {
        let socket = self.domain.statedir().join(rpc::SOCKET_FILE_NAME);
        self.channel
            .bind_and_listen(&socket, self.cfg.socket_backlog, self.eventmgr.handle())
            .map_err(ManagerError::Socket)
    }

    fn begin_shutdown(&mut self) {
        // No new admin requests or loads from this point on.
        self.channel.unbind_and_stop_listening();
        let discarded = self.registry.discard_pending();
        if discarded > 0 {
            warn!(discarded, "discarding jobs that were loaded but never started");
        }
        self.unload_all_jobs();
    }

    /// Promotes every pending job into the active table and bootstraps it.
    fn start_all_jobs(&mut self) {
        for label in self.registry.promote_all() {
            if let Some(job) = self.registry.active_mut(&label) {
                job.bootstrap();
            }
        }
    }

    fn load_default_manifests(&mut self) {
        info!(domain = %self.domain, "loading default manifests");
        let paths: Vec<_> = self.domain.load_paths().to_vec();
        for path in paths {
            let _ = self.load_all_manifests(&path, false, false);
        }
    }

    // ---------------------------
    // Load / unload pipeline
    // ---------------------------

    /// Loads one manifest file.
    pub fn load_manifest_path(
        &mut self,
        path: &Path,
        override_disabled: bool,
        force_load: bool,
    ) -> Result<(), ManagerError> {
        if !path.exists() {
            return Err(ManagerError::MissingPath {
                path: path.to_path_buf(),
            });
        }
        let value = manifest::parse(path)?;
        self.load_manifest_value(
            value,
            &path.display().to_string(),
            override_disabled,
            force_load,
        )
    }

    /// Loads a pre-parsed manifest document. `origin` tags log lines.
    pub fn load_manifest_value(
        &mut self,
        value: Value,
        origin: &str,
        override_disabled: bool,
        force_load: bool,
    ) -> Result<(), ManagerError> {
        if matches!(
            self.state,
            ManagerState::GracefulShutdown | ManagerState::Finished
        ) {
            error!("refusing to load a new job while the manager is shutting down");
            return Err(ManagerError::ShuttingDown);
        }

        let manifest: Manifest = serde_json::from_value(value).map_err(|err| {
            error!(origin, error = %err, "failed to parse manifest");
            ManagerError::InvalidManifest {
                origin: origin.to_string(),
                reason: err.to_string(),
            }
        })?;
        if manifest.argv().is_none() {
            error!(origin, label = %manifest.label, "manifest has no program to execute");
            return Err(ManagerError::InvalidManifest {
                origin: origin.to_string(),
                reason: "neither Program nor ProgramArguments is set".to_string(),
            });
        }
        let label = manifest.label.clone();

        if self.registry.contains(&label) {
            error!(label = %label, "tried to load a duplicate job");
            return Err(ManagerError::DuplicateLabel {
                label: label.to_string(),
            });
        }

        if override_disabled {
            debug!(label = %label, "overriding the Disabled key");
            self.override_job_enabled(&label, true);
        }
        self.check_load_gate(&manifest, force_load)?;

        info!(label = %label, origin, "loaded job");
        let job = Job::new(manifest, origin.to_string(), self.eventmgr.handle());
        self.registry.insert_pending(job);
        Ok(())
    }

    /// Applies the disable gate. A persisted override takes precedence over
    /// the manifest's own `Disabled` key; `force_load` bypasses both.
    fn check_load_gate(&self, manifest: &Manifest, force_load: bool) -> Result<(), ManagerError> {
        let label = &manifest.label;
        match self.state_file.override_for(label.as_str()) {
            Some(false) if force_load => {
                info!(label = %label, "forcibly loading a job that is disabled in the state document");
                Ok(())
            }
            Some(false) => {
                info!(label = %label, "will not load: explicitly disabled in the state document");
                Err(ManagerError::DisabledByState {
                    label: label.to_string(),
                })
            }
            Some(true) => Ok(()),
            None if manifest.disabled && force_load => {
                info!(label = %label, "forcibly loading a job whose manifest Disabled key is true");
                Ok(())
            }
            None if manifest.disabled => {
                info!(label = %label, "will not load: the manifest Disabled key is true");
                Err(ManagerError::DisabledByManifest {
                    label: label.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    /// Loads every manifest under `path` (a directory is iterated, a file
    /// is loaded directly). Returns `true` when everything loaded.
    pub fn load_all_manifests(
        &mut self,
        path: &Path,
        override_disabled: bool,
        force_load: bool,
    ) -> bool {
        if matches!(
            self.state,
            ManagerState::GracefulShutdown | ManagerState::Finished
        ) {
            error!("refusing to load new jobs while the manager is shutting down");
            return false;
        }
        debug!(path = %path.display(), "loading all manifests");
        if !path.exists() {
            warn!(path = %path.display(), "load failed: path does not exist");
            return false;
        }

        if !path.is_dir() {
            return self.load_entry(path, override_disabled, force_load);
        }

        info!(path = %path.display(), "loading all manifests in directory");
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to read directory");
                return false;
            }
        };
        let mut ok = true;
        for entry in entries {
            match entry {
                Ok(entry) => {
                    if !self.load_entry(&entry.path(), override_disabled, force_load) {
                        ok = false;
                    }
                }
                Err(err) => {
                    error!(path = %path.display(), error = %err, "failed to read directory entry");
                    ok = false;
                }
            }
        }
        ok
    }

    /// Loads one batch entry; failures are logged and contained.
    fn load_entry(&mut self, path: &Path, override_disabled: bool, force_load: bool) -> bool {
        match self.load_manifest_path(path, override_disabled, force_load) {
            Ok(()) => true,
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to load manifest");
                false
            }
        }
    }

    /// Unloads a job by label.
    ///
    /// The job stays in the active table until its own machine reaches
    /// `Unloaded` and the resulting `delete_job` message is processed.
    pub fn unload_job_by_label(
        &mut self,
        label: &Label,
        override_disabled: bool,
        force_unload: bool,
    ) -> Result<(), ManagerError> {
        if !self.registry.job_exists(label) {
            info!(label = %label, "tried to unload a job that is not loaded");
            return Err(ManagerError::UnknownJob {
                label: label.to_string(),
            });
        }
        if override_disabled {
            debug!(label = %label, "overriding the Disabled key");
            self.override_job_enabled(label, false);
        }
        let Some(job) = self.registry.active_mut(label) else {
            return Err(ManagerError::UnknownJob {
                label: label.to_string(),
            });
        };
        if job.unload(force_unload) {
            Ok(())
        } else {
            Err(ManagerError::UnloadFailed {
                label: label.to_string(),
            })
        }
    }

    /// Unloads the job described by a manifest file.
    pub fn unload_job_by_path(
        &mut self,
        path: &Path,
        override_disabled: bool,
        force_unload: bool,
    ) -> Result<(), ManagerError> {
        let value = manifest::parse(path)?;
        let label = value
            .get("Label")
            .and_then(Value::as_str)
            .filter(|label| !label.is_empty())
            .ok_or_else(|| ManagerError::InvalidManifest {
                origin: path.display().to_string(),
                reason: "manifest has no Label key".to_string(),
            })?;
        self.unload_job_by_label(&Label::new(label), override_disabled, force_unload)
    }

    /// Persists an `Enabled` override for `label`.
    ///
    /// The label does not have to correspond to a loaded job; stale
    /// overrides persist and keep gating future loads.
    pub fn override_job_enabled(&mut self, label: &Label, enabled: bool) {
        if let Err(err) = self.state_file.set_override(label.as_str(), enabled) {
            // The in-memory decision still applies; only persistence failed.
            error!(label = %label, error = %err, "failed to persist override");
        }
        info!(label = %label, enabled, "set job override");
    }

    // ---------------------------
    // Admin surface
    // ---------------------------

    /// Lists active jobs as `{Label, PID, LastExitStatus}` rows, sorted by
    /// label. `PID` is `"-"` when no process is live.
    pub fn list_jobs(&self) -> Value {
        let mut rows: Vec<Value> = self
            .registry
            .active_iter()
            .map(|job| {
                let pid = if job.pid() == 0 {
                    "-".to_string()
                } else {
                    job.pid().to_string()
                };
                json!({
                    "Label": job.label().as_str(),
                    "PID": pid,
                    "LastExitStatus": job.last_exit_status(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a["Label"].as_str().cmp(&b["Label"].as_str()));
        Value::Array(rows)
    }

    /// Sends a signal, given by name or number, to a job's process.
    pub fn kill_job(
        &mut self,
        label: &Label,
        signame_or_number: &str,
    ) -> Result<(), ManagerError> {
        let Some(sig) = signals::lookup(signame_or_number) else {
            return Err(ManagerError::UnknownSignal {
                name: signame_or_number.to_string(),
            });
        };
        let Some(job) = self.registry.active_mut(label) else {
            debug!(label = %label, "tried to kill a nonexistent job");
            return Err(ManagerError::UnknownJob {
                label: label.to_string(),
            });
        };
        job.kill(sig).map_err(|source| ManagerError::Job {
            label: label.to_string(),
            source,
        })?;
        debug!(label = %label, signal = signame_or_number, "signal sent");
        Ok(())
    }

    /// Diagnostic dump of one job.
    pub fn dump_job(&self, label: &Label) -> Result<Value, ManagerError> {
        let job = self
            .registry
            .active(label)
            .ok_or_else(|| ManagerError::UnknownJob {
                label: label.to_string(),
            })?;
        let doc = job.dump();
        debug!(label = %label, dump = %doc, "job dump");
        Ok(doc)
    }

    // ---------------------------
    // Event dispatch
    // ---------------------------

    fn dispatch(&mut self, event: WakeEvent) {
        match event {
            WakeEvent::Signal(SignalEvent::Pipe) => {
                debug!("caught SIGPIPE and ignored it");
            }
            WakeEvent::Signal(sig) => self.handle_shutdown_signal(sig.name()),
            WakeEvent::Ipc(IpcMessage::DeleteJob(label)) => {
                if self.registry.evict(&label).is_some() {
                    debug!(label = %label, "evicted unloaded job");
                }
            }
            WakeEvent::ChildExited { label, status } => self.handle_child_exit(&label, status),
            WakeEvent::Timer(TimerKey::RestartJob(label)) => self.handle_restart_timer(&label),
            WakeEvent::Rpc(turn) => self.handle_rpc(turn),
        }
    }

    /// Entry point for SIGINT/SIGTERM, delivered on the main loop.
    pub fn handle_shutdown_signal(&mut self, signame: &str) {
        match self.state {
            ManagerState::Unconfigured => {
                info!(signal = signame, "caught signal before the manager started");
                self.execute(ManagerTrigger::StopRequested);
            }
            ManagerState::Running => {
                info!(signal = signame, "caught signal; shutting down gracefully");
                self.execute(ManagerTrigger::StopRequested);
            }
            ManagerState::GracefulShutdown => {
                info!(
                    signal = signame,
                    "caught signal; immediately unloading all running jobs"
                );
                self.force_unload_all_jobs();
                self.execute(ManagerTrigger::AllJobsExited);
            }
            ManagerState::Finished => {
                info!(signal = signame, "caught signal after the manager was shut down");
            }
        }
    }

    fn handle_child_exit(&mut self, label: &Label, status: ExitStatus) {
        let Some(job) = self.registry.active_mut(label) else {
            debug!(label = %label, "exit notification for a job that is no longer loaded");
            return;
        };
        let wants_restart = job.handle_process_exit(status);
        if wants_restart && self.state == ManagerState::Running {
            let delay = job.manifest().throttle(self.cfg.throttle_default);
            info!(label = %label, ?delay, "scheduling keep-alive restart");
            self.eventmgr
                .add_timer(delay, TimerKey::RestartJob(label.clone()));
        }
    }

    fn handle_restart_timer(&mut self, label: &Label) {
        if self.state != ManagerState::Running {
            return;
        }
        let Some(job) = self.registry.active_mut(label) else {
            // Unloaded while the throttle timer was armed.
            return;
        };
        if job.state() != JobState::Exited || job.unload_requested() {
            return;
        }
        debug!(label = %label, "trying to start");
        if let Err(err) = job.start() {
            error!(label = %label, error = %err, "keep-alive restart failed");
        }
    }

    fn handle_rpc(&mut self, turn: RpcTurn) {
        let RpcTurn { request, reply } = turn;
        let response = self.handle_request(request);
        let _ = reply.send(response);
    }

    /// Maps one admin request onto manager operations.
    pub(crate) fn handle_request(&mut self, request: Request) -> Response {
        match request {
            Request::Load {
                path,
                override_disabled,
                force,
            } => {
                if self.load_all_manifests(Path::new(&path), override_disabled, force) {
                    Response::success(Value::Bool(true))
                } else {
                    Response::failure("one or more manifests failed to load")
                }
            }
            Request::Unload {
                target,
                override_disabled,
                force,
            } => {
                if target.is_empty() {
                    return Response::failure("target must not be empty");
                }
                let path = Path::new(&target);
                let result = if path.exists() {
                    self.unload_job_by_path(path, override_disabled, force)
                } else {
                    self.unload_job_by_label(&Label::new(target.clone()), override_disabled, force)
                };
                match result {
                    Ok(()) => Response::success(Value::Bool(true)),
                    Err(err) => Response::failure(err.to_string()),
                }
            }
            Request::List => Response::success(self.list_jobs()),
            Request::Kill { label, signal } => {
                if label.is_empty() {
                    return Response::failure("label must not be empty");
                }
                match self.kill_job(&Label::new(label), &signal) {
                    Ok(()) => Response::success(Value::Bool(true)),
                    Err(err) => Response::failure(err.to_string()),
                }
            }
            Request::Enable { label, enabled } => {
                if label.is_empty() {
                    return Response::failure("label must not be empty");
                }
                self.override_job_enabled(&Label::new(label), enabled);
                Response::success(Value::Bool(true))
            }
            Request::Dump { label } => {
                if label.is_empty() {
                    return Response::failure("label must not be empty");
                }
                match self.dump_job(&Label::new(label)) {
                    Ok(doc) => Response::success(doc),
                    Err(err) => Response::failure(err.to_string()),
                }
            }
        }
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    /// Requests cooperative unload of every active job.
    fn unload_all_jobs(&mut self) -> bool {
        debug!("unloading all jobs");
        let mut success = true;
        for job in self.registry.active_iter_mut() {
            if job.state() != JobState::Unloaded && !job.unload_requested() && !job.unload(false) {
                error!(
                    label = %job.label(),
                    "failed to unload; ignoring because all jobs are being unloaded"
                );
                success = false;
            }
        }
        success
    }

    /// Destroys every remaining job without waiting.
    fn force_unload_all_jobs(&mut self) {
        for mut job in self.registry.drain_active() {
            job.force_unload();
        }
    }

    /// Resets the persisted state document. Test builds only.
    #[cfg(test)]
    pub(crate) fn clear_state_file(&mut self) -> Result<(), StateError> {
        self.state_file.clear()
    }

    #[cfg(test)]
    pub(crate) fn state_file(&self) -> &StateFile {
        &self.state_file
    }
}

impl Drop for Manager {
    /// No child process survives the manager value.
    fn drop(&mut self) {
        self.channel.unbind_and_stop_listening();
        self.force_unload_all_jobs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> Manager {
        let domain = Domain::new(dir.path(), Vec::new());
        Manager::new(domain).unwrap()
    }

    fn sleeper(label: &str) -> Value {
        json!({ "Label": label, "ProgramArguments": ["/bin/sleep", "30"] })
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        mgr.load_manifest_value(sleeper("c"), "test://c", false, false)
            .unwrap();
        let err = mgr
            .load_manifest_value(sleeper("c"), "test://c", false, false)
            .unwrap_err();
        assert!(matches!(err, ManagerError::DuplicateLabel { .. }));
        assert_eq!(mgr.pending_labels(), vec![Label::new("c")]);
    }

    #[test]
    fn manifest_disabled_gates_unless_forced() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        let doc = json!({
            "Label": "a",
            "Disabled": true,
            "ProgramArguments": ["/bin/sleep", "30"]
        });

        let err = mgr
            .load_manifest_value(doc.clone(), "test://a", false, false)
            .unwrap_err();
        assert!(matches!(err, ManagerError::DisabledByManifest { .. }));
        assert!(mgr.pending_labels().is_empty());

        mgr.load_manifest_value(doc, "test://a", false, true).unwrap();
        assert_eq!(mgr.pending_labels(), vec![Label::new("a")]);
    }

    #[test]
    fn override_disabled_enables_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        let doc = json!({
            "Label": "b",
            "Disabled": true,
            "ProgramArguments": ["/bin/sleep", "30"]
        });

        mgr.load_manifest_value(doc, "test://b", true, false).unwrap();
        assert_eq!(mgr.pending_labels(), vec![Label::new("b")]);
        assert_eq!(mgr.state_file().override_for("b"), Some(true));
    }

    #[test]
    fn state_override_gates_unless_forced() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        mgr.override_job_enabled(&Label::new("a"), false);

        let err = mgr
            .load_manifest_value(sleeper("a"), "test://a", false, false)
            .unwrap_err();
        assert!(matches!(err, ManagerError::DisabledByState { .. }));

        mgr.load_manifest_value(sleeper("a"), "test://a", false, true)
            .unwrap();
        assert_eq!(mgr.pending_labels(), vec![Label::new("a")]);
    }

    #[test]
    fn state_override_takes_precedence_over_manifest() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        mgr.override_job_enabled(&Label::new("b"), true);

        let doc = json!({
            "Label": "b",
            "Disabled": true,
            "ProgramArguments": ["/bin/sleep", "30"]
        });
        mgr.load_manifest_value(doc, "test://b", false, false).unwrap();
        assert_eq!(mgr.pending_labels(), vec![Label::new("b")]);
    }

    #[test]
    fn overrides_are_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        mgr.override_job_enabled(&Label::new("x"), true);
        mgr.override_job_enabled(&Label::new("y"), false);
        mgr.override_job_enabled(&Label::new("x"), false);

        assert_eq!(mgr.state_file().override_for("x"), Some(false));
        assert_eq!(mgr.state_file().override_for("y"), Some(false));
        let overrides = mgr.state_file().value()["Overrides"].as_object().unwrap();
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn overrides_may_target_unknown_labels() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        mgr.override_job_enabled(&Label::new("never-loaded"), false);
        assert_eq!(mgr.state_file().override_for("never-loaded"), Some(false));
    }

    #[test]
    fn manifests_without_a_program_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        let err = mgr
            .load_manifest_value(json!({ "Label": "a" }), "test://a", false, false)
            .unwrap_err();
        assert!(matches!(err, ManagerError::InvalidManifest { .. }));
    }

    #[test]
    fn unloading_an_unknown_label_fails() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        let err = mgr
            .unload_job_by_label(&Label::new("ghost"), false, false)
            .unwrap_err();
        assert!(matches!(err, ManagerError::UnknownJob { .. }));
    }

    #[test]
    fn clear_state_file_resets_overrides() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        mgr.override_job_enabled(&Label::new("x"), false);
        mgr.clear_state_file().unwrap();
        assert_eq!(mgr.state_file().override_for("x"), None);
    }

    #[test]
    fn list_is_empty_before_any_start() {
        let dir = TempDir::new().unwrap();
        let mgr = manager_in(&dir);
        assert_eq!(mgr.list_jobs(), json!([]));
    }

    #[test]
    fn kill_rejects_unknown_signals_and_labels() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        let err = mgr.kill_job(&Label::new("a"), "SIGBOGUS").unwrap_err();
        assert!(matches!(err, ManagerError::UnknownSignal { .. }));
        let err = mgr.kill_job(&Label::new("a"), "TERM").unwrap_err();
        assert!(matches!(err, ManagerError::UnknownJob { .. }));
    }

    #[tokio::test]
    async fn boot_reports_socket_bind_failure() {
        let dir = TempDir::new().unwrap();
        // A directory squatting on the socket path makes the bind fail.
        std::fs::create_dir(dir.path().join(rpc::SOCKET_FILE_NAME)).unwrap();
        let mut mgr = manager_in(&dir);

        let err = mgr.start_running().unwrap_err();
        assert!(matches!(err, ManagerError::Socket(_)));
        // The manager keeps supervising; only the admin surface is missing.
        assert_eq!(mgr.state(), ManagerState::Running);
        // The failure is reported once, not replayed on later triggers.
        mgr.stop_running();
        assert_eq!(mgr.state(), ManagerState::GracefulShutdown);
    }

    #[tokio::test]
    async fn loads_are_refused_during_shutdown() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);
        mgr.start_running().unwrap();
        mgr.stop_running();
        assert_eq!(mgr.state(), ManagerState::GracefulShutdown);

        let err = mgr
            .load_manifest_value(sleeper("late"), "test://late", false, false)
            .unwrap_err();
        assert!(matches!(err, ManagerError::ShuttingDown));
        assert!(!mgr.load_all_manifests(dir.path(), false, false));
        assert!(mgr.pending_labels().is_empty());
    }

    #[tokio::test]
    async fn rpc_requests_map_onto_operations() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager_in(&dir);

        let listed = mgr.handle_request(Request::List);
        assert!(listed.ok);
        assert_eq!(listed.result, Some(json!([])));

        let enabled = mgr.handle_request(Request::Enable {
            label: "w".to_string(),
            enabled: false,
        });
        assert!(enabled.ok);
        assert_eq!(mgr.state_file().override_for("w"), Some(false));

        let dumped = mgr.handle_request(Request::Dump {
            label: "ghost".to_string(),
        });
        assert!(!dumped.ok);
    }
}
