//! # Manager lifecycle machine.
//!
//! States and triggers are sum types; the transition table is a pure
//! function from `(state, trigger, guards)` to a planned transition, so
//! tests can dry-run the table without touching a live manager. Actions
//! belong to transitions, not to states; the manager executes the planned
//! action after committing the state change.
//!
//! ```text
//! Unconfigured ──StartRequested──► Running ──StopRequested──► GracefulShutdown
//!      │                            │  ▲                            │
//!      │ StopRequested              └──┘ StartRequested             │ StopRequested /
//!      ▼                           [pending jobs exist]             │ AllJobsExited
//! Finished ◄────────────────────────────────────────────────────────┘
//! ```

/// Lifecycle states of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Constructed but not started.
    Unconfigured,
    /// Serving events, admin requests, and jobs.
    Running,
    /// Draining jobs; no new loads or admin requests accepted.
    GracefulShutdown,
    /// Terminal.
    Finished,
}

impl ManagerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerState::Unconfigured => "unconfigured",
            ManagerState::Running => "running",
            ManagerState::GracefulShutdown => "shutting-down",
            ManagerState::Finished => "finished",
        }
    }
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Triggers that drive the lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ManagerTrigger {
    StartRequested,
    StopRequested,
    AllJobsExited,
}

impl ManagerTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerTrigger::StartRequested => "StartRequested",
            ManagerTrigger::StopRequested => "StopRequested",
            ManagerTrigger::AllJobsExited => "AllJobsExited",
        }
    }
}

impl std::fmt::Display for ManagerTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action executed after a transition commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Nothing to do.
    None,
    /// Install signal listeners, bind the admin socket, load default
    /// manifests, promote everything pending.
    BootManager,
    /// Promote pending jobs into the active table.
    PromotePending,
    /// Unbind the admin socket, then request unload of all active jobs.
    BeginShutdown,
    /// Log that the drain completed.
    NoteAllExited,
}

/// Inputs to guard evaluation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Guards {
    /// True when no jobs are staged in the pending table.
    pub pending_empty: bool,
}

/// A planned state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub to: ManagerState,
    pub action: Action,
}

/// The transition table. Returns `None` when the trigger does not apply in
/// the given state (or its guard rejects it).
pub(crate) fn plan(
    from: ManagerState,
    trigger: ManagerTrigger,
    guards: &Guards,
) -> Option<Transition> {
    use ManagerState::*;
    use ManagerTrigger::*;

    let transition = match (from, trigger) {
        (Unconfigured, StopRequested) => Transition {
            to: Finished,
            action: Action::None,
        },
        (Unconfigured, StartRequested) => Transition {
            to: Running,
            action: Action::BootManager,
        },
        (Running, StartRequested) if !guards.pending_empty => Transition {
            to: Running,
            action: Action::PromotePending,
        },
        (Running, StopRequested) => Transition {
            to: GracefulShutdown,
            action: Action::BeginShutdown,
        },
        (GracefulShutdown, StopRequested) => Transition {
            to: Finished,
            action: Action::None,
        },
        (GracefulShutdown, AllJobsExited) => Transition {
            to: Finished,
            action: Action::NoteAllExited,
        },
        _ => return None,
    };
    Some(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ManagerState::*;
    use ManagerTrigger::*;

    const EMPTY: Guards = Guards {
        pending_empty: true,
    };
    const STAGED: Guards = Guards {
        pending_empty: false,
    };

    #[test]
    fn boot_and_stop_from_unconfigured() {
        let boot = plan(Unconfigured, StartRequested, &EMPTY).unwrap();
        assert_eq!(boot.to, Running);
        assert_eq!(boot.action, Action::BootManager);

        let stop = plan(Unconfigured, StopRequested, &EMPTY).unwrap();
        assert_eq!(stop.to, Finished);
        assert_eq!(stop.action, Action::None);
    }

    #[test]
    fn incremental_start_is_guarded_on_pending() {
        assert!(plan(Running, StartRequested, &EMPTY).is_none());
        let promote = plan(Running, StartRequested, &STAGED).unwrap();
        assert_eq!(promote.to, Running);
        assert_eq!(promote.action, Action::PromotePending);
    }

    #[test]
    fn stop_from_running_begins_shutdown() {
        let stop = plan(Running, StopRequested, &STAGED).unwrap();
        assert_eq!(stop.to, GracefulShutdown);
        assert_eq!(stop.action, Action::BeginShutdown);
    }

    #[test]
    fn shutdown_finishes_on_either_trigger() {
        let drained = plan(GracefulShutdown, AllJobsExited, &EMPTY).unwrap();
        assert_eq!(drained.to, Finished);
        assert_eq!(drained.action, Action::NoteAllExited);

        let stopped = plan(GracefulShutdown, StopRequested, &EMPTY).unwrap();
        assert_eq!(stopped.to, Finished);
        assert_eq!(stopped.action, Action::None);
    }

    #[test]
    fn dead_ends_yield_no_transition() {
        assert!(plan(Finished, StartRequested, &STAGED).is_none());
        assert!(plan(Finished, StopRequested, &EMPTY).is_none());
        assert!(plan(Running, AllJobsExited, &EMPTY).is_none());
        assert!(plan(Unconfigured, AllJobsExited, &EMPTY).is_none());
        assert!(plan(GracefulShutdown, StartRequested, &STAGED).is_none());
    }
}
