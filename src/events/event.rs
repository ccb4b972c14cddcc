//! # Wakeup events delivered by the event manager.
//!
//! [`WakeEvent`] classifies everything that can wake the manager's event
//! loop:
//! - **Signals**: SIGINT / SIGTERM shutdown requests and the ignored SIGPIPE
//! - **Admin traffic**: one decoded request plus its reply slot
//! - **Child exits**: a supervised process terminated
//! - **Internal messages**: job-to-manager notifications (`delete_job`)
//! - **Timers**: keep-alive restart deadlines
//!
//! Events are values, not callbacks: the reactor returns one event per wait
//! and the manager dispatches it on itself, so every handler runs to
//! completion on the main loop before the next event is drawn.

use std::process::ExitStatus;

use tokio::sync::oneshot;

use crate::jobs::Label;
use crate::rpc::{Request, Response};

/// One wakeup, as reported by [`EventManager::wait_for_event`](super::EventManager::wait_for_event).
#[derive(Debug)]
pub(crate) enum WakeEvent {
    /// An OS signal was delivered.
    Signal(SignalEvent),
    /// A decoded admin request awaiting a reply.
    Rpc(RpcTurn),
    /// A supervised child process exited.
    ChildExited { label: Label, status: ExitStatus },
    /// An internal job-to-manager message.
    Ipc(IpcMessage),
    /// A timer armed with [`add_timer`](super::EventManager::add_timer) came due.
    Timer(TimerKey),
}

/// The signals the manager claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalEvent {
    /// SIGINT.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// SIGPIPE. Logged and ignored so writes to closed sockets cannot kill
    /// the process.
    Pipe,
}

impl SignalEvent {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            SignalEvent::Interrupt => "SIGINT",
            SignalEvent::Terminate => "SIGTERM",
            SignalEvent::Pipe => "SIGPIPE",
        }
    }
}

/// Internal messages from jobs to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IpcMessage {
    /// The job reached its terminal `Unloaded` state; evict it from the
    /// registry.
    DeleteJob(Label),
}

/// Identifies what an armed timer should do when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerKey {
    /// Restart a keep-alive job once its throttle interval has passed.
    RestartJob(Label),
}

/// A decoded admin request and the slot its response goes back through.
#[derive(Debug)]
pub(crate) struct RpcTurn {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}
