//! # Event manager: the reactor behind the manager's event loop.
//!
//! [`EventManager`] multiplexes every asynchronous source the manager
//! reacts to into a single wakeup stream:
//!
//! ```text
//! signal listeners (tokio::signal) ──┐
//! child reapers ── EventSender ──────┤
//! admin accept loop ── EventSender ──┼──► wait_for_event(timeout) ──► WakeEvent
//! delete_job messages ───────────────┤
//! armed timers ──────────────────────┘
//! ```
//!
//! ## Rules
//! - `wait_for_event` is the only suspension point the manager blocks on.
//! - Signal listeners use the runtime's self-pipe delivery: the OS handler
//!   only performs a wakeup write, and the event surfaces here on the main
//!   loop where it is safe to mutate manager state.
//! - Timers are lightweight entries scanned per wait; the earliest deadline
//!   bounds the sleep.
//! - `None` from `wait_for_event` means the caller's timeout elapsed.

use tokio::io;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use super::event::{SignalEvent, TimerKey, WakeEvent};

/// Cloneable handle for feeding events into the reactor.
///
/// Held by child reapers and the admin accept loop. A handle cannot extend
/// the reactor's lifetime; sends after teardown are silently dropped.
#[derive(Clone)]
pub(crate) struct EventSender {
    tx: mpsc::UnboundedSender<WakeEvent>,
}

impl EventSender {
    pub(crate) fn send(&self, event: WakeEvent) {
        let _ = self.tx.send(event);
    }
}

struct SignalListeners {
    interrupt: Signal,
    terminate: Signal,
    pipe: Signal,
}

struct TimerEntry {
    deadline: Instant,
    key: TimerKey,
}

/// Single-threaded reactor multiplexing signals, messages, and timers.
pub(crate) struct EventManager {
    tx: EventSender,
    rx: mpsc::UnboundedReceiver<WakeEvent>,
    signals: Option<SignalListeners>,
    timers: Vec<TimerEntry>,
}

enum Woke {
    Channel(Option<WakeEvent>),
    Signal(SignalEvent),
    Deadline,
}

impl EventManager {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: EventSender { tx },
            rx,
            signals: None,
            timers: Vec::new(),
        }
    }

    /// Returns a handle for feeding events into this reactor.
    pub(crate) fn handle(&self) -> EventSender {
        self.tx.clone()
    }

    /// Installs listeners for SIGINT, SIGTERM, and SIGPIPE.
    ///
    /// Idempotent; subsequent calls replace the listeners.
    pub(crate) fn install_signal_listeners(&mut self) -> io::Result<()> {
        self.signals = Some(SignalListeners {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            pipe: signal(SignalKind::pipe())?,
        });
        Ok(())
    }

    /// Arms a one-shot timer that fires through `wait_for_event`.
    pub(crate) fn add_timer(&mut self, delay: Duration, key: TimerKey) {
        self.timers.push(TimerEntry {
            deadline: Instant::now() + delay,
            key,
        });
    }

    /// Waits for the next event, up to `timeout` (unbounded when `None`).
    ///
    /// Returns `None` when the timeout elapses with nothing to deliver.
    pub(crate) async fn wait_for_event(
        &mut self,
        timeout: Option<Duration>,
    ) -> Option<WakeEvent> {
        let now = Instant::now();
        if let Some(event) = self.pop_due_timer(now) {
            return Some(event);
        }

        let timer_deadline = self.timers.iter().map(|t| t.deadline).min();
        let timeout_deadline = timeout.map(|t| now + t);
        let deadline = match (timeout_deadline, timer_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let woke = tokio::select! {
            message = self.rx.recv() => Woke::Channel(message),
            sig = Self::recv_signal(&mut self.signals) => Woke::Signal(sig),
            _ = Self::sleep_until(deadline) => Woke::Deadline,
        };

        match woke {
            Woke::Channel(message) => message,
            Woke::Signal(sig) => Some(WakeEvent::Signal(sig)),
            Woke::Deadline => self.pop_due_timer(Instant::now()),
        }
    }

    /// Removes and returns the earliest timer whose deadline has passed.
    fn pop_due_timer(&mut self, now: Instant) -> Option<WakeEvent> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| t.deadline)
            .map(|(i, _)| i)?;
        let entry = self.timers.swap_remove(index);
        Some(WakeEvent::Timer(entry.key))
    }

    async fn recv_signal(listeners: &mut Option<SignalListeners>) -> SignalEvent {
        match listeners {
            Some(l) => tokio::select! {
                _ = l.interrupt.recv() => SignalEvent::Interrupt,
                _ = l.terminate.recv() => SignalEvent::Terminate,
                _ = l.pipe.recv() => SignalEvent::Pipe,
            },
            None => std::future::pending().await,
        }
    }

    async fn sleep_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
