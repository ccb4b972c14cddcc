//! Event plumbing: wakeup events and the reactor that delivers them.
//!
//! - [`event`]: the [`WakeEvent`] taxonomy delivered to the manager
//! - [`reactor`]: the [`EventManager`] multiplexing signals, messages, and
//!   timers into one wakeup stream, plus the [`EventSender`] handle given
//!   to jobs and the admin channel

mod event;
mod reactor;

pub(crate) use event::{IpcMessage, RpcTurn, SignalEvent, TimerKey, WakeEvent};
pub(crate) use reactor::{EventManager, EventSender};
