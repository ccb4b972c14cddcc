//! Manager core: lifecycle, registry, and event dispatch.
//!
//! The only public API re-exported from here is [`Manager`] (plus its
//! [`ManagerState`]). Everything else is an internal building block the
//! manager wires together.
//!
//! ## Files & responsibilities
//! - **manager.rs**: the top-level machine; owns the domain, the state
//!   document, the reactor, the admin channel, and every job; runs the
//!   load/unload pipeline and dispatches every event.
//! - **fsm.rs**: the four-state lifecycle table with separable guards and
//!   actions, dry-runnable in tests.
//! - **registry.rs**: the two-phase pending/active container with bulk
//!   promotion and eviction.
//!
//! ## Event data-plane (who produces & who consumes)
//!
//! Producers (feed the reactor's wakeup channel):
//! - **signal listeners** → `Signal{Interrupt, Terminate, Pipe}`
//! - **child reapers** → `ChildExited{label, status}`
//! - **admin accept loop** → `Rpc{request, reply}`
//! - **jobs** → `Ipc(DeleteJob{label})` on reaching their terminal state
//! - **armed timers** → `Timer(RestartJob{label})`
//!
//! Consumer:
//! - **Manager::dispatch**, one event at a time, run to completion.
//!
//! ## Shutdown timeline
//! ```text
//! SIGINT/SIGTERM → StopRequested → unbind admin socket → unload broadcast
//! → drain (500ms-capped waits) → registry empty → AllJobsExited → Finished
//! second signal while draining → kill remaining processes → Finished
//! ```

mod fsm;
mod manager;
mod registry;

pub use fsm::ManagerState;
pub use manager::Manager;
