//! # jobvisor
//!
//! **Jobvisor** is a lightweight per-domain job supervision library.
//!
//! A [`Manager`] loads job manifests, drives jobs through a two-phase
//! load/start protocol, persists enable/disable overrides across restarts,
//! dispatches administrative requests over a local socket, and coordinates
//! orderly shutdown. It is designed as the long-lived core of a service
//! supervisor daemon.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types                                |
//! |-------------------|--------------------------------------------------------------------|------------------------------------------|
//! | **Lifecycle**     | Four-state manager machine driven by a single event loop.          | [`Manager`], [`ManagerState`]            |
//! | **Jobs**          | Load, start, unload, kill, and inspect supervised processes.       | [`Manifest`], [`Label`], [`JobState`]    |
//! | **Overrides**     | Persisted enable/disable decisions in an atomic state document.    | [`StateFile`]                            |
//! | **Admin surface** | Local-socket RPC: load, unload, list, kill, enable, dump.          | [`Request`], [`Response`]                |
//! | **Errors**        | Typed errors for the manager, jobs, and the state store.           | [`ManagerError`], [`JobError`], [`StateError`] |
//! | **Configuration** | Centralized runtime settings.                                      | [`Config`], [`Domain`]                   |
//!
//! ## Example
//!
//! ```no_run
//! use jobvisor::{Domain, Manager};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let domain = Domain::new(
//!         "/var/db/jobvisor",
//!         vec!["/etc/jobvisor/manifests".into()],
//!     );
//!
//!     let mut manager = Manager::new(domain)?;
//!     manager.start_running()?;
//!     manager.run_main_loop().await;
//!     Ok(())
//! }
//! ```
//!
//! Administrators stage jobs with any number of load requests and boot the
//! whole batch with one start request; jobs loaded later are promoted by
//! issuing another start request. Shutdown unbinds the admin socket before
//! any job is touched, then drains cooperatively; a second signal (or
//! dropping the manager) kills whatever remains.
//!
//! ---

mod config;
mod core;
mod domain;
mod error;
mod events;
mod jobs;
mod rpc;
mod signals;
mod state;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{Manager, ManagerState};
pub use domain::Domain;
pub use error::{JobError, ManagerError, StateError};
pub use jobs::{JobState, Label, Manifest};
pub use rpc::{Request, Response, SOCKET_FILE_NAME};
pub use state::{StateFile, STATE_FILE_NAME};
