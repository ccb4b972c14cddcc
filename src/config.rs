//! # Global runtime configuration.
//!
//! [`Config`] defines the manager's tunables: the shutdown drain poll
//! interval, the admin socket listen backlog, and the default keep-alive
//! restart throttle applied when a manifest does not set its own.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use jobvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.shutdown_poll = Duration::from_millis(250);
//! cfg.socket_backlog = 128;
//!
//! assert_eq!(cfg.socket_backlog, 128);
//! ```

use std::time::Duration;

/// Global configuration for the manager.
///
/// Controls the shutdown drain cadence, the admin socket backlog, and the
/// default restart throttle for keep-alive jobs.
#[derive(Clone, Debug)]
pub struct Config {
    /// Upper bound on the event wait while draining jobs during graceful
    /// shutdown, so the drain makes progress even without external events.
    pub shutdown_poll: Duration,
    /// Listen backlog for the admin socket.
    pub socket_backlog: u32,
    /// Restart throttle for keep-alive jobs whose manifest does not set
    /// `ThrottleInterval`.
    pub throttle_default: Duration,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `shutdown_poll = 500ms`
    /// - `socket_backlog = 1024`
    /// - `throttle_default = 10s`
    fn default() -> Self {
        Self {
            shutdown_poll: Duration::from_millis(500),
            socket_backlog: 1024,
            throttle_default: Duration::from_secs(10),
        }
    }
}
