//! # Admin channel: the local-socket RPC surface.
//!
//! The manager listens on a unix stream socket inside the state directory.
//! Clients speak newline-delimited JSON: one [`Request`] per line, answered
//! by one [`Response`] per line.
//!
//! ```text
//! client ──► {"method":"load","path":"/etc/jobs/worker.json"}\n
//! client ◄── {"ok":true,"result":true}\n
//! ```
//!
//! ## Rules
//! - The accept loop never touches manager state. Decoded requests are
//!   forwarded to the event loop and answered through a oneshot reply slot,
//!   so administrative handlers run with the same no-reentrancy guarantee
//!   as every other event.
//! - Unbinding cancels the loop and unlinks the socket file; a manager that
//!   has begun shutting down accepts no further requests.
//! - Authentication is filesystem permissions on the socket path; there is
//!   no wire-level auth.

use std::fs;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{EventSender, RpcTurn, WakeEvent};

/// File name of the admin socket inside the state directory.
pub const SOCKET_FILE_NAME: &str = "rpc.sock";

/// One administrative request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    /// Load one manifest file, or every manifest in a directory.
    Load {
        path: String,
        #[serde(default)]
        override_disabled: bool,
        #[serde(default)]
        force: bool,
    },
    /// Unload a job by label, or by the path of its manifest.
    Unload {
        target: String,
        #[serde(default)]
        override_disabled: bool,
        #[serde(default)]
        force: bool,
    },
    /// List active jobs.
    List,
    /// Send a signal (by name or number) to a job's process.
    Kill { label: String, signal: String },
    /// Persist an enable/disable override for a label.
    Enable { label: String, enabled: bool },
    /// Diagnostic dump of one job.
    Dump { label: String },
}

/// The answer to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Owner of the admin socket's bind/unbind lifecycle.
pub(crate) struct Channel {
    path: Option<PathBuf>,
    shutdown: Option<CancellationToken>,
}

impl Channel {
    pub fn new() -> Self {
        Self {
            path: None,
            shutdown: None,
        }
    }

    /// Binds the socket and spawns the accept loop.
    ///
    /// A stale socket file left by a previous run is removed first.
    pub fn bind_and_listen(
        &mut self,
        path: &Path,
        backlog: u32,
        events: EventSender,
    ) -> std::io::Result<()> {
        if self.shutdown.is_some() {
            return Ok(());
        }
        if path.exists() {
            debug!(path = %path.display(), "removing stale admin socket");
            let _ = fs::remove_file(path);
        }
        let listener = bind_with_backlog(path, backlog)?;
        let token = CancellationToken::new();
        tokio::spawn(accept_loop(listener, events, token.clone()));
        self.path = Some(path.to_path_buf());
        self.shutdown = Some(token);
        info!(path = %path.display(), "admin socket listening");
        Ok(())
    }

    /// Stops the accept loop and unlinks the socket file. Idempotent.
    pub fn unbind_and_stop_listening(&mut self) {
        if let Some(token) = self.shutdown.take() {
            token.cancel();
        }
        if let Some(path) = self.path.take() {
            let _ = fs::remove_file(&path);
            debug!(path = %path.display(), "admin socket unbound");
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.unbind_and_stop_listening();
    }
}

/// Creates the listening socket with an explicit backlog.
fn bind_with_backlog(path: &Path, backlog: u32) -> std::io::Result<UnixListener> {
    use nix::sys::socket::{
        bind, listen, socket, AddressFamily, Backlog, SockFlag, SockType, UnixAddr,
    };

    let into_io = |errno: nix::errno::Errno| std::io::Error::from_raw_os_error(errno as i32);

    let fd = socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
        None,
    )
    .map_err(into_io)?;
    let addr = UnixAddr::new(path).map_err(into_io)?;
    bind(fd.as_raw_fd(), &addr).map_err(into_io)?;
    let backlog = Backlog::new(backlog as i32).map_err(into_io)?;
    listen(&fd, backlog).map_err(into_io)?;

    let std_listener = unsafe { std::os::unix::net::UnixListener::from_raw_fd(fd.into_raw_fd()) };
    UnixListener::from_std(std_listener)
}

async fn accept_loop(listener: UnixListener, events: EventSender, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(serve_connection(stream, events.clone(), token.clone()));
                }
                Err(err) => warn!(error = %err, "admin socket accept failed"),
            }
        }
    }
}

/// Serves one client: decode a request line, hand it to the event loop,
/// write the reply back.
async fn serve_connection(stream: UnixStream, events: EventSender, token: CancellationToken) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = tokio::select! {
            _ = token.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let (reply, wait) = oneshot::channel();
                events.send(WakeEvent::Rpc(RpcTurn { request, reply }));
                match wait.await {
                    Ok(response) => response,
                    // The manager went away; nothing sensible to answer.
                    Err(_) => break,
                }
            }
            Err(err) => Response::failure(format!("malformed request: {err}")),
        };

        let Ok(mut payload) = serde_json::to_vec(&response) else {
            break;
        };
        payload.push(b'\n');
        if write_half.write_all(&payload).await.is_err() {
            break;
        }
    }
}
