//! End-to-end manager lifecycle scenarios, driven over real child
//! processes in throwaway state directories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use jobvisor::{Config, Domain, Label, Manager, ManagerState, Response};

fn sleeper(label: &str) -> Value {
    json!({ "Label": label, "ProgramArguments": ["/bin/sleep", "30"] })
}

fn write_manifest(dir: &Path, name: &str, doc: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec_pretty(doc).unwrap()).unwrap();
    path
}

/// Routes manager logs through the test harness; `RUST_LOG` filters them.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn manager(statedir: &TempDir, load_paths: Vec<PathBuf>) -> Manager {
    init_tracing();
    Manager::new(Domain::new(statedir.path(), load_paths)).unwrap()
}

/// Pumps the event loop until the manager reaches `target` or the
/// attempt limit runs out.
async fn drive_until(mgr: &mut Manager, target: ManagerState, iterations: usize) -> bool {
    for _ in 0..iterations {
        if mgr.state() == target {
            return true;
        }
        mgr.run_once(Some(Duration::from_millis(100))).await;
    }
    mgr.state() == target
}

#[tokio::test]
async fn empty_domain_starts_and_stops() {
    let statedir = TempDir::new().unwrap();
    let mut mgr = manager(&statedir, Vec::new());

    mgr.start_running().unwrap();
    assert_eq!(mgr.state(), ManagerState::Running);
    assert!(mgr.run_once(Some(Duration::ZERO)).await);

    mgr.stop_running();
    assert_eq!(mgr.state(), ManagerState::GracefulShutdown);
    assert!(!mgr.run_once(Some(Duration::from_millis(10))).await);
    assert_eq!(mgr.state(), ManagerState::Finished);
}

#[tokio::test]
async fn default_manifests_load_and_start_at_boot() {
    let statedir = TempDir::new().unwrap();
    let jobs = TempDir::new().unwrap();
    write_manifest(jobs.path(), "a.json", &sleeper("a"));
    write_manifest(jobs.path(), "b.json", &sleeper("b"));

    let mut mgr = manager(&statedir, vec![jobs.path().to_path_buf()]);
    mgr.start_running().unwrap();

    let rows = mgr.list_jobs();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["Label"], "a");
    assert_eq!(rows[1]["Label"], "b");
    for row in rows {
        assert_ne!(row["PID"], "-", "job should have a live process");
    }

    mgr.stop_running();
    assert!(drive_until(&mut mgr, ManagerState::Finished, 100).await);
}

#[test]
fn disabled_manifest_requires_force_load() {
    let statedir = TempDir::new().unwrap();
    let jobs = TempDir::new().unwrap();
    let path = write_manifest(
        jobs.path(),
        "a.json",
        &json!({ "Label": "a", "Disabled": true, "ProgramArguments": ["/bin/sleep", "30"] }),
    );

    let mut mgr = manager(&statedir, Vec::new());
    assert!(mgr.load_manifest_path(&path, false, false).is_err());
    assert!(mgr.pending_labels().is_empty());

    mgr.load_manifest_path(&path, false, true).unwrap();
    assert_eq!(mgr.pending_labels(), vec![Label::new("a")]);
}

#[test]
fn enable_override_survives_restart() {
    let statedir = TempDir::new().unwrap();
    let jobs = TempDir::new().unwrap();
    let path = write_manifest(
        jobs.path(),
        "b.json",
        &json!({ "Label": "b", "Disabled": true, "ProgramArguments": ["/bin/sleep", "30"] }),
    );

    {
        let mut mgr = manager(&statedir, Vec::new());
        mgr.load_manifest_path(&path, true, false).unwrap();
        assert_eq!(mgr.pending_labels(), vec![Label::new("b")]);

        let raw =
            std::fs::read_to_string(statedir.path().join(jobvisor::STATE_FILE_NAME)).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["Overrides"]["b"]["Enabled"], json!(true));
    }

    // A fresh manager over the same state directory sees the override.
    let mut mgr = manager(&statedir, Vec::new());
    mgr.load_manifest_path(&path, false, false).unwrap();
    assert_eq!(mgr.pending_labels(), vec![Label::new("b")]);
}

#[tokio::test]
async fn duplicate_labels_load_once() {
    let statedir = TempDir::new().unwrap();
    let jobs = TempDir::new().unwrap();
    write_manifest(jobs.path(), "c1.json", &sleeper("c"));
    write_manifest(jobs.path(), "c2.json", &sleeper("c"));

    let mut mgr = manager(&statedir, vec![jobs.path().to_path_buf()]);
    mgr.start_running().unwrap();

    let rows = mgr.list_jobs();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["Label"], "c");

    mgr.stop_running();
    assert!(drive_until(&mut mgr, ManagerState::Finished, 100).await);
}

#[tokio::test]
async fn graceful_shutdown_drains_jobs() {
    let statedir = TempDir::new().unwrap();
    let mut mgr = manager(&statedir, Vec::new());
    mgr.load_manifest_value(sleeper("sleeper"), "test://sleeper", false, false)
        .unwrap();
    mgr.start_running().unwrap();
    assert_ne!(mgr.list_jobs()[0]["PID"], "-");

    mgr.stop_running();
    assert_eq!(mgr.state(), ManagerState::GracefulShutdown);

    assert!(drive_until(&mut mgr, ManagerState::Finished, 100).await);
    assert!(mgr.active_labels().is_empty());
}

#[tokio::test]
async fn second_signal_escalates_shutdown() {
    let statedir = TempDir::new().unwrap();
    let mut mgr = manager(&statedir, Vec::new());
    mgr.load_manifest_value(sleeper("stubborn"), "test://stubborn", false, false)
        .unwrap();
    mgr.start_running().unwrap();

    mgr.stop_running();
    assert_eq!(mgr.state(), ManagerState::GracefulShutdown);
    assert!(!mgr.active_labels().is_empty());

    mgr.handle_shutdown_signal("SIGINT");
    assert_eq!(mgr.state(), ManagerState::Finished);
    assert!(mgr.active_labels().is_empty());
    assert!(!mgr.run_once(Some(Duration::ZERO)).await);
}

#[tokio::test]
async fn unload_is_not_immediate() {
    let statedir = TempDir::new().unwrap();
    let mut mgr = manager(&statedir, Vec::new());
    mgr.load_manifest_value(sleeper("svc"), "test://svc", false, false)
        .unwrap();
    mgr.start_running().unwrap();

    mgr.unload_job_by_label(&Label::new("svc"), false, false)
        .unwrap();
    // Still registered until the job reports its terminal state.
    assert_eq!(mgr.active_labels(), vec![Label::new("svc")]);

    for _ in 0..100 {
        if mgr.active_labels().is_empty() {
            break;
        }
        mgr.run_once(Some(Duration::from_millis(50))).await;
    }
    assert!(mgr.active_labels().is_empty());
    assert_eq!(mgr.state(), ManagerState::Running);

    mgr.stop_running();
    assert!(drive_until(&mut mgr, ManagerState::Finished, 100).await);
}

#[tokio::test]
async fn kill_reports_signal_exits() {
    let statedir = TempDir::new().unwrap();
    let mut mgr = manager(&statedir, Vec::new());
    mgr.load_manifest_value(sleeper("svc"), "test://svc", false, false)
        .unwrap();
    mgr.start_running().unwrap();

    mgr.kill_job(&Label::new("svc"), "TERM").unwrap();
    for _ in 0..100 {
        if mgr.list_jobs()[0]["PID"] == "-" {
            break;
        }
        mgr.run_once(Some(Duration::from_millis(50))).await;
    }
    // 128 + SIGTERM
    assert_eq!(mgr.list_jobs()[0]["LastExitStatus"], 143);

    mgr.stop_running();
    assert!(drive_until(&mut mgr, ManagerState::Finished, 100).await);
}

#[tokio::test]
async fn keep_alive_jobs_restart_after_exit() {
    init_tracing();
    let statedir = TempDir::new().unwrap();
    let mut cfg = Config::default();
    cfg.throttle_default = Duration::from_millis(50);
    let mut mgr = Manager::with_config(Domain::new(statedir.path(), Vec::new()), cfg).unwrap();
    mgr.load_manifest_value(
        json!({ "Label": "flappy", "Program": "/bin/true", "KeepAlive": true }),
        "test://flappy",
        false,
        false,
    )
    .unwrap();
    mgr.start_running().unwrap();

    let mut saw_exit = false;
    let mut restarted = false;
    for _ in 0..300 {
        mgr.run_once(Some(Duration::from_millis(10))).await;
        let rows = mgr.list_jobs();
        let pid = rows[0]["PID"].as_str().unwrap().to_string();
        if pid == "-" {
            saw_exit = true;
        } else if saw_exit {
            restarted = true;
            break;
        }
    }
    assert!(saw_exit, "the child should have exited at least once");
    assert!(restarted, "the job should have been restarted");

    mgr.stop_running();
    assert!(drive_until(&mut mgr, ManagerState::Finished, 100).await);
}

#[tokio::test]
async fn admin_socket_serves_requests() {
    let statedir = TempDir::new().unwrap();
    let mut mgr = manager(&statedir, Vec::new());
    mgr.load_manifest_value(sleeper("svc"), "test://svc", false, false)
        .unwrap();
    mgr.start_running().unwrap();

    let socket = statedir.path().join(jobvisor::SOCKET_FILE_NAME);
    assert!(socket.exists());

    let client = tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        let stream = tokio::net::UnixStream::connect(&socket).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(b"{\"method\":\"list\"}\n")
            .await
            .unwrap();
        let mut line = String::new();
        BufReader::new(read_half).read_line(&mut line).await.unwrap();
        line
    });

    while !client.is_finished() {
        mgr.run_once(Some(Duration::from_millis(20))).await;
    }
    let line = client.await.unwrap();
    let response: Response = serde_json::from_str(&line).unwrap();
    assert!(response.ok);
    let rows = response.result.unwrap();
    assert_eq!(rows[0]["Label"], "svc");

    mgr.stop_running();
    assert!(!statedir.path().join(jobvisor::SOCKET_FILE_NAME).exists());
    assert!(drive_until(&mut mgr, ManagerState::Finished, 100).await);
}

#[tokio::test]
async fn incremental_loads_promote_on_start_request() {
    let statedir = TempDir::new().unwrap();
    let mut mgr = manager(&statedir, Vec::new());
    mgr.start_running().unwrap();
    assert!(mgr.list_jobs().as_array().unwrap().is_empty());

    mgr.load_manifest_value(sleeper("late-a"), "test://late-a", false, false)
        .unwrap();
    mgr.load_manifest_value(sleeper("late-b"), "test://late-b", false, false)
        .unwrap();
    assert_eq!(mgr.pending_labels().len(), 2);
    assert!(mgr.list_jobs().as_array().unwrap().is_empty());

    // The whole staged batch boots with one start request.
    mgr.start_running().unwrap();
    assert!(mgr.pending_labels().is_empty());
    assert_eq!(mgr.list_jobs().as_array().unwrap().len(), 2);

    mgr.stop_running();
    assert!(drive_until(&mut mgr, ManagerState::Finished, 100).await);
}
