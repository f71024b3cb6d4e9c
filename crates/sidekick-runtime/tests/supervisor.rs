//! Supervisor tests against shell-script fake engines.
//!
//! The scripts ignore their arguments; `/health` is served by a local axum
//! server bound to the port the engine is configured with.

#![cfg(unix)]

use axum::Router;
use axum::routing::get;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use sidekick_runtime::{
    EngineConfig, EngineState, EngineSupervisor, ProcessError, SupervisorOptions, remove_artifact,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        health_interval: Duration::from_millis(50),
        startup_timeout: Duration::from_secs(5),
        stop_grace: Duration::from_millis(500),
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_model(dir: &Path) -> PathBuf {
    let path = dir.join("model.gguf");
    std::fs::write(&path, b"GGUF").unwrap();
    path
}

/// Serve `/health` on an ephemeral port and return it.
async fn health_server() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = Router::new().route("/health", get(|| async { r#"{"status":"ok"}"# }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// A port nothing is listening on.
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn read_pid(path: &Path) -> i32 {
    std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
}

fn is_alive(pid: i32) -> bool {
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

async fn wait_until_dead(pid: i32) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while is_alive(pid) {
        assert!(Instant::now() < deadline, "process {pid} is still alive");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_start_runs_until_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let model = write_model(dir.path());
    let port = health_server().await;

    let supervisor = EngineSupervisor::spawn(fast_options());
    let bound = supervisor
        .start(EngineConfig::new(&binary, &model).with_port(port))
        .await
        .unwrap();

    assert_eq!(bound, port);
    let status = supervisor.status();
    assert_eq!(status.state, EngineState::Running);
    assert_eq!(status.running_port(), Some(port));
    assert_eq!(status.model_path.as_deref(), Some(model.as_path()));

    let pid = read_pid(&pid_file);
    assert!(is_alive(pid));

    supervisor.stop().await;
    assert_eq!(supervisor.status().state, EngineState::Stopped);
    assert_eq!(supervisor.status().port, None);
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn test_engine_receives_expected_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("args");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("echo \"$@\" > '{}'\nexec sleep 30", args_file.display()),
    );
    let model = write_model(dir.path());
    let port = health_server().await;

    let supervisor = EngineSupervisor::spawn(fast_options());
    let config = EngineConfig::new(&binary, &model)
        .with_port(port)
        .with_context_size(2048)
        .with_threads(2);
    supervisor.start(config).await.unwrap();

    let args = std::fs::read_to_string(&args_file).unwrap();
    assert_eq!(
        args.trim(),
        format!(
            "-m {} -c 2048 -t 2 --host 127.0.0.1 --port {port} --embedding",
            model.display()
        )
    );
    supervisor.stop().await;
}

#[tokio::test]
async fn test_second_start_does_not_spawn_again() {
    let dir = tempfile::tempdir().unwrap();
    let count_file = dir.path().join("count");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("echo started >> '{}'\nexec sleep 30", count_file.display()),
    );
    let model = write_model(dir.path());
    let port = health_server().await;

    let supervisor = EngineSupervisor::spawn(fast_options());
    let config = EngineConfig::new(&binary, &model).with_port(port);
    assert_eq!(supervisor.start(config.clone()).await.unwrap(), port);
    assert_eq!(supervisor.start(config).await.unwrap(), port);

    let launches = std::fs::read_to_string(&count_file).unwrap();
    assert_eq!(launches.lines().count(), 1);
    supervisor.stop().await;
}

#[tokio::test]
async fn test_startup_timeout_kills_process() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let model = write_model(dir.path());

    let supervisor = EngineSupervisor::spawn(SupervisorOptions {
        startup_timeout: Duration::from_millis(500),
        ..fast_options()
    });
    let err = supervisor
        .start(EngineConfig::new(&binary, &model).with_port(free_port()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::StartupTimeout { .. }));
    assert_eq!(supervisor.status().state, EngineState::Stopped);
    assert!(!is_alive(read_pid(&pid_file)));
}

#[tokio::test]
async fn test_startup_timeout_does_not_wait_for_stop_grace() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("trap '' TERM\necho $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let model = write_model(dir.path());

    let supervisor = EngineSupervisor::spawn(SupervisorOptions {
        startup_timeout: Duration::from_millis(500),
        stop_grace: Duration::from_secs(10),
        ..fast_options()
    });
    let started = Instant::now();
    let err = supervisor
        .start(EngineConfig::new(&binary, &model).with_port(free_port()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessError::StartupTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!is_alive(read_pid(&pid_file)));
}

#[tokio::test]
async fn test_early_exit_reports_code_and_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_script(
        dir.path(),
        "engine",
        "echo 'loading model' >&2\necho 'error: unable to load model' >&2\nexit 3",
    );
    let model = write_model(dir.path());

    let supervisor = EngineSupervisor::spawn(fast_options());
    let err = supervisor
        .start(EngineConfig::new(&binary, &model).with_port(free_port()))
        .await
        .unwrap_err();

    match &err {
        ProcessError::ExitedDuringStartup { code, diagnostics } => {
            assert_eq!(*code, Some(3));
            assert_eq!(diagnostics, "loading model\nerror: unable to load model");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("exit code 3"));
    assert_eq!(supervisor.status().state, EngineState::Stopped);
}

#[tokio::test]
async fn test_crash_while_running_is_observed() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let model = write_model(dir.path());
    let port = health_server().await;

    let supervisor = EngineSupervisor::spawn(fast_options());
    supervisor
        .start(EngineConfig::new(&binary, &model).with_port(port))
        .await
        .unwrap();

    let mut status = supervisor.subscribe();
    signal::kill(Pid::from_raw(read_pid(&pid_file)), Signal::SIGKILL).unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.state == EngineState::Stopped),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(!supervisor.status().running());
}

#[tokio::test]
async fn test_stop_escalates_when_sigterm_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("trap '' TERM\necho $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let model = write_model(dir.path());
    let port = health_server().await;

    let supervisor = EngineSupervisor::spawn(SupervisorOptions {
        stop_grace: Duration::from_millis(300),
        ..fast_options()
    });
    supervisor
        .start(EngineConfig::new(&binary, &model).with_port(port))
        .await
        .unwrap();
    let pid = read_pid(&pid_file);

    let started = Instant::now();
    supervisor.stop().await;

    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(supervisor.status().state, EngineState::Stopped);
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn test_dropping_last_handle_stops_engine() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let model = write_model(dir.path());
    let port = health_server().await;

    let supervisor = EngineSupervisor::spawn(fast_options());
    supervisor
        .start(EngineConfig::new(&binary, &model).with_port(port))
        .await
        .unwrap();
    let pid = read_pid(&pid_file);

    drop(supervisor);
    wait_until_dead(pid).await;
}

#[tokio::test]
async fn test_remove_artifact_stops_engine_first() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let binary = write_script(
        dir.path(),
        "engine",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let model = write_model(dir.path());
    let port = health_server().await;

    let supervisor = EngineSupervisor::spawn(fast_options());
    supervisor
        .start(EngineConfig::new(&binary, &model).with_port(port))
        .await
        .unwrap();
    let pid = read_pid(&pid_file);

    remove_artifact(&supervisor, &model).await.unwrap();

    assert!(!model.exists());
    assert_eq!(supervisor.status().state, EngineState::Stopped);
    assert!(!is_alive(pid));
}
