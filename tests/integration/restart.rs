#[path = "common/mod.rs"]
mod common;

use std::{
    fs, thread,
    time::{Duration, Instant},
};

use assert_cmd::Command;
use common::{
    is_process_alive, line_count, send_signal, spawn_keepup, wait_for_contents,
    wait_for_pidfile, wait_for_process_exit, wait_with_timeout,
};
use nix::sys::signal::Signal;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn crash_loop_exhausts_budget_and_runs_error_hook() {
    let temp = tempdir().expect("create tempdir");
    let restarts = temp.path().join("restarts.log");
    let errors = temp.path().join("errors.log");

    Command::new(assert_cmd::cargo::cargo_bin!("keepup"))
        .args(["-a", "3", "-s", "0"])
        .arg("-R")
        .arg(format!("echo r >> {}", restarts.display()))
        .arg("-E")
        .arg(format!("echo e >> {}", errors.display()))
        .arg("exit 1")
        .timeout(Duration::from_secs(30))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("3 restarts within"))
        .stdout(predicate::str::contains("bailing"));

    assert_eq!(line_count(&restarts), 3);
    assert_eq!(line_count(&errors), 1);
}

#[test]
fn exit_causes_are_logged() {
    let temp = tempdir().expect("create tempdir");

    Command::new(assert_cmd::cargo::cargo_bin!("keepup"))
        .args(["-a", "2", "-s", "10ms"])
        .arg("kill -TERM $$")
        .current_dir(temp.path())
        .timeout(Duration::from_secs(30))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("signal(SIGTERM)"))
        .stdout(predicate::str::contains("sleep(10ms)"))
        .stdout(predicate::str::contains("attempts remaining"));
}

#[test]
fn prefix_appears_in_log_lines() {
    let temp = tempdir().expect("create tempdir");

    Command::new(assert_cmd::cargo::cargo_bin!("keepup"))
        .args(["-a", "1", "-s", "0", "-P", "web-worker", "exit 1"])
        .current_dir(temp.path())
        .timeout(Duration::from_secs(30))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("web-worker"));
}

#[test]
fn recovering_child_is_restarted_once_and_kept_alive() {
    let temp = tempdir().expect("create tempdir");
    let marker = temp.path().join("failed-once");
    let restarts = temp.path().join("restarts.log");
    let pidfile = temp.path().join("child.pid");
    let output = temp.path().join("keepup.out");

    let command = format!(
        "if [ -f {marker} ]; then exec sleep 30; else touch {marker}; exit 1; fi",
        marker = marker.display()
    );
    let on_restart = format!("echo r >> {}", restarts.display());

    let mut keepup = spawn_keepup(
        &[
            "-a",
            "3",
            "-s",
            "100ms",
            "-p",
            pidfile.to_str().unwrap(),
            "-R",
            &on_restart,
            &command,
        ],
        &output,
    );

    wait_for_contents(&output, "attempts remaining");
    let deadline = Instant::now() + Duration::from_secs(5);
    while fs::read_to_string(&output)
        .unwrap_or_default()
        .matches("write pid to")
        .count()
        < 2
    {
        assert!(Instant::now() < deadline, "child was not restarted");
        thread::sleep(Duration::from_millis(100));
    }
    // the pidfile is written right after the log line
    thread::sleep(Duration::from_millis(200));
    let child_pid = wait_for_pidfile(&pidfile);

    thread::sleep(Duration::from_millis(500));
    assert!(is_process_alive(keepup.id()));
    assert!(is_process_alive(child_pid));
    assert_eq!(line_count(&restarts), 1);

    send_signal(keepup.id(), Signal::SIGTERM);
    let status = wait_with_timeout(&mut keepup, Duration::from_secs(10));
    assert_eq!(status.code(), Some(0));
    wait_for_process_exit(child_pid);
}
