#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use keepup::pidfile::PidFile;
use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid as NixPid,
};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Path of the compiled `keepup` binary.
pub fn keepup_bin() -> PathBuf {
    PathBuf::from(assert_cmd::cargo::cargo_bin!("keepup"))
}

/// Starts `keepup` in the background with stdout captured to `log`.
pub fn spawn_keepup(args: &[&str], log: &Path) -> Child {
    let out = fs::File::create(log).expect("create output log");
    let err = out.try_clone().expect("clone output log");
    Command::new(keepup_bin())
        .args(args)
        .stdin(Stdio::null())
        .stdout(out)
        .stderr(err)
        .spawn()
        .expect("spawn keepup")
}

pub fn send_signal(pid: u32, signal: Signal) {
    kill(NixPid::from_raw(pid as i32), signal).expect("send signal");
}

/// Waits for `child` to exit, killing it and panicking after `timeout`.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return status;
        }

        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("Timed out waiting for pid {} to exit", child.id());
        }

        thread::sleep(Duration::from_millis(100));
    }
}

pub fn wait_for_lines(path: &Path, expected: usize) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(content) = fs::read_to_string(path) {
            let lines: Vec<_> = content.lines().map(|line| line.to_string()).collect();
            if lines.len() >= expected {
                return lines;
            }
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for {expected} lines in {:?}", path);
        }

        thread::sleep(Duration::from_millis(100));
    }
}

pub fn line_count(path: &Path) -> usize {
    fs::read_to_string(path)
        .map(|content| content.lines().count())
        .unwrap_or(0)
}

/// Waits until `path` contains `needle`, returning the full contents.
pub fn wait_for_contents(path: &Path, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(content) = fs::read_to_string(path)
            && content.contains(needle)
        {
            return content;
        }

        if Instant::now() >= deadline {
            panic!(
                "Timed out waiting for '{needle}' in {:?}: {:?}",
                path,
                fs::read_to_string(path).unwrap_or_default()
            );
        }

        thread::sleep(Duration::from_millis(100));
    }
}

pub fn wait_for_path(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Timed out waiting for {:?} to exist", path);
}

/// Waits for a pidfile to appear and returns the PID it records.
pub fn wait_for_pidfile(path: &Path) -> u32 {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(record) = PidFile::new(path).read() {
            return record.pid as u32;
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for a PID in {:?}", path);
        }

        thread::sleep(Duration::from_millis(100));
    }
}

/// Waits until `pid` is gone or has become a zombie.
pub fn wait_for_process_exit(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    let stat_path = PathBuf::from(format!("/proc/{pid}/stat"));

    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return;
        }

        // zombies are dead for our purposes
        if let Ok(stat) = fs::read_to_string(&stat_path)
            && let Some(state_start) = stat.rfind(')')
            && let Some(state) = stat[state_start + 1..].trim().chars().next()
            && (state == 'Z' || state == 'X')
        {
            return;
        }

        thread::sleep(Duration::from_millis(100));
    }

    panic!("Timed out waiting for PID {} to exit", pid);
}

pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some()
}
