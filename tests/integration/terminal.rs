#[path = "common/mod.rs"]
mod common;

use std::{
    fs::File,
    io::{self, Read, Write},
    os::unix::process::CommandExt,
    process::{Child, Command, Stdio},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use common::{keepup_bin, send_signal, wait_with_timeout};
use nix::{pty::openpty, sys::signal::Signal, unistd::setsid};

/// `keepup` running as the foreground job of a fresh pseudo-terminal.
struct TerminalSession {
    keepup: Child,
    input: File,
    output: Arc<Mutex<String>>,
}

impl TerminalSession {
    fn start(args: &[&str]) -> Self {
        let pty = openpty(None, None).expect("open pty");
        let slave = pty.slave;

        let mut cmd = Command::new(keepup_bin());
        cmd.args(args)
            .stdin(Stdio::from(slave.try_clone().expect("clone pty")))
            .stdout(Stdio::from(slave.try_clone().expect("clone pty")))
            .stderr(Stdio::from(slave));
        unsafe {
            cmd.pre_exec(|| {
                setsid()?;
                if libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY, 0) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
        let keepup = cmd.spawn().expect("spawn keepup");
        drop(cmd);

        let input = File::from(pty.master);
        let mut reader = input.try_clone().expect("clone pty master");
        let output = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&output);
        thread::spawn(move || {
            let mut buf = [0u8; 1024];
            while let Ok(n) = reader.read(&mut buf) {
                if n == 0 {
                    break;
                }
                sink.lock()
                    .unwrap()
                    .push_str(&String::from_utf8_lossy(&buf[..n]));
            }
        });

        Self {
            keepup,
            input,
            output,
        }
    }

    fn type_keys(&mut self, keys: &str) {
        self.input
            .write_all(keys.as_bytes())
            .expect("write to terminal");
    }

    fn wait_for_output(&self, needle: &str) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if self.output.lock().unwrap().contains(needle) {
                return;
            }

            if Instant::now() >= deadline {
                panic!(
                    "Timed out waiting for '{needle}' on the terminal: {:?}",
                    self.output.lock().unwrap()
                );
            }

            thread::sleep(Duration::from_millis(100));
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = self.keepup.kill();
        let _ = self.keepup.wait();
    }
}

#[test]
fn child_reads_input_typed_at_the_terminal() {
    let mut session = TerminalSession::start(&[
        "-a",
        "3",
        "-s",
        "0",
        "read line; echo got:$line; exec sleep 30",
    ]);

    session.wait_for_output("child ");
    session.type_keys("hello\n");
    session.wait_for_output("got:hello");

    send_signal(session.keepup.id(), Signal::SIGTERM);
    let status = wait_with_timeout(&mut session.keepup, Duration::from_secs(10));
    assert_eq!(status.code(), Some(0));
}

#[test]
fn restarted_child_gets_the_terminal_back() {
    let mut session = TerminalSession::start(&[
        "-a",
        "5",
        "-s",
        "0",
        "read line; echo got:$line",
    ]);

    session.wait_for_output("child ");
    session.type_keys("one\n");
    session.wait_for_output("got:one");
    session.wait_for_output("attempts remaining");

    session.type_keys("two\n");
    session.wait_for_output("got:two");

    send_signal(session.keepup.id(), Signal::SIGTERM);
    let status = wait_with_timeout(&mut session.keepup, Duration::from_secs(10));
    assert_eq!(status.code(), Some(0));
}

#[test]
fn interrupt_key_shuts_the_supervisor_down() {
    let mut session = TerminalSession::start(&["-a", "3", "-s", "5", "sleep 30"]);

    session.wait_for_output("child ");
    // let the child take over the terminal before the key arrives
    thread::sleep(Duration::from_millis(300));
    session.type_keys("\x03");

    let status = wait_with_timeout(&mut session.keepup, Duration::from_secs(10));
    assert_eq!(status.code(), Some(0));
    session.wait_for_output("SIGINT from terminal");
    session.wait_for_output("shutting down");
}
