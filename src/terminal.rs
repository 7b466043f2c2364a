//! Sharing the controlling terminal with the supervised command.
//!
//! Every child leads its own process group, which the terminal treats as a
//! background job. When keepup itself was started in the foreground, the child
//! takes the terminal over before it execs (see [`crate::runner::InputMode`])
//! and the supervisor takes it back once the child is gone. Keystrokes such as
//! Ctrl-C therefore reach the child's group, not the supervisor.
use std::io::{self, IsTerminal};

use nix::{
    errno::Errno,
    sys::signal::{SigHandler, Signal, signal},
    unistd::{Pid, getpgrp, tcgetpgrp, tcsetpgrp},
};
use tracing::debug;

/// The terminal on stdin, whose foreground group is the supervisor's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForegroundTerminal {
    group: Pid,
}

impl ForegroundTerminal {
    /// Returns the terminal on stdin if this process's group owns its foreground.
    pub fn detect() -> Option<Self> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return None;
        }

        let group = getpgrp();
        match tcgetpgrp(stdin) {
            Ok(foreground) if foreground == group => Some(Self { group }),
            Ok(foreground) => {
                debug!("running in background job (foreground group {foreground})");
                None
            }
            Err(err) => {
                debug!("cannot query terminal foreground group: {err}");
                None
            }
        }
    }

    /// Ignores SIGTTOU so the supervisor may write to and reclaim the terminal
    /// while a child holds it.
    ///
    /// Children get the default disposition back before exec.
    pub fn prepare(&self) -> Result<(), Errno> {
        unsafe { signal(Signal::SIGTTOU, SigHandler::SigIgn) }?;
        Ok(())
    }

    /// Makes the supervisor's group the terminal's foreground again.
    pub fn reclaim(&self) -> Result<(), Errno> {
        tcsetpgrp(io::stdin(), self.group)
    }
}
