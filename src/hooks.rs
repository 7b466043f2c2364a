//! Restart and error hooks.
use std::time::Duration;

use strum_macros::{AsRefStr, Display};
use tracing::{debug, error, info, warn};

use crate::{
    runner::{self, ExitClassification, InputMode, WaitOutcome},
    signals::SignalBridge,
};

/// Grace period given to an interrupted hook before it is abandoned.
const HOOK_REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Moments at which a hook command may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum HookKind {
    /// Before every restart of the child.
    OnRestart,
    /// When the restart budget is exhausted.
    OnError,
}

/// Runs a hook command through the shell and waits for it.
///
/// Hooks read stdin from `/dev/null`. The outcome is logged and otherwise
/// ignored. A shutdown request forwards the signal to the hook's process group
/// and stops waiting.
pub fn run_hook(kind: HookKind, command: &str, signals: &SignalBridge) -> Option<ExitClassification> {
    info!("{} `{}`", kind, command);

    let mut child = match runner::spawn_shell(command, InputMode::Null) {
        Ok(child) => child,
        Err(err) => {
            error!("failed to run {} hook: {err}", kind.as_ref());
            return None;
        }
    };

    match child.wait(signals) {
        Ok(WaitOutcome::Exited(ExitClassification::ExitedCleanly)) => {
            debug!("{kind} hook completed successfully");
            Some(ExitClassification::ExitedCleanly)
        }
        Ok(WaitOutcome::Exited(exit)) => {
            warn!("{kind} hook {exit}");
            Some(exit)
        }
        Ok(WaitOutcome::Interrupted(signal)) => {
            warn!("{kind} hook interrupted by {signal}");
            if let Err(err) = child.signal_group(signal) {
                error!("failed to forward {signal} to {kind} hook: {err}");
            }
            child.reap(HOOK_REAP_TIMEOUT)
        }
        Err(err) => {
            error!("failed while waiting for {kind} hook: {err}");
            None
        }
    }
}
