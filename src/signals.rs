//! Termination signal plumbing.
//!
//! Handlers never do any work themselves: they store the number of the signal
//! that arrived and the supervise loop, which polls [`SignalBridge::requested`]
//! at each of its suspension points, performs the shutdown.
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use nix::sys::signal::Signal;
use tracing::debug;

use crate::error::SupervisorError;

/// How often blocking operations re-check for a pending shutdown.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Signals that trigger a graceful shutdown of the supervisor.
pub const TERMINATION_SIGNALS: [Signal; 2] = [Signal::SIGTERM, Signal::SIGQUIT];

/// Shared record of a pending shutdown request.
#[derive(Debug, Clone, Default)]
pub struct SignalBridge {
    received: Arc<AtomicUsize>,
}

impl SignalBridge {
    /// Creates a bridge with no OS handlers attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes SIGTERM, SIGQUIT and SIGINT into this bridge.
    ///
    /// Must run after any daemonizing fork: the SIGINT handler lives on a
    /// helper thread that would not survive it.
    pub fn install(&self) -> Result<(), SupervisorError> {
        for signal in TERMINATION_SIGNALS {
            signal_hook::flag::register_usize(
                signal as i32,
                Arc::clone(&self.received),
                signal as usize,
            )
            .map_err(|err| SupervisorError::Signals(format!("{signal}: {err}")))?;
        }

        let received = Arc::clone(&self.received);
        ctrlc::set_handler(move || {
            received.store(Signal::SIGINT as usize, Ordering::SeqCst);
        })?;

        debug!("termination signal handlers installed");
        Ok(())
    }

    /// Records a shutdown request as if `signal` had been delivered.
    pub fn request(&self, signal: Signal) {
        self.received.store(signal as usize, Ordering::SeqCst);
    }

    /// The signal that requested shutdown, if any has arrived.
    pub fn requested(&self) -> Option<Signal> {
        match self.received.load(Ordering::SeqCst) {
            0 => None,
            raw => Signal::try_from(raw as i32).ok(),
        }
    }

    /// Sleeps for `duration`, returning early with the signal if shutdown is requested.
    pub fn sleep(&self, duration: Duration) -> Option<Signal> {
        let deadline = Instant::now() + duration;
        loop {
            if let Some(signal) = self.requested() {
                return Some(signal);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}
