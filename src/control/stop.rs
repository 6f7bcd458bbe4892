//! Cooperative cancellation for the control loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

/// Outcome of an interruptible wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Elapsed,
    Stopped,
}

/// Requests a stop. Cloneable; any clone may fire.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    wake: Sender<()>,
}

/// Observed by the loop between phases and during waits.
#[derive(Debug, Clone)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    wake: Receiver<()>,
}

/// Create a connected handle/signal pair.
#[must_use]
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let flag = Arc::new(AtomicBool::new(false));
    let (tx, rx) = bounded(1);
    (
        StopHandle {
            flag: Arc::clone(&flag),
            wake: tx,
        },
        StopSignal { flag, wake: rx },
    )
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let _ = self.wake.try_send(());
    }
}

impl StopSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_handle, signal) = stop_pair();
        signal
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, returning early once a stop is requested.
    #[must_use]
    pub fn wait(&self, duration: Duration) -> Wait {
        if self.is_stopped() {
            return Wait::Stopped;
        }
        if duration.is_zero() {
            return Wait::Elapsed;
        }
        match self.wake.recv_timeout(duration) {
            Ok(()) => Wait::Stopped,
            Err(RecvTimeoutError::Timeout) => {
                if self.is_stopped() {
                    Wait::Stopped
                } else {
                    Wait::Elapsed
                }
            }
            // Every handle dropped: nobody can stop us any more.
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(duration);
                if self.is_stopped() {
                    Wait::Stopped
                } else {
                    Wait::Elapsed
                }
            }
        }
    }
}
