//! Cooperative stop signals.
//!
//! Every port worker owns one [`ShutdownSignal`]. The supervisor triggers it
//! with the [`StopReason`] it received; the worker checks the flag between
//! connections and is woken from a pending `accept` by the broadcast.
//!
//! # Example
//!
//! ```rust
//! use commentd_server::{ShutdownSignal, StopReason};
//!
//! let shutdown = ShutdownSignal::new();
//! let worker_side = shutdown.clone();
//!
//! shutdown.trigger(StopReason::Terminate);
//! assert!(worker_side.is_shutdown());
//! assert_eq!(worker_side.reason(), Some(StopReason::Terminate));
//! ```

use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;

/// Why a worker was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// SIGINT.
    Interrupt,
    /// SIGHUP.
    HangUp,
    /// SIGTERM.
    Terminate,
    /// Asked to stop through a supervisor handle.
    Requested,
}

impl StopReason {
    /// Returns the reason as a short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::HangUp => "hangup",
            Self::Terminate => "terminate",
            Self::Requested => "requested",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stop flag with a wakeup for tasks blocked on I/O.
///
/// Clones share the same flag. The first trigger wins: its reason is kept
/// and later triggers are ignored.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    reason: Arc<OnceLock<StopReason>>,
    sender: broadcast::Sender<StopReason>,
}

impl ShutdownSignal {
    /// Creates a new, untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            reason: Arc::new(OnceLock::new()),
            sender,
        }
    }

    /// Triggers the signal.
    ///
    /// Returns `true` if this call triggered it, `false` if it had already
    /// been triggered.
    pub fn trigger(&self, reason: StopReason) -> bool {
        if self.reason.set(reason).is_ok() {
            // No receivers is fine: the flag is already visible.
            let _ = self.sender.send(reason);
            true
        } else {
            false
        }
    }

    /// Returns `true` if the signal has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.reason.get().is_some()
    }

    /// Returns the reason of the first trigger.
    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Completes with the stop reason once the signal is triggered,
    /// immediately if it already was.
    pub async fn recv(&self) -> StopReason {
        // Subscribe before reading the flag so a trigger in between is seen.
        let mut receiver = self.sender.subscribe();
        if let Some(reason) = self.reason() {
            return reason;
        }

        match receiver.recv().await {
            Ok(reason) => reason,
            Err(_) => self.reason().unwrap_or(StopReason::Requested),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// The termination-class OS signals, registered once.
#[cfg(unix)]
pub struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Registers handlers for SIGINT, SIGHUP and SIGTERM.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Waits for the next delivery of any of the three signals.
    pub async fn recv(&mut self) -> Option<StopReason> {
        tokio::select! {
            r = self.interrupt.recv() => r.map(|()| StopReason::Interrupt),
            r = self.hangup.recv() => r.map(|()| StopReason::HangUp),
            r = self.terminate.recv() => r.map(|()| StopReason::Terminate),
        }
    }
}

/// Ctrl+C only, on platforms without Unix signals.
#[cfg(not(unix))]
pub struct OsSignals {
    _private: (),
}

#[cfg(not(unix))]
impl OsSignals {
    /// Prepares to listen for Ctrl+C.
    pub fn register() -> io::Result<Self> {
        Ok(Self { _private: () })
    }

    /// Waits for the next Ctrl+C.
    pub async fn recv(&mut self) -> Option<StopReason> {
        tokio::signal::ctrl_c().await.ok().map(|()| StopReason::Interrupt)
    }
}
