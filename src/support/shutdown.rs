//! Cancellation signals
//!
//! A [`ShutdownSignal`] is created per connection epoch: every background loop
//! started by a boot holds a clone and exits once it fires. Firing twice is a
//! no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

/// Cloneable one-shot broadcast used to stop the loops of one epoch.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Fire the signal. Returns `false` when it had already fired.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            debug!("Cancellation signal already triggered");
            return false;
        }
        let _ = self.sender.send(());
        true
    }

    /// A future that resolves once the signal fires, even if it fired before
    /// the call.
    pub fn notified(&self) -> ShutdownNotified {
        ShutdownNotified {
            receiver: self.sender.subscribe(),
            triggered: self.triggered.clone(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ShutdownNotified {
    receiver: broadcast::Receiver<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownNotified {
    pub async fn wait(mut self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.receiver.recv().await;
    }
}

/// Which OS termination signal arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

/// Listens for SIGINT/SIGTERM. Each call to [`TerminationListener::next`]
/// waits for the next one, so the process can tell a first request from a
/// repeated one.
pub struct TerminationListener {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl TerminationListener {
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
                sigint: signal(SignalKind::interrupt())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    pub async fn next(&mut self) -> TerminationSignal {
        #[cfg(unix)]
        {
            let received = tokio::select! {
                _ = self.sigterm.recv() => TerminationSignal::Terminate,
                _ = self.sigint.recv() => TerminationSignal::Interrupt,
            };
            info!(signal = ?received, "Received termination signal");
            received
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C");
            TerminationSignal::Interrupt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn notified_resolves_after_late_subscription() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.notified().wait())
            .await
            .expect("already-fired signal must resolve immediately");
    }

    #[tokio::test]
    async fn notified_wakes_waiting_task() {
        let signal = ShutdownSignal::new();
        let waiter = signal.notified();
        let task = tokio::spawn(waiter.wait());
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter must wake")
            .unwrap();
    }

    #[tokio::test]
    async fn fresh_signal_per_epoch_is_independent() {
        let first = ShutdownSignal::new();
        first.trigger();
        let second = ShutdownSignal::new();
        assert!(!second.is_triggered());
    }
}
