//! Cancellation signal shared by every suspension point of an extraction run.
//!
//! A single [`Cancellation`] is handed to the extractor, which passes it down to
//! the paginated fetchers, the resilient client, the admission limiter and the
//! retry executor. Firing it interrupts admission waits, backoff sleeps,
//! in-flight HTTP attempts and body reads alike.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::warn;

/// Cancellation handle held by the CLI, the signal handler and every producer.
pub type SharedCancellation = Arc<Cancellation>;

/// Signal that fires once and stays fired.
///
/// Synchronous code polls [`is_cancelled`](Self::is_cancelled) at loop
/// boundaries; async code races [`cancelled`](Self::cancelled) against its own
/// wait in a `select!`.
#[derive(Debug, Default)]
pub struct Cancellation {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    /// Unfired signal.
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Unfired signal behind an [`Arc`], ready to hand to spawned tasks.
    pub fn shared() -> SharedCancellation {
        Arc::new(Self::new())
    }

    /// Fire the signal.
    ///
    /// Only the first call wakes the tasks parked in [`cancelled`](Self::cancelled);
    /// tasks that start waiting afterwards see the flag and never park.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Non-blocking check of the flag.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the signal has fired.
    ///
    /// The waiter is registered with the [`Notify`] before the flag is read, so
    /// a `cancel()` landing between the read and the park still wakes it.
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Process signals that stop an extraction: SIGINT everywhere, SIGTERM on Unix.
#[derive(Debug)]
pub struct ShutdownSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Install the handlers. SIGTERM is caught from this point on.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn register() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Name of the first signal received, or `None` if no signal can arrive.
    pub async fn recv(&mut self) -> Option<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                Ok(()) = tokio::signal::ctrl_c() => Some("SIGINT"),
                Some(()) = self.terminate.recv() => Some("SIGTERM"),
                else => None,
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok().map(|()| "SIGINT")
        }
    }
}

/// Fire `cancel` on the first SIGINT or SIGTERM.
///
/// The SIGTERM handler is installed before this returns, so a SIGTERM sent
/// right after is not lost.
pub fn cancel_on_shutdown_signal(cancel: SharedCancellation) -> io::Result<JoinHandle<()>> {
    let mut signals = ShutdownSignals::register()?;
    Ok(tokio::spawn(async move {
        if let Some(name) = signals.recv().await {
            warn!(signal = name, "Shutdown signal received - cancelling extraction...");
            cancel.cancel();
        }
    }))
}
