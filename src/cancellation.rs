//! Interrupt signal for the lifecycle.
//!
//! An [`InterruptToken`] represents an external request to stop (Ctrl-C, a
//! shutdown message, a test). Starting and Running race their work against it;
//! `run` hooks receive a clone so long-running loops can exit cooperatively.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A token that can be used to signal an interrupt across async operations.
///
/// # Examples
///
/// ```
/// use jab::InterruptToken;
///
/// # async fn example() {
/// let token = InterruptToken::new();
/// let waiter = token.clone();
///
/// tokio::spawn(async move {
///     waiter.interrupted().await;
/// });
///
/// token.interrupt();
/// assert!(token.is_interrupted());
/// # }
/// ```
#[derive(Clone)]
pub struct InterruptToken {
    inner: Arc<InterruptTokenInner>,
}

struct InterruptTokenInner {
    interrupted: AtomicBool,
    notify: Notify,
}

impl InterruptToken {
    /// Creates a new, untriggered token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InterruptTokenInner {
                interrupted: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signals the interrupt and wakes every waiter.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Returns true once the interrupt has been signalled.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::Acquire)
    }

    /// Completes when the interrupt is signalled.
    ///
    /// Intended for `tokio::select!` against other work.
    pub async fn interrupted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent interrupt is not missed.
            notified.as_mut().enable();

            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }

    /// Interrupts the token when the process receives Ctrl-C.
    ///
    /// The listener task ends on its own once the token is interrupted by
    /// any other means.
    pub fn interrupt_on_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => tracing::warn!("received Ctrl-C, interrupting harness"),
                        Err(e) => tracing::error!(error = %e, "unable to listen for Ctrl-C"),
                    }
                    token.interrupt();
                }
                _ = token.interrupted() => {}
            }
        })
    }
}

impl Default for InterruptToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InterruptToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptToken")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
