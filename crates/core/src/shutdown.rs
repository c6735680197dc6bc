//! Graceful shutdown: a single root `CancellationToken` tripped by the
//! first of `SIGINT`/`SIGTERM`/`SIGQUIT`, plus the structured lifecycle
//! events both binaries emit around it.
//!
//! Both `vitals-agent` and `vitals-server` build one [`Lifecycle`] at
//! startup, hand child tokens to every long-running task, and `await`
//! [`Lifecycle::wait_for_signal`] alongside the task set in a `select!`.
//! Tasks observe shutdown cooperatively through their token rather than
//! being killed; the binaries then wait out a drain window before exiting.

use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Root shutdown controller for one process.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    token: CancellationToken,
}

impl Lifecycle {
    /// Build a fresh, untripped lifecycle.
    pub fn new() -> Self {
        Lifecycle {
            token: CancellationToken::new(),
        }
    }

    /// A child token that cancels when the root does, without letting the
    /// holder cancel the root.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// True once shutdown has been triggered.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trip the root token directly (used by tests and by any internal
    /// fatal-error path that wants to shut the whole process down).
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait for the first of `SIGINT`, `SIGTERM`, or `SIGQUIT`, log which
    /// one arrived, and trip the root token.
    ///
    /// Returns once shutdown has started; callers `select!` this against
    /// their task set rather than spawning it separately, so a signal
    /// during startup is never missed.
    pub async fn wait_for_signal(&self) {
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

        let which = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sigquit.recv() => "SIGQUIT",
        };
        info!(signal = which, "shutdown signal received, draining");
        self.token.cancel();
    }

    /// Wait until either the root token is cancelled or `timeout` elapses,
    /// whichever comes first. Used to bound the drain window so a stuck
    /// task can't block process exit forever.
    pub async fn wait_drained(&self, tasks_done: impl std::future::Future<Output = ()>, timeout: Duration) {
        tokio::select! {
            _ = tasks_done => {
                info!("all tasks drained cleanly");
            }
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(?timeout, "drain window elapsed before all tasks finished");
            }
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_cancels_child_tokens() {
        let lifecycle = Lifecycle::new();
        let child = lifecycle.child_token();
        assert!(!lifecycle.is_shutting_down());
        assert!(!child.is_cancelled());
        lifecycle.trigger();
        assert!(lifecycle.is_shutting_down());
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn wait_drained_respects_timeout() {
        let lifecycle = Lifecycle::new();
        let never = std::future::pending::<()>();
        let start = tokio::time::Instant::now();
        lifecycle.wait_drained(never, Duration::from_millis(10)).await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
