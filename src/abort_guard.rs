//! Fail-stop wrapper for operations whose failure leaves the account in a
//! state no automated path can repair.
//!
//! `AbortGuard::run` awaits the wrapped operation. On success the value is
//! handed back untouched. On error the guard logs the operation name and the
//! error, sends two operator notifications, runs the optional error hook and
//! terminates the process with exit code 1. The error never reaches the
//! caller.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::notifier::{Notifier, NOTIFY_TIMEOUT};

pub const ABORT_EXIT_CODE: i32 = 1;

/// Seam over process termination so the guard can be exercised in tests.
pub trait ProcessExit {
    fn exit(&self, code: i32);
}

#[derive(Debug, Default)]
pub struct StdProcessExit;

impl ProcessExit for StdProcessExit {
    fn exit(&self, code: i32) {
        log::logger().flush();
        std::process::exit(code);
    }
}

pub struct AbortGuard {
    notifier: Arc<dyn Notifier + Send + Sync>,
    process: Arc<dyn ProcessExit + Send + Sync>,
}

impl AbortGuard {
    pub fn new(notifier: Arc<dyn Notifier + Send + Sync>) -> Self {
        Self::with_process_exit(notifier, Arc::new(StdProcessExit))
    }

    pub fn with_process_exit(
        notifier: Arc<dyn Notifier + Send + Sync>,
        process: Arc<dyn ProcessExit + Send + Sync>,
    ) -> Self {
        Self { notifier, process }
    }

    /// Returns `Some(value)` when `op` succeeds. `None` is only observable
    /// when the configured `ProcessExit` returns instead of terminating.
    pub async fn run<T, E, F>(&self, name: &str, op: F) -> Option<T>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        self.run_with_hook(name, op, || {}).await
    }

    /// Like `run`, but calls `on_error` after notifying and before exiting.
    pub async fn run_with_hook<T, E, F, H>(&self, name: &str, op: F, on_error: H) -> Option<T>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
        H: FnOnce(),
    {
        log::info!("Running {}...", name);
        match op.await {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!("[ABORT] Error running {}.", name);
                log::error!("[ABORT] Exception: {}", err);
                self.send(&format!("Error running {}.", name)).await;
                self.send(&format!("Exception: {}", err)).await;
                on_error();
                log::error!("[ABORT] terminating with exit code {}", ABORT_EXIT_CODE);
                self.process.exit(ABORT_EXIT_CODE);
                None
            }
        }
    }

    async fn send(&self, text: &str) {
        match tokio::time::timeout(NOTIFY_TIMEOUT, self.notifier.notify(text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("[ABORT] failed to notify operator: {}", e),
            Err(_) => log::error!(
                "[ABORT] operator notification timed out after {:?}",
                NOTIFY_TIMEOUT
            ),
        }
    }
}
