//! Cancellation-aware locking for driver callback paths
//!
//! A driver's callbacks and its teardown path usually share one lock. If
//! teardown holds the lock while waiting for the registry (which in turn
//! waits for an in-flight callback), a blocking `lock().await` in the callback
//! would never return. [`CallbackLock::acquire`] instead polls with
//! `try_lock`, and gives up with [`DpllError::Aborted`] as soon as the owner
//! clears the active flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::{DpllError, Result};
use crate::types::RegistryConfig;


/// Mutex with a bounded, abortable acquire for callback context
#[derive(Debug)]
pub struct CallbackLock<T> {
    inner: Mutex<T>,
    active: AtomicBool,
    attempts: u32,
    backoff: Duration,
}

impl<T> CallbackLock<T> {
    /// Create an active lock
    pub fn new(value: T, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner: Mutex::new(value),
            active: AtomicBool::new(true),
            attempts,
            backoff,
        }
    }

    /// Create an active lock with the attempt budget from `config`
    pub fn with_config(value: T, config: &RegistryConfig) -> Self {
        Self::new(
            value,
            config.callback_lock_attempts,
            config.callback_lock_backoff,
        )
    }

    /// Acquire from callback context
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::Aborted`] once the lock has been deactivated and
    /// [`DpllError::Busy`] when every attempt failed.
    pub async fn acquire(&self) -> Result<MutexGuard<'_, T>> {
        for _ in 0..self.attempts {
            if !self.is_active() {
                return Err(DpllError::Aborted);
            }
            if let Ok(guard) = self.inner.try_lock() {
                return Ok(guard);
            }
            tokio::time::sleep(self.backoff).await;
            if !self.is_active() {
                return Err(DpllError::Aborted);
            }
        }

        tracing::debug!(attempts = self.attempts, "callback lock contended");
        Err(DpllError::Busy)
    }

    /// Blocking acquire for the owner (init and teardown paths)
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    /// Make pending and future [`acquire`](Self::acquire) calls abort
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Re-enable callback acquisition
    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Whether callbacks may still acquire
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
