//! Background polling of registered devices
//!
//! Drivers that cannot push state changes rely on the monitor: every
//! [`poll_interval`](crate::types::RegistryConfig::poll_interval) it
//! refreshes every registered device, which notifies whatever changed since
//! the last poll. A failed poll is retried after
//! [`poll_retry_interval`](crate::types::RegistryConfig::poll_retry_interval);
//! once failures in a row exceed
//! [`poll_error_threshold`](crate::types::RegistryConfig::poll_error_threshold)
//! the monitor gives up.


use std::sync::{Arc, Weak};

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::registry::Registry;

/// Why a monitor task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// [`Monitor::stop`] was called
    Stopped,
    /// The registry was dropped or shut down
    RegistryGone,
    /// Too many polls failed in a row
    ErrorThreshold,
}

/// Handle to a running monitor task
#[derive(Debug)]
pub struct Monitor {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<MonitorExit>,
}

impl Monitor {
    /// Start polling `registry`
    ///
    /// The task holds only a weak reference; dropping the registry ends it.
    /// Dropping the handle ends it as well.
    #[must_use]
    pub fn spawn(registry: &Arc<Registry>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(Arc::downgrade(registry), shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Whether the task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task and wait for it
    pub async fn stop(self) -> MonitorExit {
        let _ = self.shutdown_tx.send(true);
        Self::wait(self.handle).await
    }

    /// Wait for the task to end on its own
    pub async fn join(self) -> MonitorExit {
        let Monitor {
            shutdown_tx,
            handle,
        } = self;
        let exit = Self::wait(handle).await;
        drop(shutdown_tx);
        exit
    }

    async fn wait(handle: JoinHandle<MonitorExit>) -> MonitorExit {
        match handle.await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!("monitor task failed: {}", e);
                MonitorExit::Stopped
            }
        }
    }
}

async fn run(registry: Weak<Registry>, mut shutdown: watch::Receiver<bool>) -> MonitorExit {
    let Some(config) = registry.upgrade().map(|r| r.config().clone()) else {
        return MonitorExit::RegistryGone;
    };
    tracing::info!("device monitor started, polling every {:?}", config.poll_interval);

    let mut failures = 0u32;
    let mut wait = config.poll_interval;
    loop {
        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                tracing::info!("device monitor stopped");
                return MonitorExit::Stopped;
            }
        }

        let Some(registry) = registry.upgrade() else {
            return MonitorExit::RegistryGone;
        };
        if registry.is_shut_down() {
            return MonitorExit::RegistryGone;
        }

        match poll_once(&registry).await {
            Ok(()) => {
                failures = 0;
                wait = config.poll_interval;
            }
            Err(e) => {
                failures += 1;
                if failures > config.poll_error_threshold {
                    tracing::error!(
                        "device monitor disabled after {} failed polls, last error: {}",
                        failures,
                        e
                    );
                    return MonitorExit::ErrorThreshold;
                }
                tracing::warn!("poll {} failed: {}", failures, e);
                wait = config.poll_retry_interval;
            }
        }
    }
}

/// Refresh every registered device concurrently; the first error wins
async fn poll_once(registry: &Registry) -> Result<()> {
    let devices = registry.registered_devices().await;
    let results = join_all(
        devices
            .iter()
            .map(|device| registry.refresh_device(device.info.id)),
    )
    .await;
    results.into_iter().collect::<Result<Vec<bool>>>().map(|_| ())
}
