use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use rbac0_application::PolicyEngine;
use rbac0_core::{AppError, AppResult};

/// Settings for the background policy reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyReloadConfig {
    interval: Duration,
}

impl PolicyReloadConfig {
    /// Default delay between two reloads.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

    /// Creates a config; the interval must be positive.
    pub fn new(interval: Duration) -> AppResult<Self> {
        if interval.is_zero() {
            return Err(AppError::InvalidArgument(
                "policy reload interval must be positive".to_owned(),
            ));
        }

        Ok(Self { interval })
    }

    /// Delay between two reloads.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PolicyReloadConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

/// Periodically reloads a policy engine from its persisted rules.
pub struct PolicyReloader {
    engine: Arc<dyn PolicyEngine>,
    config: PolicyReloadConfig,
}

impl PolicyReloader {
    /// Creates a reloader for the engine.
    #[must_use]
    pub fn new(engine: Arc<dyn PolicyEngine>, config: PolicyReloadConfig) -> Self {
        Self { engine, config }
    }

    /// Starts the reload loop on the current runtime.
    ///
    /// The first reload happens one interval after the start. A failed
    /// reload is logged and the previous rules stay in place. Dropping the
    /// returned handle stops the loop as well.
    #[must_use]
    pub fn spawn(self) -> PolicyReloadHandle {
        let (shutdown_sender, mut shutdown_receiver) = watch::channel(false);
        let interval = self.config.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.engine.reload().await {
                            Ok(()) => debug!("policies reloaded"),
                            Err(error) => warn!(error = %error, "policy reload failed"),
                        }
                    }
                    changed = shutdown_receiver.changed() => {
                        if changed.is_err() || *shutdown_receiver.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("policy reloader stopped");
        });

        info!(interval_ms = interval.as_millis(), "policy reloader started");
        PolicyReloadHandle {
            shutdown: shutdown_sender,
            task,
        }
    }
}

/// Handle to a running reload loop.
pub struct PolicyReloadHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PolicyReloadHandle {
    /// Stops the loop and waits for an in-flight reload to finish.
    pub async fn shutdown(self) -> AppResult<()> {
        // The loop may already be gone; joining still reports how it ended.
        let _ = self.shutdown.send(true);

        self.task
            .await
            .map_err(|error| AppError::Internal(format!("policy reloader task failed: {error}")))
    }
}
