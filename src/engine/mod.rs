//! Attendance reconciliation engine.
//!
//! Employees (check-in/out), administrators (correction review) and the
//! invalidation sweep all change attendance rows through this type. It holds
//! no mutable state of its own; every write is a version-checked store
//! operation, retried once when it loses a race.

pub mod corrections;
pub mod ledger;
pub mod rules;
pub mod sweep;

use std::future::Future;
use std::sync::Arc;

use actix_web::rt::time::timeout;
use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::store::Store;

/// A write is attempted once and retried once after losing a version race.
const WRITE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// How long a check-in may stay open before the sweep invalidates it.
    pub stale_after: Duration,
    /// Lifetime of a correction request before it is reported as expired.
    pub correction_window: Duration,
    /// Deadline for each store call.
    pub store_timeout: std::time::Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::hours(12),
            correction_window: Duration::hours(48),
            store_timeout: std::time::Duration::from_secs(5),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            stale_after: Duration::hours(config.stale_after_hours),
            correction_window: Duration::hours(config.correction_window_hours),
            store_timeout: std::time::Duration::from_secs(config.store_timeout_secs),
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Bounds a store call by the configured deadline.
    async fn io<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        match timeout(self.settings.store_timeout, op).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(EngineError::Unavailable)
            }
        }
    }
}
