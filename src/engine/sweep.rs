//! Invalidation sweep: check-ins left open past the staleness threshold
//! become INVALID.
//!
//! A pass is one conditional bulk update, so it is idempotent and never
//! touches VALID or already-INVALID rows. A check-out that commits before the
//! pass drops out of the filter. A check-out that reads the row before the
//! pass and writes after it loses its version check, re-reads, and sees the
//! day as invalidated. Stores without a write-time filter would instead let
//! the sweep overwrite such a check-out; that window is bounded by the period.

use std::time::Duration;

use actix_web::rt::task::JoinHandle;
use actix_web::rt::time::interval;
use tracing::{debug, error, info};

use super::Engine;
use crate::error::Result;

impl Engine {
    /// Runs one pass and returns how many records it invalidated.
    pub async fn sweep_once(&self) -> Result<u64> {
        let now = self.clock.now();
        let cutoff = now - self.settings.stale_after;
        debug!(%cutoff, "Checking for stale check-ins");

        let changed = self.io(self.store.invalidate_stale(cutoff, now)).await?;
        if changed > 0 {
            info!(changed, "Marked entries invalid");
        }
        Ok(changed)
    }
}

/// Runs the sweep every `period` until the returned handle is aborted.
/// A failed pass is logged and the next tick tries again.
pub fn spawn(engine: Engine, period: Duration) -> JoinHandle<()> {
    actix_web::rt::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.sweep_once().await {
                error!(error = %e, "Invalidation sweep failed");
            }
        }
    })
}
