//! Periodic trigger for the settlement batch.

use super::SettlementBatch;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Run the settlement batch on a fixed interval until the process exits.
///
/// A failed run is logged and retried on the next tick; the batch's
/// per-earner atomicity means there is never partial state to repair.
pub async fn run_scheduler(batch: Arc<SettlementBatch>, interval_ms: i64) {
    if interval_ms <= 0 {
        info!("Settlement scheduler disabled (interval not set)");
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms as u64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_ms, "Settlement scheduler started");
    loop {
        ticker.tick().await;
        match batch.run().await {
            Ok(report) => {
                if report.earners > 0 {
                    info!(
                        settled = report.settled,
                        skipped = report.skipped,
                        conflicts = report.conflicts,
                        "Scheduled settlement batch finished"
                    );
                }
            }
            Err(e) => {
                warn!(error = %e, "Scheduled settlement batch failed, retrying next interval");
            }
        }
    }
}
