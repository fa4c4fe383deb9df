//! Background daily average service
//!
//! Calls the aggregator's `update_all` on a fixed interval. Ticks missed while
//! a run is still going are skipped, so two runs never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::average_aggregator::AverageAggregator;

/// Default interval between daily average runs (5 minutes)
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(300);

/// Run the background daily average service
///
/// The first run happens immediately. After each run, expired records are
/// reclaimed from the backing store.
pub async fn run_daily_average_service(aggregator: Arc<AverageAggregator>, period: Duration) {
    log::info!(
        "Starting daily average service ({} pairs, interval: {} seconds)",
        aggregator.pairs().len(),
        period.as_secs()
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        run_once(&aggregator).await;
    }
}

async fn run_once(aggregator: &AverageAggregator) {
    aggregator.update_all().await;

    match aggregator.store().backend().purge_expired().await {
        Ok(0) => {}
        Ok(purged) => log::debug!("Purged {} expired daily average records", purged),
        Err(e) => log::warn!("Failed to purge expired daily averages: {}", e),
    }
}
