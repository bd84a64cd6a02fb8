//! Periodic proximity broadcast loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::TeamStore;
use crate::ws::gateway::Gateway;

use super::error::GameResult;
use super::proximity::nearby_for;
use super::snapshot::{nearby_snapshot, SnapshotStats};

/// Log a stats summary every this many ticks
const STATS_LOG_EVERY: u64 = 60;

/// Recomputes neighbor sets on a fixed period and pushes them to team groups
pub struct BroadcastScheduler {
    store: Arc<dyn TeamStore>,
    gateway: Arc<Gateway>,
    period: Duration,
    threshold: f64,
}

impl BroadcastScheduler {
    pub fn new(
        store: Arc<dyn TeamStore>,
        gateway: Arc<Gateway>,
        period: Duration,
        threshold: f64,
    ) -> Self {
        Self {
            store,
            gateway,
            period,
            threshold,
        }
    }

    /// One pass: snapshot the active set and deliver each team's neighbors to its group.
    ///
    /// Returns the number of queued deliveries.
    pub async fn tick(&self) -> GameResult<usize> {
        let started = Instant::now();
        let active = self.store.list_active().await?;
        let now = Utc::now();

        let mut delivered = 0;
        for hood in nearby_for(&active, self.threshold) {
            let team_name = hood.team_name.clone();
            delivered += self
                .gateway
                .emit_to_group(&team_name, &nearby_snapshot(hood, now));
        }

        debug!(
            teams = active.len(),
            delivered,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Proximity tick"
        );
        Ok(delivered)
    }

    /// Run forever. A failed tick is logged and retried on the next period.
    pub async fn run(&self) {
        info!(
            period_ms = self.period.as_millis() as u64,
            threshold_m = self.threshold,
            "Proximity broadcast scheduler started"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = SnapshotStats::default();

        loop {
            ticker.tick().await;

            match self.tick().await {
                Ok(delivered) => stats.record(delivered),
                Err(e) => {
                    stats.record_failure();
                    warn!(error = %e, "Proximity tick failed, skipping");
                }
            }

            if stats.ticks % STATS_LOG_EVERY == 0 {
                debug!(
                    ticks = stats.ticks,
                    failed = stats.failed_ticks,
                    deliveries = stats.deliveries,
                    "Broadcast scheduler stats"
                );
            }
        }
    }
}
