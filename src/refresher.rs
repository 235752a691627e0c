// 🔄 Periodic Refresher - simulated operational churn
//
// Each tick:
//   1. every ATM flips to another status with `status_flip_probability`
//   2. with `growth_probability`, one absent potential site opens as active
//   3. if anything changed, the analyzer is rebuilt before the tick returns
//
// Changes touch the registry's live view only and are never persisted.

use crate::catalog::potential_sites;
use crate::entities::{AtmRecord, AtmStatus};
use crate::service::AtmService;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefresherConfig {
    pub interval: Duration,
    pub status_flip_probability: f64,
    pub growth_probability: f64,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        RefresherConfig {
            interval: Duration::from_secs(30 * 60),
            status_flip_probability: 0.05,
            growth_probability: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshOutcome {
    pub status_changes: Vec<(String, AtmStatus)>,
    pub added: Option<String>,
}

impl RefreshOutcome {
    pub fn is_empty(&self) -> bool {
        self.status_changes.is_empty() && self.added.is_none()
    }
}

pub struct PeriodicRefresher {
    service: Arc<AtmService>,
    config: RefresherConfig,
    potential_sites: Vec<AtmRecord>,
}

impl PeriodicRefresher {
    pub fn new(service: Arc<AtmService>, config: RefresherConfig) -> Self {
        Self::with_sites(service, config, potential_sites())
    }

    pub fn with_sites(
        service: Arc<AtmService>,
        config: RefresherConfig,
        potential_sites: Vec<AtmRecord>,
    ) -> Self {
        PeriodicRefresher {
            service,
            config,
            potential_sites,
        }
    }

    pub fn config(&self) -> &RefresherConfig {
        &self.config
    }

    /// Run one refresh cycle
    pub fn tick<R: Rng + ?Sized>(&self, rng: &mut R) -> RefreshOutcome {
        let registry = self.service.registry();
        let flip_probability = self.config.status_flip_probability;

        // Decided against each record's current status, under the write lock
        let status_changes = registry.update_statuses(|atm| {
            if rng.gen_bool(flip_probability) {
                Some(flipped_status(atm.status, &mut *rng))
            } else {
                None
            }
        });

        let mut added = None;
        if rng.gen_bool(self.config.growth_probability) {
            let snapshot = registry.snapshot();
            let absent: Vec<&AtmRecord> = self
                .potential_sites
                .iter()
                .filter(|site| !snapshot.iter().any(|atm| atm.id == site.id))
                .collect();

            if let Some(site) = absent.choose(rng) {
                let record = (*site).clone().with_status(AtmStatus::Active);
                match registry.insert_transient(record) {
                    Ok(true) => added = Some(site.id.clone()),
                    Ok(false) => debug!(atm_id = %site.id, "Potential site appeared concurrently"),
                    Err(e) => warn!(atm_id = %site.id, error = %e, "Potential site rejected"),
                }
            }
        }

        let outcome = RefreshOutcome {
            status_changes,
            added,
        };

        if !outcome.is_empty() {
            self.service.rebuild_analyzer();
        }

        info!(
            status_changes = outcome.status_changes.len(),
            added = outcome.added.as_deref().unwrap_or("-"),
            total = registry.len(),
            "Refresh cycle complete"
        );
        outcome
    }

    /// Tick every `interval` until `shutdown` fires
    ///
    /// The first tick happens one full interval after start.
    #[cfg(feature = "server")]
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        use std::panic::{self, AssertUnwindSafe};
        use tokio::time::{interval_at, Instant, MissedTickBehavior};
        use tracing::error;

        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut rng = StdRng::from_entropy();

        info!(interval_secs = period.as_secs(), "Periodic refresher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cycle = panic::catch_unwind(AssertUnwindSafe(|| self.tick(&mut rng)));
                    if cycle.is_err() {
                        error!("Refresh cycle panicked; next cycle stays scheduled");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Periodic refresher stopped");
                    break;
                }
            }
        }
    }
}

/// Pick one of the two other statuses
fn flipped_status<R: Rng + ?Sized>(current: AtmStatus, rng: &mut R) -> AtmStatus {
    let others: Vec<AtmStatus> = AtmStatus::ALL
        .iter()
        .copied()
        .filter(|s| *s != current)
        .collect();
    others.choose(rng).copied().unwrap_or(current)
}
