//! Boucles de polling : une tâche tokio par catégorie, pour toute la durée du process.
//!
//! Chaque itération relit l'intervalle persisté (défaut de la catégorie si absent
//! ou invalide), exécute un cycle puis dort. Une erreur de cycle est loggée avec sa
//! chaîne complète et la même catégorie est retentée après `error_retry`.

use crate::health::PollPhase;
use crate::models::Category;
use crate::poller::Poller;
use crate::store::settings;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const DEFAULT_ERROR_RETRY: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct PollScheduler {
    poller: Poller,
    error_retry: Duration,
}

impl PollScheduler {
    pub fn new(poller: Poller, error_retry: Duration) -> Self {
        Self { poller, error_retry }
    }

    pub fn spawn_all(&self, categories: &[Category]) -> Vec<JoinHandle<()>> {
        categories
            .iter()
            .map(|&category| {
                let scheduler = self.clone();
                tokio::spawn(async move { scheduler.run_category(category).await })
            })
            .collect()
    }

    pub async fn run_category(&self, category: Category) {
        info!(category = %category, "poll loop started");
        loop {
            let delay = self.step(category).await;
            self.poller.health().set_phase(category, PollPhase::Sleeping);
            tokio::time::sleep(delay).await;
        }
    }

    /// Un cycle ; renvoie le délai avant le suivant
    pub async fn step(&self, category: Category) -> Duration {
        let interval = self.resolve_interval(category).await;
        match self.poller.run_cycle(category).await {
            Ok(_) => interval,
            Err(e) => {
                let chain = anyhow::Error::from(e);
                error!(category = %category, retry_in_secs = self.error_retry.as_secs(), "poll cycle error: {chain:#}");
                self.error_retry
            }
        }
    }

    /// Intervalle persisté, ou défaut de la catégorie
    pub async fn resolve_interval(&self, category: Category) -> Duration {
        let persisted = self.poller.store().read(|conn| settings::read_poll_setting(conn)).await;
        match persisted {
            Ok(Some(setting)) => setting.interval(category).unwrap_or_else(|| {
                warn!(category = %category, value = setting.raw(category), "invalid persisted interval, using default");
                category.default_interval()
            }),
            Ok(None) => category.default_interval(),
            Err(e) => {
                warn!(category = %category, error = %e, "could not read poll settings, using default");
                category.default_interval()
            }
        }
    }
}
