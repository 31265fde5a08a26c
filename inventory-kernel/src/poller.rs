/**
 * POLLER - Un cycle complet pour une catégorie
 *
 * RÔLE :
 * Relit la configuration (credentials, types connus), lance le fan-out,
 * aplatit les résultats et les écrit via le writer de la catégorie.
 *
 * FONCTIONNEMENT :
 * - data_purge : suppression de la moitié la plus ancienne des échantillons d'utilisation
 * - aucune credential : no-op, pas d'écriture
 * - chassis : réconciliation (préservation des lignes saines récentes)
 * - cards / ports / sensors / licensing : remplacement complet de la table
 * - perf : ajout à la série d'utilisation
 * - ixnetwork : credentials propres aux serveurs d'API, table remplacée
 *
 * Chaque cycle reçoit un identifiant (uuid) repris dans les logs.
 */

use crate::collector::{CycleBatch, FanOutCollector};
use crate::fetch::{ChassisFetch, ChassisTarget};
use crate::health::{CycleReport, HealthTracker, PollPhase};
use crate::models::{Category, NA};
use crate::reconcile::ReconciliationWriter;
use crate::store::settings::{self, CredentialScope};
use crate::store::{inventory, Store, StoreError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct Poller {
    store: Store,
    collector: FanOutCollector,
    reconciler: ReconciliationWriter,
    health: HealthTracker,
}

impl Poller {
    pub fn new(store: Store, collector: FanOutCollector, reconciler: ReconciliationWriter, health: HealthTracker) -> Self {
        Self { store, collector, reconciler, health }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Exécute un cycle et met à jour la santé de la catégorie
    pub async fn run_cycle(&self, category: Category) -> Result<CycleReport, StoreError> {
        let cycle_id = Uuid::new_v4().to_string();
        let result = self.execute(category, &cycle_id).await;
        match &result {
            Ok(report) => {
                info!(
                    cycle_id = %cycle_id,
                    category = %category,
                    chassis = report.chassis,
                    unreachable = report.unreachable,
                    rows = report.rows_written,
                    preserved = report.preserved,
                    "cycle completed"
                );
                self.health.record_success(category, report.clone());
            }
            Err(e) => {
                error!(cycle_id = %cycle_id, category = %category, error = %e, "cycle failed");
                self.health.record_failure(category, e.to_string());
            }
        }
        self.health.set_phase(category, PollPhase::Idle);
        result
    }

    /// Déclenchement hors planning, sans attendre la fin du cycle
    pub fn run_cycle_now(&self, category: Category) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move {
            let _ = poller.run_cycle(category).await;
        })
    }

    /// Credentials et types connus, relus au début de chaque cycle
    pub async fn load_targets(&self, category: Category) -> Result<Vec<ChassisTarget>, StoreError> {
        let scope = CredentialScope::for_category(category);
        self.store
            .read(move |conn| {
                let types = inventory::chassis_types(conn)?;
                Ok(settings::read_credentials(conn, scope)?
                    .into_iter()
                    .map(|credential| {
                        let chassis_type = types.get(&credential.ip).cloned().unwrap_or_else(|| NA.to_string());
                        ChassisTarget { credential, chassis_type }
                    })
                    .collect())
            })
            .await
    }

    async fn execute(&self, category: Category, cycle_id: &str) -> Result<CycleReport, StoreError> {
        let mut report = CycleReport { cycle_id: cycle_id.to_string(), ..CycleReport::default() };

        if category == Category::DataPurge {
            self.health.set_phase(category, PollPhase::Writing);
            report.purged = self.store.write("data_purge", |tx| inventory::purge_utilization(tx)).await?;
            info!(cycle_id, purged = report.purged, "utilization data purged");
            return Ok(report);
        }

        let targets = self.load_targets(category).await?;
        if targets.is_empty() {
            debug!(cycle_id, category = %category, "no chassis configured, skipping cycle");
            return Ok(report);
        }

        self.health.set_phase(category, PollPhase::Fetching);
        let fetches: Vec<ChassisFetch> = self.collector.collect(category, &targets).await;
        report.chassis = fetches.len();
        report.unreachable = fetches.iter().filter(|f| !f.is_success()).count();

        self.health.set_phase(category, PollPhase::Writing);
        let Some(batch) = CycleBatch::flatten(category, fetches) else {
            return Ok(report);
        };

        report.rows_written = match batch {
            CycleBatch::Summary(fetched) => {
                let configured = targets.iter().map(|t| t.ip().to_string()).collect();
                let outcome = self.reconciler.commit(&self.store, fetched, configured).await?;
                report.preserved = outcome.preserved;
                outcome.written
            }
            CycleBatch::Cards(rows) => self.store.write("cards", move |tx| inventory::replace_rows(tx, &rows)).await?,
            CycleBatch::Ports(rows) => self.store.write("ports", move |tx| inventory::replace_rows(tx, &rows)).await?,
            CycleBatch::Sensors(rows) => {
                self.store.write("sensors", move |tx| inventory::replace_rows(tx, &rows)).await?
            }
            CycleBatch::Licenses(rows) => {
                self.store.write("licensing", move |tx| inventory::replace_rows(tx, &rows)).await?
            }
            CycleBatch::Utilization(rows) => {
                self.store.write("perf", move |tx| inventory::append_utilization(tx, &rows)).await?
            }
            CycleBatch::ApiServers(rows) => {
                self.store.write("ixnetwork", move |tx| inventory::replace_rows(tx, &rows)).await?
            }
        };

        Ok(report)
    }
}
