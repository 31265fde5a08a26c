/*!
Test Harness pour le pipeline de polling

Assemble un kernel complet pour les tests :
- store SQLite dans un répertoire temporaire
- MockConnector scripté à la place de l'API vendor
- politique de retry rapide (pas de backoff, timeout court)
*/

use crate::chassis_stub::{Behaviour, MockConnector};
use anyhow::Result;
use inventory_kernel::client::ChassisConnector;
use inventory_kernel::collector::FanOutCollector;
use inventory_kernel::credentials::{CredentialAction, CredentialOp};
use inventory_kernel::fetch::{FetchWorker, RetryPolicy};
use inventory_kernel::health::{CycleReport, HealthTracker};
use inventory_kernel::models::{Category, ChassisCredential, ChassisSummaryRecord};
use inventory_kernel::poller::Poller;
use inventory_kernel::reconcile::{ReconciliationWriter, DEFAULT_GRACE};
use inventory_kernel::store::inventory::{self, TableRow};
use inventory_kernel::store::settings::{self, CredentialScope};
use inventory_kernel::store::{Store, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Logs visibles avec `cargo test -- --nocapture`, initialisation idempotente
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inventory_kernel=debug")))
        .with_test_writer()
        .try_init();
}

/// Retry sans attente, timeout par tentative court
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        attempt_timeout: Duration::from_millis(200),
        backoff_base: Duration::ZERO,
        backoff_jitter: Duration::ZERO,
        operation_timeout: Duration::from_millis(500),
    }
}

pub struct TestHarness {
    // gardé pour que la base survive au test
    _dir: TempDir,
    pub store: Store,
    pub connector: MockConnector,
    pub health: HealthTracker,
    pub poller: Poller,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        Self::with_grace(DEFAULT_GRACE)
    }

    pub fn with_grace(grace: Duration) -> Result<Self> {
        init_tracing();

        let dir = TempDir::new()?;
        let store = Store::open(StoreConfig::new(dir.path().join("inventory.db")))?;
        let connector = MockConnector::new();
        let worker = FetchWorker::new(Arc::new(connector.clone()), fast_policy());
        let health = HealthTracker::new();
        let poller = Poller::new(
            store.clone(),
            FanOutCollector::new(worker),
            ReconciliationWriter::new(grace),
            health.clone(),
        );

        Ok(Self { _dir: dir, store, connector, health, poller })
    }

    /// Configure une credential et le comportement du châssis simulé
    pub async fn add_chassis(&self, ip: &str, behaviour: Behaviour) -> Result<()> {
        self.add_target(CredentialScope::Chassis, ip, behaviour).await
    }

    /// Idem pour un serveur d'API IxNetwork
    pub async fn add_api_server(&self, ip: &str, behaviour: Behaviour) -> Result<()> {
        self.add_target(CredentialScope::IxNetwork, ip, behaviour).await
    }

    async fn add_target(&self, scope: CredentialScope, ip: &str, behaviour: Behaviour) -> Result<()> {
        self.connector.script(ip, behaviour);
        let op = CredentialOp {
            action: CredentialAction::Add,
            credential: ChassisCredential { ip: ip.into(), username: "admin".into(), password: "admin".into() },
        };
        self.store.write("test_credentials", move |tx| settings::apply_credentials(tx, scope, &[op])).await?;
        Ok(())
    }

    /// Le mock, vu comme le connecteur partagé par le routeur HTTP
    pub fn shared_connector(&self) -> Arc<dyn ChassisConnector> {
        Arc::new(self.connector.clone())
    }

    /// Écrit directement une ligne summary (état "précédent" d'un scénario)
    pub async fn seed_summary(&self, row: ChassisSummaryRecord) -> Result<()> {
        self.store
            .write("test_seed", move |tx| {
                let mut configured: Vec<String> =
                    settings::read_credentials(tx, CredentialScope::Chassis)?.into_iter().map(|c| c.ip).collect();
                configured.push(row.chassis_ip.clone());
                inventory::replace_summary(tx, &[row], &configured)
            })
            .await?;
        Ok(())
    }

    pub async fn run(&self, category: Category) -> Result<CycleReport> {
        Ok(self.poller.run_cycle(category).await?)
    }

    pub async fn summary(&self) -> Result<Vec<ChassisSummaryRecord>> {
        Ok(self.store.read(|conn| inventory::read_summary(conn)).await?)
    }

    pub async fn summary_row(&self, ip: &str) -> Result<Option<ChassisSummaryRecord>> {
        let ip = ip.to_string();
        Ok(self.store.read(move |conn| inventory::read_summary_by_ip(conn, &ip)).await?)
    }

    pub async fn table<R: TableRow + Send + 'static>(&self) -> Result<Vec<R>> {
        Ok(self.store.read(|conn| inventory::read_rows::<R>(conn, None)).await?)
    }
}
