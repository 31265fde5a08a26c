/**
 * FETCH WORKER - Un appel vendor, borné et jamais en échec
 *
 * RÔLE :
 * Encapsule une récupération (châssis × catégorie) avec retry, backoff et timeout.
 * Toute panne (timeout, connexion, auth, payload, panic) devient un `Unreachable`
 * au lieu de remonter à l'appelant.
 *
 * FONCTIONNEMENT :
 * - jusqu'à `attempts` tentatives, chacune bornée par `attempt_timeout`
 *   (+ `operation_timeout` pour les catégories servies par opération asynchrone)
 * - avant la tentative n (n >= 2) : sommeil `base × (n-1)` + jitter aléatoire
 * - une ligne de log structurée par tentative (chassis_ip, attempt, category)
 *
 * UTILITÉ :
 * Le collecteur et les writers pattern-matchent sur `FetchOutcome`,
 * pas de chaîne magique "Not Reachable" dans le pipeline.
 */

use crate::client::{ChassisConnector, ClientError};
use crate::models::{
    CardRecord, Category, ChassisCredential, ChassisSummaryRecord, IxNetworkServerRecord, LicenseRecord, PortRecord,
    SensorRecord, UtilizationSample, NA,
};
use crate::{normalize, timestamp};
use futures::FutureExt;
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_jitter: Duration,
    /// Polling d'une opération vendor asynchrone, en plus de `attempt_timeout`
    pub operation_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(2),
            backoff_jitter: Duration::from_secs(1),
            operation_timeout: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// Délai avant le retry numéro `retry` (1 = premier retry)
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.backoff_base.saturating_mul(retry);
        let jitter_cap = u64::try_from(self.backoff_jitter.saturating_mul(retry).as_millis()).unwrap_or(u64::MAX);
        if jitter_cap == 0 {
            return base;
        }
        base.saturating_add(Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_cap)))
    }

    /// Durée max d'une tentative pour cette catégorie
    pub fn attempt_budget(&self, category: Category) -> Duration {
        if category.uses_async_operations() {
            self.attempt_timeout.saturating_add(self.operation_timeout)
        } else {
            self.attempt_timeout
        }
    }
}

/// Un châssis configuré, tel que passé à un cycle
#[derive(Debug, Clone)]
pub struct ChassisTarget {
    pub credential: ChassisCredential,
    /// Type connu depuis le dernier summary, `NA` sinon
    pub chassis_type: String,
}

impl ChassisTarget {
    pub fn new(credential: ChassisCredential) -> Self {
        Self { credential, chassis_type: NA.to_string() }
    }

    pub fn ip(&self) -> &str {
        &self.credential.ip
    }
}

/// Payload normalisé d'une catégorie pour un châssis
#[derive(Debug, Clone)]
pub enum Inventory {
    Summary(ChassisSummaryRecord),
    Cards(Vec<CardRecord>),
    Ports(Vec<PortRecord>),
    Sensors(Vec<SensorRecord>),
    Licenses(Vec<LicenseRecord>),
    Utilization(UtilizationSample),
    ApiServer(IxNetworkServerRecord),
}

#[derive(Debug, Clone)]
pub enum FetchOutcome<T> {
    Success(T),
    Unreachable { reason: String },
}

#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub chassis_ip: String,
    /// Horodatage de fin de fetch, utilisé pour les lignes sentinelles
    pub at: String,
    pub outcome: FetchOutcome<T>,
}

pub type ChassisFetch = Fetched<Inventory>;

impl<T> Fetched<T> {
    pub fn success(chassis_ip: &str, value: T) -> Self {
        Self { chassis_ip: chassis_ip.to_string(), at: timestamp::now(), outcome: FetchOutcome::Success(value) }
    }

    pub fn unreachable(chassis_ip: &str, reason: impl Into<String>) -> Self {
        Self {
            chassis_ip: chassis_ip.to_string(),
            at: timestamp::now(),
            outcome: FetchOutcome::Unreachable { reason: reason.into() },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success(_))
    }

    /// Transforme le payload ; `None` du mapper = payload inattendu → Unreachable
    pub fn filter_map<U>(self, f: impl FnOnce(T) -> Option<U>) -> Fetched<U> {
        let outcome = match self.outcome {
            FetchOutcome::Success(value) => match f(value) {
                Some(mapped) => FetchOutcome::Success(mapped),
                None => FetchOutcome::Unreachable { reason: "unexpected payload kind".into() },
            },
            FetchOutcome::Unreachable { reason } => FetchOutcome::Unreachable { reason },
        };
        Fetched { chassis_ip: self.chassis_ip, at: self.at, outcome }
    }
}

#[derive(Clone)]
pub struct FetchWorker {
    connector: Arc<dyn ChassisConnector>,
    policy: RetryPolicy,
}

impl FetchWorker {
    pub fn new(connector: Arc<dyn ChassisConnector>, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    /// Ne renvoie jamais d'erreur : le dernier échec devient la raison de l'Unreachable
    pub async fn fetch(&self, target: &ChassisTarget, category: Category) -> ChassisFetch {
        let chassis_ip = target.ip();
        if !category.fetches_from_chassis() {
            return Fetched::unreachable(chassis_ip, format!("{category} is not fetched from chassis"));
        }

        let attempts = self.policy.attempts.max(1);
        let budget = self.policy.attempt_budget(category);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.policy.backoff(attempt - 1);
                debug!(chassis_ip, attempt, category = %category, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::time::sleep(delay).await;
            }

            let call = AssertUnwindSafe(self.attempt(target, category)).catch_unwind();
            match tokio::time::timeout(budget, call).await {
                Ok(Ok(Ok(inventory))) => {
                    info!(chassis_ip, attempt, category = %category, "fetch succeeded");
                    return Fetched::success(chassis_ip, inventory);
                }
                Ok(Ok(Err(e))) => last_error = e.to_string(),
                Ok(Err(_)) => last_error = "fetch panicked".to_string(),
                Err(_) => last_error = format!("timed out after {budget:?}"),
            }
            warn!(chassis_ip, attempt, category = %category, error = %last_error, "fetch attempt failed");
        }

        warn!(chassis_ip, category = %category, attempts, "chassis unreachable");
        Fetched::unreachable(chassis_ip, last_error)
    }

    async fn attempt(&self, target: &ChassisTarget, category: Category) -> Result<Inventory, ClientError> {
        let ip = target.ip();
        if category == Category::IxNetwork {
            let server = self.connector.connect_api_server(&target.credential).await?;
            let sessions = server.sessions().await?;
            return Ok(Inventory::ApiServer(normalize::api_server_summary(ip, &sessions, &timestamp::now())?));
        }

        let session = self.connector.connect(&target.credential).await?;
        let chassis_type = target.chassis_type.as_str();
        let at = timestamp::now();

        let inventory = match category {
            Category::Chassis => {
                let os = match session.ports().await {
                    Ok(ports) => normalize::detect_os(&ports),
                    Err(_) => NA,
                };
                let chassis = session.chassis().await?;
                let perf = session.perf_counters().await.ok();
                Inventory::Summary(normalize::chassis_summary(ip, &chassis, perf.as_ref(), os, &at)?)
            }
            Category::Cards => Inventory::Cards(normalize::cards(ip, chassis_type, &session.cards().await?, &at)?),
            Category::Ports => Inventory::Ports(normalize::ports(ip, chassis_type, &session.ports().await?, &at)?),
            Category::Sensors => {
                Inventory::Sensors(normalize::sensors(ip, chassis_type, &session.sensors().await?, &at)?)
            }
            Category::Licensing => {
                let host_id = session.license_host_id().await?;
                let activations = session.license_activation().await?;
                Inventory::Licenses(normalize::licenses(ip, chassis_type, &host_id, &activations, &at)?)
            }
            Category::Perf => Inventory::Utilization(normalize::utilization(ip, &session.perf_counters().await?, &at)?),
            Category::DataPurge | Category::IxNetwork => {
                return Err(ClientError::Unsupported(category.to_string()))
            }
        };
        Ok(inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_with_retry() {
        let policy = RetryPolicy::default();
        for retry in 1..=3u32 {
            let delay = policy.backoff(retry);
            assert!(delay >= Duration::from_secs(2 * retry as u64));
            assert!(delay <= Duration::from_secs(3 * retry as u64));
        }
    }

    #[test]
    fn test_backoff_without_jitter_is_exact() {
        let policy = RetryPolicy { backoff_jitter: Duration::ZERO, ..RetryPolicy::default() };
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            backoff_base: Duration::MAX / 2,
            backoff_jitter: Duration::MAX / 2,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(3), Duration::MAX);
        assert_eq!(policy.backoff(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_async_categories_get_operation_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempt_budget(Category::Cards), Duration::from_secs(30));
        assert_eq!(policy.attempt_budget(Category::Licensing), Duration::from_secs(630));
    }

    #[test]
    fn test_filter_map_keeps_unreachable_reason() {
        let fetched: Fetched<u32> = Fetched::unreachable("10.0.0.1", "boom");
        let mapped = fetched.filter_map(|v| Some(v + 1));
        match mapped.outcome {
            FetchOutcome::Unreachable { reason } => assert_eq!(reason, "boom"),
            FetchOutcome::Success(_) => panic!("expected unreachable"),
        }

        let wrong_kind = Fetched::success("10.0.0.1", 3u32).filter_map(|_| None::<u32>);
        assert!(!wrong_kind.is_success());
    }
}
