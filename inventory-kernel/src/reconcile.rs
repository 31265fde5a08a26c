/**
 * RECONCILIATION - Écriture du summary sans écraser une donnée saine récente
 *
 * RÔLE :
 * Un châssis injoignable ne remplace pas une ligne summary saine écrite il y a
 * moins de `grace` (5 min par défaut) : la ligne précédente est conservée telle quelle.
 *
 * FONCTIONNEMENT :
 * 1. partition des résultats en succès / échecs
 * 2. échec + ligne précédente saine + |now - lastUpdatedAt| < grace → préservé
 * 3. succès + échecs non préservés (ligne sentinelle "Not Reachable" datée de now)
 *    forment le write-set
 * 4. le store ne supprime et réinsère que les IPs du write-set
 *
 * La lecture des lignes précédentes et l'écriture se font dans la même transaction.
 */

use crate::fetch::{FetchOutcome, Fetched};
use crate::models::ChassisSummaryRecord;
use crate::store::inventory::{self, SummaryWrite};
use crate::store::{Store, StoreError};
use crate::timestamp;
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::info;

pub const DEFAULT_GRACE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryPlan {
    pub write: Vec<ChassisSummaryRecord>,
    /// IPs dont la ligne précédente est gardée intacte
    pub preserved: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub written: usize,
    pub preserved: usize,
    pub unreachable: usize,
    pub pruned: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconciliationWriter {
    grace: Duration,
}

impl Default for ReconciliationWriter {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE)
    }
}

impl ReconciliationWriter {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Plan pur : ne touche pas au store
    pub fn reconcile(
        &self,
        fetched: Vec<Fetched<ChassisSummaryRecord>>,
        prior: &HashMap<String, ChassisSummaryRecord>,
        now: OffsetDateTime,
    ) -> SummaryPlan {
        let stamped_now = timestamp::format(now);
        let mut plan = SummaryPlan::default();

        for item in fetched {
            match item.outcome {
                FetchOutcome::Success(record) => plan.write.push(record),
                FetchOutcome::Unreachable { .. } => {
                    let keep = prior.get(&item.chassis_ip).is_some_and(|row| self.is_fresh_and_healthy(row, now));
                    if keep {
                        plan.preserved.push(item.chassis_ip);
                    } else {
                        plan.write.push(ChassisSummaryRecord::unreachable(&item.chassis_ip, &stamped_now));
                    }
                }
            }
        }
        plan
    }

    /// Un horodatage illisible ne prouve rien : la ligne n'est pas fraîche
    pub fn is_fresh_and_healthy(&self, row: &ChassisSummaryRecord, now: OffsetDateTime) -> bool {
        if !row.status.is_healthy() {
            return false;
        }
        let Some(updated_at) = timestamp::parse(&row.last_updated_at) else {
            return false;
        };
        let age = (now - updated_at).abs();
        age < self.grace
    }

    /// Lit les lignes précédentes, planifie et écrit dans une seule transaction
    pub async fn commit(
        &self,
        store: &Store,
        fetched: Vec<Fetched<ChassisSummaryRecord>>,
        configured_ips: Vec<String>,
    ) -> Result<SummaryOutcome, StoreError> {
        if fetched.is_empty() {
            return Ok(SummaryOutcome::default());
        }

        let writer = *self;
        let unreachable = fetched.iter().filter(|f| !f.is_success()).count();

        let (plan, write) = store
            .write("chassis_summary", move |tx| {
                let prior = inventory::read_summary_map(tx)?;
                let plan = writer.reconcile(fetched, &prior, OffsetDateTime::now_utc());
                let write = inventory::replace_summary(tx, &plan.write, &configured_ips)?;
                Ok((plan, write))
            })
            .await?;

        let SummaryWrite { written, pruned } = write;
        let outcome = SummaryOutcome { written, preserved: plan.preserved.len(), unreachable, pruned };
        if !plan.preserved.is_empty() {
            info!(preserved = ?plan.preserved, "kept recent healthy summary rows for unreachable chassis");
        }
        Ok(outcome)
    }
}
