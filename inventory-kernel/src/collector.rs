/**
 * FAN-OUT COLLECTOR - Un FetchWorker par châssis, en parallèle
 *
 * RÔLE :
 * Lance une tâche tokio par châssis configuré pour une catégorie, attend
 * toutes les tâches, puis aplatit les résultats en lignes de tables.
 *
 * GARANTIES :
 * - sortie de même longueur et même ordre que l'entrée, chaque IP une fois
 * - une tâche qui panique ou échoue n'interrompt pas les autres
 * - liste vide → aucun fetch, aucun write
 */

use crate::fetch::{ChassisFetch, ChassisTarget, FetchOutcome, FetchWorker, Fetched, Inventory};
use crate::models::{
    CardRecord, Category, ChassisSummaryRecord, IxNetworkServerRecord, LicenseRecord, PortRecord, SensorRecord,
    UtilizationSample,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct FanOutCollector {
    worker: Arc<FetchWorker>,
}

impl FanOutCollector {
    pub fn new(worker: FetchWorker) -> Self {
        Self { worker: Arc::new(worker) }
    }

    pub async fn collect(&self, category: Category, targets: &[ChassisTarget]) -> Vec<ChassisFetch> {
        if targets.is_empty() {
            return Vec::new();
        }

        let handles = targets.iter().cloned().map(|target| {
            let worker = self.worker.clone();
            tokio::spawn(async move { worker.fetch(&target, category).await })
        });

        join_all(handles)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, target)| match joined {
                Ok(fetched) => fetched,
                Err(e) => {
                    error!(chassis_ip = target.ip(), category = %category, error = %e, "fetch task aborted");
                    Fetched::unreachable(target.ip(), format!("fetch task failed: {e}"))
                }
            })
            .collect()
    }
}

/// Résultat d'un cycle, prêt pour le writer de sa catégorie
#[derive(Debug, Clone)]
pub enum CycleBatch {
    /// Le summary garde les outcomes : la réconciliation a besoin de savoir qui a échoué
    Summary(Vec<Fetched<ChassisSummaryRecord>>),
    Cards(Vec<CardRecord>),
    Ports(Vec<PortRecord>),
    Sensors(Vec<SensorRecord>),
    Licenses(Vec<LicenseRecord>),
    Utilization(Vec<UtilizationSample>),
    ApiServers(Vec<IxNetworkServerRecord>),
}

impl CycleBatch {
    /// `None` pour les catégories sans fetch (data_purge)
    pub fn flatten(category: Category, fetches: Vec<ChassisFetch>) -> Option<Self> {
        let batch = match category {
            Category::Chassis => CycleBatch::Summary(
                fetches
                    .into_iter()
                    .map(|f| {
                        f.filter_map(|inventory| match inventory {
                            Inventory::Summary(record) => Some(record),
                            _ => None,
                        })
                    })
                    .collect(),
            ),
            Category::Cards => CycleBatch::Cards(rows(fetches, CardRecord::unreachable, |inv| match inv {
                Inventory::Cards(rows) => Some(rows),
                _ => None,
            })),
            Category::Ports => CycleBatch::Ports(rows(fetches, PortRecord::unreachable, |inv| match inv {
                Inventory::Ports(rows) => Some(rows),
                _ => None,
            })),
            Category::Sensors => CycleBatch::Sensors(rows(fetches, SensorRecord::unreachable, |inv| match inv {
                Inventory::Sensors(rows) => Some(rows),
                _ => None,
            })),
            Category::Licensing => CycleBatch::Licenses(rows(fetches, LicenseRecord::unreachable, |inv| match inv {
                Inventory::Licenses(rows) => Some(rows),
                _ => None,
            })),
            Category::Perf => CycleBatch::Utilization(rows(fetches, UtilizationSample::unreachable, |inv| match inv {
                Inventory::Utilization(sample) => Some(vec![sample]),
                _ => None,
            })),
            Category::IxNetwork => {
                CycleBatch::ApiServers(rows(fetches, IxNetworkServerRecord::unreachable, |inv| match inv {
                    Inventory::ApiServer(record) => Some(vec![record]),
                    _ => None,
                }))
            }
            Category::DataPurge => return None,
        };
        Some(batch)
    }
}

// Concatène les lignes dans l'ordre d'entrée ; un échec donne une ligne sentinelle
fn rows<R>(
    fetches: Vec<ChassisFetch>,
    sentinel: fn(&str, &str) -> R,
    extract: impl Fn(Inventory) -> Option<Vec<R>>,
) -> Vec<R> {
    let mut out = Vec::new();
    for fetched in fetches {
        let fetched = fetched.filter_map(&extract);
        match fetched.outcome {
            FetchOutcome::Success(rows) => out.extend(rows),
            FetchOutcome::Unreachable { .. } => out.push(sentinel(&fetched.chassis_ip, &fetched.at)),
        }
    }
    out
}
