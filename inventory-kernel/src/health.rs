use crate::models::Category;
use crate::state::{new_state, Shared};
use crate::store::WriteStats;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Phase courante d'une boucle de polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    #[default]
    Idle,
    Fetching,
    Writing,
    Sleeping,
}

/// Bilan du dernier cycle terminé
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct CycleReport {
    pub cycle_id: String,
    pub chassis: usize,
    pub unreachable: usize,
    pub rows_written: usize,
    pub preserved: usize,
    pub purged: usize,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CategoryHealth {
    pub phase: PollPhase,
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub last_success_at: Option<String>,
    pub last_error: Option<String>,
    pub last_report: Option<CycleReport>,
}

#[derive(Debug, Serialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub memory_usage_mb: f32,
    pub categories: BTreeMap<String, CategoryHealth>,
    pub store: WriteStats,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    categories: Shared<BTreeMap<String, CategoryHealth>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self { start_time: Instant::now(), categories: new_state(BTreeMap::new()) }
    }

    pub fn set_phase(&self, category: Category, phase: PollPhase) {
        self.categories.lock().entry(category.to_string()).or_default().phase = phase;
    }

    pub fn record_success(&self, category: Category, report: CycleReport) {
        let mut categories = self.categories.lock();
        let entry = categories.entry(category.to_string()).or_default();
        entry.cycles += 1;
        entry.consecutive_failures = 0;
        entry.last_success_at = Some(crate::timestamp::now());
        entry.last_report = Some(report);
    }

    pub fn record_failure(&self, category: Category, error: String) {
        let mut categories = self.categories.lock();
        let entry = categories.entry(category.to_string()).or_default();
        entry.cycles += 1;
        entry.consecutive_failures += 1;
        entry.last_error = Some(error);
    }

    pub fn category(&self, category: Category) -> Option<CategoryHealth> {
        self.categories.lock().get(category.as_str()).cloned()
    }

    pub fn get_health(&self, store: WriteStats) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            memory_usage_mb: get_memory_usage_mb(),
            categories: self.categories.lock().clone(),
            store,
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }

    0.0
}
