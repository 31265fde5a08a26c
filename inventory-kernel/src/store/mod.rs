/**
 * PERSISTENCE STORE - SQLite, un writer, lecteurs bornés
 *
 * RÔLE :
 * Seule ressource mutable partagée du kernel. Toutes les écritures passent par
 * `write`, toutes les lectures par `read`.
 *
 * FONCTIONNEMENT :
 * - write : mutex autour de l'unique connexion d'écriture, une transaction par appel
 *   (commit ou rollback en bloc), exécutée sur le pool bloquant de tokio
 * - échec d'écriture : rollback, log, la connexion writer est rouverte, erreur renvoyée
 * - read : connexion read-only dédiée, nombre de lecteurs borné par un sémaphore
 * - journal WAL + busy_timeout pour cohabiter avec d'autres processus
 *
 * UTILITÉ :
 * Les compteurs WriteStats permettent de vérifier qu'il n'y a jamais plus
 * d'un writer actif (peak_concurrent_writers).
 */

pub mod inventory;
pub mod schema;
pub mod settings;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, Transaction};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("store task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub reader_pool_size: usize,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), busy_timeout: Duration::from_secs(30), reader_pool_size: 10 }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteStats {
    pub committed: u64,
    pub failed: u64,
    pub active_writers: usize,
    pub peak_concurrent_writers: usize,
}

#[derive(Default)]
struct WriteCounters {
    active: AtomicUsize,
    peak: AtomicUsize,
    committed: AtomicU64,
    failed: AtomicU64,
}

// Décrémente le compteur de writers actifs même si l'opération panique
struct ActiveWriter<'a>(&'a AtomicUsize);

impl<'a> ActiveWriter<'a> {
    fn enter(counters: &'a WriteCounters) -> Self {
        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);
        Self(&counters.active)
    }
}

impl Drop for ActiveWriter<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Inner {
    config: StoreConfig,
    writer: Mutex<Connection>,
    readers: Arc<Semaphore>,
    counters: WriteCounters,
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Ouvre (ou crée) la base, applique les pragmas et le schéma
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = open_writer(&config.path, config.busy_timeout)?;
        schema::apply(&conn)?;
        debug!(path = %config.path.display(), "store opened");

        let readers = Arc::new(Semaphore::new(config.reader_pool_size.max(1)));
        Ok(Self {
            inner: Arc::new(Inner { config, writer: Mutex::new(conn), readers, counters: WriteCounters::default() }),
        })
    }

    /// Exécute `op` dans une transaction sur la connexion d'écriture unique
    pub async fn write<T, F>(&self, label: &'static str, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.write_blocking(label, op))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Exécute `op` sur une connexion read-only, au plus `reader_pool_size` à la fois
    pub async fn read<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let permit = self
            .inner
            .readers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?;
        let path = self.inner.config.path.clone();
        let busy_timeout = self.inner.config.busy_timeout;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let conn = open_reader(&path, busy_timeout)?;
            op(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub fn write_stats(&self) -> WriteStats {
        let c = &self.inner.counters;
        WriteStats {
            committed: c.committed.load(Ordering::SeqCst),
            failed: c.failed.load(Ordering::SeqCst),
            active_writers: c.active.load(Ordering::SeqCst),
            peak_concurrent_writers: c.peak.load(Ordering::SeqCst),
        }
    }

    /// Mode journal effectif (`wal` attendu)
    pub async fn journal_mode(&self) -> Result<String, StoreError> {
        self.read(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0))?))
            .await
    }
}

impl Inner {
    fn write_blocking<T, F>(&self, label: &'static str, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.writer.lock();
        let _active = ActiveWriter::enter(&self.counters);

        let result = run_transaction(&mut conn, op);
        match result {
            Ok(value) => {
                self.counters.committed.fetch_add(1, Ordering::SeqCst);
                debug!(label, "write committed");
                Ok(value)
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(label, error = %e, "write failed, rolled back");
                match open_writer(&self.config.path, self.config.busy_timeout) {
                    Ok(fresh) => *conn = fresh,
                    Err(reopen) => warn!(label, error = %reopen, "could not reopen writer connection"),
                }
                Err(e)
            }
        }
    }
}

// Le drop d'une Transaction non commitée fait le rollback
fn run_transaction<T, F>(conn: &mut Connection, op: F) -> Result<T, StoreError>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
{
    let tx = conn.transaction()?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn open_writer(path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        warn!(mode = %mode, "WAL journal mode not accepted");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}

fn open_reader(path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}
