use crate::client::ixos::IxosOptions;
use crate::fetch::RetryPolicy;
use crate::models::Category;
use crate::store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value for {key}: {value}")]
    Env { key: &'static str, value: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FetchConf {
    pub attempts: u32,
    pub attempt_timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_jitter_ms: u64,
    /// Temps max passé à poller une opération asynchrone vendor (HTTP 202)
    pub operation_timeout_secs: u64,
    pub accept_invalid_certs: bool,
    /// `https` vers les châssis ; `http` derrière un proxy ou un stub
    pub scheme: String,
}

impl Default for FetchConf {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout_secs: 30,
            backoff_base_ms: 2000,
            backoff_jitter_ms: 1000,
            operation_timeout_secs: 600,
            accept_invalid_certs: true,
            scheme: "https".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub reader_pool_size: usize,
    pub busy_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub error_retry_secs: u64,
    pub fetch: FetchConf,
    /// Catégories dont la boucle est démarrée
    pub categories: Vec<Category>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/inventory.db"),
            host: "0.0.0.0".into(),
            port: 8080,
            reader_pool_size: 10,
            busy_timeout_secs: 30,
            grace_period_secs: 300,
            error_retry_secs: 60,
            fetch: FetchConf::default(),
            categories: Category::ALL.to_vec(),
        }
    }
}

impl KernelConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Surcharges `DATABASE_PATH`, `HOST`, `PORT`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port.parse().map_err(|_| ConfigError::Env { key: "PORT", value: port })?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            path: self.database_path.clone(),
            busy_timeout: Duration::from_secs(self.busy_timeout_secs),
            reader_pool_size: self.reader_pool_size,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.fetch.attempts,
            attempt_timeout: Duration::from_secs(self.fetch.attempt_timeout_secs),
            backoff_base: Duration::from_millis(self.fetch.backoff_base_ms),
            backoff_jitter: Duration::from_millis(self.fetch.backoff_jitter_ms),
            operation_timeout: Duration::from_secs(self.fetch.operation_timeout_secs),
        }
    }

    pub fn ixos_options(&self) -> IxosOptions {
        IxosOptions {
            scheme: self.fetch.scheme.clone(),
            request_timeout: Duration::from_secs(self.fetch.attempt_timeout_secs),
            operation_timeout: Duration::from_secs(self.fetch.operation_timeout_secs),
            accept_invalid_certs: self.fetch.accept_invalid_certs,
            ..IxosOptions::default()
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn error_retry(&self) -> Duration {
        Duration::from_secs(self.error_retry_secs)
    }
}

pub async fn read_config_file(path: &Path) -> Result<KernelConfig, ConfigError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    KernelConfig::from_yaml(&text)
}

/// Fichier nommé par `INVENTORY_KERNEL_CONFIG` (défaut `kernel.yaml`), puis surcharges env.
/// Fichier absent ou invalide → configuration par défaut.
pub async fn load_config() -> Result<KernelConfig, ConfigError> {
    let path = std::env::var("INVENTORY_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    let path = Path::new(&path);

    let mut config = if path.exists() {
        read_config_file(path).await.unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            KernelConfig::default()
        })
    } else {
        info!(path = %path.display(), "no config file, using defaults");
        KernelConfig::default()
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = KernelConfig::from_yaml("port: 9000\nfetch:\n  attempts: 5\ncategories: [chassis, perf]\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.fetch.attempts, 5);
        assert_eq!(config.fetch.attempt_timeout_secs, 30);
        assert_eq!(config.categories, vec![Category::Chassis, Category::Perf]);
        assert_eq!(config.grace_period(), Duration::from_secs(300));
    }

    #[test]
    fn test_scheme_defaults_to_https() {
        let config = KernelConfig::from_yaml("fetch:\n  attempts: 2\n").unwrap();
        assert_eq!(config.ixos_options().scheme, "https");

        let config = KernelConfig::from_yaml("fetch:\n  scheme: http\n  operation_timeout_secs: 20\n").unwrap();
        assert_eq!(config.ixos_options().scheme, "http");
        assert_eq!(config.retry_policy().operation_timeout, Duration::from_secs(20));
        assert_eq!(config.ixos_options().operation_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(KernelConfig::from_yaml("  \n").unwrap(), KernelConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(matches!(KernelConfig::from_yaml("port: [not, a, port]"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([("DATABASE_PATH", "/tmp/x.db"), ("PORT", "7070")]);
        let mut config = KernelConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.listen_addr(), "0.0.0.0:7070");

        let mut config = KernelConfig::default();
        let err = config.apply_env(|k| (k == "PORT").then(|| "eighty".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "PORT", .. }));
    }

    #[tokio::test]
    async fn test_read_config_file_missing() {
        let err = read_config_file(Path::new("/nonexistent/kernel.yaml")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
