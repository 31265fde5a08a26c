/**
 * CLIENT CHÂSSIS - Interface vers l'API REST vendor des châssis de test
 *
 * RÔLE :
 * Ce module définit la frontière entre le pipeline de polling et l'API vendor.
 * Le pipeline ne connaît que ces deux traits ; l'implémentation HTTP réelle
 * vit dans `ixos`, les mocks de test dans inventory-devkit.
 *
 * FONCTIONNEMENT :
 * - ChassisConnector = fabrique de sessions, une par credential (authentification)
 * - ChassisSession = handle authentifié, une méthode par ressource vendor
 * - ApiServerSession = handle authentifié vers un serveur d'API IxNetwork
 * - Chaque méthode renvoie le JSON vendor brut ; la normalisation est faite ailleurs
 * - ClientError = toutes les pannes possibles (réseau, HTTP, payload, opération async)
 */

pub mod ixos;

use crate::models::ChassisCredential;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("async operation failed: {0}")]
    Operation(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(e.to_string())
        } else if e.is_decode() {
            ClientError::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            ClientError::Http { status: status.as_u16(), body: e.to_string() }
        } else {
            ClientError::Connection(e.to_string())
        }
    }
}

/// Ouvre des sessions authentifiées vers les équipements vendor
#[async_trait]
pub trait ChassisConnector: Send + Sync {
    async fn connect(&self, credential: &ChassisCredential) -> Result<Box<dyn ChassisSession>, ClientError>;

    async fn connect_api_server(
        &self,
        credential: &ChassisCredential,
    ) -> Result<Box<dyn ApiServerSession>, ClientError>;
}

/// Ressources exposées par un châssis. Toutes renvoient le JSON vendor tel quel.
#[async_trait]
pub trait ChassisSession: Send + Sync {
    async fn chassis(&self) -> Result<Value, ClientError>;
    async fn cards(&self) -> Result<Value, ClientError>;
    async fn ports(&self) -> Result<Value, ClientError>;
    async fn sensors(&self) -> Result<Value, ClientError>;
    async fn perf_counters(&self) -> Result<Value, ClientError>;
    async fn license_host_id(&self) -> Result<String, ClientError>;
    async fn license_activation(&self) -> Result<Value, ClientError>;
    /// Lance la collecte des logs ; renvoie l'URL de téléchargement de l'archive
    async fn collect_logs(&self) -> Result<String, ClientError>;
}

#[async_trait]
pub trait ApiServerSession: Send + Sync {
    /// Liste des sessions IxNetwork ouvertes sur le serveur
    async fn sessions(&self) -> Result<Value, ClientError>;
}
