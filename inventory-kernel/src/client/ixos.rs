//! Implémentation reqwest de l'API REST IxOS (et des serveurs d'API IxNetwork).
//!
//! - authentification par `POST <auth_path>` → `apiKey`
//! - header `x-api-key` sur chaque requête, ré-authentification unique sur 401
//! - réponse 202 = opération asynchrone, pollée jusqu'à un état terminal

use super::{ApiServerSession, ChassisConnector, ChassisSession, ClientError};
use crate::models::ChassisCredential;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;

const AUTH_PATH: &str = "/platform/api/v2/auth/session";
const IXOS_PATH: &str = "/chassis/api/v2/ixos";

// IxNetwork Web autonome ; sinon le serveur est hébergé par la plateforme du châssis
const IXNETWORK_WEB_AUTH_PATH: &str = "/ixnetworkweb/api/v1/auth/session";
const IXNETWORK_WEB_SESSIONS_PATH: &str = "/ixnetworkweb/api/v1/sessions";
const IXNETWORK_SESSIONS_PATH: &str = "/api/v1/sessions";

#[derive(Debug, Clone)]
pub struct IxosOptions {
    /// `https` en production ; `http` pour viser un stub local
    pub scheme: String,
    /// Timeout d'une requête HTTP isolée
    pub request_timeout: Duration,
    /// Temps max passé à poller une opération asynchrone
    pub operation_timeout: Duration,
    pub poll_interval: Duration,
    /// Les châssis exposent des certificats auto-signés
    pub accept_invalid_certs: bool,
}

impl Default for IxosOptions {
    fn default() -> Self {
        Self {
            scheme: "https".into(),
            request_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(2),
            accept_invalid_certs: true,
        }
    }
}

pub struct IxosConnector {
    http: reqwest::Client,
    options: IxosOptions,
}

impl IxosConnector {
    pub fn new(options: IxosOptions) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .timeout(options.request_timeout)
            .build()?;
        Ok(Self { http, options })
    }

    fn session(&self, credential: &ChassisCredential, auth_path: &'static str) -> IxosSession {
        IxosSession {
            http: self.http.clone(),
            base_url: format!("{}://{}", self.options.scheme, credential.ip),
            auth_path,
            username: credential.username.clone(),
            password: credential.password.clone(),
            api_key: Mutex::new(None),
            options: self.options.clone(),
        }
    }
}

#[async_trait]
impl ChassisConnector for IxosConnector {
    async fn connect(&self, credential: &ChassisCredential) -> Result<Box<dyn ChassisSession>, ClientError> {
        let session = self.session(credential, AUTH_PATH);
        session.authenticate().await?;
        Ok(Box::new(session))
    }

    async fn connect_api_server(
        &self,
        credential: &ChassisCredential,
    ) -> Result<Box<dyn ApiServerSession>, ClientError> {
        let standalone = self.session(credential, IXNETWORK_WEB_AUTH_PATH);
        match standalone.authenticate().await {
            Ok(()) => Ok(Box::new(IxNetworkSession { rest: standalone, sessions_path: IXNETWORK_WEB_SESSIONS_PATH })),
            Err(ClientError::Http { status: 404, .. }) => {
                debug!(server = %credential.ip, "no standalone IxNetwork Web, trying platform auth");
                let hosted = self.session(credential, AUTH_PATH);
                hosted.authenticate().await?;
                Ok(Box::new(IxNetworkSession { rest: hosted, sessions_path: IXNETWORK_SESSIONS_PATH }))
            }
            Err(e) => Err(e),
        }
    }
}

pub struct IxosSession {
    http: reqwest::Client,
    base_url: String,
    auth_path: &'static str,
    username: String,
    password: String,
    api_key: Mutex<Option<String>>,
    options: IxosOptions,
}

impl IxosSession {
    async fn authenticate(&self) -> Result<(), ClientError> {
        let payload = json!({
            "username": self.username,
            "password": self.password,
            "rememberMe": false,
        });
        let response = self
            .http
            .post(self.resolve(self.auth_path))
            .json(&payload)
            .send()
            .await?;
        let (_, data) = read_json(response).await?;
        let key = data
            .get("apiKey")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Malformed("auth response without apiKey".into()))?;
        *self.api_key.lock() = Some(key.to_string());
        debug!(base_url = %self.base_url, "authenticated");
        Ok(())
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.request(method, self.resolve(url));
        let api_key = self.api_key.lock().clone();
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Envoie la requête ; sur 401 on renouvelle l'apiKey une seule fois
    async fn send_authenticated(&self, method: Method, url: &str, body: Option<&Value>) -> Result<reqwest::Response, ClientError> {
        let response = self.send(method.clone(), url, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        debug!(base_url = %self.base_url, url, "401 received, re-authenticating");
        self.authenticate().await?;
        self.send(method, url, body).await
    }

    /// Corps de la réponse ; une réponse 202 est suivie jusqu'au résultat de l'opération
    async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value, ClientError> {
        let response = self.send_authenticated(method, url, body).await?;
        let (status, data) = read_json(response).await?;
        if status != StatusCode::ACCEPTED {
            return Ok(data);
        }

        let done = self.wait_for_operation(data).await?;
        match done.get("resultUrl").and_then(Value::as_str) {
            Some(result_url) => {
                let response = self.send_authenticated(Method::GET, result_url, None).await?;
                Ok(read_json(response).await?.1)
            }
            None if done.get("state").and_then(Value::as_str) == Some("COMPLETED") => {
                Err(ClientError::Malformed("completed operation without resultUrl".into()))
            }
            None => Ok(done.get("result").cloned().unwrap_or(done)),
        }
    }

    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.request(Method::GET, &format!("{IXOS_PATH}{path}"), None).await
    }

    /// IN_PROGRESS → SUCCESS | COMPLETED | ERROR, borné par operation_timeout.
    /// Renvoie le corps de l'état terminal réussi.
    async fn wait_for_operation(&self, mut body: Value) -> Result<Value, ClientError> {
        let started = Instant::now();
        loop {
            let state = body.get("state").and_then(Value::as_str).unwrap_or_default().to_string();
            match state.as_str() {
                "IN_PROGRESS" => {
                    if started.elapsed() > self.options.operation_timeout {
                        return Err(ClientError::Operation("timeout while polling async operation".into()));
                    }
                    let url = body
                        .get("url")
                        .and_then(Value::as_str)
                        .ok_or_else(|| ClientError::Malformed("async operation without url".into()))?
                        .to_string();
                    tokio::time::sleep(self.options.poll_interval).await;
                    let response = self.send_authenticated(Method::GET, &url, None).await?;
                    body = read_json(response).await?.1;
                }
                "SUCCESS" | "COMPLETED" => return Ok(body),
                "ERROR" => {
                    let message = body.get("message").and_then(Value::as_str).unwrap_or("unknown error");
                    return Err(ClientError::Operation(message.to_string()));
                }
                other => return Err(ClientError::Operation(format!("unexpected operation state '{other}'"))),
            }
        }
    }
}

/// Décode le corps en JSON ; 4xx/5xx deviennent des erreurs HTTP
async fn read_json(response: reqwest::Response) -> Result<(StatusCode, Value), ClientError> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_client_error() || status.is_server_error() {
        return Err(ClientError::Http { status: status.as_u16(), body: text });
    }
    if text.trim().is_empty() {
        return Ok((status, Value::Null));
    }
    let data = serde_json::from_str(&text).map_err(|e| ClientError::Malformed(format!("invalid JSON: {e}")))?;
    Ok((status, data))
}

#[async_trait]
impl ChassisSession for IxosSession {
    async fn chassis(&self) -> Result<Value, ClientError> {
        self.get("/chassis").await
    }

    async fn cards(&self) -> Result<Value, ClientError> {
        self.get("/cards").await
    }

    async fn ports(&self) -> Result<Value, ClientError> {
        self.get("/ports").await
    }

    async fn sensors(&self) -> Result<Value, ClientError> {
        self.get("/sensors").await
    }

    async fn perf_counters(&self) -> Result<Value, ClientError> {
        self.get("/perfcounters").await
    }

    async fn license_host_id(&self) -> Result<String, ClientError> {
        let data = self
            .request(
                Method::POST,
                &format!("{IXOS_PATH}/licensing/operations/retrievehostid"),
                Some(&json!({})),
            )
            .await?;
        match data {
            Value::String(id) => Ok(id),
            other => other
                .get("hostId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ClientError::Malformed("host id response without hostId".into())),
        }
    }

    async fn license_activation(&self) -> Result<Value, ClientError> {
        self.get("/licensing/activations").await
    }

    // L'archive n'est pas téléchargée : seule son URL est renvoyée
    async fn collect_logs(&self) -> Result<String, ClientError> {
        let url = format!("{IXOS_PATH}/operations/collectlogs");
        let response = self.send_authenticated(Method::POST, &url, Some(&json!({}))).await?;
        let (status, data) = read_json(response).await?;
        let done = if status == StatusCode::ACCEPTED { self.wait_for_operation(data).await? } else { data };
        done.get("resultUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Malformed("log collection without resultUrl".into()))
    }
}

pub struct IxNetworkSession {
    rest: IxosSession,
    sessions_path: &'static str,
}

#[async_trait]
impl ApiServerSession for IxNetworkSession {
    async fn sessions(&self) -> Result<Value, ClientError> {
        self.rest.request(Method::GET, self.sessions_path, None).await
    }
}
