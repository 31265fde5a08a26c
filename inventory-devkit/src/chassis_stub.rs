/*!
Mock du client châssis pour tester le pipeline sans matériel

Chaque IP reçoit un comportement scripté (sain, lent, échecs transitoires,
panne, blocage, panic). Le même script sert aux châssis et aux serveurs
d'API IxNetwork. Les connexions sont comptées pour les assertions.
*/

use crate::fixtures::ChassisFixture;
use async_trait::async_trait;
use inventory_kernel::client::{ApiServerSession, ChassisConnector, ChassisSession, ClientError};
use inventory_kernel::models::ChassisCredential;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Behaviour {
    Healthy(ChassisFixture),
    /// Chaque appel de session attend ce délai avant de répondre
    Slow(Duration, ChassisFixture),
    /// Échoue `n` connexions puis répond avec la fixture
    FailTimes(u32, ChassisFixture),
    AlwaysFail,
    /// Ne répond jamais (déclenche le timeout par tentative)
    Hang,
    Panic,
    /// Authentification OK mais payload vendor illisible
    Malformed,
}

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, Behaviour>>,
    connects: Mutex<HashMap<String, u32>>,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Inner>,
}

enum Action {
    Session(ChassisFixture, Duration),
    Fail(String),
    Hang,
    Panic,
    Malformed,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remplace le comportement d'une IP
    pub fn script(&self, ip: &str, behaviour: Behaviour) -> &Self {
        self.inner.scripts.lock().insert(ip.to_string(), behaviour);
        self
    }

    pub fn connect_count(&self, ip: &str) -> u32 {
        self.inner.connects.lock().get(ip).copied().unwrap_or(0)
    }

    pub fn total_connects(&self) -> u32 {
        self.inner.connects.lock().values().sum()
    }

    pub fn reset_counts(&self) {
        self.inner.connects.lock().clear();
    }

    // Décide sous le verrou, agit après : aucun verrou tenu à travers un await
    fn next_action(&self, ip: &str) -> Action {
        *self.inner.connects.lock().entry(ip.to_string()).or_default() += 1;

        let mut scripts = self.inner.scripts.lock();
        match scripts.get_mut(ip) {
            Some(Behaviour::Healthy(fixture)) => Action::Session(fixture.clone(), Duration::ZERO),
            Some(Behaviour::Slow(delay, fixture)) => Action::Session(fixture.clone(), *delay),
            Some(Behaviour::FailTimes(remaining, fixture)) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Action::Fail("scripted transient failure".into())
                } else {
                    Action::Session(fixture.clone(), Duration::ZERO)
                }
            }
            Some(Behaviour::AlwaysFail) => Action::Fail("connection refused".into()),
            Some(Behaviour::Hang) => Action::Hang,
            Some(Behaviour::Panic) => Action::Panic,
            Some(Behaviour::Malformed) => Action::Malformed,
            None => Action::Fail("no route to host".into()),
        }
    }
}

impl MockConnector {
    async fn open(&self, ip: &str) -> Result<MockSession, ClientError> {
        match self.next_action(ip) {
            Action::Session(fixture, delay) => Ok(MockSession { fixture, delay, malformed: false }),
            Action::Malformed => Ok(MockSession {
                fixture: ChassisFixture::healthy("unused"),
                delay: Duration::ZERO,
                malformed: true,
            }),
            Action::Fail(reason) => Err(ClientError::Connection(reason)),
            Action::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ClientError::Timeout("hung".into()))
            }
            Action::Panic => panic!("scripted panic for {ip}"),
        }
    }
}

#[async_trait]
impl ChassisConnector for MockConnector {
    async fn connect(&self, credential: &ChassisCredential) -> Result<Box<dyn ChassisSession>, ClientError> {
        Ok(Box::new(self.open(&credential.ip).await?))
    }

    async fn connect_api_server(
        &self,
        credential: &ChassisCredential,
    ) -> Result<Box<dyn ApiServerSession>, ClientError> {
        Ok(Box::new(self.open(&credential.ip).await?))
    }
}

pub struct MockSession {
    fixture: ChassisFixture,
    delay: Duration,
    malformed: bool,
}

impl MockSession {
    async fn payload(&self, value: &Value) -> Result<Value, ClientError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.malformed {
            return Ok(Value::String("<html>502 Bad Gateway</html>".into()));
        }
        Ok(value.clone())
    }
}

#[async_trait]
impl ChassisSession for MockSession {
    async fn chassis(&self) -> Result<Value, ClientError> {
        self.payload(&self.fixture.chassis).await
    }

    async fn cards(&self) -> Result<Value, ClientError> {
        self.payload(&self.fixture.cards).await
    }

    async fn ports(&self) -> Result<Value, ClientError> {
        self.payload(&self.fixture.ports).await
    }

    async fn sensors(&self) -> Result<Value, ClientError> {
        self.payload(&self.fixture.sensors).await
    }

    async fn perf_counters(&self) -> Result<Value, ClientError> {
        self.payload(&self.fixture.perf).await
    }

    async fn license_host_id(&self) -> Result<String, ClientError> {
        Ok(self.fixture.host_id.clone())
    }

    async fn license_activation(&self) -> Result<Value, ClientError> {
        self.payload(&self.fixture.licenses).await
    }

    async fn collect_logs(&self) -> Result<String, ClientError> {
        if self.malformed {
            return Err(ClientError::Malformed("log collection without resultUrl".into()));
        }
        Ok(self.fixture.log_bundle_url.clone())
    }
}

#[async_trait]
impl ApiServerSession for MockSession {
    async fn sessions(&self) -> Result<Value, ClientError> {
        self.payload(&self.fixture.sessions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(ip: &str) -> ChassisCredential {
        ChassisCredential { ip: ip.into(), username: "admin".into(), password: "admin".into() }
    }

    #[tokio::test]
    async fn test_fail_times_then_recovers() {
        let connector = MockConnector::new();
        connector.script("10.0.0.1", Behaviour::FailTimes(2, ChassisFixture::healthy("SN")));

        assert!(connector.connect(&credential("10.0.0.1")).await.is_err());
        assert!(connector.connect(&credential("10.0.0.1")).await.is_err());
        let session = connector.connect(&credential("10.0.0.1")).await.unwrap();
        assert_eq!(session.license_host_id().await.unwrap(), "HOST-SN");
        assert_eq!(connector.connect_count("10.0.0.1"), 3);
    }

    #[tokio::test]
    async fn test_slow_session_delays_payloads() {
        let connector = MockConnector::new();
        connector.script("10.0.0.2", Behaviour::Slow(Duration::from_millis(50), ChassisFixture::healthy("SN")));

        let session = connector.connect(&credential("10.0.0.2")).await.unwrap();
        let started = std::time::Instant::now();
        session.cards().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_api_server_shares_scripts() {
        let connector = MockConnector::new();
        connector.script("10.0.1.1", Behaviour::Healthy(ChassisFixture::healthy("SN")));

        let server = connector.connect_api_server(&credential("10.0.1.1")).await.unwrap();
        assert_eq!(server.sessions().await.unwrap().as_array().map(Vec::len), Some(3));
        assert_eq!(connector.connect_count("10.0.1.1"), 1);
    }

    #[tokio::test]
    async fn test_unscripted_ip_fails() {
        let connector = MockConnector::new();
        assert!(matches!(connector.connect(&credential("10.9.9.9")).await, Err(ClientError::Connection(_))));
        assert_eq!(connector.total_connects(), 1);
    }
}
