/*!
Fixtures JSON au format de l'API vendor

Payloads réalistes pour alimenter le `MockConnector` :
- châssis physique Linux prêt (2 cartes, 3 ports, capteurs, licences)
- sessions d'un serveur d'API IxNetwork, URL d'archive de logs
- variantes via builders (`with_state`, `with_ports`...)
*/

use serde_json::{json, Value};

/// Réponses vendor d'un châssis simulé
#[derive(Debug, Clone)]
pub struct ChassisFixture {
    pub chassis: Value,
    pub cards: Value,
    pub ports: Value,
    pub sensors: Value,
    pub perf: Value,
    pub host_id: String,
    pub licenses: Value,
    /// Sessions renvoyées par un serveur d'API IxNetwork
    pub sessions: Value,
    pub log_bundle_url: String,
}

impl ChassisFixture {
    /// Châssis XGS12 "Ready" sous Linux
    pub fn healthy(serial: &str) -> Self {
        Self {
            chassis: json!([{
                "type": "Ixia XGS12",
                "serialNumber": serial,
                "controllerSerialNumber": format!("CTRL-{serial}"),
                "state": "Ready",
                "numberOfPhysicalCards": 2,
                "ixosApplications": [
                    {"name": "IxOS", "version": "10.00.1000.33"},
                    {"name": "IxOS REST", "version": "1.8.0.19"}
                ]
            }]),
            cards: json!([
                {"cardNumber": 2, "serialNumber": format!("{serial}-C2"), "type": "NOVUS100GE8Q28", "state": "UP", "numberOfPorts": 8},
                {"cardNumber": 1, "serialNumber": format!("{serial}-C1"), "type": "NOVUS100GE8Q28", "state": "UP", "numberOfPorts": 8}
            ]),
            ports: json!([
                {"cardNumber": 1, "portNumber": 1, "fullyQualifiedPortName": "1/1", "linkState": "UP", "owner": "alice",
                 "phyMode": "FIBER", "speed": "100000", "type": "NOVUS100GE8Q28", "transmitState": "IDLE",
                 "transceiverModel": "QSFP28-SR4", "transceiverManufacturer": "Acme"},
                {"cardNumber": 1, "portNumber": 2, "fullyQualifiedPortName": "1/2", "linkState": "DOWN", "owner": ""},
                {"cardNumber": 2, "portNumber": 1, "fullyQualifiedPortName": "2/1", "linkState": "UP"}
            ]),
            sensors: json!([
                {"type": "Temperature", "name": "CPU", "value": 48, "unit": "CELSIUS"},
                {"type": "Fan", "name": "FAN-1", "value": 4200, "unit": "RPM"}
            ]),
            perf: json!([{
                "memoryInUseBytes": 4_294_967_296u64,
                "memoryTotalBytes": 17_179_869_184u64,
                "cpuUsagePercent": 12
            }]),
            host_id: format!("HOST-{serial}"),
            licenses: json!([{
                "partNumber": "930-2151", "activationCode": "AC-1", "quantity": 1,
                "description": "IxNetwork, perpetual", "maintenanceDate": "2025-12-31",
                "expiryDate": "Permanent", "isExpired": false
            }]),
            sessions: json!([
                {"id": 1, "state": "ACTIVE", "applicationType": "ixnrest"},
                {"id": 2, "state": "IN_PROGRESS", "applicationType": "ixnrest"},
                {"id": 3, "state": "STOPPED", "applicationType": "ixnrest"}
            ]),
            log_bundle_url: format!("https://chassis/chassis/api/v2/ixos/logs/{serial}-collected.zip"),
        }
    }

    /// Appliance virtuelle sous Windows (ports sans `linkState`)
    pub fn virtual_appliance() -> Self {
        let mut fixture = Self::healthy("");
        fixture.chassis = json!([{
            "type": "Ixia Virtual Test Appliance",
            "state": "Ready",
            "numberOfPhysicalCards": 1,
            "ixosApplications": []
        }]);
        fixture.ports = json!([{"cardNumber": 1, "portNumber": 1, "owner": ""}]);
        fixture
    }

    pub fn with_state(mut self, state: &str) -> Self {
        if let Some(first) = self.chassis.get_mut(0) {
            first["state"] = json!(state);
        }
        self
    }

    pub fn with_ports(mut self, ports: Value) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_perf(mut self, in_use: u64, total: u64, cpu: f64) -> Self {
        self.perf = json!([{"memoryInUseBytes": in_use, "memoryTotalBytes": total, "cpuUsagePercent": cpu}]);
        self
    }

    pub fn with_sessions(mut self, sessions: Value) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_cards(mut self, cards: Value) -> Self {
        self.cards = cards;
        self
    }
}
