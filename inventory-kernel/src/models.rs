use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const NOT_REACHABLE: &str = "Not Reachable";
pub const NA: &str = "NA";
pub const UNKNOWN: &str = "Unknown";

/// Catégorie de polling : un domaine de données indépendant, une boucle chacun
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Chassis,
    Cards,
    Ports,
    Licensing,
    Sensors,
    Perf,
    DataPurge,
    /// Serveurs d'API IxNetwork (credentials séparées des châssis)
    #[serde(rename = "ixnetwork")]
    IxNetwork,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Chassis,
        Category::Cards,
        Category::Ports,
        Category::Licensing,
        Category::Sensors,
        Category::Perf,
        Category::DataPurge,
        Category::IxNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chassis => "chassis",
            Self::Cards => "cards",
            Self::Ports => "ports",
            Self::Licensing => "licensing",
            Self::Sensors => "sensors",
            Self::Perf => "perf",
            Self::DataPurge => "data_purge",
            Self::IxNetwork => "ixnetwork",
        }
    }

    /// Valeur d'intervalle utilisée si poll_setting est absent ou invalide
    pub fn default_interval_value(&self) -> u64 {
        match self {
            Self::Chassis => 60,
            Self::Cards => 120,
            Self::Ports => 120,
            Self::Licensing => 300,
            Self::Sensors => 180,
            Self::Perf => 60,
            Self::DataPurge => 1,
            Self::IxNetwork => 120,
        }
    }

    /// Unité de l'intervalle persisté : secondes, sauf data_purge en jours
    pub fn interval_unit(&self) -> Duration {
        match self {
            Self::DataPurge => Duration::from_secs(24 * 60 * 60),
            _ => Duration::from_secs(1),
        }
    }

    pub fn default_interval(&self) -> Duration {
        self.interval_unit() * self.default_interval_value() as u32
    }

    /// data_purge est une maintenance locale, pas un fetch vendor
    pub fn fetches_from_chassis(&self) -> bool {
        !matches!(self, Self::DataPurge)
    }

    /// Catégories dont les appels vendor passent par une opération asynchrone (HTTP 202)
    pub fn uses_async_operations(&self) -> bool {
        matches!(self, Self::Licensing)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == value)
            .ok_or_else(|| format!("unknown category: {value}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisCredential {
    pub ip: String,
    pub username: String,
    pub password: String,
}

/// Statut d'un châssis tel que rapporté par le vendor (`state`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChassisStatus {
    Ready,
    NotReachable,
    Other(String),
}

impl ChassisStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "Ready",
            Self::NotReachable => NOT_REACHABLE,
            Self::Other(s) => s,
        }
    }

    pub fn is_healthy(&self) -> bool {
        !matches!(self, Self::NotReachable)
    }
}

impl From<String> for ChassisStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Ready" => Self::Ready,
            NOT_REACHABLE => Self::NotReachable,
            _ => Self::Other(value),
        }
    }
}

impl From<ChassisStatus> for String {
    fn from(value: ChassisStatus) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChassisSummaryRecord {
    pub chassis_ip: String,
    pub chassis_serial: String,
    pub controller_serial: String,
    pub chassis_type: String,
    pub physical_cards: String,
    pub status: ChassisStatus,
    pub os: String,
    pub mem_bytes: String,
    pub mem_bytes_total: String,
    pub cpu_percent: String,
    pub software_versions: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub last_updated_at: String,
}

impl ChassisSummaryRecord {
    /// Ligne sentinelle écrite quand le châssis n'a pas répondu
    pub fn unreachable(chassis_ip: &str, at: &str) -> Self {
        Self {
            chassis_ip: chassis_ip.to_string(),
            chassis_serial: NA.into(),
            controller_serial: NA.into(),
            chassis_type: NA.into(),
            physical_cards: NA.into(),
            status: ChassisStatus::NotReachable,
            os: NA.into(),
            mem_bytes: NA.into(),
            mem_bytes_total: NA.into(),
            cpu_percent: NA.into(),
            software_versions: BTreeMap::new(),
            tags: Vec::new(),
            last_updated_at: at.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub chassis_ip: String,
    pub chassis_type: String,
    pub card_number: String,
    pub serial_number: String,
    pub card_type: String,
    pub card_state: String,
    pub number_of_ports: String,
    pub last_updated_at: String,
}

impl CardRecord {
    pub fn unreachable(chassis_ip: &str, at: &str) -> Self {
        Self {
            chassis_ip: chassis_ip.to_string(),
            chassis_type: NA.into(),
            card_number: NA.into(),
            serial_number: NA.into(),
            card_type: NA.into(),
            card_state: NA.into(),
            number_of_ports: NA.into(),
            last_updated_at: at.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRecord {
    pub chassis_ip: String,
    pub chassis_type: String,
    pub card_number: String,
    pub port_number: String,
    pub phy_mode: String,
    pub link_state: String,
    pub transceiver_model: String,
    pub transceiver_manufacturer: String,
    pub owner: String,
    pub speed: String,
    #[serde(rename = "type")]
    pub port_type: String,
    pub transmit_state: String,
    pub total_ports: String,
    pub owned_ports: String,
    pub free_ports: String,
    pub last_updated_at: String,
}

impl PortRecord {
    pub fn unreachable(chassis_ip: &str, at: &str) -> Self {
        Self {
            chassis_ip: chassis_ip.to_string(),
            chassis_type: NA.into(),
            card_number: NA.into(),
            port_number: NA.into(),
            phy_mode: NA.into(),
            link_state: NA.into(),
            transceiver_model: NA.into(),
            transceiver_manufacturer: NA.into(),
            owner: NA.into(),
            speed: NA.into(),
            port_type: NA.into(),
            transmit_state: NA.into(),
            total_ports: NA.into(),
            owned_ports: NA.into(),
            free_ports: NA.into(),
            last_updated_at: at.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    pub chassis_ip: String,
    pub chassis_type: String,
    pub sensor_type: String,
    pub sensor_name: String,
    pub sensor_value: String,
    pub unit: String,
    pub last_updated_at: String,
}

impl SensorRecord {
    pub fn unreachable(chassis_ip: &str, at: &str) -> Self {
        Self {
            chassis_ip: chassis_ip.to_string(),
            chassis_type: NA.into(),
            sensor_type: NA.into(),
            sensor_name: NA.into(),
            sensor_value: NA.into(),
            unit: NA.into(),
            last_updated_at: at.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    pub chassis_ip: String,
    pub chassis_type: String,
    pub host_id: String,
    pub part_number: String,
    pub activation_code: String,
    pub quantity: String,
    pub description: String,
    pub maintenance_date: String,
    pub expiry_date: String,
    pub is_expired: String,
    pub last_updated_at: String,
}

impl LicenseRecord {
    pub fn unreachable(chassis_ip: &str, at: &str) -> Self {
        Self {
            chassis_ip: chassis_ip.to_string(),
            chassis_type: NA.into(),
            host_id: NA.into(),
            part_number: NA.into(),
            activation_code: NA.into(),
            quantity: NA.into(),
            description: NA.into(),
            maintenance_date: NA.into(),
            expiry_date: NA.into(),
            is_expired: NA.into(),
            last_updated_at: at.to_string(),
        }
    }
}

/// Échantillon de la série temporelle d'utilisation (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationSample {
    pub chassis_ip: String,
    pub mem_utilization: f64,
    pub cpu_utilization: f64,
    pub last_updated_at: String,
}

impl UtilizationSample {
    pub fn unreachable(chassis_ip: &str, at: &str) -> Self {
        Self {
            chassis_ip: chassis_ip.to_string(),
            mem_utilization: 0.0,
            cpu_utilization: 0.0,
            last_updated_at: at.to_string(),
        }
    }
}

/// Résumé des sessions d'un serveur d'API IxNetwork
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IxNetworkServerRecord {
    pub server_ip: String,
    pub server_type: String,
    pub sessions: u32,
    pub running_sessions: u32,
    pub idle_sessions: u32,
    pub last_updated_at: String,
}

impl IxNetworkServerRecord {
    pub fn unreachable(server_ip: &str, at: &str) -> Self {
        Self {
            server_ip: server_ip.to_string(),
            server_type: UNKNOWN.into(),
            sessions: 0,
            running_sessions: 0,
            idle_sessions: 0,
            last_updated_at: at.to_string(),
        }
    }
}

/// Intervalles de polling (ligne singleton, remplacée en bloc)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSetting {
    pub chassis: i64,
    pub cards: i64,
    pub ports: i64,
    pub sensors: i64,
    pub perf: i64,
    pub licensing: i64,
    pub data_purge: i64,
    #[serde(default = "default_ixnetwork_interval")]
    pub ixnetwork: i64,
}

fn default_ixnetwork_interval() -> i64 {
    Category::IxNetwork.default_interval_value() as i64
}

impl Default for PollSetting {
    fn default() -> Self {
        let v = |c: Category| c.default_interval_value() as i64;
        Self {
            chassis: v(Category::Chassis),
            cards: v(Category::Cards),
            ports: v(Category::Ports),
            sensors: v(Category::Sensors),
            perf: v(Category::Perf),
            licensing: v(Category::Licensing),
            data_purge: v(Category::DataPurge),
            ixnetwork: v(Category::IxNetwork),
        }
    }
}

impl PollSetting {
    pub fn raw(&self, category: Category) -> i64 {
        match category {
            Category::Chassis => self.chassis,
            Category::Cards => self.cards,
            Category::Ports => self.ports,
            Category::Licensing => self.licensing,
            Category::Sensors => self.sensors,
            Category::Perf => self.perf,
            Category::DataPurge => self.data_purge,
            Category::IxNetwork => self.ixnetwork,
        }
    }

    /// Intervalle effectif ; `None` si la valeur persistée est inutilisable (<= 0)
    pub fn interval(&self, category: Category) -> Option<Duration> {
        let raw = self.raw(category);
        if raw <= 0 {
            return None;
        }
        category.interval_unit().checked_mul(u32::try_from(raw).ok()?)
    }

    pub fn validate(&self) -> Result<(), String> {
        for category in Category::ALL {
            if self.raw(category) < 1 {
                return Err(format!("{} interval must be >= 1", category));
            }
        }
        Ok(())
    }
}
