/**
 * NORMALISATION - JSON vendor → enregistrements du modèle
 *
 * RÔLE :
 * Transforme les réponses brutes de l'API châssis en lignes prêtes à persister.
 * Toutes les fonctions sont pures : l'IP, le type de châssis et l'horodatage
 * sont fournis par l'appelant (FetchWorker).
 *
 * RÈGLES MÉTIER :
 * - type de châssis : espaces remplacés par `_`, appliance virtuelle → série `IxiaVM`
 * - OS : `Linux` si les ports exposent `linkState`, `Windows` sinon, `NA` si illisible
 * - ports sans owner → `Free` ; `fullyQualifiedPortName` remplace le numéro de port
 * - capteurs : `CELSIUS` → "<valeur> °C", `AMPERSEND` → `AMP`
 * - tailles mémoire affichées en base 1024 (B, KB, MB...)
 * - sessions IxNetwork : ACTIVE/RUNNING/IN_PROGRESS = en cours, le reste = inactives
 */

use crate::client::ClientError;
use crate::models::{
    CardRecord, ChassisStatus, ChassisSummaryRecord, IxNetworkServerRecord, LicenseRecord, PortRecord, SensorRecord,
    UtilizationSample, NA, UNKNOWN,
};
use serde_json::Value;
use std::collections::BTreeMap;

const VIRTUAL_APPLIANCE: &str = "Ixia_Virtual_Test_Appliance";

pub fn chassis_summary(
    chassis_ip: &str,
    chassis: &Value,
    perf: Option<&Value>,
    os: &str,
    at: &str,
) -> Result<ChassisSummaryRecord, ClientError> {
    let data = first(chassis, "chassis")?;
    let chassis_type = data
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::Malformed("chassis without type".into()))?
        .replace(' ', "_");

    let serial_default = if chassis_type == VIRTUAL_APPLIANCE { "IxiaVM" } else { NA };

    let (mem_bytes, mem_bytes_total, cpu_percent) = match perf.and_then(|p| first(p, "perfcounters").ok()) {
        Some(counters) => (
            number(counters, "memoryInUseBytes").map(human_size).unwrap_or_else(|| NA.into()),
            number(counters, "memoryTotalBytes").map(human_size).unwrap_or_else(|| NA.into()),
            text_or(counters, "cpuUsagePercent", NA),
        ),
        None => (NA.into(), NA.into(), NA.into()),
    };

    let mut software_versions = BTreeMap::new();
    if let Some(apps) = data.get("ixosApplications").and_then(Value::as_array) {
        for app in apps {
            if let (Some(name), Some(version)) = (text(app, "name"), text(app, "version")) {
                software_versions.insert(name, version);
            }
        }
    }

    Ok(ChassisSummaryRecord {
        chassis_ip: chassis_ip.to_string(),
        chassis_serial: text_or(data, "serialNumber", serial_default),
        controller_serial: text_or(data, "controllerSerialNumber", NA),
        chassis_type,
        physical_cards: text_or(data, "numberOfPhysicalCards", NA),
        status: ChassisStatus::from(text_or(data, "state", NA)),
        os: os.to_string(),
        mem_bytes,
        mem_bytes_total,
        cpu_percent,
        software_versions,
        tags: Vec::new(),
        last_updated_at: at.to_string(),
    })
}

/// `linkState` n'existe que sur les châssis Linux
pub fn detect_os(ports: &Value) -> &'static str {
    match list(ports, "ports").ok().and_then(|ports| ports.first()) {
        Some(port) if port.get("linkState").is_some() => "Linux",
        Some(_) => "Windows",
        None => NA,
    }
}

pub fn cards(chassis_ip: &str, chassis_type: &str, payload: &Value, at: &str) -> Result<Vec<CardRecord>, ClientError> {
    let mut cards: Vec<&Value> = list(payload, "cards")?.iter().collect();
    cards.sort_by_key(|card| card.get("cardNumber").and_then(Value::as_i64).unwrap_or(i64::MAX));

    Ok(cards
        .into_iter()
        .map(|card| CardRecord {
            chassis_ip: chassis_ip.to_string(),
            chassis_type: chassis_type.to_string(),
            card_number: text_or(card, "cardNumber", NA),
            serial_number: text_or(card, "serialNumber", NA),
            card_type: text_or(card, "type", NA),
            card_state: text_or(card, "state", NA),
            number_of_ports: text_or(card, "numberOfPorts", "No data"),
            last_updated_at: at.to_string(),
        })
        .collect())
}

pub fn ports(chassis_ip: &str, chassis_type: &str, payload: &Value, at: &str) -> Result<Vec<PortRecord>, ClientError> {
    let ports = list(payload, "ports")?;

    let owners: Vec<String> = ports
        .iter()
        .map(|p| text(p, "owner").filter(|o| !o.trim().is_empty()).unwrap_or_else(|| "Free".into()))
        .collect();
    let total = ports.len();
    let owned = owners.iter().filter(|o| o.as_str() != "Free").count();

    Ok(ports
        .iter()
        .zip(owners)
        .map(|(port, owner)| {
            let port_number = text(port, "fullyQualifiedPortName")
                .filter(|name| !name.trim().is_empty() && name != "N/A")
                .unwrap_or_else(|| text_or(port, "portNumber", NA));
            PortRecord {
                chassis_ip: chassis_ip.to_string(),
                chassis_type: chassis_type.to_string(),
                card_number: text_or(port, "cardNumber", NA),
                port_number,
                phy_mode: text_or(port, "phyMode", NA),
                link_state: text_or(port, "linkState", NA),
                transceiver_model: text_or(port, "transceiverModel", NA),
                transceiver_manufacturer: text_or(port, "transceiverManufacturer", NA),
                owner,
                speed: text_or(port, "speed", NA),
                port_type: text_or(port, "type", NA),
                transmit_state: text_or(port, "transmitState", NA),
                total_ports: total.to_string(),
                owned_ports: owned.to_string(),
                free_ports: (total - owned).to_string(),
                last_updated_at: at.to_string(),
            }
        })
        .collect())
}

pub fn licenses(
    chassis_ip: &str,
    chassis_type: &str,
    host_id: &str,
    payload: &Value,
    at: &str,
) -> Result<Vec<LicenseRecord>, ClientError> {
    Ok(list(payload, "licenses")?
        .iter()
        .map(|item| LicenseRecord {
            chassis_ip: chassis_ip.to_string(),
            chassis_type: chassis_type.to_string(),
            host_id: host_id.to_string(),
            part_number: text_or(item, "partNumber", NA),
            activation_code: text_or(item, "activationCode", NA),
            quantity: text_or(item, "quantity", NA),
            description: text_or(item, "description", NA).replace(',', "_"),
            maintenance_date: text_or(item, "maintenanceDate", NA),
            expiry_date: text_or(item, "expiryDate", NA),
            is_expired: text_or(item, "isExpired", NA),
            last_updated_at: at.to_string(),
        })
        .collect())
}

pub fn sensors(chassis_ip: &str, chassis_type: &str, payload: &Value, at: &str) -> Result<Vec<SensorRecord>, ClientError> {
    Ok(list(payload, "sensors")?
        .iter()
        .map(|sensor| {
            let value = text_or(sensor, "value", NA);
            let unit = match text(sensor, "unit").as_deref() {
                Some("CELSIUS") => format!("{value} \u{b0}C"),
                Some("AMPERSEND") => "AMP".to_string(),
                Some(other) => other.to_string(),
                None => NA.to_string(),
            };
            SensorRecord {
                chassis_ip: chassis_ip.to_string(),
                chassis_type: chassis_type.to_string(),
                sensor_type: text_or(sensor, "type", NA),
                sensor_name: text_or(sensor, "name", NA),
                sensor_value: value,
                unit,
                last_updated_at: at.to_string(),
            }
        })
        .collect())
}

pub fn utilization(chassis_ip: &str, perf: &Value, at: &str) -> Result<UtilizationSample, ClientError> {
    let counters = first(perf, "perfcounters")?;
    let used = number(counters, "memoryInUseBytes").unwrap_or(0.0);
    let total = number(counters, "memoryTotalBytes").unwrap_or(0.0);
    let mem_utilization = if total > 0.0 { used / total * 100.0 } else { 0.0 };

    Ok(UtilizationSample {
        chassis_ip: chassis_ip.to_string(),
        mem_utilization,
        cpu_utilization: number(counters, "cpuUsagePercent").unwrap_or(0.0),
        last_updated_at: at.to_string(),
    })
}

pub fn api_server_summary(server_ip: &str, sessions: &Value, at: &str) -> Result<IxNetworkServerRecord, ClientError> {
    let sessions: &[Value] = if sessions.is_null() { &[] } else { list(sessions, "sessions")? };
    if sessions.is_empty() {
        return Ok(IxNetworkServerRecord::unreachable(server_ip, at));
    }

    let mut running = 0;
    let mut server_type = "Linux";
    for session in sessions {
        let state = text_or(session, "state", "").to_uppercase();
        if matches!(state.as_str(), "ACTIVE" | "RUNNING" | "IN_PROGRESS") {
            running += 1;
        }
        let application = text_or(session, "applicationType", "").to_lowercase();
        if application.contains("linux") {
            server_type = "Linux";
        } else if application.contains("windows") {
            server_type = "Windows";
        }
    }

    let total = sessions.len() as u32;
    Ok(IxNetworkServerRecord {
        server_ip: server_ip.to_string(),
        server_type: server_type.to_string(),
        sessions: total,
        running_sessions: running,
        idle_sessions: total - running,
        last_updated_at: at.to_string(),
    })
}

/// Taille lisible en base 1024, deux décimales
pub fn human_size(bytes: f64) -> String {
    const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
    if bytes <= 0.0 {
        return "0B".to_string();
    }
    let exponent = (bytes.ln() / 1024f64.ln()).floor().clamp(0.0, (UNITS.len() - 1) as f64);
    let scaled = bytes / 1024f64.powf(exponent);
    format!("{:.2} {}", scaled, UNITS[exponent as usize])
}

// Les réponses vendor sont soit un tableau, soit un objet `{ "data": [...] }`
fn list<'a>(payload: &'a Value, what: &str) -> Result<&'a Vec<Value>, ClientError> {
    payload
        .as_array()
        .or_else(|| payload.get("data").and_then(Value::as_array))
        .ok_or_else(|| ClientError::Malformed(format!("{what}: expected a list")))
}

fn first<'a>(payload: &'a Value, what: &str) -> Result<&'a Value, ClientError> {
    if payload.is_object() && payload.get("data").is_none() {
        return Ok(payload);
    }
    list(payload, what)?
        .first()
        .ok_or_else(|| ClientError::Malformed(format!("{what}: empty response")))
}

fn text(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or(obj: &Value, key: &str, default: &str) -> String {
    text(obj, key).unwrap_or_else(|| default.to_string())
}

fn number(obj: &Value, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
