//! Tables d'inventaire : summary (réconcilié), tables multi-lignes (remplacées
//! à chaque cycle) et série d'utilisation (append-only, purgée par moitié).
//!
//! Les fonctions prennent une `&Connection` : elles s'utilisent aussi bien dans
//! `Store::write` (la transaction déréférence vers la connexion) que dans `Store::read`.

use super::settings::{join_tags, read_tags, split_tags};
use super::StoreError;
use crate::models::{
    CardRecord, ChassisStatus, ChassisSummaryRecord, IxNetworkServerRecord, LicenseRecord, PortRecord, SensorRecord,
    UtilizationSample,
};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Ligne d'une table d'inventaire : nom de table, colonnes, conversions
pub trait TableRow: Sized {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    /// Colonne utilisée par le filtre `?ip=`
    const IP_COLUMN: &'static str = "chassis_ip";

    /// Valeurs dans l'ordre de `COLUMNS`
    fn values(&self) -> Vec<&dyn ToSql>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl TableRow for CardRecord {
    const TABLE: &'static str = "chassis_card_details";
    const COLUMNS: &'static [&'static str] = &[
        "chassis_ip",
        "chassis_type",
        "card_number",
        "serial_number",
        "card_type",
        "card_state",
        "number_of_ports",
        "last_updated_at",
    ];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.chassis_ip,
            &self.chassis_type,
            &self.card_number,
            &self.serial_number,
            &self.card_type,
            &self.card_state,
            &self.number_of_ports,
            &self.last_updated_at,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chassis_ip: row.get(0)?,
            chassis_type: row.get(1)?,
            card_number: row.get(2)?,
            serial_number: row.get(3)?,
            card_type: row.get(4)?,
            card_state: row.get(5)?,
            number_of_ports: row.get(6)?,
            last_updated_at: row.get(7)?,
        })
    }
}

impl TableRow for PortRecord {
    const TABLE: &'static str = "chassis_port_details";
    const COLUMNS: &'static [&'static str] = &[
        "chassis_ip",
        "chassis_type",
        "card_number",
        "port_number",
        "phy_mode",
        "link_state",
        "transceiver_model",
        "transceiver_manufacturer",
        "owner",
        "speed",
        "port_type",
        "transmit_state",
        "total_ports",
        "owned_ports",
        "free_ports",
        "last_updated_at",
    ];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.chassis_ip,
            &self.chassis_type,
            &self.card_number,
            &self.port_number,
            &self.phy_mode,
            &self.link_state,
            &self.transceiver_model,
            &self.transceiver_manufacturer,
            &self.owner,
            &self.speed,
            &self.port_type,
            &self.transmit_state,
            &self.total_ports,
            &self.owned_ports,
            &self.free_ports,
            &self.last_updated_at,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chassis_ip: row.get(0)?,
            chassis_type: row.get(1)?,
            card_number: row.get(2)?,
            port_number: row.get(3)?,
            phy_mode: row.get(4)?,
            link_state: row.get(5)?,
            transceiver_model: row.get(6)?,
            transceiver_manufacturer: row.get(7)?,
            owner: row.get(8)?,
            speed: row.get(9)?,
            port_type: row.get(10)?,
            transmit_state: row.get(11)?,
            total_ports: row.get(12)?,
            owned_ports: row.get(13)?,
            free_ports: row.get(14)?,
            last_updated_at: row.get(15)?,
        })
    }
}

impl TableRow for SensorRecord {
    const TABLE: &'static str = "chassis_sensor_details";
    const COLUMNS: &'static [&'static str] =
        &["chassis_ip", "chassis_type", "sensor_type", "sensor_name", "sensor_value", "unit", "last_updated_at"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.chassis_ip,
            &self.chassis_type,
            &self.sensor_type,
            &self.sensor_name,
            &self.sensor_value,
            &self.unit,
            &self.last_updated_at,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chassis_ip: row.get(0)?,
            chassis_type: row.get(1)?,
            sensor_type: row.get(2)?,
            sensor_name: row.get(3)?,
            sensor_value: row.get(4)?,
            unit: row.get(5)?,
            last_updated_at: row.get(6)?,
        })
    }
}

impl TableRow for LicenseRecord {
    const TABLE: &'static str = "license_details";
    const COLUMNS: &'static [&'static str] = &[
        "chassis_ip",
        "chassis_type",
        "host_id",
        "part_number",
        "activation_code",
        "quantity",
        "description",
        "maintenance_date",
        "expiry_date",
        "is_expired",
        "last_updated_at",
    ];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.chassis_ip,
            &self.chassis_type,
            &self.host_id,
            &self.part_number,
            &self.activation_code,
            &self.quantity,
            &self.description,
            &self.maintenance_date,
            &self.expiry_date,
            &self.is_expired,
            &self.last_updated_at,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chassis_ip: row.get(0)?,
            chassis_type: row.get(1)?,
            host_id: row.get(2)?,
            part_number: row.get(3)?,
            activation_code: row.get(4)?,
            quantity: row.get(5)?,
            description: row.get(6)?,
            maintenance_date: row.get(7)?,
            expiry_date: row.get(8)?,
            is_expired: row.get(9)?,
            last_updated_at: row.get(10)?,
        })
    }
}

impl TableRow for UtilizationSample {
    const TABLE: &'static str = "chassis_utilization_details";
    const COLUMNS: &'static [&'static str] = &["chassis_ip", "mem_utilization", "cpu_utilization", "last_updated_at"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.chassis_ip, &self.mem_utilization, &self.cpu_utilization, &self.last_updated_at]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chassis_ip: row.get(0)?,
            mem_utilization: row.get(1)?,
            cpu_utilization: row.get(2)?,
            last_updated_at: row.get(3)?,
        })
    }
}

impl TableRow for IxNetworkServerRecord {
    const TABLE: &'static str = "ixnetwork_server_details";
    const COLUMNS: &'static [&'static str] =
        &["server_ip", "server_type", "sessions", "running_sessions", "idle_sessions", "last_updated_at"];
    const IP_COLUMN: &'static str = "server_ip";

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.server_ip,
            &self.server_type,
            &self.sessions,
            &self.running_sessions,
            &self.idle_sessions,
            &self.last_updated_at,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            server_ip: row.get(0)?,
            server_type: row.get(1)?,
            sessions: row.get(2)?,
            running_sessions: row.get(3)?,
            idle_sessions: row.get(4)?,
            last_updated_at: row.get(5)?,
        })
    }
}

fn insert_rows<R: TableRow>(conn: &Connection, rows: &[R]) -> Result<usize, StoreError> {
    let placeholders = vec!["?"; R::COLUMNS.len()].join(", ");
    let sql = format!("INSERT INTO {} ({}) VALUES ({})", R::TABLE, R::COLUMNS.join(", "), placeholders);
    let mut stmt = conn.prepare_cached(&sql)?;
    for row in rows {
        stmt.execute(row.values().as_slice())?;
    }
    Ok(rows.len())
}

/// Remplace tout le contenu de la table (catégories multi-lignes)
pub fn replace_rows<R: TableRow>(conn: &Connection, rows: &[R]) -> Result<usize, StoreError> {
    conn.execute(&format!("DELETE FROM {}", R::TABLE), [])?;
    insert_rows(conn, rows)
}

/// Lignes dans l'ordre d'insertion, éventuellement filtrées par IP
pub fn read_rows<R: TableRow>(conn: &Connection, chassis_ip: Option<&str>) -> Result<Vec<R>, StoreError> {
    let mut sql = format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::TABLE);
    if chassis_ip.is_some() {
        sql.push_str(&format!(" WHERE {} = ?1", R::IP_COLUMN));
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = match chassis_ip {
        Some(ip) => stmt.query_map([ip], R::from_row)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], R::from_row)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

// ============================================================================
// Summary
// ============================================================================

const SUMMARY_COLUMNS: &str = "chassis_ip, chassis_serial, controller_serial, chassis_type, physical_cards, status, \
     os, mem_bytes, mem_bytes_total, cpu_percent, software_versions, tags, last_updated_at";

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<ChassisSummaryRecord> {
    let versions: String = row.get(10)?;
    let software_versions: BTreeMap<String, String> = serde_json::from_str(&versions)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;
    let tags: String = row.get(11)?;

    Ok(ChassisSummaryRecord {
        chassis_ip: row.get(0)?,
        chassis_serial: row.get(1)?,
        controller_serial: row.get(2)?,
        chassis_type: row.get(3)?,
        physical_cards: row.get(4)?,
        status: ChassisStatus::from(row.get::<_, String>(5)?),
        os: row.get(6)?,
        mem_bytes: row.get(7)?,
        mem_bytes_total: row.get(8)?,
        cpu_percent: row.get(9)?,
        software_versions,
        tags: split_tags(&tags),
        last_updated_at: row.get(12)?,
    })
}

pub fn read_summary(conn: &Connection) -> Result<Vec<ChassisSummaryRecord>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {SUMMARY_COLUMNS} FROM chassis_summary_details ORDER BY chassis_ip"))?;
    let rows = stmt.query_map([], summary_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn read_summary_by_ip(conn: &Connection, chassis_ip: &str) -> Result<Option<ChassisSummaryRecord>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {SUMMARY_COLUMNS} FROM chassis_summary_details WHERE chassis_ip = ?1"),
            [chassis_ip],
            summary_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn read_summary_map(conn: &Connection) -> Result<HashMap<String, ChassisSummaryRecord>, StoreError> {
    Ok(read_summary(conn)?.into_iter().map(|r| (r.chassis_ip.clone(), r)).collect())
}

/// Type de châssis connu par IP, pour étiqueter les catégories multi-lignes
pub fn chassis_types(conn: &Connection) -> Result<HashMap<String, String>, StoreError> {
    let mut stmt = conn.prepare("SELECT chassis_ip, chassis_type FROM chassis_summary_details")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryWrite {
    pub written: usize,
    pub pruned: usize,
}

/// Supprime puis réinsère uniquement les IPs du write-set, fusionne les tags
/// utilisateur, puis retire les lignes des IPs qui ne sont plus configurées.
pub fn replace_summary(
    conn: &Connection,
    rows: &[ChassisSummaryRecord],
    configured_ips: &[String],
) -> Result<SummaryWrite, StoreError> {
    let tags = read_tags(conn)?;
    let mut delete = conn.prepare_cached("DELETE FROM chassis_summary_details WHERE chassis_ip = ?1")?;
    let mut insert = conn.prepare_cached(&format!(
        "INSERT INTO chassis_summary_details ({SUMMARY_COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
    ))?;

    for row in rows {
        let versions = serde_json::to_string(&row.software_versions)?;
        let row_tags = tags.get(&row.chassis_ip).map(|t| join_tags(t)).unwrap_or_default();
        delete.execute([&row.chassis_ip])?;
        insert.execute(params![
            row.chassis_ip,
            row.chassis_serial,
            row.controller_serial,
            row.chassis_type,
            row.physical_cards,
            row.status.as_str(),
            row.os,
            row.mem_bytes,
            row.mem_bytes_total,
            row.cpu_percent,
            versions,
            row_tags,
            row.last_updated_at,
        ])?;
    }

    let configured: HashSet<&str> = configured_ips.iter().map(String::as_str).collect();
    let stale: Vec<String> = {
        let mut stmt = conn.prepare("SELECT chassis_ip FROM chassis_summary_details")?;
        let ips = stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<Result<Vec<_>, _>>()?;
        ips.into_iter().filter(|ip| !configured.contains(ip.as_str())).collect()
    };
    for ip in &stale {
        delete.execute([ip])?;
    }

    Ok(SummaryWrite { written: rows.len(), pruned: stale.len() })
}

// ============================================================================
// Utilisation
// ============================================================================

pub fn append_utilization(conn: &Connection, samples: &[UtilizationSample]) -> Result<usize, StoreError> {
    insert_rows(conn, samples)
}

/// Série chronologique, éventuellement restreinte à un châssis
pub fn read_utilization(conn: &Connection, chassis_ip: Option<&str>) -> Result<Vec<UtilizationSample>, StoreError> {
    let mut samples: Vec<UtilizationSample> = read_rows(conn, chassis_ip)?;
    samples.sort_by(|a, b| a.last_updated_at.cmp(&b.last_updated_at));
    Ok(samples)
}

/// Supprime les floor(N/2) échantillons les plus anciens
pub fn purge_utilization(conn: &Connection) -> Result<usize, StoreError> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM chassis_utilization_details", [], |r| r.get(0))?;
    let to_delete = total / 2;
    if to_delete == 0 {
        return Ok(0);
    }
    let deleted = conn.execute(
        "DELETE FROM chassis_utilization_details WHERE rowid IN (
            SELECT rowid FROM chassis_utilization_details
            ORDER BY last_updated_at ASC, rowid ASC
            LIMIT ?1
        )",
        [to_delete],
    )?;
    Ok(deleted)
}
