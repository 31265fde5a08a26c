//! Configuration persistée : credentials (châssis et serveurs IxNetwork),
//! intervalles de polling, tags utilisateur.

use super::StoreError;
use crate::credentials::{CredentialAction, CredentialOp, CredentialReport};
use crate::models::{Category, ChassisCredential, PollSetting};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Équipements dont on garde les credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScope {
    Chassis,
    IxNetwork,
}

impl CredentialScope {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::IxNetwork => Self::IxNetwork,
            _ => Self::Chassis,
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Self::Chassis => "chassis_credentials",
            Self::IxNetwork => "ixnetwork_credentials",
        }
    }
}

/// Credentials dans l'ordre d'ajout (ordre de fan-out du collecteur)
pub fn read_credentials(conn: &Connection, scope: CredentialScope) -> Result<Vec<ChassisCredential>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT ip, username, password FROM {} ORDER BY rowid", scope.table()))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ChassisCredential { ip: row.get(0)?, username: row.get(1)?, password: row.get(2)? })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn apply_credentials(
    conn: &Connection,
    scope: CredentialScope,
    ops: &[CredentialOp],
) -> Result<CredentialReport, StoreError> {
    let table = scope.table();
    let mut report = CredentialReport::default();

    for op in ops {
        let c = &op.credential;
        let changed = match op.action {
            CredentialAction::Add => conn.execute(
                &format!("INSERT OR IGNORE INTO {table} (ip, username, password) VALUES (?1, ?2, ?3)"),
                params![c.ip, c.username, c.password],
            )?,
            CredentialAction::Update => conn.execute(
                &format!("UPDATE {table} SET username = ?2, password = ?3 WHERE ip = ?1"),
                params![c.ip, c.username, c.password],
            )?,
            CredentialAction::Delete => conn.execute(&format!("DELETE FROM {table} WHERE ip = ?1"), [&c.ip])?,
        };

        match (op.action, changed) {
            (_, 0) => report.ignored += 1,
            (CredentialAction::Add, _) => report.added += 1,
            (CredentialAction::Update, _) => report.updated += 1,
            (CredentialAction::Delete, _) => report.deleted += 1,
        }
    }

    Ok(report)
}

pub fn read_poll_setting(conn: &Connection) -> Result<Option<PollSetting>, StoreError> {
    let setting = conn
        .query_row(
            "SELECT chassis, cards, ports, sensors, perf, licensing, data_purge, ixnetwork FROM poll_setting WHERE id = 1",
            [],
            |row| {
                Ok(PollSetting {
                    chassis: row.get(0)?,
                    cards: row.get(1)?,
                    ports: row.get(2)?,
                    sensors: row.get(3)?,
                    perf: row.get(4)?,
                    licensing: row.get(5)?,
                    data_purge: row.get(6)?,
                    ixnetwork: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(setting)
}

/// Remplace la ligne singleton ; chaque intervalle doit être >= 1
pub fn write_poll_setting(conn: &Connection, setting: &PollSetting) -> Result<(), StoreError> {
    setting.validate().map_err(StoreError::Validation)?;
    conn.execute(
        "INSERT OR REPLACE INTO poll_setting (id, chassis, cards, ports, sensors, perf, licensing, data_purge, ixnetwork)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            setting.chassis,
            setting.cards,
            setting.ports,
            setting.sensors,
            setting.perf,
            setting.licensing,
            setting.data_purge,
            setting.ixnetwork
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOperation {
    Add,
    Remove,
}

pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

pub fn read_tags(conn: &Connection) -> Result<HashMap<String, Vec<String>>, StoreError> {
    let mut stmt = conn.prepare("SELECT ip, tags FROM chassis_tags")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, split_tags(&row.get::<_, String>(1)?))))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

/// Ajoute ou retire des tags d'une IP (ensemble ordonné, sans doublon) et
/// répercute le résultat sur la ligne summary dans la même transaction.
pub fn update_tags(
    conn: &Connection,
    ip: &str,
    tags: &[String],
    operation: TagOperation,
) -> Result<Vec<String>, StoreError> {
    if ip.trim().is_empty() {
        return Err(StoreError::Validation("ip must not be empty".into()));
    }

    let current: Vec<String> = conn
        .query_row("SELECT tags FROM chassis_tags WHERE ip = ?1", [ip], |row| row.get::<_, String>(0))
        .optional()?
        .map(|raw| split_tags(&raw))
        .unwrap_or_default();

    let updated: Vec<String> = match operation {
        TagOperation::Add => {
            let mut merged = current;
            for tag in tags {
                if !merged.contains(tag) {
                    merged.push(tag.clone());
                }
            }
            merged
        }
        TagOperation::Remove => current.into_iter().filter(|t| !tags.contains(t)).collect(),
    };

    let joined = join_tags(&updated);
    conn.execute(
        "INSERT INTO chassis_tags (ip, tags) VALUES (?1, ?2)
         ON CONFLICT(ip) DO UPDATE SET tags = excluded.tags",
        params![ip, joined],
    )?;
    conn.execute("UPDATE chassis_summary_details SET tags = ?2 WHERE chassis_ip = ?1", params![ip, joined])?;
    Ok(updated)
}
