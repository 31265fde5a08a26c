//! Schéma SQLite, appliqué à l'ouverture (idempotent).

use super::StoreError;
use rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chassis_summary_details (
    chassis_ip          TEXT PRIMARY KEY,
    chassis_serial      TEXT NOT NULL,
    controller_serial   TEXT NOT NULL,
    chassis_type        TEXT NOT NULL,
    physical_cards      TEXT NOT NULL,
    status              TEXT NOT NULL,
    os                  TEXT NOT NULL,
    mem_bytes           TEXT NOT NULL,
    mem_bytes_total     TEXT NOT NULL,
    cpu_percent         TEXT NOT NULL,
    software_versions   TEXT NOT NULL DEFAULT '{}',
    tags                TEXT NOT NULL DEFAULT '',
    last_updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chassis_card_details (
    chassis_ip          TEXT NOT NULL,
    chassis_type        TEXT NOT NULL,
    card_number         TEXT NOT NULL,
    serial_number       TEXT NOT NULL,
    card_type           TEXT NOT NULL,
    card_state          TEXT NOT NULL,
    number_of_ports     TEXT NOT NULL,
    last_updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chassis_port_details (
    chassis_ip                  TEXT NOT NULL,
    chassis_type                TEXT NOT NULL,
    card_number                 TEXT NOT NULL,
    port_number                 TEXT NOT NULL,
    phy_mode                    TEXT NOT NULL,
    link_state                  TEXT NOT NULL,
    transceiver_model           TEXT NOT NULL,
    transceiver_manufacturer    TEXT NOT NULL,
    owner                       TEXT NOT NULL,
    speed                       TEXT NOT NULL,
    port_type                   TEXT NOT NULL,
    transmit_state              TEXT NOT NULL,
    total_ports                 TEXT NOT NULL,
    owned_ports                 TEXT NOT NULL,
    free_ports                  TEXT NOT NULL,
    last_updated_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chassis_sensor_details (
    chassis_ip          TEXT NOT NULL,
    chassis_type        TEXT NOT NULL,
    sensor_type         TEXT NOT NULL,
    sensor_name         TEXT NOT NULL,
    sensor_value        TEXT NOT NULL,
    unit                TEXT NOT NULL,
    last_updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS license_details (
    chassis_ip          TEXT NOT NULL,
    chassis_type        TEXT NOT NULL,
    host_id             TEXT NOT NULL,
    part_number         TEXT NOT NULL,
    activation_code     TEXT NOT NULL,
    quantity            TEXT NOT NULL,
    description         TEXT NOT NULL,
    maintenance_date    TEXT NOT NULL,
    expiry_date         TEXT NOT NULL,
    is_expired          TEXT NOT NULL,
    last_updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chassis_utilization_details (
    chassis_ip          TEXT NOT NULL,
    mem_utilization     REAL NOT NULL,
    cpu_utilization     REAL NOT NULL,
    last_updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_utilization_updated
    ON chassis_utilization_details (last_updated_at);

CREATE TABLE IF NOT EXISTS chassis_credentials (
    ip          TEXT PRIMARY KEY,
    username    TEXT NOT NULL,
    password    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ixnetwork_credentials (
    ip          TEXT PRIMARY KEY,
    username    TEXT NOT NULL,
    password    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ixnetwork_server_details (
    server_ip           TEXT NOT NULL,
    server_type         TEXT NOT NULL,
    sessions            INTEGER NOT NULL,
    running_sessions    INTEGER NOT NULL,
    idle_sessions       INTEGER NOT NULL,
    last_updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chassis_tags (
    ip      TEXT PRIMARY KEY,
    tags    TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS poll_setting (
    id          INTEGER PRIMARY KEY CHECK (id = 1),
    chassis     INTEGER NOT NULL,
    cards       INTEGER NOT NULL,
    ports       INTEGER NOT NULL,
    sensors     INTEGER NOT NULL,
    perf        INTEGER NOT NULL,
    licensing   INTEGER NOT NULL,
    data_purge  INTEGER NOT NULL,
    ixnetwork   INTEGER NOT NULL DEFAULT 120
);
"#;

const TABLES: [&str; 11] = [
    "chassis_summary_details",
    "chassis_card_details",
    "chassis_port_details",
    "chassis_sensor_details",
    "license_details",
    "chassis_utilization_details",
    "chassis_credentials",
    "ixnetwork_credentials",
    "ixnetwork_server_details",
    "chassis_tags",
    "poll_setting",
];

pub fn apply(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Supprime toutes les tables (inventaire, credentials, réglages) et recrée un schéma vide
pub fn reset(conn: &Connection) -> Result<(), StoreError> {
    for table in TABLES {
        conn.execute(&format!("DROP TABLE IF EXISTS {table}"), [])?;
    }
    apply(conn)
}
