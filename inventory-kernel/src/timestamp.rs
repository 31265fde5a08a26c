//! Horodatages persistés : écriture au format SQLite, lecture tolérante.
//!
//! Les lignes historiques ont été écrites avec deux formats différents
//! (`2024-01-01 12:00:00` côté base, `01/15/2024, 12:00:00` côté poller),
//! donc la lecture accepte les deux, plus RFC 3339.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Formate un instant en UTC, `YYYY-MM-DD HH:MM:SS` (tri lexical = tri chronologique)
pub fn format(ts: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    ts.to_offset(UtcOffset::UTC)
        .format(&fmt)
        .unwrap_or_else(|_| "NA".to_string())
}

pub fn now() -> String {
    format(OffsetDateTime::now_utc())
}

/// Parse un horodatage persisté. `None` si aucun format connu ne correspond.
pub fn parse(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    let sqlite = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let vendor = format_description!("[month]/[day]/[year], [hour]:[minute]:[second]");

    if let Ok(ts) = PrimitiveDateTime::parse(raw, &sqlite) {
        return Some(ts.assume_utc());
    }
    if let Ok(ts) = PrimitiveDateTime::parse(raw, &vendor) {
        return Some(ts.assume_utc());
    }
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}
