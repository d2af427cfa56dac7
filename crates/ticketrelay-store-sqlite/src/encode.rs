//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings with fixed microsecond
//! precision so they sort lexicographically. Recipient kinds are stored as
//! their lowercase names.

use std::str::FromStr as _;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Row, types::Type};
use ticketrelay_core::recipient::RecipientKind;

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now() -> String { encode_dt(Utc::now()) }

fn conversion_failure(
  idx: usize,
  err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Read a required timestamp column.
pub fn dt_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  let raw: String = row.get(idx)?;
  DateTime::parse_from_rfc3339(&raw)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| conversion_failure(idx, e))
}

/// Read a nullable timestamp column.
pub fn opt_dt_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
  let raw: Option<String> = row.get(idx)?;
  raw
    .map(|s| {
      DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_failure(idx, e))
    })
    .transpose()
}

// ─── RecipientKind ───────────────────────────────────────────────────────────

pub fn encode_kind(kind: RecipientKind) -> String { kind.to_string() }

pub fn kind_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<RecipientKind> {
  let raw: String = row.get(idx)?;
  RecipientKind::from_str(&raw).map_err(|e| conversion_failure(idx, e))
}
