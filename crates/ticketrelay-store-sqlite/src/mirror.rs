//! The generic [`Mirror`] implementation shared by every mirrored table.
//!
//! Each entity describes its table through [`MirrorRow`]; the SQL for get,
//! upsert, delete, soft-delete and list is derived from that description.

use rusqlite::{OptionalExtension as _, Row, params_from_iter, types::Value};
use ticketrelay_core::{
  Error as CoreError, Result as CoreResult,
  entity::{Board, Company, Contact, Member, Mirrored, Ticket, TicketNote, TicketStatus},
  store::Mirror,
};

use crate::{
  encode::{dt_at, now},
  store::SqliteStore,
};

// ─── Table description ───────────────────────────────────────────────────────

/// How a mirrored entity maps onto its table.
///
/// Rows are read as `id, COLUMNS..., updated_on, added_on, deleted`.
pub(crate) trait MirrorRow: Mirrored {
  const TABLE: &'static str;
  /// Data columns, excluding `id` and the bookkeeping columns.
  const COLUMNS: &'static [&'static str];

  /// Values for [`COLUMNS`](Self::COLUMNS), in order.
  fn values(&self) -> Vec<Value>;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Index of the first bookkeeping column for `E`.
fn tail<E: MirrorRow>() -> usize { E::COLUMNS.len() + 1 }

fn select_sql<E: MirrorRow>(filter: &str) -> String {
  format!(
    "SELECT id, {}, updated_on, added_on, deleted FROM {} {filter}",
    E::COLUMNS.join(", "),
    E::TABLE,
  )
}

fn upsert_sql<E: MirrorRow>() -> String {
  let n            = E::COLUMNS.len();
  let placeholders = (2..=n + 1).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
  let now_param    = n + 2;
  let assignments  = E::COLUMNS
    .iter()
    .map(|c| format!("{c} = excluded.{c}"))
    .collect::<Vec<_>>()
    .join(", ");
  let changed      = E::COLUMNS
    .iter()
    .map(|c| format!("{t}.{c} IS NOT excluded.{c}", t = E::TABLE))
    .collect::<Vec<_>>()
    .join(" OR ");

  format!(
    "INSERT INTO {t} (id, {cols}, updated_on, added_on, deleted)
     VALUES (?1, {placeholders}, ?{now_param}, ?{now_param}, 0)
     ON CONFLICT(id) DO UPDATE SET
       {assignments}, updated_on = excluded.updated_on, deleted = 0
     WHERE {t}.deleted = 1 OR {changed}",
    t = E::TABLE,
    cols = E::COLUMNS.join(", "),
  )
}

// ─── Blanket impl ────────────────────────────────────────────────────────────

impl<E: MirrorRow> Mirror<E> for SqliteStore {
  async fn get(&self, id: i64) -> CoreResult<E> {
    let sql = select_sql::<E>("WHERE id = ?1");
    let row = self
      .call(move |conn| Ok(conn.query_row(&sql, [id], E::from_row).optional()?))
      .await?;
    row.ok_or_else(|| CoreError::not_found(E::KIND, id))
  }

  async fn upsert(&self, entity: E) -> CoreResult<E> {
    let id     = entity.id();
    let upsert = upsert_sql::<E>();
    let select = select_sql::<E>("WHERE id = ?1");

    let mut values = Vec::with_capacity(E::COLUMNS.len() + 2);
    values.push(Value::Integer(id));
    values.extend(entity.values());
    values.push(Value::Text(now()));

    let stored = self
      .call(move |conn| {
        let sp = conn.savepoint()?;
        sp.execute(&upsert, params_from_iter(values))?;
        let row = sp.query_row(&select, [id], E::from_row)?;
        sp.commit()?;
        Ok(row)
      })
      .await?;
    Ok(stored)
  }

  async fn delete(&self, id: i64) -> CoreResult<()> {
    let sql     = format!("DELETE FROM {} WHERE id = ?1", E::TABLE);
    let removed = self.call(move |conn| Ok(conn.execute(&sql, [id])?)).await?;
    if removed == 0 {
      return Err(CoreError::not_found(E::KIND, id));
    }
    Ok(())
  }

  async fn soft_delete(&self, id: i64) -> CoreResult<()> {
    let sql = format!(
      "UPDATE {} SET
         updated_on = CASE WHEN deleted = 1 THEN updated_on ELSE ?2 END,
         deleted    = 1
       WHERE id = ?1",
      E::TABLE,
    );
    let at      = now();
    let matched = self
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![id, at])?))
      .await?;
    if matched == 0 {
      return Err(CoreError::not_found(E::KIND, id));
    }
    Ok(())
  }

  async fn list(&self) -> CoreResult<Vec<E>> {
    let sql  = select_sql::<E>("WHERE deleted = 0 ORDER BY id");
    let rows = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], E::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

// ─── Entity tables ───────────────────────────────────────────────────────────

impl MirrorRow for Board {
  const TABLE: &'static str = "boards";
  const COLUMNS: &'static [&'static str] = &["name"];

  fn values(&self) -> Vec<Value> { vec![self.name.clone().into()] }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let t = tail::<Self>();
    Ok(Board {
      id:         row.get(0)?,
      name:       row.get(1)?,
      updated_on: dt_at(row, t)?,
      added_on:   dt_at(row, t + 1)?,
      deleted:    row.get(t + 2)?,
    })
  }
}

impl MirrorRow for Company {
  const TABLE: &'static str = "companies";
  const COLUMNS: &'static [&'static str] = &["name"];

  fn values(&self) -> Vec<Value> { vec![self.name.clone().into()] }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let t = tail::<Self>();
    Ok(Company {
      id:         row.get(0)?,
      name:       row.get(1)?,
      updated_on: dt_at(row, t)?,
      added_on:   dt_at(row, t + 1)?,
      deleted:    row.get(t + 2)?,
    })
  }
}

impl MirrorRow for Contact {
  const TABLE: &'static str = "contacts";
  const COLUMNS: &'static [&'static str] = &["first_name", "last_name", "company_id"];

  fn values(&self) -> Vec<Value> {
    vec![
      self.first_name.clone().into(),
      self.last_name.clone().into(),
      self.company_id.into(),
    ]
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let t = tail::<Self>();
    Ok(Contact {
      id:         row.get(0)?,
      first_name: row.get(1)?,
      last_name:  row.get(2)?,
      company_id: row.get(3)?,
      updated_on: dt_at(row, t)?,
      added_on:   dt_at(row, t + 1)?,
      deleted:    row.get(t + 2)?,
    })
  }
}

impl MirrorRow for Member {
  const TABLE: &'static str = "members";
  const COLUMNS: &'static [&'static str] =
    &["identifier", "first_name", "last_name", "primary_email"];

  fn values(&self) -> Vec<Value> {
    vec![
      self.identifier.clone().into(),
      self.first_name.clone().into(),
      self.last_name.clone().into(),
      self.primary_email.clone().into(),
    ]
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let t = tail::<Self>();
    Ok(Member {
      id:            row.get(0)?,
      identifier:    row.get(1)?,
      first_name:    row.get(2)?,
      last_name:     row.get(3)?,
      primary_email: row.get(4)?,
      updated_on:    dt_at(row, t)?,
      added_on:      dt_at(row, t + 1)?,
      deleted:       row.get(t + 2)?,
    })
  }
}

impl MirrorRow for TicketStatus {
  const TABLE: &'static str = "ticket_statuses";
  const COLUMNS: &'static [&'static str] = &["board_id", "name", "closed", "inactive"];

  fn values(&self) -> Vec<Value> {
    vec![
      self.board_id.into(),
      self.name.clone().into(),
      self.closed.into(),
      self.inactive.into(),
    ]
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let t = tail::<Self>();
    Ok(TicketStatus {
      id:         row.get(0)?,
      board_id:   row.get(1)?,
      name:       row.get(2)?,
      closed:     row.get(3)?,
      inactive:   row.get(4)?,
      updated_on: dt_at(row, t)?,
      added_on:   dt_at(row, t + 1)?,
      deleted:    row.get(t + 2)?,
    })
  }
}

impl MirrorRow for Ticket {
  const TABLE: &'static str = "tickets";
  const COLUMNS: &'static [&'static str] = &[
    "summary",
    "board_id",
    "status_id",
    "owner_id",
    "company_id",
    "contact_id",
    "resources",
    "updated_by",
  ];

  fn values(&self) -> Vec<Value> {
    vec![
      self.summary.clone().into(),
      self.board_id.into(),
      self.status_id.into(),
      self.owner_id.into(),
      self.company_id.into(),
      self.contact_id.into(),
      self.resources.clone().into(),
      self.updated_by.clone().into(),
    ]
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let t = tail::<Self>();
    Ok(Ticket {
      id:         row.get(0)?,
      summary:    row.get(1)?,
      board_id:   row.get(2)?,
      status_id:  row.get(3)?,
      owner_id:   row.get(4)?,
      company_id: row.get(5)?,
      contact_id: row.get(6)?,
      resources:  row.get(7)?,
      updated_by: row.get(8)?,
      updated_on: dt_at(row, t)?,
      added_on:   dt_at(row, t + 1)?,
      deleted:    row.get(t + 2)?,
    })
  }
}

impl MirrorRow for TicketNote {
  const TABLE: &'static str = "ticket_notes";
  const COLUMNS: &'static [&'static str] =
    &["ticket_id", "member_id", "contact_id", "content", "created_by"];

  fn values(&self) -> Vec<Value> {
    vec![
      self.ticket_id.into(),
      self.member_id.into(),
      self.contact_id.into(),
      self.content.clone().into(),
      self.created_by.clone().into(),
    ]
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let t = tail::<Self>();
    Ok(TicketNote {
      id:         row.get(0)?,
      ticket_id:  row.get(1)?,
      member_id:  row.get(2)?,
      contact_id: row.get(3)?,
      content:    row.get(4)?,
      created_by: row.get(5)?,
      updated_on: dt_at(row, t)?,
      added_on:   dt_at(row, t + 1)?,
      deleted:    row.get(t + 2)?,
    })
  }
}
