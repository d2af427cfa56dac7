//! [`SqliteStore`]: the SQLite implementation of [`Store`].

use std::{
  path::Path,
  sync::{
    Arc, Mutex as StdMutex, PoisonError,
    atomic::{AtomicBool, Ordering},
  },
  time::Instant,
};

use rusqlite::{OptionalExtension as _, Row};
use tokio::sync::{Mutex, OwnedMutexGuard};
use ticketrelay_core::{
  Error as CoreError, Result as CoreResult,
  config::Config,
  entity::Member,
  notifier::{
    NewForward, NewNotification, NewRule, NotifierForward, NotifierRule, TicketNotification,
  },
  recipient::{ChatRecipient, NewRecipient, RecipientKind},
  store::{Store, Transaction},
};

use crate::{
  Error, Result,
  encode::{dt_at, encode_dt, encode_kind, kind_at, now, opt_dt_at},
  mirror::MirrorRow as _,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The relay's entity store backed by a single SQLite connection.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one gate: a transaction holds it from `BEGIN` to `COMMIT`, and
/// auto-commit calls take it for their own duration, so they never observe
/// or interleave with an open transaction.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  scope: Scope,
}

#[derive(Clone)]
enum Scope {
  Auto(Arc<Mutex<()>>),
  Tx(Arc<TxState>),
}

struct TxState {
  open:  AtomicBool,
  guard: StdMutex<Option<OwnedMutexGuard<()>>>,
}

impl TxState {
  fn release(&self) {
    let guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner).take();
    drop(guard);
  }

  fn take_guard(&self) -> Option<OwnedMutexGuard<()>> {
    self.guard.lock().unwrap_or_else(PoisonError::into_inner).take()
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, scope: Scope::Auto(Arc::new(Mutex::new(()))) })
  }

  /// Run `f` on the connection thread within this handle's scope.
  pub(crate) async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    match &self.scope {
      Scope::Auto(gate) => {
        let _gate = gate.lock().await;
        Ok(self.conn.call(f).await?)
      }
      Scope::Tx(state) => {
        if !state.open.load(Ordering::Acquire) {
          return Err(Error::TxClosed);
        }
        Ok(self.conn.call(f).await?)
      }
    }
  }

  async fn exists(&self, sql: &'static str, id: i64) -> Result<bool> {
    self
      .call(move |conn| Ok(conn.query_row(sql, [id], |r| r.get::<_, bool>(0))?))
      .await
  }
}

// ─── Transactions ────────────────────────────────────────────────────────────

/// An open `BEGIN IMMEDIATE` transaction on a [`SqliteStore`].
///
/// Dropping it without calling [`Transaction::commit`] schedules a
/// `ROLLBACK` and then releases the store gate.
pub struct SqliteTx {
  conn:  tokio_rusqlite::Connection,
  state: Arc<TxState>,
}

impl SqliteTx {
  async fn finish(&self, sql: &'static str) -> Result<()> {
    self.state.open.store(false, Ordering::Release);
    let result = self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await;

    if result.is_err() && sql == "COMMIT" {
      let _ = self
        .conn
        .call(|conn| {
          conn.execute_batch("ROLLBACK")?;
          Ok(())
        })
        .await;
    }

    self.state.release();
    Ok(result?)
  }
}

impl Transaction for SqliteTx {
  async fn commit(self) -> CoreResult<()> {
    Ok(self.finish("COMMIT").await?)
  }

  async fn rollback(self) -> CoreResult<()> {
    Ok(self.finish("ROLLBACK").await?)
  }
}

impl Drop for SqliteTx {
  fn drop(&mut self) {
    if !self.state.open.swap(false, Ordering::AcqRel) {
      return;
    }
    let guard = self.state.take_guard();
    let conn  = self.conn.clone();

    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(async move {
          let rolled_back = conn
            .call(|conn| {
              conn.execute_batch("ROLLBACK")?;
              Ok(())
            })
            .await;
          if let Err(e) = rolled_back {
            tracing::warn!(error = %e, "rollback of abandoned transaction failed");
          }
          drop(guard);
        });
      }
      Err(_) => tracing::warn!("transaction dropped outside a runtime; rollback skipped"),
    }
  }
}

// ─── Row mapping ─────────────────────────────────────────────────────────────

const RECIPIENT_COLUMNS: &str =
  "id, external_id, name, email, kind, last_activity, created_on, updated_on";

fn recipient_from_row(row: &Row<'_>) -> rusqlite::Result<ChatRecipient> {
  Ok(ChatRecipient {
    id:            row.get(0)?,
    external_id:   row.get(1)?,
    name:          row.get(2)?,
    email:         row.get(3)?,
    kind:          kind_at(row, 4)?,
    last_activity: dt_at(row, 5)?,
    created_on:    dt_at(row, 6)?,
    updated_on:    dt_at(row, 7)?,
  })
}

const RULE_COLUMNS: &str = "id, board_id, recipient_id, notify_enabled, created_on";

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<NotifierRule> {
  Ok(NotifierRule {
    id:             row.get(0)?,
    board_id:       row.get(1)?,
    recipient_id:   row.get(2)?,
    notify_enabled: row.get(3)?,
    created_on:     dt_at(row, 4)?,
  })
}

const FORWARD_COLUMNS: &str = "id, source_recipient_id, dest_recipient_id, start_date, \
                               end_date, enabled, user_keeps_copy, created_on, updated_on";

fn forward_from_row(row: &Row<'_>) -> rusqlite::Result<NotifierForward> {
  Ok(NotifierForward {
    id:                  row.get(0)?,
    source_recipient_id: row.get(1)?,
    dest_recipient_id:   row.get(2)?,
    start_date:          opt_dt_at(row, 3)?,
    end_date:            opt_dt_at(row, 4)?,
    enabled:             row.get(5)?,
    user_keeps_copy:     row.get(6)?,
    created_on:          dt_at(row, 7)?,
    updated_on:          dt_at(row, 8)?,
  })
}

const NOTIFICATION_COLUMNS: &str = "id, ticket_id, ticket_note_id, recipient_id, \
                                    forwarded_from_id, sent, skipped, created_on, updated_on";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<TicketNotification> {
  Ok(TicketNotification {
    id:                row.get(0)?,
    ticket_id:         row.get(1)?,
    ticket_note_id:    row.get(2)?,
    recipient_id:      row.get(3)?,
    forwarded_from_id: row.get(4)?,
    sent:              row.get(5)?,
    skipped:           row.get(6)?,
    created_on:        dt_at(row, 7)?,
    updated_on:        dt_at(row, 8)?,
  })
}

fn width_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
  let raw: i64 = row.get(idx)?;
  usize::try_from(raw).map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
  })
}

fn config_from_row(row: &Row<'_>) -> rusqlite::Result<Config> {
  Ok(Config {
    attempt_notify:       row.get(0)?,
    max_message_length:   width_at(row, 1)?,
    max_concurrent_syncs: width_at(row, 2)?,
    skip_launch_syncs:    row.get(3)?,
  })
}

fn width(value: usize) -> i64 { i64::try_from(value).unwrap_or(i64::MAX) }

fn validate_forward(input: &NewForward) -> CoreResult<()> {
  if let (Some(start), Some(end)) = (input.start_date, input.end_date)
    && end <= start
  {
    return Err(CoreError::InvalidInput("forward end_date must be after start_date".into()));
  }
  Ok(())
}

// ─── Store impl ──────────────────────────────────────────────────────────────

impl Store for SqliteStore {
  type Tx = SqliteTx;

  // ── Transactions ──────────────────────────────────────────────────────────

  async fn begin(&self) -> CoreResult<SqliteTx> {
    let Scope::Auto(gate) = &self.scope else {
      return Err(Error::NestedTx.into());
    };
    let queued = Instant::now();
    let guard  = gate.clone().lock_owned().await;
    let waited = queued.elapsed().as_millis() as u64;
    tracing::debug!(waited_ms = waited, "transaction gate acquired");

    // Built before BEGIN is queued so a cancelled `begin` still rolls back.
    let tx = SqliteTx {
      conn:  self.conn.clone(),
      state: Arc::new(TxState {
        open:  AtomicBool::new(true),
        guard: StdMutex::new(Some(guard)),
      }),
    };

    let begun = tx
      .conn
      .call(|conn| {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
      })
      .await;

    if let Err(e) = begun {
      tx.state.open.store(false, Ordering::Release);
      tx.state.release();
      return Err(Error::from(e).into());
    }
    Ok(tx)
  }

  fn with_tx(&self, tx: &SqliteTx) -> Self {
    Self { conn: tx.conn.clone(), scope: Scope::Tx(tx.state.clone()) }
  }

  // ── Members ───────────────────────────────────────────────────────────────

  async fn member_by_identifier(&self, identifier: &str) -> CoreResult<Member> {
    let sql = format!(
      "SELECT id, {}, updated_on, added_on, deleted FROM members
       WHERE identifier = ?1 COLLATE NOCASE AND deleted = 0
       ORDER BY id LIMIT 1",
      <Member as crate::mirror::MirrorRow>::COLUMNS.join(", "),
    );
    let ident  = identifier.to_owned();
    let member = self
      .call(move |conn| Ok(conn.query_row(&sql, [ident], Member::from_row).optional()?))
      .await?;
    member.ok_or_else(|| CoreError::not_found("member", identifier))
  }

  // ── Recipients ────────────────────────────────────────────────────────────

  async fn get_recipient(&self, id: i64) -> CoreResult<ChatRecipient> {
    let found = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RECIPIENT_COLUMNS} FROM chat_recipients WHERE id = ?1"),
              [id],
              recipient_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    found.ok_or_else(|| CoreError::not_found("recipient", id))
  }

  async fn recipient_by_external_id(&self, external_id: &str) -> CoreResult<ChatRecipient> {
    let key   = external_id.to_owned();
    let found = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RECIPIENT_COLUMNS} FROM chat_recipients WHERE external_id = ?1"),
              [key],
              recipient_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    found.ok_or_else(|| CoreError::not_found("recipient", external_id))
  }

  async fn recipients_by_email(&self, email: &str) -> CoreResult<Vec<ChatRecipient>> {
    let email = email.to_owned();
    let rows  = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECIPIENT_COLUMNS} FROM chat_recipients
           WHERE kind = 'person' AND email = ?1 COLLATE NOCASE
           ORDER BY last_activity DESC, id DESC"
        ))?;
        let rows = stmt
          .query_map([email], recipient_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn list_recipients(&self, kind: Option<RecipientKind>) -> CoreResult<Vec<ChatRecipient>> {
    let kind_str = kind.map(encode_kind);
    let rows     = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECIPIENT_COLUMNS} FROM chat_recipients
           WHERE ?1 IS NULL OR kind = ?1
           ORDER BY id"
        ))?;
        let rows = stmt
          .query_map([kind_str], recipient_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn upsert_recipient(&self, input: NewRecipient) -> CoreResult<ChatRecipient> {
    match (input.kind, &input.email) {
      (RecipientKind::Person, None) => {
        return Err(CoreError::InvalidInput("person recipients need an email".into()));
      }
      (RecipientKind::Room, Some(_)) => {
        return Err(CoreError::InvalidInput("room recipients cannot have an email".into()));
      }
      _ => {}
    }

    let at            = now();
    let last_activity = encode_dt(input.last_activity);
    let kind          = encode_kind(input.kind);
    let stored = self
      .call(move |conn| {
        let sp = conn.savepoint()?;
        sp.execute(
          "INSERT INTO chat_recipients
             (external_id, name, email, kind, last_activity, created_on, updated_on)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
           ON CONFLICT(external_id) DO UPDATE SET
             name          = excluded.name,
             email         = excluded.email,
             kind          = excluded.kind,
             last_activity = excluded.last_activity,
             updated_on    = excluded.updated_on
           WHERE chat_recipients.name          IS NOT excluded.name
              OR chat_recipients.email         IS NOT excluded.email
              OR chat_recipients.kind          IS NOT excluded.kind
              OR chat_recipients.last_activity IS NOT excluded.last_activity",
          rusqlite::params![input.external_id, input.name, input.email, kind, last_activity, at],
        )?;
        let row = sp.query_row(
          &format!("SELECT {RECIPIENT_COLUMNS} FROM chat_recipients WHERE external_id = ?1"),
          [&input.external_id],
          recipient_from_row,
        )?;
        sp.commit()?;
        Ok(row)
      })
      .await?;
    Ok(stored)
  }

  async fn delete_recipient(&self, id: i64) -> CoreResult<()> {
    let removed = self
      .call(move |conn| Ok(conn.execute("DELETE FROM chat_recipients WHERE id = ?1", [id])?))
      .await?;
    if removed == 0 {
      return Err(CoreError::not_found("recipient", id));
    }
    Ok(())
  }

  // ── Notifier rules ────────────────────────────────────────────────────────

  async fn get_rule(&self, id: i64) -> CoreResult<NotifierRule> {
    let found = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RULE_COLUMNS} FROM notifier_rules WHERE id = ?1"),
              [id],
              rule_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    found.ok_or_else(|| CoreError::not_found("notifier rule", id))
  }

  async fn list_rules(&self) -> CoreResult<Vec<NotifierRule>> {
    let rows = self
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {RULE_COLUMNS} FROM notifier_rules ORDER BY id"))?;
        let rows = stmt
          .query_map([], rule_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn rules_for_board(&self, board_id: i64) -> CoreResult<Vec<NotifierRule>> {
    let rows = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RULE_COLUMNS} FROM notifier_rules WHERE board_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
          .query_map([board_id], rule_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn insert_rule(&self, input: NewRule) -> CoreResult<NotifierRule> {
    let at   = now();
    let rule = self
      .call(move |conn| {
        let sp = conn.savepoint()?;
        sp.execute(
          "INSERT INTO notifier_rules (board_id, recipient_id, notify_enabled, created_on)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![input.board_id, input.recipient_id, input.notify_enabled, at],
        )?;
        let id  = sp.last_insert_rowid();
        let row = sp.query_row(
          &format!("SELECT {RULE_COLUMNS} FROM notifier_rules WHERE id = ?1"),
          [id],
          rule_from_row,
        )?;
        sp.commit()?;
        Ok(row)
      })
      .await?;
    Ok(rule)
  }

  async fn update_rule(&self, id: i64, input: NewRule) -> CoreResult<NotifierRule> {
    let rule = self
      .call(move |conn| {
        let sp      = conn.savepoint()?;
        let matched = sp.execute(
          "UPDATE notifier_rules SET board_id = ?2, recipient_id = ?3, notify_enabled = ?4
           WHERE id = ?1",
          rusqlite::params![id, input.board_id, input.recipient_id, input.notify_enabled],
        )?;
        if matched == 0 {
          return Ok(None);
        }
        let row = sp.query_row(
          &format!("SELECT {RULE_COLUMNS} FROM notifier_rules WHERE id = ?1"),
          [id],
          rule_from_row,
        )?;
        sp.commit()?;
        Ok(Some(row))
      })
      .await?;
    rule.ok_or_else(|| CoreError::not_found("notifier rule", id))
  }

  async fn delete_rule(&self, id: i64) -> CoreResult<()> {
    let removed = self
      .call(move |conn| Ok(conn.execute("DELETE FROM notifier_rules WHERE id = ?1", [id])?))
      .await?;
    if removed == 0 {
      return Err(CoreError::not_found("notifier rule", id));
    }
    Ok(())
  }

  // ── Forwards ──────────────────────────────────────────────────────────────

  async fn get_forward(&self, id: i64) -> CoreResult<NotifierForward> {
    let found = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {FORWARD_COLUMNS} FROM notifier_forwards WHERE id = ?1"),
              [id],
              forward_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    found.ok_or_else(|| CoreError::not_found("notifier forward", id))
  }

  async fn list_forwards(&self) -> CoreResult<Vec<NotifierForward>> {
    let rows = self
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {FORWARD_COLUMNS} FROM notifier_forwards ORDER BY id"))?;
        let rows = stmt
          .query_map([], forward_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn forwards_from(&self, recipient_id: i64) -> CoreResult<Vec<NotifierForward>> {
    let rows = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FORWARD_COLUMNS} FROM notifier_forwards
           WHERE source_recipient_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
          .query_map([recipient_id], forward_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn insert_forward(&self, input: NewForward) -> CoreResult<NotifierForward> {
    validate_forward(&input)?;
    let at    = now();
    let start = input.start_date.map(encode_dt);
    let end   = input.end_date.map(encode_dt);
    let fwd   = self
      .call(move |conn| {
        let sp = conn.savepoint()?;
        sp.execute(
          "INSERT INTO notifier_forwards
             (source_recipient_id, dest_recipient_id, start_date, end_date,
              enabled, user_keeps_copy, created_on, updated_on)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![
            input.source_recipient_id,
            input.dest_recipient_id,
            start,
            end,
            input.enabled,
            input.user_keeps_copy,
            at,
          ],
        )?;
        let id  = sp.last_insert_rowid();
        let row = sp.query_row(
          &format!("SELECT {FORWARD_COLUMNS} FROM notifier_forwards WHERE id = ?1"),
          [id],
          forward_from_row,
        )?;
        sp.commit()?;
        Ok(row)
      })
      .await?;
    Ok(fwd)
  }

  async fn update_forward(&self, id: i64, input: NewForward) -> CoreResult<NotifierForward> {
    validate_forward(&input)?;
    let at    = now();
    let start = input.start_date.map(encode_dt);
    let end   = input.end_date.map(encode_dt);
    let fwd   = self
      .call(move |conn| {
        let sp      = conn.savepoint()?;
        let matched = sp.execute(
          "UPDATE notifier_forwards SET
             source_recipient_id = ?2, dest_recipient_id = ?3,
             start_date = ?4, end_date = ?5,
             enabled = ?6, user_keeps_copy = ?7, updated_on = ?8
           WHERE id = ?1",
          rusqlite::params![
            id,
            input.source_recipient_id,
            input.dest_recipient_id,
            start,
            end,
            input.enabled,
            input.user_keeps_copy,
            at,
          ],
        )?;
        if matched == 0 {
          return Ok(None);
        }
        let row = sp.query_row(
          &format!("SELECT {FORWARD_COLUMNS} FROM notifier_forwards WHERE id = ?1"),
          [id],
          forward_from_row,
        )?;
        sp.commit()?;
        Ok(Some(row))
      })
      .await?;
    fwd.ok_or_else(|| CoreError::not_found("notifier forward", id))
  }

  async fn delete_forward(&self, id: i64) -> CoreResult<()> {
    let removed = self
      .call(move |conn| Ok(conn.execute("DELETE FROM notifier_forwards WHERE id = ?1", [id])?))
      .await?;
    if removed == 0 {
      return Err(CoreError::not_found("notifier forward", id));
    }
    Ok(())
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn record_notifications(
    &self,
    batch: Vec<NewNotification>,
  ) -> CoreResult<Vec<TicketNotification>> {
    if batch.is_empty() {
      return Ok(Vec::new());
    }
    let at   = now();
    let rows = self
      .call(move |conn| {
        let sp       = conn.savepoint()?;
        let mut rows = Vec::with_capacity(batch.len());
        for n in &batch {
          // OR IGNORE drops rows that collide with the sent-once index.
          let inserted = sp.execute(
            "INSERT OR IGNORE INTO ticket_notifications
               (ticket_id, ticket_note_id, recipient_id, forwarded_from_id,
                sent, skipped, created_on, updated_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            rusqlite::params![
              n.ticket_id,
              n.ticket_note_id,
              n.recipient_id,
              n.forwarded_from_id,
              n.sent,
              n.skipped,
              at,
            ],
          )?;
          if inserted == 0 {
            continue;
          }
          let id = sp.last_insert_rowid();
          rows.push(sp.query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM ticket_notifications WHERE id = ?1"),
            [id],
            notification_from_row,
          )?);
        }
        sp.commit()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn note_notified(&self, note_id: i64) -> CoreResult<bool> {
    Ok(
      self
        .exists(
          "SELECT EXISTS(SELECT 1 FROM ticket_notifications
                         WHERE ticket_note_id = ?1 AND sent = 1)",
          note_id,
        )
        .await?,
    )
  }

  async fn ticket_notified(&self, ticket_id: i64) -> CoreResult<bool> {
    Ok(
      self
        .exists(
          "SELECT EXISTS(SELECT 1 FROM ticket_notifications
                         WHERE ticket_id = ?1 AND sent = 1)",
          ticket_id,
        )
        .await?,
    )
  }

  async fn note_has_marker(&self, note_id: i64) -> CoreResult<bool> {
    Ok(
      self
        .exists(
          "SELECT EXISTS(SELECT 1 FROM ticket_notifications
                         WHERE ticket_note_id = ?1 AND (sent = 1 OR skipped = 1))",
          note_id,
        )
        .await?,
    )
  }

  async fn notifications_for_ticket(&self, ticket_id: i64) -> CoreResult<Vec<TicketNotification>> {
    let rows = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM ticket_notifications
           WHERE ticket_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
          .query_map([ticket_id], notification_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  // ── Config ────────────────────────────────────────────────────────────────

  async fn get_config(&self) -> CoreResult<Config> {
    let defaults = Config::default();
    let config   = self
      .call(move |conn| {
        let sp = conn.savepoint()?;
        sp.execute(
          "INSERT OR IGNORE INTO app_config
             (id, attempt_notify, max_message_length, max_concurrent_syncs, skip_launch_syncs)
           VALUES (1, ?1, ?2, ?3, ?4)",
          rusqlite::params![
            defaults.attempt_notify,
            width(defaults.max_message_length),
            width(defaults.max_concurrent_syncs),
            defaults.skip_launch_syncs,
          ],
        )?;
        let row = sp.query_row(
          "SELECT attempt_notify, max_message_length, max_concurrent_syncs, skip_launch_syncs
           FROM app_config WHERE id = 1",
          [],
          config_from_row,
        )?;
        sp.commit()?;
        Ok(row)
      })
      .await?;
    Ok(config)
  }

  async fn put_config(&self, config: Config) -> CoreResult<Config> {
    config.validate()?;
    let stored = config.clone();
    self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO app_config
             (id, attempt_notify, max_message_length, max_concurrent_syncs, skip_launch_syncs)
           VALUES (1, ?1, ?2, ?3, ?4)
           ON CONFLICT(id) DO UPDATE SET
             attempt_notify       = excluded.attempt_notify,
             max_message_length   = excluded.max_message_length,
             max_concurrent_syncs = excluded.max_concurrent_syncs,
             skip_launch_syncs    = excluded.skip_launch_syncs",
          rusqlite::params![
            config.attempt_notify,
            width(config.max_message_length),
            width(config.max_concurrent_syncs),
            config.skip_launch_syncs,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(stored)
  }
}
