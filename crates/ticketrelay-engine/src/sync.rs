//! Bulk backfill of boards, chat recipients and open tickets.
//!
//! Each kind runs at most once at a time; a second request while one is in
//! flight fails with `AlreadyRunning`. Ticket sync goes through the normal
//! pipeline with `syncing = true`, so it never notifies.

use std::{
  collections::{BTreeMap, BTreeSet, HashSet},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};
use ticketrelay_core::{
  Error, Result,
  entity::Board,
  event::Action,
  recipient::{NewRecipient, RecipientKind},
  store::{Mirror, Store},
  upstream::{Chat, ChatPerson, Psa},
};

use crate::relay::{Relay, finish};

// ─── Flags ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct SyncFlags {
  boards:     AtomicBool,
  recipients: AtomicBool,
  tickets:    AtomicBool,
}

/// Holds a sync flag raised until dropped.
struct Running<'a>(&'a AtomicBool);

impl<'a> Running<'a> {
  fn acquire(flag: &'a AtomicBool, kind: &'static str) -> Result<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .map_err(|_| Error::AlreadyRunning(kind))?;
    Ok(Self(flag))
  }
}

impl Drop for Running<'_> {
  fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

// ─── Requests and reports ────────────────────────────────────────────────────

/// Body of `POST /sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncRequest {
  pub cw_boards:            bool,
  pub webex_recipients:     bool,
  pub cw_tickets:           bool,
  /// Restrict ticket sync to these boards; empty means all.
  pub board_ids:            Vec<i64>,
  /// Overrides the configured width for this run.
  pub max_concurrent_syncs: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardSync {
  pub upserted: usize,
  pub removed:  usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecipientSync {
  pub rooms:   usize,
  pub people:  usize,
  pub removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketSync {
  pub processed: usize,
  pub failed:    usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
  pub boards:     Option<BoardSync>,
  pub recipients: Option<RecipientSync>,
  pub tickets:    Option<TicketSync>,
  pub errors:     Vec<String>,
}

// ─── Driver ──────────────────────────────────────────────────────────────────

impl<S: Store, P: Psa, C: Chat> Relay<S, P, C> {
  /// The first kind `req` asks for that is already in flight.
  pub fn running_sync(&self, req: &SyncRequest) -> Option<&'static str> {
    [
      (req.cw_boards, &self.syncs.boards, "boards"),
      (req.webex_recipients, &self.syncs.recipients, "recipients"),
      (req.cw_tickets, &self.syncs.tickets, "tickets"),
    ]
    .into_iter()
    .find(|(wanted, flag, _)| *wanted && flag.load(Ordering::Acquire))
    .map(|(_, _, kind)| kind)
  }

  /// Run the requested syncs in order: boards, recipients, tickets. A failed
  /// kind is logged and does not stop the others.
  pub async fn sync(self: &Arc<Self>, req: SyncRequest) -> SyncReport {
    let mut report = SyncReport::default();

    if req.cw_boards {
      match self.sync_boards().await {
        Ok(done) => report.boards = Some(done),
        Err(e) => report.fail("boards", e),
      }
    }
    if req.webex_recipients {
      match self.sync_recipients(req.max_concurrent_syncs).await {
        Ok(done) => report.recipients = Some(done),
        Err(e) => report.fail("recipients", e),
      }
    }
    if req.cw_tickets {
      match self.sync_tickets(&req.board_ids, req.max_concurrent_syncs).await {
        Ok(done) => report.tickets = Some(done),
        Err(e) => report.fail("tickets", e),
      }
    }

    report
  }

  /// Mirror every upstream board in one transaction, soft-deleting local
  /// boards that no longer exist upstream.
  pub async fn sync_boards(&self) -> Result<BoardSync> {
    let _running = Running::acquire(&self.syncs.boards, "boards")?;

    let upstream = self.psa.list_boards().await?;
    let present  = upstream.iter().map(|b| b.id).collect::<HashSet<_>>();

    let tx     = self.store.begin().await?;
    let scoped = self.store.with_tx(&tx);
    let result = async {
      let mut done = BoardSync::default();
      for board in upstream {
        Mirror::<Board>::upsert(&scoped, board).await?;
        done.upserted += 1;
      }
      for stale in Mirror::<Board>::list(&scoped).await? {
        if !present.contains(&stale.id) {
          Mirror::<Board>::soft_delete(&scoped, stale.id).await?;
          done.removed += 1;
        }
      }
      Ok::<_, Error>(done)
    }
    .await;

    let done = finish(tx, result).await?;
    tracing::info!(upserted = done.upserted, removed = done.removed, "boards synced");
    Ok(done)
  }

  /// Mirror group rooms and the chat persons of every PSA member with a
  /// primary email. Stored rooms gone upstream and persons whose email no
  /// longer belongs to a member are removed.
  pub async fn sync_recipients(self: &Arc<Self>, width: Option<usize>) -> Result<RecipientSync> {
    let _running = Running::acquire(&self.syncs.recipients, "recipients")?;

    let rooms = self
      .recipients
      .refresh_rooms()
      .await?
      .into_iter()
      .filter(|r| r.room_type == "group")
      .collect::<Vec<_>>();

    let emails = self
      .psa
      .list_members()
      .await?
      .into_iter()
      .filter_map(|m| m.primary_email)
      .map(|e| e.trim().to_lowercase())
      .filter(|e| !e.is_empty())
      .collect::<BTreeSet<_>>();

    let width  = width.unwrap_or(self.config().await.max_concurrent_syncs).max(1);
    let people = self.search_people(&emails, width).await;

    let tx     = self.store.begin().await?;
    let scoped = self.store.with_tx(&tx);
    let result = async {
      let mut done = RecipientSync::default();

      let mut live_rooms = HashSet::new();
      for room in rooms {
        live_rooms.insert(room.id.clone());
        scoped
          .upsert_recipient(
            NewRecipient::room(room.id, room.title).with_last_activity(room.last_activity),
          )
          .await?;
        done.rooms += 1;
      }

      for (email, person) in &people {
        scoped
          .upsert_recipient(
            NewRecipient::person(&person.id, &person.display_name, email)
              .with_last_activity(person.last_activity),
          )
          .await?;
        done.people += 1;
      }

      for stored in scoped.list_recipients(None).await? {
        let stale = match stored.kind {
          RecipientKind::Room => !live_rooms.contains(&stored.external_id),
          RecipientKind::Person => stored
            .email
            .as_deref()
            .is_none_or(|e| !emails.contains(&e.to_lowercase())),
        };
        if stale {
          scoped.delete_recipient(stored.id).await?;
          done.removed += 1;
        }
      }
      Ok::<_, Error>(done)
    }
    .await;

    let done = finish(tx, result).await?;
    self.recipients.invalidate();
    tracing::info!(
      rooms = done.rooms,
      people = done.people,
      removed = done.removed,
      "recipients synced"
    );
    Ok(done)
  }

  /// The most recently active chat person for each email, searched with at
  /// most `width` requests in flight. Failed lookups are logged and left out.
  async fn search_people(
    self: &Arc<Self>,
    emails: &BTreeSet<String>,
    width: usize,
  ) -> BTreeMap<String, ChatPerson> {
    let permits   = Arc::new(Semaphore::new(width));
    let mut tasks = JoinSet::new();

    for email in emails.iter().cloned() {
      let Ok(permit) = permits.clone().acquire_owned().await else { break };
      let relay = self.clone();
      tasks.spawn(async move {
        let _permit = permit;
        let found   = relay.recipients.refresh_people(&email).await;
        (email, found)
      });
    }

    let mut out = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((email, Ok(found))) => {
          if let Some(person) = found.into_iter().max_by_key(|p| p.last_activity) {
            out.insert(email, person);
          }
        }
        Ok((email, Err(e))) => tracing::warn!(%email, error = %e, "people search failed"),
        Err(e) => tracing::error!(error = %e, "people search task failed"),
      }
    }
    out
  }

  /// Run every open upstream ticket through the pipeline with notifications
  /// suppressed, at most `width` at a time. Per-ticket failures are counted
  /// and logged.
  pub async fn sync_tickets(
    self: &Arc<Self>,
    board_ids: &[i64],
    width: Option<usize>,
  ) -> Result<TicketSync> {
    let _running = Running::acquire(&self.syncs.tickets, "tickets")?;

    let ids   = self.psa.list_open_tickets(board_ids).await?;
    let width = width.unwrap_or(self.config().await.max_concurrent_syncs).max(1);
    tracing::info!(tickets = ids.len(), width, "syncing tickets");

    let permits   = Arc::new(Semaphore::new(width));
    let mut tasks = JoinSet::new();
    for id in ids {
      let Ok(permit) = permits.clone().acquire_owned().await else { break };
      let relay = self.clone();
      tasks.spawn(async move {
        let _permit = permit;
        (id, relay.process_locked(id, Action::Updated, true).await)
      });
    }

    let mut done = TicketSync::default();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((_, Ok(_))) => done.processed += 1,
        Ok((ticket_id, Err(e))) => {
          tracing::error!(ticket_id, error = %e, "ticket sync failed");
          done.failed += 1;
        }
        Err(e) => {
          tracing::error!(error = %e, "ticket sync task failed");
          done.failed += 1;
        }
      }
    }

    tracing::info!(processed = done.processed, failed = done.failed, "tickets synced");
    Ok(done)
  }

  /// Sync boards and recipients in the background unless the runtime config
  /// says otherwise.
  pub async fn spawn_launch_syncs(self: &Arc<Self>) {
    if self.config().await.skip_launch_syncs {
      tracing::info!("launch syncs skipped");
      return;
    }
    let relay = self.clone();
    tokio::spawn(async move {
      let req    = SyncRequest { cw_boards: true, webex_recipients: true, ..Default::default() };
      let report = relay.sync(req).await;
      if !report.errors.is_empty() {
        tracing::warn!(errors = ?report.errors, "launch syncs incomplete");
      }
    });
  }
}

impl SyncReport {
  fn fail(&mut self, kind: &'static str, e: Error) {
    tracing::error!(kind, error = %e, "sync failed");
    self.errors.push(format!("{kind}: {e}"));
  }
}
