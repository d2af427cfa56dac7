//! The `Store` trait and its per-entity `Mirror` repositories.
//!
//! The traits are implemented by storage backends (e.g.
//! `ticketrelay-store-sqlite`). The engine depends on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use crate::{
  Result,
  config::Config,
  entity::{Board, Company, Contact, Member, Mirrored, Ticket, TicketNote, TicketStatus},
  notifier::{
    NewForward, NewNotification, NewRule, NotifierForward, NotifierRule, TicketNotification,
  },
  recipient::{ChatRecipient, NewRecipient, RecipientKind},
};

// ─── Mirror ──────────────────────────────────────────────────────────────────

/// Repository for one mirrored entity kind.
///
/// Call sites name the entity explicitly, e.g.
/// `Mirror::<Board>::get(&store, 42)`.
pub trait Mirror<E: Mirrored>: Send + Sync {
  /// Fetch a row by upstream ID, including soft-deleted rows.
  /// Missing rows are [`Error::NotFound`](crate::Error::NotFound).
  fn get(&self, id: i64) -> impl Future<Output = Result<E>> + Send + '_;

  /// Insert or update by ID and return the stored row.
  ///
  /// `added_on` is set only on first insert; `updated_on` moves only when a
  /// column actually changed. Upserting a soft-deleted row revives it.
  fn upsert(&self, entity: E) -> impl Future<Output = Result<E>> + Send + '_;

  /// Hard delete. Mirrors are normally only soft-deleted.
  fn delete(&self, id: i64) -> impl Future<Output = Result<()>> + Send + '_;

  fn soft_delete(&self, id: i64) -> impl Future<Output = Result<()>> + Send + '_;

  /// All rows that are not soft-deleted, ordered by ID.
  fn list(&self) -> impl Future<Output = Result<Vec<E>>> + Send + '_;
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// An open store transaction.
///
/// Dropping a transaction without committing rolls it back.
pub trait Transaction: Send + Sync {
  fn commit(self) -> impl Future<Output = Result<()>> + Send;

  fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// The entity store: every durable row of the relay lives behind this trait.
///
/// A value of this type is either an auto-commit handle, where each
/// operation commits on its own, or a transaction-scoped view obtained from
/// [`Store::with_tx`] whose operations observe that transaction.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait Store:
  Mirror<Board>
  + Mirror<Company>
  + Mirror<Contact>
  + Mirror<Member>
  + Mirror<TicketStatus>
  + Mirror<Ticket>
  + Mirror<TicketNote>
  + Clone
  + Send
  + Sync
  + 'static
{
  type Tx: Transaction;

  // ── Transactions ──────────────────────────────────────────────────────

  /// Open a transaction. Other auto-commit callers wait until it ends.
  fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send + '_;

  /// A view of this store whose operations run inside `tx`.
  fn with_tx(&self, tx: &Self::Tx) -> Self;

  // ── Members ───────────────────────────────────────────────────────────

  fn member_by_identifier<'a>(
    &'a self,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Member>> + Send + 'a;

  // ── Recipients ────────────────────────────────────────────────────────

  fn get_recipient(&self, id: i64) -> impl Future<Output = Result<ChatRecipient>> + Send + '_;

  fn recipient_by_external_id<'a>(
    &'a self,
    external_id: &'a str,
  ) -> impl Future<Output = Result<ChatRecipient>> + Send + 'a;

  /// Person recipients with this email (case-insensitive), most recently
  /// active first.
  fn recipients_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Vec<ChatRecipient>>> + Send + 'a;

  fn list_recipients(
    &self,
    kind: Option<RecipientKind>,
  ) -> impl Future<Output = Result<Vec<ChatRecipient>>> + Send + '_;

  /// Insert or update keyed by `external_id`.
  fn upsert_recipient(
    &self,
    input: NewRecipient,
  ) -> impl Future<Output = Result<ChatRecipient>> + Send + '_;

  /// Removes the recipient along with its rules and forwards.
  fn delete_recipient(&self, id: i64) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Notifier rules ────────────────────────────────────────────────────

  fn get_rule(&self, id: i64) -> impl Future<Output = Result<NotifierRule>> + Send + '_;

  fn list_rules(&self) -> impl Future<Output = Result<Vec<NotifierRule>>> + Send + '_;

  fn rules_for_board(
    &self,
    board_id: i64,
  ) -> impl Future<Output = Result<Vec<NotifierRule>>> + Send + '_;

  /// Fails with `Conflict` when the board already has a rule for the
  /// recipient.
  fn insert_rule(&self, input: NewRule) -> impl Future<Output = Result<NotifierRule>> + Send + '_;

  fn update_rule(
    &self,
    id: i64,
    input: NewRule,
  ) -> impl Future<Output = Result<NotifierRule>> + Send + '_;

  fn delete_rule(&self, id: i64) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Forwards ──────────────────────────────────────────────────────────

  fn get_forward(&self, id: i64) -> impl Future<Output = Result<NotifierForward>> + Send + '_;

  fn list_forwards(&self) -> impl Future<Output = Result<Vec<NotifierForward>>> + Send + '_;

  /// Every forward whose source is `recipient_id`, active or not.
  fn forwards_from(
    &self,
    recipient_id: i64,
  ) -> impl Future<Output = Result<Vec<NotifierForward>>> + Send + '_;

  fn insert_forward(
    &self,
    input: NewForward,
  ) -> impl Future<Output = Result<NotifierForward>> + Send + '_;

  fn update_forward(
    &self,
    id: i64,
    input: NewForward,
  ) -> impl Future<Output = Result<NotifierForward>> + Send + '_;

  fn delete_forward(&self, id: i64) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Insert a batch atomically. Rows that would duplicate an existing
  /// `sent = true` row for the same note and recipient are dropped; the
  /// rows actually inserted are returned.
  fn record_notifications(
    &self,
    batch: Vec<NewNotification>,
  ) -> impl Future<Output = Result<Vec<TicketNotification>>> + Send + '_;

  /// Whether any notification for this note was sent.
  fn note_notified(&self, note_id: i64) -> impl Future<Output = Result<bool>> + Send + '_;

  /// Whether any notification for this ticket was sent.
  fn ticket_notified(&self, ticket_id: i64) -> impl Future<Output = Result<bool>> + Send + '_;

  /// Whether any row, sent or skipped, exists for this note.
  fn note_has_marker(&self, note_id: i64) -> impl Future<Output = Result<bool>> + Send + '_;

  fn notifications_for_ticket(
    &self,
    ticket_id: i64,
  ) -> impl Future<Output = Result<Vec<TicketNotification>>> + Send + '_;

  // ── Config ────────────────────────────────────────────────────────────

  /// The stored configuration; the defaults are persisted on first read.
  fn get_config(&self) -> impl Future<Output = Result<Config>> + Send + '_;

  fn put_config(&self, config: Config) -> impl Future<Output = Result<Config>> + Send + '_;
}
