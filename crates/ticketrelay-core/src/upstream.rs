//! Upstream collaborators: the PSA (helpdesk) and the chat platform.
//!
//! Implementations live in `ticketrelay-upstream`. A missing upstream record
//! is reported as [`Error::NotFound`](crate::Error::NotFound); 5xx and
//! network failures as [`Error::Upstream`](crate::Error::Upstream).

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  entity::{Board, Company, Contact, Member, Ticket, TicketNote, TicketStatus},
};

// ─── PSA ─────────────────────────────────────────────────────────────────────

/// Read-only view of the helpdesk's REST API.
///
/// Returned entities carry default timestamps; the store assigns its own.
pub trait Psa: Send + Sync + 'static {
  fn ticket(&self, id: i64) -> impl Future<Output = Result<Ticket>> + Send + '_;

  /// The most recent note on a ticket, or `None` when it has no notes.
  fn latest_note(
    &self,
    ticket_id: i64,
  ) -> impl Future<Output = Result<Option<TicketNote>>> + Send + '_;

  fn note(
    &self,
    ticket_id: i64,
    note_id: i64,
  ) -> impl Future<Output = Result<TicketNote>> + Send + '_;

  fn board(&self, id: i64) -> impl Future<Output = Result<Board>> + Send + '_;

  fn status(
    &self,
    board_id: i64,
    status_id: i64,
  ) -> impl Future<Output = Result<TicketStatus>> + Send + '_;

  fn company(&self, id: i64) -> impl Future<Output = Result<Company>> + Send + '_;

  fn contact(&self, id: i64) -> impl Future<Output = Result<Contact>> + Send + '_;

  fn member(&self, id: i64) -> impl Future<Output = Result<Member>> + Send + '_;

  fn member_by_identifier<'a>(
    &'a self,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Member>> + Send + 'a;

  fn list_boards(&self) -> impl Future<Output = Result<Vec<Board>>> + Send + '_;

  fn list_members(&self) -> impl Future<Output = Result<Vec<Member>>> + Send + '_;

  /// IDs of open tickets, restricted to `board_ids` unless it is empty.
  fn list_open_tickets<'a>(
    &'a self,
    board_ids: &'a [i64],
  ) -> impl Future<Output = Result<Vec<i64>>> + Send + 'a;
}

// ─── Chat ────────────────────────────────────────────────────────────────────

/// Where an outbound message goes. Exactly one of room or person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageTarget {
  /// A room, by the chat platform's room ID.
  Room(String),
  /// A person, by email.
  Person(String),
}

impl MessageTarget {
  /// Case-folded form used to dedupe deliveries.
  pub fn normalized(&self) -> Self {
    match self {
      MessageTarget::Room(id) => MessageTarget::Room(id.clone()),
      MessageTarget::Person(email) => MessageTarget::Person(email.to_lowercase()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
  pub target:   MessageTarget,
  pub markdown: String,
}

/// A room as listed by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
  pub id:            String,
  pub title:         String,
  /// Platform room type; only `group` rooms are mirrored.
  pub room_type:     String,
  pub last_activity: DateTime<Utc>,
}

/// A person as returned by the chat platform's people search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPerson {
  pub id:            String,
  pub emails:        Vec<String>,
  pub display_name:  String,
  pub last_activity: DateTime<Utc>,
}

/// The team-chat platform messages are posted to.
pub trait Chat: Send + Sync + 'static {
  fn post_message(
    &self,
    message: OutboundMessage,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn list_rooms(&self) -> impl Future<Output = Result<Vec<ChatRoom>>> + Send + '_;

  fn people_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Vec<ChatPerson>>> + Send + 'a;
}
