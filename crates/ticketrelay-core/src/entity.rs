//! Mirrored PSA entities: the ticket graph pulled in from the helpdesk.
//!
//! Every entity reuses its upstream ID as primary key so re-ingestion is
//! idempotent. The `updated_on`, `added_on` and `deleted` columns are owned by
//! the store; values supplied by callers on upsert are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entity mirrored from the PSA and keyed by its upstream ID.
pub trait Mirrored: Clone + Send + Sync + 'static {
  /// Human-readable kind, used in `NotFound` errors and logs.
  const KIND: &'static str;

  fn id(&self) -> i64;
}

// ─── Boards, companies, contacts, members ────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
  pub id:         i64,
  pub name:       String,
  pub updated_on: DateTime<Utc>,
  pub added_on:   DateTime<Utc>,
  pub deleted:    bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
  pub id:         i64,
  pub name:       String,
  pub updated_on: DateTime<Utc>,
  pub added_on:   DateTime<Utc>,
  pub deleted:    bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
  pub id:         i64,
  pub first_name: String,
  pub last_name:  Option<String>,
  pub company_id: Option<i64>,
  pub updated_on: DateTime<Utc>,
  pub added_on:   DateTime<Utc>,
  pub deleted:    bool,
}

impl Contact {
  /// `first last`, or just `first` when the last name is missing.
  pub fn full_name(&self) -> String {
    join_name(&self.first_name, self.last_name.as_deref())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
  pub id:            i64,
  /// The member's login, as it appears in a ticket's `resources` list.
  pub identifier:    String,
  pub first_name:    String,
  pub last_name:     Option<String>,
  pub primary_email: Option<String>,
  pub updated_on:    DateTime<Utc>,
  pub added_on:      DateTime<Utc>,
  pub deleted:       bool,
}

impl Member {
  pub fn full_name(&self) -> String {
    join_name(&self.first_name, self.last_name.as_deref())
  }
}

fn join_name(first: &str, last: Option<&str>) -> String {
  match last.map(str::trim).filter(|l| !l.is_empty()) {
    Some(last) if !first.trim().is_empty() => format!("{} {last}", first.trim()),
    Some(last) => last.to_owned(),
    None => first.trim().to_owned(),
  }
}

// ─── Tickets ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatus {
  pub id:         i64,
  pub board_id:   i64,
  pub name:       String,
  pub closed:     bool,
  pub inactive:   bool,
  pub updated_on: DateTime<Utc>,
  pub added_on:   DateTime<Utc>,
  pub deleted:    bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
  pub id:         i64,
  pub summary:    String,
  pub board_id:   i64,
  pub status_id:  i64,
  pub owner_id:   Option<i64>,
  pub company_id: i64,
  pub contact_id: Option<i64>,
  /// Comma-separated member identifiers, kept verbatim from upstream.
  pub resources:  Option<String>,
  pub updated_by: Option<String>,
  pub updated_on: DateTime<Utc>,
  pub added_on:   DateTime<Utc>,
  pub deleted:    bool,
}

impl Ticket {
  /// Parse `resources` into distinct, non-empty identifiers in listed order.
  pub fn resource_identifiers(&self) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in self.resources.as_deref().unwrap_or_default().split(',') {
      let ident = raw.trim();
      if !ident.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(ident)) {
        out.push(ident.to_owned());
      }
    }
    out
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketNote {
  pub id:         i64,
  pub ticket_id:  i64,
  /// Set when a member wrote the note.
  pub member_id:  Option<i64>,
  /// Set when a customer contact wrote the note.
  pub contact_id: Option<i64>,
  pub content:    Option<String>,
  /// Free-form author label supplied by the PSA.
  pub created_by: Option<String>,
  pub updated_on: DateTime<Utc>,
  pub added_on:   DateTime<Utc>,
  pub deleted:    bool,
}

impl TicketNote {
  /// Whether the note carries any non-whitespace text.
  pub fn has_content(&self) -> bool {
    self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
  }
}

// ─── Mirrored impls ──────────────────────────────────────────────────────────

macro_rules! mirrored {
  ($($ty:ty => $kind:literal),* $(,)?) => {
    $(
      impl Mirrored for $ty {
        const KIND: &'static str = $kind;
        fn id(&self) -> i64 { self.id }
      }
    )*
  };
}

mirrored! {
  Board        => "board",
  Company      => "company",
  Contact      => "contact",
  Member       => "member",
  TicketStatus => "ticket status",
  Ticket       => "ticket",
  TicketNote   => "ticket note",
}
