//! Notifier rules, forwards, and the notification ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Rules ───────────────────────────────────────────────────────────────────

/// A board→recipient subscription for new tickets.
///
/// `(board_id, recipient_id)` is unique; the store rejects duplicates with
/// [`Error::Conflict`](crate::Error::Conflict).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierRule {
  pub id:             i64,
  pub board_id:       i64,
  pub recipient_id:   i64,
  pub notify_enabled: bool,
  pub created_on:     DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
  pub board_id:       i64,
  pub recipient_id:   i64,
  #[serde(default = "default_true")]
  pub notify_enabled: bool,
}

fn default_true() -> bool { true }

// ─── Forwards ────────────────────────────────────────────────────────────────

/// A recipient→recipient redirection active within a date window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierForward {
  pub id:                  i64,
  pub source_recipient_id: i64,
  pub dest_recipient_id:   i64,
  pub start_date:          Option<DateTime<Utc>>,
  pub end_date:            Option<DateTime<Utc>>,
  pub enabled:             bool,
  pub user_keeps_copy:     bool,
  pub created_on:          DateTime<Utc>,
  pub updated_on:          DateTime<Utc>,
}

impl NotifierForward {
  /// Enabled, started, and not yet ended at `now`. A forward without a
  /// start date is never active.
  pub fn is_active(&self, now: DateTime<Utc>) -> bool {
    self.enabled
      && self.start_date.is_some_and(|start| start <= now)
      && self.end_date.is_none_or(|end| now < end)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewForward {
  pub source_recipient_id: i64,
  pub dest_recipient_id:   i64,
  pub start_date:          Option<DateTime<Utc>>,
  pub end_date:            Option<DateTime<Utc>>,
  #[serde(default = "default_true")]
  pub enabled:             bool,
  #[serde(default)]
  pub user_keeps_copy:     bool,
}

// ─── Notifications ───────────────────────────────────────────────────────────

/// One delivery attempt (or a skipped marker) for a ticket note.
///
/// At most one row exists per `(ticket_note_id, recipient_id)` with
/// `sent = true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketNotification {
  pub id:                i64,
  pub ticket_id:         i64,
  pub ticket_note_id:    Option<i64>,
  pub recipient_id:      Option<i64>,
  pub forwarded_from_id: Option<i64>,
  pub sent:              bool,
  pub skipped:           bool,
  pub created_on:        DateTime<Utc>,
  pub updated_on:        DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
  pub ticket_id:         i64,
  pub ticket_note_id:    Option<i64>,
  pub recipient_id:      Option<i64>,
  pub forwarded_from_id: Option<i64>,
  pub sent:              bool,
  pub skipped:           bool,
}

impl NewNotification {
  /// A marker recording that notification was deliberately skipped.
  pub fn skipped(ticket_id: i64, ticket_note_id: Option<i64>) -> Self {
    Self {
      ticket_id,
      ticket_note_id,
      recipient_id: None,
      forwarded_from_id: None,
      sent: false,
      skipped: true,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn forward(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> NotifierForward {
    NotifierForward {
      id:                  1,
      source_recipient_id: 1,
      dest_recipient_id:   2,
      start_date:          start,
      end_date:            end,
      enabled:             true,
      user_keeps_copy:     false,
      created_on:          Utc::now(),
      updated_on:          Utc::now(),
    }
  }

  #[test]
  fn forward_window() {
    let now = Utc::now();
    let day = Duration::days(1);

    assert!(forward(Some(now - day), None).is_active(now));
    assert!(forward(Some(now), Some(now + day)).is_active(now));
    assert!(!forward(Some(now + day), None).is_active(now));
    assert!(!forward(Some(now - day), Some(now)).is_active(now));
    assert!(!forward(None, None).is_active(now));
  }

  #[test]
  fn disabled_forward_is_inactive() {
    let now = Utc::now();
    let mut f = forward(Some(now - Duration::hours(1)), None);
    f.enabled = false;
    assert!(!f.is_active(now));
  }
}
