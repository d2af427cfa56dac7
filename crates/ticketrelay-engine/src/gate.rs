//! The notification gate: whether a processed ticket notifies anyone.

use ticketrelay_core::{
  Result,
  config::Config,
  entity::{Ticket, TicketNote},
  event::{Action, Reason},
  notifier::{NewNotification, TicketNotification},
  store::Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
  Eligible,
  Ineligible(Reason),
}

impl Eligibility {
  pub fn reason(self) -> Option<Reason> {
    match self {
      Eligibility::Eligible => None,
      Eligibility::Ineligible(r) => Some(r),
    }
  }
}

/// Global gates first (the master switch, then sync suppression), then the
/// per-action check. `NO_RECIPIENTS` is decided after resolution, by
/// [`require_recipients`].
pub async fn eligible<S: Store>(
  store: &S,
  config: &Config,
  ticket: &Ticket,
  note: Option<&TicketNote>,
  action: Action,
  syncing: bool,
) -> Result<Eligibility> {
  use Eligibility::*;

  if !config.attempt_notify {
    return Ok(Ineligible(Reason::AttemptNotifyOff));
  }
  if syncing {
    return Ok(Ineligible(Reason::TicketSync));
  }

  match action {
    Action::Added => {
      let rules = store.rules_for_board(ticket.board_id).await?;
      if !rules.iter().any(|r| r.notify_enabled) {
        return Ok(Ineligible(Reason::NoRules));
      }
      if store.ticket_notified(ticket.id).await? {
        return Ok(Ineligible(Reason::AlreadyNotified));
      }
    }
    Action::Updated => {
      let Some(note) = note.filter(|n| n.has_content()) else {
        return Ok(Ineligible(Reason::NoNote));
      };
      if store.note_notified(note.id).await? {
        return Ok(Ineligible(Reason::AlreadyNotified));
      }
    }
    // Deletions never reach the gate.
    Action::Deleted => return Ok(Ineligible(Reason::NoRecipients)),
  }

  Ok(Eligible)
}

pub fn require_recipients(count: usize) -> Eligibility {
  if count == 0 { Eligibility::Ineligible(Reason::NoRecipients) } else { Eligibility::Eligible }
}

/// Whether a suppressed ticket should leave a skipped marker.
pub fn marks_skip(reason: Reason) -> bool {
  matches!(reason, Reason::AttemptNotifyOff | Reason::TicketSync)
}

/// Leave a skipped marker for `note` unless one (sent or skipped) exists.
pub async fn record_skipped<S: Store>(
  store: &S,
  ticket_id: i64,
  note: Option<&TicketNote>,
) -> Result<bool> {
  let Some(note) = note else { return Ok(false) };
  if store.note_has_marker(note.id).await? {
    return Ok(false);
  }
  store.record_notifications(vec![NewNotification::skipped(ticket_id, Some(note.id))]).await?;
  Ok(true)
}

/// Record one batch of delivery attempts.
pub async fn record<S: Store>(
  store: &S,
  batch: Vec<NewNotification>,
) -> Result<Vec<TicketNotification>> {
  store.record_notifications(batch).await
}
