//! Webhook actions and the reasons a ticket is not notified.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// What happened to a ticket upstream.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Action {
  Added,
  Updated,
  Deleted,
}

/// Why the notification gate declined a ticket.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
  AttemptNotifyOff,
  TicketSync,
  NoRules,
  NoNote,
  AlreadyNotified,
  NoRecipients,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  #[test]
  fn action_parses_case_insensitively() {
    assert_eq!(Action::from_str("added").unwrap(), Action::Added);
    assert_eq!(Action::from_str("Updated").unwrap(), Action::Updated);
    assert!(Action::from_str("closed").is_err());
  }

  #[test]
  fn reason_codes() {
    assert_eq!(Reason::AlreadyNotified.to_string(), "ALREADY_NOTIFIED");
    assert_eq!(Reason::AttemptNotifyOff.to_string(), "ATTEMPT_NOTIFY_OFF");
    let code: &'static str = Reason::NoRecipients.into();
    assert_eq!(code, "NO_RECIPIENTS");
  }
}
