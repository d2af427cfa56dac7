//! Chat recipients: the rooms and persons a message can be delivered to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecipientKind {
  Room,
  Person,
}

/// A stored recipient. `id` is local; `external_id` is the chat platform's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecipient {
  pub id:            i64,
  pub external_id:   String,
  pub name:          String,
  /// Only ever set for `kind = person`.
  pub email:         Option<String>,
  pub kind:          RecipientKind,
  pub last_activity: DateTime<Utc>,
  pub created_on:    DateTime<Utc>,
  pub updated_on:    DateTime<Utc>,
}

/// Input to [`Store::upsert_recipient`](crate::store::Store::upsert_recipient),
/// keyed by `external_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecipient {
  pub external_id:   String,
  pub name:          String,
  pub email:         Option<String>,
  pub kind:          RecipientKind,
  pub last_activity: DateTime<Utc>,
}

impl NewRecipient {
  pub fn room(external_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      external_id:   external_id.into(),
      name:          name.into(),
      email:         None,
      kind:          RecipientKind::Room,
      last_activity: DateTime::<Utc>::default(),
    }
  }

  pub fn person(
    external_id: impl Into<String>,
    name: impl Into<String>,
    email: impl Into<String>,
  ) -> Self {
    Self {
      external_id:   external_id.into(),
      name:          name.into(),
      email:         Some(email.into()),
      kind:          RecipientKind::Person,
      last_activity: DateTime::<Utc>::default(),
    }
  }

  pub fn with_last_activity(mut self, at: DateTime<Utc>) -> Self {
    self.last_activity = at;
    self
  }
}
