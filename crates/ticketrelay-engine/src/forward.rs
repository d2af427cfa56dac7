//! Expansion of a recipient set through active forwards.
//!
//! Breadth-first over recipient IDs with a `seen` set, so any forward graph
//! (self-loops and cycles included) is walked at most once per recipient.

use std::collections::{BTreeMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use ticketrelay_core::{Result, recipient::ChatRecipient, store::Store};

/// A recipient in the outgoing set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
  pub recipient: ChatRecipient,
  /// Recipients this one was reached through, oldest first. Empty for a
  /// direct participant.
  pub chain:     Vec<ChatRecipient>,
}

impl Target {
  pub fn natural(recipient: ChatRecipient) -> Self {
    Self { recipient, chain: Vec::new() }
  }

  pub fn is_natural(&self) -> bool { self.chain.is_empty() }

  /// The last hop before this recipient.
  pub fn forwarded_from(&self) -> Option<i64> { self.chain.last().map(|r| r.id) }
}

pub type Targets = BTreeMap<i64, Target>;

/// Apply the active forwards to `input`. Failures are logged and the input
/// is returned unchanged.
pub async fn expand<S: Store>(store: &S, input: Targets, now: DateTime<Utc>) -> Targets {
  match try_expand(store, input.clone(), now).await {
    Ok(out) => out,
    Err(e) => {
      tracing::warn!(error = %e, "forward resolution failed; using direct recipients");
      input
    }
  }
}

async fn try_expand<S: Store>(store: &S, mut set: Targets, now: DateTime<Utc>) -> Result<Targets> {
  let mut queue: VecDeque<i64> = set.keys().copied().collect();
  let mut seen                 = HashSet::new();

  while let Some(id) = queue.pop_front() {
    if !seen.insert(id) {
      continue;
    }
    let Some(source) = set.get(&id).cloned() else { continue };

    let active: Vec<_> = store
      .forwards_from(id)
      .await?
      .into_iter()
      .filter(|f| f.is_active(now))
      .collect();
    if active.is_empty() {
      continue;
    }

    let keep          = active.iter().any(|f| f.user_keeps_copy);
    let mut delivered = false;
    for f in &active {
      let dest = f.dest_recipient_id;
      if dest == id || (seen.contains(&dest) && !set.contains_key(&dest)) {
        // Back into a recipient this walk already forwarded away.
        continue;
      }
      delivered = true;
      if set.contains_key(&dest) {
        continue;
      }

      let recipient = store.get_recipient(dest).await?;
      let mut chain = source.chain.clone();
      chain.push(source.recipient.clone());
      set.insert(dest, Target { recipient, chain });
      queue.push_back(dest);
    }

    if !keep && delivered {
      set.remove(&id);
    }
  }

  Ok(set)
}
