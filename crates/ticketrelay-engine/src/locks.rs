//! Per-ticket serialisation.
//!
//! Entries are created on first sighting and never removed.

use std::{
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct TicketLocks {
  locks: RwLock<HashMap<i64, Arc<Mutex<()>>>>,
}

impl TicketLocks {
  pub fn new() -> Self { Self::default() }

  /// Wait until no other pipeline holds `ticket_id`, then hold it until the
  /// guard is dropped.
  pub async fn lock(&self, ticket_id: i64) -> OwnedMutexGuard<()> {
    let mutex = self.entry(ticket_id);
    match mutex.clone().try_lock_owned() {
      Ok(guard) => guard,
      Err(_) => {
        tracing::debug!(ticket_id, "waiting for ticket lock");
        mutex.lock_owned().await
      }
    }
  }

  fn entry(&self, ticket_id: i64) -> Arc<Mutex<()>> {
    if let Some(m) = self.locks.read().unwrap_or_else(PoisonError::into_inner).get(&ticket_id) {
      return m.clone();
    }
    self
      .locks
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(ticket_id)
      .or_default()
      .clone()
  }

  pub fn len(&self) -> usize {
    self.locks.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
