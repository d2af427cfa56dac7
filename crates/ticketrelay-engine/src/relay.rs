//! [`Relay`] is the engine's single entry point, shared behind an `Arc` by
//! the webhook handler, the control API and the sync driver.

use std::time::Duration;

use tokio::sync::RwLock;
use ticketrelay_core::{
  Result,
  config::Config,
  event::Reason,
  store::{Store, Transaction},
  upstream::{Chat, Psa},
};

use crate::{
  cache::DEFAULT_TTL,
  locks::TicketLocks,
  message::TicketLinks,
  recipients::RecipientResolver,
  sync::SyncFlags,
};

#[derive(Debug, Clone)]
pub struct RelayOptions {
  pub links:               TicketLinks,
  pub recipient_cache_ttl: Duration,
}

impl Default for RelayOptions {
  fn default() -> Self {
    Self { links: TicketLinks::default(), recipient_cache_ttl: DEFAULT_TTL }
  }
}

/// What [`Relay::process`] did with one ticket event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Deleted,
  Skipped(Reason),
  /// Messages were attempted; `failed` of them could not be posted.
  Notified { sent: usize, failed: usize },
}

pub struct Relay<S, P, C> {
  pub(crate) store:      S,
  pub(crate) psa:        P,
  pub(crate) recipients: RecipientResolver<S, C>,
  pub(crate) locks:      TicketLocks,
  pub(crate) links:      TicketLinks,
  pub(crate) syncs:      SyncFlags,
  config:                RwLock<Config>,
}

impl<S: Store, P: Psa, C: Chat> Relay<S, P, C> {
  /// Build a relay, loading the runtime configuration from `store`.
  pub async fn new(store: S, psa: P, chat: C, options: RelayOptions) -> Result<Self> {
    let config = store.get_config().await?;
    tracing::debug!(?config, "loaded runtime config");
    Ok(Self {
      recipients: RecipientResolver::new(store.clone(), chat, options.recipient_cache_ttl),
      store,
      psa,
      locks: TicketLocks::new(),
      links: options.links,
      syncs: SyncFlags::default(),
      config: RwLock::new(config),
    })
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn psa(&self) -> &P { &self.psa }

  pub fn chat(&self) -> &C { self.recipients.chat() }

  pub fn recipients(&self) -> &RecipientResolver<S, C> { &self.recipients }

  pub async fn config(&self) -> Config { self.config.read().await.clone() }

  /// Validate, persist and install a new runtime configuration.
  pub async fn put_config(&self, config: Config) -> Result<Config> {
    config.validate()?;
    let mut live = self.config.write().await;
    let stored   = self.store.put_config(config).await?;
    *live = stored.clone();
    tracing::info!(config = ?stored, "runtime config updated");
    Ok(stored)
  }
}

/// Commit `tx` if `result` is `Ok`, otherwise roll it back and return the
/// original error.
pub(crate) async fn finish<T, X: Transaction>(tx: X, result: Result<T>) -> Result<T> {
  match result {
    Ok(value) => {
      tx.commit().await?;
      Ok(value)
    }
    Err(e) => {
      if let Err(rollback) = tx.rollback().await {
        tracing::warn!(error = %rollback, "rollback failed");
      }
      Err(e)
    }
  }
}
