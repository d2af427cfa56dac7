//! The runtime configuration singleton, persisted in the store.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Master switch; when off every ticket is gated with `ATTEMPT_NOTIFY_OFF`.
  pub attempt_notify:       bool,
  /// Note excerpts longer than this many characters are cut with `...`.
  pub max_message_length:   usize,
  pub max_concurrent_syncs: usize,
  pub skip_launch_syncs:    bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      attempt_notify:       false,
      max_message_length:   300,
      max_concurrent_syncs: 5,
      skip_launch_syncs:    false,
    }
  }
}

impl Config {
  pub fn validate(&self) -> Result<()> {
    if self.max_message_length == 0 {
      return Err(Error::InvalidInput("max_message_length must be at least 1".into()));
    }
    if self.max_concurrent_syncs == 0 {
      return Err(Error::InvalidInput("max_concurrent_syncs must be at least 1".into()));
    }
    Ok(())
  }
}
