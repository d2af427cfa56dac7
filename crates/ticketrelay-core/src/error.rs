//! Error types for `ticketrelay-core`.
//!
//! Every layer above the store speaks this error type, so the kinds that
//! callers branch on (`NotFound`, `Conflict`, ...) stay distinguishable from
//! the store up to the HTTP surface.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A missing row, or a 404 from an upstream API.
  #[error("{kind} not found: {id}")]
  NotFound { kind: &'static str, id: String },

  /// 5xx or network failure talking to the PSA or the chat platform.
  #[error("upstream unavailable: {0}")]
  Upstream(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A single chat post failed. Never propagated out of the pipeline.
  #[error("send failed: {0}")]
  Send(String),

  #[error("{0} sync is already running")]
  AlreadyRunning(&'static str),

  /// A background task panicked or was aborted.
  #[error("task failed: {0}")]
  Task(String),

  /// A pipeline stage failed; `stage` names which one.
  #[error("{stage}: {source}")]
  Stage {
    stage:  &'static str,
    #[source]
    source: Box<Error>,
  },
}

impl Error {
  pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
    Error::NotFound { kind, id: id.to_string() }
  }

  /// Wrap `self` with the label of the pipeline stage it escaped from.
  pub fn in_stage(self, stage: &'static str) -> Self {
    Error::Stage { stage, source: Box::new(self) }
  }

  /// The innermost error, looking through any stage labels.
  pub fn root(&self) -> &Error {
    match self {
      Error::Stage { source, .. } => source.root(),
      other => other,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self.root(), Error::NotFound { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stage_labels_do_not_hide_not_found() {
    let err = Error::not_found("ticket", 7).in_stage("fetch").in_stage("process");
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "process: fetch: ticket not found: 7");
  }

  #[test]
  fn root_of_plain_error_is_itself() {
    let err = Error::Conflict("dup".into());
    assert!(matches!(err.root(), Error::Conflict(_)));
    assert!(!err.is_not_found());
  }
}
