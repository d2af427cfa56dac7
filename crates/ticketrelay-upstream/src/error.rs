//! Error type for `ticketrelay-upstream`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{url} → {status}: {body}")]
  Status {
    url:    String,
    status: reqwest::StatusCode,
    body:   String,
  },

  #[error("{kind} not found: {id}")]
  NotFound { kind: &'static str, id: String },

  #[error("invalid client configuration: {0}")]
  Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for ticketrelay_core::Error {
  fn from(err: Error) -> Self {
    use ticketrelay_core::Error as Core;

    match err {
      Error::NotFound { kind, id } => Core::NotFound { kind, id },
      Error::Config(msg) => Core::InvalidInput(msg),
      other => Core::Upstream(other.to_string()),
    }
  }
}
