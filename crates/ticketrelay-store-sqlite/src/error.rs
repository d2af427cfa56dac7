//! Error type for `ticketrelay-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("{kind} not found: {id}")]
  NotFound { kind: &'static str, id: String },

  #[error("transaction is no longer open")]
  TxClosed,

  #[error("transactions cannot be nested")]
  NestedTx,
}

impl Error {
  pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
    Error::NotFound { kind, id: id.to_string() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// SQLite extended result codes for the two constraint failures callers care
// about.
const CONSTRAINT_FOREIGNKEY: i32 = 787;
const CONSTRAINT_PRIMARYKEY: i32 = 1555;
const CONSTRAINT_UNIQUE: i32 = 2067;

impl From<Error> for ticketrelay_core::Error {
  fn from(err: Error) -> Self {
    use ticketrelay_core::Error as Core;

    match err {
      Error::NotFound { kind, id } => Core::NotFound { kind, id },
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
        failure,
        message,
      ))) if failure.code == ErrorCode::ConstraintViolation => {
        let detail = message.unwrap_or_else(|| failure.to_string());
        match failure.extended_code {
          CONSTRAINT_UNIQUE | CONSTRAINT_PRIMARYKEY => Core::Conflict(detail),
          CONSTRAINT_FOREIGNKEY => {
            Core::InvalidInput(format!("referenced row does not exist ({detail})"))
          }
          _ => Core::InvalidInput(detail),
        }
      }
      other => Core::Store(Box::new(other)),
    }
  }
}
