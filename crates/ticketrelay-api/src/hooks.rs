//! The PSA ticket webhook.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/hooks/tickets` | Body `{"ID": 123, "Action": "updated", ...}`; 204 once queued |
//!
//! A well-formed event is answered as soon as it is queued. Processing runs
//! on its own task, so a caller that hangs up cannot cut a send loop short;
//! outcomes and failures are only logged.

use std::{str::FromStr as _, sync::Arc};

use axum::{extract::State, http::StatusCode};
use bytes::Bytes;
use serde::Deserialize;
use ticketrelay_core::{
  event::Action,
  store::Store,
  upstream::{Chat, Psa},
};
use ticketrelay_engine::Relay;

use crate::error::ApiError;

/// The fields of a PSA callback the relay reads; everything else is
/// ignored.
#[derive(Debug, Deserialize)]
pub struct TicketEvent {
  #[serde(rename = "ID")]
  pub id:     i64,
  #[serde(rename = "Action")]
  pub action: String,
}

impl TicketEvent {
  pub fn parse(body: &[u8]) -> Result<(i64, Action), ApiError> {
    let event: TicketEvent = serde_json::from_slice(body)
      .map_err(|e| ApiError::BadRequest(format!("malformed ticket event: {e}")))?;
    if event.id <= 0 {
      return Err(ApiError::BadRequest(format!("invalid ticket id {}", event.id)));
    }
    let action = Action::from_str(event.action.trim())
      .map_err(|_| ApiError::BadRequest(format!("unknown action {:?}", event.action)))?;
    Ok((event.id, action))
  }
}

/// `POST /hooks/tickets`
pub async fn ticket<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  body: Bytes,
) -> Result<StatusCode, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  let (ticket_id, action) = TicketEvent::parse(&body)?;
  tracing::debug!(ticket_id, %action, "ticket event received");
  relay.spawn_process(ticket_id, action, false);
  Ok(StatusCode::NO_CONTENT)
}
