//! `POST /sync`: start a background sync and return immediately.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use ticketrelay_core::{
  Error,
  store::Store,
  upstream::{Chat, Psa},
};
use ticketrelay_engine::{Relay, SyncRequest};

use crate::error::ApiError;

/// `POST /sync`, body: `{"cw_boards":true,"webex_recipients":false,...}`
///
/// 202 once started, 409 if a requested kind is already in flight. Progress
/// and failures after that are only logged.
pub async fn start<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Json(req): Json<SyncRequest>,
) -> Result<StatusCode, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  if let Some(kind) = relay.running_sync(&req) {
    return Err(Error::AlreadyRunning(kind).into());
  }
  tracing::info!(?req, "sync requested");
  tokio::spawn(async move {
    let report = relay.sync(req).await;
    tracing::info!(?report, "sync finished");
  });
  Ok(StatusCode::ACCEPTED)
}
