//! Read-only listings for the admin UI.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/boards` | Mirrored boards, deleted ones excluded |
//! | `GET`  | `/recipients` | Optional `?kind=room\|person` |
//! | `GET`  | `/rooms` | Live chat rooms, served through the recipient cache |
//! | `GET`  | `/tickets/:id/notifications` | The ticket's notification ledger |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use ticketrelay_core::{
  entity::Board,
  notifier::TicketNotification,
  recipient::{ChatRecipient, RecipientKind},
  store::{Mirror, Store},
  upstream::{Chat, ChatRoom, Psa},
};
use ticketrelay_engine::Relay;

use crate::error::ApiError;

/// `GET /boards`
pub async fn boards<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
) -> Result<Json<Vec<Board>>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(Mirror::<Board>::list(relay.store()).await?))
}

#[derive(Debug, Deserialize)]
pub struct RecipientParams {
  pub kind: Option<RecipientKind>,
}

/// `GET /recipients[?kind=<kind>]`
pub async fn recipients<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Query(params): Query<RecipientParams>,
) -> Result<Json<Vec<ChatRecipient>>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.store().list_recipients(params.kind).await?))
}

/// `GET /rooms`
pub async fn rooms<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
) -> Result<Json<Vec<ChatRoom>>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.recipients().list_rooms().await?))
}

/// `GET /tickets/:id/notifications`
pub async fn notifications<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Path(ticket_id): Path<i64>,
) -> Result<Json<Vec<TicketNotification>>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.store().notifications_for_ticket(ticket_id).await?))
}
