//! Handlers for `/forwards` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/forwards` | Every forward, by ID |
//! | `POST`   | `/forwards` | Body: [`NewForward`]; 201, 400 if the window ends before it starts |
//! | `GET`    | `/forwards/:id` | 404 if not found |
//! | `PUT`    | `/forwards/:id` | Body: [`NewForward`] |
//! | `DELETE` | `/forwards/:id` | 204 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ticketrelay_core::{
  notifier::{NewForward, NotifierForward},
  store::Store,
  upstream::{Chat, Psa},
};
use ticketrelay_engine::Relay;

use crate::error::ApiError;

/// `GET /forwards`
pub async fn list<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
) -> Result<Json<Vec<NotifierForward>>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.store().list_forwards().await?))
}

/// `POST /forwards`
pub async fn create<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Json(body): Json<NewForward>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  let forward = relay.store().insert_forward(body).await?;
  tracing::info!(
    forward = forward.id,
    source = forward.source_recipient_id,
    dest = forward.dest_recipient_id,
    "forward created"
  );
  Ok((StatusCode::CREATED, Json(forward)))
}

/// `GET /forwards/:id`
pub async fn get_one<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Path(id): Path<i64>,
) -> Result<Json<NotifierForward>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.store().get_forward(id).await?))
}

/// `PUT /forwards/:id`
pub async fn update<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Path(id): Path<i64>,
  Json(body): Json<NewForward>,
) -> Result<Json<NotifierForward>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.store().update_forward(id, body).await?))
}

/// `DELETE /forwards/:id`
pub async fn remove<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  relay.store().delete_forward(id).await?;
  tracing::info!(forward = id, "forward deleted");
  Ok(StatusCode::NO_CONTENT)
}
