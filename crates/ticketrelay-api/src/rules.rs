//! Handlers for `/rules` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/rules` | Every rule, by ID |
//! | `POST`   | `/rules` | Body: [`NewRule`]; 201, 409 on a duplicate board+recipient |
//! | `GET`    | `/rules/:id` | 404 if not found |
//! | `PUT`    | `/rules/:id` | Body: [`NewRule`] |
//! | `DELETE` | `/rules/:id` | 204 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ticketrelay_core::{
  notifier::{NewRule, NotifierRule},
  store::Store,
  upstream::{Chat, Psa},
};
use ticketrelay_engine::Relay;

use crate::error::ApiError;

/// `GET /rules`
pub async fn list<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
) -> Result<Json<Vec<NotifierRule>>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.store().list_rules().await?))
}

/// `POST /rules`, body: `{"board_id":42,"recipient_id":1,"notify_enabled":true}`
pub async fn create<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Json(body): Json<NewRule>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  let rule = relay.store().insert_rule(body).await?;
  tracing::info!(
    rule = rule.id,
    board_id = rule.board_id,
    recipient = rule.recipient_id,
    "rule created"
  );
  Ok((StatusCode::CREATED, Json(rule)))
}

/// `GET /rules/:id`
pub async fn get_one<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Path(id): Path<i64>,
) -> Result<Json<NotifierRule>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.store().get_rule(id).await?))
}

/// `PUT /rules/:id`
pub async fn update<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Path(id): Path<i64>,
  Json(body): Json<NewRule>,
) -> Result<Json<NotifierRule>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.store().update_rule(id, body).await?))
}

/// `DELETE /rules/:id`
pub async fn remove<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  relay.store().delete_rule(id).await?;
  tracing::info!(rule = id, "rule deleted");
  Ok(StatusCode::NO_CONTENT)
}
