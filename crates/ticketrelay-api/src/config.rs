//! Handlers for `/config`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/config` | The live runtime configuration |
//! | `PUT`  | `/config` | Full replacement; missing fields take their defaults |

use std::sync::Arc;

use axum::{Json, extract::State};
use ticketrelay_core::{
  config::Config,
  store::Store,
  upstream::{Chat, Psa},
};
use ticketrelay_engine::Relay;

use crate::error::ApiError;

/// `GET /config`
pub async fn get_config<S, P, C>(State(relay): State<Arc<Relay<S, P, C>>>) -> Json<Config>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Json(relay.config().await)
}

/// `PUT /config`
pub async fn put_config<S, P, C>(
  State(relay): State<Arc<Relay<S, P, C>>>,
  Json(body): Json<Config>,
) -> Result<Json<Config>, ApiError>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Ok(Json(relay.put_config(body).await?))
}
