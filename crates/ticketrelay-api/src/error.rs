//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use ticketrelay_core::Error as CoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) => match e.root() {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) | CoreError::AlreadyRunning(_) => StatusCode::CONFLICT,
        CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoreError::Upstream(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_sees_through_stage_labels() {
    let err = ApiError::from(CoreError::Upstream("timeout".into()).in_stage("fetch"));
    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

    let err = ApiError::from(CoreError::not_found("rule", 9));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let err = ApiError::from(CoreError::AlreadyRunning("tickets"));
    assert_eq!(err.status(), StatusCode::CONFLICT);

    let err = ApiError::from(CoreError::Send("nope".into()));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
