//! Shared request plumbing: base URLs, retries, status mapping.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Retries after the first attempt for network errors, 429 and 5xx.
pub(crate) const RETRIES: u32 = 3;

const BACKOFF: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub(crate) struct Rest {
  pub client: Client,
  base_url:   String,
}

impl Rest {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
  }

  pub fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path.trim_start_matches('/'))
  }

  /// Send `req`, retrying transient failures. Non-success responses that
  /// survive the retries become [`Error::Status`].
  pub async fn send(&self, req: RequestBuilder) -> Result<Response> {
    let mut attempt = 0;
    loop {
      let this_try = req
        .try_clone()
        .ok_or_else(|| Error::Config("request body cannot be retried".into()))?;

      match this_try.send().await {
        Ok(resp) if resp.status().is_success() => return Ok(resp),
        Ok(resp) if is_transient(resp.status()) && attempt < RETRIES => {
          tracing::debug!(status = %resp.status(), url = %resp.url(), attempt, "retrying");
        }
        Ok(resp) => return Err(status_error(resp).await),
        Err(e) if (e.is_connect() || e.is_timeout() || e.is_request()) && attempt < RETRIES => {
          tracing::debug!(error = %e, attempt, "retrying after transport error");
        }
        Err(e) => return Err(e.into()),
      }

      attempt += 1;
      tokio::time::sleep(BACKOFF * attempt).await;
    }
  }

  pub async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
    Ok(self.send(req).await?.json().await?)
  }
}

fn is_transient(status: StatusCode) -> bool {
  status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

async fn status_error(resp: Response) -> Error {
  let status = resp.status();
  let url    = resp.url().to_string();
  let body   = resp.text().await.unwrap_or_default();
  Error::Status { url, status, body }
}

impl Error {
  /// Turn a 404 into a typed `NotFound` for `kind`/`id`.
  pub(crate) fn or_not_found(self, kind: &'static str, id: impl ToString) -> Self {
    match self {
      Error::Status { status: StatusCode::NOT_FOUND, .. } => {
        Error::NotFound { kind, id: id.to_string() }
      }
      other => other,
    }
  }
}
