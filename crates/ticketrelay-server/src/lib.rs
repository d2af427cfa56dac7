//! Process wiring for the ticket relay: static configuration, the Basic-auth
//! guard for the control API, and the assembled HTTP application.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, middleware};
use serde::Deserialize;
use ticketrelay_core::{
  store::Store,
  upstream::{Chat, Psa},
};
use ticketrelay_engine::{Relay, RelayOptions, TicketLinks};
use ticketrelay_upstream::{ConnectWiseConfig, WebexConfig};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_auth};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Static server configuration, deserialised from `config.toml` and
/// `TICKETRELAY__*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                     String,
  #[serde(default = "default_port")]
  pub port:                     u16,
  pub store_path:               PathBuf,
  pub admin_username:           String,
  /// PHC string produced by argon2; see `--hash-password`.
  pub admin_password_hash:      String,
  #[serde(default = "default_cache_ttl")]
  pub recipient_cache_ttl_secs: u64,
  pub psa:                      PsaSettings,
  pub chat:                     WebexConfig,
}

#[derive(Deserialize, Clone)]
pub struct PsaSettings {
  #[serde(flatten)]
  pub client:           ConnectWiseConfig,
  /// The PSA's ticket page; ticket links append `?service_recid=...`.
  #[serde(default = "default_ticket_link_base")]
  pub ticket_link_base: String,
}

fn default_host() -> String { "0.0.0.0".into() }

fn default_port() -> u16 { 8080 }

fn default_cache_ttl() -> u64 { 900 }

fn default_ticket_link_base() -> String {
  "https://na.myconnectwise.net/v4_6_release/services/system_io/Service/fv_sr100_request.rails"
    .into()
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn relay_options(&self) -> RelayOptions {
    RelayOptions {
      links:               TicketLinks {
        base:       self.psa.ticket_link_base.clone(),
        company_id: self.psa.client.company_id.clone(),
      },
      recipient_cache_ttl: Duration::from_secs(self.recipient_cache_ttl_secs),
    }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.admin_username.clone(),
      password_hash: self.admin_password_hash.clone(),
    }
  }
}

// ─── Application ──────────────────────────────────────────────────────────────

/// The webhook (unauthenticated) merged with the control API (Basic auth),
/// with request tracing over both.
pub fn app<S, P, C>(relay: Arc<Relay<S, P, C>>, auth: AuthConfig) -> Router
where
  S: Store,
  P: Psa,
  C: Chat,
{
  let control = ticketrelay_api::control_router(relay.clone())
    .layer(middleware::from_fn_with_state(Arc::new(auth), require_auth));

  ticketrelay_api::hooks_router(relay).merge(control).layer(TraceLayer::new_for_http())
}
