//! JSON HTTP surface for the ticket relay.
//!
//! Two axum [`Router`]s backed by a shared [`Relay`]: the PSA webhook, and
//! the control API used by the admin UI. Auth, TLS, and transport concerns
//! are the caller's responsibility; the binary guards only the control API.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new()
//!   .merge(ticketrelay_api::hooks_router(relay.clone()))
//!   .merge(ticketrelay_api::control_router(relay).layer(basic_auth))
//! ```

pub mod config;
pub mod error;
pub mod forwards;
pub mod hooks;
pub mod listings;
pub mod rules;
pub mod sync;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use ticketrelay_core::{
  store::Store,
  upstream::{Chat, Psa},
};
use ticketrelay_engine::Relay;

pub use error::ApiError;

/// `POST /hooks/tickets`.
pub fn hooks_router<S, P, C>(relay: Arc<Relay<S, P, C>>) -> Router<()>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Router::new().route("/hooks/tickets", post(hooks::ticket::<S, P, C>)).with_state(relay)
}

/// Config, sync, rules, forwards and the read-only listings.
pub fn control_router<S, P, C>(relay: Arc<Relay<S, P, C>>) -> Router<()>
where
  S: Store,
  P: Psa,
  C: Chat,
{
  Router::new()
    // Runtime config
    .route("/config", get(config::get_config::<S, P, C>).put(config::put_config::<S, P, C>))
    // Sync
    .route("/sync", post(sync::start::<S, P, C>))
    // Rules
    .route("/rules", get(rules::list::<S, P, C>).post(rules::create::<S, P, C>))
    .route(
      "/rules/{id}",
      get(rules::get_one::<S, P, C>)
        .put(rules::update::<S, P, C>)
        .delete(rules::remove::<S, P, C>),
    )
    // Forwards
    .route("/forwards", get(forwards::list::<S, P, C>).post(forwards::create::<S, P, C>))
    .route(
      "/forwards/{id}",
      get(forwards::get_one::<S, P, C>)
        .put(forwards::update::<S, P, C>)
        .delete(forwards::remove::<S, P, C>),
    )
    // Listings
    .route("/boards", get(listings::boards::<S, P, C>))
    .route("/recipients", get(listings::recipients::<S, P, C>))
    .route("/rooms", get(listings::rooms::<S, P, C>))
    .route("/tickets/{id}/notifications", get(listings::notifications::<S, P, C>))
    .with_state(relay)
}

#[cfg(test)]
mod tests;
