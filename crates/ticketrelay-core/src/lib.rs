//! Core types and trait definitions for the ticket relay.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! storage backend, the upstream clients and the engine all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod notifier;
pub mod recipient;
pub mod store;
pub mod upstream;

pub use error::{Error, Result};
