//! The relay engine: PSA mirroring, recipient resolution, forwarding, the
//! notification gate, message rendering, the ticket pipeline and sync.
//!
//! Generic over the [`Store`](ticketrelay_core::store::Store),
//! [`Psa`](ticketrelay_core::upstream::Psa) and
//! [`Chat`](ticketrelay_core::upstream::Chat) implementations it is built
//! with; see [`Relay`].

pub mod cache;
pub mod forward;
pub mod gate;
pub mod locks;
pub mod message;
pub mod mirror;
pub mod recipients;
pub mod relay;
pub mod sync;

mod pipeline;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use message::TicketLinks;
pub use relay::{Outcome, Relay, RelayOptions};
pub use sync::{SyncReport, SyncRequest};
