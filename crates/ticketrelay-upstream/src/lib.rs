//! REST clients for the relay's upstream collaborators.
//!
//! [`ConnectWise`] implements [`ticketrelay_core::upstream::Psa`] against a
//! ConnectWise Manage style helpdesk API; [`Webex`] implements
//! [`ticketrelay_core::upstream::Chat`] against a Webex style messaging API.

pub mod connectwise;
pub mod error;
pub mod webex;

mod http;
mod wire;

pub use connectwise::{ConnectWise, ConnectWiseConfig};
pub use error::{Error, Result};
pub use webex::{Webex, WebexConfig};
