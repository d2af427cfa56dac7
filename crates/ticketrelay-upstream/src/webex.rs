//! [`Webex`]: the chat client.

use std::time::Duration;

use serde::Deserialize;
use ticketrelay_core::{
  Result as CoreResult,
  upstream::{Chat, ChatPerson, ChatRoom, OutboundMessage},
};

use crate::{
  Error, Result,
  http::Rest,
  wire::{WxItems, WxMessage, WxPerson, WxRoom},
};

#[derive(Debug, Clone, Deserialize)]
pub struct WebexConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Bot access token.
  pub token:    String,
}

fn default_base_url() -> String { "https://webexapis.com/v1".into() }

#[derive(Clone)]
pub struct Webex {
  rest:  Rest,
  token: String,
}

impl Webex {
  pub fn new(config: WebexConfig) -> Result<Self> {
    if config.token.trim().is_empty() {
      return Err(Error::Config("chat token is required".into()));
    }
    let rest = Rest::new(&config.base_url, Duration::from_secs(30))?;
    Ok(Self { rest, token: config.token })
  }
}

impl Chat for Webex {
  async fn post_message(&self, message: OutboundMessage) -> CoreResult<()> {
    let req = self
      .rest
      .client
      .post(self.rest.url("messages"))
      .bearer_auth(&self.token)
      .json(&WxMessage::from(&message));
    self.rest.send(req).await?;
    Ok(())
  }

  async fn list_rooms(&self) -> CoreResult<Vec<ChatRoom>> {
    let req = self
      .rest
      .client
      .get(self.rest.url("rooms"))
      .bearer_auth(&self.token)
      .query(&[("max", "1000")]);
    let rooms: WxItems<WxRoom> = self.rest.json(req).await?;
    Ok(rooms.items.into_iter().map(ChatRoom::from).collect())
  }

  async fn people_by_email(&self, email: &str) -> CoreResult<Vec<ChatPerson>> {
    let req = self
      .rest
      .client
      .get(self.rest.url("people"))
      .bearer_auth(&self.token)
      .query(&[("email", email)]);
    let people: WxItems<WxPerson> = self.rest.json(req).await?;
    Ok(people.items.into_iter().map(ChatPerson::from).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_token_is_rejected() {
    let cfg = WebexConfig { base_url: default_base_url(), token: "  ".into() };
    assert!(matches!(Webex::new(cfg), Err(Error::Config(_))));
  }

  #[test]
  fn base_url_defaults() {
    let cfg: WebexConfig = serde_json::from_str(r#"{ "token": "t" }"#).unwrap();
    assert_eq!(cfg.base_url, "https://webexapis.com/v1");
  }
}
