//! [`ConnectWise`]: the PSA client.
//!
//! Authenticates with Basic auth as `company+public_key:private_key` plus a
//! `clientId` header, as the ConnectWise Manage REST API expects.

use std::time::Duration;

use serde::Deserialize;
use ticketrelay_core::{
  Result as CoreResult,
  entity::{Board, Company, Contact, Member, Ticket, TicketNote, TicketStatus},
  upstream::Psa,
};

use crate::{
  Error, Result,
  http::Rest,
  wire::{CwBoard, CwCompany, CwContact, CwId, CwMember, CwNote, CwStatus, CwTicket},
};

const PAGE_SIZE: usize = 100;

/// Connection settings, deserialised from the `[psa]` config table.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectWiseConfig {
  #[serde(default = "default_base_url")]
  pub base_url:    String,
  /// The company name entered at PSA login.
  pub company_id:  String,
  pub public_key:  String,
  pub private_key: String,
  pub client_id:   String,
}

fn default_base_url() -> String {
  "https://api-na.myconnectwise.net/v4_6_release/apis/3.0".into()
}

#[derive(Clone)]
pub struct ConnectWise {
  rest:   Rest,
  config: ConnectWiseConfig,
}

impl ConnectWise {
  pub fn new(config: ConnectWiseConfig) -> Result<Self> {
    if config.company_id.is_empty() || config.public_key.is_empty() {
      return Err(Error::Config("psa company_id and public_key are required".into()));
    }
    let rest = Rest::new(&config.base_url, Duration::from_secs(30))?;
    Ok(Self { rest, config })
  }

  fn get(&self, path: &str) -> reqwest::RequestBuilder {
    self
      .rest
      .client
      .get(self.rest.url(path))
      .basic_auth(
        format!("{}+{}", self.config.company_id, self.config.public_key),
        Some(&self.config.private_key),
      )
      .header("clientId", &self.config.client_id)
  }

  async fn one<T, W>(&self, path: &str, kind: &'static str, id: i64) -> Result<T>
  where
    W: serde::de::DeserializeOwned,
    T: From<W>,
  {
    let wire: W = self
      .rest
      .json(self.get(path))
      .await
      .map_err(|e| e.or_not_found(kind, id))?;
    Ok(wire.into())
  }

  /// Follow `page` until a short page comes back.
  async fn all<W>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<W>>
  where
    W: serde::de::DeserializeOwned,
  {
    let mut out  = Vec::new();
    let mut page = 1usize;
    loop {
      let req = self
        .get(path)
        .query(query)
        .query(&[("page", page.to_string()), ("pageSize", PAGE_SIZE.to_string())]);
      let batch: Vec<W> = self.rest.json(req).await?;
      let short         = batch.len() < PAGE_SIZE;
      out.extend(batch);
      if short {
        return Ok(out);
      }
      page += 1;
    }
  }
}

/// `closedFlag = false AND (board/id = 1 OR board/id = 2)`.
pub(crate) fn open_ticket_conditions(board_ids: &[i64]) -> String {
  if board_ids.is_empty() {
    return "closedFlag = false".into();
  }
  let boards = board_ids
    .iter()
    .map(|id| format!("board/id = {id}"))
    .collect::<Vec<_>>()
    .join(" OR ");
  format!("closedFlag = false AND ({boards})")
}

impl Psa for ConnectWise {
  async fn ticket(&self, id: i64) -> CoreResult<Ticket> {
    Ok(self.one::<Ticket, CwTicket>(&format!("service/tickets/{id}"), "ticket", id).await?)
  }

  async fn latest_note(&self, ticket_id: i64) -> CoreResult<Option<TicketNote>> {
    let req = self
      .get(&format!("service/tickets/{ticket_id}/notes"))
      .query(&[("orderBy", "id desc"), ("pageSize", "1")]);
    let notes: Vec<CwNote> = self
      .rest
      .json(req)
      .await
      .map_err(|e| e.or_not_found("ticket", ticket_id))?;
    Ok(notes.into_iter().next().map(TicketNote::from))
  }

  async fn note(&self, ticket_id: i64, note_id: i64) -> CoreResult<TicketNote> {
    let path = format!("service/tickets/{ticket_id}/notes/{note_id}");
    Ok(self.one::<TicketNote, CwNote>(&path, "ticket note", note_id).await?)
  }

  async fn board(&self, id: i64) -> CoreResult<Board> {
    Ok(self.one::<Board, CwBoard>(&format!("service/boards/{id}"), "board", id).await?)
  }

  async fn status(&self, board_id: i64, status_id: i64) -> CoreResult<TicketStatus> {
    let wire: CwStatus = self
      .rest
      .json(self.get(&format!("service/boards/{board_id}/statuses/{status_id}")))
      .await
      .map_err(|e| e.or_not_found("ticket status", status_id))?;
    Ok(wire.into_status(board_id))
  }

  async fn company(&self, id: i64) -> CoreResult<Company> {
    Ok(self.one::<Company, CwCompany>(&format!("company/companies/{id}"), "company", id).await?)
  }

  async fn contact(&self, id: i64) -> CoreResult<Contact> {
    Ok(self.one::<Contact, CwContact>(&format!("company/contacts/{id}"), "contact", id).await?)
  }

  async fn member(&self, id: i64) -> CoreResult<Member> {
    Ok(self.one::<Member, CwMember>(&format!("system/members/{id}"), "member", id).await?)
  }

  async fn member_by_identifier(&self, identifier: &str) -> CoreResult<Member> {
    let req = self
      .get("system/members")
      .query(&[("conditions", format!("identifier = \"{identifier}\""))]);
    let found: Vec<CwMember> = self.rest.json(req).await?;
    found
      .into_iter()
      .next()
      .map(Member::from)
      .ok_or_else(|| ticketrelay_core::Error::not_found("member", identifier))
  }

  async fn list_boards(&self) -> CoreResult<Vec<Board>> {
    let boards: Vec<CwBoard> = self.all("service/boards", &[]).await?;
    Ok(boards.into_iter().map(Board::from).collect())
  }

  async fn list_members(&self) -> CoreResult<Vec<Member>> {
    let members: Vec<CwMember> = self
      .all("system/members", &[("conditions", "inactiveFlag = false".to_string())])
      .await?;
    Ok(members.into_iter().map(Member::from).collect())
  }

  async fn list_open_tickets(&self, board_ids: &[i64]) -> CoreResult<Vec<i64>> {
    let query = [
      ("conditions", open_ticket_conditions(board_ids)),
      ("fields", "id".to_string()),
    ];
    let ids: Vec<CwId> = self.all("service/tickets", &query).await?;
    Ok(ids.into_iter().map(|t| t.id).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conditions_without_boards() {
    assert_eq!(open_ticket_conditions(&[]), "closedFlag = false");
  }

  #[test]
  fn conditions_with_boards() {
    assert_eq!(
      open_ticket_conditions(&[1, 2]),
      "closedFlag = false AND (board/id = 1 OR board/id = 2)"
    );
  }

  #[test]
  fn missing_credentials_are_rejected() {
    let cfg = ConnectWiseConfig {
      base_url:    default_base_url(),
      company_id:  String::new(),
      public_key:  "pk".into(),
      private_key: "sk".into(),
      client_id:   "cid".into(),
    };
    assert!(matches!(ConnectWise::new(cfg), Err(Error::Config(_))));
  }
}
