//! JSON shapes of the upstream APIs and their conversion into core types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketrelay_core::{
  entity::{Board, Company, Contact, Member, Ticket, TicketNote, TicketStatus},
  upstream::{ChatPerson, ChatRoom, MessageTarget, OutboundMessage},
};

// ─── ConnectWise ─────────────────────────────────────────────────────────────

/// A `{ "id": .., "name": .. }` style reference embedded in other records.
#[derive(Debug, Clone, Deserialize)]
pub struct CwRef {
  pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CwId {
  pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CwInfo {
  pub updated_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CwTicket {
  pub id:        i64,
  #[serde(default)]
  pub summary:   String,
  pub board:     CwRef,
  pub status:    CwRef,
  pub company:   CwRef,
  pub contact:   Option<CwRef>,
  pub owner:     Option<CwRef>,
  pub resources: Option<String>,
  #[serde(rename = "_info", default)]
  pub info:      CwInfo,
}

impl From<CwTicket> for Ticket {
  fn from(t: CwTicket) -> Self {
    Ticket {
      id:         t.id,
      summary:    t.summary,
      board_id:   t.board.id,
      status_id:  t.status.id,
      owner_id:   t.owner.map(|o| o.id),
      company_id: t.company.id,
      contact_id: t.contact.map(|c| c.id),
      resources:  t.resources.filter(|r| !r.trim().is_empty()),
      updated_by: t.info.updated_by,
      ..Default::default()
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CwNote {
  pub id:         i64,
  pub ticket_id:  i64,
  pub text:       Option<String>,
  pub created_by: Option<String>,
  pub member:     Option<CwRef>,
  pub contact:    Option<CwRef>,
}

impl From<CwNote> for TicketNote {
  fn from(n: CwNote) -> Self {
    // A note has one author; a member wins over a contact.
    let member_id  = n.member.map(|m| m.id);
    let contact_id = if member_id.is_some() { None } else { n.contact.map(|c| c.id) };
    TicketNote {
      id: n.id,
      ticket_id: n.ticket_id,
      member_id,
      contact_id,
      content: n.text,
      created_by: n.created_by,
      ..Default::default()
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CwBoard {
  pub id:   i64,
  pub name: String,
}

impl From<CwBoard> for Board {
  fn from(b: CwBoard) -> Self {
    Board { id: b.id, name: b.name, ..Default::default() }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CwStatus {
  pub id:            i64,
  pub name:          String,
  pub board:         Option<CwRef>,
  #[serde(default)]
  pub closed_status: bool,
  #[serde(default)]
  pub inactive:      bool,
}

impl CwStatus {
  pub fn into_status(self, board_id: i64) -> TicketStatus {
    TicketStatus {
      id:       self.id,
      board_id: self.board.map_or(board_id, |b| b.id),
      name:     self.name,
      closed:   self.closed_status,
      inactive: self.inactive,
      ..Default::default()
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CwCompany {
  pub id:   i64,
  pub name: String,
}

impl From<CwCompany> for Company {
  fn from(c: CwCompany) -> Self {
    Company { id: c.id, name: c.name, ..Default::default() }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CwContact {
  pub id:         i64,
  #[serde(default)]
  pub first_name: String,
  pub last_name:  Option<String>,
  pub company:    Option<CwRef>,
}

impl From<CwContact> for Contact {
  fn from(c: CwContact) -> Self {
    Contact {
      id:         c.id,
      first_name: c.first_name,
      last_name:  c.last_name,
      company_id: c.company.map(|co| co.id),
      ..Default::default()
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CwMember {
  pub id:            i64,
  pub identifier:    String,
  #[serde(default)]
  pub first_name:    String,
  pub last_name:     Option<String>,
  pub primary_email: Option<String>,
}

impl From<CwMember> for Member {
  fn from(m: CwMember) -> Self {
    Member {
      id:            m.id,
      identifier:    m.identifier,
      first_name:    m.first_name,
      last_name:     m.last_name,
      primary_email: m.primary_email.filter(|e| !e.trim().is_empty()),
      ..Default::default()
    }
  }
}

// ─── Webex ───────────────────────────────────────────────────────────────────

/// Body of `POST messages`: exactly one of `roomId` / `toPersonEmail`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WxMessage<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub room_id:         Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub to_person_email: Option<&'a str>,
  pub markdown:        &'a str,
}

impl<'a> From<&'a OutboundMessage> for WxMessage<'a> {
  fn from(m: &'a OutboundMessage) -> Self {
    let (room_id, to_person_email) = match &m.target {
      MessageTarget::Room(id) => (Some(id.as_str()), None),
      MessageTarget::Person(email) => (None, Some(email.as_str())),
    };
    WxMessage { room_id, to_person_email, markdown: &m.markdown }
  }
}

#[derive(Debug, Deserialize)]
pub struct WxItems<T> {
  #[serde(default = "Vec::new")]
  pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WxRoom {
  pub id:            String,
  #[serde(default)]
  pub title:         String,
  #[serde(rename = "type")]
  pub room_type:     String,
  pub last_activity: Option<DateTime<Utc>>,
}

impl From<WxRoom> for ChatRoom {
  fn from(r: WxRoom) -> Self {
    ChatRoom {
      id:            r.id,
      title:         r.title,
      room_type:     r.room_type,
      last_activity: r.last_activity.unwrap_or_default(),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WxPerson {
  pub id:            String,
  #[serde(default)]
  pub emails:        Vec<String>,
  #[serde(default)]
  pub display_name:  String,
  pub last_activity: Option<DateTime<Utc>>,
}

impl From<WxPerson> for ChatPerson {
  fn from(p: WxPerson) -> Self {
    ChatPerson {
      id:            p.id,
      emails:        p.emails,
      display_name:  p.display_name,
      last_activity: p.last_activity.unwrap_or_default(),
    }
  }
}
