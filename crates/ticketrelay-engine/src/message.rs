//! Markdown rendering of ticket notifications. Pure; no I/O.

use ticketrelay_core::{
  entity::{Contact, Member, TicketNote},
  event::Action,
  recipient::{ChatRecipient, RecipientKind},
};

use crate::{forward::Target, mirror::Hydrated};

/// Where ticket links point.
#[derive(Debug, Clone, Default)]
pub struct TicketLinks {
  /// The PSA's ticket page, without a query string.
  pub base:       String,
  /// The PSA login company, passed as `companyName`.
  pub company_id: String,
}

impl TicketLinks {
  pub fn url(&self, ticket_id: i64) -> String {
    format!("{}?service_recid={ticket_id}&companyName={}", self.base, self.company_id)
  }
}

/// The body shared by every recipient of one ticket event.
pub fn render(t: &Hydrated, action: Action, links: &TicketLinks, max_len: usize) -> String {
  let title = match action {
    Action::Added => "New Ticket",
    _ => "Ticket Updated",
  };
  let mut body = format!(
    "**{title}:** [#{id}]({url}) {summary}",
    id = t.ticket.id,
    url = links.url(t.ticket.id),
    summary = t.ticket.summary,
  );

  if !t.company.name.trim().is_empty() {
    body.push_str(&format!("\n**Company:** {}", t.company.name));
  }
  if let Some(contact) = &t.contact {
    body.push_str(&format!("\n**Ticket Contact:** {}", contact.full_name()));
  }
  if let Some(note) = &t.note
    && let Some(content) = note.content.as_deref().filter(|c| !c.trim().is_empty())
  {
    if let Some(sender) = sender_name(note, t.note_member.as_ref(), t.note_contact.as_ref()) {
      body.push_str(&format!("\n**Latest Note Sent By:** {sender}"));
    }
    body.push('\n');
    body.push_str(&block_quote(&truncate(content, max_len)));
  }

  body.push_str("\n\n---");
  body
}

/// Member name, then the PSA's free-form author, then contact name.
pub fn sender_name(
  note: &TicketNote,
  member: Option<&Member>,
  contact: Option<&Contact>,
) -> Option<String> {
  member
    .map(Member::full_name)
    .or_else(|| note.created_by.clone())
    .or_else(|| contact.map(Contact::full_name))
    .filter(|n| !n.trim().is_empty())
}

/// Keep the first `max` characters and mark the cut with `...`.
pub fn truncate(content: &str, max: usize) -> String {
  match content.char_indices().nth(max) {
    Some((cut, _)) => format!("{}...", &content[..cut]),
    None => content.to_owned(),
  }
}

pub fn block_quote(text: &str) -> String {
  text
    .lines()
    .map(|line| if line.is_empty() { ">".to_owned() } else { format!("> {line}") })
    .collect::<Vec<_>>()
    .join("\n")
}

/// `**FWD:** A > B > You`, naming a room instead of `You`.
pub fn forward_header(chain: &[ChatRecipient], recipient: &ChatRecipient) -> String {
  let mut hops = chain.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
  hops.push(match recipient.kind {
    RecipientKind::Room => recipient.name.as_str(),
    RecipientKind::Person => "You",
  });
  format!("**FWD:** {}", hops.join(" > "))
}

/// The body as delivered to `target`.
pub fn for_target(body: &str, target: &Target) -> String {
  if target.is_natural() {
    body.to_owned()
  } else {
    format!("{}\n{body}", forward_header(&target.chain, &target.recipient))
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use ticketrelay_core::entity::{Company, Ticket};

  use super::*;

  fn links() -> TicketLinks {
    TicketLinks { base: "https://psa.example.com/ticket".into(), company_id: "acme".into() }
  }

  fn hydrated(content: Option<&str>) -> Hydrated {
    Hydrated {
      ticket:       Ticket { id: 100, summary: "Printer on fire".into(), ..Default::default() },
      company:      Company { id: 7, name: "Acme Inc".into(), ..Default::default() },
      contact:      Some(Contact {
        first_name: "Pat".into(),
        last_name: Some("Doe".into()),
        ..Default::default()
      }),
      note:         content.map(|c| TicketNote {
        id: 900,
        ticket_id: 100,
        content: Some(c.into()),
        created_by: Some("alice".into()),
        ..Default::default()
      }),
      note_member:  None,
      note_contact: None,
      resources:    Vec::new(),
    }
  }

  fn recipient(name: &str, kind: RecipientKind) -> ChatRecipient {
    ChatRecipient {
      id:            1,
      external_id:   format!("wx-{name}"),
      name:          name.into(),
      email:         None,
      kind,
      last_activity: Utc::now(),
      created_on:    Utc::now(),
      updated_on:    Utc::now(),
    }
  }

  #[test]
  fn full_new_ticket_body() {
    let body = render(&hydrated(Some("line one\n\nline two")), Action::Added, &links(), 300);
    assert_eq!(
      body,
      "**New Ticket:** [#100](https://psa.example.com/ticket?service_recid=100&companyName=acme) \
       Printer on fire\n\
       **Company:** Acme Inc\n\
       **Ticket Contact:** Pat Doe\n\
       **Latest Note Sent By:** alice\n\
       > line one\n\
       >\n\
       > line two\n\n---"
    );
  }

  #[test]
  fn updated_header_and_optional_lines() {
    let mut t = hydrated(None);
    t.company.name = String::new();
    t.contact = None;

    let body = render(&t, Action::Updated, &links(), 300);
    assert!(body.starts_with("**Ticket Updated:** [#100]("));
    assert!(!body.contains("**Company:**"));
    assert!(!body.contains("**Ticket Contact:**"));
    assert!(!body.contains("**Latest Note Sent By:**"));
    assert!(body.ends_with("\n\n---"));
  }

  #[test]
  fn truncation_keeps_prefix_only() {
    let body = render(&hydrated(Some("0123456789ABCDE")), Action::Updated, &links(), 10);
    assert!(body.contains("> 0123456789..."));
    assert!(!body.contains("0123456789A"));
    assert!(!body.contains("BCDE"));
  }

  #[test]
  fn truncate_counts_characters() {
    assert_eq!(truncate("héllo wörld", 5), "héllo...");
    assert_eq!(truncate("short", 5), "short");
  }

  #[test]
  fn sender_precedence() {
    let note    = TicketNote { created_by: Some("cw-user".into()), ..Default::default() };
    let member  = Member {
      first_name: "Alice".into(),
      last_name: Some("A".into()),
      ..Default::default()
    };
    let contact = Contact { first_name: "Pat".into(), ..Default::default() };

    assert_eq!(sender_name(&note, Some(&member), Some(&contact)).as_deref(), Some("Alice A"));
    assert_eq!(sender_name(&note, None, Some(&contact)).as_deref(), Some("cw-user"));
    let anon = TicketNote::default();
    assert_eq!(sender_name(&anon, None, Some(&contact)).as_deref(), Some("Pat"));
    assert_eq!(sender_name(&anon, None, None), None);
  }

  #[test]
  fn forward_header_names_rooms() {
    let chain = vec![
      recipient("Alice", RecipientKind::Person),
      recipient("Bob", RecipientKind::Person),
    ];
    assert_eq!(
      forward_header(&chain, &recipient("Carol", RecipientKind::Person)),
      "**FWD:** Alice > Bob > You"
    );
    assert_eq!(
      forward_header(&chain[..1], &recipient("Ops", RecipientKind::Room)),
      "**FWD:** Alice > Ops"
    );
  }
}
