//! In-memory `Psa` and `Chat` fakes with recorded calls and injectable
//! failures.
//!
//! Enabled for this crate's tests and, through the `testing` feature, for
//! downstream crates' tests.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use ticketrelay_core::{
  Error, Result,
  entity::{Board, Company, Contact, Member, Ticket, TicketNote, TicketStatus},
  store::{Mirror, Store},
  upstream::{Chat, ChatPerson, ChatRoom, MessageTarget, OutboundMessage, Psa},
};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── PSA ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PsaData {
  tickets:   HashMap<i64, Ticket>,
  notes:     HashMap<i64, Vec<TicketNote>>,
  boards:    HashMap<i64, Board>,
  statuses:  HashMap<i64, TicketStatus>,
  companies: HashMap<i64, Company>,
  contacts:  HashMap<i64, Contact>,
  members:   HashMap<i64, Member>,
  open:      Vec<i64>,
}

#[derive(Default)]
pub struct FakePsa {
  data:        Mutex<PsaData>,
  unavailable: AtomicBool,
  calls:       AtomicUsize,
}

impl FakePsa {
  /// Board 42 "Service" with status 1, company 7 "Acme Inc", contact 5
  /// "Pat Doe", and members alice (3) and bob (4) with `@x.com` emails.
  pub fn seeded() -> Self {
    let psa = Self::default();
    psa.put_board(Board { id: 42, name: "Service".into(), ..Default::default() });
    psa.put_status(TicketStatus { id: 1, board_id: 42, name: "New".into(), ..Default::default() });
    psa.put_company(Company { id: 7, name: "Acme Inc".into(), ..Default::default() });
    psa.put_contact(Contact {
      id: 5,
      first_name: "Pat".into(),
      last_name: Some("Doe".into()),
      company_id: Some(7),
      ..Default::default()
    });
    psa.put_member(member(3, "alice"));
    psa.put_member(member(4, "bob"));
    psa
  }

  pub fn put_ticket(&self, ticket: Ticket) {
    let mut data = locked(&self.data);
    if !data.open.contains(&ticket.id) {
      data.open.push(ticket.id);
    }
    data.tickets.insert(ticket.id, ticket);
  }

  /// Append a note; the last one added is the latest.
  pub fn put_note(&self, note: TicketNote) {
    locked(&self.data).notes.entry(note.ticket_id).or_default().push(note);
  }

  pub fn put_board(&self, board: Board) { locked(&self.data).boards.insert(board.id, board); }

  pub fn remove_board(&self, id: i64) { locked(&self.data).boards.remove(&id); }

  pub fn put_status(&self, status: TicketStatus) {
    locked(&self.data).statuses.insert(status.id, status);
  }

  pub fn put_company(&self, company: Company) {
    locked(&self.data).companies.insert(company.id, company);
  }

  pub fn put_contact(&self, contact: Contact) {
    locked(&self.data).contacts.insert(contact.id, contact);
  }

  pub fn put_member(&self, member: Member) {
    locked(&self.data).members.insert(member.id, member);
  }

  /// Make every call fail as an upstream outage.
  pub fn set_unavailable(&self, down: bool) { self.unavailable.store(down, Ordering::SeqCst); }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

  fn enter(&self) -> Result<MutexGuard<'_, PsaData>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(Error::Upstream("psa unavailable".into()));
    }
    Ok(locked(&self.data))
  }
}

pub fn member(id: i64, identifier: &str) -> Member {
  let mut first = identifier.to_owned();
  if let Some(c) = first.get_mut(..1) {
    c.make_ascii_uppercase();
  }
  Member {
    id,
    identifier: identifier.into(),
    first_name: first,
    primary_email: Some(format!("{identifier}@x.com")),
    ..Default::default()
  }
}

fn found<T: Clone>(map: &HashMap<i64, T>, kind: &'static str, id: i64) -> Result<T> {
  map.get(&id).cloned().ok_or_else(|| Error::not_found(kind, id))
}

impl Psa for FakePsa {
  async fn ticket(&self, id: i64) -> Result<Ticket> { found(&self.enter()?.tickets, "ticket", id) }

  async fn latest_note(&self, ticket_id: i64) -> Result<Option<TicketNote>> {
    let data = self.enter()?;
    if !data.tickets.contains_key(&ticket_id) {
      return Err(Error::not_found("ticket", ticket_id));
    }
    Ok(data.notes.get(&ticket_id).and_then(|n| n.last()).cloned())
  }

  async fn note(&self, ticket_id: i64, note_id: i64) -> Result<TicketNote> {
    self
      .enter()?
      .notes
      .get(&ticket_id)
      .and_then(|notes| notes.iter().find(|n| n.id == note_id))
      .cloned()
      .ok_or_else(|| Error::not_found("ticket note", note_id))
  }

  async fn board(&self, id: i64) -> Result<Board> { found(&self.enter()?.boards, "board", id) }

  async fn status(&self, board_id: i64, status_id: i64) -> Result<TicketStatus> {
    let status = found(&self.enter()?.statuses, "ticket status", status_id)?;
    if status.board_id != board_id {
      return Err(Error::not_found("ticket status", status_id));
    }
    Ok(status)
  }

  async fn company(&self, id: i64) -> Result<Company> {
    found(&self.enter()?.companies, "company", id)
  }

  async fn contact(&self, id: i64) -> Result<Contact> {
    found(&self.enter()?.contacts, "contact", id)
  }

  async fn member(&self, id: i64) -> Result<Member> { found(&self.enter()?.members, "member", id) }

  async fn member_by_identifier(&self, identifier: &str) -> Result<Member> {
    self
      .enter()?
      .members
      .values()
      .find(|m| m.identifier.eq_ignore_ascii_case(identifier))
      .cloned()
      .ok_or_else(|| Error::not_found("member", identifier))
  }

  async fn list_boards(&self) -> Result<Vec<Board>> {
    let mut boards = self.enter()?.boards.values().cloned().collect::<Vec<_>>();
    boards.sort_by_key(|b| b.id);
    Ok(boards)
  }

  async fn list_members(&self) -> Result<Vec<Member>> {
    let mut members = self.enter()?.members.values().cloned().collect::<Vec<_>>();
    members.sort_by_key(|m| m.id);
    Ok(members)
  }

  async fn list_open_tickets(&self, board_ids: &[i64]) -> Result<Vec<i64>> {
    let data = self.enter()?;
    Ok(
      data
        .open
        .iter()
        .copied()
        .filter(|id| {
          board_ids.is_empty()
            || data.tickets.get(id).is_some_and(|t| board_ids.contains(&t.board_id))
        })
        .collect(),
    )
  }
}

// ─── Chat ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeChat {
  posts:        Mutex<Vec<OutboundMessage>>,
  rooms:        Mutex<Vec<ChatRoom>>,
  people:       Mutex<Vec<ChatPerson>>,
  failing:      Mutex<HashSet<MessageTarget>>,
  post_delay:   Mutex<Duration>,
  room_calls:   AtomicUsize,
  people_calls: AtomicUsize,
}

impl FakeChat {
  pub fn put_room(&self, id: &str, title: &str, room_type: &str) {
    locked(&self.rooms).push(ChatRoom {
      id:            id.into(),
      title:         title.into(),
      room_type:     room_type.into(),
      last_activity: Utc::now(),
    });
  }

  pub fn put_person(&self, id: &str, name: &str, email: &str, last_activity: DateTime<Utc>) {
    locked(&self.people).push(ChatPerson {
      id: id.into(),
      emails: vec![email.into()],
      display_name: name.into(),
      last_activity,
    });
  }

  /// Posts to `target` fail until cleared.
  pub fn fail_posts_to(&self, target: MessageTarget) {
    locked(&self.failing).insert(target.normalized());
  }

  /// Every successful post takes `delay` to return after it lands.
  pub fn delay_posts(&self, delay: Duration) { *locked(&self.post_delay) = delay; }

  pub fn posts(&self) -> Vec<OutboundMessage> { locked(&self.posts).clone() }

  pub fn posted_to(&self) -> Vec<MessageTarget> {
    locked(&self.posts).iter().map(|m| m.target.clone()).collect()
  }

  pub fn room_calls(&self) -> usize { self.room_calls.load(Ordering::SeqCst) }

  pub fn people_calls(&self) -> usize { self.people_calls.load(Ordering::SeqCst) }
}

impl Chat for FakeChat {
  async fn post_message(&self, message: OutboundMessage) -> Result<()> {
    if locked(&self.failing).contains(&message.target.normalized()) {
      return Err(Error::Upstream(format!("post to {:?} refused", message.target)));
    }
    locked(&self.posts).push(message);
    let delay = *locked(&self.post_delay);
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    Ok(())
  }

  async fn list_rooms(&self) -> Result<Vec<ChatRoom>> {
    self.room_calls.fetch_add(1, Ordering::SeqCst);
    Ok(locked(&self.rooms).clone())
  }

  async fn people_by_email(&self, email: &str) -> Result<Vec<ChatPerson>> {
    self.people_calls.fetch_add(1, Ordering::SeqCst);
    Ok(
      locked(&self.people)
        .iter()
        .filter(|p| p.emails.iter().any(|e| e.eq_ignore_ascii_case(email)))
        .cloned()
        .collect(),
    )
  }
}

// ─── Store seeding ───────────────────────────────────────────────────────────

/// Store ticket `id` on board 42 with one note (ID `id * 10`), plus the
/// rows they reference.
pub async fn seed_ticket<S: Store>(
  store: &S,
  id: i64,
  content: Option<&str>,
) -> Result<(Ticket, TicketNote)> {
  let board  = Board { id: 42, name: "Service".into(), ..Default::default() };
  let status = TicketStatus { id: 1, board_id: 42, name: "New".into(), ..Default::default() };
  Mirror::<Board>::upsert(store, board).await?;
  Mirror::<TicketStatus>::upsert(store, status).await?;
  Mirror::<Company>::upsert(store, Company { id: 7, name: "Acme Inc".into(), ..Default::default() })
    .await?;

  let ticket = Mirror::<Ticket>::upsert(store, ticket(id, None)).await?;
  let note   = Mirror::<TicketNote>::upsert(store, TicketNote {
    id: id * 10,
    ticket_id: id,
    content: content.map(str::to_owned),
    ..Default::default()
  })
  .await?;
  Ok((ticket, note))
}

/// A ticket on board 42 for company 7 with the given resources.
pub fn ticket(id: i64, resources: Option<&str>) -> Ticket {
  Ticket {
    id,
    summary: format!("Ticket {id}"),
    board_id: 42,
    status_id: 1,
    company_id: 7,
    resources: resources.map(str::to_owned),
    ..Default::default()
  }
}

/// A note on `ticket_id` written by member `author_id`.
pub fn note(id: i64, ticket_id: i64, author_id: Option<i64>, content: &str) -> TicketNote {
  TicketNote {
    id,
    ticket_id,
    member_id: author_id,
    content: Some(content.into()),
    ..Default::default()
  }
}
