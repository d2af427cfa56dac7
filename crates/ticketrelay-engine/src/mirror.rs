//! Pull-through mirroring of the PSA ticket graph.
//!
//! The store is the cache: every `ensure_*` returns the stored row, or
//! fetches it upstream, upserts it and returns it. An upstream 404 surfaces
//! as `NotFound` and nothing is inserted. Callers run one ticket's ensures
//! against a transaction-scoped store so a failure leaves no partial graph.

use std::future::Future;

use ticketrelay_core::{
  Error, Result,
  entity::{Board, Company, Contact, Member, Mirrored, Ticket, TicketNote, TicketStatus},
  store::{Mirror, Store},
  upstream::Psa,
};

pub struct PsaMirror<'a, S, P> {
  store: &'a S,
  psa:   &'a P,
}

/// A ticket with every row a notification needs, as stored.
#[derive(Debug, Clone)]
pub struct Hydrated {
  pub ticket:       Ticket,
  pub company:      Company,
  pub contact:      Option<Contact>,
  pub note:         Option<TicketNote>,
  /// The note's author when a member wrote it.
  pub note_member:  Option<Member>,
  /// The note's author when a customer contact wrote it.
  pub note_contact: Option<Contact>,
  /// Members named in `resources`, in listed order. Unknown identifiers are
  /// left out.
  pub resources:    Vec<Member>,
}

impl<'a, S: Store, P: Psa> PsaMirror<'a, S, P> {
  pub fn new(store: &'a S, psa: &'a P) -> Self { Self { store, psa } }

  async fn ensure<E, F, Fut>(&self, id: i64, fetch: F) -> Result<E>
  where
    E: Mirrored,
    S: Mirror<E>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<E>>,
  {
    match Mirror::<E>::get(self.store, id).await {
      Ok(found) => Ok(found),
      Err(e) if e.is_not_found() => {
        tracing::debug!(kind = E::KIND, id, "mirroring from upstream");
        let fetched = fetch().await?;
        Mirror::<E>::upsert(self.store, fetched).await
      }
      Err(e) => Err(e),
    }
  }

  pub async fn ensure_board(&self, id: i64) -> Result<Board> {
    self.ensure(id, || self.psa.board(id)).await
  }

  pub async fn ensure_status(&self, board_id: i64, id: i64) -> Result<TicketStatus> {
    self.ensure_board(board_id).await?;
    self.ensure(id, || self.psa.status(board_id, id)).await
  }

  pub async fn ensure_company(&self, id: i64) -> Result<Company> {
    self.ensure(id, || self.psa.company(id)).await
  }

  /// Ensures the contact's company first.
  pub async fn ensure_contact(&self, id: i64) -> Result<Contact> {
    self
      .ensure(id, || async move {
        let contact = self.psa.contact(id).await?;
        if let Some(company_id) = contact.company_id {
          self.ensure_company(company_id).await?;
        }
        Ok(contact)
      })
      .await
  }

  pub async fn ensure_member(&self, id: i64) -> Result<Member> {
    self.ensure(id, || self.psa.member(id)).await
  }

  /// Store first (case-insensitive), then a PSA member search.
  pub async fn ensure_member_by_identifier(&self, identifier: &str) -> Result<Member> {
    match self.store.member_by_identifier(identifier).await {
      Ok(found) => Ok(found),
      Err(e) if e.is_not_found() => {
        let fetched = self.psa.member_by_identifier(identifier).await?;
        Mirror::<Member>::upsert(self.store, fetched).await
      }
      Err(e) => Err(e),
    }
  }

  pub async fn ensure_ticket(&self, id: i64) -> Result<Ticket> {
    match Mirror::<Ticket>::get(self.store, id).await {
      Ok(found) => Ok(found),
      Err(e) if e.is_not_found() => {
        let fetched = self.psa.ticket(id).await?;
        self.upsert_ticket(fetched).await
      }
      Err(e) => Err(e),
    }
  }

  /// Ensures the note's author (member or contact) first. The ticket must
  /// already be stored.
  pub async fn ensure_note(&self, ticket_id: i64, id: i64) -> Result<TicketNote> {
    match Mirror::<TicketNote>::get(self.store, id).await {
      Ok(found) => Ok(found),
      Err(e) if e.is_not_found() => {
        let fetched = self.psa.note(ticket_id, id).await?;
        self.upsert_note(fetched).await
      }
      Err(e) => Err(e),
    }
  }

  /// Write `ticket` over whatever is stored, ensuring the rows it
  /// references.
  pub async fn upsert_ticket(&self, ticket: Ticket) -> Result<Ticket> {
    self.ensure_status(ticket.board_id, ticket.status_id).await?;
    self.ensure_company(ticket.company_id).await?;
    if let Some(contact_id) = ticket.contact_id {
      self.ensure_contact(contact_id).await?;
    }
    if let Some(owner_id) = ticket.owner_id {
      self.ensure_member(owner_id).await?;
    }
    Mirror::<Ticket>::upsert(self.store, ticket).await
  }

  pub async fn upsert_note(&self, note: TicketNote) -> Result<TicketNote> {
    if let Some(member_id) = note.member_id {
      self.ensure_member(member_id).await?;
    }
    if let Some(contact_id) = note.contact_id {
      self.ensure_contact(contact_id).await?;
    }
    Mirror::<TicketNote>::upsert(self.store, note).await
  }

  /// Mirror a freshly fetched ticket and its latest note, with everything
  /// they reference.
  pub async fn hydrate(&self, ticket: Ticket, note: Option<TicketNote>) -> Result<Hydrated> {
    let ticket  = self.upsert_ticket(ticket).await?;
    let company = self.ensure_company(ticket.company_id).await?;
    let contact = match ticket.contact_id {
      Some(id) => Some(self.ensure_contact(id).await?),
      None => None,
    };

    let mut resources = Vec::new();
    for identifier in ticket.resource_identifiers() {
      match self.ensure_member_by_identifier(&identifier).await {
        Ok(member) => resources.push(member),
        Err(e) if e.is_not_found() => {
          tracing::warn!(ticket_id = ticket.id, %identifier, "unknown resource; skipping");
        }
        Err(e) => return Err(e),
      }
    }

    let note = match note {
      Some(n) if n.ticket_id == ticket.id => Some(self.upsert_note(n).await?),
      Some(n) => {
        return Err(Error::InvalidInput(format!(
          "note {} belongs to ticket {}, not {}",
          n.id, n.ticket_id, ticket.id
        )));
      }
      None => None,
    };

    let note_member = match note.as_ref().and_then(|n| n.member_id) {
      Some(id) => Some(self.ensure_member(id).await?),
      None => None,
    };
    let note_contact = match note.as_ref().and_then(|n| n.contact_id) {
      Some(id) => Some(self.ensure_contact(id).await?),
      None => None,
    };

    Ok(Hydrated { ticket, company, contact, note, note_member, note_contact, resources })
  }
}
