//! Chat recipient resolution, with a TTL cache in front of the chat
//! platform's listing calls.

use std::time::Duration;

use ticketrelay_core::{
  Error, Result,
  recipient::{ChatRecipient, NewRecipient, RecipientKind},
  store::Store,
  upstream::{Chat, ChatPerson, ChatRoom},
};

use crate::cache::TtlCache;

pub struct RecipientResolver<S, C> {
  store:  S,
  chat:   C,
  rooms:  TtlCache<(), Vec<ChatRoom>>,
  /// People-search results keyed by lowercased email. An empty list is a
  /// negative entry.
  people: TtlCache<String, Vec<ChatPerson>>,
}

impl<S: Store, C: Chat> RecipientResolver<S, C> {
  pub fn new(store: S, chat: C, ttl: Duration) -> Self {
    Self { store, chat, rooms: TtlCache::new(ttl), people: TtlCache::new(ttl) }
  }

  pub fn chat(&self) -> &C { &self.chat }

  pub async fn get_recipient(&self, id: i64) -> Result<ChatRecipient> {
    self.store.get_recipient(id).await
  }

  /// The person recipient for `email`: the most recently active stored
  /// one, else the most recently active match from people-search, which is
  /// then stored.
  pub async fn ensure_person_by_email(&self, email: &str) -> Result<ChatRecipient> {
    if let Some(found) = self.store.recipients_by_email(email).await?.into_iter().next() {
      return Ok(found);
    }

    let people = self.search_people(email).await?;
    let person = people
      .into_iter()
      .max_by_key(|p| p.last_activity)
      .ok_or_else(|| Error::not_found("chat person", email))?;

    let address = person
      .emails
      .iter()
      .find(|e| e.eq_ignore_ascii_case(email))
      .cloned()
      .unwrap_or_else(|| email.to_owned());
    let stored = self
      .store
      .upsert_recipient(
        NewRecipient::person(&person.id, &person.display_name, address)
          .with_last_activity(person.last_activity),
      )
      .await?;
    tracing::debug!(recipient = stored.id, %email, "stored chat person");
    Ok(stored)
  }

  async fn search_people(&self, email: &str) -> Result<Vec<ChatPerson>> {
    let key = email.to_lowercase();
    if let Some(hit) = self.people.get(&key) {
      return Ok(hit);
    }
    let found = self.chat.people_by_email(email).await?;
    if found.is_empty() {
      tracing::debug!(%email, "no chat person for email");
    }
    self.people.insert(key, found.clone());
    Ok(found)
  }

  /// Every room visible to the bot, as listed by the chat platform.
  pub async fn list_rooms(&self) -> Result<Vec<ChatRoom>> {
    if let Some(hit) = self.rooms.get(&()) {
      return Ok(hit);
    }
    let rooms = self.chat.list_rooms().await?;
    self.rooms.insert((), rooms.clone());
    Ok(rooms)
  }

  /// Stored person recipients.
  pub async fn list_people(&self) -> Result<Vec<ChatRecipient>> {
    self.store.list_recipients(Some(RecipientKind::Person)).await
  }

  /// Fresh people-search results, bypassing and then refilling the cache.
  pub(crate) async fn refresh_people(&self, email: &str) -> Result<Vec<ChatPerson>> {
    self.people.invalidate(&email.to_lowercase());
    self.search_people(email).await
  }

  pub(crate) async fn refresh_rooms(&self) -> Result<Vec<ChatRoom>> {
    self.rooms.invalidate(&());
    self.list_rooms().await
  }

  pub fn invalidate(&self) {
    self.rooms.clear();
    self.people.clear();
  }
}
