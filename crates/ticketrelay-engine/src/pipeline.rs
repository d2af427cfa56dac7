//! The ticket pipeline: lock, fetch, hydrate, gate, resolve, render, send,
//! record.

use std::{collections::HashSet, sync::Arc, time::Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use ticketrelay_core::{
  Error, Result,
  entity::{Ticket, TicketNote},
  event::Action,
  notifier::NewNotification,
  recipient::{ChatRecipient, RecipientKind},
  store::{Mirror, Store},
  upstream::{Chat, MessageTarget, OutboundMessage, Psa},
};

use crate::{
  forward::{self, Target, Targets},
  gate::{self, Eligibility},
  message,
  mirror::{Hydrated, PsaMirror},
  relay::{Outcome, Relay, finish},
};

impl<S: Store, P: Psa, C: Chat> Relay<S, P, C> {
  /// Process one ticket event. At most one call runs per ticket at a time;
  /// later calls for the same ticket wait their turn.
  ///
  /// `syncing` marks bulk backfill: the ticket is mirrored but nobody is
  /// notified.
  ///
  /// The event runs on its own task, so dropping this future leaves it to
  /// finish its sends and record them.
  pub async fn process(
    self: &Arc<Self>,
    ticket_id: i64,
    action: Action,
    syncing: bool,
  ) -> Result<Outcome> {
    self
      .spawn_process(ticket_id, action, syncing)
      .await
      .map_err(|e| Error::Task(e.to_string()).in_stage("process"))?
  }

  /// Start processing one ticket event in the background.
  pub fn spawn_process(
    self: &Arc<Self>,
    ticket_id: i64,
    action: Action,
    syncing: bool,
  ) -> JoinHandle<Result<Outcome>> {
    let relay = self.clone();
    tokio::spawn(async move { relay.process_locked(ticket_id, action, syncing).await })
  }

  pub(crate) async fn process_locked(
    &self,
    ticket_id: i64,
    action: Action,
    syncing: bool,
  ) -> Result<Outcome> {
    let started = Instant::now();
    let _lock   = self.locks.lock(ticket_id).await;

    let result  = self.run(ticket_id, action, syncing).await;
    let took_ms = started.elapsed().as_millis() as u64;
    match &result {
      Ok(outcome) => {
        tracing::info!(ticket_id, %action, syncing, ?outcome, took_ms, "ticket processed");
      }
      Err(e) => tracing::error!(ticket_id, %action, syncing, error = %e, took_ms, "ticket failed"),
    }
    result
  }

  async fn run(&self, ticket_id: i64, action: Action, syncing: bool) -> Result<Outcome> {
    if action == Action::Deleted {
      return match Mirror::<Ticket>::soft_delete(&self.store, ticket_id).await {
        Ok(()) => Ok(Outcome::Deleted),
        Err(e) if e.is_not_found() => {
          tracing::debug!(ticket_id, "deleted ticket was never mirrored");
          Ok(Outcome::Deleted)
        }
        Err(e) => Err(e.in_stage("delete")),
      };
    }

    let (ticket, note) =
      tokio::try_join!(self.psa.ticket(ticket_id), self.psa.latest_note(ticket_id))
        .map_err(|e| e.in_stage("fetch"))?;

    let t      = self.hydrate(ticket, note).await.map_err(|e| e.in_stage("hydrate"))?;
    let config = self.config().await;

    let verdict = gate::eligible(&self.store, &config, &t.ticket, t.note.as_ref(), action, syncing)
      .await
      .map_err(|e| e.in_stage("gate"))?;
    if let Eligibility::Ineligible(reason) = verdict {
      tracing::debug!(ticket_id, reason = %reason, "not notifying");
      if gate::marks_skip(reason) {
        gate::record_skipped(&self.store, ticket_id, t.note.as_ref())
          .await
          .map_err(|e| e.in_stage("record"))?;
      }
      return Ok(Outcome::Skipped(reason));
    }

    let targets = self.resolve(&t, action).await.map_err(|e| e.in_stage("resolve"))?;
    if let Eligibility::Ineligible(reason) = gate::require_recipients(targets.len()) {
      tracing::debug!(ticket_id, reason = %reason, "not notifying");
      return Ok(Outcome::Skipped(reason));
    }

    let body           = message::render(&t, action, &self.links, config.max_message_length);
    let (sent, failed) = self.send(&t, targets, &body).await?;

    Ok(Outcome::Notified { sent, failed })
  }

  /// Mirror the ticket graph in one transaction.
  async fn hydrate(&self, ticket: Ticket, note: Option<TicketNote>) -> Result<Hydrated> {
    let tx     = self.store.begin().await?;
    let scoped = self.store.with_tx(&tx);
    let result = PsaMirror::new(&scoped, &self.psa).hydrate(ticket, note).await;
    finish(tx, result).await
  }

  /// Rule recipients for a new ticket; resources' persons for an update.
  /// The note's author never receives their own note.
  async fn resolve(&self, t: &Hydrated, action: Action) -> Result<Targets> {
    let mut direct = Targets::new();

    match action {
      Action::Added => {
        for rule in self.store.rules_for_board(t.ticket.board_id).await? {
          if !rule.notify_enabled {
            continue;
          }
          let recipient = self.recipients.get_recipient(rule.recipient_id).await?;
          direct.insert(recipient.id, Target::natural(recipient));
        }
      }
      Action::Updated => {
        let author = t.note_member.as_ref().map(|m| m.id);
        for member in t.resources.iter().filter(|m| Some(m.id) != author) {
          let Some(email) = member.primary_email.as_deref() else {
            tracing::debug!(ticket_id = t.ticket.id, member = %member.identifier, "no email");
            continue;
          };
          match self.recipients.ensure_person_by_email(email).await {
            Ok(recipient) => {
              direct.insert(recipient.id, Target::natural(recipient));
            }
            Err(e) if e.is_not_found() => {
              tracing::warn!(ticket_id = t.ticket.id, %email, "no chat person for resource");
            }
            Err(e) => return Err(e),
          }
        }
      }
      Action::Deleted => {}
    }

    let mut targets = forward::expand(&self.store, direct, Utc::now()).await;
    targets.retain(|_, target| !is_author(t, &target.recipient));
    Ok(targets)
  }

  /// Post to every target once, in recipient order, recording each attempt
  /// before the next post. Failed posts are recorded as unsent and never
  /// abort the loop; a failed record does.
  async fn send(&self, t: &Hydrated, targets: Targets, body: &str) -> Result<(usize, usize)> {
    let ticket_id     = t.ticket.id;
    let note_id       = t.note.as_ref().map(|n| n.id);
    let mut delivered = HashSet::new();
    let mut sent      = 0;
    let mut failed    = 0;

    for target in targets.into_values() {
      let Some(to) = message_target(&target.recipient) else {
        tracing::warn!(ticket_id, recipient = target.recipient.id, "person has no email");
        continue;
      };
      if !delivered.insert(to.normalized()) {
        continue;
      }

      let outbound = OutboundMessage { target: to, markdown: message::for_target(body, &target) };
      let ok       = match self.chat().post_message(outbound).await {
        Ok(()) => {
          sent += 1;
          true
        }
        Err(e) => {
          tracing::warn!(ticket_id, recipient = target.recipient.id, error = %e, "send failed");
          failed += 1;
          false
        }
      };

      let attempt = NewNotification {
        ticket_id,
        ticket_note_id: note_id,
        recipient_id: Some(target.recipient.id),
        forwarded_from_id: target.forwarded_from(),
        sent: ok,
        skipped: false,
      };
      gate::record(&self.store, vec![attempt]).await.map_err(|e| e.in_stage("record"))?;
    }

    Ok((sent, failed))
  }
}

fn message_target(r: &ChatRecipient) -> Option<MessageTarget> {
  match r.kind {
    RecipientKind::Room => Some(MessageTarget::Room(r.external_id.clone())),
    RecipientKind::Person => r.email.clone().map(MessageTarget::Person),
  }
}

fn is_author(t: &Hydrated, r: &ChatRecipient) -> bool {
  let author_email = t.note_member.as_ref().and_then(|m| m.primary_email.as_deref());
  match (author_email, r.email.as_deref()) {
    (Some(author), Some(email)) => author.eq_ignore_ascii_case(email),
    _ => false,
  }
}
