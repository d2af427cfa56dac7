//! End-to-end engine tests over the in-memory SQLite store and the fakes.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use ticketrelay_core::{
  Error,
  config::Config,
  entity::{Board, Contact, Ticket},
  event::{Action, Reason},
  notifier::{NewForward, NewRule},
  recipient::{ChatRecipient, NewRecipient, RecipientKind},
  store::{Mirror, Store, Transaction},
  upstream::MessageTarget,
};
use ticketrelay_store_sqlite::SqliteStore;

use crate::{
  Outcome, Relay, RelayOptions, SyncRequest, TicketLinks,
  mirror::PsaMirror,
  testing::{FakeChat, FakePsa, note, ticket},
};

type TestRelay = Relay<SqliteStore, FakePsa, FakeChat>;

async fn relay_with(psa: FakePsa, chat: FakeChat) -> Arc<TestRelay> {
  let store   = SqliteStore::open_in_memory().await.unwrap();
  let options = RelayOptions {
    links:               TicketLinks {
      base:       "https://psa.example.com/ticket".into(),
      company_id: "acme".into(),
    },
    recipient_cache_ttl: Duration::from_secs(60),
  };
  let relay = Relay::new(store, psa, chat, options).await.unwrap();
  relay.put_config(Config { attempt_notify: true, ..Config::default() }).await.unwrap();
  Arc::new(relay)
}

async fn relay() -> Arc<TestRelay> { relay_with(FakePsa::seeded(), FakeChat::default()).await }

fn person(email: &str) -> MessageTarget { MessageTarget::Person(email.into()) }

/// Store a person recipient and make it findable by people-search.
async fn chat_person(r: &TestRelay, name: &str) -> ChatRecipient {
  let email = format!("{}@x.com", name.to_lowercase());
  r.chat().put_person(&format!("wx-{name}"), name, &email, Utc::now());
  r.store()
    .upsert_recipient(NewRecipient::person(format!("wx-{name}"), name, email))
    .await
    .unwrap()
}

async fn forward(r: &TestRelay, from: i64, to: i64, keep: bool) {
  r.store()
    .insert_forward(NewForward {
      source_recipient_id: from,
      dest_recipient_id:   to,
      start_date:          Some(Utc::now() - chrono::Duration::hours(1)),
      end_date:            None,
      enabled:             true,
      user_keeps_copy:     keep,
    })
    .await
    .unwrap();
}

async fn board_42(r: &TestRelay) {
  Mirror::<Board>::upsert(r.store(), Board { id: 42, name: "Service".into(), ..Default::default() })
    .await
    .unwrap();
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_ticket_goes_to_enabled_rules_only() {
  let r = relay().await;
  board_42(&r).await;
  let r1 = r.store().upsert_recipient(NewRecipient::room("R1", "Ops")).await.unwrap();
  let r2 = r.store().upsert_recipient(NewRecipient::room("R2", "Billing")).await.unwrap();
  r.store()
    .insert_rule(NewRule { board_id: 42, recipient_id: r1.id, notify_enabled: true })
    .await
    .unwrap();
  r.store()
    .insert_rule(NewRule { board_id: 42, recipient_id: r2.id, notify_enabled: false })
    .await
    .unwrap();
  r.psa().put_ticket(ticket(100, None));

  let outcome = r.process(100, Action::Added, false).await.unwrap();
  assert_eq!(outcome, Outcome::Notified { sent: 1, failed: 0 });
  assert_eq!(r.chat().posted_to(), vec![MessageTarget::Room("R1".into())]);

  let rows = r.store().notifications_for_ticket(100).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].recipient_id, Some(r1.id));
  assert!(rows[0].sent);

  let body = &r.chat().posts()[0].markdown;
  assert!(body.starts_with(
    "**New Ticket:** [#100](https://psa.example.com/ticket?service_recid=100&companyName=acme)"
  ));
  assert!(body.contains("**Company:** Acme Inc"));
}

#[tokio::test]
async fn duplicate_update_delivers_once() {
  let r = relay().await;
  chat_person(&r, "Bob").await;
  r.psa().put_ticket(ticket(100, Some("bob")));
  r.psa().put_note(note(900, 100, Some(3), "printer is on fire"));

  let (a, b) = tokio::join!(
    r.process(100, Action::Updated, false),
    r.process(100, Action::Updated, false)
  );
  let mut outcomes = vec![a.unwrap(), b.unwrap()];
  outcomes.sort_by_key(|o| matches!(o, Outcome::Skipped(_)));
  assert_eq!(outcomes, vec![
    Outcome::Notified { sent: 1, failed: 0 },
    Outcome::Skipped(Reason::AlreadyNotified),
  ]);

  assert_eq!(r.chat().posts().len(), 1);
  let sent = r
    .store()
    .notifications_for_ticket(100)
    .await
    .unwrap()
    .into_iter()
    .filter(|n| n.sent && n.ticket_note_id == Some(900))
    .count();
  assert_eq!(sent, 1);
}

#[tokio::test]
async fn forward_with_copy_reaches_both() {
  let r     = relay().await;
  let alice = chat_person(&r, "Alice").await;
  let bob   = chat_person(&r, "Bob").await;
  forward(&r, alice.id, bob.id, true).await;
  r.psa().put_ticket(ticket(100, Some("alice")));
  r.psa().put_note(note(900, 100, None, "hello"));

  let outcome = r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(outcome, Outcome::Notified { sent: 2, failed: 0 });

  let posts = r.chat().posts();
  assert_eq!(posts[0].target, person("alice@x.com"));
  assert!(posts[0].markdown.starts_with("**Ticket Updated:**"));
  assert_eq!(posts[1].target, person("bob@x.com"));
  assert!(posts[1].markdown.starts_with("**FWD:** Alice > You\n**Ticket Updated:**"));

  let rows = r.store().notifications_for_ticket(100).await.unwrap();
  let fwd  = rows.iter().find(|n| n.recipient_id == Some(bob.id)).unwrap();
  assert_eq!(fwd.forwarded_from_id, Some(alice.id));
}

#[tokio::test]
async fn forward_cycle_without_copies_lands_once() {
  let r     = relay().await;
  let alice = chat_person(&r, "Alice").await;
  let bob   = chat_person(&r, "Bob").await;
  forward(&r, alice.id, bob.id, false).await;
  forward(&r, bob.id, alice.id, false).await;
  r.psa().put_ticket(ticket(100, Some("alice")));
  r.psa().put_note(note(900, 100, None, "hello"));

  r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(r.chat().posted_to(), vec![person("bob@x.com")]);
}

#[tokio::test]
async fn note_author_is_not_notified() {
  let r = relay().await;
  chat_person(&r, "Alice").await;
  chat_person(&r, "Bob").await;
  r.psa().put_ticket(ticket(100, Some("alice,bob")));
  r.psa().put_note(note(900, 100, Some(3), "done"));

  r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(r.chat().posted_to(), vec![person("bob@x.com")]);
  assert!(r.chat().posts()[0].markdown.contains("**Latest Note Sent By:** Alice"));
}

#[tokio::test]
async fn long_notes_are_truncated() {
  let r = relay().await;
  r.put_config(Config { attempt_notify: true, max_message_length: 10, ..Config::default() })
    .await
    .unwrap();
  chat_person(&r, "Bob").await;
  r.psa().put_ticket(ticket(100, Some("bob")));
  r.psa().put_note(note(900, 100, None, "0123456789ABCDE"));

  r.process(100, Action::Updated, false).await.unwrap();
  let body = &r.chat().posts()[0].markdown;
  assert!(body.contains("> 0123456789..."));
  assert!(!body.contains("BCDE"));
}

// ─── Gate and pipeline behaviour ─────────────────────────────────────────────

#[tokio::test]
async fn sync_never_notifies_and_leaves_a_marker() {
  let r = relay().await;
  chat_person(&r, "Bob").await;
  r.psa().put_ticket(ticket(100, Some("bob")));
  r.psa().put_note(note(900, 100, None, "hello"));

  let outcome = r.process(100, Action::Updated, true).await.unwrap();
  assert_eq!(outcome, Outcome::Skipped(Reason::TicketSync));
  assert!(r.chat().posts().is_empty());

  let rows = r.store().notifications_for_ticket(100).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert!(rows[0].skipped && !rows[0].sent);

  // The marker does not count as notified.
  let outcome = r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(outcome, Outcome::Notified { sent: 1, failed: 0 });
}

#[tokio::test]
async fn master_switch_off_skips() {
  let r = relay().await;
  r.put_config(Config::default()).await.unwrap();
  r.psa().put_ticket(ticket(100, None));
  r.psa().put_note(note(900, 100, None, "hello"));

  let outcome = r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(outcome, Outcome::Skipped(Reason::AttemptNotifyOff));
  assert!(r.store().note_has_marker(900).await.unwrap());
}

#[tokio::test]
async fn update_without_note_or_recipients_is_skipped() {
  let r = relay().await;
  r.psa().put_ticket(ticket(100, Some("bob")));
  let outcome = r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(outcome, Outcome::Skipped(Reason::NoNote));

  // bob has no chat person.
  r.psa().put_note(note(900, 100, None, "hello"));
  let outcome = r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(outcome, Outcome::Skipped(Reason::NoRecipients));
}

#[tokio::test]
async fn missing_rules_win_over_missing_recipients() {
  let r = relay().await;
  board_42(&r).await;
  r.psa().put_ticket(ticket(100, None));
  let outcome = r.process(100, Action::Added, false).await.unwrap();
  assert_eq!(outcome, Outcome::Skipped(Reason::NoRules));
}

#[tokio::test]
async fn new_ticket_is_not_announced_twice() {
  let r = relay().await;
  board_42(&r).await;
  let room = r.store().upsert_recipient(NewRecipient::room("R1", "Ops")).await.unwrap();
  r.store()
    .insert_rule(NewRule { board_id: 42, recipient_id: room.id, notify_enabled: true })
    .await
    .unwrap();
  r.psa().put_ticket(ticket(100, None));

  r.process(100, Action::Added, false).await.unwrap();
  let again = r.process(100, Action::Added, false).await.unwrap();
  assert_eq!(again, Outcome::Skipped(Reason::AlreadyNotified));
  assert_eq!(r.chat().posts().len(), 1);
}

#[tokio::test]
async fn send_failures_are_recorded_and_do_not_stop_others() {
  let r = relay().await;
  chat_person(&r, "Alice").await;
  let bob = chat_person(&r, "Bob").await;
  r.chat().fail_posts_to(person("BOB@x.com"));
  r.psa().put_ticket(ticket(100, Some("alice,bob")));
  r.psa().put_note(note(900, 100, None, "hello"));

  let outcome = r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(outcome, Outcome::Notified { sent: 1, failed: 1 });
  assert_eq!(r.chat().posted_to(), vec![person("alice@x.com")]);

  let rows   = r.store().notifications_for_ticket(100).await.unwrap();
  let failed = rows.iter().find(|n| n.recipient_id == Some(bob.id)).unwrap();
  assert!(!failed.sent && !failed.skipped);
}

#[tokio::test]
async fn dropped_caller_does_not_cut_sends_short() {
  let r = relay().await;
  chat_person(&r, "Alice").await;
  chat_person(&r, "Bob").await;
  r.chat().delay_posts(Duration::from_millis(100));
  r.psa().put_ticket(ticket(100, Some("alice,bob")));
  r.psa().put_note(note(900, 100, None, "hello"));

  let first = r.process(100, Action::Updated, false);
  assert!(tokio::time::timeout(Duration::from_millis(50), first).await.is_err());

  // Waits on the ticket lock until the first run has sent and recorded.
  let again = r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(again, Outcome::Skipped(Reason::AlreadyNotified));
  assert_eq!(r.chat().posted_to(), vec![person("alice@x.com"), person("bob@x.com")]);

  let rows = r.store().notifications_for_ticket(100).await.unwrap();
  assert_eq!(rows.iter().filter(|n| n.sent && n.ticket_note_id == Some(900)).count(), 2);
}

#[tokio::test]
async fn unknown_resources_are_skipped() {
  let r = relay().await;
  chat_person(&r, "Alice").await;
  r.psa().put_ticket(ticket(100, Some("alice, zed")));
  r.psa().put_note(note(900, 100, None, "hello"));

  let outcome = r.process(100, Action::Updated, false).await.unwrap();
  assert_eq!(outcome, Outcome::Notified { sent: 1, failed: 0 });
}

#[tokio::test]
async fn upstream_outage_fails_the_fetch_stage() {
  let r = relay().await;
  r.psa().put_ticket(ticket(100, None));
  r.psa().set_unavailable(true);

  let err = r.process(100, Action::Updated, false).await.unwrap_err();
  assert!(matches!(err, Error::Stage { stage: "fetch", .. }));
  assert!(matches!(err.root(), Error::Upstream(_)));
  assert!(Mirror::<Ticket>::get(r.store(), 100).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn failed_hydration_leaves_no_partial_graph() {
  let r = relay().await;
  r.psa().put_ticket(Ticket { contact_id: Some(99), ..ticket(100, None) });

  let err = r.process(100, Action::Added, false).await.unwrap_err();
  assert!(matches!(err, Error::Stage { stage: "hydrate", .. }));
  assert!(err.is_not_found());
  assert!(Mirror::<Board>::get(r.store(), 42).await.unwrap_err().is_not_found());
  assert!(Mirror::<Ticket>::get(r.store(), 100).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn hydration_mirrors_the_graph() {
  let r = relay().await;
  r.psa().put_ticket(Ticket { contact_id: Some(5), owner_id: Some(4), ..ticket(100, Some("alice")) });
  r.psa().put_note(note(900, 100, Some(3), "hello"));

  r.process(100, Action::Updated, false).await.unwrap();

  let contact: Contact = Mirror::get(r.store(), 5).await.unwrap();
  assert_eq!(contact.company_id, Some(7));
  let stored: Ticket = Mirror::get(r.store(), 100).await.unwrap();
  assert_eq!(stored.owner_id, Some(4));
  assert_eq!(r.store().member_by_identifier("ALICE").await.unwrap().id, 3);
}

#[tokio::test]
async fn reprocessing_rewrites_the_ticket() {
  let r = relay().await;
  r.psa().put_ticket(ticket(100, None));
  r.process(100, Action::Updated, false).await.unwrap();

  r.psa().put_ticket(Ticket { summary: "Renamed".into(), ..ticket(100, None) });
  r.process(100, Action::Updated, false).await.unwrap();

  let stored: Ticket = Mirror::get(r.store(), 100).await.unwrap();
  assert_eq!(stored.summary, "Renamed");
}

#[tokio::test]
async fn delete_soft_deletes_and_tolerates_unknown_tickets() {
  let r = relay().await;
  r.psa().put_ticket(ticket(100, None));
  r.process(100, Action::Updated, false).await.unwrap();

  assert_eq!(r.process(100, Action::Deleted, false).await.unwrap(), Outcome::Deleted);
  let stored: Ticket = Mirror::get(r.store(), 100).await.unwrap();
  assert!(stored.deleted);

  assert_eq!(r.process(555, Action::Deleted, false).await.unwrap(), Outcome::Deleted);
}

#[tokio::test]
async fn mirror_does_not_insert_on_upstream_404() {
  let r      = relay().await;
  let mirror = PsaMirror::new(r.store(), r.psa());

  let err = mirror.ensure_company(404).await.unwrap_err();
  assert!(err.is_not_found());
  let calls = r.psa().calls();

  assert_eq!(mirror.ensure_company(7).await.unwrap().name, "Acme Inc");
  mirror.ensure_company(7).await.unwrap();
  assert_eq!(r.psa().calls(), calls + 1, "second ensure is served from the store");
}

#[tokio::test]
async fn invalid_config_is_rejected() {
  let r   = relay().await;
  let err = r
    .put_config(Config { max_message_length: 0, ..Config::default() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));
  assert_eq!(r.config().await.max_message_length, 300);
}

// ─── Recipients ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn most_recent_person_wins() {
  let r = relay().await;
  let old = Utc::now() - chrono::Duration::days(3);
  r.chat().put_person("wx-old", "Alice (old)", "alice@x.com", old);
  r.chat().put_person("wx-new", "Alice", "alice@x.com", Utc::now());

  let found = r.recipients().ensure_person_by_email("Alice@X.com").await.unwrap();
  assert_eq!(found.external_id, "wx-new");
  assert_eq!(found.kind, RecipientKind::Person);

  // Served from the store afterwards.
  r.recipients().ensure_person_by_email("alice@x.com").await.unwrap();
  assert_eq!(r.chat().people_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_people_are_memoised_for_the_ttl() {
  let r = relay().await;

  for _ in 0..3 {
    let err = r.recipients().ensure_person_by_email("ghost@x.com").await.unwrap_err();
    assert!(err.is_not_found());
  }
  assert_eq!(r.chat().people_calls(), 1);

  tokio::time::advance(Duration::from_secs(61)).await;
  r.recipients().ensure_person_by_email("ghost@x.com").await.unwrap_err();
  assert_eq!(r.chat().people_calls(), 2);
}

#[tokio::test]
async fn room_listing_is_cached() {
  let r = relay().await;
  r.chat().put_room("R1", "Ops", "group");

  assert_eq!(r.recipients().list_rooms().await.unwrap().len(), 1);
  assert_eq!(r.recipients().list_rooms().await.unwrap().len(), 1);
  assert_eq!(r.chat().room_calls(), 1);
}

// ─── Sync ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn board_sync_mirrors_and_retires() {
  let r = relay().await;
  Mirror::<Board>::upsert(r.store(), Board { id: 99, name: "Old".into(), ..Default::default() })
    .await
    .unwrap();
  r.psa().put_board(Board { id: 43, name: "Projects".into(), ..Default::default() });

  let done = r.sync_boards().await.unwrap();
  assert_eq!((done.upserted, done.removed), (2, 1));

  let listed = Mirror::<Board>::list(r.store()).await.unwrap();
  assert_eq!(listed.iter().map(|b| b.id).collect::<Vec<_>>(), vec![42, 43]);
  let old: Board = Mirror::get(r.store(), 99).await.unwrap();
  assert!(old.deleted);
}

#[tokio::test]
async fn recipient_sync_mirrors_group_rooms_and_member_people() {
  let r = relay().await;
  r.chat().put_room("R1", "Ops", "group");
  r.chat().put_room("D1", "Alice", "direct");
  r.chat().put_person("wx-alice", "Alice", "alice@x.com", Utc::now());
  r.store().upsert_recipient(NewRecipient::room("R-old", "Gone")).await.unwrap();
  r.store()
    .upsert_recipient(NewRecipient::person("wx-carol", "Carol", "carol@x.com"))
    .await
    .unwrap();

  let done = r.sync_recipients(Some(2)).await.unwrap();
  assert_eq!((done.rooms, done.people, done.removed), (1, 1, 2));

  let rooms = r.store().list_recipients(Some(RecipientKind::Room)).await.unwrap();
  assert_eq!(rooms.iter().map(|x| x.external_id.as_str()).collect::<Vec<_>>(), vec!["R1"]);
  let people = r.store().list_recipients(Some(RecipientKind::Person)).await.unwrap();
  assert_eq!(people.iter().map(|x| x.external_id.as_str()).collect::<Vec<_>>(), vec!["wx-alice"]);
}

#[tokio::test]
async fn ticket_sync_processes_all_and_collects_failures() {
  let r = relay().await;
  chat_person(&r, "Bob").await;
  for id in [100, 101, 102] {
    r.psa().put_ticket(ticket(id, Some("bob")));
    r.psa().put_note(note(id * 10, id, None, "hello"));
  }
  r.psa().put_ticket(Ticket { company_id: 404, ..ticket(103, None) });

  let report = r
    .sync(SyncRequest { cw_tickets: true, max_concurrent_syncs: Some(2), ..Default::default() })
    .await;
  let done = report.tickets.unwrap();
  assert_eq!((done.processed, done.failed), (3, 1));
  assert!(report.errors.is_empty());
  assert!(r.chat().posts().is_empty());

  for id in [100, 101, 102] {
    let rows = r.store().notifications_for_ticket(id).await.unwrap();
    assert!(rows.iter().all(|n| !n.sent));
  }
}

#[tokio::test]
async fn sync_report_collects_kind_failures() {
  let r = relay().await;
  r.psa().set_unavailable(true);

  let report = r.sync(SyncRequest { cw_boards: true, ..Default::default() }).await;
  assert!(report.boards.is_none());
  assert_eq!(report.errors.len(), 1);
  assert!(report.errors[0].starts_with("boards:"));

  r.psa().set_unavailable(false);
  r.psa().remove_board(42);
  let report = r.sync(SyncRequest { cw_boards: true, ..Default::default() }).await;
  assert_eq!(report.boards.unwrap().upserted, 0);
}

#[tokio::test]
async fn each_sync_kind_runs_once_at_a_time() {
  let r = relay().await;
  r.psa().put_ticket(ticket(100, None));
  let tickets = SyncRequest { cw_tickets: true, ..Default::default() };

  // Holding the store parks the first sync inside its ticket pass.
  let held  = r.store().begin().await.unwrap();
  let first = {
    let r = r.clone();
    tokio::spawn(async move { r.sync_tickets(&[], None).await })
  };
  while r.running_sync(&tickets).is_none() {
    tokio::task::yield_now().await;
  }

  let err = r.sync_tickets(&[], None).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyRunning("tickets")), "{err}");
  assert_eq!(r.running_sync(&SyncRequest { cw_boards: true, ..Default::default() }), None);

  held.rollback().await.unwrap();
  assert_eq!(first.await.unwrap().unwrap().processed, 1);
  assert_eq!(r.running_sync(&tickets), None);
  assert_eq!(r.sync_tickets(&[], None).await.unwrap().processed, 1);
}
