use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::Utc;
use serde_json::{Value, json};
use ticketrelay_core::{
  config::Config,
  entity::Board,
  event::Action,
  recipient::NewRecipient,
  store::{Mirror, Store, Transaction},
  upstream::MessageTarget,
};
use ticketrelay_engine::{
  Relay, RelayOptions, SyncRequest,
  testing::{FakeChat, FakePsa, note, ticket},
};
use ticketrelay_store_sqlite::SqliteStore;
use tower::ServiceExt as _;

use super::{control_router, hooks_router};

type TestRelay = Relay<SqliteStore, FakePsa, FakeChat>;

async fn relay() -> Arc<TestRelay> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let relay = Relay::new(store, FakePsa::seeded(), FakeChat::default(), RelayOptions::default())
    .await
    .unwrap();
  Arc::new(relay)
}

fn app(relay: &Arc<TestRelay>) -> Router {
  hooks_router(relay.clone()).merge(control_router(relay.clone()))
}

async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let req     = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let resp   = app.oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes  = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value  = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, value)
}

async fn board_42(relay: &TestRelay) {
  Mirror::<Board>::upsert(relay.store(), Board {
    id: 42,
    name: "Service".into(),
    ..Default::default()
  })
  .await
  .unwrap();
}

// ── Webhook ──────────────────────────────────────────────────────────────────

/// Poll `done` for up to a second.
async fn eventually(done: impl Fn() -> bool) -> bool {
  for _ in 0..100 {
    if done() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  done()
}

#[tokio::test]
async fn webhook_notifies_once_and_always_answers_204() {
  let r = relay().await;
  r.put_config(Config { attempt_notify: true, ..Config::default() }).await.unwrap();
  board_42(&r).await;
  let room = r.store().upsert_recipient(NewRecipient::room("R1", "Ops")).await.unwrap();
  let (status, _) = call(
    app(&r),
    "POST",
    "/rules",
    Some(json!({ "board_id": 42, "recipient_id": room.id })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  r.psa().put_ticket(ticket(100, None));

  for _ in 0..2 {
    let body        = json!({ "ID": 100, "Action": "Added", "Type": "ticket" });
    let (status, _) = call(app(&r), "POST", "/hooks/tickets", Some(body)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
  }
  assert!(eventually(|| !r.chat().posts().is_empty()).await);

  // Queues behind both events on the ticket lock.
  r.process(100, Action::Added, false).await.unwrap();
  assert_eq!(r.chat().posted_to(), vec![MessageTarget::Room("R1".into())]);

  let (status, rows) = call(app(&r), "GET", "/tickets/100/notifications", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(rows.as_array().unwrap().len(), 1);
  assert_eq!(rows[0]["sent"], true);
}

#[tokio::test]
async fn webhook_rejects_malformed_events() {
  let r = relay().await;
  for body in [json!({ "ID": 0, "Action": "added" }), json!({ "ID": 1, "Action": "merged" })] {
    let (status, err) = call(app(&r), "POST", "/hooks/tickets", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().starts_with("bad request"));
  }
  assert_eq!(r.psa().calls(), 0);
}

#[tokio::test]
async fn webhook_accepts_events_that_later_fail() {
  let r = relay().await;
  r.psa().put_ticket(ticket(100, None));
  r.psa().set_unavailable(true);

  for id in [100, 9999] {
    let body        = json!({ "ID": id, "Action": "updated" });
    let (status, _) = call(app(&r), "POST", "/hooks/tickets", Some(body)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
  }
  assert!(eventually(|| r.psa().calls() >= 2).await);
  assert!(r.chat().posts().is_empty());
  assert!(r.store().notifications_for_ticket(100).await.unwrap().is_empty());
}

// ── Config ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn config_round_trips_and_validates() {
  let r = relay().await;

  let (status, cfg) = call(app(&r), "GET", "/config", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(cfg["attempt_notify"], false);
  assert_eq!(cfg["max_message_length"], 300);

  let body          = json!({ "attempt_notify": true, "max_message_length": 50 });
  let (status, cfg) = call(app(&r), "PUT", "/config", Some(body)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(cfg["max_concurrent_syncs"], 5);
  assert!(r.config().await.attempt_notify);

  let body        = json!({ "max_concurrent_syncs": 0 });
  let (status, _) = call(app(&r), "PUT", "/config", Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(r.config().await.max_message_length, 50);
}

// ── Rules and forwards ───────────────────────────────────────────────────────

#[tokio::test]
async fn rule_crud() {
  let r = relay().await;
  board_42(&r).await;
  let room = r.store().upsert_recipient(NewRecipient::room("R1", "Ops")).await.unwrap();
  let body = json!({ "board_id": 42, "recipient_id": room.id });

  let (status, rule) = call(app(&r), "POST", "/rules", Some(body.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(rule["notify_enabled"], true);
  let id = rule["id"].as_i64().unwrap();

  let (status, _) = call(app(&r), "POST", "/rules", Some(body)).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let unknown     = json!({ "board_id": 77, "recipient_id": room.id });
  let (status, _) = call(app(&r), "POST", "/rules", Some(unknown)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let body           = json!({ "board_id": 42, "recipient_id": room.id, "notify_enabled": false });
  let (status, rule) = call(app(&r), "PUT", &format!("/rules/{id}"), Some(body)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(rule["notify_enabled"], false);

  let (status, _) = call(app(&r), "DELETE", &format!("/rules/{id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = call(app(&r), "GET", &format!("/rules/{id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forward_crud() {
  let r = relay().await;
  let alice = r
    .store()
    .upsert_recipient(NewRecipient::person("wx-a", "Alice", "alice@x.com"))
    .await
    .unwrap();
  let bob = r
    .store()
    .upsert_recipient(NewRecipient::person("wx-b", "Bob", "bob@x.com"))
    .await
    .unwrap();
  let now = Utc::now();

  let backwards = json!({
    "source_recipient_id": alice.id,
    "dest_recipient_id": bob.id,
    "start_date": now,
    "end_date": now - chrono::Duration::days(1),
  });
  let (status, _) = call(app(&r), "POST", "/forwards", Some(backwards)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let body = json!({
    "source_recipient_id": alice.id,
    "dest_recipient_id": bob.id,
    "start_date": now,
    "user_keeps_copy": true,
  });
  let (status, fwd) = call(app(&r), "POST", "/forwards", Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(fwd["enabled"], true);
  let id = fwd["id"].as_i64().unwrap();

  let (_, listed) = call(app(&r), "GET", "/forwards", None).await;
  assert_eq!(listed.as_array().unwrap().len(), 1);

  let (status, _) = call(app(&r), "DELETE", &format!("/forwards/{id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = call(app(&r), "GET", &format!("/forwards/{id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Listings and sync ────────────────────────────────────────────────────────

#[tokio::test]
async fn listings() {
  let r = relay().await;
  r.chat().put_room("R1", "Ops", "group");
  r.store().upsert_recipient(NewRecipient::room("R1", "Ops")).await.unwrap();
  r.store()
    .upsert_recipient(NewRecipient::person("wx-a", "Alice", "alice@x.com"))
    .await
    .unwrap();

  let (_, rooms) = call(app(&r), "GET", "/recipients?kind=room", None).await;
  assert_eq!(rooms.as_array().unwrap().len(), 1);
  assert_eq!(rooms[0]["kind"], "room");

  let (_, all) = call(app(&r), "GET", "/recipients", None).await;
  assert_eq!(all.as_array().unwrap().len(), 2);

  let (status, _) = call(app(&r), "GET", "/recipients?kind=robot", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, live) = call(app(&r), "GET", "/rooms", None).await;
  assert_eq!(live[0]["title"], "Ops");
}

#[tokio::test]
async fn sync_is_accepted_and_runs_in_the_background() {
  let r = relay().await;

  let body        = json!({ "cw_boards": true });
  let (status, _) = call(app(&r), "POST", "/sync", Some(body)).await;
  assert_eq!(status, StatusCode::ACCEPTED);

  let mut boards = Vec::new();
  for _ in 0..100 {
    boards = Mirror::<Board>::list(r.store()).await.unwrap();
    if !boards.is_empty() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(boards.len(), 1);

  let (_, listed) = call(app(&r), "GET", "/boards", None).await;
  assert_eq!(listed[0]["name"], "Service");
}

#[tokio::test]
async fn updated_ticket_reaches_resources() {
  let r = relay().await;
  r.put_config(Config { attempt_notify: true, ..Config::default() }).await.unwrap();
  r.chat().put_person("wx-b", "Bob", "bob@x.com", Utc::now());
  r.psa().put_ticket(ticket(100, Some("bob")));
  r.psa().put_note(note(900, 100, Some(3), "fixed the printer"));

  let body        = json!({ "ID": 100, "Action": "updated" });
  let (status, _) = call(app(&r), "POST", "/hooks/tickets", Some(body)).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert!(eventually(|| !r.chat().posts().is_empty()).await);
  assert_eq!(r.chat().posted_to(), vec![MessageTarget::Person("bob@x.com".into())]);
}

#[tokio::test]
async fn sync_already_in_flight_is_a_conflict() {
  let r = relay().await;
  r.psa().put_ticket(ticket(100, None));
  let req = SyncRequest { cw_tickets: true, ..Default::default() };

  // Holding the store parks the first sync inside its ticket pass.
  let held        = r.store().begin().await.unwrap();
  let body        = json!({ "cw_tickets": true });
  let (status, _) = call(app(&r), "POST", "/sync", Some(body.clone())).await;
  assert_eq!(status, StatusCode::ACCEPTED);
  assert!(eventually(|| r.running_sync(&req).is_some()).await);

  let (status, err) = call(app(&r), "POST", "/sync", Some(body)).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(err["error"], "tickets sync is already running");

  held.rollback().await.unwrap();
  assert!(eventually(|| r.running_sync(&req).is_none()).await);
}
