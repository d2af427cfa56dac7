//! SQL schema for the relay's SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Mirrored PSA entities. IDs are the upstream IDs.
CREATE TABLE IF NOT EXISTS boards (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    updated_on  TEXT NOT NULL,
    added_on    TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS companies (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    updated_on  TEXT NOT NULL,
    added_on    TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS contacts (
    id          INTEGER PRIMARY KEY,
    first_name  TEXT NOT NULL,
    last_name   TEXT,
    company_id  INTEGER REFERENCES companies(id),
    updated_on  TEXT NOT NULL,
    added_on    TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS members (
    id             INTEGER PRIMARY KEY,
    identifier     TEXT NOT NULL,
    first_name     TEXT NOT NULL,
    last_name      TEXT,
    primary_email  TEXT,
    updated_on     TEXT NOT NULL,
    added_on       TEXT NOT NULL,
    deleted        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS ticket_statuses (
    id          INTEGER PRIMARY KEY,
    board_id    INTEGER NOT NULL REFERENCES boards(id),
    name        TEXT NOT NULL,
    closed      INTEGER NOT NULL DEFAULT 0,
    inactive    INTEGER NOT NULL DEFAULT 0,
    updated_on  TEXT NOT NULL,
    added_on    TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS tickets (
    id          INTEGER PRIMARY KEY,
    summary     TEXT NOT NULL,
    board_id    INTEGER NOT NULL REFERENCES boards(id),
    status_id   INTEGER NOT NULL REFERENCES ticket_statuses(id),
    owner_id    INTEGER REFERENCES members(id),
    company_id  INTEGER NOT NULL REFERENCES companies(id),
    contact_id  INTEGER REFERENCES contacts(id),
    resources   TEXT,              -- comma-separated member identifiers
    updated_by  TEXT,
    updated_on  TEXT NOT NULL,
    added_on    TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS ticket_notes (
    id          INTEGER PRIMARY KEY,
    ticket_id   INTEGER NOT NULL REFERENCES tickets(id),
    member_id   INTEGER REFERENCES members(id),
    contact_id  INTEGER REFERENCES contacts(id),
    content     TEXT,
    created_by  TEXT,
    updated_on  TEXT NOT NULL,
    added_on    TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0
);

-- Chat platform rooms and persons.
CREATE TABLE IF NOT EXISTS chat_recipients (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id    TEXT NOT NULL UNIQUE,
    name           TEXT NOT NULL,
    email          TEXT,            -- persons only
    kind           TEXT NOT NULL,   -- 'room' | 'person'
    last_activity  TEXT NOT NULL,
    created_on     TEXT NOT NULL,
    updated_on     TEXT NOT NULL,
    CHECK (kind IN ('room', 'person')),
    CHECK (kind = 'person' OR email IS NULL)
);

CREATE TABLE IF NOT EXISTS notifier_rules (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    board_id        INTEGER NOT NULL REFERENCES boards(id),
    recipient_id    INTEGER NOT NULL REFERENCES chat_recipients(id) ON DELETE CASCADE,
    notify_enabled  INTEGER NOT NULL DEFAULT 1,
    created_on      TEXT NOT NULL,
    UNIQUE (board_id, recipient_id)
);

CREATE TABLE IF NOT EXISTS notifier_forwards (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    source_recipient_id  INTEGER NOT NULL REFERENCES chat_recipients(id) ON DELETE CASCADE,
    dest_recipient_id    INTEGER NOT NULL REFERENCES chat_recipients(id) ON DELETE CASCADE,
    start_date           TEXT,
    end_date             TEXT,
    enabled              INTEGER NOT NULL DEFAULT 1,
    user_keeps_copy      INTEGER NOT NULL DEFAULT 0,
    created_on           TEXT NOT NULL,
    updated_on           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ticket_notifications (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id          INTEGER NOT NULL REFERENCES tickets(id),
    ticket_note_id     INTEGER REFERENCES ticket_notes(id) ON DELETE SET NULL,
    recipient_id       INTEGER REFERENCES chat_recipients(id) ON DELETE SET NULL,
    forwarded_from_id  INTEGER REFERENCES chat_recipients(id) ON DELETE SET NULL,
    sent               INTEGER NOT NULL DEFAULT 0,
    skipped            INTEGER NOT NULL DEFAULT 0,
    created_on         TEXT NOT NULL,
    updated_on         TEXT NOT NULL
);

-- The at-most-once marker: one sent row per note and recipient.
CREATE UNIQUE INDEX IF NOT EXISTS ticket_notifications_sent_uq
    ON ticket_notifications(ticket_note_id, recipient_id) WHERE sent = 1;

CREATE TABLE IF NOT EXISTS app_config (
    id                    INTEGER PRIMARY KEY CHECK (id = 1),
    attempt_notify        INTEGER NOT NULL,
    max_message_length    INTEGER NOT NULL,
    max_concurrent_syncs  INTEGER NOT NULL,
    skip_launch_syncs     INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS members_identifier_idx      ON members(identifier);
CREATE INDEX IF NOT EXISTS ticket_notes_ticket_idx     ON ticket_notes(ticket_id);
CREATE INDEX IF NOT EXISTS chat_recipients_email_idx   ON chat_recipients(email);
CREATE INDEX IF NOT EXISTS notifier_forwards_src_idx   ON notifier_forwards(source_recipient_id);
CREATE INDEX IF NOT EXISTS ticket_notifications_ticket ON ticket_notifications(ticket_id);

PRAGMA user_version = 1;
";
