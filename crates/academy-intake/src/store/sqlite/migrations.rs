//! Schema migrations keyed on `PRAGMA user_version`.

use rusqlite::Connection;

use crate::store::StoreError;

/// Bump together with a new `if current < N` block.
pub const CURRENT_VERSION: u32 = 1;

const V001_INITIAL: &str = r#"
CREATE TABLE IF NOT EXISTS persons (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    email        TEXT NOT NULL UNIQUE,          -- trimmed, lowercase
    national_id  TEXT,
    first_name   TEXT,
    last_name    TEXT,
    phone        TEXT,
    grade        TEXT,
    subsystem    TEXT,
    external_id  TEXT,                          -- LMS user id, write-once
    created_at   TEXT NOT NULL,                 -- RFC 3339, millisecond precision
    updated_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_persons_national_id ON persons(national_id);

CREATE TABLE IF NOT EXISTS courses (
    id         INTEGER PRIMARY KEY,
    shortname  TEXT NOT NULL UNIQUE,
    name       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollments (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id     INTEGER NOT NULL,
    course_id     INTEGER NOT NULL,
    accepted      INTEGER NOT NULL DEFAULT 0,
    course_label  TEXT,
    observation   TEXT,
    edited_by     TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,

    UNIQUE (person_id, course_id),
    FOREIGN KEY (person_id) REFERENCES persons(id) ON DELETE CASCADE,
    FOREIGN KEY (course_id) REFERENCES courses(id)
);
CREATE INDEX IF NOT EXISTS idx_enrollments_created ON enrollments(created_at);

CREATE TABLE IF NOT EXISTS payments (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    enrollment_id     INTEGER NOT NULL,
    course_label      TEXT,
    amount_deposited  REAL NOT NULL DEFAULT 0,
    confirmed         INTEGER NOT NULL DEFAULT 0,
    verified          INTEGER NOT NULL DEFAULT 0,
    badge             INTEGER NOT NULL DEFAULT 0,
    coin              INTEGER NOT NULL DEFAULT 0,
    delivered         INTEGER NOT NULL DEFAULT 0,
    observation       TEXT,
    edited_by         TEXT,
    receipt_url       TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,

    FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_payments_enrollment ON payments(enrollment_id, created_at);

CREATE TABLE IF NOT EXISTS certificates (
    national_id   TEXT NOT NULL,
    course_label  TEXT NOT NULL,
    url           TEXT NOT NULL,

    PRIMARY KEY (national_id, course_label)
);

CREATE TABLE IF NOT EXISTS contact_messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    phone       TEXT,
    message     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
"#;

/// Applies every migration newer than the stored `user_version`.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    if current < 1 {
        tracing::info!("applying migration v001_initial");
        conn.execute_batch(V001_INITIAL)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    Ok(())
}
