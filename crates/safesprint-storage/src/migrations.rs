//! Database schema migrations.
//!
//! Applies the initial schema: sessions, participants, messages and the
//! schema_migrations bookkeeping table. Record-level invariants (append-only
//! messages, one-way completion, write-once reports) are enforced with
//! CHECK constraints and triggers so no caller can bypass them.

use rusqlite::Connection;
use tracing::info;

use safesprint_core::error::SafeSprintError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), SafeSprintError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SafeSprintError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            SafeSprintError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema. Timestamps are Unix epoch milliseconds.
fn apply_v1(conn: &Connection) -> Result<(), SafeSprintError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id                  TEXT PRIMARY KEY NOT NULL,
            name                TEXT NOT NULL,
            context             TEXT NOT NULL,
            leader_credential   TEXT NOT NULL,
            final_report        TEXT,
            created_at          INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS participants (
            id                  TEXT PRIMARY KEY NOT NULL,
            session_id          TEXT NOT NULL,
            role_label          TEXT NOT NULL,
            access_code         TEXT NOT NULL UNIQUE,
            has_completed       INTEGER NOT NULL DEFAULT 0
                                CHECK (has_completed IN (0, 1)),
            individual_summary  TEXT,
            created_at          INTEGER NOT NULL,
            completed_at        INTEGER,
            CHECK (has_completed = 0 OR individual_summary IS NOT NULL),
            FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_participants_session
            ON participants (session_id, role_label);

        CREATE INDEX IF NOT EXISTS idx_participants_completed
            ON participants (session_id, has_completed);

        CREATE TABLE IF NOT EXISTS messages (
            seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
            id                  TEXT NOT NULL UNIQUE,
            participant_id      TEXT NOT NULL,
            role                TEXT NOT NULL CHECK (role IN ('user', 'ai')),
            content             TEXT NOT NULL,
            created_at          INTEGER NOT NULL,
            FOREIGN KEY (participant_id) REFERENCES participants(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_participant
            ON messages (participant_id, seq ASC);

        CREATE TRIGGER IF NOT EXISTS messages_no_update
            BEFORE UPDATE ON messages
        BEGIN
            SELECT RAISE(ABORT, 'messages are append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS participants_completion_one_way
            BEFORE UPDATE OF has_completed, individual_summary ON participants
            WHEN OLD.has_completed = 1
        BEGIN
            SELECT RAISE(ABORT, 'participant already completed');
        END;

        CREATE TRIGGER IF NOT EXISTS sessions_report_write_once
            BEFORE UPDATE OF final_report ON sessions
            WHEN OLD.final_report IS NOT NULL
        BEGIN
            SELECT RAISE(ABORT, 'final report already set');
        END;

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| SafeSprintError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
