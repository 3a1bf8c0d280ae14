//! Repository implementations for SQLite-backed persistence.
//!
//! Provides SessionRepository, ParticipantRepository and MessageRepository
//! that operate on the Database struct using raw SQL. Every successful write
//! is announced on the database's change feed.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{ErrorCode, OptionalExtension};
use uuid::Uuid;

use safesprint_core::error::SafeSprintError;
use safesprint_core::events::{ChangeKind, RecordChange};
use safesprint_core::types::{AccessCode, Message, MessageRole, Participant, Progress, Session};

use crate::db::Database;

const SESSION_COLUMNS: &str = "id, name, context, leader_credential, final_report, created_at";
const PARTICIPANT_COLUMNS: &str = "id, session_id, role_label, access_code, has_completed, individual_summary, created_at, completed_at";
const MESSAGE_COLUMNS: &str = "seq, id, participant_id, role, content, created_at";

/// Repository for sessions.
pub struct SessionRepository {
    db: Arc<Database>,
}

impl SessionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a session and its participants in one transaction.
    ///
    /// A duplicate access code rolls the whole batch back and surfaces as
    /// [`SafeSprintError::Constraint`].
    pub fn create_with_participants(
        &self,
        session: &Session,
        participants: &[Participant],
    ) -> Result<(), SafeSprintError> {
        self.db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO sessions (id, name, context, leader_credential, final_report, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    session.id.to_string(),
                    session.name,
                    session.context,
                    session.leader_credential,
                    session.final_report,
                    session.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| write_error("Failed to save session", e))?;

            let mut stmt = tx
                .prepare(
                    "INSERT INTO participants (id, session_id, role_label, access_code, has_completed, individual_summary, created_at)
                     VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5)",
                )
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;
            for p in participants {
                stmt.execute(rusqlite::params![
                    p.id.to_string(),
                    session.id.to_string(),
                    p.role_label,
                    p.access_code.as_str(),
                    p.created_at.timestamp_millis(),
                ])
                .map_err(|e| write_error("Failed to save participant", e))?;
            }
            Ok(())
        })?;

        let feed = self.db.changes();
        feed.publish(RecordChange::new(ChangeKind::Session, session.id, session.id));
        for p in participants {
            feed.publish(RecordChange::new(ChangeKind::Participant, session.id, p.id));
        }
        Ok(())
    }

    /// Find a session by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, SafeSprintError> {
        self.db
            .with_conn(|conn| {
                let sql = format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS);
                let result = conn
                    .query_row(&sql, rusqlite::params![id.to_string()], |row| {
                        Ok(row_to_session(row))
                    })
                    .optional()
                    .map_err(|e| SafeSprintError::Storage(e.to_string()))?;

                match result {
                    Some(session) => Ok(Some(session?)),
                    None => Ok(None),
                }
            })
    }

    /// Attach the final report unless one is already stored.
    ///
    /// Returns `true` when this call wrote the report, `false` when another
    /// writer got there first (or the session does not exist).
    pub fn set_final_report_if_absent(
        &self,
        id: Uuid,
        report: &str,
    ) -> Result<bool, SafeSprintError> {
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET final_report = ?1 WHERE id = ?2 AND final_report IS NULL",
                rusqlite::params![report, id.to_string()],
            )
            .map_err(|e| write_error("Failed to save final report", e))
        })?;

        if updated == 1 {
            self.db
                .changes()
                .publish(RecordChange::new(ChangeKind::Session, id, id));
        }
        Ok(updated == 1)
    }

    /// Count all sessions.
    pub fn count(&self) -> Result<u64, SafeSprintError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

/// Repository for participants.
pub struct ParticipantRepository {
    db: Arc<Database>,
}

impl ParticipantRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Find a participant by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Participant>, SafeSprintError> {
        self.find_one("id = ?1", id.to_string())
    }

    /// Exact-match lookup on an (already normalized) access code.
    pub fn find_by_access_code(
        &self,
        code: &AccessCode,
    ) -> Result<Option<Participant>, SafeSprintError> {
        self.find_one("access_code = ?1", code.as_str().to_string())
    }

    /// Whether any participant in any session already holds `code`.
    pub fn access_code_exists(&self, code: &AccessCode) -> Result<bool, SafeSprintError> {
        self.db.with_conn(|conn| {
            let exists: i64 = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM participants WHERE access_code = ?1)",
                    rusqlite::params![code.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;
            Ok(exists == 1)
        })
    }

    /// All participants of a session, ordered by role label.
    pub fn list_by_session(&self, session_id: Uuid) -> Result<Vec<Participant>, SafeSprintError> {
        self.find_many(
            "session_id = ?1 ORDER BY role_label ASC, created_at ASC, id ASC",
            session_id,
        )
    }

    /// Completed participants of a session, in completion order.
    pub fn list_completed(&self, session_id: Uuid) -> Result<Vec<Participant>, SafeSprintError> {
        self.find_many(
            "session_id = ?1 AND has_completed = 1 ORDER BY completed_at ASC, id ASC",
            session_id,
        )
    }

    /// Total and completed participant counts, read straight from the rows.
    pub fn progress(&self, session_id: Uuid) -> Result<Progress, SafeSprintError> {
        self.db.with_conn(|conn| {
            let (total, completed): (i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(has_completed), 0)
                     FROM participants WHERE session_id = ?1",
                    rusqlite::params![session_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;
            Ok(Progress {
                total: total as usize,
                completed: completed as usize,
            })
        })
    }

    /// Store the summary and set the completion flag in a single write.
    ///
    /// Guarded by the prior flag value: returns `false` without touching the
    /// row when the participant had already completed.
    pub fn complete(&self, participant: &Participant, summary: &str) -> Result<bool, SafeSprintError> {
        let now = Utc::now();
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE participants
                 SET has_completed = 1, individual_summary = ?1, completed_at = ?2
                 WHERE id = ?3 AND has_completed = 0",
                rusqlite::params![summary, now.timestamp_millis(), participant.id.to_string()],
            )
            .map_err(|e| write_error("Failed to complete participant", e))
        })?;

        if updated == 1 {
            self.db.changes().publish(RecordChange::new(
                ChangeKind::Participant,
                participant.session_id,
                participant.id,
            ));
        }
        Ok(updated == 1)
    }

    fn find_one(
        &self,
        predicate: &str,
        value: String,
    ) -> Result<Option<Participant>, SafeSprintError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM participants WHERE {}",
                PARTICIPANT_COLUMNS, predicate
            );
            let result = conn
                .query_row(&sql, rusqlite::params![value], |row| {
                    Ok(row_to_participant(row))
                })
                .optional()
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;

            match result {
                Some(p) => Ok(Some(p?)),
                None => Ok(None),
            }
        })
    }

    fn find_many(
        &self,
        clause: &str,
        session_id: Uuid,
    ) -> Result<Vec<Participant>, SafeSprintError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM participants WHERE {}",
                PARTICIPANT_COLUMNS, clause
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.to_string()], |row| {
                    Ok(row_to_participant(row))
                })
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;

            let mut participants = Vec::new();
            for row in rows {
                let p = row.map_err(|e| SafeSprintError::Storage(e.to_string()))??;
                participants.push(p);
            }
            Ok(participants)
        })
    }
}

/// Repository for conversation messages. Append-only.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message to a participant's conversation.
    pub fn append(
        &self,
        participant: &Participant,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, SafeSprintError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        let seq = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, participant_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id.to_string(),
                    participant.id.to_string(),
                    role.as_str(),
                    content,
                    created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| write_error("Failed to save message", e))?;
            Ok(conn.last_insert_rowid())
        })?;

        self.db.changes().publish(RecordChange::new(
            ChangeKind::Message,
            participant.session_id,
            id,
        ));

        Ok(Message {
            id,
            seq,
            participant_id: participant.id,
            role,
            content: content.to_string(),
            created_at: from_millis(created_at.timestamp_millis()),
        })
    }

    /// All messages of a participant in canonical conversation order.
    ///
    /// Ordered by the store-assigned sequence, which follows insertion and
    /// is immune to wall-clock steps between appends.
    pub fn list_by_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<Message>, SafeSprintError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE participant_id = ?1
                 ORDER BY seq ASC",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![participant_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let m = row.map_err(|e| SafeSprintError::Storage(e.to_string()))??;
                messages.push(m);
            }
            Ok(messages)
        })
    }

    /// Number of messages a participant has with the given author role.
    pub fn count_by_role(
        &self,
        participant_id: Uuid,
        role: MessageRole,
    ) -> Result<usize, SafeSprintError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM messages WHERE participant_id = ?1 AND role = ?2",
                    rusqlite::params![participant_id.to_string(), role.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;
            Ok(count as usize)
        })
    }
}

// =============================================================================
// Row mapping helpers
// =============================================================================

fn write_error(context: &str, err: rusqlite::Error) -> SafeSprintError {
    match err {
        rusqlite::Error::SqliteFailure(ref code, _) if code.code == ErrorCode::ConstraintViolation => {
            SafeSprintError::Constraint(format!("{}: {}", context, err))
        }
        other => SafeSprintError::Storage(format!("{}: {}", context, other)),
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn parse_uuid(value: &str) -> Result<Uuid, SafeSprintError> {
    Uuid::parse_str(value).map_err(|e| SafeSprintError::Storage(format!("Invalid UUID: {}", e)))
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, SafeSprintError> {
    let id: String = row.get(0).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(5).map_err(|e| SafeSprintError::Storage(e.to_string()))?;

    Ok(Session {
        id: parse_uuid(&id)?,
        name: row.get(1).map_err(|e| SafeSprintError::Storage(e.to_string()))?,
        context: row.get(2).map_err(|e| SafeSprintError::Storage(e.to_string()))?,
        leader_credential: row.get(3).map_err(|e| SafeSprintError::Storage(e.to_string()))?,
        final_report: row.get(4).map_err(|e| SafeSprintError::Storage(e.to_string()))?,
        created_at: from_millis(created_at),
    })
}

fn row_to_participant(row: &rusqlite::Row<'_>) -> Result<Participant, SafeSprintError> {
    let id: String = row.get(0).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let session_id: String = row.get(1).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let access_code: String = row.get(3).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let has_completed: i64 = row.get(4).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(6).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let completed_at: Option<i64> =
        row.get(7).map_err(|e| SafeSprintError::Storage(e.to_string()))?;

    Ok(Participant {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        role_label: row.get(2).map_err(|e| SafeSprintError::Storage(e.to_string()))?,
        access_code: AccessCode::from_stored(access_code),
        has_completed: has_completed != 0,
        individual_summary: row.get(5).map_err(|e| SafeSprintError::Storage(e.to_string()))?,
        created_at: from_millis(created_at),
        completed_at: completed_at.map(from_millis),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, SafeSprintError> {
    let id: String = row.get(1).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let participant_id: String = row.get(2).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let role: String = row.get(3).map_err(|e| SafeSprintError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(5).map_err(|e| SafeSprintError::Storage(e.to_string()))?;

    let role = MessageRole::parse(&role)
        .ok_or_else(|| SafeSprintError::Storage(format!("Unknown message role: {}", role)))?;

    Ok(Message {
        id: parse_uuid(&id)?,
        seq: row.get(0).map_err(|e| SafeSprintError::Storage(e.to_string()))?,
        participant_id: parse_uuid(&participant_id)?,
        role,
        content: row.get(4).map_err(|e| SafeSprintError::Storage(e.to_string()))?,
        created_at: from_millis(created_at),
    })
}
