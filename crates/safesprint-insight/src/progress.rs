//! Session orchestrator: aggregate completion tracking.
//!
//! Progress is always recomputed from participant rows. The watch stream
//! only uses change notifications as a trigger to re-read.

use std::sync::Arc;

use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use safesprint_core::types::{AccessCode, Progress};
use safesprint_storage::{Database, ParticipantRepository, SessionRepository};

use crate::error::InsightError;

/// Completion counters plus the derived eligibility flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    pub session_id: Uuid,
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub eligible: bool,
}

impl ProgressReport {
    fn new(session_id: Uuid, progress: Progress) -> Self {
        Self {
            session_id,
            total: progress.total,
            completed: progress.completed,
            remaining: progress.remaining(),
            eligible: progress.is_eligible(),
        }
    }
}

/// One row of the leader dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardEntry {
    pub participant_id: Uuid,
    pub role_label: String,
    pub access_code: AccessCode,
    pub has_completed: bool,
}

/// Leader view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub session_id: Uuid,
    pub name: String,
    pub context: String,
    pub has_report: bool,
    pub participants: Vec<DashboardEntry>,
    pub progress: ProgressReport,
}

/// Read-only aggregate view over a session's participants.
pub struct SessionOrchestrator {
    db: Arc<Database>,
    sessions: SessionRepository,
    participants: ParticipantRepository,
}

impl SessionOrchestrator {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            sessions: SessionRepository::new(Arc::clone(&db)),
            participants: ParticipantRepository::new(Arc::clone(&db)),
            db,
        }
    }

    /// Current completion counters for a session.
    pub fn progress(&self, session_id: Uuid) -> Result<ProgressReport, InsightError> {
        self.ensure_session(session_id)?;
        let progress = self.participants.progress(session_id)?;
        Ok(ProgressReport::new(session_id, progress))
    }

    /// Fail with [`InsightError::NotEligible`] unless every participant finished.
    pub fn ensure_eligible(&self, session_id: Uuid) -> Result<ProgressReport, InsightError> {
        let report = self.progress(session_id)?;
        if !report.eligible {
            return Err(InsightError::NotEligible {
                completed: report.completed,
                total: report.total,
            });
        }
        Ok(report)
    }

    /// Session header, participants ordered by role label, and progress.
    pub fn dashboard(&self, session_id: Uuid) -> Result<Dashboard, InsightError> {
        let session = self
            .sessions
            .find_by_id(session_id)?
            .ok_or(InsightError::SessionNotFound(session_id))?;
        let participants = self.participants.list_by_session(session_id)?;

        let completed = participants.iter().filter(|p| p.has_completed).count();
        let progress = ProgressReport::new(
            session_id,
            Progress {
                total: participants.len(),
                completed,
            },
        );

        Ok(Dashboard {
            session_id,
            name: session.name,
            context: session.context,
            has_report: session.final_report.is_some(),
            participants: participants
                .into_iter()
                .map(|p| DashboardEntry {
                    participant_id: p.id,
                    role_label: p.role_label,
                    access_code: p.access_code,
                    has_completed: p.has_completed,
                })
                .collect(),
            progress,
        })
    }

    /// Stream of progress values: the current one first, then a fresh value
    /// after every participant change in this session.
    ///
    /// A lagging subscriber re-reads on the next delivery, so it may skip
    /// intermediate values but never reports stale counts.
    pub fn watch(
        &self,
        session_id: Uuid,
    ) -> Result<impl Stream<Item = ProgressReport> + Send + 'static, InsightError> {
        let receiver = self.db.changes().subscribe();
        let initial = self.progress(session_id)?;
        let participants = ParticipantRepository::new(Arc::clone(&self.db));

        let updates = BroadcastStream::new(receiver).filter_map(move |change| {
            match change {
                Ok(change) if !change.affects_participants_of(session_id) => return None,
                Ok(_) => {}
                Err(lagged) => debug!(session_id = %session_id, error = %lagged, "Progress watcher lagged"),
            }
            match participants.progress(session_id) {
                Ok(progress) => Some(ProgressReport::new(session_id, progress)),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Failed to recompute progress");
                    None
                }
            }
        });

        Ok(tokio_stream::once(initial).chain(updates))
    }

    fn ensure_session(&self, session_id: Uuid) -> Result<(), InsightError> {
        match self.sessions.find_by_id(session_id)? {
            Some(_) => Ok(()),
            None => Err(InsightError::SessionNotFound(session_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safesprint_core::config::SessionConfig;
    use safesprint_core::types::{MessageRole, NewSession};
    use safesprint_storage::MessageRepository;
    use std::time::Duration;

    use crate::setup::{CreatedSession, SessionSetup};

    fn seeded(roles: &[&str]) -> (Arc<Database>, CreatedSession) {
        let db = Arc::new(Database::in_memory().unwrap());
        let created = SessionSetup::new(Arc::clone(&db), SessionConfig::default())
            .create_session(NewSession {
                name: "Sprint 3".into(),
                context: "Too many production incidents this sprint.".into(),
                leader_credential: "k".into(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            })
            .unwrap();
        (db, created)
    }

    fn complete(db: &Arc<Database>, participant_id: Uuid) {
        let repo = ParticipantRepository::new(Arc::clone(db));
        let p = repo.find_by_id(participant_id).unwrap().unwrap();
        assert!(repo.complete(&p, "- paging fatigue").unwrap());
    }

    #[test]
    fn test_progress_counts_and_eligibility() {
        let (db, created) = seeded(&["QA", "Dev"]);
        let orchestrator = SessionOrchestrator::new(Arc::clone(&db));

        let p = orchestrator.progress(created.session_id).unwrap();
        assert_eq!((p.total, p.completed, p.eligible), (2, 0, false));
        assert!(matches!(
            orchestrator.ensure_eligible(created.session_id),
            Err(InsightError::NotEligible { completed: 0, total: 2 })
        ));

        complete(&db, created.participants[0].participant_id);
        let p = orchestrator.progress(created.session_id).unwrap();
        assert_eq!((p.completed, p.remaining, p.eligible), (1, 1, false));

        complete(&db, created.participants[1].participant_id);
        assert!(orchestrator.ensure_eligible(created.session_id).unwrap().eligible);
    }

    #[test]
    fn test_progress_unknown_session() {
        let db = Arc::new(Database::in_memory().unwrap());
        let orchestrator = SessionOrchestrator::new(db);
        assert!(matches!(
            orchestrator.progress(Uuid::new_v4()),
            Err(InsightError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_dashboard_orders_by_role() {
        let (db, created) = seeded(&["QA Engineer", "Backend Dev", "Designer"]);
        let dashboard = SessionOrchestrator::new(db).dashboard(created.session_id).unwrap();

        let roles: Vec<&str> = dashboard.participants.iter().map(|p| p.role_label.as_str()).collect();
        assert_eq!(roles, vec!["Backend Dev", "Designer", "QA Engineer"]);
        assert_eq!(dashboard.progress.total, 3);
        assert!(!dashboard.has_report);
    }

    #[tokio::test]
    async fn test_watch_emits_on_participant_changes_only() {
        let (db, created) = seeded(&["QA", "Dev"]);
        let orchestrator = SessionOrchestrator::new(Arc::clone(&db));
        let stream = orchestrator.watch(created.session_id).unwrap();
        tokio::pin!(stream);

        let first = stream.next().await.unwrap();
        assert_eq!(first.completed, 0);

        // Messages do not affect progress and are filtered out.
        let participant = ParticipantRepository::new(Arc::clone(&db))
            .find_by_id(created.participants[0].participant_id)
            .unwrap()
            .unwrap();
        MessageRepository::new(Arc::clone(&db))
            .append(&participant, MessageRole::User, "hi")
            .unwrap();

        complete(&db, participant.id);
        let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.completed, 1);
        assert!(!next.eligible);
    }

    #[tokio::test]
    async fn test_watch_ignores_other_sessions() {
        let (db, created) = seeded(&["QA"]);
        let other = SessionSetup::new(Arc::clone(&db), SessionConfig::default())
            .create_session(NewSession {
                name: "Other".into(),
                context: "An unrelated retrospective context.".into(),
                leader_credential: "k".into(),
                roles: vec!["Dev".into()],
            })
            .unwrap();

        let orchestrator = SessionOrchestrator::new(Arc::clone(&db));
        let stream = orchestrator.watch(created.session_id).unwrap();
        tokio::pin!(stream);
        stream.next().await.unwrap();

        complete(&db, other.participants[0].participant_id);
        let quiet = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
        assert!(quiet.is_err());
    }
}
