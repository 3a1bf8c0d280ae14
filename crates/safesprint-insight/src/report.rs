//! Report synthesis.
//!
//! Turns the individual summaries of a session into one Markdown action-plan
//! report. The report is generated at most once per session; later calls
//! return the stored text.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use safesprint_core::error::SafeSprintError;
use safesprint_core::types::Session;
use safesprint_llm::{CompletionError, CompletionService};
use safesprint_storage::{Database, ParticipantRepository, SessionRepository};

use crate::error::InsightError;

/// Separator placed between individual summaries in the report request.
pub const SUMMARY_SEPARATOR: &str = "\n\n---\n\n";

/// Build the report request from the session context and joined summaries.
pub fn report_prompt(context: &str, joined_summaries: &str) -> String {
    format!(
        "Act as a Senior Technical Program Manager. The team ran an anonymous \
         retrospective about: \"{context}\".\n\n\
         Analyze these anonymous feedback summaries:\n\n{joined_summaries}\n\n\
         Write the report in Markdown with these sections:\n\
         ## Executive Summary\n\
         A short paragraph on the overall state of the team.\n\
         ## Root Causes\n\
         A bullet list of the recurring patterns behind the friction.\n\
         ## Action Plan\n\
         A table with columns Issue | Solution | Effort, framed as Start / Stop / Continue.\n\
         ## Team Sentiment\n\
         One or two sentences on morale.\n\n\
         Do not attribute any point to an individual or a role."
    )
}

/// Produces and caches the session-level report.
pub struct ReportSynthesizer<C: CompletionService> {
    sessions: SessionRepository,
    participants: ParticipantRepository,
    completion: Arc<C>,
}

impl<C: CompletionService> ReportSynthesizer<C> {
    pub fn new(db: Arc<Database>, completion: Arc<C>) -> Self {
        Self {
            sessions: SessionRepository::new(Arc::clone(&db)),
            participants: ParticipantRepository::new(db),
            completion,
        }
    }

    /// Return the stored report, generating and storing it first if needed.
    ///
    /// Fails with [`InsightError::NoInput`] when no participant has a
    /// non-blank summary. A failed generation leaves the session unchanged,
    /// so the call can simply be repeated.
    pub async fn synthesize(&self, session_id: Uuid) -> Result<String, InsightError> {
        let session = self.load(session_id)?;
        if let Some(report) = session.final_report {
            debug!(session_id = %session_id, "Returning cached report");
            return Ok(report);
        }

        let summaries: Vec<String> = self
            .participants
            .list_completed(session_id)?
            .into_iter()
            .filter_map(|p| p.individual_summary)
            .filter(|s| !s.trim().is_empty())
            .collect();
        if summaries.is_empty() {
            return Err(InsightError::NoInput);
        }

        let prompt = report_prompt(&session.context, &summaries.join(SUMMARY_SEPARATOR));
        let report = match self.completion.complete(&[], &prompt, "").await {
            Ok(report) if !report.trim().is_empty() => report,
            Ok(_) => return Err(self.synthesis_failed(session_id, CompletionError::EmptyResponse)),
            Err(e) => return Err(self.synthesis_failed(session_id, e)),
        };

        if self.sessions.set_final_report_if_absent(session_id, &report)? {
            info!(
                session_id = %session_id,
                summaries = summaries.len(),
                "Final report stored"
            );
            return Ok(report);
        }

        debug!(session_id = %session_id, "Report stored concurrently; returning stored copy");
        self.load(session_id)?.final_report.ok_or_else(|| {
            InsightError::Storage(SafeSprintError::Storage(format!(
                "final report for session {} missing after write",
                session_id
            )))
        })
    }

    /// The stored report, if one exists. Never generates.
    pub fn report(&self, session_id: Uuid) -> Result<Option<String>, InsightError> {
        Ok(self.load(session_id)?.final_report)
    }

    fn load(&self, session_id: Uuid) -> Result<Session, InsightError> {
        self.sessions
            .find_by_id(session_id)?
            .ok_or(InsightError::SessionNotFound(session_id))
    }

    fn synthesis_failed(&self, session_id: Uuid, error: CompletionError) -> InsightError {
        warn!(session_id = %session_id, error = %error, "Report synthesis failed");
        InsightError::Synthesis(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safesprint_core::config::{InterviewConfig, SessionConfig};
    use safesprint_core::types::NewSession;
    use safesprint_interview::{FinalizeOutcome, InterviewEngine};
    use safesprint_llm::MockCompletionService;
    use std::time::Duration;

    use crate::progress::SessionOrchestrator;
    use crate::setup::{CreatedSession, SessionSetup};

    const REPORT: &str = "## Executive Summary\nTired team.\n\n## Action Plan\n| Issue | Solution | Effort |";

    struct Fixture {
        db: Arc<Database>,
        mock: Arc<MockCompletionService>,
        synthesizer: ReportSynthesizer<MockCompletionService>,
        created: CreatedSession,
    }

    fn fixture(roles: &[&str]) -> Fixture {
        fixture_with(roles, MockCompletionService::new())
    }

    fn fixture_with(roles: &[&str], mock: MockCompletionService) -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let created = SessionSetup::new(Arc::clone(&db), SessionConfig::default())
            .create_session(NewSession {
                name: "Sprint 9".into(),
                context: "Velocity dropped after the team reshuffle.".into(),
                leader_credential: "lead".into(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            })
            .unwrap();
        let mock = Arc::new(mock);
        let synthesizer = ReportSynthesizer::new(Arc::clone(&db), Arc::clone(&mock));
        Fixture {
            db,
            mock,
            synthesizer,
            created,
        }
    }

    fn complete_with(f: &Fixture, index: usize, summary: &str) {
        let repo = ParticipantRepository::new(Arc::clone(&f.db));
        let p = repo
            .find_by_id(f.created.participants[index].participant_id)
            .unwrap()
            .unwrap();
        assert!(repo.complete(&p, summary).unwrap());
    }

    #[test]
    fn test_report_prompt_template() {
        let prompt = report_prompt("ctx", "a\n\n---\n\nb");
        assert!(prompt.contains("## Action Plan"));
        assert!(prompt.contains("Start / Stop / Continue"));
        assert!(prompt.contains("a\n\n---\n\nb"));
    }

    #[tokio::test]
    async fn test_no_input_without_summaries() {
        let f = fixture(&["Dev", "QA"]);
        let err = f.synthesizer.synthesize(f.created.session_id).await.unwrap_err();
        assert!(matches!(err, InsightError::NoInput));
        assert_eq!(f.mock.call_count(), 0);
        assert!(f.synthesizer.report(f.created.session_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_summaries_are_dropped() {
        let f = fixture(&["Dev", "QA"]);
        complete_with(&f, 0, "   ");
        complete_with(&f, 1, "- flaky tests");
        f.mock.push_reply(REPORT);

        f.synthesizer.synthesize(f.created.session_id).await.unwrap();
        let call = f.mock.last_call().unwrap();
        assert!(call.new_input.contains("- flaky tests"));
        assert!(!call.new_input.contains(SUMMARY_SEPARATOR));
    }

    #[tokio::test]
    async fn test_cached_report_skips_generation() {
        let f = fixture(&["Dev"]);
        complete_with(&f, 0, "- too many meetings");
        f.mock.push_reply(REPORT);

        let first = f.synthesizer.synthesize(f.created.session_id).await.unwrap();
        let second = f.synthesizer.synthesize(f.created.session_id).await.unwrap();
        assert_eq!(first, REPORT);
        assert_eq!(second, first);
        assert_eq!(f.mock.call_count(), 1);
        assert_eq!(
            f.synthesizer.report(f.created.session_id).unwrap().as_deref(),
            Some(REPORT)
        );
    }

    #[tokio::test]
    async fn test_failure_leaves_session_unchanged() {
        let f = fixture(&["Dev"]);
        complete_with(&f, 0, "- scope creep");

        f.mock.push_error(CompletionError::Service {
            status: 503,
            message: "overloaded".into(),
        });
        assert!(matches!(
            f.synthesizer.synthesize(f.created.session_id).await,
            Err(InsightError::Synthesis(CompletionError::Service { status: 503, .. }))
        ));
        f.mock.push_reply("");
        assert!(matches!(
            f.synthesizer.synthesize(f.created.session_id).await,
            Err(InsightError::Synthesis(CompletionError::EmptyResponse))
        ));
        assert!(f.synthesizer.report(f.created.session_id).unwrap().is_none());

        f.mock.push_reply(REPORT);
        assert_eq!(f.synthesizer.synthesize(f.created.session_id).await.unwrap(), REPORT);
    }

    #[tokio::test]
    async fn test_stored_report_is_returned_without_generation() {
        let f = fixture(&["Dev"]);
        complete_with(&f, 0, "- burnout");
        let sessions = SessionRepository::new(Arc::clone(&f.db));
        assert!(sessions
            .set_final_report_if_absent(f.created.session_id, "# Existing")
            .unwrap());

        let result = f.synthesizer.synthesize(f.created.session_id).await.unwrap();
        assert_eq!(result, "# Existing");
        assert_eq!(f.mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writer_wins() {
        let f = fixture_with(&["Dev"], MockCompletionService::new().with_delay(Duration::from_millis(100)));
        complete_with(&f, 0, "- burnout");
        f.mock.push_reply("# Loser");

        let sessions = SessionRepository::new(Arc::clone(&f.db));
        let (result, written) = tokio::join!(
            f.synthesizer.synthesize(f.created.session_id),
            async {
                // Lands while our generation is still in flight.
                tokio::time::sleep(Duration::from_millis(20)).await;
                sessions.set_final_report_if_absent(f.created.session_id, "# Winner")
            }
        );

        assert!(written.unwrap());
        assert_eq!(result.unwrap(), "# Winner");
        assert_eq!(f.mock.call_count(), 1);
        assert_eq!(
            f.synthesizer.report(f.created.session_id).unwrap().as_deref(),
            Some("# Winner")
        );
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let f = fixture(&["Dev"]);
        assert!(matches!(
            f.synthesizer.synthesize(Uuid::new_v4()).await,
            Err(InsightError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_two_role_retrospective_end_to_end() {
        let f = fixture(&["iOS Dev", "Designer"]);
        let engine = InterviewEngine::new(
            Arc::clone(&f.db),
            Arc::clone(&f.mock),
            InterviewConfig::default(),
        );
        let orchestrator = SessionOrchestrator::new(Arc::clone(&f.db));

        for issued in &f.created.participants {
            let participant = engine.login(issued.access_code.as_str()).unwrap();
            engine.open(participant.id).await.unwrap();
            for answer in ["Crunch at the end", "Specs arrived late", "QA had no time"] {
                engine.send_turn(participant.id, answer).await.unwrap();
            }
            f.mock.push_reply(format!("- {} felt rushed", issued.role_label));
            assert!(matches!(
                engine.finalize(participant.id).await.unwrap(),
                FinalizeOutcome::Completed { .. }
            ));
        }

        let progress = orchestrator.progress(f.created.session_id).unwrap();
        assert_eq!((progress.total, progress.completed), (2, 2));
        assert!(progress.eligible);

        let stored = ParticipantRepository::new(Arc::clone(&f.db))
            .list_by_session(f.created.session_id)
            .unwrap();
        assert!(stored
            .iter()
            .all(|p| p.has_completed && p.individual_summary.as_deref().is_some_and(|s| !s.is_empty())));

        f.mock.push_reply(REPORT);
        let report = f.synthesizer.synthesize(f.created.session_id).await.unwrap();
        assert!(report.contains("Action Plan"));
        assert_eq!(
            f.synthesizer.report(f.created.session_id).unwrap().as_deref(),
            Some(report.as_str())
        );
        let report_call = f.mock.last_call().unwrap();
        assert!(report_call.new_input.contains("- iOS Dev felt rushed"));
        assert!(report_call.new_input.contains("- Designer felt rushed"));
    }
}
