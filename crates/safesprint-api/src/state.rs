//! Application state shared across all route handlers.
//!
//! AppState holds references to all services and shared resources.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use safesprint_core::config::SafeSprintConfig;
use safesprint_insight::{ReportSynthesizer, SessionOrchestrator, SessionSetup};
use safesprint_interview::InterviewEngine;
use safesprint_llm::CompletionBackend;
use safesprint_storage::Database;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only at runtime).
    pub config: Arc<SafeSprintConfig>,
    /// SQLite database for persistent storage.
    pub database: Arc<Database>,
    /// Session creation and leader checks.
    pub setup: Arc<SessionSetup>,
    /// Per-participant interview driver.
    pub interviews: Arc<InterviewEngine<CompletionBackend>>,
    /// Completion tracking and dashboard.
    pub orchestrator: Arc<SessionOrchestrator>,
    /// Final report generation.
    pub reports: Arc<ReportSynthesizer<CompletionBackend>>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState, wiring every service to the same database.
    pub fn new(config: SafeSprintConfig, database: Database, completion: CompletionBackend) -> Self {
        let database = Arc::new(database);
        let completion = Arc::new(completion);
        Self {
            setup: Arc::new(SessionSetup::new(
                Arc::clone(&database),
                config.session.clone(),
            )),
            interviews: Arc::new(InterviewEngine::new(
                Arc::clone(&database),
                Arc::clone(&completion),
                config.interview.clone(),
            )),
            orchestrator: Arc::new(SessionOrchestrator::new(Arc::clone(&database))),
            reports: Arc::new(ReportSynthesizer::new(Arc::clone(&database), completion)),
            config: Arc::new(config),
            database,
            start_time: Instant::now(),
        }
    }
}
