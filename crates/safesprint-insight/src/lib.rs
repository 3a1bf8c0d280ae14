//! SafeSprint Insight crate - session setup, progress and report synthesis.
//!
//! Provides the leader-facing side of a retrospective:
//! - Session creation with validated roles and generated access codes
//! - Aggregate completion tracking and a live progress stream
//! - One-shot synthesis of the cross-participant action-plan report

pub mod error;
pub mod progress;
pub mod report;
pub mod setup;

pub use error::InsightError;
pub use progress::{Dashboard, DashboardEntry, ProgressReport, SessionOrchestrator};
pub use report::ReportSynthesizer;
pub use setup::{CreatedSession, IssuedCode, PresetInfo, SessionSetup};
