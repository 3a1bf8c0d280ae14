use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Text typed by the participant.
    User,
    /// Text produced by the AI interviewer (including greetings and placeholders).
    Ai,
}

impl MessageRole {
    /// Column value stored in the `messages.role` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Ai => "ai",
        }
    }

    /// Parse the stored column value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "ai" => Some(MessageRole::Ai),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quick-start role sets offered when a leader configures a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePreset {
    Scrum,
    Mobile,
    Minimal,
}

impl RolePreset {
    pub const ALL: [RolePreset; 3] = [RolePreset::Scrum, RolePreset::Mobile, RolePreset::Minimal];

    /// Role labels for the preset, in display order.
    pub fn roles(&self) -> Vec<String> {
        let labels: &[&str] = match self {
            RolePreset::Scrum => &[
                "Product Owner",
                "Scrum Master",
                "Frontend Dev",
                "Backend Dev",
                "QA Engineer",
            ],
            RolePreset::Mobile => &["iOS Dev", "Android Dev", "Designer", "Product Manager"],
            RolePreset::Minimal => &["Developer", "Developer", "Designer"],
        };
        labels.iter().map(|s| s.to_string()).collect()
    }
}

/// Example problem context shown to leaders who want a starting point.
pub const CONTEXT_TEMPLATE: &str = "We missed our sprint goal by 20%. The main feature 'User Login' was delayed. I want to understand if this was due to unclear requirements, technical debt, or external distractions.";

// =============================================================================
// Access codes
// =============================================================================

/// Number of characters in each half of an access code.
pub const ACCESS_CODE_GROUP_LEN: usize = 3;

/// Participant capability token in the form `XXX-XXX`.
///
/// Codes are stored and compared upper-case. Possession of a code is the
/// only credential a participant has.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCode(String);

impl AccessCode {
    /// Build a code from two groups, upper-casing both.
    pub fn from_groups(first: &str, second: &str) -> Self {
        Self(format!(
            "{}-{}",
            first.to_ascii_uppercase(),
            second.to_ascii_uppercase()
        ))
    }

    /// Normalize user input the way login does: trim, then upper-case.
    ///
    /// No format check is applied; lookup is an exact match on the result.
    pub fn normalize(input: &str) -> Self {
        Self(input.trim().to_uppercase())
    }

    /// Wrap a value read from storage.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// Whether the code matches `[0-9A-Z]{3}-[0-9A-Z]{3}`.
    pub fn is_well_formed(&self) -> bool {
        let mut parts = self.0.split('-');
        let valid_group = |g: Option<&str>| {
            g.is_some_and(|g| {
                g.len() == ACCESS_CODE_GROUP_LEN
                    && g.chars()
                        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
            })
        };
        valid_group(parts.next()) && valid_group(parts.next()) && parts.next().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Records
// =============================================================================

/// One retrospective, owned by a leader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Human label, e.g. "Sprint 42 Retro".
    pub name: String,
    /// Problem statement the AI uses to frame every interview.
    pub context: String,
    /// Opaque leader secret. Never serialized to clients.
    #[serde(skip_serializing, default)]
    pub leader_credential: String,
    pub final_report: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An anonymous role slot within a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role_label: String,
    pub access_code: AccessCode,
    pub has_completed: bool,
    pub individual_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A single append-only conversation entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Store-assigned insertion order, used to break timestamp ties.
    pub seq: i64,
    pub participant_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a session together with its participants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewSession {
    pub name: String,
    pub context: String,
    pub leader_credential: String,
    pub roles: Vec<String>,
}

/// Aggregate completion counters for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
}

impl Progress {
    /// A report may be synthesized only when every participant finished and
    /// there is at least one of them.
    pub fn is_eligible(&self) -> bool {
        self.completed > 0 && self.completed == self.total
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}
