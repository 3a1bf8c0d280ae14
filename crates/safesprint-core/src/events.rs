use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which record kind a change notification refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A session was created or its final report attached.
    Session,
    /// A participant was created or completed its interview.
    Participant,
    /// A message was appended to a conversation.
    Message,
}

/// Row-level change notification emitted by the record store.
///
/// Delivery is best-effort: subscribers that lag behind lose notifications
/// and must re-read the store. Nothing relies on these for correctness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordChange {
    pub kind: ChangeKind,
    /// Owning session, used for scoping subscriptions.
    pub session_id: Uuid,
    pub record_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl RecordChange {
    pub fn new(kind: ChangeKind, session_id: Uuid, record_id: Uuid) -> Self {
        Self {
            kind,
            session_id,
            record_id,
            timestamp: Utc::now(),
        }
    }

    /// Returns a human-readable event name for logging and SSE.
    pub fn event_name(&self) -> &'static str {
        match self.kind {
            ChangeKind::Session => "session_changed",
            ChangeKind::Participant => "participant_changed",
            ChangeKind::Message => "message_appended",
        }
    }

    /// Whether this change concerns the participants of `session_id`.
    pub fn affects_participants_of(&self, session_id: Uuid) -> bool {
        self.kind == ChangeKind::Participant && self.session_id == session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        let sid = Uuid::new_v4();
        assert_eq!(
            RecordChange::new(ChangeKind::Session, sid, sid).event_name(),
            "session_changed"
        );
        assert_eq!(
            RecordChange::new(ChangeKind::Message, sid, Uuid::new_v4()).event_name(),
            "message_appended"
        );
    }

    #[test]
    fn test_scope_filter() {
        let sid = Uuid::new_v4();
        let change = RecordChange::new(ChangeKind::Participant, sid, Uuid::new_v4());
        assert!(change.affects_participants_of(sid));
        assert!(!change.affects_participants_of(Uuid::new_v4()));

        let msg = RecordChange::new(ChangeKind::Message, sid, Uuid::new_v4());
        assert!(!msg.affects_participants_of(sid));
    }

    #[test]
    fn test_event_serialization() {
        let change = RecordChange::new(ChangeKind::Participant, Uuid::nil(), Uuid::nil());
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"participant\""));
        let back: RecordChange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
