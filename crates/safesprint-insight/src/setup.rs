//! Session setup.
//!
//! Validates leader input, issues one access code per role, and stores the
//! session with all of its participants in one transaction.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use safesprint_core::config::SessionConfig;
use safesprint_core::error::SafeSprintError;
use safesprint_core::types::{
    AccessCode, NewSession, Participant, RolePreset, Session, ACCESS_CODE_GROUP_LEN,
    CONTEXT_TEMPLATE,
};
use safesprint_storage::{Database, ParticipantRepository, SessionRepository};

use crate::error::InsightError;

const ACCESS_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Insert attempts when a concurrent writer claims one of our codes.
const INSERT_ATTEMPTS: usize = 3;

/// Access code handed to the leader for distribution.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCode {
    pub participant_id: Uuid,
    pub role_label: String,
    pub access_code: AccessCode,
}

/// A freshly created session.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSession {
    pub session_id: Uuid,
    pub name: String,
    pub participants: Vec<IssuedCode>,
}

/// A role preset with its labels, for the setup form.
#[derive(Debug, Clone, Serialize)]
pub struct PresetInfo {
    pub preset: RolePreset,
    pub roles: Vec<String>,
}

/// All role presets plus the example context.
pub fn presets() -> (Vec<PresetInfo>, &'static str) {
    let presets = RolePreset::ALL
        .iter()
        .map(|p| PresetInfo {
            preset: *p,
            roles: p.roles(),
        })
        .collect();
    (presets, CONTEXT_TEMPLATE)
}

/// Generate a code of two base-36 groups, e.g. `AB3-XZ9`.
pub fn generate_access_code<R: Rng>(rng: &mut R) -> AccessCode {
    let first = random_group(rng);
    let second = random_group(rng);
    AccessCode::from_groups(&first, &second)
}

fn random_group<R: Rng>(rng: &mut R) -> String {
    (0..ACCESS_CODE_GROUP_LEN)
        .map(|_| ACCESS_CODE_ALPHABET[rng.random_range(0..ACCESS_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Check a session request before anything is persisted.
pub fn validate(new: &NewSession, config: &SessionConfig) -> Result<(), InsightError> {
    if new.name.trim().is_empty() {
        return Err(InsightError::validation("name", "must not be empty"));
    }
    if new.leader_credential.trim().is_empty() {
        return Err(InsightError::validation("leader_credential", "must not be empty"));
    }
    if new.context.trim().chars().count() < config.min_context_chars {
        return Err(InsightError::validation(
            "context",
            format!("must be at least {} characters", config.min_context_chars),
        ));
    }
    if new.roles.is_empty() {
        return Err(InsightError::validation("roles", "at least one role is required"));
    }
    if new.roles.len() > config.max_roles {
        return Err(InsightError::validation(
            "roles",
            format!("at most {} roles are allowed", config.max_roles),
        ));
    }
    if let Some(i) = new.roles.iter().position(|r| r.trim().is_empty()) {
        return Err(InsightError::validation(
            "roles",
            format!("role {} has an empty label", i + 1),
        ));
    }
    Ok(())
}

/// Leader-side session creation and credential checks.
pub struct SessionSetup {
    sessions: SessionRepository,
    participants: ParticipantRepository,
    config: SessionConfig,
}

impl SessionSetup {
    pub fn new(db: Arc<Database>, config: SessionConfig) -> Self {
        Self {
            sessions: SessionRepository::new(Arc::clone(&db)),
            participants: ParticipantRepository::new(db),
            config,
        }
    }

    /// Create a session and one participant per role.
    pub fn create_session(&self, new: NewSession) -> Result<CreatedSession, InsightError> {
        validate(&new, &self.config)?;

        let session = Session {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            context: new.context.trim().to_string(),
            leader_credential: new.leader_credential,
            final_report: None,
            created_at: Utc::now(),
        };

        let mut attempt = 0;
        let participants = loop {
            attempt += 1;
            let participants = self.build_participants(&session, &new.roles)?;
            match self.sessions.create_with_participants(&session, &participants) {
                Ok(()) => break participants,
                Err(SafeSprintError::Constraint(e)) if attempt < INSERT_ATTEMPTS => {
                    warn!(session_id = %session.id, attempt, error = %e, "Access code collision on insert; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        info!(
            session_id = %session.id,
            participants = participants.len(),
            "Session created"
        );

        Ok(CreatedSession {
            session_id: session.id,
            name: session.name,
            participants: participants
                .into_iter()
                .map(|p| IssuedCode {
                    participant_id: p.id,
                    role_label: p.role_label,
                    access_code: p.access_code,
                })
                .collect(),
        })
    }

    /// Load a session if `credential` matches its leader credential.
    pub fn verify_leader(&self, session_id: Uuid, credential: &str) -> Result<Session, InsightError> {
        let session = self
            .sessions
            .find_by_id(session_id)?
            .ok_or(InsightError::SessionNotFound(session_id))?;
        if session.leader_credential != credential {
            warn!(session_id = %session_id, "Leader credential rejected");
            return Err(InsightError::Unauthorized);
        }
        Ok(session)
    }

    fn build_participants(
        &self,
        session: &Session,
        roles: &[String],
    ) -> Result<Vec<Participant>, InsightError> {
        let mut rng = rand::rng();
        let mut issued = HashSet::with_capacity(roles.len());
        let now = Utc::now();

        roles
            .iter()
            .map(|role| {
                let access_code = self.unique_code(&mut rng, &mut issued)?;
                Ok(Participant {
                    id: Uuid::new_v4(),
                    session_id: session.id,
                    role_label: role.trim().to_string(),
                    access_code,
                    has_completed: false,
                    individual_summary: None,
                    created_at: now,
                    completed_at: None,
                })
            })
            .collect()
    }

    fn unique_code<R: Rng>(
        &self,
        rng: &mut R,
        issued: &mut HashSet<AccessCode>,
    ) -> Result<AccessCode, InsightError> {
        for _ in 0..self.config.access_code_attempts {
            let code = generate_access_code(rng);
            if issued.contains(&code) || self.participants.access_code_exists(&code)? {
                continue;
            }
            issued.insert(code.clone());
            return Ok(code);
        }
        Err(InsightError::AccessCodeExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_setup() -> (Arc<Database>, SessionSetup) {
        let db = Arc::new(Database::in_memory().unwrap());
        let setup = SessionSetup::new(Arc::clone(&db), SessionConfig::default());
        (db, setup)
    }

    fn request(roles: &[&str]) -> NewSession {
        NewSession {
            name: "Sprint 12".into(),
            context: "Deploys kept failing on Fridays and nobody knew why.".into(),
            leader_credential: "letmein".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_generated_codes_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_access_code(&mut rng);
            assert!(code.is_well_formed(), "{code}");
        }
    }

    #[test]
    fn test_validation_names_field() {
        let config = SessionConfig::default();
        let cases = [
            (NewSession { name: "  ".into(), ..request(&["Dev"]) }, "name"),
            (NewSession { leader_credential: "".into(), ..request(&["Dev"]) }, "leader_credential"),
            (NewSession { context: "too short".into(), ..request(&["Dev"]) }, "context"),
            (request(&[]), "roles"),
            (request(&["Dev", " "]), "roles"),
        ];
        for (new, expected) in cases {
            match validate(&new, &config) {
                Err(InsightError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error on {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_too_many_roles() {
        let config = SessionConfig { max_roles: 2, ..SessionConfig::default() };
        let err = validate(&request(&["a", "b", "c"]), &config).unwrap_err();
        assert!(err.to_string().contains("at most 2"));
    }

    #[test]
    fn test_create_session_issues_codes() {
        let (db, setup) = make_setup();
        let created = setup
            .create_session(request(&["Developer", "Developer", "Designer"]))
            .unwrap();

        assert_eq!(created.participants.len(), 3);
        let codes: HashSet<_> = created.participants.iter().map(|p| p.access_code.clone()).collect();
        assert_eq!(codes.len(), 3);

        let stored = ParticipantRepository::new(db).list_by_session(created.session_id).unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|p| !p.has_completed && p.individual_summary.is_none()));
    }

    #[test]
    fn test_invalid_request_persists_nothing() {
        let (db, setup) = make_setup();
        assert!(setup.create_session(request(&[])).is_err());
        assert_eq!(SessionRepository::new(db).count().unwrap(), 0);
    }

    #[test]
    fn test_verify_leader() {
        let (_db, setup) = make_setup();
        let created = setup.create_session(request(&["Dev"])).unwrap();

        let session = setup.verify_leader(created.session_id, "letmein").unwrap();
        assert_eq!(session.name, "Sprint 12");
        assert!(matches!(
            setup.verify_leader(created.session_id, "nope"),
            Err(InsightError::Unauthorized)
        ));
        assert!(matches!(
            setup.verify_leader(Uuid::new_v4(), "letmein"),
            Err(InsightError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_code_generation_gives_up() {
        let db = Arc::new(Database::in_memory().unwrap());
        let config = SessionConfig { access_code_attempts: 0, ..SessionConfig::default() };
        let setup = SessionSetup::new(db, config);
        assert!(matches!(
            setup.create_session(request(&["Dev"])),
            Err(InsightError::AccessCodeExhausted)
        ));
    }

    #[test]
    fn test_presets_listing() {
        let (presets, template) = presets();
        assert_eq!(presets.len(), 3);
        assert_eq!(presets[0].preset, RolePreset::Scrum);
        assert!(template.len() >= 20);
    }
}
