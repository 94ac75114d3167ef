//! Engine error taxonomy.
//!
//! Validation errors are rejected without mutating session state; the
//! remaining variants classify estimation, selection, and persistence
//! failures so callers can react without string matching.

use thiserror::Error;
use uuid::Uuid;

use crate::model::Skill;

/// Errors surfaced by the adaptive engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submitted item id is not in the bank.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// The item was already administered in this session.
    #[error("duplicate submission for item {0}")]
    DuplicateSubmission(String),

    /// The submitted item is not the one currently pending an answer.
    #[error("item {submitted} is not pending; expected {expected:?}")]
    ItemNotPending {
        submitted: String,
        expected: Option<String>,
    },

    /// The skill module is not in a state that accepts this operation.
    #[error("skill {skill} is not active (state: {state})")]
    SkillNotActive { skill: Skill, state: String },

    /// No session with this id exists.
    #[error("unknown session: {0}")]
    UnknownSession(Uuid),

    /// The requested transition is not legal from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// No items remain eligible for selection.
    #[error("no eligible items for skill {0}")]
    NoEligibleItems(Skill),

    /// Ability estimation was requested before any response was recorded.
    #[error("cannot estimate ability from an empty response history")]
    EmptyHistory,

    /// The session store rejected the snapshot; the transition is aborted.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Returns `true` for caller mistakes that leave session state untouched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownItem(_)
                | EngineError::DuplicateSubmission(_)
                | EngineError::ItemNotPending { .. }
                | EngineError::SkillNotActive { .. }
                | EngineError::UnknownSession(_)
                | EngineError::InvalidTransition(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(EngineError::UnknownItem("x".into()).is_validation());
        assert!(EngineError::UnknownSession(Uuid::nil()).is_validation());
        assert!(!EngineError::NoEligibleItems(Skill::Reading).is_validation());
        assert!(!EngineError::EmptyHistory.is_validation());
        assert!(!EngineError::Persistence("disk full".into()).is_validation());
    }
}
