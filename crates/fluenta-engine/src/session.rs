//! Session and skill-module state.
//!
//! A session is a serializable snapshot: every committed transition is
//! persisted whole, and resume loads the snapshot and validates its
//! invariants instead of replaying side effects.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fluenta_core::error::EngineError;
use fluenta_core::estimator::AbilityEstimate;
use fluenta_core::irt::{THETA_MAX, THETA_MIN};
use fluenta_core::model::{CefrLevel, Response, RubricScoreSet, Skill};
use fluenta_core::scale::StandardScores;
use fluenta_core::stopping::StopReason;

/// Lifecycle of one skill module within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModuleState {
    NotStarted,
    InProgress,
    /// Productive skills only: submission sent, awaiting the grading event.
    PendingExternalScore,
    Completed {
        reason: StopReason,
        /// Set when the module was forced closed on partial evidence.
        evidence_limited: bool,
    },
}

impl ModuleState {
    pub fn label(&self) -> &'static str {
        match self {
            ModuleState::NotStarted => "not_started",
            ModuleState::InProgress => "in_progress",
            ModuleState::PendingExternalScore => "pending_external_score",
            ModuleState::Completed { .. } => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ModuleState::Completed { .. })
    }
}

/// Per-skill state owned by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillModule {
    pub skill: Skill,
    pub state: ModuleState,
    /// Administered item ids in order; doubles as the no-duplicates set.
    pub administered: Vec<String>,
    /// The item currently awaiting an answer, if any.
    pub pending_item: Option<String>,
    /// Ordered response history.
    pub responses: Vec<Response>,
    /// Administered counts per content-domain tag.
    pub domain_counts: BTreeMap<String, u32>,
    /// Running ability estimate (objective skills).
    pub estimate: Option<AbilityEstimate>,
    /// Rubric scores (productive skills, set by the grading event).
    pub rubric: Option<RubricScoreSet>,
    pub started_at: Option<DateTime<Utc>>,
}

impl SkillModule {
    pub fn new(skill: Skill) -> Self {
        Self {
            skill,
            state: ModuleState::NotStarted,
            administered: Vec::new(),
            pending_item: None,
            responses: Vec::new(),
            domain_counts: BTreeMap::new(),
            estimate: None,
            rubric: None,
            started_at: None,
        }
    }

    pub fn administered_set(&self) -> HashSet<String> {
        self.administered.iter().cloned().collect()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match &self.state {
            ModuleState::Completed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn evidence_limited(&self) -> bool {
        matches!(
            self.state,
            ModuleState::Completed {
                evidence_limited: true,
                ..
            }
        )
    }
}

/// Overall session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    AllSkillsCompleted,
    Scored,
    Finalized,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Finalized | SessionStatus::Abandoned)
    }
}

/// One candidate's test session. Mutated exclusively through the engine,
/// under the per-session lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub candidate_id: String,
    pub status: SessionStatus,
    pub modules: BTreeMap<Skill, SkillModule>,
    /// Standardized scores, present once the session is scored.
    pub scores: BTreeMap<Skill, StandardScores>,
    /// Overall band under the declared policy.
    pub overall: Option<CefrLevel>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(candidate_id: &str) -> Self {
        let now = Utc::now();
        let modules = Skill::ALL
            .iter()
            .map(|s| (*s, SkillModule::new(*s)))
            .collect();
        Self {
            id: Uuid::new_v4(),
            candidate_id: candidate_id.to_string(),
            status: SessionStatus::InProgress,
            modules,
            scores: BTreeMap::new(),
            overall: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn module(&self, skill: Skill) -> &SkillModule {
        &self.modules[&skill]
    }

    pub fn module_mut(&mut self, skill: Skill) -> &mut SkillModule {
        self.modules.get_mut(&skill).expect("all skills present")
    }

    pub fn all_skills_completed(&self) -> bool {
        self.modules.values().all(|m| m.state.is_completed())
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Validate snapshot invariants before resuming a loaded session.
    pub fn validate_invariants(&self) -> Result<(), EngineError> {
        for module in self.modules.values() {
            let unique: HashSet<&String> = module.administered.iter().collect();
            if unique.len() != module.administered.len() {
                return Err(EngineError::InvalidTransition(format!(
                    "snapshot for {} contains duplicate administered items",
                    module.skill
                )));
            }

            for response in &module.responses {
                if !unique.contains(&response.item_id) {
                    return Err(EngineError::InvalidTransition(format!(
                        "snapshot for {} has a response to un-administered item {}",
                        module.skill, response.item_id
                    )));
                }
            }

            if let Some(pending) = &module.pending_item {
                if module.responses.iter().any(|r| &r.item_id == pending) {
                    return Err(EngineError::InvalidTransition(format!(
                        "snapshot for {} has an answered pending item {pending}",
                        module.skill
                    )));
                }
            }

            if let Some(estimate) = &module.estimate {
                if !(THETA_MIN..=THETA_MAX).contains(&estimate.theta) {
                    return Err(EngineError::InvalidTransition(format!(
                        "snapshot θ {} outside [-4, 4]",
                        estimate.theta
                    )));
                }
                if !estimate.se.is_finite() || estimate.se < 0.0 {
                    return Err(EngineError::InvalidTransition(format!(
                        "snapshot SE {} is not finite and non-negative",
                        estimate.se
                    )));
                }
            }
        }
        Ok(())
    }
}
