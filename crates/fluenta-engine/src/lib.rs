//! fluenta-engine — Session state machine and orchestration.
//!
//! Owns per-session state and serializes every transition for a session
//! behind one async mutex: concurrent submits, idle sweeps, and grading
//! events for the same session never interleave. The item bank and its
//! exposure counters are shared across sessions.

pub mod session;
pub mod store;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use fluenta_core::error::EngineError;
use fluenta_core::estimator::AbilityEstimate;
use fluenta_core::model::{CefrLevel, Item, Response, RubricScoreSet, ScoreFreshness, Skill, SkillConfig};
use fluenta_core::scale::ScaleConfig;
use fluenta_core::selector::{self, ExposureStore, SelectionContext};
use fluenta_core::stopping::{self, StopDecision, StopReason};
use fluenta_core::traits::{GradeRequest, GradeResponse, Grader, ItemBank};

use crate::session::{ModuleState, Session, SessionStatus};
use crate::store::SessionStore;

const MAX_GRADER_BACKOFF: Duration = Duration::from_secs(60);

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-skill administration settings; unlisted skills use defaults.
    pub skills: BTreeMap<Skill, SkillConfig>,
    /// Scale mapping tables.
    pub scale: ScaleConfig,
    /// Claimed starting level seeding the ability prior.
    pub initial_level: Option<CefrLevel>,
    /// Retries against the external grader before the fallback score.
    pub grader_max_retries: u32,
    /// Base delay between grader retries; doubles per attempt, capped.
    pub grader_retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skills: BTreeMap::new(),
            scale: ScaleConfig::default(),
            initial_level: None,
            grader_max_retries: 3,
            grader_retry_delay: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    pub fn skill_config(&self, skill: Skill) -> SkillConfig {
        self.skills.get(&skill).cloned().unwrap_or_default()
    }

    fn initial_theta(&self) -> f64 {
        self.initial_level
            .map(|l| l.nominal_difficulty())
            .unwrap_or(0.0)
    }
}

/// Result of starting a skill module.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// Objective skills: the first item to present.
    FirstItem(Item),
    /// Productive skills: the module is open and awaits one submission.
    AwaitingSubmission,
    /// The pool was empty at start; the module closed on no evidence.
    Completed(StopReason),
}

/// Result of submitting a response.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Present this item next.
    NextItem(Item),
    /// The module stopped.
    Completed(StopReason),
    /// Productive skills: submission accepted, grading in flight.
    PendingExternalScore,
}

/// The asynchronous grading outcome applied under the session lock.
#[derive(Debug, Clone)]
pub enum GradingEvent {
    /// The grader returned scores.
    Scored(GradeResponse),
    /// Retries were exhausted; the flagged fallback applies.
    Failed,
}

/// Read-only status of one skill module.
#[derive(Debug, Clone)]
pub struct SkillStatusView {
    pub state: &'static str,
    pub theta: Option<f64>,
    pub se: Option<f64>,
    pub administered: u32,
    pub pending_external: bool,
    pub stop_reason: Option<StopReason>,
}

/// Read-only session status for the query API.
#[derive(Debug, Clone)]
pub struct SessionStatusView {
    pub session_id: Uuid,
    pub status: SessionStatus,
    /// The skill currently in progress or awaiting an external score.
    pub current_skill: Option<Skill>,
    pub skills: BTreeMap<Skill, SkillStatusView>,
}

/// The adaptive testing engine. One instance serves many concurrent
/// sessions; share it via `Arc`.
pub struct SessionEngine {
    bank: Arc<dyn ItemBank>,
    exposure: Arc<ExposureStore>,
    store: Arc<dyn SessionStore>,
    grader: Arc<dyn Grader>,
    config: EngineConfig,
    sessions: AsyncMutex<HashMap<Uuid, Arc<AsyncMutex<Session>>>>,
}

impl SessionEngine {
    pub fn new(
        bank: Arc<dyn ItemBank>,
        exposure: Arc<ExposureStore>,
        store: Arc<dyn SessionStore>,
        grader: Arc<dyn Grader>,
        config: EngineConfig,
    ) -> Self {
        Self {
            bank,
            exposure,
            store,
            grader,
            config,
            sessions: AsyncMutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create and persist a fresh session.
    pub async fn create_session(&self, candidate_id: &str) -> Result<Uuid, EngineError> {
        let session = Session::new(candidate_id);
        let id = session.id;
        self.store.save(&session).await?;
        self.sessions
            .lock()
            .await
            .insert(id, Arc::new(AsyncMutex::new(session)));
        tracing::info!(session = %id, candidate = candidate_id, "session created");
        Ok(id)
    }

    /// Load a persisted session back into the live set, validating its
    /// snapshot invariants. Never replays side effects or re-selects
    /// already-administered items.
    pub async fn resume(&self, id: Uuid) -> Result<(), EngineError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&id) {
            return Ok(());
        }
        let session = self
            .store
            .load(id)
            .await?
            .ok_or(EngineError::UnknownSession(id))?;
        session.validate_invariants()?;
        tracing::info!(session = %id, "session resumed from snapshot");
        sessions.insert(id, Arc::new(AsyncMutex::new(session)));
        Ok(())
    }

    /// Start a skill module. Objective skills get their first item;
    /// productive skills open and await one submission.
    pub async fn start_skill(&self, id: Uuid, skill: Skill) -> Result<StartOutcome, EngineError> {
        let handle = self.session_handle(id).await?;
        let mut guard = handle.lock().await;

        if guard.status != SessionStatus::InProgress {
            return Err(EngineError::InvalidTransition(format!(
                "session is {:?}, cannot start a skill",
                guard.status
            )));
        }
        if guard.module(skill).state != ModuleState::NotStarted {
            return Err(EngineError::SkillNotActive {
                skill,
                state: guard.module(skill).state.label().into(),
            });
        }

        let mut next = guard.clone();
        let module = next.module_mut(skill);
        module.state = ModuleState::InProgress;
        module.started_at = Some(Utc::now());

        let outcome = if skill.is_productive() {
            StartOutcome::AwaitingSubmission
        } else {
            module.estimate = Some(AbilityEstimate::new(self.config.initial_theta()));
            match self.select_next(&mut next, skill).await? {
                Some(item) => StartOutcome::FirstItem(item),
                None => {
                    close_evidence_limited(&mut next, skill);
                    StartOutcome::Completed(StopReason::EvidenceLimited)
                }
            }
        };

        if next.all_skills_completed() {
            self.score(&mut next);
        }
        next.touch();
        self.commit(&mut guard, next).await?;
        // Exposure counts only administrations that were durably committed.
        if let StartOutcome::FirstItem(item) = &outcome {
            self.exposure.increment(&item.id);
        }
        self.finalize_if_scored(&mut guard).await;
        Ok(outcome)
    }

    /// Submit an answer to the currently pending objective item.
    pub async fn submit_answer(
        &self,
        id: Uuid,
        skill: Skill,
        item_id: &str,
        correct: bool,
        latency_ms: u64,
    ) -> Result<SubmitOutcome, EngineError> {
        if skill.is_productive() {
            return Err(EngineError::InvalidTransition(format!(
                "{skill} takes a graded submission, not an item answer"
            )));
        }

        let handle = self.session_handle(id).await?;
        let mut guard = handle.lock().await;

        if guard.status != SessionStatus::InProgress {
            return Err(EngineError::InvalidTransition(format!(
                "session is {:?}, not accepting answers",
                guard.status
            )));
        }
        let module = guard.module(skill);
        if module.state != ModuleState::InProgress {
            return Err(EngineError::SkillNotActive {
                skill,
                state: module.state.label().into(),
            });
        }

        // Validation rejects without mutating session state.
        let item = self
            .bank
            .get_item(item_id)
            .await
            .map_err(|e| EngineError::Persistence(format!("item bank read: {e}")))?
            .ok_or_else(|| EngineError::UnknownItem(item_id.to_string()))?;
        if module.responses.iter().any(|r| r.item_id == item_id) {
            return Err(EngineError::DuplicateSubmission(item_id.to_string()));
        }
        if module.pending_item.as_deref() != Some(item_id) {
            return Err(EngineError::ItemNotPending {
                submitted: item_id.to_string(),
                expected: module.pending_item.clone(),
            });
        }

        let mut next = guard.clone();
        let skill_config = self.config.skill_config(skill);
        let module = next.module_mut(skill);
        module.pending_item = None;
        module.responses.push(Response::new(&item, correct, latency_ms));

        let estimate = module
            .estimate
            .as_mut()
            .ok_or_else(|| EngineError::InvalidTransition("objective module without estimate".into()))?;
        estimate.update(&module.responses)?;
        let se = estimate.se;
        let theta = estimate.theta;

        let elapsed = module
            .started_at
            .map(|t| (Utc::now() - t).to_std().unwrap_or_default())
            .unwrap_or_default();
        let satisfied =
            selector::blueprint_satisfied(&skill_config.blueprint, &module.domain_counts);
        let administered = module.administered.len() as u32;

        let outcome = match stopping::evaluate(&skill_config, administered, elapsed, se, satisfied)
        {
            StopDecision::Stop(reason) => {
                next.module_mut(skill).state = ModuleState::Completed {
                    reason,
                    evidence_limited: false,
                };
                tracing::info!(session = %id, %skill, %reason, theta, se, "skill module stopped");
                SubmitOutcome::Completed(reason)
            }
            StopDecision::Continue => match self.select_next(&mut next, skill).await? {
                Some(item) => SubmitOutcome::NextItem(item),
                None => {
                    close_evidence_limited(&mut next, skill);
                    SubmitOutcome::Completed(StopReason::EvidenceLimited)
                }
            },
        };

        if next.all_skills_completed() {
            self.score(&mut next);
        }
        next.touch();
        self.commit(&mut guard, next).await?;
        if let SubmitOutcome::NextItem(item) = &outcome {
            self.exposure.increment(&item.id);
        }
        self.finalize_if_scored(&mut guard).await;
        Ok(outcome)
    }

    /// Submit a productive-skill response. Returns as soon as the module
    /// enters `PendingExternalScore`; grading happens in a spawned task
    /// with bounded exponential backoff, and its event is applied under
    /// this session's lock.
    pub async fn submit_productive(
        self: &Arc<Self>,
        id: Uuid,
        skill: Skill,
        prompt: &str,
        submission: &str,
    ) -> Result<SubmitOutcome, EngineError> {
        if !skill.is_productive() {
            return Err(EngineError::InvalidTransition(format!(
                "{skill} is objective; submit an item answer instead"
            )));
        }

        let handle = self.session_handle(id).await?;
        let mut guard = handle.lock().await;
        if guard.status != SessionStatus::InProgress {
            return Err(EngineError::InvalidTransition(format!(
                "session is {:?}, not accepting submissions",
                guard.status
            )));
        }
        let module = guard.module(skill);
        if module.state != ModuleState::InProgress {
            return Err(EngineError::SkillNotActive {
                skill,
                state: module.state.label().into(),
            });
        }

        let mut next = guard.clone();
        next.module_mut(skill).state = ModuleState::PendingExternalScore;
        next.touch();
        self.commit(&mut guard, next).await?;
        drop(guard);

        let engine = Arc::clone(self);
        let request = GradeRequest {
            skill,
            prompt: prompt.to_string(),
            submission: submission.to_string(),
        };
        tokio::spawn(async move {
            let event = engine.grade_with_retries(&request).await;
            if let Err(e) = engine.apply_grading_event(id, skill, event).await {
                tracing::error!(session = %id, %skill, "failed to apply grading event: {e}");
            }
        });

        Ok(SubmitOutcome::PendingExternalScore)
    }

    /// Apply a grading outcome to a pending productive module. Public so
    /// externally delivered grading events take the same path as the
    /// engine's own spawned tasks.
    pub async fn apply_grading_event(
        &self,
        id: Uuid,
        skill: Skill,
        event: GradingEvent,
    ) -> Result<(), EngineError> {
        let handle = self.session_handle(id).await?;
        let mut guard = handle.lock().await;

        if guard.status.is_terminal() {
            // A late event against an abandoned or finalized session is
            // dropped, not an error.
            tracing::warn!(session = %id, %skill, "dropping grading event for terminal session");
            return Ok(());
        }
        if guard.module(skill).state != ModuleState::PendingExternalScore {
            return Err(EngineError::SkillNotActive {
                skill,
                state: guard.module(skill).state.label().into(),
            });
        }

        let rubric = match event {
            GradingEvent::Scored(response) => {
                RubricScoreSet::from_scores(response.scores, ScoreFreshness::Reliable)
            }
            GradingEvent::Failed => {
                tracing::warn!(session = %id, %skill, "grader retries exhausted, applying fallback score");
                RubricScoreSet::fallback(skill)
            }
        };

        let mut next = guard.clone();
        let module = next.module_mut(skill);
        module.rubric = Some(rubric);
        module.state = ModuleState::Completed {
            reason: StopReason::Graded,
            evidence_limited: false,
        };
        if next.all_skills_completed() {
            self.score(&mut next);
        }
        next.touch();
        self.commit(&mut guard, next).await?;
        self.finalize_if_scored(&mut guard).await;
        Ok(())
    }

    /// Query a session's current status.
    pub async fn status(&self, id: Uuid) -> Result<SessionStatusView, EngineError> {
        let handle = self.session_handle(id).await?;
        let guard = handle.lock().await;

        let skills = guard
            .modules
            .iter()
            .map(|(skill, m)| {
                (
                    *skill,
                    SkillStatusView {
                        state: m.state.label(),
                        theta: m.estimate.as_ref().map(|e| e.theta),
                        se: m.estimate.as_ref().map(|e| e.se),
                        administered: m.administered.len() as u32,
                        pending_external: m.state == ModuleState::PendingExternalScore,
                        stop_reason: m.stop_reason(),
                    },
                )
            })
            .collect();

        let current_skill = guard
            .modules
            .values()
            .find(|m| {
                matches!(
                    m.state,
                    ModuleState::InProgress | ModuleState::PendingExternalScore
                )
            })
            .map(|m| m.skill);

        Ok(SessionStatusView {
            session_id: id,
            status: guard.status,
            current_skill,
            skills,
        })
    }

    /// A point-in-time snapshot of the full session, for reporting.
    pub async fn snapshot(&self, id: Uuid) -> Result<Session, EngineError> {
        let handle = self.session_handle(id).await?;
        let guard = handle.lock().await;
        Ok(guard.clone())
    }

    /// Abandon sessions whose idle budget has lapsed. Returns the ids
    /// that were abandoned. Partial scores for already-completed skills
    /// are kept.
    pub async fn sweep_idle(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, EngineError> {
        let handles: Vec<(Uuid, Arc<AsyncMutex<Session>>)> = {
            let sessions = self.sessions.lock().await;
            sessions.iter().map(|(k, v)| (*k, Arc::clone(v))).collect()
        };

        let mut abandoned = Vec::new();
        for (id, handle) in handles {
            let mut guard = handle.lock().await;
            if guard.status.is_terminal() {
                continue;
            }

            let budget = self.idle_budget(&guard);
            let idle = (now - guard.last_activity).to_std().unwrap_or_default();
            if idle < budget {
                continue;
            }

            let mut next = guard.clone();
            // Close whatever the candidate was in the middle of so the
            // module carries a stop reason in status views and reports.
            for module in next.modules.values_mut() {
                if matches!(
                    module.state,
                    ModuleState::InProgress | ModuleState::PendingExternalScore
                ) {
                    module.pending_item = None;
                    module.state = ModuleState::Completed {
                        reason: StopReason::Abandoned,
                        evidence_limited: true,
                    };
                }
            }
            self.score_partial(&mut next);
            next.status = SessionStatus::Abandoned;
            self.commit(&mut guard, next).await?;
            tracing::warn!(session = %id, idle_secs = idle.as_secs(), "session abandoned after idle timeout");
            abandoned.push(id);
        }
        Ok(abandoned)
    }

    // -- internals ----------------------------------------------------------

    async fn session_handle(&self, id: Uuid) -> Result<Arc<AsyncMutex<Session>>, EngineError> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownSession(id))
    }

    /// Persist the transitioned snapshot, then swap it in. A save failure
    /// leaves the in-memory state untouched: all-or-nothing step commit.
    async fn commit(&self, guard: &mut Session, next: Session) -> Result<(), EngineError> {
        self.store.save(&next).await?;
        *guard = next;
        Ok(())
    }

    /// Select the next item for a skill, recording administration state.
    /// Returns `None` when the pool is exhausted.
    async fn select_next(
        &self,
        session: &mut Session,
        skill: Skill,
    ) -> Result<Option<Item>, EngineError> {
        let items = self
            .bank
            .items_for_skill(skill)
            .await
            .map_err(|e| EngineError::Persistence(format!("item bank read: {e}")))?;
        let skill_config = self.config.skill_config(skill);
        let module = session.module(skill);
        let administered = module.administered_set();
        let theta = module.estimate.as_ref().map(|e| e.theta).unwrap_or(0.0);

        let ctx = SelectionContext {
            theta,
            skill,
            administered: &administered,
            domain_counts: &module.domain_counts,
            session_id: session.id,
            step_index: module.administered.len() as u32,
        };

        match selector::select_item(&items, &self.exposure, &skill_config, &ctx) {
            Ok(item) => {
                let module = session.module_mut(skill);
                module.administered.push(item.id.clone());
                module.pending_item = Some(item.id.clone());
                for tag in &item.tags {
                    *module.domain_counts.entry(tag.clone()).or_insert(0) += 1;
                }
                Ok(Some(item))
            }
            Err(EngineError::NoEligibleItems(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn grade_with_retries(&self, request: &GradeRequest) -> GradingEvent {
        let mut delay = self.config.grader_retry_delay;
        for attempt in 0..=self.config.grader_max_retries {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_GRADER_BACKOFF);
            }
            match self.grader.grade(request).await {
                Ok(response) => return GradingEvent::Scored(response),
                Err(e) => {
                    if is_permanent_grader_error(&e) {
                        tracing::error!(skill = %request.skill, "permanent grader error: {e:#}");
                        return GradingEvent::Failed;
                    }
                    tracing::warn!(
                        skill = %request.skill,
                        attempt,
                        "transient grader error, will retry: {e:#}"
                    );
                }
            }
        }
        GradingEvent::Failed
    }

    /// AllSkillsCompleted → run the scale mapper for every skill and the
    /// overall policy → Scored.
    fn score(&self, session: &mut Session) {
        session.status = SessionStatus::AllSkillsCompleted;
        self.score_partial(session);
        if session.scores.len() == session.modules.len() {
            session.overall = self
                .config
                .scale
                .overall_band(&session.scores.values().map(|s| s.cefr).collect::<Vec<_>>());
        }
        session.status = SessionStatus::Scored;
    }

    /// Score whichever modules have evidence; used both for full scoring
    /// and for abandoned sessions.
    fn score_partial(&self, session: &mut Session) {
        let scale = &self.config.scale;
        let mut scores = BTreeMap::new();
        for (skill, module) in &session.modules {
            if !module.state.is_completed() {
                continue;
            }
            let standard = if skill.is_productive() {
                module.rubric.as_ref().map(|r| scale.score_productive(r))
            } else {
                module
                    .estimate
                    .as_ref()
                    .map(|e| scale.score_objective(e.theta))
            };
            if let Some(standard) = standard {
                scores.insert(*skill, standard);
            }
        }
        session.scores = scores;
    }

    /// Scored → Finalized once the scored snapshot is persisted. A failed
    /// finalize save leaves the session Scored; the next touch retries.
    async fn finalize_if_scored(&self, guard: &mut Session) {
        if guard.status != SessionStatus::Scored {
            return;
        }
        let mut finalized = guard.clone();
        finalized.status = SessionStatus::Finalized;
        match self.store.save(&finalized).await {
            Ok(()) => *guard = finalized,
            Err(e) => tracing::error!(session = %guard.id, "finalize persist failed: {e}"),
        }
    }

    fn idle_budget(&self, session: &Session) -> Duration {
        let active = session
            .modules
            .values()
            .filter(|m| {
                matches!(
                    m.state,
                    ModuleState::InProgress | ModuleState::PendingExternalScore
                )
            })
            .map(|m| self.config.skill_config(m.skill).idle_budget_secs)
            .min();
        Duration::from_secs(active.unwrap_or_else(|| SkillConfig::default().idle_budget_secs))
    }
}

fn close_evidence_limited(session: &mut Session, skill: Skill) {
    tracing::warn!(%skill, "item pool exhausted, closing module on partial evidence");
    let module = session.module_mut(skill);
    module.pending_item = None;
    module.state = ModuleState::Completed {
        reason: StopReason::EvidenceLimited,
        evidence_limited: true,
    };
}

/// Classifies grader failures by rendered message rather than downcasting
/// a foreign error type; permanent errors must keep these substrings.
fn is_permanent_grader_error(e: &anyhow::Error) -> bool {
    let msg = e.to_string();
    msg.contains("authentication") || msg.contains("malformed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_error_classification() {
        let auth = anyhow::anyhow!("authentication failed: bad key");
        assert!(is_permanent_grader_error(&auth));
        let malformed = anyhow::anyhow!("malformed grader response: missing scores");
        assert!(is_permanent_grader_error(&malformed));
        let transient = anyhow::anyhow!("request timed out after 30s");
        assert!(!is_permanent_grader_error(&transient));
    }

    #[test]
    fn default_config_budgets() {
        let config = EngineConfig::default();
        assert_eq!(config.grader_max_retries, 3);
        assert_eq!(config.skill_config(Skill::Reading).max_items, 30);
        assert_eq!(config.initial_theta(), 0.0);
    }

    #[test]
    fn initial_theta_from_claimed_level() {
        let config = EngineConfig {
            initial_level: Some(CefrLevel::B2),
            ..EngineConfig::default()
        };
        assert_eq!(config.initial_theta(), 1.0);
    }

    #[test]
    fn engine_is_shareable_across_tasks() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SessionEngine>();
    }
}
