//! fluenta-report — candidate-facing score reports.
//!
//! Builds a `SessionReport` from a finished (or abandoned) session
//! snapshot, persists it as JSON, and renders the plain-text certificate.

pub mod descriptors;
pub mod text;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fluenta_core::model::{CefrLevel, ScoreFreshness, Skill};
use fluenta_core::scale::ScaleConfig;
use fluenta_core::stopping::StopReason;
use fluenta_engine::session::{Session, SessionStatus};

pub use text::render_certificate;

/// IELTS band conventionally associated with a CEFR level, used for the
/// overall line on certificates.
pub fn band_equivalent(level: CefrLevel) -> f64 {
    match level {
        CefrLevel::A1 => 2.5,
        CefrLevel::A2 => 3.5,
        CefrLevel::B1 => 5.0,
        CefrLevel::B2 => 6.5,
        CefrLevel::C1 => 7.5,
        CefrLevel::C2 => 9.0,
    }
}

/// A complete score report for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// The session this report describes.
    pub session_id: Uuid,
    pub candidate_id: String,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Terminal session status at report time.
    pub session_status: SessionStatus,
    /// Per-skill results, one entry per scored skill.
    pub skills: BTreeMap<Skill, SkillReport>,
    /// Overall result; absent when not all skills were scored.
    pub overall: Option<OverallReport>,
}

/// Score detail for one skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillReport {
    pub cefr: CefrLevel,
    pub ielts: f64,
    pub toefl: u32,
    pub theta: f64,
    /// Standard error of θ; absent for rubric-scored skills.
    pub se: Option<f64>,
    /// Approximate percentage, for candidate-facing display.
    pub percentage: f64,
    pub items_administered: u32,
    pub stop_reason: Option<StopReason>,
    /// Module closed on partial evidence (pool exhaustion).
    pub evidence_limited: bool,
    /// Rubric scores came from the fallback path, not the grader.
    pub score_fallback: bool,
    pub can_do: String,
}

/// The overall result across all four skills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallReport {
    pub cefr: CefrLevel,
    /// Conventional IELTS band for the overall CEFR level.
    pub ielts_band: f64,
    pub percentage: f64,
    pub description: String,
    /// How the overall level is derived from skill bands.
    pub policy: String,
}

impl SessionReport {
    /// Build a report from a session snapshot. Skills without scores
    /// (not started, still in progress) are omitted.
    pub fn from_session(session: &Session, scale: &ScaleConfig) -> Self {
        let mut skills = BTreeMap::new();
        for (skill, scores) in &session.scores {
            let module = session.module(*skill);
            let fallback = module
                .rubric
                .as_ref()
                .map(|r| r.freshness == ScoreFreshness::Fallback)
                .unwrap_or(false);
            skills.insert(
                *skill,
                SkillReport {
                    cefr: scores.cefr,
                    ielts: scores.ielts,
                    toefl: scores.toefl,
                    theta: scores.theta,
                    se: module.estimate.as_ref().map(|e| e.se),
                    percentage: scale.percentage(scores.theta),
                    items_administered: module.administered.len() as u32,
                    stop_reason: module.stop_reason(),
                    evidence_limited: module.evidence_limited(),
                    score_fallback: fallback,
                    can_do: descriptors::can_do_statement(scores.cefr, *skill).to_string(),
                },
            );
        }

        let overall = session.overall.map(|cefr| {
            let mean_theta = session.scores.values().map(|s| s.theta).sum::<f64>()
                / session.scores.len().max(1) as f64;
            OverallReport {
                cefr,
                ielts_band: band_equivalent(cefr),
                percentage: scale.percentage(mean_theta),
                description: descriptors::general_descriptor(cefr).to_string(),
                policy: fluenta_core::scale::OVERALL_POLICY.to_string(),
            }
        });

        Self {
            id: Uuid::new_v4(),
            session_id: session.id,
            candidate_id: session.candidate_id.clone(),
            created_at: Utc::now(),
            session_status: session.status,
            skills,
            overall,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}
