//! Core data model types for fluenta.
//!
//! These are the fundamental types the entire system uses to represent
//! skills, calibrated items, candidate responses, and rubric scores.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Probability of a correct answer by guessing on a 4-choice MCQ.
pub const DEFAULT_GUESSING: f64 = 0.25;

/// Default discrimination for items calibrated without an `a` parameter.
pub const DEFAULT_DISCRIMINATION: f64 = 1.0;

/// The four assessed skills.
///
/// Reading and listening are objective (IRT-scored); writing and speaking
/// are productive (rubric-scored by an external grader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Reading,
    Listening,
    Writing,
    Speaking,
}

impl Skill {
    /// All skills in administration order.
    pub const ALL: [Skill; 4] = [
        Skill::Reading,
        Skill::Listening,
        Skill::Writing,
        Skill::Speaking,
    ];

    /// Returns `true` for skills graded by the external rubric grader.
    pub fn is_productive(self) -> bool {
        matches!(self, Skill::Writing | Skill::Speaking)
    }

    /// Named rubric dimensions the external grader reports for this skill.
    ///
    /// Empty for objective skills.
    pub fn rubric_dimensions(self) -> &'static [&'static str] {
        match self {
            Skill::Writing => &[
                "task_achievement",
                "coherence_cohesion",
                "vocabulary",
                "grammar",
            ],
            Skill::Speaking => &["fluency", "pronunciation", "grammar", "vocabulary"],
            Skill::Reading | Skill::Listening => &[],
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skill::Reading => write!(f, "reading"),
            Skill::Listening => write!(f, "listening"),
            Skill::Writing => write!(f, "writing"),
            Skill::Speaking => write!(f, "speaking"),
        }
    }
}

impl FromStr for Skill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reading" => Ok(Skill::Reading),
            "listening" => Ok(Skill::Listening),
            "writing" => Ok(Skill::Writing),
            "speaking" => Ok(Skill::Speaking),
            other => Err(format!("unknown skill: {other}")),
        }
    }
}

/// CEFR proficiency bands, ordered A1 < A2 < B1 < B2 < C1 < C2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];

    /// Nominal item difficulty (IRT `b`) associated with each band.
    pub fn nominal_difficulty(self) -> f64 {
        match self {
            CefrLevel::A1 => -2.0,
            CefrLevel::A2 => -1.0,
            CefrLevel::B1 => 0.0,
            CefrLevel::B2 => 1.0,
            CefrLevel::C1 => 2.0,
            CefrLevel::C2 => 3.0,
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            other => Err(format!("unknown CEFR level: {other}")),
        }
    }
}

/// A calibrated test item.
///
/// Parameters are fixed at calibration time; the rolling exposure counter
/// lives in the item bank, not here, so items can be shared immutably
/// across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within the bank.
    pub id: String,
    /// The skill this item assesses.
    pub skill: Skill,
    /// IRT difficulty parameter (b), logit scale.
    pub difficulty: f64,
    /// IRT discrimination parameter (a).
    #[serde(default = "default_discrimination")]
    pub discrimination: f64,
    /// IRT pseudo-guessing parameter (c). Meaningful for objective skills.
    #[serde(default = "default_guessing")]
    pub guessing: f64,
    /// Content-domain tags used by the blueprint (e.g. "gist", "detail").
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_discrimination() -> f64 {
    DEFAULT_DISCRIMINATION
}

fn default_guessing() -> f64 {
    DEFAULT_GUESSING
}

/// A recorded answer to one administered item. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The item that was answered.
    pub item_id: String,
    /// Difficulty of that item, denormalized so estimation never needs
    /// the bank.
    pub difficulty: f64,
    /// Discrimination of that item.
    pub discrimination: f64,
    /// Pseudo-guessing of that item.
    pub guessing: f64,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Response latency in milliseconds.
    pub latency_ms: u64,
    /// When the response was recorded.
    pub at: DateTime<Utc>,
}

impl Response {
    pub fn new(item: &Item, correct: bool, latency_ms: u64) -> Self {
        Self {
            item_id: item.id.clone(),
            difficulty: item.difficulty,
            discrimination: item.discrimination,
            guessing: item.guessing,
            correct,
            latency_ms,
            at: Utc::now(),
        }
    }
}

/// Whether a rubric score came from the real grader or the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreFreshness {
    /// Produced by the external grader.
    Reliable,
    /// Default applied after the grader retry budget was exhausted.
    Fallback,
}

/// Named rubric sub-scores for a productive skill, each in [0, 9] with
/// 0.5-point granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricScoreSet {
    /// Sub-scores keyed by rubric dimension name.
    pub scores: BTreeMap<String, f64>,
    /// Weighted combination of the sub-scores, in [0, 9].
    pub combined: f64,
    /// Provenance flag for downstream reporting.
    pub freshness: ScoreFreshness,
}

impl RubricScoreSet {
    /// Combine named sub-scores with equal weights.
    ///
    /// Sub-scores outside [0, 9] are clamped rather than rejected; the
    /// grader contract already promises the range, so this only guards
    /// against a misbehaving grader.
    pub fn from_scores(scores: BTreeMap<String, f64>, freshness: ScoreFreshness) -> Self {
        let clamped: BTreeMap<String, f64> = scores
            .into_iter()
            .map(|(k, v)| (k, v.clamp(0.0, 9.0)))
            .collect();
        let combined = if clamped.is_empty() {
            0.0
        } else {
            clamped.values().sum::<f64>() / clamped.len() as f64
        };
        Self {
            scores: clamped,
            combined,
            freshness,
        }
    }

    /// The flagged default applied when grading ultimately fails: mid-scale
    /// on every dimension, marked unreliable.
    pub fn fallback(skill: Skill) -> Self {
        let scores = skill
            .rubric_dimensions()
            .iter()
            .map(|d| (d.to_string(), 4.5))
            .collect();
        Self::from_scores(scores, ScoreFreshness::Fallback)
    }

    /// Returns `true` if every sub-score sits on the 0.5-point grid.
    pub fn on_half_point_grid(&self) -> bool {
        self.scores.values().all(|v| (v * 2.0).fract() == 0.0)
    }
}

/// Per-skill administration settings: stopping thresholds, time budgets,
/// content blueprint, and exposure control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Stop once SE drops to this value (given the other preconditions).
    #[serde(default = "default_se_target")]
    pub se_target: f64,
    /// Hard ceiling on administered items.
    #[serde(default = "default_max_items")]
    pub max_items: u32,
    /// Minimum items before a precision stop is allowed.
    #[serde(default = "default_min_items")]
    pub min_items: u32,
    /// Wall-clock budget for the skill module, in seconds.
    #[serde(default = "default_time_budget")]
    pub time_budget_secs: u64,
    /// Idle budget before the session is auto-abandoned, in seconds.
    #[serde(default = "default_idle_budget")]
    pub idle_budget_secs: u64,
    /// Population-wide exposure quota per item.
    #[serde(default = "default_exposure_quota")]
    pub exposure_quota: u64,
    /// Minimum item counts per content-domain tag.
    #[serde(default)]
    pub blueprint: BTreeMap<String, u32>,
}

fn default_se_target() -> f64 {
    0.3
}
fn default_max_items() -> u32 {
    30
}
fn default_min_items() -> u32 {
    10
}
fn default_time_budget() -> u64 {
    20 * 60
}
fn default_idle_budget() -> u64 {
    10 * 60
}
fn default_exposure_quota() -> u64 {
    1000
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            se_target: default_se_target(),
            max_items: default_max_items(),
            min_items: default_min_items(),
            time_budget_secs: default_time_budget(),
            idle_budget_secs: default_idle_budget(),
            exposure_quota: default_exposure_quota(),
            blueprint: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_display_and_parse() {
        assert_eq!(Skill::Reading.to_string(), "reading");
        assert_eq!("Writing".parse::<Skill>().unwrap(), Skill::Writing);
        assert!("dancing".parse::<Skill>().is_err());
    }

    #[test]
    fn productive_skills() {
        assert!(!Skill::Reading.is_productive());
        assert!(!Skill::Listening.is_productive());
        assert!(Skill::Writing.is_productive());
        assert!(Skill::Speaking.is_productive());
    }

    #[test]
    fn cefr_ordering() {
        assert!(CefrLevel::A1 < CefrLevel::A2);
        assert!(CefrLevel::B2 < CefrLevel::C1);
        assert_eq!(
            CefrLevel::ALL.iter().min().copied(),
            Some(CefrLevel::A1)
        );
    }

    #[test]
    fn cefr_parse_roundtrip() {
        for level in CefrLevel::ALL {
            assert_eq!(level.to_string().parse::<CefrLevel>().unwrap(), level);
        }
        assert_eq!("b2".parse::<CefrLevel>().unwrap(), CefrLevel::B2);
        assert!("D1".parse::<CefrLevel>().is_err());
    }

    #[test]
    fn rubric_equal_weight_combination() {
        let mut scores = BTreeMap::new();
        scores.insert("fluency".into(), 6.0);
        scores.insert("pronunciation".into(), 7.0);
        scores.insert("grammar".into(), 5.5);
        scores.insert("vocabulary".into(), 6.5);
        let set = RubricScoreSet::from_scores(scores, ScoreFreshness::Reliable);
        assert!((set.combined - 6.25).abs() < 1e-9);
        assert!(set.on_half_point_grid());
    }

    #[test]
    fn rubric_clamps_out_of_range() {
        let mut scores = BTreeMap::new();
        scores.insert("grammar".into(), 12.0);
        scores.insert("vocabulary".into(), -3.0);
        let set = RubricScoreSet::from_scores(scores, ScoreFreshness::Reliable);
        assert_eq!(set.scores["grammar"], 9.0);
        assert_eq!(set.scores["vocabulary"], 0.0);
    }

    #[test]
    fn fallback_is_flagged_and_mid_scale() {
        let set = RubricScoreSet::fallback(Skill::Speaking);
        assert_eq!(set.freshness, ScoreFreshness::Fallback);
        assert_eq!(set.scores.len(), 4);
        assert!((set.combined - 4.5).abs() < 1e-9);
    }

    #[test]
    fn item_serde_defaults() {
        let toml_item = r#"
id = "r-001"
skill = "reading"
difficulty = 0.5
"#;
        let item: Item = toml::from_str(toml_item).unwrap();
        assert_eq!(item.discrimination, DEFAULT_DISCRIMINATION);
        assert_eq!(item.guessing, DEFAULT_GUESSING);
        assert!(item.tags.is_empty());
    }
}
