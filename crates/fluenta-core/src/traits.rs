//! Seam traits between the engine and its external collaborators.
//!
//! `ItemBank` is implemented by this crate's in-memory bank; `Grader` is
//! implemented by the `fluenta-grader` crate (HTTP and mock).

use async_trait::async_trait;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Item, Skill};

// ---------------------------------------------------------------------------
// Item bank
// ---------------------------------------------------------------------------

/// Read API over calibrated items.
#[async_trait]
pub trait ItemBank: Send + Sync {
    /// All items for a skill.
    async fn items_for_skill(&self, skill: Skill) -> anyhow::Result<Vec<Item>>;

    /// Look up one item by id.
    async fn get_item(&self, id: &str) -> anyhow::Result<Option<Item>>;
}

// ---------------------------------------------------------------------------
// External grader
// ---------------------------------------------------------------------------

/// Trait for the external rubric grader of productive skills.
#[async_trait]
pub trait Grader: Send + Sync {
    /// Human-readable grader name (e.g. "http").
    fn name(&self) -> &str;

    /// Grade a submission. Transient failures are surfaced as errors and
    /// retried by the engine; this call itself must not retry.
    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse>;
}

/// A productive-skill submission sent to the grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    /// The productive skill being graded.
    pub skill: Skill,
    /// The task prompt the candidate responded to.
    pub prompt: String,
    /// Essay text (writing) or speech transcript (speaking).
    pub submission: String,
}

/// The grader's score contract: named sub-scores in [0, 9] with 0.5-point
/// granularity, plus the grader's own combined score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeResponse {
    /// Sub-scores keyed by rubric dimension name.
    pub scores: BTreeMap<String, f64>,
    /// Combined/overall band reported by the grader.
    pub overall: f64,
}
