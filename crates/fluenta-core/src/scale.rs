//! Scale mapping: θ and rubric evidence to CEFR, IELTS-equivalent, and
//! TOEFL-equivalent scores.
//!
//! All four skills share one CEFR cut-point table. Objective skills map
//! θ directly; productive skills combine rubric sub-scores, convert the
//! combined band to an equivalent θ through the inverse IELTS map, and
//! proceed the same way. Tables are deployment configuration; the
//! defaults reproduce the production calibration.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::irt::{THETA_MAX, THETA_MIN};
use crate::model::{CefrLevel, RubricScoreSet};

/// How the overall band is derived from the four per-skill bands.
pub const OVERALL_POLICY: &str = "lowest-skill-band";

/// One CEFR cut-point: θ strictly below `upper` maps to `level` (unless an
/// earlier cut-point already matched).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CutPoint {
    pub upper: f64,
    pub level: CefrLevel,
}

/// Scale mapping tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Ordered, non-overlapping CEFR cut-points; θ at or above the last
    /// bound maps to the top band.
    pub cefr_cut_points: Vec<CutPoint>,
    /// Band assigned above the final cut-point.
    pub cefr_top: CefrLevel,
    /// Monotonic (θ, IELTS band) anchors, linearly interpolated.
    pub ielts_anchors: Vec<(f64, f64)>,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            cefr_cut_points: vec![
                CutPoint { upper: -1.5, level: CefrLevel::A1 },
                CutPoint { upper: -0.5, level: CefrLevel::A2 },
                CutPoint { upper: 0.5, level: CefrLevel::B1 },
                CutPoint { upper: 1.5, level: CefrLevel::B2 },
                CutPoint { upper: 2.5, level: CefrLevel::C1 },
            ],
            cefr_top: CefrLevel::C2,
            ielts_anchors: vec![
                (-4.0, 1.0),
                (-1.5, 2.5),
                (-0.5, 3.5),
                (0.5, 5.0),
                (1.5, 6.5),
                (2.5, 7.5),
                (4.0, 9.0),
            ],
        }
    }
}

/// Standardized scores for one finished skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScores {
    pub cefr: CefrLevel,
    /// IELTS-equivalent band, 0.5-point granularity.
    pub ielts: f64,
    /// TOEFL-equivalent score, integer 0-120.
    pub toefl: u32,
    /// θ the scores were derived from (measured or rubric-equivalent).
    pub theta: f64,
}

impl ScaleConfig {
    /// Map θ to a CEFR band via the cut-point table.
    pub fn cefr(&self, theta: f64) -> CefrLevel {
        for cut in &self.cefr_cut_points {
            if theta < cut.upper {
                return cut.level;
            }
        }
        self.cefr_top
    }

    /// IELTS-equivalent band for θ, rounded to the nearest 0.5.
    pub fn ielts(&self, theta: f64) -> f64 {
        (self.ielts_unrounded(theta) * 2.0).round() / 2.0
    }

    fn ielts_unrounded(&self, theta: f64) -> f64 {
        let anchors = &self.ielts_anchors;
        // A table validate() would reject still must not panic here.
        let (first, last) = match (anchors.first(), anchors.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };
        if theta <= first.0 {
            return first.1;
        }
        if theta >= last.0 {
            return last.1;
        }
        for pair in anchors.windows(2) {
            let (t0, b0) = pair[0];
            let (t1, b1) = pair[1];
            if theta < t1 {
                return b0 + (b1 - b0) * (theta - t0) / (t1 - t0);
            }
        }
        last.1
    }

    /// Invert the (unrounded) IELTS map: combined band → equivalent θ.
    pub fn theta_for_ielts(&self, band: f64) -> f64 {
        let anchors = &self.ielts_anchors;
        let (first, last) = match (anchors.first(), anchors.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };
        if band <= first.1 {
            return first.0;
        }
        if band >= last.1 {
            return last.0;
        }
        for pair in anchors.windows(2) {
            let (t0, b0) = pair[0];
            let (t1, b1) = pair[1];
            if band < b1 {
                return t0 + (t1 - t0) * (band - b0) / (b1 - b0);
            }
        }
        last.0
    }

    /// TOEFL-equivalent score for θ: the [-4, 4] range scaled onto 0-120.
    pub fn toefl(&self, theta: f64) -> u32 {
        let raw = (theta.clamp(THETA_MIN, THETA_MAX) - THETA_MIN) / (THETA_MAX - THETA_MIN) * 120.0;
        raw.round().clamp(0.0, 120.0) as u32
    }

    /// Approximate percentage score for θ, for candidate-facing reports.
    pub fn percentage(&self, theta: f64) -> f64 {
        ((theta - THETA_MIN) / (THETA_MAX - THETA_MIN) * 100.0).clamp(0.0, 100.0)
    }

    /// Standardized scores for an objective skill.
    pub fn score_objective(&self, theta: f64) -> StandardScores {
        StandardScores {
            cefr: self.cefr(theta),
            ielts: self.ielts(theta),
            toefl: self.toefl(theta),
            theta,
        }
    }

    /// Standardized scores for a productive skill: the combined rubric band
    /// converts to an equivalent θ so all skills share one cut-point table.
    pub fn score_productive(&self, rubric: &RubricScoreSet) -> StandardScores {
        let theta = self.theta_for_ielts(rubric.combined);
        StandardScores {
            cefr: self.cefr(theta),
            ielts: (rubric.combined * 2.0).round() / 2.0,
            toefl: self.toefl(theta),
            theta,
        }
    }

    /// Overall policy: the lowest of the per-skill bands.
    pub fn overall_band(&self, bands: &[CefrLevel]) -> Option<CefrLevel> {
        bands.iter().min().copied()
    }

    /// Check table invariants: strictly increasing cut-points and bands,
    /// strictly monotonic IELTS anchors.
    pub fn validate(&self) -> Result<()> {
        if self.cefr_cut_points.is_empty() {
            bail!("cefr_cut_points must not be empty");
        }
        for pair in self.cefr_cut_points.windows(2) {
            if pair[1].upper <= pair[0].upper {
                bail!(
                    "cefr cut-points must be strictly increasing: {} then {}",
                    pair[0].upper,
                    pair[1].upper
                );
            }
            if pair[1].level <= pair[0].level {
                bail!("cefr bands must be strictly increasing");
            }
        }
        if let Some(last) = self.cefr_cut_points.last() {
            if self.cefr_top <= last.level {
                bail!("cefr_top must exceed the last cut-point band");
            }
        }
        if self.ielts_anchors.len() < 2 {
            bail!("ielts_anchors needs at least two points");
        }
        for pair in self.ielts_anchors.windows(2) {
            if pair[1].0 <= pair[0].0 || pair[1].1 <= pair[0].1 {
                bail!("ielts_anchors must be strictly increasing in θ and band");
            }
        }
        Ok(())
    }
}
