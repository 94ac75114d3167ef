//! Ability estimation from a response history.
//!
//! Maintains a running (θ, SE) pair per skill module. Estimation is EAP
//! (expected a posteriori, standard-normal prior) while the history is
//! uniform — all-correct or all-incorrect, where MLE diverges — and
//! switches to Newton-Raphson MLE once both outcomes are present. A
//! non-convergent MLE update falls back to EAP rather than failing.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::irt::{self, THETA_MAX, THETA_MIN};
use crate::model::Response;

/// SE reported before the history contains two differing outcomes.
///
/// Conceptually infinite; kept finite so snapshots round-trip through JSON.
pub const SE_SENTINEL: f64 = 1e3;

const MLE_MAX_ITERATIONS: usize = 20;
const MLE_TOLERANCE: f64 = 1e-3;
const QUADRATURE_POINTS: usize = 81;

/// Which estimation method produced the current θ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMethod {
    /// Expected a posteriori with a standard-normal prior.
    Eap,
    /// Newton-Raphson maximum likelihood.
    Mle,
}

/// A running ability estimate for one skill module.
///
/// Mutated only through [`AbilityEstimate::update`]; histories are
/// monotonically extended and never rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityEstimate {
    /// Current ability on the logit scale, clamped to [-4, +4].
    pub theta: f64,
    /// Standard error of θ; [`SE_SENTINEL`] until outcomes are mixed.
    pub se: f64,
    /// Method used for the most recent update.
    pub method: EstimationMethod,
    /// θ after each update, starting with the prior mean.
    pub theta_history: Vec<f64>,
    /// SE after each update.
    pub se_history: Vec<f64>,
}

impl AbilityEstimate {
    /// Start a fresh estimate at the given prior mean (0 = population mean,
    /// or a claimed starting level's nominal difficulty).
    pub fn new(initial_theta: f64) -> Self {
        let theta = irt::clamp_theta(initial_theta);
        Self {
            theta,
            se: SE_SENTINEL,
            method: EstimationMethod::Eap,
            theta_history: vec![theta],
            se_history: vec![SE_SENTINEL],
        }
    }

    /// Recompute (θ, SE) from the full ordered response history.
    ///
    /// Fails only on an empty history; callers must not ask for an
    /// estimate before the first response.
    pub fn update(&mut self, responses: &[Response]) -> Result<(), EngineError> {
        if responses.is_empty() {
            return Err(EngineError::EmptyHistory);
        }

        let mixed = has_mixed_outcomes(responses);

        let (theta, method) = if mixed {
            match newton_mle(self.theta, responses) {
                Some(theta) => (theta, EstimationMethod::Mle),
                None => {
                    tracing::debug!("MLE did not converge, falling back to EAP");
                    (eap(responses), EstimationMethod::Eap)
                }
            }
        } else {
            (eap(responses), EstimationMethod::Eap)
        };

        let theta = irt::clamp_theta(theta);
        let se = if mixed {
            standard_error(theta, responses)
        } else {
            SE_SENTINEL
        };

        self.theta = theta;
        self.se = se;
        self.method = method;
        self.theta_history.push(theta);
        self.se_history.push(se);
        Ok(())
    }
}

/// Whether the history contains both a correct and an incorrect response.
pub fn has_mixed_outcomes(responses: &[Response]) -> bool {
    responses.iter().any(|r| r.correct) && responses.iter().any(|r| !r.correct)
}

/// SE = 1 / sqrt(Σ item information at θ).
fn standard_error(theta: f64, responses: &[Response]) -> f64 {
    let total_info: f64 = responses
        .iter()
        .map(|r| irt::information(theta, r.discrimination, r.difficulty, r.guessing))
        .sum();
    if total_info > 0.0 {
        1.0 / total_info.sqrt()
    } else {
        SE_SENTINEL
    }
}

/// Newton-Raphson MLE starting from the current θ.
///
/// Returns `None` when the update fails to converge within the iteration
/// budget, the information sum vanishes, or θ degenerates.
fn newton_mle(start: f64, responses: &[Response]) -> Option<f64> {
    let mut theta = start;

    for _ in 0..MLE_MAX_ITERATIONS {
        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for r in responses {
            let (a, b, c) = (r.discrimination, r.difficulty, r.guessing);
            let p = irt::probability_correct(theta, a, b, c);
            let q = 1.0 - p;

            // 3PL score function: a(p-c)/(1-c) · (u-p)/p per response,
            // which reduces to -a(p-c)/(1-c) when the answer is wrong.
            let w = a * (p - c) / (1.0 - c);
            if r.correct {
                if p > 0.0 {
                    numerator += w * q / p;
                }
            } else {
                numerator -= w;
            }

            denominator += irt::information(theta, a, b, c);
        }

        if denominator.abs() < 1e-4 {
            return None;
        }

        let delta = numerator / denominator;
        theta = irt::clamp_theta(theta + delta);

        if !theta.is_finite() {
            return None;
        }
        if delta.abs() < MLE_TOLERANCE {
            return Some(theta);
        }
    }

    None
}

/// EAP with a standard-normal prior over a fixed quadrature grid.
///
/// Deterministic by construction: same history, same θ.
fn eap(responses: &[Response]) -> f64 {
    let step = (THETA_MAX - THETA_MIN) / (QUADRATURE_POINTS - 1) as f64;
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for i in 0..QUADRATURE_POINTS {
        let theta = THETA_MIN + i as f64 * step;
        // Log-likelihood to avoid underflow on long histories.
        let mut log_post = -0.5 * theta * theta;
        for r in responses {
            let p = irt::probability_correct(theta, r.discrimination, r.difficulty, r.guessing)
                .clamp(1e-9, 1.0 - 1e-9);
            log_post += if r.correct { p.ln() } else { (1.0 - p).ln() };
        }
        let w = log_post.exp();
        weighted_sum += theta * w;
        weight_total += w;
    }

    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, Skill};

    fn item(id: &str, b: f64) -> Item {
        Item {
            id: id.into(),
            skill: Skill::Reading,
            difficulty: b,
            discrimination: 1.0,
            guessing: 0.25,
            tags: vec![],
        }
    }

    fn response(id: &str, b: f64, correct: bool) -> Response {
        Response::new(&item(id, b), correct, 1000)
    }

    #[test]
    fn empty_history_is_an_error() {
        let mut est = AbilityEstimate::new(0.0);
        assert!(matches!(est.update(&[]), Err(EngineError::EmptyHistory)));
    }

    #[test]
    fn all_correct_uses_eap_and_moves_up() {
        let mut est = AbilityEstimate::new(0.0);
        let history = vec![
            response("r1", 0.0, true),
            response("r2", 0.5, true),
            response("r3", 1.0, true),
        ];
        est.update(&history).unwrap();
        assert_eq!(est.method, EstimationMethod::Eap);
        assert!(est.theta > 0.0, "theta should rise, got {}", est.theta);
        assert_eq!(est.se, SE_SENTINEL);
    }

    #[test]
    fn all_incorrect_moves_down() {
        let mut est = AbilityEstimate::new(0.0);
        let history = vec![
            response("r1", 0.0, false),
            response("r2", -0.5, false),
        ];
        est.update(&history).unwrap();
        assert!(est.theta < 0.0);
        assert_eq!(est.se, SE_SENTINEL);
    }

    #[test]
    fn mixed_outcomes_switch_to_mle_with_finite_se() {
        let mut est = AbilityEstimate::new(0.0);
        let history = vec![
            response("r1", -1.0, true),
            response("r2", 0.0, true),
            response("r3", 1.5, false),
            response("r4", 0.5, true),
        ];
        est.update(&history).unwrap();
        assert_eq!(est.method, EstimationMethod::Mle);
        assert!(est.se.is_finite());
        assert!(est.se >= 0.0);
        assert!(est.se < SE_SENTINEL);
    }

    #[test]
    fn shortest_mixed_history_still_converges() {
        // One hit, one miss is the first point where the likelihood has an
        // interior maximum; Newton must find it rather than bail to EAP.
        let history = vec![
            response("r1", -0.5, true),
            response("r2", 0.5, false),
        ];
        let theta = newton_mle(0.0, &history);
        assert!(theta.is_some(), "MLE failed to converge on a 2-item history");

        let mut est = AbilityEstimate::new(0.0);
        est.update(&history).unwrap();
        assert_eq!(est.method, EstimationMethod::Mle);
    }

    #[test]
    fn update_is_deterministic() {
        let history = vec![
            response("r1", -0.5, true),
            response("r2", 0.5, false),
            response("r3", 0.0, true),
        ];
        let mut a = AbilityEstimate::new(0.0);
        let mut b = AbilityEstimate::new(0.0);
        a.update(&history).unwrap();
        b.update(&history).unwrap();
        assert_eq!(a.theta, b.theta);
        assert_eq!(a.se, b.se);
    }

    #[test]
    fn theta_stays_clamped_under_extreme_histories() {
        let mut est = AbilityEstimate::new(0.0);
        let history: Vec<Response> = (0..30)
            .map(|i| response(&format!("r{i}"), 3.0, true))
            .collect();
        est.update(&history).unwrap();
        assert!(est.theta <= THETA_MAX);
        assert!(est.theta >= THETA_MIN);
    }

    #[test]
    fn histories_extend_monotonically() {
        let mut est = AbilityEstimate::new(0.0);
        let mut history = vec![response("r1", 0.0, true)];
        est.update(&history).unwrap();
        history.push(response("r2", 0.5, false));
        est.update(&history).unwrap();
        // Initial entry plus one per update.
        assert_eq!(est.theta_history.len(), 3);
        assert_eq!(est.se_history.len(), 3);
    }

    #[test]
    fn se_decreases_as_evidence_accumulates() {
        let mut est = AbilityEstimate::new(0.0);
        let mut history = vec![
            response("r1", 0.0, true),
            response("r2", 0.3, false),
        ];
        est.update(&history).unwrap();
        let se_two = est.se;

        for i in 3..=10 {
            let correct = i % 2 == 0;
            history.push(response(&format!("r{i}"), est.theta, correct));
            est.update(&history).unwrap();
        }
        assert!(est.se < se_two, "{} !< {}", est.se, se_two);
    }
}
