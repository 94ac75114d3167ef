//! Three-parameter logistic (3PL) response model.
//!
//! P(correct | θ) = c + (1 - c) / (1 + exp(-a(θ - b)))

/// Nominal ability range on the logit scale.
pub const THETA_MIN: f64 = -4.0;
pub const THETA_MAX: f64 = 4.0;

/// Probability of a correct response under the 3PL model.
pub fn probability_correct(theta: f64, a: f64, b: f64, c: f64) -> f64 {
    c + (1.0 - c) / (1.0 + (-a * (theta - b)).exp())
}

/// Fisher information of an item at ability θ.
///
/// I(θ) = a² (p - c)² q / ((1 - c)² p)
///
/// Returns 0 when p degenerates to the guessing floor or ceiling.
pub fn information(theta: f64, a: f64, b: f64, c: f64) -> f64 {
    let p = probability_correct(theta, a, b, c);
    let q = 1.0 - p;

    if p <= c || p >= 1.0 {
        return 0.0;
    }

    let numerator = a * a * (p - c) * (p - c) * q;
    let denominator = (1.0 - c) * (1.0 - c) * p;
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Clamp θ to the nominal [-4, +4] range.
pub fn clamp_theta(theta: f64) -> f64 {
    theta.clamp(THETA_MIN, THETA_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: f64 = 1.0;
    const C: f64 = 0.25;

    #[test]
    fn probability_at_difficulty_is_midpoint() {
        // At θ = b the logistic term is 0.5, so p = c + (1-c)/2.
        let p = probability_correct(1.0, A, 1.0, C);
        assert!((p - (C + (1.0 - C) / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn probability_monotone_in_theta() {
        let mut prev = 0.0;
        for i in 0..=80 {
            let theta = THETA_MIN + i as f64 * 0.1;
            let p = probability_correct(theta, A, 0.0, C);
            assert!(p >= prev);
            prev = p;
        }
    }

    #[test]
    fn probability_floors_at_guessing() {
        let p = probability_correct(THETA_MIN, A, THETA_MAX, C);
        assert!(p > C);
        assert!(p < C + 0.01);
    }

    #[test]
    fn information_peaks_near_difficulty() {
        // With c > 0 the peak sits slightly above b, but information at b
        // must dominate far-away abilities.
        let at_b = information(0.0, A, 0.0, C);
        let far_low = information(-3.0, A, 0.0, C);
        let far_high = information(3.0, A, 0.0, C);
        assert!(at_b > far_low);
        assert!(at_b > far_high);
    }

    #[test]
    fn information_nonnegative() {
        for i in 0..=80 {
            let theta = THETA_MIN + i as f64 * 0.1;
            assert!(information(theta, 1.3, 0.7, C) >= 0.0);
        }
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_theta(5.2), THETA_MAX);
        assert_eq!(clamp_theta(-7.0), THETA_MIN);
        assert_eq!(clamp_theta(0.3), 0.3);
    }
}
