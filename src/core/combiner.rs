//! Substitution function for squared loss on `[a, b]`.

/// Learning rate that makes squared loss on `[a, b]` mixable.
#[inline]
pub fn mixability_eta(a: f64, b: f64) -> f64 {
    2.0 / ((b - a) * (b - a))
}

/// Turns expert predictions and normalized weights into the master prediction.
///
/// ```text
/// master = (a+b)/2 + ln( sum w_i e^{-eta (b-p_i)^2} / sum w_i e^{-eta (a-p_i)^2} ) / (2 eta (b-a))
/// ```
///
/// If every `p_i` lies in `[a, b]` the result does too. Predictions outside the
/// interval, or an all-zero weight vector, are not guarded: the result may be NaN
/// or infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstitutionCombiner {
    a: f64,
    b: f64,
    eta: f64,
}

impl SubstitutionCombiner {
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            a,
            b,
            eta: mixability_eta(a, b),
        }
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.a, self.b)
    }

    /// Master prediction; `0.0` before any expert exists.
    pub fn combine(&self, predictions: &[f64], normalized_weights: &[f64]) -> f64 {
        debug_assert_eq!(predictions.len(), normalized_weights.len());
        if predictions.is_empty() {
            return 0.0;
        }

        let (a, b, eta) = (self.a, self.b, self.eta);
        let mut upper = 0.0;
        let mut lower = 0.0;
        for (&p, &w) in predictions.iter().zip(normalized_weights) {
            upper += w * (-eta * (b - p) * (b - p)).exp();
            lower += w * (-eta * (a - p) * (a - p)).exp();
        }

        (a + b) / 2.0 + (upper / lower).ln() / (2.0 * eta * (b - a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::Prng;

    #[test]
    fn eta_matches_interval_width() {
        let c = SubstitutionCombiner::new(-40.0, 40.0);
        assert!((c.eta() - 2.0 / 6400.0).abs() < 1e-18);
    }

    #[test]
    fn no_experts_predicts_zero() {
        let c = SubstitutionCombiner::new(-1.0, 3.0);
        assert_eq!(c.combine(&[], &[]), 0.0);
    }

    #[test]
    fn single_expert_is_reproduced() {
        let c = SubstitutionCombiner::new(-40.0, 40.0);
        for p in [-40.0, -12.5, 0.0, 3.25, 39.0, 40.0] {
            let m = c.combine(&[p], &[1.0]);
            assert!((m - p).abs() < 1e-9, "expected {}, got {}", p, m);
        }
    }

    #[test]
    fn agreeing_experts_are_reproduced() {
        let c = SubstitutionCombiner::new(0.0, 10.0);
        let m = c.combine(&[4.0, 4.0, 4.0], &[0.2, 0.3, 0.5]);
        assert!((m - 4.0).abs() < 1e-9);
    }

    #[test]
    fn weights_pull_towards_heavier_expert() {
        let c = SubstitutionCombiner::new(-10.0, 10.0);
        let light = c.combine(&[-5.0, 5.0], &[0.9, 0.1]);
        let heavy = c.combine(&[-5.0, 5.0], &[0.1, 0.9]);
        assert!(light < 0.0 && heavy > 0.0);
        assert!((light + heavy).abs() < 1e-9, "symmetric weights give symmetric output");
    }

    #[test]
    fn bounded_predictions_give_bounded_master() {
        let (a, b) = (-40.0, 40.0);
        let c = SubstitutionCombiner::new(a, b);
        let mut rng = Prng::new(99);

        for _ in 0..2_000 {
            let n = 1 + (rng.next_f64_01() * 8.0) as usize;
            let preds: Vec<f64> = (0..n).map(|_| rng.gen_range_f64(a, b)).collect();
            let raw: Vec<f64> = (0..n).map(|_| rng.next_f64_01() + 1e-6).collect();
            let total: f64 = raw.iter().sum();
            let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();

            let m = c.combine(&preds, &weights);
            assert!(
                m >= a - 1e-9 && m <= b + 1e-9,
                "master {} escaped [{}, {}]",
                m,
                a,
                b
            );
        }
    }

    #[test]
    fn extreme_predictions_hit_the_bounds() {
        let c = SubstitutionCombiner::new(-2.0, 2.0);
        assert!((c.combine(&[2.0, 2.0], &[0.5, 0.5]) - 2.0).abs() < 1e-9);
        assert!((c.combine(&[-2.0], &[1.0]) + 2.0).abs() < 1e-9);
    }
}
