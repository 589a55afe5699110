//! Expert weights and the rank prior.
//!
//! Slot `i` (1-based) belongs to the `i`-th launched expert. The reserved slot 0 is
//! never stored: it is the mass `1 - sum(weights)` not yet assigned to any
//! launched expert, and it must stay strictly positive.

/// `sum_{n >= 2} 1 / (n ln^2 n)`, so that `rank_weight` sums to 1 over `k >= 1`.
pub const PRIOR_NORMALIZER: f64 = 2.109_742_801_236_891;

/// Prior mass of the `k`-th launched expert (`k >= 1`).
///
/// `1 / ((k + 1) ln^2(k + 1)) / C`; earlier experts get more mass.
#[inline]
pub fn rank_weight(k: usize) -> f64 {
    debug_assert!(k >= 1, "rank_weight is defined for k >= 1");
    let n = (k + 1) as f64;
    let ln = n.ln();
    1.0 / (n * ln * ln) / PRIOR_NORMALIZER
}

/// Prior mass of every expert after the `n`-th, i.e. `sum_{k > n} rank_weight(k)`.
///
/// Integral tail plus the Euler-Maclaurin half-term; the error shrinks like
/// `1 / (n^2 ln^2 n)`.
pub fn prior_tail(n: usize) -> f64 {
    let m = (n + 2) as f64;
    let ln = m.ln();
    (1.0 / ln + 0.5 / (m * ln * ln)) / PRIOR_NORMALIZER
}

/// Growable weight arena indexed by launch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightVector {
    weights: Vec<f64>,
}

impl WeightVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of launched experts `L`.
    pub fn launched(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Register the next expert at its prior mass. Returns its 1-based index.
    pub fn launch(&mut self) -> usize {
        let index = self.weights.len() + 1;
        self.weights.push(rank_weight(index));
        index
    }

    /// Weight of the expert with 1-based `index`.
    pub fn get(&self, index: usize) -> Option<f64> {
        index.checked_sub(1).and_then(|i| self.weights.get(i).copied())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// `sum(weights[1..=L])`
    pub fn mass(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn reserved_mass(&self) -> f64 {
        1.0 - self.mass()
    }

    /// `weights / sum(weights)`. Empty when nothing is launched.
    pub fn normalized(&self) -> Vec<f64> {
        let total = self.mass();
        self.weights.iter().map(|w| w / total).collect()
    }

    /// `[reserved, w_1, .., w_L]`, the layout archived per step.
    pub fn snapshot(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.weights.len() + 1);
        out.push(self.reserved_mass());
        out.extend_from_slice(&self.weights);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial_sum(n: usize) -> f64 {
        (1..=n).map(rank_weight).sum()
    }

    #[test]
    fn prior_is_decreasing_in_rank() {
        for k in 1..500 {
            assert!(rank_weight(k) > rank_weight(k + 1));
        }
    }

    #[test]
    fn first_ranks_match_closed_form() {
        let ln2 = 2.0f64.ln();
        let expected = 1.0 / (2.0 * ln2 * ln2) / PRIOR_NORMALIZER;
        assert!((rank_weight(1) - expected).abs() < 1e-15);
        assert!((rank_weight(1) - 0.493_3).abs() < 1e-3);
    }

    #[test]
    fn partial_sums_stay_below_one_and_grow() {
        let mut prev = 0.0;
        for n in [1, 2, 10, 100, 1_000, 10_000] {
            let s = partial_sum(n);
            assert!(s > prev, "partial sum must grow: {} <= {}", s, prev);
            assert!(s < 1.0, "partial sum must stay below 1, got {}", s);
            prev = s;
        }
    }

    #[test]
    fn prior_normalizes_to_one() {
        // The series converges logarithmically: the raw partial sum at 10_000 is
        // ~0.9485, so compare against 1 with the tail accounted for.
        let n = 10_000;
        let total = partial_sum(n) + prior_tail(n);
        assert!((total - 1.0).abs() < 1e-3, "prior total = {}", total);
        assert!((partial_sum(n) - 0.9485).abs() < 1e-3);
    }

    #[test]
    fn launch_uses_prior_and_keeps_reserved_mass() {
        let mut w = WeightVector::new();
        assert_eq!(w.reserved_mass(), 1.0);

        assert_eq!(w.launch(), 1);
        assert_eq!(w.launch(), 2);
        assert_eq!(w.launched(), 2);
        assert_eq!(w.get(1), Some(rank_weight(1)));
        assert_eq!(w.get(2), Some(rank_weight(2)));
        assert_eq!(w.get(0), None);
        assert_eq!(w.get(3), None);
        assert!(w.reserved_mass() > 0.0);
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut w = WeightVector::new();
        w.launch();
        w.launch();
        w.launch();
        w.as_mut_slice()[1] = 0.05;

        let first = w.normalized();
        let second = w.normalized();
        assert_eq!(first, second);
        assert!((first.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn snapshot_leads_with_reserved_mass() {
        let mut w = WeightVector::new();
        w.launch();
        let snap = w.snapshot();
        assert_eq!(snap.len(), 2);
        assert!((snap[0] + snap[1] - 1.0).abs() < 1e-15);
    }
}
