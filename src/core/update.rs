//! Loss scoring and the two-stage weight update.
//!
//! Stage 1 is the exponential loss update, where the reserved slot is scored
//! with the master's own loss. Stage 2 shares a `1 / (L + 1)` fraction of the
//! mass back towards the rank prior. Stage 2 reads the post-Stage-1 weights.

use crate::error::{FixShareError, Result};
use crate::weights::{rank_weight, WeightVector};

#[inline]
pub fn squared_loss(x: f64, y: f64) -> f64 {
    (x - y) * (x - y)
}

/// Losses of one step, computed against the revealed response.
#[derive(Debug, Clone, PartialEq)]
pub struct StepLosses {
    pub experts: Vec<f64>,
    pub master: f64,
}

impl StepLosses {
    pub fn score(predictions: &[f64], master_prediction: f64, response: f64) -> Self {
        Self {
            experts: predictions
                .iter()
                .map(|&p| squared_loss(p, response))
                .collect(),
            master: squared_loss(master_prediction, response),
        }
    }
}

/// Share rate of the mixing stage for `launched` experts.
#[inline]
pub fn share_rate(launched: usize) -> f64 {
    1.0 / (launched as f64 + 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateEngine {
    eta: f64,
}

impl UpdateEngine {
    pub fn new(eta: f64) -> Self {
        Self { eta }
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// Stage 1.
    ///
    /// ```text
    /// divisor = sum w_i e^{-eta l_i} + e^{-eta l_master} (1 - sum w_i)
    /// w_i    <- w_i e^{-eta l_i} / divisor
    /// ```
    ///
    /// Fails with [`FixShareError::InvariantViolation`] if the reserved mass is not
    /// strictly positive on entry; the weights are left untouched in that case.
    pub fn loss_update(&self, weights: &mut WeightVector, losses: &StepLosses) -> Result<()> {
        debug_assert_eq!(weights.launched(), losses.experts.len());

        let reserved_mass = weights.reserved_mass();
        if !(reserved_mass > 0.0) {
            return Err(FixShareError::InvariantViolation { reserved_mass });
        }

        let eta = self.eta;
        let factors: Vec<f64> = losses.experts.iter().map(|l| (-eta * l).exp()).collect();
        let divisor = weights
            .as_slice()
            .iter()
            .zip(&factors)
            .map(|(w, e)| w * e)
            .sum::<f64>()
            + (-eta * losses.master).exp() * reserved_mass;

        for (w, e) in weights.as_mut_slice().iter_mut().zip(&factors) {
            *w = *w * e / divisor;
        }
        Ok(())
    }

    /// Stage 2: `w_i <- alpha * rank_weight(i) + (1 - alpha) * w_i` with
    /// `alpha = 1 / (L + 1)`.
    pub fn mixing_update(&self, weights: &mut WeightVector) {
        let alpha = share_rate(weights.launched());
        for (i, w) in weights.as_mut_slice().iter_mut().enumerate() {
            *w = alpha * rank_weight(i + 1) + (1.0 - alpha) * *w;
        }
    }
}
