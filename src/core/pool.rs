#[cfg(feature = "parallel")]
use rayon::prelude::*;

use tracing::debug;

use crate::buffer::SignalBuffer;
use crate::error::Result;
use crate::regression::{Predictor, Regressor};

/// One frozen predictor, trained once at launch.
#[derive(Debug, Clone)]
pub struct Expert<M> {
    /// 1-based launch order.
    pub index: usize,
    /// Step at which the expert was spawned.
    pub launched_at: usize,
    /// Training window `[start, end)` with `end == launched_at`.
    pub trained_on: (usize, usize),
    pub model: M,
}

/// Append-only pool; a new expert every `period` steps.
pub struct ExpertPool<R: Regressor> {
    regressor: R,
    period: usize,
    train_window: usize,
    horizon: usize,
    experts: Vec<Expert<R::Model>>,
}

impl<R: Regressor> ExpertPool<R> {
    pub fn new(regressor: R, period: usize, train_window: usize, horizon: usize) -> Self {
        Self {
            regressor,
            period,
            train_window,
            horizon,
            experts: Vec::new(),
        }
    }

    /// `t` is a positive multiple of `period` below the horizon.
    pub fn is_spawn_step(&self, t: usize) -> bool {
        t > 0 && t < self.horizon && t % self.period == 0
    }

    /// Spawn an expert if `t` is a spawn step, training it on
    /// `[max(t - W, 0), t)`. Returns the new expert's 1-based index.
    pub fn maybe_spawn(&mut self, t: usize, buffer: &SignalBuffer) -> Result<Option<usize>> {
        if !self.is_spawn_step(t) {
            return Ok(None);
        }

        let start = t.saturating_sub(self.train_window);
        let window = buffer.window(start, t)?;
        let model = self.regressor.fit(&window)?;

        let index = self.experts.len() + 1;
        self.experts.push(Expert {
            index,
            launched_at: t,
            trained_on: (start, t),
            model,
        });
        debug!(expert = index, t, start, "spawned expert");
        Ok(Some(index))
    }

    /// Every launched expert's prediction, in launch order.
    pub fn predict_all(&self, signal: &[f64]) -> Vec<f64> {
        #[cfg(feature = "parallel")]
        {
            self.experts
                .par_iter()
                .map(|e| e.model.predict(signal))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.experts
                .iter()
                .map(|e| e.model.predict(signal))
                .collect()
        }
    }

    /// Launched count `L`.
    pub fn launched(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }

    pub fn experts(&self) -> &[Expert<R::Model>] {
        &self.experts
    }

    /// Expert with 1-based `index`.
    pub fn get(&self, index: usize) -> Option<&Expert<R::Model>> {
        index.checked_sub(1).and_then(|i| self.experts.get(i))
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn train_window(&self) -> usize {
        self.train_window
    }
}
