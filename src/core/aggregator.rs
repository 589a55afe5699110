//! The driver loop: one owning state object advanced one step at a time.
//!
//! Per steady-state step, in this order:
//! spawn-check, normalize, predict, score, loss update, mixing update, archive.
//! Step 0 only records the first observation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::{info, trace, warn};

use crate::buffer::SignalBuffer;
use crate::combiner::{mixability_eta, SubstitutionCombiner};
use crate::error::{ConfigError, FixShareError, Result};
use crate::history::{History, StepRecord};
use crate::pool::ExpertPool;
use crate::regression::{OrdinaryLeastSquares, Regressor};
use crate::source::DataSource;
use crate::update::{StepLosses, UpdateEngine};
use crate::weights::WeightVector;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AggregatorConfig {
    /// Number of steps in a run, including the bootstrap step.
    pub total_time: usize,
    /// A new expert is spawned at every positive multiple of `period`.
    pub period: usize,
    /// Training window length `W` of each expert.
    pub train_window: usize,
    /// Lower prediction bound.
    pub a: f64,
    /// Upper prediction bound.
    pub b: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            total_time: 400,
            period: 40,
            train_window: 40,
            a: -40.0,
            b: 40.0,
        }
    }
}

impl AggregatorConfig {
    pub fn with_horizon(mut self, total_time: usize) -> Self {
        self.total_time = total_time;
        self
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    pub fn with_train_window(mut self, train_window: usize) -> Self {
        self.train_window = train_window;
        self
    }

    pub fn with_bounds(mut self, a: f64, b: f64) -> Self {
        self.a = a;
        self.b = b;
        self
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.total_time == 0 {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.period == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.train_window == 0 {
            return Err(ConfigError::ZeroTrainWindow);
        }
        if !self.a.is_finite() || !self.b.is_finite() {
            return Err(ConfigError::NonFiniteBounds {
                a: self.a,
                b: self.b,
            });
        }
        if self.a >= self.b {
            return Err(ConfigError::EmptyInterval {
                a: self.a,
                b: self.b,
            });
        }
        Ok(())
    }

    /// `2 / (b - a)^2`
    pub fn eta(&self) -> f64 {
        mixability_eta(self.a, self.b)
    }

    /// Experts a full run launches: positive multiples of `period` below `total_time`.
    pub fn expected_experts(&self) -> usize {
        self.total_time.saturating_sub(1) / self.period.max(1)
    }
}

pub struct Aggregator<S: DataSource, R: Regressor = OrdinaryLeastSquares> {
    cfg: AggregatorConfig,
    source: S,
    buffer: SignalBuffer,
    pool: ExpertPool<R>,
    weights: WeightVector,
    normalized: Vec<f64>,
    combiner: SubstitutionCombiner,
    engine: UpdateEngine,
    history: History,
    time: usize,
    halted: bool,
}

impl<S: DataSource> Aggregator<S> {
    /// Aggregator backed by ordinary least squares experts.
    pub fn new(cfg: AggregatorConfig, source: S) -> Result<Self> {
        Self::with_regressor(cfg, source, OrdinaryLeastSquares::default())
    }
}

impl<S: DataSource, R: Regressor> Aggregator<S, R> {
    /// Validates `cfg` and the source's dimension before any step runs.
    pub fn with_regressor(cfg: AggregatorConfig, source: S, regressor: R) -> Result<Self> {
        cfg.validate()?;

        let dim = source.dim();
        if dim == 0 {
            return Err(ConfigError::ZeroDimension.into());
        }
        let emitted = source.signal().len();
        if emitted != dim {
            return Err(ConfigError::SourceDimension {
                declared: dim,
                emitted,
            }
            .into());
        }

        info!(
            total_time = cfg.total_time,
            period = cfg.period,
            train_window = cfg.train_window,
            a = cfg.a,
            b = cfg.b,
            dim,
            "aggregator configured"
        );

        Ok(Self {
            cfg,
            source,
            buffer: SignalBuffer::new(dim, cfg.total_time),
            pool: ExpertPool::new(regressor, cfg.period, cfg.train_window, cfg.total_time),
            weights: WeightVector::new(),
            normalized: Vec::new(),
            combiner: SubstitutionCombiner::new(cfg.a, cfg.b),
            engine: UpdateEngine::new(cfg.eta()),
            history: History::new(cfg),
            time: 0,
            halted: false,
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.cfg
    }

    /// Next step to execute.
    pub fn time(&self) -> usize {
        self.time
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.cfg.total_time
    }

    /// A step has failed; every later `step` returns [`FixShareError::Halted`].
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn launched(&self) -> usize {
        self.pool.launched()
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    /// Normalized weights used by the most recent prediction.
    pub fn normalized_weights(&self) -> &[f64] {
        &self.normalized
    }

    pub fn pool(&self) -> &ExpertPool<R> {
        &self.pool
    }

    pub fn buffer(&self) -> &SignalBuffer {
        &self.buffer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn into_history(self) -> History {
        self.history
    }

    /// Recompute the normalized weights from the current weights.
    ///
    /// Idempotent between updates. Leaves the previous vector in place while no
    /// expert is launched.
    pub fn normalize(&mut self) -> &[f64] {
        if !self.weights.is_empty() {
            self.normalized = self.weights.normalized();
        }
        &self.normalized
    }

    /// Execute one step and archive it.
    ///
    /// A failure leaves the step unarchived and the clock where it was, and halts
    /// the aggregator: state may already be partly updated (a spawned expert, a
    /// recorded signal), so the step is never retried.
    pub fn step(&mut self) -> Result<&StepRecord> {
        if self.halted {
            return Err(FixShareError::Halted { t: self.time });
        }
        if self.is_finished() {
            return Err(FixShareError::Finished {
                horizon: self.cfg.total_time,
            });
        }

        let t = self.time;
        let outcome = if t == 0 {
            self.bootstrap()
        } else {
            self.steady_step(t)
        };
        let record = match outcome {
            Ok(record) => record,
            Err(e) => {
                self.halted = true;
                warn!(t, error = %e, "step failed, run halted");
                return Err(e);
            }
        };

        self.source.advance();
        self.time += 1;
        Ok(self.history.push(record))
    }

    /// Run every remaining step.
    pub fn run(&mut self) -> Result<&History> {
        while !self.is_finished() {
            self.step()?;
        }

        let cumulative: f64 = self.history.master_losses().iter().sum();
        info!(
            steps = self.history.len(),
            experts = self.launched(),
            master_loss = cumulative,
            "run complete"
        );
        Ok(&self.history)
    }

    fn bootstrap(&mut self) -> Result<StepRecord> {
        let response = self.source.response();
        self.buffer.record(0, self.source.signal(), response)?;
        trace!(t = 0, response, "bootstrap");
        Ok(StepRecord::bootstrap(response))
    }

    fn steady_step(&mut self, t: usize) -> Result<StepRecord> {
        let spawned = self.pool.maybe_spawn(t, &self.buffer)?;
        if spawned.is_some() {
            self.weights.launch();
        }

        self.normalize();

        self.buffer.record_signal(t, self.source.signal())?;
        let predictions = self.pool.predict_all(self.source.signal());
        let master_prediction = self.combiner.combine(&predictions, &self.normalized);

        let response = self.source.response();
        self.buffer.record_response(t, response)?;
        let losses = StepLosses::score(&predictions, master_prediction, response);

        self.engine.loss_update(&mut self.weights, &losses)?;
        self.engine.mixing_update(&mut self.weights);

        trace!(
            t,
            launched = self.weights.launched(),
            master = master_prediction,
            response,
            master_loss = losses.master,
            reserved = self.weights.reserved_mass(),
            "step"
        );

        Ok(StepRecord {
            t,
            launched: self.pool.launched(),
            spawned: spawned.is_some(),
            response,
            expert_predictions: predictions,
            master_prediction,
            expert_losses: losses.experts,
            master_loss: losses.master,
            weights: self.weights.snapshot(),
        })
    }
}
