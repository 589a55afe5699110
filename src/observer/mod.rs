use crate::aggregator::Aggregator;
use crate::regression::Regressor;
use crate::source::DataSource;

/// A read-only snapshot of a running aggregator.
///
/// Snapshots are taken on demand and may allocate; stepping is unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorSnapshot {
    /// Next step to execute.
    pub time: usize,
    pub horizon: usize,
    pub launched: usize,
    pub reserved_mass: f64,
    pub normalized_weights: Vec<f64>,
    /// 1-based index and normalized weight of the heaviest expert.
    pub leading_expert: Option<(usize, f64)>,
    pub last_master_loss: Option<f64>,
    pub cumulative_master_loss: f64,
}

impl AggregatorSnapshot {
    /// Fraction of the run completed.
    pub fn progress(&self) -> f64 {
        if self.horizon == 0 {
            return 1.0;
        }
        self.time as f64 / self.horizon as f64
    }
}

pub struct AggregatorAdapter<'a, S: DataSource, R: Regressor> {
    aggregator: &'a Aggregator<S, R>,
}

impl<'a, S: DataSource, R: Regressor> AggregatorAdapter<'a, S, R> {
    pub fn new(aggregator: &'a Aggregator<S, R>) -> Self {
        Self { aggregator }
    }

    pub fn snapshot(&self) -> AggregatorSnapshot {
        let agg = self.aggregator;
        let history = agg.history();
        let normalized_weights = agg.weights().normalized();

        let leading_expert = normalized_weights
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, w)| (i + 1, w));

        AggregatorSnapshot {
            time: agg.time(),
            horizon: agg.config().total_time,
            launched: agg.launched(),
            reserved_mass: agg.weights().reserved_mass(),
            normalized_weights,
            leading_expert,
            last_master_loss: history.last().map(|r| r.master_loss),
            cumulative_master_loss: history.master_losses().iter().sum(),
        }
    }
}
