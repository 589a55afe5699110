//! Per-step archive of a run, and the comparisons drawn from it.

use core::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatorConfig;

/// Everything the aggregator produced at one time step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepRecord {
    pub t: usize,
    /// Experts launched at this step, including one spawned by it.
    pub launched: usize,
    pub spawned: bool,
    pub response: f64,
    pub expert_predictions: Vec<f64>,
    pub master_prediction: f64,
    pub expert_losses: Vec<f64>,
    pub master_loss: f64,
    /// `[reserved, w_1, .., w_L]` after both update stages.
    pub weights: Vec<f64>,
}

impl StepRecord {
    /// Step 0: the observation is recorded, nothing is predicted or scored.
    pub fn bootstrap(response: f64) -> Self {
        Self {
            t: 0,
            launched: 0,
            spawned: false,
            response,
            expert_predictions: Vec::new(),
            master_prediction: 0.0,
            expert_losses: Vec::new(),
            master_loss: 0.0,
            weights: vec![1.0],
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        self.t == 0
    }

    /// Per-expert vectors have `launched` entries and `weights` has one more.
    pub fn is_consistent(&self) -> bool {
        self.expert_predictions.len() == self.launched
            && self.expert_losses.len() == self.launched
            && self.weights.len() == self.launched + 1
    }
}

/// Master loss against the best single expert over a range of steps.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegretSummary {
    pub start: usize,
    pub end: usize,
    pub master_loss: f64,
    /// Best expert launched no later than `start`, if any.
    pub best_expert: Option<usize>,
    pub best_expert_loss: Option<f64>,
    pub regret: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct History {
    config: AggregatorConfig,
    records: Vec<StepRecord>,
}

/// Running sum.
pub fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

impl History {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            records: Vec::with_capacity(config.total_time),
        }
    }

    /// Rebuild a history read back from an archive.
    pub(crate) fn from_parts(config: AggregatorConfig, records: Vec<StepRecord>) -> Self {
        Self { config, records }
    }

    /// The configuration the run was made with.
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn push(&mut self, record: StepRecord) -> &StepRecord {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn get(&self, t: usize) -> Option<&StepRecord> {
        self.records.get(t)
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// Experts launched by the end of the recorded steps.
    pub fn max_experts(&self) -> usize {
        self.records.last().map_or(0, |r| r.launched)
    }

    pub fn responses(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.response).collect()
    }

    pub fn master_predictions(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.master_prediction).collect()
    }

    pub fn master_losses(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.master_loss).collect()
    }

    pub fn cumulative_master_loss(&self) -> Vec<f64> {
        cumulative(&self.master_losses())
    }

    fn padded(&self, row: impl Fn(&StepRecord) -> (f64, &[f64])) -> Vec<Vec<f64>> {
        let width = self.max_experts() + 1;
        self.records
            .iter()
            .map(|r| {
                let (slot0, rest) = row(r);
                let mut out = vec![0.0; width];
                out[0] = slot0;
                out[1..=rest.len()].copy_from_slice(rest);
                out
            })
            .collect()
    }

    /// `len x (max_experts + 1)`; slot 0 is the master prediction, unlaunched
    /// experts read as 0.
    pub fn prediction_matrix(&self) -> Vec<Vec<f64>> {
        self.padded(|r| (r.master_prediction, &r.expert_predictions))
    }

    /// `len x (max_experts + 1)`; slot 0 is the master loss.
    pub fn loss_matrix(&self) -> Vec<Vec<f64>> {
        self.padded(|r| (r.master_loss, &r.expert_losses))
    }

    /// `len x (max_experts + 1)`; slot 0 is the reserved mass.
    pub fn weight_matrix(&self) -> Vec<Vec<f64>> {
        self.padded(|r| (r.weights[0], &r.weights[1..]))
    }

    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.records.len());
        range.start.min(end)..end
    }

    pub fn master_loss_over(&self, range: Range<usize>) -> f64 {
        let range = self.clamp(range);
        self.records[range].iter().map(|r| r.master_loss).sum()
    }

    /// Cumulative loss of expert `index` (1-based) over `range`, or `None` if it
    /// was not launched for the whole range or the range is empty.
    pub fn expert_loss_over(&self, index: usize, range: Range<usize>) -> Option<f64> {
        let range = self.clamp(range);
        if range.is_empty() || index == 0 {
            return None;
        }
        self.records[range]
            .iter()
            .map(|r| r.expert_losses.get(index - 1).copied())
            .sum()
    }

    /// Expert with the lowest cumulative loss over `range` among those active
    /// for all of it.
    pub fn best_expert_over(&self, range: Range<usize>) -> Option<(usize, f64)> {
        let range = self.clamp(range);
        let launched = self.records.get(range.start)?.launched;
        (1..=launched)
            .filter_map(|i| self.expert_loss_over(i, range.clone()).map(|l| (i, l)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn regret_over(&self, range: Range<usize>) -> RegretSummary {
        let range = self.clamp(range);
        let master_loss = self.master_loss_over(range.clone());
        let best = self.best_expert_over(range.clone());
        RegretSummary {
            start: range.start,
            end: range.end,
            master_loss,
            best_expert: best.map(|(i, _)| i),
            best_expert_loss: best.map(|(_, l)| l),
            regret: best.map(|(_, l)| master_loss - l),
        }
    }

    /// Step at which each expert was launched, in launch order.
    pub fn launch_times(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.max_experts());
        for r in &self.records {
            while out.len() < r.launched {
                out.push(r.t);
            }
        }
        out
    }

    /// Loss of a hindsight oracle that knows where the regimes switch.
    ///
    /// Segments are delimited by `stamps`. Within a segment the oracle follows
    /// the first expert whose whole training window `[launch - W, launch)` lies
    /// in the segment, from its launch to the segment end. Before that launch,
    /// or in a segment no expert was trained on, it takes the master's loss.
    pub fn oracle_losses(&self, stamps: &[usize]) -> Vec<f64> {
        let len = self.records.len();
        let window = self.config.train_window;
        let launches = self.launch_times();

        let mut bounds: Vec<usize> = Vec::with_capacity(stamps.len() + 2);
        bounds.push(0);
        bounds.extend(stamps.iter().copied().filter(|&s| s > 0 && s < len));
        bounds.push(len);
        bounds.dedup();

        let mut out = Vec::with_capacity(len);
        for seg in bounds.windows(2) {
            let (left, right) = (seg[0], seg[1]);
            let tracked = launches
                .iter()
                .position(|&at| at.saturating_sub(window) >= left && at < right);

            for r in &self.records[left..right] {
                let loss = tracked
                    .filter(|&i| r.t >= launches[i])
                    .and_then(|i| r.expert_losses.get(i).copied())
                    .unwrap_or(r.master_loss);
                out.push(loss);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(t: usize, experts: &[f64], master: f64) -> StepRecord {
        let launched = experts.len();
        let mut weights = vec![0.5];
        weights.extend(std::iter::repeat(0.5 / launched.max(1) as f64).take(launched));
        StepRecord {
            t,
            launched,
            spawned: false,
            response: 0.0,
            expert_predictions: experts.iter().map(|l| l.sqrt()).collect(),
            master_prediction: master.sqrt(),
            expert_losses: experts.to_vec(),
            master_loss: master,
            weights,
        }
    }

    fn sample() -> History {
        let mut h = History::new(AggregatorConfig::default());
        h.push(StepRecord::bootstrap(1.0));
        h.push(record(1, &[], 4.0));
        h.push(record(2, &[1.0], 1.0));
        h.push(record(3, &[2.0], 2.0));
        h.push(record(4, &[3.0, 1.0], 2.0));
        h.push(record(5, &[3.0, 0.0], 1.0));
        h
    }

    #[test]
    fn bootstrap_record_is_empty() {
        let r = StepRecord::bootstrap(3.5);
        assert!(r.is_bootstrap());
        assert_eq!(r.launched, 0);
        assert!(r.expert_predictions.is_empty());
        assert_eq!(r.master_loss, 0.0);
        assert_eq!(r.weights, vec![1.0]);
    }

    #[test]
    fn consistency_checks_vector_lengths() {
        assert!(StepRecord::bootstrap(1.0).is_consistent());
        assert!(record(3, &[1.0, 2.0], 1.0).is_consistent());

        let mut r = record(3, &[1.0, 2.0], 1.0);
        r.weights.clear();
        assert!(!r.is_consistent());

        let mut r = record(3, &[1.0, 2.0], 1.0);
        r.expert_losses.pop();
        assert!(!r.is_consistent());
    }

    #[test]
    fn cumulative_is_running_sum() {
        assert_eq!(cumulative(&[1.0, 2.0, 3.0]), vec![1.0, 3.0, 6.0]);
        assert!(cumulative(&[]).is_empty());
    }

    #[test]
    fn padded_matrices_have_fixed_width() {
        let h = sample();
        assert_eq!(h.max_experts(), 2);

        let losses = h.loss_matrix();
        assert_eq!(losses.len(), 6);
        assert!(losses.iter().all(|row| row.len() == 3));
        assert_eq!(losses[2], vec![1.0, 1.0, 0.0]);
        assert_eq!(losses[4], vec![2.0, 3.0, 1.0]);

        let weights = h.weight_matrix();
        assert_eq!(weights[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(weights[4], vec![0.5, 0.25, 0.25]);

        assert_eq!(h.prediction_matrix()[2][1], 1.0);
    }

    #[test]
    fn expert_loss_requires_full_coverage() {
        let h = sample();
        assert_eq!(h.expert_loss_over(1, 2..6), Some(9.0));
        assert_eq!(h.expert_loss_over(2, 4..6), Some(1.0));
        assert_eq!(h.expert_loss_over(2, 3..6), None);
        assert_eq!(h.expert_loss_over(0, 2..6), None);
        assert_eq!(h.expert_loss_over(1, 4..4), None);
    }

    #[test]
    fn regret_against_best_expert() {
        let h = sample();
        let r = h.regret_over(4..6);
        assert_eq!(r.best_expert, Some(2));
        assert_eq!(r.best_expert_loss, Some(1.0));
        assert_eq!(r.master_loss, 3.0);
        assert_eq!(r.regret, Some(2.0));

        let none = h.regret_over(0..3);
        assert_eq!(none.best_expert, None);
        assert_eq!(none.regret, None);
    }

    #[test]
    fn ranges_are_clamped_to_history() {
        let h = sample();
        assert_eq!(h.master_loss_over(4..100), 3.0);
        assert_eq!(h.regret_over(4..100).end, 6);
    }

    #[test]
    fn launch_times_follow_pool_growth() {
        assert_eq!(sample().launch_times(), vec![2, 4]);
        assert!(History::new(AggregatorConfig::default())
            .launch_times()
            .is_empty());
    }

    fn switching() -> History {
        let mut h = History::new(AggregatorConfig::default().with_train_window(2));
        h.push(StepRecord::bootstrap(0.0));
        h.push(record(1, &[], 4.0));
        h.push(record(2, &[1.0], 2.0));
        h.push(record(3, &[5.0], 3.0));
        h.push(record(4, &[6.0], 3.0));
        h.push(record(5, &[7.0, 0.5], 2.0));
        h.push(record(6, &[7.0, 0.5], 1.0));
        h.push(record(7, &[8.0, 0.0], 1.0));
        h
    }

    #[test]
    fn oracle_tracks_expert_trained_in_each_segment() {
        let h = switching();
        // Expert 1 trains on [0, 2), expert 2 on [3, 5).
        let oracle = h.oracle_losses(&[3]);
        assert_eq!(oracle, vec![0.0, 4.0, 1.0, 3.0, 3.0, 0.5, 0.5, 0.0]);
        assert_eq!(cumulative(&oracle).last().copied(), Some(12.0));
        assert_eq!(h.master_loss_over(0..8), 16.0);
    }

    #[test]
    fn oracle_without_switches_follows_first_expert() {
        let h = switching();
        let oracle = h.oracle_losses(&[]);
        assert_eq!(oracle, vec![0.0, 4.0, 1.0, 5.0, 6.0, 7.0, 7.0, 8.0]);
    }

    #[test]
    fn oracle_falls_back_to_master_without_a_trained_expert() {
        let h = switching();
        // [6, 8) has no expert trained inside it.
        let oracle = h.oracle_losses(&[6]);
        assert_eq!(&oracle[6..], &[1.0, 1.0]);
        assert_eq!(&oracle[..6], &[0.0, 4.0, 1.0, 5.0, 6.0, 7.0]);
    }
}
