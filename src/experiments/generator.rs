//! Synthetic regime-switching linear data.
//!
//! Each segment between switch stamps draws responses from one linear regime:
//! `response = intercept + coefficients . signal + noise`, with signals uniform on
//! `[signal_low, signal_high)^dim` and Gaussian noise.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::prng::Prng;
use crate::source::DataSource;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Regime {
    pub coefficients: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub intercept: f64,
}

impl Regime {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn mean_response(&self, signal: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(signal)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeneratorConfig {
    pub dim: usize,
    pub regimes: Vec<Regime>,
    /// Steps at which the next segment starts; strictly increasing, all > 0.
    pub stamps: Vec<usize>,
    /// Regime used by each segment: `stamps.len() + 1` entries.
    pub indexes: Vec<usize>,
    pub signal_low: f64,
    pub signal_high: f64,
    pub noise_std: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            dim: 1,
            regimes: vec![Regime::new(vec![2.0], 0.0)],
            stamps: Vec::new(),
            indexes: vec![0],
            signal_low: -10.0,
            signal_high: 10.0,
            noise_std: 1.0,
            seed: 1,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.dim == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if self.regimes.is_empty() {
            return Err(ConfigError::NoRegimes);
        }
        for (regime, r) in self.regimes.iter().enumerate() {
            if r.coefficients.len() != self.dim {
                return Err(ConfigError::RegimeDimension {
                    regime,
                    expected: self.dim,
                    got: r.coefficients.len(),
                });
            }
        }
        if self.stamps.first() == Some(&0) || self.stamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::UnorderedStamps);
        }
        if self.indexes.len() != self.stamps.len() + 1 {
            return Err(ConfigError::SegmentCount {
                expected: self.stamps.len() + 1,
                got: self.indexes.len(),
            });
        }
        if let Some(&index) = self.indexes.iter().find(|&&i| i >= self.regimes.len()) {
            return Err(ConfigError::UnknownRegime {
                index,
                regimes: self.regimes.len(),
            });
        }
        if !(self.signal_low.is_finite()
            && self.signal_high.is_finite()
            && self.signal_low < self.signal_high)
        {
            return Err(ConfigError::SignalRange);
        }
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(ConfigError::NoiseLevel);
        }
        Ok(())
    }

    /// `(start, end, regime)` for each segment, truncated to `total_time`.
    pub fn segments(&self, total_time: usize) -> Vec<(usize, usize, usize)> {
        let mut out = Vec::with_capacity(self.indexes.len());
        let mut start = 0;
        for (i, &regime) in self.indexes.iter().enumerate() {
            let end = self.stamps.get(i).copied().unwrap_or(total_time).min(total_time);
            if start >= end {
                break;
            }
            out.push((start, end, regime));
            start = end;
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct RegimeGenerator {
    cfg: GeneratorConfig,
    rng: Prng,
    time: usize,
    segment: usize,
    signal: Vec<f64>,
    response: f64,
}

impl RegimeGenerator {
    pub fn new(cfg: GeneratorConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self::from_valid(cfg))
    }

    /// Three one-dimensional regimes, switching every 100 steps and returning to
    /// the first one at step 300.
    pub fn demo(seed: u64) -> Self {
        Self::from_valid(GeneratorConfig {
            regimes: vec![
                Regime::new(vec![2.0], 0.0),
                Regime::new(vec![-1.0], 5.0),
                Regime::new(vec![0.5], -3.0),
            ],
            stamps: vec![100, 200, 300],
            indexes: vec![0, 1, 2, 0],
            seed,
            ..GeneratorConfig::default()
        })
    }

    fn from_valid(cfg: GeneratorConfig) -> Self {
        let mut generator = Self {
            rng: Prng::new(cfg.seed),
            signal: vec![0.0; cfg.dim],
            response: 0.0,
            time: 0,
            segment: 0,
            cfg,
        };
        generator.draw();
        generator
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.cfg
    }

    pub fn stamps(&self) -> &[usize] {
        &self.cfg.stamps
    }

    pub fn regimes(&self) -> &[Regime] {
        &self.cfg.regimes
    }

    pub fn time(&self) -> usize {
        self.time
    }

    /// Regime currently emitting.
    pub fn regime_index(&self) -> usize {
        self.cfg.indexes[self.segment]
    }

    pub fn regime(&self) -> &Regime {
        &self.cfg.regimes[self.regime_index()]
    }

    fn draw(&mut self) {
        let (low, high) = (self.cfg.signal_low, self.cfg.signal_high);
        for x in &mut self.signal {
            *x = self.rng.gen_range_f64(low, high);
        }
        let noise = if self.cfg.noise_std > 0.0 {
            self.cfg.noise_std * self.rng.next_gaussian()
        } else {
            0.0
        };
        self.response = self.regime().mean_response(&self.signal) + noise;
    }
}

impl DataSource for RegimeGenerator {
    fn dim(&self) -> usize {
        self.cfg.dim
    }

    fn signal(&self) -> &[f64] {
        &self.signal
    }

    fn response(&self) -> f64 {
        self.response
    }

    fn advance(&mut self) {
        self.time += 1;
        if self.cfg.stamps.get(self.segment) == Some(&self.time) {
            self.segment += 1;
        }
        self.draw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GeneratorConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let base = GeneratorConfig::default();

        let mut c = base.clone();
        c.regimes.clear();
        assert_eq!(c.validate(), Err(ConfigError::NoRegimes));

        let mut c = base.clone();
        c.dim = 2;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::RegimeDimension { regime: 0, .. })
        ));

        let mut c = base.clone();
        c.stamps = vec![10, 10];
        c.indexes = vec![0, 0, 0];
        assert_eq!(c.validate(), Err(ConfigError::UnorderedStamps));

        let mut c = base.clone();
        c.stamps = vec![10];
        assert!(matches!(c.validate(), Err(ConfigError::SegmentCount { .. })));

        let mut c = base.clone();
        c.indexes = vec![3];
        assert!(matches!(c.validate(), Err(ConfigError::UnknownRegime { .. })));

        let mut c = base.clone();
        c.signal_high = c.signal_low;
        assert_eq!(c.validate(), Err(ConfigError::SignalRange));

        let mut c = base;
        c.noise_std = -1.0;
        assert_eq!(c.validate(), Err(ConfigError::NoiseLevel));
    }

    #[test]
    fn noise_free_response_follows_regime() {
        let mut generator = RegimeGenerator::new(GeneratorConfig {
            noise_std: 0.0,
            ..GeneratorConfig::default()
        })
        .unwrap();
        for _ in 0..50 {
            let x = generator.signal()[0];
            assert!((-10.0..10.0).contains(&x));
            assert_eq!(generator.response(), 2.0 * x);
            generator.advance();
        }
    }

    #[test]
    fn regimes_switch_at_stamps() {
        let mut generator = RegimeGenerator::demo(3);
        let mut seen = Vec::new();
        for t in 0..350 {
            assert_eq!(generator.time(), t);
            seen.push(generator.regime_index());
            generator.advance();
        }
        assert_eq!(seen[99], 0);
        assert_eq!(seen[100], 1);
        assert_eq!(seen[199], 1);
        assert_eq!(seen[200], 2);
        assert_eq!(seen[300], 0);
        assert_eq!(seen[349], 0);
    }

    #[test]
    fn same_seed_same_data() {
        let mut a = RegimeGenerator::demo(5);
        let mut b = RegimeGenerator::demo(5);
        for _ in 0..100 {
            assert_eq!(a.signal(), b.signal());
            assert_eq!(a.response().to_bits(), b.response().to_bits());
            a.advance();
            b.advance();
        }
    }

    #[test]
    fn segments_are_truncated_to_horizon() {
        let cfg = RegimeGenerator::demo(1).config().clone();
        assert_eq!(
            cfg.segments(400),
            vec![(0, 100, 0), (100, 200, 1), (200, 300, 2), (300, 400, 0)]
        );
        assert_eq!(cfg.segments(150), vec![(0, 100, 0), (100, 150, 1)]);
    }
}
