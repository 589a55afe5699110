//! # fixshare
//!
//! Online forecasting with a growing pool of experts.
//!
//! Every `period` steps a new least-squares expert is trained on the most
//! recent window of observations and frozen. The master forecast combines the
//! experts through the substitution function of the aggregating algorithm over
//! the prediction interval `[a, b]`. Weights go through an exponential loss
//! update and then a fixed-share mixing step toward a rank prior, so later
//! experts can take over after the data changes regime.
//!
//! ## Quick Start
//!
//! ```
//! use fixshare::prelude::*;
//!
//! let cfg = AggregatorConfig::default().with_horizon(120).with_period(40);
//! let mut agg = Aggregator::new(cfg, RegimeGenerator::demo(42))?;
//! let history = agg.run()?;
//!
//! let summary = history.regret_over(80..120);
//! println!("master loss {:.2}, regret {:?}", summary.master_loss, summary.regret);
//! # Ok::<(), fixshare::FixShareError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Serialize configs and histories, enables [`storage`]
//! - `parallel`: Score experts in parallel via rayon
//!
//! ## Modules
//!
//! - [`aggregator`]: The driver loop and its configuration
//! - [`weights`]: Rank prior and the weight vector
//! - [`update`]: Loss update and fixed-share mixing
//! - [`combiner`]: Substitution-function master prediction
//! - [`pool`]: Expert spawning and prediction
//! - [`history`]: Per-step archive, regret and oracle comparisons
//! - [`generator`]: Regime-switching synthetic data
//! - [`observer`]: Read-only observation adapters

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/buffer.rs"]
pub mod buffer;

#[path = "core/regression.rs"]
pub mod regression;

#[path = "core/weights.rs"]
pub mod weights;

#[path = "core/combiner.rs"]
pub mod combiner;

#[path = "core/update.rs"]
pub mod update;

#[path = "core/source.rs"]
pub mod source;

#[path = "core/pool.rs"]
pub mod pool;

#[path = "core/history.rs"]
pub mod history;

#[path = "core/aggregator.rs"]
pub mod aggregator;

#[cfg(feature = "serde")]
#[path = "core/storage.rs"]
pub mod storage;

#[path = "experiments/generator.rs"]
pub mod generator;

pub mod observer;

pub use error::{ConfigError, FixShareError, Result};

/// Prelude module for convenient imports.
///
/// ```
/// use fixshare::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aggregator::{Aggregator, AggregatorConfig};
    pub use crate::error::{ConfigError, FixShareError, Result};
    pub use crate::generator::{GeneratorConfig, Regime, RegimeGenerator};
    pub use crate::history::{cumulative, History, RegretSummary, StepRecord};
    pub use crate::observer::{AggregatorAdapter, AggregatorSnapshot};
    pub use crate::regression::{LinearModel, OrdinaryLeastSquares, Predictor, Regressor};
    pub use crate::source::{DataSource, ReplaySource};
    pub use crate::weights::{rank_weight, WeightVector};
}
