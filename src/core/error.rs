use thiserror::Error;

/// Rejected configuration, reported before any step executes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("total_time must be >= 1")]
    ZeroHorizon,
    #[error("period must be >= 1")]
    ZeroPeriod,
    #[error("train_window must be >= 1")]
    ZeroTrainWindow,
    #[error("prediction bounds must be finite (a={a}, b={b})")]
    NonFiniteBounds { a: f64, b: f64 },
    #[error("prediction bounds must satisfy a < b (a={a}, b={b})")]
    EmptyInterval { a: f64, b: f64 },
    #[error("signal dimension must be >= 1")]
    ZeroDimension,
    #[error("source declares {declared} features but emits signals of length {emitted}")]
    SourceDimension { declared: usize, emitted: usize },

    #[error("generator needs at least one regime")]
    NoRegimes,
    #[error("regime {regime} has {got} coefficients, expected {expected}")]
    RegimeDimension {
        regime: usize,
        expected: usize,
        got: usize,
    },
    #[error("switch stamps must be strictly increasing and > 0")]
    UnorderedStamps,
    #[error("expected {expected} regime indexes (one per segment), got {got}")]
    SegmentCount { expected: usize, got: usize },
    #[error("regime index {index} out of range ({regimes} regimes)")]
    UnknownRegime { index: usize, regimes: usize },
    #[error("signal range must be finite with low < high")]
    SignalRange,
    #[error("noise_std must be finite and >= 0")]
    NoiseLevel,
}

#[derive(Debug, Error)]
pub enum FixShareError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("time step {t} is outside the horizon [0, {horizon})")]
    IndexOutOfHorizon { t: usize, horizon: usize },

    #[error("signal has {got} features, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Reserved mass reached zero or below. Always a bookkeeping bug.
    #[error("weight invariant broken: reserved mass {reserved_mass} is not positive")]
    InvariantViolation { reserved_mass: f64 },

    #[error("expert fit failed: {0}")]
    Regression(String),

    #[error("run already finished (horizon {horizon})")]
    Finished { horizon: usize },

    /// An earlier step failed at `t`; the run cannot continue.
    #[error("run halted by a failed step at t={t}")]
    Halted { t: usize },

    #[error("archive: {0}")]
    Archive(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, FixShareError>;
