/// The data-generating process the aggregator is driven by.
///
/// `signal()` and `response()` must be stable until `advance()` is called;
/// `advance()` may switch the underlying regime without notice.
pub trait DataSource {
    /// Feature dimension `D`.
    fn dim(&self) -> usize;

    fn signal(&self) -> &[f64];

    /// Ground truth for the current signal.
    fn response(&self) -> f64;

    fn advance(&mut self);
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn signal(&self) -> &[f64] {
        (**self).signal()
    }

    fn response(&self) -> f64 {
        (**self).response()
    }

    fn advance(&mut self) {
        (**self).advance()
    }
}

/// Replays pre-recorded observations in order.
///
/// Once the recording is exhausted the last observation is repeated.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    dim: usize,
    signals: Vec<f64>,
    responses: Vec<f64>,
    position: usize,
}

impl ReplaySource {
    /// `signals` is row-major with `dim` values per observation.
    ///
    /// # Panics
    /// Panics if `signals` does not hold exactly `dim` values per response, or if
    /// there are no responses.
    pub fn new(dim: usize, signals: Vec<f64>, responses: Vec<f64>) -> Self {
        assert!(!responses.is_empty(), "replay needs at least one observation");
        assert_eq!(
            signals.len(),
            dim * responses.len(),
            "signals must hold dim values per response"
        );
        Self {
            dim,
            signals,
            responses,
            position: 0,
        }
    }

    pub fn from_rows(rows: &[Vec<f64>], responses: Vec<f64>) -> Self {
        let dim = rows.first().map_or(0, |r| r.len());
        let signals = rows.iter().flatten().copied().collect();
        Self::new(dim, signals, responses)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl DataSource for ReplaySource {
    fn dim(&self) -> usize {
        self.dim
    }

    fn signal(&self) -> &[f64] {
        let row = self.position * self.dim;
        &self.signals[row..row + self.dim]
    }

    fn response(&self) -> f64 {
        self.responses[self.position]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.responses.len() {
            self.position += 1;
        }
    }
}
