use crate::error::{FixShareError, Result};

/// Observed signals and responses, indexed by time step.
///
/// Storage is pre-allocated for the whole horizon `[0, horizon)`; signals are kept
/// row-major in one flat vector so training windows are contiguous slices.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    dim: usize,
    horizon: usize,
    signals: Vec<f64>,
    responses: Vec<f64>,
    // One past the latest step that received anything.
    recorded: usize,
}

/// A contiguous training window `[start, end)` borrowed from the buffer.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub start: usize,
    pub dim: usize,
    pub features: &'a [f64],
    pub responses: &'a [f64],
}

impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [f64]> + 'a {
        self.features.chunks_exact(self.dim)
    }
}

impl SignalBuffer {
    pub fn new(dim: usize, horizon: usize) -> Self {
        Self {
            dim,
            horizon,
            signals: vec![0.0; dim * horizon],
            responses: vec![0.0; horizon],
            recorded: 0,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// One past the latest step that has been written.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    fn check_time(&self, t: usize) -> Result<()> {
        if t >= self.horizon {
            return Err(FixShareError::IndexOutOfHorizon {
                t,
                horizon: self.horizon,
            });
        }
        Ok(())
    }

    pub fn record(&mut self, t: usize, signal: &[f64], response: f64) -> Result<()> {
        self.record_signal(t, signal)?;
        self.record_response(t, response)
    }

    pub fn record_signal(&mut self, t: usize, signal: &[f64]) -> Result<()> {
        self.check_time(t)?;
        if signal.len() != self.dim {
            return Err(FixShareError::DimensionMismatch {
                expected: self.dim,
                got: signal.len(),
            });
        }
        let row = t * self.dim;
        self.signals[row..row + self.dim].copy_from_slice(signal);
        self.recorded = self.recorded.max(t + 1);
        Ok(())
    }

    pub fn record_response(&mut self, t: usize, response: f64) -> Result<()> {
        self.check_time(t)?;
        self.responses[t] = response;
        self.recorded = self.recorded.max(t + 1);
        Ok(())
    }

    pub fn signal(&self, t: usize) -> Result<&[f64]> {
        self.check_time(t)?;
        let row = t * self.dim;
        Ok(&self.signals[row..row + self.dim])
    }

    pub fn response(&self, t: usize) -> Result<f64> {
        self.check_time(t)?;
        Ok(self.responses[t])
    }

    /// Rows `[start, end)`. `end` may equal the horizon.
    pub fn window(&self, start: usize, end: usize) -> Result<Window<'_>> {
        if end > self.horizon || start > end {
            return Err(FixShareError::IndexOutOfHorizon {
                t: end.max(start),
                horizon: self.horizon,
            });
        }
        Ok(Window {
            start,
            dim: self.dim,
            features: &self.signals[start * self.dim..end * self.dim],
            responses: &self.responses[start..end],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_window_roundtrip() {
        let mut buf = SignalBuffer::new(2, 5);
        for t in 0..5 {
            let x = t as f64;
            buf.record(t, &[x, -x], 10.0 * x).unwrap();
        }

        let w = buf.window(1, 4).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.responses, &[10.0, 20.0, 30.0]);
        let rows: Vec<&[f64]> = w.rows().collect();
        assert_eq!(rows[0], &[1.0, -1.0]);
        assert_eq!(rows[2], &[3.0, -3.0]);
        assert_eq!(buf.recorded(), 5);
    }

    #[test]
    fn record_outside_horizon_fails() {
        let mut buf = SignalBuffer::new(1, 3);
        let err = buf.record(3, &[1.0], 1.0).unwrap_err();
        assert!(matches!(
            err,
            FixShareError::IndexOutOfHorizon { t: 3, horizon: 3 }
        ));
    }

    #[test]
    fn wrong_signal_length_fails() {
        let mut buf = SignalBuffer::new(3, 4);
        let err = buf.record_signal(0, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            FixShareError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn empty_window_is_valid() {
        let buf = SignalBuffer::new(1, 4);
        let w = buf.window(2, 2).unwrap();
        assert!(w.is_empty());
        assert_eq!(w.rows().count(), 0);
    }

    #[test]
    fn inverted_or_oversized_window_fails() {
        let buf = SignalBuffer::new(1, 4);
        assert!(buf.window(3, 2).is_err());
        assert!(buf.window(0, 5).is_err());
        assert!(buf.window(0, 4).is_ok());
    }

    #[test]
    fn halves_can_be_recorded_separately() {
        let mut buf = SignalBuffer::new(1, 2);
        buf.record_signal(1, &[4.0]).unwrap();
        assert_eq!(buf.signal(1).unwrap(), &[4.0]);
        assert_eq!(buf.response(1).unwrap(), 0.0);
        buf.record_response(1, 8.0).unwrap();
        assert_eq!(buf.response(1).unwrap(), 8.0);
    }
}
