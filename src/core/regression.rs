//! Per-expert regression primitive.
//!
//! Experts never learn online: each one is fitted exactly once on a training
//! window and then only queried. Anything implementing [`Regressor`] can back the
//! pool; [`OrdinaryLeastSquares`] is the default.

use nalgebra::{DMatrix, DVector};

use crate::buffer::Window;
use crate::error::{FixShareError, Result};

/// A trained, immutable predictor.
pub trait Predictor: Send + Sync {
    fn predict(&self, signal: &[f64]) -> f64;
}

/// Fits a [`Predictor`] on a window of observations.
pub trait Regressor {
    type Model: Predictor;

    fn fit(&self, window: &Window<'_>) -> Result<Self::Model>;
}

/// `y = intercept + coefficients . x`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl Predictor for LinearModel {
    #[inline]
    fn predict(&self, signal: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(signal)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

/// Least squares via SVD.
///
/// Rank-deficient windows (fewer rows than features, collinear columns) yield the
/// minimum-norm solution instead of an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrdinaryLeastSquares {
    pub fit_intercept: bool,
}

impl Default for OrdinaryLeastSquares {
    fn default() -> Self {
        Self {
            fit_intercept: true,
        }
    }
}

impl OrdinaryLeastSquares {
    const SVD_MAX_ITERATIONS: usize = 10_000;

    pub fn without_intercept() -> Self {
        Self {
            fit_intercept: false,
        }
    }
}

impl Regressor for OrdinaryLeastSquares {
    type Model = LinearModel;

    fn fit(&self, window: &Window<'_>) -> Result<LinearModel> {
        let n = window.len();
        let d = window.dim;
        if n == 0 {
            return Err(FixShareError::Regression("empty training window".into()));
        }

        // Centering absorbs the intercept.
        let mut x_mean = vec![0.0; d];
        let mut y_mean = 0.0;
        if self.fit_intercept {
            for row in window.rows() {
                for (m, x) in x_mean.iter_mut().zip(row) {
                    *m += x;
                }
            }
            for m in &mut x_mean {
                *m /= n as f64;
            }
            y_mean = window.responses.iter().sum::<f64>() / n as f64;
        }

        let x = DMatrix::from_fn(n, d, |i, j| window.features[i * d + j] - x_mean[j]);
        let y = DVector::from_fn(n, |i, _| window.responses[i] - y_mean);

        let svd = x
            .try_svd(true, true, f64::EPSILON, Self::SVD_MAX_ITERATIONS)
            .ok_or_else(|| FixShareError::Regression("svd did not converge".into()))?;

        // Singular values below machine precision, scaled by the larger dimension, count as zero.
        let cutoff = svd.singular_values.max() * n.max(d) as f64 * f64::EPSILON;
        let beta = svd
            .solve(&y, cutoff)
            .map_err(|e| FixShareError::Regression(e.to_string()))?;

        let coefficients: Vec<f64> = beta.iter().copied().collect();
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(c, m)| c * m)
                .sum::<f64>();

        Ok(LinearModel {
            coefficients,
            intercept,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SignalBuffer;

    fn buffer_from(rows: &[(&[f64], f64)]) -> SignalBuffer {
        let dim = rows[0].0.len();
        let mut buf = SignalBuffer::new(dim, rows.len());
        for (t, (x, y)) in rows.iter().enumerate() {
            buf.record(t, x, *y).unwrap();
        }
        buf
    }

    #[test]
    fn recovers_exact_line() {
        let rows: Vec<(Vec<f64>, f64)> = (0..10)
            .map(|i| {
                let x = i as f64 - 4.0;
                (vec![x], 3.0 * x + 1.0)
            })
            .collect();
        let borrowed: Vec<(&[f64], f64)> = rows.iter().map(|(x, y)| (x.as_slice(), *y)).collect();
        let buf = buffer_from(&borrowed);

        let model = OrdinaryLeastSquares::default()
            .fit(&buf.window(0, 10).unwrap())
            .unwrap();

        assert!((model.coefficients[0] - 3.0).abs() < 1e-9);
        assert!((model.intercept - 1.0).abs() < 1e-9);
        assert!((model.predict(&[100.0]) - 301.0).abs() < 1e-6);
    }

    #[test]
    fn recovers_plane() {
        let mut buf = SignalBuffer::new(2, 12);
        for t in 0..12 {
            let x1 = (t % 4) as f64;
            let x2 = (t / 4) as f64 * 1.5 - 0.5 * (t % 3) as f64;
            buf.record(t, &[x1, x2], 2.0 * x1 - 0.5 * x2 + 4.0).unwrap();
        }
        let model = OrdinaryLeastSquares::default()
            .fit(&buf.window(0, 12).unwrap())
            .unwrap();

        assert!((model.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-9);
        assert!((model.intercept - 4.0).abs() < 1e-9);
    }

    #[test]
    fn single_row_predicts_its_response() {
        let buf = buffer_from(&[(&[2.0], 7.0)]);
        let model = OrdinaryLeastSquares::default()
            .fit(&buf.window(0, 1).unwrap())
            .unwrap();

        // Min-norm solution: no slope, intercept is the only response.
        assert_eq!(model.coefficients, vec![0.0]);
        assert!((model.predict(&[-5.0]) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn without_intercept_passes_through_origin() {
        let buf = buffer_from(&[(&[1.0], 2.0), (&[2.0], 4.0), (&[3.0], 6.0)]);
        let model = OrdinaryLeastSquares::without_intercept()
            .fit(&buf.window(0, 3).unwrap())
            .unwrap();

        assert_eq!(model.intercept, 0.0);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_window_is_an_error() {
        let buf = SignalBuffer::new(1, 4);
        let err = OrdinaryLeastSquares::default()
            .fit(&buf.window(1, 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, FixShareError::Regression(_)));
    }
}
