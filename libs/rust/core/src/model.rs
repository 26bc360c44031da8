//! Ordinary least squares regression and its evaluation metrics.

use nalgebra::{DMatrix, DVector, SVD};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WineError};
use crate::features::FeatureTable;

const RCOND: f64 = 1e-10;
const MAX_SVD_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub rmse: f64,
    pub r2: f64,
}

impl LinearRegression {
    /// Fits `y ≈ X·β + b` with intercept and no regularization. Collinear
    /// features are allowed; the coefficients are then the minimum-norm solution.
    pub fn fit(x: &FeatureTable, y: &[f64]) -> Result<Self> {
        if x.n_rows() == 0 {
            return Err(WineError::EmptyDataset);
        }
        if y.len() != x.n_rows() {
            return Err(WineError::ShapeMismatch { expected: x.n_rows(), got: y.len() });
        }
        let xv = x.values();
        if xv.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(WineError::NonFiniteInput);
        }
        let y = ArrayView1::from(y);
        let x_mean = xv.mean_axis(Axis(0)).ok_or(WineError::EmptyDataset)?;
        let y_mean = y.mean().ok_or(WineError::EmptyDataset)?;

        // centering removes the intercept from the least-squares problem
        let xc = xv - &x_mean;
        let yc = &y - y_mean;
        let coef = lstsq_min_norm(&xc, &yc)?;
        let intercept = y_mean - x_mean.dot(&coef);

        Ok(Self { feature_names: x.columns().to_vec(), coefficients: coef.to_vec(), intercept })
    }

    pub fn predict(&self, x: &FeatureTable) -> Result<Vec<f64>> {
        if x.n_features() != self.coefficients.len() {
            return Err(WineError::ShapeMismatch { expected: self.coefficients.len(), got: x.n_features() });
        }
        let coef = ArrayView1::from(self.coefficients.as_slice());
        Ok((x.values().dot(&coef) + self.intercept).to_vec())
    }

    pub fn evaluate(&self, x: &FeatureTable, y: &[f64]) -> Result<Metrics> {
        let predictions = self.predict(x)?;
        Ok(Metrics { rmse: mean_squared_error(y, &predictions).sqrt(), r2: r2_score(y, &predictions) })
    }

    pub fn coefficients(&self) -> &[f64] { &self.coefficients }
    pub fn intercept(&self) -> f64 { self.intercept }
    pub fn feature_names(&self) -> &[String] { &self.feature_names }
}

/// Minimum-norm least-squares solution of `a·x ≈ b` from the SVD of `a`.
/// Singular values below `RCOND` times the largest one count as zero, so a
/// rank-deficient design still gets a solution.
fn lstsq_min_norm(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let matrix = DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]]);
    let rhs = DVector::from_iterator(b.len(), b.iter().copied());
    let svd = SVD::try_new(matrix, true, true, f64::EPSILON, MAX_SVD_ITERATIONS)
        .ok_or_else(|| WineError::LeastSquares("svd did not converge".into()))?;
    let cutoff = svd.singular_values.max() * RCOND;
    let solution = svd.solve(&rhs, cutoff).map_err(|e| WineError::LeastSquares(e.to_string()))?;
    Ok(solution.iter().copied().collect())
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return f64::NAN;
    }
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / n as f64
}

/// Coefficient of determination. A constant target scores 1.0 on a perfect fit, else 0.0.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
