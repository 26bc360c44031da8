use ndarray::{Array2, ArrayView1};

use crate::error::{Result, WineError};
use crate::frame::Frame;

/// Named numeric feature matrix, one row per observation.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.ncols() != columns.len() {
            return Err(WineError::ShapeMismatch { expected: columns.len(), got: values.ncols() });
        }
        Ok(Self { columns, values })
    }

    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Self::new(frame.names().to_vec(), frame.to_matrix()?)
    }

    pub fn columns(&self) -> &[String] { &self.columns }
    pub fn values(&self) -> &Array2<f64> { &self.values }
    pub fn n_rows(&self) -> usize { self.values.nrows() }
    pub fn n_features(&self) -> usize { self.values.ncols() }
    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> { self.values.row(idx) }
}
