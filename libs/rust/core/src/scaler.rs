use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WineError};
use crate::features::FeatureTable;

/// Per-feature standardization, `(x - mean) / std` with population std.
///
/// A feature with zero variance at fit time produces non-finite output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &FeatureTable) -> Result<Self> {
        let values = x.values();
        let mean = values.mean_axis(Axis(0)).ok_or(WineError::EmptyDataset)?;
        let scale = values.std_axis(Axis(0), 0.0);
        Ok(Self { feature_names: x.columns().to_vec(), mean: mean.to_vec(), scale: scale.to_vec() })
    }

    /// Columns are matched by position; names are carried over from the input.
    pub fn transform(&self, x: &FeatureTable) -> Result<FeatureTable> {
        if x.n_features() != self.n_features_in() {
            return Err(WineError::ShapeMismatch { expected: self.n_features_in(), got: x.n_features() });
        }
        let mean = ArrayView1::from(self.mean.as_slice());
        let scale = ArrayView1::from(self.scale.as_slice());
        let scaled = (x.values() - &mean) / &scale;
        FeatureTable::new(x.columns().to_vec(), scaled)
    }

    pub fn fit_transform(x: &FeatureTable) -> Result<(Self, FeatureTable)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }

    pub fn n_features_in(&self) -> usize { self.mean.len() }
    pub fn feature_names(&self) -> &[String] { &self.feature_names }
    pub fn mean(&self) -> &[f64] { &self.mean }
    pub fn scale(&self) -> &[f64] { &self.scale }
}
