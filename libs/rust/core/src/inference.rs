//! Raw records to quality scores using fitted artifacts.

use std::path::Path;

use tracing::info;

use crate::artifacts::load_artifact;
use crate::error::Result;
use crate::model::LinearRegression;
use crate::preprocessing::preprocess_records;
use crate::record::WineRecord;
use crate::scaler::StandardScaler;

/// A fitted scaler and model loaded together.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictor {
    pub scaler: StandardScaler,
    pub model: LinearRegression,
}

impl Predictor {
    pub fn new(scaler: StandardScaler, model: LinearRegression) -> Self { Self { scaler, model } }

    pub fn load(scaler_path: &Path, model_path: &Path) -> Result<Self> {
        Ok(Self { scaler: load_artifact(scaler_path)?, model: load_artifact(model_path)? })
    }

    pub fn predict(&self, records: &[WineRecord]) -> Result<Vec<f64>> { run_inference(records, &self.scaler, &self.model) }
}

/// Preprocess, scale and predict, one score per record in input order.
pub fn run_inference(records: &[WineRecord], scaler: &StandardScaler, model: &LinearRegression) -> Result<Vec<f64>> {
    info!(count = records.len(), input = ?records, "running inference");
    let features = preprocess_records(records)?;
    let scaled = scaler.transform(&features)?;
    let predictions = model.predict(&scaled)?;
    info!(?predictions, "inference done");
    Ok(predictions)
}
