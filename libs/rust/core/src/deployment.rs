//! Promotion of logged runs to the `Production` stage of the model registry.

use tracing::{info, warn};

use crate::error::{Result, WineError};
use crate::model::LinearRegression;
use crate::tracking::{ModelUri, ModelVersion, Stage, TrackingClient, VersionSelector};

/// Artifact path under which the training pipeline logs its model.
pub const MODEL_ARTIFACT_PATH: &str = "model";

pub struct ModelDeployment<'a> {
    client: &'a dyn TrackingClient,
    experiment_name: String,
    model_name: String,
}

impl<'a> ModelDeployment<'a> {
    pub fn new(client: &'a dyn TrackingClient, experiment_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self { client, experiment_name: experiment_name.into(), model_name: model_name.into() }
    }

    /// Registers the model of the first run the store returns, which is the
    /// most recently started one, and moves it to `Production`. Metrics play no part.
    pub fn register_best_model(&self) -> Result<ModelVersion> {
        let runs = self.client.search_runs(&[self.experiment_name.as_str()])?;
        let run = runs.first().ok_or_else(|| WineError::NoRuns(self.experiment_name.clone()))?;
        if runs.len() > 1 {
            warn!(candidates = runs.len(), chosen = %run.run_id, "runs are not ranked by metrics; promoting the newest");
        }
        let uri = ModelUri::Run { run_id: run.run_id.clone(), path: MODEL_ARTIFACT_PATH.into() }.to_string();
        let version = self.client.register_model(&uri, &self.model_name)?;
        let promoted = self.client.transition_model_version_stage(&self.model_name, version.version, Stage::Production, false)?;
        info!(model = %self.model_name, version = promoted.version, run_id = %promoted.run_id, "model promoted to Production");
        Ok(promoted)
    }

    pub fn load_production_model(&self) -> Result<LinearRegression> {
        let uri = ModelUri::Registry { name: self.model_name.clone(), selector: VersionSelector::Stage(Stage::Production) };
        self.client.load_model(&uri.to_string())
    }
}
