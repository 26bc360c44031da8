//! Batch jobs: fit and persist the scaler and model, then promote a logged run.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info};
use wine_core::artifacts::{create_directories, StagedWrite};
use wine_core::dataset::{load_data, target_values, train_test_split, write_csv};
use wine_core::deployment::{ModelDeployment, MODEL_ARTIFACT_PATH};
use wine_core::preprocessing::select_features;
use wine_core::schema::FEATURE_COLUMNS;
use wine_core::{AppConfig, Frame, LinearRegression, Metrics, ModelVersion, RunStatus, StandardScaler, TrackingClient};

const TARGET: &str = "training-pipeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Train,
    Deploy,
    All,
}

impl std::str::FromStr for Job {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Job::Train),
            "deploy" => Ok(Job::Deploy),
            "all" => Ok(Job::All),
            other => anyhow::bail!("unknown job `{other}`, expected train, deploy or all"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub run_id: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train: Metrics,
    pub test: Metrics,
}

struct Fitted {
    scaler: StandardScaler,
    model: LinearRegression,
    train: Metrics,
    test: Metrics,
}

/// Loads, cleans and splits the raw data, fits scaler and model under one
/// tracking run, then writes the artifact files and the split CSVs.
pub fn train_pipeline(cfg: &AppConfig, tracking: &dyn TrackingClient) -> Result<TrainingOutcome> {
    create_directories(&[&cfg.paths.data_dir, &cfg.paths.model_dir]).context("creating data and model directories")?;

    let raw_path = cfg.raw_data_path();
    let data = load_data(&raw_path).with_context(|| format!("loading {}", raw_path.display()))?;
    let (train, test) = train_test_split(&data, cfg.training.test_size, cfg.training.random_state)?;
    info!(target: TARGET, train_rows = train.n_rows(), test_rows = test.n_rows(), seed = cfg.training.random_state, "split data");

    let experiment = tracking.set_experiment(&cfg.tracking.experiment_name)?;
    let run = tracking.start_run(&experiment.experiment_id)?;
    let fitted = match fit_and_log(tracking, &run.run_id, &train, &test) {
        Ok(fitted) => {
            tracking.end_run(&run.run_id, RunStatus::Finished)?;
            fitted
        }
        Err(e) => {
            error!(target: TARGET, run_id = %run.run_id, error = %e, "training run failed");
            tracking.end_run(&run.run_id, RunStatus::Failed)?;
            return Err(e);
        }
    };

    let mut staged = StagedWrite::new();
    staged.stage(&fitted.scaler, &cfg.scaler_path()).context("saving scaler")?;
    staged.stage(&fitted.model, &cfg.model_path()).context("saving model")?;
    staged.commit().context("replacing artifact files")?;
    write_csv(&train, &cfg.train_data_path()).context("writing train split")?;
    write_csv(&test, &cfg.test_data_path()).context("writing test split")?;
    info!(target: TARGET, scaler = %cfg.scaler_path().display(), model = %cfg.model_path().display(), "artifacts saved");

    Ok(TrainingOutcome {
        run_id: run.run_id,
        train_rows: train.n_rows(),
        test_rows: test.n_rows(),
        train: fitted.train,
        test: fitted.test,
    })
}

fn fit_and_log(tracking: &dyn TrackingClient, run_id: &str, train: &Frame, test: &Frame) -> Result<Fitted> {
    let x_train = select_features(train)?;
    let x_test = select_features(test)?;
    let (scaler, x_train) = StandardScaler::fit_transform(&x_train)?;
    let x_test = scaler.transform(&x_test)?;

    let model = LinearRegression::fit(&x_train, &target_values(train)?)?;
    let train_metrics = model.evaluate(&x_train, &target_values(train)?)?;
    let test_metrics = model.evaluate(&x_test, &target_values(test)?)?;
    info!(
        target: TARGET,
        train_rmse = train_metrics.rmse,
        test_rmse = test_metrics.rmse,
        train_r2 = train_metrics.r2,
        test_r2 = test_metrics.r2,
        "model evaluated"
    );

    tracking.log_metrics(
        run_id,
        &[
            ("train_rmse", train_metrics.rmse),
            ("test_rmse", test_metrics.rmse),
            ("train_r2", train_metrics.r2),
            ("test_r2", test_metrics.r2),
        ],
    )?;
    tracking.log_param(run_id, "features", &serde_json::to_string(&FEATURE_COLUMNS)?)?;
    tracking.log_model(run_id, MODEL_ARTIFACT_PATH, &model)?;

    Ok(Fitted { scaler, model, train: train_metrics, test: test_metrics })
}

/// Registers a logged run of the configured experiment and promotes it to
/// `Production`, then checks the promoted model loads.
pub fn deploy_pipeline(cfg: &AppConfig, tracking: &dyn TrackingClient) -> Result<ModelVersion> {
    let deployment = ModelDeployment::new(tracking, cfg.tracking.experiment_name.as_str(), cfg.tracking.model_name.as_str());
    let version = deployment.register_best_model().context("registering model")?;
    let model = deployment.load_production_model().context("loading production model")?;
    info!(
        target: TARGET,
        model = %cfg.tracking.model_name,
        version = version.version,
        n_features = model.coefficients().len(),
        "production model loaded"
    );
    Ok(version)
}
