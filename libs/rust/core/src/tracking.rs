//! Experiment tracking and model registry.
//!
//! Runs belong to named experiments and collect metrics, params and model
//! artifacts. Registered models hold auto-numbered versions pointing back at
//! a run artifact, each carrying a stage label. [`SledTracking`] keeps all of
//! it in one sled database.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifacts;
use crate::error::{Result, WineError};
use crate::model::LinearRegression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    None,
    Staging,
    Production,
    Archived,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::None => "None",
            Stage::Staging => "Staging",
            Stage::Production => "Production",
            Stage::Archived => "Archived",
        };
        f.write_str(s)
    }
}

impl FromStr for Stage {
    type Err = WineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Stage::None),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            "archived" => Ok(Stage::Archived),
            _ => Err(WineError::InvalidModelUri(format!("unknown stage `{s}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub metrics: BTreeMap<String, f64>,
    pub params: BTreeMap<String, String>,
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub source: String,
    pub run_id: String,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegisteredModel {
    name: String,
    versions: Vec<ModelVersion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Version(u32),
    Stage(Stage),
    Latest,
}

/// `runs:/<run_id>/<artifact_path>` or `models:/<name>/<version|stage|latest>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelUri {
    Run { run_id: String, path: String },
    Registry { name: String, selector: VersionSelector },
}

impl FromStr for ModelUri {
    type Err = WineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || WineError::InvalidModelUri(s.to_string());
        if let Some(rest) = s.strip_prefix("runs:/") {
            let (run_id, path) = rest.split_once('/').ok_or_else(invalid)?;
            if run_id.is_empty() || path.is_empty() {
                return Err(invalid());
            }
            return Ok(ModelUri::Run { run_id: run_id.into(), path: path.into() });
        }
        if let Some(rest) = s.strip_prefix("models:/") {
            let (name, sel) = rest.rsplit_once('/').ok_or_else(invalid)?;
            if name.is_empty() {
                return Err(invalid());
            }
            let selector = if sel.eq_ignore_ascii_case("latest") {
                VersionSelector::Latest
            } else if let Ok(v) = sel.parse::<u32>() {
                VersionSelector::Version(v)
            } else {
                VersionSelector::Stage(sel.parse().map_err(|_| invalid())?)
            };
            return Ok(ModelUri::Registry { name: name.into(), selector });
        }
        Err(invalid())
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelUri::Run { run_id, path } => write!(f, "runs:/{run_id}/{path}"),
            ModelUri::Registry { name, selector } => match selector {
                VersionSelector::Version(v) => write!(f, "models:/{name}/{v}"),
                VersionSelector::Stage(s) => write!(f, "models:/{name}/{s}"),
                VersionSelector::Latest => write!(f, "models:/{name}/latest"),
            },
        }
    }
}

pub trait TrackingClient: Send + Sync {
    /// Returns the named experiment, creating it on first use.
    fn set_experiment(&self, name: &str) -> Result<Experiment>;
    fn start_run(&self, experiment_id: &str) -> Result<RunInfo>;
    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<RunInfo>;
    fn get_run(&self, run_id: &str) -> Result<RunInfo>;
    fn log_metrics(&self, run_id: &str, metrics: &[(&str, f64)]) -> Result<()>;
    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()>;
    /// Stores the model under the run and returns its `runs:/` uri.
    fn log_model(&self, run_id: &str, artifact_path: &str, model: &LinearRegression) -> Result<String>;
    /// Runs of the named experiments, newest `start_time` first, ties by run id.
    /// Unknown names contribute nothing.
    fn search_runs(&self, experiment_names: &[&str]) -> Result<Vec<RunInfo>>;
    /// Registers a `runs:/` artifact as a new version of `name`, in stage `None`.
    fn register_model(&self, model_uri: &str, name: &str) -> Result<ModelVersion>;
    /// Moves a version to `stage`. With `archive_existing_versions`, other
    /// versions already in that stage are archived; otherwise they keep it.
    fn transition_model_version_stage(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion>;
    fn model_versions(&self, name: &str) -> Result<Vec<ModelVersion>>;
    /// Resolves a `runs:/` or `models:/` uri and loads the model behind it.
    /// A stage selector picks the highest version in that stage.
    fn load_model(&self, model_uri: &str) -> Result<LinearRegression>;
}

pub struct SledTracking {
    db: sled::Db,
    experiments: sled::Tree,
    runs: sled::Tree,
    artifacts: sled::Tree,
    registry: sled::Tree,
    // read-modify-write of runs and registry entries
    write_lock: Mutex<()>,
}

impl SledTracking {
    pub fn open(dir: &Path) -> Result<Self> {
        info!(dir = %dir.display(), "opening tracking store");
        Self::from_db(sled::open(dir)?)
    }

    /// In-memory store discarded on drop.
    pub fn temporary() -> Result<Self> { Self::from_db(sled::Config::new().temporary(true).open()?) }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            experiments: db.open_tree("experiments")?,
            runs: db.open_tree("runs")?,
            artifacts: db.open_tree("artifacts")?,
            registry: db.open_tree("registry")?,
            db,
            write_lock: Mutex::new(()),
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> { get_json(&self.experiments, name) }

    fn update_run(&self, run_id: &str, apply: impl FnOnce(&mut RunInfo)) -> Result<RunInfo> {
        let _guard = self.write_lock.lock();
        let mut run = self.get_run(run_id)?;
        apply(&mut run);
        put_json(&self.runs, run_id, &run)?;
        Ok(run)
    }

    fn registered(&self, name: &str) -> Result<RegisteredModel> {
        get_json(&self.registry, name)?.ok_or_else(|| WineError::RegisteredModelNotFound(name.to_string()))
    }

    fn resolve_version(&self, name: &str, selector: VersionSelector) -> Result<ModelVersion> {
        let model = self.registered(name)?;
        let found = match selector {
            VersionSelector::Version(v) => model.versions.iter().find(|mv| mv.version == v),
            VersionSelector::Stage(stage) => model.versions.iter().filter(|mv| mv.stage == stage).max_by_key(|mv| mv.version),
            VersionSelector::Latest => model.versions.iter().max_by_key(|mv| mv.version),
        };
        found.cloned().ok_or_else(|| match selector {
            VersionSelector::Version(version) => WineError::ModelVersionNotFound { name: name.to_string(), version },
            VersionSelector::Stage(stage) => WineError::NoVersionInStage { name: name.to_string(), stage: stage.to_string() },
            VersionSelector::Latest => WineError::RegisteredModelNotFound(name.to_string()),
        })
    }
}

fn artifact_key(run_id: &str, path: &str) -> String { format!("{run_id}/{path}") }

fn put_json<T: Serialize>(tree: &sled::Tree, key: &str, value: &T) -> Result<()> {
    tree.insert(key.as_bytes(), serde_json::to_vec(value)?)?;
    Ok(())
}

fn get_json<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> Result<Option<T>> {
    match tree.get(key.as_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

impl TrackingClient for SledTracking {
    fn set_experiment(&self, name: &str) -> Result<Experiment> {
        let _guard = self.write_lock.lock();
        if let Some(existing) = self.experiment_by_name(name)? {
            return Ok(existing);
        }
        let experiment = Experiment { experiment_id: self.db.generate_id()?.to_string(), name: name.to_string(), created_at: Utc::now() };
        put_json(&self.experiments, name, &experiment)?;
        info!(experiment = name, id = %experiment.experiment_id, "created experiment");
        Ok(experiment)
    }

    fn start_run(&self, experiment_id: &str) -> Result<RunInfo> {
        let run = RunInfo {
            run_id: Uuid::new_v4().simple().to_string(),
            experiment_id: experiment_id.to_string(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            metrics: BTreeMap::new(),
            params: BTreeMap::new(),
            artifacts: Vec::new(),
        };
        put_json(&self.runs, &run.run_id, &run)?;
        info!(run_id = %run.run_id, experiment_id, "run started");
        Ok(run)
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> Result<RunInfo> {
        let run = self.update_run(run_id, |run| {
            run.status = status;
            run.end_time = Some(Utc::now());
        })?;
        self.flush()?;
        info!(run_id, ?status, "run ended");
        Ok(run)
    }

    fn get_run(&self, run_id: &str) -> Result<RunInfo> {
        get_json(&self.runs, run_id)?.ok_or_else(|| WineError::RunNotFound(run_id.to_string()))
    }

    fn log_metrics(&self, run_id: &str, metrics: &[(&str, f64)]) -> Result<()> {
        self.update_run(run_id, |run| {
            for (key, value) in metrics {
                run.metrics.insert(key.to_string(), *value);
            }
        })?;
        debug!(run_id, count = metrics.len(), "metrics logged");
        Ok(())
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.update_run(run_id, |run| {
            run.params.insert(key.to_string(), value.to_string());
        })?;
        Ok(())
    }

    fn log_model(&self, run_id: &str, artifact_path: &str, model: &LinearRegression) -> Result<String> {
        self.get_run(run_id)?;
        self.artifacts.insert(artifact_key(run_id, artifact_path).as_bytes(), artifacts::to_bytes(model)?)?;
        self.update_run(run_id, |run| {
            if !run.artifacts.iter().any(|a| a == artifact_path) {
                run.artifacts.push(artifact_path.to_string());
            }
        })?;
        let uri = ModelUri::Run { run_id: run_id.into(), path: artifact_path.into() }.to_string();
        info!(%uri, "model logged");
        Ok(uri)
    }

    fn search_runs(&self, experiment_names: &[&str]) -> Result<Vec<RunInfo>> {
        let mut ids = Vec::new();
        for name in experiment_names {
            if let Some(exp) = self.experiment_by_name(name)? {
                ids.push(exp.experiment_id);
            }
        }
        let mut runs = Vec::new();
        for entry in self.runs.iter() {
            let (_, bytes) = entry?;
            let run: RunInfo = serde_json::from_slice(&bytes)?;
            if ids.contains(&run.experiment_id) {
                runs.push(run);
            }
        }
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }

    fn register_model(&self, model_uri: &str, name: &str) -> Result<ModelVersion> {
        let (run_id, path) = match model_uri.parse::<ModelUri>()? {
            ModelUri::Run { run_id, path } => (run_id, path),
            ModelUri::Registry { .. } => return Err(WineError::InvalidModelUri(model_uri.to_string())),
        };
        self.get_run(&run_id)?;
        if !self.artifacts.contains_key(artifact_key(&run_id, &path).as_bytes())? {
            return Err(WineError::ArtifactNotFound(PathBuf::from(model_uri)));
        }

        let _guard = self.write_lock.lock();
        let mut model: RegisteredModel = get_json(&self.registry, name)?.unwrap_or_else(|| RegisteredModel { name: name.to_string(), versions: Vec::new() });
        let now = Utc::now();
        let version = ModelVersion {
            name: name.to_string(),
            version: model.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1,
            source: model_uri.to_string(),
            run_id,
            stage: Stage::None,
            created_at: now,
            last_updated: now,
        };
        model.versions.push(version.clone());
        put_json(&self.registry, name, &model)?;
        self.db.flush()?;
        info!(model = name, version = version.version, source = %version.source, "registered model version");
        Ok(version)
    }

    fn transition_model_version_stage(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion> {
        let _guard = self.write_lock.lock();
        let mut model = self.registered(name)?;
        if !model.versions.iter().any(|v| v.version == version) {
            return Err(WineError::ModelVersionNotFound { name: name.to_string(), version });
        }
        let now = Utc::now();
        let archive = archive_existing_versions && matches!(stage, Stage::Staging | Stage::Production);
        let mut updated = None;
        for mv in model.versions.iter_mut() {
            if mv.version == version {
                mv.stage = stage;
                mv.last_updated = now;
                updated = Some(mv.clone());
            } else if archive && mv.stage == stage {
                mv.stage = Stage::Archived;
                mv.last_updated = now;
                debug!(model = name, version = mv.version, "archived previous version");
            }
        }
        put_json(&self.registry, name, &model)?;
        self.db.flush()?;
        info!(model = name, version, %stage, "transitioned model version");
        updated.ok_or_else(|| WineError::ModelVersionNotFound { name: name.to_string(), version })
    }

    fn model_versions(&self, name: &str) -> Result<Vec<ModelVersion>> { Ok(self.registered(name)?.versions) }

    fn load_model(&self, model_uri: &str) -> Result<LinearRegression> {
        match model_uri.parse::<ModelUri>()? {
            ModelUri::Run { run_id, path } => {
                let bytes = self
                    .artifacts
                    .get(artifact_key(&run_id, &path).as_bytes())?
                    .ok_or_else(|| WineError::ArtifactNotFound(PathBuf::from(model_uri)))?;
                artifacts::from_bytes(&bytes)
            }
            ModelUri::Registry { name, selector } => {
                let mv = self.resolve_version(&name, selector)?;
                debug!(model = %name, version = mv.version, source = %mv.source, "resolved registry uri");
                self.load_model(&mv.source)
            }
        }
    }
}
