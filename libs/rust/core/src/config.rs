//! Layered application configuration: defaults, optional file, environment.
//!
//! The file is named by `WINE_CONFIG_FILE`; environment keys use the `WINE`
//! prefix and `__` as separator, e.g. `WINE__SERVING__PORT=9000`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONFIG_FILE_ENV: &str = "WINE_CONFIG_FILE";
pub const ENV_PREFIX: &str = "WINE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    pub title: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub raw_data_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub test_size: f64,
    pub random_state: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub dir: PathBuf,
    pub experiment_name: String,
    pub model_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingConfig {
    pub host: String,
    pub port: u16,
    pub model_version: String,
    /// Keep loaded artifacts between requests until `/reload`.
    pub cache_artifacts: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppInfo,
    pub paths: PathsConfig,
    pub training: TrainingConfig,
    pub tracking: TrackingConfig,
    pub serving: ServingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppInfo {
                title: "WineQualityPredictionApp".into(),
                description: "A simple API to predict wine quality scores (1-10) based on physicochemical properties of the wine.".into(),
                version: "0.0.1".into(),
            },
            paths: PathsConfig { data_dir: "data".into(), model_dir: "models".into(), raw_data_file: "winequalityN.csv".into() },
            training: TrainingConfig { test_size: 0.2, random_state: 42 },
            tracking: TrackingConfig {
                dir: "mlruns".into(),
                experiment_name: "wine-quality-prediction".into(),
                model_name: "wine_quality_predictor".into(),
            },
            serving: ServingConfig { host: "0.0.0.0".into(), port: 8000, model_version: "0.0.1".into(), cache_artifacts: false },
        }
    }
}

impl AppConfig {
    /// Loads defaults, then the file named by `WINE_CONFIG_FILE` if set, then `WINE__*` variables.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default()).context("encoding default config")?);
        if let Some(file) = file {
            debug!(file = %file.display(), "adding config file source");
            builder = builder.add_source(config::File::from(file).required(true));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true));
        let cfg = builder.build().context("building config")?;
        cfg.try_deserialize().context("deserializing config")
    }

    pub fn raw_data_path(&self) -> PathBuf { self.paths.data_dir.join(&self.paths.raw_data_file) }
    pub fn train_data_path(&self) -> PathBuf { self.paths.data_dir.join("train.csv") }
    pub fn test_data_path(&self) -> PathBuf { self.paths.data_dir.join("test.csv") }

    pub fn scaler_path(&self) -> PathBuf {
        self.paths.model_dir.join(format!("wine_scaler__v{}.bin", self.serving.model_version))
    }

    pub fn model_path(&self) -> PathBuf {
        self.paths.model_dir.join(format!("wine_model__v{}.bin", self.serving.model_version))
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.serving.host, self.serving.port) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn derived_paths_follow_model_version() {
        let mut cfg = AppConfig::default();
        cfg.serving.model_version = "1.2.3".into();
        assert_eq!(cfg.scaler_path(), PathBuf::from("models/wine_scaler__v1.2.3.bin"));
        assert_eq!(cfg.model_path(), PathBuf::from("models/wine_model__v1.2.3.bin"));
        assert_eq!(cfg.raw_data_path(), PathBuf::from("data/winequalityN.csv"));
    }

    #[test]
    fn file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(f, "serving:\n  port: 9100\ntracking:\n  experiment_name: nightly").unwrap();
        let cfg = AppConfig::load_from(Some(f.path())).unwrap();
        assert_eq!(cfg.serving.port, 9100);
        assert_eq!(cfg.tracking.experiment_name, "nightly");
        assert_eq!(cfg.training.random_state, 42);
        assert_eq!(cfg.paths.model_dir, PathBuf::from("models"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load_from(Some(Path::new("/nonexistent/wine.yaml"))).is_err());
    }
}
