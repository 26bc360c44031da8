//! Error type shared by every wine-core component.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = WineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum WineError {
    #[error("missing column `{0}`")]
    MissingColumn(String),
    #[error("column `{0}` is not numeric")]
    NonNumericColumn(String),
    #[error("column `{name}` has {got} rows, frame has {expected}")]
    LengthMismatch { name: String, expected: usize, got: usize },
    #[error("dataset is empty")]
    EmptyDataset,
    #[error("invalid split: {0}")]
    InvalidSplit(String),
    #[error("expected {expected} features, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("features or target contain non-finite values")]
    NonFiniteInput,
    #[error("least squares solve failed: {0}")]
    LeastSquares(String),

    #[error("no runs found for experiment `{0}`")]
    NoRuns(String),
    #[error("run `{0}` not found")]
    RunNotFound(String),
    #[error("registered model `{0}` not found")]
    RegisteredModelNotFound(String),
    #[error("registered model `{name}` has no version {version}")]
    ModelVersionNotFound { name: String, version: u32 },
    #[error("registered model `{name}` has no version in stage {stage}")]
    NoVersionInStage { name: String, stage: String },
    #[error("invalid model uri `{0}`")]
    InvalidModelUri(String),

    #[error("artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),
    #[error("artifact is a {got}, expected a {expected}")]
    ArtifactKindMismatch { expected: String, got: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("artifact encoding: {0}")]
    Encode(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("tracking storage: {0}")]
    Storage(#[from] sled::Error),
}
