//! Binary persistence for fitted scaler and model objects.
//!
//! Each blob is a bincode header (artifact kind, format version, creation
//! time) followed by the payload, so a file can be loaded without any
//! side metadata and a scaler file cannot be mistaken for a model.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WineError};
use crate::model::LinearRegression;
use crate::scaler::StandardScaler;

const FORMAT_VERSION: u16 = 1;

pub trait Artifact: Serialize + DeserializeOwned {
    const KIND: &'static str;
}

impl Artifact for StandardScaler {
    const KIND: &'static str = "standard_scaler";
}

impl Artifact for LinearRegression {
    const KIND: &'static str = "linear_regression";
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    kind: String,
    format_version: u16,
    created_at: DateTime<Utc>,
}

pub fn write_artifact<T: Artifact, W: Write>(obj: &T, mut writer: W) -> Result<()> {
    let header = Header { kind: T::KIND.to_string(), format_version: FORMAT_VERSION, created_at: Utc::now() };
    bincode::serialize_into(&mut writer, &header)?;
    bincode::serialize_into(&mut writer, obj)?;
    writer.flush()?;
    Ok(())
}

pub fn read_artifact<T: Artifact, R: Read>(mut reader: R) -> Result<T> {
    let header: Header = bincode::deserialize_from(&mut reader)?;
    if header.kind != T::KIND {
        return Err(WineError::ArtifactKindMismatch { expected: T::KIND.to_string(), got: header.kind });
    }
    debug!(kind = %header.kind, version = header.format_version, created_at = %header.created_at, "artifact header");
    Ok(bincode::deserialize_from(&mut reader)?)
}

pub fn to_bytes<T: Artifact>(obj: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_artifact(obj, &mut buf)?;
    Ok(buf)
}

pub fn from_bytes<T: Artifact>(bytes: &[u8]) -> Result<T> { read_artifact(bytes) }

/// Writes `obj` to `path`, creating parent directories. An existing file is overwritten.
pub fn save_artifact<T: Artifact>(obj: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_artifact(obj, BufWriter::new(File::create(path)?))?;
    debug!(path = %path.display(), kind = T::KIND, "artifact saved");
    Ok(())
}

pub fn load_artifact<T: Artifact>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => WineError::ArtifactNotFound(path.to_path_buf()),
        _ => e.into(),
    })?;
    read_artifact(BufReader::new(file))
}

/// Sibling path a staged write goes to before it replaces `path`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Group of artifact writes that replace their targets only once every one
/// of them has been written. Staged files left behind are removed on drop.
#[derive(Debug, Default)]
pub struct StagedWrite {
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedWrite {
    pub fn new() -> Self { Self::default() }

    /// Writes `obj` next to `path`. On failure every file staged so far is discarded.
    pub fn stage<T: Artifact>(&mut self, obj: &T, path: &Path) -> Result<()> {
        let tmp = staging_path(path);
        if let Err(e) = save_artifact(obj, &tmp) {
            let _ = fs::remove_file(&tmp);
            self.discard();
            return Err(e);
        }
        self.staged.push((tmp, path.to_path_buf()));
        Ok(())
    }

    /// Renames every staged file over its target.
    pub fn commit(mut self) -> Result<()> {
        for (tmp, path) in std::mem::take(&mut self.staged) {
            fs::rename(&tmp, &path)?;
            debug!(path = %path.display(), "artifact replaced");
        }
        Ok(())
    }

    fn discard(&mut self) {
        for (tmp, _) in self.staged.drain(..) {
            let _ = fs::remove_file(tmp);
        }
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) { self.discard(); }
}

pub fn create_directories<P: AsRef<Path>>(dirs: &[P]) -> Result<()> {
    for dir in dirs {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureTable;
    use ndarray::array;

    fn fitted() -> (StandardScaler, LinearRegression) {
        let x = FeatureTable::new(vec!["a".into(), "b".into()], array![[1.0, 0.0], [2.0, 1.0], [4.0, 0.0]]).unwrap();
        let (scaler, scaled) = StandardScaler::fit_transform(&x).unwrap();
        let model = LinearRegression::fit(&scaled, &[3.0, 5.0, 6.0]).unwrap();
        (scaler, model)
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler, model) = fitted();
        let scaler_path = dir.path().join("nested/scaler.bin");
        let model_path = dir.path().join("nested/model.bin");
        save_artifact(&scaler, &scaler_path).unwrap();
        save_artifact(&model, &model_path).unwrap();
        assert_eq!(load_artifact::<StandardScaler>(&scaler_path).unwrap(), scaler);
        assert_eq!(load_artifact::<LinearRegression>(&model_path).unwrap(), model);
    }

    #[test]
    fn wrong_kind_rejected() {
        let (scaler, _) = fitted();
        let bytes = to_bytes(&scaler).unwrap();
        let err = from_bytes::<LinearRegression>(&bytes).unwrap_err();
        assert!(matches!(err, WineError::ArtifactKindMismatch { ref expected, ref got } if expected == "linear_regression" && got == "standard_scaler"));
    }

    #[test]
    fn staged_write_replaces_all_targets() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler, model) = fitted();
        let (scaler_path, model_path) = (dir.path().join("s.bin"), dir.path().join("m.bin"));
        let mut staged = StagedWrite::new();
        staged.stage(&scaler, &scaler_path).unwrap();
        staged.stage(&model, &model_path).unwrap();
        assert!(!scaler_path.exists());
        staged.commit().unwrap();
        assert_eq!(load_artifact::<StandardScaler>(&scaler_path).unwrap(), scaler);
        assert_eq!(load_artifact::<LinearRegression>(&model_path).unwrap(), model);
        assert!(!staging_path(&scaler_path).exists());
    }

    #[test]
    fn failed_stage_leaves_targets_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler, model) = fitted();
        let (scaler_path, model_path) = (dir.path().join("s.bin"), dir.path().join("m.bin"));
        fs::write(&scaler_path, b"previous scaler").unwrap();
        // a directory where the model would be staged makes that write fail
        fs::create_dir(staging_path(&model_path)).unwrap();

        let mut staged = StagedWrite::new();
        staged.stage(&scaler, &scaler_path).unwrap();
        assert!(staged.stage(&model, &model_path).is_err());
        drop(staged);

        assert_eq!(fs::read(&scaler_path).unwrap(), b"previous scaler");
        assert!(!staging_path(&scaler_path).exists());
        assert!(!model_path.exists());
    }

    #[test]
    fn missing_file_is_artifact_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bin");
        assert!(matches!(load_artifact::<StandardScaler>(&path), Err(WineError::ArtifactNotFound(p)) if p == path));
    }
}
