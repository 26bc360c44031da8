//! Feature preprocessing shared by the training pipeline and the prediction service.

use tracing::debug;

use crate::error::Result;
use crate::features::FeatureTable;
use crate::frame::{Column, Frame};
use crate::record::{records_to_frame, WineRecord};
use crate::schema::{FEATURE_COLUMNS, RED, RENAME_MAP, TYPE_COLUMN};

/// Replaces the `type` column with 1.0 for "red" and 0.0 for anything else.
pub fn encode_wine_type(frame: &mut Frame) -> Result<()> {
    let encoded = match frame.column(TYPE_COLUMN)? {
        Column::Text(cells) => cells
            .iter()
            .map(|c| Some(if c.as_deref() == Some(RED) { 1.0 } else { 0.0 }))
            .collect(),
        // a numeric column never equals "red"
        Column::Numeric(cells) => vec![Some(0.0); cells.len()],
    };
    frame.push_column(TYPE_COLUMN, Column::Numeric(encoded))
}

/// Raw frame (identifier-form names) to the canonical twelve-column feature table.
///
/// Missing values are imputed with the mean of the current batch, not with
/// training-time statistics, so a single-row request with a gap stays missing.
pub fn preprocess_wine_data(frame: Frame) -> Result<FeatureTable> {
    let mut frame = frame.rename(&RENAME_MAP);
    encode_wine_type(&mut frame)?;
    frame.fill_null_with_mean();
    let table = select_features(&frame)?;
    debug!(rows = table.n_rows(), "preprocessed batch");
    Ok(table)
}

pub fn preprocess_records(records: &[WineRecord]) -> Result<FeatureTable> {
    preprocess_wine_data(records_to_frame(records)?)
}

/// Projects an already display-form frame onto [`FEATURE_COLUMNS`].
pub fn select_features(frame: &Frame) -> Result<FeatureTable> {
    FeatureTable::from_frame(&frame.select(&FEATURE_COLUMNS)?)
}
