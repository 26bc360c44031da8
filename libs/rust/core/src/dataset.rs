//! Raw data loading, cleaning and the seeded train/test split.

use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::error::{Result, WineError};
use crate::frame::{Column, Frame};
use crate::preprocessing::encode_wine_type;
use crate::schema::TARGET_COLUMN;

const NA_TOKENS: [&str; 7] = ["NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Reads a CSV with a header row. A column whose present cells all parse as
/// numbers becomes numeric, anything else is text. Empty cells and common NA
/// tokens are missing values.
pub fn load_csv(path: &Path) -> Result<Frame> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (idx, column) in cells.iter_mut().enumerate() {
            let cell = record.get(idx).map(str::trim).filter(|c| !c.is_empty() && !NA_TOKENS.contains(c));
            column.push(cell.map(str::to_string));
        }
    }
    let frame = Frame::from_columns(headers.into_iter().zip(cells.into_iter().map(infer_column)))?;
    info!(path = %path.display(), rows = frame.n_rows(), cols = frame.n_cols(), "loaded csv");
    Ok(frame)
}

fn infer_column(cells: Vec<Option<String>>) -> Column {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(s) => s.parse::<f64>().ok().map(Some),
        })
        .collect();
    match parsed {
        Some(values) => Column::Numeric(values),
        None => Column::Text(cells),
    }
}

pub fn write_csv(frame: &Frame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(frame.names())?;
    for row in 0..frame.n_rows() {
        writer.write_record(frame.iter().map(|(_, column)| match column {
            Column::Numeric(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            Column::Text(v) => v[row].clone().unwrap_or_default(),
        }))?;
    }
    writer.flush()?;
    Ok(())
}

/// Drops incomplete rows, then exact duplicates, then encodes `type`.
pub fn clean_data(frame: Frame) -> Result<Frame> {
    let rows_in = frame.n_rows();
    let mut frame = frame.drop_nulls().drop_duplicates();
    encode_wine_type(&mut frame)?;
    info!(rows_in, rows_out = frame.n_rows(), "cleaned raw data");
    Ok(frame)
}

pub fn load_data(path: &Path) -> Result<Frame> { clean_data(load_csv(path)?) }

/// Row indices `(train, test)`. The first `ceil(n * test_size)` rows of a
/// seeded shuffle form the test split.
pub fn split_indices(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(WineError::InvalidSplit(format!("test_size must be in (0, 1), got {test_size}")));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(WineError::InvalidSplit(format!("{n} rows cannot be split with test_size {test_size}")));
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok((train, order))
}

pub fn train_test_split(frame: &Frame, test_size: f64, seed: u64) -> Result<(Frame, Frame)> {
    let (train, test) = split_indices(frame.n_rows(), test_size, seed)?;
    Ok((frame.take(&train), frame.take(&test)))
}

pub fn target_values(frame: &Frame) -> Result<Vec<f64>> {
    Ok(frame.numeric(TARGET_COLUMN)?.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
