//! Minimal column-oriented table used by preprocessing and dataset loading.
//!
//! Cells are optional; `None` (or a numeric NaN) is a missing value.

use std::collections::HashSet;

use ndarray::Array2;

use crate::error::{Result, WineError};

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum CellKey {
    Null,
    Number(u64),
    Text(String),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            Column::Numeric(v) => v[row].map_or(true, f64::is_nan),
            Column::Text(v) => v[row].is_none(),
        }
    }

    /// Mean over present values; `None` for text columns or when every cell is missing.
    pub fn mean(&self) -> Option<f64> {
        match self {
            Column::Numeric(v) => {
                let (sum, n) = v
                    .iter()
                    .flatten()
                    .filter(|x| !x.is_nan())
                    .fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
                (n > 0).then(|| sum / n as f64)
            }
            Column::Text(_) => None,
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&r| v[r]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }

    fn key(&self, row: usize) -> CellKey {
        if self.is_null(row) {
            return CellKey::Null;
        }
        match self {
            // -0.0 and 0.0 compare equal
            Column::Numeric(v) => CellKey::Number(v[row].map(|x| if x == 0.0 { 0.0f64 } else { x }).unwrap_or_default().to_bits()),
            Column::Text(v) => CellKey::Text(v[row].clone().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self { Self::default() }

    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut frame = Frame::new();
        for (name, column) in columns {
            frame.push_column(name, column)?;
        }
        Ok(frame)
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.push_column(name, column)?;
        Ok(self)
    }

    /// Appends a column, or replaces the column of the same name in place.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(WineError::LengthMismatch { name, expected: self.n_rows(), got: column.len() });
        }
        match self.position(&name) {
            Some(idx) => self.columns[idx] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize { self.columns.first().map_or(0, Column::len) }
    pub fn n_cols(&self) -> usize { self.columns.len() }
    pub fn names(&self) -> &[String] { &self.names }
    pub fn has_column(&self, name: &str) -> bool { self.position(name).is_some() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    fn position(&self, name: &str) -> Option<usize> { self.names.iter().position(|n| n == name) }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.position(name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| WineError::MissingColumn(name.to_string()))
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v.as_slice()),
            Column::Text(_) => Err(WineError::NonNumericColumn(name.to_string())),
        }
    }

    /// Renames columns found in `map`; names not present are ignored.
    pub fn rename(mut self, map: &[(&str, &str)]) -> Self {
        for name in self.names.iter_mut() {
            if let Some((_, to)) = map.iter().find(|(from, _)| *from == name.as_str()) {
                *name = to.to_string();
            }
        }
        self
    }

    /// Replaces missing numeric cells with the mean of their column over this frame.
    pub fn fill_null_with_mean(&mut self) {
        for column in self.columns.iter_mut() {
            let Some(mean) = column.mean() else { continue };
            if let Column::Numeric(cells) = column {
                for cell in cells.iter_mut() {
                    if cell.map_or(true, f64::is_nan) {
                        *cell = Some(mean);
                    }
                }
            }
        }
    }

    pub fn drop_nulls(&self) -> Frame {
        let keep: Vec<usize> = (0..self.n_rows())
            .filter(|&row| self.columns.iter().all(|c| !c.is_null(row)))
            .collect();
        self.take(&keep)
    }

    /// Drops rows identical in every column to an earlier row.
    pub fn drop_duplicates(&self) -> Frame {
        let mut seen = HashSet::new();
        let keep: Vec<usize> = (0..self.n_rows())
            .filter(|&row| seen.insert(self.columns.iter().map(|c| c.key(row)).collect::<Vec<_>>()))
            .collect();
        self.take(&keep)
    }

    pub fn take(&self, rows: &[usize]) -> Frame {
        Frame { names: self.names.clone(), columns: self.columns.iter().map(|c| c.take(rows)).collect() }
    }

    /// Projects to `names`, in that order.
    pub fn select(&self, names: &[&str]) -> Result<Frame> {
        let mut out = Frame::new();
        for name in names {
            out.push_column(*name, self.column(name)?.clone())?;
        }
        Ok(out)
    }

    /// Dense row-major matrix of every column; missing cells become NaN.
    pub fn to_matrix(&self) -> Result<Array2<f64>> {
        let cols = self
            .columns
            .iter()
            .zip(&self.names)
            .map(|(c, n)| match c {
                Column::Numeric(v) => Ok(v.as_slice()),
                Column::Text(_) => Err(WineError::NonNumericColumn(n.clone())),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Array2::from_shape_fn((self.n_rows(), cols.len()), |(i, j)| cols[j][i].unwrap_or(f64::NAN)))
    }
}
