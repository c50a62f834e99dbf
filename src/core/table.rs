use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("cell ({row}, {col}) is out of range")]
    CellOutOfRange { row: usize, col: usize },

    #[error("cell ({row}, {col}) is not numeric: '{value}'")]
    NonNumericCell {
        row: usize,
        col: usize,
        value: String,
    },
}

/// In-memory tabular dataset parsed from delimited text.
///
/// Column positions carry the meaning; header names are only kept for
/// prediction-column lookup and error messages. All cells are stored as
/// text and parsed on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    pub fn numeric_cell(&self, row: usize, col: usize) -> Result<f64, TableError> {
        let value = self
            .cell(row, col)
            .ok_or(TableError::CellOutOfRange { row, col })?;
        value
            .parse::<f64>()
            .map_err(|_| TableError::NonNumericCell {
                row,
                col,
                value: value.to_string(),
            })
    }

    /// True when every cell of the column parses as a finite number.
    pub fn is_numeric_column(&self, col: usize) -> bool {
        self.rows.iter().all(|row| {
            row.get(col)
                .and_then(|v| v.parse::<f64>().ok())
                .is_some_and(f64::is_finite)
        })
    }

    /// Cell values of one column, top to bottom.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().filter_map(move |row| {
            row.get(col).map(String::as_str)
        })
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataTable {
        let csv = "image_id,label,confidence\na.jpg,cat,0.9\nb.jpg,dog,0.4\n";
        DataTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn parses_headers_and_rows() {
        let t = sample();
        assert_eq!(t.headers(), &["image_id", "label", "confidence"]);
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.cell(0, 1), Some("cat"));
        assert_eq!(t.cell(1, 0), Some("b.jpg"));
    }

    #[test]
    fn column_lookup_by_name() {
        let t = sample();
        assert_eq!(t.column_index("confidence"), Some(2));
        assert!(t.has_column("label"));
        assert!(!t.has_column("score"));
    }

    #[test]
    fn numeric_access() {
        let t = sample();
        assert_eq!(t.numeric_cell(0, 2).unwrap(), 0.9);
        assert!(matches!(
            t.numeric_cell(0, 1),
            Err(TableError::NonNumericCell { .. })
        ));
        assert!(t.is_numeric_column(2));
        assert!(!t.is_numeric_column(1));
    }

    #[test]
    fn out_of_range_cell_is_none() {
        let t = sample();
        assert_eq!(t.cell(5, 0), None);
        assert!(matches!(
            t.numeric_cell(0, 9),
            Err(TableError::CellOutOfRange { .. })
        ));
    }

    #[test]
    fn column_iterates_values() {
        let t = sample();
        let labels: Vec<&str> = t.column(1).collect();
        assert_eq!(labels, vec!["cat", "dog"]);
    }

    #[test]
    fn ragged_row_is_an_error() {
        let csv = "a,b\n1,2\n3\n";
        assert!(DataTable::from_reader(csv.as_bytes()).is_err());
    }
}
