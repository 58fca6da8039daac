//! Tabular data handle passed between the serving layer and the engine.
//!
//! Cells are kept as text; interpretation (numeric, label, missing) belongs to
//! the engine that consumes the table.

use std::path::Path;

use crate::domain::{AutomlError, ColumnRef, Result};

/// A header plus rows of text cells, all rows as wide as the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, checking every row against the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(AutomlError::DataPreparationFailed(format!(
                "row {} has {} cells, header has {}",
                i + 1,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Parse comma-separated text with a header line.
    ///
    /// Standard CSV quoting applies: quoted fields may contain commas, `""`
    /// escapes and line breaks. Blank lines are skipped and cells are trimmed.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let header = reader.headers().map_err(csv_error)?;
        if header.is_empty() {
            return Err(AutomlError::DataPreparationFailed(
                "no header line in data".to_string(),
            ));
        }
        let columns: Vec<String> = header.iter().map(str::to_string).collect();

        let rows = reader
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(str::to_string).collect())
                    .map_err(csv_error)
            })
            .collect::<Result<Vec<Vec<String>>>>()?;
        Self::new(columns, rows)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_csv_str(&text)
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            AutomlError::DataPreparationFailed(format!("data is not valid UTF-8: {e}"))
        })?;
        Self::from_csv_str(text)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolve a column reference to an index.
    pub fn resolve(&self, column: &ColumnRef) -> Result<usize> {
        match column {
            ColumnRef::Name(name) => self.column_index(name).ok_or_else(|| {
                AutomlError::DataPreparationFailed(format!("column '{name}' not found"))
            }),
            ColumnRef::Position(pos) if *pos < self.columns.len() => Ok(*pos),
            ColumnRef::Position(pos) => Err(AutomlError::DataPreparationFailed(format!(
                "column position {} out of range ({} columns)",
                pos,
                self.columns.len()
            ))),
        }
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |r| r[index].as_str())
    }
}

fn csv_error(err: csv::Error) -> AutomlError {
    AutomlError::DataPreparationFailed(format!("malformed CSV: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let t = Table::from_csv_str("a,b,label\n1,2,x\n3,4,y\n").unwrap();
        assert_eq!(t.columns(), &["a", "b", "label"]);
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.column(2).collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let t = Table::from_csv_str("name,v\n\"Smith, J\",1\n\"say \"\"hi\"\"\",2\n").unwrap();
        assert_eq!(t.rows()[0][0], "Smith, J");
        assert_eq!(t.rows()[1][0], "say \"hi\"");
    }

    #[test]
    fn crlf_and_blank_lines() {
        let t = Table::from_csv_str("a,b\r\n1,2\r\n\r\n3,4\r\n").unwrap();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.rows()[1], vec!["3".to_string(), "4".to_string()]);
    }

    #[test]
    fn ragged_row_rejected() {
        let err = Table::from_csv_str("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, AutomlError::DataPreparationFailed(_)));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(Table::from_csv_str("").is_err());
        assert!(Table::from_csv_str("a,b\n").unwrap().is_empty());
    }

    #[test]
    fn resolve_by_name_and_position() {
        let t = Table::from_csv_str("a,b\n1,2\n").unwrap();
        assert_eq!(t.resolve(&ColumnRef::Name("b".into())).unwrap(), 1);
        assert_eq!(t.resolve(&ColumnRef::Position(0)).unwrap(), 0);
        assert!(t.resolve(&ColumnRef::Position(2)).is_err());
        assert!(t.resolve(&ColumnRef::Name("zzz".into())).is_err());
    }

    #[test]
    fn quoted_fields_may_span_lines() {
        let t = Table::from_csv_str("name,v\n\"line one\nline two\",1\n").unwrap();
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.rows()[0][0], "line one\nline two");
        assert_eq!(t.rows()[0][1], "1");
    }

    #[test]
    fn header_cells_are_trimmed() {
        let t = Table::from_csv_str(" a , b \n1, 2\n").unwrap();
        assert_eq!(t.columns(), &["a", "b"]);
        assert_eq!(t.rows()[0], vec!["1".to_string(), "2".to_string()]);
    }
}
