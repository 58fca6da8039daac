//! Turning a raw [`Table`] into numeric training data, plus the fitted
//! imputation/scaling step that is persisted with the model.
//!
//! Column statistics are computed with ndarray; the fitted values are kept as
//! plain vectors for serialisation.

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::domain::{AutomlError, ColumnRef, Result, TaskKind};
use crate::engine::{Features, Table};

const MISSING_TOKENS: &[&str] = &["", "na", "nan", "null", "none", "?"];

/// Fraction of rows held out for evaluation.
const TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Targets {
    /// Class index per row; names live in [`TrainingData::classes`].
    Classes(Vec<usize>),
    Values(Vec<f64>),
}

impl Targets {
    pub(crate) fn select(&self, idx: &[usize]) -> Targets {
        match self {
            Targets::Classes(y) => Targets::Classes(idx.iter().map(|&i| y[i]).collect()),
            Targets::Values(y) => Targets::Values(idx.iter().map(|&i| y[i]).collect()),
        }
    }
}

/// Numeric view of a training table. Missing feature cells are NaN.
#[derive(Debug, Clone)]
pub(crate) struct TrainingData {
    pub target_name: String,
    pub feature_names: Vec<String>,
    pub x: Vec<Vec<f64>>,
    pub classes: Vec<String>,
    pub targets: Targets,
}

impl TrainingData {
    pub(crate) fn from_table(
        table: &Table,
        task: TaskKind,
        target: &ColumnRef,
        index_col: Option<&str>,
    ) -> Result<Self> {
        if table.is_empty() {
            return Err(AutomlError::DataPreparationFailed(
                "training data has no rows".to_string(),
            ));
        }

        let target_idx = table.resolve(target)?;
        let index_idx = match index_col {
            Some(name) => Some(table.resolve(&ColumnRef::Name(name.to_string()))?),
            None => None,
        };

        let mut feature_idx = Vec::new();
        for (i, name) in table.columns().iter().enumerate() {
            if i == target_idx || Some(i) == index_idx {
                continue;
            }
            if table.column(i).all(|c| parse_cell(c).is_some()) {
                feature_idx.push(i);
            } else {
                tracing::warn!(column = %name, "skipping non-numeric feature column");
            }
        }

        let x = table
            .rows()
            .iter()
            .map(|row| {
                feature_idx
                    .iter()
                    .map(|&i| parse_cell(&row[i]).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();

        let (classes, targets) = read_targets(table, target_idx, task)?;

        Ok(Self {
            target_name: table.columns()[target_idx].clone(),
            feature_names: feature_idx
                .iter()
                .map(|&i| table.columns()[i].clone())
                .collect(),
            x,
            classes,
            targets,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.x.len()
    }
}

fn read_targets(table: &Table, idx: usize, task: TaskKind) -> Result<(Vec<String>, Targets)> {
    let column = &table.columns()[idx];
    match task {
        TaskKind::Classification => {
            let labels: Vec<&str> = table.column(idx).map(str::trim).collect();
            if labels.iter().any(|l| l.is_empty()) {
                return Err(AutomlError::DataPreparationFailed(format!(
                    "target column '{column}' has empty labels"
                )));
            }
            let mut classes: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
            classes.sort();
            classes.dedup();
            let y = labels
                .iter()
                .map(|l| classes.iter().position(|c| c == l).unwrap_or(0))
                .collect();
            Ok((classes, Targets::Classes(y)))
        }
        TaskKind::Regression => {
            let mut y = Vec::with_capacity(table.n_rows());
            for cell in table.column(idx) {
                match parse_cell(cell) {
                    Some(v) if v.is_finite() => y.push(v),
                    _ => {
                        return Err(AutomlError::DataPreparationFailed(format!(
                            "target column '{column}' has non-numeric or missing value '{cell}'"
                        )))
                    }
                }
            }
            Ok((Vec::new(), Targets::Values(y)))
        }
    }
}

/// `Some(NaN)` for a missing marker, `Some(v)` for a number, `None` otherwise.
pub(crate) fn parse_cell(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if MISSING_TOKENS
        .iter()
        .any(|t| trimmed.eq_ignore_ascii_case(t))
    {
        return Some(f64::NAN);
    }
    trimmed.parse::<f64>().ok()
}

/// Split `n` rows into train and test index sets.
///
/// Rows are shuffled with a seeded generator when `shuffle` is set, otherwise
/// the last rows form the test partition.
pub(crate) fn train_test_split(n: usize, shuffle: bool, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    if shuffle {
        idx.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    let n_test = ((n as f64 * TEST_FRACTION).ceil() as usize).clamp(1, n.saturating_sub(1).max(1));
    let test = idx.split_off(n - n_test);
    (idx, test)
}

pub(crate) fn select_rows(x: &[Vec<f64>], idx: &[usize]) -> Vec<Vec<f64>> {
    idx.iter().map(|&i| x[i].clone()).collect()
}

/// Mean imputation followed by standard scaling, fitted on training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Preprocessor {
    pub columns: Vec<String>,
    fill: Vec<f64>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Preprocessor {
    pub(crate) fn fit(columns: Vec<String>, x: &[Vec<f64>]) -> Self {
        let d = columns.len();
        let raw = Array2::from_shape_fn((x.len(), d), |(i, j)| x[i][j]);
        let fill: Vec<f64> = raw
            .axis_iter(Axis(1))
            .map(|col| {
                let present: Vec<f64> = col.iter().copied().filter(|v| v.is_finite()).collect();
                if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                }
            })
            .collect();

        let imputed = Array2::from_shape_fn(raw.dim(), |(i, j)| {
            let v = raw[[i, j]];
            if v.is_finite() {
                v
            } else {
                fill[j]
            }
        });
        let (means, scales) = match imputed.mean_axis(Axis(0)) {
            Some(means) => {
                let scales = imputed
                    .std_axis(Axis(0), 0.0)
                    .mapv(|s| if s > 0.0 { s } else { 1.0 });
                (means.to_vec(), scales.to_vec())
            }
            None => (vec![0.0; d], vec![1.0; d]),
        };

        Self {
            columns,
            fill,
            means,
            scales,
        }
    }

    pub(crate) fn transform(&self, row: &[f64]) -> Vec<f64> {
        impute(row, &self.fill)
            .iter()
            .enumerate()
            .map(|(j, v)| (v - self.means[j]) / self.scales[j])
            .collect()
    }

    /// Pick the fitted columns out of `table` by name and transform each row.
    pub(crate) fn transform_table(&self, table: &Table) -> Result<Features> {
        if table.is_empty() {
            return Err(AutomlError::DataPreparationFailed(
                "no rows to predict".to_string(),
            ));
        }

        let missing: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| table.column_index(c).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AutomlError::DataPreparationFailed(format!(
                "missing feature columns: {}",
                missing.join(", ")
            )));
        }
        let positions: Vec<usize> = self
            .columns
            .iter()
            .filter_map(|c| table.column_index(c))
            .collect();

        let mut rows = Vec::with_capacity(table.n_rows());
        for (line, row) in table.rows().iter().enumerate() {
            let mut raw = Vec::with_capacity(positions.len());
            for (&pos, name) in positions.iter().zip(&self.columns) {
                let value = parse_cell(&row[pos]).ok_or_else(|| {
                    AutomlError::DataPreparationFailed(format!(
                        "row {}: column '{}' is not numeric: '{}'",
                        line + 1,
                        name,
                        row[pos]
                    ))
                })?;
                raw.push(value);
            }
            rows.push(self.transform(&raw));
        }
        Ok(Features { rows })
    }
}

fn impute(row: &[f64], fill: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(fill)
        .map(|(&v, &f)| if v.is_finite() { v } else { f })
        .collect()
}
