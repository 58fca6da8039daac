//! Candidate estimators searched by the baseline engine.
//!
//! Fitting goes through linfa. Fitted parameters are copied out into plain
//! serde enums so `pipeline.json` does not depend on linfa's internal layout;
//! prediction is done with ndarray from those parameters.

use linfa::traits::Fit;
use linfa::Dataset;
use linfa_linear::LinearRegression;
use linfa_logistic::MultiLogisticRegression;
use linfa_nn::distance::L2Dist;
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::domain::{AutomlError, Result};

const LOGISTIC_MAX_ITERATIONS: u64 = 100;

/// Row-major feature rows as a `rows x width` matrix.
pub(crate) fn to_matrix(rows: &[Vec<f64>], width: usize) -> Result<Array2<f64>> {
    if let Some(row) = rows.iter().find(|r| r.len() != width) {
        return Err(AutomlError::Training(format!(
            "expected {} features per row, got {}",
            width,
            row.len()
        )));
    }
    Array2::from_shape_vec((rows.len(), width), rows.concat())
        .map_err(|e| AutomlError::Training(format!("feature matrix: {e}")))
}

fn width_of(x: &[Vec<f64>]) -> usize {
    x.first().map_or(0, Vec::len)
}

fn fit_error(e: impl std::fmt::Display) -> AutomlError {
    AutomlError::Training(e.to_string())
}

/// Unfitted classifier candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ClassifierSpec {
    Majority,
    Logistic,
    Knn(usize),
}

impl ClassifierSpec {
    pub(crate) const SEARCH_ORDER: [ClassifierSpec; 4] = [
        ClassifierSpec::Majority,
        ClassifierSpec::Logistic,
        ClassifierSpec::Knn(5),
        ClassifierSpec::Knn(15),
    ];

    pub(crate) fn fit(self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<Classifier> {
        match self {
            ClassifierSpec::Majority => {
                let mut counts = vec![0.0; n_classes];
                for &c in y {
                    counts[c] += 1.0;
                }
                let total = y.len().max(1) as f64;
                Ok(Classifier::Majority {
                    priors: counts.into_iter().map(|c| c / total).collect(),
                })
            }
            ClassifierSpec::Logistic => {
                let dataset = Dataset::new(to_matrix(x, width_of(x))?, Array1::from(y.to_vec()));
                let fitted = MultiLogisticRegression::new()
                    .max_iterations(LOGISTIC_MAX_ITERATIONS)
                    .fit(&dataset)
                    .map_err(fit_error)?;
                Ok(Classifier::Logistic {
                    weights: fitted
                        .params()
                        .axis_iter(Axis(0))
                        .map(|row| row.to_vec())
                        .collect(),
                    intercept: fitted.intercept().to_vec(),
                    classes: fitted.classes().to_vec(),
                    n_classes,
                })
            }
            ClassifierSpec::Knn(k) => Ok(Classifier::Knn {
                k,
                n_classes,
                points: x.to_vec(),
                labels: y.to_vec(),
            }),
        }
    }
}

/// A fitted classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Classifier {
    Majority {
        priors: Vec<f64>,
    },
    /// Multinomial logistic regression. `weights` is features x fitted
    /// classes; `classes[j]` is the class index of column `j`.
    Logistic {
        weights: Vec<Vec<f64>>,
        intercept: Vec<f64>,
        classes: Vec<usize>,
        n_classes: usize,
    },
    Knn {
        k: usize,
        n_classes: usize,
        points: Vec<Vec<f64>>,
        labels: Vec<usize>,
    },
}

impl Classifier {
    pub(crate) fn name(&self) -> String {
        match self {
            Classifier::Majority { .. } => "majority".to_string(),
            Classifier::Logistic { .. } => "logistic".to_string(),
            Classifier::Knn { k, .. } => format!("knn(k={k})"),
        }
    }

    /// Class probabilities per row.
    pub(crate) fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        match self {
            Classifier::Majority { priors } => Ok(vec![priors.clone(); x.len()]),
            Classifier::Logistic {
                weights,
                intercept,
                classes,
                n_classes,
            } => {
                if x.is_empty() {
                    return Ok(Vec::new());
                }
                let w = Array2::from_shape_vec((weights.len(), intercept.len()), weights.concat())
                    .map_err(|e| AutomlError::Training(format!("logistic weights: {e}")))?;
                let logits = to_matrix(x, weights.len())?.dot(&w) + &Array1::from(intercept.clone());
                Ok(logits
                    .axis_iter(Axis(0))
                    .map(|row| {
                        let mut proba = vec![0.0; *n_classes];
                        for (&class, p) in classes.iter().zip(softmax(&row.to_vec())) {
                            proba[class] = p;
                        }
                        proba
                    })
                    .collect())
            }
            Classifier::Knn {
                k,
                n_classes,
                points,
                labels,
            } => Ok(nearest(points, x, *k)?
                .into_iter()
                .map(|idx| {
                    let mut votes = vec![0.0; *n_classes];
                    for &i in &idx {
                        votes[labels[i]] += 1.0;
                    }
                    let total = idx.len().max(1) as f64;
                    votes.into_iter().map(|v| v / total).collect()
                })
                .collect()),
        }
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    let exp: Vec<f64> = logits.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / total).collect()
}

/// Unfitted regressor candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RegressorSpec {
    Mean,
    Linear,
    Knn(usize),
}

impl RegressorSpec {
    pub(crate) const SEARCH_ORDER: [RegressorSpec; 4] = [
        RegressorSpec::Mean,
        RegressorSpec::Linear,
        RegressorSpec::Knn(5),
        RegressorSpec::Knn(15),
    ];

    pub(crate) fn fit(self, x: &[Vec<f64>], y: &[f64]) -> Result<Regressor> {
        match self {
            RegressorSpec::Mean => Ok(Regressor::Mean { value: mean(y) }),
            RegressorSpec::Linear => {
                let width = width_of(x);
                if width == 0 {
                    return Ok(Regressor::Linear {
                        weights: Vec::new(),
                        intercept: mean(y),
                    });
                }
                let dataset = Dataset::new(to_matrix(x, width)?, Array1::from(y.to_vec()));
                let fitted = LinearRegression::default().fit(&dataset).map_err(fit_error)?;
                Ok(Regressor::Linear {
                    weights: fitted.params().to_vec(),
                    intercept: fitted.intercept(),
                })
            }
            RegressorSpec::Knn(k) => Ok(Regressor::Knn {
                k,
                points: x.to_vec(),
                values: y.to_vec(),
            }),
        }
    }
}

/// A fitted regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Regressor {
    Mean {
        value: f64,
    },
    Linear {
        weights: Vec<f64>,
        intercept: f64,
    },
    Knn {
        k: usize,
        points: Vec<Vec<f64>>,
        values: Vec<f64>,
    },
}

impl Regressor {
    pub(crate) fn name(&self) -> String {
        match self {
            Regressor::Mean { .. } => "mean".to_string(),
            Regressor::Linear { .. } => "linear".to_string(),
            Regressor::Knn { k, .. } => format!("knnreg(k={k})"),
        }
    }

    pub(crate) fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        match self {
            Regressor::Mean { value } => Ok(vec![*value; x.len()]),
            Regressor::Linear { weights, intercept } => {
                let w = Array1::from(weights.clone());
                Ok((to_matrix(x, weights.len())?.dot(&w) + *intercept).to_vec())
            }
            Regressor::Knn { k, points, values } => Ok(nearest(points, x, *k)?
                .into_iter()
                .map(|idx| mean(&idx.iter().map(|&i| values[i]).collect::<Vec<_>>()))
                .collect()),
        }
    }
}

/// Indices of the `k` training points closest to each query row.
fn nearest(points: &[Vec<f64>], queries: &[Vec<f64>], k: usize) -> Result<Vec<Vec<usize>>> {
    if queries.is_empty() {
        return Ok(Vec::new());
    }
    let width = width_of(points);
    let data = to_matrix(points, width)?;
    let index = CommonNearestNeighbour::LinearSearch
        .from_batch(&data, L2Dist)
        .map_err(fit_error)?;
    to_matrix(queries, width)?
        .axis_iter(Axis(0))
        .map(|row| {
            index
                .k_nearest(row, k.max(1))
                .map(|found| found.into_iter().map(|(_, i)| i).collect())
                .map_err(fit_error)
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
