//! Evaluation metrics for held-out predictions.

use crate::domain::{metric, AutomlError, Metrics, Result};

/// Classification ground truth and model output on one partition.
pub struct ClassificationEval<'a> {
    /// Class index per row.
    pub truth: &'a [usize],
    /// Per-row class probabilities, one column per class.
    pub proba: &'a [Vec<f64>],
    pub n_classes: usize,
}

impl ClassificationEval<'_> {
    fn predicted(&self) -> Vec<usize> {
        self.proba.iter().map(|p| argmax(p)).collect()
    }

    pub fn score(&self, name: &str) -> Result<f64> {
        match name {
            metric::ROC_AUC => Ok(roc_auc_ovr(self.truth, self.proba, self.n_classes)),
            metric::F1 => Ok(f1_macro(self.truth, &self.predicted(), self.n_classes)),
            metric::ACCURACY => Ok(accuracy(self.truth, &self.predicted())),
            other => Err(unknown(other, &[metric::ROC_AUC, metric::F1, metric::ACCURACY])),
        }
    }

    pub fn scores(&self, names: &[&str]) -> Result<Metrics> {
        names
            .iter()
            .map(|n| Ok((n.to_string(), self.score(n)?)))
            .collect()
    }
}

/// Regression ground truth and model output on one partition.
pub struct RegressionEval<'a> {
    pub truth: &'a [f64],
    pub predicted: &'a [f64],
}

impl RegressionEval<'_> {
    pub fn score(&self, name: &str) -> Result<f64> {
        let (t, p) = (self.truth, self.predicted);
        match name {
            metric::MSE => Ok(mse(t, p)),
            metric::MAE => Ok(mae(t, p)),
            metric::MAPE => Ok(mape(t, p)),
            metric::RMSE => Ok(mse(t, p).sqrt()),
            metric::R2 => Ok(r2(t, p)),
            other => Err(unknown(
                other,
                &[
                    metric::MSE,
                    metric::MAE,
                    metric::MAPE,
                    metric::RMSE,
                    metric::R2,
                ],
            )),
        }
    }

    pub fn scores(&self, names: &[&str]) -> Result<Metrics> {
        names
            .iter()
            .map(|n| Ok((n.to_string(), self.score(n)?)))
            .collect()
    }
}

fn unknown(name: &str, available: &[&str]) -> AutomlError {
    AutomlError::UnsupportedMetricSet {
        expected: name.to_string(),
        keys: available.iter().map(|s| s.to_string()).collect(),
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(a, b)| a == b).count();
    hits as f64 / truth.len() as f64
}

/// Unweighted mean of per-class F1 over classes seen in truth or prediction.
pub fn f1_macro(truth: &[usize], predicted: &[usize], n_classes: usize) -> f64 {
    let mut tp = vec![0usize; n_classes];
    let mut fp = vec![0usize; n_classes];
    let mut fn_ = vec![0usize; n_classes];
    for (&t, &p) in truth.iter().zip(predicted) {
        if t == p {
            tp[t] += 1;
        } else {
            fp[p] += 1;
            fn_[t] += 1;
        }
    }

    let mut sum = 0.0;
    let mut seen = 0usize;
    for c in 0..n_classes {
        if tp[c] + fp[c] + fn_[c] == 0 {
            continue;
        }
        seen += 1;
        sum += 2.0 * tp[c] as f64 / (2 * tp[c] + fp[c] + fn_[c]) as f64;
    }
    if seen == 0 {
        0.0
    } else {
        sum / seen as f64
    }
}

/// One-vs-rest macro ROC AUC. Classes without both positives and negatives in
/// `truth` are skipped; if none qualify the score is 0.5.
pub fn roc_auc_ovr(truth: &[usize], proba: &[Vec<f64>], n_classes: usize) -> f64 {
    let mut sum = 0.0;
    let mut counted = 0usize;
    for c in 0..n_classes {
        let scores: Vec<f64> = proba.iter().map(|p| p.get(c).copied().unwrap_or(0.0)).collect();
        let positive: Vec<bool> = truth.iter().map(|&t| t == c).collect();
        if let Some(auc) = binary_auc(&scores, &positive) {
            sum += auc;
            counted += 1;
        }
        // Binary problems: both one-vs-rest curves carry the same area.
        if n_classes == 2 && counted == 1 {
            break;
        }
    }
    if counted == 0 {
        0.5
    } else {
        sum / counted as f64
    }
}

/// Mann-Whitney estimate of the area under the ROC curve, ties averaged.
fn binary_auc(scores: &[f64], positive: &[bool]) -> Option<f64> {
    let n_pos = positive.iter().filter(|p| **p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean.
        let avg_rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            if positive[idx] {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    Some((rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64))
}

pub fn mse(truth: &[f64], predicted: &[f64]) -> f64 {
    mean(truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)))
}

pub fn mae(truth: &[f64], predicted: &[f64]) -> f64 {
    mean(truth.iter().zip(predicted).map(|(t, p)| (t - p).abs()))
}

/// Mean absolute percentage error as a fraction; zero targets use a tiny floor.
pub fn mape(truth: &[f64], predicted: &[f64]) -> f64 {
    mean(
        truth
            .iter()
            .zip(predicted)
            .map(|(t, p)| (t - p).abs() / t.abs().max(f64::EPSILON)),
    )
}

pub fn r2(truth: &[f64], predicted: &[f64]) -> f64 {
    let avg = mean(truth.iter().copied());
    let ss_tot: f64 = truth.iter().map(|t| (t - avg).powi(2)).sum();
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
