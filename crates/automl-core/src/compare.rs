//! Metric comparator.
//!
//! Decides whether a candidate metric set strictly beats a baseline. Two
//! decision rules exist:
//!
//! - [`DecisionRule::ByBaselineKeys`] inspects the baseline for a known
//!   decision key (`mse` first, then `roc_auc`). This is what [`is_better`]
//!   uses and what metric files written without a task kind rely on.
//! - [`DecisionRule::ForTask`] takes the decision metric from the task kind,
//!   so a regression run that happens to report `roc_auc` is still compared
//!   on `mse`. The lifecycle orchestrator uses this one.
//!
//! Equal values are never an improvement: a candidate must strictly win.

use crate::domain::{metric, AutomlError, Direction, Metrics, Result, TaskKind};

/// How the decision metric is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionRule {
    ByBaselineKeys,
    ForTask(TaskKind),
}

impl DecisionRule {
    /// Whether `candidate` strictly beats `baseline` under this rule.
    pub fn is_better(self, candidate: &Metrics, baseline: &Metrics) -> Result<bool> {
        let (key, direction) = self.decision_key(baseline)?;
        let base = lookup(baseline, key)?;
        let cand = lookup(candidate, key)?;
        Ok(direction.improves(cand, base))
    }

    fn decision_key(self, baseline: &Metrics) -> Result<(&'static str, Direction)> {
        match self {
            DecisionRule::ForTask(kind) => Ok(kind.decision_metric()),
            DecisionRule::ByBaselineKeys => {
                if baseline.contains_key(metric::MSE) {
                    Ok((metric::MSE, Direction::LowerIsBetter))
                } else if baseline.contains_key(metric::ROC_AUC) {
                    Ok((metric::ROC_AUC, Direction::HigherIsBetter))
                } else {
                    Err(unsupported(
                        &format!("{}' or '{}", metric::MSE, metric::ROC_AUC),
                        baseline,
                    ))
                }
            }
        }
    }
}

/// Key-detecting comparison: `mse` lower wins, else `roc_auc` higher wins.
pub fn is_better(candidate: &Metrics, baseline: &Metrics) -> Result<bool> {
    DecisionRule::ByBaselineKeys.is_better(candidate, baseline)
}

fn lookup(metrics: &Metrics, key: &str) -> Result<f64> {
    metrics
        .get(key)
        .copied()
        .ok_or_else(|| unsupported(key, metrics))
}

fn unsupported(expected: &str, metrics: &Metrics) -> AutomlError {
    AutomlError::UnsupportedMetricSet {
        expected: expected.to_string(),
        keys: metrics.keys().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pairs: &[(&str, f64)]) -> Metrics {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn mse_lower_wins() {
        let a = m(&[("mse", 5.0), ("mae", 1.0)]);
        let b = m(&[("mse", 10.0), ("mae", 0.5)]);
        assert!(is_better(&a, &b).unwrap());
        assert!(!is_better(&b, &a).unwrap());
    }

    #[test]
    fn roc_auc_higher_wins() {
        let a = m(&[("roc_auc", 0.9)]);
        let b = m(&[("roc_auc", 0.8)]);
        assert!(is_better(&a, &b).unwrap());
        assert!(!is_better(&b, &a).unwrap());
    }

    #[test]
    fn mse_takes_precedence_over_roc_auc() {
        let a = m(&[("mse", 1.0), ("roc_auc", 0.1)]);
        let b = m(&[("mse", 2.0), ("roc_auc", 0.9)]);
        assert!(is_better(&a, &b).unwrap());
    }

    #[test]
    fn equal_values_are_not_better_either_way() {
        let a = m(&[("roc_auc", 0.85)]);
        let b = m(&[("roc_auc", 0.85)]);
        assert!(!is_better(&a, &b).unwrap());
        assert!(!is_better(&b, &a).unwrap());

        let c = m(&[("mse", 3.0)]);
        let d = m(&[("mse", 3.0)]);
        assert!(!is_better(&c, &d).unwrap());
        assert!(!is_better(&d, &c).unwrap());
    }

    #[test]
    fn unrecognised_baseline_fails() {
        let a = m(&[("f1", 0.9)]);
        let b = m(&[("f1", 0.8)]);
        match is_better(&a, &b) {
            Err(AutomlError::UnsupportedMetricSet { keys, .. }) => {
                assert_eq!(keys, vec!["f1".to_string()])
            }
            other => panic!("expected UnsupportedMetricSet, got {other:?}"),
        }
    }

    #[test]
    fn candidate_missing_decision_key_fails() {
        let a = m(&[("f1", 0.9)]);
        let b = m(&[("roc_auc", 0.8)]);
        assert!(matches!(
            is_better(&a, &b),
            Err(AutomlError::UnsupportedMetricSet { .. })
        ));
    }

    #[test]
    fn task_rule_ignores_stray_keys() {
        // Regression baseline that also carries roc_auc: compared on mse only.
        let rule = DecisionRule::ForTask(TaskKind::Regression);
        let a = m(&[("mse", 4.0), ("roc_auc", 0.1)]);
        let b = m(&[("mse", 5.0), ("roc_auc", 0.9)]);
        assert!(rule.is_better(&a, &b).unwrap());
    }

    #[test]
    fn task_rule_requires_its_metric() {
        let rule = DecisionRule::ForTask(TaskKind::Classification);
        let a = m(&[("mse", 1.0)]);
        let b = m(&[("mse", 2.0)]);
        assert!(matches!(
            rule.is_better(&a, &b),
            Err(AutomlError::UnsupportedMetricSet { .. })
        ));
    }

    #[test]
    fn nan_baseline_does_not_freeze_the_artifact() {
        let stored = m(&[("roc_auc", f64::NAN)]);
        assert!(is_better(&m(&[("roc_auc", 0.5)]), &stored).unwrap());
        assert!(!is_better(&stored, &m(&[("roc_auc", 0.5)])).unwrap());
    }

    #[test]
    fn comparison_matches_direct_ordering() {
        let values = [0.0, 0.25, 0.5, 0.75, 1.0];
        for &x in &values {
            for &y in &values {
                let a = m(&[("mse", x)]);
                let b = m(&[("mse", y)]);
                assert_eq!(is_better(&a, &b).unwrap(), x < y);

                let a = m(&[("roc_auc", x)]);
                let b = m(&[("roc_auc", y)]);
                assert_eq!(is_better(&a, &b).unwrap(), x > y);
            }
        }
    }
}
