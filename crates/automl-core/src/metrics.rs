//! Process-wide counters for the training and prediction paths.
//!
//! Increments are lock-free. [`ServiceMetrics::flush`] writes the current
//! values as one `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub static METRICS: ServiceMetrics = ServiceMetrics::new();

pub struct ServiceMetrics {
    trainings: AtomicU64,
    replaced: AtomicU64,
    kept: AtomicU64,
    rollbacks: AtomicU64,
    predictions: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub trainings: u64,
    pub replaced: u64,
    pub kept: u64,
    pub rollbacks: u64,
    pub predictions: u64,
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub const fn new() -> Self {
        Self {
            trainings: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
            kept: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
        }
    }

    pub fn inc_trainings(&self) {
        self.trainings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_replaced(&self) {
        self.replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_kept(&self) {
        self.kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count `rows` predicted rows.
    pub fn add_predictions(&self, rows: u64) {
        self.predictions.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            trainings: self.trainings.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            kept: self.kept.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            predictions: self.predictions.load(Ordering::Relaxed),
        }
    }

    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            trainings = s.trainings,
            replaced = s.replaced,
            kept = s.kept,
            rollbacks = s.rollbacks,
            predictions = s.predictions,
        );
    }

    pub fn reset(&self) {
        for counter in [
            &self.trainings,
            &self.replaced,
            &self.kept,
            &self.rollbacks,
            &self.predictions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
