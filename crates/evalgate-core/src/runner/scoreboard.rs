use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::models::{MetricSummary, ModelRole};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricAccumulator {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
    failed: usize,
}

impl MetricAccumulator {
    pub fn add(&mut self, score: f64) {
        if self.count == 0 {
            self.min = score;
            self.max = score;
        } else {
            self.min = self.min.min(score);
            self.max = self.max.max(score);
        }
        self.sum += score;
        self.count += 1;
    }

    pub fn fail(&mut self) {
        self.failed += 1;
    }

    /// Failures never count as zero; with no scores the mean stays absent.
    #[must_use]
    pub fn summary(&self) -> MetricSummary {
        if self.count == 0 {
            return MetricSummary {
                failed: self.failed,
                ..MetricSummary::default()
            };
        }
        #[allow(
            clippy::cast_precision_loss,
            reason = "score counts stay far below f64 mantissa precision"
        )]
        let mean = self.sum / self.count as f64;
        MetricSummary {
            mean: Some(mean),
            min: Some(self.min),
            max: Some(self.max),
            scored: self.count,
            failed: self.failed,
        }
    }
}

/// One lock per (role, metric) cell. The key set is fixed at construction, so
/// cells never contend across metrics.
#[derive(Debug)]
pub struct ScoreBoard {
    cells: HashMap<(ModelRole, String), Mutex<MetricAccumulator>>,
}

impl ScoreBoard {
    #[must_use]
    pub fn new(metrics: &[String]) -> Self {
        let cells = ModelRole::ALL
            .iter()
            .flat_map(|role| {
                metrics
                    .iter()
                    .map(move |metric| ((*role, metric.clone()), Mutex::default()))
            })
            .collect();
        Self { cells }
    }

    fn with_cell(&self, role: ModelRole, metric: &str, apply: impl FnOnce(&mut MetricAccumulator)) {
        if let Some(cell) = self.cells.get(&(role, metric.to_string())) {
            let mut guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
            apply(&mut guard);
        }
    }

    pub fn record(&self, role: ModelRole, metric: &str, score: f64) {
        self.with_cell(role, metric, |cell| cell.add(score));
    }

    pub fn record_failure(&self, role: ModelRole, metric: &str) {
        self.with_cell(role, metric, MetricAccumulator::fail);
    }

    #[must_use]
    pub fn summaries(&self, role: ModelRole) -> BTreeMap<String, MetricSummary> {
        self.cells
            .iter()
            .filter(|((cell_role, _), _)| *cell_role == role)
            .map(|((_, metric), cell)| {
                let guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
                (metric.clone(), guard.summary())
            })
            .collect()
    }
}
