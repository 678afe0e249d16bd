use serde::{Deserialize, Serialize};

use super::{DatasetSummary, MetricScore, ModelRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Inconclusive => "inconclusive",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Partial,
    Aborted,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Aborted => "aborted",
        }
    }
}

/// Per (configuration, metric) aggregate. `mean`, `min` and `max` are absent
/// when nothing was scored; `failed` counts every case excluded from the mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub scored: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: String,
    pub baseline: Option<MetricSummary>,
    pub candidate: Option<MetricSummary>,
    pub delta: Option<f64>,
    pub delta_pct: Option<f64>,
    pub regression_fraction: Option<f64>,
    pub regression_flagged: bool,
    pub min_score: Option<f64>,
    pub max_regression: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    BelowMinimum,
    RegressionExceeded,
    RegressionFromZero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateViolation {
    pub metric: String,
    pub kind: ViolationKind,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub verdict: Verdict,
    pub passed: bool,
    pub violations: Vec<GateViolation>,
    /// Why the run could not produce a trustworthy PASS/FAIL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inconclusive_reasons: Vec<String>,
}

impl GateDecision {
    #[must_use]
    pub fn regressed_metrics(&self) -> Vec<String> {
        let mut metrics = self
            .violations
            .iter()
            .filter(|violation| {
                matches!(
                    violation.kind,
                    ViolationKind::RegressionExceeded | ViolationKind::RegressionFromZero
                )
            })
            .map(|violation| violation.metric.clone())
            .collect::<Vec<_>>();
        metrics.dedup();
        metrics
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub baseline: usize,
    pub candidate: usize,
}

impl RoleCounts {
    pub fn bump(&mut self, role: ModelRole) {
        match role {
            ModelRole::Baseline => self.baseline += 1,
            ModelRole::Candidate => self.candidate += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.baseline + self.candidate
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub cases_total: usize,
    pub cases_finished: usize,
    pub cases_not_run: usize,
    pub cases_hard_failed: usize,
    pub responses: RoleCounts,
    pub transport_failures: RoleCounts,
    pub evaluator_failures: RoleCounts,
    pub scores_recorded: RoleCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Transport,
    Evaluator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFailure {
    pub test_id: String,
    pub role: ModelRole,
    pub model_label: String,
    pub stage: FailureStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    pub attempts: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseModelResult {
    pub model_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub scores: Vec<MetricScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub test_id: String,
    pub baseline: CaseModelResult,
    pub candidate: CaseModelResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub created_at: String,
    pub dataset: DatasetSummary,
    pub baseline_label: String,
    pub candidate_label: String,
    pub metrics_evaluated: Vec<String>,
    pub status: RunStatus,
    pub elapsed_ms: u128,
    pub counts: RunCounts,
    pub metrics: Vec<MetricComparison>,
    pub gate: GateDecision,
    pub failures: Vec<CaseFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cases: Option<Vec<CaseResult>>,
}

impl EvaluationReport {
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricComparison> {
        self.metrics.iter().find(|metric| metric.metric == name)
    }
}
