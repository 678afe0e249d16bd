use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::models::{
    GateDecision, GateViolation, MetricComparison, MetricSummary, RunStatus, Verdict,
    ViolationKind,
};

pub const DEFAULT_MAX_REGRESSION: f64 = 0.10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricThreshold {
    pub min_score: Option<f64>,
    pub max_regression: Option<f64>,
}

impl MetricThreshold {
    #[must_use]
    pub const fn is_gated(&self) -> bool {
        self.min_score.is_some() || self.max_regression.is_some()
    }
}

/// Per-metric thresholds with crate-wide defaults. A metric without its own
/// entry inherits `default_min_score` and `default_max_regression`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityGatePolicy {
    pub default_min_score: Option<f64>,
    pub default_max_regression: Option<f64>,
    pub metrics: BTreeMap<String, MetricThreshold>,
}

impl Default for QualityGatePolicy {
    fn default() -> Self {
        Self {
            default_min_score: None,
            default_max_regression: Some(DEFAULT_MAX_REGRESSION),
            metrics: BTreeMap::new(),
        }
    }
}

impl QualityGatePolicy {
    #[must_use]
    pub fn threshold_for(&self, metric: &str) -> MetricThreshold {
        let own = self.metrics.get(metric).copied().unwrap_or_default();
        MetricThreshold {
            min_score: own.min_score.or(self.default_min_score),
            max_regression: own.max_regression.or(self.default_max_regression),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let entries = std::iter::once((
            "default",
            MetricThreshold {
                min_score: self.default_min_score,
                max_regression: self.default_max_regression,
            },
        ))
        .chain(
            self.metrics
                .iter()
                .map(|(name, threshold)| (name.as_str(), *threshold)),
        );
        for (name, threshold) in entries {
            if let Some(min_score) = threshold.min_score
                && !min_score.is_finite()
            {
                return Err(EvalError::Config(format!(
                    "gate threshold {name}: min_score must be finite"
                )));
            }
            if let Some(max_regression) = threshold.max_regression
                && (!max_regression.is_finite() || max_regression < 0.0)
            {
                return Err(EvalError::Config(format!(
                    "gate threshold {name}: max_regression must be a non-negative fraction"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegressionCheck {
    /// Relative drop against a positive baseline; negative means improvement.
    Fraction(f64),
    /// Baseline mean is zero or negative and the candidate did not drop.
    NotRegressedFromNonPositive,
    /// Baseline mean is zero or negative and the candidate dropped below it.
    RegressedFromNonPositive,
}

#[must_use]
pub fn regression_check(baseline_mean: f64, candidate_mean: f64) -> RegressionCheck {
    if baseline_mean > 0.0 {
        return RegressionCheck::Fraction((baseline_mean - candidate_mean) / baseline_mean);
    }
    if candidate_mean >= baseline_mean {
        RegressionCheck::NotRegressedFromNonPositive
    } else {
        RegressionCheck::RegressedFromNonPositive
    }
}

fn scored_mean(summary: Option<&MetricSummary>) -> Option<f64> {
    summary.and_then(|summary| summary.mean)
}

/// A gated metric only passes when both configurations produced scores.
#[must_use]
pub fn compare_metric(
    metric: &str,
    baseline: Option<MetricSummary>,
    candidate: Option<MetricSummary>,
    threshold: MetricThreshold,
) -> (MetricComparison, Vec<GateViolation>) {
    let mut violations = Vec::new();
    let mut delta = None;
    let mut delta_pct = None;
    let mut regression_fraction = None;
    let mut regression_flagged = false;
    let baseline_mean = scored_mean(baseline.as_ref());
    let candidate_mean = scored_mean(candidate.as_ref());

    if let Some(candidate_mean) = candidate_mean
        && let Some(min_score) = threshold.min_score
        && candidate_mean < min_score
    {
        violations.push(GateViolation {
            metric: metric.to_string(),
            kind: ViolationKind::BelowMinimum,
            expected: format!(">= {min_score:.2}"),
            actual: format!("{candidate_mean:.4}"),
        });
    }

    if let (Some(baseline_mean), Some(candidate_mean)) = (baseline_mean, candidate_mean) {
        delta = Some(candidate_mean - baseline_mean);
        if baseline_mean != 0.0 {
            delta_pct = Some((candidate_mean - baseline_mean) / baseline_mean * 100.0);
        }
        match regression_check(baseline_mean, candidate_mean) {
            RegressionCheck::Fraction(fraction) => {
                regression_fraction = Some(fraction);
                if let Some(max_regression) = threshold.max_regression
                    && fraction > max_regression
                {
                    regression_flagged = true;
                    violations.push(GateViolation {
                        metric: metric.to_string(),
                        kind: ViolationKind::RegressionExceeded,
                        expected: format!("<= {:.2}%", max_regression * 100.0),
                        actual: format!("{:.2}%", fraction * 100.0),
                    });
                }
            }
            RegressionCheck::NotRegressedFromNonPositive => {}
            RegressionCheck::RegressedFromNonPositive => {
                regression_flagged = true;
                if threshold.max_regression.is_some() {
                    violations.push(GateViolation {
                        metric: metric.to_string(),
                        kind: ViolationKind::RegressionFromZero,
                        expected: format!(">= {baseline_mean:.4}"),
                        actual: format!("{candidate_mean:.4}"),
                    });
                }
            }
        }
    }

    let scored_both = baseline_mean.is_some() && candidate_mean.is_some();
    let passed = violations.is_empty() && (scored_both || !threshold.is_gated());
    let comparison = MetricComparison {
        metric: metric.to_string(),
        baseline,
        candidate,
        delta,
        delta_pct,
        regression_fraction,
        regression_flagged,
        min_score: threshold.min_score,
        max_regression: threshold.max_regression,
        passed,
    };
    (comparison, violations)
}

/// Compares every evaluated metric and folds the result into one verdict.
/// Violations are always listed, even when the verdict is inconclusive.
#[must_use]
pub fn evaluate_gate(
    metrics: &[String],
    baseline: &BTreeMap<String, MetricSummary>,
    candidate: &BTreeMap<String, MetricSummary>,
    policy: &QualityGatePolicy,
    status: RunStatus,
    mut inconclusive_reasons: Vec<String>,
) -> (Vec<MetricComparison>, GateDecision) {
    let mut comparisons = Vec::with_capacity(metrics.len());
    let mut violations = Vec::new();

    match status {
        RunStatus::Completed => {}
        RunStatus::Partial => {
            inconclusive_reasons.push("run deadline elapsed before every case finished".into());
        }
        RunStatus::Aborted => {
            inconclusive_reasons.push("run aborted after exceeding the failure threshold".into());
        }
    }

    for metric in metrics {
        let threshold = policy.threshold_for(metric);
        let base = baseline.get(metric).cloned();
        let cand = candidate.get(metric).cloned();
        if threshold.is_gated() {
            if scored_mean(base.as_ref()).is_none() {
                inconclusive_reasons.push(format!("{metric}: no successful baseline scores"));
            }
            if scored_mean(cand.as_ref()).is_none() {
                inconclusive_reasons.push(format!("{metric}: no successful candidate scores"));
            }
        }
        let (comparison, metric_violations) = compare_metric(metric, base, cand, threshold);
        comparisons.push(comparison);
        violations.extend(metric_violations);
    }

    let verdict = if !inconclusive_reasons.is_empty() {
        Verdict::Inconclusive
    } else if violations.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    let decision = GateDecision {
        verdict,
        passed: verdict == Verdict::Pass,
        violations,
        inconclusive_reasons,
    };
    (comparisons, decision)
}
