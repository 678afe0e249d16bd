use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::gate::{QualityGatePolicy, evaluate_gate};
use crate::models::{
    DatasetSummary, EvaluationReport, MetricComparison, MetricSummary, ModelConfiguration,
};
use crate::runner::RunOutcome;

const MAX_MARKDOWN_FAILURES: usize = 20;

/// Folds a finished run into its report, deciding the gate verdict on the
/// way. `inconclusive_reasons` carries anything found before the run started.
#[must_use]
pub fn build_report(
    dataset: DatasetSummary,
    baseline: &ModelConfiguration,
    candidate: &ModelConfiguration,
    outcome: RunOutcome,
    policy: &QualityGatePolicy,
    inconclusive_reasons: Vec<String>,
) -> EvaluationReport {
    let (metrics, gate) = evaluate_gate(
        &outcome.metrics,
        &outcome.baseline,
        &outcome.candidate,
        policy,
        outcome.status,
        inconclusive_reasons,
    );
    info!(
        verdict = gate.verdict.as_str(),
        violations = gate.violations.len(),
        inconclusive_reasons = gate.inconclusive_reasons.len(),
        "quality gate evaluated"
    );
    EvaluationReport {
        run_id: Uuid::new_v4().to_string(),
        created_at: Utc::now().to_rfc3339(),
        dataset,
        baseline_label: baseline.label.clone(),
        candidate_label: candidate.label.clone(),
        metrics_evaluated: outcome.metrics,
        status: outcome.status,
        elapsed_ms: outcome.elapsed.as_millis(),
        counts: outcome.counts,
        metrics,
        gate,
        failures: outcome.failures,
        cases: outcome.cases,
    }
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

pub fn write_report_json(path: &Path, report: &EvaluationReport) -> Result<()> {
    let mut rendered = serde_json::to_string_pretty(report)?;
    rendered.push('\n');
    write_text(path, &rendered)
}

pub fn write_report_markdown(path: &Path, report: &EvaluationReport) -> Result<()> {
    write_text(path, &format_report_markdown(report))
}

fn write_line(out: &mut String, args: std::fmt::Arguments<'_>) {
    let _ = out.write_fmt(args);
}

fn write_section_header(out: &mut String, title: &str) {
    write_line(out, format_args!("\n## {title}\n\n"));
}

fn mean_cell(summary: Option<&MetricSummary>) -> String {
    let Some(summary) = summary else {
        return "-".to_string();
    };
    let mut cell = summary.mean.map_or_else(
        || "-".to_string(),
        |mean| format!("{mean:.3} (n={})", summary.scored),
    );
    if summary.failed > 0 {
        let _ = write!(cell, " [{} failed]", summary.failed);
    }
    cell
}

fn optional_cell(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| "-".to_string(), render)
}

fn threshold_cell(comparison: &MetricComparison) -> String {
    let mut parts = Vec::new();
    if let Some(min) = comparison.min_score {
        parts.push(format!(">= {min:.2}"));
    }
    if let Some(max) = comparison.max_regression {
        parts.push(format!("drop <= {:.0}%", max * 100.0));
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn format_report_markdown(report: &EvaluationReport) -> String {
    let mut out = String::new();
    write_header(&mut out, report);
    write_metrics_table(&mut out, report);
    write_gate(&mut out, report);
    write_failures(&mut out, report);
    out
}

fn write_header(out: &mut String, report: &EvaluationReport) {
    out.push_str("# Evaluation Report\n\n");
    write_line(out, format_args!("- run_id: `{}`\n", report.run_id));
    write_line(out, format_args!("- created_at: `{}`\n", report.created_at));
    write_line(
        out,
        format_args!(
            "- dataset: `{}` (`{}` cases, fingerprint `{}`)\n",
            report.dataset.path, report.dataset.cases, report.dataset.fingerprint
        ),
    );
    write_line(
        out,
        format_args!(
            "- baseline: `{}`, candidate: `{}`\n",
            report.baseline_label, report.candidate_label
        ),
    );
    write_line(
        out,
        format_args!(
            "- status: `{}`, verdict: **{}**\n",
            report.status.as_str(),
            report.gate.verdict.as_str().to_uppercase()
        ),
    );
    write_line(
        out,
        format_args!(
            "- cases: `{}` finished, `{}` hard failed, `{}` not run\n",
            report.counts.cases_finished,
            report.counts.cases_hard_failed,
            report.counts.cases_not_run
        ),
    );
    if report.dataset.unreviewed_ground_truth > 0 {
        write_line(
            out,
            format_args!(
                "- unreviewed ground truth: `{}` cases\n",
                report.dataset.unreviewed_ground_truth
            ),
        );
    }
    write_line(out, format_args!("- elapsed_ms: `{}`\n", report.elapsed_ms));
}

fn write_metrics_table(out: &mut String, report: &EvaluationReport) {
    write_section_header(out, "Metrics");
    out.push_str("| metric | baseline | candidate | delta | delta % | threshold | result |\n");
    out.push_str("|---|---|---|---|---|---|---|\n");
    for comparison in &report.metrics {
        write_line(
            out,
            format_args!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                comparison.metric,
                mean_cell(comparison.baseline.as_ref()),
                mean_cell(comparison.candidate.as_ref()),
                optional_cell(comparison.delta, |delta| format!("{delta:+.3}")),
                optional_cell(comparison.delta_pct, |pct| format!("{pct:+.2}%")),
                threshold_cell(comparison),
                if comparison.passed { "pass" } else { "fail" },
            ),
        );
    }
}

fn write_gate(out: &mut String, report: &EvaluationReport) {
    write_section_header(out, "Regressions");
    if report.gate.violations.is_empty() {
        out.push_str("- none\n");
    } else {
        for violation in &report.gate.violations {
            write_line(
                out,
                format_args!(
                    "- {} `{:?}`: expected `{}`, actual `{}`\n",
                    violation.metric, violation.kind, violation.expected, violation.actual
                ),
            );
        }
    }
    if !report.gate.inconclusive_reasons.is_empty() {
        write_section_header(out, "Inconclusive");
        for reason in &report.gate.inconclusive_reasons {
            write_line(out, format_args!("- {reason}\n"));
        }
    }
}

fn write_failures(out: &mut String, report: &EvaluationReport) {
    write_section_header(out, "Failures");
    if report.failures.is_empty() {
        out.push_str("- none\n");
        return;
    }
    for failure in report.failures.iter().take(MAX_MARKDOWN_FAILURES) {
        write_line(
            out,
            format_args!(
                "- [{:?}] `{}` {} (`{}`){} after {} attempt(s): {}\n",
                failure.stage,
                failure.test_id,
                failure.role,
                failure.model_label,
                failure
                    .metric
                    .as_deref()
                    .map(|metric| format!(" metric `{metric}`"))
                    .unwrap_or_default(),
                failure.attempts,
                failure.message
            ),
        );
    }
    if report.failures.len() > MAX_MARKDOWN_FAILURES {
        write_line(
            out,
            format_args!(
                "- ... {} more in the JSON report\n",
                report.failures.len() - MAX_MARKDOWN_FAILURES
            ),
        );
    }
}
