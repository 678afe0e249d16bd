use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use evalgate_core::config::{AppConfig, ENDPOINT_ENV};
use evalgate_core::evaluator::EvaluatorRegistry;
use evalgate_core::model_client::{ChatCompletionsClient, ModelClient};
use evalgate_core::models::EvaluationReport;
use evalgate_core::pipeline::{EvaluationRequest, run_evaluation};
use evalgate_core::report::{write_report_json, write_report_markdown};
use evalgate_core::runner::RunPolicy;
use serde_json::json;
use tracing::info;

use super::CommandStatus;
use super::support::print_json;
use crate::cli::EvaluateArgs;

/// Flags sit on top of the file and environment layers.
pub(super) fn apply_run_flags(policy: &mut RunPolicy, args: &EvaluateArgs) {
    if let Some(concurrency) = args.concurrency {
        policy.concurrency = concurrency;
    }
    if let Some(secs) = args.call_timeout_secs {
        policy.call_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.run_timeout_secs {
        policy.run_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(rate) = args.abort_failure_rate {
        policy.abort_failure_rate = rate;
    }
    if args.include_cases {
        policy.include_cases = true;
    }
    if args.require_reviewed {
        policy.require_reviewed_ground_truth = true;
    }
}

/// Explicit `--markdown` wins; otherwise the summary sits beside the JSON
/// report.
pub(super) fn markdown_path(args: &EvaluateArgs) -> Option<PathBuf> {
    args.markdown
        .clone()
        .or_else(|| args.output.as_deref().map(|path| path.with_extension("md")))
}

fn write_outputs(report: &EvaluationReport, json: Option<&Path>, markdown: Option<&Path>) -> Result<()> {
    if let Some(path) = json {
        write_report_json(path, report)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!(path = %path.display(), "evaluation report saved");
    }
    if let Some(path) = markdown {
        write_report_markdown(path, report)
            .with_context(|| format!("failed to write summary {}", path.display()))?;
    }
    Ok(())
}

pub(super) fn handle_evaluate(mut config: AppConfig, args: EvaluateArgs) -> Result<CommandStatus> {
    apply_run_flags(&mut config.run, &args);
    config.run.validate()?;

    let baseline = config.model(&args.baseline)?;
    let candidate = config.model(&args.candidate)?;
    let judge = config
        .model(&config.judge_model)
        .context("judge model is not configured")?;
    let endpoint = config.endpoint.as_deref().with_context(|| {
        format!("no model endpoint configured; set {ENDPOINT_ENV} or `endpoint` in the config file")
    })?;
    let client: Arc<dyn ModelClient> = Arc::new(ChatCompletionsClient::new(
        endpoint,
        config.api_key.clone(),
        config.run.call_timeout,
    )?);
    let registry = EvaluatorRegistry::with_builtin(Arc::clone(&client), judge);

    let request = EvaluationRequest {
        dataset: args.dataset.clone(),
        baseline,
        candidate,
        metrics: args.metrics.clone(),
        policy: config.run.clone(),
        gate: config.gate.clone(),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let report = runtime
        .block_on(run_evaluation(client, &registry, request))
        .with_context(|| format!("evaluation of {} failed", args.dataset.display()))?;

    let markdown = markdown_path(&args);
    write_outputs(&report, args.output.as_deref(), markdown.as_deref())?;
    match args.output.as_deref() {
        Some(path) => print_json(&json!({
            "run_id": report.run_id,
            "status": report.status,
            "verdict": report.gate.verdict,
            "violations": report.gate.violations,
            "inconclusive_reasons": report.gate.inconclusive_reasons,
            "report": path.display().to_string(),
            "markdown": markdown.as_deref().map(|path| path.display().to_string()),
        }))?,
        None => print_json(&report)?,
    }
    Ok(CommandStatus::from_verdict(report.gate.verdict))
}
