use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::dataset::{format_records, load_dataset, write_dataset};
use crate::error::{EvalError, Result};
use crate::evaluator::EvaluatorRegistry;
use crate::extract::{ExtractFilters, FieldMap, LogSource, extract};
use crate::gate::QualityGatePolicy;
use crate::model_client::ModelClient;
use crate::models::{DatasetBuildReport, EvaluationReport, ModelConfiguration};
use crate::report::build_report;
use crate::runner::{EvaluationRunner, RunPolicy};
use crate::sample::{SampleRequest, rng_from_seed, stratified_sample};

#[derive(Debug, Clone)]
pub struct DatasetBuildRequest {
    pub source: LogSource,
    pub fields: FieldMap,
    pub filters: ExtractFilters,
    pub sample: SampleRequest,
    pub seed: Option<u64>,
    pub output: PathBuf,
}

/// Extract, sample and format in sequence, then write the dataset file.
pub fn build_dataset(request: &DatasetBuildRequest) -> Result<DatasetBuildReport> {
    let extraction = extract(&request.source, &request.fields, &request.filters)?;
    let mut rng = rng_from_seed(request.seed);
    let sampled = stratified_sample(&extraction.records, &request.sample, &mut rng)?;
    let formatted = format_records(&sampled.selected);
    if formatted.cases.is_empty() {
        return Err(EvalError::Validation(format!(
            "no test cases produced from {} ({} scanned, {} skipped, {} filtered out, {} sampled)",
            request.source.path().display(),
            extraction.scanned,
            extraction.skipped,
            extraction.filtered_out,
            sampled.selected.len()
        )));
    }

    let fingerprint = write_dataset(&request.output, &formatted.cases)?;
    info!(
        output = %request.output.display(),
        cases = formatted.cases.len(),
        fingerprint = %fingerprint,
        "golden dataset written"
    );
    Ok(DatasetBuildReport {
        created_at: Utc::now().to_rfc3339(),
        source: request.source.kind(),
        source_path: request.source.path().display().to_string(),
        output_path: request.output.display().to_string(),
        fingerprint,
        extraction: extraction.counts(),
        sampling: sampled.counts(request.seed),
        formatting: formatted.counts,
    })
}

#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub dataset: PathBuf,
    pub baseline: ModelConfiguration,
    pub candidate: ModelConfiguration,
    /// Empty selects every registered metric.
    pub metrics: Vec<String>,
    pub policy: RunPolicy,
    pub gate: QualityGatePolicy,
}

fn check_reviewed(dataset: &Path, unreviewed: usize, policy: &RunPolicy) -> Result<()> {
    if unreviewed == 0 {
        return Ok(());
    }
    if policy.require_reviewed_ground_truth {
        return Err(EvalError::Validation(format!(
            "dataset {} has {unreviewed} cases with unreviewed ground truth",
            dataset.display()
        )));
    }
    warn!(
        dataset = %dataset.display(),
        unreviewed,
        "gating against unreviewed ground truth"
    );
    Ok(())
}

/// Loads the dataset, runs both configurations through the selected metrics
/// and returns the gated report.
pub async fn run_evaluation(
    client: Arc<dyn ModelClient>,
    registry: &EvaluatorRegistry,
    request: EvaluationRequest,
) -> Result<EvaluationReport> {
    request.gate.validate()?;
    let loaded = load_dataset(&request.dataset)?;
    check_reviewed(
        &request.dataset,
        loaded.summary.unreviewed_ground_truth,
        &request.policy,
    )?;
    let evaluators = registry.resolve(&request.metrics)?;
    let runner = EvaluationRunner::new(client, evaluators, request.policy)?;
    let outcome = runner
        .run(&loaded.cases, &request.baseline, &request.candidate)
        .await;
    Ok(build_report(
        loaded.summary,
        &request.baseline,
        &request.candidate,
        outcome,
        &request.gate,
        Vec::new(),
    ))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::evaluator::LexicalSimilarityEvaluator;
    use crate::model_client::{InvokeError, ModelRequest};
    use crate::models::{RunStatus, SourceKind, Verdict};

    fn write_log_export(path: &Path) {
        let mut raw = String::new();
        for (index, category) in ["billing", "outage", "roaming"].iter().cycle().take(30).enumerate() {
            let line = json!({
                "operation_Id": format!("op-{index}"),
                "timestamp": "2026-03-01T10:00:00Z",
                "customDimensions": {
                    "query": format!("question {index}"),
                    "response": format!("answer {index}"),
                    "category": category,
                    "language": "en",
                    "model": "gpt-4o"
                }
            });
            raw.push_str(&line.to_string());
            raw.push('\n');
        }
        raw.push_str("{broken\n");
        fs::write(path, raw).expect("write export");
    }

    fn build_request(dir: &Path, size: usize) -> DatasetBuildRequest {
        let export = dir.join("export.jsonl");
        write_log_export(&export);
        let mut sample = SampleRequest::new(size);
        sample.floor_minimum = 2;
        DatasetBuildRequest {
            source: LogSource::LogAnalytics { path: export },
            fields: FieldMap::defaults_for(SourceKind::LogAnalytics),
            filters: ExtractFilters::default(),
            sample,
            seed: Some(7),
            output: dir.join("golden/golden.jsonl"),
        }
    }

    #[test]
    fn build_dataset_reports_every_stage() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = build_request(temp.path(), 12);
        let report = build_dataset(&request).expect("build");

        assert_eq!(report.source, SourceKind::LogAnalytics);
        assert_eq!(report.extraction.scanned, 31);
        assert_eq!(report.extraction.normalized, 30);
        assert_eq!(report.extraction.skipped, 1);
        assert_eq!(report.sampling.selected, 12);
        assert_eq!(report.sampling.per_category.len(), 3);
        assert_eq!(report.sampling.seed, Some(7));
        assert_eq!(report.formatting.emitted, 12);

        let loaded = load_dataset(&request.output).expect("load");
        assert_eq!(loaded.cases.len(), 12);
        assert_eq!(loaded.summary.fingerprint, report.fingerprint);
        assert_eq!(loaded.summary.unreviewed_ground_truth, 12);
    }

    #[test]
    fn same_seed_writes_identical_datasets() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");
        let a = build_dataset(&build_request(first.path(), 9)).expect("build");
        let b = build_dataset(&build_request(second.path(), 9)).expect("build");
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn filters_that_drop_everything_fail_the_build() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut request = build_request(temp.path(), 5);
        request.filters.model = Some("gpt-5.1".to_string());
        let err = build_dataset(&request).expect_err("empty");
        assert!(matches!(err, EvalError::Validation(_)));
        assert!(!request.output.exists());
    }

    struct AnswerClient;

    #[async_trait]
    impl ModelClient for AnswerClient {
        async fn invoke(
            &self,
            _configuration: &ModelConfiguration,
            request: &ModelRequest,
        ) -> std::result::Result<String, InvokeError> {
            Ok(request.user.replace("question", "answer"))
        }
    }

    fn evaluation_request(dataset: PathBuf, require_reviewed: bool) -> EvaluationRequest {
        EvaluationRequest {
            dataset,
            baseline: ModelConfiguration::legacy_chat(),
            candidate: ModelConfiguration::migrated_reasoning(),
            metrics: vec!["lexical_similarity".to_string()],
            policy: RunPolicy {
                backoff_base: Duration::from_millis(1),
                require_reviewed_ground_truth: require_reviewed,
                ..RunPolicy::default()
            },
            gate: QualityGatePolicy::default(),
        }
    }

    fn registry() -> EvaluatorRegistry {
        let mut registry = EvaluatorRegistry::default();
        registry.register(Arc::new(LexicalSimilarityEvaluator));
        registry
    }

    #[tokio::test]
    async fn evaluation_of_built_dataset_passes_when_answers_match() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = build_request(temp.path(), 6);
        build_dataset(&request).expect("build");

        let report = run_evaluation(
            Arc::new(AnswerClient),
            &registry(),
            evaluation_request(request.output.clone(), false),
        )
        .await
        .expect("evaluate");
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.gate.verdict, Verdict::Pass);
        assert_eq!(report.dataset.cases, 6);
        assert_eq!(report.dataset.unreviewed_ground_truth, 6);
        let similarity = report.metric("lexical_similarity").expect("metric");
        let candidate = similarity.candidate.as_ref().expect("candidate");
        assert!((candidate.mean.expect("mean") - 5.0).abs() < 1e-9);
        assert_eq!(candidate.scored, 6);
    }

    #[tokio::test]
    async fn unreviewed_ground_truth_can_be_refused() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = build_request(temp.path(), 3);
        build_dataset(&request).expect("build");
        let err = run_evaluation(
            Arc::new(AnswerClient),
            &registry(),
            evaluation_request(request.output.clone(), true),
        )
        .await
        .expect_err("refused");
        assert!(err.to_string().contains("unreviewed ground truth"));
    }

    #[tokio::test]
    async fn unknown_metric_is_a_config_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = build_request(temp.path(), 3);
        build_dataset(&request).expect("build");
        let mut evaluation = evaluation_request(request.output.clone(), false);
        evaluation.metrics = vec!["bleu".to_string()];
        let err = run_evaluation(Arc::new(AnswerClient), &registry(), evaluation)
            .await
            .expect_err("unknown");
        assert!(matches!(err, EvalError::Config(_)));
    }
}
