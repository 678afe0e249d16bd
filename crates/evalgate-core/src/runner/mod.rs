use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::{EvalError, Result};
use crate::evaluator::{EvaluationInput, EvaluatorError, MetricEvaluator, check_range};
use crate::model_client::{InvokeError, ModelClient, ModelRequest};
use crate::models::{
    CaseFailure, CaseModelResult, CaseResult, FailureStage, MetricScore, MetricSummary,
    ModelConfiguration, ModelRole, RoleCounts, RunCounts, RunStatus, TestCase,
};

mod policy;
mod retry;
mod scoreboard;

pub use policy::{
    DEFAULT_ABORT_FAILURE_RATE, DEFAULT_BACKOFF_BASE_MS, DEFAULT_CALL_TIMEOUT_MS,
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, RunPolicy,
};
pub use scoreboard::{MetricAccumulator, ScoreBoard};

use retry::{Attempted, with_retry};

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub metrics: Vec<String>,
    pub counts: RunCounts,
    pub baseline: BTreeMap<String, MetricSummary>,
    pub candidate: BTreeMap<String, MetricSummary>,
    pub failures: Vec<CaseFailure>,
    pub cases: Option<Vec<CaseResult>>,
    pub elapsed: Duration,
}

struct CaseContext {
    client: Arc<dyn ModelClient>,
    evaluators: Vec<Arc<dyn MetricEvaluator>>,
    baseline: ModelConfiguration,
    candidate: ModelConfiguration,
    policy: RunPolicy,
    board: ScoreBoard,
}

impl CaseContext {
    const fn configuration(&self, role: ModelRole) -> &ModelConfiguration {
        match role {
            ModelRole::Baseline => &self.baseline,
            ModelRole::Candidate => &self.candidate,
        }
    }
}

struct CaseReport {
    position: usize,
    hard_failed: bool,
    responses: RoleCounts,
    transport_failures: RoleCounts,
    evaluator_failures: RoleCounts,
    scores_recorded: RoleCounts,
    failures: Vec<CaseFailure>,
    result: CaseResult,
}

impl CaseReport {
    fn new(position: usize, case: &TestCase, ctx: &CaseContext) -> Self {
        let empty = |role| CaseModelResult {
            model_label: ctx.configuration(role).label.clone(),
            response: None,
            scores: Vec::new(),
        };
        Self {
            position,
            hard_failed: false,
            responses: RoleCounts::default(),
            transport_failures: RoleCounts::default(),
            evaluator_failures: RoleCounts::default(),
            scores_recorded: RoleCounts::default(),
            failures: Vec::new(),
            result: CaseResult {
                test_id: case.test_id.clone(),
                baseline: empty(ModelRole::Baseline),
                candidate: empty(ModelRole::Candidate),
            },
        }
    }

    fn slot(&mut self, role: ModelRole) -> &mut CaseModelResult {
        match role {
            ModelRole::Baseline => &mut self.result.baseline,
            ModelRole::Candidate => &mut self.result.candidate,
        }
    }
}

/// Runs a dataset against a baseline and a candidate configuration and
/// aggregates evaluator scores per (configuration, metric).
pub struct EvaluationRunner {
    client: Arc<dyn ModelClient>,
    evaluators: Vec<Arc<dyn MetricEvaluator>>,
    policy: RunPolicy,
}

impl EvaluationRunner {
    pub fn new(
        client: Arc<dyn ModelClient>,
        evaluators: Vec<Arc<dyn MetricEvaluator>>,
        policy: RunPolicy,
    ) -> Result<Self> {
        policy.validate()?;
        if evaluators.is_empty() {
            return Err(EvalError::Config("no metrics selected for evaluation".to_string()));
        }
        Ok(Self {
            client,
            evaluators,
            policy,
        })
    }

    #[must_use]
    pub const fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    #[must_use]
    pub fn metric_names(&self) -> Vec<String> {
        self.evaluators
            .iter()
            .map(|evaluator| evaluator.name().to_string())
            .collect()
    }

    #[instrument(
        name = "evaluation_run",
        skip_all,
        fields(cases = cases.len(), baseline = %baseline.label, candidate = %candidate.label)
    )]
    pub async fn run(
        &self,
        cases: &[TestCase],
        baseline: &ModelConfiguration,
        candidate: &ModelConfiguration,
    ) -> RunOutcome {
        let started = Instant::now();
        let metrics = self.metric_names();
        let ctx = Arc::new(CaseContext {
            client: Arc::clone(&self.client),
            evaluators: self.evaluators.clone(),
            baseline: baseline.clone(),
            candidate: candidate.clone(),
            policy: self.policy.clone(),
            board: ScoreBoard::new(&metrics),
        });

        let semaphore = Arc::new(Semaphore::new(self.policy.concurrency));
        let mut tasks = JoinSet::new();
        for (position, case) in cases.iter().cloned().enumerate() {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                run_case(ctx, position, case).await
            });
        }

        let deadline = self.policy.run_timeout.map(|limit| started + limit);
        let mut status = RunStatus::Completed;
        let mut counts = RunCounts {
            cases_total: cases.len(),
            ..RunCounts::default()
        };
        let mut failures = Vec::new();
        let mut case_results = Vec::new();

        loop {
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(finished = counts.cases_finished, "run deadline elapsed");
                        status = RunStatus::Partial;
                        break;
                    }
                },
                None => tasks.join_next().await,
            };
            let Some(joined) = joined else {
                break;
            };
            counts.cases_finished += 1;
            match joined {
                Ok(report) => {
                    absorb(&mut counts, &report);
                    failures.extend(report.failures);
                    case_results.push((report.position, report.result));
                }
                Err(err) => {
                    warn!(error = %err, "case task failed");
                    counts.cases_hard_failed += 1;
                }
            }
            if self
                .policy
                .should_abort(counts.cases_hard_failed, counts.cases_total)
            {
                warn!(
                    hard_failed = counts.cases_hard_failed,
                    total = counts.cases_total,
                    threshold = self.policy.abort_failure_rate,
                    "failure threshold exceeded, aborting run"
                );
                status = RunStatus::Aborted;
                break;
            }
        }
        tasks.abort_all();
        counts.cases_not_run = counts.cases_total.saturating_sub(counts.cases_finished);

        case_results.sort_by_key(|(position, _)| *position);
        let cases = self
            .policy
            .include_cases
            .then(|| case_results.into_iter().map(|(_, result)| result).collect());

        let outcome = RunOutcome {
            status,
            metrics,
            baseline: ctx.board.summaries(ModelRole::Baseline),
            candidate: ctx.board.summaries(ModelRole::Candidate),
            counts,
            failures,
            cases,
            elapsed: started.elapsed(),
        };
        info!(
            status = outcome.status.as_str(),
            finished = outcome.counts.cases_finished,
            hard_failed = outcome.counts.cases_hard_failed,
            not_run = outcome.counts.cases_not_run,
            transport_failures = outcome.counts.transport_failures.total(),
            evaluator_failures = outcome.counts.evaluator_failures.total(),
            "evaluation run finished"
        );
        outcome
    }
}

fn absorb(counts: &mut RunCounts, report: &CaseReport) {
    if report.hard_failed {
        counts.cases_hard_failed += 1;
    }
    let add = |total: &mut RoleCounts, delta: RoleCounts| {
        total.baseline += delta.baseline;
        total.candidate += delta.candidate;
    };
    add(&mut counts.responses, report.responses);
    add(&mut counts.transport_failures, report.transport_failures);
    add(&mut counts.evaluator_failures, report.evaluator_failures);
    add(&mut counts.scores_recorded, report.scores_recorded);
}

async fn invoke_role(
    ctx: &CaseContext,
    case: &TestCase,
    role: ModelRole,
) -> Attempted<String, InvokeError> {
    let configuration = ctx.configuration(role);
    let request = ModelRequest::for_case(case, configuration);
    let label = format!("{}:{role}", case.test_id);
    with_retry(&ctx.policy, &label, || {
        ctx.client.invoke(configuration, &request)
    })
    .await
}

/// Both configurations are invoked first; a case is only scored when both
/// answered, so the two means always cover the same cases.
async fn run_case(ctx: Arc<CaseContext>, position: usize, case: TestCase) -> CaseReport {
    let mut report = CaseReport::new(position, &case, &ctx);
    let (baseline, candidate) = tokio::join!(
        invoke_role(&ctx, &case, ModelRole::Baseline),
        invoke_role(&ctx, &case, ModelRole::Candidate),
    );

    let mut responses = Vec::with_capacity(2);
    for (role, attempted) in [(ModelRole::Baseline, baseline), (ModelRole::Candidate, candidate)] {
        match attempted.result {
            Ok(response) => {
                report.responses.bump(role);
                report.slot(role).response = Some(response.clone());
                responses.push((role, response));
            }
            Err(err) => {
                report.hard_failed = true;
                report.transport_failures.bump(role);
                report.failures.push(CaseFailure {
                    test_id: case.test_id.clone(),
                    role,
                    model_label: ctx.configuration(role).label.clone(),
                    stage: FailureStage::Transport,
                    metric: None,
                    attempts: attempted.attempts,
                    message: err.to_string(),
                });
            }
        }
    }
    if report.hard_failed {
        // The pair is dropped from every mean, so each metric counts the
        // exclusion for both roles.
        for role in ModelRole::ALL {
            for evaluator in &ctx.evaluators {
                ctx.board.record_failure(role, evaluator.name());
            }
        }
        return report;
    }

    let mut scoring = JoinSet::new();
    let mut pending = HashMap::<Id, (ModelRole, String)>::new();
    for (role, response) in responses {
        let input = Arc::new(EvaluationInput::new(&case, &response));
        for evaluator in &ctx.evaluators {
            if evaluator.requires_ground_truth() && input.ground_truth.is_none() {
                continue;
            }
            let evaluator = Arc::clone(evaluator);
            let input = Arc::clone(&input);
            let ctx = Arc::clone(&ctx);
            let metric = evaluator.name().to_string();
            let label = format!("{}:{role}:{metric}", case.test_id);
            let handle = scoring.spawn(async move {
                with_retry(&ctx.policy, &label, || async {
                    let score = evaluator.score(&input).await?;
                    check_range(&*evaluator, score)
                })
                .await
            });
            pending.insert(handle.id(), (role, metric));
        }
    }

    while let Some(joined) = scoring.join_next_with_id().await {
        let (id, attempted) = match joined {
            Ok((id, attempted)) => (id, attempted),
            Err(err) => {
                warn!(test_id = %case.test_id, error = %err, "scoring task failed");
                let attempted = Attempted {
                    result: Err(EvaluatorError::TaskFailed(err.to_string())),
                    attempts: 1,
                };
                (err.id(), attempted)
            }
        };
        if let Some((role, metric)) = pending.remove(&id) {
            record_score(&ctx, &case, &mut report, role, &metric, attempted);
        }
    }
    for role in ModelRole::ALL {
        report
            .slot(role)
            .scores
            .sort_by(|left, right| left.metric.cmp(&right.metric));
    }
    report
}

fn record_score(
    ctx: &CaseContext,
    case: &TestCase,
    report: &mut CaseReport,
    role: ModelRole,
    metric: &str,
    attempted: Attempted<MetricScore, EvaluatorError>,
) {
    match attempted.result {
        Ok(score) => {
            ctx.board.record(role, metric, score.score);
            report.scores_recorded.bump(role);
            report.slot(role).scores.push(score);
        }
        Err(err) => {
            ctx.board.record_failure(role, metric);
            report.evaluator_failures.bump(role);
            report.failures.push(CaseFailure {
                test_id: case.test_id.clone(),
                role,
                model_label: ctx.configuration(role).label.clone(),
                stage: FailureStage::Evaluator,
                metric: Some(metric.to_string()),
                attempts: attempted.attempts,
                message: err.to_string(),
            });
        }
    }
}
