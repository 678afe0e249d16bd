use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{EvalError, Result};
use crate::model_client::{InvokeError, ModelClient};
use crate::models::{MetricScore, ModelConfiguration, ScoreRange, TestCase};

mod judge;
mod lexical;

pub use judge::{JudgeEvaluator, JudgeMetric};
pub use lexical::{LexicalSimilarityEvaluator, token_f1};

/// What one evaluator sees for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationInput {
    pub query: String,
    pub response: String,
    pub context: Option<String>,
    pub ground_truth: Option<String>,
}

impl EvaluationInput {
    #[must_use]
    pub fn new(case: &TestCase, response: &str) -> Self {
        Self {
            query: case.query.clone(),
            response: response.to_string(),
            context: case.context_text(),
            ground_truth: Some(case.ground_truth.clone()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EvaluatorError {
    #[error("judge call failed: {0}")]
    Transport(#[from] InvokeError),

    #[error("could not read a score from judge output: {0}")]
    Unparsable(String),

    #[error("score {score} outside range {min}..={max}")]
    OutOfRange { score: f64, min: f64, max: f64 },

    #[error("missing evaluator input: {0}")]
    MissingInput(&'static str),

    #[error("scoring task did not finish: {0}")]
    TaskFailed(String),
}

impl EvaluatorError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Unparsable(_) => true,
            Self::OutOfRange { .. } | Self::MissingInput(_) | Self::TaskFailed(_) => false,
        }
    }
}

#[async_trait]
pub trait MetricEvaluator: Send + Sync {
    fn name(&self) -> &str;

    fn requires_ground_truth(&self) -> bool {
        false
    }

    fn range(&self) -> ScoreRange {
        ScoreRange::LIKERT
    }

    async fn score(&self, input: &EvaluationInput)
    -> std::result::Result<MetricScore, EvaluatorError>;
}

/// Checks a score against the evaluator's declared range.
pub fn check_range(
    evaluator: &dyn MetricEvaluator,
    score: MetricScore,
) -> std::result::Result<MetricScore, EvaluatorError> {
    let range = evaluator.range();
    if range.contains(score.score) {
        Ok(score)
    } else {
        Err(EvaluatorError::OutOfRange {
            score: score.score,
            min: range.min,
            max: range.max,
        })
    }
}

#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: BTreeMap<String, Arc<dyn MetricEvaluator>>,
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("evaluators", &self.names())
            .finish()
    }
}

impl EvaluatorRegistry {
    /// Judge metrics over `client` using `judge`, plus the offline lexical
    /// similarity metric.
    #[must_use]
    pub fn with_builtin(client: Arc<dyn ModelClient>, judge: ModelConfiguration) -> Self {
        let mut registry = Self::default();
        for metric in JudgeMetric::ALL {
            registry.register(Arc::new(JudgeEvaluator::new(
                metric,
                Arc::clone(&client),
                judge.clone(),
            )));
        }
        registry.register(Arc::new(LexicalSimilarityEvaluator));
        registry
    }

    pub fn register(&mut self, evaluator: Arc<dyn MetricEvaluator>) {
        self.evaluators
            .insert(evaluator.name().to_string(), evaluator);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn MetricEvaluator>> {
        self.evaluators.get(name).cloned()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.evaluators.keys().cloned().collect()
    }

    /// Resolves names in the order given; an empty list selects every
    /// registered evaluator.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn MetricEvaluator>>> {
        if names.is_empty() {
            return Ok(self.evaluators.values().cloned().collect());
        }
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim();
            if resolved
                .iter()
                .any(|existing: &Arc<dyn MetricEvaluator>| existing.name() == name)
            {
                continue;
            }
            let evaluator = self.get(name).ok_or_else(|| {
                EvalError::Config(format!(
                    "unknown metric '{name}' (available: {})",
                    self.names().join(", ")
                ))
            })?;
            resolved.push(evaluator);
        }
        Ok(resolved)
    }
}
