use std::sync::Arc;

use async_trait::async_trait;

use super::{EvaluationInput, EvaluatorError, MetricEvaluator};
use crate::llm_io::parse_judgement;
use crate::model_client::{ModelClient, ModelRequest};
use crate::models::{MetricScore, ModelConfiguration};
use crate::text::truncate_text;

const NO_CONTEXT: &str = "No additional context provided.";
const JUDGE_OUTPUT_CONTRACT: &str = "Rate on an integer scale from 1 (worst) to 5 (best). \
Reply with JSON only: {\"score\": <1-5>, \"reason\": \"<one sentence>\"}.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeMetric {
    Coherence,
    Fluency,
    Relevance,
    Groundedness,
    Similarity,
}

impl JudgeMetric {
    pub const ALL: [Self; 5] = [
        Self::Coherence,
        Self::Fluency,
        Self::Relevance,
        Self::Groundedness,
        Self::Similarity,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Coherence => "coherence",
            Self::Fluency => "fluency",
            Self::Relevance => "relevance",
            Self::Groundedness => "groundedness",
            Self::Similarity => "similarity",
        }
    }

    const fn rubric(self) -> &'static str {
        match self {
            Self::Coherence => {
                "You grade COHERENCE: whether the response reads as a logically ordered, \
                 well-connected answer to the query."
            }
            Self::Fluency => {
                "You grade FLUENCY: grammar, word choice and readability of the response, \
                 independent of correctness."
            }
            Self::Relevance => {
                "You grade RELEVANCE: how well the response addresses the query given the \
                 supplied context."
            }
            Self::Groundedness => {
                "You grade GROUNDEDNESS: whether every claim in the response is supported by \
                 the supplied context."
            }
            Self::Similarity => {
                "You grade SIMILARITY: how closely the response matches the meaning of the \
                 ground-truth answer."
            }
        }
    }

    const fn uses_context(self) -> bool {
        matches!(self, Self::Relevance | Self::Groundedness)
    }
}

/// LLM-as-judge metric scored through the same chat boundary as the models
/// under test.
pub struct JudgeEvaluator {
    metric: JudgeMetric,
    client: Arc<dyn ModelClient>,
    judge: ModelConfiguration,
}

impl JudgeEvaluator {
    #[must_use]
    pub fn new(metric: JudgeMetric, client: Arc<dyn ModelClient>, judge: ModelConfiguration) -> Self {
        Self {
            metric,
            client,
            judge,
        }
    }

    fn request(&self, input: &EvaluationInput) -> std::result::Result<ModelRequest, EvaluatorError> {
        let mut user = format!("Query:\n{}\n\nResponse:\n{}\n", input.query, input.response);
        if self.metric.uses_context() {
            let context = input.context.as_deref().unwrap_or(NO_CONTEXT);
            user.push_str(&format!("\nContext:\n{context}\n"));
        }
        if self.metric == JudgeMetric::Similarity {
            let ground_truth = input
                .ground_truth
                .as_deref()
                .ok_or(EvaluatorError::MissingInput("ground_truth"))?;
            user.push_str(&format!("\nGround truth:\n{ground_truth}\n"));
        }
        Ok(ModelRequest {
            instruction: format!("{}\n{JUDGE_OUTPUT_CONTRACT}", self.metric.rubric()),
            user,
        })
    }
}

#[async_trait]
impl MetricEvaluator for JudgeEvaluator {
    fn name(&self) -> &str {
        self.metric.name()
    }

    fn requires_ground_truth(&self) -> bool {
        self.metric == JudgeMetric::Similarity
    }

    async fn score(
        &self,
        input: &EvaluationInput,
    ) -> std::result::Result<MetricScore, EvaluatorError> {
        let request = self.request(input)?;
        let output = self.client.invoke(&self.judge, &request).await?;
        let (score, rationale) = parse_judgement(&output)
            .ok_or_else(|| EvaluatorError::Unparsable(truncate_text(output.trim(), 120)))?;
        Ok(MetricScore {
            metric: self.name().to_string(),
            score,
            rationale,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model_client::InvokeError;

    struct RecordingJudge {
        reply: String,
        seen: Mutex<Vec<ModelRequest>>,
    }

    #[async_trait]
    impl ModelClient for RecordingJudge {
        async fn invoke(
            &self,
            _configuration: &ModelConfiguration,
            request: &ModelRequest,
        ) -> std::result::Result<String, InvokeError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request.clone());
            }
            Ok(self.reply.clone())
        }
    }

    fn input() -> EvaluationInput {
        EvaluationInput {
            query: "Is roaming included?".to_string(),
            response: "Yes, in 40 countries.".to_string(),
            context: None,
            ground_truth: Some("Roaming is included in 40 countries.".to_string()),
        }
    }

    fn judge(metric: JudgeMetric, reply: &str) -> (JudgeEvaluator, Arc<RecordingJudge>) {
        let client = Arc::new(RecordingJudge {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let evaluator = JudgeEvaluator::new(
            metric,
            Arc::clone(&client) as Arc<dyn ModelClient>,
            ModelConfiguration::legacy_chat(),
        );
        (evaluator, client)
    }

    #[tokio::test]
    async fn groundedness_prompt_falls_back_to_no_context_marker() {
        let (evaluator, client) = judge(JudgeMetric::Groundedness, "{\"score\": 4, \"reason\": \"ok\"}");
        let score = evaluator.score(&input()).await.expect("score");
        assert!((score.score - 4.0).abs() < f64::EPSILON);
        assert_eq!(score.rationale.as_deref(), Some("ok"));
        let seen = client.seen.lock().expect("lock");
        assert!(seen[0].user.contains(NO_CONTEXT));
        assert!(seen[0].instruction.contains("GROUNDEDNESS"));
    }

    #[tokio::test]
    async fn similarity_prompt_includes_ground_truth() {
        let (evaluator, client) = judge(JudgeMetric::Similarity, "score: 5");
        assert!(evaluator.requires_ground_truth());
        evaluator.score(&input()).await.expect("score");
        let seen = client.seen.lock().expect("lock");
        assert!(seen[0].user.contains("Ground truth:\nRoaming is included"));
    }

    #[tokio::test]
    async fn unreadable_judgement_is_retryable_error() {
        let (evaluator, _) = judge(JudgeMetric::Fluency, "I cannot grade this.");
        let err = evaluator.score(&input()).await.expect_err("unparsable");
        assert!(matches!(err, EvaluatorError::Unparsable(_)));
        assert!(err.is_retryable());
    }
}
