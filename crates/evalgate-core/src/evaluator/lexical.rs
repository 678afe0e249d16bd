use std::collections::HashMap;

use async_trait::async_trait;

use super::{EvaluationInput, EvaluatorError, MetricEvaluator};
use crate::models::MetricScore;

fn tokens(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Token-overlap F1 between two texts, in `[0, 1]`.
#[must_use]
pub fn token_f1(candidate: &str, reference: &str) -> f64 {
    let candidate = tokens(candidate);
    let reference = tokens(reference);
    if candidate.is_empty() || reference.is_empty() {
        return if candidate.is_empty() && reference.is_empty() {
            1.0
        } else {
            0.0
        };
    }

    let mut remaining = HashMap::<&str, usize>::new();
    for token in &reference {
        *remaining.entry(token.as_str()).or_default() += 1;
    }
    let mut overlap = 0usize;
    for token in &candidate {
        if let Some(count) = remaining.get_mut(token.as_str())
            && *count > 0
        {
            *count -= 1;
            overlap += 1;
        }
    }
    if overlap == 0 {
        return 0.0;
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "token counts of a single response are far below f64 precision limits"
    )]
    let (overlap, candidate_len, reference_len) = (
        overlap as f64,
        candidate.len() as f64,
        reference.len() as f64,
    );
    let precision = overlap / candidate_len;
    let recall = overlap / reference_len;
    2.0 * precision * recall / (precision + recall)
}

/// Offline similarity against ground truth, mapped onto the 1–5 scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSimilarityEvaluator;

#[async_trait]
impl MetricEvaluator for LexicalSimilarityEvaluator {
    fn name(&self) -> &str {
        "lexical_similarity"
    }

    fn requires_ground_truth(&self) -> bool {
        true
    }

    async fn score(
        &self,
        input: &EvaluationInput,
    ) -> std::result::Result<MetricScore, EvaluatorError> {
        let ground_truth = input
            .ground_truth
            .as_deref()
            .ok_or(EvaluatorError::MissingInput("ground_truth"))?;
        let f1 = token_f1(&input.response, ground_truth);
        Ok(MetricScore {
            metric: self.name().to_string(),
            score: 1.0 + 4.0 * f1,
            rationale: Some(format!("token F1 {f1:.3}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_score_one() {
        assert!((token_f1("Restart your router.", "restart YOUR router") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        assert!(token_f1("hello there", "goodbye now").abs() < 1e-9);
        assert!(token_f1("", "something").abs() < 1e-9);
    }

    #[test]
    fn partial_overlap_is_harmonic_mean() {
        // precision 2/4, recall 2/2
        let f1 = token_f1("your bill is due", "bill due");
        assert!((f1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn evaluator_maps_f1_to_likert_scale() {
        let input = EvaluationInput {
            query: "When is my bill due?".to_string(),
            response: "Your bill is due on the 1st of each month.".to_string(),
            context: None,
            ground_truth: Some("Your bill is due on the 1st of each month.".to_string()),
        };
        let score = LexicalSimilarityEvaluator.score(&input).await.expect("score");
        assert!((score.score - 5.0).abs() < 1e-9);

        let missing = EvaluationInput {
            ground_truth: None,
            ..input
        };
        assert!(LexicalSimilarityEvaluator.score(&missing).await.is_err());
    }
}
