mod audit;
mod build;
mod dataset;
mod interaction;
mod model;
mod report;

pub use audit::{AuditFinding, AuditReport, AuditSeverityCounts, Severity};
pub use build::{DatasetBuildReport, ExtractionCounts, FormattingCounts, SamplingCounts};
pub use dataset::{DatasetSummary, Difficulty, TestCase, UNREVIEWED_GROUND_TRUTH_TAG};
pub use interaction::{RawInteraction, SourceKind, UNKNOWN_CATEGORY};
pub use model::{
    GenerationParams, MessageRole, MetricScore, ModelConfiguration, ModelResponse, ModelRole,
    ReasoningEffort, ScoreRange, TokenLimitField,
};
pub use report::{
    CaseFailure, CaseModelResult, CaseResult, EvaluationReport, FailureStage, GateDecision,
    GateViolation, MetricComparison, MetricSummary, RoleCounts, RunCounts, RunStatus, Verdict,
    ViolationKind,
};
