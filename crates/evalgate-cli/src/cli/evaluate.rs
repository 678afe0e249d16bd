use std::path::PathBuf;

use clap::Args;

use super::parsers::{parse_min_one_u64, parse_min_one_usize, parse_unit_interval_f64};

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub dataset: PathBuf,
    /// Model configuration id (built-in or from the config file).
    #[arg(long)]
    pub baseline: String,
    #[arg(long)]
    pub candidate: String,
    /// Comma-separated metric names; defaults to every registered metric.
    #[arg(long, value_delimiter = ',')]
    pub metrics: Vec<String>,
    /// JSON report path; the markdown summary lands beside it.
    #[arg(long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub markdown: Option<PathBuf>,
    #[arg(long, value_parser = parse_min_one_usize)]
    pub concurrency: Option<usize>,
    #[arg(long, value_parser = parse_min_one_u64)]
    pub call_timeout_secs: Option<u64>,
    #[arg(long, value_parser = parse_min_one_u64)]
    pub run_timeout_secs: Option<u64>,
    #[arg(long, value_parser = parse_unit_interval_f64)]
    pub abort_failure_rate: Option<f64>,
    #[arg(long, default_value_t = false)]
    pub include_cases: bool,
    /// Refuse datasets whose ground truth has not been reviewed.
    #[arg(long, default_value_t = false)]
    pub require_reviewed: bool,
}
