use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand, ValueEnum};

use super::parsers::{parse_field_override, parse_rfc3339_utc};

#[derive(Debug, Args)]
pub struct DatasetArgs {
    #[command(subcommand)]
    pub command: DatasetCommand,
}

#[derive(Debug, Subcommand)]
pub enum DatasetCommand {
    /// Extract, sample and format production logs into a golden dataset.
    Build(DatasetBuildArgs),
    /// Parse a dataset strictly and summarize it.
    Validate {
        #[arg(long)]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKindArg {
    DocumentStore,
    LogAnalytics,
    FlatExport,
}

#[derive(Debug, Args)]
pub struct DatasetBuildArgs {
    #[arg(long, value_enum)]
    pub source_kind: SourceKindArg,
    #[arg(long)]
    pub source: PathBuf,
    /// Table holding one JSON document per row (document-store only).
    #[arg(long, default_value = "interactions")]
    pub table: String,
    #[arg(long, default_value = evalgate_core::extract::DEFAULT_DOCUMENT_COLUMN)]
    pub column: String,
    #[arg(long)]
    pub size: usize,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, default_value_t = evalgate_core::sample::DEFAULT_FLOOR_MINIMUM)]
    pub floor_minimum: usize,
    #[arg(long)]
    pub category: Vec<String>,
    #[arg(long, value_parser = parse_rfc3339_utc)]
    pub since: Option<DateTime<Utc>>,
    #[arg(long)]
    pub model: Option<String>,
    /// Source field override such as `query=prompt`; repeatable.
    #[arg(long = "field", value_parser = parse_field_override)]
    pub fields: Vec<String>,
    #[arg(long)]
    pub output: PathBuf,
}
