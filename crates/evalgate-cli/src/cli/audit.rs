use std::path::PathBuf;

use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuditFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    #[arg(long, short)]
    pub path: PathBuf,
    #[arg(long, short, value_enum, default_value_t = AuditFormat::Text)]
    pub format: AuditFormat,
    /// Additional directory or path globs to skip; repeatable.
    #[arg(long, short)]
    pub exclude: Vec<String>,
    /// Write the report here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}
