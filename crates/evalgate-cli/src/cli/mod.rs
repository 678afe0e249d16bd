use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod audit;
mod dataset;
mod evaluate;
mod parsers;


pub use audit::{AuditArgs, AuditFormat};
pub use dataset::{DatasetArgs, DatasetBuildArgs, DatasetCommand, SourceKindArg};
pub use evaluate::EvaluateArgs;

#[derive(Debug, Parser)]
#[command(name = "evalgate")]
#[command(
    about = "Golden dataset sampling and quality gating for model configuration migrations",
    version
)]
pub struct Cli {
    /// Optional TOML file with model, gate and run settings.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log progress at info level (RUST_LOG takes precedence).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan source code for parameters the migrated model rejects.
    Audit(AuditArgs),
    Dataset(DatasetArgs),
    /// Run a dataset against baseline and candidate and apply the quality gate.
    Evaluate(EvaluateArgs),
}
