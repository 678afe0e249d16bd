use std::process::ExitCode;

use anyhow::{Context, Result};
use evalgate_core::config::AppConfig;
use evalgate_core::models::Verdict;

use crate::cli::{Cli, Commands, DatasetCommand};

mod audit;
mod dataset;
mod evaluate;
mod support;


pub(crate) const EXIT_GATE_FAILED: u8 = 1;
pub(crate) const EXIT_ERROR: u8 = 2;
pub(crate) const EXIT_INCONCLUSIVE: u8 = 3;

/// Designed outcomes of a command that completed. Errors travel separately
/// and always map to [`EXIT_ERROR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandStatus {
    Success,
    GateFailed,
    Inconclusive,
}

impl CommandStatus {
    pub(crate) const fn from_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => Self::Success,
            Verdict::Fail => Self::GateFailed,
            Verdict::Inconclusive => Self::Inconclusive,
        }
    }

    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::GateFailed => EXIT_GATE_FAILED,
            Self::Inconclusive => EXIT_INCONCLUSIVE,
        }
    }

    pub(crate) fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

pub(crate) fn run(cli: Cli) -> Result<CommandStatus> {
    match cli.command {
        Commands::Audit(args) => audit::handle_audit(&args),
        Commands::Dataset(args) => match args.command {
            DatasetCommand::Build(args) => dataset::handle_build(&args),
            DatasetCommand::Validate { path } => dataset::handle_validate(&path),
        },
        Commands::Evaluate(args) => {
            let config = AppConfig::load(cli.config.as_deref())
                .context("failed to load configuration")?;
            evaluate::handle_evaluate(config, args)
        }
    }
}
