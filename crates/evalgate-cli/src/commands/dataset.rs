use std::path::Path;

use anyhow::{Context, Result};
use evalgate_core::dataset::load_dataset;
use evalgate_core::extract::{ExtractFilters, FieldMap, LogSource};
use evalgate_core::pipeline::{DatasetBuildRequest, build_dataset};
use evalgate_core::sample::SampleRequest;

use super::CommandStatus;
use super::support::print_json;
use crate::cli::{DatasetBuildArgs, SourceKindArg};

pub(super) fn log_source(args: &DatasetBuildArgs) -> LogSource {
    let path = args.source.clone();
    match args.source_kind {
        SourceKindArg::DocumentStore => LogSource::DocumentStore {
            path,
            table: args.table.clone(),
            column: args.column.clone(),
        },
        SourceKindArg::LogAnalytics => LogSource::LogAnalytics { path },
        SourceKindArg::FlatExport => LogSource::FlatExport { path },
    }
}

pub(super) fn build_request(args: &DatasetBuildArgs) -> Result<DatasetBuildRequest> {
    let source = log_source(args);
    let mut fields = FieldMap::defaults_for(source.kind());
    fields.apply_overrides(args.fields.iter().map(String::as_str))?;
    Ok(DatasetBuildRequest {
        source,
        fields,
        filters: ExtractFilters {
            categories: args.category.clone(),
            since: args.since,
            model: args.model.clone(),
        },
        sample: SampleRequest {
            size: args.size,
            categories: args.category.clone(),
            floor_minimum: args.floor_minimum,
        },
        seed: args.seed,
        output: args.output.clone(),
    })
}

pub(super) fn handle_build(args: &DatasetBuildArgs) -> Result<CommandStatus> {
    let request = build_request(args)?;
    let report = build_dataset(&request)
        .with_context(|| format!("dataset build from {} failed", args.source.display()))?;
    print_json(&report)?;
    Ok(CommandStatus::Success)
}

pub(super) fn handle_validate(path: &Path) -> Result<CommandStatus> {
    let loaded = load_dataset(path)
        .with_context(|| format!("dataset {} is invalid", path.display()))?;
    print_json(&loaded.summary)?;
    Ok(CommandStatus::Success)
}
