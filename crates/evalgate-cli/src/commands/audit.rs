use anyhow::{Context, Result};
use evalgate_core::audit::{AuditOptions, format_audit_text, scan_path};
use tracing::info;

use super::CommandStatus;
use super::support::emit;
use crate::cli::{AuditArgs, AuditFormat};

pub(super) fn handle_audit(args: &AuditArgs) -> Result<CommandStatus> {
    let options = AuditOptions {
        exclude: args.exclude.clone(),
    };
    let report = scan_path(&args.path, &options)
        .with_context(|| format!("audit of {} failed", args.path.display()))?;
    let rendered = match args.format {
        AuditFormat::Text => format_audit_text(&report),
        AuditFormat::Json => serde_json::to_string_pretty(&report)?,
    };
    emit(&rendered, args.output.as_deref())?;
    if let Some(output) = args.output.as_deref() {
        info!(path = %output.display(), "audit report saved");
    }

    Ok(if report.has_blocking_findings() {
        CommandStatus::GateFailed
    } else {
        CommandStatus::Success
    })
}
