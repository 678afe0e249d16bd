use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::{Regex, RegexBuilder};
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{EvalError, Result};
use crate::models::{AuditFinding, AuditReport, AuditSeverityCounts, Severity};
use crate::text::truncate_text;

pub const DEFAULT_EXCLUDED_DIRS: [&str; 7] = [
    "node_modules",
    ".git",
    "__pycache__",
    "venv",
    ".venv",
    "dist",
    "build",
];

pub const SCANNED_EXTENSIONS: [&str; 9] = ["py", "js", "ts", "jsx", "tsx", "cs", "java", "go", "rb"];

const MAX_LINE_CHARS: usize = 100;
const REMOVE_UNSUPPORTED: &str = "Remove this parameter; the migrated model rejects it";

struct AuditRule {
    issue_type: &'static str,
    pattern: &'static str,
    severity: Severity,
    recommendation: &'static str,
}

static RULES: [AuditRule; 9] = [
    AuditRule {
        issue_type: "temperature",
        pattern: r"temperature\s*[=:]\s*[\d.]+",
        severity: Severity::High,
        recommendation: REMOVE_UNSUPPORTED,
    },
    AuditRule {
        issue_type: "top_p",
        pattern: r"top_p\s*[=:]\s*[\d.]+",
        severity: Severity::High,
        recommendation: REMOVE_UNSUPPORTED,
    },
    AuditRule {
        issue_type: "frequency_penalty",
        pattern: r"frequency_penalty\s*[=:]\s*[\d.]+",
        severity: Severity::High,
        recommendation: REMOVE_UNSUPPORTED,
    },
    AuditRule {
        issue_type: "presence_penalty",
        pattern: r"presence_penalty\s*[=:]\s*[\d.]+",
        severity: Severity::High,
        recommendation: REMOVE_UNSUPPORTED,
    },
    AuditRule {
        issue_type: "max_tokens",
        pattern: r"max_tokens\s*[=:]\s*\d+",
        severity: Severity::High,
        recommendation: "Rename to 'max_completion_tokens'",
    },
    AuditRule {
        issue_type: "system_role",
        pattern: r#"["']role["']\s*:\s*["']system["']"#,
        severity: Severity::Medium,
        recommendation: "Change to the 'developer' role; 'system' is deprecated",
    },
    AuditRule {
        issue_type: "legacy_model_name",
        pattern: r#"["']gpt-4o["']"#,
        severity: Severity::Info,
        recommendation: "Update to 'gpt-5.1' after the code changes are complete",
    },
    AuditRule {
        issue_type: "old_api_version",
        pattern: r#"api_version\s*[=:]\s*["']2024"#,
        severity: Severity::Medium,
        recommendation: "Update to api_version='2025-06-01'",
    },
    AuditRule {
        issue_type: "logprobs",
        pattern: r"logprobs\s*[=:]\s*(true|\d+)",
        severity: Severity::High,
        recommendation: REMOVE_UNSUPPORTED,
    },
];

#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    /// Extra globs, matched against both the path relative to the root and
    /// the bare file or directory name.
    pub exclude: Vec<String>,
}

/// Compiled rule set plus exclusion filter for one scan.
pub struct AuditScanner {
    rules: Vec<(&'static AuditRule, Regex)>,
    exclude: GlobSet,
}

impl AuditScanner {
    pub fn new(options: &AuditOptions) -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|rule| {
                RegexBuilder::new(rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|regex| (rule, regex))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut builder = GlobSetBuilder::new();
        for pattern in &options.exclude {
            let trimmed = pattern.trim();
            if trimmed.is_empty() {
                continue;
            }
            let glob = Glob::new(trimmed).map_err(|err| {
                EvalError::Validation(format!("invalid audit exclude glob '{trimmed}': {err}"))
            })?;
            builder.add(glob);
        }
        let exclude = builder
            .build()
            .map_err(|err| EvalError::Validation(format!("invalid audit exclude globs: {err}")))?;
        Ok(Self { rules, exclude })
    }

    fn is_excluded(&self, root: &Path, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if entry.depth() == 0 {
            return false;
        }
        if entry.file_type().is_dir() && DEFAULT_EXCLUDED_DIRS.contains(&name.as_ref()) {
            return true;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative = relative.to_string_lossy().replace('\\', "/");
        self.exclude.is_match(relative) || self.exclude.is_match(name.as_ref())
    }

    /// Matches every line against every rule; one line may yield several
    /// findings.
    #[must_use]
    pub fn scan_text(&self, file_path: &str, text: &str) -> Vec<AuditFinding> {
        let mut findings = Vec::new();
        for (index, line) in text.lines().enumerate() {
            for (rule, regex) in &self.rules {
                if regex.is_match(line) {
                    findings.push(AuditFinding {
                        file_path: file_path.to_string(),
                        line_number: index + 1,
                        line_content: truncate_text(line.trim(), MAX_LINE_CHARS),
                        issue_type: rule.issue_type.to_string(),
                        severity: rule.severity,
                        recommendation: rule.recommendation.to_string(),
                    });
                }
            }
        }
        findings
    }
}

fn has_scanned_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCANNED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Walks `root` and audits every source file with a scanned extension.
pub fn scan_path(root: &Path, options: &AuditOptions) -> Result<AuditReport> {
    if !root.exists() {
        return Err(EvalError::NotFound(format!(
            "audit root {} does not exist",
            root.display()
        )));
    }
    let scanner = AuditScanner::new(options)?;
    let mut report = AuditReport {
        root: root.display().to_string(),
        files_scanned: 0,
        files_unreadable: 0,
        counts: AuditSeverityCounts::default(),
        findings: Vec::new(),
    };

    let entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !scanner.is_excluded(root, entry));
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable path");
                report.files_unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_scanned_extension(entry.path()) {
            continue;
        }
        let bytes = match fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "could not read file");
                report.files_unreadable += 1;
                continue;
            }
        };
        report.files_scanned += 1;
        let text = String::from_utf8_lossy(&bytes);
        let path = entry.path().display().to_string();
        report.findings.extend(scanner.scan_text(&path, &text));
    }

    for finding in &report.findings {
        match finding.severity {
            Severity::High => report.counts.high += 1,
            Severity::Medium => report.counts.medium += 1,
            Severity::Info => report.counts.info += 1,
        }
    }
    info!(
        root = %report.root,
        files_scanned = report.files_scanned,
        files_unreadable = report.files_unreadable,
        high = report.counts.high,
        medium = report.counts.medium,
        info = report.counts.info,
        "migration audit finished"
    );
    Ok(report)
}

fn write_line(out: &mut String, args: std::fmt::Arguments<'_>) {
    let _ = out.write_fmt(args);
}

fn write_rule(out: &mut String, ch: char) {
    write_line(out, format_args!("{}\n", ch.to_string().repeat(70)));
}

/// Human-readable audit report: severity counts, findings grouped by file,
/// then the follow-up actions the findings call for.
#[must_use]
pub fn format_audit_text(report: &AuditReport) -> String {
    let mut out = String::new();
    if report.findings.is_empty() {
        write_line(
            &mut out,
            format_args!(
                "No migration issues found in {} ({} files scanned).\n\
                 Remember to update the model name when deploying.\n",
                report.root, report.files_scanned
            ),
        );
        return out;
    }

    write_rule(&mut out, '=');
    out.push_str("MIGRATION AUDIT REPORT\n");
    write_rule(&mut out, '=');
    write_line(
        &mut out,
        format_args!(
            "\nTotal findings: {} in {} files scanned",
            report.findings.len(),
            report.files_scanned
        ),
    );
    if report.files_unreadable > 0 {
        write_line(
            &mut out,
            format_args!(" ({} unreadable)", report.files_unreadable),
        );
    }
    out.push('\n');
    write_line(
        &mut out,
        format_args!("  HIGH:   {} (will cause errors)\n", report.counts.high),
    );
    write_line(
        &mut out,
        format_args!("  MEDIUM: {} (should fix)\n", report.counts.medium),
    );
    write_line(
        &mut out,
        format_args!("  INFO:   {} (informational)\n\n", report.counts.info),
    );

    write_rule(&mut out, '-');
    out.push_str("FINDINGS BY FILE\n");
    write_rule(&mut out, '-');
    let mut by_file: BTreeMap<&str, Vec<&AuditFinding>> = BTreeMap::new();
    for finding in &report.findings {
        by_file.entry(&finding.file_path).or_default().push(finding);
    }
    for (file_path, mut findings) in by_file {
        findings.sort_by_key(|finding| finding.line_number);
        write_line(&mut out, format_args!("\n{file_path}\n"));
        for finding in findings {
            write_line(
                &mut out,
                format_args!(
                    "   Line {}: [{}] {}\n      Code: {}\n      Fix:  {}\n",
                    finding.line_number,
                    finding.severity,
                    finding.issue_type,
                    finding.line_content,
                    finding.recommendation
                ),
            );
        }
    }

    out.push('\n');
    write_rule(&mut out, '-');
    out.push_str("RECOMMENDED ACTIONS\n");
    write_rule(&mut out, '-');
    out.push('\n');
    if report.counts.high > 0 {
        out.push_str("1. [REQUIRED] Fix all HIGH severity issues\n");
        out.push_str("   - Remove unsupported parameters (temperature, top_p, penalties, logprobs)\n");
        out.push_str("   - Rename max_tokens to max_completion_tokens\n\n");
    }
    if report.counts.medium > 0 {
        out.push_str("2. [RECOMMENDED] Fix MEDIUM severity issues\n");
        out.push_str("   - Update the API version to 2025-06-01\n");
        out.push_str("   - Change the 'system' role to 'developer'\n\n");
    }
    out.push_str("3. [AFTER FIXES] Update the model name from 'gpt-4o' to 'gpt-5.1'\n\n");
    out.push_str("4. [TESTING] Run `evalgate evaluate` against a golden dataset before deploying\n");
    write_rule(&mut out, '=');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> AuditScanner {
        AuditScanner::new(&AuditOptions::default()).expect("scanner")
    }

    fn issue_types(findings: &[AuditFinding]) -> Vec<&str> {
        findings
            .iter()
            .map(|finding| finding.issue_type.as_str())
            .collect()
    }

    #[test]
    fn legacy_call_site_yields_every_rule() {
        let source = r#"client = AzureOpenAI(api_version="2024-10-21")
response = client.chat.completions.create(
    model="gpt-4o",
    messages=[{"role": "system", "content": SYSTEM}],
    Temperature=0.7, top_p=0.9,
    frequency_penalty=0.5, presence_penalty=0.0,
    max_tokens=500,
    logprobs=True,
)
"#;
        let findings = scanner().scan_text("app.py", source);
        let types = issue_types(&findings);
        for expected in [
            "old_api_version",
            "legacy_model_name",
            "system_role",
            "temperature",
            "top_p",
            "frequency_penalty",
            "presence_penalty",
            "max_tokens",
            "logprobs",
        ] {
            assert!(types.contains(&expected), "missing {expected}");
        }
        let line_five = findings
            .iter()
            .filter(|finding| finding.line_number == 5)
            .count();
        assert_eq!(line_five, 2);
    }

    #[test]
    fn migrated_parameters_are_not_flagged() {
        let source = "max_completion_tokens=500\nreasoning_effort=\"low\"\nlogprobs=False\n";
        assert!(scanner().scan_text("app.py", source).is_empty());
    }

    #[test]
    fn long_lines_are_trimmed_and_truncated() {
        let line = format!("    temperature = 0.2  # {}", "x".repeat(200));
        let findings = scanner().scan_text("app.py", &line);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].line_content.starts_with("temperature"));
        assert_eq!(findings[0].line_content.chars().count(), MAX_LINE_CHARS + 3);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn scan_path_skips_default_and_excluded_dirs_and_other_extensions() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src/legacy")).expect("mkdir");
        fs::create_dir_all(root.join("node_modules/pkg")).expect("mkdir");
        fs::write(root.join("src/app.ts"), "const opts = { max_tokens: 500 };\n").expect("write");
        fs::write(root.join("src/legacy/old.py"), "temperature=0.7\n").expect("write");
        fs::write(root.join("node_modules/pkg/index.js"), "top_p: 1\n").expect("write");
        fs::write(root.join("notes.md"), "temperature=0.7\n").expect("write");
        fs::write(root.join("Service.CS"), "\"model\": \"gpt-4o\"\n").expect("write");

        let report = scan_path(
            root,
            &AuditOptions {
                exclude: vec!["legacy".to_string()],
            },
        )
        .expect("scan");
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.counts.high, 1);
        assert_eq!(report.counts.info, 1);
        assert!(report.has_blocking_findings());
        assert!(report.findings.iter().all(|finding| !finding.file_path.contains("legacy")));
    }

    #[test]
    fn missing_root_and_bad_glob_are_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = scan_path(&temp.path().join("absent"), &AuditOptions::default());
        assert!(matches!(missing, Err(EvalError::NotFound(_))));
        let bad = AuditScanner::new(&AuditOptions {
            exclude: vec!["[".to_string()],
        });
        assert!(matches!(bad, Err(EvalError::Validation(_))));
    }

    #[test]
    fn text_report_groups_findings_and_lists_actions() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("client.go"),
            "APIVersion: api_version = \"2024-08-01\"\nmax_tokens: 100\n",
        )
        .expect("write");
        let report = scan_path(temp.path(), &AuditOptions::default()).expect("scan");
        let text = format_audit_text(&report);
        assert!(text.contains("MIGRATION AUDIT REPORT"));
        assert!(text.contains("HIGH:   1"));
        assert!(text.contains("MEDIUM: 1"));
        assert!(text.contains("Line 2: [HIGH] max_tokens"));
        assert!(text.contains("1. [REQUIRED]"));
        assert!(text.contains("2. [RECOMMENDED]"));
    }

    #[test]
    fn clean_tree_reports_no_issues() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("ok.py"), "print('hello')\n").expect("write");
        let report = scan_path(temp.path(), &AuditOptions::default()).expect("scan");
        assert!(!report.has_blocking_findings());
        assert!(format_audit_text(&report).starts_with("No migration issues found"));
    }
}
