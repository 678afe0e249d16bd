use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info};

use crate::models::{FormattingCounts, RawInteraction, TestCase, UNREVIEWED_GROUND_TRUTH_TAG};
use crate::text::{non_blank, slugify};

#[derive(Debug, Clone, Default)]
pub struct FormatOutcome {
    pub cases: Vec<TestCase>,
    pub counts: FormattingCounts,
}

#[must_use]
pub fn synthesize_test_id(category: &str, position: usize) -> String {
    format!("{}_{position:04}", slugify(category))
}

fn case_tags(record: &RawInteraction) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(UNREVIEWED_GROUND_TRUTH_TAG.to_string());
    tags.insert(format!("source:{}", record.source));
    if let Some(language) = non_blank(record.language.as_deref()) {
        tags.insert(format!("language:{}", language.to_ascii_lowercase()));
    }
    tags
}

/// Turns sampled records into test cases, in order. The 1-based position in
/// `records` names cases whose source carried no identifier.
#[must_use]
pub fn format_records(records: &[RawInteraction]) -> FormatOutcome {
    let mut outcome = FormatOutcome::default();
    let mut seen = HashSet::<String>::new();

    for (index, record) in records.iter().enumerate() {
        if record.query.trim().is_empty() {
            outcome.counts.skipped_missing_query += 1;
            continue;
        }
        if record.response.trim().is_empty() {
            outcome.counts.skipped_missing_ground_truth += 1;
            continue;
        }
        let test_id = non_blank(record.id.as_deref())
            .unwrap_or_else(|| synthesize_test_id(&record.category, index + 1));
        if !seen.insert(test_id.clone()) {
            debug!(test_id = %test_id, "dropping duplicate test id");
            outcome.counts.skipped_duplicate_id += 1;
            continue;
        }

        outcome.cases.push(TestCase {
            test_id,
            query: record.query.clone(),
            context: record.context.clone(),
            ground_truth: record.response.clone(),
            category: Some(record.category.clone()),
            language: non_blank(record.language.as_deref()),
            difficulty: None,
            tags: case_tags(record),
        });
    }

    outcome.counts.emitted = outcome.cases.len();
    info!(
        emitted = outcome.counts.emitted,
        skipped = outcome.counts.skipped(),
        "formatted test cases"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn record(query: &str, response: &str) -> RawInteraction {
        RawInteraction::new(SourceKind::FlatExport, query, response)
    }

    #[test]
    fn synthesized_ids_use_category_slug_and_position() {
        let records = vec![
            record("q1", "r1").with_category("Plan Change"),
            record("q2", "r2").with_category("Plan Change").with_id("ticket-9"),
            record("q3", "r3"),
        ];
        let outcome = format_records(&records);
        let ids = outcome
            .cases
            .iter()
            .map(|case| case.test_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["plan_change_0001", "ticket-9", "unknown_0003"]);
    }

    #[test]
    fn invalid_and_duplicate_records_are_counted() {
        let records = vec![
            record("  ", "r").with_id("a"),
            record("q", "").with_id("b"),
            record("q", "r").with_id("c"),
            record("q again", "r").with_id("c"),
        ];
        let outcome = format_records(&records);
        assert_eq!(outcome.counts.emitted, 1);
        assert_eq!(outcome.counts.skipped_missing_query, 1);
        assert_eq!(outcome.counts.skipped_missing_ground_truth, 1);
        assert_eq!(outcome.counts.skipped_duplicate_id, 1);
        assert_eq!(outcome.counts.skipped(), 3);
    }

    #[test]
    fn cases_are_tagged_unreviewed_with_source_and_language() {
        let mut source = record("\u{5E9}\u{5DC}\u{5D5}\u{5DD}", "\u{5D4}\u{5D9}\u{5D9}");
        source.language = Some("HE".to_string());
        let outcome = format_records(&[source]);
        let case = &outcome.cases[0];
        assert!(!case.ground_truth_reviewed());
        assert!(case.tags.contains("source:flat_export"));
        assert!(case.tags.contains("language:he"));
        assert_eq!(case.language.as_deref(), Some("HE"));
        assert_eq!(case.query, "\u{5E9}\u{5DC}\u{5D5}\u{5DD}");
    }
}
