use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::error::{EvalError, Result};
use crate::models::{RawInteraction, SamplingCounts};

pub const DEFAULT_FLOOR_MINIMUM: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRequest {
    pub size: usize,
    /// When non-empty, only these categories (case-insensitive) are drawn from.
    pub categories: Vec<String>,
    pub floor_minimum: usize,
}

impl SampleRequest {
    #[must_use]
    pub const fn new(size: usize) -> Self {
        Self {
            size,
            categories: Vec::new(),
            floor_minimum: DEFAULT_FLOOR_MINIMUM,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleOutcome {
    pub selected: Vec<RawInteraction>,
    pub requested: usize,
    pub shortfall: usize,
    pub per_category: BTreeMap<String, usize>,
    pub categories: usize,
}

impl SampleOutcome {
    #[must_use]
    pub fn counts(&self, seed: Option<u64>) -> SamplingCounts {
        SamplingCounts {
            requested: self.requested,
            selected: self.selected.len(),
            shortfall: self.shortfall,
            per_category: self.per_category.clone(),
            seed,
        }
    }
}

/// Seeded runs are reproducible for the same pool order; unseeded runs draw
/// from OS entropy.
#[must_use]
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn partition<'a>(
    pool: &'a [RawInteraction],
    allowed: &[String],
) -> BTreeMap<&'a str, Vec<&'a RawInteraction>> {
    let mut groups = BTreeMap::<&str, Vec<&RawInteraction>>::new();
    for record in pool {
        let category = record.category.as_str();
        if !allowed.is_empty()
            && !allowed
                .iter()
                .any(|name| name.trim().eq_ignore_ascii_case(category.trim()))
        {
            continue;
        }
        groups.entry(category).or_default().push(record);
    }
    groups
}

/// Category-balanced draw of `request.size` records.
///
/// Each category contributes `max(floor_minimum, size / categories)` records
/// (or all of them when smaller). If that leaves the draw short of `size`,
/// the remaining records of every category are added round-robin. The
/// combination is shuffled and truncated to `size`.
pub fn stratified_sample<R>(
    pool: &[RawInteraction],
    request: &SampleRequest,
    rng: &mut R,
) -> Result<SampleOutcome>
where
    R: Rng + ?Sized,
{
    if request.size == 0 {
        return Err(EvalError::Validation(
            "sample size must be greater than zero".to_string(),
        ));
    }

    let groups = partition(pool, &request.categories);
    if groups.is_empty() {
        warn!(
            requested = request.size,
            pool = pool.len(),
            "no records available for sampling"
        );
        return Ok(SampleOutcome {
            requested: request.size,
            shortfall: request.size,
            ..SampleOutcome::default()
        });
    }

    let per_category = request
        .floor_minimum
        .max(request.size / groups.len())
        .max(1);
    let mut combined = Vec::with_capacity(request.size);
    let mut leftovers = Vec::with_capacity(groups.len());
    for records in groups.values() {
        let mut shuffled = records.clone();
        shuffled.shuffle(rng);
        let take = per_category.min(shuffled.len());
        let rest = shuffled.split_off(take);
        combined.extend(shuffled);
        leftovers.push(rest.into_iter());
    }

    while combined.len() < request.size {
        let before = combined.len();
        for rest in &mut leftovers {
            if combined.len() >= request.size {
                break;
            }
            if let Some(record) = rest.next() {
                combined.push(record);
            }
        }
        if combined.len() == before {
            break;
        }
    }

    combined.shuffle(rng);
    combined.truncate(request.size);

    let mut counts = BTreeMap::<String, usize>::new();
    for record in &combined {
        *counts.entry(record.category.clone()).or_default() += 1;
    }
    let selected = combined.into_iter().cloned().collect::<Vec<_>>();
    let shortfall = request.size.saturating_sub(selected.len());
    if shortfall > 0 {
        warn!(
            requested = request.size,
            selected = selected.len(),
            shortfall,
            "pool too small for requested sample size"
        );
    }
    info!(
        selected = selected.len(),
        categories = groups.len(),
        per_category,
        "stratified sample drawn"
    );

    Ok(SampleOutcome {
        selected,
        requested: request.size,
        shortfall,
        per_category: counts,
        categories: groups.len(),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::models::SourceKind;

    fn pool(spec: &[(&str, usize)]) -> Vec<RawInteraction> {
        spec.iter()
            .flat_map(|(category, count)| {
                (0..*count).map(move |index| {
                    RawInteraction::new(
                        SourceKind::LogAnalytics,
                        format!("{category} question {index}"),
                        format!("{category} answer {index}"),
                    )
                    .with_category(*category)
                    .with_id(format!("{category}-{index}"))
                })
            })
            .collect()
    }

    fn ids(outcome: &SampleOutcome) -> Vec<String> {
        outcome
            .selected
            .iter()
            .filter_map(|record| record.id.clone())
            .collect()
    }

    #[test]
    fn forty_records_four_categories_yield_five_each() {
        let records = pool(&[("billing", 10), ("outage", 10), ("plans", 10), ("roaming", 10)]);
        let request = SampleRequest {
            floor_minimum: 5,
            ..SampleRequest::new(20)
        };
        let first = stratified_sample(&records, &request, &mut rng_from_seed(Some(7))).expect("sample");
        assert_eq!(first.selected.len(), 20);
        assert_eq!(first.shortfall, 0);
        assert!(first.per_category.values().all(|count| *count == 5));

        let second = stratified_sample(&records, &request, &mut rng_from_seed(Some(7))).expect("sample");
        assert_eq!(ids(&first), ids(&second));

        let categories_in_order = first
            .selected
            .iter()
            .map(|record| record.category.as_str())
            .collect::<Vec<_>>();
        let mut grouped = categories_in_order.clone();
        grouped.sort_unstable();
        assert_ne!(categories_in_order, grouped, "selection should be shuffled");
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = stratified_sample(&pool(&[("a", 3)]), &SampleRequest::new(0), &mut rng_from_seed(Some(1)))
            .expect_err("zero");
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[test]
    fn empty_pool_and_unmatched_filter_yield_empty_selection() {
        let empty = stratified_sample(&[], &SampleRequest::new(5), &mut rng_from_seed(Some(1)))
            .expect("empty");
        assert!(empty.selected.is_empty());
        assert_eq!(empty.shortfall, 5);

        let request = SampleRequest {
            categories: vec!["nonexistent".to_string()],
            ..SampleRequest::new(5)
        };
        let filtered = stratified_sample(&pool(&[("a", 3)]), &request, &mut rng_from_seed(Some(1)))
            .expect("filtered");
        assert!(filtered.selected.is_empty());
    }

    #[test]
    fn small_pool_reports_shortfall_without_padding() {
        let records = pool(&[("a", 2), ("b", 1)]);
        let outcome = stratified_sample(&records, &SampleRequest::new(10), &mut rng_from_seed(Some(3)))
            .expect("sample");
        assert_eq!(outcome.selected.len(), 3);
        assert_eq!(outcome.shortfall, 7);
    }

    #[test]
    fn skewed_pool_is_topped_up_to_exact_size() {
        let records = pool(&[("big", 50), ("tiny", 2)]);
        let request = SampleRequest {
            floor_minimum: 5,
            ..SampleRequest::new(30)
        };
        let outcome = stratified_sample(&records, &request, &mut rng_from_seed(Some(11))).expect("sample");
        assert_eq!(outcome.selected.len(), 30);
        assert_eq!(outcome.per_category.get("tiny"), Some(&2));
        assert_eq!(outcome.per_category.get("big"), Some(&28));
    }

    #[test]
    fn category_filter_is_case_insensitive() {
        let records = pool(&[("Billing", 4), ("outage", 4)]);
        let request = SampleRequest {
            categories: vec!["billing".to_string()],
            floor_minimum: 1,
            ..SampleRequest::new(3)
        };
        let outcome = stratified_sample(&records, &request, &mut rng_from_seed(Some(5))).expect("sample");
        assert_eq!(outcome.selected.len(), 3);
        assert!(outcome.selected.iter().all(|record| record.category == "Billing"));
    }

    proptest! {
        #[test]
        fn exact_size_when_pool_is_large_enough(
            sizes in proptest::collection::vec(1usize..15, 1..6),
            wanted in 1usize..40,
            floor in 0usize..8,
            seed in any::<u64>(),
        ) {
            let names = ["a", "b", "c", "d", "e", "f"];
            let spec = sizes.iter().enumerate().map(|(i, n)| (names[i], *n)).collect::<Vec<_>>();
            let records = pool(&spec);
            let request = SampleRequest { size: wanted, categories: Vec::new(), floor_minimum: floor };
            let outcome = stratified_sample(&records, &request, &mut rng_from_seed(Some(seed))).expect("sample");

            prop_assert_eq!(outcome.selected.len(), wanted.min(records.len()));
            let mut seen = ids(&outcome);
            seen.sort();
            seen.dedup();
            prop_assert_eq!(seen.len(), outcome.selected.len());

            // When every category can meet its floor inside the budget, none falls short.
            let total_floor: usize = sizes.iter().map(|n| floor.max(wanted / sizes.len()).max(1).min(*n)).sum();
            if total_floor <= wanted {
                for (name, size) in &spec {
                    let got = outcome.per_category.get(*name).copied().unwrap_or(0);
                    prop_assert!(got >= floor.min(*size));
                }
            }
        }

        #[test]
        fn same_seed_same_selection(seed in any::<u64>()) {
            let records = pool(&[("a", 9), ("b", 4), ("c", 12)]);
            let request = SampleRequest { size: 12, categories: Vec::new(), floor_minimum: 3 };
            let first = stratified_sample(&records, &request, &mut rng_from_seed(Some(seed))).expect("sample");
            let second = stratified_sample(&records, &request, &mut rng_from_seed(Some(seed))).expect("sample");
            prop_assert_eq!(ids(&first), ids(&second));
        }
    }
}
