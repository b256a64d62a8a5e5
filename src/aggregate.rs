//! Age-range aggregation over a region's bucket counts.
//!
//! A bucket is either in or out: any overlap with the selected range credits
//! the bucket's whole count, there is no interpolation by overlap width.

use crate::types::{AgeBucket, Region, SelectedRange};

/// Sum of the counts of every bucket overlapping `range`.
///
/// `region.counts` is positional in `buckets` order; a missing position counts as zero.
/// The sum saturates at `u64::MAX`.
pub fn aggregate(buckets: &[AgeBucket], region: &Region, range: SelectedRange) -> u64 {
    buckets
        .iter()
        .enumerate()
        .filter(|(_, bucket)| bucket.overlaps(range))
        .map(|(i, _)| region.counts.get(i).copied().unwrap_or(0))
        .fold(0u64, u64::saturating_add)
}

/// Buckets credited by `range`, in bucket order.
pub fn selected_buckets(buckets: &[AgeBucket], range: SelectedRange) -> Vec<&AgeBucket> {
    buckets.iter().filter(|b| b.overlaps(range)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::MultiPolygon;
    use proptest::prelude::*;

    fn two_buckets() -> Vec<AgeBucket> {
        vec![
            AgeBucket::new("20-24", "20 to 24 years", 20, 24),
            AgeBucket::new("25-29", "25 to 29 years", 25, 29),
        ]
    }

    fn region(counts: Vec<u64>) -> Region {
        Region {
            id: "06001".into(),
            name: "Alameda".into(),
            total: 1000,
            counts,
            geometry: MultiPolygon::new(vec![]),
        }
    }

    #[test]
    fn partial_overlap_credits_whole_buckets() {
        let total = aggregate(&two_buckets(), &region(vec![100, 50]), SelectedRange::new(22, 26));
        assert_eq!(total, 150);
    }

    #[test]
    fn narrow_range_still_credits_full_bucket() {
        let total = aggregate(&two_buckets(), &region(vec![100, 50]), SelectedRange::new(20, 22));
        assert_eq!(total, 100);
    }

    #[test]
    fn no_overlap_is_zero() {
        let r = region(vec![100, 50]);
        assert_eq!(aggregate(&two_buckets(), &r, SelectedRange::new(0, 19)), 0);
        assert_eq!(aggregate(&two_buckets(), &r, SelectedRange::new(30, 90)), 0);
    }

    #[test]
    fn inverted_range_is_zero() {
        let r = region(vec![100, 50]);
        assert_eq!(aggregate(&two_buckets(), &r, SelectedRange::new(29, 20)), 0);
    }

    #[test]
    fn short_counts_are_treated_as_zero() {
        let r = region(vec![100]);
        assert_eq!(aggregate(&two_buckets(), &r, SelectedRange::new(20, 29)), 100);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let r = region(vec![u64::MAX, 1]);
        assert_eq!(aggregate(&two_buckets(), &r, SelectedRange::new(20, 29)), u64::MAX);
    }

    #[test]
    fn selected_buckets_keep_order() {
        let buckets = two_buckets();
        let labels: Vec<&str> = selected_buckets(&buckets, SelectedRange::new(0, 100))
            .iter()
            .map(|b| b.label.as_str())
            .collect();
        assert_eq!(labels, vec!["20-24", "25-29"]);
        assert!(selected_buckets(&buckets, SelectedRange::new(30, 31)).is_empty());
    }

    fn default_region() -> impl Strategy<Value = Region> {
        prop::collection::vec(0u64..1_000_000, 7).prop_map(region)
    }

    proptest! {
        #[test]
        fn widening_never_decreases(
            r in default_region(),
            min in 0u32..90,
            len in 0u32..40,
            grow_low in 0u32..20,
            grow_high in 0u32..20,
        ) {
            let buckets = crate::config::default_buckets();
            let narrow = SelectedRange::new(min, min + len);
            let wide = SelectedRange::new(min.saturating_sub(grow_low), min + len + grow_high);
            prop_assert!(aggregate(&buckets, &r, wide) >= aggregate(&buckets, &r, narrow));
        }

        #[test]
        fn inverted_ranges_select_nothing(r in default_region(), min in 1u32..100, gap in 1u32..50) {
            let buckets = crate::config::default_buckets();
            let range = SelectedRange::new(min + gap, min);
            prop_assert_eq!(aggregate(&buckets, &r, range), 0);
        }

        #[test]
        fn aggregate_is_idempotent(r in default_region(), min in 0u32..80, max in 0u32..80) {
            let buckets = crate::config::default_buckets();
            let range = SelectedRange::new(min, max);
            prop_assert_eq!(aggregate(&buckets, &r, range), aggregate(&buckets, &r, range));
        }
    }
}
