use crate::aggregate::{aggregate, selected_buckets};
use crate::classify::ThresholdTable;
use crate::types::{AgeBucket, Dataset, Region, RegionStats, SelectedRange};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

/// One render pass: selected count, ratio and shade for every region, in dataset order.
pub fn compute_stats(dataset: &Dataset, table: &ThresholdTable, range: SelectedRange) -> Vec<RegionStats> {
    info!("Computing {} regions for ages {}...", dataset.regions.len(), range);

    dataset
        .regions
        .par_iter()
        .map(|region| region_stats(&dataset.buckets, region, table, range))
        .collect()
}

pub fn region_stats(
    buckets: &[AgeBucket],
    region: &Region,
    table: &ThresholdTable,
    range: SelectedRange,
) -> RegionStats {
    let selected = aggregate(buckets, region, range);
    let ratio = (region.total > 0).then(|| selected as f64 / region.total as f64);
    RegionStats {
        id: region.id.clone(),
        name: region.name.clone(),
        total: region.total,
        selected,
        ratio,
        shade: table.shade_for(selected, region.total),
        buckets: selected_buckets(buckets, range)
            .into_iter()
            .map(|b| b.label.clone())
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub regions: usize,
    pub regions_without_data: usize,
    pub total: u64,
    pub selected: u64,
    pub ratio: Option<f64>,
}

pub fn summarize(stats: &[RegionStats]) -> Summary {
    let total = stats.iter().map(|s| s.total).fold(0u64, u64::saturating_add);
    let selected = stats.iter().map(|s| s.selected).fold(0u64, u64::saturating_add);
    Summary {
        regions: stats.len(),
        regions_without_data: stats.iter().filter(|s| s.ratio.is_none()).count(),
        total,
        selected,
        ratio: (total > 0).then(|| selected as f64 / total as f64),
    }
}
