pub mod aggregate;
pub mod filter;
pub mod report;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::pipeline::filter::Selection;
use crate::pipeline::report::{SavedReport, SummaryReport};
use anyhow::Result;
use tracing::info;

/// Cap and seed for heatmap point sampling. Totals and averages never go
/// through the sampler.
pub const HEATMAP_SAMPLE_CAP: usize = 1000;
pub const HEATMAP_SAMPLE_SEED: u64 = 42;

pub fn generate_and_store_report(
    config: &Config,
    dataset: &Dataset,
    selection: &Selection,
) -> Result<(SummaryReport, SavedReport)> {
    let rows = filter::filter(dataset.records(), selection);
    let summary =
        report::build_summary_report(&rows, selection, config.top_provinces, config.top_islands);
    let saved = report::save_report_files(&summary, &config.report_dir)?;

    info!(
        province = %summary.province,
        year = %summary.year,
        rows = summary.row_count,
        "summary report stored"
    );

    Ok((summary, saved))
}
