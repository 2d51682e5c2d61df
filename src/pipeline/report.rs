use crate::dataset::{CaseRecord, Metric};
use crate::pipeline::aggregate::{self, CaseTotals, GroupKey};
use crate::pipeline::filter::Selection;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCard {
    pub name: String,
    pub value: u64,
    pub display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: String,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearlyPoint {
    pub year: i32,
    pub mean: f64,
    pub display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedRow {
    pub name: String,
    pub total_cases: u64,
    pub total_deaths: u64,
    pub total_recovered: u64,
    pub total_active_cases: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub province: String,
    pub year: String,
    pub generated_at: String,
    pub row_count: usize,
    pub totals: CaseTotals,
    pub cards: Vec<MetricCard>,
    pub case_trend: Vec<TrendPoint>,
    pub death_trend: Vec<TrendPoint>,
    pub yearly_recovered: Vec<YearlyPoint>,
    pub top_provinces: Vec<RankedRow>,
    pub top_islands: Vec<RankedRow>,
}

#[derive(Debug)]
pub struct SavedReport {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
}

pub fn build_summary_report(
    records: &[&CaseRecord],
    selection: &Selection,
    top_provinces_n: usize,
    top_islands_n: usize,
) -> SummaryReport {
    let generated_at: DateTime<Utc> = Utc::now();

    let totals = aggregate::totals(records);
    let cards = metric_cards(&totals);

    let case_trend = trend_points(records, Metric::Cases);
    let death_trend = trend_points(records, Metric::Deaths);

    let yearly_recovered = aggregate::mean_by_year(records, Metric::Recovered)
        .into_iter()
        .map(|(year, mean)| YearlyPoint {
            year,
            mean,
            display: yearly_display(mean),
        })
        .collect();

    let province_snapshot = aggregate::latest_snapshot(records, GroupKey::Province);
    let island_snapshot = aggregate::latest_snapshot(records, GroupKey::Island);
    let top_provinces = ranked_rows(
        &aggregate::top_n(
            &province_snapshot,
            Metric::Cases,
            GroupKey::Province,
            top_provinces_n,
        ),
        GroupKey::Province,
    );
    let top_islands = ranked_rows(
        &aggregate::top_n(
            &island_snapshot,
            Metric::Cases,
            GroupKey::Island,
            top_islands_n,
        ),
        GroupKey::Island,
    );

    SummaryReport {
        province: selection.province_label().to_string(),
        year: selection.year_label(),
        generated_at: generated_at.to_rfc3339(),
        row_count: records.len(),
        totals,
        cards,
        case_trend,
        death_trend,
        yearly_recovered,
        top_provinces,
        top_islands,
    }
}

pub fn metric_cards(totals: &CaseTotals) -> Vec<MetricCard> {
    [
        (Metric::Cases, totals.cases),
        (Metric::Deaths, totals.deaths),
        (Metric::Recovered, totals.recovered),
        (Metric::Active, totals.active),
    ]
    .into_iter()
    .map(|(metric, value)| MetricCard {
        name: metric.label().to_string(),
        value,
        display: aggregate::format_magnitude(value),
    })
    .collect()
}

pub fn ranked_rows(records: &[&CaseRecord], key: GroupKey) -> Vec<RankedRow> {
    records
        .iter()
        .map(|record| RankedRow {
            name: key.of(record).to_string(),
            total_cases: record.total_cases,
            total_deaths: record.total_deaths,
            total_recovered: record.total_recovered,
            total_active_cases: record.total_active_cases,
        })
        .collect()
}

pub fn yearly_display(mean: f64) -> String {
    format!("{:.2}K", mean / 1000.0)
}

pub fn render_markdown(report: &SummaryReport) -> String {
    let card_rows = report
        .cards
        .iter()
        .map(|card| format!("| {} | {} | {} |", card.name, card.value, card.display))
        .collect::<Vec<_>>()
        .join("\n");

    let case_rows = list_trend(&report.case_trend);
    let death_rows = list_trend(&report.death_trend);

    let yearly_rows = if report.yearly_recovered.is_empty() {
        "- No data".to_string()
    } else {
        report
            .yearly_recovered
            .iter()
            .map(|point| format!("| {} | {:.1} | {} |", point.year, point.mean, point.display))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let province_rows = list_ranked(&report.top_provinces);
    let island_rows = list_ranked(&report.top_islands);

    format!(
        "# COVID-19 Case Summary - {} / {}\n\n## Selection\n- Province: {}\n- Year: {}\n- Matching rows: {}\n\n## Metrics\n| Metric | Value | Display |\n|--------|-------|---------|\n{}\n\n## Case Trend (half-year)\n{}\n\n## Death Trend (half-year)\n{}\n\n## Mean Recovered by Year\n| Year | Mean | Display |\n|------|------|---------|\n{}\n\n## Top Provinces (latest Total Cases)\n{}\n\n## Top Islands (latest Total Cases)\n{}\n",
        report.province,
        report.year,
        report.province,
        report.year,
        report.row_count,
        card_rows,
        case_rows,
        death_rows,
        yearly_rows,
        province_rows,
        island_rows
    )
}

pub fn save_report_files(report: &SummaryReport, report_dir: &Path) -> Result<SavedReport> {
    fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let stem = format!(
        "covid-summary-{}-{}",
        file_slug(&report.province),
        file_slug(&report.year)
    );
    let markdown_path = report_dir.join(format!("{stem}.md"));
    let json_path = report_dir.join(format!("{stem}.json"));

    fs::write(&markdown_path, render_markdown(report)).with_context(|| {
        format!(
            "Failed to write Markdown report: {}",
            markdown_path.display()
        )
    })?;

    let json_content =
        serde_json::to_string_pretty(report).context("Failed to serialize report JSON")?;
    fs::write(&json_path, json_content)
        .with_context(|| format!("Failed to write JSON report: {}", json_path.display()))?;

    Ok(SavedReport {
        markdown_path,
        json_path,
    })
}

fn trend_points(records: &[&CaseRecord], metric: Metric) -> Vec<TrendPoint> {
    aggregate::sum_by_half_year(records, metric)
        .into_iter()
        .map(|(period, value)| TrendPoint {
            period: period.label(),
            value,
        })
        .collect()
}

fn list_trend(points: &[TrendPoint]) -> String {
    if points.is_empty() {
        return "- No data".to_string();
    }

    points
        .iter()
        .map(|point| format!("- {}: {}", point.period, point.value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_ranked(rows: &[RankedRow]) -> String {
    if rows.is_empty() {
        return "- No data".to_string();
    }

    rows.iter()
        .enumerate()
        .map(|(index, row)| format!("{}. {} - {} cases", index + 1, row.name, row.total_cases))
        .collect::<Vec<_>>()
        .join("\n")
}

fn file_slug(raw: &str) -> String {
    let mut slug = String::new();
    for ch in raw.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::{build_summary_report, file_slug, render_markdown, save_report_files};
    use crate::dataset::CaseRecord;
    use crate::pipeline::filter::Selection;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn record(date: &str, province: &str, island: &str, cases: u64, recovered: u64) -> CaseRecord {
        CaseRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("test date"),
            province: province.to_string(),
            island: island.to_string(),
            latitude: -6.2,
            longitude: 106.8,
            total_cases: cases,
            total_deaths: cases / 10,
            total_recovered: recovered,
            total_active_cases: cases - cases / 10 - recovered,
        }
    }

    fn fixture() -> Vec<CaseRecord> {
        vec![
            record("2021-02-01", "DKI Jakarta", "Jawa", 1000, 400),
            record("2021-08-01", "DKI Jakarta", "Jawa", 2000, 600),
            record("2021-08-01", "Aceh", "Sumatera", 500, 200),
        ]
    }

    fn open_selection() -> Selection {
        Selection::from_params(None, None).expect("selection")
    }

    #[test]
    fn report_collects_cards_trends_and_rankings() {
        let records = fixture();
        let rows = records.iter().collect::<Vec<_>>();
        let report = build_summary_report(&rows, &open_selection(), 10, 7);

        assert_eq!(report.row_count, 3);
        assert_eq!(report.cards.len(), 4);
        assert_eq!(report.cards[0].name, "Total Cases");
        assert_eq!(report.cards[0].value, 3500);
        assert_eq!(report.cards[0].display, "3.5K");

        let case_periods = report
            .case_trend
            .iter()
            .map(|point| point.period.as_str())
            .collect::<Vec<_>>();
        assert_eq!(case_periods, vec!["2021-H1", "2021-H2"]);

        assert_eq!(report.yearly_recovered.len(), 1);
        assert_eq!(report.yearly_recovered[0].year, 2021);
        assert_eq!(report.yearly_recovered[0].display, "0.40K");

        assert_eq!(report.top_provinces.len(), 2);
        assert_eq!(report.top_provinces[0].name, "DKI Jakarta");
        assert_eq!(report.top_provinces[0].total_cases, 2000);
        assert_eq!(report.top_islands[0].name, "Jawa");
    }

    #[test]
    fn markdown_names_the_selection_and_sections() {
        let records = fixture();
        let rows = records.iter().collect::<Vec<_>>();
        let selection = Selection::from_params(Some("DKI Jakarta"), Some("2021")).expect("params");
        let report = build_summary_report(&rows, &selection, 10, 7);

        let markdown = render_markdown(&report);
        assert!(markdown.contains("# COVID-19 Case Summary - DKI Jakarta / 2021"));
        assert!(markdown.contains("## Case Trend (half-year)"));
        assert!(markdown.contains("## Top Islands (latest Total Cases)"));
    }

    #[test]
    fn empty_selection_renders_placeholders() {
        let report = build_summary_report(&[], &open_selection(), 10, 7);

        assert_eq!(report.totals.cases, 0);
        let markdown = render_markdown(&report);
        assert!(markdown.contains("- No data"));
    }

    #[test]
    fn save_writes_markdown_and_json_twins() {
        let dir = TempDir::new().expect("temp dir");
        let records = fixture();
        let rows = records.iter().collect::<Vec<_>>();
        let report = build_summary_report(&rows, &open_selection(), 10, 7);

        let saved = save_report_files(&report, dir.path()).expect("report saved");
        assert!(saved.markdown_path.ends_with("covid-summary-semua-semua.md"));
        assert!(saved.json_path.exists());

        let json = std::fs::read_to_string(&saved.json_path).expect("json readable");
        let parsed: super::SummaryReport = serde_json::from_str(&json).expect("json parses");
        assert_eq!(parsed.row_count, report.row_count);
    }

    #[test]
    fn slugs_flatten_names_for_file_stems() {
        assert_eq!(file_slug("DKI Jakarta"), "dki-jakarta");
        assert_eq!(file_slug("Semua"), "semua");
        assert_eq!(file_slug("Kep. Riau"), "kep-riau");
    }
}
