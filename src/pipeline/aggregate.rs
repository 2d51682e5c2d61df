use crate::dataset::{CaseRecord, Metric};
use chrono::{Datelike, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseTotals {
    pub cases: u64,
    pub deaths: u64,
    pub recovered: u64,
    pub active: u64,
}

pub fn totals(records: &[&CaseRecord]) -> CaseTotals {
    records.iter().fold(CaseTotals::default(), |mut acc, record| {
        acc.cases += record.total_cases;
        acc.deaths += record.total_deaths;
        acc.recovered += record.total_recovered;
        acc.active += record.total_active_cases;
        acc
    })
}

/// Compact display for metric cards: one decimal with a B/M/K suffix. A value
/// on a threshold takes the larger divisor, so 1_000_000 renders as "1.0M".
pub fn format_magnitude(value: u64) -> String {
    const BILLION: u64 = 1_000_000_000;
    const MILLION: u64 = 1_000_000;
    const THOUSAND: u64 = 1_000;

    if value >= BILLION {
        format!("{:.1}B", value as f64 / BILLION as f64)
    } else if value >= MILLION {
        format!("{:.1}M", value as f64 / MILLION as f64)
    } else if value >= THOUSAND {
        format!("{:.1}K", value as f64 / THOUSAND as f64)
    } else {
        value.to_string()
    }
}

/// Calendar half-year: months 1-6 are H1, months 7-12 are H2. The derived
/// ordering is chronological and matches the lexicographic order of labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HalfYear {
    pub year: i32,
    pub half: u8,
}

impl HalfYear {
    pub fn of(date: NaiveDate) -> Self {
        let half = if date.month() <= 6 { 1 } else { 2 };
        Self {
            year: date.year(),
            half,
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HalfYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-H{}", self.year, self.half)
    }
}

pub fn sum_by_half_year(records: &[&CaseRecord], metric: Metric) -> Vec<(HalfYear, u64)> {
    records
        .iter()
        .fold(BTreeMap::new(), |mut acc, record| {
            let entry = acc.entry(HalfYear::of(record.date)).or_insert(0_u64);
            *entry += metric.value_of(record);
            acc
        })
        .into_iter()
        .collect()
}

/// Mean over the rows present in each year, not over calendar days; ascending.
pub fn mean_by_year(records: &[&CaseRecord], metric: Metric) -> Vec<(i32, f64)> {
    records
        .iter()
        .fold(BTreeMap::new(), |mut acc, record| {
            let entry = acc.entry(record.date.year()).or_insert((0_u64, 0_usize));
            entry.0 += metric.value_of(record);
            entry.1 += 1;
            acc
        })
        .into_iter()
        .map(|(year, (sum, count))| (year, sum as f64 / count as f64))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Province,
    Island,
}

impl GroupKey {
    pub fn of<'a>(&self, record: &'a CaseRecord) -> &'a str {
        match self {
            Self::Province => &record.province,
            Self::Island => &record.island,
        }
    }
}

/// Most recent row per group, ordered by group name. On a date tie the first
/// row in input order wins.
pub fn latest_snapshot<'a>(records: &[&'a CaseRecord], key: GroupKey) -> Vec<&'a CaseRecord> {
    let mut latest: BTreeMap<&'a str, &'a CaseRecord> = BTreeMap::new();

    for record in records.iter().copied() {
        match latest.get(key.of(record)) {
            Some(current) if record.date <= current.date => {}
            _ => {
                latest.insert(key.of(record), record);
            }
        }
    }

    latest.into_values().collect()
}

/// Descending by metric, ties broken by group name; `n` past the row count
/// returns them all.
pub fn top_n<'a>(
    records: &[&'a CaseRecord],
    metric: Metric,
    key: GroupKey,
    n: usize,
) -> Vec<&'a CaseRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by(|left, right| {
        metric
            .value_of(right)
            .cmp(&metric.value_of(left))
            .then_with(|| key.of(left).cmp(key.of(right)))
    });
    ranked.truncate(n);

    ranked
}

/// Reproducible uniform sample without replacement, preserving input order.
/// At or below `max_n` rows the input comes back untouched.
pub fn sample<'a>(records: &[&'a CaseRecord], max_n: usize, seed: u64) -> Vec<&'a CaseRecord> {
    if records.len() <= max_n {
        return records.to_vec();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, records.len(), max_n).into_vec();
    picked.sort_unstable();

    picked.into_iter().map(|index| records[index]).collect()
}

#[cfg(test)]
mod tests {
    use super::{
        GroupKey, HalfYear, format_magnitude, latest_snapshot, mean_by_year, sample,
        sum_by_half_year, top_n, totals,
    };
    use crate::dataset::{CaseRecord, Metric};
    use chrono::NaiveDate;

    fn record(date: &str, province: &str, island: &str, cases: u64) -> CaseRecord {
        CaseRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("test date"),
            province: province.to_string(),
            island: island.to_string(),
            latitude: -6.2,
            longitude: 106.8,
            total_cases: cases,
            total_deaths: cases / 10,
            total_recovered: cases / 2,
            total_active_cases: cases - cases / 10 - cases / 2,
        }
    }

    fn refs(records: &[CaseRecord]) -> Vec<&CaseRecord> {
        records.iter().collect()
    }

    #[test]
    fn totals_sum_each_field() {
        let records = vec![
            record("2021-01-01", "Aceh", "Sumatera", 100),
            record("2021-01-02", "Bali", "Nusa Tenggara", 40),
        ];

        let sums = totals(&refs(&records));
        assert_eq!(sums.cases, 140);
        assert_eq!(sums.deaths, 14);
        assert_eq!(sums.recovered, 70);
        assert_eq!(sums.active, 56);
    }

    #[test]
    fn totals_of_nothing_are_zero() {
        let sums = totals(&[]);
        assert_eq!(sums.cases, 0);
        assert_eq!(sums.deaths, 0);
        assert_eq!(sums.recovered, 0);
        assert_eq!(sums.active, 0);
    }

    #[test]
    fn magnitude_formatting_boundaries() {
        assert_eq!(format_magnitude(0), "0");
        assert_eq!(format_magnitude(999), "999");
        assert_eq!(format_magnitude(1_000), "1.0K");
        assert_eq!(format_magnitude(1_500), "1.5K");
        assert_eq!(format_magnitude(999_999), "1000.0K");
        assert_eq!(format_magnitude(1_000_000), "1.0M");
        assert_eq!(format_magnitude(2_300_000), "2.3M");
        assert_eq!(format_magnitude(1_000_000_000), "1.0B");
    }

    #[test]
    fn magnitude_suffix_tier_never_regresses() {
        let tier = |value: u64| match format_magnitude(value).chars().last() {
            Some('B') => 3,
            Some('M') => 2,
            Some('K') => 1,
            _ => 0,
        };

        let ascending = [
            0,
            1,
            999,
            1_000,
            999_999,
            1_000_000,
            999_999_999,
            1_000_000_000,
            u64::MAX,
        ];
        for pair in ascending.windows(2) {
            assert!(tier(pair[0]) <= tier(pair[1]));
        }
    }

    #[test]
    fn half_year_buckets_derive_from_month() {
        let june = HalfYear::of(NaiveDate::from_ymd_opt(2021, 6, 30).expect("date"));
        let july = HalfYear::of(NaiveDate::from_ymd_opt(2021, 7, 1).expect("date"));

        assert_eq!(june.label(), "2021-H1");
        assert_eq!(july.label(), "2021-H2");
        assert!(june < july);
    }

    #[test]
    fn half_year_sums_are_chronological_and_complete() {
        let records = vec![
            record("2022-01-10", "Aceh", "Sumatera", 7),
            record("2021-02-01", "Aceh", "Sumatera", 10),
            record("2021-08-01", "Aceh", "Sumatera", 20),
            record("2021-03-01", "Bali", "Nusa Tenggara", 5),
        ];

        let buckets = sum_by_half_year(&refs(&records), Metric::Cases);
        let labels = buckets
            .iter()
            .map(|(period, _)| period.label())
            .collect::<Vec<_>>();

        assert_eq!(labels, vec!["2021-H1", "2021-H2", "2022-H1"]);
        assert_eq!(buckets[0].1, 15);
        assert_eq!(buckets[1].1, 20);
        assert_eq!(buckets[2].1, 7);
    }

    #[test]
    fn half_year_sums_of_nothing_are_empty() {
        assert!(sum_by_half_year(&[], Metric::Cases).is_empty());
        assert!(mean_by_year(&[], Metric::Recovered).is_empty());
    }

    #[test]
    fn yearly_means_average_present_rows() {
        let records = vec![
            record("2021-01-01", "Aceh", "Sumatera", 100),
            record("2021-06-01", "Bali", "Nusa Tenggara", 50),
            record("2022-01-01", "Aceh", "Sumatera", 200),
        ];

        let means = mean_by_year(&refs(&records), Metric::Cases);
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].0, 2021);
        assert!((means[0].1 - 75.0).abs() < f64::EPSILON);
        assert_eq!(means[1].0, 2022);
        assert!((means[1].1 - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_keeps_one_latest_row_per_group() {
        let records = vec![
            record("2021-05-01", "Aceh", "Sumatera", 10),
            record("2021-05-03", "Aceh", "Sumatera", 30),
            record("2021-05-02", "Aceh", "Sumatera", 20),
            record("2021-05-02", "Bali", "Nusa Tenggara", 5),
        ];

        let snapshot = latest_snapshot(&refs(&records), GroupKey::Province);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].province, "Aceh");
        assert_eq!(snapshot[0].total_cases, 30);
        assert_eq!(snapshot[1].province, "Bali");
    }

    #[test]
    fn snapshot_tie_keeps_first_encountered_row() {
        let records = vec![
            record("2021-05-03", "Aceh", "Sumatera", 111),
            record("2021-05-03", "Aceh", "Sumatera", 222),
        ];

        let snapshot = latest_snapshot(&refs(&records), GroupKey::Province);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].total_cases, 111);

        // Reversing the input flips which row is first encountered.
        let mut reversed = records.clone();
        reversed.reverse();
        let snapshot = latest_snapshot(&refs(&reversed), GroupKey::Province);
        assert_eq!(snapshot[0].total_cases, 222);
    }

    #[test]
    fn snapshot_by_island_groups_across_provinces() {
        let records = vec![
            record("2021-05-01", "Jawa Barat", "Jawa", 10),
            record("2021-05-04", "Jawa Timur", "Jawa", 40),
            record("2021-05-02", "Aceh", "Sumatera", 20),
        ];

        let snapshot = latest_snapshot(&refs(&records), GroupKey::Island);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].island, "Jawa");
        assert_eq!(snapshot[0].total_cases, 40);
        assert_eq!(snapshot[1].island, "Sumatera");
    }

    #[test]
    fn top_n_sorts_descending_and_clamps_to_available() {
        let records = vec![
            record("2021-05-01", "Aceh", "Sumatera", 10),
            record("2021-05-01", "Bali", "Nusa Tenggara", 50),
            record("2021-05-01", "Papua", "Papua", 30),
        ];
        let rows = refs(&records);

        let top_two = top_n(&rows, Metric::Cases, GroupKey::Province, 2);
        assert_eq!(top_two.len(), 2);
        assert_eq!(top_two[0].province, "Bali");
        assert_eq!(top_two[1].province, "Papua");

        let over_ask = top_n(&rows, Metric::Cases, GroupKey::Province, 10);
        assert_eq!(over_ask.len(), 3);
        assert_eq!(over_ask[2].province, "Aceh");
    }

    #[test]
    fn top_n_breaks_ties_by_group_name() {
        let records = vec![
            record("2021-05-01", "Papua", "Papua", 30),
            record("2021-05-01", "Aceh", "Sumatera", 30),
        ];

        let ranked = top_n(&refs(&records), Metric::Cases, GroupKey::Province, 2);
        assert_eq!(ranked[0].province, "Aceh");
        assert_eq!(ranked[1].province, "Papua");
    }

    #[test]
    fn sample_below_cap_is_identity() {
        let records = vec![
            record("2021-05-01", "Aceh", "Sumatera", 10),
            record("2021-05-02", "Bali", "Nusa Tenggara", 20),
        ];
        let rows = refs(&records);

        let sampled = sample(&rows, 1000, 42);
        assert_eq!(sampled.len(), 2);
        assert!(std::ptr::eq(sampled[0], rows[0]));
        assert!(std::ptr::eq(sampled[1], rows[1]));
    }

    #[test]
    fn sample_over_cap_is_exact_and_reproducible() {
        let records = (0..50)
            .map(|offset| {
                let day = 1 + (offset % 28) as u32;
                let date = NaiveDate::from_ymd_opt(2021, 1 + (offset / 28) as u32, day)
                    .expect("date")
                    .to_string();
                record(&date, &format!("Province {offset}"), "Jawa", offset as u64)
            })
            .collect::<Vec<_>>();
        let rows = refs(&records);

        let first = sample(&rows, 10, 42);
        let second = sample(&rows, 10, 42);

        assert_eq!(first.len(), 10);
        for (left, right) in first.iter().zip(second.iter()) {
            assert!(std::ptr::eq(*left, *right));
        }

        let other_seed = sample(&rows, 10, 43);
        assert!(
            first
                .iter()
                .zip(other_seed.iter())
                .any(|(left, right)| !std::ptr::eq(*left, *right))
        );

        // Sampled rows keep their relative input order.
        let mut positions = first
            .iter()
            .map(|kept| {
                rows.iter()
                    .position(|candidate| std::ptr::eq(*candidate, *kept))
                    .expect("sampled row comes from input")
            })
            .collect::<Vec<_>>();
        let sorted = {
            let mut copy = positions.clone();
            copy.sort_unstable();
            copy
        };
        assert_eq!(positions, sorted);
        positions.dedup();
        assert_eq!(positions.len(), 10);
    }
}
