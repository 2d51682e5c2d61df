pub mod columns;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// One pre-aggregated reporting row: cumulative counts for a province on a date.
#[derive(Debug, Clone, Serialize)]
pub struct CaseRecord {
    pub date: NaiveDate,
    pub province: String,
    pub island: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_cases: u64,
    pub total_deaths: u64,
    pub total_recovered: u64,
    pub total_active_cases: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cases,
    Deaths,
    Recovered,
    Active,
}

impl Metric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "cases" | "total_cases" => Some(Self::Cases),
            "deaths" | "total_deaths" => Some(Self::Deaths),
            "recovered" | "total_recovered" => Some(Self::Recovered),
            "active" | "total_active_cases" => Some(Self::Active),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cases => "Total Cases",
            Self::Deaths => "Total Deaths",
            Self::Recovered => "Total Recovered",
            Self::Active => "Total Active Cases",
        }
    }

    pub fn value_of(&self, record: &CaseRecord) -> u64 {
        match self {
            Self::Cases => record.total_cases,
            Self::Deaths => record.total_deaths,
            Self::Recovered => record.total_recovered,
            Self::Active => record.total_active_cases,
        }
    }
}

/// Loaded once per process, never mutated; every view recomputes from the full
/// record slice.
#[derive(Debug)]
pub struct Dataset {
    records: Vec<CaseRecord>,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dataset file: {}", path.display()))?;
        // Trim header cells so the header check and serde field matching agree.
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(file);

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
            .clone();
        columns::check_required_headers(&headers)
            .with_context(|| format!("Invalid dataset header: {}", path.display()))?;

        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<columns::RawRow>().enumerate() {
            // 1-based file line, accounting for the header row.
            let row_number = index + 2;
            let raw = row.with_context(|| {
                format!("Failed to parse row {row_number} of {}", path.display())
            })?;
            let record = raw
                .into_record()
                .with_context(|| format!("Invalid row {row_number} of {}", path.display()))?;
            records.push(record);
        }

        let dataset = Self { records };
        info!(
            rows = dataset.len(),
            provinces = dataset.provinces().len(),
            path = %path.display(),
            "dataset loaded"
        );

        Ok(dataset)
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct provinces in first-seen order, matching the source file.
    pub fn provinces(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|record| seen.insert(record.province.as_str()))
            .map(|record| record.province.clone())
            .collect()
    }

    pub fn islands(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|record| seen.insert(record.island.as_str()))
            .map(|record| record.island.clone())
            .collect()
    }

    pub fn years(&self) -> Vec<i32> {
        self.records
            .iter()
            .map(|record| record.date.year())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.iter().map(|record| record.date).min()?;
        let last = self.records.iter().map(|record| record.date).max()?;
        Some((first, last))
    }

    /// Rows where the active count disagrees with cases - deaths - recovered.
    /// Reported by `doctor`, never a load failure.
    pub fn active_mismatch_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| {
                let derived = record.total_cases as i64
                    - record.total_deaths as i64
                    - record.total_recovered as i64;
                derived != record.total_active_cases as i64
            })
            .count()
    }

    pub fn out_of_bounds_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| !columns::within_indonesia(record.latitude, record.longitude))
            .count()
    }
}
