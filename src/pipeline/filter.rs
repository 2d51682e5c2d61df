use crate::dataset::CaseRecord;
use anyhow::{Result, anyhow};
use chrono::Datelike;

/// Sentinel option meaning "no restriction" on a filter axis ("all" in
/// Indonesian). Matched exactly, so a province literally named `Semua` cannot
/// be selected on its own.
pub const ALL_SENTINEL: &str = "Semua";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvinceSelector {
    All,
    Province(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearSelector {
    All,
    Year(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub province: ProvinceSelector,
    pub year: YearSelector,
}

impl Selection {
    /// Builds a selection from raw query/CLI values. An absent value means the
    /// sentinel; a present year must parse as a calendar year.
    pub fn from_params(province: Option<&str>, year: Option<&str>) -> Result<Self> {
        let province = match province {
            None => ProvinceSelector::All,
            Some(raw) if raw == ALL_SENTINEL => ProvinceSelector::All,
            Some(raw) => ProvinceSelector::Province(raw.to_string()),
        };

        let year = match year {
            None => YearSelector::All,
            Some(raw) if raw == ALL_SENTINEL => YearSelector::All,
            Some(raw) => YearSelector::Year(raw.trim().parse::<i32>().map_err(|_| {
                anyhow!("Invalid year value: {raw}. Example: 2021 or {ALL_SENTINEL}")
            })?),
        };

        Ok(Self { province, year })
    }

    pub fn province_label(&self) -> &str {
        match &self.province {
            ProvinceSelector::All => ALL_SENTINEL,
            ProvinceSelector::Province(name) => name,
        }
    }

    pub fn year_label(&self) -> String {
        match self.year {
            YearSelector::All => ALL_SENTINEL.to_string(),
            YearSelector::Year(year) => year.to_string(),
        }
    }

    fn matches(&self, record: &CaseRecord) -> bool {
        let province_ok = match &self.province {
            ProvinceSelector::All => true,
            ProvinceSelector::Province(name) => record.province == *name,
        };
        let year_ok = match self.year {
            YearSelector::All => true,
            YearSelector::Year(year) => record.date.year() == year,
        };

        province_ok && year_ok
    }
}

/// Order-preserving AND filter over the record slice. Matching nothing is a
/// valid outcome, not an error.
pub fn filter<'a>(records: &'a [CaseRecord], selection: &Selection) -> Vec<&'a CaseRecord> {
    records
        .iter()
        .filter(|record| selection.matches(record))
        .collect()
}
