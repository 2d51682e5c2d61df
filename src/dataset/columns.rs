use crate::dataset::CaseRecord;
use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use serde::Deserialize;

pub const COL_DATE: &str = "Date";
pub const COL_PROVINCE: &str = "Province";
pub const COL_ISLAND: &str = "Island";
pub const COL_LATITUDE: &str = "Latitude";
pub const COL_LONGITUDE: &str = "Longitude";
pub const COL_TOTAL_CASES: &str = "Total Cases";
pub const COL_TOTAL_DEATHS: &str = "Total Deaths";
pub const COL_TOTAL_RECOVERED: &str = "Total Recovered";
pub const COL_TOTAL_ACTIVE_CASES: &str = "Total Active Cases";

// Indonesia bounding box (Sabang to Merauke), used by `doctor` coordinate checks.
pub const INDONESIA_LAT_MIN: f64 = -11.0;
pub const INDONESIA_LAT_MAX: f64 = 6.5;
pub const INDONESIA_LON_MIN: f64 = 94.5;
pub const INDONESIA_LON_MAX: f64 = 141.5;

/// One CSV row as it appears on disk; counts land as `i64` ahead of the
/// negative check.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Province")]
    pub province: String,
    #[serde(rename = "Island")]
    pub island: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Total Cases")]
    pub total_cases: i64,
    #[serde(rename = "Total Deaths")]
    pub total_deaths: i64,
    #[serde(rename = "Total Recovered")]
    pub total_recovered: i64,
    #[serde(rename = "Total Active Cases")]
    pub total_active_cases: i64,
}

impl RawRow {
    pub fn into_record(self) -> Result<CaseRecord> {
        Ok(CaseRecord {
            date: parse_date(&self.date)?,
            province: self.province,
            island: self.island,
            latitude: self.latitude,
            longitude: self.longitude,
            total_cases: count_field(COL_TOTAL_CASES, self.total_cases)?,
            total_deaths: count_field(COL_TOTAL_DEATHS, self.total_deaths)?,
            total_recovered: count_field(COL_TOTAL_RECOVERED, self.total_recovered)?,
            total_active_cases: count_field(COL_TOTAL_ACTIVE_CASES, self.total_active_cases)?,
        })
    }
}

pub fn required_headers() -> Vec<&'static str> {
    vec![
        COL_DATE,
        COL_PROVINCE,
        COL_ISLAND,
        COL_LATITUDE,
        COL_LONGITUDE,
        COL_TOTAL_CASES,
        COL_TOTAL_DEATHS,
        COL_TOTAL_RECOVERED,
        COL_TOTAL_ACTIVE_CASES,
    ]
}

pub fn check_required_headers(headers: &csv::StringRecord) -> Result<()> {
    let missing = required_headers()
        .into_iter()
        .filter(|name| !headers.iter().any(|header| header.trim() == *name))
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        bail!("Missing required column(s): {}", missing.join(", "));
    }

    Ok(())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y"))
        .map_err(|_| anyhow!("Invalid date value: {raw}. Examples: 2021-05-01 or 5/1/2021"))
}

pub fn within_indonesia(latitude: f64, longitude: f64) -> bool {
    (INDONESIA_LAT_MIN..=INDONESIA_LAT_MAX).contains(&latitude)
        && (INDONESIA_LON_MIN..=INDONESIA_LON_MAX).contains(&longitude)
}

fn count_field(column: &str, value: i64) -> Result<u64> {
    u64::try_from(value).with_context(|| format!("{column} must not be negative (got {value})"))
}

#[cfg(test)]
mod tests {
    use super::{check_required_headers, parse_date, within_indonesia};

    #[test]
    fn accepts_both_date_formats() {
        let iso = parse_date("2021-05-01").expect("iso date");
        let slash = parse_date("5/1/2021").expect("slash date");
        assert_eq!(iso, slash);
    }

    #[test]
    fn rejects_garbage_date() {
        assert!(parse_date("May 1st 2021").is_err());
    }

    #[test]
    fn header_check_names_missing_columns() {
        let headers = csv::StringRecord::from(vec!["Date", "Province", "Island"]);
        let error = check_required_headers(&headers).expect_err("incomplete header");
        assert!(error.to_string().contains("Total Cases"));
    }

    #[test]
    fn jakarta_is_inside_indonesia_bounds() {
        assert!(within_indonesia(-6.2, 106.8));
        assert!(!within_indonesia(37.5, 127.0));
    }
}
