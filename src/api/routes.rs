use crate::api::get_embedded_asset;
use crate::config::{Config, TOP_ISLANDS_RANGE, TOP_PROVINCES_RANGE};
use crate::dataset::{CaseRecord, Dataset, Metric};
use crate::pipeline::aggregate::{self, GroupKey};
use crate::pipeline::filter::{self, ALL_SENTINEL, Selection};
use crate::pipeline::report::{self, MetricCard, RankedRow, TrendPoint, YearlyPoint};
use crate::pipeline::{HEATMAP_SAMPLE_CAP, HEATMAP_SAMPLE_SEED};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub dataset: Arc<Dataset>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/filters", get(filters))
        .route("/api/v1/summary", get(summary))
        .route("/api/v1/trend/:metric", get(trend))
        .route("/api/v1/yearly/:metric", get(yearly))
        .route("/api/v1/provinces/top", get(top_provinces))
        .route("/api/v1/islands/top", get(top_islands))
        .route("/api/v1/heatmap", get(heatmap))
        .fallback(get(static_assets))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SelectionQuery {
    province: Option<String>,
    year: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RankingQuery {
    province: Option<String>,
    year: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    rows: usize,
    provinces: usize,
    islands: usize,
    first_date: Option<String>,
    last_date: Option<String>,
    api_port: u16,
}

#[derive(Debug, Serialize)]
struct FiltersPayload {
    provinces: Vec<String>,
    years: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SummaryPayload {
    province: String,
    year: String,
    row_count: usize,
    cards: Vec<MetricCard>,
}

#[derive(Debug, Serialize)]
struct TrendPayload {
    metric: String,
    province: String,
    year: String,
    points: Vec<TrendPoint>,
}

#[derive(Debug, Serialize)]
struct YearlyPayload {
    metric: String,
    province: String,
    year: String,
    points: Vec<YearlyPoint>,
}

#[derive(Debug, Serialize)]
struct RankingPayload {
    province: String,
    year: String,
    limit: usize,
    entries: Vec<RankedRow>,
}

#[derive(Debug, Serialize)]
struct MapCenter {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
struct HeatPoint {
    latitude: f64,
    longitude: f64,
    province: String,
    total_cases: u64,
    total_deaths: u64,
}

#[derive(Debug, Serialize)]
struct HeatmapPayload {
    province: String,
    year: String,
    total_points: usize,
    sampled: bool,
    center: Option<MapCenter>,
    points: Vec<HeatPoint>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let dataset = &state.dataset;
    let (first_date, last_date) = match dataset.date_range() {
        Some((first, last)) => (
            Some(first.format("%Y-%m-%d").to_string()),
            Some(last.format("%Y-%m-%d").to_string()),
        ),
        None => (None, None),
    };

    let payload = StatusPayload {
        rows: dataset.len(),
        provinces: dataset.provinces().len(),
        islands: dataset.islands().len(),
        first_date,
        last_date,
        api_port: state.config.api_port,
    };

    Ok(Json(payload))
}

async fn filters(State(state): State<ApiState>) -> ApiResult<Json<FiltersPayload>> {
    let mut provinces = vec![ALL_SENTINEL.to_string()];
    provinces.extend(state.dataset.provinces());

    let mut years = vec![ALL_SENTINEL.to_string()];
    years.extend(state.dataset.years().into_iter().map(|year| year.to_string()));

    Ok(Json(FiltersPayload { provinces, years }))
}

async fn summary(
    State(state): State<ApiState>,
    Query(query): Query<SelectionQuery>,
) -> ApiResult<Json<SummaryPayload>> {
    let selection = parse_selection(query.province.as_deref(), query.year.as_deref())?;
    let rows = filter::filter(state.dataset.records(), &selection);
    let totals = aggregate::totals(&rows);

    Ok(Json(SummaryPayload {
        province: selection.province_label().to_string(),
        year: selection.year_label(),
        row_count: rows.len(),
        cards: report::metric_cards(&totals),
    }))
}

async fn trend(
    State(state): State<ApiState>,
    Path(metric): Path<String>,
    Query(query): Query<SelectionQuery>,
) -> ApiResult<Json<TrendPayload>> {
    let metric = parse_trend_metric(&metric)?;
    let selection = parse_selection(query.province.as_deref(), query.year.as_deref())?;
    let rows = filter::filter(state.dataset.records(), &selection);

    let points = aggregate::sum_by_half_year(&rows, metric)
        .into_iter()
        .map(|(period, value)| TrendPoint {
            period: period.label(),
            value,
        })
        .collect();

    Ok(Json(TrendPayload {
        metric: metric.label().to_string(),
        province: selection.province_label().to_string(),
        year: selection.year_label(),
        points,
    }))
}

async fn yearly(
    State(state): State<ApiState>,
    Path(metric): Path<String>,
    Query(query): Query<SelectionQuery>,
) -> ApiResult<Json<YearlyPayload>> {
    let metric =
        Metric::parse(&metric).ok_or_else(|| ApiError::BadRequest(unknown_metric(&metric)))?;
    let selection = parse_selection(query.province.as_deref(), query.year.as_deref())?;
    let rows = filter::filter(state.dataset.records(), &selection);

    let points = aggregate::mean_by_year(&rows, metric)
        .into_iter()
        .map(|(year, mean)| YearlyPoint {
            year,
            mean,
            display: report::yearly_display(mean),
        })
        .collect();

    Ok(Json(YearlyPayload {
        metric: metric.label().to_string(),
        province: selection.province_label().to_string(),
        year: selection.year_label(),
        points,
    }))
}

async fn top_provinces(
    State(state): State<ApiState>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<RankingPayload>> {
    let limit = query
        .limit
        .unwrap_or(state.config.top_provinces)
        .clamp(TOP_PROVINCES_RANGE.0, TOP_PROVINCES_RANGE.1);
    let selection = parse_selection(query.province.as_deref(), query.year.as_deref())?;
    let rows = filter::filter(state.dataset.records(), &selection);

    let snapshot = aggregate::latest_snapshot(&rows, GroupKey::Province);
    let ranked = aggregate::top_n(&snapshot, Metric::Cases, GroupKey::Province, limit);

    Ok(Json(RankingPayload {
        province: selection.province_label().to_string(),
        year: selection.year_label(),
        limit,
        entries: report::ranked_rows(&ranked, GroupKey::Province),
    }))
}

async fn top_islands(
    State(state): State<ApiState>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<RankingPayload>> {
    let limit = query
        .limit
        .unwrap_or(state.config.top_islands)
        .clamp(TOP_ISLANDS_RANGE.0, TOP_ISLANDS_RANGE.1);
    let selection = parse_selection(query.province.as_deref(), query.year.as_deref())?;
    let rows = filter::filter(state.dataset.records(), &selection);

    let snapshot = aggregate::latest_snapshot(&rows, GroupKey::Island);
    let ranked = aggregate::top_n(&snapshot, Metric::Cases, GroupKey::Island, limit);

    Ok(Json(RankingPayload {
        province: selection.province_label().to_string(),
        year: selection.year_label(),
        limit,
        entries: report::ranked_rows(&ranked, GroupKey::Island),
    }))
}

async fn heatmap(
    State(state): State<ApiState>,
    Query(query): Query<SelectionQuery>,
) -> ApiResult<Json<HeatmapPayload>> {
    let selection = parse_selection(query.province.as_deref(), query.year.as_deref())?;
    let rows = filter::filter(state.dataset.records(), &selection);

    // The map centers on the full filtered selection; only the plotted points
    // are sampled.
    let center = map_center(&rows);
    let sampled_rows = aggregate::sample(&rows, HEATMAP_SAMPLE_CAP, HEATMAP_SAMPLE_SEED);
    let sampled = sampled_rows.len() < rows.len();

    let points = sampled_rows
        .into_iter()
        .map(|record| HeatPoint {
            latitude: record.latitude,
            longitude: record.longitude,
            province: record.province.clone(),
            total_cases: record.total_cases,
            total_deaths: record.total_deaths,
        })
        .collect();

    Ok(Json(HeatmapPayload {
        province: selection.province_label().to_string(),
        year: selection.year_label(),
        total_points: rows.len(),
        sampled,
        center,
        points,
    }))
}

async fn static_assets(uri: Uri) -> ApiResult<Response> {
    let path = uri.path();

    match get_embedded_asset(path) {
        Some((bytes, mime)) => {
            let mut response = Response::new(bytes.into_response().into_body());
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_str(&mime)?);
            Ok(response)
        }
        None => Err(ApiError::NotFound("Static asset not found".to_string())),
    }
}

fn parse_selection(province: Option<&str>, year: Option<&str>) -> Result<Selection, ApiError> {
    Selection::from_params(province, year).map_err(|error| ApiError::BadRequest(error.to_string()))
}

fn parse_trend_metric(raw: &str) -> Result<Metric, ApiError> {
    match Metric::parse(raw) {
        Some(metric @ (Metric::Cases | Metric::Deaths)) => Ok(metric),
        Some(_) => Err(ApiError::BadRequest(format!(
            "Trend charts cover cases or deaths, got: {raw}"
        ))),
        None => Err(ApiError::BadRequest(unknown_metric(raw))),
    }
}

fn unknown_metric(raw: &str) -> String {
    format!("Unknown metric: {raw}. Expected cases, deaths, recovered or active")
}

fn map_center(records: &[&CaseRecord]) -> Option<MapCenter> {
    if records.is_empty() {
        return None;
    }

    let count = records.len() as f64;
    let latitude = records.iter().map(|record| record.latitude).sum::<f64>() / count;
    let longitude = records.iter().map(|record| record.longitude).sum::<f64>() / count;

    Some(MapCenter {
        latitude,
        longitude,
    })
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<axum::http::header::InvalidHeaderValue> for ApiError {
    fn from(value: axum::http::header::InvalidHeaderValue) -> Self {
        Self::Internal(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{map_center, parse_selection, parse_trend_metric};
    use crate::dataset::{CaseRecord, Metric};
    use chrono::NaiveDate;

    fn record(latitude: f64, longitude: f64) -> CaseRecord {
        CaseRecord {
            date: NaiveDate::from_ymd_opt(2021, 5, 1).expect("date"),
            province: "Aceh".to_string(),
            island: "Sumatera".to_string(),
            latitude,
            longitude,
            total_cases: 10,
            total_deaths: 1,
            total_recovered: 5,
            total_active_cases: 4,
        }
    }

    #[test]
    fn trend_metric_is_limited_to_cases_and_deaths() {
        assert_eq!(parse_trend_metric("cases").expect("cases"), Metric::Cases);
        assert_eq!(parse_trend_metric("deaths").expect("deaths"), Metric::Deaths);
        assert!(parse_trend_metric("recovered").is_err());
        assert!(parse_trend_metric("nope").is_err());
    }

    #[test]
    fn bad_year_becomes_a_request_error() {
        assert!(parse_selection(None, Some("soon")).is_err());
        assert!(parse_selection(Some("Bali"), Some("2021")).is_ok());
    }

    #[test]
    fn map_center_is_the_mean_of_the_selection() {
        let records = vec![record(-6.0, 106.0), record(-8.0, 110.0)];
        let rows = records.iter().collect::<Vec<_>>();

        let center = map_center(&rows).expect("center");
        assert!((center.latitude + 7.0).abs() < f64::EPSILON);
        assert!((center.longitude - 108.0).abs() < f64::EPSILON);

        assert!(map_center(&[]).is_none());
    }
}
