//! e-Stat `getStatsData` adapter.

use crate::data_source::{SeriesRequest, StatisticsSource};
use crate::error::{NowcastError, Result};
use crate::series::RawPoint;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.e-stat.go.jp/rest/3.0/app/json/getStatsData";

pub struct EstatSource {
    client: reqwest::Client,
    app_id: String,
    base_url: String,
}

impl EstatSource {
    pub fn new(app_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            app_id,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl StatisticsSource for EstatSource {
    fn name(&self) -> &'static str {
        "e-Stat"
    }

    async fn fetch(&self, request: &SeriesRequest) -> Result<Vec<RawPoint>> {
        let mut params = request.query_params();
        params.insert("appId".to_string(), self.app_id.clone());

        info!(
            stats_data_id = %request.preset.stats_data_id,
            area = %request.region.code,
            code = %request.code,
            "Requesting e-Stat data"
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| unavailable("e-Stat request failed", e))?
            .error_for_status()
            .map_err(|e| unavailable("e-Stat returned an error", e))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| unavailable("Failed to parse e-Stat response", e))?;

        parse_stats_payload(&payload)
    }
}

/// Decode a `getStatsData` JSON response into raw points keyed by time code.
///
/// Accepts the full response (`GET_STATS_DATA` wrapper) or the bare
/// `STATISTICAL_DATA` object. Rows sharing a time code are summed; `"-"` and
/// other unparseable cells are absent.
pub fn parse_stats_payload(payload: &Value) -> Result<Vec<RawPoint>> {
    let root = payload.get("GET_STATS_DATA").unwrap_or(payload);
    let data = root.get("STATISTICAL_DATA").unwrap_or(root);

    let result = root.get("RESULT").or_else(|| data.get("RESULT"));
    if let Some(result) = result {
        let status = match &result["STATUS"] {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if status != Some(0) {
            let message = result["ERROR_MSG"]
                .as_str()
                .unwrap_or("e-Stat API returned an error");
            return Err(NowcastError::DataSourceUnavailable(format!(
                "e-Stat status {}: {}",
                status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string()),
                message
            )));
        }
    }

    let rows: Vec<&Value> = match &data["DATA_INF"]["VALUE"] {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![&data["DATA_INF"]["VALUE"]],
        _ => Vec::new(),
    };

    let mut by_time: BTreeMap<String, Option<f64>> = BTreeMap::new();
    for row in rows {
        let Some(time) = row["@time"].as_str() else {
            debug!("Skipping VALUE row without @time");
            continue;
        };
        let value = parse_cell(&row["$"]);
        let slot = by_time.entry(time.to_string()).or_insert(None);
        if let Some(v) = value {
            *slot = Some(slot.unwrap_or(0.0) + v);
        }
    }

    debug!(periods = by_time.len(), "Parsed e-Stat payload");

    Ok(by_time
        .into_iter()
        .map(|(time, value)| RawPoint::new(time, value))
        .collect())
}

fn unavailable(context: &str, error: reqwest::Error) -> NowcastError {
    NowcastError::DataSourceUnavailable(format!("{}: {}", context, error))
}

fn parse_cell(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}
