//! Statistics data source contract.
//!
//! The core never talks to a statistics API directly: it hands a
//! `SeriesRequest` to a `StatisticsSource` and bounds the call with a
//! timeout. Failures are surfaced as `DataSourceUnavailable` and never retried
//! here.

use crate::error::{NowcastError, Result};
use crate::period::PeriodRange;
use crate::presets::TablePreset;
use crate::region::Region;
use crate::series::RawPoint;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRequest {
    /// Resolved classification code
    pub code: String,
    pub region: Region,
    pub preset: TablePreset,
    pub range: PeriodRange,
}

impl SeriesRequest {
    pub fn query_params(&self) -> BTreeMap<String, String> {
        self.preset.query_params(&self.code, &self.region, &self.range)
    }
}

#[async_trait]
pub trait StatisticsSource: Send + Sync {
    /// Source name for logs and error messages
    fn name(&self) -> &'static str;

    async fn fetch(&self, request: &SeriesRequest) -> Result<Vec<RawPoint>>;
}

/// Fetch with an upper bound on latency. Timeouts and source errors both
/// become `DataSourceUnavailable`.
pub async fn fetch_with_timeout(
    source: &dyn StatisticsSource,
    request: &SeriesRequest,
    timeout: Duration,
) -> Result<Vec<RawPoint>> {
    debug!(source = source.name(), code = %request.code, ?timeout, "Fetching series");

    match tokio::time::timeout(timeout, source.fetch(request)).await {
        Ok(Ok(points)) => {
            debug!(source = source.name(), points = points.len(), "Series fetched");
            Ok(points)
        }
        Ok(Err(NowcastError::DataSourceUnavailable(message))) => {
            warn!(source = source.name(), %message, "Data source failed");
            Err(NowcastError::DataSourceUnavailable(message))
        }
        Ok(Err(other)) => {
            warn!(source = source.name(), error = %other, "Data source failed");
            Err(NowcastError::DataSourceUnavailable(format!(
                "{}: {}",
                source.name(),
                other
            )))
        }
        Err(_) => {
            warn!(source = source.name(), ?timeout, "Data source timed out");
            Err(NowcastError::DataSourceUnavailable(format!(
                "{} timed out after {:?}",
                source.name(),
                timeout
            )))
        }
    }
}

/// In-memory source keyed by classification code.
///
/// Returns the stored points as-is regardless of region or period range.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    series: HashMap<String, Vec<RawPoint>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, code: impl Into<String>, points: Vec<RawPoint>) -> Self {
        self.series.insert(code.into(), points);
        self
    }

    /// Load `{ "<code>": [ {"period": "...", "value": ...}, ... ] }`
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let series: HashMap<String, Vec<RawPoint>> = serde_json::from_str(&content)?;
        Ok(Self { series })
    }
}

#[async_trait]
impl StatisticsSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, request: &SeriesRequest) -> Result<Vec<RawPoint>> {
        self.series.get(&request.code).cloned().ok_or_else(|| {
            NowcastError::DataSourceUnavailable(format!(
                "no series stored for code {}",
                request.code
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Granularity;

    struct SlowSource;

    #[async_trait]
    impl StatisticsSource for SlowSource {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn fetch(&self, _request: &SeriesRequest) -> Result<Vec<RawPoint>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl StatisticsSource for BrokenSource {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn fetch(&self, _request: &SeriesRequest) -> Result<Vec<RawPoint>> {
            Err(NowcastError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )))
        }
    }

    fn request(code: &str) -> SeriesRequest {
        SeriesRequest {
            code: code.to_string(),
            region: Region::national(),
            preset: TablePreset {
                id: "test".to_string(),
                label: "Test table".to_string(),
                stats_data_id: "0000000000".to_string(),
                granularity: Granularity::Annual,
                default_params: BTreeMap::new(),
                classification_param: None,
                unit: None,
            },
            range: PeriodRange::new(2020, 2022).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let err = fetch_with_timeout(&SlowSource, &request("E"), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(
            matches!(err, NowcastError::DataSourceUnavailable(ref m) if m.contains("timed out"))
        );
    }

    #[tokio::test]
    async fn test_source_error_is_unavailable() {
        let err = fetch_with_timeout(&BrokenSource, &request("E"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NowcastError::DataSourceUnavailable(ref m) if m.contains("connection reset")
        ));
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticSource::new().with_series("E", vec![RawPoint::new("2021", Some(1.0))]);
        let points = fetch_with_timeout(&source, &request("E"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);

        let missing = fetch_with_timeout(&source, &request("D"), Duration::from_secs(1)).await;
        assert!(matches!(missing, Err(NowcastError::DataSourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_static_source_from_json_file() {
        let path = std::env::temp_dir().join(format!("series-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"E": [
                {"period": "2021", "value": 10.5},
                {"period": "2022", "value": null},
                {"period": "2023"}
            ]}"#,
        )
        .unwrap();

        let source = StaticSource::from_json_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let points = source.fetch(&request("E")).await.unwrap();
        assert_eq!(
            points,
            vec![
                RawPoint::new("2021", Some(10.5)),
                RawPoint::new("2022", None),
                RawPoint::new("2023", None),
            ]
        );
    }

    #[test]
    fn test_static_source_rejects_bad_file() {
        let missing = std::env::temp_dir().join(format!("absent-{}.json", uuid::Uuid::new_v4()));
        assert!(matches!(StaticSource::from_json_path(&missing), Err(NowcastError::Io(_))));
    }
}
