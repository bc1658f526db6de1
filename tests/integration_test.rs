use async_trait::async_trait;
use chrono::NaiveDate;
use industry_nowcast::classification::{
    ClassificationEntry, ClassificationIndex, ClassificationLookup, MatchKind,
};
use industry_nowcast::config::Settings;
use industry_nowcast::data_source::{SeriesRequest, StaticSource, StatisticsSource};
use industry_nowcast::error::{NowcastError, Result};
use industry_nowcast::nowcast::{Confidence, GrowthMethod};
use industry_nowcast::period::{Period, PeriodRange};
use industry_nowcast::pipeline::{AnalysisPipeline, AnalysisRequest};
use industry_nowcast::presets::PresetCatalog;
use industry_nowcast::series::RawPoint;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn data_path(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(file)
}

fn seed_index() -> Arc<ClassificationIndex> {
    Arc::new(ClassificationIndex::from_csv_path(data_path("jsic_seed.csv")).unwrap())
}

fn presets() -> Arc<PresetCatalog> {
    Arc::new(PresetCatalog::from_path(data_path("presets.json")).unwrap())
}

fn settings() -> Settings {
    Settings {
        reference_date: NaiveDate::from_ymd_opt(2024, 1, 15),
        fetch_timeout_secs: 1,
        ..Settings::default()
    }
}

/// 24 months from 2022-01 growing 1% a month from 100
fn monthly_points() -> Vec<RawPoint> {
    (0..24)
        .map(|k| {
            let label = format!("{}-{:02}", 2022 + k / 12, k % 12 + 1);
            RawPoint::new(label, Some(100.0 * 1.01f64.powi(k)))
        })
        .collect()
}

fn close(a: f64, b: f64) -> bool {
    ((a - b) / b).abs() < 1e-9
}

struct CountingSource {
    inner: StaticSource,
    calls: AtomicUsize,
}

impl CountingSource {
    fn new(inner: StaticSource) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StatisticsSource for CountingSource {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn fetch(&self, request: &SeriesRequest) -> Result<Vec<RawPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(request).await
    }
}

struct SlowSource;

#[async_trait]
impl StatisticsSource for SlowSource {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn fetch(&self, _request: &SeriesRequest) -> Result<Vec<RawPoint>> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Vec::new())
    }
}

fn monthly_request(industry: &str) -> AnalysisRequest {
    AnalysisRequest::new(
        industry,
        "東京都",
        "service_industry_monthly",
        PeriodRange::new(2022, 2023).unwrap(),
    )
}

#[test]
fn test_seed_dictionary_loads() {
    let index = seed_index();
    assert!(index.len() > 40);
    let ancestors: Vec<&str> = index.ancestors("76").iter().map(|e| e.code.as_str()).collect();
    assert_eq!(ancestors, vec!["M"]);
    assert!(index.children("E").iter().any(|e| e.code == "09"));
}

#[test]
fn test_seed_resolution() {
    let resolver = settings().resolver(seed_index());

    let exact = resolver.resolve("Manufacturing").unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].code, "E");
    assert_eq!(exact[0].match_kind, MatchKind::Exact);

    let alias = resolver.resolve("ラーメン店").unwrap();
    assert_eq!(alias[0].code, "76");
    assert_eq!(alias[0].match_kind, MatchKind::Alias);

    let fuzzy = resolver.resolve("ラーメン屋").unwrap();
    assert_eq!(fuzzy[0].code, "76");
    assert_eq!(fuzzy[0].match_kind, MatchKind::Fuzzy);
    assert!(fuzzy[0].score < 1.0);

    assert!(matches!(resolver.resolve("   "), Err(NowcastError::EmptyQuery(_))));
    assert!(matches!(resolver.resolve("zzqxv"), Err(NowcastError::NoMatchFound { .. })));
}

#[tokio::test]
async fn test_monthly_analysis_end_to_end() {
    let source = StaticSource::new().with_series("76", monthly_points());
    let pipeline = AnalysisPipeline::new(seed_index(), presets(), Arc::new(source), settings());

    let report = pipeline
        .run(&monthly_request("ラーメン店").with_horizon(2))
        .await
        .unwrap();

    assert_eq!(report.resolution().code, "76");
    assert_eq!(report.series().len(), 24);
    assert_eq!(report.series().gap_count(), 0);

    let nowcast = report.nowcast();
    assert_eq!(nowcast.method, GrowthMethod::TrailingAverageRate);
    assert!(close(nowcast.growth_rate_used, 0.01));
    assert_eq!(nowcast.confidence, Confidence::High);
    assert_eq!(nowcast.projected_points.len(), 2);

    let last = 100.0 * 1.01f64.powi(23);
    assert_eq!(nowcast.projected_points[0].period, Period::monthly(2024, 1).unwrap());
    assert!(close(nowcast.projected_points[0].value.unwrap(), last * 1.01));
    assert_eq!(nowcast.projected_points[1].period, Period::monthly(2024, 2).unwrap());
    assert!(close(nowcast.projected_points[1].value.unwrap(), last * 1.01 * 1.01));

    let kpis = report.kpis();
    assert!(close(kpis.change_from_previous.unwrap(), 0.01));

    let context = report.context().unwrap();
    assert_eq!(context.region.code, "13000");
    assert_eq!(context.preset_id, "service_industry_monthly");

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["nowcast"]["confidence"], "HIGH");
    assert_eq!(json["resolution"]["match_kind"], "ALIAS");
    assert_eq!(json["context"]["region"]["code"], "13000");
}

#[tokio::test]
async fn test_supplied_rate_on_short_history() {
    let source = StaticSource::new().with_series("76", vec![RawPoint::new("2023-12", Some(200.0))]);
    let pipeline = AnalysisPipeline::new(seed_index(), presets(), Arc::new(source), settings());

    let report = pipeline
        .run(&monthly_request("ラーメン店").with_growth_rate(0.02))
        .await
        .unwrap();

    let nowcast = report.nowcast();
    assert_eq!(nowcast.method, GrowthMethod::UserSuppliedRate);
    assert_eq!(nowcast.confidence, Confidence::Low);
    assert!(close(nowcast.projected_points[0].value.unwrap(), 204.0));
}

#[tokio::test]
async fn test_insufficient_history_without_rate() {
    let source = StaticSource::new().with_series("76", vec![RawPoint::new("2023-12", Some(200.0))]);
    let pipeline = AnalysisPipeline::new(seed_index(), presets(), Arc::new(source), settings());

    let err = pipeline.run(&monthly_request("ラーメン店")).await.unwrap_err();
    assert!(matches!(err, NowcastError::InsufficientHistory { found: 1, required: 2 }));
}

#[tokio::test]
async fn test_malformed_period_from_source() {
    let source = StaticSource::new().with_series(
        "76",
        vec![RawPoint::new("2023-11", Some(1.0)), RawPoint::new("2023-13", Some(2.0))],
    );
    let pipeline = AnalysisPipeline::new(seed_index(), presets(), Arc::new(source), settings());

    let err = pipeline.run(&monthly_request("ラーメン店")).await.unwrap_err();
    assert!(matches!(err, NowcastError::MalformedPeriod { ref label, .. } if label == "2023-13"));
}

#[tokio::test]
async fn test_ambiguous_industry_fails_before_fetch() {
    let index = ClassificationIndex::from_entries(vec![
        ClassificationEntry::new("X1", "Sushi bars"),
        ClassificationEntry::new("X2", "Sushi cars"),
    ])
    .unwrap();
    let index: Arc<dyn ClassificationLookup> = Arc::new(index);
    let source = Arc::new(CountingSource::new(
        StaticSource::new().with_series("X2", monthly_points()),
    ));
    let pipeline = AnalysisPipeline::new(Arc::clone(&index), presets(), source.clone(), settings());

    let err = pipeline.run(&monthly_request("sushi")).await.unwrap_err();
    assert!(matches!(err, NowcastError::AmbiguousResolution { ref first, ref second, .. }
        if first == "X1" && second == "X2"));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);

    let report = pipeline
        .run(&monthly_request("sushi").with_code("X2"))
        .await
        .unwrap();
    assert_eq!(report.resolution().code, "X2");
    assert_eq!(report.alternatives()[0].code, "X1");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_series_is_unavailable() {
    let source = Arc::new(StaticSource::new());
    let pipeline = AnalysisPipeline::new(seed_index(), presets(), source, settings());

    let err = pipeline.run(&monthly_request("ラーメン店")).await.unwrap_err();
    assert!(matches!(err, NowcastError::DataSourceUnavailable(_)));
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let pipeline = AnalysisPipeline::new(seed_index(), presets(), Arc::new(SlowSource), settings());

    let err = pipeline.run(&monthly_request("ラーメン店")).await.unwrap_err();
    assert!(matches!(err, NowcastError::DataSourceUnavailable(ref m) if m.contains("timed out")));
}

#[tokio::test]
async fn test_oversized_horizon_is_rejected() {
    let source = StaticSource::new().with_series("76", monthly_points());
    let pipeline = AnalysisPipeline::new(seed_index(), presets(), Arc::new(source), settings());

    let err = pipeline
        .run(&monthly_request("ラーメン店").with_horizon(usize::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, NowcastError::HorizonTooLong { max: 36, .. }));
}

#[tokio::test]
async fn test_unknown_region_and_preset() {
    let source = StaticSource::new().with_series("76", monthly_points());
    let pipeline = AnalysisPipeline::new(seed_index(), presets(), Arc::new(source), settings());

    let mut request = monthly_request("ラーメン店");
    request.region = "Atlantis".to_string();
    assert!(matches!(pipeline.run(&request).await, Err(NowcastError::UnknownRegion(_))));

    let mut request = monthly_request("ラーメン店");
    request.preset = "nope".to_string();
    assert!(matches!(pipeline.run(&request).await, Err(NowcastError::UnknownPreset(_))));
}
