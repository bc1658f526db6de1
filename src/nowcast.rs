//! Nowcast Engine
//!
//! Extends a normalized series a few periods past its last period by
//! compounding the last real observation at a constant growth rate. The rate
//! is either supplied by the caller (a monthly rate) or derived from the
//! trailing observations.

use crate::error::{NowcastError, Result};
use crate::period::Period;
use crate::series::{NormalizedSeries, SeriesPoint};
use chrono::{NaiveDate, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrowthMethod {
    UserSuppliedRate,
    TrailingAverageRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowcastResult {
    /// Future periods only, starting right after the series' last period
    pub projected_points: Vec<SeriesPoint>,
    /// Per-period ratio actually compounded (0.02 = 2%)
    pub growth_rate_used: f64,
    pub method: GrowthMethod,
    pub confidence: Confidence,
    /// Last real observation the projection compounds from
    pub anchor: SeriesPoint,
    /// Historical periods after the anchor with no value; compounded over, never filled
    pub skipped_periods: Vec<Period>,
}

#[derive(Debug, Clone)]
pub struct NowcastConfig {
    /// Number of most recent observations used for the trailing rate (at least 2)
    pub trailing_window: usize,
    /// Observations needed for HIGH confidence
    pub high_confidence_observations: usize,
    /// Observations needed for MEDIUM confidence
    pub medium_confidence_observations: usize,
    /// How many periods the latest observation may lag "now" and still count as recent
    pub recency_tolerance: i64,
    /// Fixed "today"; `None` uses the current UTC date
    pub reference_date: Option<NaiveDate>,
    /// Longest projection accepted, in periods
    pub max_horizon: usize,
}

impl Default for NowcastConfig {
    fn default() -> Self {
        Self {
            trailing_window: 12,
            high_confidence_observations: 12,
            medium_confidence_observations: 6,
            recency_tolerance: 1,
            reference_date: None,
            max_horizon: 36,
        }
    }
}

pub struct NowcastEngine {
    config: NowcastConfig,
}

impl Default for NowcastEngine {
    fn default() -> Self {
        Self::new(NowcastConfig::default())
    }
}

impl NowcastEngine {
    pub fn new(config: NowcastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NowcastConfig {
        &self.config
    }

    /// Project `horizon` periods past the end of `series`.
    ///
    /// `supplied_growth_rate` is a monthly rate; it is converted to the
    /// series' granularity by compounding.
    pub fn project(
        &self,
        series: &NormalizedSeries,
        horizon: usize,
        supplied_growth_rate: Option<f64>,
    ) -> Result<NowcastResult> {
        let today = self
            .config
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let now = Period::containing(today, series.granularity());
        self.project_at(series, horizon, supplied_growth_rate, now)
    }

    /// Same as [`project`](Self::project) with an explicit "now" period.
    pub fn project_at(
        &self,
        series: &NormalizedSeries,
        horizon: usize,
        supplied_growth_rate: Option<f64>,
        now: Period,
    ) -> Result<NowcastResult> {
        let too_long = || NowcastError::HorizonTooLong {
            horizon,
            max: self.config.max_horizon,
        };
        if horizon > self.config.max_horizon {
            return Err(too_long());
        }
        let steps = i64::try_from(horizon).map_err(|_| too_long())?;

        let (growth_rate, method) = match supplied_growth_rate {
            Some(monthly) => (
                per_period_rate(monthly, series.granularity().months_per_period())?,
                GrowthMethod::UserSuppliedRate,
            ),
            None => (self.trailing_growth_rate(series)?, GrowthMethod::TrailingAverageRate),
        };

        let (anchor_period, anchor_value) =
            series
                .last_observed()
                .ok_or(NowcastError::InsufficientHistory {
                    found: 0,
                    required: 1,
                })?;
        let last_period = series.last_period().unwrap_or(anchor_period);

        let skipped_periods = Period::range_inclusive(anchor_period.succ(), last_period);
        let elapsed = last_period.periods_since(&anchor_period);

        let projected_points: Vec<SeriesPoint> = (1..=steps)
            .map(|step| {
                let value = anchor_value * (1.0 + growth_rate).powf((elapsed + step) as f64);
                SeriesPoint::new(last_period.offset(step), Some(value))
            })
            .collect();

        let confidence = self.confidence_at(series, now);

        info!(
            anchor = %anchor_period,
            skipped = skipped_periods.len(),
            horizon,
            growth_rate,
            ?method,
            ?confidence,
            "Nowcast projected"
        );

        Ok(NowcastResult {
            projected_points,
            growth_rate_used: growth_rate,
            method,
            confidence,
            anchor: SeriesPoint::new(anchor_period, Some(anchor_value)),
            skipped_periods,
        })
    }

    /// Geometric mean of the period-over-period ratios across the most recent
    /// `trailing_window` observations. A ratio spanning a gap of `k` periods
    /// counts as `k` periods.
    pub fn trailing_growth_rate(&self, series: &NormalizedSeries) -> Result<f64> {
        let observed: Vec<(Period, f64)> = series.observed().collect();
        if observed.len() < 2 {
            return Err(NowcastError::InsufficientHistory {
                found: observed.len(),
                required: 2,
            });
        }

        let window = self.config.trailing_window.max(2).min(observed.len());
        let recent = &observed[observed.len() - window..];

        if let Some((period, value)) = recent.iter().find(|(_, v)| *v <= 0.0) {
            return Err(NowcastError::NonPositiveObservation {
                period: period.to_string(),
                value: *value,
            });
        }

        let (log_growth, span) = recent
            .iter()
            .tuple_windows()
            .fold((0.0, 0i64), |(log_growth, span), ((p0, v0), (p1, v1))| {
                (log_growth + (v1 / v0).ln(), span + p1.periods_since(p0))
            });

        Ok((log_growth / span as f64).exp() - 1.0)
    }

    /// Confidence tier at "now": HIGH needs enough observations and a recent
    /// latest observation; MEDIUM needs fewer observations; otherwise LOW.
    pub fn confidence_at(&self, series: &NormalizedSeries, now: Period) -> Confidence {
        let observations = series.observed_count();
        let recent = series
            .last_observed()
            .map(|(period, _)| now.periods_since(&period) <= self.config.recency_tolerance)
            .unwrap_or(false);

        if observations >= self.config.high_confidence_observations && recent {
            Confidence::High
        } else if observations >= self.config.medium_confidence_observations {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Convert a monthly rate to a rate per period of `months` months.
fn per_period_rate(monthly: f64, months: u32) -> Result<f64> {
    if !monthly.is_finite() || monthly <= -1.0 {
        return Err(NowcastError::InvalidGrowthRate(monthly));
    }
    if months == 1 {
        return Ok(monthly);
    }
    Ok((1.0 + monthly).powi(months as i32) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Granularity;
    use crate::series::{RawPoint, SeriesNormalizer};

    fn monthly_series(points: &[(&str, Option<f64>)]) -> NormalizedSeries {
        let raw: Vec<RawPoint> = points.iter().map(|(p, v)| RawPoint::new(*p, *v)).collect();
        SeriesNormalizer::new(Granularity::Monthly).normalize(&raw).unwrap()
    }

    fn month(year: i32, m: u32) -> Period {
        Period::monthly(year, m).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        let relative = ((actual - expected) / expected).abs();
        assert!(relative < 1e-6, "expected {} got {}", expected, actual);
    }

    #[test]
    fn test_trailing_rate_compounds_geometrically() {
        let series = monthly_series(&[
            ("2023-01", Some(100.0)),
            ("2023-02", Some(102.0)),
            ("2023-03", Some(104.04)),
        ]);
        let engine = NowcastEngine::default();
        let result = engine.project_at(&series, 2, None, month(2023, 4)).unwrap();

        assert_eq!(result.method, GrowthMethod::TrailingAverageRate);
        assert_close(result.growth_rate_used, 0.02);
        assert_eq!(result.projected_points.len(), 2);
        assert_eq!(result.projected_points[0].period, month(2023, 4));
        assert_eq!(result.projected_points[1].period, month(2023, 5));
        assert_close(result.projected_points[0].value.unwrap(), 106.1208);
        assert_close(result.projected_points[1].value.unwrap(), 108.243216);
        assert!(result.skipped_periods.is_empty());
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let series = monthly_series(&[("2023-01", Some(100.0)), ("2023-02", Some(110.0))]);
        let result = NowcastEngine::default()
            .project_at(&series, 0, None, month(2023, 3))
            .unwrap();
        assert!(result.projected_points.is_empty());
    }

    #[test]
    fn test_horizon_past_maximum_is_rejected() {
        let series = monthly_series(&[("2023-01", Some(100.0)), ("2023-02", Some(110.0))]);
        let engine = NowcastEngine::default();

        let err = engine.project_at(&series, usize::MAX, None, month(2023, 3)).unwrap_err();
        assert!(matches!(err, NowcastError::HorizonTooLong { max: 36, .. }));
        assert!(engine.project_at(&series, 37, None, month(2023, 3)).is_err());

        let result = engine.project_at(&series, 36, None, month(2023, 3)).unwrap();
        assert_eq!(result.projected_points.len(), 36);
    }

    #[test]
    fn test_insufficient_history_without_supplied_rate() {
        let series = monthly_series(&[("2023-01", Some(100.0)), ("2023-02", None)]);
        let err = NowcastEngine::default()
            .project_at(&series, 3, None, month(2023, 3))
            .unwrap_err();
        assert!(matches!(err, NowcastError::InsufficientHistory { found: 1, required: 2 }));
    }

    #[test]
    fn test_supplied_rate_used_directly_on_monthly_series() {
        let series = monthly_series(&[("2023-01", Some(200.0))]);
        let result = NowcastEngine::default()
            .project_at(&series, 1, Some(0.05), month(2023, 2))
            .unwrap();
        assert_eq!(result.method, GrowthMethod::UserSuppliedRate);
        assert_eq!(result.growth_rate_used, 0.05);
        assert_close(result.projected_points[0].value.unwrap(), 210.0);
    }

    #[test]
    fn test_supplied_monthly_rate_compounds_for_annual_series() {
        let raw = vec![RawPoint::new("2022", Some(1000.0)), RawPoint::new("2023", Some(1100.0))];
        let series = SeriesNormalizer::new(Granularity::Annual).normalize(&raw).unwrap();
        let result = NowcastEngine::default()
            .project_at(&series, 1, Some(0.01), Period::annual(2024))
            .unwrap();
        let annual = 1.01f64.powi(12) - 1.0;
        assert_close(result.growth_rate_used, annual);
        assert_eq!(result.projected_points[0].period, Period::annual(2024));
        assert_close(result.projected_points[0].value.unwrap(), 1100.0 * (1.0 + annual));
    }

    #[test]
    fn test_invalid_supplied_rate() {
        let series = monthly_series(&[("2023-01", Some(200.0))]);
        for rate in [-1.0, f64::NAN, f64::INFINITY] {
            let err = NowcastEngine::default()
                .project_at(&series, 1, Some(rate), month(2023, 2))
                .unwrap_err();
            assert!(matches!(err, NowcastError::InvalidGrowthRate(_)));
        }
    }

    #[test]
    fn test_trailing_gap_compounds_from_last_real_value() {
        let series = monthly_series(&[
            ("2023-01", Some(100.0)),
            ("2023-02", Some(110.0)),
            ("2023-03", None),
            ("2023-04", None),
        ]);
        let result = NowcastEngine::default()
            .project_at(&series, 1, Some(0.10), month(2023, 5))
            .unwrap();

        assert_eq!(result.anchor, SeriesPoint::new(month(2023, 2), Some(110.0)));
        assert_eq!(result.skipped_periods, vec![month(2023, 3), month(2023, 4)]);
        assert_eq!(result.projected_points[0].period, month(2023, 5));
        assert_close(result.projected_points[0].value.unwrap(), 110.0 * 1.1f64.powi(3));
    }

    #[test]
    fn test_trailing_rate_spans_interior_gap() {
        let series = monthly_series(&[
            ("2023-01", Some(100.0)),
            ("2023-03", Some(121.0)),
        ]);
        let rate = NowcastEngine::default().trailing_growth_rate(&series).unwrap();
        assert_close(rate, 0.10);
    }

    #[test]
    fn test_trailing_window_uses_most_recent_observations() {
        let series = monthly_series(&[
            ("2023-01", Some(10.0)),
            ("2023-02", Some(100.0)),
            ("2023-03", Some(103.0)),
            ("2023-04", Some(106.09)),
        ]);
        let engine = NowcastEngine::new(NowcastConfig {
            trailing_window: 3,
            ..NowcastConfig::default()
        });
        assert_close(engine.trailing_growth_rate(&series).unwrap(), 0.03);
    }

    #[test]
    fn test_non_positive_observation_rejected() {
        let series = monthly_series(&[("2023-01", Some(0.0)), ("2023-02", Some(5.0))]);
        let err = NowcastEngine::default().trailing_growth_rate(&series).unwrap_err();
        assert!(matches!(err, NowcastError::NonPositiveObservation { .. }));
    }

    #[test]
    fn test_confidence_tiers() {
        let engine = NowcastEngine::default();
        let twelve: Vec<(String, Option<f64>)> =
            (1..=12).map(|m| (format!("2023-{:02}", m), Some(100.0 + m as f64))).collect();
        let refs: Vec<(&str, Option<f64>)> = twelve.iter().map(|(p, v)| (p.as_str(), *v)).collect();
        let series = monthly_series(&refs);

        assert_eq!(engine.confidence_at(&series, month(2023, 12)), Confidence::High);
        assert_eq!(engine.confidence_at(&series, month(2024, 1)), Confidence::High);
        assert_eq!(engine.confidence_at(&series, month(2024, 2)), Confidence::Medium);

        let six = monthly_series(&refs[..6]);
        assert_eq!(engine.confidence_at(&six, month(2023, 6)), Confidence::Medium);

        let five = monthly_series(&refs[..5]);
        assert_eq!(engine.confidence_at(&five, month(2023, 5)), Confidence::Low);
    }

    #[test]
    fn test_project_uses_reference_date() {
        let series = monthly_series(&[("2023-01", Some(100.0)), ("2023-02", Some(101.0))]);
        let engine = NowcastEngine::new(NowcastConfig {
            reference_date: NaiveDate::from_ymd_opt(2023, 3, 10),
            medium_confidence_observations: 2,
            ..NowcastConfig::default()
        });
        let result = engine.project(&series, 1, None).unwrap();
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.projected_points[0].period, month(2023, 3));
    }
}
