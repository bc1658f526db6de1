//! Series Normalizer
//!
//! Turns the irregular period → value pairs returned by a statistics source
//! into a canonical, gap-explicit series. Gaps are inserted as absent values;
//! nothing is ever interpolated.

use crate::error::Result;
use crate::period::{Granularity, Period};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A point as delivered by a data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    /// Source period label (e.g. "2023-01", "2023年", "2023000000")
    pub period: String,
    pub value: Option<f64>,
    /// Revision timestamp, when the source declares one
    #[serde(default)]
    pub revised_at: Option<DateTime<Utc>>,
}

impl RawPoint {
    pub fn new(period: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            period: period.into(),
            value,
            revised_at: None,
        }
    }

    pub fn revised(mut self, at: DateTime<Utc>) -> Self {
        self.revised_at = Some(at);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub period: Period,
    /// `None` marks a missing observation
    pub value: Option<f64>,
}

impl SeriesPoint {
    pub fn new(period: Period, value: Option<f64>) -> Self {
        Self { period, value }
    }
}

/// Ordered, duplicate-free, contiguous series at one granularity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    granularity: Granularity,
    points: Vec<SeriesPoint>,
}

impl NormalizedSeries {
    pub fn empty(granularity: Granularity) -> Self {
        Self {
            granularity,
            points: Vec::new(),
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Non-absent observations in period order
    pub fn observed(&self) -> impl DoubleEndedIterator<Item = (Period, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|v| (p.period, v)))
    }

    pub fn observed_count(&self) -> usize {
        self.observed().count()
    }

    pub fn gap_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_none()).count()
    }

    pub fn first_period(&self) -> Option<Period> {
        self.points.first().map(|p| p.period)
    }

    pub fn last_period(&self) -> Option<Period> {
        self.points.last().map(|p| p.period)
    }

    pub fn last_observed(&self) -> Option<(Period, f64)> {
        self.observed().next_back()
    }

    pub fn value_at(&self, period: Period) -> Option<f64> {
        let first = self.first_period()?;
        let offset = period.periods_since(&first);
        if offset < 0 {
            return None;
        }
        self.points.get(offset as usize).and_then(|p| p.value)
    }

    /// Back to source form, with canonical labels
    pub fn to_raw(&self) -> Vec<RawPoint> {
        self.points
            .iter()
            .map(|p| RawPoint::new(p.period.to_string(), p.value))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SeriesNormalizer {
    granularity: Granularity,
}

impl SeriesNormalizer {
    pub fn new(granularity: Granularity) -> Self {
        Self { granularity }
    }

    /// Deduplicate, sort and gap-fill raw points.
    ///
    /// Among duplicate periods the point with the latest revision timestamp
    /// wins; points without a timestamp lose to timestamped ones, and ties go
    /// to the later input position. Non-finite values count as absent.
    pub fn normalize(&self, raw: &[RawPoint]) -> Result<NormalizedSeries> {
        let mut latest: BTreeMap<Period, (Option<DateTime<Utc>>, Option<f64>)> = BTreeMap::new();
        let mut duplicates = 0usize;

        for point in raw {
            let period = Period::parse(&point.period, self.granularity)?;
            let value = point.value.filter(|v| v.is_finite());

            match latest.get(&period) {
                Some((revised_at, _)) => {
                    duplicates += 1;
                    if point.revised_at >= *revised_at {
                        latest.insert(period, (point.revised_at, value));
                    }
                }
                None => {
                    latest.insert(period, (point.revised_at, value));
                }
            }
        }

        let (first, last) = match (latest.keys().next(), latest.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(NormalizedSeries::empty(self.granularity)),
        };

        let points: Vec<SeriesPoint> = Period::range_inclusive(first, last)
            .into_iter()
            .map(|period| SeriesPoint::new(period, latest.get(&period).and_then(|(_, v)| *v)))
            .collect();

        let inserted = points.len() - latest.len();
        debug!(
            granularity = %self.granularity,
            raw = raw.len(),
            points = points.len(),
            duplicates,
            inserted_gaps = inserted,
            "Series normalized"
        );

        Ok(NormalizedSeries {
            granularity: self.granularity,
            points,
        })
    }
}
