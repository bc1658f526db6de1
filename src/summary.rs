//! Summary Assembler
//!
//! Combines the resolution, the normalized series and the nowcast into the
//! immutable `Report` handed to narrative and export consumers.

use crate::error::{NowcastError, Result};
use crate::nowcast::NowcastResult;
use crate::region::Region;
use crate::resolver::ResolutionCandidate;
use crate::series::{NormalizedSeries, SeriesPoint};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Headline figures derived from the observed history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub latest: Option<SeriesPoint>,
    /// Relative change versus the immediately preceding period
    pub change_from_previous: Option<f64>,
    /// Relative change versus the same period one year earlier
    pub change_from_year_earlier: Option<f64>,
    /// Compound annual growth between the first and latest observations
    pub cagr: Option<f64>,
}

impl Kpis {
    pub fn from_series(series: &NormalizedSeries) -> Self {
        let latest = series.last_observed();
        let relative_to = |offset: i64| -> Option<f64> {
            let (period, value) = latest?;
            let base = series.value_at(period.offset(-offset))?;
            (base != 0.0).then(|| (value - base) / base)
        };

        let cagr = match (series.observed().next(), latest) {
            (Some((first_period, first)), Some((last_period, last)))
                if first_period != last_period && first > 0.0 && last > 0.0 =>
            {
                let years = last_period.periods_since(&first_period) as f64
                    / series.granularity().periods_per_year() as f64;
                Some((last / first).powf(1.0 / years) - 1.0)
            }
            _ => None,
        };

        Self {
            latest: latest.map(|(period, value)| SeriesPoint::new(period, Some(value))),
            change_from_previous: relative_to(1),
            change_from_year_earlier: relative_to(series.granularity().periods_per_year() as i64),
            cagr,
        }
    }
}

/// Request details carried along for consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestContext {
    pub query: String,
    pub region: Region,
    pub preset_id: String,
    pub start_year: i32,
    pub end_year: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    id: Uuid,
    generated_at: DateTime<Utc>,
    resolution: ResolutionCandidate,
    alternatives: Vec<ResolutionCandidate>,
    series: NormalizedSeries,
    nowcast: NowcastResult,
    kpis: Kpis,
    context: Option<RequestContext>,
}

impl Report {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn resolution(&self) -> &ResolutionCandidate {
        &self.resolution
    }

    /// Runner-up candidates, best first
    pub fn alternatives(&self) -> &[ResolutionCandidate] {
        &self.alternatives
    }

    pub fn series(&self) -> &NormalizedSeries {
        &self.series
    }

    pub fn nowcast(&self) -> &NowcastResult {
        &self.nowcast
    }

    pub fn kpis(&self) -> &Kpis {
        &self.kpis
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct SummaryAssembler {
    ambiguity_epsilon: f64,
}

impl Default for SummaryAssembler {
    fn default() -> Self {
        Self::new(0.02)
    }
}

impl SummaryAssembler {
    pub fn new(ambiguity_epsilon: f64) -> Self {
        Self { ambiguity_epsilon }
    }

    /// Pick the resolution from ranked candidates.
    ///
    /// A preselected code wins outright if it is among the candidates.
    /// Otherwise the top candidate is taken unless the runner-up is within
    /// `ambiguity_epsilon` of it, which is reported as `AmbiguousResolution`.
    pub fn select<'a>(
        &self,
        candidates: &'a [ResolutionCandidate],
        preselected: Option<&str>,
    ) -> Result<&'a ResolutionCandidate> {
        if let Some(code) = preselected {
            return candidates
                .iter()
                .find(|c| c.code == code)
                .ok_or_else(|| NowcastError::UnknownCode(code.to_string()));
        }

        match candidates {
            [] => Err(NowcastError::NoMatchFound {
                query: String::new(),
                threshold: 0.0,
            }),
            [first, second, ..] if first.score - second.score < self.ambiguity_epsilon => {
                warn!(
                    first = %first.code,
                    second = %second.code,
                    first_score = first.score,
                    second_score = second.score,
                    "Ambiguous resolution"
                );
                Err(NowcastError::AmbiguousResolution {
                    first: first.code.clone(),
                    first_score: first.score,
                    second: second.code.clone(),
                    second_score: second.score,
                })
            }
            [first, ..] => Ok(first),
        }
    }

    pub fn assemble(
        &self,
        candidates: Vec<ResolutionCandidate>,
        series: NormalizedSeries,
        nowcast: NowcastResult,
        preselected: Option<&str>,
    ) -> Result<Report> {
        let chosen_code = self.select(&candidates, preselected)?.code.clone();

        let (mut chosen, alternatives): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(|c| c.code == chosen_code);
        let resolution = chosen
            .pop()
            .ok_or_else(|| NowcastError::UnknownCode(chosen_code.clone()))?;

        let kpis = Kpis::from_series(&series);

        info!(
            code = %resolution.code,
            points = series.len(),
            projected = nowcast.projected_points.len(),
            "Report assembled"
        );

        Ok(Report {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            resolution,
            alternatives,
            series,
            nowcast,
            kpis,
            context: None,
        })
    }
}
