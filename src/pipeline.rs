//! Analysis pipeline: industry text in, `Report` out.
//!
//! Stages run in order: resolve, select, region/preset lookup, fetch,
//! normalize, project, assemble. Each request owns its intermediate values;
//! only the index, catalog and source are shared.

use crate::classification::{ClassificationLookup, MatchKind};
use crate::config::Settings;
use crate::data_source::{fetch_with_timeout, SeriesRequest, StatisticsSource};
use crate::error::{NowcastError, Result};
use crate::nowcast::NowcastEngine;
use crate::period::PeriodRange;
use crate::presets::PresetCatalog;
use crate::region::Region;
use crate::resolver::{IndustryResolver, ResolutionCandidate};
use crate::series::SeriesNormalizer;
use crate::summary::{Report, RequestContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

fn default_horizon() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Free-text industry description
    pub industry: String,
    /// Region name or area code
    pub region: String,
    pub preset: String,
    pub range: PeriodRange,
    /// Monthly growth rate overriding the trailing average
    #[serde(default)]
    pub growth_rate: Option<f64>,
    /// Classification code chosen by the user, bypassing the ambiguity check
    #[serde(default)]
    pub preselected_code: Option<String>,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
}

impl AnalysisRequest {
    pub fn new(
        industry: impl Into<String>,
        region: impl Into<String>,
        preset: impl Into<String>,
        range: PeriodRange,
    ) -> Self {
        Self {
            industry: industry.into(),
            region: region.into(),
            preset: preset.into(),
            range,
            growth_rate: None,
            preselected_code: None,
            horizon: default_horizon(),
        }
    }

    pub fn with_growth_rate(mut self, monthly_rate: f64) -> Self {
        self.growth_rate = Some(monthly_rate);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.preselected_code = Some(code.into());
        self
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }
}

pub struct AnalysisPipeline {
    index: Arc<dyn ClassificationLookup>,
    presets: Arc<PresetCatalog>,
    source: Arc<dyn StatisticsSource>,
    settings: Settings,
}

impl AnalysisPipeline {
    pub fn new(
        index: Arc<dyn ClassificationLookup>,
        presets: Arc<PresetCatalog>,
        source: Arc<dyn StatisticsSource>,
        settings: Settings,
    ) -> Self {
        Self {
            index,
            presets,
            source,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resolver(&self) -> IndustryResolver {
        self.settings.resolver(Arc::clone(&self.index))
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<Report> {
        info!(
            industry = %request.industry,
            region = %request.region,
            preset = %request.preset,
            "Starting analysis"
        );

        let candidates = self.candidates(request)?;
        let assembler = self.settings.assembler();
        let chosen = assembler
            .select(&candidates, request.preselected_code.as_deref())?
            .clone();
        info!(
            code = %chosen.code,
            name = %chosen.canonical_name,
            score = chosen.score,
            "Industry resolved"
        );

        let region = Region::lookup(&request.region)?;
        let preset = self.presets.get(&request.preset)?.clone();
        let granularity = preset.granularity;

        let series_request = SeriesRequest {
            code: chosen.code.clone(),
            region: region.clone(),
            preset,
            range: request.range,
        };
        let raw = fetch_with_timeout(
            self.source.as_ref(),
            &series_request,
            self.settings.fetch_timeout(),
        )
        .await?;

        let series = SeriesNormalizer::new(granularity).normalize(&raw)?;
        info!(
            points = series.len(),
            observed = series.observed_count(),
            gaps = series.gap_count(),
            "Series normalized"
        );

        let engine = NowcastEngine::new(self.settings.nowcast_config());
        let nowcast = engine.project(&series, request.horizon, request.growth_rate)?;
        info!(
            method = ?nowcast.method,
            rate = nowcast.growth_rate_used,
            confidence = ?nowcast.confidence,
            "Nowcast projected"
        );

        let context = RequestContext {
            query: request.industry.clone(),
            region,
            preset_id: request.preset.clone(),
            start_year: request.range.start_year,
            end_year: request.range.end_year,
        };

        // Selection already passed above, so pin the chosen code for assembly.
        let report = assembler
            .assemble(candidates, series, nowcast, Some(&chosen.code))?
            .with_context(context);
        Ok(report)
    }

    /// Ranked candidates for the request, with the preselected code (if any)
    /// guaranteed to be among them.
    fn candidates(&self, request: &AnalysisRequest) -> Result<Vec<ResolutionCandidate>> {
        let resolver = self.resolver();

        let Some(code) = request.preselected_code.as_deref() else {
            return resolver.resolve(&request.industry);
        };

        let entry = self
            .index
            .entry(code)
            .ok_or_else(|| NowcastError::UnknownCode(code.to_string()))?;

        let mut candidates = match resolver.resolve(&request.industry) {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "No resolver candidates alongside preselected code");
                Vec::new()
            }
        };

        if !candidates.iter().any(|c| c.code == entry.code) {
            candidates.insert(
                0,
                ResolutionCandidate {
                    code: entry.code.clone(),
                    canonical_name: entry.canonical_name.clone(),
                    score: 1.0,
                    match_kind: MatchKind::Exact,
                },
            );
        }
        Ok(candidates)
    }
}
