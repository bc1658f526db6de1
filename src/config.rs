//! Runtime settings.
//!
//! Every tunable threshold lives here with its default; `from_env` lets a
//! deployment override them through `NOWCAST_*` variables.

use crate::classification::ClassificationLookup;
use crate::error::{NowcastError, Result};
use crate::nowcast::NowcastConfig;
use crate::resolver::IndustryResolver;
use crate::summary::SummaryAssembler;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub similarity_threshold: f64,
    pub candidate_limit: usize,
    pub ambiguity_epsilon: f64,
    pub trailing_window: usize,
    pub high_confidence_observations: usize,
    pub medium_confidence_observations: usize,
    pub recency_tolerance: i64,
    pub fetch_timeout_secs: u64,
    pub max_horizon: usize,
    pub reference_date: Option<NaiveDate>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.35,
            candidate_limit: 5,
            ambiguity_epsilon: 0.02,
            trailing_window: 12,
            high_confidence_observations: 12,
            medium_confidence_observations: 6,
            recency_tolerance: 1,
            fetch_timeout_secs: 30,
            max_horizon: 36,
            reference_date: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(v) = parse_var(&lookup, "NOWCAST_SIMILARITY_THRESHOLD")? {
            settings.similarity_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_CANDIDATE_LIMIT")? {
            settings.candidate_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_AMBIGUITY_EPSILON")? {
            settings.ambiguity_epsilon = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_TRAILING_WINDOW")? {
            settings.trailing_window = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_HIGH_CONFIDENCE_OBSERVATIONS")? {
            settings.high_confidence_observations = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_MEDIUM_CONFIDENCE_OBSERVATIONS")? {
            settings.medium_confidence_observations = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_RECENCY_TOLERANCE")? {
            settings.recency_tolerance = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_FETCH_TIMEOUT_SECS")? {
            settings.fetch_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_MAX_HORIZON")? {
            settings.max_horizon = v;
        }
        if let Some(v) = parse_var(&lookup, "NOWCAST_REFERENCE_DATE")? {
            settings.reference_date = Some(v);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(NowcastError::Config(format!(
                "NOWCAST_SIMILARITY_THRESHOLD must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.ambiguity_epsilon) {
            return Err(NowcastError::Config(format!(
                "NOWCAST_AMBIGUITY_EPSILON must be within [0, 1], got {}",
                self.ambiguity_epsilon
            )));
        }
        if self.candidate_limit == 0 {
            return Err(NowcastError::Config(
                "NOWCAST_CANDIDATE_LIMIT must be at least 1".to_string(),
            ));
        }
        if self.trailing_window < 2 {
            return Err(NowcastError::Config(
                "NOWCAST_TRAILING_WINDOW must be at least 2".to_string(),
            ));
        }
        if self.medium_confidence_observations > self.high_confidence_observations {
            return Err(NowcastError::Config(
                "NOWCAST_MEDIUM_CONFIDENCE_OBSERVATIONS must not exceed the HIGH count".to_string(),
            ));
        }
        if self.recency_tolerance < 0 {
            return Err(NowcastError::Config(
                "NOWCAST_RECENCY_TOLERANCE must not be negative".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(NowcastError::Config(
                "NOWCAST_FETCH_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn nowcast_config(&self) -> NowcastConfig {
        NowcastConfig {
            trailing_window: self.trailing_window,
            high_confidence_observations: self.high_confidence_observations,
            medium_confidence_observations: self.medium_confidence_observations,
            recency_tolerance: self.recency_tolerance,
            reference_date: self.reference_date,
            max_horizon: self.max_horizon,
        }
    }

    pub fn resolver(&self, index: Arc<dyn ClassificationLookup>) -> IndustryResolver {
        IndustryResolver::new(index)
            .with_threshold(self.similarity_threshold)
            .with_limit(self.candidate_limit)
    }

    pub fn assembler(&self) -> SummaryAssembler {
        SummaryAssembler::new(self.ambiguity_epsilon)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| NowcastError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}
