//! Industry Resolver
//!
//! Two-phase resolution of a free-text industry phrase: exact lookup first,
//! then scored approximate candidates above a similarity threshold.

use crate::classification::{compare_ranked, ClassificationLookup, MatchKind};
use crate::error::{NowcastError, Result};
use crate::fuzzy_matcher::normalize_text;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryQuery {
    pub raw_text: String,
}

impl IndustryQuery {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
        }
    }

    pub fn normalized(&self) -> String {
        normalize_text(&self.raw_text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionCandidate {
    pub code: String,
    pub canonical_name: String,
    /// Similarity in [0, 1]; 1.0 for exact hits
    pub score: f64,
    pub match_kind: MatchKind,
}

/// Sort candidates best first with the deterministic tie-break.
pub fn rank_candidates(candidates: &mut [ResolutionCandidate]) {
    candidates.sort_by(|a, b| {
        compare_ranked(
            (a.score, &a.canonical_name, &a.code),
            (b.score, &b.canonical_name, &b.code),
        )
    });
}

pub struct IndustryResolver {
    index: Arc<dyn ClassificationLookup>,
    similarity_threshold: f64,
    limit: usize,
}

impl IndustryResolver {
    pub fn new(index: Arc<dyn ClassificationLookup>) -> Self {
        Self {
            index,
            similarity_threshold: 0.35,
            limit: 5,
        }
    }

    pub fn with_threshold(mut self, similarity_threshold: f64) -> Self {
        self.similarity_threshold = similarity_threshold;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn resolve_query(&self, query: &IndustryQuery) -> Result<Vec<ResolutionCandidate>> {
        self.resolve(&query.raw_text)
    }

    /// Resolve free text to ranked candidates, best first.
    ///
    /// Fails with `EmptyQuery` when nothing matchable remains after
    /// normalization, and with `NoMatchFound` when no candidate reaches the
    /// similarity threshold.
    pub fn resolve(&self, raw_text: &str) -> Result<Vec<ResolutionCandidate>> {
        let normalized = normalize_text(raw_text);
        if normalized.is_empty() {
            return Err(NowcastError::EmptyQuery(raw_text.to_string()));
        }

        if let Some(hit) = self.index.exact(&normalized) {
            let entry = self
                .index
                .entry(&hit.code)
                .ok_or_else(|| NowcastError::UnknownCode(hit.code.clone()))?;
            debug!(query = %normalized, code = %entry.code, kind = ?hit.kind, "Exact match");
            return Ok(vec![ResolutionCandidate {
                code: entry.code.clone(),
                canonical_name: entry.canonical_name.clone(),
                score: 1.0,
                match_kind: hit.kind,
            }]);
        }

        let mut candidates: Vec<ResolutionCandidate> = self
            .index
            .candidates(&normalized, self.limit)
            .into_iter()
            .filter(|scored| scored.score >= self.similarity_threshold)
            .filter_map(|scored| {
                self.index.entry(&scored.code).map(|entry| ResolutionCandidate {
                    code: entry.code.clone(),
                    canonical_name: entry.canonical_name.clone(),
                    score: scored.score.clamp(0.0, 1.0),
                    match_kind: MatchKind::Fuzzy,
                })
            })
            .collect();

        rank_candidates(&mut candidates);
        candidates.truncate(self.limit);

        if candidates.is_empty() {
            return Err(NowcastError::NoMatchFound {
                query: raw_text.to_string(),
                threshold: self.similarity_threshold,
            });
        }

        debug!(
            query = %normalized,
            top = %candidates[0].code,
            score = candidates[0].score,
            count = candidates.len(),
            "Fuzzy resolution"
        );
        Ok(candidates)
    }
}
