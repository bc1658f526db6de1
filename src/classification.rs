//! Classification Index
//!
//! Immutable lookup structure over an industry classification dictionary
//! (JSIC codes in the shipped seed). Built once, validated as a whole, then
//! shared read-only between any number of concurrent resolutions.

use crate::error::{NowcastError, Result};
use crate::fuzzy_matcher::{index_keys, normalize_text, FuzzyMatcher, TermProfile};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// One industry category in the dictionary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationEntry {
    /// Stable, globally unique identifier (e.g. "76" or "I")
    pub code: String,
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    /// Parent category in the hierarchy, if any
    #[serde(default)]
    pub parent_code: Option<String>,
}

impl ClassificationEntry {
    pub fn new(code: impl Into<String>, canonical_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            canonical_name: canonical_name.into(),
            aliases: BTreeSet::new(),
            parent_code: None,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn with_parent(mut self, parent_code: impl Into<String>) -> Self {
        self.parent_code = Some(parent_code.into());
        self
    }
}

/// How a candidate was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchKind {
    /// Query equals the canonical name
    Exact,
    /// Query equals one of the aliases
    Alias,
    /// Approximate match
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactMatch {
    pub code: String,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCode {
    pub code: String,
    pub score: f64,
}

/// Lookup interface consumed by the resolver.
///
/// Implementations must be safe to read from many threads at once and must
/// return candidates in a deterministic order.
pub trait ClassificationLookup: Send + Sync {
    /// Exact lookup against canonical names and aliases (after normalization)
    fn exact(&self, text: &str) -> Option<ExactMatch>;

    /// Approximate lookup, best first, at most `limit` results
    fn candidates(&self, text: &str, limit: usize) -> Vec<ScoredCode>;

    fn entry(&self, code: &str) -> Option<&ClassificationEntry>;
}

#[derive(Debug, Deserialize)]
struct SeedRecord {
    #[serde(alias = "jsic_code")]
    code: String,
    label: String,
    #[serde(default)]
    keywords: String,
    #[serde(default)]
    parent_code: String,
}

#[derive(Debug)]
pub struct ClassificationIndex {
    /// Sorted by code
    entries: Vec<ClassificationEntry>,
    by_code: HashMap<String, usize>,
    /// Normalized name/alias → (entry, kind)
    exact: HashMap<String, (usize, MatchKind)>,
    /// Per entry: canonical name first, then aliases
    terms: Vec<Vec<TermProfile>>,
    /// Token / trigram → entries filed under it
    postings: HashMap<String, BTreeSet<usize>>,
    matcher: FuzzyMatcher,
}

impl ClassificationIndex {
    /// Build the index, rejecting the whole dictionary on any inconsistency.
    pub fn from_entries(mut entries: Vec<ClassificationEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(NowcastError::InvalidDictionary("dictionary is empty".to_string()));
        }

        entries.sort_by(|a, b| a.code.cmp(&b.code));

        let mut by_code = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if entry.code.trim().is_empty() {
                return Err(NowcastError::InvalidDictionary(format!(
                    "entry {:?} has an empty code",
                    entry.canonical_name
                )));
            }
            if by_code.insert(entry.code.clone(), idx).is_some() {
                return Err(NowcastError::InvalidDictionary(format!(
                    "duplicate code {}",
                    entry.code
                )));
            }
        }

        for entry in &entries {
            if let Some(parent) = &entry.parent_code {
                if !by_code.contains_key(parent) {
                    return Err(NowcastError::InvalidDictionary(format!(
                        "code {} references missing parent {}",
                        entry.code, parent
                    )));
                }
            }
        }
        Self::check_acyclic(&entries, &by_code)?;

        let mut exact: HashMap<String, (usize, MatchKind)> = HashMap::new();
        let mut terms = Vec::with_capacity(entries.len());
        let mut postings: HashMap<String, BTreeSet<usize>> = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            let labelled = std::iter::once((&entry.canonical_name, MatchKind::Exact))
                .chain(entry.aliases.iter().map(|a| (a, MatchKind::Alias)));

            let mut profiles: Vec<TermProfile> = Vec::new();
            for (text, kind) in labelled {
                let profile = TermProfile::new(text);
                if profile.is_empty() {
                    return Err(NowcastError::InvalidDictionary(format!(
                        "code {} has a name or alias with no matchable text: {:?}",
                        entry.code, text
                    )));
                }

                match exact.get(&profile.normalized) {
                    Some((other, _)) if *other != idx => {
                        return Err(NowcastError::InvalidDictionary(format!(
                            "{:?} maps to both {} and {}",
                            profile.normalized, entries[*other].code, entry.code
                        )));
                    }
                    // Same entry: keep the first (canonical name wins over an equal alias)
                    Some(_) => {}
                    None => {
                        exact.insert(profile.normalized.clone(), (idx, kind));
                    }
                }

                for key in index_keys(&profile.normalized) {
                    postings.entry(key).or_default().insert(idx);
                }
                if !profiles.contains(&profile) {
                    profiles.push(profile);
                }
            }
            terms.push(profiles);
        }

        info!(
            entries = entries.len(),
            exact_keys = exact.len(),
            index_keys = postings.len(),
            "Classification index built"
        );

        Ok(Self {
            entries,
            by_code,
            exact,
            terms,
            postings,
            matcher: FuzzyMatcher::default(),
        })
    }

    /// Load a seed dictionary with columns `code,label,keywords,parent_code`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for record in csv_reader.deserialize::<SeedRecord>() {
            let record = record?;
            let aliases = record
                .keywords
                .split(|c| matches!(c, '|' | ',' | '、' | '，' | ';'))
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string);

            let mut entry =
                ClassificationEntry::new(record.code, record.label).with_aliases(aliases);
            if !record.parent_code.is_empty() {
                entry = entry.with_parent(record.parent_code);
            }
            entries.push(entry);
        }

        Self::from_entries(entries)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            NowcastError::InvalidDictionary(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loading classification dictionary");
        Self::from_csv_reader(file)
    }

    pub fn with_matcher(mut self, matcher: FuzzyMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ClassificationEntry] {
        &self.entries
    }

    /// Direct children of a code, in code order
    pub fn children(&self, code: &str) -> Vec<&ClassificationEntry> {
        self.entries
            .iter()
            .filter(|e| e.parent_code.as_deref() == Some(code))
            .collect()
    }

    /// Parent chain of a code, nearest first
    pub fn ancestors(&self, code: &str) -> Vec<&ClassificationEntry> {
        let mut chain = Vec::new();
        let mut current = self.get(code).and_then(|e| e.parent_code.as_deref());
        while let Some(parent) = current {
            match self.get(parent) {
                Some(entry) => {
                    chain.push(entry);
                    current = entry.parent_code.as_deref();
                }
                None => break,
            }
        }
        chain
    }

    fn get(&self, code: &str) -> Option<&ClassificationEntry> {
        self.by_code.get(code).map(|idx| &self.entries[*idx])
    }

    fn check_acyclic(
        entries: &[ClassificationEntry],
        by_code: &HashMap<String, usize>,
    ) -> Result<()> {
        for entry in entries {
            let mut steps = 0;
            let mut current = entry.parent_code.as_deref();
            while let Some(parent) = current {
                steps += 1;
                if parent == entry.code || steps > entries.len() {
                    return Err(NowcastError::InvalidDictionary(format!(
                        "parent cycle through code {}",
                        entry.code
                    )));
                }
                current = by_code
                    .get(parent)
                    .and_then(|idx| entries[*idx].parent_code.as_deref());
            }
        }
        Ok(())
    }
}

/// Deterministic candidate order: score descending, then shorter canonical
/// name, then code ascending.
pub fn compare_ranked(
    (score_a, name_a, code_a): (f64, &str, &str),
    (score_b, name_b, code_b): (f64, &str, &str),
) -> Ordering {
    score_b
        .total_cmp(&score_a)
        .then_with(|| name_a.chars().count().cmp(&name_b.chars().count()))
        .then_with(|| code_a.cmp(code_b))
}

impl ClassificationLookup for ClassificationIndex {
    fn exact(&self, text: &str) -> Option<ExactMatch> {
        let normalized = normalize_text(text);
        self.exact.get(&normalized).map(|(idx, kind)| ExactMatch {
            code: self.entries[*idx].code.clone(),
            kind: *kind,
        })
    }

    fn candidates(&self, text: &str, limit: usize) -> Vec<ScoredCode> {
        let query = TermProfile::new(text);
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let reachable: BTreeSet<usize> = index_keys(&query.normalized)
            .iter()
            .filter_map(|key| self.postings.get(key))
            .flatten()
            .copied()
            .collect();

        let mut scored: Vec<(usize, f64)> = reachable
            .into_iter()
            .map(|idx| (idx, self.matcher.best_similarity(&query, &self.terms[idx])))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|(a, score_a), (b, score_b)| {
            let (ea, eb) = (&self.entries[*a], &self.entries[*b]);
            compare_ranked(
                (*score_a, &ea.canonical_name, &ea.code),
                (*score_b, &eb.canonical_name, &eb.code),
            )
        });
        scored.truncate(limit);

        debug!(query = %query.normalized, found = scored.len(), "Approximate lookup");

        scored
            .into_iter()
            .map(|(idx, score)| ScoredCode {
                code: self.entries[idx].code.clone(),
                score,
            })
            .collect()
    }

    fn entry(&self, code: &str) -> Option<&ClassificationEntry> {
        self.get(code)
    }
}
