use std::collections::BTreeSet;
use strsim::normalized_levenshtein;

/// Normalize free text for matching:
/// - Trims and lowercases
/// - Replaces punctuation (ASCII and CJK) with a space
/// - Collapses whitespace runs to a single space
pub fn normalize_text(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Scripts written without word separators get split into bigrams as well.
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF66}'..='\u{FF9F}')
}

/// Tokenize an already normalized string.
///
/// Words are whitespace separated. A word containing CJK characters is
/// replaced by its character bigrams, since "ラーメン屋" and "ラーメン店"
/// share no whitespace token but share most of their bigrams.
pub fn tokenize(normalized: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for word in normalized.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() >= 2 && chars.iter().any(|c| is_cjk(*c)) {
            for pair in chars.windows(2) {
                tokens.insert(pair.iter().collect());
            }
        } else {
            tokens.insert(word.to_string());
        }
    }
    tokens
}

/// Keys under which a term is filed in the approximate-lookup index:
/// its tokens plus the character trigrams of each word, so that a
/// misspelled query still shares keys with the intended term.
pub fn index_keys(normalized: &str) -> BTreeSet<String> {
    let mut keys = tokenize(normalized);
    for word in normalized.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > 3 {
            for gram in chars.windows(3) {
                keys.insert(gram.iter().collect());
            }
        }
    }
    keys
}

/// A piece of text prepared for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct TermProfile {
    pub normalized: String,
    pub tokens: BTreeSet<String>,
}

impl TermProfile {
    pub fn new(text: &str) -> Self {
        let normalized = normalize_text(text);
        let tokens = tokenize(&normalized);
        Self { normalized, tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Scores how closely a query matches a dictionary term.
///
/// The score is the harmonic mean of a token-overlap ratio and a
/// character-level edit-distance similarity, both in [0, 1].
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    /// Minimum per-token similarity (0.0-1.0) for a query token to count as present in a term
    pub token_match_floor: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            token_match_floor: 0.75,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(token_match_floor: f64) -> Self {
        Self { token_match_floor }
    }

    /// Overlap coefficient over soft token matches.
    ///
    /// Each query token contributes its best similarity against the term's
    /// tokens when that similarity reaches `token_match_floor`. The sum is
    /// divided by the smaller token count, so a short query fully contained in
    /// a long term still scores 1.0.
    pub fn token_overlap(&self, query: &BTreeSet<String>, term: &BTreeSet<String>) -> f64 {
        if query.is_empty() || term.is_empty() {
            return 0.0;
        }

        let matched: f64 = query
            .iter()
            .map(|q| {
                term.iter()
                    .map(|t| normalized_levenshtein(q, t))
                    .fold(0.0, f64::max)
            })
            .filter(|best| *best >= self.token_match_floor)
            .sum();

        let denominator = query.len().min(term.len()) as f64;
        (matched / denominator).min(1.0)
    }

    /// Edit-distance similarity of the two normalized strings.
    pub fn character_similarity(&self, query: &str, term: &str) -> f64 {
        if query.is_empty() && term.is_empty() {
            return 0.0;
        }
        normalized_levenshtein(query, term)
    }

    /// Calculate similarity between a query and a term
    /// Returns a score between 0.0 and 1.0 (higher = more similar)
    pub fn similarity(&self, query: &TermProfile, term: &TermProfile) -> f64 {
        let overlap = self.token_overlap(&query.tokens, &term.tokens);
        let chars = self.character_similarity(&query.normalized, &term.normalized);
        harmonic_mean(overlap, chars)
    }

    /// Best similarity of the query against any of the given terms.
    pub fn best_similarity<'a, I>(&self, query: &TermProfile, terms: I) -> f64
    where
        I: IntoIterator<Item = &'a TermProfile>,
    {
        terms
            .into_iter()
            .map(|term| self.similarity(query, term))
            .fold(0.0, f64::max)
    }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        0.0
    } else {
        2.0 * a * b / (a + b)
    }
}
