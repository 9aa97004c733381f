//! Pairwise pattern scores and close-match lookups.
//!
//! Patterns are compared as token tuples (`"7, 2, -3"` → `["7", "2", "-3"]`)
//! so that a comparator sees whole intervals rather than characters.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::ModeError;
use crate::ngrams::NgramRecord;
use crate::table::NgramTable;

/// Token separator used by the n-gram export.
pub const DEFAULT_SEPARATOR: &str = ", ";

#[derive(Error, Debug, PartialEq)]
pub enum ScoreError {
    #[error("Pattern \"{0}\" is not in the score matrix")]
    UnknownPattern(String),
}

/// Distinct non-missing cell values, in row-major first-seen order.
pub fn distinct_patterns(table: &NgramTable) -> Vec<String> {
    let mut seen = HashSet::new();
    table
        .stacked()
        .filter(|p| seen.insert(*p))
        .cloned()
        .collect()
}

pub fn tokens(pattern: &str, separator: &str) -> Vec<String> {
    pattern.split(separator).map(String::from).collect()
}

/// One `(pattern, other) → score` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub pattern: String,
    pub other: String,
    pub score: f64,
}

/// Scores for every ordered pair of distinct patterns, self-pairs included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMatrix {
    patterns: Vec<String>,
    positions: HashMap<String, usize>,
    /// Row-major `k × k`
    scores: Vec<f64>,
}

impl ScoreMatrix {
    /// Score every ordered pair of distinct patterns in `table`.
    ///
    /// `method` is called exactly `k²` times and is never assumed symmetric.
    pub fn build<F>(table: &NgramTable, separator: &str, mut method: F) -> Self
    where
        F: FnMut(&[String], &[String]) -> f64,
    {
        let patterns = distinct_patterns(table);
        let tuples: Vec<Vec<String>> = patterns.iter().map(|p| tokens(p, separator)).collect();

        let k = patterns.len();
        log::info!("Scoring {} patterns ({} pairs)", k, k * k);

        let mut scores = Vec::with_capacity(k * k);
        for a in &tuples {
            for b in &tuples {
                scores.push(method(a, b));
            }
        }

        // Keys are the token tuples joined back, which round-trips the raw cell
        let patterns: Vec<String> = tuples.iter().map(|t| t.join(separator)).collect();
        let positions = patterns
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();

        Self {
            patterns,
            positions,
            scores,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Number of entries (`k²`).
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.positions.contains_key(pattern)
    }

    pub fn get(&self, pattern: &str, other: &str) -> Option<f64> {
        let i = *self.positions.get(pattern)?;
        let j = *self.positions.get(other)?;
        Some(self.scores[i * self.patterns.len() + j])
    }

    /// All entries, ordered by pattern then other.
    pub fn entries(&self) -> Vec<ScoreEntry> {
        let k = self.patterns.len();
        let mut out = Vec::with_capacity(k * k);
        for (i, pattern) in self.patterns.iter().enumerate() {
            for (j, other) in self.patterns.iter().enumerate() {
                out.push(ScoreEntry {
                    pattern: pattern.clone(),
                    other: other.clone(),
                    score: self.scores[i * k + j],
                });
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// How to read a score: as a distance (lower = closer) or a similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Distance,
    Similarity,
}

impl FromStr for CompareMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" | "distance" => Ok(Self::Distance),
            "s" | "similarity" => Ok(Self::Similarity),
            other => Err(ModeError::Compare(other.to_string())),
        }
    }
}

impl CompareMode {
    /// Whether a score survives the cutoff slider.
    pub fn passes(self, score: f64, cutoff: f64) -> bool {
        match self {
            Self::Distance => score <= cutoff,
            Self::Similarity => score > cutoff,
        }
    }

    /// Color scale direction: closer matches are drawn bolder.
    pub fn color_order(self) -> SortOrder {
        match self {
            Self::Distance => SortOrder::Descending,
            Self::Similarity => SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredNgram {
    #[serde(flatten)]
    pub ngram: NgramRecord,
    pub score: f64,
}

/// N-grams scored against one key pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseMatch {
    pub key_pattern: String,
    pub mode: CompareMode,
    pub rows: Vec<ScoredNgram>,
}

impl CloseMatch {
    pub fn min_score(&self) -> Option<f64> {
        self.rows.iter().map(|r| r.score).reduce(f64::min)
    }

    pub fn max_score(&self) -> Option<f64> {
        self.rows.iter().map(|r| r.score).reduce(f64::max)
    }

    /// Slider increment: a hundredth of the largest score.
    pub fn cutoff_step(&self) -> Option<f64> {
        self.max_score().map(|m| m / 100.0)
    }

    pub fn within_cutoff(&self, cutoff: f64) -> Vec<&ScoredNgram> {
        self.rows
            .iter()
            .filter(|r| self.mode.passes(r.score, cutoff))
            .collect()
    }
}

/// Attach `score(key_pattern, pattern)` to every n-gram.
///
/// An unknown key is a usage error. N-grams whose pattern is missing from
/// the matrix (e.g. scored from a different table) are dropped.
pub fn close_match(
    ngrams: &[NgramRecord],
    key_pattern: &str,
    matrix: &ScoreMatrix,
    mode: CompareMode,
) -> Result<CloseMatch, ScoreError> {
    if !matrix.contains(key_pattern) {
        return Err(ScoreError::UnknownPattern(key_pattern.to_string()));
    }

    let rows: Vec<ScoredNgram> = ngrams
        .iter()
        .filter_map(|n| {
            matrix.get(key_pattern, &n.pattern).map(|score| ScoredNgram {
                ngram: n.clone(),
                score,
            })
        })
        .collect();

    let dropped = ngrams.len() - rows.len();
    if dropped > 0 {
        log::debug!("{} n-grams have no score against \"{}\"", dropped, key_pattern);
    }

    Ok(CloseMatch {
        key_pattern: key_pattern.to_string(),
        mode,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> NgramTable {
        NgramTable::new(
            vec![0.0, 4.0],
            vec!["S".into(), "T".into()],
            vec![
                vec![Some("7, 2".into()), Some("-3, 2".into())],
                vec![Some("7, 2".into()), Some("7, 2, 2".into())],
            ],
        )
        .unwrap()
    }

    /// Deliberately asymmetric: length of `a` minus shared prefix length.
    fn lopsided(a: &[String], b: &[String]) -> f64 {
        let shared = a.iter().zip(b).take_while(|(x, y)| x == y).count();
        (a.len() - shared) as f64 + 0.5
    }

    #[test]
    fn test_distinct_patterns_first_seen_order() {
        assert_eq!(distinct_patterns(&table()), vec!["7, 2", "-3, 2", "7, 2, 2"]);
    }

    #[test]
    fn test_matrix_complete() {
        let matrix = ScoreMatrix::build(&table(), DEFAULT_SEPARATOR, lopsided);
        assert_eq!(matrix.len(), 9);
        assert_eq!(matrix.entries().len(), 9);
        for p in matrix.patterns() {
            for o in matrix.patterns() {
                assert!(matrix.get(p, o).is_some());
            }
        }
    }

    #[test]
    fn test_self_pair_and_asymmetry_preserved() {
        let matrix = ScoreMatrix::build(&table(), DEFAULT_SEPARATOR, lopsided);
        let p = tokens("7, 2", DEFAULT_SEPARATOR);
        assert_eq!(matrix.get("7, 2", "7, 2"), Some(lopsided(&p, &p)));
        assert_eq!(matrix.get("7, 2, 2", "7, 2"), Some(1.5));
        assert_eq!(matrix.get("7, 2", "7, 2, 2"), Some(0.5));
    }

    #[test]
    fn test_method_sees_tokens() {
        let mut calls = 0;
        let matrix = ScoreMatrix::build(&table(), DEFAULT_SEPARATOR, |a, b| {
            calls += 1;
            assert!(a.iter().chain(b).all(|t| !t.contains(',')));
            0.0
        });
        assert_eq!(calls, 9);
        assert_eq!(matrix.patterns()[1], "-3, 2");
    }

    #[test]
    fn test_empty_table() {
        let empty = NgramTable::new(vec![], vec!["S".into()], vec![]).unwrap();
        let matrix = ScoreMatrix::build(&empty, DEFAULT_SEPARATOR, lopsided);
        assert!(matrix.is_empty());
        assert_eq!(matrix.get("x", "x"), None);
    }

    #[test]
    fn test_compare_mode() {
        assert_eq!("d".parse::<CompareMode>().unwrap(), CompareMode::Distance);
        assert_eq!("s".parse::<CompareMode>().unwrap(), CompareMode::Similarity);
        assert_eq!("x".parse::<CompareMode>().unwrap_err(), ModeError::Compare("x".into()));

        assert!(CompareMode::Distance.passes(0.3, 0.3));
        assert!(!CompareMode::Similarity.passes(0.3, 0.3));
        assert_eq!(CompareMode::Distance.color_order(), SortOrder::Descending);
    }

    #[test]
    fn test_close_match() {
        let matrix = ScoreMatrix::build(&table(), DEFAULT_SEPARATOR, lopsided);
        let ngram = |start: f64, voice: &str, pattern: &str| NgramRecord {
            start,
            end: start + 1.0,
            voice: voice.into(),
            pattern: pattern.into(),
        };
        let ngrams = vec![
            ngram(0.0, "S", "7, 2"),
            ngram(0.0, "T", "-3, 2"),
            ngram(4.0, "T", "9, 9"),
        ];

        let m = close_match(&ngrams, "7, 2", &matrix, CompareMode::Distance).unwrap();
        assert_eq!(m.rows.len(), 2);
        assert_eq!(m.rows[0].score, 0.5);
        assert_eq!(m.rows[1].score, 2.5);
        assert_eq!(m.min_score(), Some(0.5));
        assert_eq!(m.max_score(), Some(2.5));
        assert_eq!(m.cutoff_step(), Some(0.025));
        assert_eq!(m.within_cutoff(1.0).len(), 1);

        let err = close_match(&ngrams, "1, 1", &matrix, CompareMode::Similarity).unwrap_err();
        assert_eq!(err, ScoreError::UnknownPattern("1, 1".into()));
    }
}
