//! Melt wide per-voice n-gram tables into a long `(start, end, voice, pattern)` list.

use serde::Serialize;
use thiserror::Error;

use crate::table::{DurationTable, NgramTable};

#[derive(Error, Debug, PartialEq)]
pub enum ReshapeError {
    #[error(
        "Duration table is {found_rows}x{found_cols} but the n-gram table is {rows}x{cols}"
    )]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        found_rows: usize,
        found_cols: usize,
    },
}

/// One n-gram occurrence in one voice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NgramRecord {
    pub start: f64,
    /// `start + duration`, or `start + 1` when no durations were supplied.
    /// The latter is a display width only, not a musical duration.
    pub end: f64,
    pub voice: String,
    pub pattern: String,
}

/// Voice and pattern selections. An empty list selects everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NgramFilter {
    pub voices: Vec<String>,
    pub patterns: Vec<String>,
}

impl NgramFilter {
    pub fn voices<I, S>(mut self, voices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.voices = voices.into_iter().map(Into::into).collect();
        self
    }

    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn keeps(&self, record: &NgramRecord) -> bool {
        (self.voices.is_empty() || self.voices.contains(&record.voice))
            && (self.patterns.is_empty() || self.patterns.contains(&record.pattern))
    }

    pub fn apply(&self, mut records: Vec<NgramRecord>) -> Vec<NgramRecord> {
        records.retain(|r| self.keeps(r));
        records
    }
}

/// Melt an n-gram table (and optional durations) into long form, then filter.
///
/// Rows come out offset-major, then in column order. Cells with no pattern
/// are dropped, as are cells whose duration is missing when durations are
/// given. Filters run after `end` is computed so offsets stay aligned with
/// the duration table.
pub fn reshape(
    ngrams: &NgramTable,
    durations: Option<&DurationTable>,
    filter: &NgramFilter,
) -> Result<Vec<NgramRecord>, ReshapeError> {
    if let Some(d) = durations {
        if d.shape() != ngrams.shape() {
            return Err(ReshapeError::ShapeMismatch {
                rows: ngrams.row_count(),
                cols: ngrams.column_count(),
                found_rows: d.row_count(),
                found_cols: d.column_count(),
            });
        }
    }

    let mut records = Vec::with_capacity(ngrams.row_count() * ngrams.column_count());
    let mut missing_pattern = 0usize;
    let mut missing_duration = 0usize;

    for (row, &start) in ngrams.index().iter().enumerate() {
        for (col, voice) in ngrams.columns().iter().enumerate() {
            let Some(pattern) = ngrams.cell(row, col) else {
                missing_pattern += 1;
                continue;
            };

            let end = match durations {
                Some(d) => match d.cell(row, col) {
                    Some(duration) => start + duration,
                    None => {
                        missing_duration += 1;
                        continue;
                    }
                },
                None => start + 1.0,
            };

            records.push(NgramRecord {
                start,
                end,
                voice: voice.clone(),
                pattern: pattern.clone(),
            });
        }
    }

    log::debug!(
        "Melted {} n-grams ({} empty cells, {} without duration)",
        records.len(),
        missing_pattern,
        missing_duration
    );

    Ok(filter.apply(records))
}
