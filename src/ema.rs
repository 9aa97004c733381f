//! EMA address parsing.
//!
//! An address like `3-5,7/1-3/@all` names measure ranges before the first `/`;
//! everything after it (beats, voices) is ignored here. Each comma-separated
//! range explodes into its own `(start, end)` row.

use std::fmt::Debug;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static MEASURE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// An inclusive measure range. Either both ends are set with `start <= end`,
/// or both are `None` (the address was invalid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeasureRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl MeasureRange {
    pub const INVALID: Self = Self {
        start: None,
        end: None,
    };

    pub fn new(start: u64, end: u64) -> Self {
        if start <= end {
            Self {
                start: Some(start),
                end: Some(end),
            }
        } else {
            Self::INVALID
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// The measure part of an address: everything before the first `/`.
pub fn first_segment(address: &str) -> &str {
    address.split_once('/').map_or(address, |(head, _)| head)
}

/// A measure number, only if the text is purely ASCII digits.
/// Digit strings beyond `u64::MAX` are treated as invalid.
fn parse_measure(text: &str) -> Option<u64> {
    if MEASURE_RE.is_match(text) {
        text.parse().ok()
    } else {
        None
    }
}

/// Parse one `start-end` or single-measure range.
///
/// A lone number fills both ends. Anything non-numeric, a reversed range, or
/// more than one `-` yields [`MeasureRange::INVALID`].
pub fn parse_range(range: &str) -> MeasureRange {
    let mut fields = range.split('-');
    let start_raw = fields.next().unwrap_or("");
    let end_raw = fields.next().unwrap_or(start_raw);
    if fields.next().is_some() {
        return MeasureRange::INVALID;
    }

    match (parse_measure(start_raw), parse_measure(end_raw)) {
        (Some(start), Some(end)) => MeasureRange::new(start, end),
        _ => MeasureRange::INVALID,
    }
}

/// Parse an address into one range per comma-separated group.
/// Never fails: an empty or malformed address gives a single invalid range.
pub fn parse_address(address: &str) -> Vec<MeasureRange> {
    first_segment(address).split(',').map(parse_range).collect()
}

/// One exploded row: the caller's row key plus one of its ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplodedRange<K> {
    pub key: K,
    pub range: MeasureRange,
}

/// Result of exploding a column of addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion<K> {
    pub rows: Vec<ExplodedRange<K>>,
    /// Keys of rows that produced at least one invalid range, in input order.
    pub invalid: Vec<K>,
}

impl<K: Debug> Explosion<K> {
    /// The human-readable notice for invalid addresses, if any.
    pub fn report(&self) -> Option<String> {
        if self.invalid.is_empty() {
            None
        } else {
            Some(format!(
                "There exist invalid EMA addresses at rows: {:?}",
                self.invalid
            ))
        }
    }
}

/// Explode `(key, address)` pairs into one row per range.
///
/// A missing address counts as invalid. Invalid rows stay in the output with
/// null measures and are listed in [`Explosion::invalid`]; the listing is
/// also logged as a warning.
pub fn explode<'a, K, I>(addresses: I) -> Explosion<K>
where
    K: Clone + PartialEq + Debug,
    I: IntoIterator<Item = (K, Option<&'a str>)>,
{
    let mut rows = Vec::new();
    let mut invalid: Vec<K> = Vec::new();

    for (key, address) in addresses {
        let ranges = match address {
            Some(a) => parse_address(a),
            None => vec![MeasureRange::INVALID],
        };
        for range in ranges {
            if !range.is_valid() && invalid.last() != Some(&key) {
                invalid.push(key.clone());
            }
            rows.push(ExplodedRange {
                key: key.clone(),
                range,
            });
        }
    }

    let explosion = Explosion { rows, invalid };
    if let Some(report) = explosion.report() {
        log::warn!("{}", report);
    }
    explosion
}
