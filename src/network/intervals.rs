//! Prefix-tree networks over observation interval strings.
//!
//! Each interval string is cut into tokens; every proper prefix becomes a node
//! linked to the prefix one token shorter. Strings are grouped by their first
//! token, and every group also feeds a combined network rooted at `all`.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use super::{Network, NetworkEdge, NetworkNode};
use crate::ModeError;
use crate::table::{RecordTable, SchemaError};

/// Key and root node id of the combined network.
pub const ALL: &str = "all";

static SIGN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[+-]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalKind {
    /// Signed melodic intervals like `-2+3-2`; cut after each sign.
    Melodic,
    /// Durations like `4/2/2`; cut on `/`.
    Time,
}

impl FromStr for IntervalKind {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "melodic" => Ok(Self::Melodic),
            "time" => Ok(Self::Time),
            other => Err(ModeError::Interval(other.to_string())),
        }
    }
}

impl IntervalKind {
    pub fn tokens(self, interval: &str) -> Vec<String> {
        match self {
            Self::Melodic => {
                // A sign that ends the string stays attached to the last token
                let mut marked = String::with_capacity(interval.len() + 8);
                let mut last = 0;
                for m in SIGN_RE.find_iter(interval) {
                    if m.end() < interval.len() {
                        marked.push_str(&interval[last..m.end()]);
                        marked.push(',');
                        last = m.end();
                    }
                }
                marked.push_str(&interval[last..]);
                marked.split(',').map(String::from).collect()
            }
            Self::Time => interval.split('/').map(String::from).collect(),
        }
    }

    pub fn separator(self) -> &'static str {
        match self {
            Self::Melodic => "",
            Self::Time => "/",
        }
    }
}

/// Build the `all` network plus one network per first token.
///
/// For a string of `n` tokens, prefixes of length `1..n` become nodes at
/// level = prefix length; the full string itself is not a node.
pub fn interval_networks<'a, I>(intervals: I, kind: IntervalKind) -> BTreeMap<String, Network>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut networks: BTreeMap<String, Network> = BTreeMap::new();
    let mut all = Network::new();
    all.add_node(
        NetworkNode::plain(ALL)
            .with_color("red")
            .with_shape("circle")
            .with_level(0),
    );

    for interval in intervals {
        let tokens = kind.tokens(interval);
        let group = tokens[0].clone();
        let family = networks.entry(group.clone()).or_default();

        let mut prev = ALL.to_string();
        for i in 1..tokens.len() {
            let node_id = tokens[..i].join(kind.separator());
            let level = i as u32;

            family.add_node(NetworkNode::plain(&node_id).with_group(&group).with_level(level));
            if prev != ALL {
                family.add_edge(&prev, &node_id, NetworkEdge::default());
            }

            all.add_node(NetworkNode::plain(&node_id).with_group(&group).with_level(level));
            all.add_edge(&prev, &node_id, NetworkEdge::default());
            prev = node_id;
        }
    }

    networks.insert(ALL.to_string(), all);
    networks
}

/// Read intervals from `column`, optionally keeping only listed patterns.
/// Rows with no value in the column are skipped.
pub fn networks_from_records(
    table: &RecordTable,
    column: &str,
    kind: IntervalKind,
    patterns: &[String],
) -> Result<BTreeMap<String, Network>, SchemaError> {
    table.require(&[column])?;

    let intervals: Vec<String> = (0..table.len())
        .filter_map(|row| table.text(row, column))
        .filter(|i| patterns.is_empty() || patterns.contains(i))
        .collect();

    log::info!("Building interval networks from {} observations", intervals.len());
    Ok(interval_networks(intervals.iter().map(String::as_str), kind))
}
