//! Measure spans of observations or relationships for the comparison heatmap.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ema;
use crate::table::{RecordTable, SchemaError};

pub const DEFAULT_MAIN_CATEGORY: &str = "musical_type";
pub const DEFAULT_OTHER_CATEGORY: &str = "observer.name";

/// One exploded measure range of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationSpan {
    /// Position of the source record in the input table.
    pub record: usize,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub id: String,
    #[serde(flatten)]
    pub categories: BTreeMap<String, Option<String>>,
    pub website_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanTable {
    pub spans: Vec<ObservationSpan>,
    /// Records whose address held at least one invalid range.
    pub invalid_records: Vec<usize>,
    /// Category field names as they appear on spans.
    pub main_category: String,
    pub other_category: String,
}

/// Dotted column names break the renderer's field lookup; use underscores.
pub fn category_field(column: &str) -> String {
    column.replace('.', "_")
}

/// API urls carry a `data/` path segment that the public site does not.
pub fn website_url(url: &str) -> String {
    url.replace("data/", "")
}

/// Explode each record's address in `ema_column` into measure spans.
pub fn observation_spans(
    table: &RecordTable,
    ema_column: &str,
    main_category: &str,
    other_category: &str,
) -> Result<SpanTable, SchemaError> {
    table.require(&[ema_column, "url", "id", main_category, other_category])?;

    let addresses: Vec<(usize, Option<String>)> = (0..table.len())
        .map(|row| (row, table.text(row, ema_column)))
        .collect();
    let exploded = ema::explode(addresses.iter().map(|(row, a)| (*row, a.as_deref())));

    let main_field = category_field(main_category);
    let other_field = category_field(other_category);

    let spans = exploded
        .rows
        .iter()
        .map(|row| {
            let record = row.key;
            let mut categories = BTreeMap::new();
            categories.insert(main_field.clone(), table.text(record, main_category));
            categories.insert(other_field.clone(), table.text(record, other_category));
            ObservationSpan {
                record,
                start: row.range.start,
                end: row.range.end,
                id: table.text(record, "id").unwrap_or_default(),
                categories,
                website_url: table
                    .text(record, "url")
                    .map(|u| website_url(&u))
                    .unwrap_or_default(),
            }
        })
        .collect();

    Ok(SpanTable {
        spans,
        invalid_records: exploded.invalid,
        main_category: main_field,
        other_category: other_field,
    })
}
