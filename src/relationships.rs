//! Normalize CRIM relationship records into model → derivative pairs.

use serde::Serialize;

use crate::ema::first_segment;
use crate::family::FamilyIndex;
use crate::table::{RecordTable, SchemaError};
use crate::weights::WeightTable;

pub const MODEL_EMA: &str = "model_observation.ema";
pub const MODEL_PIECE: &str = "model_observation.piece.piece_id";
pub const RELATIONSHIP_TYPE: &str = "relationship_type";
pub const DERIVATIVE_PIECE: &str = "derivative_observation.piece.piece_id";
pub const DERIVATIVE_EMA: &str = "derivative_observation.ema";

const REQUIRED_COLUMNS: [&str; 5] = [
    MODEL_EMA,
    MODEL_PIECE,
    RELATIONSHIP_TYPE,
    DERIVATIVE_PIECE,
    DERIVATIVE_EMA,
];

/// One relationship between two observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    /// `<piece_id>:<first ema segment>`
    pub model_id: String,
    pub derivative_id: String,
    pub model_piece: String,
    pub derivative_piece: String,
    pub relationship_type: String,
    pub weight: i64,
}

impl Relationship {
    pub fn new(
        model_piece: &str,
        model_ema: &str,
        derivative_piece: &str,
        derivative_ema: &str,
        relationship_type: &str,
        weights: &WeightTable,
    ) -> Self {
        Self {
            model_id: format!("{}:{}", model_piece, first_segment(model_ema)),
            derivative_id: format!("{}:{}", derivative_piece, first_segment(derivative_ema)),
            model_piece: model_piece.to_string(),
            derivative_piece: derivative_piece.to_string(),
            relationship_type: relationship_type.to_string(),
            weight: weights.weight(relationship_type),
        }
    }
}

/// Pull the five relationship columns out of a record table.
///
/// Column presence is checked before any row is read. A row missing a piece
/// id or an ema address cannot form an observation id and is skipped with a
/// warning. A missing relationship type becomes the empty label (weight 0).
pub fn normalize(
    table: &RecordTable,
    weights: &WeightTable,
) -> Result<Vec<Relationship>, SchemaError> {
    table.require(&REQUIRED_COLUMNS)?;

    let mut relationships = Vec::with_capacity(table.len());
    let mut skipped = Vec::new();

    for row in 0..table.len() {
        let fields = (
            table.text(row, MODEL_PIECE),
            table.text(row, MODEL_EMA),
            table.text(row, DERIVATIVE_PIECE),
            table.text(row, DERIVATIVE_EMA),
        );
        let (Some(model), Some(model_ema), Some(derivative), Some(derivative_ema)) = fields else {
            skipped.push(row);
            continue;
        };
        let relationship_type = table.text(row, RELATIONSHIP_TYPE).unwrap_or_default();

        relationships.push(Relationship::new(
            &model,
            &model_ema,
            &derivative,
            &derivative_ema,
            &relationship_type,
            weights,
        ));
    }

    if !skipped.is_empty() {
        log::warn!(
            "Skipped {} relationships without piece id or ema at rows: {:?}",
            skipped.len(),
            skipped
        );
    }

    Ok(relationships)
}

/// Row selections applied before building a network. Empty = no filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipFilter {
    pub relationship_types: Vec<String>,
    pub model_pieces: Vec<String>,
    pub derivative_pieces: Vec<String>,
    /// Seed piece ids; keeps every relationship in their families.
    pub families: Vec<String>,
}

/// Filtered relationships plus family seeds that had already been filtered out.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub relationships: Vec<Relationship>,
    pub missing_family_members: Vec<String>,
}

impl RelationshipFilter {
    /// Apply the equality filters, then the family filter over what remains.
    pub fn apply(&self, mut relationships: Vec<Relationship>) -> FilterOutcome {
        if !self.relationship_types.is_empty() {
            relationships.retain(|r| self.relationship_types.contains(&r.relationship_type));
        }
        if !self.model_pieces.is_empty() {
            relationships.retain(|r| self.model_pieces.contains(&r.model_piece));
        }
        if !self.derivative_pieces.is_empty() {
            relationships.retain(|r| self.derivative_pieces.contains(&r.derivative_piece));
        }

        let mut missing_family_members = Vec::new();
        if !self.families.is_empty() {
            let index = FamilyIndex::build(
                relationships
                    .iter()
                    .map(|r| (r.model_id.as_str(), r.derivative_id.as_str())),
            );
            let (relatives, missing) = index.relatives(self.families.as_slice());
            if !missing.is_empty() {
                log::warn!(
                    "{} {} no longer exist after the other filters",
                    missing.len(),
                    missing.join(", ")
                );
            }
            relationships.retain(|r| {
                relatives.contains(&r.model_id) || relatives.contains(&r.derivative_id)
            });
            missing_family_members = missing;
        }

        FilterOutcome {
            relationships,
            missing_family_members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> RecordTable {
        RecordTable::from_json(
            r#"[
            {"id": 1, "relationship_type": "Quotation",
             "model_observation": {"ema": "1-4/1,2/@all", "piece": {"piece_id": "P1"}},
             "derivative_observation": {"ema": "10-13/1,2/@all", "piece": {"piece_id": "P2"}}},
            {"id": 2, "relationship_type": "Omission",
             "model_observation": {"ema": "10-13", "piece": {"piece_id": "P2"}},
             "derivative_observation": {"ema": "5-8,9/1", "piece": {"piece_id": "P3"}}},
            {"id": 3, "relationship_type": "Imitative duo",
             "model_observation": {"ema": "20", "piece": {"piece_id": "P4"}},
             "derivative_observation": {"ema": "30-31", "piece": {"piece_id": "P5"}}}
        ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_composite_ids_and_weights() {
        let rels = normalize(&records(), &WeightTable::default()).unwrap();
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[0].model_id, "P1:1-4");
        assert_eq!(rels[0].derivative_id, "P2:10-13");
        assert_eq!(rels[0].weight, 1);
        assert_eq!(rels[1].derivative_id, "P3:5-8,9");
        assert_eq!(rels[1].weight, 5);
        assert_eq!(rels[2].weight, 0);
    }

    #[test]
    fn test_missing_column_fails_up_front() {
        let table = RecordTable::from_json(
            r#"[{"relationship_type": "Quotation", "model_observation": {"ema": "1"}}]"#,
        )
        .unwrap();
        let err = normalize(&table, &WeightTable::default()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn(ref c) if c == MODEL_PIECE));
    }

    #[test]
    fn test_rows_without_piece_id_skipped() {
        let table = RecordTable::from_json(
            r#"[
            {"relationship_type": "Quotation",
             "model_observation": {"ema": "1", "piece": {"piece_id": "P1"}},
             "derivative_observation": {"ema": "2", "piece": {"piece_id": "P2"}}},
            {"relationship_type": "Quotation",
             "model_observation": {"ema": "1", "piece": {"piece_id": null}},
             "derivative_observation": {"ema": "2", "piece": {"piece_id": "P2"}}}
        ]"#,
        )
        .unwrap();
        let rels = normalize(&table, &WeightTable::default()).unwrap();
        assert_eq!(rels.len(), 1);
    }

    #[test]
    fn test_equality_filters() {
        let rels = normalize(&records(), &WeightTable::default()).unwrap();

        let by_type = RelationshipFilter {
            relationship_types: vec!["Omission".into()],
            ..Default::default()
        };
        assert_eq!(by_type.apply(rels.clone()).relationships.len(), 1);

        let by_model = RelationshipFilter {
            model_pieces: vec!["P1".into(), "P4".into()],
            ..Default::default()
        };
        let out = by_model.apply(rels.clone()).relationships;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.model_piece != "P2"));

        let by_derivative = RelationshipFilter {
            derivative_pieces: vec!["P3".into()],
            ..Default::default()
        };
        assert_eq!(by_derivative.apply(rels.clone()).relationships[0].model_id, "P2:10-13");

        let none = RelationshipFilter::default().apply(rels.clone());
        assert_eq!(none.relationships, rels);
        assert!(none.missing_family_members.is_empty());
    }

    #[test]
    fn test_family_filter_keeps_connected_rows() {
        let rels = normalize(&records(), &WeightTable::default()).unwrap();
        let filter = RelationshipFilter {
            families: vec!["P3".into()],
            ..Default::default()
        };
        let out = filter.apply(rels);
        assert_eq!(out.relationships.len(), 2);
        assert!(out.relationships.iter().all(|r| r.model_piece != "P4"));
    }

    #[test]
    fn test_family_filter_runs_after_other_filters() {
        let rels = normalize(&records(), &WeightTable::default()).unwrap();
        let filter = RelationshipFilter {
            relationship_types: vec!["Quotation".into()],
            families: vec!["P3".into(), "P1".into()],
            ..Default::default()
        };
        let out = filter.apply(rels);
        assert_eq!(out.missing_family_members, vec!["P3".to_string()]);
        assert_eq!(out.relationships.len(), 1);
        assert_eq!(out.relationships[0].model_id, "P1:1-4");
    }
}
