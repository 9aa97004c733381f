//! Model → derivative networks of CRIM relationships.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{EdgeColorInheritance, Network, NetworkEdge, NetworkNode};
use crate::ModeError;
use crate::relationships::{self, Relationship, RelationshipFilter};
use crate::table::{RecordTable, SchemaError};
use crate::weights::WeightTable;

/// Which side of each relationship is colored by relationship type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Derivative nodes are grouped by type; edges take the target's color.
    #[default]
    Derivative,
    /// Model nodes are grouped by type; edges take the source's color.
    Model,
}

impl FromStr for ColorMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "derivative" => Ok(Self::Derivative),
            "model" => Ok(Self::Model),
            other => Err(ModeError::Color(other.to_string())),
        }
    }
}

impl ColorMode {
    pub fn inheritance(self) -> EdgeColorInheritance {
        match self {
            Self::Derivative => EdgeColorInheritance::To,
            Self::Model => EdgeColorInheritance::From,
        }
    }

    fn plain_end(self, r: &Relationship) -> &str {
        match self {
            Self::Derivative => &r.model_id,
            Self::Model => &r.derivative_id,
        }
    }

    fn colored_end(self, r: &Relationship) -> &str {
        match self {
            Self::Derivative => &r.derivative_id,
            Self::Model => &r.model_id,
        }
    }
}

/// Build the network: one `model → derivative` edge per relationship.
///
/// Plain-side nodes are added before colored-side nodes, so an observation
/// that appears on both sides stays plain, and a colored node keeps the type
/// of the first relationship that reached it.
pub fn relationship_network(relationships: &[Relationship], mode: ColorMode) -> Network {
    let mut net = Network::new();

    for r in relationships {
        net.add_node(NetworkNode::plain(mode.plain_end(r)));
    }
    for r in relationships {
        net.add_node(NetworkNode::plain(mode.colored_end(r)).with_group(&r.relationship_type));
    }
    for r in relationships {
        net.add_edge(
            &r.model_id,
            &r.derivative_id,
            NetworkEdge::weighted(r.weight, &r.relationship_type),
        );
    }

    net.set_inherit_edge_colors(mode.inheritance());
    net
}

/// A relationship network together with the family seeds that other
/// filters had already removed.
#[derive(Debug, Clone)]
pub struct RelationshipNetwork {
    pub network: Network,
    pub missing_family_members: Vec<String>,
}

/// Normalize, filter and build in one call.
pub fn build_from_records(
    table: &RecordTable,
    weights: &WeightTable,
    filter: &RelationshipFilter,
    mode: ColorMode,
) -> Result<RelationshipNetwork, SchemaError> {
    let normalized = relationships::normalize(table, weights)?;
    let outcome = filter.apply(normalized);
    log::info!(
        "Building {} network from {} relationships",
        match mode {
            ColorMode::Derivative => "derivative-colored",
            ColorMode::Model => "model-colored",
        },
        outcome.relationships.len()
    );

    Ok(RelationshipNetwork {
        network: relationship_network(&outcome.relationships, mode),
        missing_family_members: outcome.missing_family_members,
    })
}
