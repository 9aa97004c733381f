//! Directed multigraphs handed to the network renderer.
//!
//! Nodes are keyed by string id. Re-adding an id keeps the node that was
//! added first, and parallel edges are kept as separate edges.

pub mod intervals;
pub mod relationships;

use std::collections::HashMap;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

/// Which endpoint an edge takes its color from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeColorInheritance {
    /// Source node
    From,
    /// Target node
    To,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

impl NetworkNode {
    pub fn plain(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            color: None,
            shape: None,
            group: None,
            level: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_shape(mut self, shape: impl Into<String>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkEdge {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl NetworkEdge {
    pub fn weighted(weight: i64, title: impl Into<String>) -> Self {
        Self {
            weight: Some(weight),
            title: Some(title.into()),
        }
    }
}

/// An edge as exported: endpoints by node id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportEdge {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub edge: NetworkEdge,
}

/// Serializable snapshot of a [`Network`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkExport {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<ExportEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherit_edge_colors: Option<EdgeColorInheritance>,
}

#[derive(Debug, Clone, Default)]
pub struct Network {
    graph: DiGraph<NetworkNode, NetworkEdge>,
    index: HashMap<String, NodeIndex>,
    inherit_edge_colors: Option<EdgeColorInheritance>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless its id already exists. Returns the index either way.
    pub fn add_node(&mut self, node: NetworkNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    /// Add a directed edge; unknown endpoints are added as plain nodes.
    pub fn add_edge(&mut self, source: &str, target: &str, edge: NetworkEdge) -> EdgeIndex {
        let a = self.add_node(NetworkNode::plain(source));
        let b = self.add_node(NetworkNode::plain(target));
        self.graph.add_edge(a, b, edge)
    }

    pub fn set_inherit_edge_colors(&mut self, inheritance: EdgeColorInheritance) {
        self.inherit_edge_colors = Some(inheritance);
    }

    pub fn inherit_edge_colors(&self) -> Option<EdgeColorInheritance> {
        self.inherit_edge_colors
    }

    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.graph.node_weights()
    }

    /// Edges in insertion order as `(source id, target id, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &NetworkEdge)> {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id.as_str(),
                self.graph[e.target()].id.as_str(),
                e.weight(),
            )
        })
    }

    /// Parallel edges from `source` to `target`.
    pub fn edges_between(&self, source: &str, target: &str) -> Vec<&NetworkEdge> {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&a), Some(&b)) => self
                .graph
                .edges_connecting(a, b)
                .map(|e| e.weight())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_export(&self) -> NetworkExport {
        NetworkExport {
            nodes: self.nodes().cloned().collect(),
            edges: self
                .edges()
                .map(|(from, to, edge)| ExportEdge {
                    from: from.to_string(),
                    to: to.to_string(),
                    edge: edge.clone(),
                })
                .collect(),
            inherit_edge_colors: self.inherit_edge_colors,
        }
    }
}
