// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-function control flow graph and its serialized form
//!
//! Nodes are keyed by name and kept in creation order; edges are stored as
//! target names and never resolved while building. A name that no node
//! carries (a branch to a label outside the function) stays in the edge list
//! and is reported by [`CfgGraph::dangling_edges`].

use std::collections::HashSet;

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Name of the node every graph starts with.
pub const ENTRY: &str = "entry";

/// A basic block: rendered lines plus outgoing edges by target name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: String,
    lines: Vec<String>,
    edges: Vec<String>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rendered lines in source order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Outgoing edge target names in the order they were discovered.
    pub fn edges(&self) -> &[String] {
        &self.edges
    }

    pub(crate) fn push_line(&mut self, line: String) {
        self.lines.push(line);
    }

    pub(crate) fn push_edge(&mut self, target: impl Into<String>) {
        self.edges.push(target.into());
    }

    pub fn encode(&self) -> EncodedNode {
        EncodedNode {
            name: self.name.clone(),
            lines: self.lines.clone(),
            edges: self.edges.clone(),
        }
    }
}

/// Serialized node, consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedNode {
    pub name: String,
    pub lines: Vec<String>,
    pub edges: Vec<String>,
}

/// Serialized graph: node name to encoded node, in creation order.
pub type EncodedGraph = IndexMap<String, EncodedNode>;

/// Control flow graph of one function.
///
/// The entry node is always at position 0. Nodes are only ever added or
/// replaced in place, never removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgGraph {
    nodes: IndexMap<String, Node>,
}

impl Default for CfgGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CfgGraph {
    /// A graph holding only the empty entry node.
    pub(crate) fn new() -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert(ENTRY.to_string(), Node::new(ENTRY));
        Self { nodes }
    }

    /// Insert a node and return its position.
    ///
    /// A node with the same name is replaced, keeping its original position.
    pub(crate) fn add_node(&mut self, node: Node) -> usize {
        let (index, _) = self.nodes.insert_full(node.name.clone(), node);
        index
    }

    pub(crate) fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_index_mut(index).map(|(_, node)| node)
    }

    pub fn entry(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Nodes in creation order, entry first.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the entry node exists from construction.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of edges, dangling ones included.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.edges.len()).sum()
    }

    /// Project the graph to its serializable form.
    pub fn encode(&self) -> EncodedGraph {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.encode()))
            .collect()
    }

    /// Resolve edge names into a petgraph graph weighted by node name.
    ///
    /// Node indices follow creation order, so the entry is `NodeIndex(0)`.
    /// Edges to names with no node are skipped.
    pub fn to_digraph(&self) -> DiGraph<&str, ()> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.edge_count());
        for name in self.nodes.keys() {
            graph.add_node(name.as_str());
        }

        for (source, node) in self.nodes.values().enumerate() {
            for target in &node.edges {
                if let Some(target) = self.nodes.get_index_of(target.as_str()) {
                    graph.add_edge(NodeIndex::new(source), NodeIndex::new(target), ());
                }
            }
        }

        graph
    }

    /// Names of nodes not reachable from the entry node, in creation order.
    pub fn unreachable_nodes(&self) -> Vec<&str> {
        let graph = self.to_digraph();
        let mut reachable = HashSet::new();

        let mut bfs = petgraph::visit::Bfs::new(&graph, NodeIndex::new(0));
        while let Some(node) = bfs.next(&graph) {
            reachable.insert(node);
        }

        graph
            .node_indices()
            .filter(|node| !reachable.contains(node))
            .map(|node| graph[node])
            .collect()
    }

    /// `(source, target)` pairs whose target names no node in this graph.
    pub fn dangling_edges(&self) -> Vec<(&str, &str)> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.edges
                    .iter()
                    .filter(|target| !self.nodes.contains_key(target.as_str()))
                    .map(|target| (node.name.as_str(), target.as_str()))
            })
            .collect()
    }
}
