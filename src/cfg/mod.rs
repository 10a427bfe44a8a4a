//! The CFG data model and the lowering engine that produces it from a
//! [`crate::structured::CodeBlock`].

pub mod error;
mod lower;
mod print;

pub use error::LowerError;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};

/// The role an edge plays at its source node; distinguishes a `BasicBlock`'s
/// single successor from a `BranchBlock`'s two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    Coda,
    True,
    False,
}

/// A maximal run of mutations executed straight-line.
#[derive(Debug, Clone)]
pub struct BasicBlock<M> {
    pub mutations: Vec<M>,
}

/// A two-way conditional on an opaque condition.
#[derive(Debug, Clone)]
pub struct BranchBlock<C> {
    pub condition: C,
}

/// One node of the lowered graph.
///
/// `Return` is always a singleton: exactly one `NodeKind::Return` exists in
/// a given `Program`, and [`Program::is_return`] identifies it.
#[derive(Debug, Clone)]
pub enum NodeKind<M, C> {
    Basic(BasicBlock<M>),
    Branch(BranchBlock<C>),
    Return,
}

pub(crate) type Graph<M, C> = DiGraph<NodeKind<M, C>, Edge>;

/// The lowered control-flow graph: an entry node plus the set of nodes
/// reachable from it.
pub struct Program<M, C> {
    pub(crate) graph: Graph<M, C>,
    pub(crate) entry: NodeIndex,
    pub(crate) return_node: NodeIndex,
    pub(crate) reachable: Vec<NodeIndex>,
}

impl<M, C> Program<M, C> {
    /// The program's entry node.
    pub fn entry(&self) -> NodeIndex {
        self.entry
    }

    /// The singleton `RETURN` terminal.
    pub fn return_node(&self) -> NodeIndex {
        self.return_node
    }

    /// Whether `node` is the `RETURN` terminal.
    pub fn is_return(&self, node: NodeIndex) -> bool {
        node == self.return_node
    }

    /// The node's contents.
    pub fn node(&self, node: NodeIndex) -> &NodeKind<M, C> {
        &self.graph[node]
    }

    /// Every node reachable from the entry, RETURN included if reachable.
    /// Traversal order is unspecified (§5).
    pub fn reachable(&self) -> &[NodeIndex] {
        &self.reachable
    }

    /// A `BasicBlock`'s successor, if `node` is a `BasicBlock` with its coda wired.
    pub fn coda(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.edge_target(node, Edge::Coda)
    }

    /// A `BranchBlock`'s true successor, if wired.
    pub fn true_dest(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.edge_target(node, Edge::True)
    }

    /// A `BranchBlock`'s false successor, if wired.
    pub fn false_dest(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.edge_target(node, Edge::False)
    }

    fn edge_target(&self, node: NodeIndex, kind: Edge) -> Option<NodeIndex> {
        self.graph
            .edges(node)
            .find(|e| *e.weight() == kind)
            .map(|e| e.target())
    }

    pub(crate) fn compute_reachable(graph: &Graph<M, C>, entry: NodeIndex) -> Vec<NodeIndex> {
        let mut bfs = Bfs::new(graph, entry);
        let mut nodes = Vec::new();
        while let Some(n) = bfs.next(graph) {
            nodes.push(n);
        }
        nodes
    }
}
