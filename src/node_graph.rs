//! Mutable binary trie used while building a database.
//!
//! Nodes live in an arena and refer to each other by index: each node owns
//! its two child slots (bit 0 / bit 1) and keeps a plain back-reference to
//! its parent. The parent links let every traversal run without recursion or
//! an explicit stack: a walk descends through unexplored child slots and
//! climbs back through `parent`, revisiting each ancestor after finishing a
//! subtree. Per-slot `explored` generation markers make a walk idempotent, so
//! passes can be repeated over the same graph without clearing anything.
//!
//! Freed nodes go to a free list and are reused by later allocations.

use crate::error::Result;

/// Index of a node in the arena
pub(crate) type NodeId = u32;

/// The root node. It always exists and is never freed.
pub(crate) const ROOT: NodeId = 0;

/// Role of a node in the serialized layout, assigned by the numbering pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Terminal node: the prefix leading here is stored
    Leaf,
    /// Node with at least one child, written as record `id`
    Internal(u32),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) children: [Option<NodeId>; 2],
    pub(crate) parent: Option<NodeId>,
    pub(crate) slot: Slot,
    explored: [u64; 2],
    stamp: u64,
}

impl Node {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            children: [None, None],
            parent,
            slot: Slot::Leaf,
            explored: [0, 0],
            stamp: 0,
        }
    }

    /// A node without children denotes a stored prefix
    pub(crate) fn is_leaf(&self) -> bool {
        self.children[0].is_none() && self.children[1].is_none()
    }
}

/// Arena-backed binary trie
#[derive(Debug, Clone)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    live: usize,
    generation: u64,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeGraph {
    /// Create a graph holding only the root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(None)],
            free: Vec::new(),
            live: 1,
            generation: 0,
        }
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.live
    }

    /// True when no prefix is stored (the root has no children)
    pub fn is_empty(&self) -> bool {
        self.node(ROOT).is_leaf()
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    pub(crate) fn child(&self, id: NodeId, bit: usize) -> Option<NodeId> {
        self.node(id).children[bit]
    }

    pub(crate) fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).is_leaf()
    }

    /// Allocate an empty child of `parent` in slot `bit`
    pub(crate) fn allocate(&mut self, parent: NodeId, bit: usize) -> Result<NodeId> {
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = Node::new(Some(parent));
                id
            }
            None => {
                self.nodes.try_reserve(1)?;
                let id = self.nodes.len() as NodeId;
                self.nodes.push(Node::new(Some(parent)));
                id
            }
        };
        self.node_mut(parent).children[bit] = Some(id);
        self.live += 1;
        Ok(id)
    }

    /// Free every descendant of `id`, leaving `id` itself as a leaf.
    ///
    /// Walks down to the deepest remaining node, unlinks it from its parent
    /// and climbs back, so no recursion is needed. A no-op on a leaf.
    pub(crate) fn release_subtree(&mut self, id: NodeId) {
        let mut current = id;
        loop {
            if let Some(child) = self.child(current, 0) {
                current = child;
                continue;
            }
            if let Some(child) = self.child(current, 1) {
                current = child;
                continue;
            }
            if current == id {
                break;
            }
            let parent = match self.node(current).parent {
                Some(parent) => parent,
                None => break,
            };
            self.unlink(parent, current);
            self.recycle(current);
            current = parent;
        }
    }

    /// Free `id` and its whole subtree, unlinking it from its parent.
    /// The root is only emptied, never freed.
    pub(crate) fn detach(&mut self, id: NodeId) {
        self.release_subtree(id);
        if id == ROOT {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink(parent, id);
        }
        self.recycle(id);
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        let node = self.node_mut(parent);
        for slot in node.children.iter_mut() {
            if *slot == Some(child) {
                *slot = None;
            }
        }
    }

    fn recycle(&mut self, id: NodeId) {
        self.nodes[id as usize] = Node::new(None);
        self.free.push(id);
        self.live -= 1;
    }

    /// Start a new traversal generation
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Stamp `id` with `generation`; returns false if it already carried it
    pub(crate) fn stamp(&mut self, id: NodeId, generation: u64) -> bool {
        let node = self.node_mut(id);
        if node.stamp == generation {
            return false;
        }
        node.stamp = generation;
        true
    }

    /// Iterative depth-first walk driven by parent links.
    ///
    /// `visit` runs every time the walk arrives at a node: once on the way
    /// down and again after each of its explored subtrees. The visitor may
    /// free the children of the node it is given; the walk re-reads the
    /// child slots after every visit.
    pub(crate) fn walk<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut NodeGraph, NodeId),
    {
        let generation = self.next_generation();
        let mut current = ROOT;
        loop {
            visit(self, current);

            let mut descended = false;
            for bit in 0..2 {
                let node = self.node_mut(current);
                if let Some(child) = node.children[bit] {
                    if node.explored[bit] != generation {
                        node.explored[bit] = generation;
                        current = child;
                        descended = true;
                        break;
                    }
                }
            }
            if descended {
                continue;
            }

            if current == ROOT {
                break;
            }
            current = match self.node(current).parent {
                Some(parent) => parent,
                None => break,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(graph: &mut NodeGraph, bits: &[usize]) -> NodeId {
        let mut current = ROOT;
        for &bit in bits {
            current = match graph.child(current, bit) {
                Some(child) => child,
                None => graph.allocate(current, bit).unwrap(),
            };
        }
        current
    }

    #[test]
    fn test_new_graph_has_root_only() {
        let graph = NodeGraph::new();
        assert_eq!(graph.len(), 1);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_release_subtree_keeps_node() {
        let mut graph = NodeGraph::new();
        let mid = chain(&mut graph, &[1, 0]);
        chain(&mut graph, &[1, 0, 1, 1]);
        chain(&mut graph, &[1, 0, 0]);
        assert_eq!(graph.len(), 6);

        graph.release_subtree(mid);
        assert!(graph.is_leaf(mid));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_detach_unlinks_from_parent() {
        let mut graph = NodeGraph::new();
        let leaf = chain(&mut graph, &[0, 1]);
        let parent = graph.node(leaf).parent.unwrap();
        graph.detach(leaf);
        assert!(graph.child(parent, 1).is_none());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut graph = NodeGraph::new();
        let first = chain(&mut graph, &[0]);
        graph.detach(first);
        let again = chain(&mut graph, &[1]);
        assert_eq!(first, again);
        assert_eq!(graph.node(again).parent, Some(ROOT));
    }

    #[test]
    fn test_walk_revisits_ancestors() {
        let mut graph = NodeGraph::new();
        chain(&mut graph, &[0, 0]);
        chain(&mut graph, &[0, 1]);
        chain(&mut graph, &[1]);

        let mut arrivals = Vec::new();
        graph.walk(|_, id| arrivals.push(id));

        // root, n0, n00, n0, n01, n0, root, n1, root
        assert_eq!(arrivals.len(), 9);
        assert_eq!(arrivals.first(), Some(&ROOT));
        assert_eq!(arrivals.last(), Some(&ROOT));
    }

    #[test]
    fn test_walk_is_repeatable() {
        let mut graph = NodeGraph::new();
        chain(&mut graph, &[1, 1, 1]);
        let mut first = 0;
        graph.walk(|_, _| first += 1);
        let mut second = 0;
        graph.walk(|_, _| second += 1);
        assert_eq!(first, second);
    }
}
