//! Trie Builder
//!
//! Inserts and removes IPv4 prefixes in a [`NodeGraph`] while keeping two
//! covering rules:
//!
//! - a prefix whose path runs through an existing terminal node is already
//!   covered, so the insertion stops there and adds nothing;
//! - a newly inserted prefix frees every node below its terminal point, since
//!   the shorter prefix subsumes the longer ones stored there.
//!
//! Also rebuilds a graph from the records of a loaded [`BinaryStore`] so a
//! database opened from disk can keep growing.

use crate::error::{PrefixDbError, Result};
use crate::node_graph::{NodeGraph, NodeId, ROOT};
use crate::store::{BinaryStore, Lookup, Pointer};
use std::net::Ipv4Addr;

/// Longest IPv4 prefix
pub const MAX_PREFIX_LEN: u8 = 32;

/// Reject lengths outside 1..=32
pub fn check_length(length: u8) -> Result<()> {
    if length == 0 || length > MAX_PREFIX_LEN {
        return Err(PrefixDbError::InvalidParameter(format!(
            "prefix length {} outside 1..={}",
            length, MAX_PREFIX_LEN
        )));
    }
    Ok(())
}

#[inline]
fn bit_at(address: u32, depth: u8) -> usize {
    ((address >> (31 - depth)) & 1) as usize
}

/// Parse a dotted-quad address
pub fn parse_address(text: &str) -> Result<Ipv4Addr> {
    text.trim().parse::<Ipv4Addr>().map_err(|_| {
        PrefixDbError::InvalidParameter(format!("invalid IPv4 address: {:?}", text))
    })
}

/// Parse `a.b.c.d` or `a.b.c.d/len`; the length defaults to 32.
///
/// The length is only parsed here, range checks happen on insertion.
pub fn parse_prefix(text: &str) -> Result<(Ipv4Addr, u8)> {
    let text = text.trim();
    let (address, length) = match text.split_once('/') {
        Some((address, length)) => {
            let length = length.trim().parse::<u8>().map_err(|_| {
                PrefixDbError::InvalidParameter(format!("invalid prefix length in {:?}", text))
            })?;
            (address, length)
        }
        None => (text, MAX_PREFIX_LEN),
    };
    Ok((parse_address(address)?, length))
}

impl NodeGraph {
    /// Store the prefix `address/length`
    pub fn insert(&mut self, address: u32, length: u8) -> Result<()> {
        check_length(length)?;

        let mut current = ROOT;
        let mut first_allocated: Option<NodeId> = None;
        for depth in 0..length {
            let bit = bit_at(address, depth);
            let (next, allocated) = match self.child(current, bit) {
                Some(child) => (child, false),
                None => match self.allocate(current, bit) {
                    Ok(child) => (child, true),
                    Err(err) => {
                        // a half-built chain would end in a leaf and match
                        if let Some(node) = first_allocated {
                            self.detach(node);
                        }
                        return Err(err);
                    }
                },
            };
            if allocated && first_allocated.is_none() {
                first_allocated = Some(next);
            }
            current = next;
            if !allocated && self.is_leaf(current) {
                break;
            }
        }

        self.release_subtree(current);
        Ok(())
    }

    /// Answer a point query from the graph itself, without serializing
    pub fn lookup(&self, address: u32) -> Lookup {
        let mut current = ROOT;
        for depth in 0..MAX_PREFIX_LEN {
            match self.child(current, bit_at(address, depth)) {
                Some(child) if self.is_leaf(child) => return Lookup::Match,
                Some(child) => current = child,
                None => return Lookup::NoMatch,
            }
        }
        Lookup::NoMatch
    }

    /// True when some stored prefix shares an address with `address/length`
    pub fn overlaps(&self, address: u32, length: u8) -> bool {
        let mut current = ROOT;
        for depth in 0..length.min(MAX_PREFIX_LEN) {
            if current != ROOT && self.is_leaf(current) {
                return true;
            }
            match self.child(current, bit_at(address, depth)) {
                Some(child) => current = child,
                None => return false,
            }
        }
        true
    }

    /// Withdraw every address in `address/length`.
    ///
    /// Returns false if nothing in the range was stored. A stored shorter
    /// prefix covering the range is split so the rest of it keeps matching.
    pub fn remove(&mut self, address: u32, length: u8) -> Result<bool> {
        check_length(length)?;

        let mut current = ROOT;
        for depth in 0..length {
            if current != ROOT && self.is_leaf(current) {
                self.split(current)?;
            }
            match self.child(current, bit_at(address, depth)) {
                Some(child) => current = child,
                None => return Ok(false),
            }
        }

        // Childless ancestors would read as stored prefixes, drop them too
        let mut target = current;
        loop {
            let parent = self.node(target).parent;
            self.detach(target);
            match parent {
                Some(parent) if parent != ROOT && self.is_leaf(parent) => target = parent,
                _ => break,
            }
        }
        Ok(true)
    }

    fn split(&mut self, leaf: NodeId) -> Result<()> {
        let low = self.allocate(leaf, 0)?;
        if let Err(err) = self.allocate(leaf, 1) {
            self.detach(low);
            return Err(err);
        }
        Ok(())
    }

    /// Rebuild a graph from serialized records.
    ///
    /// Fails with `Corrupt` when a record is reachable twice, when a path
    /// runs past 32 bits or when a record has no child at all.
    pub fn thaw(store: &BinaryStore<'_>) -> Result<NodeGraph> {
        let mut graph = NodeGraph::new();
        let nodes_count = store.layout().nodes_count;
        if nodes_count == 0 {
            return Ok(graph);
        }

        let mut seen = Vec::new();
        seen.try_reserve_exact(nodes_count as usize)?;
        seen.resize(nodes_count as usize, false);
        let mut pending: Vec<(NodeId, u32, u8)> = vec![(ROOT, 0, 0)];
        while let Some((node, record, depth)) = pending.pop() {
            if std::mem::replace(&mut seen[record as usize], true) {
                return Err(PrefixDbError::Corrupt(format!(
                    "record {} is reachable more than once",
                    record
                )));
            }
            let mut children = 0;
            for bit in 0..2 {
                match store.pointer(record, bit) {
                    Pointer::DeadEnd => {}
                    Pointer::Terminal => {
                        graph.allocate(node, bit)?;
                        children += 1;
                    }
                    Pointer::Record(next) => {
                        if depth + 1 >= MAX_PREFIX_LEN {
                            return Err(PrefixDbError::Corrupt(format!(
                                "record {} descends past bit 32",
                                record
                            )));
                        }
                        let child = graph.allocate(node, bit)?;
                        pending.push((child, next, depth + 1));
                        children += 1;
                    }
                }
            }
            if children == 0 {
                return Err(PrefixDbError::Corrupt(format!(
                    "record {} has no children",
                    record
                )));
            }
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(text: &str) -> u32 {
        u32::from(parse_address(text).unwrap())
    }

    fn covers(graph: &NodeGraph, address: u32) -> bool {
        graph.lookup(address).is_match()
    }

    #[test]
    fn test_parse_prefix_forms() {
        assert_eq!(
            parse_prefix("10.0.0.0/8").unwrap(),
            (Ipv4Addr::new(10, 0, 0, 0), 8)
        );
        assert_eq!(
            parse_prefix("1.2.3.4").unwrap(),
            (Ipv4Addr::new(1, 2, 3, 4), 32)
        );
        assert_eq!(parse_prefix(" 1.2.3.0/24 ").unwrap().1, 24);
    }

    #[test]
    fn test_parse_prefix_rejects_garbage() {
        for text in ["", "10.0.0", "10.0.0.0/", "10.0.0.0/x", "300.1.1.1/8", "10.0.0.0/999"] {
            assert!(
                matches!(parse_prefix(text), Err(PrefixDbError::InvalidParameter(_))),
                "{:?} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_length_bounds() {
        let mut graph = NodeGraph::new();
        assert!(graph.insert(0, 0).is_err());
        assert!(graph.insert(0, 33).is_err());
        assert!(graph.insert(addr("128.0.0.0"), 1).is_ok());
        assert!(graph.insert(addr("1.2.3.4"), 32).is_ok());
    }

    #[test]
    fn test_insert_builds_one_node_per_bit() {
        let mut graph = NodeGraph::new();
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        assert_eq!(graph.len(), 9);
        assert!(covers(&graph, addr("10.200.1.1")));
        assert!(!covers(&graph, addr("11.0.0.0")));
    }

    #[test]
    fn test_longer_prefix_under_shorter_is_noop() {
        let mut graph = NodeGraph::new();
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        graph.insert(addr("10.1.2.3"), 32).unwrap();
        assert_eq!(graph.len(), 9);
        assert!(covers(&graph, addr("10.1.2.3")));
    }

    #[test]
    fn test_shorter_prefix_prunes_longer() {
        let mut graph = NodeGraph::new();
        graph.insert(addr("10.1.2.3"), 32).unwrap();
        assert_eq!(graph.len(), 33);
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        assert_eq!(graph.len(), 9);
        assert!(covers(&graph, addr("10.99.0.1")));
    }

    #[test]
    fn test_remove_exact_prefix() {
        let mut graph = NodeGraph::new();
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        graph.insert(addr("192.168.0.0"), 16).unwrap();
        assert!(graph.remove(addr("10.0.0.0"), 8).unwrap());
        assert!(!covers(&graph, addr("10.0.0.1")));
        assert!(covers(&graph, addr("192.168.1.1")));
        assert_eq!(graph.len(), 17);
    }

    #[test]
    fn test_remove_splits_covering_prefix() {
        let mut graph = NodeGraph::new();
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        assert!(graph.remove(addr("10.1.0.0"), 16).unwrap());
        assert!(!covers(&graph, addr("10.1.2.3")));
        assert!(covers(&graph, addr("10.0.2.3")));
        assert!(covers(&graph, addr("10.2.0.0")));
        assert!(covers(&graph, addr("10.255.255.255")));
    }

    #[test]
    fn test_remove_missing_range() {
        let mut graph = NodeGraph::new();
        assert!(!graph.remove(addr("10.0.0.0"), 8).unwrap());
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        assert!(!graph.remove(addr("11.0.0.0"), 8).unwrap());
        assert_eq!(graph.len(), 9);
    }

    #[test]
    fn test_remove_everything_empties_graph() {
        let mut graph = NodeGraph::new();
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        graph.remove(addr("10.0.0.0"), 8).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_thaw_preserves_prefixes() {
        let mut graph = NodeGraph::new();
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        graph.insert(addr("192.168.5.0"), 24).unwrap();
        let store = crate::loader::load_vec(crate::serializer::serialize(&mut graph).unwrap())
            .unwrap();

        let thawed = NodeGraph::thaw(&store).unwrap();
        assert_eq!(thawed.len(), graph.len());
        for text in ["10.1.1.1", "192.168.5.200", "192.168.6.1", "11.0.0.0"] {
            assert_eq!(thawed.lookup(addr(text)), graph.lookup(addr(text)), "{}", text);
        }
    }

    #[test]
    fn test_overlaps() {
        let mut graph = NodeGraph::new();
        assert!(!graph.overlaps(addr("10.0.0.0"), 8));
        graph.insert(addr("10.0.0.0"), 8).unwrap();
        graph.insert(addr("192.168.5.0"), 24).unwrap();
        assert!(graph.overlaps(addr("10.1.0.0"), 16));
        assert!(graph.overlaps(addr("192.168.0.0"), 16));
        assert!(graph.overlaps(addr("0.0.0.0"), 1));
        assert!(!graph.overlaps(addr("192.168.6.0"), 24));
        assert!(!graph.overlaps(addr("11.0.0.0"), 8));
    }

    #[test]
    fn test_thaw_empty_and_full_stores() {
        let empty = crate::loader::load_vec(serialize_graph(&mut NodeGraph::new())).unwrap();
        assert!(NodeGraph::thaw(&empty).unwrap().is_empty());

        let mut full = NodeGraph::new();
        full.insert(addr("0.0.0.0"), 1).unwrap();
        full.insert(addr("128.0.0.0"), 1).unwrap();
        let store = crate::loader::load_vec(serialize_graph(&mut full)).unwrap();
        let thawed = NodeGraph::thaw(&store).unwrap();
        assert_eq!(thawed.lookup(u32::MAX), Lookup::Match);
        assert_eq!(thawed.lookup(0), Lookup::Match);
    }

    fn serialize_graph(graph: &mut NodeGraph) -> Vec<u8> {
        crate::serializer::serialize(graph).unwrap()
    }

    #[test]
    fn test_thaw_rejects_shared_record() {
        // both fields of the root point at record 1
        let mut data = vec![1, 1, 2, 2 + 16];
        let layout = crate::format::Layout::for_nodes(2).unwrap();
        data.extend_from_slice(zerocopy::IntoBytes::as_bytes(&layout.footer()));
        let store = crate::loader::load_vec(data).unwrap();
        assert!(matches!(NodeGraph::thaw(&store), Err(PrefixDbError::Corrupt(_))));
    }
}
