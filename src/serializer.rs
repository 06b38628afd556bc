//! Serializer: Node Graph → Binary Store bytes
//!
//! Three walks over the graph, all driven by [`NodeGraph::walk`]:
//!
//! 1. **Compaction** - a node whose two children are both leaves becomes a
//!    leaf itself. The walk revisits every ancestor after finishing its
//!    subtree, so collapses cascade upward within a single pass.
//! 2. **Numbering** - internal nodes get dense ids in first-visit order,
//!    starting with the root at 0. Leaves are tagged [`Slot::Leaf`].
//! 3. **Layout & write** - the field width is derived from the final node
//!    count, the buffer is allocated, the footer written, then one record
//!    per internal node.
//!
//! The root is never collapsed: a store with zero records cannot express
//! "everything matches", so a fully covered address space keeps one root
//! record with two terminal fields.

use crate::error::{PrefixDbError, Result};
use crate::format::{Layout, FOOTER_SIZE};
use crate::node_graph::{NodeGraph, Slot, ROOT};
use tracing::debug;
use zerocopy::IntoBytes;

/// Serialize `graph` into a freshly allocated buffer
pub fn serialize(graph: &mut NodeGraph) -> Result<Vec<u8>> {
    let collapsed = compact(graph);
    let nodes_count = number(graph)?;
    let layout = Layout::for_nodes(nodes_count)?;

    let total = layout.total_size as usize;
    let mut data = Vec::new();
    data.try_reserve_exact(total)?;
    data.resize(total, 0);
    data[total - FOOTER_SIZE..].copy_from_slice(layout.footer().as_bytes());

    write_records(graph, &layout, &mut data);

    debug!(
        nodes_count,
        records_size = layout.records_size,
        bytes = total,
        collapsed,
        "serialized prefix tree"
    );
    Ok(data)
}

/// Collapse sibling leaf pairs bottom-up; returns how many nodes collapsed
fn compact(graph: &mut NodeGraph) -> usize {
    let mut collapsed = 0;
    graph.walk(|graph, id| {
        if id == ROOT {
            return;
        }
        let children = graph.node(id).children;
        if let [Some(low), Some(high)] = children {
            if graph.is_leaf(low) && graph.is_leaf(high) {
                graph.release_subtree(id);
                collapsed += 1;
            }
        }
    });
    collapsed
}

/// Tag every node and return the number of internal nodes
fn number(graph: &mut NodeGraph) -> Result<u32> {
    let generation = graph.next_generation();
    let mut count: u64 = 0;
    graph.walk(|graph, id| {
        if !graph.stamp(id, generation) {
            return;
        }
        let slot = if graph.is_leaf(id) {
            Slot::Leaf
        } else {
            count += 1;
            Slot::Internal((count - 1) as u32)
        };
        graph.node_mut(id).slot = slot;
    });
    u32::try_from(count)
        .map_err(|_| PrefixDbError::OutOfMemory(format!("{} internal nodes", count)))
}

fn write_records(graph: &mut NodeGraph, layout: &Layout, data: &mut [u8]) {
    let generation = graph.next_generation();
    graph.walk(|graph, id| {
        if !graph.stamp(id, generation) {
            return;
        }
        let record = match graph.node(id).slot {
            Slot::Internal(record) => record,
            Slot::Leaf => return,
        };
        for bit in 0..2 {
            let value = match graph.child(id, bit) {
                None => layout.dead_end(),
                Some(child) => match graph.node(child).slot {
                    Slot::Leaf => layout.terminal(),
                    Slot::Internal(child_record) => child_record as u64,
                },
            };
            write_field(data, layout.field_offset(record, bit), layout.records_size, value);
        }
    });
}

/// Big-endian, `width` bytes
fn write_field(data: &mut [u8], offset: usize, width: u8, mut value: u64) {
    for byte in data[offset..offset + width as usize].iter_mut().rev() {
        *byte = (value & 0xff) as u8;
        value >>= 8;
    }
}
