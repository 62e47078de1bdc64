//! Node records and the edge maintenance that keeps them symmetric.
//!
//! Every edge is stored as two adjacency entries, one per endpoint:
//!
//! ```text
//! create_edge(a, b)
//!   node(a).exit_side(a)   ∋ b
//!   node(b).entry_side(b)  ∋ flip(a)     (skipped when a == flip(b))
//! ```
//!
//! The exit side of a handle is the side you leave through when reading
//! it (right for forward, left for reverse); the entry side is the other.
//! Every function here preserves that pairing. None of them touch paths.

use std::mem;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::model::{reverse_complement, Handle, NodeId};

/// Adjacency list. Most nodes in a variation graph have one or two edges
/// per side.
pub type EdgeList = SmallVec<[Handle; 2]>;

/// `min_id` of a graph without nodes, as written by the persisted layout.
pub const EMPTY_MIN_ID: NodeId = NodeId(i64::MAX as u64);

// ============================================================================
// Side
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Side of `node(h)` left behind when reading `h` to its end.
    pub fn exit(h: Handle) -> Side {
        if h.is_reverse() { Side::Left } else { Side::Right }
    }

    /// Side of `node(h)` through which `h` is entered.
    pub fn entry(h: Handle) -> Side {
        if h.is_reverse() { Side::Right } else { Side::Left }
    }
}

// ============================================================================
// NodeRecord
// ============================================================================

/// Stored form of a node. Orientation is not stored; it belongs to handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRecord {
    pub sequence: String,
    /// Handles reached by walking off the left end.
    pub left_edges: EdgeList,
    /// Handles reached by walking off the right end.
    pub right_edges: EdgeList,
}

impl NodeRecord {
    pub fn new(sequence: impl Into<String>) -> Self {
        Self { sequence: sequence.into(), ..Default::default() }
    }

    pub fn edges(&self, side: Side) -> &EdgeList {
        match side {
            Side::Left => &self.left_edges,
            Side::Right => &self.right_edges,
        }
    }

    pub fn edges_mut(&mut self, side: Side) -> &mut EdgeList {
        match side {
            Side::Left => &mut self.left_edges,
            Side::Right => &mut self.right_edges,
        }
    }
}

/// Swap-remove the first entry equal to `target`.
fn remove_one(list: &mut EdgeList, target: Handle) -> bool {
    match list.iter().position(|h| *h == target) {
        Some(i) => {
            list.swap_remove(i);
            true
        }
        None => false,
    }
}

/// Overwrite the first entry equal to `from`.
fn replace_one(list: &mut EdgeList, from: Handle, to: Handle) -> bool {
    match list.iter_mut().find(|h| **h == from) {
        Some(slot) => {
            *slot = to;
            true
        }
        None => false,
    }
}

// ============================================================================
// NodeStore
// ============================================================================

/// Owns every node record plus the id watermarks.
#[derive(Debug, Clone)]
pub struct NodeStore {
    nodes: HashMap<NodeId, NodeRecord>,
    max_id: NodeId,
    min_id: NodeId,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            max_id: NodeId(0),
            min_id: EMPTY_MIN_ID,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Record lookup for callers that have already established existence.
    pub fn record(&self, id: NodeId) -> &NodeRecord {
        self.nodes.get(&id).unwrap_or_else(|| panic!("no node with id {id}"))
    }

    pub(crate) fn record_mut(&mut self, id: NodeId) -> &mut NodeRecord {
        self.nodes.get_mut(&id).unwrap_or_else(|| panic!("no node with id {id}"))
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn map(&self) -> &HashMap<NodeId, NodeRecord> {
        &self.nodes
    }

    pub fn max_id(&self) -> NodeId {
        self.max_id
    }

    pub fn min_id(&self) -> NodeId {
        self.min_id
    }

    /// Restore watermarks read from a persisted graph.
    pub fn set_watermarks(&mut self, min_id: NodeId, max_id: NodeId) {
        self.min_id = min_id;
        self.max_id = max_id;
    }

    /// Insert a fresh node. Panics if `id` is invalid or already present.
    pub fn insert(&mut self, id: NodeId, record: NodeRecord) -> Handle {
        assert!(id.is_valid(), "node id {id} is outside 1..={}", NodeId::MAX);
        assert!(!self.nodes.contains_key(&id), "node id {id} is already in use");
        self.nodes.insert(id, record);
        self.max_id = self.max_id.max(id);
        self.min_id = self.min_id.min(id);
        Handle::forward(id)
    }

    /// Insert with the next id above the high watermark.
    pub fn insert_next(&mut self, sequence: impl Into<String>) -> Handle {
        let id = NodeId(self.max_id.0 + 1);
        self.insert(id, NodeRecord::new(sequence))
    }

    // ========================================================================
    // Edge maintenance
    // ========================================================================

    pub fn create_edge(&mut self, left: Handle, right: Handle) {
        assert!(
            self.contains(left.id()) && self.contains(right.id()),
            "edge {left} -> {right} references a missing node"
        );
        self.record_mut(left.id()).edges_mut(Side::exit(left)).push(right);
        // a reversing self-loop touches one side of one node; store it once
        if left != right.flip() {
            self.record_mut(right.id()).edges_mut(Side::entry(right)).push(left.flip());
        }
        tracing::trace!(%left, %right, "created edge");
    }

    /// Remove one instance of the edge. Returns false if it was absent.
    pub fn destroy_edge(&mut self, left: Handle, right: Handle) -> bool {
        let Some(record) = self.nodes.get_mut(&left.id()) else {
            return false;
        };
        if !remove_one(record.edges_mut(Side::exit(left)), right) {
            return false;
        }
        if left != right.flip() {
            if let Some(record) = self.nodes.get_mut(&right.id()) {
                remove_one(record.edges_mut(Side::entry(right)), left.flip());
            }
        }
        tracing::trace!(%left, %right, "destroyed edge");
        true
    }

    /// Remove a node and every back-reference neighbors hold to it.
    pub fn remove(&mut self, id: NodeId) -> NodeRecord {
        let record = self.nodes.remove(&id).unwrap_or_else(|| panic!("no node with id {id}"));
        let fwd = Handle::forward(id);
        for (from, list) in [(fwd, &record.right_edges), (fwd.flip(), &record.left_edges)] {
            for &next in list.iter().filter(|next| next.id() != id) {
                if let Some(neighbor) = self.nodes.get_mut(&next.id()) {
                    remove_one(neighbor.edges_mut(Side::entry(next)), from.flip());
                }
            }
        }
        record
    }

    /// Rewrite node `id` so that its current reverse strand becomes forward.
    ///
    /// Each adjacency entry has exactly one mirror entry; that mirror is
    /// rewritten once per entry. Entries that point back into this node
    /// (self-loops) are rewritten inside its own lists instead, so a node
    /// looped to both of its ends ends up with the same physical loops.
    pub fn reverse(&mut self, id: NodeId) {
        let fwd = Handle::forward(id);
        let record = self.record_mut(id);
        let old_left = mem::take(&mut record.left_edges);
        let old_right = mem::take(&mut record.right_edges);

        // old (X+, next) has mirror X- on next's entry side; it becomes X+
        for &next in old_right.iter().filter(|next| next.id() != id) {
            replace_one(self.record_mut(next.id()).edges_mut(Side::entry(next)), fwd.flip(), fwd);
        }
        // old (X-, next) has mirror X+; it becomes X-
        for &next in old_left.iter().filter(|next| next.id() != id) {
            replace_one(self.record_mut(next.id()).edges_mut(Side::entry(next)), fwd, fwd.flip());
        }

        let renormalize = |h: Handle| if h.id() == id { h.flip() } else { h };
        let record = self.record_mut(id);
        record.sequence = reverse_complement(&record.sequence);
        record.left_edges = old_right.into_iter().map(renormalize).collect();
        record.right_edges = old_left.into_iter().map(renormalize).collect();
    }

    /// Split node `id` at ascending forward-strand `offsets`.
    ///
    /// Returns the forward handles of all segments, the original node first.
    /// The original keeps its left edges; the last segment takes the right
    /// edges; consecutive segments are linked. Paths are not touched.
    pub fn divide(&mut self, id: NodeId, offsets: &[usize]) -> Vec<Handle> {
        let original = Handle::forward(id);
        let record = self.record_mut(id);
        let sequence = mem::take(&mut record.sequence);
        let Some(&first) = offsets.first() else {
            record.sequence = sequence;
            return vec![original];
        };
        record.sequence = sequence[..first].to_string();

        let mut segments = Vec::with_capacity(offsets.len() + 1);
        segments.push(original);
        for (i, &start) in offsets.iter().enumerate() {
            let end = offsets.get(i + 1).copied().unwrap_or(sequence.len());
            segments.push(self.insert_next(&sequence[start..end]));
        }
        let last = segments[segments.len() - 1];

        let moved = mem::take(&mut self.record_mut(id).right_edges);
        let mut relocated = EdgeList::with_capacity(moved.len());
        for next in moved {
            if next == original.flip() {
                // reversing loop on the old right end now loops the last segment
                relocated.push(last.flip());
                continue;
            }
            replace_one(
                self.record_mut(next.id()).edges_mut(Side::entry(next)),
                original.flip(),
                last.flip(),
            );
            relocated.push(next);
        }
        self.record_mut(last.id()).right_edges = relocated;

        for pair in segments.windows(2) {
            self.create_edge(pair[0], pair[1]);
        }
        segments
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sorted(list: &EdgeList) -> Vec<Handle> {
        let mut v = list.to_vec();
        v.sort();
        v
    }

    #[test]
    fn test_insert_updates_watermarks() {
        let mut store = NodeStore::new();
        assert_eq!(store.min_id(), EMPTY_MIN_ID);
        store.insert(NodeId(5), NodeRecord::new("A"));
        store.insert(NodeId(3), NodeRecord::new("C"));
        assert_eq!(store.max_id(), NodeId(5));
        assert_eq!(store.min_id(), NodeId(3));
        assert_eq!(store.insert_next("G"), Handle::forward(NodeId(6)));
    }

    #[test]
    #[should_panic(expected = "already in use")]
    fn test_insert_duplicate_id_panics() {
        let mut store = NodeStore::new();
        store.insert(NodeId(1), NodeRecord::new("A"));
        store.insert(NodeId(1), NodeRecord::new("C"));
    }

    #[test]
    fn test_create_edge_mirrors() {
        let mut store = NodeStore::new();
        let a = store.insert_next("GATT");
        let b = store.insert_next("ACA");
        store.create_edge(a, b.flip());
        assert_eq!(store.record(a.id()).right_edges.to_vec(), vec![b.flip()]);
        assert_eq!(store.record(b.id()).right_edges.to_vec(), vec![a.flip()]);
        assert!(store.record(b.id()).left_edges.is_empty());
    }

    #[test]
    fn test_reversing_self_loop_stored_once_and_destroyed_once() {
        let mut store = NodeStore::new();
        let a = store.insert_next("ACGT");
        store.create_edge(a, a.flip());
        store.create_edge(a, a.flip());
        assert_eq!(store.record(a.id()).right_edges.len(), 2);
        assert!(store.destroy_edge(a, a.flip()));
        assert_eq!(store.record(a.id()).right_edges.len(), 1);
    }

    #[test]
    fn test_destroy_absent_edge_is_noop() {
        let mut store = NodeStore::new();
        let a = store.insert_next("A");
        let b = store.insert_next("C");
        assert!(!store.destroy_edge(a, b));
        assert!(!store.destroy_edge(Handle::forward(NodeId(99)), b));
    }

    #[test]
    fn test_remove_clears_back_references() {
        let mut store = NodeStore::new();
        let a = store.insert_next("A");
        let b = store.insert_next("C");
        let c = store.insert_next("G");
        store.create_edge(a, b);
        store.create_edge(b, c);
        store.create_edge(b, b);
        store.remove(b.id());
        assert!(store.record(a.id()).right_edges.is_empty());
        assert!(store.record(c.id()).left_edges.is_empty());
        assert_eq!(store.max_id(), NodeId(3));
    }

    #[test]
    fn test_reverse_node_with_loops_on_both_ends() {
        let mut store = NodeStore::new();
        let x = store.insert_next("GAT");
        let y = store.insert_next("C");
        store.create_edge(x, x.flip()); // right end to itself
        store.create_edge(x.flip(), x); // left end to itself
        store.create_edge(x, x); // right end to left end
        store.create_edge(x, y);
        store.create_edge(x.flip(), y);

        store.reverse(x.id());

        let record = store.record(x.id());
        assert_eq!(record.sequence, "ATC");
        // old (X+,X-) is now the left-end loop (X-,X+), and vice versa;
        // (X+,X+) is still a loop from the right end to the left end
        assert_eq!(sorted(&record.left_edges), vec![x, x.flip(), y]);
        assert_eq!(sorted(&record.right_edges), vec![x, x.flip(), y]);
        assert_eq!(sorted(&store.record(y.id()).left_edges), vec![x, x.flip()]);
        let left_end_loops = record.left_edges.iter().filter(|h| **h == x).count();
        assert_eq!(left_end_loops, 1);

        store.reverse(x.id());
        let record = store.record(x.id());
        assert_eq!(record.sequence, "GAT");
        assert_eq!(sorted(&record.right_edges), vec![x, x.flip(), y]);
        assert_eq!(sorted(&record.left_edges), vec![x, x.flip(), y]);
    }

    #[test]
    fn test_divide_moves_right_edges_to_last_segment() {
        let mut store = NodeStore::new();
        let a = store.insert_next("GATT");
        let b = store.insert_next("ACA");
        store.create_edge(a, b);
        store.create_edge(a, a.flip());

        let segments = store.divide(a.id(), &[1, 3]);

        assert_eq!(segments.len(), 3);
        let last = segments[2];
        assert_eq!(store.record(a.id()).sequence, "G");
        assert_eq!(store.record(segments[1].id()).sequence, "AT");
        assert_eq!(store.record(last.id()).sequence, "T");
        assert_eq!(store.record(a.id()).right_edges.to_vec(), vec![segments[1]]);
        assert_eq!(sorted(&store.record(last.id()).right_edges), vec![b, last.flip()]);
        assert_eq!(store.record(b.id()).left_edges.to_vec(), vec![last.flip()]);
    }
}
