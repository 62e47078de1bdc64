//! Handle codec: the universal addressing tokens of the graph.
//!
//! ```text
//! Handle            = (node_id << 1) | is_reverse          one u64
//! OccurrenceHandle  = [path_id, step_slot]                 two u64 words
//! ```
//!
//! All functions here are pure. Node ids must be positive and at most
//! [`NodeId::MAX`] so that an encoded handle fits the signed 64-bit slot of
//! the persisted layout.

use serde::{Deserialize, Serialize};

// ============================================================================
// NodeId
// ============================================================================

/// Opaque node identifier. Positive; `0` is never a live node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Largest id whose encoded handle still fits an `int64`.
    pub const MAX: NodeId = NodeId((1 << 62) - 1);

    pub fn is_valid(self) -> bool {
        self.0 >= 1 && self <= Self::MAX
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

// ============================================================================
// Handle
// ============================================================================

/// A node viewed in one orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    pub fn pack(id: NodeId, is_reverse: bool) -> Self {
        Handle((id.0 << 1) | is_reverse as u64)
    }

    pub fn forward(id: NodeId) -> Self {
        Self::pack(id, false)
    }

    pub fn reverse(id: NodeId) -> Self {
        Self::pack(id, true)
    }

    pub fn id(self) -> NodeId {
        NodeId(self.0 >> 1)
    }

    pub fn is_reverse(self) -> bool {
        self.0 & 1 == 1
    }

    /// Same node, opposite orientation.
    pub fn flip(self) -> Self {
        Handle(self.0 ^ 1)
    }

    /// Same node, forward orientation.
    pub fn as_forward(self) -> Self {
        Handle(self.0 & !1)
    }

    /// Raw encoding, as written by the persisted layout.
    pub fn as_integer(self) -> u64 {
        self.0
    }

    pub fn from_integer(raw: u64) -> Self {
        Handle(raw)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.id(), if self.is_reverse() { '-' } else { '+' })
    }
}

// ============================================================================
// Edge
// ============================================================================

/// An edge in canonical orientation.
///
/// The same physical edge reached from either end canonicalizes to the same
/// pair: `(a, b)` is kept when `a <= flip(b)`, otherwise it is rewritten as
/// `(flip(b), flip(a))`. A single-sided reversing self-loop (`a == flip(b)`)
/// is its own reverse and is kept as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge(pub Handle, pub Handle);

impl Edge {
    pub fn canonical(left: Handle, right: Handle) -> Self {
        let flipped_right = right.flip();
        if left <= flipped_right {
            Edge(left, right)
        } else {
            Edge(flipped_right, left.flip())
        }
    }

    pub fn left(&self) -> Handle {
        self.0
    }

    pub fn right(&self) -> Handle {
        self.1
    }

    /// The same edge traversed from the other end.
    pub fn reversed(&self) -> Self {
        Edge(self.1.flip(), self.0.flip())
    }

    pub fn is_reversing_self_loop(&self) -> bool {
        self.0 == self.1.flip()
    }
}

// ============================================================================
// PathHandle / OccurrenceHandle
// ============================================================================

/// Opaque path identifier. Path ids start at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathHandle(pub u64);

impl std::fmt::Display for PathHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One step of one path: the owning path plus the step's arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OccurrenceHandle([u64; 2]);

impl OccurrenceHandle {
    pub fn new(path: PathHandle, slot: usize) -> Self {
        OccurrenceHandle([path.0, slot as u64])
    }

    pub fn path_handle(self) -> PathHandle {
        PathHandle(self.0[0])
    }

    pub fn slot(self) -> usize {
        self.0[1] as usize
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_round_trip() {
        for raw in [1u64, 2, 15, 1 << 20, NodeId::MAX.0] {
            for is_reverse in [false, true] {
                let h = Handle::pack(NodeId(raw), is_reverse);
                assert_eq!(h.id(), NodeId(raw));
                assert_eq!(h.is_reverse(), is_reverse);
            }
        }
    }

    #[test]
    fn test_flip_and_forward() {
        let h = Handle::forward(NodeId(7));
        assert_eq!(h.flip(), Handle::reverse(NodeId(7)));
        assert_eq!(h.flip().flip(), h);
        assert_eq!(h.flip().as_forward(), h);
        assert_eq!(h.as_forward(), h);
        assert!(h < h.flip());
    }

    #[test]
    fn test_max_id_fits_signed_encoding() {
        let h = Handle::reverse(NodeId::MAX);
        assert!(i64::try_from(h.as_integer()).is_ok());
        assert!(!NodeId(0).is_valid());
        assert!(!NodeId(NodeId::MAX.0 + 1).is_valid());
    }

    #[test]
    fn test_edge_canonical_from_both_ends() {
        let a = Handle::reverse(NodeId(1));
        let b = Handle::reverse(NodeId(2));
        let as_added = Edge::canonical(a, b);
        let other_way = Edge::canonical(b.flip(), a.flip());
        assert_eq!(as_added, other_way);
        assert!(as_added == Edge(a, b) || as_added == Edge(b.flip(), a.flip()));
    }

    #[test]
    fn test_edge_single_sided_self_loops() {
        let h = Handle::reverse(NodeId(5));
        assert_eq!(Edge::canonical(h, h.flip()), Edge(h, h.flip()));
        assert_eq!(Edge::canonical(h.flip(), h), Edge(h.flip(), h));
        assert!(Edge(h, h.flip()).is_reversing_self_loop());
    }

    #[test]
    fn test_occurrence_handle_packing() {
        let occ = OccurrenceHandle::new(PathHandle(3), 42);
        assert_eq!(occ.path_handle(), PathHandle(3));
        assert_eq!(occ.slot(), 42);
    }
}
