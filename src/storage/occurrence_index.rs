//! Occurrence index: node id → every path step currently on that node.
//!
//! Holds non-owning references only; the steps themselves live in the
//! [`PathStore`](super::path_store::PathStore). Not persisted: rebuilt from
//! the paths on load.

use hashbrown::{HashMap, HashSet};

use crate::model::{NodeId, OccurrenceHandle};

#[derive(Debug, Clone, Default)]
pub struct OccurrenceIndex {
    by_node: HashMap<NodeId, HashSet<OccurrenceHandle>>,
}

impl OccurrenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.by_node.clear();
    }

    pub fn insert(&mut self, node: NodeId, occurrence: OccurrenceHandle) {
        self.by_node.entry(node).or_default().insert(occurrence);
    }

    /// Returns false if the occurrence was not registered under `node`.
    pub fn remove(&mut self, node: NodeId, occurrence: OccurrenceHandle) -> bool {
        let Some(set) = self.by_node.get_mut(&node) else {
            return false;
        };
        let removed = set.remove(&occurrence);
        if set.is_empty() {
            self.by_node.remove(&node);
        }
        removed
    }

    /// Drop the whole entry for a node.
    pub fn remove_node(&mut self, node: NodeId) {
        self.by_node.remove(&node);
    }

    pub fn contains(&self, node: NodeId, occurrence: OccurrenceHandle) -> bool {
        self.by_node.get(&node).is_some_and(|set| set.contains(&occurrence))
    }

    /// Path degree of a node.
    pub fn degree(&self, node: NodeId) -> usize {
        self.by_node.get(&node).map_or(0, HashSet::len)
    }

    pub fn on_node(&self, node: NodeId) -> impl Iterator<Item = OccurrenceHandle> + '_ {
        self.by_node.get(&node).into_iter().flatten().copied()
    }

    /// Total number of registered occurrences.
    pub fn len(&self) -> usize {
        self.by_node.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathHandle;

    #[test]
    fn test_insert_remove_by_identity() {
        let mut index = OccurrenceIndex::new();
        let a = OccurrenceHandle::new(PathHandle(1), 0);
        let b = OccurrenceHandle::new(PathHandle(2), 0);
        index.insert(NodeId(7), a);
        index.insert(NodeId(7), b);
        assert_eq!(index.degree(NodeId(7)), 2);

        assert!(index.remove(NodeId(7), a));
        assert!(!index.remove(NodeId(7), a));
        assert!(!index.contains(NodeId(7), a));
        assert!(index.contains(NodeId(7), b));
        assert_eq!(index.on_node(NodeId(7)).collect::<Vec<_>>(), vec![b]);

        assert!(index.remove(NodeId(7), b));
        assert!(index.is_empty());
        assert_eq!(index.on_node(NodeId(7)).count(), 0);
    }
}
