//! `FrozenGraph`: a read-only compacted snapshot.
//!
//! Built once from any [`PathHandleGraph`]. Layout:
//!
//! ```text
//! ids:        [n0, n1, n2, ...]          sorted, binary-searched
//! sequences:  "GATTACA..."               one buffer, sliced by seq_offsets
//! right:      CSR over ids               handles reached leaving n+ to the right
//! left:       CSR over ids               handles reached leaving n+ to the left,
//!                                        oriented to read into n+
//! paths:      [(id, name, [steps])]      sorted by path id
//! ```
//!
//! Reverse-strand traversal is answered from the forward lists:
//! leaving `n-` on the right is leaving `n+` on the left with every handle
//! flipped, and vice versa.

use hashbrown::HashMap;
use rayon::prelude::*;

use super::{HandleGraph, PathHandleGraph};
use crate::model::{reverse_complement, Handle, NodeId, OccurrenceHandle, PathHandle};

/// Compressed sparse rows: the targets of row `i` are
/// `targets[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, Default)]
struct Csr {
    offsets: Vec<usize>,
    targets: Vec<Handle>,
}

impl Csr {
    fn row(&self, i: usize) -> &[Handle] {
        &self.targets[self.offsets[i]..self.offsets[i + 1]]
    }
}

#[derive(Debug, Clone)]
struct FrozenPath {
    id: PathHandle,
    name: String,
    steps: Vec<Handle>,
}

#[derive(Debug, Clone)]
pub struct FrozenGraph {
    ids: Vec<NodeId>,
    seq_offsets: Vec<usize>,
    sequences: String,
    right: Csr,
    left: Csr,
    paths: Vec<FrozenPath>,
    path_names: HashMap<String, usize>,
    occurrences: HashMap<NodeId, Vec<OccurrenceHandle>>,
    min_id: NodeId,
    max_id: NodeId,
}

impl FrozenGraph {
    pub fn from_graph<G: PathHandleGraph>(graph: &G) -> Self {
        let mut ids = Vec::with_capacity(graph.node_count());
        graph.for_each_handle(|handle| {
            ids.push(handle.id());
            true
        });
        ids.sort_unstable();

        let mut sequences = String::new();
        let mut seq_offsets = Vec::with_capacity(ids.len() + 1);
        let mut right = Csr::default();
        let mut left = Csr::default();
        seq_offsets.push(0);
        right.offsets.push(0);
        left.offsets.push(0);
        for &id in &ids {
            let handle = Handle::forward(id);
            sequences.push_str(&graph.get_sequence(handle));
            seq_offsets.push(sequences.len());
            graph.follow_edges(handle, false, |next| {
                right.targets.push(next);
                true
            });
            right.offsets.push(right.targets.len());
            graph.follow_edges(handle, true, |prev| {
                left.targets.push(prev);
                true
            });
            left.offsets.push(left.targets.len());
        }

        let mut paths = Vec::with_capacity(graph.get_path_count());
        graph.for_each_path_handle(|path| {
            paths.push(FrozenPath {
                id: path,
                name: graph.get_path_name(path).to_string(),
                steps: graph.path_steps(path),
            });
            true
        });
        paths.sort_unstable_by_key(|path| path.id);

        let mut path_names = HashMap::with_capacity(paths.len());
        let mut occurrences: HashMap<NodeId, Vec<OccurrenceHandle>> = HashMap::new();
        for (index, path) in paths.iter().enumerate() {
            path_names.insert(path.name.clone(), index);
            for (slot, handle) in path.steps.iter().enumerate() {
                occurrences
                    .entry(handle.id())
                    .or_default()
                    .push(OccurrenceHandle::new(path.id, slot));
            }
        }

        tracing::debug!(nodes = ids.len(), paths = paths.len(), "froze graph");
        Self {
            ids,
            seq_offsets,
            sequences,
            right,
            left,
            paths,
            path_names,
            occurrences,
            min_id: graph.min_node_id(),
            max_id: graph.max_node_id(),
        }
    }

    fn rank(&self, id: NodeId) -> usize {
        self.ids
            .binary_search(&id)
            .unwrap_or_else(|_| panic!("no node with id {id}"))
    }

    fn path(&self, path: PathHandle) -> &FrozenPath {
        let index = self
            .paths
            .binary_search_by_key(&path, |p| p.id)
            .unwrap_or_else(|_| panic!("no path with id {path}"));
        &self.paths[index]
    }

    fn forward_sequence(&self, rank: usize) -> &str {
        &self.sequences[self.seq_offsets[rank]..self.seq_offsets[rank + 1]]
    }
}

impl HandleGraph for FrozenGraph {
    fn has_node(&self, id: NodeId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    fn get_length(&self, handle: Handle) -> usize {
        let rank = self.rank(handle.id());
        self.seq_offsets[rank + 1] - self.seq_offsets[rank]
    }

    fn get_sequence(&self, handle: Handle) -> String {
        let sequence = self.forward_sequence(self.rank(handle.id()));
        if handle.is_reverse() {
            reverse_complement(sequence)
        } else {
            sequence.to_string()
        }
    }

    fn follow_edges<F>(&self, handle: Handle, go_left: bool, mut iteratee: F) -> bool
    where
        F: FnMut(Handle) -> bool,
    {
        let rank = self.rank(handle.id());
        match (handle.is_reverse(), go_left) {
            (false, false) => self.right.row(rank).iter().all(|&h| iteratee(h)),
            (false, true) => self.left.row(rank).iter().all(|&h| iteratee(h)),
            (true, false) => self.left.row(rank).iter().all(|&h| iteratee(h.flip())),
            (true, true) => self.right.row(rank).iter().all(|&h| iteratee(h.flip())),
        }
    }

    fn for_each_handle<F>(&self, mut iteratee: F) -> bool
    where
        F: FnMut(Handle) -> bool,
    {
        self.ids.iter().all(|&id| iteratee(Handle::forward(id)))
    }

    fn for_each_handle_parallel<F>(&self, iteratee: F) -> bool
    where
        F: Fn(Handle) -> bool + Sync + Send,
    {
        // every node is visited even after a false
        self.ids
            .par_iter()
            .map(|&id| iteratee(Handle::forward(id)))
            .reduce(|| true, |a, b| a && b)
    }

    fn node_count(&self) -> usize {
        self.ids.len()
    }

    fn min_node_id(&self) -> NodeId {
        self.min_id
    }

    fn max_node_id(&self) -> NodeId {
        self.max_id
    }

    fn total_length(&self) -> usize {
        self.sequences.len()
    }
}

impl PathHandleGraph for FrozenGraph {
    fn get_path_count(&self) -> usize {
        self.paths.len()
    }

    fn has_path(&self, name: &str) -> bool {
        self.path_names.contains_key(name)
    }

    fn get_path_handle(&self, name: &str) -> Option<PathHandle> {
        self.path_names.get(name).map(|&index| self.paths[index].id)
    }

    fn get_path_name(&self, path: PathHandle) -> &str {
        &self.path(path).name
    }

    fn get_occurrence_count(&self, path: PathHandle) -> usize {
        self.path(path).steps.len()
    }

    fn for_each_path_handle<F>(&self, mut iteratee: F) -> bool
    where
        F: FnMut(PathHandle) -> bool,
    {
        self.paths.iter().all(|path| iteratee(path.id))
    }

    fn get_occurrence(&self, occurrence: OccurrenceHandle) -> Handle {
        self.path(occurrence.path_handle()).steps[occurrence.slot()]
    }

    fn get_first_occurrence(&self, path: PathHandle) -> Option<OccurrenceHandle> {
        let steps = &self.path(path).steps;
        (!steps.is_empty()).then(|| OccurrenceHandle::new(path, 0))
    }

    fn get_last_occurrence(&self, path: PathHandle) -> Option<OccurrenceHandle> {
        let steps = &self.path(path).steps;
        steps.len().checked_sub(1).map(|slot| OccurrenceHandle::new(path, slot))
    }

    fn get_next_occurrence(&self, occurrence: OccurrenceHandle) -> Option<OccurrenceHandle> {
        let path = occurrence.path_handle();
        let next = occurrence.slot() + 1;
        (next < self.path(path).steps.len()).then(|| OccurrenceHandle::new(path, next))
    }

    fn get_previous_occurrence(&self, occurrence: OccurrenceHandle) -> Option<OccurrenceHandle> {
        let path = occurrence.path_handle();
        occurrence.slot().checked_sub(1).map(|slot| OccurrenceHandle::new(path, slot))
    }

    fn for_each_occurrence_on_handle<F>(&self, handle: Handle, mut iteratee: F) -> bool
    where
        F: FnMut(OccurrenceHandle) -> bool,
    {
        self.occurrences
            .get(&handle.id())
            .map_or(true, |list| list.iter().all(|&occurrence| iteratee(occurrence)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HashGraph, MutableHandleGraph, MutablePathHandleGraph};
    use pretty_assertions::assert_eq;

    fn sample() -> HashGraph {
        let mut g = HashGraph::new();
        let a = g.create_handle("GAT");
        let b = g.create_handle("TACA");
        let c = g.create_handle("C");
        g.create_edge(a, b.flip());
        g.create_edge(b.flip(), c);
        g.create_edge(c.flip(), c);
        let p = g.create_path_handle("ref");
        g.append_occurrence(p, a);
        g.append_occurrence(p, b.flip());
        g.append_occurrence(p, c);
        g
    }

    #[test]
    fn test_traversal_matches_source_in_both_orientations() {
        let g = sample();
        let frozen = FrozenGraph::from_graph(&g);
        for id in 1..=3 {
            for is_reverse in [false, true] {
                let h = Handle::pack(NodeId(id), is_reverse);
                assert_eq!(frozen.get_sequence(h), g.get_sequence(h));
                for go_left in [false, true] {
                    let mut expected = Vec::new();
                    g.follow_edges(h, go_left, |n| {
                        expected.push(n);
                        true
                    });
                    let mut got = Vec::new();
                    frozen.follow_edges(h, go_left, |n| {
                        got.push(n);
                        true
                    });
                    expected.sort();
                    got.sort();
                    assert_eq!(got, expected, "{h} go_left={go_left}");
                }
            }
        }
        assert_eq!(frozen.edge_count(), g.edge_count());
        assert_eq!(frozen.total_length(), 8);
    }

    #[test]
    fn test_paths_are_flattened() {
        let g = sample();
        let frozen = FrozenGraph::from_graph(&g);
        let p = frozen.get_path_handle("ref").unwrap();
        assert_eq!(frozen.path_steps(p), g.path_steps(p));
        let last = frozen.get_last_occurrence(p).unwrap();
        assert!(!frozen.has_next_occurrence(last));
        assert_eq!(frozen.get_occurrence(last), Handle::forward(NodeId(3)));
        assert_eq!(frozen.occurrences_of_handle(Handle::forward(NodeId(2)), true).len(), 0);
        assert_eq!(frozen.occurrences_of_handle(Handle::reverse(NodeId(2)), true).len(), 1);
    }

    #[test]
    fn test_parallel_reduction() {
        let frozen = FrozenGraph::from_graph(&sample());
        assert!(frozen.for_each_handle_parallel(|_| true));
        assert!(!frozen.for_each_handle_parallel(|h| h.id() != NodeId(2)));
    }
}
