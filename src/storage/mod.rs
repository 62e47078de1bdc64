//! # Graph Contract
//!
//! The traits every consumer programs against. Aligners, coverage packers
//! and iteration utilities take `impl HandleGraph` (or `PathHandleGraph`)
//! and never see a concrete store; construction writes through
//! `MutableHandleGraph` / `MutablePathHandleGraph`.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `HashGraph` | `hash_graph` | Mutable, hash-map backed, serializable |
//! | `FrozenGraph` | `frozen` | Read-only compacted snapshot |
//!
//! `SharedGraph` wraps a `HashGraph` for callers that need many readers and
//! one writer across threads.

pub mod node_store;
pub mod path_store;
pub mod occurrence_index;
pub mod hash_graph;
pub mod frozen;
pub mod shared;

use crate::model::{Edge, Handle, NodeId, OccurrenceHandle, PathHandle};

pub use frozen::FrozenGraph;
pub use hash_graph::{GraphStats, HashGraph};
pub use shared::SharedGraph;

// ============================================================================
// HandleGraph: read-only nodes and edges
// ============================================================================

/// Read-only access to a bidirected sequence graph.
///
/// Iteration callbacks return `false` to stop early; the iterating method
/// then returns `false` as well.
pub trait HandleGraph: Sync {
    fn has_node(&self, id: NodeId) -> bool;

    fn get_handle(&self, id: NodeId, is_reverse: bool) -> Handle {
        Handle::pack(id, is_reverse)
    }

    /// Sequence length in bases. Panics if the node does not exist.
    fn get_length(&self, handle: Handle) -> usize;

    /// Sequence as read along `handle`. Panics if the node does not exist.
    fn get_sequence(&self, handle: Handle) -> String;

    /// Visit the handles reached by walking off the end of `handle`
    /// (`go_left = false`) or off its start (`go_left = true`). Handles found
    /// going left are oriented so that they read into `handle`.
    fn follow_edges<F>(&self, handle: Handle, go_left: bool, iteratee: F) -> bool
    where
        F: FnMut(Handle) -> bool;

    /// Visit every node once, as its forward handle.
    fn for_each_handle<F>(&self, iteratee: F) -> bool
    where
        F: FnMut(Handle) -> bool;

    /// Like [`for_each_handle`](Self::for_each_handle), spread over a worker
    /// pool. A `false` return is propagated, but tasks already running may
    /// still invoke `iteratee` afterwards.
    fn for_each_handle_parallel<F>(&self, iteratee: F) -> bool
    where
        F: Fn(Handle) -> bool + Sync + Send;

    fn node_count(&self) -> usize;

    fn min_node_id(&self) -> NodeId;

    fn max_node_id(&self) -> NodeId;

    // ========================================================================
    // Derived queries
    // ========================================================================

    fn get_degree(&self, handle: Handle, go_left: bool) -> usize {
        let mut degree = 0;
        self.follow_edges(handle, go_left, |_| {
            degree += 1;
            true
        });
        degree
    }

    fn has_edge(&self, left: Handle, right: Handle) -> bool {
        !self.follow_edges(left, false, |next| next != right)
    }

    fn edge_handle(&self, left: Handle, right: Handle) -> Edge {
        Edge::canonical(left, right)
    }

    /// Visit every edge once, in canonical form. Multi-edges are visited once
    /// per copy.
    fn for_each_edge<F>(&self, mut iteratee: F) -> bool
    where
        F: FnMut(Edge) -> bool,
    {
        self.for_each_handle(|handle| {
            let id = handle.id();
            let keep_going = self.follow_edges(handle, false, |next| {
                id > next.id() || iteratee(Edge::canonical(handle, next))
            });
            // going left, an equal id is either the mirror of a right-end
            // loop (already seen) or a loop on the left end itself
            keep_going
                && self.follow_edges(handle, true, |prev| {
                    let owned_here = id < prev.id() || (id == prev.id() && prev.is_reverse());
                    !owned_here || iteratee(Edge::canonical(prev, handle))
                })
        })
    }

    fn edge_count(&self) -> usize {
        let mut count = 0;
        self.for_each_edge(|_| {
            count += 1;
            true
        });
        count
    }

    /// Sum of all node lengths.
    fn total_length(&self) -> usize {
        let mut total = 0;
        self.for_each_handle(|handle| {
            total += self.get_length(handle);
            true
        });
        total
    }
}

// ============================================================================
// PathHandleGraph: read-only embedded paths
// ============================================================================

pub trait PathHandleGraph: HandleGraph {
    fn get_path_count(&self) -> usize;

    fn has_path(&self, name: &str) -> bool;

    fn get_path_handle(&self, name: &str) -> Option<PathHandle>;

    /// Panics if the path does not exist.
    fn get_path_name(&self, path: PathHandle) -> &str;

    fn get_occurrence_count(&self, path: PathHandle) -> usize;

    fn is_empty_path(&self, path: PathHandle) -> bool {
        self.get_occurrence_count(path) == 0
    }

    fn for_each_path_handle<F>(&self, iteratee: F) -> bool
    where
        F: FnMut(PathHandle) -> bool;

    /// Handle visited at this step.
    fn get_occurrence(&self, occurrence: OccurrenceHandle) -> Handle;

    fn get_path_handle_of_occurrence(&self, occurrence: OccurrenceHandle) -> PathHandle {
        occurrence.path_handle()
    }

    /// `None` for an empty path.
    fn get_first_occurrence(&self, path: PathHandle) -> Option<OccurrenceHandle>;

    fn get_last_occurrence(&self, path: PathHandle) -> Option<OccurrenceHandle>;

    fn has_next_occurrence(&self, occurrence: OccurrenceHandle) -> bool {
        self.get_next_occurrence(occurrence).is_some()
    }

    fn has_previous_occurrence(&self, occurrence: OccurrenceHandle) -> bool {
        self.get_previous_occurrence(occurrence).is_some()
    }

    fn get_next_occurrence(&self, occurrence: OccurrenceHandle) -> Option<OccurrenceHandle>;

    fn get_previous_occurrence(&self, occurrence: OccurrenceHandle) -> Option<OccurrenceHandle>;

    /// Visit every step, on any path, that visits the node of `handle`.
    fn for_each_occurrence_on_handle<F>(&self, handle: Handle, iteratee: F) -> bool
    where
        F: FnMut(OccurrenceHandle) -> bool;

    fn for_each_occurrence_in_path<F>(&self, path: PathHandle, mut iteratee: F) -> bool
    where
        F: FnMut(OccurrenceHandle) -> bool,
    {
        let mut cursor = self.get_first_occurrence(path);
        while let Some(occurrence) = cursor {
            if !iteratee(occurrence) {
                return false;
            }
            cursor = self.get_next_occurrence(occurrence);
        }
        true
    }

    /// Steps on the node of `handle`; with `match_orientation`, only those
    /// that traverse it in the same orientation as `handle`.
    fn occurrences_of_handle(&self, handle: Handle, match_orientation: bool) -> Vec<OccurrenceHandle> {
        let mut found = Vec::new();
        self.for_each_occurrence_on_handle(handle, |occurrence| {
            if !match_orientation || self.get_occurrence(occurrence) == handle {
                found.push(occurrence);
            }
            true
        });
        found
    }

    /// The handles of a path in order.
    fn path_steps(&self, path: PathHandle) -> Vec<Handle> {
        let mut steps = Vec::with_capacity(self.get_occurrence_count(path));
        self.for_each_occurrence_in_path(path, |occurrence| {
            steps.push(self.get_occurrence(occurrence));
            true
        });
        steps
    }
}

// ============================================================================
// Mutation
// ============================================================================

/// Topology mutation. All operations assume exclusive access.
pub trait MutableHandleGraph: HandleGraph {
    /// New node with id `max_node_id() + 1`; returns its forward handle.
    fn create_handle(&mut self, sequence: &str) -> Handle;

    /// New node with a caller-chosen id. Panics if the id is taken.
    fn create_handle_with_id(&mut self, sequence: &str, id: NodeId) -> Handle;

    /// Add an edge. Calling twice creates a multi-edge.
    fn create_edge(&mut self, left: Handle, right: Handle);

    fn create_edge_from(&mut self, edge: Edge) {
        self.create_edge(edge.left(), edge.right());
    }

    /// Remove one copy of an edge; no-op if absent.
    fn destroy_edge(&mut self, left: Handle, right: Handle);

    /// Remove a node and its edges. Panics if a path still visits it.
    fn destroy_handle(&mut self, handle: Handle);

    /// Make the strand `handle` reads along the node's forward strand and
    /// return the new forward handle. No-op for forward handles.
    fn apply_orientation(&mut self, handle: Handle) -> Handle;

    /// Split a node at `offsets` measured along `handle`; returns the pieces
    /// in the orientation of `handle`.
    fn divide_handle(&mut self, handle: Handle, offsets: &[usize]) -> Vec<Handle>;

    /// Drop all nodes, edges and paths and reset id counters.
    fn clear(&mut self);
}

pub trait MutablePathHandleGraph: PathHandleGraph + MutableHandleGraph {
    /// Panics if a path with this name exists.
    fn create_path_handle(&mut self, name: &str) -> PathHandle;

    fn destroy_path(&mut self, path: PathHandle);

    fn append_occurrence(&mut self, path: PathHandle, handle: Handle) -> OccurrenceHandle;

    fn prepend_occurrence(&mut self, path: PathHandle, handle: Handle) -> OccurrenceHandle;

    /// Insert after `after`, or at the head of the path when `after` is `None`.
    fn insert_occurrence_after(
        &mut self,
        path: PathHandle,
        after: Option<OccurrenceHandle>,
        handle: Handle,
    ) -> OccurrenceHandle;

    fn remove_occurrence(&mut self, occurrence: OccurrenceHandle);
}
