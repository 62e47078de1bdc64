//! `HashGraph`: the mutable graph engine.
//!
//! Combines the node store, path store and occurrence index. Every public
//! mutation is one transaction over all three: when it returns, adjacency
//! is symmetric and every path step is indexed under the node it visits.
//!
//! ## Limitations
//!
//! - **Single writer**: mutations take `&mut self`; share across threads
//!   through [`SharedGraph`](super::SharedGraph) or your own lock.
//! - **Preconditions panic**: operating on a missing node or path,
//!   dividing at offsets outside the node, or destroying a node that a path
//!   still visits is a caller bug and panics before anything is changed.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use rayon::prelude::*;
use serde::Serialize;

use super::node_store::{NodeRecord, NodeStore, Side};
use super::occurrence_index::OccurrenceIndex;
use super::path_store::PathStore;
use super::{HandleGraph, MutableHandleGraph, MutablePathHandleGraph, PathHandleGraph};
use crate::config::GraphConfig;
use crate::model::{reverse_complement, Handle, NodeId, OccurrenceHandle, PathHandle};
use crate::{Error, Result};

// ============================================================================
// HashGraph
// ============================================================================

#[derive(Clone, Default)]
pub struct HashGraph {
    pub(crate) nodes: NodeStore,
    pub(crate) paths: PathStore,
    pub(crate) occurrences: OccurrenceIndex,
    config: GraphConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl fmt::Debug for HashGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashGraph")
            .field("nodes", &self.nodes.len())
            .field("paths", &self.paths.len())
            .field("occurrences", &self.occurrences.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Summary counts, serializable for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub path_count: usize,
    pub occurrence_count: usize,
    pub total_length: usize,
    pub min_id: NodeId,
    pub max_id: NodeId,
}

impl HashGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.threads {
            Some(threads) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::Config(format!("thread pool: {e}")))?,
            )),
            None => None,
        };
        Ok(Self { config, pool, ..Self::default() })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edge_count(),
            path_count: self.paths.len(),
            occurrence_count: self.occurrences.len(),
            total_length: self.total_length(),
            min_id: self.nodes.min_id(),
            max_id: self.nodes.max_id(),
        }
    }

    /// Check adjacency symmetry, edge targets, and that the occurrence index
    /// matches the paths exactly.
    pub fn validate(&self) -> Result<()> {
        let mut half_edges: HashMap<(NodeId, Side, Handle), usize> = HashMap::new();
        for (&id, record) in self.nodes.map() {
            for side in [Side::Left, Side::Right] {
                for &next in record.edges(side) {
                    if !self.nodes.contains(next.id()) {
                        return Err(Error::Corrupt(format!(
                            "node {id} has an edge to missing node {}",
                            next.id()
                        )));
                    }
                    *half_edges.entry((id, side, next)).or_default() += 1;
                }
            }
        }
        for (&(id, side, next), &count) in &half_edges {
            let from = Handle::pack(id, side == Side::Left);
            if from == next.flip() {
                continue;
            }
            let mirror = (next.id(), Side::entry(next), from.flip());
            let mirrored = half_edges.get(&mirror).copied().unwrap_or(0);
            if mirrored != count {
                return Err(Error::Corrupt(format!(
                    "edge {from} -> {next} is stored {count} times but mirrored {mirrored} times"
                )));
            }
        }

        let mut steps = 0;
        for record in self.paths.records() {
            let path = record.id();
            let mut prev = None;
            let mut walked = 0;
            for (slot, handle) in record.iter() {
                walked += 1;
                if walked > record.len() {
                    return Err(Error::Corrupt(format!("path {path} is longer than its count")));
                }
                if record.prev(slot) != prev {
                    return Err(Error::Corrupt(format!("path {path} has a broken back link at slot {slot}")));
                }
                if !self.nodes.contains(handle.id()) {
                    return Err(Error::Corrupt(format!("path {path} visits missing node {}", handle.id())));
                }
                if !self.occurrences.contains(handle.id(), OccurrenceHandle::new(path, slot)) {
                    return Err(Error::Corrupt(format!(
                        "step {slot} of path {path} is not indexed under node {}",
                        handle.id()
                    )));
                }
                prev = Some(slot);
            }
            if walked != record.len() || record.tail() != prev {
                return Err(Error::Corrupt(format!("path {path} count or tail disagrees with its links")));
            }
            steps += walked;
        }
        let indexed = self.occurrences.len();
        if indexed != steps {
            return Err(Error::Corrupt(format!("occurrence index holds {indexed} entries for {steps} path steps")));
        }
        Ok(())
    }

    /// Re-register every path step in the occurrence index.
    pub(crate) fn rebuild_occurrence_index(&mut self) {
        self.occurrences.clear();
        for record in self.paths.records() {
            for (slot, handle) in record.iter() {
                self.occurrences.insert(handle.id(), OccurrenceHandle::new(record.id(), slot));
            }
        }
    }

    fn assert_node(&self, id: NodeId) {
        assert!(self.nodes.contains(id), "no node with id {id}");
    }
}

// ============================================================================
// HandleGraph impl
// ============================================================================

impl HandleGraph for HashGraph {
    fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    fn get_length(&self, handle: Handle) -> usize {
        self.nodes.record(handle.id()).sequence.len()
    }

    fn get_sequence(&self, handle: Handle) -> String {
        let sequence = &self.nodes.record(handle.id()).sequence;
        if handle.is_reverse() {
            reverse_complement(sequence)
        } else {
            sequence.clone()
        }
    }

    fn follow_edges<F>(&self, handle: Handle, go_left: bool, mut iteratee: F) -> bool
    where
        F: FnMut(Handle) -> bool,
    {
        let record = self.nodes.record(handle.id());
        let list = if handle.is_reverse() != go_left {
            &record.left_edges
        } else {
            &record.right_edges
        };
        list.iter()
            .all(|&next| iteratee(if go_left { next.flip() } else { next }))
    }

    fn for_each_handle<F>(&self, mut iteratee: F) -> bool
    where
        F: FnMut(Handle) -> bool,
    {
        self.nodes.ids().all(|id| iteratee(Handle::forward(id)))
    }

    fn for_each_handle_parallel<F>(&self, iteratee: F) -> bool
    where
        F: Fn(Handle) -> bool + Sync + Send,
    {
        let keep_going = AtomicBool::new(true);
        let visit = || {
            self.nodes.map().par_keys().for_each(|&id| {
                if keep_going.load(Ordering::Relaxed) && !iteratee(Handle::forward(id)) {
                    keep_going.store(false, Ordering::Relaxed);
                }
            })
        };
        match &self.pool {
            Some(pool) => pool.install(visit),
            None => visit(),
        }
        keep_going.into_inner()
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn min_node_id(&self) -> NodeId {
        self.nodes.min_id()
    }

    fn max_node_id(&self) -> NodeId {
        self.nodes.max_id()
    }
}

// ============================================================================
// PathHandleGraph impl
// ============================================================================

impl PathHandleGraph for HashGraph {
    fn get_path_count(&self) -> usize {
        self.paths.len()
    }

    fn has_path(&self, name: &str) -> bool {
        self.paths.by_name(name).is_some()
    }

    fn get_path_handle(&self, name: &str) -> Option<PathHandle> {
        self.paths.by_name(name)
    }

    fn get_path_name(&self, path: PathHandle) -> &str {
        self.paths.record(path).name()
    }

    fn get_occurrence_count(&self, path: PathHandle) -> usize {
        self.paths.record(path).len()
    }

    fn for_each_path_handle<F>(&self, mut iteratee: F) -> bool
    where
        F: FnMut(PathHandle) -> bool,
    {
        self.paths.records().all(|record| iteratee(record.id()))
    }

    fn get_occurrence(&self, occurrence: OccurrenceHandle) -> Handle {
        self.paths.record(occurrence.path_handle()).handle_at(occurrence.slot())
    }

    fn get_first_occurrence(&self, path: PathHandle) -> Option<OccurrenceHandle> {
        self.paths.record(path).head().map(|slot| OccurrenceHandle::new(path, slot))
    }

    fn get_last_occurrence(&self, path: PathHandle) -> Option<OccurrenceHandle> {
        self.paths.record(path).tail().map(|slot| OccurrenceHandle::new(path, slot))
    }

    fn get_next_occurrence(&self, occurrence: OccurrenceHandle) -> Option<OccurrenceHandle> {
        let path = occurrence.path_handle();
        self.paths.record(path).next(occurrence.slot()).map(|slot| OccurrenceHandle::new(path, slot))
    }

    fn get_previous_occurrence(&self, occurrence: OccurrenceHandle) -> Option<OccurrenceHandle> {
        let path = occurrence.path_handle();
        self.paths.record(path).prev(occurrence.slot()).map(|slot| OccurrenceHandle::new(path, slot))
    }

    fn for_each_occurrence_on_handle<F>(&self, handle: Handle, mut iteratee: F) -> bool
    where
        F: FnMut(OccurrenceHandle) -> bool,
    {
        self.occurrences.on_node(handle.id()).all(|occurrence| iteratee(occurrence))
    }
}

// ============================================================================
// MutableHandleGraph impl
// ============================================================================

impl MutableHandleGraph for HashGraph {
    fn create_handle(&mut self, sequence: &str) -> Handle {
        let id = NodeId(self.nodes.max_id().0 + 1);
        self.create_handle_with_id(sequence, id)
    }

    fn create_handle_with_id(&mut self, sequence: &str, id: NodeId) -> Handle {
        assert!(sequence.is_ascii(), "node {id} sequence is not ASCII");
        self.nodes.insert(id, NodeRecord::new(sequence))
    }

    fn create_edge(&mut self, left: Handle, right: Handle) {
        self.nodes.create_edge(left, right);
    }

    fn destroy_edge(&mut self, left: Handle, right: Handle) {
        self.nodes.destroy_edge(left, right);
    }

    fn destroy_handle(&mut self, handle: Handle) {
        let id = handle.id();
        self.assert_node(id);
        let visits = self.occurrences.degree(id);
        assert!(visits == 0, "node {id} is still visited by {visits} path steps");
        self.nodes.remove(id);
        self.occurrences.remove_node(id);
        tracing::debug!(node = %id, "destroyed node");
    }

    fn apply_orientation(&mut self, handle: Handle) -> Handle {
        if !handle.is_reverse() {
            return handle;
        }
        let id = handle.id();
        self.assert_node(id);
        self.nodes.reverse(id);
        for occurrence in self.occurrences.on_node(id) {
            let path = self.paths.record_mut(occurrence.path_handle());
            let flipped = path.handle_at(occurrence.slot()).flip();
            path.set_handle(occurrence.slot(), flipped);
        }
        tracing::debug!(node = %id, "flipped node orientation");
        handle.flip()
    }

    fn divide_handle(&mut self, handle: Handle, offsets: &[usize]) -> Vec<Handle> {
        let id = handle.id();
        self.assert_node(id);
        if offsets.is_empty() {
            return vec![handle.as_forward()];
        }
        let length = self.get_length(handle);
        assert!(
            offsets.windows(2).all(|pair| pair[0] <= pair[1]),
            "division offsets {offsets:?} are not ascending"
        );
        assert!(
            offsets.iter().all(|&offset| offset <= length),
            "division offsets {offsets:?} exceed node {id} of length {length}"
        );

        let forward_offsets: Vec<usize> = if handle.is_reverse() {
            offsets.iter().rev().map(|&offset| length - offset).collect()
        } else {
            offsets.to_vec()
        };
        let segments = self.nodes.divide(id, &forward_offsets);

        let touching: Vec<OccurrenceHandle> = self.occurrences.on_node(id).collect();
        for occurrence in touching {
            let path_id = occurrence.path_handle();
            let path = self.paths.record_mut(path_id);
            if path.handle_at(occurrence.slot()).is_reverse() {
                // read backwards, the new segments come before the original
                let mut cursor = path.prev(occurrence.slot());
                for segment in segments[1..].iter().rev() {
                    let slot = path.insert_after(segment.flip(), cursor);
                    self.occurrences.insert(segment.id(), OccurrenceHandle::new(path_id, slot));
                    cursor = Some(slot);
                }
            } else {
                let mut cursor = Some(occurrence.slot());
                for segment in &segments[1..] {
                    let slot = path.insert_after(*segment, cursor);
                    self.occurrences.insert(segment.id(), OccurrenceHandle::new(path_id, slot));
                    cursor = Some(slot);
                }
            }
        }
        tracing::debug!(node = %id, segments = segments.len(), "divided node");

        if handle.is_reverse() {
            segments.into_iter().rev().map(Handle::flip).collect()
        } else {
            segments
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.paths.clear();
        self.occurrences.clear();
    }
}

// ============================================================================
// MutablePathHandleGraph impl
// ============================================================================

impl MutablePathHandleGraph for HashGraph {
    fn create_path_handle(&mut self, name: &str) -> PathHandle {
        let path = self.paths.create(name);
        tracing::debug!(%path, name, "created path");
        path
    }

    fn destroy_path(&mut self, path: PathHandle) {
        let record = self.paths.remove(path);
        for (slot, handle) in record.iter() {
            self.occurrences.remove(handle.id(), OccurrenceHandle::new(path, slot));
        }
        tracing::debug!(%path, steps = record.len(), "destroyed path");
    }

    fn append_occurrence(&mut self, path: PathHandle, handle: Handle) -> OccurrenceHandle {
        self.assert_node(handle.id());
        let slot = self.paths.record_mut(path).push_back(handle);
        let occurrence = OccurrenceHandle::new(path, slot);
        self.occurrences.insert(handle.id(), occurrence);
        occurrence
    }

    fn prepend_occurrence(&mut self, path: PathHandle, handle: Handle) -> OccurrenceHandle {
        self.assert_node(handle.id());
        let slot = self.paths.record_mut(path).push_front(handle);
        let occurrence = OccurrenceHandle::new(path, slot);
        self.occurrences.insert(handle.id(), occurrence);
        occurrence
    }

    fn insert_occurrence_after(
        &mut self,
        path: PathHandle,
        after: Option<OccurrenceHandle>,
        handle: Handle,
    ) -> OccurrenceHandle {
        self.assert_node(handle.id());
        if let Some(after) = after {
            assert_eq!(after.path_handle(), path, "occurrence belongs to another path");
        }
        let slot = self.paths.record_mut(path).insert_after(handle, after.map(OccurrenceHandle::slot));
        let occurrence = OccurrenceHandle::new(path, slot);
        self.occurrences.insert(handle.id(), occurrence);
        occurrence
    }

    fn remove_occurrence(&mut self, occurrence: OccurrenceHandle) {
        let handle = self.paths.record_mut(occurrence.path_handle()).remove(occurrence.slot());
        self.occurrences.remove(handle.id(), occurrence);
    }
}

// ============================================================================
// Tests
// ============================================================================
