//! Thread-shared handle to a [`HashGraph`].
//!
//! One `RwLock` guards the whole graph, so each closure passed to
//! [`write`](SharedGraph::write) runs as one atomic edit: readers never see
//! half-mirrored edges or a path mid-division.
//!
//! ## Limitations
//!
//! - **Coarse lock**: a writer blocks every reader for the whole closure.
//! - **No re-entrancy**: calling `write` from inside `read` or `write` on the
//!   same handle deadlocks.

use std::sync::Arc;

use parking_lot::RwLock;

use super::HashGraph;

#[derive(Debug, Clone, Default)]
pub struct SharedGraph {
    inner: Arc<RwLock<HashGraph>>,
}

impl SharedGraph {
    pub fn new(graph: HashGraph) -> Self {
        Self { inner: Arc::new(RwLock::new(graph)) }
    }

    /// Run `f` under the shared lock.
    pub fn read<T>(&self, f: impl FnOnce(&HashGraph) -> T) -> T {
        f(&self.inner.read())
    }

    /// Run `f` under the exclusive lock.
    pub fn write<T>(&self, f: impl FnOnce(&mut HashGraph) -> T) -> T {
        f(&mut self.inner.write())
    }

    /// Copy of the graph as it is now.
    pub fn snapshot(&self) -> HashGraph {
        self.inner.read().clone()
    }

    /// The graph, if this is the last handle.
    pub fn into_inner(self) -> Option<HashGraph> {
        Arc::try_unwrap(self.inner).ok().map(RwLock::into_inner)
    }
}

impl From<HashGraph> for SharedGraph {
    fn from(graph: HashGraph) -> Self {
        Self::new(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HandleGraph, MutableHandleGraph, MutablePathHandleGraph, PathHandleGraph};
    use std::thread;

    #[test]
    fn test_concurrent_writers_and_readers() {
        let shared = SharedGraph::default();
        let path = shared.write(|g| g.create_path_handle("log"));

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        shared.write(|g| {
                            let h = g.create_handle("ACGT");
                            g.append_occurrence(path, h);
                        });
                    }
                })
            })
            .collect();
        let reader = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    shared.read(|g| {
                        assert_eq!(g.node_count(), g.get_occurrence_count(path));
                    });
                }
            })
        };
        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        let graph = shared.into_inner().unwrap();
        assert_eq!(graph.node_count(), 100);
        graph.validate().unwrap();
    }

    #[test]
    fn test_snapshot_is_detached() {
        let shared = SharedGraph::from(HashGraph::new());
        shared.write(|g| g.create_handle("A"));
        let snapshot = shared.snapshot();
        shared.write(|g| g.create_handle("C"));
        assert_eq!(snapshot.node_count(), 1);
        assert_eq!(shared.read(|g| g.node_count()), 2);
        assert!(shared.clone().into_inner().is_none());
    }
}
