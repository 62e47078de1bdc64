//! # vgraph: Mutable Pangenome Variation Graph Storage
//!
//! A bidirected sequence graph with embedded paths. Nodes carry DNA
//! sequence, edges join node sides, and paths are named walks of oriented
//! node visits. Build and edit with `HashGraph`; hand consumers anything
//! that implements `HandleGraph` / `PathHandleGraph`.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: the graph contract is four traits; stores are interchangeable
//! 2. **Handles, not pointers**: every node view is a packed `u64`, every step a `(path, slot)` pair
//! 3. **Symmetric by construction**: each edge is stored on both sides it joins
//! 4. **Paths stay consistent**: flips and divisions rewrite every step they touch
//!
//! ## Quick Start
//!
//! ```rust
//! use vgraph::{HashGraph, HandleGraph, MutableHandleGraph, MutablePathHandleGraph, PathHandleGraph};
//!
//! let mut graph = HashGraph::new();
//! let a = graph.create_handle("GATT");
//! let b = graph.create_handle("ACA");
//! graph.create_edge(a, b);
//!
//! let path = graph.create_path_handle("ref");
//! graph.append_occurrence(path, a);
//! graph.append_occurrence(path, b);
//!
//! let parts = graph.divide_handle(a, &[2]);
//! assert_eq!(graph.get_sequence(parts[1]), "TT");
//! assert_eq!(graph.get_occurrence_count(path), 3);
//!
//! let mut bytes = Vec::new();
//! graph.serialize(&mut bytes)?;
//! # Ok::<(), vgraph::Error>(())
//! ```
//!
//! ## Graph Stores
//!
//! | Store | Mutable | Description |
//! |-------|---------|-------------|
//! | `HashGraph` | yes | Hash-map backed engine with binary persistence |
//! | `FrozenGraph` | no | Compacted snapshot of any path graph |
//! | `SharedGraph` | yes | `HashGraph` behind one reader/writer lock |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod config;
pub mod serialize;
pub mod algorithms;

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{Edge, Handle, NodeId, OccurrenceHandle, PathHandle};

pub use storage::{
    HandleGraph, PathHandleGraph, MutableHandleGraph, MutablePathHandleGraph,
    HashGraph, FrozenGraph, SharedGraph, GraphStats,
};

pub use config::GraphConfig;

pub use algorithms::topological_order;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Corrupt graph: {0}")]
    Corrupt(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
