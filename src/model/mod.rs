//! # Graph Model
//!
//! Value types shared by every layer: handles, ids, edges and sequence
//! helpers. This module is pure data with no storage or I/O.

pub mod handle;
pub mod sequence;

pub use handle::{Edge, Handle, NodeId, OccurrenceHandle, PathHandle};
pub use sequence::{complement, reverse_complement};
