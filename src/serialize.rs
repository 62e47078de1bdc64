//! Binary persistence for [`HashGraph`].
//!
//! All integers are big-endian. Handles are written in their raw encoding
//! as signed 64-bit values.
//!
//! ```text
//! max_id: i64  min_id: i64  next_path_id: i64
//! node_count: u64
//!   node_id: i64
//!   seq_len: u64   seq_bytes[seq_len]
//!   left_count: u64   left[left_count]: i64
//!   right_count: u64  right[right_count]: i64
//! path_count: u64
//!   path_id: i64
//!   name_len: u64  name_bytes[name_len]
//!   step_count: u64  steps[step_count]: i64
//! ```
//!
//! Writers emit nodes and paths in ascending id order, so equal graphs
//! produce identical bytes. Readers accept any order. The occurrence index
//! is not stored; it is rebuilt from the paths.

use std::io::{self, Read, Write};

use crate::config::GraphConfig;
use crate::model::{Handle, NodeId, PathHandle};
use crate::storage::node_store::{EdgeList, NodeRecord};
use crate::storage::path_store::PathRecord;
use crate::storage::{HashGraph, MutableHandleGraph};
use crate::{Error, Result};

/// Upper bound on capacity reserved up front from a length read off the wire.
const MAX_PREALLOC: usize = 1 << 16;

// ============================================================================
// Primitive codec
// ============================================================================

fn write_u64<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    write_u64(writer, bytes.len() as u64)?;
    writer.write_all(bytes)
}

fn write_handles<W: Write>(writer: &mut W, handles: &[Handle]) -> io::Result<()> {
    write_u64(writer, handles.len() as u64)?;
    for handle in handles {
        write_u64(writer, handle.as_integer())?;
    }
    Ok(())
}

fn read_word<R: Read>(reader: &mut R) -> io::Result<[u8; 8]> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read a signed value that must not be negative.
fn read_non_negative<R: Read>(reader: &mut R, what: &str) -> Result<u64> {
    let value = i64::from_be_bytes(read_word(reader)?);
    u64::try_from(value).map_err(|_| Error::Format(format!("negative {what}: {value}")))
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = u64::from_be_bytes(read_word(reader)?);
    if i64::try_from(value).is_err() {
        return Err(Error::Format(format!("{what} {value} exceeds the signed range")));
    }
    usize::try_from(value).map_err(|_| Error::Format(format!("{what} {value} does not fit in memory")))
}

fn read_string<R: Read>(reader: &mut R, what: &str) -> Result<String> {
    let len = read_count(reader, what)?;
    let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOC));
    let read = reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if read != len {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{what} truncated after {read} of {len} bytes"),
        )));
    }
    String::from_utf8(bytes).map_err(|_| Error::Format(format!("{what} is not valid UTF-8")))
}

fn read_handle<R: Read>(reader: &mut R) -> Result<Handle> {
    let raw = read_non_negative(reader, "handle")?;
    let handle = Handle::from_integer(raw);
    if !handle.id().is_valid() {
        return Err(Error::Format(format!("handle {raw} encodes an invalid node id")));
    }
    Ok(handle)
}

fn read_handles<R: Read>(reader: &mut R, what: &str) -> Result<Vec<Handle>> {
    let count = read_count(reader, what)?;
    let mut handles = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        handles.push(read_handle(reader)?);
    }
    Ok(handles)
}

// ============================================================================
// HashGraph persistence
// ============================================================================

impl HashGraph {
    /// Write the whole graph to `writer`.
    #[tracing::instrument(skip_all)]
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_u64(writer, self.nodes.max_id().0)?;
        write_u64(writer, self.nodes.min_id().0)?;
        write_u64(writer, self.paths.next_path_id())?;

        let mut ids: Vec<NodeId> = self.nodes.ids().collect();
        ids.sort_unstable();
        write_u64(writer, ids.len() as u64)?;
        for id in ids {
            let record = self.nodes.record(id);
            write_u64(writer, id.0)?;
            write_bytes(writer, record.sequence.as_bytes())?;
            write_handles(writer, &record.left_edges)?;
            write_handles(writer, &record.right_edges)?;
        }

        let mut paths: Vec<&PathRecord> = self.paths.records().collect();
        paths.sort_unstable_by_key(|record| record.id());
        write_u64(writer, paths.len() as u64)?;
        for record in paths {
            write_u64(writer, record.id().0)?;
            write_bytes(writer, record.name().as_bytes())?;
            write_u64(writer, record.len() as u64)?;
            for (_, handle) in record.iter() {
                write_u64(writer, handle.as_integer())?;
            }
        }
        writer.flush()?;

        let stats = self.stats();
        tracing::info!(
            nodes = stats.node_count,
            edges = stats.edge_count,
            paths = stats.path_count,
            steps = stats.occurrence_count,
            "serialized graph"
        );
        Ok(())
    }

    /// Replace the contents of this graph with one read from `reader`.
    ///
    /// The graph is cleared first; on error it is left empty.
    #[tracing::instrument(skip_all)]
    pub fn deserialize<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        self.clear();
        if let Err(e) = self.read_contents(reader) {
            self.clear();
            return Err(e);
        }
        if self.config().validate_on_load {
            if let Err(e) = self.validate() {
                self.clear();
                return Err(e);
            }
        }

        let stats = self.stats();
        tracing::info!(
            nodes = stats.node_count,
            edges = stats.edge_count,
            paths = stats.path_count,
            steps = stats.occurrence_count,
            "loaded graph"
        );
        Ok(())
    }

    /// Build a graph with `config` and load it from `reader`.
    pub fn from_reader<R: Read>(reader: &mut R, config: GraphConfig) -> Result<Self> {
        let mut graph = HashGraph::with_config(config)?;
        graph.deserialize(reader)?;
        Ok(graph)
    }

    fn read_contents<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let max_id = NodeId(read_non_negative(reader, "max id")?);
        let min_id = NodeId(read_non_negative(reader, "min id")?);
        let next_path_id = read_non_negative(reader, "next path id")?;

        let node_count = read_count(reader, "node count")?;
        for _ in 0..node_count {
            let id = NodeId(read_non_negative(reader, "node id")?);
            if !id.is_valid() {
                return Err(Error::Format(format!("node id {id} is out of range")));
            }
            if self.nodes.contains(id) {
                return Err(Error::Format(format!("duplicate node id {id}")));
            }
            let sequence = read_string(reader, "sequence")?;
            if !sequence.is_ascii() {
                return Err(Error::Format(format!("sequence of node {id} is not ASCII")));
            }
            let left_edges: EdgeList = read_handles(reader, "left edge count")?.into_iter().collect();
            let right_edges: EdgeList = read_handles(reader, "right edge count")?.into_iter().collect();
            self.nodes.insert(id, NodeRecord { sequence, left_edges, right_edges });
        }

        let path_count = read_count(reader, "path count")?;
        for _ in 0..path_count {
            let id = PathHandle(read_non_negative(reader, "path id")?);
            let name = read_string(reader, "path name")?;
            if self.paths.contains(id) {
                return Err(Error::Format(format!("duplicate path id {id}")));
            }
            if self.paths.by_name(&name).is_some() {
                return Err(Error::Format(format!("duplicate path name {name:?}")));
            }
            let step_count = read_count(reader, "step count")?;
            let mut record = PathRecord::new(id, name);
            for _ in 0..step_count {
                record.push_back(read_handle(reader)?);
            }
            self.paths.insert(record);
        }

        // keep stored watermarks, but never below what the contents require
        let (mut low, mut high) = (min_id, max_id);
        for id in self.nodes.ids() {
            low = low.min(id);
            high = high.max(id);
        }
        self.nodes.set_watermarks(low, high);
        self.paths.set_next_path_id(self.paths.next_path_id().max(next_path_id));
        self.rebuild_occurrence_index();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::node_store::EMPTY_MIN_ID;
    use crate::{HandleGraph, MutableHandleGraph, MutablePathHandleGraph, PathHandleGraph};
    use pretty_assertions::assert_eq;

    fn to_bytes(g: &HashGraph) -> Vec<u8> {
        let mut bytes = Vec::new();
        g.serialize(&mut bytes).unwrap();
        bytes
    }

    fn load(bytes: &[u8]) -> Result<HashGraph> {
        HashGraph::from_reader(&mut &bytes[..], GraphConfig::default())
    }

    #[test]
    fn test_empty_graph_layout() {
        let bytes = to_bytes(&HashGraph::new());
        let mut expected = Vec::new();
        expected.extend_from_slice(&0i64.to_be_bytes());
        expected.extend_from_slice(&(EMPTY_MIN_ID.0 as i64).to_be_bytes());
        expected.extend_from_slice(&1i64.to_be_bytes());
        expected.extend_from_slice(&0u64.to_be_bytes());
        expected.extend_from_slice(&0u64.to_be_bytes());
        assert_eq!(bytes, expected);

        let g = load(&bytes).unwrap();
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.min_node_id(), EMPTY_MIN_ID);
    }

    #[test]
    fn test_single_node_layout() {
        let mut g = HashGraph::new();
        g.create_handle("ACG");
        let bytes = to_bytes(&g);
        // header 32, node id 8, seq len 8 + 3, two empty edge lists 16, path count 8
        assert_eq!(bytes.len(), 32 + 8 + 11 + 16 + 8);
        assert_eq!(&bytes[24..32], &1u64.to_be_bytes());
        assert_eq!(&bytes[48..51], b"ACG");
    }

    #[test]
    fn test_round_trip_is_byte_stable() {
        let mut g = HashGraph::new();
        let a = g.create_handle("GATT");
        let b = g.create_handle("ACA");
        let c = g.create_handle("T");
        g.create_edge(a, b.flip());
        g.create_edge(b.flip(), c);
        g.create_edge(c, c.flip());
        let p = g.create_path_handle("ref");
        g.append_occurrence(p, a);
        g.append_occurrence(p, b.flip());
        g.append_occurrence(p, c);
        let q = g.create_path_handle("alt");
        g.destroy_path(q);

        let bytes = to_bytes(&g);
        let loaded = load(&bytes).unwrap();
        assert_eq!(to_bytes(&loaded), bytes);
        assert_eq!(loaded.path_steps(p), vec![a, b.flip(), c]);
        assert_eq!(loaded.occurrences_of_handle(b, false).len(), 1);

        let mut fresh = HashGraph::from_reader(&mut &bytes[..], GraphConfig::default()).unwrap();
        assert_eq!(fresh.create_path_handle("next"), PathHandle(3));
        assert_eq!(fresh.create_handle("A").id(), NodeId(4));
    }

    #[test]
    fn test_truncated_input_is_io_error() {
        let mut g = HashGraph::new();
        g.create_handle("GATTACA");
        let bytes = to_bytes(&g);
        for cut in [4, 40, 50, bytes.len() - 1] {
            match load(&bytes[..cut]) {
                Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
                other => panic!("cut at {cut}: expected Io error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_negative_node_id_rejected() {
        let mut bytes = to_bytes(&{
            let mut g = HashGraph::new();
            g.create_handle("A");
            g
        });
        bytes[32..40].copy_from_slice(&(-3i64).to_be_bytes());
        assert!(matches!(load(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn test_duplicate_path_name_rejected() {
        let mut g = HashGraph::new();
        g.create_path_handle("x");
        g.create_path_handle("y");
        let mut bytes = to_bytes(&g);
        let last = bytes.iter().rposition(|&b| b == b'y').unwrap();
        bytes[last] = b'x';
        assert!(matches!(load(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn test_asymmetric_edges_fail_validation() {
        let mut g = HashGraph::new();
        let a = g.create_handle("A");
        let b = g.create_handle("C");
        g.create_edge(a, b);
        let mut bytes = to_bytes(&g);
        // drop the single left edge of node 2
        let node2 = 32 + 8 + 8 + 1 + 8 + 8 + 8;
        let left_count = node2 + 8 + 8 + 1;
        bytes[left_count..left_count + 8].copy_from_slice(&0u64.to_be_bytes());
        bytes.drain(left_count + 8..left_count + 16);

        assert!(matches!(load(&bytes), Err(Error::Corrupt(_))));
        let unchecked = HashGraph::from_reader(
            &mut &bytes[..],
            GraphConfig::default().with_validate_on_load(false),
        )
        .unwrap();
        assert!(unchecked.validate().is_err());
    }

    #[test]
    fn test_deserialize_clears_previous_state() {
        let mut source = HashGraph::new();
        source.create_handle("A");
        let bytes = to_bytes(&source);

        let mut target = HashGraph::new();
        for _ in 0..5 {
            target.create_handle("C");
        }
        target.create_path_handle("old");
        target.deserialize(&mut &bytes[..]).unwrap();
        assert_eq!(target.node_count(), 1);
        assert_eq!(target.get_path_count(), 0);
        assert_eq!(target.max_node_id(), NodeId(1));
    }
}
