//! Graph algorithms over the read-only contract.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};

use crate::model::{Handle, NodeId};
use crate::storage::HandleGraph;

/// Order every node once, each in an orientation, so that edges point
/// forward wherever the graph allows.
///
/// Kahn's algorithm over oriented handles. Seeds are the forward handles of
/// nodes with nothing on their left, in ascending id order. When only cycles
/// remain, the lowest unvisited id is seeded in the orientation it was first
/// reached, or forward if nothing reached it.
pub fn topological_order<G: HandleGraph>(graph: &G) -> Vec<Handle> {
    let mut ids = Vec::with_capacity(graph.node_count());
    graph.for_each_handle(|handle| {
        ids.push(handle.id());
        true
    });
    ids.sort_unstable();

    let mut queue: VecDeque<Handle> = ids
        .iter()
        .map(|&id| Handle::forward(id))
        .filter(|&handle| graph.get_degree(handle, true) == 0)
        .collect();
    let mut visited: HashSet<NodeId> = HashSet::with_capacity(ids.len());
    let mut reached: HashMap<NodeId, Handle> = HashMap::new();
    let mut remaining: HashMap<Handle, usize> = HashMap::new();
    let mut order = Vec::with_capacity(ids.len());
    let mut unvisited = ids.iter();

    while order.len() < ids.len() {
        let Some(handle) = queue.pop_front() else {
            let Some(&seed) = unvisited.find(|id| !visited.contains(*id)) else {
                break;
            };
            let handle = reached.get(&seed).copied().unwrap_or(Handle::forward(seed));
            tracing::trace!(%handle, "seeding cycle");
            queue.push_back(handle);
            continue;
        };
        if !visited.insert(handle.id()) {
            continue;
        }
        order.push(handle);
        graph.follow_edges(handle, false, |next| {
            if visited.contains(&next.id()) {
                return true;
            }
            reached.entry(next.id()).or_insert(next);
            let left = remaining
                .entry(next)
                .or_insert_with(|| graph.get_degree(next, true));
            *left = left.saturating_sub(1);
            if *left == 0 {
                queue.push_back(next);
            }
            true
        });
    }
    order
}
