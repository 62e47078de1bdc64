//! Path store: named, doubly linked step lists.
//!
//! Each path owns an arena of step slots. Links are slot indices, so
//! splicing is O(1) and an [`OccurrenceHandle`](crate::OccurrenceHandle)
//! (path id + slot) stays valid until its own step is removed. Freed slots
//! are recycled.

use hashbrown::HashMap;

use crate::model::{Handle, PathHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    handle: Handle,
    prev: Option<usize>,
    next: Option<usize>,
}

// ============================================================================
// PathRecord
// ============================================================================

#[derive(Debug, Clone)]
pub struct PathRecord {
    id: PathHandle,
    name: String,
    slots: Vec<Option<Step>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    count: usize,
}

impl PathRecord {
    pub fn new(id: PathHandle, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            count: 0,
        }
    }

    pub fn id(&self) -> PathHandle {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    fn step(&self, slot: usize) -> &Step {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("path {} has no live step in slot {slot}", self.id))
    }

    fn step_mut(&mut self, slot: usize) -> &mut Step {
        let id = self.id;
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("path {id} has no live step in slot {slot}"))
    }

    pub fn handle_at(&self, slot: usize) -> Handle {
        self.step(slot).handle
    }

    pub fn set_handle(&mut self, slot: usize, handle: Handle) {
        self.step_mut(slot).handle = handle;
    }

    pub fn next(&self, slot: usize) -> Option<usize> {
        self.step(slot).next
    }

    pub fn prev(&self, slot: usize) -> Option<usize> {
        self.step(slot).prev
    }

    fn alloc(&mut self, step: Step) -> usize {
        self.count += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(step);
                slot
            }
            None => {
                self.slots.push(Some(step));
                self.slots.len() - 1
            }
        }
    }

    pub fn push_back(&mut self, handle: Handle) -> usize {
        let tail = self.tail;
        self.insert_after(handle, tail)
    }

    pub fn push_front(&mut self, handle: Handle) -> usize {
        self.insert_after(handle, None)
    }

    /// Insert after `after`, or at the head when `after` is `None`.
    pub fn insert_after(&mut self, handle: Handle, after: Option<usize>) -> usize {
        let next = match after {
            Some(slot) => self.step(slot).next,
            None => self.head,
        };
        let slot = self.alloc(Step { handle, prev: after, next });
        match after {
            Some(prev) => self.step_mut(prev).next = Some(slot),
            None => self.head = Some(slot),
        }
        match next {
            Some(next) => self.step_mut(next).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        slot
    }

    /// Splice a step out and free its slot. Returns the step's handle.
    pub fn remove(&mut self, slot: usize) -> Handle {
        let Step { handle, prev, next } = *self.step(slot);
        match prev {
            Some(prev) => self.step_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.step_mut(next).prev = prev,
            None => self.tail = prev,
        }
        self.slots[slot] = None;
        self.free.push(slot);
        self.count -= 1;
        handle
    }

    /// Steps in path order as `(slot, handle)`.
    pub fn iter(&self) -> PathIter<'_> {
        PathIter { path: self, cursor: self.head }
    }
}

pub struct PathIter<'a> {
    path: &'a PathRecord,
    cursor: Option<usize>,
}

impl Iterator for PathIter<'_> {
    type Item = (usize, Handle);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let step = self.path.step(slot);
        self.cursor = step.next;
        Some((slot, step.handle))
    }
}

// ============================================================================
// PathStore
// ============================================================================

/// All paths, the name → id registry and the next-id counter.
#[derive(Debug, Clone)]
pub struct PathStore {
    paths: HashMap<PathHandle, PathRecord>,
    by_name: HashMap<String, PathHandle>,
    next_path_id: u64,
}

impl Default for PathStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PathStore {
    pub fn new() -> Self {
        Self {
            paths: HashMap::new(),
            by_name: HashMap::new(),
            next_path_id: 1,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn next_path_id(&self) -> u64 {
        self.next_path_id
    }

    pub fn set_next_path_id(&mut self, next: u64) {
        self.next_path_id = next;
    }

    pub fn create(&mut self, name: &str) -> PathHandle {
        assert!(!self.by_name.contains_key(name), "a path named {name:?} already exists");
        let id = PathHandle(self.next_path_id);
        self.next_path_id += 1;
        self.by_name.insert(name.to_string(), id);
        self.paths.insert(id, PathRecord::new(id, name));
        id
    }

    /// Register an already built record, keeping its id.
    pub fn insert(&mut self, record: PathRecord) {
        assert!(!self.by_name.contains_key(record.name()), "a path named {:?} already exists", record.name());
        assert!(!self.paths.contains_key(&record.id()), "path id {} is already in use", record.id());
        self.next_path_id = self.next_path_id.max(record.id().0 + 1);
        self.by_name.insert(record.name().to_string(), record.id());
        self.paths.insert(record.id(), record);
    }

    pub fn remove(&mut self, path: PathHandle) -> PathRecord {
        let record = self.paths.remove(&path).unwrap_or_else(|| panic!("no path with id {path}"));
        self.by_name.remove(record.name());
        record
    }

    pub fn contains(&self, path: PathHandle) -> bool {
        self.paths.contains_key(&path)
    }

    pub fn record(&self, path: PathHandle) -> &PathRecord {
        self.paths.get(&path).unwrap_or_else(|| panic!("no path with id {path}"))
    }

    pub fn record_mut(&mut self, path: PathHandle) -> &mut PathRecord {
        self.paths.get_mut(&path).unwrap_or_else(|| panic!("no path with id {path}"))
    }

    pub fn by_name(&self, name: &str) -> Option<PathHandle> {
        self.by_name.get(name).copied()
    }

    pub fn records(&self) -> impl Iterator<Item = &PathRecord> + '_ {
        self.paths.values()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;
    use pretty_assertions::assert_eq;

    fn h(id: u64) -> Handle {
        Handle::forward(NodeId(id))
    }

    fn collect(path: &PathRecord) -> Vec<Handle> {
        path.iter().map(|(_, handle)| handle).collect()
    }

    #[test]
    fn test_push_and_insert_keep_links() {
        let mut path = PathRecord::new(PathHandle(1), "ref");
        let a = path.push_back(h(1));
        path.push_back(h(3));
        path.insert_after(h(2), Some(a));
        path.push_front(h(0));
        assert_eq!(collect(&path), vec![h(0), h(1), h(2), h(3)]);
        assert_eq!(path.len(), 4);
        assert_eq!(path.prev(path.head().unwrap()), None);
        assert_eq!(path.handle_at(path.tail().unwrap()), h(3));
    }

    #[test]
    fn test_remove_splices_and_recycles_slots() {
        let mut path = PathRecord::new(PathHandle(1), "ref");
        let a = path.push_back(h(1));
        let b = path.push_back(h(2));
        let c = path.push_back(h(3));
        assert_eq!(path.remove(b), h(2));
        assert_eq!(path.next(a), Some(c));
        assert_eq!(path.prev(c), Some(a));

        let reused = path.push_back(h(4));
        assert_eq!(reused, b);
        assert_eq!(collect(&path), vec![h(1), h(3), h(4)]);

        path.remove(a);
        path.remove(c);
        path.remove(reused);
        assert!(path.is_empty());
        assert_eq!(path.head(), None);
        assert_eq!(path.tail(), None);
    }

    #[test]
    fn test_store_ids_are_never_reused() {
        let mut store = PathStore::new();
        let p1 = store.create("a");
        let p2 = store.create("b");
        store.remove(p1);
        let p3 = store.create("a");
        assert_eq!((p1, p2, p3), (PathHandle(1), PathHandle(2), PathHandle(3)));
        assert_eq!(store.by_name("a"), Some(p3));
        assert_eq!(store.len(), 2);
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn test_duplicate_name_panics() {
        let mut store = PathStore::new();
        store.create("a");
        store.create("a");
    }
}
