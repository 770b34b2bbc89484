//! This module contains a binary min-heap of search nodes ordered by their
//! F-cost, i.e. path cost so far plus heuristic to the goal.

use ahash::AHashMap;

/// ID of a search node. Nodes are owned by the search algorithm, the heap
/// only refers to them.
pub type NodeId = u32;

/// Array backed binary min-heap of search nodes keyed by F-cost.
///
/// Contrary to [`std::collections::BinaryHeap`], the key of an already
/// queued node might be changed with [`Self::restack`].
#[derive(Default)]
pub struct TriCellPathNodeHeap {
    entries: Vec<Entry>,
    /// Heap slot of each queued node.
    slots: AHashMap<NodeId, usize>,
}

impl TriCellPathNodeHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.slots.contains_key(&node)
    }

    /// Removes all nodes from the heap. Allocated memory is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
    }

    /// Pushes a node to the heap.
    ///
    /// # Panics
    ///
    /// Panics if the node is already in the heap.
    pub fn add(&mut self, node: NodeId, f: f32) {
        assert!(!self.contains(node), "Node {node} is already queued.");

        let slot = self.entries.len();
        self.entries.push(Entry { node, f });
        self.slots.insert(node, slot);
        self.sift_up(slot);
    }

    /// Returns the node with the smallest F-cost and its F-cost without
    /// removing it from the heap.
    pub fn peek(&self) -> Option<(NodeId, f32)> {
        self.entries.first().map(|entry| (entry.node, entry.f))
    }

    /// Removes and returns the node with the smallest F-cost.
    pub fn poll(&mut self) -> Option<NodeId> {
        if self.entries.is_empty() {
            return None;
        }

        let root = self.entries.swap_remove(0);
        self.slots.remove(&root.node);
        if !self.entries.is_empty() {
            self.slots.insert(self.entries[0].node, 0);
            self.sift_down(0);
        }
        Some(root.node)
    }

    /// Updates F-cost of an already queued node and moves it to the right
    /// place in the heap.
    ///
    /// Returns false (and does nothing) if the node is not in the heap.
    pub fn restack(&mut self, node: NodeId, f: f32) -> bool {
        let Some(&slot) = self.slots.get(&node) else {
            return false;
        };

        self.entries[slot].f = f;
        // The key either decreased or increased thus only one of the
        // directions may move the node.
        if self.sift_up(slot) == slot {
            self.sift_down(slot);
        }
        true
    }

    /// Moves the entry at `slot` towards the root while it is smaller than
    /// its parent. Returns the final slot of the entry.
    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.entries[slot].f >= self.entries[parent].f {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot
    }

    /// Moves the entry at `slot` towards the leaves while any of its children
    /// is smaller.
    fn sift_down(&mut self, mut slot: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;

            let mut smallest = slot;
            if left < len && self.entries[left].f < self.entries[smallest].f {
                smallest = left;
            }
            if right < len && self.entries[right].f < self.entries[smallest].f {
                smallest = right;
            }
            if smallest == slot {
                break;
            }

            self.swap(slot, smallest);
            slot = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.slots.insert(self.entries[a].node, a);
        self.slots.insert(self.entries[b].node, b);
    }
}

struct Entry {
    node: NodeId,
    f: f32,
}
