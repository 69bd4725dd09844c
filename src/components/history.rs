// ============================================================================
// HISTORY MANAGER — snapshot-based undo/redo with a bounded depth
// ============================================================================
//
// Every history entry is a full snapshot of the layer sequence at a point in
// time.  The undo and redo stacks are disjoint; pushing a new entry always
// clears the redo stack, and the undo stack evicts its oldest entry beyond
// the cap.  Undo/redo on an empty stack is a defined no-op.

use std::collections::VecDeque;

use image::RgbaImage;

use crate::canvas::{Layer, LayerStore};

/// A captured layer: metadata plus a clone of the pixel buffer.
#[derive(Clone)]
pub struct LayerSnapshot {
    pub id: u64,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub pixels: Option<RgbaImage>,
}

/// Full snapshot of the layer store's ordered sequence.
#[derive(Clone)]
pub struct StoreSnapshot {
    pub width: u32,
    pub height: u32,
    pub active: usize,
    pub next_id: u64,
    pub layers: Vec<LayerSnapshot>,
}

impl StoreSnapshot {
    pub fn capture(store: &LayerStore) -> Self {
        Self {
            width: store.width,
            height: store.height,
            active: store.active,
            next_id: store.next_id(),
            layers: store
                .layers
                .iter()
                .map(|l| LayerSnapshot {
                    id: l.id,
                    name: l.name.clone(),
                    visible: l.visible,
                    opacity: l.opacity,
                    pixels: l.pixels.clone(),
                })
                .collect(),
        }
    }

    pub fn restore_into(&self, store: &mut LayerStore) {
        store.width = self.width;
        store.height = self.height;
        store.layers.clear();
        for snap in &self.layers {
            let mut layer = Layer::new(snap.id, snap.name.clone());
            layer.visible = snap.visible;
            layer.opacity = snap.opacity;
            layer.pixels = snap.pixels.clone();
            store.layers.push(layer);
        }
        store.active = self.active.min(store.layers.len().saturating_sub(1));
        store.set_next_id(self.next_id);
    }

    fn memory_bytes(&self) -> usize {
        self.layers
            .iter()
            .map(|l| {
                l.name.len()
                    + l.pixels
                        .as_ref()
                        .map_or(0, |p| p.as_raw().len())
            })
            .sum()
    }
}

/// Undo/redo history manager.  Depth-bounded; oldest entries evicted.
pub struct HistoryManager {
    undo_stack: VecDeque<StoreSnapshot>,
    redo_stack: VecDeque<StoreSnapshot>,
    cap: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(20)
    }
}

impl HistoryManager {
    pub fn new(cap: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    /// Record the pre-mutation state.  Call BEFORE applying a mutating
    /// operation to the store.  Clears the redo stack.
    pub fn push(&mut self, snapshot: StoreSnapshot) {
        self.redo_stack.clear();
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.cap {
            self.undo_stack.pop_front();
            crate::log_info!("history: cap {} reached, oldest entry evicted", self.cap);
        }
    }

    /// Restore the most recent snapshot.  Returns false (leaving the store
    /// untouched) when the undo stack is empty.
    pub fn undo(&mut self, store: &mut LayerStore) -> bool {
        let Some(snapshot) = self.undo_stack.pop_back() else {
            return false;
        };
        self.redo_stack.push_back(StoreSnapshot::capture(store));
        snapshot.restore_into(store);
        true
    }

    /// Inverse of `undo`.  No-op on an empty redo stack.
    pub fn redo(&mut self, store: &mut LayerStore) -> bool {
        let Some(snapshot) = self.redo_stack.pop_back() else {
            return false;
        };
        self.undo_stack.push_back(StoreSnapshot::capture(store));
        snapshot.restore_into(store);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Approximate memory held by both stacks (pixel bytes + names).
    pub fn memory_usage(&self) -> usize {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .map(|s| s.memory_bytes())
            .sum()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Paint the whole active layer a marker color, with history discipline.
    fn mutate(store: &mut LayerStore, history: &mut HistoryManager, marker: u8) {
        history.push(StoreSnapshot::capture(store));
        let id = store.active_layer_id().unwrap();
        let buf = RgbaImage::from_pixel(store.width, store.height, Rgba([marker, 0, 0, 255]));
        store.overwrite_pixels(id, buf);
    }

    fn marker_of(store: &LayerStore) -> Option<u8> {
        store
            .active_layer()
            .and_then(|l| l.pixels.as_ref())
            .map(|p| p.get_pixel(0, 0)[0])
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut store = LayerStore::new(4, 4);
        let mut history = HistoryManager::new(20);
        mutate(&mut store, &mut history, 10);
        mutate(&mut store, &mut history, 20);
        assert_eq!(marker_of(&store), Some(20));

        assert!(history.undo(&mut store));
        assert_eq!(marker_of(&store), Some(10));
        assert!(history.redo(&mut store));
        assert_eq!(marker_of(&store), Some(20));
    }

    #[test]
    fn round_trip_at_depth() {
        let mut store = LayerStore::new(4, 4);
        let mut history = HistoryManager::new(20);
        for m in 1..=15u8 {
            mutate(&mut store, &mut history, m);
        }
        for _ in 0..7 {
            assert!(history.undo(&mut store));
        }
        assert_eq!(marker_of(&store), Some(8));
        for _ in 0..7 {
            assert!(history.redo(&mut store));
        }
        assert_eq!(marker_of(&store), Some(15));
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut store = LayerStore::new(4, 4);
        let mut history = HistoryManager::new(20);
        assert!(!history.undo(&mut store));
        assert!(!history.redo(&mut store));
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn push_clears_redo() {
        let mut store = LayerStore::new(4, 4);
        let mut history = HistoryManager::new(20);
        mutate(&mut store, &mut history, 1);
        mutate(&mut store, &mut history, 2);
        history.undo(&mut store);
        assert!(history.can_redo());
        mutate(&mut store, &mut history, 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn cap_evicts_oldest_and_bottoms_out() {
        let mut store = LayerStore::new(4, 4);
        let mut history = HistoryManager::new(20);
        // 25 mutations; the stack retains the pre-states of the last 20.
        for m in 1..=25u8 {
            mutate(&mut store, &mut history, m);
        }
        assert_eq!(history.undo_count(), 20);

        // 20 undos reach the oldest retained snapshot; the 21st is a no-op.
        for _ in 0..20 {
            assert!(history.undo(&mut store));
        }
        assert_eq!(marker_of(&store), Some(5));
        assert!(!history.undo(&mut store));
        assert_eq!(marker_of(&store), Some(5));
    }

    #[test]
    fn snapshot_restores_layer_structure() {
        let mut store = LayerStore::new(4, 4);
        let mut history = HistoryManager::new(20);
        history.push(StoreSnapshot::capture(&store));
        store.add_layer();
        store.add_layer();
        assert_eq!(store.layers.len(), 3);
        history.undo(&mut store);
        assert_eq!(store.layers.len(), 1);
        history.redo(&mut store);
        assert_eq!(store.layers.len(), 3);
    }
}
