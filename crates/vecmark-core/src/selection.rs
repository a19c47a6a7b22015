//! Selection state, kept separate from document content.
//!
//! The selection holds top-level ids in document z-order. Selecting an
//! element that sits inside a group selects the group; the manager
//! normalizes ids by walking the parent chain. Observers are notified
//! once per effective change, with the delta and the new selection.

use crate::document::Document;
use crate::elements::ElementId;
use kurbo::{Point, Rect};
use std::collections::HashMap;

/// How a new pick combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Drop the old selection, select only the picked elements.
    #[default]
    Replace,
    /// Add picked elements to the selection.
    Add,
    /// Flip membership of each picked element.
    Toggle,
    /// Remove picked elements from the selection.
    Subtract,
}

/// Delta handed to observers after the selection changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub selected: Vec<ElementId>,
    pub deselected: Vec<ElementId>,
    pub current: Vec<ElementId>,
}

type Observer = Box<dyn FnMut(&SelectionChange)>;

#[derive(Default)]
pub struct SelectionManager {
    current: Vec<ElementId>,
    named: HashMap<String, Vec<ElementId>>,
    observers: Vec<Observer>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected top-level ids, in document z-order.
    pub fn selected(&self) -> &[ElementId] {
        &self.current
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.current.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Register an observer. Observers outlive individual changes and
    /// are called synchronously after each effective change.
    pub fn subscribe(&mut self, observer: impl FnMut(&SelectionChange) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Apply a pick. Ids inside groups are lifted to their top-level
    /// root, unknown ids are dropped, and the result keeps z-order.
    pub fn select(&mut self, document: &Document, ids: &[ElementId], mode: SelectionMode) {
        let picked = normalize(document, ids);
        let next = match mode {
            SelectionMode::Replace => picked,
            SelectionMode::Add => {
                let mut next = self.current.clone();
                for id in picked {
                    if !next.contains(&id) {
                        next.push(id);
                    }
                }
                next
            }
            SelectionMode::Toggle => {
                let mut next = self.current.clone();
                for id in picked {
                    match next.iter().position(|c| *c == id) {
                        Some(index) => {
                            next.remove(index);
                        }
                        None => next.push(id),
                    }
                }
                next
            }
            SelectionMode::Subtract => self
                .current
                .iter()
                .copied()
                .filter(|c| !picked.contains(c))
                .collect(),
        };
        self.apply(document, next);
    }

    /// Pick the frontmost element under a scene point.
    pub fn select_at_point(
        &mut self,
        document: &Document,
        point: Point,
        tolerance: f64,
        mode: SelectionMode,
    ) {
        match document.top_hit(point, tolerance) {
            Some(id) => self.select(document, &[id], mode),
            None if mode == SelectionMode::Replace => self.clear(),
            None => {}
        }
    }

    /// Marquee pick: every top-level element intersecting the rect.
    pub fn select_in_rect(&mut self, document: &Document, rect: Rect, mode: SelectionMode) {
        let hits = document.elements_in_rect(rect);
        if hits.is_empty() && mode == SelectionMode::Replace {
            self.clear();
        } else {
            self.select(document, &hits, mode);
        }
    }

    pub fn select_all(&mut self, document: &Document) {
        self.apply(document, document.z_order().to_vec());
    }

    pub fn clear(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let deselected = std::mem::take(&mut self.current);
        self.notify(deselected, Vec::new());
    }

    /// Drop selected ids that no longer exist in the document. Called
    /// after destructive edits and after undo/redo.
    pub fn prune(&mut self, document: &Document) {
        let (kept, dropped): (Vec<ElementId>, Vec<ElementId>) = self
            .current
            .iter()
            .copied()
            .partition(|id| document.contains(*id) && document.parent_of(*id).is_none());
        if dropped.is_empty() {
            return;
        }
        self.current = kept;
        self.notify(dropped, Vec::new());
    }

    // Named selections. Stored by value; ids that died since the save
    // are skipped on restore.

    pub fn save_named(&mut self, name: impl Into<String>) {
        self.named.insert(name.into(), self.current.clone());
    }

    /// Restore a named selection. Returns false if the name is unknown.
    pub fn restore_named(&mut self, document: &Document, name: &str) -> bool {
        let Some(ids) = self.named.get(name).cloned() else {
            return false;
        };
        self.select(document, &ids, SelectionMode::Replace);
        true
    }

    pub fn delete_named(&mut self, name: &str) -> bool {
        self.named.remove(name).is_some()
    }

    pub fn named_selections(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    fn apply(&mut self, document: &Document, mut next: Vec<ElementId>) {
        // Keep z-order so multi-element operations are deterministic.
        next.sort_by_key(|id| document.z_index(*id).unwrap_or(usize::MAX));
        next.dedup();
        if next == self.current {
            return;
        }
        let deselected: Vec<ElementId> = self
            .current
            .iter()
            .copied()
            .filter(|id| !next.contains(id))
            .collect();
        let selected: Vec<ElementId> = next
            .iter()
            .copied()
            .filter(|id| !self.current.contains(id))
            .collect();
        self.current = next;
        self.notify(deselected, selected);
    }

    fn notify(&mut self, deselected: Vec<ElementId>, selected: Vec<ElementId>) {
        let change = SelectionChange {
            selected,
            deselected,
            current: self.current.clone(),
        };
        for observer in &mut self.observers {
            observer(&change);
        }
    }
}

/// Lift each id to its top-level root and drop ids the document does
/// not know.
fn normalize(document: &Document, ids: &[ElementId]) -> Vec<ElementId> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !document.contains(*id) {
            continue;
        }
        let mut root = *id;
        while let Some(parent) = document.parent_of(root) {
            root = parent;
        }
        if !out.contains(&root) {
            out.push(root);
        }
    }
    out
}
