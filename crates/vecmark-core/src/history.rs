//! Undo/redo built on self-contained state snapshots.
//!
//! Every action stores serialized before/after snapshots of the elements
//! it touched, so applying an entry never depends on live object
//! references: an element deleted and later restored by undo is
//! reconstructed from its record through the factory, id included.
//! Applying the after-state is idempotent, which makes redo the same
//! code path as the initial execution.

use crate::document::Document;
use crate::elements::ElementId;
use crate::factory::{ElementFactory, FactoryError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// What an action did, for toolbars and history panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddElement,
    RemoveElement,
    ModifyElement,
    MoveElement,
    ResizeElement,
    ChangeProperty,
    GroupElements,
    UngroupElements,
    SetBackground,
    ClearCanvas,
}

/// One element's state at a point in time. `record: None` means the
/// element does not exist in that state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: ElementId,
    pub record: Option<Value>,
    /// Position among siblings (document z-order or the parent group's
    /// child order).
    #[serde(default)]
    pub z_index: usize,
    #[serde(default)]
    pub parent: Option<ElementId>,
}

impl ElementSnapshot {
    /// Capture the current state of an element; captures absence if the
    /// id is unknown.
    pub fn capture(document: &Document, factory: &ElementFactory, id: ElementId) -> Self {
        let Some(element) = document.get(id) else {
            return Self::absent(id);
        };
        let parent = document.parent_of(id);
        let z_index = match parent {
            None => document.z_index(id).unwrap_or(0),
            Some(parent_id) => document
                .get(parent_id)
                .and_then(|p| p.as_group())
                .and_then(|g| g.children.iter().position(|c| *c == id))
                .unwrap_or(0),
        };
        Self {
            id,
            record: Some(factory.to_record(element)),
            z_index,
            parent,
        }
    }

    pub fn absent(id: ElementId) -> Self {
        Self {
            id,
            record: None,
            z_index: 0,
            parent: None,
        }
    }
}

/// Capture an element and all its descendants, root first.
pub fn snapshot_subtree(
    document: &Document,
    factory: &ElementFactory,
    id: ElementId,
) -> Vec<ElementSnapshot> {
    let mut snaps = Vec::new();
    let mut stack = vec![id];
    while let Some(next) = stack.pop() {
        snaps.push(ElementSnapshot::capture(document, factory, next));
        if let Some(group) = document.get(next).and_then(|e| e.as_group()) {
            stack.extend(group.children.iter().copied());
        }
    }
    snaps
}

/// Change to the document background reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundChange {
    pub before: Option<String>,
    pub after: Option<String>,
}

/// A single undoable action: before/after snapshots of the elements it
/// touched, plus an optional background change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub description: String,
    pub before: Vec<ElementSnapshot>,
    pub after: Vec<ElementSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundChange>,
}

impl Action {
    pub fn new(kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            before: Vec::new(),
            after: Vec::new(),
            background: None,
        }
    }

    fn apply(&self, document: &mut Document, factory: &ElementFactory) -> Result<(), HistoryError> {
        apply_snapshots(document, factory, &self.after)?;
        if let Some(change) = &self.background {
            document.background_ref = change.after.clone();
        }
        Ok(())
    }

    fn revert(&self, document: &mut Document, factory: &ElementFactory) -> Result<(), HistoryError> {
        apply_snapshots(document, factory, &self.before)?;
        if let Some(change) = &self.background {
            document.background_ref = change.before.clone();
        }
        Ok(())
    }
}

/// An undo step: a single action, or several collapsed into one (for
/// example a property change applied across a multi-selection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
    Action(Action),
    Group {
        description: String,
        actions: Vec<Action>,
    },
}

impl HistoryEntry {
    pub fn description(&self) -> &str {
        match self {
            HistoryEntry::Action(action) => &action.description,
            HistoryEntry::Group { description, .. } => description,
        }
    }

    fn apply(&self, document: &mut Document, factory: &ElementFactory) -> Result<(), HistoryError> {
        match self {
            HistoryEntry::Action(action) => action.apply(document, factory),
            HistoryEntry::Group { actions, .. } => {
                for action in actions {
                    action.apply(document, factory)?;
                }
                Ok(())
            }
        }
    }

    fn revert(&self, document: &mut Document, factory: &ElementFactory) -> Result<(), HistoryError> {
        match self {
            HistoryEntry::Action(action) => action.revert(document, factory),
            HistoryEntry::Group { actions, .. } => {
                for action in actions.iter().rev() {
                    action.revert(document, factory)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("snapshot could not be restored: {0}")]
    Element(#[from] FactoryError),
}

type StackListener = Box<dyn FnMut(bool, bool)>;

/// Bounded undo/redo stacks.
pub struct HistoryManager {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: usize,
    listeners: Vec<StackListener>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryManager {
    /// Default number of undo steps kept before the oldest is dropped.
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
            listeners: Vec::new(),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo.last().map(HistoryEntry::description)
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo.last().map(HistoryEntry::description)
    }

    /// Notified with `(can_undo, can_redo)` after every stack change.
    pub fn subscribe(&mut self, listener: impl FnMut(bool, bool) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Apply an entry's after-state and record it. Discards the redo
    /// stack and evicts the oldest entry past capacity.
    pub fn execute(
        &mut self,
        document: &mut Document,
        factory: &ElementFactory,
        entry: HistoryEntry,
    ) -> Result<(), HistoryError> {
        entry.apply(document, factory)?;
        self.undo.push(entry);
        if self.undo.len() > self.capacity {
            self.undo.remove(0);
        }
        self.redo.clear();
        self.notify();
        Ok(())
    }

    /// Revert the most recent entry. Returns false (and logs) when
    /// there is nothing to undo.
    pub fn undo(
        &mut self,
        document: &mut Document,
        factory: &ElementFactory,
    ) -> Result<bool, HistoryError> {
        let Some(entry) = self.undo.pop() else {
            log::info!("undo requested with empty history");
            return Ok(false);
        };
        if let Err(err) = entry.revert(document, factory) {
            self.undo.push(entry);
            return Err(err);
        }
        self.redo.push(entry);
        self.notify();
        Ok(true)
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(
        &mut self,
        document: &mut Document,
        factory: &ElementFactory,
    ) -> Result<bool, HistoryError> {
        let Some(entry) = self.redo.pop() else {
            log::info!("redo requested with empty redo stack");
            return Ok(false);
        };
        if let Err(err) = entry.apply(document, factory) {
            self.redo.push(entry);
            return Err(err);
        }
        self.undo.push(entry);
        self.notify();
        Ok(true)
    }

    pub fn clear(&mut self) {
        if self.undo.is_empty() && self.redo.is_empty() {
            return;
        }
        self.undo.clear();
        self.redo.clear();
        self.notify();
    }

    /// Serialize both stacks for embedding in a project file.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "undo": self.undo,
            "redo": self.redo,
        })
    }

    /// Restore stacks saved by [`HistoryManager::to_value`]. Listeners
    /// are not part of the persisted state.
    pub fn from_value(value: &Value, capacity: usize) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Saved {
            #[serde(default)]
            undo: Vec<HistoryEntry>,
            #[serde(default)]
            redo: Vec<HistoryEntry>,
        }
        let saved: Saved = serde_json::from_value(value.clone())?;
        let mut manager = Self::with_capacity(capacity);
        manager.undo = saved.undo;
        manager.redo = saved.redo;
        let excess = manager.undo.len().saturating_sub(manager.capacity);
        manager.undo.drain(..excess);
        Ok(manager)
    }

    fn notify(&mut self) {
        let state = (self.can_undo(), self.can_redo());
        for listener in &mut self.listeners {
            listener(state.0, state.1);
        }
    }
}

/// Drive the document to the state a snapshot list describes. Elements
/// are rebuilt from their records; ids referenced by a reinserted group
/// but not in the list are assumed to still exist in the document.
fn apply_snapshots(
    document: &mut Document,
    factory: &ElementFactory,
    snaps: &[ElementSnapshot],
) -> Result<(), HistoryError> {
    for snap in snaps {
        document.extract(snap.id);
        if snap.record.is_none() {
            for layer in &mut document.layers {
                layer.element_ids.retain(|e| *e != snap.id);
            }
        }
    }

    let mut present: Vec<&ElementSnapshot> =
        snaps.iter().filter(|s| s.record.is_some()).collect();
    present.sort_by_key(|s| s.z_index);
    let present_ids: HashSet<ElementId> = present.iter().map(|s| s.id).collect();

    for snap in &present {
        let Some(record) = &snap.record else { continue };
        let (element, _) = factory.from_record(record)?;
        document.elements.insert(snap.id, element);
    }
    // Parent entries for children listed by reinserted group records.
    for snap in &present {
        let children = match document.elements.get(&snap.id).and_then(|e| e.as_group()) {
            Some(group) => group.children.clone(),
            None => continue,
        };
        for child in children {
            document.parents.insert(child, snap.id);
        }
    }
    // Placement among siblings.
    for snap in &present {
        match snap.parent {
            None => {
                let index = snap.z_index.min(document.z_order.len());
                document.z_order.insert(index, snap.id);
            }
            // The parent's own record already lists this child.
            Some(parent) if present_ids.contains(&parent) => {}
            Some(parent) => {
                if let Some(group) = document
                    .elements
                    .get_mut(&parent)
                    .and_then(|e| e.as_group_mut())
                {
                    if !group.children.contains(&snap.id) {
                        let index = snap.z_index.min(group.children.len());
                        group.children.insert(index, snap.id);
                    }
                }
                document.parents.insert(snap.id, parent);
            }
        }
    }
    Ok(())
}
