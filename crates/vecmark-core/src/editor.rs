//! Editing facade: document, factory, selection and history wired
//! together so every mutation is journaled.
//!
//! Operations follow one shape: capture before-state, mutate, capture
//! after-state, hand the entry to the history manager. Applying the
//! after-state is idempotent, so executing the entry after the mutation
//! is the same code path redo takes later.

use crate::document::{Document, DocumentError, LoadError};
use crate::elements::{Element, ElementId, PropertyError, PropertyValue};
use crate::factory::{ElementFactory, FactoryError, LoadDiagnostic};
use crate::handles::{HandleKind, ResizeConstraints};
use crate::history::{
    snapshot_subtree, Action, ActionKind, BackgroundChange, ElementSnapshot, HistoryEntry,
    HistoryError, HistoryManager,
};
use crate::selection::{SelectionManager, SelectionMode};
use crate::storage::{ProjectStore, StoreError};
use kurbo::{Point, Vec2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Editor {
    pub document: Document,
    pub factory: ElementFactory,
    pub selection: SelectionManager,
    pub history: HistoryManager,
}

impl Editor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            document: Document::new(name),
            factory: ElementFactory::new(),
            selection: SelectionManager::new(),
            history: HistoryManager::new(),
        }
    }

    /// Create an element of the given kind and add it to the document.
    pub fn add_element(&mut self, tag: &str, position: Point) -> Result<ElementId, EditorError> {
        let element = self.factory.create(tag, position)?;
        self.add(element)
    }

    /// Add a prepared element, journaled and selected.
    pub fn add(&mut self, element: Element) -> Result<ElementId, EditorError> {
        let id = element.id();
        let mut action = Action::new(
            ActionKind::AddElement,
            format!("Add {}", element.type_tag()),
        );
        action.before.push(ElementSnapshot::absent(id));
        self.document.insert(element);
        action
            .after
            .push(ElementSnapshot::capture(&self.document, &self.factory, id));
        self.history
            .execute(&mut self.document, &self.factory, HistoryEntry::Action(action))?;
        self.selection
            .select(&self.document, &[id], SelectionMode::Replace);
        Ok(id)
    }

    /// Delete the current selection (subtrees included) as one undo step.
    pub fn delete_selected(&mut self) -> Result<(), EditorError> {
        let targets = self.selection.selected().to_vec();
        if targets.is_empty() {
            return Ok(());
        }
        let mut action = Action::new(
            ActionKind::RemoveElement,
            format!("Delete {} element(s)", targets.len()),
        );
        for id in &targets {
            let before = snapshot_subtree(&self.document, &self.factory, *id);
            for snap in &before {
                action.after.push(ElementSnapshot::absent(snap.id));
            }
            action.before.extend(before);
            self.document.remove(*id);
        }
        self.history
            .execute(&mut self.document, &self.factory, HistoryEntry::Action(action))?;
        self.selection.prune(&self.document);
        Ok(())
    }

    /// Move an element (or group subtree) by a scene delta.
    pub fn move_element(&mut self, id: ElementId, delta: Vec2) -> Result<(), EditorError> {
        self.journal_mutation(ActionKind::MoveElement, "Move element", &[id], |doc| {
            doc.translate_element(id, delta).map_err(EditorError::from)
        })
    }

    /// Move every selected element by the same delta, as one undo step.
    pub fn move_selected(&mut self, delta: Vec2) -> Result<(), EditorError> {
        let targets = self.selection.selected().to_vec();
        if targets.is_empty() {
            return Ok(());
        }
        self.journal_mutation(
            ActionKind::MoveElement,
            format!("Move {} element(s)", targets.len()),
            &targets,
            |doc| {
                for id in &targets {
                    doc.translate_element(*id, delta)?;
                }
                Ok(())
            },
        )
    }

    /// Resize by dragging a handle.
    pub fn resize_element(
        &mut self,
        id: ElementId,
        kind: HandleKind,
        delta: Vec2,
        constraints: &ResizeConstraints,
    ) -> Result<(), EditorError> {
        self.journal_mutation(ActionKind::ResizeElement, "Resize element", &[id], |doc| {
            doc.resize_element(id, kind, delta, constraints)
                .map_err(EditorError::from)
        })
    }

    /// Set a named property on one element.
    pub fn set_property(
        &mut self,
        id: ElementId,
        name: &str,
        value: &PropertyValue,
    ) -> Result<(), EditorError> {
        if !self.document.contains(id) {
            return Err(DocumentError::NotFound(id).into());
        }
        self.journal_mutation(
            ActionKind::ChangeProperty,
            format!("Set {name}"),
            &[id],
            |doc| match doc.get_mut(id) {
                Some(element) => element.set_property(name, value).map_err(EditorError::from),
                None => Err(DocumentError::NotFound(id).into()),
            },
        )
    }

    /// Set a property across the whole selection. Elements that do not
    /// expose the property are skipped; the rest are changed in one
    /// grouped entry, so a single undo reverts them all. Returns the
    /// number of elements changed; an error comes back only when it
    /// prevented any change at all, so `Ok` always means the journaled
    /// state matches the document.
    pub fn set_property_on_selection(
        &mut self,
        name: &str,
        value: &PropertyValue,
    ) -> Result<usize, EditorError> {
        let targets = self.selection.selected().to_vec();
        let mut actions = Vec::new();
        let mut first_error = None;
        for id in targets {
            let mut action = Action::new(ActionKind::ChangeProperty, format!("Set {name}"));
            action
                .before
                .push(ElementSnapshot::capture(&self.document, &self.factory, id));
            let result = match self.document.get_mut(id) {
                Some(element) => element.set_property(name, value),
                None => continue,
            };
            match result {
                Ok(()) => {
                    action
                        .after
                        .push(ElementSnapshot::capture(&self.document, &self.factory, id));
                    actions.push(action);
                }
                Err(PropertyError::UnknownProperty(_)) => {}
                Err(err) => first_error = first_error.or(Some(err)),
            }
        }
        if actions.is_empty() {
            return match first_error {
                Some(err) => Err(err.into()),
                None => Ok(0),
            };
        }
        let applied = actions.len();
        let entry = HistoryEntry::Group {
            description: format!("Set {name} on {applied} element(s)"),
            actions,
        };
        self.history
            .execute(&mut self.document, &self.factory, entry)?;
        Ok(applied)
    }

    /// Group the current selection. The group becomes the selection.
    pub fn group_selected(&mut self) -> Result<ElementId, EditorError> {
        let members = self.selection.selected().to_vec();
        let mut action = Action::new(
            ActionKind::GroupElements,
            format!("Group {} element(s)", members.len()),
        );
        for id in &members {
            action
                .before
                .push(ElementSnapshot::capture(&self.document, &self.factory, *id));
        }
        let group_id = self.document.group_elements(&members)?;
        action.before.push(ElementSnapshot::absent(group_id));
        action.after.push(ElementSnapshot::capture(
            &self.document,
            &self.factory,
            group_id,
        ));
        for id in &members {
            action
                .after
                .push(ElementSnapshot::capture(&self.document, &self.factory, *id));
        }
        self.history
            .execute(&mut self.document, &self.factory, HistoryEntry::Action(action))?;
        self.selection
            .select(&self.document, &[group_id], SelectionMode::Replace);
        Ok(group_id)
    }

    /// Dissolve every selected group; children become the selection.
    pub fn ungroup_selected(&mut self) -> Result<(), EditorError> {
        let groups: Vec<ElementId> = self
            .selection
            .selected()
            .iter()
            .copied()
            .filter(|id| {
                self.document
                    .get(*id)
                    .map(Element::is_group)
                    .unwrap_or(false)
            })
            .collect();
        if groups.is_empty() {
            return Ok(());
        }
        let mut actions = Vec::new();
        let mut freed_all = Vec::new();
        for group_id in groups {
            let mut action = Action::new(ActionKind::UngroupElements, "Ungroup");
            action.before.extend(snapshot_subtree(
                &self.document,
                &self.factory,
                group_id,
            ));
            let freed = self.document.ungroup(group_id)?;
            action.after.push(ElementSnapshot::absent(group_id));
            for id in &freed {
                action
                    .after
                    .push(ElementSnapshot::capture(&self.document, &self.factory, *id));
            }
            freed_all.extend(freed);
            actions.push(action);
        }
        let entry = if actions.len() == 1 {
            HistoryEntry::Action(actions.remove(0))
        } else {
            HistoryEntry::Group {
                description: "Ungroup selection".into(),
                actions,
            }
        };
        self.history
            .execute(&mut self.document, &self.factory, entry)?;
        self.selection
            .select(&self.document, &freed_all, SelectionMode::Replace);
        Ok(())
    }

    /// Change the document background reference.
    pub fn set_background(&mut self, background: Option<String>) -> Result<(), EditorError> {
        if self.document.background_ref == background {
            return Ok(());
        }
        let mut action = Action::new(ActionKind::SetBackground, "Set background");
        action.background = Some(BackgroundChange {
            before: self.document.background_ref.clone(),
            after: background,
        });
        self.history
            .execute(&mut self.document, &self.factory, HistoryEntry::Action(action))?;
        Ok(())
    }

    /// Remove every element, as a single undoable step.
    pub fn clear(&mut self) -> Result<(), EditorError> {
        if self.document.is_empty() {
            return Ok(());
        }
        let mut action = Action::new(ActionKind::ClearCanvas, "Clear canvas");
        for id in self.document.render_order() {
            action
                .before
                .push(ElementSnapshot::capture(&self.document, &self.factory, id));
            action.after.push(ElementSnapshot::absent(id));
        }
        self.document.clear();
        self.history
            .execute(&mut self.document, &self.factory, HistoryEntry::Action(action))?;
        self.selection.prune(&self.document);
        Ok(())
    }

    /// Journaled z-order change.
    pub fn reorder_element(
        &mut self,
        id: ElementId,
        apply: fn(&mut Document, ElementId) -> Result<(), DocumentError>,
        description: &str,
    ) -> Result<(), EditorError> {
        self.journal_mutation(ActionKind::ModifyElement, description, &[id], |doc| {
            apply(doc, id).map_err(EditorError::from)
        })
    }

    pub fn bring_to_front(&mut self, id: ElementId) -> Result<(), EditorError> {
        self.reorder_element(id, Document::bring_to_front, "Bring to front")
    }

    pub fn send_to_back(&mut self, id: ElementId) -> Result<(), EditorError> {
        self.reorder_element(id, Document::send_to_back, "Send to back")
    }

    pub fn bring_forward(&mut self, id: ElementId) -> Result<(), EditorError> {
        self.reorder_element(id, Document::bring_forward, "Bring forward")
    }

    pub fn send_backward(&mut self, id: ElementId) -> Result<(), EditorError> {
        self.reorder_element(id, Document::send_backward, "Send backward")
    }

    /// Undo the latest entry. Selection is pruned afterwards so it never
    /// points at elements the undo removed.
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let done = self.history.undo(&mut self.document, &self.factory)?;
        self.selection.prune(&self.document);
        Ok(done)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let done = self.history.redo(&mut self.document, &self.factory)?;
        self.selection.prune(&self.document);
        Ok(done)
    }

    /// Persist the document and both history stacks under one name.
    pub fn save_project(
        &self,
        store: &mut dyn ProjectStore,
        name: &str,
    ) -> Result<(), EditorError> {
        let mut project = self.document.save(&self.factory);
        if let Some(obj) = project.as_object_mut() {
            obj.insert("history".into(), self.history.to_value());
        }
        store.save(name, &project)?;
        Ok(())
    }

    /// Load a project, replacing document, history and selection.
    /// All-or-nothing: on any error the current state is untouched.
    pub fn load_project(
        &mut self,
        store: &dyn ProjectStore,
        name: &str,
    ) -> Result<Vec<LoadDiagnostic>, EditorError> {
        let project = store.load(name)?;
        let (document, diagnostics) = Document::load(&project, &self.factory)?;
        let history = match project.get("history") {
            Some(saved) => HistoryManager::from_value(saved, HistoryManager::DEFAULT_CAPACITY)
                .map_err(StoreError::from)?,
            None => HistoryManager::new(),
        };
        self.document = document;
        self.history = history;
        self.selection.clear();
        Ok(diagnostics)
    }

    /// Shared capture/mutate/capture/execute shape for subtree edits.
    fn journal_mutation(
        &mut self,
        kind: ActionKind,
        description: impl Into<String>,
        roots: &[ElementId],
        mutate: impl FnOnce(&mut Document) -> Result<(), EditorError>,
    ) -> Result<(), EditorError> {
        let mut action = Action::new(kind, description);
        for id in roots {
            action
                .before
                .extend(snapshot_subtree(&self.document, &self.factory, *id));
        }
        mutate(&mut self.document)?;
        for id in roots {
            action
                .after
                .extend(snapshot_subtree(&self.document, &self.factory, *id));
        }
        self.history
            .execute(&mut self.document, &self.factory, HistoryEntry::Action(action))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Color;
    use crate::storage::MemoryStore;
    use kurbo::Rect;

    fn editor_with_rects(n: usize) -> (Editor, Vec<ElementId>) {
        let mut editor = Editor::new("test");
        let ids = (0..n)
            .map(|i| {
                editor
                    .add_element("rectangle", Point::new(i as f64 * 150.0, 0.0))
                    .unwrap()
            })
            .collect();
        (editor, ids)
    }

    #[test]
    fn test_add_selects_and_journals() {
        let (mut editor, ids) = editor_with_rects(1);
        assert_eq!(editor.selection.selected(), &[ids[0]]);
        assert!(editor.history.can_undo());
        editor.undo().unwrap();
        assert!(editor.document.is_empty());
        assert!(editor.selection.is_empty());
    }

    #[test]
    fn test_delete_and_undo_restores_selection_target() {
        let (mut editor, ids) = editor_with_rects(2);
        editor
            .selection
            .select(&editor.document, &ids, SelectionMode::Replace);
        editor.delete_selected().unwrap();
        assert!(editor.document.is_empty());
        assert!(editor.selection.is_empty());

        editor.undo().unwrap();
        assert_eq!(editor.document.len(), 2);
        assert!(editor.document.contains(ids[0]));
        assert!(editor.document.contains(ids[1]));
    }

    // Scenario: create, move, resize, then unwind and replay the lot.
    #[test]
    fn test_full_undo_redo_cycle() {
        let mut editor = Editor::new("test");
        let id = editor.add_element("rectangle", Point::ZERO).unwrap();
        editor.move_element(id, Vec2::new(40.0, 0.0)).unwrap();
        editor
            .resize_element(
                id,
                HandleKind::Corner(crate::handles::Corner::BottomRight),
                Vec2::new(20.0, 20.0),
                &ResizeConstraints::default(),
            )
            .unwrap();
        let final_bounds = editor.document.get(id).unwrap().scene_bounds();

        while editor.undo().unwrap() {}
        assert!(editor.document.is_empty());

        while editor.redo().unwrap() {}
        assert_eq!(editor.document.get(id).unwrap().scene_bounds(), final_bounds);
    }

    // Scenario: move from (0,0) to (20,5), undo back, redo forward.
    #[test]
    fn test_move_undo_redo_positions() {
        let mut editor = Editor::new("test");
        let id = editor.add_element("rectangle", Point::ZERO).unwrap();
        editor.move_element(id, Vec2::new(20.0, 5.0)).unwrap();
        let at = |editor: &Editor| editor.document.get(id).unwrap().visual_position();
        assert_eq!(at(&editor), Point::new(20.0, 5.0));
        editor.undo().unwrap();
        assert_eq!(at(&editor), Point::new(0.0, 0.0));
        editor.redo().unwrap();
        assert_eq!(at(&editor), Point::new(20.0, 5.0));
    }

    // Scenario: moving a group by (5,5) moves A from (0,0) to (5,5) and
    // B from (10,10) to (15,15).
    #[test]
    fn test_group_move_offsets_children() {
        let mut editor = Editor::new("test");
        let a = editor.add_element("rectangle", Point::new(0.0, 0.0)).unwrap();
        let b = editor.add_element("rectangle", Point::new(10.0, 10.0)).unwrap();
        editor
            .selection
            .select(&editor.document, &[a, b], SelectionMode::Replace);
        let group = editor.group_selected().unwrap();
        editor.move_element(group, Vec2::new(5.0, 5.0)).unwrap();
        assert_eq!(
            editor.document.get(a).unwrap().visual_position(),
            Point::new(5.0, 5.0)
        );
        assert_eq!(
            editor.document.get(b).unwrap().visual_position(),
            Point::new(15.0, 15.0)
        );
    }

    #[test]
    fn test_group_move_undo_restores_child_positions() {
        let (mut editor, ids) = editor_with_rects(2);
        editor
            .selection
            .select(&editor.document, &ids, SelectionMode::Replace);
        let group = editor.group_selected().unwrap();
        let before = editor.document.get(ids[0]).unwrap().visual_position();

        editor.move_element(group, Vec2::new(25.0, 25.0)).unwrap();
        editor.undo().unwrap();
        let after = editor.document.get(ids[0]).unwrap().visual_position();
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_group_undo_restores_top_level_members() {
        let (mut editor, ids) = editor_with_rects(3);
        editor
            .selection
            .select(&editor.document, &[ids[0], ids[1]], SelectionMode::Replace);
        let group = editor.group_selected().unwrap();
        assert_eq!(editor.selection.selected(), &[group]);

        editor.undo().unwrap();
        assert!(!editor.document.contains(group));
        assert_eq!(editor.document.z_order(), &[ids[0], ids[1], ids[2]]);
        assert!(editor.document.parent_of(ids[0]).is_none());
    }

    #[test]
    fn test_ungroup_and_undo() {
        let (mut editor, ids) = editor_with_rects(2);
        editor
            .selection
            .select(&editor.document, &ids, SelectionMode::Replace);
        let group = editor.group_selected().unwrap();
        editor.ungroup_selected().unwrap();
        assert!(!editor.document.contains(group));
        assert_eq!(editor.selection.selected(), &[ids[0], ids[1]]);

        editor.undo().unwrap();
        assert!(editor.document.contains(group));
        assert_eq!(editor.document.parent_of(ids[0]), Some(group));
    }

    // Scenario: one property change over a multi-selection is a single
    // undo step.
    #[test]
    fn test_selection_wide_property_change_is_one_step() {
        let (mut editor, ids) = editor_with_rects(3);
        editor
            .selection
            .select(&editor.document, &ids, SelectionMode::Replace);
        let applied = editor
            .set_property_on_selection(
                "stroke_color",
                &PropertyValue::Color(Color::new(255, 0, 0, 255)),
            )
            .unwrap();
        assert_eq!(applied, 3);
        for id in &ids {
            assert_eq!(
                editor.document.get(*id).unwrap().style().stroke_color,
                Color::new(255, 0, 0, 255)
            );
        }

        editor.undo().unwrap();
        for id in &ids {
            assert_eq!(
                editor.document.get(*id).unwrap().style().stroke_color,
                Color::black()
            );
        }
    }

    #[test]
    fn test_property_unknown_everywhere_is_error() {
        let (mut editor, ids) = editor_with_rects(1);
        editor
            .selection
            .select(&editor.document, &ids, SelectionMode::Replace);
        let result =
            editor.set_property_on_selection("radius_x", &PropertyValue::Number(10.0));
        assert!(matches!(result, Ok(0)));
        assert_eq!(editor.history.undo_description(), Some("Add rectangle"));
    }

    // Elements without the property are skipped; applying to the rest
    // still succeeds and journals one undoable step.
    #[test]
    fn test_selection_property_partial_apply_succeeds() {
        let mut editor = Editor::new("test");
        let rect = editor.add_element("rectangle", Point::ZERO).unwrap();
        let line = editor.add_element("line", Point::new(0.0, 200.0)).unwrap();
        editor
            .selection
            .select(&editor.document, &[rect, line], SelectionMode::Replace);

        let applied = editor
            .set_property_on_selection("corner_radius", &PropertyValue::Number(4.0))
            .unwrap();
        assert_eq!(applied, 1);
        match editor.document.get(rect) {
            Some(Element::Rectangle(r)) => assert!((r.corner_radius - 4.0).abs() < f64::EPSILON),
            other => panic!("expected rectangle, got {other:?}"),
        }

        editor.undo().unwrap();
        match editor.document.get(rect) {
            Some(Element::Rectangle(r)) => assert!(r.corner_radius.abs() < f64::EPSILON),
            other => panic!("expected rectangle, got {other:?}"),
        }
    }

    #[test]
    fn test_set_background_journaled() {
        let mut editor = Editor::new("test");
        editor.set_background(Some("grid.png".into())).unwrap();
        assert_eq!(editor.document.background_ref.as_deref(), Some("grid.png"));
        editor.undo().unwrap();
        assert!(editor.document.background_ref.is_none());
    }

    #[test]
    fn test_clear_canvas_is_one_step() {
        let (mut editor, _) = editor_with_rects(3);
        editor.clear().unwrap();
        assert!(editor.document.is_empty());
        editor.undo().unwrap();
        assert_eq!(editor.document.len(), 3);
    }

    #[test]
    fn test_z_order_change_undo() {
        let (mut editor, ids) = editor_with_rects(3);
        editor.bring_to_front(ids[0]).unwrap();
        assert_eq!(editor.document.z_order(), &[ids[1], ids[2], ids[0]]);
        editor.undo().unwrap();
        assert_eq!(editor.document.z_order(), &[ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn test_save_and_load_project_with_history() {
        let (mut editor, ids) = editor_with_rects(2);
        editor.undo().unwrap();
        let mut store = MemoryStore::new();
        editor.save_project(&mut store, "scene").unwrap();

        let mut other = Editor::new("empty");
        let diags = other.load_project(&store, "scene").unwrap();
        assert!(diags.is_empty());
        assert_eq!(other.document.len(), 1);
        assert!(other.document.contains(ids[0]));
        // The undone add rides along in the redo stack.
        assert!(other.redo().unwrap());
        assert!(other.document.contains(ids[1]));
    }

    #[test]
    fn test_load_failure_leaves_editor_untouched() {
        let (mut editor, ids) = editor_with_rects(1);
        let mut store = MemoryStore::new();
        store
            .save("broken", &serde_json::json!({"version": 99, "elements": []}))
            .unwrap();
        assert!(editor.load_project(&store, "broken").is_err());
        assert!(editor.document.contains(ids[0]));
        assert!(editor.history.can_undo());
    }

    #[test]
    fn test_marquee_then_group_bounds() {
        let (mut editor, ids) = editor_with_rects(2);
        editor.selection.select_in_rect(
            &editor.document,
            Rect::new(-10.0, -10.0, 400.0, 200.0),
            SelectionMode::Replace,
        );
        assert_eq!(editor.selection.len(), 2);
        let group = editor.group_selected().unwrap();
        let bounds = editor.document.bounds_of(group).unwrap();
        assert!(bounds.width() > 150.0);
        assert_eq!(editor.document.parent_of(ids[0]), Some(group));
    }
}
