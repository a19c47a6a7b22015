//! Document state: flat element store, z-order, layers, persistence.
//!
//! Elements live in one flat map keyed by id. Groups reference children
//! by id and the document maintains the inverse parent map, so the
//! containment tree is always a forest (an element has at most one
//! parent, and load rejects cycles). The z-order vector holds top-level
//! ids only, back to front; children draw in their group's child order.

use crate::elements::{Element, ElementId};
use crate::factory::{ElementFactory, FactoryError, LoadDiagnostic};
use crate::handles::{self, Corner, Handle, HandleKind, ResizeConstraints};
use kurbo::{Point, Rect, Vec2};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Current project file format version. Version 1 files (the legacy
/// string-versioned format) are migrated on load; newer versions are
/// rejected rather than guessed at.
pub const FORMAT_VERSION: u64 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("element {0} not found")]
    NotFound(ElementId),
    #[error("element {0} is not a group")]
    NotAGroup(ElementId),
    #[error("grouping needs at least two top-level elements")]
    InvalidGroup,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed project file: {0}")]
    Malformed(String),
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u64),
    #[error("invalid document structure: {0}")]
    InvalidStructure(String),
    #[error(transparent)]
    Element(#[from] FactoryError),
}

/// Named drawing layer. Layers partition top-level elements for
/// visibility and locking; z-order within the document is unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub element_ids: Vec<ElementId>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            locked: false,
            element_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Document {
    pub name: String,
    pub(crate) elements: HashMap<ElementId, Element>,
    /// Top-level ids, back to front.
    pub(crate) z_order: Vec<ElementId>,
    /// Inverse of group membership.
    pub(crate) parents: HashMap<ElementId, ElementId>,
    pub layers: Vec<Layer>,
    /// Opaque reference to a background image, resolved by the host.
    pub background_ref: Option<String>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    pub fn parent_of(&self, id: ElementId) -> Option<ElementId> {
        self.parents.get(&id).copied()
    }

    /// Top-level ids, back to front.
    pub fn z_order(&self) -> &[ElementId] {
        &self.z_order
    }

    /// Position of a top-level element in the z-order.
    pub fn z_index(&self, id: ElementId) -> Option<usize> {
        self.z_order.iter().position(|z| *z == id)
    }

    /// Insert a top-level element at the front.
    pub fn insert(&mut self, element: Element) -> ElementId {
        let id = element.id();
        self.elements.insert(id, element);
        self.z_order.push(id);
        id
    }

    /// Insert a top-level element at a specific z position (clamped).
    pub fn insert_at(&mut self, element: Element, z_index: usize) -> ElementId {
        let id = element.id();
        self.elements.insert(id, element);
        let index = z_index.min(self.z_order.len());
        self.z_order.insert(index, id);
        id
    }

    /// Insert an element as a child of an existing group, at the given
    /// position in the group's child order (clamped).
    pub fn insert_into_group(
        &mut self,
        element: Element,
        group_id: ElementId,
        index: usize,
    ) -> Result<ElementId, DocumentError> {
        let id = element.id();
        let group = self
            .elements
            .get_mut(&group_id)
            .ok_or(DocumentError::NotFound(group_id))?
            .as_group_mut()
            .ok_or(DocumentError::NotAGroup(group_id))?;
        let index = index.min(group.children.len());
        group.children.insert(index, id);
        self.elements.insert(id, element);
        self.parents.insert(id, group_id);
        Ok(id)
    }

    /// Remove an element and its entire subtree. Returns the removed
    /// elements, the root first, or an empty vec if the id is unknown.
    pub fn remove(&mut self, id: ElementId) -> Vec<Element> {
        if !self.elements.contains_key(&id) {
            return Vec::new();
        }
        match self.parents.remove(&id) {
            Some(parent) => {
                if let Some(group) = self.elements.get_mut(&parent).and_then(Element::as_group_mut)
                {
                    group.remove_child(id);
                }
            }
            None => self.z_order.retain(|z| *z != id),
        }
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(element) = self.elements.remove(&next) {
                if let Some(group) = element.as_group() {
                    for child in &group.children {
                        self.parents.remove(child);
                        stack.push(*child);
                    }
                }
                removed.push(element);
            }
        }
        for layer in &mut self.layers {
            layer.element_ids.retain(|e| self.elements.contains_key(e));
        }
        removed
    }

    /// Detach a single element without touching its subtree. Used by
    /// snapshot restore, which re-wires children itself. Layer
    /// membership is left alone so it survives a remove/reinsert pair.
    pub(crate) fn extract(&mut self, id: ElementId) -> Option<Element> {
        let element = self.elements.remove(&id)?;
        match self.parents.remove(&id) {
            Some(parent) => {
                if let Some(group) = self.elements.get_mut(&parent).and_then(Element::as_group_mut)
                {
                    group.remove_child(id);
                }
            }
            None => self.z_order.retain(|z| *z != id),
        }
        if let Some(group) = element.as_group() {
            for child in &group.children {
                self.parents.remove(child);
            }
        }
        Some(element)
    }

    /// Remove every element. Layers and background are kept.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.z_order.clear();
        self.parents.clear();
        for layer in &mut self.layers {
            layer.element_ids.clear();
        }
    }

    /// Draw order over all elements: groups flattened, back to front.
    pub fn render_order(&self) -> Vec<ElementId> {
        let mut order = Vec::with_capacity(self.elements.len());
        for id in &self.z_order {
            self.push_subtree(*id, &mut order);
        }
        order
    }

    fn push_subtree(&self, id: ElementId, order: &mut Vec<ElementId>) {
        order.push(id);
        if let Some(group) = self.elements.get(&id).and_then(Element::as_group) {
            for child in &group.children {
                self.push_subtree(*child, order);
            }
        }
    }

    /// Scene-space bounds. For a group this is the union of child
    /// bounds; an empty group has no bounds.
    pub fn bounds_of(&self, id: ElementId) -> Option<Rect> {
        let element = self.elements.get(&id)?;
        match element.as_group() {
            None => Some(element.scene_bounds()),
            Some(group) => {
                let mut union: Option<Rect> = None;
                for child in &group.children {
                    if let Some(bounds) = self.bounds_of(*child) {
                        union = Some(match union {
                            Some(u) => u.union(bounds),
                            None => bounds,
                        });
                    }
                }
                union
            }
        }
    }

    fn hit_subtree(&self, id: ElementId, point: Point, tolerance: f64) -> bool {
        let Some(element) = self.elements.get(&id) else {
            return false;
        };
        match element.as_group() {
            None => element.hit_test(point, tolerance),
            Some(group) => group
                .children
                .iter()
                .any(|child| self.hit_subtree(*child, point, tolerance)),
        }
    }

    /// Top-level elements under a scene point, front to back. A group is
    /// hit when any of its descendants is.
    pub fn elements_at_point(&self, point: Point, tolerance: f64) -> Vec<ElementId> {
        self.z_order
            .iter()
            .rev()
            .copied()
            .filter(|id| self.hit_subtree(*id, point, tolerance))
            .collect()
    }

    /// Frontmost top-level element under a scene point.
    pub fn top_hit(&self, point: Point, tolerance: f64) -> Option<ElementId> {
        self.elements_at_point(point, tolerance).into_iter().next()
    }

    /// Top-level elements whose bounds intersect a marquee rect, back to
    /// front. Touching an element is enough; full containment is not
    /// required.
    pub fn elements_in_rect(&self, rect: Rect) -> Vec<ElementId> {
        self.z_order
            .iter()
            .copied()
            .filter(|id| {
                self.bounds_of(*id)
                    .map(|b| rects_overlap(rect, b))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Elements in draw order, for a renderer to walk.
    pub fn render_list(&self) -> Vec<&Element> {
        self.render_order()
            .iter()
            .filter_map(|id| self.elements.get(id))
            .collect()
    }

    /// Translate an element; a group moves all descendants.
    pub fn translate_element(&mut self, id: ElementId, delta: Vec2) -> Result<(), DocumentError> {
        let element = self
            .elements
            .get_mut(&id)
            .ok_or(DocumentError::NotFound(id))?;
        match element.as_group() {
            None => {
                element.translate(delta);
                Ok(())
            }
            Some(group) => {
                let children = group.children.clone();
                for child in children {
                    self.translate_element(child, delta)?;
                }
                Ok(())
            }
        }
    }

    /// Resize by dragging a handle. Leaves resize in their local frame;
    /// groups rescale all descendants proportionally around the handle's
    /// opposite corner.
    pub fn resize_element(
        &mut self,
        id: ElementId,
        kind: HandleKind,
        delta: Vec2,
        constraints: &ResizeConstraints,
    ) -> Result<(), DocumentError> {
        let is_group = self
            .elements
            .get(&id)
            .ok_or(DocumentError::NotFound(id))?
            .is_group();
        if !is_group {
            let element = self
                .elements
                .get_mut(&id)
                .ok_or(DocumentError::NotFound(id))?;
            handles::resize(element, kind, delta, constraints);
            return Ok(());
        }
        let HandleKind::Corner(corner) = kind else {
            return Ok(());
        };
        let Some(bounds) = self.bounds_of(id) else {
            return Ok(());
        };
        let (w, h) = (bounds.width(), bounds.height());
        if w <= 0.0 || h <= 0.0 {
            return Ok(());
        }
        let (sign_x, sign_y) = match corner {
            Corner::TopLeft => (-1.0, -1.0),
            Corner::TopRight => (1.0, -1.0),
            Corner::BottomRight => (1.0, 1.0),
            Corner::BottomLeft => (-1.0, 1.0),
        };
        let mut new_w = (w + sign_x * delta.x).max(constraints.min_extent);
        let mut new_h = (h + sign_y * delta.y).max(constraints.min_extent);
        if constraints.keep_aspect {
            let rel_x = (new_w - w).abs() / w;
            let rel_y = (new_h - h).abs() / h;
            if rel_x >= rel_y {
                new_h = new_w * h / w;
            } else {
                new_w = new_h * w / h;
            }
        }
        let anchor = anchor_corner(bounds, corner);
        self.rescale_subtree(id, anchor, new_w / w, new_h / h);
        Ok(())
    }

    fn rescale_subtree(&mut self, id: ElementId, anchor: Point, sx: f64, sy: f64) {
        let children = match self.elements.get(&id).and_then(Element::as_group) {
            Some(group) => group.children.clone(),
            None => {
                if let Some(element) = self.elements.get_mut(&id) {
                    let origin = element.visual_position();
                    element.rescale(sx, sy);
                    element.set_visual_position(Point::new(
                        anchor.x + (origin.x - anchor.x) * sx,
                        anchor.y + (origin.y - anchor.y) * sy,
                    ));
                }
                return;
            }
        };
        for child in children {
            self.rescale_subtree(child, anchor, sx, sy);
        }
    }

    /// Selection handles for any element. Groups get corner handles on
    /// their derived bounds.
    pub fn handles_for(&self, id: ElementId) -> Vec<Handle> {
        let Some(element) = self.elements.get(&id) else {
            return Vec::new();
        };
        if !element.is_group() {
            return handles::handles_for(element);
        }
        let Some(bounds) = self.bounds_of(id) else {
            return Vec::new();
        };
        [
            Corner::TopLeft,
            Corner::TopRight,
            Corner::BottomRight,
            Corner::BottomLeft,
        ]
        .into_iter()
        .map(|corner| Handle {
            kind: HandleKind::Corner(corner),
            position: anchor_corner(bounds, corner),
        })
        .collect()
    }

    // Z-order operations. They work on whichever ordering list contains
    // the element: the document z-order for top-level elements, the
    // parent's child list for grouped ones.

    pub fn bring_to_front(&mut self, id: ElementId) -> Result<(), DocumentError> {
        self.reorder(id, |list, index| {
            let id = list.remove(index);
            list.push(id);
        })
    }

    pub fn send_to_back(&mut self, id: ElementId) -> Result<(), DocumentError> {
        self.reorder(id, |list, index| {
            let id = list.remove(index);
            list.insert(0, id);
        })
    }

    pub fn bring_forward(&mut self, id: ElementId) -> Result<(), DocumentError> {
        self.reorder(id, |list, index| {
            if index + 1 < list.len() {
                list.swap(index, index + 1);
            }
        })
    }

    pub fn send_backward(&mut self, id: ElementId) -> Result<(), DocumentError> {
        self.reorder(id, |list, index| {
            if index > 0 {
                list.swap(index, index - 1);
            }
        })
    }

    fn reorder(
        &mut self,
        id: ElementId,
        apply: impl FnOnce(&mut Vec<ElementId>, usize),
    ) -> Result<(), DocumentError> {
        if !self.elements.contains_key(&id) {
            return Err(DocumentError::NotFound(id));
        }
        let list = match self.parents.get(&id).copied() {
            None => &mut self.z_order,
            Some(parent) => {
                &mut self
                    .elements
                    .get_mut(&parent)
                    .and_then(Element::as_group_mut)
                    .ok_or(DocumentError::NotAGroup(parent))?
                    .children
            }
        };
        if let Some(index) = list.iter().position(|z| *z == id) {
            apply(list, index);
        }
        Ok(())
    }

    /// Group two or more top-level elements. The new group takes the
    /// frontmost member's z position; members keep their relative order
    /// as the group's children.
    pub fn group_elements(&mut self, ids: &[ElementId]) -> Result<ElementId, DocumentError> {
        if ids.len() < 2 {
            return Err(DocumentError::InvalidGroup);
        }
        let unique: HashSet<ElementId> = ids.iter().copied().collect();
        if unique.len() != ids.len() {
            return Err(DocumentError::InvalidGroup);
        }
        for id in ids {
            if !self.elements.contains_key(id) {
                return Err(DocumentError::NotFound(*id));
            }
            if self.parents.contains_key(id) {
                return Err(DocumentError::InvalidGroup);
            }
        }
        let mut members: Vec<(usize, ElementId)> = ids
            .iter()
            .filter_map(|id| self.z_index(*id).map(|z| (z, *id)))
            .collect();
        members.sort_by_key(|(z, _)| *z);
        let front = members
            .last()
            .map(|(z, _)| *z)
            .ok_or(DocumentError::InvalidGroup)?;
        let ordered: Vec<ElementId> = members.into_iter().map(|(_, id)| id).collect();

        let group = crate::elements::Group::new(ordered.clone());
        let group_id = group.id;
        self.z_order.retain(|z| !unique.contains(z));
        let insert_at = front.saturating_sub(ids.len() - 1).min(self.z_order.len());
        self.z_order.insert(insert_at, group_id);
        self.elements.insert(group_id, Element::Group(group));
        for id in &ordered {
            self.parents.insert(*id, group_id);
        }
        Ok(group_id)
    }

    /// Dissolve a group: children return to the top level at the group's
    /// z position, preserving their order. Returns the freed children.
    pub fn ungroup(&mut self, id: ElementId) -> Result<Vec<ElementId>, DocumentError> {
        let element = self.elements.get(&id).ok_or(DocumentError::NotFound(id))?;
        let group = element.as_group().ok_or(DocumentError::NotAGroup(id))?;
        let children = group.children.clone();
        let position = self.z_index(id).unwrap_or(self.z_order.len());
        self.z_order.retain(|z| *z != id);
        for (offset, child) in children.iter().enumerate() {
            self.parents.remove(child);
            let index = (position + offset).min(self.z_order.len());
            self.z_order.insert(index, *child);
        }
        self.elements.remove(&id);
        Ok(children)
    }

    // Layer management.

    pub fn add_layer(&mut self, name: impl Into<String>) -> Uuid {
        let layer = Layer::new(name);
        let id = layer.id;
        self.layers.push(layer);
        id
    }

    pub fn layer(&self, layer_id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == layer_id)
    }

    pub fn layer_mut(&mut self, layer_id: Uuid) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == layer_id)
    }

    /// Remove a layer. Its elements stay in the document, unassigned.
    pub fn remove_layer(&mut self, layer_id: Uuid) {
        self.layers.retain(|l| l.id != layer_id);
    }

    /// Assign an element to a layer, removing it from any other.
    pub fn assign_to_layer(
        &mut self,
        element_id: ElementId,
        layer_id: Uuid,
    ) -> Result<(), DocumentError> {
        if !self.elements.contains_key(&element_id) {
            return Err(DocumentError::NotFound(element_id));
        }
        for layer in &mut self.layers {
            layer.element_ids.retain(|e| *e != element_id);
        }
        match self.layer_mut(layer_id) {
            Some(layer) => {
                layer.element_ids.push(element_id);
                Ok(())
            }
            None => Err(DocumentError::NotFound(layer_id)),
        }
    }

    pub fn layer_of(&self, element_id: ElementId) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|l| l.element_ids.contains(&element_id))
    }

    // Persistence.

    /// Serialize to the version-2 project format.
    pub fn save(&self, factory: &ElementFactory) -> Value {
        let records: Vec<Value> = self
            .render_order()
            .iter()
            .filter_map(|id| self.elements.get(id))
            .map(|element| factory.to_record(element))
            .collect();
        let z_order: Vec<String> = self.z_order.iter().map(ElementId::to_string).collect();
        let layers: Vec<Value> = self
            .layers
            .iter()
            .map(|layer| {
                json!({
                    "id": layer.id.to_string(),
                    "name": layer.name,
                    "visible": layer.visible,
                    "locked": layer.locked,
                    "elements": layer.element_ids.iter().map(ElementId::to_string).collect::<Vec<_>>(),
                })
            })
            .collect();
        let saved_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        json!({
            "version": FORMAT_VERSION,
            "name": self.name,
            "saved_at": saved_at,
            "background": self.background_ref,
            "elements": records,
            "z_order": z_order,
            "layers": layers,
        })
    }

    /// Load a project file. All-or-nothing: any structural error leaves
    /// no partial document behind. Repairable issues (orphaned elements,
    /// odd fields inside records) come back as diagnostics instead.
    pub fn load(
        value: &Value,
        factory: &ElementFactory,
    ) -> Result<(Document, Vec<LoadDiagnostic>), LoadError> {
        let version = read_version(value)?;
        if version > FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion(version));
        }
        let migrated;
        let value = if version < FORMAT_VERSION {
            log::info!("migrating project file from version {version}");
            migrated = migrate_v1(value)?;
            &migrated
        } else {
            value
        };
        let obj = value
            .as_object()
            .ok_or_else(|| LoadError::Malformed("project file is not an object".into()))?;

        let mut document = Document::new(
            obj.get("name")
                .and_then(Value::as_str)
                .unwrap_or("Untitled")
                .to_string(),
        );
        document.background_ref = obj
            .get("background")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut diagnostics = Vec::new();
        let records = obj
            .get("elements")
            .and_then(Value::as_array)
            .ok_or_else(|| LoadError::Malformed("missing `elements` array".into()))?;
        for record in records {
            let (element, diags) = factory.from_record(record)?;
            diagnostics.extend(diags);
            let id = element.id();
            if document.elements.insert(id, element).is_some() {
                return Err(LoadError::InvalidStructure(format!(
                    "duplicate element id {id}"
                )));
            }
        }

        // Rebuild the parent map from group children and validate the
        // containment forest before trusting it.
        for (id, element) in &document.elements {
            if let Some(group) = element.as_group() {
                for child in &group.children {
                    if !document.elements.contains_key(child) {
                        return Err(LoadError::InvalidStructure(format!(
                            "group {id} references missing element {child}"
                        )));
                    }
                    if document.parents.insert(*child, *id).is_some() {
                        return Err(LoadError::InvalidStructure(format!(
                            "element {child} belongs to more than one group"
                        )));
                    }
                }
            }
        }
        for id in document.elements.keys() {
            let mut seen = HashSet::new();
            let mut cursor = *id;
            while let Some(parent) = document.parents.get(&cursor).copied() {
                if !seen.insert(parent) {
                    return Err(LoadError::InvalidStructure(
                        "group containment cycle".into(),
                    ));
                }
                cursor = parent;
            }
        }

        let mut placed = HashSet::new();
        if let Some(order) = obj.get("z_order").and_then(Value::as_array) {
            for entry in order {
                let id = entry
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| LoadError::Malformed("z_order entry is not an id".into()))?;
                if !document.elements.contains_key(&id) {
                    return Err(LoadError::InvalidStructure(format!(
                        "z_order references missing element {id}"
                    )));
                }
                if document.parents.contains_key(&id) {
                    return Err(LoadError::InvalidStructure(format!(
                        "z_order contains grouped element {id}"
                    )));
                }
                if !placed.insert(id) {
                    return Err(LoadError::InvalidStructure(format!(
                        "z_order lists element {id} twice"
                    )));
                }
                document.z_order.push(id);
            }
        }
        // Elements that are neither in the z-order nor grouped are
        // recovered at the front instead of dropped.
        let mut orphans: Vec<ElementId> = document
            .elements
            .keys()
            .filter(|id| !placed.contains(*id) && !document.parents.contains_key(*id))
            .copied()
            .collect();
        orphans.sort();
        for id in orphans {
            diagnostics.push(LoadDiagnostic {
                field: "z_order".into(),
                message: format!("element {id} missing from z_order, placed at front"),
            });
            document.z_order.push(id);
        }

        if let Some(layers) = obj.get("layers").and_then(Value::as_array) {
            for entry in layers {
                let Some(layer_obj) = entry.as_object() else {
                    diagnostics.push(LoadDiagnostic {
                        field: "layers".into(),
                        message: "skipped malformed layer entry".into(),
                    });
                    continue;
                };
                let mut layer = Layer::new(
                    layer_obj
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("Layer"),
                );
                if let Some(id) = layer_obj
                    .get("id")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok())
                {
                    layer.id = id;
                }
                layer.visible = layer_obj
                    .get("visible")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                layer.locked = layer_obj
                    .get("locked")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if let Some(ids) = layer_obj.get("elements").and_then(Value::as_array) {
                    for raw in ids {
                        match raw.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                            Some(id) if document.elements.contains_key(&id) => {
                                layer.element_ids.push(id)
                            }
                            _ => diagnostics.push(LoadDiagnostic {
                                field: "layers".into(),
                                message: "skipped layer member that does not exist".into(),
                            }),
                        }
                    }
                }
                document.layers.push(layer);
            }
        }

        Ok((document, diagnostics))
    }
}

// Touching counts as overlapping, so a marquee tangent to an edge
// still picks the element up.
fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

fn anchor_corner(bounds: Rect, dragged: Corner) -> Point {
    match dragged {
        Corner::TopLeft => Point::new(bounds.x1, bounds.y1),
        Corner::TopRight => Point::new(bounds.x0, bounds.y1),
        Corner::BottomRight => Point::new(bounds.x0, bounds.y0),
        Corner::BottomLeft => Point::new(bounds.x1, bounds.y0),
    }
}

/// Versions are numeric from 2 on; version 1 wrote a dotted string.
fn read_version(value: &Value) -> Result<u64, LoadError> {
    let obj = value
        .as_object()
        .ok_or_else(|| LoadError::Malformed("project file is not an object".into()))?;
    match obj.get("version") {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| LoadError::Malformed("version is not a positive integer".into())),
        Some(Value::String(s)) if s.starts_with("1.") => Ok(1),
        Some(other) => Err(LoadError::Malformed(format!(
            "unrecognized version `{other}`"
        ))),
        None => Err(LoadError::Malformed("missing `version` field".into())),
    }
}

/// Rewrite a version-1 project into the version-2 shape. Pure record
/// surgery: element semantics are untouched, only the encoding changes
/// (pen/brush split into style, top-level x/y into a transform block,
/// degrees into radians).
fn migrate_v1(value: &Value) -> Result<Value, LoadError> {
    let obj = value
        .as_object()
        .ok_or_else(|| LoadError::Malformed("project file is not an object".into()))?;
    let records = obj
        .get("elements")
        .and_then(Value::as_array)
        .ok_or_else(|| LoadError::Malformed("missing `elements` array".into()))?;
    let elements: Vec<Value> = records.iter().map(migrate_v1_record).collect();
    // Version 1 drew in element-list order, so that order becomes the
    // z-order. Grouped children stay out of the top-level list.
    let mut grouped: HashSet<&str> = HashSet::new();
    for record in &elements {
        if let Some(children) = record.get("children").and_then(Value::as_array) {
            grouped.extend(children.iter().filter_map(Value::as_str));
        }
    }
    let z_order: Vec<Value> = elements
        .iter()
        .filter_map(|record| record.get("id").and_then(Value::as_str))
        .filter(|id| !grouped.contains(id))
        .map(|id| Value::String(id.to_string()))
        .collect();
    Ok(json!({
        "version": FORMAT_VERSION,
        "name": obj.get("name").and_then(Value::as_str).unwrap_or("Untitled"),
        "background": obj
            .get("background")
            .or_else(|| obj.get("background_image"))
            .and_then(Value::as_str),
        "elements": elements,
        "z_order": z_order,
        // Version 1 had no layers.
    }))
}

fn migrate_v1_record(record: &Value) -> Value {
    let Some(obj) = record.as_object() else {
        return record.clone();
    };
    let mut out = serde_json::Map::new();
    if let Some(tag) = obj.get("type") {
        out.insert("type".into(), tag.clone());
    }
    if let Some(id) = obj.get("id") {
        out.insert("id".into(), id.clone());
    }

    let x = obj.get("x").and_then(Value::as_f64).unwrap_or(0.0);
    let y = obj.get("y").and_then(Value::as_f64).unwrap_or(0.0);
    let rotation_deg = obj.get("rotation").and_then(Value::as_f64).unwrap_or(0.0);
    out.insert(
        "transform".into(),
        json!({
            "position": [x, y],
            "rotation": rotation_deg.to_radians(),
            "scale": obj.get("scale").and_then(Value::as_f64).unwrap_or(1.0),
        }),
    );

    let mut style = serde_json::Map::new();
    if let Some(pen) = obj.get("pen").and_then(Value::as_object) {
        if let Some(color) = pen.get("color") {
            style.insert("stroke_color".into(), color.clone());
        }
        if let Some(width) = pen.get("width") {
            style.insert("stroke_width".into(), width.clone());
        }
        if let Some(code) = pen.get("style") {
            style.insert("stroke_style".into(), code.clone());
        }
    }
    if let Some(brush) = obj.get("brush").and_then(Value::as_object) {
        // Brush style 0 is "no brush" in the legacy encoding.
        let filled = brush.get("style").and_then(Value::as_i64).unwrap_or(1) != 0;
        if filled {
            if let Some(color) = brush.get("color") {
                style.insert("fill_color".into(), color.clone());
            }
        }
    }
    out.insert("style".into(), Value::Object(style));

    // Geometry keys that were renamed between the formats.
    for (old, new) in [("text", "content"), ("image_path", "source")] {
        if let Some(v) = obj.get(old) {
            out.insert(new.into(), v.clone());
        }
    }
    if let (Some(x1), Some(y1)) = (
        obj.get("x1").and_then(Value::as_f64),
        obj.get("y1").and_then(Value::as_f64),
    ) {
        out.insert("start".into(), json!([x1, y1]));
    }
    if let (Some(x2), Some(y2)) = (
        obj.get("x2").and_then(Value::as_f64),
        obj.get("y2").and_then(Value::as_f64),
    ) {
        out.insert("end".into(), json!([x2, y2]));
    }
    if let Some(font) = obj.get("font").and_then(Value::as_object) {
        if let Some(family) = font.get("family") {
            out.insert("font_family".into(), family.clone());
        }
        if let Some(size) = font.get("size") {
            out.insert("font_size".into(), size.clone());
        }
        if let Some(bold) = font.get("bold") {
            out.insert("bold".into(), bold.clone());
        }
        if let Some(italic) = font.get("italic") {
            out.insert("italic".into(), italic.clone());
        }
    }

    // Everything else passes through untouched; the record parser
    // ignores what it does not know.
    for (key, v) in obj {
        if matches!(
            key.as_str(),
            "type" | "id" | "x" | "y" | "rotation" | "scale" | "pen" | "brush" | "text" | "font"
                | "x1" | "y1" | "x2" | "y2" | "image_path"
        ) {
            continue;
        }
        out.entry(key.clone()).or_insert_with(|| v.clone());
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Ellipse, Line, Rectangle};
    use crate::handles::ResizeConstraints;

    fn rect_at(x: f64, y: f64, w: f64, h: f64) -> Element {
        Element::Rectangle(Rectangle::new(Point::new(x, y), w, h))
    }

    #[test]
    fn test_insert_and_z_order() {
        let mut doc = Document::new("test");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        let b = doc.insert(rect_at(5.0, 5.0, 10.0, 10.0));
        assert_eq!(doc.z_order(), &[a, b]);
        doc.send_to_back(b).unwrap();
        assert_eq!(doc.z_order(), &[b, a]);
        doc.bring_forward(b).unwrap();
        assert_eq!(doc.z_order(), &[a, b]);
    }

    #[test]
    fn test_top_hit_prefers_front() {
        let mut doc = Document::new("test");
        let mut filled = Rectangle::new(Point::ZERO, 20.0, 20.0);
        filled.style.fill_color = Some(crate::elements::Color::white());
        let back = doc.insert(Element::Rectangle(filled.clone()));
        filled.id = Uuid::new_v4();
        let front = doc.insert(Element::Rectangle(filled));
        assert_eq!(doc.top_hit(Point::new(10.0, 10.0), 2.0), Some(front));
        doc.bring_to_front(back).unwrap();
        assert_eq!(doc.top_hit(Point::new(10.0, 10.0), 2.0), Some(back));
    }

    #[test]
    fn test_marquee_hits_intersecting_elements() {
        let mut doc = Document::new("test");
        let inside = doc.insert(rect_at(10.0, 10.0, 20.0, 20.0));
        let straddling = doc.insert(rect_at(90.0, 10.0, 40.0, 20.0));
        let outside = doc.insert(rect_at(200.0, 200.0, 20.0, 20.0));
        let hits = doc.elements_in_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(hits, vec![inside, straddling]);
        assert!(!hits.contains(&outside));
    }

    #[test]
    fn test_marquee_tangent_to_edge_still_hits() {
        let mut doc = Document::new("test");
        let id = doc.insert(rect_at(10.0, 10.0, 20.0, 20.0));
        // Marquee left edge exactly on the element's right edge.
        let hits = doc.elements_in_rect(Rect::new(30.0, 10.0, 50.0, 30.0));
        assert_eq!(hits, vec![id]);
    }

    #[test]
    fn test_group_takes_frontmost_position_and_preserves_order() {
        let mut doc = Document::new("test");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        let b = doc.insert(rect_at(20.0, 0.0, 10.0, 10.0));
        let c = doc.insert(rect_at(40.0, 0.0, 10.0, 10.0));
        let group = doc.group_elements(&[c, a]).unwrap();
        assert_eq!(doc.parent_of(a), Some(group));
        assert_eq!(doc.parent_of(c), Some(group));
        assert!(doc.parent_of(b).is_none());
        // b keeps its slot; the group sits where the frontmost member was.
        assert_eq!(doc.z_order(), &[b, group]);
        let children = doc.get(group).unwrap().as_group().unwrap().children.clone();
        assert_eq!(children, vec![a, c]);
    }

    #[test]
    fn test_ungroup_restores_children_at_group_position() {
        let mut doc = Document::new("test");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        let b = doc.insert(rect_at(20.0, 0.0, 10.0, 10.0));
        let c = doc.insert(rect_at(40.0, 0.0, 10.0, 10.0));
        let group = doc.group_elements(&[a, b]).unwrap();
        let freed = doc.ungroup(group).unwrap();
        assert_eq!(freed, vec![a, b]);
        assert!(!doc.contains(group));
        assert!(doc.parent_of(a).is_none());
        assert_eq!(doc.z_order(), &[a, b, c]);
    }

    #[test]
    fn test_group_rejects_single_element() {
        let mut doc = Document::new("test");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        assert_eq!(doc.group_elements(&[a]), Err(DocumentError::InvalidGroup));
    }

    #[test]
    fn test_remove_group_removes_subtree() {
        let mut doc = Document::new("test");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        let b = doc.insert(rect_at(20.0, 0.0, 10.0, 10.0));
        let group = doc.group_elements(&[a, b]).unwrap();
        let removed = doc.remove(group);
        assert_eq!(removed.len(), 3);
        assert!(doc.is_empty());
        assert!(doc.z_order().is_empty());
    }

    #[test]
    fn test_group_bounds_union() {
        let mut doc = Document::new("test");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        let b = doc.insert(rect_at(50.0, 50.0, 10.0, 10.0));
        let group = doc.group_elements(&[a, b]).unwrap();
        let bounds = doc.bounds_of(group).unwrap();
        assert_eq!(bounds, Rect::new(0.0, 0.0, 60.0, 60.0));

        // Derived bounds track child mutations immediately.
        doc.get_mut(b).unwrap().translate(Vec2::new(40.0, 0.0));
        let bounds = doc.bounds_of(group).unwrap();
        assert_eq!(bounds, Rect::new(0.0, 0.0, 100.0, 60.0));
    }

    #[test]
    fn test_group_translate_moves_children() {
        let mut doc = Document::new("test");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        let b = doc.insert(rect_at(20.0, 0.0, 10.0, 10.0));
        let group = doc.group_elements(&[a, b]).unwrap();
        doc.translate_element(group, Vec2::new(5.0, 7.0)).unwrap();
        let pos = doc.get(a).unwrap().visual_position();
        assert!((pos.x - 5.0).abs() < 1e-9);
        assert!((pos.y - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_resize_rescales_children_proportionally() {
        let mut doc = Document::new("test");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        let b = doc.insert(rect_at(40.0, 40.0, 10.0, 10.0));
        let group = doc.group_elements(&[a, b]).unwrap();
        // Bounds are 50x50; drag bottom-right by (50, 50) to double it.
        doc.resize_element(
            group,
            HandleKind::Corner(Corner::BottomRight),
            Vec2::new(50.0, 50.0),
            &ResizeConstraints::default(),
        )
        .unwrap();
        let bounds = doc.bounds_of(group).unwrap();
        assert!((bounds.width() - 100.0).abs() < 1e-9);
        assert!((bounds.height() - 100.0).abs() < 1e-9);
        let b_pos = doc.get(b).unwrap().visual_position();
        assert!((b_pos.x - 80.0).abs() < 1e-9);
        assert!((b_pos.y - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_load_round_trip() {
        let factory = ElementFactory::new();
        let mut doc = Document::new("round trip");
        let a = doc.insert(rect_at(0.0, 0.0, 10.0, 10.0));
        let b = doc.insert(Element::Ellipse(Ellipse::new(Point::new(30.0, 30.0), 8.0, 5.0)));
        doc.insert(Element::Line(Line::new(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
        )));
        doc.group_elements(&[a, b]).unwrap();
        doc.background_ref = Some("bg.png".into());
        let layer = doc.add_layer("ink");
        doc.assign_to_layer(a, layer).unwrap();

        let saved = doc.save(&factory);
        let (loaded, diags) = Document::load(&saved, &factory).unwrap();
        assert!(diags.is_empty());
        assert_eq!(loaded.len(), doc.len());
        assert_eq!(loaded.z_order(), doc.z_order());
        assert_eq!(loaded.parent_of(a), doc.parent_of(a));
        assert_eq!(loaded.background_ref, doc.background_ref);
        assert_eq!(loaded.layers.len(), 1);
        assert_eq!(loaded.layers[0].element_ids, vec![a]);
    }

    #[test]
    fn test_load_rejects_future_version() {
        let factory = ElementFactory::new();
        let file = json!({"version": 99, "elements": []});
        assert!(matches!(
            Document::load(&file, &factory),
            Err(LoadError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_load_is_all_or_nothing() {
        let factory = ElementFactory::new();
        let good = json!({
            "type": "rectangle",
            "id": Uuid::new_v4().to_string(),
            "transform": {"position": [0.0, 0.0]},
            "style": {},
            "width": 10.0, "height": 10.0,
        });
        let bad = json!({"type": "wedge"});
        let file = json!({"version": 2, "elements": [good, bad]});
        assert!(Document::load(&file, &factory).is_err());
    }

    #[test]
    fn test_load_rejects_containment_cycle() {
        let factory = ElementFactory::new();
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();
        let file = json!({
            "version": 2,
            "elements": [
                {"type": "group", "id": a, "children": [b.clone()]},
                {"type": "group", "id": b, "children": [a.clone()]},
            ],
            "z_order": [],
        });
        assert!(matches!(
            Document::load(&file, &factory),
            Err(LoadError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_load_recovers_orphan_with_diagnostic() {
        let factory = ElementFactory::new();
        let id = Uuid::new_v4().to_string();
        let file = json!({
            "version": 2,
            "elements": [{
                "type": "rectangle",
                "id": id,
                "transform": {"position": [0.0, 0.0]},
                "style": {},
                "width": 10.0, "height": 10.0,
            }],
            "z_order": [],
        });
        let (doc, diags) = Document::load(&file, &factory).unwrap();
        assert_eq!(doc.z_order().len(), 1);
        assert!(diags.iter().any(|d| d.field == "z_order"));
    }

    #[test]
    fn test_migrate_v1_project() {
        let factory = ElementFactory::new();
        let file = json!({
            "version": "1.0.0",
            "name": "legacy",
            "elements": [
                {
                    "type": "rectangle",
                    "id": Uuid::new_v4().to_string(),
                    "x": 10.0, "y": 20.0,
                    "width": 100.0, "height": 50.0,
                    "rotation": 90.0,
                    "pen": {"color": "red", "width": 3, "style": 2},
                    "brush": {"color": "yellow", "style": 1},
                },
                {
                    "type": "circle",
                    "id": Uuid::new_v4().to_string(),
                    "x": 0.0, "y": 0.0,
                    "radius": 25.0,
                    "pen": {"color": "#000000", "width": 1, "style": 1},
                    "brush": {"color": "black", "style": 0},
                },
            ],
        });
        let (doc, _) = Document::load(&file, &factory).unwrap();
        assert_eq!(doc.len(), 2);
        let rect = doc
            .z_order()
            .iter()
            .find_map(|id| match doc.get(*id) {
                Some(Element::Rectangle(r)) => Some(r.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            rect.style.stroke_color,
            crate::elements::Color::new(255, 0, 0, 255)
        );
        assert_eq!(
            rect.style.stroke_style,
            crate::elements::StrokeStyle::Dashed
        );
        assert!((rect.transform.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        let circle = doc
            .z_order()
            .iter()
            .find_map(|id| match doc.get(*id) {
                Some(Element::Ellipse(e)) => Some(e.clone()),
                _ => None,
            })
            .unwrap();
        assert!((circle.radius_x - 25.0).abs() < f64::EPSILON);
        assert!(circle.style.fill_color.is_none());
    }

    #[test]
    fn test_migrate_v1_keeps_draw_order() {
        let factory = ElementFactory::new();
        // Ids chosen so sorting by id would reverse the list order.
        let first = "ffffffff-ffff-4fff-8fff-ffffffffffff";
        let second = "00000000-0000-4000-8000-000000000000";
        let file = json!({
            "version": "1.0.0",
            "name": "legacy",
            "elements": [
                {"type": "rectangle", "id": first, "x": 0.0, "y": 0.0,
                 "width": 10.0, "height": 10.0},
                {"type": "rectangle", "id": second, "x": 20.0, "y": 0.0,
                 "width": 10.0, "height": 10.0},
            ],
        });
        let (doc, diags) = Document::load(&file, &factory).unwrap();
        let order: Vec<String> = doc.z_order().iter().map(ElementId::to_string).collect();
        assert_eq!(order, vec![first.to_string(), second.to_string()]);
        assert!(!diags.iter().any(|d| d.field == "z_order"));
    }
}
