//! Selection handles and interactive resize.
//!
//! Handles are derived on demand from the element's current geometry, so
//! they can never go stale. Resize works in the element's local frame:
//! the scene-space drag delta is mapped through the inverse rotation and
//! scale, the dragged corner or edge moves in local coordinates, and the
//! opposite handle is re-anchored afterwards so it stays put in the scene
//! even for rotated or scaled elements.

use crate::elements::Element;
use kurbo::{Point, Rect, Vec2};

/// Corner of an element's local bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub fn opposite(&self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomRight => Corner::TopLeft,
            Corner::BottomLeft => Corner::TopRight,
        }
    }

    fn point(&self, rect: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(rect.x0, rect.y0),
            Corner::TopRight => Point::new(rect.x1, rect.y0),
            Corner::BottomRight => Point::new(rect.x1, rect.y1),
            Corner::BottomLeft => Point::new(rect.x0, rect.y1),
        }
    }

    /// Sign of the width/height change per unit of local drag.
    fn signs(&self) -> (f64, f64) {
        match self {
            Corner::TopLeft => (-1.0, -1.0),
            Corner::TopRight => (1.0, -1.0),
            Corner::BottomRight => (1.0, 1.0),
            Corner::BottomLeft => (-1.0, 1.0),
        }
    }
}

/// Edge of an element's local bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    pub fn opposite(&self) -> Edge {
        match self {
            Edge::Top => Edge::Bottom,
            Edge::Right => Edge::Left,
            Edge::Bottom => Edge::Top,
            Edge::Left => Edge::Right,
        }
    }

    fn midpoint(&self, rect: Rect) -> Point {
        match self {
            Edge::Top => Point::new(rect.center().x, rect.y0),
            Edge::Right => Point::new(rect.x1, rect.center().y),
            Edge::Bottom => Point::new(rect.center().x, rect.y1),
            Edge::Left => Point::new(rect.x0, rect.center().y),
        }
    }

    fn signs(&self) -> (f64, f64) {
        match self {
            Edge::Top => (0.0, -1.0),
            Edge::Right => (1.0, 0.0),
            Edge::Bottom => (0.0, 1.0),
            Edge::Left => (-1.0, 0.0),
        }
    }
}

/// What a handle does when dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Corner(Corner),
    Edge(Edge),
    /// Line endpoint, by index (0 = start, 1 = end).
    Endpoint(usize),
    Rotate,
}

/// A grab point in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub kind: HandleKind,
    pub position: Point,
}

/// Constraints applied while resizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeConstraints {
    /// Lock the width/height ratio, following the axis dragged furthest.
    pub keep_aspect: bool,
    /// Smallest width or height a resize may produce.
    pub min_extent: f64,
}

impl Default for ResizeConstraints {
    fn default() -> Self {
        Self {
            keep_aspect: false,
            min_extent: 1.0,
        }
    }
}

/// Offset of the rotate handle above the top edge, in local units.
const ROTATE_OFFSET: f64 = 24.0;

/// Handles for a single element, at their current scene positions.
///
/// Lines get endpoint handles; groups are handled by the document, which
/// knows their derived bounds.
pub fn handles_for(element: &Element) -> Vec<Handle> {
    let place = |local: Point| element.transform().to_scene(local, element.pivot());
    match element {
        Element::Line(line) => vec![
            Handle {
                kind: HandleKind::Endpoint(0),
                position: place(line.start),
            },
            Handle {
                kind: HandleKind::Endpoint(1),
                position: place(line.end),
            },
        ],
        Element::Group(_) => Vec::new(),
        _ => {
            let bounds = element.local_bounds();
            let mut handles = Vec::with_capacity(9);
            for corner in [
                Corner::TopLeft,
                Corner::TopRight,
                Corner::BottomRight,
                Corner::BottomLeft,
            ] {
                handles.push(Handle {
                    kind: HandleKind::Corner(corner),
                    position: place(corner.point(bounds)),
                });
            }
            for edge in [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left] {
                handles.push(Handle {
                    kind: HandleKind::Edge(edge),
                    position: place(edge.midpoint(bounds)),
                });
            }
            handles.push(Handle {
                kind: HandleKind::Rotate,
                position: place(Point::new(bounds.center().x, bounds.y0 - ROTATE_OFFSET)),
            });
            handles
        }
    }
}

/// Apply a drag of `delta` (scene units) on the given handle.
///
/// Undersized results are clamped to `min_extent` rather than rejected,
/// so a wild drag leaves the element small but valid.
pub fn resize(element: &mut Element, kind: HandleKind, delta: Vec2, constraints: &ResizeConstraints) {
    match kind {
        HandleKind::Rotate => {}
        HandleKind::Endpoint(index) => resize_endpoint(element, index, delta),
        HandleKind::Corner(_) | HandleKind::Edge(_) => resize_box(element, kind, delta, constraints),
    }
}

fn resize_box(element: &mut Element, kind: HandleKind, delta: Vec2, constraints: &ResizeConstraints) {
    let bounds = element.local_bounds();
    let (w, h) = (bounds.width(), bounds.height());
    if w <= 0.0 || h <= 0.0 {
        return;
    }
    let local_delta = element.transform().delta_to_local(delta);
    let (sx, sy) = match kind {
        HandleKind::Corner(c) => c.signs(),
        HandleKind::Edge(e) => e.signs(),
        _ => return,
    };
    let mut new_w = if sx == 0.0 { w } else { w + sx * local_delta.x };
    let mut new_h = if sy == 0.0 { h } else { h + sy * local_delta.y };
    new_w = new_w.max(constraints.min_extent);
    new_h = new_h.max(constraints.min_extent);

    if constraints.keep_aspect {
        if matches!(kind, HandleKind::Corner(_)) {
            // Follow the axis that moved the most, relative to its extent.
            let rel_x = (new_w - w).abs() / w;
            let rel_y = (new_h - h).abs() / h;
            if rel_x >= rel_y {
                new_h = new_w * h / w;
            } else {
                new_w = new_h * w / h;
            }
        } else if sx == 0.0 {
            new_w = new_h * w / h;
        } else {
            new_h = new_w * h / w;
        }
        new_w = new_w.max(constraints.min_extent);
        new_h = new_h.max(constraints.min_extent);
    }

    let anchor_scene = anchor_position(element, kind);
    element.rescale(new_w / w, new_h / h);
    let moved = anchor_position(element, kind);
    element.transform_mut().position += anchor_scene - moved;
}

/// Scene position of the handle opposite the one being dragged. Keeping
/// this point fixed is what makes resize feel anchored under rotation.
fn anchor_position(element: &Element, kind: HandleKind) -> Point {
    let bounds = element.local_bounds();
    let local = match kind {
        HandleKind::Corner(c) => c.opposite().point(bounds),
        HandleKind::Edge(e) => e.opposite().midpoint(bounds),
        _ => bounds.center(),
    };
    element.transform().to_scene(local, element.pivot())
}

fn resize_endpoint(element: &mut Element, index: usize, delta: Vec2) {
    let Element::Line(line) = element else {
        return;
    };
    // Moving an endpoint moves the midpoint pivot, so pin the other end.
    let other_local = if index == 0 { line.end } else { line.start };
    let other_scene = line.transform.to_scene(other_local, line.midpoint());
    let local_delta = line.transform.delta_to_local(delta);
    if index == 0 {
        line.start += local_delta;
    } else {
        line.end += local_delta;
    }
    let moved = line.transform.to_scene(other_local, line.midpoint());
    line.transform.position += other_scene - moved;
}

/// Convenience used by hit-testing in the host: true when a scene point
/// is within `radius` of the handle.
pub fn handle_hit(handle: &Handle, point: Point, radius: f64) -> bool {
    handle.position.distance(point) <= radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Ellipse, Line, Rectangle};
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_corner_resize_grows_and_anchors_opposite() {
        let mut el = Element::Rectangle(Rectangle::new(Point::new(10.0, 10.0), 100.0, 50.0));
        let anchor_before = anchor_position(&el, HandleKind::Corner(Corner::BottomRight));
        resize(
            &mut el,
            HandleKind::Corner(Corner::BottomRight),
            Vec2::new(20.0, 10.0),
            &ResizeConstraints::default(),
        );
        let bounds = el.local_bounds();
        assert!((bounds.width() - 120.0).abs() < EPS);
        assert!((bounds.height() - 60.0).abs() < EPS);
        let anchor_after = anchor_position(&el, HandleKind::Corner(Corner::BottomRight));
        assert!((anchor_before.x - anchor_after.x).abs() < EPS);
        assert!((anchor_before.y - anchor_after.y).abs() < EPS);
    }

    #[test]
    fn test_resize_clamps_to_min_extent() {
        let mut el = Element::Rectangle(Rectangle::new(Point::ZERO, 30.0, 30.0));
        resize(
            &mut el,
            HandleKind::Corner(Corner::BottomRight),
            Vec2::new(-500.0, -500.0),
            &ResizeConstraints::default(),
        );
        let bounds = el.local_bounds();
        assert!((bounds.width() - 1.0).abs() < EPS);
        assert!((bounds.height() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_aspect_lock_follows_larger_axis() {
        let mut el = Element::Rectangle(Rectangle::new(Point::ZERO, 100.0, 50.0));
        resize(
            &mut el,
            HandleKind::Corner(Corner::BottomRight),
            Vec2::new(100.0, 5.0),
            &ResizeConstraints {
                keep_aspect: true,
                ..Default::default()
            },
        );
        let bounds = el.local_bounds();
        assert!((bounds.width() - 200.0).abs() < EPS);
        assert!((bounds.height() - 100.0).abs() < EPS);
    }

    #[test]
    fn test_rotated_resize_keeps_anchor_in_scene() {
        let mut el = Element::Rectangle(Rectangle::new(Point::new(40.0, 20.0), 80.0, 40.0));
        el.set_rotation(FRAC_PI_2);
        el.set_scale(1.5);
        let kind = HandleKind::Corner(Corner::TopLeft);
        let anchor_before = anchor_position(&el, kind);
        resize(&mut el, kind, Vec2::new(-12.0, 7.0), &ResizeConstraints::default());
        let anchor_after = anchor_position(&el, kind);
        assert!((anchor_before.x - anchor_after.x).abs() < 1e-6);
        assert!((anchor_before.y - anchor_after.y).abs() < 1e-6);
    }

    #[test]
    fn test_edge_resize_single_axis() {
        let mut el = Element::Ellipse(Ellipse::new(Point::ZERO, 40.0, 20.0));
        resize(
            &mut el,
            HandleKind::Edge(Edge::Right),
            Vec2::new(20.0, 999.0),
            &ResizeConstraints::default(),
        );
        let bounds = el.local_bounds();
        assert!((bounds.width() - 100.0).abs() < EPS);
        assert!((bounds.height() - 40.0).abs() < EPS);
    }

    #[test]
    fn test_line_endpoint_drag_pins_other_end() {
        let mut el = Element::Line(Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0)));
        let end_before = match &el {
            Element::Line(l) => l.transform.to_scene(l.end, l.midpoint()),
            _ => unreachable!(),
        };
        resize(
            &mut el,
            HandleKind::Endpoint(0),
            Vec2::new(-30.0, 40.0),
            &ResizeConstraints::default(),
        );
        let (start_scene, end_after) = match &el {
            Element::Line(l) => (
                l.transform.to_scene(l.start, l.midpoint()),
                l.transform.to_scene(l.end, l.midpoint()),
            ),
            _ => unreachable!(),
        };
        assert!((end_before.x - end_after.x).abs() < EPS);
        assert!((end_before.y - end_after.y).abs() < EPS);
        assert!((start_scene.x + 30.0).abs() < EPS);
        assert!((start_scene.y - 40.0).abs() < EPS);
    }

    #[test]
    fn test_handles_regenerate_from_geometry() {
        let mut el = Element::Rectangle(Rectangle::new(Point::ZERO, 50.0, 50.0));
        let before = handles_for(&el);
        el.translate(Vec2::new(100.0, 0.0));
        let after = handles_for(&el);
        assert_eq!(before.len(), after.len());
        assert!((after[0].position.x - before[0].position.x - 100.0).abs() < EPS);
    }
}
