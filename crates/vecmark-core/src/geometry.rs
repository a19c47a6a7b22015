//! Coordinate-space math shared by all elements.
//!
//! Every element lives in three spaces:
//! - **local**: the element's own frame (geometry as authored),
//! - **scene**: local mapped by rotation, then scale, then translation,
//! - **visual**: the top-left corner of the scene-space axis-aligned
//!   bounding box. This is what a property panel shows, so it may be
//!   negative.
//!
//! The rotation/scale pivot defaults to the center of the local bounds;
//! variants may choose another pivot (a line pivots on its midpoint).

use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Placement of an element in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation applied after rotation and scale.
    pub position: Point,
    /// Rotation angle in radians, around the pivot.
    #[serde(default)]
    pub rotation: f64,
    /// Uniform scale factor, around the pivot.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            rotation: 0.0,
            scale: 1.0,
        }
    }
}

impl Transform {
    /// Smallest scale factor accepted; setters clamp so the affine
    /// always stays invertible.
    pub const MIN_SCALE: f64 = 1e-6;

    /// Create a transform at the given position with no rotation or scale.
    pub fn at(position: Point) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// The local-to-scene affine for the given pivot.
    ///
    /// Composition order is rotation, then scale, then translation,
    /// with rotation and scale applied around the pivot.
    pub fn affine(&self, pivot: Point) -> Affine {
        Affine::translate(self.position.to_vec2())
            * Affine::translate(pivot.to_vec2())
            * Affine::rotate(self.rotation)
            * Affine::scale(self.scale.max(Self::MIN_SCALE))
            * Affine::translate(-pivot.to_vec2())
    }

    /// Map a local point into scene space.
    pub fn to_scene(&self, local: Point, pivot: Point) -> Point {
        self.affine(pivot) * local
    }

    /// Map a scene point back into local space. Exact inverse of
    /// [`Transform::to_scene`].
    pub fn to_local(&self, scene: Point, pivot: Point) -> Point {
        self.affine(pivot).inverse() * scene
    }

    /// Map a scene-space delta into the unrotated, unscaled local frame.
    pub fn delta_to_local(&self, delta: Vec2) -> Vec2 {
        let s = self.scale.max(Self::MIN_SCALE);
        let cos = self.rotation.cos();
        let sin = self.rotation.sin();
        Vec2::new(
            (delta.x * cos + delta.y * sin) / s,
            (-delta.x * sin + delta.y * cos) / s,
        )
    }

    /// Set the scale, clamping away from zero so inversion stays exact.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale.max(Self::MIN_SCALE);
    }
}

/// Axis-aligned bounding box of a local rect mapped into scene space.
pub fn scene_bounds(local: Rect, transform: &Transform, pivot: Point) -> Rect {
    let affine = transform.affine(pivot);
    let corners = [
        affine * Point::new(local.x0, local.y0),
        affine * Point::new(local.x1, local.y0),
        affine * Point::new(local.x1, local.y1),
        affine * Point::new(local.x0, local.y1),
    ];
    let mut x0 = f64::INFINITY;
    let mut y0 = f64::INFINITY;
    let mut x1 = f64::NEG_INFINITY;
    let mut y1 = f64::NEG_INFINITY;
    for p in corners {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    Rect::new(x0, y0, x1, y1)
}

/// Top-left corner of the transformed bounding box, in scene coordinates.
pub fn visual_origin(local: Rect, transform: &Transform, pivot: Point) -> Point {
    let bounds = scene_bounds(local, transform, pivot);
    Point::new(bounds.x0, bounds.y0)
}

/// Translation that moves the visual origin to `target` without touching
/// rotation or scale.
pub fn visual_offset_to(local: Rect, transform: &Transform, pivot: Point, target: Point) -> Vec2 {
    let current = visual_origin(local, transform, pivot);
    target - current
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_identity_round_trip() {
        let t = Transform::default();
        let p = Point::new(13.0, -4.5);
        let scene = t.to_scene(p, Point::ZERO);
        assert!((scene.x - 13.0).abs() < EPS);
        assert!((scene.y + 4.5).abs() < EPS);
        let back = t.to_local(scene, Point::ZERO);
        assert!((back.x - p.x).abs() < EPS);
        assert!((back.y - p.y).abs() < EPS);
    }

    #[test]
    fn test_round_trip_with_rotation_and_scale() {
        let t = Transform {
            position: Point::new(10.0, 20.0),
            rotation: 0.7,
            scale: 2.5,
        };
        let pivot = Point::new(50.0, 25.0);
        let p = Point::new(80.0, 40.0);
        let back = t.to_local(t.to_scene(p, pivot), pivot);
        assert!((back.x - p.x).abs() < EPS);
        assert!((back.y - p.y).abs() < EPS);
    }

    #[test]
    fn test_pivot_is_fixed_point() {
        let t = Transform {
            position: Point::ZERO,
            rotation: 1.2,
            scale: 3.0,
        };
        let pivot = Point::new(5.0, 7.0);
        let mapped = t.to_scene(pivot, pivot);
        assert!((mapped.x - pivot.x).abs() < EPS);
        assert!((mapped.y - pivot.y).abs() < EPS);
    }

    #[test]
    fn test_scene_bounds_quarter_turn() {
        // A 100x50 rect rotated 90 degrees around its center becomes 50x100.
        let local = Rect::new(0.0, 0.0, 100.0, 50.0);
        let t = Transform {
            position: Point::ZERO,
            rotation: FRAC_PI_2,
            scale: 1.0,
        };
        let bounds = scene_bounds(local, &t, local.center());
        assert!((bounds.width() - 50.0).abs() < EPS);
        assert!((bounds.height() - 100.0).abs() < EPS);
        let center = bounds.center();
        assert!((center.x - 50.0).abs() < EPS);
        assert!((center.y - 25.0).abs() < EPS);
    }

    #[test]
    fn test_visual_origin_allows_negative() {
        let local = Rect::new(0.0, 0.0, 100.0, 100.0);
        let t = Transform::at(Point::new(-25.0, -40.0));
        let origin = visual_origin(local, &t, local.center());
        assert!((origin.x + 25.0).abs() < EPS);
        assert!((origin.y + 40.0).abs() < EPS);
    }

    #[test]
    fn test_visual_offset_to() {
        let local = Rect::new(0.0, 0.0, 60.0, 30.0);
        let mut t = Transform {
            position: Point::new(3.0, 4.0),
            rotation: 0.4,
            scale: 1.5,
        };
        let pivot = local.center();
        let offset = visual_offset_to(local, &t, pivot, Point::new(-10.0, 12.0));
        t.position += offset;
        let origin = visual_origin(local, &t, pivot);
        assert!((origin.x + 10.0).abs() < EPS);
        assert!((origin.y - 12.0).abs() < EPS);
    }

    #[test]
    fn test_delta_to_local_undoes_rotation() {
        let t = Transform {
            position: Point::ZERO,
            rotation: FRAC_PI_2,
            scale: 2.0,
        };
        let local = t.delta_to_local(Vec2::new(0.0, 10.0));
        // A downward scene drag maps to +x in the rotated local frame,
        // shrunk by the scale factor.
        assert!((local.x - 5.0).abs() < EPS);
        assert!(local.y.abs() < EPS);
    }
}
