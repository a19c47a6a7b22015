use super::{point_to_segment_dist, ElementId, ElementStyle, PropertyError, PropertyValue};
use crate::geometry::Transform;
use kurbo::{Point, Rect};
use uuid::Uuid;

/// Straight segment between two local endpoints. Rotation and scale pivot
/// on the segment midpoint rather than the bounds center, so a rotated
/// line spins in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub(crate) id: ElementId,
    pub transform: Transform,
    pub style: ElementStyle,
    pub start: Point,
    pub end: Point,
}

impl Line {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform: Transform::default(),
            style: ElementStyle::default(),
            start,
            end,
        }
    }

    pub fn midpoint(&self) -> Point {
        self.start.midpoint(self.end)
    }

    pub fn local_bounds(&self) -> Rect {
        Rect::from_points(self.start, self.end)
    }

    pub fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        let reach = tolerance + self.style.stroke_width / 2.0;
        point_to_segment_dist(point, self.start, self.end) <= reach
    }

    pub fn rescale(&mut self, sx: f64, sy: f64) {
        let origin = self.local_bounds().origin();
        self.start = Point::new(
            origin.x + (self.start.x - origin.x) * sx,
            origin.y + (self.start.y - origin.y) * sy,
        );
        self.end = Point::new(
            origin.x + (self.end.x - origin.x) * sx,
            origin.y + (self.end.y - origin.y) * sy,
        );
    }

    pub fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        match name {
            "start_x" => Ok(PropertyValue::Number(self.start.x)),
            "start_y" => Ok(PropertyValue::Number(self.start.y)),
            "end_x" => Ok(PropertyValue::Number(self.end.x)),
            "end_y" => Ok(PropertyValue::Number(self.end.y)),
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        match name {
            "start_x" => {
                self.start.x = value.as_number(name)?;
                Ok(())
            }
            "start_y" => {
                self.start.y = value.as_number(name)?;
                Ok(())
            }
            "end_x" => {
                self.end.x = value.as_number(name)?;
                Ok(())
            }
            "end_y" => {
                self.end.y = value.as_number(name)?;
                Ok(())
            }
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Element;
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_midpoint_pivot() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let el = Element::Line(line);
        let pivot = el.pivot();
        assert!((pivot.x - 5.0).abs() < EPS);
        assert!(pivot.y.abs() < EPS);
    }

    #[test]
    fn test_rotated_line_spins_in_place() {
        let mut el = Element::Line(Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0)));
        let before = el.scene_bounds().center();
        el.set_rotation(PI);
        let after = el.scene_bounds().center();
        assert!((before.x - after.x).abs() < EPS);
        assert!((before.y - after.y).abs() < EPS);
    }

    #[test]
    fn test_hit_near_segment() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(line.hit_test_local(Point::new(50.0, 2.0), 2.0));
        assert!(!line.hit_test_local(Point::new(50.0, 10.0), 2.0));
    }

    #[test]
    fn test_rescale_anchors_bounds_origin() {
        let mut line = Line::new(Point::new(10.0, 10.0), Point::new(20.0, 30.0));
        line.rescale(2.0, 0.5);
        assert!((line.start.x - 10.0).abs() < EPS);
        assert!((line.start.y - 10.0).abs() < EPS);
        assert!((line.end.x - 30.0).abs() < EPS);
        assert!((line.end.y - 20.0).abs() < EPS);
    }
}
