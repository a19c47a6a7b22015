use super::{ElementId, ElementStyle, PropertyError, PropertyValue};
use crate::geometry::Transform;
use kurbo::{Point, Rect};
use uuid::Uuid;

/// Ellipse centered on its local origin. A circle is the degenerate case
/// with equal radii; legacy files tag those records as `circle` and the
/// factory normalizes them into this variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipse {
    pub(crate) id: ElementId,
    pub transform: Transform,
    pub style: ElementStyle,
    pub radius_x: f64,
    pub radius_y: f64,
}

impl Ellipse {
    /// Smallest radius an ellipse can be resized to.
    pub const MIN_RADIUS: f64 = 0.5;

    pub fn new(center: Point, radius_x: f64, radius_y: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform: Transform::at(center),
            style: ElementStyle::default(),
            radius_x: radius_x.max(Self::MIN_RADIUS),
            radius_y: radius_y.max(Self::MIN_RADIUS),
        }
    }

    pub fn circle(center: Point, radius: f64) -> Self {
        Self::new(center, radius, radius)
    }

    pub fn local_bounds(&self) -> Rect {
        Rect::new(-self.radius_x, -self.radius_y, self.radius_x, self.radius_y)
    }

    pub fn set_radii(&mut self, radius_x: f64, radius_y: f64) {
        self.radius_x = radius_x.max(Self::MIN_RADIUS);
        self.radius_y = radius_y.max(Self::MIN_RADIUS);
    }

    pub fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        // Normalized implicit equation: on the boundary the value is 1.
        let outer = normalized_radius(point, self.radius_x + tolerance, self.radius_y + tolerance);
        if outer > 1.0 {
            return false;
        }
        if self.style.fill_color.is_some() {
            return true;
        }
        let rx = (self.radius_x - tolerance).max(0.0);
        let ry = (self.radius_y - tolerance).max(0.0);
        rx <= 0.0 || ry <= 0.0 || normalized_radius(point, rx, ry) >= 1.0
    }

    pub fn rescale(&mut self, sx: f64, sy: f64) {
        self.set_radii(self.radius_x * sx, self.radius_y * sy);
    }

    pub fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        match name {
            "radius_x" => Ok(PropertyValue::Number(self.radius_x)),
            "radius_y" => Ok(PropertyValue::Number(self.radius_y)),
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        match name {
            "radius_x" => {
                self.set_radii(value.as_number(name)?, self.radius_y);
                Ok(())
            }
            "radius_y" => {
                self.set_radii(self.radius_x, value.as_number(name)?);
                Ok(())
            }
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }
}

fn normalized_radius(point: Point, rx: f64, ry: f64) -> f64 {
    if rx <= 0.0 || ry <= 0.0 {
        return f64::INFINITY;
    }
    (point.x / rx).powi(2) + (point.y / ry).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Color;

    #[test]
    fn test_local_bounds_centered() {
        let ellipse = Ellipse::new(Point::new(50.0, 50.0), 30.0, 20.0);
        let bounds = ellipse.local_bounds();
        assert!((bounds.x0 + 30.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 20.0).abs() < f64::EPSILON);
        assert!(bounds.center().distance(Point::ZERO) < f64::EPSILON);
    }

    #[test]
    fn test_outline_hit() {
        let ellipse = Ellipse::new(Point::ZERO, 40.0, 40.0);
        assert!(ellipse.hit_test_local(Point::new(40.0, 0.0), 2.0));
        assert!(!ellipse.hit_test_local(Point::ZERO, 2.0));
    }

    #[test]
    fn test_filled_hit_includes_interior() {
        let mut ellipse = Ellipse::new(Point::ZERO, 40.0, 20.0);
        ellipse.style.fill_color = Some(Color::white());
        assert!(ellipse.hit_test_local(Point::new(5.0, 5.0), 2.0));
        assert!(!ellipse.hit_test_local(Point::new(45.0, 0.0), 2.0));
    }

    #[test]
    fn test_radii_clamped() {
        let mut ellipse = Ellipse::new(Point::ZERO, 10.0, 10.0);
        ellipse.set_radii(-1.0, 0.0);
        assert!((ellipse.radius_x - Ellipse::MIN_RADIUS).abs() < f64::EPSILON);
        assert!((ellipse.radius_y - Ellipse::MIN_RADIUS).abs() < f64::EPSILON);
    }
}
