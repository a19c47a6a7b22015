use super::{ElementId, ElementStyle, PropertyError, PropertyValue};
use crate::geometry::Transform;
use kurbo::{Point, Rect};
use uuid::Uuid;

/// Axis-aligned rectangle with an optional corner radius.
///
/// Local geometry is anchored at the local origin: the rect spans
/// `(0, 0)..(width, height)` and placement comes from the transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle {
    pub(crate) id: ElementId,
    pub transform: Transform,
    pub style: ElementStyle,
    pub width: f64,
    pub height: f64,
    pub corner_radius: f64,
}

impl Rectangle {
    /// Smallest width/height a rectangle can be resized to.
    pub const MIN_EXTENT: f64 = 1.0;

    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform: Transform::at(position),
            style: ElementStyle::default(),
            width: width.max(Self::MIN_EXTENT),
            height: height.max(Self::MIN_EXTENT),
            corner_radius: 0.0,
        }
    }

    pub fn local_bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width.max(Self::MIN_EXTENT);
        self.height = height.max(Self::MIN_EXTENT);
    }

    pub fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        let bounds = self.local_bounds();
        let outer = bounds.inflate(tolerance, tolerance);
        if !outer.contains(point) {
            return false;
        }
        if self.style.fill_color.is_some() {
            return true;
        }
        // Outline only: a hit must be near an edge, not inside the hole.
        let inner = bounds.inflate(-tolerance, -tolerance);
        inner.width() <= 0.0 || inner.height() <= 0.0 || !inner.contains(point)
    }

    pub fn rescale(&mut self, sx: f64, sy: f64) {
        self.set_size(self.width * sx, self.height * sy);
        self.corner_radius *= sx.min(sy).abs();
    }

    pub fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        match name {
            "width" => Ok(PropertyValue::Number(self.width)),
            "height" => Ok(PropertyValue::Number(self.height)),
            "corner_radius" => Ok(PropertyValue::Number(self.corner_radius)),
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        match name {
            "width" => {
                self.set_size(value.as_number(name)?, self.height);
                Ok(())
            }
            "height" => {
                self.set_size(self.width, value.as_number(name)?);
                Ok(())
            }
            "corner_radius" => {
                self.corner_radius = value.as_number(name)?.max(0.0);
                Ok(())
            }
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Color;

    #[test]
    fn test_size_clamped_to_min_extent() {
        let mut rect = Rectangle::new(Point::ZERO, 10.0, 10.0);
        rect.set_size(0.0, -5.0);
        assert!((rect.width - Rectangle::MIN_EXTENT).abs() < f64::EPSILON);
        assert!((rect.height - Rectangle::MIN_EXTENT).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outline_hit_misses_interior() {
        let rect = Rectangle::new(Point::ZERO, 100.0, 100.0);
        assert!(rect.hit_test_local(Point::new(1.0, 50.0), 3.0));
        assert!(!rect.hit_test_local(Point::new(50.0, 50.0), 3.0));
    }

    #[test]
    fn test_filled_hit_includes_interior() {
        let mut rect = Rectangle::new(Point::ZERO, 100.0, 100.0);
        rect.style.fill_color = Some(Color::white());
        assert!(rect.hit_test_local(Point::new(50.0, 50.0), 3.0));
        assert!(!rect.hit_test_local(Point::new(150.0, 50.0), 3.0));
    }

    #[test]
    fn test_rescale_scales_radius() {
        let mut rect = Rectangle::new(Point::ZERO, 40.0, 20.0);
        rect.corner_radius = 4.0;
        rect.rescale(2.0, 2.0);
        assert!((rect.width - 80.0).abs() < f64::EPSILON);
        assert!((rect.height - 40.0).abs() < f64::EPSILON);
        assert!((rect.corner_radius - 8.0).abs() < f64::EPSILON);
    }
}
