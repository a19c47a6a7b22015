use super::{ElementId, ElementStyle, PropertyError, PropertyValue};
use crate::geometry::Transform;
use kurbo::{Point, Rect};
use uuid::Uuid;

/// Placed raster image. `source` is an opaque reference (path or asset
/// key) resolved by the host application; the engine never decodes pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub(crate) id: ElementId,
    pub transform: Transform,
    pub style: ElementStyle,
    pub source: String,
    pub width: f64,
    pub height: f64,
    /// Sub-rect of the natural image shown, in local pixels.
    pub crop: Option<Rect>,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
}

impl Image {
    pub const MIN_EXTENT: f64 = 1.0;

    pub fn new(position: Point, source: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform: Transform::at(position),
            style: ElementStyle::default(),
            source: source.into(),
            width: width.max(Self::MIN_EXTENT),
            height: height.max(Self::MIN_EXTENT),
            crop: None,
            flip_horizontal: false,
            flip_vertical: false,
            opacity: 1.0,
        }
    }

    pub fn local_bounds(&self) -> Rect {
        match self.crop {
            Some(crop) => Rect::new(0.0, 0.0, crop.width(), crop.height()),
            None => Rect::new(0.0, 0.0, self.width, self.height),
        }
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width.max(Self::MIN_EXTENT);
        self.height = height.max(Self::MIN_EXTENT);
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Restrict the crop rect to the natural image area.
    pub fn set_crop(&mut self, crop: Option<Rect>) {
        self.crop = crop.map(|c| {
            Rect::new(
                c.x0.clamp(0.0, self.width),
                c.y0.clamp(0.0, self.height),
                c.x1.clamp(0.0, self.width),
                c.y1.clamp(0.0, self.height),
            )
        });
    }

    pub fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.local_bounds()
            .inflate(tolerance, tolerance)
            .contains(point)
    }

    pub fn rescale(&mut self, sx: f64, sy: f64) {
        self.set_size(self.width * sx, self.height * sy);
        if let Some(crop) = self.crop {
            self.crop = Some(Rect::new(
                crop.x0 * sx,
                crop.y0 * sy,
                crop.x1 * sx,
                crop.y1 * sy,
            ));
        }
    }

    pub fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        match name {
            "source" => Ok(PropertyValue::Text(self.source.clone())),
            "width" => Ok(PropertyValue::Number(self.width)),
            "height" => Ok(PropertyValue::Number(self.height)),
            "opacity" => Ok(PropertyValue::Number(self.opacity)),
            "flip_horizontal" => Ok(PropertyValue::Bool(self.flip_horizontal)),
            "flip_vertical" => Ok(PropertyValue::Bool(self.flip_vertical)),
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        match name {
            "source" => {
                self.source = value.as_text(name)?.to_string();
                Ok(())
            }
            "width" => {
                self.set_size(value.as_number(name)?, self.height);
                Ok(())
            }
            "height" => {
                self.set_size(self.width, value.as_number(name)?);
                Ok(())
            }
            "opacity" => {
                self.set_opacity(value.as_number(name)?);
                Ok(())
            }
            "flip_horizontal" => {
                self.flip_horizontal = value.as_bool(name)?;
                Ok(())
            }
            "flip_vertical" => {
                self.flip_vertical = value.as_bool(name)?;
                Ok(())
            }
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_changes_bounds() {
        let mut image = Image::new(Point::ZERO, "photo.png", 200.0, 100.0);
        image.set_crop(Some(Rect::new(10.0, 10.0, 60.0, 40.0)));
        let bounds = image.local_bounds();
        assert!((bounds.width() - 50.0).abs() < f64::EPSILON);
        assert!((bounds.height() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_crop_clamped_to_natural_size() {
        let mut image = Image::new(Point::ZERO, "photo.png", 100.0, 100.0);
        image.set_crop(Some(Rect::new(-10.0, 0.0, 150.0, 50.0)));
        let crop = image.crop.unwrap();
        assert!((crop.x0).abs() < f64::EPSILON);
        assert!((crop.x1 - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_opacity_clamped() {
        let mut image = Image::new(Point::ZERO, "photo.png", 10.0, 10.0);
        image.set_opacity(1.7);
        assert!((image.opacity - 1.0).abs() < f64::EPSILON);
        image.set_opacity(-0.2);
        assert!(image.opacity.abs() < f64::EPSILON);
    }
}
