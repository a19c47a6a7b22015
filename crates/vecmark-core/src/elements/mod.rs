//! Element definitions for the document engine.

mod ellipse;
mod group;
mod image;
mod line;
mod rectangle;
mod text;

pub use ellipse::Ellipse;
pub use group::Group;
pub use image::Image;
pub use line::Line;
pub use rectangle::Rectangle;
pub use text::{FontFamily, Text};

use crate::geometry::{self, Transform};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse a color stored as text: `#rgb`, `#rrggbb`, `#rrggbbaa`, or a
    /// small set of CSS-style names. Legacy project files stored colors as
    /// names, so these are normalized to channels on load.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return match hex.len() {
                3 => {
                    let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
                    let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
                    let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
                    Some(Self::new(r, g, b, 255))
                }
                6 | 8 => {
                    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                    let a = if hex.len() == 8 {
                        u8::from_str_radix(&hex[6..8], 16).ok()?
                    } else {
                        255
                    };
                    Some(Self::new(r, g, b, a))
                }
                _ => None,
            };
        }
        match text.to_ascii_lowercase().as_str() {
            "black" => Some(Self::black()),
            "white" => Some(Self::white()),
            "red" => Some(Self::new(255, 0, 0, 255)),
            "green" => Some(Self::new(0, 128, 0, 255)),
            "blue" => Some(Self::new(0, 0, 255, 255)),
            "yellow" => Some(Self::new(255, 255, 0, 255)),
            "cyan" => Some(Self::new(0, 255, 255, 255)),
            "magenta" => Some(Self::new(255, 0, 255, 255)),
            "gray" | "grey" => Some(Self::new(128, 128, 128, 255)),
            "transparent" => Some(Self::transparent()),
            _ => None,
        }
    }
}

impl From<peniko::Color> for Color {
    fn from(color: peniko::Color) -> Self {
        Self {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        }
    }
}

impl From<Color> for peniko::Color {
    fn from(color: Color) -> Self {
        peniko::Color::rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Stroke dash style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl StrokeStyle {
    /// Normalize the legacy integer encoding (Qt pen-style values).
    pub fn from_legacy_code(code: i64) -> Self {
        match code {
            2 => StrokeStyle::Dashed,
            3 => StrokeStyle::Dotted,
            _ => StrokeStyle::Solid,
        }
    }
}

/// Fill pattern style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStyle {
    #[default]
    Solid,
    Hachure,
    CrossHatch,
    Dots,
}

/// Style properties shared by every element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementStyle {
    /// Stroke color.
    pub stroke_color: Color,
    /// Stroke width.
    pub stroke_width: f64,
    /// Stroke dash style.
    #[serde(default)]
    pub stroke_style: StrokeStyle,
    /// Fill color (None = no fill).
    pub fill_color: Option<Color>,
    /// Fill pattern style.
    #[serde(default)]
    pub fill_style: FillStyle,
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            stroke_color: Color::black(),
            stroke_width: 2.0,
            stroke_style: StrokeStyle::default(),
            fill_color: None,
            fill_style: FillStyle::default(),
        }
    }
}

impl ElementStyle {
    /// Get the stroke color as a peniko Color.
    pub fn stroke(&self) -> peniko::Color {
        self.stroke_color.into()
    }

    /// Get the fill color as a peniko Color.
    pub fn fill(&self) -> Option<peniko::Color> {
        self.fill_color.map(|c| c.into())
    }
}

/// A value read from or written to a named element property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Color(Color),
}

impl PropertyValue {
    fn as_number(&self, name: &str) -> Result<f64, PropertyError> {
        match self {
            PropertyValue::Number(n) => Ok(*n),
            _ => Err(PropertyError::TypeMismatch {
                name: name.to_string(),
                expected: "number",
            }),
        }
    }

    fn as_bool(&self, name: &str) -> Result<bool, PropertyError> {
        match self {
            PropertyValue::Bool(b) => Ok(*b),
            _ => Err(PropertyError::TypeMismatch {
                name: name.to_string(),
                expected: "bool",
            }),
        }
    }

    fn as_text(&self, name: &str) -> Result<&str, PropertyError> {
        match self {
            PropertyValue::Text(t) => Ok(t),
            _ => Err(PropertyError::TypeMismatch {
                name: name.to_string(),
                expected: "text",
            }),
        }
    }

    fn as_color(&self, name: &str) -> Result<Color, PropertyError> {
        match self {
            PropertyValue::Color(c) => Ok(*c),
            PropertyValue::Text(t) => Color::parse(t).ok_or(PropertyError::TypeMismatch {
                name: name.to_string(),
                expected: "color",
            }),
            _ => Err(PropertyError::TypeMismatch {
                name: name.to_string(),
                expected: "color",
            }),
        }
    }
}

/// Failure to read or write a named property.
///
/// Unknown names are a typed error rather than a silent no-op so callers
/// can detect stale references after refactors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("unknown property `{0}`")]
    UnknownProperty(String),
    #[error("property `{name}` expects a {expected} value")]
    TypeMismatch { name: String, expected: &'static str },
}

/// Distance from a point to a line segment (a -> b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Closed set of element variants. Serialization goes through the
/// factory's record format, not serde derive, so legacy encodings can be
/// normalized on load.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Rectangle(Rectangle),
    Ellipse(Ellipse),
    Line(Line),
    Text(Text),
    Image(Image),
    Group(Group),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Rectangle(e) => e.id,
            Element::Ellipse(e) => e.id,
            Element::Line(e) => e.id,
            Element::Text(e) => e.id,
            Element::Image(e) => e.id,
            Element::Group(e) => e.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: ElementId) {
        match self {
            Element::Rectangle(e) => e.id = id,
            Element::Ellipse(e) => e.id = id,
            Element::Line(e) => e.id = id,
            Element::Text(e) => e.id = id,
            Element::Image(e) => e.id = id,
            Element::Group(e) => e.id = id,
        }
    }

    /// Deep copy with a fresh unique id (used for duplicate/paste).
    pub fn clone_with_new_id(&self) -> Self {
        let mut copy = self.clone();
        copy.set_id(Uuid::new_v4());
        copy
    }

    /// Stable type tag used by the factory and the project file.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Element::Rectangle(_) => "rectangle",
            Element::Ellipse(_) => "ellipse",
            Element::Line(_) => "line",
            Element::Text(_) => "text",
            Element::Image(_) => "image",
            Element::Group(_) => "group",
        }
    }

    pub fn style(&self) -> &ElementStyle {
        match self {
            Element::Rectangle(e) => &e.style,
            Element::Ellipse(e) => &e.style,
            Element::Line(e) => &e.style,
            Element::Text(e) => &e.style,
            Element::Image(e) => &e.style,
            Element::Group(e) => &e.style,
        }
    }

    pub fn style_mut(&mut self) -> &mut ElementStyle {
        match self {
            Element::Rectangle(e) => &mut e.style,
            Element::Ellipse(e) => &mut e.style,
            Element::Line(e) => &mut e.style,
            Element::Text(e) => &mut e.style,
            Element::Image(e) => &mut e.style,
            Element::Group(e) => &mut e.style,
        }
    }

    pub fn transform(&self) -> &Transform {
        match self {
            Element::Rectangle(e) => &e.transform,
            Element::Ellipse(e) => &e.transform,
            Element::Line(e) => &e.transform,
            Element::Text(e) => &e.transform,
            Element::Image(e) => &e.transform,
            Element::Group(e) => &e.transform,
        }
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        match self {
            Element::Rectangle(e) => &mut e.transform,
            Element::Ellipse(e) => &mut e.transform,
            Element::Line(e) => &mut e.transform,
            Element::Text(e) => &mut e.transform,
            Element::Image(e) => &mut e.transform,
            Element::Group(e) => &mut e.transform,
        }
    }

    /// Bounding box in the element's local frame.
    ///
    /// A group has no local geometry of its own; its bounds are derived
    /// from its children by the document.
    pub fn local_bounds(&self) -> Rect {
        match self {
            Element::Rectangle(e) => e.local_bounds(),
            Element::Ellipse(e) => e.local_bounds(),
            Element::Line(e) => e.local_bounds(),
            Element::Text(e) => e.local_bounds(),
            Element::Image(e) => e.local_bounds(),
            Element::Group(_) => Rect::ZERO,
        }
    }

    /// Rotation/scale pivot in local coordinates. Defaults to the center
    /// of the local bounds; a line pivots on its midpoint (which is the
    /// same point, kept explicit per variant).
    pub fn pivot(&self) -> Point {
        match self {
            Element::Line(e) => e.midpoint(),
            other => other.local_bounds().center(),
        }
    }

    /// Axis-aligned bounding box in scene space, after rotation and scale.
    pub fn scene_bounds(&self) -> Rect {
        geometry::scene_bounds(self.local_bounds(), self.transform(), self.pivot())
    }

    /// Top-left corner of the scene-space bounding box. May be negative.
    pub fn visual_position(&self) -> Point {
        geometry::visual_origin(self.local_bounds(), self.transform(), self.pivot())
    }

    /// Move the element so its visual position lands on `target`.
    pub fn set_visual_position(&mut self, target: Point) {
        let offset =
            geometry::visual_offset_to(self.local_bounds(), self.transform(), self.pivot(), target);
        self.transform_mut().position += offset;
    }

    /// Translate by a scene-space delta.
    pub fn translate(&mut self, delta: Vec2) {
        self.transform_mut().position += delta;
    }

    pub fn rotation(&self) -> f64 {
        self.transform().rotation
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.transform_mut().rotation = rotation;
    }

    pub fn scale(&self) -> f64 {
        self.transform().scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.transform_mut().set_scale(scale);
    }

    /// Check if a scene-space point hits this element.
    ///
    /// Group hit-testing needs child access and is resolved by the
    /// document; at the element level a group reports no hit.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let local = self
            .transform()
            .to_local(point, self.pivot());
        let local_tol = tolerance / self.scale().max(Transform::MIN_SCALE);
        match self {
            Element::Rectangle(e) => e.hit_test_local(local, local_tol),
            Element::Ellipse(e) => e.hit_test_local(local, local_tol),
            Element::Line(e) => e.hit_test_local(local, local_tol),
            Element::Text(e) => e.hit_test_local(local, local_tol),
            Element::Image(e) => e.hit_test_local(local, local_tol),
            Element::Group(_) => false,
        }
    }

    /// Scale the local geometry by per-axis factors, anchored at the
    /// local bounds origin. Used for proportional group resize.
    pub fn rescale(&mut self, sx: f64, sy: f64) {
        match self {
            Element::Rectangle(e) => e.rescale(sx, sy),
            Element::Ellipse(e) => e.rescale(sx, sy),
            Element::Line(e) => e.rescale(sx, sy),
            Element::Text(e) => e.rescale(sx, sy),
            Element::Image(e) => e.rescale(sx, sy),
            Element::Group(_) => {}
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Element::Group(_))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Element::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Element::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Read a named property. Every element exposes one uniform get/set
    /// surface; unknown names are a typed error.
    pub fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        match name {
            "visual_x" => Ok(PropertyValue::Number(self.visual_position().x)),
            "visual_y" => Ok(PropertyValue::Number(self.visual_position().y)),
            "rotation" => Ok(PropertyValue::Number(self.rotation())),
            "scale" => Ok(PropertyValue::Number(self.scale())),
            "stroke_color" => Ok(PropertyValue::Color(self.style().stroke_color)),
            "stroke_width" => Ok(PropertyValue::Number(self.style().stroke_width)),
            "fill_color" => Ok(PropertyValue::Color(
                self.style().fill_color.unwrap_or_else(Color::transparent),
            )),
            _ => match self {
                Element::Rectangle(e) => e.property(name),
                Element::Ellipse(e) => e.property(name),
                Element::Line(e) => e.property(name),
                Element::Text(e) => e.property(name),
                Element::Image(e) => e.property(name),
                Element::Group(e) => e.property(name),
            },
        }
    }

    /// Write a named property.
    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        match name {
            "visual_x" => {
                let x = value.as_number(name)?;
                let current = self.visual_position();
                self.set_visual_position(Point::new(x, current.y));
                Ok(())
            }
            "visual_y" => {
                let y = value.as_number(name)?;
                let current = self.visual_position();
                self.set_visual_position(Point::new(current.x, y));
                Ok(())
            }
            "rotation" => {
                self.set_rotation(value.as_number(name)?);
                Ok(())
            }
            "scale" => {
                self.set_scale(value.as_number(name)?);
                Ok(())
            }
            "stroke_color" => {
                self.style_mut().stroke_color = value.as_color(name)?;
                Ok(())
            }
            "stroke_width" => {
                self.style_mut().stroke_width = value.as_number(name)?.max(0.0);
                Ok(())
            }
            "fill_color" => {
                let color = value.as_color(name)?;
                self.style_mut().fill_color = if color == Color::transparent() {
                    None
                } else {
                    Some(color)
                };
                Ok(())
            }
            _ => match self {
                Element::Rectangle(e) => e.set_property(name, value),
                Element::Ellipse(e) => e.set_property(name, value),
                Element::Line(e) => e.set_property(name, value),
                Element::Text(e) => e.set_property(name, value),
                Element::Image(e) => e.set_property(name, value),
                Element::Group(e) => e.set_property(name, value),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_color_parse_hex() {
        assert_eq!(Color::parse("#ff0000"), Some(Color::new(255, 0, 0, 255)));
        assert_eq!(Color::parse("#f00"), Some(Color::new(255, 0, 0, 255)));
        assert_eq!(Color::parse("#00000080"), Some(Color::new(0, 0, 0, 128)));
        assert_eq!(Color::parse("#zzz"), None);
    }

    #[test]
    fn test_color_parse_names() {
        assert_eq!(Color::parse("black"), Some(Color::black()));
        assert_eq!(Color::parse("RED"), Some(Color::new(255, 0, 0, 255)));
        assert_eq!(Color::parse("transparent"), Some(Color::transparent()));
        assert_eq!(Color::parse("not-a-color"), None);
    }

    #[test]
    fn test_unknown_property_is_typed_error() {
        let el = Element::Rectangle(Rectangle::new(Point::new(0.0, 0.0), 10.0, 10.0));
        let err = el.property("no_such_prop").unwrap_err();
        assert_eq!(err, PropertyError::UnknownProperty("no_such_prop".into()));
    }

    #[test]
    fn test_visual_position_properties() {
        let mut el = Element::Rectangle(Rectangle::new(Point::new(0.0, 0.0), 100.0, 50.0));
        el.set_property("visual_x", &PropertyValue::Number(-75.0))
            .unwrap();
        el.set_property("visual_y", &PropertyValue::Number(30.0))
            .unwrap();
        let pos = el.visual_position();
        assert!((pos.x + 75.0).abs() < EPS);
        assert!((pos.y - 30.0).abs() < EPS);
        match el.property("visual_x").unwrap() {
            PropertyValue::Number(x) => assert!((x + 75.0).abs() < EPS),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_set_property_type_mismatch() {
        let mut el = Element::Rectangle(Rectangle::new(Point::new(0.0, 0.0), 10.0, 10.0));
        let err = el
            .set_property("rotation", &PropertyValue::Text("oops".into()))
            .unwrap_err();
        assert!(matches!(err, PropertyError::TypeMismatch { .. }));
    }

    #[test]
    fn test_clone_with_new_id() {
        let el = Element::Rectangle(Rectangle::new(Point::new(5.0, 5.0), 20.0, 20.0));
        let copy = el.clone_with_new_id();
        assert_ne!(el.id(), copy.id());
        assert_eq!(el.type_tag(), copy.type_tag());
        assert_eq!(el.scene_bounds(), copy.scene_bounds());
    }

    #[test]
    fn test_point_to_segment_dist() {
        let d = point_to_segment_dist(
            Point::new(5.0, 5.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!((d - 5.0).abs() < EPS);
    }
}
