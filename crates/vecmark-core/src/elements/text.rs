use super::{Color, ElementId, ElementStyle, PropertyError, PropertyValue};
use crate::geometry::Transform;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Font families understood by the engine. Text layout happens in the
/// rendering collaborator; here the family only feeds the bounds estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    #[default]
    SansSerif,
    Serif,
    Monospace,
}

impl FontFamily {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "serif" | "times" | "times new roman" => FontFamily::Serif,
            "monospace" | "courier" | "courier new" => FontFamily::Monospace,
            _ => FontFamily::SansSerif,
        }
    }

    fn advance_factor(&self) -> f64 {
        match self {
            FontFamily::Monospace => 0.6,
            _ => 0.55,
        }
    }
}

/// Text block positioned by its top-left corner.
///
/// Bounds are an estimate from character counts; exact metrics belong to
/// the renderer and are not needed for selection or persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub(crate) id: ElementId,
    pub transform: Transform,
    pub style: ElementStyle,
    pub content: String,
    pub font_family: FontFamily,
    pub font_size: f64,
    pub bold: bool,
    pub italic: bool,
    pub background: Option<Color>,
}

impl Text {
    pub const MIN_FONT_SIZE: f64 = 4.0;
    pub const MAX_FONT_SIZE: f64 = 400.0;
    const LINE_HEIGHT: f64 = 1.25;

    pub fn new(position: Point, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform: Transform::at(position),
            style: ElementStyle::default(),
            content: content.into(),
            font_family: FontFamily::default(),
            font_size: 16.0,
            bold: false,
            italic: false,
            background: None,
        }
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.font_size = size.clamp(Self::MIN_FONT_SIZE, Self::MAX_FONT_SIZE);
    }

    pub fn local_bounds(&self) -> Rect {
        let mut widest = 0usize;
        let mut lines = 0usize;
        for line in self.content.lines() {
            widest = widest.max(line.chars().count());
            lines += 1;
        }
        lines = lines.max(1);
        let mut advance = self.font_size * self.font_family.advance_factor();
        if self.bold {
            advance *= 1.05;
        }
        let width = (widest as f64 * advance).max(self.font_size * 0.5);
        let height = lines as f64 * self.font_size * Self::LINE_HEIGHT;
        Rect::new(0.0, 0.0, width, height)
    }

    pub fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.local_bounds()
            .inflate(tolerance, tolerance)
            .contains(point)
    }

    /// Resizing text scales the font rather than distorting glyphs.
    pub fn rescale(&mut self, sx: f64, sy: f64) {
        self.set_font_size(self.font_size * sx.min(sy).abs().max(f64::EPSILON));
    }

    pub fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        match name {
            "content" => Ok(PropertyValue::Text(self.content.clone())),
            "font_size" => Ok(PropertyValue::Number(self.font_size)),
            "bold" => Ok(PropertyValue::Bool(self.bold)),
            "italic" => Ok(PropertyValue::Bool(self.italic)),
            "background" => Ok(PropertyValue::Color(
                self.background.unwrap_or_else(Color::transparent),
            )),
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        match name {
            "content" => {
                self.content = value.as_text(name)?.to_string();
                Ok(())
            }
            "font_size" => {
                self.set_font_size(value.as_number(name)?);
                Ok(())
            }
            "bold" => {
                self.bold = value.as_bool(name)?;
                Ok(())
            }
            "italic" => {
                self.italic = value.as_bool(name)?;
                Ok(())
            }
            "background" => {
                let color = value.as_color(name)?;
                self.background = if color == Color::transparent() {
                    None
                } else {
                    Some(color)
                };
                Ok(())
            }
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }
}
