//! Element construction and record (de)serialization.
//!
//! Elements cross the persistence boundary as JSON records. Parsing is
//! deliberately tolerant: unknown fields are ignored, missing optional
//! fields fall back to defaults with a diagnostic, and legacy
//! encodings (named colors, `circle` records, `start_point`/`end_point`
//! keys) are normalized. Only a missing type tag, an unregistered type,
//! or absent required geometry fail the record outright.

use crate::elements::{
    Color, Element, ElementId, ElementStyle, Ellipse, FillStyle, FontFamily, Group, Image, Line,
    PropertyValue, Rectangle, StrokeStyle, Text,
};
use crate::geometry::Transform;
use kurbo::{Point, Rect, Vec2};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// A registered element kind.
#[derive(Debug, Clone, Copy)]
pub struct ElementKind {
    pub tag: &'static str,
    pub display_name: &'static str,
}

/// Non-fatal issue noticed while reading a record. Collected and reported
/// so a lossy load is visible, never silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDiagnostic {
    pub field: String,
    pub message: String,
}

impl LoadDiagnostic {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("unknown element type `{0}`")]
    UnknownType(String),
    #[error("invalid element record: {0}")]
    InvalidRecord(String),
}

/// Registry of element kinds, plus the record codec.
#[derive(Debug)]
pub struct ElementFactory {
    kinds: BTreeMap<&'static str, ElementKind>,
    aliases: BTreeMap<&'static str, &'static str>,
}

impl Default for ElementFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementFactory {
    pub fn new() -> Self {
        let mut kinds = BTreeMap::new();
        for kind in [
            ElementKind {
                tag: "rectangle",
                display_name: "Rectangle",
            },
            ElementKind {
                tag: "ellipse",
                display_name: "Ellipse",
            },
            ElementKind {
                tag: "line",
                display_name: "Line",
            },
            ElementKind {
                tag: "text",
                display_name: "Text",
            },
            ElementKind {
                tag: "image",
                display_name: "Image",
            },
            ElementKind {
                tag: "group",
                display_name: "Group",
            },
        ] {
            kinds.insert(kind.tag, kind);
        }
        let mut aliases = BTreeMap::new();
        aliases.insert("circle", "ellipse");
        Self { kinds, aliases }
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ElementKind> {
        self.kinds.values()
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.kinds.contains_key(tag) || self.aliases.contains_key(tag)
    }

    /// Register an extra tag for an existing kind, so legacy or host
    /// specific type names resolve on load.
    pub fn register_alias(&mut self, alias: &'static str, target: &'static str) {
        log::debug!("registering element alias `{alias}` -> `{target}`");
        self.aliases.insert(alias, target);
    }

    /// Create a fresh element of the given kind with default geometry.
    pub fn create(&self, tag: &str, position: Point) -> Result<Element, FactoryError> {
        let tag = self.resolve_tag(tag)?;
        match tag {
            "rectangle" => Ok(Element::Rectangle(Rectangle::new(position, 100.0, 80.0))),
            "ellipse" => Ok(Element::Ellipse(Ellipse::new(position, 50.0, 35.0))),
            "line" => Ok(Element::Line(Line::new(position, position + Vec2::new(100.0, 0.0)))),
            "text" => Ok(Element::Text(Text::new(position, "Text"))),
            "image" => Ok(Element::Image(Image::new(position, "", 100.0, 100.0))),
            "group" => Ok(Element::Group(Group::new(Vec::new()))),
            other => Err(FactoryError::UnknownType(other.to_string())),
        }
    }

    /// Create an element and apply property overrides on top of the
    /// kind's defaults.
    pub fn create_with(
        &self,
        tag: &str,
        position: Point,
        overrides: &[(&str, PropertyValue)],
    ) -> Result<Element, FactoryError> {
        let mut element = self.create(tag, position)?;
        for (name, value) in overrides {
            element
                .set_property(name, value)
                .map_err(|err| FactoryError::InvalidRecord(err.to_string()))?;
        }
        Ok(element)
    }

    fn resolve_tag<'a>(&self, tag: &'a str) -> Result<&'a str, FactoryError> {
        let resolved = self.aliases.get(tag).copied().unwrap_or(tag);
        if self.kinds.contains_key(resolved) {
            // Alias targets are static registry keys.
            Ok(self
                .kinds
                .get(resolved)
                .map(|k| k.tag)
                .unwrap_or(resolved))
        } else {
            Err(FactoryError::UnknownType(tag.to_string()))
        }
    }

    /// Parse one element record. Diagnostics describe every repaired
    /// field; the error cases are unknown type and missing geometry.
    pub fn from_record(
        &self,
        record: &Value,
    ) -> Result<(Element, Vec<LoadDiagnostic>), FactoryError> {
        let obj = record
            .as_object()
            .ok_or_else(|| FactoryError::InvalidRecord("record is not an object".into()))?;
        let raw_tag = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| FactoryError::InvalidRecord("missing `type` field".into()))?;
        let tag = self.resolve_tag(raw_tag)?;

        let mut diags = Vec::new();
        let id = match obj
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
        {
            Some(id) => id,
            None => {
                diags.push(LoadDiagnostic::new("id", "missing or invalid, assigned fresh"));
                Uuid::new_v4()
            }
        };
        let transform = match obj.get("transform") {
            Some(value) => parse_transform(value, &mut diags),
            None => {
                diags.push(LoadDiagnostic::new("transform", "missing, using identity"));
                Transform::default()
            }
        };
        let style = match obj.get("style") {
            Some(value) => parse_style(value, &mut diags),
            None => {
                diags.push(LoadDiagnostic::new("style", "missing, using defaults"));
                ElementStyle::default()
            }
        };

        let element = match tag {
            "rectangle" => {
                let width = require_f64(obj, "width")?;
                let height = require_f64(obj, "height")?;
                Element::Rectangle(Rectangle {
                    id,
                    transform,
                    style,
                    width: width.max(Rectangle::MIN_EXTENT),
                    height: height.max(Rectangle::MIN_EXTENT),
                    corner_radius: optional_f64(obj, "corner_radius", 0.0, &mut diags).max(0.0),
                })
            }
            "ellipse" => {
                // `circle` records carry a single radius.
                let (rx, ry) = if let Some(r) = get_f64(obj, "radius") {
                    (r, r)
                } else {
                    (require_f64(obj, "radius_x")?, require_f64(obj, "radius_y")?)
                };
                Element::Ellipse(Ellipse {
                    id,
                    transform,
                    style,
                    radius_x: rx.max(Ellipse::MIN_RADIUS),
                    radius_y: ry.max(Ellipse::MIN_RADIUS),
                })
            }
            "line" => {
                let start = get_point(obj, "start")
                    .or_else(|| get_point(obj, "start_point"))
                    .ok_or_else(|| {
                        FactoryError::InvalidRecord("line record missing `start`".into())
                    })?;
                let end = get_point(obj, "end")
                    .or_else(|| get_point(obj, "end_point"))
                    .ok_or_else(|| {
                        FactoryError::InvalidRecord("line record missing `end`".into())
                    })?;
                Element::Line(Line {
                    id,
                    transform,
                    style,
                    start,
                    end,
                })
            }
            "text" => {
                let content = match obj.get("content").and_then(Value::as_str) {
                    Some(text) => text.to_string(),
                    None => {
                        diags.push(LoadDiagnostic::new("content", "missing, using empty text"));
                        String::new()
                    }
                };
                let font_family = match obj.get("font_family").and_then(Value::as_str) {
                    Some(name) => FontFamily::from_name(name),
                    None => {
                        diags.push(LoadDiagnostic::new(
                            "font_family",
                            "missing, using sans_serif",
                        ));
                        FontFamily::default()
                    }
                };
                let mut text = Text {
                    id,
                    transform,
                    style,
                    content,
                    font_family,
                    font_size: 16.0,
                    bold: optional_bool(obj, "bold", false, &mut diags),
                    italic: optional_bool(obj, "italic", false, &mut diags),
                    background: obj
                        .get("background")
                        .and_then(|v| parse_color_value(v, "background", &mut diags)),
                };
                text.set_font_size(optional_f64(obj, "font_size", 16.0, &mut diags));
                Element::Text(text)
            }
            "image" => {
                let source = obj
                    .get("source")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        FactoryError::InvalidRecord("image record missing `source`".into())
                    })?
                    .to_string();
                let mut image = Image {
                    id,
                    transform,
                    style,
                    source,
                    width: require_f64(obj, "width")?.max(Image::MIN_EXTENT),
                    height: require_f64(obj, "height")?.max(Image::MIN_EXTENT),
                    crop: None,
                    flip_horizontal: optional_bool(obj, "flip_horizontal", false, &mut diags),
                    flip_vertical: optional_bool(obj, "flip_vertical", false, &mut diags),
                    opacity: 1.0,
                };
                image.set_opacity(optional_f64(obj, "opacity", 1.0, &mut diags));
                image.set_crop(get_rect(obj, "crop"));
                Element::Image(image)
            }
            "group" => {
                let mut children = Vec::new();
                if let Some(raw) = obj.get("children").and_then(Value::as_array) {
                    for value in raw {
                        match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                            Some(child) => children.push(child),
                            None => diags.push(LoadDiagnostic::new(
                                "children",
                                "skipped entry that is not a valid id",
                            )),
                        }
                    }
                }
                Element::Group(Group {
                    id,
                    transform,
                    style,
                    children,
                    name: obj
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            }
            other => return Err(FactoryError::UnknownType(other.to_string())),
        };
        Ok((element, diags))
    }

    /// Serialize an element to its record form.
    pub fn to_record(&self, element: &Element) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), json!(element.type_tag()));
        obj.insert("id".into(), json!(element.id().to_string()));
        obj.insert("transform".into(), transform_to_value(element.transform()));
        obj.insert("style".into(), style_to_value(element.style()));
        match element {
            Element::Rectangle(e) => {
                obj.insert("width".into(), json!(e.width));
                obj.insert("height".into(), json!(e.height));
                obj.insert("corner_radius".into(), json!(e.corner_radius));
            }
            Element::Ellipse(e) => {
                obj.insert("radius_x".into(), json!(e.radius_x));
                obj.insert("radius_y".into(), json!(e.radius_y));
            }
            Element::Line(e) => {
                obj.insert("start".into(), json!([e.start.x, e.start.y]));
                obj.insert("end".into(), json!([e.end.x, e.end.y]));
            }
            Element::Text(e) => {
                obj.insert("content".into(), json!(e.content));
                obj.insert("font_family".into(), json!(font_family_name(e.font_family)));
                obj.insert("font_size".into(), json!(e.font_size));
                obj.insert("bold".into(), json!(e.bold));
                obj.insert("italic".into(), json!(e.italic));
                if let Some(bg) = e.background {
                    obj.insert("background".into(), color_to_value(bg));
                }
            }
            Element::Image(e) => {
                obj.insert("source".into(), json!(e.source));
                obj.insert("width".into(), json!(e.width));
                obj.insert("height".into(), json!(e.height));
                if let Some(crop) = e.crop {
                    obj.insert("crop".into(), json!([crop.x0, crop.y0, crop.x1, crop.y1]));
                }
                obj.insert("flip_horizontal".into(), json!(e.flip_horizontal));
                obj.insert("flip_vertical".into(), json!(e.flip_vertical));
                obj.insert("opacity".into(), json!(e.opacity));
            }
            Element::Group(e) => {
                let children: Vec<String> = e.children.iter().map(ElementId::to_string).collect();
                obj.insert("children".into(), json!(children));
                obj.insert("name".into(), json!(e.name));
            }
        }
        Value::Object(obj)
    }
}

fn get_f64(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn require_f64(obj: &Map<String, Value>, key: &str) -> Result<f64, FactoryError> {
    get_f64(obj, key)
        .ok_or_else(|| FactoryError::InvalidRecord(format!("missing numeric field `{key}`")))
}

// Optional fields fall back to a default, with a diagnostic so the
// repair is visible.

fn optional_f64(
    obj: &Map<String, Value>,
    key: &str,
    default: f64,
    diags: &mut Vec<LoadDiagnostic>,
) -> f64 {
    match get_f64(obj, key) {
        Some(value) => value,
        None => {
            diags.push(LoadDiagnostic::new(key, format!("missing, using {default}")));
            default
        }
    }
}

fn optional_bool(
    obj: &Map<String, Value>,
    key: &str,
    default: bool,
    diags: &mut Vec<LoadDiagnostic>,
) -> bool {
    match obj.get(key).and_then(Value::as_bool) {
        Some(value) => value,
        None => {
            diags.push(LoadDiagnostic::new(key, format!("missing, using {default}")));
            default
        }
    }
}

/// Accepts `[x, y]` or `{"x": .., "y": ..}`.
fn get_point(obj: &Map<String, Value>, key: &str) -> Option<Point> {
    point_from_value(obj.get(key)?)
}

fn point_from_value(value: &Value) -> Option<Point> {
    if let Some(arr) = value.as_array() {
        if arr.len() == 2 {
            return Some(Point::new(arr[0].as_f64()?, arr[1].as_f64()?));
        }
        return None;
    }
    let obj = value.as_object()?;
    Some(Point::new(
        obj.get("x")?.as_f64()?,
        obj.get("y")?.as_f64()?,
    ))
}

fn get_rect(obj: &Map<String, Value>, key: &str) -> Option<Rect> {
    let arr = obj.get(key)?.as_array()?;
    if arr.len() != 4 {
        return None;
    }
    Some(Rect::new(
        arr[0].as_f64()?,
        arr[1].as_f64()?,
        arr[2].as_f64()?,
        arr[3].as_f64()?,
    ))
}

fn parse_transform(value: &Value, diags: &mut Vec<LoadDiagnostic>) -> Transform {
    let Some(obj) = value.as_object() else {
        diags.push(LoadDiagnostic::new("transform", "not an object, using identity"));
        return Transform::default();
    };
    let position = obj
        .get("position")
        .and_then(point_from_value)
        .unwrap_or_else(|| {
            diags.push(LoadDiagnostic::new(
                "transform.position",
                "missing, using origin",
            ));
            Point::ZERO
        });
    let mut transform = Transform::at(position);
    transform.rotation = get_f64(obj, "rotation").unwrap_or(0.0);
    transform.set_scale(get_f64(obj, "scale").unwrap_or(1.0));
    transform
}

fn parse_style(value: &Value, diags: &mut Vec<LoadDiagnostic>) -> ElementStyle {
    let Some(obj) = value.as_object() else {
        diags.push(LoadDiagnostic::new("style", "not an object, using defaults"));
        return ElementStyle::default();
    };
    let mut style = ElementStyle::default();
    if let Some(value) = obj.get("stroke_color") {
        if let Some(color) = parse_color_value(value, "stroke_color", diags) {
            style.stroke_color = color;
        }
    }
    if let Some(width) = get_f64(obj, "stroke_width") {
        style.stroke_width = width.max(0.0);
    }
    if let Some(value) = obj.get("stroke_style") {
        style.stroke_style = parse_stroke_style(value, diags);
    }
    match obj.get("fill_color") {
        None | Some(Value::Null) => style.fill_color = None,
        Some(value) => style.fill_color = parse_color_value(value, "fill_color", diags),
    }
    if let Some(name) = obj.get("fill_style").and_then(Value::as_str) {
        style.fill_style = match name {
            "hachure" => FillStyle::Hachure,
            "cross_hatch" => FillStyle::CrossHatch,
            "dots" => FillStyle::Dots,
            _ => FillStyle::Solid,
        };
    }
    style
}

/// Accepts `{"r":..}` objects, hex strings, and legacy color names.
/// A `transparent` or unparseable color maps to None with a diagnostic.
fn parse_color_value(value: &Value, field: &str, diags: &mut Vec<LoadDiagnostic>) -> Option<Color> {
    match value {
        Value::String(text) => match Color::parse(text) {
            Some(color) if color == Color::transparent() => None,
            Some(color) => Some(color),
            None => {
                diags.push(LoadDiagnostic::new(
                    field,
                    format!("unrecognized color `{text}`, using default"),
                ));
                None
            }
        },
        other => match serde_json::from_value::<Color>(other.clone()) {
            Ok(color) => Some(color),
            Err(_) => {
                diags.push(LoadDiagnostic::new(field, "malformed color, using default"));
                None
            }
        },
    }
}

/// Accepts the style name or the legacy integer pen-style code.
fn parse_stroke_style(value: &Value, diags: &mut Vec<LoadDiagnostic>) -> StrokeStyle {
    match value {
        Value::String(name) => match name.as_str() {
            "solid" => StrokeStyle::Solid,
            "dashed" => StrokeStyle::Dashed,
            "dotted" => StrokeStyle::Dotted,
            other => {
                diags.push(LoadDiagnostic::new(
                    "stroke_style",
                    format!("unknown style `{other}`, using solid"),
                ));
                StrokeStyle::Solid
            }
        },
        Value::Number(code) => StrokeStyle::from_legacy_code(code.as_i64().unwrap_or(1)),
        _ => {
            diags.push(LoadDiagnostic::new("stroke_style", "malformed, using solid"));
            StrokeStyle::Solid
        }
    }
}

fn transform_to_value(transform: &Transform) -> Value {
    json!({
        "position": [transform.position.x, transform.position.y],
        "rotation": transform.rotation,
        "scale": transform.scale,
    })
}

fn style_to_value(style: &ElementStyle) -> Value {
    json!({
        "stroke_color": color_to_value(style.stroke_color),
        "stroke_width": style.stroke_width,
        "stroke_style": style.stroke_style,
        "fill_color": style.fill_color.map(color_to_value),
        "fill_style": style.fill_style,
    })
}

fn color_to_value(color: Color) -> Value {
    json!({"r": color.r, "g": color.g, "b": color.b, "a": color.a})
}

fn font_family_name(family: FontFamily) -> &'static str {
    match family {
        FontFamily::SansSerif => "sans_serif",
        FontFamily::Serif => "serif",
        FontFamily::Monospace => "monospace",
    }
}
