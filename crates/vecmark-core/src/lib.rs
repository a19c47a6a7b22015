//! VecMark Core Library
//!
//! Document engine for the VecMark vector-markup editor: element model,
//! coordinate transforms, selection tracking, undo/redo and persistence.
//! Rendering and input handling live in external collaborators; this crate
//! only exposes geometry and state for them to consume.

pub mod document;
pub mod editor;
pub mod elements;
pub mod factory;
pub mod geometry;
pub mod handles;
pub mod history;
pub mod selection;
pub mod storage;

pub use document::{Document, DocumentError, Layer, LoadError, FORMAT_VERSION};
pub use editor::{Editor, EditorError};
pub use elements::{
    Color, Element, ElementId, ElementStyle, Ellipse, FillStyle, FontFamily, Group, Image, Line,
    PropertyError, PropertyValue, Rectangle, StrokeStyle, Text,
};
pub use factory::{ElementFactory, ElementKind, FactoryError, LoadDiagnostic};
pub use geometry::Transform;
pub use handles::{Corner, Edge, Handle, HandleKind, ResizeConstraints};
pub use history::{
    Action, ActionKind, BackgroundChange, ElementSnapshot, HistoryEntry, HistoryError,
    HistoryManager,
};
pub use selection::{SelectionChange, SelectionManager, SelectionMode};
pub use storage::{FileStore, MemoryStore, ProjectStore, StoreError};
