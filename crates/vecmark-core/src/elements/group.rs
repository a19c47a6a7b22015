use super::{ElementId, ElementStyle, PropertyError, PropertyValue};
use crate::geometry::Transform;
use uuid::Uuid;

/// Container element holding an ordered list of child ids.
///
/// The element store stays flat: a group only references its children,
/// and the document maintains the matching parent map. Group bounds,
/// hit-testing and transforms are resolved by the document because they
/// need child access.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub(crate) id: ElementId,
    pub transform: Transform,
    pub style: ElementStyle,
    pub children: Vec<ElementId>,
    pub name: String,
}

impl Group {
    pub fn new(children: Vec<ElementId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform: Transform::default(),
            style: ElementStyle::default(),
            children,
            name: String::new(),
        }
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.children.contains(&id)
    }

    pub fn remove_child(&mut self, id: ElementId) {
        self.children.retain(|c| *c != id);
    }

    pub fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        match name {
            "name" => Ok(PropertyValue::Text(self.name.clone())),
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        match name {
            "name" => {
                self.name = value.as_text(name)?.to_string();
                Ok(())
            }
            _ => Err(PropertyError::UnknownProperty(name.to_string())),
        }
    }
}
