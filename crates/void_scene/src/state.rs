//! Render state sets
//!
//! A state set bundles the attributes applied while drawing a node or a
//! drawable. Attributes are keyed by [`AttributeSlot`]; texture attributes
//! additionally live per texture unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::texture::TextureRef;
use crate::user_data::{impl_user_data_holder, UserData};

/// Attribute category
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Texture,
    TexEnv,
    Material,
    BlendFunc,
    Depth,
    CullFace,
    PolygonMode,
    Program,
    /// Engine-specific attribute kinds
    Custom(u16),
}

/// Key of an attribute inside a state set: category plus member index
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributeSlot {
    pub kind: AttributeType,
    pub member: u32,
}

impl AttributeSlot {
    pub const fn new(kind: AttributeType, member: u32) -> Self {
        Self { kind, member }
    }
}

/// Override/protection flags carried with each attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateValue(pub u32);

impl StateValue {
    pub const OFF: Self = Self(0);
    pub const ON: Self = Self(1);
    pub const OVERRIDE: Self = Self(2);
    pub const PROTECTED: Self = Self(4);
    pub const INHERIT: Self = Self(8);

    /// Combine flags
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check a flag
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for StateValue {
    fn default() -> Self {
        Self::ON
    }
}

/// Any non-texture attribute: parameters stored as named strings
#[derive(Clone, Debug)]
pub struct GenericAttribute {
    kind: AttributeType,
    name: String,
    properties: BTreeMap<String, String>,
    user_data: Option<UserData>,
}

impl_user_data_holder!(GenericAttribute);

impl GenericAttribute {
    pub fn new(kind: AttributeType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            properties: BTreeMap::new(),
            user_data: None,
        }
    }

    /// Builder-style property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builder-style user data
    pub fn with_user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    pub fn kind(&self) -> AttributeType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|s| s.as_str())
    }
}

/// A state attribute: either a shared texture or an owned generic attribute
#[derive(Clone, Debug)]
pub enum StateAttribute {
    Texture(TextureRef),
    Generic(GenericAttribute),
}

impl StateAttribute {
    pub fn is_texture(&self) -> bool {
        matches!(self, Self::Texture(_))
    }

    pub fn as_texture(&self) -> Option<&TextureRef> {
        match self {
            Self::Texture(texture) => Some(texture),
            Self::Generic(_) => None,
        }
    }

    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Texture(_) => AttributeType::Texture,
            Self::Generic(generic) => generic.kind(),
        }
    }
}

impl From<TextureRef> for StateAttribute {
    fn from(texture: TextureRef) -> Self {
        Self::Texture(texture)
    }
}

impl From<GenericAttribute> for StateAttribute {
    fn from(generic: GenericAttribute) -> Self {
        Self::Generic(generic)
    }
}

/// An attribute together with its flags
#[derive(Clone, Debug)]
pub struct AttributeEntry {
    pub attribute: StateAttribute,
    pub value: StateValue,
}

/// Ordered attribute mapping
pub type AttributeList = BTreeMap<AttributeSlot, AttributeEntry>;

/// Render state bundle owned by a node or drawable
#[derive(Clone, Debug, Default)]
pub struct StateSet {
    attributes: AttributeList,
    texture_attributes: Vec<AttributeList>,
    user_data: Option<UserData>,
}

impl_user_data_holder!(StateSet);

impl StateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute in its default slot (member 0)
    pub fn set_attribute(&mut self, attribute: impl Into<StateAttribute>, value: StateValue) {
        let attribute = attribute.into();
        let slot = AttributeSlot::new(attribute.attribute_type(), 0);
        self.attributes.insert(slot, AttributeEntry { attribute, value });
    }

    /// Set an attribute on a texture unit, growing the unit list as needed
    pub fn set_texture_attribute(
        &mut self,
        unit: usize,
        attribute: impl Into<StateAttribute>,
        value: StateValue,
    ) {
        let attribute = attribute.into();
        if self.texture_attributes.len() <= unit {
            self.texture_attributes.resize_with(unit + 1, AttributeList::new);
        }
        let slot = AttributeSlot::new(attribute.attribute_type(), 0);
        self.texture_attributes[unit].insert(slot, AttributeEntry { attribute, value });
    }

    /// Builder-style user data
    pub fn with_user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeList {
        &mut self.attributes
    }

    /// Per-unit texture attribute lists
    pub fn texture_attributes(&self) -> &[AttributeList] {
        &self.texture_attributes
    }

    pub fn texture_attributes_mut(&mut self) -> &mut Vec<AttributeList> {
        &mut self.texture_attributes
    }

    /// The texture bound on a unit, if any
    pub fn texture(&self, unit: usize) -> Option<&TextureRef> {
        self.texture_attributes
            .get(unit)?
            .get(&AttributeSlot::new(AttributeType::Texture, 0))?
            .attribute
            .as_texture()
    }

    /// Every texture referenced by this state set, in attribute order
    pub fn textures(&self) -> impl Iterator<Item = &TextureRef> {
        self.attributes
            .values()
            .chain(self.texture_attributes.iter().flat_map(|unit| unit.values()))
            .filter_map(|entry| entry.attribute.as_texture())
    }
}
