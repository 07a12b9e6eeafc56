//! Scene graph nodes
//!
//! A scene graph is a tree of [`Node`]s. Groups and transforms own child
//! nodes; geodes are leaves that own [`Drawable`]s. Every node and drawable
//! may carry its own [`StateSet`].

use serde::{Deserialize, Serialize};

use crate::state::StateSet;
use crate::user_data::{impl_user_data_holder, UserData};
use crate::visitor::NodeVisitor;

/// Node mask with every bit set (always visible)
pub const NODE_MASK_ALL: u32 = !0;

/// Identity matrix, column-major
pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Vertex data of a drawable
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// A unit quad in the XY plane with texture coordinates
    pub fn quad() -> Self {
        Self {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            tex_coords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }
}

/// Leaf geometry with its own render state
#[derive(Clone, Debug, Default)]
pub struct Drawable {
    name: String,
    geometry: Geometry,
    state_set: Option<StateSet>,
    user_data: Option<UserData>,
}

impl_user_data_holder!(Drawable);

impl Drawable {
    pub fn new(name: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            name: name.into(),
            geometry,
            state_set: None,
            user_data: None,
        }
    }

    /// Builder-style state set
    pub fn with_state_set(mut self, state_set: StateSet) -> Self {
        self.state_set = Some(state_set);
        self
    }

    /// Builder-style user data
    pub fn with_user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn state_set(&self) -> Option<&StateSet> {
        self.state_set.as_ref()
    }

    pub fn state_set_mut(&mut self) -> Option<&mut StateSet> {
        self.state_set.as_mut()
    }

    pub fn set_state_set(&mut self, state_set: Option<StateSet>) {
        self.state_set = state_set;
    }
}

/// What a node is
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Plain grouping node
    Group { children: Vec<Node> },
    /// Group with a local transform
    Transform { matrix: [f32; 16], children: Vec<Node> },
    /// Leaf owning drawables
    Geode { drawables: Vec<Drawable> },
}

/// A scene graph node
#[derive(Clone, Debug)]
pub struct Node {
    name: String,
    node_mask: u32,
    kind: NodeKind,
    state_set: Option<StateSet>,
    user_data: Option<UserData>,
}

impl_user_data_holder!(Node);

impl Node {
    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            node_mask: NODE_MASK_ALL,
            kind,
            state_set: None,
            user_data: None,
        }
    }

    /// Create an empty group
    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Group { children: Vec::new() })
    }

    /// Create an empty transform
    pub fn transform(name: impl Into<String>, matrix: [f32; 16]) -> Self {
        Self::with_kind(name, NodeKind::Transform { matrix, children: Vec::new() })
    }

    /// Create an empty geode
    pub fn geode(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Geode { drawables: Vec::new() })
    }

    /// Rebuild a node from its parts (used by deserializers)
    pub fn from_parts(
        name: impl Into<String>,
        node_mask: u32,
        kind: NodeKind,
        state_set: Option<StateSet>,
    ) -> Self {
        Self {
            node_mask,
            state_set,
            ..Self::with_kind(name, kind)
        }
    }

    /// Builder-style child; ignored with a warning on geodes
    pub fn with_child(mut self, child: Node) -> Self {
        self.add_child(child);
        self
    }

    /// Builder-style drawable; ignored with a warning on non-geodes
    pub fn with_drawable(mut self, drawable: Drawable) -> Self {
        self.add_drawable(drawable);
        self
    }

    /// Builder-style state set
    pub fn with_state_set(mut self, state_set: StateSet) -> Self {
        self.state_set = Some(state_set);
        self
    }

    /// Builder-style node mask
    pub fn with_node_mask(mut self, mask: u32) -> Self {
        self.node_mask = mask;
        self
    }

    /// Builder-style user data
    pub fn with_user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    /// Add a child node. Returns false for geodes, which cannot have children.
    pub fn add_child(&mut self, child: Node) -> bool {
        match &mut self.kind {
            NodeKind::Group { children } | NodeKind::Transform { children, .. } => {
                children.push(child);
                true
            }
            NodeKind::Geode { .. } => {
                log::warn!("Cannot add child '{}' to geode '{}'", child.name, self.name);
                false
            }
        }
    }

    /// Add a drawable. Returns false for anything but geodes.
    pub fn add_drawable(&mut self, drawable: Drawable) -> bool {
        match &mut self.kind {
            NodeKind::Geode { drawables } => {
                drawables.push(drawable);
                true
            }
            _ => {
                log::warn!("Cannot add drawable '{}' to non-geode '{}'", drawable.name, self.name);
                false
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_mask(&self) -> u32 {
        self.node_mask
    }

    pub fn set_node_mask(&mut self, mask: u32) {
        self.node_mask = mask;
    }

    /// Child nodes (empty for geodes)
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Group { children } | NodeKind::Transform { children, .. } => children,
            NodeKind::Geode { .. } => &[],
        }
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        match &mut self.kind {
            NodeKind::Group { children } | NodeKind::Transform { children, .. } => children,
            NodeKind::Geode { .. } => &mut [],
        }
    }

    /// Drawables (empty for non-geodes)
    pub fn drawables(&self) -> &[Drawable] {
        match &self.kind {
            NodeKind::Geode { drawables } => drawables,
            _ => &[],
        }
    }

    pub fn drawables_mut(&mut self) -> &mut [Drawable] {
        match &mut self.kind {
            NodeKind::Geode { drawables } => drawables,
            _ => &mut [],
        }
    }

    pub fn state_set(&self) -> Option<&StateSet> {
        self.state_set.as_ref()
    }

    pub fn state_set_mut(&mut self) -> Option<&mut StateSet> {
        self.state_set.as_mut()
    }

    /// State set, created on first use
    pub fn get_or_create_state_set(&mut self) -> &mut StateSet {
        self.state_set.get_or_insert_with(StateSet::new)
    }

    pub fn set_state_set(&mut self, state_set: Option<StateSet>) {
        self.state_set = state_set;
    }

    /// Dispatch a visitor on this node by kind.
    ///
    /// Nodes whose mask fails the visitor's traversal mask are skipped
    /// unless the visitor overrides node masks.
    pub fn accept<V: NodeVisitor + ?Sized>(&mut self, visitor: &mut V) {
        if !visitor.valid_node_mask(self) {
            return;
        }
        match self.kind {
            NodeKind::Group { .. } => visitor.apply_group(self),
            NodeKind::Transform { .. } => visitor.apply_transform(self),
            NodeKind::Geode { .. } => visitor.apply_geode(self),
        }
    }

    /// Visit every child
    pub fn traverse<V: NodeVisitor + ?Sized>(&mut self, visitor: &mut V) {
        for child in self.children_mut() {
            child.accept(visitor);
        }
    }

    /// Count nodes in this subtree (including self)
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Node::subtree_len).sum::<usize>()
    }
}
