//! Graph traversal
//!
//! [`NodeVisitor`] is dispatched per node kind by [`Node::accept`]; the
//! default hooks fall through geode/transform → group → node and then visit
//! all children. [`TextureAndImageVisitor`] walks every texture reachable
//! from any state set in a graph (nodes and drawables) and, by default,
//! every image those textures own.

use crate::image::ImageRef;
use crate::node::{Drawable, Node, NODE_MASK_ALL};
use crate::state::StateSet;
use crate::texture::TextureRef;

/// Per-kind hooks for walking a scene graph
pub trait NodeVisitor {
    /// Bits a node mask must share with this mask to be visited
    fn traversal_mask(&self) -> u32 {
        NODE_MASK_ALL
    }

    /// Bits OR'ed into every node mask before testing it
    fn node_mask_override(&self) -> u32 {
        0
    }

    /// Whether a node passes the mask test
    fn valid_node_mask(&self, node: &Node) -> bool {
        self.traversal_mask() & (self.node_mask_override() | node.node_mask()) != 0
    }

    fn apply_node(&mut self, node: &mut Node) {
        node.traverse(self);
    }

    fn apply_group(&mut self, node: &mut Node) {
        self.apply_node(node);
    }

    fn apply_transform(&mut self, node: &mut Node) {
        self.apply_group(node);
    }

    fn apply_geode(&mut self, node: &mut Node) {
        self.apply_node(node);
    }
}

/// Hooks for textures and images found anywhere in a graph
pub trait TextureAndImageVisitor {
    /// Called once per texture reference encountered.
    ///
    /// The default visits every image of the texture. The texture lock is
    /// released before images are visited.
    fn apply_texture(&mut self, texture: &TextureRef) {
        let images: Vec<ImageRef> = texture.read().images().to_vec();
        for image in &images {
            self.apply_image(image);
        }
    }

    fn apply_image(&mut self, _image: &ImageRef) {}
}

/// Walk a graph, ignoring node masks, and feed every texture to `visitor`
pub fn visit_textures_and_images<V: TextureAndImageVisitor + ?Sized>(root: &mut Node, visitor: &mut V) {
    let mut walker = TextureWalker { inner: visitor };
    root.accept(&mut walker);
}

struct TextureWalker<'a, V: ?Sized> {
    inner: &'a mut V,
}

impl<V: TextureAndImageVisitor + ?Sized> TextureWalker<'_, V> {
    fn apply_state_set(&mut self, state_set: Option<&StateSet>) {
        if let Some(ss) = state_set {
            for texture in ss.textures() {
                self.inner.apply_texture(texture);
            }
        }
    }

    fn apply_drawable(&mut self, drawable: &Drawable) {
        self.apply_state_set(drawable.state_set());
    }
}

impl<V: TextureAndImageVisitor + ?Sized> NodeVisitor for TextureWalker<'_, V> {
    fn node_mask_override(&self) -> u32 {
        NODE_MASK_ALL
    }

    fn apply_node(&mut self, node: &mut Node) {
        self.apply_state_set(node.state_set());
        node.traverse(self);
    }

    fn apply_geode(&mut self, node: &mut Node) {
        for drawable in node.drawables() {
            self.apply_drawable(drawable);
        }
        self.apply_node(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Image, PixelFormat};
    use crate::node::{Geometry, IDENTITY};
    use crate::state::StateValue;
    use crate::texture::Texture;

    #[derive(Default)]
    struct NameCollector {
        names: Vec<String>,
        mask_override: u32,
    }

    impl NodeVisitor for NameCollector {
        fn node_mask_override(&self) -> u32 {
            self.mask_override
        }

        fn apply_node(&mut self, node: &mut Node) {
            self.names.push(node.name().to_string());
            node.traverse(self);
        }
    }

    fn hidden_graph() -> Node {
        Node::group("root")
            .with_child(Node::geode("visible"))
            .with_child(
                Node::transform("hidden", IDENTITY)
                    .with_node_mask(0)
                    .with_child(Node::geode("under_hidden")),
            )
    }

    #[test]
    fn test_node_mask_filters_by_default() {
        let mut root = hidden_graph();
        let mut collector = NameCollector::default();
        root.accept(&mut collector);
        assert_eq!(collector.names, vec!["root", "visible"]);
    }

    #[test]
    fn test_node_mask_override_visits_everything() {
        let mut root = hidden_graph();
        let mut collector = NameCollector {
            mask_override: NODE_MASK_ALL,
            ..Default::default()
        };
        root.accept(&mut collector);
        assert_eq!(collector.names, vec!["root", "visible", "hidden", "under_hidden"]);
    }

    #[derive(Default)]
    struct ImageNames(Vec<String>);

    impl TextureAndImageVisitor for ImageNames {
        fn apply_image(&mut self, image: &ImageRef) {
            self.0.push(image.read().file_name().to_string());
        }
    }

    fn textured(name: &str) -> StateSet {
        let image = Image::new(1, 1, PixelFormat::Luminance8, vec![0])
            .with_file_name(name)
            .into_ref();
        let mut ss = StateSet::new();
        ss.set_texture_attribute(0, Texture::new(name).with_image(image).into_ref(), StateValue::ON);
        ss
    }

    #[test]
    fn test_images_in_nodes_and_drawables_under_hidden_nodes() {
        let geode = Node::geode("leaf")
            .with_node_mask(0)
            .with_state_set(textured("node.png"))
            .with_drawable(Drawable::new("quad", Geometry::quad()).with_state_set(textured("drawable.png")));
        let mut root = Node::group("root").with_state_set(textured("root.png")).with_child(geode);

        let mut names = ImageNames::default();
        visit_textures_and_images(&mut root, &mut names);

        assert_eq!(names.0, vec!["root.png", "drawable.png", "node.png"]);
    }
}
