//! Graph sanitizing before serialization
//!
//! [`PrepareForCaching`] walks every node, drawable, state set and
//! attribute of a graph, node masks ignored, and:
//!
//! - detaches user data, which has no serialized form;
//! - swaps each texture for a private shallow clone with
//!   `unref_image_data_after_apply` turned off, so the cached copy keeps its
//!   pixels and the original texture (possibly shared with threads that are
//!   compiling it) is never mutated.
//!
//! A texture whose lock cannot be taken within the timeout is left in place
//! with a warning.

use std::time::Duration;

use void_scene::{AttributeEntry, Drawable, Node, NodeVisitor, StateAttribute, StateSet, TextureRef, UserDataHolder, NODE_MASK_ALL};

/// Sanitizing pass run before a graph is written to a cache bin
#[derive(Debug)]
pub struct PrepareForCaching {
    clone_lock_timeout: Duration,
    textures: usize,
    user_data_clears: usize,
    clone_failures: usize,
}

impl PrepareForCaching {
    pub fn new(clone_lock_timeout: Duration) -> Self {
        Self {
            clone_lock_timeout,
            textures: 0,
            user_data_clears: 0,
            clone_failures: 0,
        }
    }

    /// Sanitize `root` and everything below it
    pub fn run(&mut self, root: &mut Node) {
        root.accept(self);
    }

    /// Textures replaced by clones
    pub fn textures(&self) -> usize {
        self.textures
    }

    /// User data containers detached
    pub fn user_data_clears(&self) -> usize {
        self.user_data_clears
    }

    /// Textures left in place because their lock timed out
    pub fn clone_failures(&self) -> usize {
        self.clone_failures
    }

    fn apply_user_data(&mut self, object: &mut impl UserDataHolder) {
        if object.take_user_data().is_some() {
            self.user_data_clears += 1;
        }
    }

    fn apply_state_set(&mut self, state_set: Option<&mut StateSet>) {
        let Some(ss) = state_set else {
            return;
        };

        for entry in ss.attributes_mut().values_mut() {
            self.apply_entry(entry);
        }

        for unit in ss.texture_attributes_mut().iter_mut() {
            for entry in unit.values_mut() {
                self.apply_entry(entry);
            }
        }

        self.apply_user_data(ss);
    }

    fn apply_entry(&mut self, entry: &mut AttributeEntry) {
        match &mut entry.attribute {
            StateAttribute::Texture(texture) => {
                if let Some(clone) = self.clone_texture(texture) {
                    *texture = clone;
                }
            }
            StateAttribute::Generic(generic) => self.apply_user_data(generic),
        }
    }

    fn clone_texture(&mut self, original: &TextureRef) -> Option<TextureRef> {
        let Some(guard) = original.try_read_for(self.clone_lock_timeout) else {
            log::warn!("[PrepareForCaching] Texture clone failed: texture is locked");
            self.clone_failures += 1;
            return None;
        };
        let mut clone = guard.shallow_clone();
        drop(guard);

        clone.set_unref_image_data_after_apply(false);

        // Images stay shared with the original texture
        for image in clone.images() {
            match image.try_write_for(self.clone_lock_timeout) {
                Some(mut image) => self.apply_user_data(&mut *image),
                None => log::warn!("[PrepareForCaching] Image is locked, user data left in place"),
            }
        }
        self.apply_user_data(&mut clone);

        self.textures += 1;
        Some(clone.into_ref())
    }

    fn apply_drawable(&mut self, drawable: &mut Drawable) {
        self.apply_state_set(drawable.state_set_mut());
        self.apply_user_data(drawable);
    }
}

impl NodeVisitor for PrepareForCaching {
    fn node_mask_override(&self) -> u32 {
        NODE_MASK_ALL
    }

    fn apply_node(&mut self, node: &mut Node) {
        self.apply_state_set(node.state_set_mut());
        self.apply_user_data(node);
        node.traverse(self);
    }

    fn apply_geode(&mut self, node: &mut Node) {
        for drawable in node.drawables_mut() {
            self.apply_drawable(drawable);
        }
        self.apply_node(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use void_scene::{
        AttributeType, GenericAttribute, Geometry, Image, PixelFormat, StateValue, Texture, UserDataContainer,
    };

    fn marker() -> void_scene::UserData {
        UserDataContainer::new().with("compile_marker", 1u32).into_shared()
    }

    fn shared_texture() -> TextureRef {
        let image = Image::new(1, 1, PixelFormat::Rgba8, vec![0; 4])
            .with_file_name("a.png")
            .with_user_data(marker())
            .into_ref();
        Texture::new("shared").with_image(image).with_user_data(marker()).into_ref()
    }

    fn textured_state(texture: &TextureRef) -> StateSet {
        let mut ss = StateSet::new();
        ss.set_texture_attribute(0, texture.clone(), StateValue::ON);
        ss.set_attribute(
            GenericAttribute::new(AttributeType::Material, "mat").with_user_data(marker()),
            StateValue::ON,
        );
        ss.with_user_data(marker())
    }

    #[test]
    fn test_strips_user_data_everywhere() {
        let texture = shared_texture();
        let mut root = Node::group("root").with_user_data(marker()).with_child(
            Node::geode("hidden")
                .with_node_mask(0)
                .with_state_set(textured_state(&texture))
                .with_drawable(Drawable::new("quad", Geometry::quad()).with_user_data(marker())),
        );

        let mut prepare = PrepareForCaching::new(Duration::from_millis(10));
        prepare.run(&mut root);

        // root, drawable, material, image, texture clone, state set
        assert_eq!(prepare.user_data_clears(), 6);
        assert_eq!(prepare.textures(), 1);
        assert!(!root.has_user_data());

        let geode = &root.children()[0];
        let ss = geode.state_set().unwrap();
        assert!(!ss.has_user_data());
        assert!(!geode.drawables()[0].has_user_data());

        let clone = ss.texture(0).unwrap();
        assert!(!Arc::ptr_eq(clone, &texture));
        assert!(!clone.read().has_user_data());
        assert!(!clone.read().unref_image_data_after_apply());
    }

    #[test]
    fn test_original_texture_untouched() {
        let texture = shared_texture();
        let original_marker = texture.read().user_data().cloned().unwrap();
        let mut root = Node::geode("leaf").with_state_set(textured_state(&texture));

        PrepareForCaching::new(Duration::from_millis(10)).run(&mut root);

        let original = texture.read();
        assert!(Arc::ptr_eq(original.user_data().unwrap(), &original_marker));
        assert!(original.unref_image_data_after_apply());

        // Image handles are shared between original and clone
        let clone = root.state_set().unwrap().texture(0).unwrap().read();
        assert!(Arc::ptr_eq(&clone.images()[0], &original.images()[0]));
    }

    #[test]
    fn test_locked_texture_is_left_in_place() {
        let texture = shared_texture();
        let mut root = Node::geode("leaf").with_state_set(textured_state(&texture));

        let writer = texture.write();
        let mut prepare = PrepareForCaching::new(Duration::from_millis(5));
        prepare.run(&mut root);
        drop(writer);

        assert_eq!(prepare.clone_failures(), 1);
        assert_eq!(prepare.textures(), 0);
        assert!(Arc::ptr_eq(root.state_set().unwrap().texture(0).unwrap(), &texture));
    }
}
