//! Binary graph codec
//!
//! Serializes scene graphs and images into versioned `bincode` payloads.
//!
//! # Images inside graphs
//!
//! An image whose write hint is [`WriteHint::ExternalFile`] is stored by
//! file name only, unless the write options carry
//! `WriteImageHint=IncludeData`. On decode, file-name-only images are
//! loaded through the registry found in the read options; when that fails
//! the image comes back as an empty placeholder carrying the same name.
//!
//! # Sharing
//!
//! Textures and images referenced from several places in one graph are
//! encoded once and re-shared on decode.
//!
//! Objects still carrying user data are rejected: user data is transient
//! and has no serialized form.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use void_scene::{
    AttributeEntry, AttributeList, AttributeSlot, AttributeType, Drawable, FilterMode,
    GenericAttribute, Geometry, Image, ImageRef, Node, NodeKind, PixelFormat, StateAttribute,
    StateSet, StateValue, Texture, TextureRef, UserDataHolder, WrapMode, WriteHint,
};

use crate::options::Options;

/// Current payload format version
pub const FORMAT_VERSION: u32 = 1;

/// Errors from encoding or decoding payloads
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("{object} carries user data and cannot be serialized")]
    UserData { object: String },

    #[error("Invalid {what} index {index}")]
    InvalidIndex { what: &'static str, index: u32 },
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Serialize, Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(Serialize, Deserialize)]
enum ImageRecord {
    Inline {
        file_name: String,
        width: u32,
        height: u32,
        format: PixelFormat,
        write_hint: WriteHint,
        data: Vec<u8>,
    },
    External {
        file_name: String,
    },
}

#[derive(Serialize, Deserialize)]
struct TextureRecord {
    name: String,
    min_filter: FilterMode,
    mag_filter: FilterMode,
    wrap_s: WrapMode,
    wrap_t: WrapMode,
    unref_image_data_after_apply: bool,
    images: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
enum AttributeRecord {
    Texture(u32),
    Generic {
        kind: AttributeType,
        name: String,
        properties: BTreeMap<String, String>,
    },
}

#[derive(Serialize, Deserialize)]
struct EntryRecord {
    slot: AttributeSlot,
    value: StateValue,
    attribute: AttributeRecord,
}

#[derive(Serialize, Deserialize)]
struct StateSetRecord {
    attributes: Vec<EntryRecord>,
    texture_units: Vec<Vec<EntryRecord>>,
}

#[derive(Serialize, Deserialize)]
struct DrawableRecord {
    name: String,
    geometry: Geometry,
    state_set: Option<StateSetRecord>,
}

#[derive(Serialize, Deserialize)]
enum NodeKindRecord {
    Group(Vec<NodeRecord>),
    Transform([f32; 16], Vec<NodeRecord>),
    Geode(Vec<DrawableRecord>),
}

#[derive(Serialize, Deserialize)]
struct NodeRecord {
    name: String,
    node_mask: u32,
    state_set: Option<StateSetRecord>,
    kind: NodeKindRecord,
}

#[derive(Serialize, Deserialize)]
struct GraphRecord {
    version: u32,
    images: Vec<ImageRecord>,
    textures: Vec<TextureRecord>,
    root: NodeRecord,
}

#[derive(Serialize, Deserialize)]
struct ImagePayload {
    version: u32,
    image: ImageRecord,
}

/// Encode a scene graph
pub fn encode_node(node: &Node, options: Option<&Options>) -> CodecResult<Vec<u8>> {
    let mut encoder = Encoder::new(options);
    let root = encoder.node(node)?;
    let record = GraphRecord {
        version: FORMAT_VERSION,
        images: encoder.images,
        textures: encoder.textures,
        root,
    };
    Ok(bincode::serialize(&record)?)
}

/// Decode a scene graph, resolving external images through `options`
pub fn decode_node(bytes: &[u8], options: Option<&Options>) -> CodecResult<Node> {
    check_version(bytes)?;
    let record: GraphRecord = bincode::deserialize(bytes)?;

    let images: Vec<ImageRef> = record
        .images
        .into_iter()
        .map(|r| image_from_record(r, options).into_ref())
        .collect();

    let mut textures = Vec::with_capacity(record.textures.len());
    for r in record.textures {
        textures.push(texture_from_record(r, &images)?.into_ref());
    }

    node_from_record(record.root, &textures)
}

/// Encode a standalone image
pub fn encode_image(image: &Image, options: Option<&Options>) -> CodecResult<Vec<u8>> {
    check_user_data(image, || format!("Image \"{}\"", image.file_name()))?;
    let payload = ImagePayload {
        version: FORMAT_VERSION,
        image: image_record(image, include_data(options)),
    };
    Ok(bincode::serialize(&payload)?)
}

/// Decode a standalone image
pub fn decode_image(bytes: &[u8], options: Option<&Options>) -> CodecResult<Image> {
    check_version(bytes)?;
    let payload: ImagePayload = bincode::deserialize(bytes)?;
    Ok(image_from_record(payload.image, options))
}

fn check_version(bytes: &[u8]) -> CodecResult<()> {
    let header: VersionHeader = bincode::deserialize(bytes)?;
    if header.version != FORMAT_VERSION {
        return Err(CodecError::VersionMismatch {
            expected: FORMAT_VERSION,
            got: header.version,
        });
    }
    Ok(())
}

fn include_data(options: Option<&Options>) -> bool {
    options.map_or(false, Options::include_image_data)
}

fn check_user_data(holder: &impl UserDataHolder, object: impl FnOnce() -> String) -> CodecResult<()> {
    if holder.has_user_data() {
        return Err(CodecError::UserData { object: object() });
    }
    Ok(())
}

fn image_record(image: &Image, include_data: bool) -> ImageRecord {
    let external = image.write_hint() == WriteHint::ExternalFile
        && !include_data
        && !image.file_name().is_empty();

    if external {
        ImageRecord::External {
            file_name: image.file_name().to_string(),
        }
    } else {
        ImageRecord::Inline {
            file_name: image.file_name().to_string(),
            width: image.width(),
            height: image.height(),
            format: image.format(),
            write_hint: image.write_hint(),
            data: image.data().to_vec(),
        }
    }
}

struct Encoder {
    include_data: bool,
    images: Vec<ImageRecord>,
    image_index: HashMap<*const RwLock<Image>, u32>,
    textures: Vec<TextureRecord>,
    texture_index: HashMap<*const RwLock<Texture>, u32>,
}

impl Encoder {
    fn new(options: Option<&Options>) -> Self {
        Self {
            include_data: include_data(options),
            images: Vec::new(),
            image_index: HashMap::new(),
            textures: Vec::new(),
            texture_index: HashMap::new(),
        }
    }

    fn image(&mut self, image: &ImageRef) -> CodecResult<u32> {
        let key = Arc::as_ptr(image);
        if let Some(&idx) = self.image_index.get(&key) {
            return Ok(idx);
        }

        let image = image.read();
        check_user_data(&*image, || format!("Image \"{}\"", image.file_name()))?;

        let idx = self.images.len() as u32;
        self.images.push(image_record(&image, self.include_data));
        self.image_index.insert(key, idx);
        Ok(idx)
    }

    fn texture(&mut self, texture: &TextureRef) -> CodecResult<u32> {
        let key = Arc::as_ptr(texture);
        if let Some(&idx) = self.texture_index.get(&key) {
            return Ok(idx);
        }

        let texture = texture.read();
        check_user_data(&*texture, || format!("Texture \"{}\"", texture.name()))?;

        let mut images = Vec::with_capacity(texture.num_images());
        for image in texture.images() {
            images.push(self.image(image)?);
        }

        let (min_filter, mag_filter) = texture.filters();
        let (wrap_s, wrap_t) = texture.wrap();
        let idx = self.textures.len() as u32;
        self.textures.push(TextureRecord {
            name: texture.name().to_string(),
            min_filter,
            mag_filter,
            wrap_s,
            wrap_t,
            unref_image_data_after_apply: texture.unref_image_data_after_apply(),
            images,
        });
        self.texture_index.insert(key, idx);
        Ok(idx)
    }

    fn entries(&mut self, list: &AttributeList) -> CodecResult<Vec<EntryRecord>> {
        let mut out = Vec::with_capacity(list.len());
        for (slot, entry) in list {
            let attribute = match &entry.attribute {
                StateAttribute::Texture(texture) => AttributeRecord::Texture(self.texture(texture)?),
                StateAttribute::Generic(generic) => {
                    check_user_data(generic, || format!("Attribute \"{}\"", generic.name()))?;
                    AttributeRecord::Generic {
                        kind: generic.kind(),
                        name: generic.name().to_string(),
                        properties: generic.properties().clone(),
                    }
                }
            };
            out.push(EntryRecord {
                slot: *slot,
                value: entry.value,
                attribute,
            });
        }
        Ok(out)
    }

    fn state_set(&mut self, state_set: Option<&StateSet>, owner: &str) -> CodecResult<Option<StateSetRecord>> {
        let Some(ss) = state_set else {
            return Ok(None);
        };
        check_user_data(ss, || format!("State set of \"{}\"", owner))?;

        let attributes = self.entries(ss.attributes())?;
        let mut texture_units = Vec::with_capacity(ss.texture_attributes().len());
        for unit in ss.texture_attributes() {
            texture_units.push(self.entries(unit)?);
        }
        Ok(Some(StateSetRecord {
            attributes,
            texture_units,
        }))
    }

    fn drawable(&mut self, drawable: &Drawable) -> CodecResult<DrawableRecord> {
        check_user_data(drawable, || format!("Drawable \"{}\"", drawable.name()))?;
        Ok(DrawableRecord {
            name: drawable.name().to_string(),
            geometry: drawable.geometry().clone(),
            state_set: self.state_set(drawable.state_set(), drawable.name())?,
        })
    }

    fn node(&mut self, node: &Node) -> CodecResult<NodeRecord> {
        check_user_data(node, || format!("Node \"{}\"", node.name()))?;

        let state_set = self.state_set(node.state_set(), node.name())?;
        let kind = match node.kind() {
            NodeKind::Group { children } => NodeKindRecord::Group(self.children(children)?),
            NodeKind::Transform { matrix, children } => {
                NodeKindRecord::Transform(*matrix, self.children(children)?)
            }
            NodeKind::Geode { drawables } => {
                let mut records = Vec::with_capacity(drawables.len());
                for drawable in drawables {
                    records.push(self.drawable(drawable)?);
                }
                NodeKindRecord::Geode(records)
            }
        };

        Ok(NodeRecord {
            name: node.name().to_string(),
            node_mask: node.node_mask(),
            state_set,
            kind,
        })
    }

    fn children(&mut self, children: &[Node]) -> CodecResult<Vec<NodeRecord>> {
        children.iter().map(|child| self.node(child)).collect()
    }
}

fn image_from_record(record: ImageRecord, options: Option<&Options>) -> Image {
    match record {
        ImageRecord::Inline {
            file_name,
            width,
            height,
            format,
            write_hint,
            data,
        } => Image::new(width, height, format, data)
            .with_file_name(file_name)
            .with_write_hint(write_hint),
        ImageRecord::External { file_name } => resolve_external_image(&file_name, options),
    }
}

/// Load a file-name-only image through the registry in `options`
fn resolve_external_image(file_name: &str, options: Option<&Options>) -> Image {
    let placeholder = || Image::placeholder(file_name).with_write_hint(WriteHint::ExternalFile);

    let Some(registry) = options.and_then(Options::registry) else {
        log::warn!("No reader/writer registry to resolve external image \"{}\"", file_name);
        return placeholder();
    };

    match registry.read_image(file_name, options) {
        Ok(mut image) => {
            image.set_file_name(file_name);
            image.set_write_hint(WriteHint::ExternalFile);
            image
        }
        Err(e) => {
            log::warn!("Failed to resolve external image \"{}\": {}", file_name, e);
            placeholder()
        }
    }
}

fn texture_from_record(record: TextureRecord, images: &[ImageRef]) -> CodecResult<Texture> {
    let mut texture = Texture::new(record.name)
        .with_filters(record.min_filter, record.mag_filter)
        .with_wrap(record.wrap_s, record.wrap_t);
    texture.set_unref_image_data_after_apply(record.unref_image_data_after_apply);

    for index in record.images {
        let image = images
            .get(index as usize)
            .ok_or(CodecError::InvalidIndex { what: "image", index })?;
        texture.add_image(image.clone());
    }
    Ok(texture)
}

fn entries_from_records(records: Vec<EntryRecord>, textures: &[TextureRef]) -> CodecResult<AttributeList> {
    let mut list = AttributeList::new();
    for record in records {
        let attribute = match record.attribute {
            AttributeRecord::Texture(index) => {
                let texture = textures
                    .get(index as usize)
                    .ok_or(CodecError::InvalidIndex { what: "texture", index })?;
                StateAttribute::Texture(texture.clone())
            }
            AttributeRecord::Generic { kind, name, properties } => {
                let generic = properties
                    .into_iter()
                    .fold(GenericAttribute::new(kind, name), |g, (k, v)| g.with_property(k, v));
                StateAttribute::Generic(generic)
            }
        };
        list.insert(
            record.slot,
            AttributeEntry {
                attribute,
                value: record.value,
            },
        );
    }
    Ok(list)
}

fn state_set_from_record(record: Option<StateSetRecord>, textures: &[TextureRef]) -> CodecResult<Option<StateSet>> {
    let Some(record) = record else {
        return Ok(None);
    };

    let mut ss = StateSet::new();
    *ss.attributes_mut() = entries_from_records(record.attributes, textures)?;
    for unit in record.texture_units {
        let list = entries_from_records(unit, textures)?;
        ss.texture_attributes_mut().push(list);
    }
    Ok(Some(ss))
}

fn node_from_record(record: NodeRecord, textures: &[TextureRef]) -> CodecResult<Node> {
    let children = |records: Vec<NodeRecord>| -> CodecResult<Vec<Node>> {
        records.into_iter().map(|r| node_from_record(r, textures)).collect()
    };

    let kind = match record.kind {
        NodeKindRecord::Group(records) => NodeKind::Group {
            children: children(records)?,
        },
        NodeKindRecord::Transform(matrix, records) => NodeKind::Transform {
            matrix,
            children: children(records)?,
        },
        NodeKindRecord::Geode(records) => {
            let mut drawables = Vec::with_capacity(records.len());
            for r in records {
                let mut drawable = Drawable::new(r.name, r.geometry);
                drawable.set_state_set(state_set_from_record(r.state_set, textures)?);
                drawables.push(drawable);
            }
            NodeKind::Geode { drawables }
        }
    };

    let state_set = state_set_from_record(record.state_set, textures)?;
    Ok(Node::from_parts(record.name, record.node_mask, kind, state_set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadError, LoadResult, ReaderWriter, ReaderWriterRegistry};
    use crate::options::{INCLUDE_DATA, WRITE_IMAGE_HINT};
    use void_scene::{UserDataContainer, IDENTITY};

    fn pixels() -> Vec<u8> {
        vec![10, 20, 30, 255, 40, 50, 60, 255]
    }

    fn textured_geode(name: &str, texture: TextureRef) -> Node {
        let mut ss = StateSet::new();
        ss.set_texture_attribute(0, texture, StateValue::ON);
        Node::geode(name).with_drawable(Drawable::new("quad", Geometry::quad()).with_state_set(ss))
    }

    fn image(hint: WriteHint) -> ImageRef {
        Image::new(2, 1, PixelFormat::Rgba8, pixels())
            .with_file_name("tex/stone.png")
            .with_write_hint(hint)
            .into_ref()
    }

    #[test]
    fn test_graph_round_trip() {
        let texture = Texture::new("stone").with_image(image(WriteHint::NoPreference)).into_ref();
        let mut root = Node::transform("xf", IDENTITY).with_node_mask(0x4);
        root.get_or_create_state_set().set_attribute(
            GenericAttribute::new(AttributeType::Material, "rock").with_property("shininess", "12"),
            StateValue::ON.with(StateValue::OVERRIDE),
        );
        root.add_child(textured_geode("tile", texture));

        let bytes = encode_node(&root, None).unwrap();
        let decoded = decode_node(&bytes, None).unwrap();

        assert_eq!(decoded.name(), "xf");
        assert_eq!(decoded.node_mask(), 0x4);
        assert!(matches!(decoded.kind(), NodeKind::Transform { .. }));

        let material = decoded.state_set().unwrap().attributes().values().next().unwrap();
        assert_eq!(material.value, StateValue::ON.with(StateValue::OVERRIDE));
        match &material.attribute {
            StateAttribute::Generic(g) => assert_eq!(g.property("shininess"), Some("12")),
            other => panic!("unexpected attribute {:?}", other),
        }

        let drawable = &decoded.children()[0].drawables()[0];
        assert_eq!(drawable.geometry(), &Geometry::quad());
        let texture = drawable.state_set().unwrap().texture(0).unwrap().read();
        assert_eq!(texture.name(), "stone");
        assert_eq!(texture.images()[0].read().data(), pixels().as_slice());
    }

    #[test]
    fn test_user_data_is_rejected() {
        let root = Node::group("root")
            .with_child(Node::geode("leaf").with_user_data(UserDataContainer::new().with("marker", 1u8).into_shared()));

        match encode_node(&root, None) {
            Err(CodecError::UserData { object }) => assert!(object.contains("leaf")),
            other => panic!("expected user data error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_user_data_on_shared_texture_is_rejected() {
        let texture = Texture::new("marked")
            .with_user_data(UserDataContainer::new().with("compile", ()).into_shared())
            .into_ref();
        let root = Node::group("root").with_child(textured_geode("leaf", texture));
        assert!(matches!(encode_node(&root, None), Err(CodecError::UserData { .. })));
    }

    #[test]
    fn test_external_hint_stores_name_only() {
        let texture = Texture::new("stone").with_image(image(WriteHint::ExternalFile)).into_ref();
        let root = Node::group("root").with_child(textured_geode("tile", texture));

        let external = encode_node(&root, None).unwrap();
        let decoded = decode_node(&external, None).unwrap();
        let tex = decoded.children()[0].drawables()[0].state_set().unwrap().texture(0).unwrap().clone();
        let img = tex.read().images()[0].clone();
        assert!(img.read().is_empty());
        assert_eq!(img.read().file_name(), "tex/stone.png");

        let mut options = Options::new();
        options.set_plugin_string_data(WRITE_IMAGE_HINT, INCLUDE_DATA);
        let inline = encode_node(&root, Some(&options)).unwrap();
        assert!(inline.len() > external.len());
        let decoded = decode_node(&inline, None).unwrap();
        let tex = decoded.children()[0].drawables()[0].state_set().unwrap().texture(0).unwrap().clone();
        assert_eq!(tex.read().images()[0].read().data(), pixels().as_slice());
    }

    struct Stones;

    impl ReaderWriter for Stones {
        fn extensions(&self) -> &[&str] {
            &["png"]
        }

        fn read_image(&self, url: &str, _options: Option<&Options>) -> LoadResult<Image> {
            if url == "tex/stone.png" {
                Ok(Image::new(2, 1, PixelFormat::Rgba8, pixels()).with_file_name("loaded"))
            } else {
                Err(LoadError::NotFound(url.to_string()))
            }
        }
    }

    #[test]
    fn test_external_images_resolve_through_registry() {
        let texture = Texture::new("stone").with_image(image(WriteHint::ExternalFile)).into_ref();
        let root = Node::group("root").with_child(textured_geode("tile", texture));
        let bytes = encode_node(&root, None).unwrap();

        let mut registry = ReaderWriterRegistry::new();
        registry.register(Stones);
        let options = Options::new().with_registry(Arc::new(registry));

        let decoded = decode_node(&bytes, Some(&options)).unwrap();
        let tex = decoded.children()[0].drawables()[0].state_set().unwrap().texture(0).unwrap().clone();
        let img = tex.read().images()[0].clone();
        let img = img.read();
        assert_eq!(img.data(), pixels().as_slice());
        assert_eq!(img.file_name(), "tex/stone.png");
        assert_eq!(img.write_hint(), WriteHint::ExternalFile);
    }

    #[test]
    fn test_shared_texture_stays_shared() {
        let texture = Texture::new("shared").with_image(image(WriteHint::NoPreference)).into_ref();
        let root = Node::group("root")
            .with_child(textured_geode("a", texture.clone()))
            .with_child(textured_geode("b", texture));

        let decoded = decode_node(&encode_node(&root, None).unwrap(), None).unwrap();
        let a = decoded.children()[0].drawables()[0].state_set().unwrap().texture(0).unwrap();
        let b = decoded.children()[1].drawables()[0].state_set().unwrap().texture(0).unwrap();
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_version_mismatch() {
        let mut bytes = bincode::serialize(&VersionHeader { version: 99 }).unwrap();
        bytes.extend_from_slice(&[0; 16]);

        assert!(matches!(
            decode_node(&bytes, None),
            Err(CodecError::VersionMismatch { expected: FORMAT_VERSION, got: 99 })
        ));
        assert!(matches!(decode_image(&bytes, None), Err(CodecError::VersionMismatch { .. })));
    }

    #[test]
    fn test_standalone_image_honors_include_data() {
        let img = Image::new(2, 1, PixelFormat::Rgba8, pixels())
            .with_file_name("/data/tex.png")
            .with_write_hint(WriteHint::ExternalFile);

        let name_only = decode_image(&encode_image(&img, None).unwrap(), None).unwrap();
        assert!(name_only.is_empty());

        let mut options = Options::new();
        options.set_plugin_string_data(WRITE_IMAGE_HINT, INCLUDE_DATA);
        let full = decode_image(&encode_image(&img, Some(&options)).unwrap(), None).unwrap();
        assert_eq!(full.data(), pixels().as_slice());
        assert_eq!(full.file_name(), "/data/tex.png");
    }
}
