//! Serde data model for every glTF 2.0 array entity.
//!
//! Each struct mirrors one element of a top-level document array. Structural
//! fields are deserialized once and never mutated; the only field written
//! after parsing is `index`, assigned by the indexing pass before any
//! resolution begins.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Shared shape of every element of a document array: a stable `index`
/// equal to its array position, plus opaque extension/extra payloads.
pub trait ArrayItem {
    fn index(&self) -> usize;
    fn set_index(&mut self, index: usize);
}

macro_rules! array_item {
    ($($ty:ty),+ $(,)?) => {
        $(impl ArrayItem for $ty {
            fn index(&self) -> usize {
                self.index
            }

            fn set_index(&mut self, index: usize) {
                self.index = index;
            }
        })+
    };
}

/// Named extension payloads attached to a glTF property, opaque to the
/// core engine and surfaced to the extension chain.
pub type ExtensionMap = Map<String, Value>;

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessorType {
    #[default]
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    /// Number of components per element.
    pub fn component_count(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Accessor {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: u32,
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: AccessorType,
    /// Sparse substitution sub-object. Detected and rejected during
    /// accessor decoding; see DESIGN.md.
    pub sparse: Option<Value>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    Cubicspline,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationTarget {
    pub node: Option<usize>,
    pub path: TargetPath,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationChannel {
    #[serde(skip)]
    pub index: usize,
    pub sampler: usize,
    pub target: AnimationTarget,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSampler {
    #[serde(skip)]
    pub index: usize,
    pub input: usize,
    #[serde(default)]
    pub interpolation: Interpolation,
    pub output: usize,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Animation {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSampler>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Buffer {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub uri: Option<String>,
    pub byte_length: usize,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferView {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveCamera {
    pub aspect_ratio: Option<f32>,
    pub yfov: f32,
    pub zfar: Option<f32>,
    pub znear: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrthographicCamera {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub camera_type: CameraType,
    pub perspective: Option<PerspectiveCamera>,
    pub orthographic: Option<OrthographicCamera>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Image {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub uri: Option<String>,
    pub mime_type: Option<String>,
    pub buffer_view: Option<usize>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

/// Reference from a material to one texture plus its UV set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    #[serde(rename = "index")]
    pub texture: usize,
    #[serde(default)]
    pub tex_coord: u32,
    /// Scale for normal textures, strength for occlusion textures.
    pub scale: Option<f32>,
    pub strength: Option<f32>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PbrMetallicRoughness {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureInfo>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            extensions: None,
            extras: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Material {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    pub normal_texture: Option<TextureInfo>,
    pub occlusion_texture: Option<TextureInfo>,
    pub emissive_texture: Option<TextureInfo>,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            index: 0,
            name: None,
            pbr_metallic_roughness: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0, 0.0, 0.0],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            extensions: None,
            extras: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Primitive {
    #[serde(skip)]
    pub index: usize,
    /// Vertex attribute accessors keyed by semantic name (POSITION,
    /// NORMAL, TEXCOORD_0, ...). Ordered map so resolution order is
    /// deterministic.
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    /// glTF draw mode constant, default 4 (triangles).
    pub mode: Option<u32>,
    /// Morph targets: per-target delta attribute accessors.
    pub targets: Option<Vec<BTreeMap<String, usize>>>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Mesh {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
    pub weights: Option<Vec<f32>>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub camera: Option<usize>,
    pub children: Vec<usize>,
    pub skin: Option<usize>,
    /// Full column-major local transform. Takes precedence over the
    /// TRS fields when present.
    pub matrix: Option<[f32; 16]>,
    pub mesh: Option<usize>,
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub weights: Option<Vec<f32>>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Sampler {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    pub wrap_s: Option<u32>,
    pub wrap_t: Option<u32>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Scene {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub nodes: Vec<usize>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Skin {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub inverse_bind_matrices: Option<usize>,
    pub skeleton: Option<usize>,
    pub joints: Vec<usize>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Texture {
    #[serde(skip)]
    pub index: usize,
    pub name: Option<String>,
    pub sampler: Option<usize>,
    pub source: Option<usize>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

array_item!(
    Accessor,
    Animation,
    AnimationChannel,
    AnimationSampler,
    Buffer,
    BufferView,
    Camera,
    Image,
    Material,
    Mesh,
    Node,
    Primitive,
    Sampler,
    Scene,
    Skin,
    Texture,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_type_component_counts() {
        assert_eq!(AccessorType::Scalar.component_count(), 1);
        assert_eq!(AccessorType::Vec3.component_count(), 3);
        assert_eq!(AccessorType::Mat4.component_count(), 16);
    }

    #[test]
    fn test_material_defaults_match_gltf_spec() {
        let material = Material::default();
        assert_eq!(material.alpha_mode, AlphaMode::Opaque);
        assert_eq!(material.alpha_cutoff, 0.5);
        assert!(!material.double_sided);
        let pbr = PbrMetallicRoughness::default();
        assert_eq!(pbr.base_color_factor, [1.0; 4]);
        assert_eq!(pbr.metallic_factor, 1.0);
    }

    #[test]
    fn test_primitive_deserializes_attributes() {
        let json = serde_json::json!({
            "attributes": { "POSITION": 0, "NORMAL": 1 },
            "indices": 2,
            "mode": 4
        });
        let primitive: Primitive = serde_json::from_value(json).unwrap();
        assert_eq!(primitive.attributes["POSITION"], 0);
        assert_eq!(primitive.indices, Some(2));
    }
}
