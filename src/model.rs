//! Renderer-facing objects constructed by the resolvers.
//!
//! Each resolved object is created once, handed to the caller's assign
//! callback immediately after construction, and has its remaining
//! properties populated asynchronously afterwards. Property slots that fill
//! in late (a node's children, a material's textures) therefore sit behind
//! interior mutability; object identity is stable from the moment of
//! construction.

use crate::document::{AlphaMode, Interpolation, TargetPath};
use crate::gpu::{GpuBuffer, GpuTexture};
use glam::{Mat4, Quat, Vec3};
use parking_lot::RwLock;
use std::sync::Arc;

/// Draw mode a primitive is rendered with, mapped from the glTF `mode`
/// constant. Materials are instantiated per draw mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveType {
    /// Map the glTF `mode` constant (0..=6). `None` for out-of-range
    /// values.
    pub fn from_gltf_mode(mode: u32) -> Option<Self> {
        match mode {
            0 => Some(Self::Points),
            1 => Some(Self::Lines),
            2 => Some(Self::LineLoop),
            3 => Some(Self::LineStrip),
            4 => Some(Self::Triangles),
            5 => Some(Self::TriangleStrip),
            6 => Some(Self::TriangleFan),
            _ => None,
        }
    }
}

/// One vertex attribute bound to a renderer buffer.
#[derive(Debug, Clone)]
pub struct VertexBufferBinding {
    /// glTF attribute semantic (POSITION, NORMAL, TEXCOORD_0, ...).
    pub semantic: String,
    pub buffer: Arc<GpuBuffer>,
    /// Elements in the source accessor.
    pub count: usize,
    /// Components per element.
    pub components: usize,
}

/// One morph target: delta attribute buffers layered additively onto the
/// base primitive.
#[derive(Debug, Clone)]
pub struct MorphTarget {
    pub deltas: Vec<VertexBufferBinding>,
}

/// Geometry of one primitive: attribute bindings plus optional indices.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveGeometry {
    pub attributes: Vec<VertexBufferBinding>,
    pub indices: Option<Arc<GpuBuffer>>,
    pub vertex_count: usize,
    pub index_count: usize,
    pub morph_targets: Vec<MorphTarget>,
}

impl PrimitiveGeometry {
    pub fn attribute(&self, semantic: &str) -> Option<&VertexBufferBinding> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }
}

/// A resolved mesh primitive.
#[derive(Debug)]
pub struct RenderPrimitive {
    pub primitive_type: PrimitiveType,
    pub geometry: Arc<PrimitiveGeometry>,
    material: RwLock<Option<Arc<RenderMaterial>>>,
}

impl RenderPrimitive {
    pub fn new(primitive_type: PrimitiveType, geometry: Arc<PrimitiveGeometry>) -> Self {
        Self {
            primitive_type,
            geometry,
            material: RwLock::new(None),
        }
    }

    pub fn material(&self) -> Option<Arc<RenderMaterial>> {
        self.material.read().clone()
    }

    pub fn set_material(&self, material: Arc<RenderMaterial>) {
        *self.material.write() = Some(material);
    }
}

/// A resolved mesh: one renderer primitive per glTF primitive.
#[derive(Debug)]
pub struct RenderMesh {
    pub index: usize,
    pub name: Option<String>,
    pub primitives: Vec<Arc<RenderPrimitive>>,
    /// Default morph target weights, from the mesh definition.
    pub weights: Vec<f32>,
}

/// Wrap mode constants resolved from a glTF sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    MirroredRepeat,
    Repeat,
}

impl WrapMode {
    pub fn from_gltf(value: u32) -> Option<Self> {
        match value {
            33071 => Some(Self::ClampToEdge),
            33648 => Some(Self::MirroredRepeat),
            10497 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// Resolved sampler state: wrap modes, filtering, mip generation flag.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerState {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    /// Whether the renderer should generate mipmaps, derived from the
    /// minification filter (any mipmap-minification constant, or an
    /// unspecified filter, requests generation).
    pub generate_mipmaps: bool,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            mag_filter: None,
            min_filter: None,
            generate_mipmaps: true,
        }
    }
}

/// A resolved texture: sampler state combined with a renderer-side image.
#[derive(Debug)]
pub struct RenderTexture {
    pub index: usize,
    pub name: Option<String>,
    pub sampler: SamplerState,
    pub gpu: GpuTexture,
    /// UV set the referencing texture-info selected.
    pub tex_coord: u32,
}

/// Mutable property block of a material, populated asynchronously after
/// the material object itself is constructed.
#[derive(Debug, Clone)]
pub struct MaterialProperties {
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub base_color_texture: Option<Arc<RenderTexture>>,
    pub metallic_roughness_texture: Option<Arc<RenderTexture>>,
    pub normal_texture: Option<Arc<RenderTexture>>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<Arc<RenderTexture>>,
    pub occlusion_strength: f32,
    pub emissive_texture: Option<Arc<RenderTexture>>,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive_texture: None,
        }
    }
}

/// A resolved material, specialized for one draw mode.
///
/// Creation is split from property population: the empty object exists (and
/// is assignable to primitives) while texture loads proceed in the
/// background.
#[derive(Debug)]
pub struct RenderMaterial {
    /// glTF material index; `None` for the loader's default material.
    pub index: Option<usize>,
    pub name: Option<String>,
    pub primitive_type: PrimitiveType,
    properties: RwLock<MaterialProperties>,
}

impl RenderMaterial {
    pub fn new(index: Option<usize>, name: Option<String>, primitive_type: PrimitiveType) -> Self {
        Self {
            index,
            name,
            primitive_type,
            properties: RwLock::new(MaterialProperties::default()),
        }
    }

    pub fn properties(&self) -> MaterialProperties {
        self.properties.read().clone()
    }

    pub fn update_properties(&self, update: impl FnOnce(&mut MaterialProperties)) {
        update(&mut self.properties.write());
    }
}

/// Camera projection resolved from a glTF camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraProjection {
    Perspective {
        aspect_ratio: Option<f32>,
        yfov: f32,
        znear: f32,
        zfar: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}

#[derive(Debug)]
pub struct RenderCamera {
    pub index: usize,
    pub name: Option<String>,
    pub projection: CameraProjection,
}

/// A resolved scene-graph node.
///
/// Nodes are owned by the resolution result; the parent link is an index
/// back-reference used purely for lookup (matrix inheritance, joint paths)
/// and never drives ownership or destruction order.
#[derive(Debug)]
pub struct RenderNode {
    pub index: usize,
    pub name: Option<String>,
    pub local_transform: Mat4,
    parent: RwLock<Option<usize>>,
    children: RwLock<Vec<Arc<RenderNode>>>,
    mesh: RwLock<Option<Arc<RenderMesh>>>,
    camera: RwLock<Option<Arc<RenderCamera>>>,
    skeleton: RwLock<Option<Arc<Skeleton>>>,
    morph_weights: RwLock<Vec<f32>>,
}

impl RenderNode {
    pub fn new(index: usize, name: Option<String>, local_transform: Mat4) -> Self {
        Self {
            index,
            name,
            local_transform,
            parent: RwLock::new(None),
            children: RwLock::new(Vec::new()),
            mesh: RwLock::new(None),
            camera: RwLock::new(None),
            skeleton: RwLock::new(None),
            morph_weights: RwLock::new(Vec::new()),
        }
    }

    /// Compose a local transform from separate TRS fields, in
    /// translation ∘ rotation ∘ scale order.
    pub fn compose_trs(
        translation: Option<[f32; 3]>,
        rotation: Option<[f32; 4]>,
        scale: Option<[f32; 3]>,
    ) -> Mat4 {
        let translation = Vec3::from_array(translation.unwrap_or([0.0; 3]));
        let rotation = Quat::from_array(rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]));
        let scale = Vec3::from_array(scale.unwrap_or([1.0; 3]));
        Mat4::from_scale_rotation_translation(scale, rotation, translation)
    }

    pub fn parent(&self) -> Option<usize> {
        *self.parent.read()
    }

    pub(crate) fn set_parent(&self, parent: Option<usize>) {
        *self.parent.write() = parent;
    }

    pub fn children(&self) -> Vec<Arc<RenderNode>> {
        self.children.read().clone()
    }

    pub(crate) fn add_child(&self, child: Arc<RenderNode>) {
        self.children.write().push(child);
    }

    pub fn mesh(&self) -> Option<Arc<RenderMesh>> {
        self.mesh.read().clone()
    }

    pub(crate) fn set_mesh(&self, mesh: Arc<RenderMesh>) {
        *self.mesh.write() = Some(mesh);
    }

    pub fn camera(&self) -> Option<Arc<RenderCamera>> {
        self.camera.read().clone()
    }

    pub(crate) fn set_camera(&self, camera: Arc<RenderCamera>) {
        *self.camera.write() = Some(camera);
    }

    pub fn skeleton(&self) -> Option<Arc<Skeleton>> {
        self.skeleton.read().clone()
    }

    pub(crate) fn set_skeleton(&self, skeleton: Arc<Skeleton>) {
        *self.skeleton.write() = Some(skeleton);
    }

    pub fn morph_weights(&self) -> Vec<f32> {
        self.morph_weights.read().clone()
    }

    pub(crate) fn set_morph_weights(&self, weights: Vec<f32>) {
        *self.morph_weights.write() = weights;
    }

    /// Depth-first traversal over this node and its descendants.
    pub fn visit(self: &Arc<Self>, visitor: &mut impl FnMut(&Arc<RenderNode>)) {
        visitor(self);
        for child in self.children.read().iter() {
            child.visit(visitor);
        }
    }
}

/// One bone of a skeleton, parallel to a joint node.
#[derive(Debug, Clone)]
pub struct Bone {
    /// Document index of the joint node.
    pub node_index: usize,
    /// Position of the parent bone within the skeleton's bone list, if the
    /// parent node is itself a joint.
    pub parent_bone: Option<usize>,
    /// Local rest matrix of the joint node.
    pub rest_matrix: Mat4,
}

/// A resolved skin: bone hierarchy parallel to the node hierarchy
/// restricted to the skin's joint list.
///
/// Bone linkage is finalized as deferred completion work, once the whole
/// node hierarchy (including ancestors outside the skin) exists.
#[derive(Debug)]
pub struct Skeleton {
    pub index: usize,
    pub name: Option<String>,
    /// Joint node indices in skin order.
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
    bones: RwLock<Vec<Bone>>,
}

impl Skeleton {
    pub fn new(
        index: usize,
        name: Option<String>,
        joints: Vec<usize>,
        inverse_bind_matrices: Vec<Mat4>,
    ) -> Self {
        Self {
            index,
            name,
            joints,
            inverse_bind_matrices,
            bones: RwLock::new(Vec::new()),
        }
    }

    pub fn bones(&self) -> Vec<Bone> {
        self.bones.read().clone()
    }

    pub(crate) fn set_bones(&self, bones: Vec<Bone>) {
        *self.bones.write() = bones;
    }

    /// Whether deferred bone linkage has completed.
    pub fn is_finalized(&self) -> bool {
        !self.bones.read().is_empty() || self.joints.is_empty()
    }
}

/// One keyframed channel of an animation group.
#[derive(Debug, Clone)]
pub struct AnimationChannelData {
    /// Document index of the target node.
    pub target_node: usize,
    pub path: TargetPath,
    pub interpolation: Interpolation,
    /// Keyframe times, seconds.
    pub input: Arc<Vec<f32>>,
    /// Keyframe values, component count per key determined by `path`.
    pub output: Arc<Vec<f32>>,
}

/// Policy for starting animations once all groups exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationStartPolicy {
    None,
    #[default]
    First,
    All,
}

/// Aggregates all channels of one glTF animation.
#[derive(Debug)]
pub struct AnimationGroup {
    pub index: usize,
    pub name: Option<String>,
    pub channels: Vec<AnimationChannelData>,
    playing: RwLock<bool>,
}

impl AnimationGroup {
    pub fn new(index: usize, name: Option<String>, channels: Vec<AnimationChannelData>) -> Self {
        Self {
            index,
            name,
            channels,
            playing: RwLock::new(false),
        }
    }

    /// Duration in seconds: the latest keyframe time over all channels.
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .filter_map(|c| c.input.last().copied())
            .fold(0.0, f32::max)
    }

    pub fn start(&self) {
        *self.playing.write() = true;
    }

    pub fn stop(&self) {
        *self.playing.write() = false;
    }

    pub fn is_playing(&self) -> bool {
        *self.playing.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_type_from_gltf_mode() {
        assert_eq!(PrimitiveType::from_gltf_mode(0), Some(PrimitiveType::Points));
        assert_eq!(PrimitiveType::from_gltf_mode(4), Some(PrimitiveType::Triangles));
        assert_eq!(PrimitiveType::from_gltf_mode(7), None);
    }

    #[test]
    fn test_compose_trs_order() {
        // translation ∘ rotation ∘ scale: a scaled point is rotated, then
        // translated.
        let m = RenderNode::compose_trs(
            Some([1.0, 0.0, 0.0]),
            None,
            Some([2.0, 2.0, 2.0]),
        );
        let p = m.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_node_property_slots_fill_after_construction() {
        let node = Arc::new(RenderNode::new(0, None, Mat4::IDENTITY));
        assert!(node.mesh().is_none());
        let child = Arc::new(RenderNode::new(1, None, Mat4::IDENTITY));
        child.set_parent(Some(0));
        node.add_child(child);
        assert_eq!(node.children().len(), 1);
        assert_eq!(node.children()[0].parent(), Some(0));
    }

    #[test]
    fn test_animation_group_duration() {
        let group = AnimationGroup::new(
            0,
            None,
            vec![AnimationChannelData {
                target_node: 0,
                path: TargetPath::Translation,
                interpolation: Interpolation::Linear,
                input: Arc::new(vec![0.0, 0.5, 1.25]),
                output: Arc::new(vec![0.0; 9]),
            }],
        );
        assert_eq!(group.duration(), 1.25);
        assert!(!group.is_playing());
        group.start();
        assert!(group.is_playing());
    }

    #[test]
    fn test_wrap_mode_constants() {
        assert_eq!(WrapMode::from_gltf(10497), Some(WrapMode::Repeat));
        assert_eq!(WrapMode::from_gltf(33071), Some(WrapMode::ClampToEdge));
        assert_eq!(WrapMode::from_gltf(1), None);
    }
}
