//! Mesh and primitive resolution.
//!
//! A primitive loads its vertex attributes by semantic name, its index
//! and vertex buffers from accessors, and per-target delta attribute
//! buffers when morph targets are present. Sibling attributes resolve
//! concurrently; shared accessors still decode once through the cache.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::document::Primitive;
use crate::error::{AssetError, Result};
use crate::index::indexed;
use crate::model::{MorphTarget, PrimitiveGeometry, PrimitiveType, RenderMesh, RenderPrimitive};
use futures::future::try_join_all;
use std::sync::Arc;

impl ResolveContext {
    /// Resolve one mesh, at most once.
    pub async fn load_mesh(&self, context: &str, index: usize) -> Result<Arc<RenderMesh>> {
        indexed(context, &self.document.meshes, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Mesh, index, ArtifactKind::Mesh),
            move || async move {
                let path = format!("/meshes/{index}");
                let mesh = &ctx.document.meshes[index];

                let primitives = try_join_all(mesh.primitives.iter().map(|primitive| {
                    let primitive_path = format!("{path}/primitives/{}", primitive.index);
                    let ctx = ctx.clone();
                    async move { ctx.load_primitive(&primitive_path, primitive).await }
                }))
                .await?;

                let resolved = Arc::new(RenderMesh {
                    index,
                    name: mesh.name.clone(),
                    primitives,
                    weights: mesh.weights.clone().unwrap_or_default(),
                });
                ctx.assign_mesh(&resolved);
                log::debug!("resolved {path} ({} primitives)", resolved.primitives.len());
                Ok(resolved)
            },
        )
        .await
    }

    async fn load_primitive(
        &self,
        path: &str,
        primitive: &Primitive,
    ) -> Result<Arc<RenderPrimitive>> {
        let mode = primitive.mode.unwrap_or(4);
        let primitive_type = PrimitiveType::from_gltf_mode(mode).ok_or_else(|| {
            AssetError::decode(format!("{path}/mode"), format!("invalid draw mode {mode}"))
        })?;

        let mut geometry = None;
        for ext in self.chain.enabled() {
            if let Some(overridden) = ext.load_vertex_data(self, path, primitive).await? {
                geometry = Some(overridden);
                break;
            }
        }
        let geometry = match geometry {
            Some(geometry) => geometry,
            None => self.default_load_vertex_data(path, primitive).await?,
        };

        let resolved = Arc::new(RenderPrimitive::new(primitive_type, geometry));

        let material = match primitive.material {
            Some(material_index) => {
                self.load_material(&format!("{path}/material"), material_index, primitive_type)
                    .await?
            }
            None => self.default_material(primitive_type),
        };
        resolved.set_material(material);

        Ok(resolved)
    }

    /// Default vertex-data resolution, available to extensions.
    pub async fn default_load_vertex_data(
        &self,
        path: &str,
        primitive: &Primitive,
    ) -> Result<Arc<PrimitiveGeometry>> {
        if primitive.attributes.is_empty() {
            return Err(AssetError::missing(path, "attributes"));
        }

        let attributes = try_join_all(primitive.attributes.iter().map(|(semantic, &accessor)| {
            let ctx = self.clone();
            let context = format!("{path}/attributes/{semantic}");
            let semantic = semantic.clone();
            async move { ctx.load_vertex_buffer(&context, accessor, &semantic).await }
        }))
        .await?;

        let vertex_count = attributes
            .iter()
            .find(|binding| binding.semantic == "POSITION")
            .or_else(|| attributes.first())
            .map(|binding| binding.count)
            .unwrap_or(0);

        let (indices, index_count) = match primitive.indices {
            Some(accessor) => {
                let (buffer, count) = self
                    .load_index_buffer(&format!("{path}/indices"), accessor)
                    .await?;
                (Some(buffer), count)
            }
            None => (None, 0),
        };

        let mut morph_targets = Vec::new();
        if let Some(targets) = &primitive.targets {
            for (target_index, target) in targets.iter().enumerate() {
                let deltas = try_join_all(target.iter().map(|(semantic, &accessor)| {
                    let ctx = self.clone();
                    let context = format!("{path}/targets/{target_index}/{semantic}");
                    let semantic = semantic.clone();
                    async move { ctx.load_vertex_buffer(&context, accessor, &semantic).await }
                }))
                .await?;
                morph_targets.push(MorphTarget { deltas });
            }
        }

        Ok(Arc::new(PrimitiveGeometry {
            attributes,
            indices,
            vertex_count,
            index_count,
            morph_targets,
        }))
    }
}
