//! Material resolution.
//!
//! Creation is split from property loading: `create` synchronously
//! produces the empty renderer material (extension-overridable), the
//! caller's assign callback fires, then properties load asynchronously.
//! Factors are required properties; texture loads are registered as
//! deferred completion work so a scene can render with reasonable defaults
//! while textures stream in. Materials are cached per
//! `(material, draw mode)` pair.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::document::Material;
use crate::error::Result;
use crate::index::indexed;
use crate::model::{PrimitiveType, RenderMaterial};
use std::sync::Arc;

impl ResolveContext {
    /// Resolve one material for one draw mode, at most once per pair.
    pub async fn load_material(
        &self,
        context: &str,
        index: usize,
        primitive_type: PrimitiveType,
    ) -> Result<Arc<RenderMaterial>> {
        indexed(context, &self.document.materials, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(
                EntityKind::Material,
                index,
                ArtifactKind::Material(primitive_type),
            ),
            move || async move {
                let path = format!("/materials/{index}");
                let material = ctx.document.materials[index].clone();

                for ext in ctx.chain.enabled() {
                    if let Some(resolved) =
                        ext.load_material(&ctx, &path, &material, primitive_type).await?
                    {
                        ctx.assign_material(&resolved);
                        return Ok(resolved);
                    }
                }

                let target = ctx.create_material(&path, &material, primitive_type)?;
                ctx.assign_material(&target);
                ctx.load_material_properties(&path, &material, &target).await?;
                Ok(target)
            },
        )
        .await
    }

    /// Synchronously create the empty renderer material, consulting the
    /// chain's create hook first.
    pub fn create_material(
        &self,
        path: &str,
        material: &Material,
        primitive_type: PrimitiveType,
    ) -> Result<Arc<RenderMaterial>> {
        for ext in self.chain.enabled() {
            if let Some(created) = ext.create_material(self, path, material, primitive_type)? {
                return Ok(created);
            }
        }
        Ok(Arc::new(RenderMaterial::new(
            Some(material.index),
            material.name.clone(),
            primitive_type,
        )))
    }

    /// Asynchronously populate a created material, consulting the chain.
    pub async fn load_material_properties(
        &self,
        path: &str,
        material: &Material,
        target: &Arc<RenderMaterial>,
    ) -> Result<()> {
        for ext in self.chain.enabled() {
            if let Some(()) = ext
                .load_material_properties(self, path, material, target)
                .await?
            {
                return Ok(());
            }
        }
        self.default_load_material_properties(path, material, target)
            .await
    }

    /// Default property population: factors immediately, textures as
    /// deferred completion work.
    pub async fn default_load_material_properties(
        &self,
        path: &str,
        material: &Material,
        target: &Arc<RenderMaterial>,
    ) -> Result<()> {
        let pbr = material.pbr_metallic_roughness.clone().unwrap_or_default();
        target.update_properties(|props| {
            props.base_color_factor = pbr.base_color_factor;
            props.metallic_factor = pbr.metallic_factor;
            props.roughness_factor = pbr.roughness_factor;
            props.emissive_factor = material.emissive_factor;
            props.alpha_mode = material.alpha_mode;
            props.alpha_cutoff = material.alpha_cutoff;
            props.double_sided = material.double_sided;
            props.normal_scale = material
                .normal_texture
                .as_ref()
                .and_then(|t| t.scale)
                .unwrap_or(1.0);
            props.occlusion_strength = material
                .occlusion_texture
                .as_ref()
                .and_then(|t| t.strength)
                .unwrap_or(1.0);
        });

        let ctx = self.clone();
        let material = material.clone();
        let target = target.clone();
        let path = path.to_string();
        self.register_completion(async move {
            let pbr = material.pbr_metallic_roughness.clone().unwrap_or_default();

            if let Some(info) = &pbr.base_color_texture {
                let texture = ctx
                    .load_texture_info(
                        &format!("{path}/pbrMetallicRoughness/baseColorTexture"),
                        info,
                    )
                    .await?;
                target.update_properties(|props| props.base_color_texture = Some(texture));
            }
            if let Some(info) = &pbr.metallic_roughness_texture {
                let texture = ctx
                    .load_texture_info(
                        &format!("{path}/pbrMetallicRoughness/metallicRoughnessTexture"),
                        info,
                    )
                    .await?;
                target.update_properties(|props| props.metallic_roughness_texture = Some(texture));
            }
            if let Some(info) = &material.normal_texture {
                let texture = ctx
                    .load_texture_info(&format!("{path}/normalTexture"), info)
                    .await?;
                target.update_properties(|props| props.normal_texture = Some(texture));
            }
            if let Some(info) = &material.occlusion_texture {
                let texture = ctx
                    .load_texture_info(&format!("{path}/occlusionTexture"), info)
                    .await?;
                target.update_properties(|props| props.occlusion_texture = Some(texture));
            }
            if let Some(info) = &material.emissive_texture {
                let texture = ctx
                    .load_texture_info(&format!("{path}/emissiveTexture"), info)
                    .await?;
                target.update_properties(|props| props.emissive_texture = Some(texture));
            }
            Ok(())
        });
        Ok(())
    }

    /// Default material for primitives carrying no material reference,
    /// one per draw mode.
    pub(crate) fn default_material(&self, primitive_type: PrimitiveType) -> Arc<RenderMaterial> {
        let mut materials = self.default_materials.lock();
        materials
            .entry(primitive_type)
            .or_insert_with(|| {
                let material = Arc::new(RenderMaterial::new(None, None, primitive_type));
                self.assign_material(&material);
                material
            })
            .clone()
    }
}
