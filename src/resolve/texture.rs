//! Texture resolution: sampler state and image pixels resolved
//! independently through the cache and combined.
//!
//! Image bytes follow the same dependency-cache discipline as buffers, so
//! an image shared by several textures is fetched and decoded once, and
//! exactly one renderer texture is created for it.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::document::TextureInfo;
use crate::error::{AssetError, Result};
use crate::gpu::{GpuTexture, GpuTextureFormat, TextureDescriptor};
use crate::index::indexed;
use crate::model::{RenderTexture, SamplerState, WrapMode};
use std::sync::Arc;

/// Decoded image pixels, RGBA8.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Minification filter constants that request mipmaps.
fn wants_mipmaps(min_filter: Option<u32>) -> bool {
    match min_filter {
        None => true,
        Some(filter) => matches!(filter, 9984..=9987),
    }
}

impl ResolveContext {
    /// Resolved sampler state for one glTF sampler.
    pub async fn load_sampler(&self, context: &str, index: usize) -> Result<Arc<SamplerState>> {
        indexed(context, &self.document.samplers, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Sampler, index, ArtifactKind::Sampler),
            move || async move {
                let path = format!("/samplers/{index}");
                let sampler = &ctx.document.samplers[index];
                let wrap_s = WrapMode::from_gltf(sampler.wrap_s.unwrap_or(10497))
                    .ok_or_else(|| AssetError::decode(format!("{path}/wrapS"), "invalid wrap mode"))?;
                let wrap_t = WrapMode::from_gltf(sampler.wrap_t.unwrap_or(10497))
                    .ok_or_else(|| AssetError::decode(format!("{path}/wrapT"), "invalid wrap mode"))?;
                Ok(Arc::new(SamplerState {
                    wrap_s,
                    wrap_t,
                    mag_filter: sampler.mag_filter,
                    min_filter: sampler.min_filter,
                    generate_mipmaps: wants_mipmaps(sampler.min_filter),
                }))
            },
        )
        .await
    }

    /// Decoded pixels of one image, fetched and decoded at most once.
    pub async fn load_image_pixels(&self, context: &str, index: usize) -> Result<Arc<DecodedImage>> {
        indexed(context, &self.document.images, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Image, index, ArtifactKind::Pixels),
            move || async move {
                let path = format!("/images/{index}");
                let image = &ctx.document.images[index];
                let bytes = match (&image.uri, image.buffer_view) {
                    (Some(uri), _) => ctx.load_uri(&path, uri).await?,
                    (None, Some(view)) => ctx
                        .load_buffer_view_bytes(&format!("{path}/bufferView"), view)
                        .await?
                        .as_ref()
                        .clone(),
                    (None, None) => return Err(AssetError::missing(path.as_str(), "uri")),
                };
                let decoded = image::load_from_memory(&bytes)
                    .map_err(|e| AssetError::decode(path.as_str(), e.to_string()))?
                    .to_rgba8();
                Ok(Arc::new(DecodedImage {
                    width: decoded.width(),
                    height: decoded.height(),
                    rgba: decoded.into_raw(),
                }))
            },
        )
        .await
    }

    /// Renderer texture for one image, created at most once. The mip flag
    /// comes from the first referencing sampler.
    async fn load_gpu_texture(
        &self,
        context: &str,
        image_index: usize,
        generate_mipmaps: bool,
    ) -> Result<Arc<GpuTexture>> {
        let ctx = self.clone();
        let context = context.to_string();
        self.memoized(
            CacheKey::new(EntityKind::Image, image_index, ArtifactKind::Texture),
            move || async move {
                let pixels = ctx.load_image_pixels(&context, image_index).await?;
                let desc = TextureDescriptor {
                    width: pixels.width,
                    height: pixels.height,
                    format: GpuTextureFormat::Rgba8Srgb,
                    generate_mipmaps,
                };
                let texture = ctx.gpu.create_texture(&desc, &pixels.rgba)?;
                Ok(Arc::new(texture))
            },
        )
        .await
    }

    /// Resolve one texture-info reference: consult the chain, then combine
    /// the texture's sampler and image.
    pub async fn load_texture_info(
        &self,
        path: &str,
        info: &TextureInfo,
    ) -> Result<Arc<RenderTexture>> {
        for ext in self.chain.enabled() {
            if let Some(texture) = ext.load_texture_info(self, path, info).await? {
                return Ok(texture);
            }
        }
        self.default_load_texture_info(path, info).await
    }

    /// Default texture-info resolution, available to extensions.
    pub async fn default_load_texture_info(
        &self,
        path: &str,
        info: &TextureInfo,
    ) -> Result<Arc<RenderTexture>> {
        let texture = indexed(&format!("{path}/index"), &self.document.textures, info.texture)?;
        let texture_path = format!("/textures/{}", info.texture);

        let sampler = match texture.sampler {
            Some(sampler_index) => {
                self.load_sampler(&format!("{texture_path}/sampler"), sampler_index)
                    .await?
                    .as_ref()
                    .clone()
            }
            None => SamplerState::default(),
        };

        let image_index = texture
            .source
            .ok_or_else(|| AssetError::missing(texture_path.as_str(), "source"))?;
        let gpu = self
            .load_gpu_texture(
                &format!("{texture_path}/source"),
                image_index,
                sampler.generate_mipmaps,
            )
            .await?;

        let resolved = Arc::new(RenderTexture {
            index: info.texture,
            name: texture.name.clone(),
            sampler,
            gpu: gpu.as_ref().clone(),
            tex_coord: info.tex_coord,
        });
        self.assign_texture(&resolved);
        Ok(resolved)
    }
}
