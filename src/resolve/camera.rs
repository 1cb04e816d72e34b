//! Camera resolution.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::document::CameraType;
use crate::error::{AssetError, Result};
use crate::index::indexed;
use crate::model::{CameraProjection, RenderCamera};
use std::sync::Arc;

impl ResolveContext {
    pub async fn load_camera(&self, context: &str, index: usize) -> Result<Arc<RenderCamera>> {
        indexed(context, &self.document.cameras, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Camera, index, ArtifactKind::Camera),
            move || async move {
                let path = format!("/cameras/{index}");
                let camera = ctx.document.cameras[index].clone();

                for ext in ctx.chain.enabled() {
                    if let Some(resolved) = ext.load_camera(&ctx, &path, &camera).await? {
                        return Ok(resolved);
                    }
                }

                let projection = match camera.camera_type {
                    CameraType::Perspective => {
                        let perspective = camera
                            .perspective
                            .ok_or_else(|| AssetError::missing(path.as_str(), "perspective"))?;
                        CameraProjection::Perspective {
                            aspect_ratio: perspective.aspect_ratio,
                            yfov: perspective.yfov,
                            znear: perspective.znear,
                            zfar: perspective.zfar,
                        }
                    }
                    CameraType::Orthographic => {
                        let orthographic = camera
                            .orthographic
                            .ok_or_else(|| AssetError::missing(path.as_str(), "orthographic"))?;
                        CameraProjection::Orthographic {
                            xmag: orthographic.xmag,
                            ymag: orthographic.ymag,
                            znear: orthographic.znear,
                            zfar: orthographic.zfar,
                        }
                    }
                };

                Ok(Arc::new(RenderCamera {
                    index,
                    name: camera.name.clone(),
                    projection,
                }))
            },
        )
        .await
    }
}
