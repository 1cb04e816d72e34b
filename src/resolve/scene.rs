//! Scene resolution: the root nodes of one scene, resolved concurrently.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::error::Result;
use crate::index::indexed;
use crate::model::RenderNode;
use futures::future::try_join_all;
use std::sync::Arc;

impl ResolveContext {
    /// Resolve one scene's root nodes, at most once.
    pub async fn load_scene(&self, context: &str, index: usize) -> Result<Arc<Vec<Arc<RenderNode>>>> {
        indexed(context, &self.document.scenes, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Scene, index, ArtifactKind::Scene),
            move || async move {
                let path = format!("/scenes/{index}");
                let scene = ctx.document.scenes[index].clone();

                for ext in ctx.chain.enabled() {
                    if let Some(roots) = ext.load_scene(&ctx, &path, &scene).await? {
                        return Ok(Arc::new(roots));
                    }
                }

                let roots = try_join_all(scene.nodes.iter().enumerate().map(|(k, &node)| {
                    ctx.load_node(format!("{path}/nodes/{k}"), node, None)
                }))
                .await?;
                log::debug!("resolved {path} ({} root nodes)", roots.len());
                Ok(Arc::new(roots))
            },
        )
        .await
    }
}
