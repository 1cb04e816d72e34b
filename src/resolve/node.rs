//! Node resolution.
//!
//! Nodes resolve recursively: a node loads its mesh, camera and skin,
//! then its children, wiring parent and child references both ways. A
//! node referenced from several parents (or from a skin joint list and a
//! scene) still resolves once through the cache.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::document::Node;
use crate::error::{AssetError, Result};
use crate::index::indexed;
use crate::model::RenderNode;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use glam::Mat4;
use std::sync::Arc;

/// Local transform of a document node. A full matrix takes precedence
/// over the TRS fields.
pub(crate) fn node_local_transform(node: &Node) -> Mat4 {
    match node.matrix {
        Some(columns) => Mat4::from_cols_array(&columns),
        None => RenderNode::compose_trs(node.translation, node.rotation, node.scale),
    }
}

impl ResolveContext {
    /// Resolve one node and its subtree, at most once per node.
    ///
    /// Boxed because node resolution recurses through children.
    pub fn load_node(
        &self,
        context: String,
        index: usize,
        parent: Option<usize>,
    ) -> BoxFuture<'static, Result<Arc<RenderNode>>> {
        self.load_node_guarded(context, index, parent, Vec::new())
    }

    /// Recursion step carrying the ancestor path. A node whose children
    /// reach back into their own ancestry would await its own shared
    /// future through the cache, so the cycle is rejected before the
    /// cache is entered. Diamond sharing stays legal: the check is
    /// against this path only, not all visited nodes.
    fn load_node_guarded(
        &self,
        context: String,
        index: usize,
        parent: Option<usize>,
        ancestors: Vec<usize>,
    ) -> BoxFuture<'static, Result<Arc<RenderNode>>> {
        let ctx = self.clone();
        async move {
            indexed(&context, &ctx.document.nodes, index)?;
            if ancestors.contains(&index) {
                return Err(AssetError::decode(
                    context.as_str(),
                    format!("node {index} is its own ancestor"),
                ));
            }
            let inner = ctx.clone();
            ctx.memoized(
                CacheKey::new(EntityKind::Node, index, ArtifactKind::Node),
                move || async move {
                    let ctx = inner;
                    let path = format!("/nodes/{index}");
                    let node = ctx.document.nodes[index].clone();

                    for ext in ctx.chain.enabled() {
                        if let Some(resolved) = ext.load_node(&ctx, &path, &node).await? {
                            resolved.set_parent(parent);
                            ctx.assign_node(&resolved);
                            return Ok(resolved);
                        }
                    }

                    let resolved = Arc::new(RenderNode::new(
                        index,
                        node.name.clone(),
                        node_local_transform(&node),
                    ));
                    resolved.set_parent(parent);
                    ctx.assign_node(&resolved);

                    if let Some(mesh_index) = node.mesh {
                        let mesh = ctx.load_mesh(&format!("{path}/mesh"), mesh_index).await?;
                        let weights = node
                            .weights
                            .clone()
                            .unwrap_or_else(|| mesh.weights.clone());
                        resolved.set_morph_weights(weights);
                        resolved.set_mesh(mesh);
                    }
                    if let Some(camera_index) = node.camera {
                        let camera = ctx
                            .load_camera(&format!("{path}/camera"), camera_index)
                            .await?;
                        resolved.set_camera(camera);
                    }
                    if let Some(skin_index) = node.skin {
                        let skeleton = ctx.load_skin(&format!("{path}/skin"), skin_index).await?;
                        resolved.set_skeleton(skeleton);
                    }

                    let mut ancestors = ancestors;
                    ancestors.push(index);
                    let children =
                        try_join_all(node.children.iter().enumerate().map(|(k, &child)| {
                            ctx.load_node_guarded(
                                format!("{path}/children/{k}"),
                                child,
                                Some(index),
                                ancestors.clone(),
                            )
                        }))
                        .await?;
                    for child in children {
                        resolved.add_child(child);
                    }

                    Ok(resolved)
                },
            )
            .await
        }
        .boxed()
    }
}
