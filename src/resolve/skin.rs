//! Skin resolution.
//!
//! A skin resolves eagerly into a skeleton with joint indices and
//! inverse bind matrices. Bone linkage needs the full node hierarchy, so
//! it is registered as deferred completion work and runs after every
//! scene node exists.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::error::{AssetError, Result};
use crate::index::indexed;
use crate::model::{Bone, Skeleton};
use crate::resolve::node::node_local_transform;
use glam::Mat4;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

impl ResolveContext {
    /// Resolve one skin into a skeleton, at most once.
    pub async fn load_skin(&self, context: &str, index: usize) -> Result<Arc<Skeleton>> {
        indexed(context, &self.document.skins, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Skin, index, ArtifactKind::Skeleton),
            move || async move {
                let path = format!("/skins/{index}");
                let skin = ctx.document.skins[index].clone();

                for (k, &joint) in skin.joints.iter().enumerate() {
                    indexed(&format!("{path}/joints/{k}"), &ctx.document.nodes, joint)?;
                }

                let inverse_bind_matrices = match skin.inverse_bind_matrices {
                    Some(accessor) => {
                        let ibm_path = format!("{path}/inverseBindMatrices");
                        let data = ctx.load_accessor_data(&ibm_path, accessor).await?;
                        if data.components != 16 {
                            return Err(AssetError::decode(
                                ibm_path.as_str(),
                                format!("expected MAT4 data, got {} components", data.components),
                            ));
                        }
                        if data.count < skin.joints.len() {
                            return Err(AssetError::decode(
                                ibm_path.as_str(),
                                format!(
                                    "{} matrices for {} joints",
                                    data.count,
                                    skin.joints.len()
                                ),
                            ));
                        }
                        data.values
                            .chunks_exact(16)
                            .take(skin.joints.len())
                            .map(|chunk| {
                                let mut columns = [0.0f32; 16];
                                columns.copy_from_slice(chunk);
                                Mat4::from_cols_array(&columns)
                            })
                            .collect()
                    }
                    None => vec![Mat4::IDENTITY; skin.joints.len()],
                };

                let skeleton = Arc::new(Skeleton::new(
                    index,
                    skin.name.clone(),
                    skin.joints.clone(),
                    inverse_bind_matrices,
                ));

                let finalize_ctx = ctx.clone();
                let finalize = skeleton.clone();
                ctx.register_completion(async move {
                    let bones = build_bones(&finalize_ctx, &finalize.joints);
                    finalize.set_bones(bones);
                    Ok(())
                });

                Ok(skeleton)
            },
        )
        .await
    }
}

/// Link joints into bones: each bone's parent is its nearest ancestor
/// node that is itself a joint of the same skin.
fn build_bones(ctx: &ResolveContext, joints: &[usize]) -> Vec<Bone> {
    let joint_set: HashSet<usize> = joints.iter().copied().collect();
    let joint_slot: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(slot, &node)| (node, slot))
        .collect();

    let mut parent_of: HashMap<usize, usize> = HashMap::new();
    for node in &ctx.document.nodes {
        for &child in &node.children {
            parent_of.insert(child, node.index);
        }
    }

    joints
        .iter()
        .map(|&joint| {
            let mut parent_bone = None;
            let mut current = parent_of.get(&joint).copied();
            while let Some(ancestor) = current {
                if joint_set.contains(&ancestor) {
                    parent_bone = joint_slot.get(&ancestor).copied();
                    break;
                }
                current = parent_of.get(&ancestor).copied();
            }
            Bone {
                node_index: joint,
                parent_bone,
                rest_matrix: node_local_transform(&ctx.document.nodes[joint]),
            }
        })
        .collect()
}
