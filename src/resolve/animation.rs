//! Animation resolution.
//!
//! Each animation resolves into a group of keyframed channels. Channels
//! targeting no node carry no runtime data and are skipped; sampler
//! keyframes decode through the accessor cache, so animations sharing an
//! input accessor decode it once.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::error::Result;
use crate::index::indexed;
use crate::model::{AnimationChannelData, AnimationGroup};
use std::sync::Arc;

impl ResolveContext {
    /// Resolve one animation into a channel group, at most once.
    pub async fn load_animation(&self, context: &str, index: usize) -> Result<Arc<AnimationGroup>> {
        indexed(context, &self.document.animations, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Animation, index, ArtifactKind::AnimationGroup),
            move || async move {
                let path = format!("/animations/{index}");
                let animation = ctx.document.animations[index].clone();

                for ext in ctx.chain.enabled() {
                    if let Some(resolved) = ext.load_animation(&ctx, &path, &animation).await? {
                        ctx.assign_animation_group(&resolved);
                        return Ok(resolved);
                    }
                }

                let mut channels = Vec::with_capacity(animation.channels.len());
                for (k, channel) in animation.channels.iter().enumerate() {
                    let target_node = match channel.target.node {
                        Some(node) => node,
                        None => continue,
                    };
                    indexed(
                        &format!("{path}/channels/{k}/target/node"),
                        &ctx.document.nodes,
                        target_node,
                    )?;
                    let sampler = indexed(
                        &format!("{path}/channels/{k}/sampler"),
                        &animation.samplers,
                        channel.sampler,
                    )?;

                    let sampler_path = format!("{path}/samplers/{}", channel.sampler);
                    let input = ctx
                        .load_accessor_data(&format!("{sampler_path}/input"), sampler.input)
                        .await?;
                    let output = ctx
                        .load_accessor_data(&format!("{sampler_path}/output"), sampler.output)
                        .await?;

                    channels.push(AnimationChannelData {
                        target_node,
                        path: channel.target.path,
                        interpolation: sampler.interpolation,
                        input: Arc::new(input.values.clone()),
                        output: Arc::new(output.values.clone()),
                    });
                }

                let group = Arc::new(AnimationGroup::new(
                    index,
                    animation.name.clone(),
                    channels,
                ));
                ctx.assign_animation_group(&group);
                log::debug!("resolved {path} ({} channels)", group.channels.len());
                Ok(group)
            },
        )
        .await
    }
}
