//! Entity resolvers: the logic turning index-based cross-references into
//! constructed renderer-facing objects.
//!
//! One resolver per entity kind, each following the same discipline:
//! look the entity up through the indexer, consult the extension chain's
//! resolution hook, and otherwise run default logic: resolving
//! dependencies recursively through the memoizing cache, invoking the
//! caller's synchronous assign callback immediately after construction,
//! then populating remaining properties asynchronously.

mod animation;
mod buffer;
mod camera;
mod material;
mod mesh;
mod node;
mod scene;
mod skin;
mod texture;

pub use buffer::AccessorData;
pub use texture::DecodedImage;

use crate::cache::{CacheKey, ResolveCache};
use crate::document::Document;
use crate::error::Result;
use crate::extensions::ExtensionChain;
use crate::fetch::{Progress, ProgressCallback, UriFetcher};
use crate::gpu::GpuDevice;
use crate::lifecycle::Lifecycle;
use crate::model::{
    AnimationGroup, PrimitiveType, RenderMaterial, RenderMesh, RenderNode, RenderTexture,
};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Synchronous assign callbacks, invoked immediately after an object is
/// constructed and before its asynchronous property population begins, so
/// callers can wire up relationships early. Never invoked after disposal.
#[derive(Default, Clone)]
pub struct LoadCallbacks {
    pub on_node: Option<Arc<dyn Fn(&Arc<RenderNode>) + Send + Sync>>,
    pub on_mesh: Option<Arc<dyn Fn(&Arc<RenderMesh>) + Send + Sync>>,
    pub on_material: Option<Arc<dyn Fn(&Arc<RenderMaterial>) + Send + Sync>>,
    pub on_texture: Option<Arc<dyn Fn(&Arc<RenderTexture>) + Send + Sync>>,
    pub on_animation_group: Option<Arc<dyn Fn(&Arc<AnimationGroup>) + Send + Sync>>,
}

pub(crate) struct ProgressState {
    pub(crate) loaded: AtomicU64,
    pub(crate) total: Option<u64>,
    pub(crate) callback: Option<ProgressCallback>,
}

/// Shared state of one load: the document, the memoizing cache, the
/// extension chain, the boundary collaborators and the lifecycle. Owned
/// exclusively by one loader instance; cheap to clone into spawned
/// resolution futures.
#[derive(Clone)]
pub struct ResolveContext {
    pub(crate) document: Arc<Document>,
    pub(crate) bin: Option<Arc<Vec<u8>>>,
    pub(crate) cache: Arc<ResolveCache>,
    pub(crate) chain: Arc<ExtensionChain>,
    pub(crate) gpu: Arc<dyn GpuDevice>,
    pub(crate) fetcher: Arc<dyn UriFetcher>,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) callbacks: Arc<LoadCallbacks>,
    pub(crate) progress: Arc<ProgressState>,
    pub(crate) default_materials: Arc<Mutex<HashMap<PrimitiveType, Arc<RenderMaterial>>>>,
}

impl ResolveContext {
    /// The parsed document being resolved.
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// The extension chain of this loader.
    pub fn chain(&self) -> &ExtensionChain {
        &self.chain
    }

    /// The renderer-resource boundary.
    pub fn gpu(&self) -> &Arc<dyn GpuDevice> {
        &self.gpu
    }

    /// Current loader state.
    pub fn state(&self) -> crate::lifecycle::LoaderState {
        self.lifecycle.state()
    }

    /// Register a completion future that must settle before the loader
    /// reaches COMPLETE. Valid at any point before COMPLETE, including
    /// from extension hooks running after READY.
    pub fn register_completion<F>(&self, future: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.lifecycle.register_completion(future);
    }

    /// Memoize `compute` under `key`, guarded against disposal: the
    /// computation settles with a cancellation error instead of hanging
    /// when the loader is torn down mid-flight.
    pub(crate) async fn memoized<T, F, Fut>(&self, key: CacheKey, compute: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Arc<T>>> + Send + 'static,
    {
        let lifecycle = self.lifecycle.clone();
        self.cache
            .resolve_as(key, move || async move {
                lifecycle.run_guarded(compute()).await
            })
            .await
    }

    pub(crate) fn assign_node(&self, node: &Arc<RenderNode>) {
        if self.lifecycle.is_disposed() {
            return;
        }
        if let Some(callback) = &self.callbacks.on_node {
            callback(node);
        }
    }

    pub(crate) fn assign_mesh(&self, mesh: &Arc<RenderMesh>) {
        if self.lifecycle.is_disposed() {
            return;
        }
        if let Some(callback) = &self.callbacks.on_mesh {
            callback(mesh);
        }
    }

    pub(crate) fn assign_material(&self, material: &Arc<RenderMaterial>) {
        if self.lifecycle.is_disposed() {
            return;
        }
        if let Some(callback) = &self.callbacks.on_material {
            callback(material);
        }
    }

    pub(crate) fn assign_texture(&self, texture: &Arc<RenderTexture>) {
        if self.lifecycle.is_disposed() {
            return;
        }
        if let Some(callback) = &self.callbacks.on_texture {
            callback(texture);
        }
    }

    pub(crate) fn assign_animation_group(&self, group: &Arc<AnimationGroup>) {
        if self.lifecycle.is_disposed() {
            return;
        }
        if let Some(callback) = &self.callbacks.on_animation_group {
            callback(group);
        }
    }

    /// Record fetched bytes and deliver a progress notification.
    pub(crate) fn report_fetched(&self, bytes: u64) {
        let loaded = self.progress.loaded.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if let Some(callback) = &self.progress.callback {
            callback(Progress {
                loaded,
                total: self.progress.total,
            });
        }
    }
}
