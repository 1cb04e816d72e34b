//! Load orchestration: one [`GltfLoader`] per import.
//!
//! The loader owns the resolution context for one document, drives the
//! lifecycle (LOADING while the primary structure resolves, READY once it
//! exists, COMPLETE after all deferred work settles) and tears everything
//! down unconditionally when the load finishes, succeeds or not.

use crate::document::Document;
use crate::error::Result;
use crate::extensions::ExtensionChain;
use crate::fetch::{ProgressCallback, UriFetcher};
use crate::gpu::GpuDevice;
use crate::index::assign_indices;
use crate::lifecycle::{Lifecycle, LoaderState, StateObserver};
use crate::model::{
    AnimationGroup, AnimationStartPolicy, RenderMaterial, RenderMesh, RenderNode, Skeleton,
};
use crate::resolve::{LoadCallbacks, ResolveContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use uuid::Uuid;

/// Which part of the document an import places.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SceneSelection {
    /// The document's default scene, or scene 0 when none is declared.
    #[default]
    Default,
    /// An explicit scene index.
    Scene(usize),
    /// Explicit mesh indices with no scene structure. Animations are not
    /// loaded for mesh-only imports.
    Meshes(Vec<usize>),
}

/// Per-import options.
#[derive(Default, Clone)]
pub struct LoadOptions {
    pub selection: SceneSelection,
    pub animation_start: AnimationStartPolicy,
    /// Display name used in log milestones.
    pub source_name: Option<String>,
    pub on_progress: Option<ProgressCallback>,
    pub on_state: Option<StateObserver>,
    pub callbacks: LoadCallbacks,
}

/// Everything one import produced.
#[derive(Debug, Default, Clone)]
pub struct LoadResult {
    pub root_nodes: Vec<Arc<RenderNode>>,
    pub meshes: Vec<Arc<RenderMesh>>,
    pub skeletons: Vec<Arc<Skeleton>>,
    pub animation_groups: Vec<Arc<AnimationGroup>>,
}

impl LoadResult {
    pub fn node_named(&self, name: &str) -> Option<Arc<RenderNode>> {
        let mut found = None;
        for root in &self.root_nodes {
            root.visit(&mut |node| {
                if found.is_none() && node.name.as_deref() == Some(name) {
                    found = Some(node.clone());
                }
            });
        }
        found
    }

    pub fn mesh_named(&self, name: &str) -> Option<Arc<RenderMesh>> {
        self.meshes
            .iter()
            .find(|mesh| mesh.name.as_deref() == Some(name))
            .cloned()
    }

    pub fn material_named(&self, name: &str) -> Option<Arc<RenderMaterial>> {
        self.meshes
            .iter()
            .flat_map(|mesh| mesh.primitives.iter())
            .filter_map(|primitive| primitive.material())
            .find(|material| material.name.as_deref() == Some(name))
    }

    pub fn animation_named(&self, name: &str) -> Option<Arc<AnimationGroup>> {
        self.animation_groups
            .iter()
            .find(|group| group.name.as_deref() == Some(name))
            .cloned()
    }
}

/// Caller-owned container that successive imports append into.
#[derive(Default)]
pub struct AssetContainer {
    pub root_nodes: Vec<Arc<RenderNode>>,
    pub meshes: Vec<Arc<RenderMesh>>,
    pub skeletons: Vec<Arc<Skeleton>>,
    pub animation_groups: Vec<Arc<AnimationGroup>>,
}

impl AssetContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&mut self, result: &LoadResult) {
        self.root_nodes.extend(result.root_nodes.iter().cloned());
        self.meshes.extend(result.meshes.iter().cloned());
        self.skeletons.extend(result.skeletons.iter().cloned());
        self.animation_groups
            .extend(result.animation_groups.iter().cloned());
    }
}

/// Orchestrator for one import of one document.
pub struct GltfLoader {
    id: Uuid,
    ctx: ResolveContext,
    options: LoadOptions,
}

impl GltfLoader {
    /// Build a loader for a parsed document and an optional binary chunk.
    /// Indices are assigned here, before any resolution starts.
    pub fn new(
        mut document: Document,
        bin: Option<Vec<u8>>,
        gpu: Arc<dyn GpuDevice>,
        fetcher: Arc<dyn UriFetcher>,
        options: LoadOptions,
    ) -> Self {
        assign_indices(&mut document);

        let lifecycle = Arc::new(Lifecycle::new());
        if let Some(observer) = options.on_state.clone() {
            lifecycle.set_observer(observer);
        }

        // Expected fetch total: declared lengths of every buffer that will
        // actually go through the fetcher.
        let total: u64 = document
            .buffers
            .iter()
            .filter(|b| {
                b.uri
                    .as_deref()
                    .is_some_and(|uri| !uri.starts_with("data:"))
            })
            .map(|b| b.byte_length as u64)
            .sum();

        let ctx = ResolveContext {
            document: Arc::new(document),
            bin: bin.map(Arc::new),
            cache: Arc::new(crate::cache::ResolveCache::new()),
            chain: Arc::new(ExtensionChain::from_registry()),
            gpu,
            fetcher,
            lifecycle,
            callbacks: Arc::new(options.callbacks.clone()),
            progress: Arc::new(crate::resolve::ProgressState {
                loaded: AtomicU64::new(0),
                total: (total > 0).then_some(total),
                callback: options.on_progress.clone(),
            }),
            default_materials: Arc::new(Mutex::new(HashMap::new())),
        };

        Self {
            id: Uuid::new_v4(),
            ctx,
            options,
        }
    }

    /// Run the import to its terminal outcome. The loader is disposed on
    /// return regardless of outcome, so each loader runs exactly one load.
    pub async fn load(&self) -> Result<LoadResult> {
        let source = self
            .options
            .source_name
            .clone()
            .unwrap_or_else(|| "<unnamed>".to_string());
        log::info!("loader {}: loading {source}", self.id);

        let result = self.run().await;
        match &result {
            Ok(loaded) => log::info!(
                "loader {}: {source} complete ({} roots, {} meshes, {} animations)",
                self.id,
                loaded.root_nodes.len(),
                loaded.meshes.len(),
                loaded.animation_groups.len()
            ),
            Err(error) => log::warn!("loader {}: {source} failed: {error}", self.id),
        }
        self.dispose();
        result
    }

    /// Like [`load`](Self::load), appending results into a caller-owned
    /// container.
    pub async fn load_into(&self, container: &mut AssetContainer) -> Result<LoadResult> {
        let result = self.load().await?;
        container.append(&result);
        Ok(result)
    }

    async fn run(&self) -> Result<LoadResult> {
        let ctx = &self.ctx;
        ctx.chain().on_loading(ctx);

        let mut result = LoadResult::default();
        match &self.options.selection {
            SceneSelection::Default => {
                let document = ctx.document();
                if !document.scenes.is_empty() {
                    let scene = document.scene.unwrap_or(0);
                    result.root_nodes = ctx.load_scene("/scene", scene).await?.as_ref().clone();
                }
                self.load_animations(&mut result).await?;
            }
            SceneSelection::Scene(scene) => {
                result.root_nodes = ctx.load_scene("/scene", *scene).await?.as_ref().clone();
                self.load_animations(&mut result).await?;
            }
            SceneSelection::Meshes(indices) => {
                for &index in indices {
                    let mesh = ctx.load_mesh(&format!("/meshes/{index}"), index).await?;
                    result.meshes.push(mesh);
                }
            }
        }
        collect_from_roots(&mut result);

        self.ctx.lifecycle.advance(LoaderState::Ready);
        ctx.chain().on_ready(ctx);

        match self.options.animation_start {
            AnimationStartPolicy::None => {}
            AnimationStartPolicy::First => {
                if let Some(group) = result.animation_groups.first() {
                    group.start();
                }
            }
            AnimationStartPolicy::All => {
                for group in &result.animation_groups {
                    group.start();
                }
            }
        }

        // Settling a completion may register further completions, so drain
        // until the set is empty.
        loop {
            let pending = self.ctx.lifecycle.take_completions();
            if pending.is_empty() {
                break;
            }
            futures::future::try_join_all(pending).await?;
        }

        self.ctx.lifecycle.advance(LoaderState::Complete);
        Ok(result)
    }

    async fn load_animations(&self, result: &mut LoadResult) -> Result<()> {
        let count = self.ctx.document().animations.len();
        for index in 0..count {
            let group = self
                .ctx
                .load_animation(&format!("/animations/{index}"), index)
                .await?;
            result.animation_groups.push(group);
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> LoaderState {
        self.ctx.state()
    }

    /// The resolution context, for extension hooks and advanced callers.
    pub fn context(&self) -> &ResolveContext {
        &self.ctx
    }

    /// Toggle one named extension for this loader only.
    pub fn set_extension_enabled(&self, name: &str, enabled: bool) -> bool {
        self.ctx.chain().set_enabled(name, enabled)
    }

    /// Tear down: cancel outstanding work, settle pending cache entries
    /// with a cancellation error, suppress further assign callbacks.
    pub fn dispose(&self) {
        self.ctx.lifecycle.dispose();
        self.ctx.cache.dispose();
    }
}

/// Meshes and skeletons reachable from the root nodes, deduplicated in
/// first-visit order.
fn collect_from_roots(result: &mut LoadResult) {
    let mut seen_meshes: Vec<usize> = result.meshes.iter().map(|m| m.index).collect();
    let mut seen_skeletons: Vec<usize> = Vec::new();
    let mut meshes = Vec::new();
    let mut skeletons = Vec::new();

    for root in &result.root_nodes {
        root.visit(&mut |node| {
            if let Some(mesh) = node.mesh() {
                if !seen_meshes.contains(&mesh.index) {
                    seen_meshes.push(mesh.index);
                    meshes.push(mesh);
                }
            }
            if let Some(skeleton) = node.skeleton() {
                if !seen_skeletons.contains(&skeleton.index) {
                    seen_skeletons.push(skeleton.index);
                    skeletons.push(skeleton);
                }
            }
        });
    }

    result.meshes.extend(meshes);
    result.skeletons.extend(skeletons);
}
