//! The resolve cache: per-entity memoization of asynchronous computations.
//!
//! This is the primary concurrency-correctness mechanism of the engine.
//! Multiple independent graph paths reaching the same glTF buffer, accessor,
//! image or material must not re-fetch or re-decode it: the first caller's
//! computation is the only one that ever executes, and every concurrent or
//! later caller awaits the same shared future. A failed computation poisons
//! its entry, so a permanently broken resource is a terminal error for every
//! consumer rather than a transient one.

use crate::error::{AssetError, Result};
use crate::model::PrimitiveType;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which document array the cached entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Accessor,
    Animation,
    Buffer,
    BufferView,
    Camera,
    Image,
    Material,
    Mesh,
    Node,
    Sampler,
    Scene,
    Skin,
    Texture,
}

/// Which artifact of an entity is being resolved. One entity may produce
/// several distinct artifacts (an accessor yields both decoded data and a
/// renderer-side vertex buffer); each gets its own cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Raw bytes of a buffer or buffer view.
    Bytes,
    /// Decoded float data of an accessor.
    Data,
    /// Decoded index data of an accessor.
    Indices,
    /// Renderer-side vertex buffer built from an accessor.
    VertexBuffer,
    /// Renderer-side index buffer built from an accessor.
    IndexBuffer,
    /// Decoded pixels of an image.
    Pixels,
    /// Resolved sampler state.
    Sampler,
    /// Combined sampler + image renderer texture.
    Texture,
    /// Renderer material, specialized per draw mode: the same glTF
    /// material instantiates differently for points vs. triangles.
    Material(PrimitiveType),
    /// Resolved renderer node.
    Node,
    /// Resolved renderer mesh.
    Mesh,
    /// Resolved skeleton of a skin.
    Skeleton,
    /// Resolved camera description.
    Camera,
    /// Animation group aggregating one glTF animation's channels.
    AnimationGroup,
    /// Root nodes of a resolved scene.
    Scene,
}

/// Cache key: entity identity plus artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity: EntityKind,
    pub index: usize,
    pub artifact: ArtifactKind,
}

impl CacheKey {
    pub fn new(entity: EntityKind, index: usize, artifact: ArtifactKind) -> Self {
        Self {
            entity,
            index,
            artifact,
        }
    }
}

type Artifact = Arc<dyn Any + Send + Sync>;
type SharedEntry = Shared<BoxFuture<'static, std::result::Result<Artifact, AssetError>>>;

/// Memoized async computations keyed by `(entity, artifact kind)`.
///
/// Entries live until disposal; there is no partial eviction.
#[derive(Default)]
pub struct ResolveCache {
    entries: Mutex<HashMap<CacheKey, SharedEntry>>,
    disposed: AtomicBool,
}

impl ResolveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the artifact for `key`, running `compute` only if this is
    /// the first request for that key. Concurrent and later callers receive
    /// the identical in-flight-or-settled result.
    pub async fn resolve_as<T, F, Fut>(&self, key: CacheKey, compute: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>>> + Send + 'static,
    {
        if self.disposed.load(Ordering::Acquire) {
            return Err(AssetError::Cancelled);
        }

        let entry = {
            let mut entries = self.entries.lock();
            entries
                .entry(key)
                .or_insert_with(|| {
                    log::trace!("cache miss: {key:?}");
                    let future = compute();
                    async move { future.await.map(|artifact| artifact as Artifact) }
                        .boxed()
                        .shared()
                })
                .clone()
        };

        let artifact = entry.await?;
        artifact
            .downcast::<T>()
            .map_err(|_| AssetError::Internal(format!("artifact type mismatch for {key:?}")))
    }

    /// Number of populated (pending or settled) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop all entries and refuse further resolution. In-flight
    /// computations settle through the loader's cancellation guard rather
    /// than hanging on a dropped entry.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn key(index: usize) -> CacheKey {
        CacheKey::new(EntityKind::Buffer, index, ArtifactKind::Bytes)
    }

    #[tokio::test]
    async fn test_compute_runs_once_for_repeated_calls() {
        let cache = ResolveCache::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let runs = runs.clone();
            let value: Arc<u32> = cache
                .resolve_as(key(0), move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(7u32))
                })
                .await
                .unwrap();
            assert_eq!(*value, 7);
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = Arc::new(ResolveCache::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let runs = runs.clone();
                tokio::spawn(async move {
                    cache
                        .resolve_as(key(1), move || async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                            Ok(Arc::new(11u32))
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        // All callers observe the identical object.
        for result in &results {
            assert!(Arc::ptr_eq(result, &results[0]));
        }
    }

    #[tokio::test]
    async fn test_failure_is_cached_not_retried() {
        let cache = ResolveCache::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let runs = runs.clone();
            let result: Result<Arc<u32>> = cache
                .resolve_as(key(2), move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Err(AssetError::decode("/buffers/2", "broken"))
                })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_artifact_kinds_are_distinct_entries() {
        let cache = ResolveCache::new();

        let a: Arc<u32> = cache
            .resolve_as(
                CacheKey::new(EntityKind::Material, 0, ArtifactKind::Material(PrimitiveType::Triangles)),
                || async { Ok(Arc::new(1u32)) },
            )
            .await
            .unwrap();
        let b: Arc<u32> = cache
            .resolve_as(
                CacheKey::new(EntityKind::Material, 0, ArtifactKind::Material(PrimitiveType::Points)),
                || async { Ok(Arc::new(2u32)) },
            )
            .await
            .unwrap();

        assert_ne!(*a, *b);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_disposed_cache_rejects_resolution() {
        let cache = ResolveCache::new();
        cache.dispose();
        let result: Result<Arc<u32>> = cache
            .resolve_as(key(3), || async { Ok(Arc::new(0u32)) })
            .await;
        assert_eq!(result.unwrap_err(), AssetError::Cancelled);
    }
}
