//! gltf-resolve - Asynchronous glTF 2.0 dependency resolution
//!
//! Turns a parsed glTF document into constructed, renderer-facing objects
//! by resolving the document's web of index-based cross-references:
//! scenes to nodes to meshes to materials to textures to images, and
//! everything down to buffers.
//!
//! # Features
//! - Memoized async resolution: one computation per (entity, artifact),
//!   no matter how many references point at it
//! - Ordered, toggleable extension chain overriding any resolution step
//! - LOADING → READY → COMPLETE lifecycle with deferred completion work
//! - Cooperative cancellation through disposal
//! - Renderer resources behind a trait (mock implementation included)
//!
//! # Quick Start
//!
//! ```ignore
//! use gltf_resolve::{Document, GltfLoader, LoadOptions, MockGpu, FileFetcher};
//! use std::sync::Arc;
//!
//! let document = Document::from_json(json)?;
//! let loader = GltfLoader::new(
//!     document,
//!     None,
//!     Arc::new(MockGpu::new()),
//!     Arc::new(FileFetcher::new("assets/")),
//!     LoadOptions::default(),
//! );
//! let result = loader.load().await?;
//! ```

pub mod cache;
pub mod document;
pub mod error;
pub mod extensions;
pub mod fetch;
pub mod gpu;
pub mod index;
pub mod lifecycle;
pub mod loader;
pub mod model;
pub mod resolve;

pub use cache::{ArtifactKind, CacheKey, EntityKind, ResolveCache};
pub use document::Document;
pub use error::{AssetError, Result};
pub use extensions::{
    register_extension, unregister_extension, ExtensionChain, ExtensionFactory, LoaderExtension,
};
pub use fetch::{decode_data_uri, FileFetcher, MemoryFetcher, Progress, UriFetcher};
pub use gpu::{mock::MockGpu, GpuBuffer, GpuDevice, GpuError, GpuTexture};
pub use lifecycle::{Lifecycle, LoaderState};
pub use loader::{AssetContainer, GltfLoader, LoadOptions, LoadResult, SceneSelection};
pub use model::{
    AnimationGroup, AnimationStartPolicy, PrimitiveType, RenderMaterial, RenderMesh, RenderNode,
    RenderTexture, Skeleton,
};
pub use resolve::{LoadCallbacks, ResolveContext};
