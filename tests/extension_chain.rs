//! Extension chain behavior: ordering, toggling, commitment.
//!
//! The factory registry is process-wide, so every test in this binary
//! serializes on one lock and unregisters what it registered.

mod common;

use async_trait::async_trait;
use common::*;
use gltf_resolve::document::Material;
use gltf_resolve::extensions::extension_error;
use gltf_resolve::{
    register_extension, unregister_extension, AssetError, GltfLoader, LoadOptions, LoaderExtension,
    MockGpu, PrimitiveType, RenderMaterial, ResolveContext, Result,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Unregisters on drop so a failing test cannot leak its extension into
/// the next one.
struct Registered(&'static str);

impl Drop for Registered {
    fn drop(&mut self) {
        unregister_extension(self.0);
    }
}

struct MaterialOverride {
    name: &'static str,
    label: &'static str,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LoaderExtension for MaterialOverride {
    fn name(&self) -> &str {
        self.name
    }

    async fn load_material(
        &self,
        _ctx: &ResolveContext,
        _path: &str,
        material: &Material,
        primitive_type: PrimitiveType,
    ) -> Result<Option<Arc<RenderMaterial>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Arc::new(RenderMaterial::new(
            Some(material.index),
            Some(self.label.to_string()),
            primitive_type,
        ))))
    }
}

fn register_material_override(name: &'static str, label: &'static str) -> (Registered, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory_calls = calls.clone();
    register_extension(
        name,
        Arc::new(move || {
            Arc::new(MaterialOverride {
                name,
                label,
                calls: factory_calls.clone(),
            })
        }),
    );
    (Registered(name), calls)
}

fn material_doc() -> serde_json::Value {
    let mut doc = embedded_triangle_json();
    doc["materials"] = json!([{ "name": "from-document" }]);
    doc["meshes"][0]["primitives"][0]["material"] = json!(0);
    doc
}

fn loader(doc: serde_json::Value) -> GltfLoader {
    GltfLoader::new(
        document(doc),
        None,
        Arc::new(MockGpu::new()),
        Arc::new(CountingFetcher::new()),
        LoadOptions::default(),
    )
}

#[tokio::test]
async fn test_first_non_null_result_wins() {
    let _guard = LOCK.lock();
    let (_a, a_calls) = register_material_override("ext-a", "from-a");
    let (_b, b_calls) = register_material_override("ext-b", "from-b");

    let result = loader(material_doc()).load().await.unwrap();
    let material = result.meshes[0].primitives[0].material().unwrap();

    assert_eq!(material.name.as_deref(), Some("from-a"));
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    // The chain stops at the first Some: B is never invoked.
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disabled_extension_is_not_consulted() {
    let _guard = LOCK.lock();
    let (_a, a_calls) = register_material_override("ext-a", "from-a");
    let (_b, _b_calls) = register_material_override("ext-b", "from-b");

    let loader = loader(material_doc());
    assert!(loader.set_extension_enabled("ext-a", false));
    let result = loader.load().await.unwrap();
    let material = result.meshes[0].primitives[0].material().unwrap();

    assert_eq!(material.name.as_deref(), Some("from-b"));
    assert_eq!(a_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_all_declining_falls_through_to_default() {
    let _guard = LOCK.lock();
    struct Declining;

    #[async_trait]
    impl LoaderExtension for Declining {
        fn name(&self) -> &str {
            "ext-declining"
        }
    }

    register_extension("ext-declining", Arc::new(|| Arc::new(Declining)));
    let _guard_ext = Registered("ext-declining");

    let result = loader(material_doc()).load().await.unwrap();
    let material = result.meshes[0].primitives[0].material().unwrap();
    assert_eq!(material.name.as_deref(), Some("from-document"));
}

struct UriOverride {
    served: Arc<AtomicUsize>,
}

#[async_trait]
impl LoaderExtension for UriOverride {
    fn name(&self) -> &str {
        "ext-uri"
    }

    async fn load_uri(
        &self,
        _ctx: &ResolveContext,
        _path: &str,
        uri: &str,
    ) -> Result<Option<Vec<u8>>> {
        match uri.strip_prefix("virtual://") {
            Some("triangle") => {
                self.served.fetch_add(1, Ordering::SeqCst);
                Ok(Some(triangle_bytes()))
            }
            Some(_) => Err(extension_error("ext-uri", format!("unknown uri {uri}"))),
            None => Ok(None),
        }
    }
}

#[tokio::test]
async fn test_uri_override_bypasses_the_fetcher() {
    let _guard = LOCK.lock();
    let served = Arc::new(AtomicUsize::new(0));
    let factory_served = served.clone();
    register_extension(
        "ext-uri",
        Arc::new(move || {
            Arc::new(UriOverride {
                served: factory_served.clone(),
            })
        }),
    );
    let _guard_ext = Registered("ext-uri");

    let fetcher = Arc::new(CountingFetcher::new());
    let loader = GltfLoader::new(
        document(triangle_json("virtual://triangle")),
        None,
        Arc::new(MockGpu::new()),
        fetcher.clone(),
        LoadOptions::default(),
    );
    let result = loader.load().await.unwrap();

    assert_eq!(result.meshes.len(), 1);
    assert_eq!(served.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_committed_hook_failure_propagates() {
    let _guard = LOCK.lock();
    register_extension(
        "ext-uri",
        Arc::new(|| {
            Arc::new(UriOverride {
                served: Arc::new(AtomicUsize::new(0)),
            })
        }),
    );
    let _guard_ext = Registered("ext-uri");

    let err = loader(triangle_json("virtual://nope")).load().await.unwrap_err();
    assert!(matches!(err, AssetError::Extension { ref name, .. } if name == "ext-uri"));
}
