//! Lifecycle ordering and disposal semantics observed through a full load.
//!
//! One test registers a process-wide extension, so every test in this
//! binary serializes on one lock.

mod common;

use async_trait::async_trait;
use common::*;
use gltf_resolve::{
    register_extension, unregister_extension, AssetError, GltfLoader, LoadCallbacks, LoadOptions,
    LoaderExtension, LoaderState, MockGpu, ResolveContext,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

static LOCK: Mutex<()> = parking_lot::const_mutex(());

fn textured_doc() -> serde_json::Value {
    let mut doc = embedded_triangle_json();
    doc["images"] = json!([{ "uri": data_uri(&png_bytes(1, 1)) }]);
    doc["textures"] = json!([{ "source": 0 }]);
    doc["materials"] = json!([{
        "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } }
    }]);
    doc["meshes"][0]["primitives"][0]["material"] = json!(0);
    doc
}

#[tokio::test]
async fn test_ready_precedes_deferred_texture_work() {
    let _guard = LOCK.lock();
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let state_events = events.clone();
    let texture_events = events.clone();
    let options = LoadOptions {
        on_state: Some(Arc::new(move |state| {
            state_events.lock().push(format!("{state:?}"))
        })),
        callbacks: LoadCallbacks {
            on_texture: Some(Arc::new(move |_texture| {
                texture_events.lock().push("texture".to_string())
            })),
            ..Default::default()
        },
        ..Default::default()
    };

    let loader = GltfLoader::new(
        document(textured_doc()),
        None,
        Arc::new(MockGpu::new()),
        Arc::new(CountingFetcher::new()),
        options,
    );
    let result = loader.load().await.unwrap();

    // The scene is usable at READY; the texture streams in afterwards and
    // COMPLETE waits for it.
    assert_eq!(
        *events.lock(),
        vec!["Ready".to_string(), "texture".to_string(), "Complete".to_string()]
    );
    let material = result.meshes[0].primitives[0].material().unwrap();
    assert!(material.properties().base_color_texture.is_some());
}

#[tokio::test]
async fn test_dispose_mid_fetch_settles_with_cancellation() {
    let _guard = LOCK.lock();
    let meshes_assigned = Arc::new(AtomicUsize::new(0));

    let counter = meshes_assigned.clone();
    let options = LoadOptions {
        callbacks: LoadCallbacks {
            on_mesh: Some(Arc::new(move |_mesh| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        },
        ..Default::default()
    };
    let loader = Arc::new(GltfLoader::new(
        document(triangle_json("never.bin")),
        None,
        Arc::new(MockGpu::new()),
        Arc::new(StalledFetcher),
        options,
    ));

    let running = loader.clone();
    let task = tokio::spawn(async move { running.load().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(loader.state(), LoaderState::Loading);
    loader.dispose();

    let result = task.await.unwrap();
    assert_eq!(result.unwrap_err(), AssetError::Cancelled);
    // Disposal froze the machine and suppressed downstream callbacks.
    assert_eq!(loader.state(), LoaderState::Loading);
    assert_eq!(meshes_assigned.load(Ordering::SeqCst), 0);
}

struct PostReady {
    settled: Arc<AtomicBool>,
}

#[async_trait]
impl LoaderExtension for PostReady {
    fn name(&self) -> &str {
        "post-ready"
    }

    fn on_ready(&self, ctx: &ResolveContext) {
        if ctx.document().asset.generator.as_deref() != Some("post-ready") {
            return;
        }
        let settled = self.settled.clone();
        ctx.register_completion(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            settled.store(true, Ordering::SeqCst);
            Ok(())
        });
    }
}

#[tokio::test]
async fn test_completion_registered_at_ready_delays_complete() {
    let _guard = LOCK.lock();
    let settled = Arc::new(AtomicBool::new(false));
    let factory_settled = settled.clone();
    register_extension(
        "post-ready",
        Arc::new(move || {
            Arc::new(PostReady {
                settled: factory_settled.clone(),
            })
        }),
    );

    let mut doc = embedded_triangle_json();
    doc["asset"]["generator"] = json!("post-ready");

    let settled_at_complete = Arc::new(AtomicBool::new(false));
    let observed = settled_at_complete.clone();
    let settled_probe = settled.clone();
    let options = LoadOptions {
        on_state: Some(Arc::new(move |state| {
            if state == LoaderState::Complete {
                observed.store(settled_probe.load(Ordering::SeqCst), Ordering::SeqCst);
            }
        })),
        ..Default::default()
    };
    let loader = GltfLoader::new(
        document(doc),
        None,
        Arc::new(MockGpu::new()),
        Arc::new(CountingFetcher::new()),
        options,
    );
    let outcome = loader.load().await;
    unregister_extension("post-ready");
    outcome.unwrap();

    // The post-READY completion had settled by the time COMPLETE fired.
    assert!(settled_at_complete.load(Ordering::SeqCst));
}
