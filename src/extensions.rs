//! The extension chain: ordered, named, independently toggleable override
//! points for every resolution step.
//!
//! Extensions implement any subset of the hook set; the engine calls each
//! enabled extension's hook in registration order and takes the first
//! non-`None` result, skipping the remaining extensions and the default
//! resolver for that call. An extension that returns `Some` has committed:
//! if its hook then fails, the failure is the resolution's failure and the
//! engine does not fall back to default logic. Disabled extensions are not
//! consulted at all.

use crate::document::{
    Animation, Camera, ExtensionMap, Material, Node, Primitive, Scene, TextureInfo,
};
use crate::error::{AssetError, Result};
use crate::model::{
    AnimationGroup, PrimitiveGeometry, PrimitiveType, RenderCamera, RenderMaterial, RenderNode,
    RenderTexture,
};
use crate::resolve::ResolveContext;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Override hooks an extension may implement.
///
/// Every resolution hook defaults to `Ok(None)`: not handled, fall through
/// to the next extension or the engine's default resolver. Action hooks
/// (`on_loading`, `on_ready`) are lifecycle notifications with no result.
#[allow(unused_variables)]
#[async_trait]
pub trait LoaderExtension: Send + Sync {
    /// Unique extension name, e.g. `"KHR_materials_unlit"`.
    fn name(&self) -> &str;

    /// Called once when the load begins.
    fn on_loading(&self, ctx: &ResolveContext) {}

    /// Called once when the primary import has resolved.
    fn on_ready(&self, ctx: &ResolveContext) {}

    async fn load_scene(
        &self,
        ctx: &ResolveContext,
        path: &str,
        scene: &Scene,
    ) -> Result<Option<Vec<Arc<RenderNode>>>> {
        Ok(None)
    }

    async fn load_node(
        &self,
        ctx: &ResolveContext,
        path: &str,
        node: &Node,
    ) -> Result<Option<Arc<RenderNode>>> {
        Ok(None)
    }

    async fn load_camera(
        &self,
        ctx: &ResolveContext,
        path: &str,
        camera: &Camera,
    ) -> Result<Option<Arc<RenderCamera>>> {
        Ok(None)
    }

    /// Override the whole material resolution for one draw mode.
    async fn load_material(
        &self,
        ctx: &ResolveContext,
        path: &str,
        material: &Material,
        primitive_type: PrimitiveType,
    ) -> Result<Option<Arc<RenderMaterial>>> {
        Ok(None)
    }

    /// Override only the synchronous creation of the empty material
    /// object; default property loading still runs against it.
    fn create_material(
        &self,
        ctx: &ResolveContext,
        path: &str,
        material: &Material,
        primitive_type: PrimitiveType,
    ) -> Result<Option<Arc<RenderMaterial>>> {
        Ok(None)
    }

    /// Override asynchronous property population of an already-created
    /// material. Returning `Some(())` marks the call handled.
    async fn load_material_properties(
        &self,
        ctx: &ResolveContext,
        path: &str,
        material: &Material,
        target: &Arc<RenderMaterial>,
    ) -> Result<Option<()>> {
        Ok(None)
    }

    async fn load_texture_info(
        &self,
        ctx: &ResolveContext,
        path: &str,
        info: &TextureInfo,
    ) -> Result<Option<Arc<RenderTexture>>> {
        Ok(None)
    }

    async fn load_animation(
        &self,
        ctx: &ResolveContext,
        path: &str,
        animation: &Animation,
    ) -> Result<Option<Arc<AnimationGroup>>> {
        Ok(None)
    }

    async fn load_vertex_data(
        &self,
        ctx: &ResolveContext,
        path: &str,
        primitive: &Primitive,
    ) -> Result<Option<Arc<PrimitiveGeometry>>> {
        Ok(None)
    }

    /// Override byte fetching for one URI.
    async fn load_uri(
        &self,
        ctx: &ResolveContext,
        path: &str,
        uri: &str,
    ) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// One registered extension instance bound to one loader.
pub struct RegisteredExtension {
    pub name: String,
    pub instance: Arc<dyn LoaderExtension>,
    enabled: AtomicBool,
}

impl RegisteredExtension {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// Ordered list of extension instances scoped to one loader.
#[derive(Default)]
pub struct ExtensionChain {
    extensions: Vec<RegisteredExtension>,
}

impl ExtensionChain {
    pub fn new(instances: Vec<Arc<dyn LoaderExtension>>) -> Self {
        let extensions = instances
            .into_iter()
            .map(|instance| RegisteredExtension {
                name: instance.name().to_string(),
                instance,
                enabled: AtomicBool::new(true),
            })
            .collect();
        Self { extensions }
    }

    /// Instantiate every factory in the process-wide registry, in
    /// registration order.
    pub fn from_registry() -> Self {
        Self::new(instantiate_registered())
    }

    /// Enabled extensions, in registration order. Disabled extensions are
    /// skipped before hook dispatch.
    pub fn enabled(&self) -> impl Iterator<Item = &Arc<dyn LoaderExtension>> {
        self.extensions
            .iter()
            .filter(|ext| ext.is_enabled())
            .map(|ext| &ext.instance)
    }

    /// Toggle one extension by name. Returns whether the name was found.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.extensions.iter().find(|ext| ext.name == name) {
            Some(ext) => {
                ext.enabled.store(enabled, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| ext.name == name && ext.is_enabled())
    }

    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| ext.name.as_str()).collect()
    }

    /// Action hook: notify every enabled extension, in order.
    pub fn on_loading(&self, ctx: &ResolveContext) {
        for ext in self.enabled() {
            ext.on_loading(ctx);
        }
    }

    /// Action hook: notify every enabled extension, in order.
    pub fn on_ready(&self, ctx: &ResolveContext) {
        for ext in self.enabled() {
            ext.on_ready(ctx);
        }
    }
}

/// Factory producing an extension instance bound to one loader instance.
pub type ExtensionFactory = Arc<dyn Fn() -> Arc<dyn LoaderExtension> + Send + Sync>;

/// Process-wide extension factory registry. Factories are registered
/// before any load begins and are not mutated during an in-flight load.
static REGISTRY: Mutex<Vec<(String, ExtensionFactory)>> = parking_lot::const_mutex(Vec::new());

/// Register an extension factory under a unique name, replacing any
/// earlier factory with the same name (keeping its registration slot).
pub fn register_extension(name: &str, factory: ExtensionFactory) {
    let mut registry = REGISTRY.lock();
    match registry.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = factory,
        None => registry.push((name.to_string(), factory)),
    }
}

/// Remove a registered factory. Returns whether it existed.
pub fn unregister_extension(name: &str) -> bool {
    let mut registry = REGISTRY.lock();
    let before = registry.len();
    registry.retain(|(n, _)| n != name);
    registry.len() != before
}

fn instantiate_registered() -> Vec<Arc<dyn LoaderExtension>> {
    REGISTRY
        .lock()
        .iter()
        .map(|(_, factory)| factory())
        .collect()
}

/// If `extensions` carries the named payload, invoke `action` with a
/// sub-context (`{context}/extensions/{name}`) and the payload, returning
/// its result; otherwise return `Ok(None)` so callers can cheaply test
/// whether a feature applies without exception-based control flow.
pub async fn load_extension_value<T, F, Fut>(
    context: &str,
    extensions: Option<&ExtensionMap>,
    name: &str,
    action: F,
) -> Result<Option<T>>
where
    F: FnOnce(String, Value) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match extensions.and_then(|map| map.get(name)) {
        Some(value) => {
            let sub_context = format!("{context}/extensions/{name}");
            action(sub_context, value.clone()).await.map(Some)
        }
        None => Ok(None),
    }
}

/// Same convention as [`load_extension_value`], for a named field of the
/// `extras` payload.
pub async fn load_extra_value<T, F, Fut>(
    context: &str,
    extras: Option<&Value>,
    name: &str,
    action: F,
) -> Result<Option<T>>
where
    F: FnOnce(String, Value) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match extras.and_then(|value| value.get(name)) {
        Some(value) => {
            let sub_context = format!("{context}/extras/{name}");
            action(sub_context, value.clone()).await.map(Some)
        }
        None => Ok(None),
    }
}

/// Convenience constructor for the failure of a committed extension hook.
pub fn extension_error(name: &str, message: impl Into<String>) -> AssetError {
    AssetError::Extension {
        name: name.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl LoaderExtension for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_chain_preserves_order_and_skips_disabled() {
        let chain = ExtensionChain::new(vec![
            Arc::new(Named("A")) as Arc<dyn LoaderExtension>,
            Arc::new(Named("B")),
            Arc::new(Named("C")),
        ]);

        assert!(chain.set_enabled("B", false));
        let names: Vec<&str> = chain.enabled().map(|e| e.name()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert!(!chain.is_enabled("B"));
        assert!(!chain.set_enabled("missing", true));
    }

    #[test]
    fn test_registry_replaces_by_name() {
        register_extension("test-reg", Arc::new(|| Arc::new(Named("test-reg"))));
        register_extension("test-reg", Arc::new(|| Arc::new(Named("test-reg"))));
        let count = REGISTRY
            .lock()
            .iter()
            .filter(|(n, _)| n == "test-reg")
            .count();
        assert_eq!(count, 1);
        assert!(unregister_extension("test-reg"));
        assert!(!unregister_extension("test-reg"));
    }

    #[tokio::test]
    async fn test_load_extension_value_falls_through_when_absent() {
        let result: Option<u32> =
            load_extension_value("/nodes/0", None, "MSFT_lod", |_, _| async { Ok(1) })
                .await
                .unwrap();
        assert_eq!(result, None);

        let mut map = ExtensionMap::new();
        map.insert("MSFT_lod".to_string(), serde_json::json!({ "ids": [1] }));
        let result = load_extension_value("/nodes/0", Some(&map), "MSFT_lod", |ctx, value| async move {
            assert_eq!(ctx, "/nodes/0/extensions/MSFT_lod");
            assert!(value.get("ids").is_some());
            Ok(2u32)
        })
        .await
        .unwrap();
        assert_eq!(result, Some(2));
    }

    #[tokio::test]
    async fn test_load_extra_value() {
        let extras = serde_json::json!({ "flavor": "mint" });
        let result = load_extra_value("/materials/1", Some(&extras), "flavor", |ctx, value| async move {
            assert_eq!(ctx, "/materials/1/extras/flavor");
            Ok(value.as_str().unwrap().to_string())
        })
        .await
        .unwrap();
        assert_eq!(result.as_deref(), Some("mint"));
    }
}
