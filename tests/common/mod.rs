//! Shared fixtures for the integration tests: small hand-built documents,
//! instrumented fetchers and byte helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use gltf_resolve::{AssetError, Document, Result, UriFetcher};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Little-endian bytes of a float slice.
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Little-endian bytes of a u16 slice.
pub fn u16_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn data_uri(bytes: &[u8]) -> String {
    format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Encoded PNG of a solid-color image, for texture fixtures.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Binary payload of [`triangle_json`]: three vec3 positions followed by
/// three u16 indices.
pub fn triangle_bytes() -> Vec<u8> {
    let mut bytes = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    bytes.extend(u16_bytes(&[0, 1, 2]));
    bytes
}

/// One scene, one node, one indexed-triangle mesh, buffer at `buffer_uri`.
pub fn triangle_json(buffer_uri: &str) -> Value {
    json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "name": "main", "nodes": [0] }],
        "nodes": [{ "name": "triangle", "mesh": 0 }],
        "meshes": [{
            "name": "triangle-mesh",
            "primitives": [{
                "attributes": { "POSITION": 0 },
                "indices": 1
            }]
        }],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "buffers": [{ "uri": buffer_uri, "byteLength": 42 }]
    })
}

/// [`triangle_json`] with the buffer embedded as a data URI.
pub fn embedded_triangle_json() -> Value {
    triangle_json(&data_uri(&triangle_bytes()))
}

pub fn document(value: Value) -> Document {
    Document::from_json(value).unwrap()
}

/// In-memory fetcher counting how many fetches actually executed.
#[derive(Default)]
pub struct CountingFetcher {
    entries: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.entries.insert(uri.into(), bytes);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UriFetcher for CountingFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .get(uri)
            .cloned()
            .ok_or_else(|| AssetError::Io(format!("no such entry: {uri}")))
    }
}

/// Fetcher that never finishes within a test's lifetime, for disposal
/// mid-fetch scenarios.
pub struct StalledFetcher;

#[async_trait]
impl UriFetcher for StalledFetcher {
    async fn fetch(&self, _uri: &str) -> Result<Vec<u8>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(AssetError::Io("stalled fetcher woke up".to_string()))
    }
}
