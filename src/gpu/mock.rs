//! Mock GPU implementation for testing
//!
//! Stores all created resources in memory and counts creation calls, so
//! tests can assert the at-most-once instantiation guarantee without real
//! GPU hardware.

use super::{BufferUsage, GpuBuffer, GpuDevice, GpuError, GpuResult, GpuTexture, TextureDescriptor};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counter for generating unique buffer/texture IDs
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Mock GPU device for testing
#[derive(Clone, Debug, Default)]
pub struct MockGpu {
    inner: Arc<MockGpuState>,
}

#[derive(Debug, Default)]
struct MockGpuState {
    buffers_created: AtomicUsize,
    textures_created: AtomicUsize,
    allocated_bytes: AtomicU64,
    buffer_data: RwLock<HashMap<u64, Vec<u8>>>,
    texture_data: RwLock<HashMap<u64, Vec<u8>>>,
}

impl MockGpu {
    /// Create a new mock GPU device
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create_buffer` calls that have executed.
    pub fn buffers_created(&self) -> usize {
        self.inner.buffers_created.load(Ordering::Relaxed)
    }

    /// Number of `create_texture` calls that have executed.
    pub fn textures_created(&self) -> usize {
        self.inner.textures_created.load(Ordering::Relaxed)
    }

    /// Get total allocated memory (for testing)
    pub fn allocated_bytes(&self) -> u64 {
        self.inner.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Read back the data a buffer was created with.
    pub fn buffer_data(&self, buffer: &GpuBuffer) -> Option<Vec<u8>> {
        self.inner.buffer_data.read().get(&buffer.id).cloned()
    }

    /// Read back the pixel data a texture was created with.
    pub fn texture_data(&self, texture: &GpuTexture) -> Option<Vec<u8>> {
        self.inner.texture_data.read().get(&texture.id).cloned()
    }
}

impl GpuDevice for MockGpu {
    fn create_buffer(&self, data: &[u8], usage: BufferUsage) -> GpuResult<GpuBuffer> {
        if data.is_empty() {
            return Err(GpuError::InvalidSize(0));
        }

        let id = next_id();
        self.inner.buffers_created.fetch_add(1, Ordering::Relaxed);
        self.inner
            .allocated_bytes
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        self.inner.buffer_data.write().insert(id, data.to_vec());

        Ok(GpuBuffer {
            id,
            size: data.len(),
            usage,
        })
    }

    fn create_texture(&self, desc: &TextureDescriptor, data: &[u8]) -> GpuResult<GpuTexture> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::TextureCreationFailed(format!(
                "invalid texture size {}x{}",
                desc.width, desc.height
            )));
        }

        let id = next_id();
        self.inner.textures_created.fetch_add(1, Ordering::Relaxed);
        self.inner
            .allocated_bytes
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        self.inner.texture_data.write().insert(id, data.to_vec());

        Ok(GpuTexture {
            id,
            width: desc.width,
            height: desc.height,
        })
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        if let Some(data) = self.inner.buffer_data.write().remove(&buffer.id) {
            self.inner
                .allocated_bytes
                .fetch_sub(data.len() as u64, Ordering::Relaxed);
        }
    }

    fn destroy_texture(&self, texture: &GpuTexture) {
        if let Some(data) = self.inner.texture_data.write().remove(&texture.id) {
            self.inner
                .allocated_bytes
                .fetch_sub(data.len() as u64, Ordering::Relaxed);
        }
    }
}
