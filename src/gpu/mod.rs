//! Renderer-resource boundary for backend-agnostic resolution.
//!
//! The engine only ever needs to hand finished bytes to the renderer:
//! vertex/index buffers and decoded textures. The trait is object-safe so
//! one `Arc<dyn GpuDevice>` can ride through the resolution graph next to
//! the extension chain; handles are opaque id-carrying values rather than
//! associated types.

pub mod mock;

use std::fmt::Debug;
use thiserror::Error;

/// Error type for GPU operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpuError {
    #[error("Buffer allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Texture creation failed: {0}")]
    TextureCreationFailed(String),

    #[error("Invalid buffer size: {0}")]
    InvalidSize(usize),

    #[error("Device lost")]
    DeviceLost,

    #[error("Out of memory")]
    OutOfMemory,
}

/// Result type for GPU operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Uniform buffer
    Uniform,
    /// Storage buffer
    Storage,
}

/// Texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuTextureFormat {
    /// RGBA 8-bit with sRGB color space
    Rgba8Srgb,
    /// RGBA 8-bit unorm
    Rgba8Unorm,
    /// Single channel 8-bit
    R8Unorm,
}

/// Texture descriptor for creation
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Texture format
    pub format: GpuTextureFormat,
    /// Generate mipmaps automatically
    pub generate_mipmaps: bool,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            format: GpuTextureFormat::Rgba8Srgb,
            generate_mipmaps: false,
        }
    }
}

/// Opaque handle to a created renderer buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuBuffer {
    pub id: u64,
    pub size: usize,
    pub usage: BufferUsage,
}

/// Opaque handle to a created renderer texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

/// Renderer-side resource creation boundary.
///
/// The at-most-once discipline of the resolve cache guarantees each of
/// these creation calls runs exactly once per glTF artifact regardless of
/// reference fan-in.
pub trait GpuDevice: Send + Sync + Debug {
    /// Create a buffer holding `data`.
    fn create_buffer(&self, data: &[u8], usage: BufferUsage) -> GpuResult<GpuBuffer>;

    /// Create a texture from decoded pixel data.
    fn create_texture(&self, desc: &TextureDescriptor, data: &[u8]) -> GpuResult<GpuTexture>;

    /// Destroy a buffer. Optional cleanup, called during loader disposal.
    fn destroy_buffer(&self, _buffer: &GpuBuffer) {}

    /// Destroy a texture. Optional cleanup, called during loader disposal.
    fn destroy_texture(&self, _texture: &GpuTexture) {}
}
