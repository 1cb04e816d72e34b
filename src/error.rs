//! Error types for gltf-resolve

use thiserror::Error;

/// Main error type for resolution operations.
///
/// Every variant carries owned, cloneable payloads: a failed memoized
/// computation is observed by every waiter of its shared future, so the
/// error itself must be `Clone`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssetError {
    /// An index-based cross-reference pointed outside its target array.
    #[error("{context}: index {index} out of range (array length {length})")]
    Reference {
        context: String,
        index: usize,
        length: usize,
    },

    /// A property required by the resolution step was absent.
    #[error("{context}: missing required property {property}")]
    MissingProperty { context: String, property: String },

    /// Malformed or unsupported binary/image/accessor content.
    #[error("{context}: {message}")]
    Decode { context: String, message: String },

    /// Unsupported or unparsable asset version. Fatal before any
    /// resolution begins.
    #[error("unsupported asset version: {0}")]
    Version(String),

    /// An extension hook committed to a resolution call and then failed.
    #[error("extension '{name}' failed: {message}")]
    Extension { name: String, message: String },

    /// The loader was disposed while work was outstanding.
    #[error("load was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("GPU error: {0}")]
    Gpu(#[from] crate::gpu::GpuError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AssetError {
    /// Build a decode error qualified by the JSON-path context of the
    /// offending entity.
    pub fn decode(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Build a missing-required-property error.
    pub fn missing(context: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MissingProperty {
            context: context.into(),
            property: property.into(),
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<image::ImageError> for AssetError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, AssetError>;
