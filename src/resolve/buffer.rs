//! Buffer, buffer-view and accessor resolution: the byte-level foundation
//! every other resolver builds on.
//!
//! All three levels memoize through the resolve cache, so any number of
//! graph paths reaching the same buffer fetch it once, and any number of
//! primitives sharing an accessor decode it once and create one renderer
//! buffer.

use super::ResolveContext;
use crate::cache::{ArtifactKind, CacheKey, EntityKind};
use crate::document::{Accessor, AccessorType};
use crate::error::{AssetError, Result};
use crate::fetch::decode_data_uri;
use crate::gpu::{BufferUsage, GpuBuffer};
use crate::index::indexed;
use crate::model::VertexBufferBinding;
use std::sync::Arc;

/// Decoded accessor contents: `count` elements of `components` floats.
/// Integer components are converted (and denormalized when the accessor is
/// normalized) per glTF rules.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorData {
    pub count: usize,
    pub components: usize,
    pub values: Vec<f32>,
}

fn component_size(component_type: u32) -> Option<usize> {
    match component_type {
        5120 | 5121 => Some(1), // BYTE, UNSIGNED_BYTE
        5122 | 5123 => Some(2), // SHORT, UNSIGNED_SHORT
        5125 | 5126 => Some(4), // UNSIGNED_INT, FLOAT
        _ => None,
    }
}

fn read_component(bytes: &[u8], component_type: u32, normalized: bool) -> f32 {
    match component_type {
        5120 => {
            let v = bytes[0] as i8 as f32;
            if normalized {
                (v / 127.0).max(-1.0)
            } else {
                v
            }
        }
        5121 => {
            let v = bytes[0] as f32;
            if normalized {
                v / 255.0
            } else {
                v
            }
        }
        5122 => {
            let v = i16::from_le_bytes([bytes[0], bytes[1]]) as f32;
            if normalized {
                (v / 32767.0).max(-1.0)
            } else {
                v
            }
        }
        5123 => {
            let v = u16::from_le_bytes([bytes[0], bytes[1]]) as f32;
            if normalized {
                v / 65535.0
            } else {
                v
            }
        }
        5125 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
        _ => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

/// Decode unsigned scalar index values without a float round-trip, so
/// UNSIGNED_INT values above 2^24 survive intact.
fn decode_indices(
    path: &str,
    accessor: &Accessor,
    bytes: &[u8],
    byte_stride: Option<usize>,
) -> Result<Vec<u32>> {
    let size = component_size(accessor.component_type).ok_or_else(|| {
        AssetError::decode(
            path,
            format!("unsupported component type {}", accessor.component_type),
        )
    })?;
    let stride = byte_stride.unwrap_or(size);

    let mut values = Vec::with_capacity(accessor.count);
    for element in 0..accessor.count {
        let start = accessor.byte_offset + element * stride;
        let end = start + size;
        if end > bytes.len() {
            return Err(AssetError::decode(
                path,
                format!(
                    "element {element} spans bytes {start}..{end}, view has {}",
                    bytes.len()
                ),
            ));
        }
        values.push(match accessor.component_type {
            5121 => bytes[start] as u32,
            5123 => u16::from_le_bytes([bytes[start], bytes[start + 1]]) as u32,
            _ => u32::from_le_bytes([
                bytes[start],
                bytes[start + 1],
                bytes[start + 2],
                bytes[start + 3],
            ]),
        });
    }
    Ok(values)
}

fn decode_elements(
    path: &str,
    accessor: &Accessor,
    bytes: &[u8],
    byte_stride: Option<usize>,
) -> Result<Vec<f32>> {
    let components = accessor.accessor_type.component_count();
    let size = component_size(accessor.component_type).ok_or_else(|| {
        AssetError::decode(
            path,
            format!("unsupported component type {}", accessor.component_type),
        )
    })?;
    let tight = components * size;
    let stride = byte_stride.unwrap_or(tight);

    let mut values = Vec::with_capacity(accessor.count * components);
    for element in 0..accessor.count {
        let start = accessor.byte_offset + element * stride;
        let end = start + tight;
        if end > bytes.len() {
            return Err(AssetError::decode(
                path,
                format!(
                    "element {element} spans bytes {start}..{end}, view has {}",
                    bytes.len()
                ),
            ));
        }
        for component in 0..components {
            let offset = start + component * size;
            values.push(read_component(
                &bytes[offset..],
                accessor.component_type,
                accessor.normalized,
            ));
        }
    }
    Ok(values)
}

impl ResolveContext {
    /// Fetch bytes for one URI: extension override first, then data-URI
    /// decoding, then the caller's fetcher. Progress is reported at each
    /// completed fetch.
    pub async fn load_uri(&self, path: &str, uri: &str) -> Result<Vec<u8>> {
        for ext in self.chain.enabled() {
            if let Some(bytes) = ext.load_uri(self, path, uri).await? {
                return Ok(bytes);
            }
        }
        if let Some(bytes) = decode_data_uri(uri)? {
            return Ok(bytes);
        }
        let bytes = self
            .lifecycle
            .run_guarded(self.fetcher.fetch(uri))
            .await?;
        self.report_fetched(bytes.len() as u64);
        Ok(bytes)
    }

    /// Raw bytes of one buffer, fetched at most once.
    pub async fn load_buffer(&self, context: &str, index: usize) -> Result<Arc<Vec<u8>>> {
        indexed(context, &self.document.buffers, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Buffer, index, ArtifactKind::Bytes),
            move || async move {
                let path = format!("/buffers/{index}");
                let buffer = &ctx.document.buffers[index];
                let bytes = match &buffer.uri {
                    Some(uri) => ctx.load_uri(&path, uri).await?,
                    // A buffer without a URI is the document's binary chunk.
                    None => match &ctx.bin {
                        Some(bin) => bin.as_ref().clone(),
                        None => return Err(AssetError::missing(path.as_str(), "uri")),
                    },
                };
                if bytes.len() < buffer.byte_length {
                    return Err(AssetError::decode(
                        path.as_str(),
                        format!(
                            "expected {} bytes, got {}",
                            buffer.byte_length,
                            bytes.len()
                        ),
                    ));
                }
                Ok(Arc::new(bytes))
            },
        )
        .await
    }

    /// Bytes of one buffer view, sliced at most once.
    pub async fn load_buffer_view_bytes(
        &self,
        context: &str,
        index: usize,
    ) -> Result<Arc<Vec<u8>>> {
        indexed(context, &self.document.buffer_views, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::BufferView, index, ArtifactKind::Bytes),
            move || async move {
                let path = format!("/bufferViews/{index}");
                let view = &ctx.document.buffer_views[index];
                let buffer = ctx
                    .load_buffer(&format!("{path}/buffer"), view.buffer)
                    .await?;
                let end = view.byte_offset + view.byte_length;
                if end > buffer.len() {
                    return Err(AssetError::decode(
                        path.as_str(),
                        format!(
                            "view spans bytes {}..{end}, buffer has {}",
                            view.byte_offset,
                            buffer.len()
                        ),
                    ));
                }
                Ok(Arc::new(buffer[view.byte_offset..end].to_vec()))
            },
        )
        .await
    }

    /// Decoded float contents of one accessor, decoded at most once.
    pub async fn load_accessor_data(
        &self,
        context: &str,
        index: usize,
    ) -> Result<Arc<AccessorData>> {
        indexed(context, &self.document.accessors, index)?;
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Accessor, index, ArtifactKind::Data),
            move || async move {
                let path = format!("/accessors/{index}");
                let accessor = ctx.document.accessors[index].clone();
                if accessor.sparse.is_some() {
                    return Err(AssetError::decode(
                        path.as_str(),
                        "sparse accessors are not supported",
                    ));
                }
                let components = accessor.accessor_type.component_count();
                let values = match accessor.buffer_view {
                    // An accessor without a buffer view reads as zeros.
                    None => vec![0.0; accessor.count * components],
                    Some(view_index) => {
                        let view = indexed(
                            &format!("{path}/bufferView"),
                            &ctx.document.buffer_views,
                            view_index,
                        )?;
                        let byte_stride = view.byte_stride;
                        let bytes = ctx
                            .load_buffer_view_bytes(&format!("{path}/bufferView"), view_index)
                            .await?;
                        decode_elements(&path, &accessor, &bytes, byte_stride)?
                    }
                };
                Ok(Arc::new(AccessorData {
                    count: accessor.count,
                    components,
                    values,
                }))
            },
        )
        .await
    }

    /// Decoded index contents of one accessor (unsigned byte/short/int
    /// scalars widened to u32), decoded at most once. Indices read the
    /// view bytes directly as integers, never through the float path.
    pub async fn load_accessor_indices(
        &self,
        context: &str,
        index: usize,
    ) -> Result<Arc<Vec<u32>>> {
        let accessor = indexed(context, &self.document.accessors, index)?;
        if accessor.accessor_type != AccessorType::Scalar
            || !matches!(accessor.component_type, 5121 | 5123 | 5125)
        {
            return Err(AssetError::decode(
                format!("/accessors/{index}"),
                "index accessors must be unsigned scalar",
            ));
        }
        let ctx = self.clone();
        self.memoized(
            CacheKey::new(EntityKind::Accessor, index, ArtifactKind::Indices),
            move || async move {
                let path = format!("/accessors/{index}");
                let accessor = ctx.document.accessors[index].clone();
                if accessor.sparse.is_some() {
                    return Err(AssetError::decode(
                        path.as_str(),
                        "sparse accessors are not supported",
                    ));
                }
                let values = match accessor.buffer_view {
                    None => vec![0; accessor.count],
                    Some(view_index) => {
                        let view = indexed(
                            &format!("{path}/bufferView"),
                            &ctx.document.buffer_views,
                            view_index,
                        )?;
                        let byte_stride = view.byte_stride;
                        let bytes = ctx
                            .load_buffer_view_bytes(&format!("{path}/bufferView"), view_index)
                            .await?;
                        decode_indices(&path, &accessor, &bytes, byte_stride)?
                    }
                };
                Ok(Arc::new(values))
            },
        )
        .await
    }

    /// Renderer-side vertex buffer for one accessor, created at most once
    /// and bound under the caller's semantic.
    pub async fn load_vertex_buffer(
        &self,
        context: &str,
        index: usize,
        semantic: &str,
    ) -> Result<VertexBufferBinding> {
        let data = self.load_accessor_data(context, index).await?;
        let ctx = self.clone();
        let buffer = self
            .memoized(
                CacheKey::new(EntityKind::Accessor, index, ArtifactKind::VertexBuffer),
                move || async move {
                    let path = format!("/accessors/{index}");
                    let data = ctx.load_accessor_data(&path, index).await?;
                    let bytes: &[u8] = bytemuck::cast_slice(&data.values);
                    let buffer = ctx.gpu.create_buffer(bytes, BufferUsage::Vertex)?;
                    Ok(Arc::new(buffer))
                },
            )
            .await?;
        Ok(VertexBufferBinding {
            semantic: semantic.to_string(),
            buffer,
            count: data.count,
            components: data.components,
        })
    }

    /// Renderer-side index buffer for one accessor, created at most once.
    /// Returns the buffer and the index count.
    pub async fn load_index_buffer(
        &self,
        context: &str,
        index: usize,
    ) -> Result<(Arc<GpuBuffer>, usize)> {
        let indices = self.load_accessor_indices(context, index).await?;
        let ctx = self.clone();
        let buffer = self
            .memoized(
                CacheKey::new(EntityKind::Accessor, index, ArtifactKind::IndexBuffer),
                move || async move {
                    let path = format!("/accessors/{index}");
                    let indices = ctx.load_accessor_indices(&path, index).await?;
                    let bytes: &[u8] = bytemuck::cast_slice(indices.as_slice());
                    let buffer = ctx.gpu.create_buffer(bytes, BufferUsage::Index)?;
                    Ok(Arc::new(buffer))
                },
            )
            .await?;
        Ok((buffer, indices.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accessor(component_type: u32, accessor_type: AccessorType, count: usize) -> Accessor {
        Accessor {
            component_type,
            accessor_type,
            count,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_f32_vec3() {
        let values: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
        let acc = accessor(5126, AccessorType::Vec3, 2);
        let decoded = decode_elements("/accessors/0", &acc, &bytes, None).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_decode_normalized_u8() {
        let acc = Accessor {
            normalized: true,
            ..accessor(5121, AccessorType::Scalar, 2)
        };
        let decoded = decode_elements("/accessors/0", &acc, &[0, 255], None).unwrap();
        assert_eq!(decoded, vec![0.0, 1.0]);
    }

    #[test]
    fn test_decode_strided() {
        // Two VEC2 u16 elements padded to an 8-byte stride.
        let bytes = [1u8, 0, 2, 0, 0xEE, 0xEE, 0xEE, 0xEE, 3, 0, 4, 0];
        let acc = accessor(5123, AccessorType::Vec2, 2);
        let decoded = decode_elements("/accessors/0", &acc, &bytes, Some(8)).unwrap();
        assert_eq!(decoded, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_decode_out_of_bounds_is_decode_error() {
        let acc = accessor(5126, AccessorType::Vec3, 2);
        let err = decode_elements("/accessors/0", &acc, &[0u8; 12], None).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn test_decode_indices_preserves_large_u32() {
        // 16_777_217 is the first integer an f32 cannot represent.
        let values: Vec<u32> = vec![0, 16_777_217, u32::MAX];
        let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
        let acc = accessor(5125, AccessorType::Scalar, 3);
        let decoded = decode_indices("/accessors/0", &acc, &bytes, None).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_decode_indices_widens_u16() {
        let bytes = [1u8, 0, 0xFF, 0xFF];
        let acc = accessor(5123, AccessorType::Scalar, 2);
        let decoded = decode_indices("/accessors/0", &acc, &bytes, None).unwrap();
        assert_eq!(decoded, vec![1, 65535]);
    }

    #[test]
    fn test_decode_indices_out_of_bounds_is_decode_error() {
        let acc = accessor(5125, AccessorType::Scalar, 2);
        let err = decode_indices("/accessors/0", &acc, &[0u8; 4], None).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn test_unsupported_component_type() {
        let acc = accessor(9999, AccessorType::Scalar, 1);
        let err = decode_elements("/accessors/0", &acc, &[0u8; 4], None).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }
}
