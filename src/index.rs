//! The indexing pass and the context-qualified array lookup.
//!
//! Indices are assigned exactly once, before any resolution starts, so that
//! every later cross-reference can be resolved as a flat array position.
//! The pass is idempotent: re-running it on an already-indexed document is
//! a no-op producing identical results.

use crate::document::{ArrayItem, Document};
use crate::error::{AssetError, Result};

fn assign<T: ArrayItem>(items: &mut [T]) {
    for (position, item) in items.iter_mut().enumerate() {
        item.set_index(position);
    }
}

/// Assign every array element's `index` equal to its position, in a single
/// pass over all array-valued top-level properties (plus the nested
/// primitive/channel/sampler arrays, which are indexed the same way).
pub fn assign_indices(document: &mut Document) {
    assign(&mut document.accessors);
    assign(&mut document.animations);
    assign(&mut document.buffers);
    assign(&mut document.buffer_views);
    assign(&mut document.cameras);
    assign(&mut document.images);
    assign(&mut document.materials);
    assign(&mut document.meshes);
    assign(&mut document.nodes);
    assign(&mut document.samplers);
    assign(&mut document.scenes);
    assign(&mut document.skins);
    assign(&mut document.textures);

    for mesh in &mut document.meshes {
        assign(&mut mesh.primitives);
    }
    for animation in &mut document.animations {
        assign(&mut animation.channels);
        assign(&mut animation.samplers);
    }
}

/// Return the element at `index`, or fail with a reference error naming the
/// JSON-path context of the referencing property and the offending index.
/// Used pervasively by every resolver when dereferencing a cross-reference.
pub fn indexed<'a, T>(context: &str, items: &'a [T], index: usize) -> Result<&'a T> {
    items.get(index).ok_or_else(|| AssetError::Reference {
        context: context.to_string(),
        index,
        length: items.len(),
    })
}
