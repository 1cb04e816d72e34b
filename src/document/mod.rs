//! The glTF 2.0 document: root container for every entity array.
//!
//! The document is produced once from already-decoded JSON, version-checked
//! up front, and owned immutably (behind an `Arc`) for the lifetime of one
//! loader. Resolvers reference entities, they never mutate them.

pub mod entities;

use crate::error::{AssetError, Result};
use serde::Deserialize;
use serde_json::Value;

pub use entities::*;

/// `asset` sub-object carrying version negotiation data.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Asset {
    pub version: String,
    pub min_version: Option<String>,
    pub generator: Option<String>,
    pub copyright: Option<String>,
}

/// Parsed major.minor asset version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| AssetError::Version(text.to_string()))?;
        let minor = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| AssetError::Version(text.to_string()))?;
        Ok(Self { major, minor })
    }
}

/// Root object graph for one whole asset.
///
/// Invariant: after [`crate::index::assign_indices`] runs, every element of
/// every array carries an `index` equal to its array position, and no
/// resolution step mutates it afterwards.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub asset: Asset,
    pub scene: Option<usize>,
    pub accessors: Vec<Accessor>,
    pub animations: Vec<Animation>,
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub cameras: Vec<Camera>,
    pub images: Vec<Image>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub samplers: Vec<Sampler>,
    pub scenes: Vec<Scene>,
    pub skins: Vec<Skin>,
    pub textures: Vec<Texture>,
    pub extensions_used: Vec<String>,
    pub extensions_required: Vec<String>,
    pub extensions: Option<ExtensionMap>,
    pub extras: Option<Value>,
}

impl Document {
    /// Build a document from already-decoded JSON, rejecting unsupported
    /// asset versions before any resolution can begin. Older major versions
    /// belong to a compatibility layer outside this crate.
    pub fn from_json(json: Value) -> Result<Self> {
        let document: Document = serde_json::from_value(json)?;
        document.check_version()?;
        Ok(document)
    }

    fn check_version(&self) -> Result<()> {
        let version = Version::parse(&self.asset.version)?;
        if version.major != 2 {
            return Err(AssetError::Version(self.asset.version.clone()));
        }
        if let Some(min_version) = &self.asset.min_version {
            let min = Version::parse(min_version)?;
            if min > (Version { major: 2, minor: 0 }) {
                return Err(AssetError::Version(min_version.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_parse() {
        assert_eq!(Version::parse("2.0").unwrap(), Version { major: 2, minor: 0 });
        assert!(Version::parse("two").is_err());
        assert!(Version::parse("2").is_err());
    }

    #[test]
    fn test_from_json_accepts_version_2() {
        let document = Document::from_json(json!({
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "root" }]
        }))
        .unwrap();
        assert_eq!(document.scenes.len(), 1);
        assert_eq!(document.nodes[0].name.as_deref(), Some("root"));
    }

    #[test]
    fn test_from_json_rejects_other_major_versions() {
        let result = Document::from_json(json!({ "asset": { "version": "1.0" } }));
        assert!(matches!(result, Err(AssetError::Version(_))));
    }

    #[test]
    fn test_from_json_rejects_future_min_version() {
        let result = Document::from_json(json!({
            "asset": { "version": "2.0", "minVersion": "2.1" }
        }));
        assert!(matches!(result, Err(AssetError::Version(_))));
    }
}
