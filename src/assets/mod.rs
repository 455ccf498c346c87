// Asset Pipeline Module
//
// Provides catalog-driven asset loading with:
// - Closed, type-dispatched decoding
// - Pluggable fetch backends (memory, file system, thread pool)
// - Aggregate progress with a single terminal completion event

pub mod fetch;
pub mod items;
pub mod loader;
pub mod resource_loader;

pub use fetch::{FetchCompletion, Fetcher, FsFetcher, MemoryFetcher, ReportedUrl};
#[cfg(feature = "parallel")]
pub use fetch::ThreadedFetcher;
pub use items::{
    CubeMapFaces, FontData, GltfCompression, GltfModel, ImageFormat, LoadedAsset, LoadedItems,
    TextureData,
};
pub use loader::{AssetDecoder, DefaultDecoder, LoadContext};
pub use resource_loader::{
    CompleteEvent, ErrorEvent, LoadProgress, LoadTicket, LoadedResources, LoaderEvent,
    LoaderSettings, ProgressEvent, ResourceLoader, ResourceLoaderBuilder,
};

use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::Path;

/// Kind of asset a record describes; drives decoder dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    #[serde(rename = "texture")]
    Texture,
    #[serde(rename = "cubeMap")]
    CubeMap,
    #[serde(rename = "HDRITexture")]
    HdriTexture,
    #[serde(rename = "gltfModel")]
    GltfModel,
    #[serde(rename = "gltfModelDracoCompressed", alias = "gltfModelCompressed")]
    GltfModelDraco,
    #[serde(rename = "gltfModelKTX2Compressed")]
    GltfModelKtx2,
    #[serde(rename = "gltfModelDracoKTX2Compressed")]
    GltfModelDracoKtx2,
    #[serde(rename = "font")]
    Font,
    #[serde(rename = "audio")]
    Audio,
}

impl AssetKind {
    /// Compression extensions a glTF variant needs, `None` for non-model kinds
    pub fn gltf_compression(self) -> Option<GltfCompression> {
        match self {
            AssetKind::GltfModel => Some(GltfCompression::NONE),
            AssetKind::GltfModelDraco => Some(GltfCompression {
                draco: true,
                ktx2: false,
            }),
            AssetKind::GltfModelKtx2 => Some(GltfCompression {
                draco: false,
                ktx2: true,
            }),
            AssetKind::GltfModelDracoKtx2 => Some(GltfCompression {
                draco: true,
                ktx2: true,
            }),
            AssetKind::Texture
            | AssetKind::CubeMap
            | AssetKind::HdriTexture
            | AssetKind::Font
            | AssetKind::Audio => None,
        }
    }

    /// Name as written in catalog files
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Texture => "texture",
            AssetKind::CubeMap => "cubeMap",
            AssetKind::HdriTexture => "HDRITexture",
            AssetKind::GltfModel => "gltfModel",
            AssetKind::GltfModelDraco => "gltfModelDracoCompressed",
            AssetKind::GltfModelKtx2 => "gltfModelKTX2Compressed",
            AssetKind::GltfModelDracoKtx2 => "gltfModelDracoKTX2Compressed",
            AssetKind::Font => "font",
            AssetKind::Audio => "audio",
        }
    }
}

/// One URL or an ordered list of URLs (cube map faces)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetPath {
    Single(String),
    Many(Vec<String>),
}

impl AssetPath {
    /// URLs in declaration order
    pub fn urls(&self) -> SmallVec<[&str; 6]> {
        match self {
            AssetPath::Single(url) => smallvec::smallvec![url.as_str()],
            AssetPath::Many(urls) => urls.iter().map(String::as_str).collect(),
        }
    }

    /// First URL, used when a loader reports the whole record by its leading path
    pub fn primary(&self) -> Option<&str> {
        self.urls().first().copied()
    }
}

impl From<&str> for AssetPath {
    fn from(url: &str) -> Self {
        AssetPath::Single(url.to_string())
    }
}

/// Declarative description of one loadable resource
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub path: AssetPath,
}

impl AssetRecord {
    pub fn new(id: impl Into<String>, kind: AssetKind, path: impl Into<AssetPath>) -> Self {
        Self {
            id: id.into(),
            kind,
            path: path.into(),
        }
    }

    /// Record with several ordered URLs
    pub fn with_paths<I, S>(id: impl Into<String>, kind: AssetKind, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            kind,
            path: AssetPath::Many(paths.into_iter().map(Into::into).collect()),
        }
    }
}

/// Ordered, read-only list of asset records
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssetCatalog {
    records: Vec<AssetRecord>,
}

impl AssetCatalog {
    /// Build a catalog, rejecting duplicate ids and records without any URL
    pub fn new(records: Vec<AssetRecord>) -> Result<Self> {
        let mut seen = ahash::AHashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(RuntimeError::DuplicateAssetId(record.id.clone()));
            }
            if record.path.urls().is_empty() {
                return Err(RuntimeError::CatalogParse(format!(
                    "asset `{}` has an empty path list",
                    record.id
                )));
            }
        }
        Ok(Self { records })
    }

    /// Empty catalog
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON manifest: `[{"id": .., "type": .., "path": ..}]`
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<AssetRecord> = serde_json::from_str(json)?;
        Self::new(records)
    }

    /// Read and parse a JSON manifest from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&AssetRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records.iter()
    }
}
