use crate::audio::AudioClip;
use ahash::AHashMap;
use std::sync::Arc;

/// Encoded image container, sniffed from magic bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Radiance,
    Ktx2,
    Unknown,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            ImageFormat::Png
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            ImageFormat::Jpeg
        } else if bytes.starts_with(b"#?RADIANCE") || bytes.starts_with(b"#?RGBE") {
            ImageFormat::Radiance
        } else if bytes.starts_with(&[0xAB, b'K', b'T', b'X', b' ', b'2', b'0']) {
            ImageFormat::Ktx2
        } else {
            ImageFormat::Unknown
        }
    }
}

/// Still-encoded texture bytes handed to the render engine
#[derive(Clone, Debug)]
pub struct TextureData {
    pub source: String,
    pub format: ImageFormat,
    pub bytes: Arc<[u8]>,
}

/// Six ordered cube faces (+x, -x, +y, -y, +z, -z)
#[derive(Clone, Debug)]
pub struct CubeMapFaces {
    pub faces: Vec<TextureData>,
}

/// Compression extensions a glTF payload relies on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GltfCompression {
    pub draco: bool,
    pub ktx2: bool,
}

impl GltfCompression {
    pub const NONE: GltfCompression = GltfCompression {
        draco: false,
        ktx2: false,
    };
}

/// glTF document, binary (`.glb`) or JSON (`.gltf`)
#[derive(Clone, Debug)]
pub struct GltfModel {
    pub source: String,
    pub binary: bool,
    pub compression: GltfCompression,
    pub bytes: Arc<[u8]>,
}

/// Typeface JSON font
#[derive(Clone, Debug)]
pub struct FontData {
    pub family: Option<String>,
    pub glyph_count: usize,
    pub document: serde_json::Value,
}

/// Decoded artifact stored under the record id
#[derive(Clone, Debug)]
pub enum LoadedAsset {
    Texture(TextureData),
    CubeMap(CubeMapFaces),
    Hdri(TextureData),
    Model(GltfModel),
    Font(FontData),
    Audio(AudioClip),
}

impl LoadedAsset {
    pub fn kind_name(&self) -> &'static str {
        match self {
            LoadedAsset::Texture(_) => "texture",
            LoadedAsset::CubeMap(_) => "cubeMap",
            LoadedAsset::Hdri(_) => "HDRITexture",
            LoadedAsset::Model(_) => "gltfModel",
            LoadedAsset::Font(_) => "font",
            LoadedAsset::Audio(_) => "audio",
        }
    }
}

/// Resolved items keyed by asset id. Failed assets are simply absent.
#[derive(Clone, Debug, Default)]
pub struct LoadedItems {
    items: AHashMap<String, LoadedAsset>,
}

impl LoadedItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: impl Into<String>, asset: LoadedAsset) {
        self.items.insert(id.into(), asset);
    }

    pub fn get(&self, id: &str) -> Option<&LoadedAsset> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn texture(&self, id: &str) -> Option<&TextureData> {
        match self.items.get(id)? {
            LoadedAsset::Texture(texture) | LoadedAsset::Hdri(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn cube_map(&self, id: &str) -> Option<&CubeMapFaces> {
        match self.items.get(id)? {
            LoadedAsset::CubeMap(faces) => Some(faces),
            _ => None,
        }
    }

    pub fn model(&self, id: &str) -> Option<&GltfModel> {
        match self.items.get(id)? {
            LoadedAsset::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn font(&self, id: &str) -> Option<&FontData> {
        match self.items.get(id)? {
            LoadedAsset::Font(font) => Some(font),
            _ => None,
        }
    }

    pub fn audio(&self, id: &str) -> Option<&AudioClip> {
        match self.items.get(id)? {
            LoadedAsset::Audio(clip) => Some(clip),
            _ => None,
        }
    }

    /// Every decoded audio clip, cloned out for the audio engine
    pub fn audio_clips(&self) -> AHashMap<String, AudioClip> {
        self.items
            .iter()
            .filter_map(|(id, asset)| match asset {
                LoadedAsset::Audio(clip) => Some((id.clone(), clip.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }
}
