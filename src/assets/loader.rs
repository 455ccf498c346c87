use crate::assets::items::{
    CubeMapFaces, FontData, GltfCompression, GltfModel, ImageFormat, TextureData,
};
use crate::error::{Result, RuntimeError};
use serde_json::Value;

/// Context provided to asset decoders
#[derive(Clone, Copy, Debug)]
pub struct LoadContext<'a> {
    pub id: &'a str,
    pub url: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> LoadContext<'a> {
    pub fn new(id: &'a str, url: &'a str, bytes: &'a [u8]) -> Self {
        Self { id, url, bytes }
    }

    fn fail(&self, reason: impl Into<String>) -> RuntimeError {
        RuntimeError::decode(self.id, format!("{}: {}", self.url, reason.into()))
    }
}

/// Turns fetched bytes into loaded artifacts, one method per non-audio asset kind.
///
/// Audio goes through the audio context instead, since decoding needs the platform's codecs.
pub trait AssetDecoder {
    fn texture(&self, context: LoadContext) -> Result<TextureData>;

    fn hdri(&self, context: LoadContext) -> Result<TextureData>;

    /// Faces arrive in declaration order
    fn cube_map(&self, faces: &[LoadContext]) -> Result<CubeMapFaces>;

    fn model(&self, context: LoadContext, compression: GltfCompression) -> Result<GltfModel>;

    fn font(&self, context: LoadContext) -> Result<FontData>;
}

/// Validating decoder that keeps payloads encoded for the render engine
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDecoder;

const CUBE_FACES: usize = 6;
const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_JSON_CHUNK: u32 = 0x4E4F_534A;
const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";
const BASISU_EXTENSION: &str = "KHR_texture_basisu";

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let chunk = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

/// JSON document of a glTF payload: the whole file, or the first chunk of a `.glb`
fn gltf_document(context: &LoadContext) -> Result<(bool, Value)> {
    let bytes = context.bytes;
    if bytes.starts_with(GLB_MAGIC) {
        let json_len = read_u32(bytes, 12).ok_or_else(|| context.fail("truncated glb header"))?;
        if read_u32(bytes, 16) != Some(GLB_JSON_CHUNK) {
            return Err(context.fail("glb does not start with a JSON chunk"));
        }
        let json = bytes
            .get(20..20 + json_len as usize)
            .ok_or_else(|| context.fail("glb JSON chunk out of bounds"))?;
        let document =
            serde_json::from_slice(json).map_err(|err| context.fail(err.to_string()))?;
        Ok((true, document))
    } else {
        let document =
            serde_json::from_slice(bytes).map_err(|err| context.fail(err.to_string()))?;
        Ok((false, document))
    }
}

fn required_extensions(document: &Value) -> impl Iterator<Item = &str> {
    document
        .get("extensionsRequired")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

impl AssetDecoder for DefaultDecoder {
    fn texture(&self, context: LoadContext) -> Result<TextureData> {
        if context.bytes.is_empty() {
            return Err(context.fail("empty image"));
        }
        Ok(TextureData {
            source: context.url.to_string(),
            format: ImageFormat::sniff(context.bytes),
            bytes: context.bytes.into(),
        })
    }

    fn hdri(&self, context: LoadContext) -> Result<TextureData> {
        let format = ImageFormat::sniff(context.bytes);
        if format != ImageFormat::Radiance {
            return Err(context.fail("not a Radiance HDR image"));
        }
        Ok(TextureData {
            source: context.url.to_string(),
            format,
            bytes: context.bytes.into(),
        })
    }

    fn cube_map(&self, faces: &[LoadContext]) -> Result<CubeMapFaces> {
        if faces.len() != CUBE_FACES {
            let id = faces.first().map(|face| face.id).unwrap_or_default();
            return Err(RuntimeError::decode(
                id,
                format!("cube map needs {CUBE_FACES} faces, got {}", faces.len()),
            ));
        }
        let faces = faces
            .iter()
            .map(|face| self.texture(*face))
            .collect::<Result<Vec<_>>>()?;
        Ok(CubeMapFaces { faces })
    }

    fn model(&self, context: LoadContext, compression: GltfCompression) -> Result<GltfModel> {
        let (binary, document) = gltf_document(&context)?;
        if document.get("asset").is_none() {
            return Err(context.fail("missing glTF asset block"));
        }

        for extension in required_extensions(&document) {
            match extension {
                DRACO_EXTENSION if !compression.draco => {
                    return Err(context.fail("Draco-compressed mesh needs a Draco-enabled loader"));
                }
                BASISU_EXTENSION if !compression.ktx2 => {
                    return Err(context.fail("KTX2 textures need a KTX2-enabled loader"));
                }
                _ => {}
            }
        }

        Ok(GltfModel {
            source: context.url.to_string(),
            binary,
            compression,
            bytes: context.bytes.into(),
        })
    }

    fn font(&self, context: LoadContext) -> Result<FontData> {
        let document: Value =
            serde_json::from_slice(context.bytes).map_err(|err| context.fail(err.to_string()))?;
        let glyph_count = document
            .get("glyphs")
            .and_then(Value::as_object)
            .map(|glyphs| glyphs.len())
            .ok_or_else(|| context.fail("typeface JSON without glyphs"))?;

        Ok(FontData {
            family: document
                .get("familyName")
                .and_then(Value::as_str)
                .map(str::to_string),
            glyph_count,
            document,
        })
    }
}
