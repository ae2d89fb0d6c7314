//! File-type inference for decoded payloads.
//!
//! NPK archives do not store file extensions for most entries, so the type is
//! inferred from content. Detection is an ordered table of [`Signature`]s: the
//! payload is first classified as text or binary, then the matching table is
//! scanned top to bottom and the first hit wins. Order matters; more specific
//! patterns must precede the general ones they overlap with.

use neox_common::search;

/// Extension for zero-length payloads.
pub const EMPTY_EXTENSION: &str = "empty";

/// Extension when nothing in the tables matches.
pub const FALLBACK_EXTENSION: &str = "dat";

/// Bytes scanned for NUL when classifying text.
const NUL_SAMPLE: usize = 4000;

/// Bytes that must decode as UTF-8 for a payload to count as text.
const UTF8_SAMPLE: usize = 2048;

/// Text payloads larger than this are not scanned for markers.
const TEXT_SCAN_LIMIT: usize = 100_000_000;

/// A byte pattern tested against a payload.
#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// Payload starts with the bytes.
    Prefix(&'static [u8]),
    /// Bytes occur at a fixed offset.
    At(usize, &'static [u8]),
    /// Bytes start `n` bytes before the end of the payload.
    FromEnd(usize, &'static [u8]),
    /// Bytes occur anywhere.
    Contains(&'static [u8]),
    /// Every sub-pattern matches.
    All(&'static [Pattern]),
    /// At least one sub-pattern matches.
    Any(&'static [Pattern]),
}

impl Pattern {
    /// Test the pattern against `data`.
    pub fn matches(&self, data: &[u8]) -> bool {
        match *self {
            Pattern::Prefix(bytes) => data.starts_with(bytes),
            Pattern::At(offset, bytes) => data
                .get(offset..)
                .is_some_and(|tail| tail.starts_with(bytes)),
            Pattern::FromEnd(back, bytes) => data
                .len()
                .checked_sub(back)
                .and_then(|start| data.get(start..))
                .is_some_and(|tail| tail.starts_with(bytes)),
            Pattern::Contains(bytes) => search::contains(bytes, data),
            Pattern::All(patterns) => patterns.iter().all(|p| p.matches(data)),
            Pattern::Any(patterns) => patterns.iter().any(|p| p.matches(data)),
        }
    }
}

/// A pattern and the extension it implies.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub pattern: Pattern,
    pub extension: &'static str,
}

const fn sig(pattern: Pattern, extension: &'static str) -> Signature {
    Signature { pattern, extension }
}

use Pattern::{All, Any, At, Contains, FromEnd, Prefix};

/// Signatures for binary payloads, in priority order.
pub static BINARY_SIGNATURES: &[Signature] = &[
    sig(Prefix(b"NXS3\x03\x00\x00\x01"), "nxs3"),
    sig(Prefix(b"PVR"), "pvr"),
    sig(Prefix(&[0x34, 0x80, 0xC8, 0xBB]), "mesh"),
    sig(All(&[Prefix(b"RIFF"), Contains(b"FEV")]), "fev"),
    sig(All(&[Prefix(b"RIFF"), Contains(b"WAVE")]), "wem"),
    sig(Prefix(b"RAWANIMA"), "rawanimation"),
    sig(Prefix(b"NEOXBIN1"), "uiprefab"),
    sig(Prefix(b"SKELETON"), "skeleton"),
    sig(Prefix(&[0x01, 0x00, 0x05, 0x00, 0x00, 0x00]), "foliage"),
    sig(Prefix(b"NEOXMESH"), "uimesh"),
    sig(Prefix(b"NVidia(r) GameWorks Blast(tm) v.1"), "blast"),
    sig(
        Any(&[
            Prefix(&[0xE3, 0x00, 0x00, 0x00]),
            Prefix(&[0x63, 0x00, 0x00, 0x00]),
            Prefix(&[0x4C, 0x0F, 0x00, 0x00]),
            Prefix(&[0x27, 0xE3, 0x00, 0x01]),
        ]),
        "pyc",
    ),
    sig(Prefix(b"CocosStudio-UI"), "coc"),
    sig(Prefix(&[0x13, 0xAB, 0xA1, 0x5C]), "astc"),
    sig(Prefix(b"hit"), "hit"),
    sig(Prefix(b"PKM"), "pkm"),
    sig(Prefix(b"DDS"), "dds"),
    sig(
        Any(&[
            FromEnd(18, b"TRUEVISION-XFILE"),
            Prefix(&[0x00, 0x00, 0x02]),
            Prefix(&[0x0D, 0x00, 0x02]),
        ]),
        "tga",
    ),
    sig(Prefix(b"NFXO"), "nfx"),
    sig(All(&[Prefix(&[0xC1, 0x59, 0x41, 0x0D]), Contains(b"Material")]), "mtg"),
    sig(All(&[Prefix(&[0xC1, 0x59, 0x41, 0x0D]), Contains(b"GisFiles")]), "gim"),
    sig(All(&[Prefix(&[0xC1, 0x59, 0x41, 0x0D]), Contains(b"Anim")]), "ags"),
    sig(Prefix(b"CompBlks"), "cbk"),
    sig(Prefix(b"BM"), "bmp"),
    sig(At(1, b"KTX"), "ktx"),
    sig(Prefix(b"blastmesh"), "blastmesh"),
    sig(Prefix(b"clothasset"), "clothasset"),
    sig(At(1, b"PNG"), "png"),
    sig(Prefix(b"FSB5"), "fsb"),
    sig(Prefix(b"VANT"), "vant"),
    sig(Prefix(b"MDMP"), "mdmp"),
    sig(Prefix(b"RGIS"), "gis"),
    sig(Prefix(b"NTRK"), "trk"),
    sig(Prefix(b"OggS"), "ogg"),
    sig(Prefix(&[0xFF, 0xD8, 0xFF]), "jpg"),
    sig(Prefix(b"BKHD"), "bnk"),
    sig(Prefix(b"TZif"), "tzif"),
    sig(At(6, b"JFIF"), "jfif"),
    sig(At(4, b"ftyp"), "mp4"),
    sig(Contains(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x55, 0x55]), "animation"),
];

/// Signatures for text payloads, in priority order.
pub static TEXT_SIGNATURES: &[Signature] = &[
    sig(Prefix(b"from typing import "), "pyi"),
    sig(Prefix(b"-----BEGIN PUBLIC KEY-----"), "pem"),
    sig(Contains(b"<MaterialGroup"), "mtg"),
    sig(Contains(b"<Material"), "mtl"),
    sig(Contains(b"<MetaInfo"), "pvr.meta"),
    sig(All(&[Contains(b"SHEX"), Contains(b"OSGN")]), "binary"),
    sig(Contains(b"<Section"), "sec"),
    sig(Contains(b"<SubMesh"), "gim"),
    sig(Contains(b"<FxGroup"), "sfx"),
    sig(Contains(b"<Track"), "trackgroup"),
    sig(Contains(b"<Instances"), "decal"),
    sig(Contains(b"<Physics"), "col"),
    sig(Any(&[Contains(b"<LODPolicy"), Contains(b"<LODProfile")]), "lod"),
    sig(Contains(b"Type=\"Animation\""), "animation"),
    sig(Contains(b"DisableBakeLightProbe="), "prefab"),
    sig(Contains(b"<SceneConfig"), "scnex"),
    sig(Contains(b"<Scene"), "scn"),
    sig(Contains(b"\"ParticleSystemTemplate\""), "pse"),
    sig(Contains(b"<MainBody"), "nxcompute"),
    sig(Contains(b"<MapSkeletonToMeshBone"), "skeletonextra"),
    sig(Contains(b"<ShadingModel"), "nxshader"),
    sig(Contains(b"<BlastDynamic"), "blt"),
    sig(Contains(b"\"ParticleAudio\""), "psemusic"),
    sig(All(&[Contains(b"<BlendSpace"), Contains(b"is2D=\"false\"")]), "blendspace1d"),
    sig(Contains(b"<BlendSpace"), "blendspace"),
    sig(Contains(b"<AnimationConfig"), "animconfig"),
    sig(Contains(b"<AnimationGraph"), "animgraph"),
    sig(Contains(b"<Head Type=\"Timeline\""), "timeline"),
    sig(Contains(b"<Chain"), "physicalbone"),
    sig(Contains(b"<PostProcess"), "postprocess"),
    sig(Contains(b"\"mesh_import_options\":{"), "nxmeta"),
    sig(Contains(b"<LocalPoints"), "localweather"),
    sig(Contains(b"GeoBatchHint=\"0\""), "gimext"),
    sig(Contains(b"\"AssetType\":\"HapticsData\""), "haptic"),
    sig(Contains(b"<LocalFogParams"), "localfogparams"),
    sig(Any(&[Contains(b"<Audios"), Contains(b"<AudioSource")]), "prefabaudio"),
    sig(Contains(b"\"ReferenceSkeletonPath\""), "mirrortable"),
    sig(Contains(b"\"ReferenceSkeleton"), "featureschema"),
    sig(Contains(b"<Relationships"), "xml.rels"),
    sig(Contains(b"<Waterfall"), "waterfall"),
    sig(Contains(b"<ClothAsset"), "clt"),
    sig(Contains(b"<plist"), "plist"),
    sig(
        Any(&[
            Contains(b"<ShaderCompositor"),
            Contains(b"<ShaderFeature"),
            Contains(b"<ShaderIndexes"),
            Contains(b"<RenderTrigger"),
        ]),
        "render",
    ),
    sig(Contains(b"<SkeletonRig"), "skeletonrig"),
    sig(All(&[Contains(b"format: "), Contains(b"filter: ")]), "atlas"),
    sig(Contains(b"<ShaderCache"), "cache"),
    sig(
        All(&[Contains(b"char"), Contains(b"width="), Contains(b"height=")]),
        "fnt",
    ),
    sig(Contains(b"<AllCaches"), "info"),
    sig(Contains(b"<AllPreloadCaches"), "list"),
    sig(Contains(b"<Remove_Files"), "map"),
    sig(Contains(b"<HLSL File=\""), "md5"),
    sig(Contains(b"<EnvParticle"), "envp"),
    sig(Contains(b"<TextureGroup"), "txg"),
    sig(Contains(b"?xml"), "xml"),
    sig(Prefix(b"{"), "json"),
];

/// Coarse grouping of inferred file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Texture,
    Mesh,
    Audio,
    Xml,
    Other,
}

impl FileCategory {
    /// Categorise an extension as produced by [`detect_extension`].
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "bmp" | "gif" | "jpg" | "jpeg" | "jfif" | "png" | "tga" | "ico" | "tiff" | "dds"
            | "pvr" | "astc" | "ktx" | "pkm" | "cbk" => Self::Texture,
            "mesh" => Self::Mesh,
            "fev" | "wem" | "fsb" | "ogg" | "bnk" => Self::Audio,
            "mtl" | "mtg" | "sec" | "gim" | "sfx" | "scn" | "scnex" | "xml" | "plist"
            | "pvr.meta" | "xml.rels" => Self::Xml,
            _ => Self::Other,
        }
    }
}

/// Classify a payload as text or binary.
///
/// A NUL in the first 4000 bytes or invalid UTF-8 in the first 2048 bytes
/// marks binary. A multi-byte sequence cut off by the sample boundary does not.
pub fn is_text(data: &[u8]) -> bool {
    if search::find_null(&data[..data.len().min(NUL_SAMPLE)]).is_some() {
        return false;
    }

    let sample = &data[..data.len().min(UTF8_SAMPLE)];
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && data.len() > UTF8_SAMPLE,
    }
}

/// Scan a signature table and return the first matching extension.
pub fn match_table(table: &[Signature], data: &[u8]) -> Option<&'static str> {
    table
        .iter()
        .find(|s| s.pattern.matches(data))
        .map(|s| s.extension)
}

/// Infer a file extension from payload content.
///
/// Returns [`EMPTY_EXTENSION`] for empty input and [`FALLBACK_EXTENSION`]
/// when no signature matches.
pub fn detect_extension(data: &[u8]) -> &'static str {
    detect(data).0
}

/// Infer the extension and the text classification in one pass.
pub fn detect(data: &[u8]) -> (&'static str, bool) {
    if data.is_empty() {
        return (EMPTY_EXTENSION, false);
    }

    let text = is_text(data);
    let found = if text {
        if data.len() < TEXT_SCAN_LIMIT {
            match_table(TEXT_SIGNATURES, data)
        } else {
            None
        }
    } else {
        match_table(BINARY_SIGNATURES, data)
    };

    (found.unwrap_or(FALLBACK_EXTENSION), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(detect_extension(&[]), "empty");
    }

    #[test]
    fn test_binary_magics() {
        assert_eq!(detect_extension(&[0x34, 0x80, 0xC8, 0xBB, 0x02, 0x00]), "mesh");
        assert_eq!(detect_extension(b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR"), "png");
        assert_eq!(detect_extension(b"DDS \x7c\x00\x00\x00"), "dds");
        assert_eq!(detect_extension(b"\xabKTX 11\xbb\r\n\x1a\n"), "ktx");
        assert_eq!(detect_extension(b"NXS3\x03\x00\x00\x01\xff\xfe"), "nxs3");
        assert_eq!(detect_extension(b"\xff\xd8\xff\xe0\x00\x10JFIF\x00"), "jpg");
    }

    #[test]
    fn test_riff_requires_marker() {
        assert_eq!(detect_extension(b"RIFF\x10\x00\x00\x00WAVEfmt \x00"), "wem");
        assert_eq!(detect_extension(b"RIFF\x10\x00\x00\x00FEV \x00"), "fev");
        assert_eq!(detect_extension(b"RIFF\x10\x00\x00\x00\x00\x00"), "dat");
    }

    #[test]
    fn test_tga_footer() {
        let mut data = vec![0xAAu8, 0x01, 0x0A, 0x00];
        data.extend_from_slice(b"TRUEVISION-XFILE.\0");
        assert_eq!(detect_extension(&data), "tga");
    }

    #[test]
    fn test_text_markers() {
        assert_eq!(detect_extension(b"<MaterialGroup name=\"a\"/>"), "mtg");
        assert_eq!(detect_extension(b"<Material name=\"a\"/>"), "mtl");
        assert_eq!(detect_extension(b"<?xml version=\"1.0\"?><Root/>"), "xml");
        assert_eq!(detect_extension(b"<SceneConfig/>"), "scnex");
        assert_eq!(detect_extension(b"{\"a\": 1}"), "json");
    }

    #[test]
    fn test_fallback() {
        assert_eq!(detect_extension(b"plain words with nothing special"), "dat");
        assert_eq!(detect_extension(&[0x00, 0x01, 0x02, 0x03]), "dat");
    }

    #[test]
    fn test_is_text() {
        assert!(is_text(b"hello world"));
        assert!(!is_text(b"hello\0world"));
        assert!(!is_text(&[0xC3, 0x28, 0x41]));
    }

    #[test]
    fn test_is_text_split_sequence_at_sample_edge() {
        let mut data = vec![b'a'; UTF8_SAMPLE - 1];
        data.extend_from_slice("é".as_bytes());
        assert!(is_text(&data));
    }

    #[test]
    fn test_categories() {
        assert_eq!(FileCategory::from_extension("mesh"), FileCategory::Mesh);
        assert_eq!(FileCategory::from_extension("PNG"), FileCategory::Texture);
        assert_eq!(FileCategory::from_extension("wem"), FileCategory::Audio);
        assert_eq!(FileCategory::from_extension("mtl"), FileCategory::Xml);
        assert_eq!(FileCategory::from_extension("dat"), FileCategory::Other);
    }
}
