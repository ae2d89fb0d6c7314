//! Mesh exporters.
//!
//! Every exporter is a pure function from a validated [`MeshModel`] to bytes.

mod ascii;
mod gltf;
mod iqe;
mod obj;
mod pmx;
mod smd;

use std::fmt;
use std::str::FromStr;

use crate::{MeshModel, Result};

/// Output format for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// Wavefront OBJ, geometry only
    Obj,
    /// Valve StudioMDL reference SMD
    Smd,
    /// XNALara-style ASCII dump
    Ascii,
    /// MikuMikuDance PMX 2.0
    Pmx,
    /// Inter-Quake Export
    Iqe,
    /// Binary glTF 2.0
    Glb,
}

impl MeshFormat {
    pub const ALL: [MeshFormat; 6] = [
        Self::Obj,
        Self::Smd,
        Self::Ascii,
        Self::Pmx,
        Self::Iqe,
        Self::Glb,
    ];

    /// File extension without the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Smd => "smd",
            Self::Ascii => "ascii",
            Self::Pmx => "pmx",
            Self::Iqe => "iqe",
            Self::Glb => "glb",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Obj => "Wavefront OBJ",
            Self::Smd => "StudioMDL SMD",
            Self::Ascii => "ASCII",
            Self::Pmx => "PMX 2.0",
            Self::Iqe => "Inter-Quake Export",
            Self::Glb => "glTF binary",
        }
    }

    /// Text formats are UTF-8; the rest are binary.
    pub const fn is_text(self) -> bool {
        !matches!(self, Self::Pmx | Self::Glb)
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Error returned when parsing an unknown format name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mesh format '{0}' (expected one of obj, smd, ascii, pmx, iqe, glb)")]
pub struct UnknownFormat(pub String);

impl FromStr for MeshFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == lower)
            .or(match lower.as_str() {
                "gltf" => Some(Self::Glb),
                _ => None,
            })
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

/// Options shared by all exporters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// Write `1 - v` instead of `v`
    pub flip_uv: bool,
    /// Uniform scale applied to positions (PMX and glTF)
    pub scale: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            flip_uv: false,
            scale: 1.0,
        }
    }
}

impl ExportOptions {
    fn uv(&self, uv: Option<[f32; 2]>) -> [f32; 2] {
        let [u, v] = uv.unwrap_or([0.0, 0.0]);
        if self.flip_uv {
            [u, 1.0 - v]
        } else {
            [u, v]
        }
    }
}

/// Serialize `model` in `format`.
///
/// The model is validated first, so a hand-built model that breaks an
/// invariant is rejected instead of producing a corrupt file.
pub fn encode(model: &MeshModel, format: MeshFormat, options: &ExportOptions) -> Result<Vec<u8>> {
    model.validate()?;
    match format {
        MeshFormat::Obj => obj::write(model, options).map(String::into_bytes),
        MeshFormat::Smd => smd::write(model, options).map(String::into_bytes),
        MeshFormat::Ascii => ascii::write(model, options).map(String::into_bytes),
        MeshFormat::Iqe => iqe::write(model, options).map(String::into_bytes),
        MeshFormat::Pmx => pmx::write(model, options),
        MeshFormat::Glb => gltf::write(model, options),
    }
}
