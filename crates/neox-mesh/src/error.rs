//! Error types for the mesh crate.

use thiserror::Error;

/// Errors raised while decoding, validating or exporting a mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The payload does not start with the mesh magic.
    #[error("not a NeoX mesh: bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// A block would read past the end of the payload.
    #[error("truncated mesh at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A declared count is above the decoder's safety limit.
    #[error("{what} count {count} exceeds limit {limit}")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    /// Structural value that must hold a fixed value did not.
    #[error("malformed mesh: {0}")]
    Malformed(String),

    /// A bone's parent index is outside the skeleton.
    #[error("bone {bone} has out-of-range parent {parent}")]
    InvalidParent { bone: usize, parent: usize },

    /// Following parent links from this bone never reaches a root.
    #[error("bone hierarchy contains a cycle through bone {bone}")]
    BoneCycle { bone: usize },

    /// A triangle references a vertex that does not exist.
    #[error("triangle {triangle} references vertex {index}, mesh has {vertex_count}")]
    FaceIndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    /// A vertex influence references a bone that does not exist.
    #[error("vertex {vertex} references bone {bone}, skeleton has {bone_count}")]
    BoneIndexOutOfRange {
        vertex: usize,
        bone: u16,
        bone_count: usize,
    },

    /// Skinned model whose influence table does not match its vertices.
    #[error("influence count {influences} does not match vertex count {vertices}")]
    InfluenceCountMismatch { influences: usize, vertices: usize },

    /// Sub-mesh range lies outside the model.
    #[error("sub-mesh {index} range exceeds the model")]
    SubMeshOutOfRange { index: usize },

    /// Text output failed.
    #[error("format error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// Binary output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// glTF JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<neox_common::Error> for MeshError {
    fn from(err: neox_common::Error) -> Self {
        match err {
            neox_common::Error::UnexpectedEof {
                offset,
                needed,
                available,
            } => Self::Truncated {
                offset,
                needed,
                available,
            },
            other => Self::Malformed(other.to_string()),
        }
    }
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
