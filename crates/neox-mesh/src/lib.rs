//! NeoX engine mesh decoding and export.
//!
//! # Example
//!
//! ```no_run
//! use neox_mesh::{decode, encode, ExportOptions, MeshFormat};
//!
//! let data = std::fs::read("character.mesh").unwrap();
//! let model = decode(&data).unwrap();
//! println!("{} vertices, skinned: {}", model.vertices.len(), model.is_skinned());
//!
//! let obj = encode(&model, MeshFormat::Obj, &ExportOptions::default()).unwrap();
//! std::fs::write("character.obj", obj).unwrap();
//! ```

mod error;

pub mod decode;
pub mod export;
pub mod math;
pub mod model;

pub use decode::{decode, is_mesh, BoneLayout, MeshDecoder, MESH_MAGIC};
pub use error::{MeshError, Result};
pub use export::{encode, ExportOptions, MeshFormat, UnknownFormat};
pub use math::Mat4;
pub use model::{
    Bone, DepthFirst, Influences, MeshModel, Rigging, Skeleton, SubMesh, Vertex, MAX_INFLUENCES,
};
