//! NeoX - asset extraction library for NetEase NeoX engine games.
//!
//! This crate provides a unified interface to the NeoX library crates.
//!
//! # Crates
//!
//! - [`neox_common`] - Common utilities (binary reading, CRC-32, byte search)
//! - [`neox_npk`] - NPK/EXPK archive reading (index, XOR ciphers, zlib/LZ4/Zstd)
//! - [`neox_mesh`] - `.mesh` decoding and export to OBJ, SMD, ASCII, PMX, IQE and glTF
//!
//! # Example
//!
//! ```no_run
//! use neox::prelude::*;
//!
//! let buffer = std::fs::read("res.npk")?;
//! let catalog = Catalog::open(&buffer)?;
//!
//! for entry in catalog.iter() {
//!     let file = materialize(&buffer, entry, None)?;
//!     if file.category == FileCategory::Mesh {
//!         let model = neox::mesh::decode(&file.data)?;
//!         let obj = encode(&model, MeshFormat::Obj, &ExportOptions::default())?;
//!         let path = neox::output_path("res", entry, MeshFormat::Obj.extension());
//!         std::fs::create_dir_all(path.parent().unwrap())?;
//!         std::fs::write(path, obj)?;
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::{Component, Path, PathBuf};

pub use neox_common as common;
pub use neox_mesh as mesh;
pub use neox_npk as npk;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use neox_common::{crc, BinaryReader};
    pub use neox_mesh::{
        encode, BoneLayout, ExportOptions, MeshDecoder, MeshError, MeshFormat, MeshModel, Rigging,
    };
    pub use neox_npk::{
        materialize, ArchiveVariant, Catalog, CipherKey, DecodeError, EntryDescriptor,
        FileCategory, FormatError, MaterializedEntry, OpenOptions, RowWidth,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Relative output path for an extracted entry.
///
/// Entries land in a directory named after the archive. Entries with a name
/// from the archive's name table keep it (directories included); others are
/// named by their hex signature. `extension` is appended unless the
/// name already has one. Absolute paths and `..` components in stored names
/// are dropped so every result stays inside the archive directory.
pub fn output_path(archive_name: &str, entry: &neox_npk::EntryDescriptor, extension: &str) -> PathBuf {
    let mut path = PathBuf::from(archive_name);

    match entry.name.as_deref().map(sanitize).filter(|p| p.components().next().is_some()) {
        Some(relative) => {
            let has_extension = relative.extension().is_some();
            path.push(relative);
            if !has_extension && !extension.is_empty() {
                path.set_extension(extension);
            }
        }
        None => {
            path.push(format!("{:08x}", entry.signature));
            if !extension.is_empty() {
                path.set_extension(extension);
            }
        }
    }
    path
}

/// Normalise separators and keep only plain components.
fn sanitize(name: &str) -> PathBuf {
    let unified = name.replace('\\', "/");
    Path::new(&unified)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}
