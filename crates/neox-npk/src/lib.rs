//! NPK archive reader for NeoX engine game files.
//!
//! NPK is the container format used by NetEase's NeoX engine to package game
//! assets. An archive is a 24-byte header, an index of fixed-size rows, and the
//! entry payloads they point at. Two container variants exist:
//!
//! - `NXPK` - plain index, per-entry encryption and compression
//! - `EXPK` - index and payloads additionally wrapped in a keyed XOR stream
//!
//! Entry payloads may be compressed with zlib, LZ4 or Zstandard and encrypted
//! with one of three XOR schemes. Opening an archive only parses metadata;
//! payloads are decoded on demand by [`materialize`], which also strips the
//! ROTOR and NXS3 script wrappers found inside decoded payloads.
//!
//! # Example
//!
//! ```no_run
//! use neox_npk::{Catalog, CipherKey};
//!
//! let buffer = std::fs::read("res.npk")?;
//! let key = CipherKey::from_seed(0x96);
//! let catalog = Catalog::open(&buffer)?;
//!
//! for entry in catalog.iter() {
//!     let file = neox_npk::materialize(&buffer, entry, Some(&key))?;
//!     println!("{}.{} ({} bytes)", entry.display_name(), file.extension, file.data.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod catalog;
mod entry;
mod error;
mod header;
mod materialize;
mod wrapper;

pub mod cipher;
pub mod decompress;
pub mod detect;

pub use catalog::{Catalog, OpenOptions, RejectedRow};
pub use cipher::{CipherKey, KeyError};
pub use detect::FileCategory;
pub use entry::{CompressionMethod, EncryptionMethod, EntryDescriptor, RowWidth};
pub use error::{CodecError, DecodeError, FormatError, Result, UnwrapError};
pub use header::{ArchiveHeader, ArchiveVariant, RawHeader};
pub use materialize::{materialize, MaterializedEntry};
pub use wrapper::{nxs3_stream, rotor_key, Rotor, Wrapping};
