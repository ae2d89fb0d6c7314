//! NPK container header.

use neox_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{FormatError, Result};

/// On-disk NPK header, 24 bytes, little-endian.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawHeader {
    /// Container signature (`NXPK` or `EXPK`)
    pub magic: [u8; 4],
    /// Number of index rows
    pub entry_count: u32,
    /// Unused by the reader
    pub reserved: u32,
    /// Encrypt mode; `256` moves the name table 16 bytes past the index
    pub encrypt_mode: u32,
    /// Hash mode; `2` adds a name table, `3` RC4-encrypts the index
    pub hash_mode: u32,
    /// Absolute offset of the index table
    pub index_offset: u32,
}

impl RawHeader {
    /// Legacy container signature.
    pub const MAGIC_LEGACY: [u8; 4] = *b"NXPK";

    /// Extended (container-encrypted) signature.
    pub const MAGIC_EXTENDED: [u8; 4] = *b"EXPK";

    /// Header size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Container variant, decided by the signature alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveVariant {
    /// `NXPK`: index and payloads are stored as-is.
    Legacy,
    /// `EXPK`: index and payloads are wrapped in the keyed XOR stream.
    Extended,
}

impl ArchiveVariant {
    /// Map a signature to its variant.
    pub fn from_magic(magic: [u8; 4]) -> Option<Self> {
        match magic {
            RawHeader::MAGIC_LEGACY => Some(Self::Legacy),
            RawHeader::MAGIC_EXTENDED => Some(Self::Extended),
            _ => None,
        }
    }

    /// Whether payloads carry the container cipher layer.
    #[inline]
    pub fn is_sealed(self) -> bool {
        matches!(self, Self::Extended)
    }
}

impl std::fmt::Display for ArchiveVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => f.write_str("NXPK"),
            Self::Extended => f.write_str("EXPK"),
        }
    }
}

/// Parsed archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub variant: ArchiveVariant,
    pub entry_count: u32,
    pub encrypt_mode: u32,
    pub hash_mode: u32,
    pub index_offset: u32,
}

impl ArchiveHeader {
    /// Encrypt mode that places the name table after a 16-byte gap.
    pub const ENCRYPT_MODE_NAMED: u32 = 256;

    /// Hash mode with a name table directly after the index.
    pub const HASH_MODE_NAMED: u32 = 2;

    /// Hash mode with an RC4-encrypted index.
    pub const HASH_MODE_RC4_INDEX: u32 = 3;

    /// Parse the header at the start of `buffer`.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < RawHeader::SIZE {
            return Err(FormatError::TruncatedHeader {
                needed: RawHeader::SIZE,
                len: buffer.len(),
            });
        }

        let raw: RawHeader = BinaryReader::new(buffer).read_struct()?;
        let variant =
            ArchiveVariant::from_magic(raw.magic).ok_or(FormatError::BadSignature(raw.magic))?;

        Ok(Self {
            variant,
            entry_count: raw.entry_count,
            encrypt_mode: raw.encrypt_mode,
            hash_mode: raw.hash_mode,
            index_offset: raw.index_offset,
        })
    }

    /// Whether a null-separated name table follows the index.
    #[inline]
    pub fn has_name_table(&self) -> bool {
        self.encrypt_mode == Self::ENCRYPT_MODE_NAMED || self.hash_mode == Self::HASH_MODE_NAMED
    }

    /// Gap between the end of the index and the start of the name table.
    #[inline]
    pub fn name_table_gap(&self) -> usize {
        if self.encrypt_mode == Self::ENCRYPT_MODE_NAMED {
            16
        } else {
            0
        }
    }

    /// Whether the index block is RC4-encrypted.
    #[inline]
    pub fn has_rc4_index(&self) -> bool {
        self.hash_mode == Self::HASH_MODE_RC4_INDEX
    }
}
