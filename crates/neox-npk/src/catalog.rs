//! Archive index parsing.

use std::borrow::Cow;

use neox_common::{search, BinaryReader};
use tracing::{debug, warn};

use crate::cipher::{self, CipherKey};
use crate::materialize::{materialize, MaterializedEntry};
use crate::{ArchiveHeader, DecodeError, EntryDescriptor, FormatError, Result, RowWidth};

/// Options controlling how an archive index is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Force the index row width instead of inferring it.
    pub row_width: Option<RowWidth>,
}

/// An index row that was dropped because it points outside the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Row number in the index
    pub index: usize,
    pub offset: u32,
    pub stored_len: u32,
}

/// Parsed archive metadata.
///
/// A catalog holds the header and one descriptor per usable index row. It
/// never holds the archive bytes or the key; both are passed to each
/// [`Catalog::materialize`] call.
#[derive(Debug, Clone)]
pub struct Catalog {
    header: ArchiveHeader,
    row_width: RowWidth,
    entries: Vec<EntryDescriptor>,
    rejected: Vec<RejectedRow>,
}

impl Catalog {
    /// Open an unencrypted-index archive with default options.
    pub fn open(buffer: &[u8]) -> Result<Self> {
        Self::open_with(buffer, None, OpenOptions::default())
    }

    /// Open an archive, using `key` for the container layer of `EXPK` archives.
    pub fn open_with(buffer: &[u8], key: Option<&CipherKey>, options: OpenOptions) -> Result<Self> {
        let header = ArchiveHeader::parse(buffer)?;
        let row_width = options
            .row_width
            .unwrap_or_else(|| infer_row_width(&header, buffer.len()));

        debug!(
            variant = %header.variant,
            entries = header.entry_count,
            index_offset = header.index_offset,
            row_width = row_width.size(),
            encrypt_mode = header.encrypt_mode,
            hash_mode = header.hash_mode,
            "parsed NPK header"
        );

        let index_start = header.index_offset as u64;
        let index_len = header.entry_count as u64 * row_width.size() as u64;
        let index_end = index_start + index_len;
        if index_end > buffer.len() as u64 {
            return Err(FormatError::TruncatedIndex {
                offset: index_start,
                count: header.entry_count,
                row_width: row_width.size(),
                len: buffer.len(),
            });
        }
        let index_range = index_start as usize..index_end as usize;

        let index = decode_index(&buffer[index_range.clone()], &header, key)?;

        let sealed = header.variant.is_sealed();
        let mut reader = BinaryReader::new(&index);
        let mut entries = Vec::with_capacity(header.entry_count as usize);
        let mut rejected = Vec::new();

        for i in 0..header.entry_count as usize {
            let entry = EntryDescriptor::read_row(&mut reader, i, row_width, sealed)?;
            if entry.end() > buffer.len() as u64 {
                warn!(
                    index = i,
                    offset = entry.offset,
                    stored_len = entry.stored_len,
                    buffer_len = buffer.len(),
                    "index row points outside the archive, skipping"
                );
                rejected.push(RejectedRow {
                    index: i,
                    offset: entry.offset,
                    stored_len: entry.stored_len,
                });
                continue;
            }
            entries.push(entry);
        }

        if header.has_name_table() {
            let names_start = index_range.end.saturating_add(header.name_table_gap());
            let names = buffer.get(names_start..).unwrap_or_default();
            assign_names(&mut entries, names);
        }

        debug!(
            entries = entries.len(),
            rejected = rejected.len(),
            "NPK index loaded"
        );

        Ok(Self {
            header,
            row_width,
            entries,
            rejected,
        })
    }

    /// Archive header.
    #[inline]
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Row width used to read the index.
    #[inline]
    pub fn row_width(&self) -> RowWidth {
        self.row_width
    }

    /// Number of usable entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no usable entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over usable entries in index order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, EntryDescriptor> {
        self.entries.iter()
    }

    /// All usable entries.
    #[inline]
    pub fn entries(&self) -> &[EntryDescriptor] {
        &self.entries
    }

    /// Rows dropped because they point outside the buffer.
    #[inline]
    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    /// Get an entry by position in the catalog.
    #[inline]
    pub fn get(&self, position: usize) -> Option<&EntryDescriptor> {
        self.entries.get(position)
    }

    /// Find an entry by name-table name (case-insensitive, either separator).
    pub fn find(&self, name: &str) -> Option<&EntryDescriptor> {
        let wanted = normalize_name(name);
        self.entries.iter().find(|e| {
            e.name
                .as_deref()
                .is_some_and(|n| normalize_name(n).eq_ignore_ascii_case(&wanted))
        })
    }

    /// Find an entry by signature.
    pub fn find_signature(&self, signature: u64) -> Option<&EntryDescriptor> {
        self.entries.iter().find(|e| e.signature == signature)
    }

    /// Decode the entry at `position`.
    ///
    /// Returns `None` when the position is past the end of the catalog.
    pub fn materialize(
        &self,
        buffer: &[u8],
        position: usize,
        key: Option<&CipherKey>,
    ) -> Option<std::result::Result<MaterializedEntry, DecodeError>> {
        self.entries
            .get(position)
            .map(|entry| materialize(buffer, entry, key))
    }
}

/// Pick the row width for archives that do not force it.
///
/// Archives with a name table always use 28-byte rows. Otherwise 32-byte rows
/// are assumed when the bytes after the index offset divide into exactly 32
/// per entry.
fn infer_row_width(header: &ArchiveHeader, buffer_len: usize) -> RowWidth {
    if header.has_name_table() || header.entry_count == 0 {
        return RowWidth::Standard;
    }

    let available = (buffer_len as u64).saturating_sub(header.index_offset as u64);
    if available / header.entry_count as u64 == RowWidth::Wide.size() as u64 {
        RowWidth::Wide
    } else {
        RowWidth::Standard
    }
}

/// Strip the container and index cipher layers from the index block.
fn decode_index<'a>(
    raw: &'a [u8],
    header: &ArchiveHeader,
    key: Option<&CipherKey>,
) -> Result<Cow<'a, [u8]>> {
    let mut index = Cow::Borrowed(raw);

    if header.variant.is_sealed() {
        let key = key.ok_or(FormatError::MissingArchiveKey)?;
        cipher::xor_in_place(index.to_mut(), key, 0);
    }

    if header.has_rc4_index() {
        cipher::decrypt_index(index.to_mut())?;
    }

    Ok(index)
}

fn assign_names(entries: &mut [EntryDescriptor], table: &[u8]) {
    // Names follow row order, including rows that were rejected.
    let names: Vec<&[u8]> = search::split_nul(table).collect();
    for entry in entries.iter_mut() {
        if let Some(name) = names.get(entry.index) {
            entry.name = Some(String::from_utf8_lossy(name).into_owned());
        }
    }
}

fn normalize_name(name: &str) -> Cow<'_, str> {
    if name.contains('\\') {
        Cow::Owned(name.replace('\\', "/"))
    } else {
        Cow::Borrowed(name)
    }
}
