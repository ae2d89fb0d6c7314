//! Decoding entry payloads.

use neox_common::crc;
use tracing::{debug, trace, warn};

use crate::cipher::{self, CipherKey};
use crate::decompress::decompress;
use crate::detect::{self, FileCategory};
use crate::{DecodeError, EntryDescriptor, UnwrapError, Wrapping};

/// A decoded entry.
///
/// Produced fresh by every [`materialize`] call; nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedEntry {
    /// Decoded payload
    pub data: Vec<u8>,
    /// Inferred extension without the dot
    pub extension: &'static str,
    pub category: FileCategory,
    /// Whether the payload looks like UTF-8 text
    pub is_text: bool,
    /// Outermost script wrapper found on the decoded payload
    pub wrapping: Option<Wrapping>,
    /// True when every wrapper was removed from `data`
    pub unwrapped: bool,
    /// False when the stored CRC disagrees with the decoded bytes
    pub valid: bool,
}

/// Decode one entry from the archive buffer.
///
/// Steps: bounds-check the stored range, remove the container layer of sealed
/// entries, remove the entry cipher, decompress to the recorded length, verify
/// the CRC when one is stored, strip ROTOR and NXS3 script wrappers, then
/// infer the file type.
///
/// A CRC mismatch never fails the call; it clears [`MaterializedEntry::valid`].
/// A wrapper that cannot be removed is logged and the payload is returned with
/// it still in place.
pub fn materialize(
    buffer: &[u8],
    entry: &EntryDescriptor,
    key: Option<&CipherKey>,
) -> Result<MaterializedEntry, DecodeError> {
    let start = entry.offset as usize;
    let stored = buffer
        .get(start..)
        .and_then(|tail| tail.get(..entry.stored_len as usize))
        .ok_or(DecodeError::OutOfBounds {
            offset: entry.offset,
            len: entry.stored_len,
            buffer_len: buffer.len(),
        })?;

    let mut payload = stored.to_vec();

    if entry.sealed {
        let key = key.ok_or(DecodeError::MissingKey)?;
        cipher::xor_in_place(&mut payload, key, 0);
    }

    cipher::decrypt_entry(
        &mut payload,
        entry.encryption,
        entry.crc,
        entry.original_len,
        key,
    )?;

    let data = if entry.is_compressed() {
        decompress(entry.compression, &payload, entry.original_len as usize)?
    } else {
        payload
    };

    if data.len() != entry.original_len as usize {
        return Err(DecodeError::SizeMismatch {
            expected: entry.original_len,
            actual: data.len(),
        });
    }

    let valid = entry.crc == 0 || {
        let actual = crc::hash_bytes(&data);
        if actual != entry.crc {
            warn!(
                entry = %entry.display_name(),
                expected = entry.crc,
                actual,
                "CRC mismatch"
            );
            false
        } else {
            true
        }
    };

    let wrapping = Wrapping::detect(&data);
    let (data, unwrapped) = match wrapping {
        Some(outer) => unwrap_layers(data, outer, entry),
        None => (data, false),
    };
    let (extension, is_text) = detect::detect(&data);

    trace!(
        entry = %entry.display_name(),
        extension,
        len = data.len(),
        valid,
        "materialized entry"
    );

    Ok(MaterializedEntry {
        data,
        extension,
        category: FileCategory::from_extension(extension),
        is_text,
        wrapping,
        unwrapped,
        valid,
    })
}

/// At most a ROTOR layer and the NXS3 layer it may expose.
const MAX_WRAPPER_DEPTH: usize = 2;

/// Remove wrappers starting from `outer`. Returns the innermost payload that
/// could be reached and whether no wrapper remains on it.
fn unwrap_layers(
    mut data: Vec<u8>,
    outer: Wrapping,
    entry: &EntryDescriptor,
) -> (Vec<u8>, bool) {
    let mut current = Some(outer);
    for _ in 0..MAX_WRAPPER_DEPTH {
        let Some(wrapping) = current else {
            return (data, true);
        };
        match wrapping.unpack(&data) {
            Ok(inner) => {
                trace!(
                    entry = %entry.display_name(),
                    wrapping = wrapping.name(),
                    len = inner.len(),
                    "removed wrapper"
                );
                data = inner;
                current = Wrapping::detect(&data);
            }
            Err(UnwrapError::Unsupported(_)) => {
                debug!(
                    entry = %entry.display_name(),
                    wrapping = wrapping.name(),
                    "wrapper kept"
                );
                return (data, false);
            }
            Err(err) => {
                warn!(
                    entry = %entry.display_name(),
                    wrapping = wrapping.name(),
                    %err,
                    "failed to unwrap"
                );
                return (data, false);
            }
        }
    }
    let unwrapped = current.is_none();
    (data, unwrapped)
}
