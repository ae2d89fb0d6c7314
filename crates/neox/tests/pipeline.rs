//! Archive to mesh to export, end to end over in-memory archives.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use neox::mesh::{decode, MeshFormat};
use neox::npk::{cipher, CompressionMethod, EncryptionMethod};
use neox::prelude::*;

const MESH_MAGIC: [u8; 4] = [0x34, 0x80, 0xC8, 0xBB];

/// A skinned triangle: two bones, wide layout, one UV layer.
fn skinned_mesh() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MESH_MAGIC);
    out.extend_from_slice(&[2, 0, 0, 0]);
    out.extend_from_slice(&1u32.to_le_bytes());

    // bones: root, then child parented to it
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&0xFFFFu16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    for name in ["Bip01", "Bip01 Spine"] {
        let mut field = [0u8; 32];
        field[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&field);
    }
    out.push(0);
    for t in [[0.0f32, 0.0, 0.0], [0.0, 1.5, 0.0]] {
        let m = [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            t[0], t[1], t[2], 1.0,
        ];
        for value in m {
            out.extend_from_slice(&f32::to_le_bytes(value));
        }
    }
    out.push(0);

    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&1u16.to_le_bytes());

    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for value in p {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    for _ in 0..3 {
        for value in [0.0f32, 0.0, 1.0] {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out.extend_from_slice(&0u16.to_le_bytes());
    for index in [0u16, 1, 2] {
        out.extend_from_slice(&index.to_le_bytes());
    }
    for uv in [[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0]] {
        for value in uv {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    for joints in [[0u16, 0xFFFF, 0xFFFF, 0xFFFF], [1, 0, 0xFFFF, 0xFFFF], [1, 0xFFFF, 0xFFFF, 0xFFFF]] {
        for joint in joints {
            out.extend_from_slice(&joint.to_le_bytes());
        }
    }
    for weights in [[1.0f32, 0.0, 0.0, 0.0], [0.6, 0.4, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]] {
        for value in weights {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

struct Row {
    signature: u32,
    offset: u32,
    stored_len: u32,
    original_len: u32,
    crc: u32,
    compression: u16,
    encryption: u16,
}

/// Payloads first, index at the end, as the engine lays archives out.
fn build_archive(magic: &[u8; 4], payloads: &[(Vec<u8>, Row)], key: Option<&CipherKey>) -> Vec<u8> {
    let mut buffer = vec![0u8; 24];
    let mut rows = Vec::new();
    for (stored, row) in payloads {
        let offset = buffer.len() as u32;
        let mut data = stored.clone();
        if let Some(key) = key {
            cipher::xor_in_place(&mut data, key, 0);
        }
        buffer.extend_from_slice(&data);
        rows.push(Row {
            offset: if row.offset == u32::MAX { 0x7FFF_0000 } else { offset },
            ..*row
        });
    }

    let index_offset = buffer.len() as u32;
    let mut index = Vec::new();
    for row in &rows {
        for value in [row.signature, row.offset, row.stored_len, row.original_len, 0, row.crc] {
            index.extend_from_slice(&value.to_le_bytes());
        }
        index.extend_from_slice(&row.compression.to_le_bytes());
        index.extend_from_slice(&row.encryption.to_le_bytes());
    }
    if let Some(key) = key {
        cipher::xor_in_place(&mut index, key, 0);
    }
    buffer.extend_from_slice(&index);

    buffer[..4].copy_from_slice(magic);
    buffer[4..8].copy_from_slice(&(rows.len() as u32).to_le_bytes());
    buffer[20..24].copy_from_slice(&index_offset.to_le_bytes());
    buffer
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn sample_payloads() -> Vec<(Vec<u8>, Row)> {
    let mesh = skinned_mesh();
    let compressed = zlib(&mesh);
    let mesh_row = Row {
        signature: 0x1111_0001,
        offset: 0,
        stored_len: compressed.len() as u32,
        original_len: mesh.len() as u32,
        crc: neox::common::crc::hash_bytes(&mesh),
        compression: CompressionMethod::Zlib.tag(),
        encryption: 0,
    };

    let xml = b"<?xml version=\"1.0\"?><Material name=\"body\"/>".to_vec();
    let xml_crc = neox::common::crc::hash_bytes(&xml);
    let mut xml_stored = xml.clone();
    cipher::decrypt_entry(
        &mut xml_stored,
        EncryptionMethod::IncrementalXor,
        xml_crc,
        xml.len() as u32,
        None,
    )
    .unwrap();
    let xml_row = Row {
        signature: 0x1111_0002,
        offset: 0,
        stored_len: xml_stored.len() as u32,
        original_len: xml.len() as u32,
        crc: xml_crc,
        compression: CompressionMethod::Store.tag(),
        encryption: EncryptionMethod::IncrementalXor.tag(),
    };

    let broken_row = Row {
        signature: 0x1111_0003,
        offset: 0,
        stored_len: 8,
        original_len: 8,
        crc: 0,
        compression: 9,
        encryption: 0,
    };

    let outside_row = Row {
        signature: 0x1111_0004,
        offset: u32::MAX,
        stored_len: 16,
        original_len: 16,
        crc: 0,
        compression: 0,
        encryption: 0,
    };

    vec![
        (compressed, mesh_row),
        (xml_stored, xml_row),
        (b"garbage!".to_vec(), broken_row),
        (Vec::new(), outside_row),
    ]
}

#[test]
fn test_archive_to_mesh_exports() {
    let buffer = build_archive(b"NXPK", &sample_payloads(), None);
    let catalog = Catalog::open(&buffer).unwrap();

    assert_eq!(catalog.header().variant, ArchiveVariant::Legacy);
    assert_eq!(catalog.row_width(), RowWidth::Standard);
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.rejected().len(), 1);
    assert_eq!(catalog.rejected()[0].index, 3);

    let mesh_entry = catalog.find_signature(0x1111_0001).unwrap();
    let file = materialize(&buffer, mesh_entry, None).unwrap();
    assert!(file.valid);
    assert_eq!(file.extension, "mesh");
    assert_eq!(file.category, FileCategory::Mesh);

    let model = decode(&file.data).unwrap();
    assert!(model.is_skinned());
    assert_eq!(model.vertices.len(), 3);
    let skeleton = model.skeleton().unwrap();
    assert_eq!(skeleton.bones[1].name, "Bip01_Spine");
    assert_eq!(skeleton.bones[1].parent, Some(0));

    let options = ExportOptions::default();
    for format in MeshFormat::ALL {
        let bytes = encode(&model, format, &options).unwrap();
        assert!(!bytes.is_empty());
        let path = neox::output_path("res", mesh_entry, format.extension());
        assert_eq!(
            path,
            std::path::Path::new("res").join(format!("11110001.{}", format.extension()))
        );
    }

    let obj = String::from_utf8(encode(&model, MeshFormat::Obj, &options).unwrap()).unwrap();
    assert!(obj.contains("# Bone: Bip01_Spine, Parent: 0"));
}

#[test]
fn test_one_bad_entry_does_not_hide_the_rest() {
    let buffer = build_archive(b"NXPK", &sample_payloads(), None);
    let catalog = Catalog::open(&buffer).unwrap();

    let results: Vec<_> = catalog
        .iter()
        .map(|entry| materialize(&buffer, entry, None))
        .collect();
    assert!(results[0].is_ok());
    assert!(matches!(
        results[2],
        Err(DecodeError::Codec(neox::npk::CodecError::Unsupported(9)))
    ));

    let xml = results[1].as_ref().unwrap();
    assert!(xml.valid);
    assert!(xml.is_text);
    assert_eq!(xml.category, FileCategory::Xml);
}

#[test]
fn test_sealed_archive_needs_key() {
    let key = CipherKey::from_seed(0x30);
    let buffer = build_archive(b"EXPK", &sample_payloads(), Some(&key));

    assert!(matches!(
        Catalog::open(&buffer),
        Err(FormatError::MissingArchiveKey)
    ));

    let catalog = Catalog::open_with(&buffer, Some(&key), OpenOptions::default()).unwrap();
    assert_eq!(catalog.header().variant, ArchiveVariant::Extended);
    assert_eq!(catalog.len(), 3);

    let entry = catalog.find_signature(0x1111_0001).unwrap();
    assert!(matches!(
        materialize(&buffer, entry, None),
        Err(DecodeError::MissingKey)
    ));
    let file = materialize(&buffer, entry, Some(&key)).unwrap();
    assert!(file.valid);
    assert!(decode(&file.data).is_ok());
}
