//! Decoder for the NeoX `.mesh` binary format.
//!
//! Two layouts exist in the wild. They differ only in the width of bone
//! indices: the wide layout stores parent and joint indices as `u16`
//! (root sentinel `0xFFFF`), the narrow layout as `u8` (root sentinel `0xFF`).
//! Nothing in the header says which one a file uses, so [`MeshDecoder`]
//! tries the wide layout first and falls back to the narrow one.

use neox_common::BinaryReader;
use tracing::{debug, trace};

use crate::math::Mat4;
use crate::model::{Bone, Influences, MeshModel, Rigging, Skeleton, SubMesh, Vertex, MAX_INFLUENCES};
use crate::{MeshError, Result};

/// Magic bytes at the start of every mesh.
pub const MESH_MAGIC: [u8; 4] = [0x34, 0x80, 0xC8, 0xBB];

/// Largest vertex count accepted.
pub const MAX_VERTICES: usize = 500_000;
/// Largest triangle count accepted.
pub const MAX_FACES: usize = 250_000;
/// Largest bone count accepted.
pub const MAX_BONES: usize = 2_000;

const BONE_NAME_LEN: usize = 32;
const BONE_EXTRA_LEN: usize = 28;
const DUMMY_ROOT: &str = "dummy_root";

/// Width of bone indices in the bone and skinning blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoneLayout {
    /// `u16` indices
    Wide,
    /// `u8` indices
    Narrow,
}

impl BoneLayout {
    /// Size of one index in bytes.
    pub const fn index_size(self) -> usize {
        match self {
            Self::Wide => 2,
            Self::Narrow => 1,
        }
    }

    /// All-ones value marking a root parent or an empty joint slot.
    pub const fn sentinel(self) -> u16 {
        match self {
            Self::Wide => 0xFFFF,
            Self::Narrow => 0xFF,
        }
    }

    fn read_index(self, reader: &mut BinaryReader<'_>) -> Result<u16> {
        Ok(match self {
            Self::Wide => reader.read_u16()?,
            Self::Narrow => u16::from(reader.read_u8()?),
        })
    }
}

/// Mesh decoder with optional layout pinning.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshDecoder {
    layout: Option<BoneLayout>,
}

impl MeshDecoder {
    /// Decoder that tries both layouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder restricted to one layout.
    pub fn with_layout(layout: BoneLayout) -> Self {
        Self {
            layout: Some(layout),
        }
    }

    pub fn layout(&self) -> Option<BoneLayout> {
        self.layout
    }

    /// Decode a mesh payload.
    ///
    /// Without a pinned layout the wide layout is tried first; if it fails the
    /// narrow layout is tried, and if that fails too the wide layout's error
    /// is returned.
    pub fn decode(&self, data: &[u8]) -> Result<MeshModel> {
        if let Some(layout) = self.layout {
            return decode_with(data, layout);
        }

        match decode_with(data, BoneLayout::Wide) {
            Ok(model) => Ok(model),
            Err(err @ MeshError::BadMagic(_)) => Err(err),
            Err(first) => match decode_with(data, BoneLayout::Narrow) {
                Ok(model) => {
                    debug!(error = %first, "wide layout failed, decoded as narrow");
                    Ok(model)
                }
                Err(_) => Err(first),
            },
        }
    }
}

/// Decode a mesh payload with layout detection.
pub fn decode(data: &[u8]) -> Result<MeshModel> {
    MeshDecoder::new().decode(data)
}

/// Returns true if `data` starts with the mesh magic.
pub fn is_mesh(data: &[u8]) -> bool {
    data.starts_with(&MESH_MAGIC)
}

fn check_limit(what: &'static str, count: usize, limit: usize) -> Result<()> {
    if count > limit {
        return Err(MeshError::LimitExceeded { what, count, limit });
    }
    Ok(())
}

/// `count * size`, failing as truncation when it overflows.
fn block_len(reader: &BinaryReader<'_>, count: usize, size: usize) -> Result<usize> {
    count.checked_mul(size).ok_or(MeshError::Truncated {
        offset: reader.position(),
        needed: usize::MAX,
        available: reader.remaining(),
    })
}

/// Bone block as stored, before skinning data is known.
struct RawSkeleton {
    skeleton: Skeleton,
    /// Bone count declared in the file, excluding any added root
    file_bones: usize,
}

fn decode_with(data: &[u8], layout: BoneLayout) -> Result<MeshModel> {
    let mut reader = BinaryReader::new(data);

    let magic = reader.read_bytes(4)?;
    if magic != MESH_MAGIC {
        let mut actual = [0u8; 4];
        actual.copy_from_slice(magic);
        return Err(MeshError::BadMagic(actual));
    }
    let version = reader.read_u8()?;
    reader.skip(3)?;

    let bone_mode = reader.read_u32()?;
    if bone_mode > 1 {
        let count = reader.read_u8()? as usize;
        reader.skip(2)?;
        reader.skip(count * 4)?;
    }

    if bone_mode == 0 {
        // Static meshes are stored with or without the separator byte that
        // closes a bone block; the separated form is tried first.
        if reader.peek_bytes(1)?[0] == 0 {
            let mut separated = reader.clone();
            separated.skip(1)?;
            if let Ok(model) = read_geometry(&mut separated, version, None, layout) {
                return Ok(model);
            }
        }
        return read_geometry(&mut reader, version, None, layout);
    }

    let raw_skeleton = read_skeleton(&mut reader, layout)?;
    read_geometry(&mut reader, version, Some(raw_skeleton), layout)
}

/// Sub-mesh table, vertex and face blocks, UVs and skinning data.
fn read_geometry(
    reader: &mut BinaryReader<'_>,
    version: u8,
    raw_skeleton: Option<RawSkeleton>,
    layout: BoneLayout,
) -> Result<MeshModel> {
    let _lod_offset = reader.read_u32()?;

    let mut table = Vec::new();
    while reader.peek_u16()? != 1 {
        let vertex_count = reader.read_u32()? as usize;
        let face_count = reader.read_u32()? as usize;
        let uv_layers = reader.read_u8()?;
        let color_channels = reader.read_u8()?;
        table.push((vertex_count, face_count, uv_layers, color_channels));
        check_limit("submesh", table.len(), MAX_VERTICES)?;
    }
    reader.skip(2)?;

    let vertex_count = reader.read_u32()? as usize;
    let face_count = reader.read_u32()? as usize;
    check_limit("vertex", vertex_count, MAX_VERTICES)?;
    check_limit("face", face_count, MAX_FACES)?;
    check_limit("submesh", table.len(), vertex_count.max(1))?;

    reader.ensure(vertex_count * 24)?;
    let mut positions = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        positions.push(reader.read_f32s::<3>()?);
    }
    let mut normals = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        normals.push(reader.read_f32s::<3>()?);
    }

    if reader.read_u16()? != 0 {
        reader.skip(vertex_count * 12)?;
    }

    reader.ensure(face_count * 6)?;
    let mut triangles = Vec::with_capacity(face_count);
    for triangle in 0..face_count {
        let face = [
            u32::from(reader.read_u16()?),
            u32::from(reader.read_u16()?),
            u32::from(reader.read_u16()?),
        ];
        if let Some(&index) = face.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::FaceIndexOutOfRange {
                triangle,
                index,
                vertex_count,
            });
        }
        triangles.push(face);
    }

    let has_uvs = table.iter().any(|&(_, _, uv_layers, _)| uv_layers > 0);
    let mut uvs: Vec<[f32; 2]> = Vec::with_capacity(vertex_count);
    for &(count, _, uv_layers, _) in &table {
        if uv_layers > 0 {
            let layer_len = block_len(reader, count, 8)?;
            reader.ensure(layer_len)?;
            for _ in 0..count {
                uvs.push(reader.read_f32s::<2>()?);
            }
            let extra = block_len(reader, layer_len, usize::from(uv_layers) - 1)?;
            reader.skip(extra)?;
        } else {
            let missing = vertex_count.saturating_sub(uvs.len());
            uvs.extend(std::iter::repeat([0.0, 0.0]).take(count.min(missing)));
        }
    }
    uvs.resize(vertex_count, [0.0, 0.0]);

    for &(count, _, _, color_channels) in &table {
        let colors = block_len(reader, count, 4 * usize::from(color_channels))?;
        reader.skip(colors)?;
    }

    let rigging = match raw_skeleton {
        None => Rigging::Static,
        Some(raw) => {
            let influences = read_influences(reader, layout, vertex_count, raw.file_bones)?;
            Rigging::Skinned {
                skeleton: raw.skeleton,
                influences,
            }
        }
    };

    let vertices = positions
        .into_iter()
        .zip(normals)
        .zip(uvs)
        .map(|((position, normal), uv)| Vertex {
            position,
            normal,
            uv: has_uvs.then_some(uv),
        })
        .collect();

    let submeshes = build_submeshes(&table, vertex_count, face_count);

    trace!(
        ?layout,
        version,
        vertices = vertex_count,
        faces = face_count,
        submeshes = submeshes.len(),
        skinned = !matches!(rigging, Rigging::Static),
        "decoded mesh"
    );

    Ok(MeshModel {
        version,
        vertices,
        triangles,
        submeshes,
        rigging,
    })
}

fn read_skeleton(reader: &mut BinaryReader<'_>, layout: BoneLayout) -> Result<RawSkeleton> {
    let count = reader.read_u16()? as usize;
    check_limit("bone", count, MAX_BONES)?;

    reader.ensure(count * layout.index_size())?;
    let mut parents = Vec::with_capacity(count);
    for bone in 0..count {
        let raw = layout.read_index(reader)?;
        if raw == layout.sentinel() {
            parents.push(None);
        } else if (raw as usize) < count {
            parents.push(Some(raw as usize));
        } else {
            return Err(MeshError::InvalidParent {
                bone,
                parent: raw as usize,
            });
        }
    }

    reader.ensure(count * BONE_NAME_LEN)?;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(reader.read_fixed_str(BONE_NAME_LEN)?.replace(' ', "_"));
    }

    if reader.read_u8()? != 0 {
        reader.skip(count * BONE_EXTRA_LEN)?;
    }

    reader.ensure(count * 64)?;
    let mut bones = Vec::with_capacity(count + 1);
    for (name, parent) in names.into_iter().zip(parents) {
        let transform = Mat4::from_rows(reader.read_f32s::<16>()?);
        bones.push(Bone::new(name, parent, transform));
    }

    let separator = reader.read_u8()?;
    if separator != 0 {
        return Err(MeshError::Malformed(format!(
            "bone block separator is {separator:#04x}"
        )));
    }

    let mut skeleton = Skeleton::new(bones);
    let roots: Vec<usize> = skeleton.roots().collect();
    if roots.len() > 1 {
        let dummy = skeleton.len();
        for root in roots {
            skeleton.bones[root].parent = Some(dummy);
        }
        skeleton
            .bones
            .push(Bone::new(DUMMY_ROOT, None, Mat4::IDENTITY));
    }
    skeleton.validate()?;

    Ok(RawSkeleton {
        skeleton,
        file_bones: count,
    })
}

fn read_influences(
    reader: &mut BinaryReader<'_>,
    layout: BoneLayout,
    vertex_count: usize,
    file_bones: usize,
) -> Result<Vec<Influences>> {
    reader.ensure(vertex_count * MAX_INFLUENCES * (layout.index_size() + 4))?;

    let mut joints = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let mut slots = [0u16; MAX_INFLUENCES];
        for slot in &mut slots {
            *slot = layout.read_index(reader)?;
        }
        joints.push(slots);
    }

    let mut influences = Vec::with_capacity(vertex_count);
    for (vertex, raw) in joints.into_iter().enumerate() {
        let weights = reader.read_f32s::<MAX_INFLUENCES>()?;
        let mut slots = [(None, 0.0f32); MAX_INFLUENCES];
        for (slot, (&bone, &weight)) in slots.iter_mut().zip(raw.iter().zip(weights.iter())) {
            let unused =
                weight == 0.0 || (bone == layout.sentinel() && bone as usize >= file_bones);
            if unused {
                continue;
            }
            if bone as usize >= file_bones {
                return Err(MeshError::BoneIndexOutOfRange {
                    vertex,
                    bone,
                    bone_count: file_bones,
                });
            }
            *slot = (Some(bone), weight);
        }
        influences.push(Influences::new(slots));
    }
    Ok(influences)
}

/// Turn the sub-mesh table into ranges, or one whole-mesh range when the
/// table is empty or does not add up to the declared totals.
fn build_submeshes(
    table: &[(usize, usize, u8, u8)],
    vertex_count: usize,
    face_count: usize,
) -> Vec<SubMesh> {
    let vertex_sum: usize = table.iter().map(|entry| entry.0).sum();
    let face_sum: usize = table.iter().map(|entry| entry.1).sum();

    if table.is_empty() || vertex_sum != vertex_count || face_sum != face_count {
        if !table.is_empty() {
            debug!(
                vertex_sum,
                vertex_count, face_sum, face_count, "sub-mesh table does not match totals"
            );
        }
        let uv_layers = table.iter().map(|entry| entry.2).max().unwrap_or(0);
        return vec![SubMesh {
            vertex_start: 0,
            vertex_count,
            face_start: 0,
            face_count,
            uv_layers,
            color_channels: 0,
        }];
    }

    let mut vertex_start = 0;
    let mut face_start = 0;
    table
        .iter()
        .map(|&(vertex_count, face_count, uv_layers, color_channels)| {
            let submesh = SubMesh {
                vertex_start,
                vertex_count,
                face_start,
                face_count,
                uv_layers,
                color_channels,
            };
            vertex_start += vertex_count;
            face_start += face_count;
            submesh
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds mesh payloads for tests.
    pub(crate) struct MeshBuilder {
        pub layout: BoneLayout,
        pub positions: Vec<[f32; 3]>,
        pub faces: Vec<[u16; 3]>,
        /// (vertex count, face count, uv layers, color channels)
        pub table: Vec<(u32, u32, u8, u8)>,
        pub uvs: Vec<[f32; 2]>,
        /// (name, parent, translation)
        pub bones: Vec<(&'static str, Option<u16>, [f32; 3])>,
        pub joints: Vec<[u16; 4]>,
        pub weights: Vec<[f32; 4]>,
        pub skinned: bool,
    }

    impl MeshBuilder {
        pub fn triangle() -> Self {
            Self {
                layout: BoneLayout::Wide,
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                faces: vec![[0, 1, 2]],
                table: vec![(3, 1, 1, 0)],
                uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
                bones: Vec::new(),
                joints: Vec::new(),
                weights: Vec::new(),
                skinned: false,
            }
        }

        pub fn skinned_triangle(layout: BoneLayout) -> Self {
            let mut builder = Self::triangle();
            builder.layout = layout;
            builder.skinned = true;
            builder.bones = vec![
                ("root", None, [0.0, 0.0, 0.0]),
                ("spine", Some(0), [0.0, 1.0, 0.0]),
                ("head", Some(0), [0.0, 2.0, 0.0]),
            ];
            let empty = layout.sentinel();
            builder.joints = vec![[0, empty, empty, empty], [1, 2, empty, empty], [2, empty, empty, empty]];
            builder.weights = vec![
                [1.0, 0.0, 0.0, 0.0],
                [0.5, 0.5, 0.0, 0.0],
                [1.0, 0.0, 0.0, 0.0],
            ];
            builder
        }

        fn index(&self, out: &mut Vec<u8>, value: u16) {
            match self.layout {
                BoneLayout::Wide => out.extend_from_slice(&value.to_le_bytes()),
                BoneLayout::Narrow => out.push(value as u8),
            }
        }

        pub fn build(&self) -> Vec<u8> {
            let mut out = Vec::new();
            out.extend_from_slice(&MESH_MAGIC);
            out.extend_from_slice(&[3, 0, 0, 0]);
            out.extend_from_slice(&u32::from(self.skinned).to_le_bytes());

            if self.skinned {
                out.extend_from_slice(&(self.bones.len() as u16).to_le_bytes());
                for &(_, parent, _) in &self.bones {
                    self.index(&mut out, parent.unwrap_or(self.layout.sentinel()));
                }
                for &(name, _, _) in &self.bones {
                    let mut field = [0u8; 32];
                    field[..name.len()].copy_from_slice(name.as_bytes());
                    out.extend_from_slice(&field);
                }
                out.push(0);
                for &(_, _, t) in &self.bones {
                    let m = Mat4::from_translation(t).to_array();
                    for value in m {
                        out.extend_from_slice(&value.to_le_bytes());
                    }
                }
                out.push(0);
            }

            out.extend_from_slice(&0u32.to_le_bytes());
            for &(vc, fc, uv, color) in &self.table {
                out.extend_from_slice(&vc.to_le_bytes());
                out.extend_from_slice(&fc.to_le_bytes());
                out.push(uv);
                out.push(color);
            }
            out.extend_from_slice(&1u16.to_le_bytes());

            out.extend_from_slice(&(self.positions.len() as u32).to_le_bytes());
            out.extend_from_slice(&(self.faces.len() as u32).to_le_bytes());
            for p in &self.positions {
                for value in p {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            for _ in &self.positions {
                for value in [0.0f32, 0.0, 1.0] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            out.extend_from_slice(&0u16.to_le_bytes());
            for face in &self.faces {
                for index in face {
                    out.extend_from_slice(&index.to_le_bytes());
                }
            }

            let mut uv_iter = self.uvs.iter();
            for &(vc, _, uv_layers, _) in &self.table {
                if uv_layers > 0 {
                    for _ in 0..vc {
                        let uv = uv_iter.next().copied().unwrap_or([0.0, 0.0]);
                        out.extend_from_slice(&uv[0].to_le_bytes());
                        out.extend_from_slice(&uv[1].to_le_bytes());
                    }
                    out.resize(out.len() + vc as usize * 8 * (uv_layers as usize - 1), 0);
                }
            }
            for &(vc, _, _, color) in &self.table {
                out.resize(out.len() + vc as usize * 4 * color as usize, 0);
            }

            if self.skinned {
                for joints in &self.joints {
                    for &joint in joints {
                        self.index(&mut out, joint);
                    }
                }
                for weights in &self.weights {
                    for value in weights {
                        out.extend_from_slice(&value.to_le_bytes());
                    }
                }
            }
            out
        }
    }

    #[test]
    fn test_static_triangle() {
        let model = decode(&MeshBuilder::triangle().build()).unwrap();
        assert_eq!(model.version, 3);
        assert_eq!(model.vertices.len(), 3);
        assert_eq!(model.triangles, vec![[0, 1, 2]]);
        assert_eq!(model.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(model.vertices[2].uv, Some([0.0, 1.0]));
        assert!(!model.is_skinned());
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_bad_magic() {
        let mut data = MeshBuilder::triangle().build();
        data[0] = 0;
        assert!(matches!(decode(&data), Err(MeshError::BadMagic(_))));
        assert!(!is_mesh(&data));
    }

    #[test]
    fn test_truncated() {
        let data = MeshBuilder::triangle().build();
        for cut in [6, 20, data.len() - 10] {
            assert!(matches!(
                decode(&data[..cut]),
                Err(MeshError::Truncated { .. })
            ));
        }
    }

    #[test]
    fn test_face_out_of_range() {
        let mut builder = MeshBuilder::triangle();
        builder.faces = vec![[0, 1, 5]];
        assert!(matches!(
            decode(&builder.build()),
            Err(MeshError::FaceIndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn test_no_uv_layers() {
        let mut builder = MeshBuilder::triangle();
        builder.table = vec![(3, 1, 0, 0)];
        let model = decode(&builder.build()).unwrap();
        assert!(!model.has_uvs());
    }

    #[test]
    fn test_extra_uv_layers_and_colors() {
        let mut builder = MeshBuilder::triangle();
        builder.table = vec![(3, 1, 2, 1)];
        let model = decode(&builder.build()).unwrap();
        assert_eq!(model.vertices[1].uv, Some([1.0, 0.0]));
        assert_eq!(model.submeshes[0].uv_layers, 2);
        assert_eq!(model.submeshes[0].color_channels, 1);
    }

    #[test]
    fn test_mismatched_table_becomes_single_submesh() {
        let mut builder = MeshBuilder::triangle();
        builder.table = vec![(2, 1, 1, 0)];
        builder.uvs.truncate(2);
        let model = decode(&builder.build()).unwrap();
        assert_eq!(model.submeshes.len(), 1);
        assert_eq!(model.submeshes[0].vertex_count, 3);
        // the third vertex is padded
        assert_eq!(model.vertices[2].uv, Some([0.0, 0.0]));
    }

    #[test]
    fn test_two_submeshes() {
        let mut builder = MeshBuilder::triangle();
        builder.positions.extend([[2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]]);
        builder.faces.push([3, 4, 5]);
        builder.table = vec![(3, 1, 1, 0), (3, 1, 0, 0)];
        let model = decode(&builder.build()).unwrap();
        assert_eq!(model.submeshes.len(), 2);
        assert_eq!(model.submeshes[1].vertex_start, 3);
        assert_eq!(model.submeshes[1].face_start, 1);
        assert_eq!(model.vertices[4].uv, Some([0.0, 0.0]));
    }

    #[test]
    fn test_skinned_wide() {
        let data = MeshBuilder::skinned_triangle(BoneLayout::Wide).build();
        let model = MeshDecoder::with_layout(BoneLayout::Wide).decode(&data).unwrap();
        let skeleton = model.skeleton().unwrap();
        assert_eq!(skeleton.len(), 3);
        assert_eq!(skeleton.bones[2].name, "head");
        assert_eq!(skeleton.bones[2].parent, Some(0));
        let influences = model.influences().unwrap();
        assert_eq!(influences[1].iter().collect::<Vec<_>>(), vec![(1, 0.5), (2, 0.5)]);
        assert_eq!(influences[0].slots[1], (None, 0.0));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_skinned_narrow_fallback() {
        let data = MeshBuilder::skinned_triangle(BoneLayout::Narrow).build();
        assert!(MeshDecoder::with_layout(BoneLayout::Wide).decode(&data).is_err());

        let model = decode(&data).unwrap();
        assert_eq!(model.skeleton().unwrap().len(), 3);
        assert_eq!(model.influences().unwrap()[2].dominant(), Some(2));
    }

    #[test]
    fn test_bone_cycle_rejected() {
        let mut builder = MeshBuilder::skinned_triangle(BoneLayout::Wide);
        builder.bones[0].1 = Some(2);
        assert!(matches!(
            MeshDecoder::with_layout(BoneLayout::Wide).decode(&builder.build()),
            Err(MeshError::BoneCycle { .. })
        ));
    }

    #[test]
    fn test_invalid_parent() {
        let mut builder = MeshBuilder::skinned_triangle(BoneLayout::Wide);
        builder.bones[1].1 = Some(40);
        assert!(matches!(
            MeshDecoder::with_layout(BoneLayout::Wide).decode(&builder.build()),
            Err(MeshError::InvalidParent { bone: 1, parent: 40 })
        ));
    }

    #[test]
    fn test_multiple_roots_get_dummy() {
        let mut builder = MeshBuilder::skinned_triangle(BoneLayout::Wide);
        builder.bones[2].1 = None;
        let data = builder.build();
        let model = MeshDecoder::with_layout(BoneLayout::Wide).decode(&data).unwrap();
        let skeleton = model.skeleton().unwrap();
        assert_eq!(skeleton.len(), 4);
        assert_eq!(skeleton.bones[3].name, "dummy_root");
        assert_eq!(skeleton.bones[0].parent, Some(3));
        assert_eq!(skeleton.bones[2].parent, Some(3));
        assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_bone_name_spaces() {
        let mut builder = MeshBuilder::skinned_triangle(BoneLayout::Wide);
        builder.bones[1].0 = "Bip01 Spine";
        let model = decode(&builder.build()).unwrap();
        assert_eq!(model.skeleton().unwrap().bones[1].name, "Bip01_Spine");
    }

    #[test]
    fn test_joint_out_of_range() {
        let mut builder = MeshBuilder::skinned_triangle(BoneLayout::Wide);
        builder.joints[1][0] = 7;
        assert!(matches!(
            MeshDecoder::with_layout(BoneLayout::Wide).decode(&builder.build()),
            Err(MeshError::BoneIndexOutOfRange { vertex: 1, bone: 7, .. })
        ));
    }

    #[test]
    fn test_zero_weight_slot_ignored() {
        let mut builder = MeshBuilder::skinned_triangle(BoneLayout::Wide);
        builder.joints[0][3] = 300;
        let model = MeshDecoder::with_layout(BoneLayout::Wide)
            .decode(&builder.build())
            .unwrap();
        assert_eq!(model.influences().unwrap()[0].iter().count(), 1);
    }

    #[test]
    fn test_static_with_separator() {
        let plain = MeshBuilder::triangle().build();
        let mut separated = plain.clone();
        separated.insert(12, 0);

        let model = decode(&separated).unwrap();
        assert_eq!(model, decode(&plain).unwrap());
        assert_eq!(model.vertices[2].uv, Some([0.0, 1.0]));
        assert!(!model.is_skinned());
    }

    #[test]
    fn test_unused_uv_entries_do_not_grow_padding() {
        let mut builder = MeshBuilder::triangle();
        builder.positions = (0..1000).map(|i| [i as f32, 0.0, 0.0]).collect();
        builder.table = vec![(1000, 0, 0, 0); 500];
        builder.uvs.clear();

        let model = decode(&builder.build()).unwrap();
        assert_eq!(model.vertices.len(), 1000);
        assert_eq!(model.vertices[999].position, [999.0, 0.0, 0.0]);
        assert!(!model.has_uvs());
        assert_eq!(model.submeshes.len(), 1);
    }

    #[test]
    fn test_submesh_table_longer_than_mesh() {
        let mut builder = MeshBuilder::triangle();
        builder.table = vec![(3, 1, 0, 0); 4];
        assert!(matches!(
            decode(&builder.build()),
            Err(MeshError::LimitExceeded { what: "submesh", count: 4, limit: 3 })
        ));
    }

    #[test]
    fn test_vertex_limit() {
        let mut data = MeshBuilder::triangle().build();
        // vertex count follows: magic 4, version 4, mode 4, lod 4, table 10, end 2
        let at = 4 + 4 + 4 + 4 + 10 + 2;
        data[at..at + 4].copy_from_slice(&(MAX_VERTICES as u32 + 1).to_le_bytes());
        assert!(matches!(
            decode(&data),
            Err(MeshError::LimitExceeded { what: "vertex", .. })
        ));
    }
}
