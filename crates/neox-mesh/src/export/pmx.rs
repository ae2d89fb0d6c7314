//! PMX 2.0 writer (UTF-8 strings, no morphs or physics).
//!
//! PMX is left-handed: Z is mirrored and triangle winding reversed.

use byteorder::{LittleEndian, WriteBytesExt};

use super::ExportOptions;
use crate::math::Mat4;
use crate::model::{Bone, DepthFirst, Skeleton};
use crate::{MeshModel, Result};

const MAGIC: &[u8; 4] = b"PMX ";
const VERSION: f32 = 2.0;

const ENCODING_UTF8: u8 = 1;

const WEIGHT_BDEF1: u8 = 0;
const WEIGHT_BDEF4: u8 = 2;

const BONE_ROTATABLE: u16 = 0x0002;
const BONE_VISIBLE: u16 = 0x0008;
const BONE_ENABLED: u16 = 0x0010;

const MODEL_NAME: &str = "NeoX model";
const MODEL_NAME_EN: &str = "Empty model";
const COMMENT: &str = "NeoX Model Converterで生成";
const COMMENT_EN: &str = "Created by NeoX Model Converter.";

/// Width of the vertex index; vertex indices are unsigned.
fn vertex_index_size(count: usize) -> u8 {
    if count <= u8::MAX as usize {
        1
    } else if count <= u16::MAX as usize {
        2
    } else {
        4
    }
}

/// Width of a signed index that must also hold `-1`.
fn signed_index_size(count: usize) -> u8 {
    if count <= i8::MAX as usize {
        1
    } else if count <= i16::MAX as usize {
        2
    } else {
        4
    }
}

struct Writer {
    out: Vec<u8>,
    vertex_size: u8,
    material_size: u8,
    bone_size: u8,
}

impl Writer {
    fn text(&mut self, value: &str) -> Result<()> {
        self.out.write_i32::<LittleEndian>(value.len() as i32)?;
        self.out.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn f32s(&mut self, values: &[f32]) -> Result<()> {
        for &value in values {
            self.out.write_f32::<LittleEndian>(value)?;
        }
        Ok(())
    }

    fn vertex_index(&mut self, value: u32) -> Result<()> {
        match self.vertex_size {
            1 => self.out.write_u8(value as u8)?,
            2 => self.out.write_u16::<LittleEndian>(value as u16)?,
            _ => self.out.write_i32::<LittleEndian>(value as i32)?,
        }
        Ok(())
    }

    fn signed_index(&mut self, size: u8, value: i32) -> Result<()> {
        match size {
            1 => self.out.write_i8(value as i8)?,
            2 => self.out.write_i16::<LittleEndian>(value as i16)?,
            _ => self.out.write_i32::<LittleEndian>(value)?,
        }
        Ok(())
    }

    fn bone_index(&mut self, value: i32) -> Result<()> {
        self.signed_index(self.bone_size, value)
    }
}

pub(super) fn write(model: &MeshModel, options: &ExportOptions) -> Result<Vec<u8>> {
    // Static meshes still need one bone to bind to.
    let fallback;
    let skeleton = match model.skeleton() {
        Some(skeleton) if !skeleton.is_empty() => skeleton,
        _ => {
            fallback = Skeleton::new(vec![Bone::new("root", None, Mat4::IDENTITY)]);
            &fallback
        }
    };
    let dfs = skeleton.depth_first();
    let submeshes = model.submesh_ranges();

    let mut w = Writer {
        out: Vec::new(),
        vertex_size: vertex_index_size(model.vertices.len()),
        material_size: signed_index_size(submeshes.len()),
        bone_size: signed_index_size(skeleton.len()),
    };

    w.out.extend_from_slice(MAGIC);
    w.out.write_f32::<LittleEndian>(VERSION)?;
    w.out.write_u8(8)?;
    w.out.extend_from_slice(&[
        ENCODING_UTF8,
        0,
        w.vertex_size,
        1,
        w.material_size,
        w.bone_size,
        1,
        1,
    ]);

    w.text(MODEL_NAME)?;
    w.text(MODEL_NAME_EN)?;
    w.text(COMMENT)?;
    w.text(COMMENT_EN)?;

    write_vertices(&mut w, model, &dfs, options)?;

    w.out
        .write_i32::<LittleEndian>((model.triangles.len() * 3) as i32)?;
    for &[a, b, c] in &model.triangles {
        w.vertex_index(a)?;
        w.vertex_index(c)?;
        w.vertex_index(b)?;
    }

    // textures
    w.out.write_i32::<LittleEndian>(0)?;

    w.out.write_i32::<LittleEndian>(submeshes.len() as i32)?;
    for (index, submesh) in submeshes.iter().enumerate() {
        w.text(&format!("Mat{index}"))?;
        w.text(&format!("material{index}"))?;
        w.f32s(&[1.0, 1.0, 1.0, 1.0])?; // diffuse
        w.f32s(&[1.0, 1.0, 1.0])?; // specular
        w.f32s(&[1.0])?; // specular strength
        w.f32s(&[0.0, 0.0, 0.0])?; // ambient
        w.out.write_u8(0)?; // drawing flags
        w.f32s(&[0.0, 0.0, 0.0, 1.0])?; // edge colour
        w.f32s(&[0.0])?; // edge size
        w.signed_index(1, -1)?; // texture
        w.signed_index(1, -1)?; // sphere texture
        w.out.write_u8(0)?; // sphere mode
        w.out.write_u8(1)?; // shared toon
        w.out.write_u8(0)?; // toon index
        w.text("comment")?;
        w.out
            .write_i32::<LittleEndian>((submesh.face_count * 3) as i32)?;
    }

    w.out.write_i32::<LittleEndian>(skeleton.len() as i32)?;
    for (position, &index) in dfs.order.iter().enumerate() {
        let bone = &skeleton.bones[index];
        let [x, y, z] = bone.transform.translation();
        w.text(&bone.name)?;
        w.text(&bone.name)?;
        w.f32s(&[x * options.scale, y * options.scale, -z * options.scale])?;
        let parent = dfs.parent_of(skeleton, position).map_or(-1, |p| p as i32);
        w.bone_index(parent)?;
        w.out.write_i32::<LittleEndian>(0)?; // layer
        w.out
            .write_u16::<LittleEndian>(BONE_ROTATABLE | BONE_VISIBLE | BONE_ENABLED)?;
        w.f32s(&[0.0, 0.0, 0.0])?; // tail offset
    }

    // morphs
    w.out.write_i32::<LittleEndian>(0)?;

    // one special display frame, empty
    w.out.write_i32::<LittleEndian>(1)?;
    w.text("表情")?;
    w.text("Exp")?;
    w.out.write_u8(1)?;
    w.out.write_i32::<LittleEndian>(0)?;

    // rigid bodies and joints
    w.out.write_i32::<LittleEndian>(0)?;
    w.out.write_i32::<LittleEndian>(0)?;

    Ok(w.out)
}

fn write_vertices(
    w: &mut Writer,
    model: &MeshModel,
    dfs: &DepthFirst,
    options: &ExportOptions,
) -> Result<()> {
    let influences = model.influences();
    let scale = options.scale;

    w.out
        .write_i32::<LittleEndian>(model.vertices.len() as i32)?;
    for (index, vertex) in model.vertices.iter().enumerate() {
        let [x, y, z] = vertex.position;
        let [nx, ny, nz] = vertex.normal;
        w.f32s(&[x * scale, y * scale, -z * scale])?;
        w.f32s(&[nx, ny, -nz])?;
        w.f32s(&options.uv(vertex.uv))?;

        match influences {
            Some(influences) => {
                let mut bones = [0i32; 4];
                let mut weights = [0.0f32; 4];
                for (slot, (bone, weight)) in influences[index].iter().enumerate() {
                    bones[slot] = dfs.remap[bone as usize] as i32;
                    weights[slot] = weight;
                }
                w.out.write_u8(WEIGHT_BDEF4)?;
                for bone in bones {
                    w.bone_index(bone)?;
                }
                w.f32s(&weights)?;
            }
            None => {
                w.out.write_u8(WEIGHT_BDEF1)?;
                w.bone_index(0)?;
            }
        }

        w.out.write_f32::<LittleEndian>(0.0)?; // edge scale
    }
    Ok(())
}
