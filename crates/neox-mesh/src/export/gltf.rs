//! Binary glTF 2.0 (`.glb`) writer.

use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;

use super::ExportOptions;
use crate::{MeshModel, Result};

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Root {
    asset: Asset,
    scene: u32,
    scenes: Vec<Scene>,
    nodes: Vec<Node>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    meshes: Vec<Mesh>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skins: Vec<Skin>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accessors: Vec<Accessor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffers: Vec<Buffer>,
}

#[derive(Serialize)]
struct Asset {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct Scene {
    nodes: Vec<u32>,
}

#[derive(Serialize, Default)]
struct Node {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skin: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<[f32; 4]>,
}

#[derive(Serialize)]
struct Mesh {
    primitives: Vec<Primitive>,
}

#[derive(Serialize)]
struct Primitive {
    attributes: Attributes,
    indices: u32,
}

#[derive(Serialize)]
struct Attributes {
    #[serde(rename = "POSITION")]
    position: u32,
    #[serde(rename = "NORMAL")]
    normal: u32,
    #[serde(rename = "TEXCOORD_0", skip_serializing_if = "Option::is_none")]
    texcoord: Option<u32>,
    #[serde(rename = "JOINTS_0", skip_serializing_if = "Option::is_none")]
    joints: Option<u32>,
    #[serde(rename = "WEIGHTS_0", skip_serializing_if = "Option::is_none")]
    weights: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Skin {
    inverse_bind_matrices: u32,
    joints: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skeleton: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: u32,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<[f32; 3]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: u32,
    byte_offset: usize,
    byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    byte_length: usize,
}

/// Accumulates the BIN chunk and the views/accessors that describe it.
#[derive(Default)]
struct BinBuilder {
    bin: Vec<u8>,
    views: Vec<BufferView>,
    accessors: Vec<Accessor>,
}

impl BinBuilder {
    fn push(
        &mut self,
        bytes: Vec<u8>,
        target: Option<u32>,
        component_type: u32,
        count: usize,
        kind: &'static str,
    ) -> u32 {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        self.views.push(BufferView {
            buffer: 0,
            byte_offset: self.bin.len(),
            byte_length: bytes.len(),
            target,
        });
        self.bin.extend_from_slice(&bytes);
        self.accessors.push(Accessor {
            buffer_view: (self.views.len() - 1) as u32,
            component_type,
            count,
            kind,
            min: None,
            max: None,
        });
        (self.accessors.len() - 1) as u32
    }

    fn floats(&mut self, values: &[f32], target: Option<u32>, count: usize, kind: &'static str) -> Result<u32> {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for &value in values {
            bytes.write_f32::<LittleEndian>(value)?;
        }
        Ok(self.push(bytes, target, FLOAT, count, kind))
    }
}

pub(super) fn write(model: &MeshModel, options: &ExportOptions) -> Result<Vec<u8>> {
    let scale = options.scale;
    let mut bin = BinBuilder::default();
    let mut nodes = vec![Node {
        name: Some("mesh".to_string()),
        ..Default::default()
    }];
    let mut meshes = Vec::new();
    let mut skins = Vec::new();

    if !model.vertices.is_empty() {
        let positions: Vec<f32> = model
            .vertices
            .iter()
            .flat_map(|v| v.position.map(|c| c * scale))
            .collect();
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for point in positions.chunks_exact(3) {
            for axis in 0..3 {
                min[axis] = min[axis].min(point[axis]);
                max[axis] = max[axis].max(point[axis]);
            }
        }
        let count = model.vertices.len();
        let position = bin.floats(&positions, Some(ARRAY_BUFFER), count, "VEC3")?;
        bin.accessors[position as usize].min = Some(min);
        bin.accessors[position as usize].max = Some(max);

        let normals: Vec<f32> = model.vertices.iter().flat_map(|v| v.normal).collect();
        let normal = bin.floats(&normals, Some(ARRAY_BUFFER), count, "VEC3")?;

        let texcoord = if model.has_uvs() {
            let uvs: Vec<f32> = model
                .vertices
                .iter()
                .flat_map(|v| options.uv(v.uv))
                .collect();
            Some(bin.floats(&uvs, Some(ARRAY_BUFFER), count, "VEC2")?)
        } else {
            None
        };

        let (joints, weights) = match (model.skeleton(), model.influences()) {
            (Some(skeleton), Some(influences)) if !skeleton.is_empty() => {
                let mut joint_bytes = Vec::with_capacity(count * 8);
                let mut weight_values = Vec::with_capacity(count * 4);
                for slots in influences {
                    let mut joints = [0u16; 4];
                    let mut weights = [0.0f32; 4];
                    for (slot, (bone, weight)) in slots.iter().enumerate() {
                        joints[slot] = bone;
                        weights[slot] = weight;
                    }
                    for joint in joints {
                        joint_bytes.write_u16::<LittleEndian>(joint)?;
                    }
                    weight_values.extend_from_slice(&weights);
                }
                let joints = bin.push(joint_bytes, Some(ARRAY_BUFFER), UNSIGNED_SHORT, count, "VEC4");
                let weights = bin.floats(&weight_values, Some(ARRAY_BUFFER), count, "VEC4")?;
                (Some(joints), Some(weights))
            }
            _ => (None, None),
        };

        let mut primitives = Vec::new();
        for submesh in model.submesh_ranges() {
            let faces = &model.triangles[submesh.face_range()];
            if faces.is_empty() {
                continue;
            }
            let mut index_bytes = Vec::with_capacity(faces.len() * 12);
            for &index in faces.iter().flatten() {
                index_bytes.write_u32::<LittleEndian>(index)?;
            }
            let indices = bin.push(
                index_bytes,
                Some(ELEMENT_ARRAY_BUFFER),
                UNSIGNED_INT,
                faces.len() * 3,
                "SCALAR",
            );
            primitives.push(Primitive {
                attributes: Attributes {
                    position,
                    normal,
                    texcoord,
                    joints,
                    weights,
                },
                indices,
            });
        }

        if !primitives.is_empty() {
            meshes.push(Mesh { primitives });
            nodes[0].mesh = Some(0);
        }

        if let (Some(skeleton), Some(_)) = (model.skeleton(), joints) {
            // bone i becomes node i + 1
            let first = nodes.len() as u32;
            for (index, bone) in skeleton.bones.iter().enumerate() {
                let local = skeleton.local_transform(index);
                let [x, y, z] = local.translation();
                nodes.push(Node {
                    name: Some(bone.name.clone()),
                    children: skeleton
                        .children(index)
                        .map(|child| first + child as u32)
                        .collect(),
                    translation: Some([x * scale, y * scale, z * scale]),
                    rotation: Some(local.rotation_quaternion()),
                    ..Default::default()
                });
            }

            let mut inverse_binds = Vec::with_capacity(skeleton.len() * 16);
            for bone in &skeleton.bones {
                let mut m = bone.inverse_bind.unwrap_or_default().to_array();
                for value in &mut m[12..15] {
                    *value *= scale;
                }
                inverse_binds.extend_from_slice(&m);
            }
            let inverse_bind_matrices =
                bin.floats(&inverse_binds, None, skeleton.len(), "MAT4")?;

            let roots: Vec<u32> = skeleton.roots().map(|root| first + root as u32).collect();
            skins.push(Skin {
                inverse_bind_matrices,
                joints: (0..skeleton.len()).map(|i| first + i as u32).collect(),
                skeleton: roots.first().copied(),
            });
            nodes[0].skin = Some(0);
            nodes[0].children = roots;
        }
    }

    while bin.bin.len() % 4 != 0 {
        bin.bin.push(0);
    }
    let buffers = if bin.bin.is_empty() {
        Vec::new()
    } else {
        vec![Buffer {
            byte_length: bin.bin.len(),
        }]
    };

    let root = Root {
        asset: Asset {
            version: "2.0",
            generator: concat!("neox-mesh ", env!("CARGO_PKG_VERSION")),
        },
        scene: 0,
        scenes: vec![Scene { nodes: vec![0] }],
        nodes,
        meshes,
        skins,
        accessors: bin.accessors,
        buffer_views: bin.views,
        buffers,
    };

    let mut json = serde_json::to_vec(&root)?;
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let mut total = 12 + 8 + json.len();
    if !bin.bin.is_empty() {
        total += 8 + bin.bin.len();
    }

    let mut out = Vec::with_capacity(total);
    out.write_u32::<LittleEndian>(GLB_MAGIC)?;
    out.write_u32::<LittleEndian>(GLB_VERSION)?;
    out.write_u32::<LittleEndian>(total as u32)?;
    out.write_u32::<LittleEndian>(json.len() as u32)?;
    out.write_u32::<LittleEndian>(CHUNK_JSON)?;
    out.extend_from_slice(&json);
    if !bin.bin.is_empty() {
        out.write_u32::<LittleEndian>(bin.bin.len() as u32)?;
        out.write_u32::<LittleEndian>(CHUNK_BIN)?;
        out.extend_from_slice(&bin.bin);
    }
    Ok(out)
}
