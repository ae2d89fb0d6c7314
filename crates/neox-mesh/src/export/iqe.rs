//! Inter-Quake Export writer.
//!
//! IQE is right-handed with X mirrored relative to the engine, and stores
//! texture coordinates with a top-left origin.

use std::fmt::Write;

use super::ExportOptions;
use crate::model::SubMesh;
use crate::{MeshModel, Result};

pub(super) fn write(model: &MeshModel, options: &ExportOptions) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "# Inter-Quake Export")?;
    writeln!(out)?;

    let remap = match model.skeleton() {
        Some(skeleton) => {
            let dfs = skeleton.depth_first();
            for (position, &index) in dfs.order.iter().enumerate() {
                let parent = dfs.parent_of(skeleton, position).map_or(-1, |p| p as i64);
                writeln!(out, "joint \"{}\" {parent}", skeleton.bones[index].name)?;

                let local = skeleton.local_transform(index);
                let [x, y, z] = local.translation();
                let [qx, qy, qz, qw] = local.rotation_quaternion();
                writeln!(
                    out,
                    "pq {} {y} {z} {qx} {} {} {qw}",
                    mirror(x),
                    mirror(qy),
                    mirror(qz)
                )?;
            }
            writeln!(out)?;
            Some(dfs.remap)
        }
        None => None,
    };

    let influences = model.influences();

    for (mesh, submesh) in submeshes(model).iter().enumerate() {
        writeln!(out, "mesh mesh{mesh}")?;
        writeln!(out, "material \"mesh{mesh}Mat\"")?;
        writeln!(out)?;

        let vertices = &model.vertices[submesh.vertex_range()];
        for vertex in vertices {
            let [x, y, z] = vertex.position;
            writeln!(out, "vp {} {y} {z}", mirror(x))?;
        }
        writeln!(out)?;

        for vertex in vertices {
            let [x, y, z] = vertex.normal;
            writeln!(out, "vn {} {y} {z}", mirror(x))?;
        }
        writeln!(out)?;

        for vertex in vertices {
            let [u, v] = options.uv(vertex.uv);
            writeln!(out, "vt {u} {}", 1.0 - v)?;
        }
        writeln!(out)?;

        if let (Some(influences), Some(remap)) = (influences, &remap) {
            for slots in &influences[submesh.vertex_range()] {
                write!(out, "vb")?;
                for (bone, weight) in slots.iter() {
                    write!(out, " {} {weight}", remap[bone as usize])?;
                }
                writeln!(out)?;
            }
            writeln!(out)?;
        }

        let base = submesh.vertex_start as u32;
        for [a, b, c] in &model.triangles[submesh.face_range()] {
            writeln!(out, "fm {} {} {}", c - base, a - base, b - base)?;
        }
        writeln!(out)?;
    }

    Ok(out)
}

/// Negate without producing `-0`.
fn mirror(value: f32) -> f32 {
    0.0 - value
}

/// Sub-meshes whose faces stay inside their own vertex range, or a single
/// whole-model mesh when any face crosses a boundary.
fn submeshes(model: &MeshModel) -> Vec<SubMesh> {
    let ranges = model.submesh_ranges();
    let contained = ranges.iter().all(|submesh| {
        let vertices = submesh.vertex_range();
        model.triangles[submesh.face_range()]
            .iter()
            .flatten()
            .all(|&i| vertices.contains(&(i as usize)))
    });
    if contained {
        return ranges;
    }

    vec![SubMesh {
        vertex_start: 0,
        vertex_count: model.vertices.len(),
        face_start: 0,
        face_count: model.triangles.len(),
        uv_layers: u8::from(model.has_uvs()),
        color_channels: 0,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::{quad, skinned_quad};
    use crate::model::Vertex;

    #[test]
    fn test_iqe_static() {
        let text = write(&quad(), &ExportOptions::default()).unwrap();
        assert!(text.starts_with("# Inter-Quake Export\n\nmesh mesh0\nmaterial \"mesh0Mat\"\n"));
        assert!(text.contains("vp -1 0 0\n"));
        assert!(text.contains("vt 1 1\n"));
        assert!(text.contains("fm 2 0 1\n"));
        assert!(text.contains("mesh mesh1\n"));
        assert!(!text.contains("joint"));
        assert!(!text.contains("vb"));
    }

    #[test]
    fn test_iqe_joints() {
        let text = write(&skinned_quad(), &ExportOptions::default()).unwrap();
        assert!(text.contains("joint \"root\" -1\npq 0 0 0 0 0 0 1\n"));
        assert!(text.contains("joint \"arm\" 0\npq -1 2 3 0 0 0 1\n"));
        // vertex 2: arm (new 1) 0.25, root (new 0) 0.75
        assert!(text.contains("vb 1 0.25 0 0.75\n"));
    }

    #[test]
    fn test_iqe_relative_faces() {
        let mut model = quad();
        model.vertices.extend([Vertex::default(); 3]);
        model.triangles.push([4, 5, 6]);
        model.submeshes.push(SubMesh {
            vertex_start: 4,
            vertex_count: 3,
            face_start: 2,
            face_count: 1,
            uv_layers: 1,
            color_channels: 0,
        });
        let text = write(&model, &ExportOptions::default()).unwrap();
        assert!(text.contains("mesh mesh2\n"));
        assert!(text.ends_with("fm 2 0 1\n\n"));
    }

    #[test]
    fn test_iqe_crossing_faces_fall_back_to_one_mesh() {
        let mut model = quad();
        model.submeshes[1].vertex_start = 3;
        model.submeshes[1].vertex_count = 1;
        let text = write(&model, &ExportOptions::default()).unwrap();
        assert!(text.contains("mesh mesh0\n"));
        assert!(!text.contains("mesh mesh1\n"));
        assert_eq!(text.matches("fm ").count(), 2);
    }
}
