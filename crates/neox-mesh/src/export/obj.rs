//! Wavefront OBJ writer. Geometry only; the skeleton is kept as comments.

use std::fmt::Write;

use super::ExportOptions;
use crate::{MeshModel, Result};

pub(super) fn write(model: &MeshModel, options: &ExportOptions) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "o mesh")?;

    for vertex in &model.vertices {
        let [x, y, z] = vertex.position;
        writeln!(out, "v {x} {y} {z}")?;
    }
    for vertex in &model.vertices {
        let [x, y, z] = vertex.normal;
        writeln!(out, "vn {x} {y} {z}")?;
    }

    let has_uvs = model.has_uvs();
    if has_uvs {
        for vertex in &model.vertices {
            let [u, v] = options.uv(vertex.uv);
            writeln!(out, "vt {u} {v}")?;
        }
    }

    for (index, submesh) in model.submesh_ranges().iter().enumerate() {
        writeln!(out, "g Sub-mesh_{index}")?;
        for face in &model.triangles[submesh.face_range()] {
            let [a, b, c] = face.map(|i| i + 1);
            if has_uvs {
                writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
            } else {
                writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
            }
        }
    }

    if let Some(skeleton) = model.skeleton() {
        writeln!(out)?;
        writeln!(out, "# Bone Information")?;
        for bone in &skeleton.bones {
            let parent = bone.parent.map_or(-1, |p| p as i64);
            writeln!(out, "# Bone: {}, Parent: {parent}", bone.name)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::{quad, skinned_quad};

    #[test]
    fn test_obj_layout() {
        let text = write(&quad(), &ExportOptions::default()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "o mesh");
        assert_eq!(lines[1], "v 0 0 0");
        assert_eq!(text.matches("\nvn ").count(), 4);
        assert_eq!(text.matches("\nvt ").count(), 4);
        assert!(text.contains("g Sub-mesh_0\nf 1/1/1 2/2/2 3/3/3\n"));
        assert!(text.contains("g Sub-mesh_1\nf 1/1/1 3/3/3 4/4/4\n"));
        assert!(!text.contains("# Bone"));
    }

    #[test]
    fn test_obj_flip_uv() {
        let options = ExportOptions {
            flip_uv: true,
            ..Default::default()
        };
        let text = write(&quad(), &options).unwrap();
        assert!(text.contains("vt 0 1\n"));
    }

    #[test]
    fn test_obj_without_uvs() {
        let mut model = quad();
        for vertex in &mut model.vertices {
            vertex.uv = None;
        }
        let text = write(&model, &ExportOptions::default()).unwrap();
        assert!(!text.contains("vt "));
        assert!(text.contains("f 1//1 2//2 3//3"));
    }

    #[test]
    fn test_obj_bone_comments() {
        let text = write(&skinned_quad(), &ExportOptions::default()).unwrap();
        assert!(text.contains("# Bone: arm, Parent: 1\n"));
        assert!(text.contains("# Bone: root, Parent: -1\n"));
    }
}
