//! Plain-text dump: bones, then counted position, normal, UV and face blocks.

use std::fmt::Write;

use super::ExportOptions;
use crate::{MeshModel, Result};

pub(super) fn write(model: &MeshModel, options: &ExportOptions) -> Result<String> {
    let mut out = String::new();

    let bones = model.skeleton().map_or(&[][..], |s| &s.bones[..]);
    writeln!(out, "{}", bones.len())?;
    for bone in bones {
        let [x, y, z] = bone.transform.translation();
        writeln!(out, "{}", bone.name)?;
        writeln!(out, "{}", bone.parent.map_or(-1, |p| p as i64))?;
        writeln!(out, "{x:.6} {y:.6} {z:.6} 0 0 0 1")?;
    }

    writeln!(out, "{}", model.vertices.len())?;
    for vertex in &model.vertices {
        let [x, y, z] = vertex.position;
        writeln!(out, "{x:.6} {y:.6} {z:.6}")?;
    }

    writeln!(out, "{}", model.vertices.len())?;
    for vertex in &model.vertices {
        let [x, y, z] = vertex.normal;
        writeln!(out, "{x:.6} {y:.6} {z:.6}")?;
    }

    if model.has_uvs() {
        writeln!(out, "{}", model.vertices.len())?;
        for vertex in &model.vertices {
            let [u, v] = options.uv(vertex.uv);
            writeln!(out, "{u:.6} {v:.6}")?;
        }
    } else {
        writeln!(out, "0")?;
    }

    writeln!(out, "{}", model.triangles.len())?;
    for [a, b, c] in &model.triangles {
        writeln!(out, "{a} {b} {c}")?;
    }

    Ok(out)
}
