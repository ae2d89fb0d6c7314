//! StudioMDL reference SMD writer.

use std::fmt::Write;

use super::ExportOptions;
use crate::{MeshModel, Result};

pub(super) fn write(model: &MeshModel, options: &ExportOptions) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "version 1")?;

    // remap[old] = node id written to the file
    let remap = match model.skeleton() {
        Some(skeleton) if !skeleton.is_empty() => {
            let dfs = skeleton.depth_first();

            writeln!(out, "nodes")?;
            for (position, &index) in dfs.order.iter().enumerate() {
                let parent = dfs.parent_of(skeleton, position).map_or(-1, |p| p as i64);
                writeln!(out, "{position} \"{}\" {parent}", skeleton.bones[index].name)?;
            }
            writeln!(out, "end")?;

            writeln!(out, "skeleton")?;
            writeln!(out, "time 0")?;
            for (position, &index) in dfs.order.iter().enumerate() {
                let local = skeleton.local_transform(index);
                let [x, y, z] = local.translation();
                let [rx, ry, rz] = local.euler_xyz();
                writeln!(
                    out,
                    "{position} {x:.6} {y:.6} {z:.6} {rx:.6} {ry:.6} {rz:.6}"
                )?;
            }
            writeln!(out, "end")?;
            Some(dfs.remap)
        }
        _ => {
            writeln!(out, "nodes")?;
            writeln!(out, "0 \"root\" -1")?;
            writeln!(out, "end")?;
            writeln!(out, "skeleton")?;
            writeln!(out, "time 0")?;
            writeln!(
                out,
                "0 0.000000 0.000000 0.000000 0.000000 0.000000 0.000000"
            )?;
            writeln!(out, "end")?;
            None
        }
    };

    let influences = model.influences();

    writeln!(out, "triangles")?;
    for (material, submesh) in model.submesh_ranges().iter().enumerate() {
        for face in &model.triangles[submesh.face_range()] {
            writeln!(out, "material_{material}")?;
            for &index in face {
                let vertex = &model.vertices[index as usize];
                let [px, py, pz] = vertex.position;
                let [nx, ny, nz] = vertex.normal;
                let [u, v] = options.uv(vertex.uv);

                let links: Vec<(usize, f32)> = match (influences, &remap) {
                    (Some(influences), Some(remap)) => influences[index as usize]
                        .iter()
                        .map(|(bone, weight)| (remap[bone as usize], weight))
                        .collect(),
                    _ => Vec::new(),
                };
                let dominant = links
                    .iter()
                    .fold(None, |best: Option<(usize, f32)>, &(bone, weight)| match best {
                        Some((_, w)) if w >= weight => best,
                        _ => Some((bone, weight)),
                    })
                    .map_or(0, |(bone, _)| bone);

                write!(
                    out,
                    "{dominant} {px:.6} {py:.6} {pz:.6} {nx:.6} {ny:.6} {nz:.6} {u:.6} {v:.6}"
                )?;
                if links.is_empty() {
                    writeln!(out, " 1 0 1.000000")?;
                } else {
                    write!(out, " {}", links.len())?;
                    for (bone, weight) in &links {
                        write!(out, " {bone} {weight:.6}")?;
                    }
                    writeln!(out)?;
                }
            }
        }
    }
    writeln!(out, "end")?;

    Ok(out)
}
