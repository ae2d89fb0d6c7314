//! Neutral in-memory mesh model.

use crate::math::Mat4;
use crate::{MeshError, Result};

/// Maximum number of bone influences per vertex.
pub const MAX_INFLUENCES: usize = 4;

/// A single vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Texture coordinate, `None` when the mesh carries no UV layer
    pub uv: Option<[f32; 2]>,
}

/// A contiguous range of vertices and triangles drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubMesh {
    pub vertex_start: usize,
    pub vertex_count: usize,
    pub face_start: usize,
    pub face_count: usize,
    pub uv_layers: u8,
    pub color_channels: u8,
}

impl SubMesh {
    /// Vertex indices covered. An end past `usize::MAX` saturates; `validate`
    /// rejects such ranges.
    pub fn vertex_range(&self) -> std::ops::Range<usize> {
        self.vertex_start..self.vertex_start.saturating_add(self.vertex_count)
    }

    pub fn face_range(&self) -> std::ops::Range<usize> {
        self.face_start..self.face_start.saturating_add(self.face_count)
    }

    /// True when both ranges end at or before the given totals.
    pub fn fits(&self, vertex_count: usize, face_count: usize) -> bool {
        let vertex_end = self.vertex_start.checked_add(self.vertex_count);
        let face_end = self.face_start.checked_add(self.face_count);
        matches!(
            (vertex_end, face_end),
            (Some(v), Some(f)) if v <= vertex_count && f <= face_count
        )
    }
}

/// A skeleton joint.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone; `None` for roots
    pub parent: Option<usize>,
    /// World-space bind transform
    pub transform: Mat4,
    /// Inverse of `transform`, absent when the transform is singular
    pub inverse_bind: Option<Mat4>,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            parent,
            transform,
            inverse_bind: transform.inverse(),
        }
    }
}

/// Bone order produced by [`Skeleton::depth_first`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthFirst {
    /// Original bone indices, parents before children
    pub order: Vec<usize>,
    /// Maps an original bone index to its position in `order`
    pub remap: Vec<usize>,
}

impl DepthFirst {
    /// Parent of the bone at `position` in `order`, expressed in new indices.
    pub fn parent_of(&self, skeleton: &Skeleton, position: usize) -> Option<usize> {
        skeleton.bones[self.order[position]]
            .parent
            .map(|parent| self.remap[parent])
    }
}

/// Bone hierarchy stored as an arena; parents are referenced by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Self {
        Self { bones }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Indices of bones without a parent.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, bone)| bone.parent.is_none())
            .map(|(index, _)| index)
    }

    /// Direct children of `index`, in storage order.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, bone)| bone.parent == Some(index))
            .map(|(child, _)| child)
    }

    /// Pre-order traversal from every root.
    ///
    /// Bones that cannot be reached from a root (only possible on a skeleton
    /// that fails [`validate`](Self::validate)) are appended in storage order
    /// so the remap stays total.
    pub fn depth_first(&self) -> DepthFirst {
        let count = self.bones.len();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut stack = Vec::new();
        for (index, bone) in self.bones.iter().enumerate() {
            match bone.parent {
                Some(parent) if parent < count => children[parent].push(index),
                Some(_) => {}
                None => stack.push(index),
            }
        }
        stack.reverse();

        let mut order = Vec::with_capacity(count);
        let mut visited = vec![false; count];
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut visited[index], true) {
                continue;
            }
            order.push(index);
            stack.extend(children[index].iter().rev().copied());
        }
        for (index, seen) in visited.iter().enumerate() {
            if !seen {
                order.push(index);
            }
        }

        let mut remap = vec![0; count];
        for (position, &index) in order.iter().enumerate() {
            remap[index] = position;
        }
        DepthFirst { order, remap }
    }

    /// Transform of `index` relative to its parent.
    pub fn local_transform(&self, index: usize) -> Mat4 {
        let bone = &self.bones[index];
        let parent_inverse = bone
            .parent
            .and_then(|parent| self.bones.get(parent))
            .and_then(|parent| parent.inverse_bind.or_else(|| parent.transform.inverse()));
        match parent_inverse {
            Some(inverse) => bone.transform * inverse,
            None => bone.transform,
        }
    }

    /// Check that parents are in range and the hierarchy is acyclic.
    pub fn validate(&self) -> Result<()> {
        let count = self.bones.len();
        for (bone, entry) in self.bones.iter().enumerate() {
            if let Some(parent) = entry.parent {
                if parent >= count {
                    return Err(MeshError::InvalidParent { bone, parent });
                }
            }
        }

        // 0 = unvisited, 1 = on the current walk, 2 = known to reach a root
        let mut state = vec![0u8; count];
        for start in 0..count {
            let mut walk = Vec::new();
            let mut current = Some(start);
            while let Some(index) = current {
                match state[index] {
                    2 => break,
                    1 => return Err(MeshError::BoneCycle { bone: index }),
                    _ => {
                        state[index] = 1;
                        walk.push(index);
                        current = self.bones[index].parent;
                    }
                }
            }
            for index in walk {
                state[index] = 2;
            }
        }
        Ok(())
    }
}

/// Per-vertex skinning slots.
///
/// A slot is `(bone, weight)`; `None` marks an unused slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Influences {
    pub slots: [(Option<u16>, f32); MAX_INFLUENCES],
}

impl Influences {
    pub fn new(slots: [(Option<u16>, f32); MAX_INFLUENCES]) -> Self {
        Self { slots }
    }

    /// Used slots only.
    pub fn iter(&self) -> impl Iterator<Item = (u16, f32)> + '_ {
        self.slots
            .iter()
            .filter_map(|&(bone, weight)| bone.map(|bone| (bone, weight)))
    }

    /// Bone with the largest weight.
    pub fn dominant(&self) -> Option<u16> {
        self.iter()
            .fold(None, |best: Option<(u16, f32)>, (bone, weight)| match best {
                Some((_, w)) if w >= weight => best,
                _ => Some((bone, weight)),
            })
            .map(|(bone, _)| bone)
    }
}

/// Whether the mesh carries a skeleton.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Rigging {
    #[default]
    Static,
    Skinned {
        skeleton: Skeleton,
        /// One entry per vertex
        influences: Vec<Influences>,
    },
}

/// A decoded mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshModel {
    /// Format version byte from the header
    pub version: u8,
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<[u32; 3]>,
    pub submeshes: Vec<SubMesh>,
    pub rigging: Rigging,
}

impl MeshModel {
    pub fn skeleton(&self) -> Option<&Skeleton> {
        match &self.rigging {
            Rigging::Static => None,
            Rigging::Skinned { skeleton, .. } => Some(skeleton),
        }
    }

    pub fn influences(&self) -> Option<&[Influences]> {
        match &self.rigging {
            Rigging::Static => None,
            Rigging::Skinned { influences, .. } => Some(influences),
        }
    }

    pub fn is_skinned(&self) -> bool {
        matches!(self.rigging, Rigging::Skinned { .. })
    }

    pub fn has_uvs(&self) -> bool {
        self.vertices.iter().any(|v| v.uv.is_some())
    }

    /// Sub-meshes, or one range covering the whole model when none are recorded.
    pub fn submesh_ranges(&self) -> Vec<SubMesh> {
        if self.submeshes.is_empty() {
            vec![SubMesh {
                vertex_start: 0,
                vertex_count: self.vertices.len(),
                face_start: 0,
                face_count: self.triangles.len(),
                uv_layers: u8::from(self.has_uvs()),
                color_channels: 0,
            }]
        } else {
            self.submeshes.clone()
        }
    }

    /// Re-check every structural invariant.
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertices.len();

        for (triangle, face) in self.triangles.iter().enumerate() {
            if let Some(&index) = face.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::FaceIndexOutOfRange {
                    triangle,
                    index,
                    vertex_count,
                });
            }
        }

        for (index, submesh) in self.submeshes.iter().enumerate() {
            if !submesh.fits(vertex_count, self.triangles.len()) {
                return Err(MeshError::SubMeshOutOfRange { index });
            }
        }

        if let Rigging::Skinned {
            skeleton,
            influences,
        } = &self.rigging
        {
            skeleton.validate()?;
            if influences.len() != vertex_count {
                return Err(MeshError::InfluenceCountMismatch {
                    influences: influences.len(),
                    vertices: vertex_count,
                });
            }
            for (vertex, slots) in influences.iter().enumerate() {
                if let Some((bone, _)) = slots.iter().find(|&(b, _)| b as usize >= skeleton.len())
                {
                    return Err(MeshError::BoneIndexOutOfRange {
                        vertex,
                        bone,
                        bone_count: skeleton.len(),
                    });
                }
            }
        }

        Ok(())
    }
}
