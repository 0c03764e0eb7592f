//! Flatten triangle-based instances into one world-space triangle buffer.
//!
//! Spheres and tori are intersected analytically and never flattened. The
//! flattened kinds are processed in [`MeshKind::FLATTENED`] order and, within
//! a kind, in the per-mesh instance order of the scene graph. Each instance
//! contributes one contiguous [`TriangleRange`].

use super::gpu_data::GpuTriangle;
use crate::scene::{InstanceHandle, MeshKind, ObjectManager};
use crate::util::Vec3;

/// Triangles `[start, end)` produced by one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleRange {
    pub instance: InstanceHandle,
    pub start: u32,
    pub end: u32,
}

impl TriangleRange {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Output of [`flatten`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedTriangles {
    pub triangles: Vec<GpuTriangle>,
    pub ranges: Vec<TriangleRange>,
}

impl FlattenedTriangles {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Triangle data as bytes.
    pub fn triangles_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }

    /// Range contributed by `instance`, if it is flattened.
    pub fn range_of(&self, instance: InstanceHandle) -> Option<&TriangleRange> {
        self.ranges.iter().find(|r| r.instance == instance)
    }

    /// True when `other` has the same triangle count and range layout, so
    /// its triangles can overwrite ours in place.
    pub fn retransform_compatible(&self, other: &Self) -> bool {
        self.triangles.len() == other.triangles.len() && self.ranges == other.ranges
    }
}

/// Build the world-space triangle buffer for every flattened instance.
///
/// Vertices are transformed by the model matrix and normals by its
/// inverse-transpose. Each triangle carries the normal of its first vertex.
#[tracing::instrument(skip_all)]
pub fn flatten(scene: &ObjectManager) -> FlattenedTriangles {
    let mut out = FlattenedTriangles::default();
    let registry = scene.registry();

    let mut world_positions: Vec<Vec3> = Vec::new();
    let mut world_normals: Vec<Vec3> = Vec::new();

    for kind in MeshKind::FLATTENED {
        let Some(mesh) = registry.handle_of(kind) else {
            continue;
        };
        let (Ok(template), Ok(handles)) = (registry.lookup(mesh), scene.instances_of_mesh(mesh)) else {
            continue;
        };
        let indices = template.indices();

        for &handle in handles {
            let Ok(inst) = scene.instance(handle) else {
                continue;
            };
            let model = inst.model();
            let normal_mat = inst.normal_matrix();

            world_positions.clear();
            world_positions.extend(template.positions().iter().map(|p| model.transform_point3(*p)));
            world_normals.clear();
            world_normals.extend(template.normals().iter().map(|n| (normal_mat * *n).normalize_or_zero()));

            let start = out.triangles.len() as u32;
            for tri in indices.chunks_exact(3) {
                let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                out.triangles.push(GpuTriangle::new(
                    world_positions[i0],
                    world_positions[i1],
                    world_positions[i2],
                    world_normals[i0],
                ));
            }
            out.ranges.push(TriangleRange {
                instance: handle,
                start,
                end: out.triangles.len() as u32,
            });
        }
    }

    tracing::debug!(
        "flattened {} instances into {} triangles",
        out.ranges.len(),
        out.triangles.len()
    );
    out
}
