//! GPU-side layouts for the trace kernel and the primitive lists fed to it.
//!
//! Every struct here is `#[repr(C)]` + `Pod` and mirrors a WGSL struct in
//! `trace.wgsl`. All members are 16-byte aligned so the same layout works in
//! uniform and storage address spaces.

use bytemuck::{Pod, Zeroable};

use super::flatten::FlattenedTriangles;
use crate::scene::{Instance, MeshKind, ObjectManager};
use crate::util::{rotation_matrix, Error, Mat4, Result, Vec3};

/// Capacity of the sphere array in [`GpuPrimitives`].
pub const MAX_SPHERES: usize = 32;
/// Capacity of the torus array in [`GpuPrimitives`].
pub const MAX_TORI: usize = 16;
/// Capacity of the triangle-mesh range array in [`GpuPrimitives`].
pub const MAX_TRIANGLE_MESHES: usize = 64;

/// Minor radius of a torus relative to its major radius.
///
/// Matches the raster template (major 1, minor 0.1), whose tube grows with
/// the instance scale, so both views show the same torus at any size.
pub const TORUS_MINOR_RATIO: f32 = 0.1;

/// Label and capacity of the primitive list that instances of `kind` go to.
pub fn capacity_for(kind: MeshKind) -> (&'static str, usize) {
    match kind {
        MeshKind::Sphere => ("spheres", MAX_SPHERES),
        MeshKind::Torus => ("tori", MAX_TORI),
        _ => ("triangle meshes", MAX_TRIANGLE_MESHES),
    }
}

/// World-space triangle with a single face normal (64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuTriangle {
    pub v0: [f32; 4],
    pub v1: [f32; 4],
    pub v2: [f32; 4],
    pub normal: [f32; 4],
}

impl GpuTriangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, normal: Vec3) -> Self {
        Self {
            v0: v0.extend(0.0).to_array(),
            v1: v1.extend(0.0).to_array(),
            v2: v2.extend(0.0).to_array(),
            normal: normal.extend(0.0).to_array(),
        }
    }
}

/// Material attributes shared by all primitive kinds (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    /// rgb = albedo, a = smoothness
    pub color: [f32; 4],
    /// rgb = emissive color, a = emission strength
    pub emission: [f32; 4],
    /// x = reflectivity
    pub params: [f32; 4],
}

impl From<&Instance> for GpuMaterial {
    fn from(inst: &Instance) -> Self {
        Self {
            color: inst.color().extend(inst.smoothness()).to_array(),
            emission: inst.emissive_color().extend(inst.emission_strength()).to_array(),
            params: [inst.reflectivity(), 0.0, 0.0, 0.0],
        }
    }
}

/// Analytic sphere (64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    /// xyz = center, w = radius
    pub center_radius: [f32; 4],
    pub material: GpuMaterial,
}

/// Analytic torus around its local +Y axis (128 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuTorus {
    /// xyz = center, w = major radius
    pub center_major: [f32; 4],
    /// x = minor radius
    pub minor: [f32; 4],
    /// Rows of the world-to-local rotation.
    pub inv_rotation: [[f32; 4]; 3],
    pub material: GpuMaterial,
}

/// Range `[start, end)` of the triangle buffer sharing one material (64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuTriangleMesh {
    /// x = start, y = end
    pub range: [u32; 4],
    pub material: GpuMaterial,
}

/// Fixed-capacity primitive arrays, uploaded as one uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuPrimitives {
    /// x = spheres, y = tori, z = triangle meshes
    pub counts: [u32; 4],
    pub spheres: [GpuSphere; MAX_SPHERES],
    pub tori: [GpuTorus; MAX_TORI],
    pub meshes: [GpuTriangleMesh; MAX_TRIANGLE_MESHES],
}

/// Per-dispatch parameters (96 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuTraceParams {
    /// Camera-to-world matrix (inverse view).
    pub camera_to_world: [[f32; 4]; 4],
    /// xyz = camera position, w = tan(fov_y / 2)
    pub camera_position: [f32; 4],
    pub image_size: [u32; 2],
    /// Samples already accumulated in the read image.
    pub sample_index: u32,
    pub max_bounces: u32,
}

impl GpuTraceParams {
    /// Build from a view matrix and vertical field of view in radians.
    pub fn new(view: Mat4, fov_y: f32, image_size: (u32, u32), sample_index: u32, max_bounces: u32) -> Self {
        let camera_to_world = view.inverse();
        let position = camera_to_world.w_axis.truncate();
        Self {
            camera_to_world: camera_to_world.to_cols_array_2d(),
            camera_position: position.extend((fov_y * 0.5).tan()).to_array(),
            image_size: [image_size.0, image_size.1],
            sample_index,
            max_bounces,
        }
    }
}

/// Per-kind primitive lists for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimitiveLists {
    pub spheres: Vec<GpuSphere>,
    pub tori: Vec<GpuTorus>,
    pub meshes: Vec<GpuTriangleMesh>,
}

impl PrimitiveLists {
    /// Gather spheres, tori and triangle ranges with their materials.
    ///
    /// Fails with [`Error::CapacityExceeded`] instead of truncating.
    pub fn build(scene: &ObjectManager, flat: &FlattenedTriangles) -> Result<Self> {
        let mut lists = Self::default();

        if let Ok(spheres) = scene.instances_of_mesh_named(MeshKind::Sphere.name()) {
            for &h in spheres {
                let inst = scene.instance(h)?;
                lists.spheres.push(GpuSphere {
                    center_radius: inst.position().extend(inst.scale().x).to_array(),
                    material: inst.into(),
                });
            }
        }

        if let Ok(tori) = scene.instances_of_mesh_named(MeshKind::Torus.name()) {
            for &h in tori {
                let inst = scene.instance(h)?;
                let major = inst.scale().x;
                let inv = rotation_matrix(inst.rotation()).transpose();
                lists.tori.push(GpuTorus {
                    center_major: inst.position().extend(major).to_array(),
                    // Tube scales with the instance like the raster mesh
                    minor: [major * TORUS_MINOR_RATIO, 0.0, 0.0, 0.0],
                    inv_rotation: [
                        inv.row(0).to_array(),
                        inv.row(1).to_array(),
                        inv.row(2).to_array(),
                    ],
                    material: inst.into(),
                });
            }
        }

        for range in &flat.ranges {
            let inst = scene.instance(range.instance)?;
            lists.meshes.push(GpuTriangleMesh {
                range: [range.start, range.end, 0, 0],
                material: inst.into(),
            });
        }

        lists.check_capacity()?;
        Ok(lists)
    }

    fn check_capacity(&self) -> Result<()> {
        let checks = [
            ("spheres", self.spheres.len(), MAX_SPHERES),
            ("tori", self.tori.len(), MAX_TORI),
            ("triangle meshes", self.meshes.len(), MAX_TRIANGLE_MESHES),
        ];
        for (kind, len, capacity) in checks {
            if len > capacity {
                return Err(Error::CapacityExceeded { kind, capacity });
            }
        }
        Ok(())
    }

    /// Pack into the fixed-size uniform layout.
    pub fn to_gpu(&self) -> GpuPrimitives {
        let mut out = GpuPrimitives::zeroed();
        let ns = self.spheres.len().min(MAX_SPHERES);
        let nt = self.tori.len().min(MAX_TORI);
        let nm = self.meshes.len().min(MAX_TRIANGLE_MESHES);
        out.spheres[..ns].copy_from_slice(&self.spheres[..ns]);
        out.tori[..nt].copy_from_slice(&self.tori[..nt]);
        out.meshes[..nm].copy_from_slice(&self.meshes[..nm]);
        out.counts = [ns as u32, nt as u32, nm as u32, 0];
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathtracer::flatten::flatten;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<GpuTriangle>(), 64);
        assert_eq!(std::mem::size_of::<GpuMaterial>(), 48);
        assert_eq!(std::mem::size_of::<GpuSphere>(), 64);
        assert_eq!(std::mem::size_of::<GpuTorus>(), 128);
        assert_eq!(std::mem::size_of::<GpuTriangleMesh>(), 64);
        assert_eq!(std::mem::size_of::<GpuTraceParams>(), 96);
        assert_eq!(
            std::mem::size_of::<GpuPrimitives>(),
            16 + 64 * MAX_SPHERES + 128 * MAX_TORI + 64 * MAX_TRIANGLE_MESHES
        );
    }

    #[test]
    fn test_build_lists() {
        let mut scene = ObjectManager::default();
        let ball = Instance::new(Vec3::X).with_transform(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, Vec3::splat(0.5));
        scene.add_instance_by_name("Sphere", Some(ball)).unwrap();
        scene.add_instance_by_name("Torus", None).unwrap();
        scene.add_instance_by_name("Plane", None).unwrap();

        let flat = flatten(&scene);
        let lists = PrimitiveLists::build(&scene, &flat).unwrap();
        assert_eq!(lists.spheres.len(), 1);
        assert_eq!(lists.spheres[0].center_radius, [0.0, 1.0, 0.0, 0.5]);
        assert_eq!(lists.spheres[0].material.color[0], 1.0);
        assert_eq!(lists.tori.len(), 1);
        assert!((lists.tori[0].minor[0] - 0.1).abs() < 1e-6);
        assert_eq!(lists.meshes.len(), 1);
        assert_eq!(lists.meshes[0].range[..2], [0, 2]);

        let gpu = lists.to_gpu();
        assert_eq!(gpu.counts, [1, 1, 1, 0]);
    }

    #[test]
    fn test_torus_tube_follows_template() {
        let mut scene = ObjectManager::default();
        let ring = Instance::default().with_transform(Vec3::ZERO, Vec3::ZERO, Vec3::splat(3.0));
        scene.add_instance_by_name("Torus", Some(ring)).unwrap();
        let lists = PrimitiveLists::build(&scene, &flatten(&scene)).unwrap();

        let params = crate::scene::TemplateParams::default();
        let ratio = params.torus_minor_radius / params.torus_major_radius;
        assert!((ratio - TORUS_MINOR_RATIO).abs() < 1e-6);
        assert_eq!(lists.tori[0].center_major[3], 3.0);
        assert!((lists.tori[0].minor[0] - 3.0 * ratio).abs() < 1e-6);
    }

    #[test]
    fn test_torus_inverse_rotation() {
        let mut scene = ObjectManager::default();
        let ring = Instance::default().with_transform(Vec3::ZERO, Vec3::new(90.0, 0.0, 0.0), Vec3::ONE);
        scene.add_instance_by_name("Torus", Some(ring)).unwrap();
        let lists = PrimitiveLists::build(&scene, &flatten(&scene)).unwrap();
        let t = &lists.tori[0];

        // Local +Y maps to world +Z under a 90 degree X rotation, so the
        // inverse must map world +Z back to local +Y.
        let world = Vec3::Z;
        let local = Vec3::new(
            Vec3::from_slice(&t.inv_rotation[0][..3]).dot(world),
            Vec3::from_slice(&t.inv_rotation[1][..3]).dot(world),
            Vec3::from_slice(&t.inv_rotation[2][..3]).dot(world),
        );
        assert!((local - Vec3::Y).length() < 1e-5, "got {local:?}");
    }

    #[test]
    fn test_capacity_check() {
        let lists = PrimitiveLists {
            spheres: vec![GpuSphere::default(); MAX_SPHERES + 1],
            ..Default::default()
        };
        assert!(matches!(
            lists.check_capacity(),
            Err(Error::CapacityExceeded { kind: "spheres", capacity: MAX_SPHERES })
        ));
    }
}
