//! Procedural geometry for the built-in mesh templates.
//!
//! All shapes are centered at the origin and use counter-clockwise winding
//! when seen from the side the normals point to.

use crate::util::{Vec2, Vec3};
use std::f32::consts::PI;

/// Raw indexed geometry produced by the generators.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Option<Vec<Vec2>>,
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push_face(&mut self, normal: Vec3, u: Vec3, v: Vec3, center: Vec3, inward: bool) {
        let base = self.positions.len() as u32;
        let corners = [center - u - v, center + u - v, center + u + v, center - u + v];
        let n = if inward { -normal } else { normal };
        for c in corners {
            self.positions.push(c);
            self.normals.push(n);
        }
        if inward {
            self.indices
                .extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
        } else {
            self.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }

    fn push_quad_uvs(&mut self) {
        let uvs = self.uvs.get_or_insert_with(Vec::new);
        uvs.extend_from_slice(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]);
    }
}

// (normal, u, v) per face with u x v == normal.
// Order: back, front, left, right, bottom, top.
const CUBE_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
];

/// Cube spanning `[-1, 1]^3`: 24 vertices, 12 triangles.
///
/// With `inward` set the faces and normals point into the cube, which makes
/// it usable as a closed room.
pub fn cube(inward: bool) -> MeshData {
    let mut mesh = MeshData::default();
    for (n, u, v) in CUBE_FACES {
        mesh.push_face(n, u, v, n, inward);
    }
    mesh
}

/// 2x2 plane in XZ facing +Y.
pub fn plane() -> MeshData {
    let mut mesh = MeshData::default();
    mesh.push_face(Vec3::Y, Vec3::X, Vec3::NEG_Z, Vec3::ZERO, false);
    mesh.push_quad_uvs();
    mesh
}

/// 2x2 quad in XY facing +Z.
pub fn quad() -> MeshData {
    let mut mesh = MeshData::default();
    mesh.push_face(Vec3::Z, Vec3::X, Vec3::Y, Vec3::ZERO, false);
    mesh.push_quad_uvs();
    mesh
}

/// Unit UV sphere with `resolution` segments in both directions.
pub fn sphere(resolution: u32) -> MeshData {
    let res = resolution.max(3);
    let mut mesh = MeshData::default();
    let mut uvs = Vec::with_capacity(((res + 1) * (res + 1)) as usize);

    for j in 0..=res {
        let theta = j as f32 * PI / res as f32;
        for i in 0..=res {
            let phi = i as f32 * 2.0 * PI / res as f32;
            let p = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            mesh.positions.push(p);
            mesh.normals.push(p);
            uvs.push(Vec2::new(i as f32 / res as f32, j as f32 / res as f32));
        }
    }

    let row = res + 1;
    for j in 0..res {
        for i in 0..res {
            let current = j * row + i;
            let next = current + 1;
            let below = current + row;
            let below_next = below + 1;
            mesh.indices.extend_from_slice(&[current, next, below]);
            mesh.indices.extend_from_slice(&[next, below_next, below]);
        }
    }

    mesh.uvs = Some(uvs);
    mesh
}

/// Torus around the +Y axis.
///
/// `rings` segments go around the axis, `sides` around the tube.
pub fn torus(major_radius: f32, minor_radius: f32, rings: u32, sides: u32) -> MeshData {
    let rings = rings.max(3);
    let sides = sides.max(3);
    let mut mesh = MeshData::default();
    let mut uvs = Vec::with_capacity(((rings + 1) * (sides + 1)) as usize);

    for i in 0..=rings {
        let u = i as f32 * 2.0 * PI / rings as f32;
        for j in 0..=sides {
            let v = j as f32 * 2.0 * PI / sides as f32;
            let n = Vec3::new(v.cos() * u.cos(), v.sin(), v.cos() * u.sin());
            let ring_center = Vec3::new(u.cos(), 0.0, u.sin()) * major_radius;
            mesh.positions.push(ring_center + n * minor_radius);
            mesh.normals.push(n);
            uvs.push(Vec2::new(i as f32 / rings as f32, j as f32 / sides as f32));
        }
    }

    let row = sides + 1;
    for i in 0..rings {
        for j in 0..sides {
            let current = i * row + j;
            let next = current + row;
            let up = current + 1;
            let next_up = next + 1;
            mesh.indices.extend_from_slice(&[current, up, next]);
            mesh.indices.extend_from_slice(&[next, up, next_up]);
        }
    }

    mesh.uvs = Some(uvs);
    mesh
}
