use glam::{Vec2, Vec3};

use crate::resources::mesh::Mesh;

// (outward normal, in-face "right" axis, in-face "up" axis)
const FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
];

/// An axis-aligned box centered on the origin: 4 vertices per face so each
/// face gets flat normals and its own 0..1 texture coordinates.
#[must_use]
pub fn create_box(width: f32, height: f32, depth: f32) -> Mesh {
    let half = Vec3::new(width, height, depth) * 0.5;

    let mut vertices = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut tex_coords = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, right, up) in FACES {
        let base = vertices.len() as u32;
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let corner = normal + (2.0 * u - 1.0) * right + (2.0 * v - 1.0) * up;
            vertices.push(corner * half);
            normals.push(normal);
            tex_coords.push(Vec2::new(u, v));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let mut mesh = Mesh::new();
    mesh.set_vertices(&vertices);
    mesh.set_normals(&normals);
    mesh.set_tex_coords(&tex_coords);
    mesh.set_indices(&indices);
    mesh
}
