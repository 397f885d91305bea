use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::resources::mesh::Mesh;

pub struct SphereOptions {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for SphereOptions {
    fn default() -> Self {
        Self {
            radius: 1.0,
            width_segments: 32,
            height_segments: 16,
        }
    }
}

/// A UV sphere, Y-up, rings from the south pole to the north pole.
#[must_use]
pub fn create_sphere(options: &SphereOptions) -> Mesh {
    let width_segments = options.width_segments.max(3);
    let height_segments = options.height_segments.max(2);

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut tex_coords = Vec::new();
    let mut indices = Vec::new();

    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        let theta = v * PI;
        for x in 0..=width_segments {
            let u = x as f32 / width_segments as f32;
            let phi = u * 2.0 * PI;
            let normal = Vec3::new(-theta.sin() * phi.cos(), -theta.cos(), theta.sin() * phi.sin());
            vertices.push(options.radius * normal);
            normals.push(normal);
            tex_coords.push(Vec2::new(u, v));
        }
    }

    let stride = width_segments + 1;
    for y in 0..height_segments {
        for x in 0..width_segments {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = v0 + stride;
            let v3 = v2 + 1;
            // the pole rows would only produce degenerate triangles
            if y != 0 {
                indices.extend_from_slice(&[v0, v1, v2]);
            }
            if y != height_segments - 1 {
                indices.extend_from_slice(&[v1, v3, v2]);
            }
        }
    }

    let mut mesh = Mesh::new();
    mesh.set_vertices(&vertices);
    mesh.set_normals(&normals);
    mesh.set_tex_coords(&tex_coords);
    mesh.set_indices(&indices);
    mesh
}
