use glam::{Vec2, Vec3};

use crate::resources::mesh::Mesh;

pub struct PlaneOptions {
    pub width: f32,
    pub height: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for PlaneOptions {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            width_segments: 1,
            height_segments: 1,
        }
    }
}

/// A grid in the XY plane facing +Z, texture origin bottom-left.
#[must_use]
pub fn create_plane(options: &PlaneOptions) -> Mesh {
    let grid_x = options.width_segments.max(1);
    let grid_y = options.height_segments.max(1);
    let segment = Vec2::new(options.width / grid_x as f32, options.height / grid_y as f32);
    let half = 0.5 * Vec2::new(options.width, options.height);

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut tex_coords = Vec::new();
    let mut indices = Vec::new();

    // rows run top to bottom
    for iy in 0..=grid_y {
        let y = half.y - iy as f32 * segment.y;
        for ix in 0..=grid_x {
            let x = ix as f32 * segment.x - half.x;
            vertices.push(Vec3::new(x, y, 0.0));
            normals.push(Vec3::Z);
            tex_coords.push(Vec2::new(ix as f32 / grid_x as f32, 1.0 - iy as f32 / grid_y as f32));
        }
    }

    let row = grid_x + 1;
    for iy in 0..grid_y {
        for ix in 0..grid_x {
            let top_left = ix + row * iy;
            let bottom_left = ix + row * (iy + 1);
            let bottom_right = bottom_left + 1;
            let top_right = top_left + 1;
            indices.extend_from_slice(&[top_left, bottom_left, top_right, bottom_left, bottom_right, top_right]);
        }
    }

    let mut mesh = Mesh::new();
    mesh.set_vertices(&vertices);
    mesh.set_normals(&normals);
    mesh.set_tex_coords(&tex_coords);
    mesh.set_indices(&indices);
    mesh
}

/// A 2x2 quad covering normalized device coordinates, used for blits.
#[must_use]
pub fn create_quad() -> Mesh {
    create_plane(&PlaneOptions {
        width: 2.0,
        height: 2.0,
        ..PlaneOptions::default()
    })
}
