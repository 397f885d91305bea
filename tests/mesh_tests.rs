//! Mesh Tests
//!
//! Tests for:
//! - Index storage width selection (16-bit unless an index needs 32)
//! - Bounds and BVH maintenance on geometry changes
//! - Ray picking against indexed triangles
//! - Copy-on-write and version tokens
//! - Built-in primitives (box, plane, quad, sphere)
//! - GPU mirror: interleaved upload, re-upload only after a change

mod common;

use glam::{Mat4, Quat, Vec2, Vec3};

use myth_gl::renderer::device::{BufferTarget, BufferUsage, DeviceCommand, IndexType};
use myth_gl::resources::MeshIndices;
use myth_gl::{
    Camera, HeadlessDevice, Line, Material, Mesh, MeshTopology, PlaneOptions, SphereOptions,
    Transform, create_box, create_plane, create_quad, create_sphere, draw_mesh,
};

fn triangle() -> Mesh {
    let mut mesh = Mesh::new();
    mesh.set_vertices(&[Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)]);
    mesh.set_indices(&[0, 1, 2]);
    mesh
}

fn approx(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, 1e-4)
}

// ============================================================================
// Index Storage Tests
// ============================================================================

#[test]
fn small_indices_are_stored_as_u16() {
    let mesh = triangle();
    assert!(matches!(mesh.index_storage(), MeshIndices::U16(_)));
    assert_eq!(mesh.index_storage().index_type(), IndexType::U16);
    assert_eq!(mesh.indices(), vec![0, 1, 2]);
}

#[test]
fn large_indices_switch_to_u32() {
    let n = 70_000;
    let vertices: Vec<Vec3> = (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
    let mut mesh = Mesh::new();
    mesh.set_vertices(&vertices);
    mesh.set_indices(&[0, 1, 69_999]);

    assert!(matches!(mesh.index_storage(), MeshIndices::U32(_)));
    assert_eq!(mesh.indices(), vec![0, 1, 69_999]);
}

#[test]
fn u16_indices_read_back_as_u32() {
    let mut mesh = Mesh::new();
    mesh.set_vertices(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
    mesh.set_indices_u16(&[2, 1, 0]);
    assert_eq!(mesh.indices(), vec![2, 1, 0]);
    assert_eq!(mesh.num_indices(), 3);
}

// ============================================================================
// Bounds Tests
// ============================================================================

#[test]
fn empty_mesh_has_default_bounds() {
    let mesh = Mesh::new();
    assert_eq!(mesh.bounds().min, Vec3::ZERO);
    assert_eq!(mesh.bounds().max, Vec3::ZERO);
    assert!(mesh.bvh().is_empty());
}

#[test]
fn triangle_bounds_come_from_the_bvh() {
    let mesh = triangle();
    assert_eq!(mesh.bounds().min, Vec3::new(-1.0, -1.0, 0.0));
    assert_eq!(mesh.bounds().max, Vec3::new(1.0, 1.0, 0.0));
    assert_eq!(mesh.bvh().root_aabb(), Some(mesh.bounds()));
    assert_eq!(mesh.midpoint(), Vec3::ZERO);
}

#[test]
fn bounds_only_cover_indexed_vertices() {
    let mut mesh = Mesh::new();
    mesh.set_vertices(&[Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::splat(100.0)]);
    mesh.set_indices(&[0, 1, 2]);
    assert_eq!(mesh.bounds().max, Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn line_topology_bounds_skip_the_bvh() {
    let mut mesh = Mesh::new();
    mesh.set_vertices(&[Vec3::ZERO, Vec3::new(2.0, 3.0, 4.0)]);
    mesh.set_indices(&[0, 1]);
    mesh.set_topology(MeshTopology::Lines);

    assert!(mesh.bvh().is_empty());
    assert_eq!(mesh.bounds().max, Vec3::new(2.0, 3.0, 4.0));
}

#[test]
fn indices_before_vertices_leave_bounds_empty_until_valid() {
    let mut mesh = Mesh::new();
    mesh.set_indices(&[0, 1, 2]);
    assert_eq!(mesh.bounds().max, Vec3::ZERO);

    mesh.set_vertices(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
    assert_eq!(mesh.bounds().max, Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn transform_vertices_updates_bounds() {
    let mut mesh = triangle();
    mesh.transform_vertices(|v| v * 2.0 + Vec3::Z);
    assert_eq!(mesh.bounds().min, Vec3::new(-2.0, -2.0, 1.0));
    assert_eq!(mesh.bounds().max, Vec3::new(2.0, 2.0, 1.0));

    mesh.transform_vertices_with(&Transform::from_position(Vec3::new(0.0, 0.0, -1.0)));
    assert_eq!(mesh.bounds().min.z, 0.0);

    mesh.transform_vertices_with_matrix(&Mat4::from_scale(Vec3::splat(0.5)));
    assert_eq!(mesh.bounds().max, Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn clear_keeps_topology() {
    let mut mesh = triangle();
    mesh.set_topology(MeshTopology::Lines);
    mesh.clear();
    assert!(mesh.vertices().is_empty());
    assert_eq!(mesh.num_indices(), 0);
    assert_eq!(mesh.topology(), MeshTopology::Lines);
}

// ============================================================================
// Ray Picking Tests
// ============================================================================

#[test]
fn ray_hits_the_front_of_a_box() {
    let mesh = create_box(2.0, 2.0, 2.0);
    let hit = mesh
        .closest_ray_collision(&Line::new(Vec3::new(0.2, 0.3, 5.0), Vec3::NEG_Z))
        .expect("ray should hit the box");
    assert!((hit.distance - 4.0).abs() < 1e-5);
    assert!(approx(hit.position, Vec3::new(0.2, 0.3, 1.0)));
}

#[test]
fn ray_reports_the_nearest_of_several_triangles() {
    let mut mesh = Mesh::new();
    let mut vertices = Vec::new();
    for z in [-3.0, 0.0, 2.0] {
        vertices.extend([Vec3::new(-1.0, -1.0, z), Vec3::new(1.0, -1.0, z), Vec3::new(0.0, 1.0, z)]);
    }
    mesh.set_vertices(&vertices);
    mesh.set_indices(&[0, 1, 2, 3, 4, 5, 6, 7, 8]);

    let hit = mesh
        .closest_ray_collision(&Line::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z))
        .expect("ray should hit");
    assert!((hit.distance - 8.0).abs() < 1e-5);
}

#[test]
fn ray_missing_the_mesh_reports_none() {
    let mesh = create_box(1.0, 1.0, 1.0);
    assert!(
        mesh.closest_ray_collision(&Line::new(Vec3::new(5.0, 0.0, 5.0), Vec3::NEG_Z))
            .is_none()
    );
    assert!(Mesh::new().closest_ray_collision(&Line::new(Vec3::ZERO, Vec3::X)).is_none());
}

#[test]
fn ray_pointing_away_misses() {
    let mesh = triangle();
    assert!(mesh.closest_ray_collision(&Line::new(Vec3::new(0.0, 0.0, 1.0), Vec3::Z)).is_none());
}

// ============================================================================
// Copy-on-Write Tests
// ============================================================================

#[test]
fn clones_share_until_mutated() {
    let a = triangle();
    let mut b = a.clone();
    assert_eq!(a, b);
    let token = a.version();

    b.transform_vertices(|v| v + Vec3::X);
    assert_ne!(a, b);
    assert_eq!(a.version(), token);
    assert_ne!(b.version(), token);
    assert_eq!(a.bounds().min.x, -1.0);
    assert_eq!(b.bounds().min.x, 0.0);
}

// ============================================================================
// Primitive Tests
// ============================================================================

#[test]
fn box_has_flat_shaded_faces() {
    let mesh = create_box(2.0, 4.0, 6.0);
    assert_eq!(mesh.vertices().len(), 24);
    assert_eq!(mesh.normals().len(), 24);
    assert_eq!(mesh.tex_coords().len(), 24);
    assert_eq!(mesh.num_indices(), 36);
    assert!(approx(mesh.bounds().min, Vec3::new(-1.0, -2.0, -3.0)));
    assert!(approx(mesh.bounds().max, Vec3::new(1.0, 2.0, 3.0)));
}

#[test]
fn plane_faces_positive_z() {
    let mesh = create_plane(&PlaneOptions {
        width: 4.0,
        height: 2.0,
        width_segments: 2,
        height_segments: 3,
    });
    assert_eq!(mesh.vertices().len(), 3 * 4);
    assert_eq!(mesh.num_indices(), 2 * 3 * 6);
    assert!(mesh.normals().iter().all(|&n| n == Vec3::Z));
    assert!(approx(mesh.bounds().min, Vec3::new(-2.0, -1.0, 0.0)));
    assert!(approx(mesh.bounds().max, Vec3::new(2.0, 1.0, 0.0)));
    assert!(mesh.bounds().is_effectively_empty());
}

#[test]
fn quad_covers_clip_space_with_bottom_left_uv_origin() {
    let mesh = create_quad();
    assert_eq!(mesh.vertices().len(), 4);
    assert!(approx(mesh.bounds().min, Vec3::new(-1.0, -1.0, 0.0)));
    assert!(approx(mesh.bounds().max, Vec3::new(1.0, 1.0, 0.0)));

    let bottom_left = mesh
        .vertices()
        .iter()
        .position(|v| approx(*v, Vec3::new(-1.0, -1.0, 0.0)))
        .unwrap();
    assert_eq!(mesh.tex_coords()[bottom_left], Vec2::ZERO);
}

#[test]
fn sphere_normals_are_unit_and_bounds_match_radius() {
    let mesh = create_sphere(&SphereOptions {
        radius: 2.0,
        ..SphereOptions::default()
    });
    assert!(mesh.normals().iter().all(|n| (n.length() - 1.0).abs() < 1e-4));
    assert!(approx(mesh.bounds().min, Vec3::splat(-2.0)));
    assert!(approx(mesh.bounds().max, Vec3::splat(2.0)));
    assert_eq!(mesh.num_indices() % 3, 0);
}

// ============================================================================
// GPU Mirror Tests
// ============================================================================

fn vertex_buffer_uploads(device: &HeadlessDevice) -> Vec<usize> {
    device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::UploadBuffer {
                target: BufferTarget::Array,
                len,
                usage: BufferUsage::StaticDraw,
                ..
            } => Some(len),
            _ => None,
        })
        .collect()
}

#[test]
fn mesh_uploads_once_and_again_after_change() {
    let (device, ctx) = common::headless_context();
    let material: Material = common::basic_material(&ctx);
    let mut mesh = triangle();
    let mut camera = Camera::new();

    draw_mesh(&mesh, &Transform::IDENTITY, &material, &mut camera, None);
    camera.render_to_screen(&ctx);
    draw_mesh(&mesh, &Transform::IDENTITY, &material, &mut camera, None);
    camera.render_to_screen(&ctx);
    // positions only: 3 vertices * 12 bytes
    assert_eq!(vertex_buffer_uploads(&device), vec![36]);

    mesh.set_normals(&[Vec3::Z; 3]);
    draw_mesh(&mesh, &Transform::IDENTITY.with_rotation(Quat::from_rotation_y(0.5)), &material, &mut camera, None);
    camera.render_to_screen(&ctx);
    assert_eq!(vertex_buffer_uploads(&device), vec![36, 72]);
}

#[test]
fn draw_uses_the_mesh_index_type_and_count() {
    let (device, ctx) = common::headless_context();
    let material = common::basic_material(&ctx);
    let mut camera = Camera::new();

    draw_mesh(&create_box(1.0, 1.0, 1.0), &Transform::IDENTITY, &material, &mut camera, None);
    camera.render_to_screen(&ctx);

    let draws = device.draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].index_count, 36);
    assert_eq!(draws[0].index_type, IndexType::U16);
    assert_eq!(draws[0].topology, MeshTopology::Triangles);
}
