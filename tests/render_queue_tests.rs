//! Render Queue Tests
//!
//! Tests for:
//! - Flush ordering: opaque grouped by material/block/mesh, transparent
//!   back-to-front, non-depth-tested runs kept in place
//! - Depth-test and blending state per run
//! - Batching: one program bind per material batch
//! - Instancing: one instanced draw per batch when the shader takes its
//!   model matrix as a vertex attribute
//! - Per-object model/normal matrix uniforms
//! - The queue is empty after every flush

mod common;

use glam::{Mat3, Mat4, Vec3};

use myth_gl::math::normal_matrix;
use myth_gl::renderer::device::{BufferTarget, BufferUsage, DeviceCommand, RecordedUniform};
use myth_gl::{
    Camera, GraphicsContext, HeadlessDevice, Material, MaterialPropertyBlock, Mesh, Shader, Transform,
    create_box, create_quad, draw_mesh, draw_mesh_with_matrix,
};

const NORMAL_MAT_VERTEX_SHADER: &str = r"#version 330 core

layout(location = 0) in vec3 aPos;

uniform mat4 uViewProjMat;
uniform mat4 uModelMat;
uniform mat3 uNormalMat;

void main()
{
    gl_Position = uViewProjMat * uModelMat * vec4(aPos, 1.0);
}
";

/// Declares both the instanced attribute and the per-object uniform.
const MIXED_VERTEX_SHADER: &str = r"#version 330 core

layout(location = 0) in vec3 aPos;
layout(location = 6) in mat4 aModelMat;

uniform mat4 uViewProjMat;
uniform mat4 uModelMat;

void main()
{
    gl_Position = uViewProjMat * aModelMat * uModelMat * vec4(aPos, 1.0);
}
";

fn tagged(index: i32) -> MaterialPropertyBlock {
    let mut block = MaterialPropertyBlock::new();
    block.set_int("uIndex", index);
    block
}

fn at_z(z: f32) -> Transform {
    Transform::from_position(Vec3::new(0.0, 0.0, z))
}

/// The order in which tagged draws reached the device.
fn draw_order(device: &HeadlessDevice, material: &Material) -> Vec<i32> {
    let location = material.shader().property("uIndex").unwrap().location();
    common::int_writes(device, location)
}

fn program_binds(device: &HeadlessDevice) -> usize {
    device
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::UseProgram(Some(_))))
        .count()
}

fn transparent_material(ctx: &GraphicsContext) -> Material {
    let mut material = common::basic_material(ctx);
    material.set_transparent(true);
    material
}

// ============================================================================
// Ordering Tests
// ============================================================================

#[test]
fn opaque_draws_are_grouped_by_material() {
    let (device, ctx) = common::headless_context();
    let a = common::basic_material(&ctx);
    let b = common::basic_material(&ctx);
    let mesh = create_quad();
    let mut camera = Camera::new();

    for (i, material) in [&a, &b, &a, &b].into_iter().enumerate() {
        draw_mesh(&mesh, &Transform::IDENTITY, material, &mut camera, Some(&tagged(i as i32)));
    }
    camera.render_to_screen(&ctx);

    // both shaders place uIndex at the same location
    assert_eq!(draw_order(&device, &a), vec![0, 2, 1, 3]);
    assert_eq!(program_binds(&device), 2);
}

#[test]
fn equal_property_blocks_share_a_batch() {
    let (device, ctx) = common::headless_context();
    let material = common::basic_material(&ctx);
    let mesh = create_quad();
    let mut camera = Camera::new();

    draw_mesh(&mesh, &Transform::IDENTITY, &material, &mut camera, Some(&tagged(5)));
    draw_mesh(&mesh, &Transform::IDENTITY, &material, &mut camera, Some(&tagged(6)));
    draw_mesh(&mesh, &Transform::IDENTITY, &material, &mut camera, Some(&tagged(5)));
    camera.render_to_screen(&ctx);

    // one bind per distinct block, three draws
    assert_eq!(draw_order(&device, &material), vec![5, 6]);
    assert_eq!(device.draw_calls().len(), 3);
    assert_eq!(program_binds(&device), 1);
}

#[test]
fn transparent_draws_follow_opaque_back_to_front() {
    let (device, ctx) = common::headless_context();
    let opaque = common::basic_material(&ctx);
    let transparent = transparent_material(&ctx);
    let mesh = create_quad();
    let mut camera = Camera::new();

    draw_mesh(&mesh, &at_z(-1.0), &transparent, &mut camera, Some(&tagged(1)));
    draw_mesh(&mesh, &at_z(-3.0), &opaque, &mut camera, Some(&tagged(0)));
    draw_mesh(&mesh, &at_z(-10.0), &transparent, &mut camera, Some(&tagged(10)));
    draw_mesh(&mesh, &at_z(-5.0), &transparent, &mut camera, Some(&tagged(5)));
    camera.render_to_screen(&ctx);

    assert_eq!(draw_order(&device, &opaque), vec![0, 10, 5, 1]);

    let blending: Vec<bool> = device.draw_calls().iter().map(|d| d.blending).collect();
    assert_eq!(blending, vec![false, true, true, true]);
}

#[test]
fn transparent_distance_uses_the_world_space_midpoint() {
    let (device, ctx) = common::headless_context();
    let material = transparent_material(&ctx);
    let mut camera = Camera::new();

    // the near transform carries a far-away mesh
    let mut offset = create_quad();
    offset.transform_vertices(|v| v + Vec3::new(0.0, 0.0, -20.0));

    draw_mesh(&create_quad(), &at_z(-8.0), &material, &mut camera, Some(&tagged(8)));
    draw_mesh(&offset, &at_z(-2.0), &material, &mut camera, Some(&tagged(22)));
    camera.render_to_screen(&ctx);

    assert_eq!(draw_order(&device, &material), vec![22, 8]);
}

#[test]
fn camera_position_decides_transparent_order() {
    let (device, ctx) = common::headless_context();
    let material = transparent_material(&ctx);
    let mesh = create_quad();
    let mut camera = Camera::new();
    camera.set_position(Vec3::new(0.0, 0.0, -20.0));

    draw_mesh(&mesh, &at_z(-15.0), &material, &mut camera, Some(&tagged(15)));
    draw_mesh(&mesh, &at_z(-1.0), &material, &mut camera, Some(&tagged(1)));
    camera.render_to_screen(&ctx);

    assert_eq!(draw_order(&device, &material), vec![1, 15]);
}

#[test]
fn non_depth_tested_draws_keep_their_place() {
    let (device, ctx) = common::headless_context();
    let a = common::basic_material(&ctx);
    let b = common::basic_material(&ctx);
    let mut overlay = common::basic_material(&ctx);
    overlay.set_depth_tested(false);
    let mesh = create_quad();
    let mut camera = Camera::new();

    draw_mesh(&mesh, &Transform::IDENTITY, &a, &mut camera, Some(&tagged(0)));
    draw_mesh(&mesh, &Transform::IDENTITY, &overlay, &mut camera, Some(&tagged(1)));
    draw_mesh(&mesh, &Transform::IDENTITY, &b, &mut camera, Some(&tagged(2)));
    draw_mesh(&mesh, &Transform::IDENTITY, &a, &mut camera, Some(&tagged(3)));
    draw_mesh(&mesh, &Transform::IDENTITY, &b, &mut camera, Some(&tagged(4)));
    camera.render_to_screen(&ctx);

    assert_eq!(draw_order(&device, &a), vec![0, 1, 2, 4, 3]);

    let depth: Vec<bool> = device.draw_calls().iter().map(|d| d.depth_test).collect();
    assert_eq!(depth, vec![true, false, true, true, true]);
}

#[test]
fn state_is_restored_after_a_flush() {
    let (device, ctx) = common::headless_context();
    let mut overlay = transparent_material(&ctx);
    overlay.set_depth_tested(false);
    let mut camera = Camera::new();

    draw_mesh(&create_quad(), &Transform::IDENTITY, &overlay, &mut camera, None);
    camera.render_to_screen(&ctx);

    let commands = device.commands();
    let tail: Vec<&DeviceCommand> = commands
        .iter()
        .rev()
        .filter(|c| {
            matches!(
                c,
                DeviceCommand::SetDepthTest(_) | DeviceCommand::SetBlending(_) | DeviceCommand::UseProgram(_)
            )
        })
        .take(3)
        .collect();
    assert!(tail.contains(&&DeviceCommand::SetDepthTest(true)));
    assert!(tail.contains(&&DeviceCommand::SetBlending(true)));
    assert!(tail.contains(&&DeviceCommand::UseProgram(None)));
}

// ============================================================================
// Queue Lifetime Tests
// ============================================================================

#[test]
fn queue_is_empty_after_every_flush() {
    let (_device, ctx) = common::headless_context();
    let material = common::basic_material(&ctx);
    let mut camera = Camera::new();

    draw_mesh(&create_quad(), &Transform::IDENTITY, &material, &mut camera, None);
    draw_mesh_with_matrix(&create_quad(), &Mat4::IDENTITY, &material, &mut camera, None);
    assert_eq!(camera.queue_len(), 2);

    camera.render_to_screen(&ctx);
    assert_eq!(camera.queue_len(), 0);
}

#[test]
fn empty_queue_still_clears() {
    let (device, ctx) = common::headless_context();
    let mut camera = Camera::new();
    camera.render_to_screen(&ctx);
    assert!(device.draw_calls().is_empty());
    assert!(
        device
            .commands()
            .iter()
            .any(|c| matches!(c, DeviceCommand::ClearWindow { depth: true, .. }))
    );
}

#[test]
fn unset_values_are_not_uploaded() {
    let (device, ctx) = common::headless_context();
    let material = common::basic_material(&ctx);
    let mut camera = Camera::new();
    draw_mesh(&create_quad(), &Transform::IDENTITY, &material, &mut camera, None);
    camera.render_to_screen(&ctx);

    assert!(draw_order(&device, &material).is_empty());
    assert_eq!(device.draw_calls().len(), 1);
}

// ============================================================================
// Per-Object Uniform Tests
// ============================================================================

#[test]
fn model_matrix_is_uploaded_per_object() {
    let (device, ctx) = common::headless_context();
    let material = common::basic_material(&ctx);
    let location = material.shader().property("uModelMat").unwrap().location();
    let mesh = create_box(1.0, 1.0, 1.0);
    let mut camera = Camera::new();

    let transforms = [at_z(-2.0), at_z(-4.0).with_scale(Vec3::splat(2.0))];
    for t in &transforms {
        draw_mesh(&mesh, t, &material, &mut camera, None);
    }
    let matrix = Mat4::from_translation(Vec3::X);
    draw_mesh_with_matrix(&mesh, &matrix, &material, &mut camera, None);
    camera.render_to_screen(&ctx);

    assert_eq!(
        common::uniform_writes(&device, location),
        vec![
            RecordedUniform::Mat4(transforms[0].to_mat4()),
            RecordedUniform::Mat4(transforms[1].to_mat4()),
            RecordedUniform::Mat4(matrix),
        ]
    );
    assert_eq!(device.draw_calls().len(), 3);
}

#[test]
fn normal_matrix_is_the_inverse_transpose() {
    let (device, ctx) = common::headless_context();
    let shader = Shader::new(&ctx, NORMAL_MAT_VERTEX_SHADER, common::FRAGMENT_SHADER).unwrap();
    let location = shader.property("uNormalMat").unwrap().location();
    let material = Material::new(shader);
    let mut camera = Camera::new();

    let transform = Transform::IDENTITY.with_scale(Vec3::new(2.0, 1.0, 4.0));
    draw_mesh(&create_quad(), &transform, &material, &mut camera, None);
    camera.render_to_screen(&ctx);

    let expected: Mat3 = normal_matrix(&transform.to_mat4());
    assert_eq!(common::uniform_writes(&device, location), vec![RecordedUniform::Mat3(expected)]);
}

// ============================================================================
// Instancing Tests
// ============================================================================

fn instance_uploads(device: &HeadlessDevice) -> Vec<usize> {
    device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::UploadBuffer {
                target: BufferTarget::Array,
                usage: BufferUsage::StreamDraw,
                len,
                ..
            } => Some(len),
            _ => None,
        })
        .collect()
}

#[test]
fn instanced_shader_draws_a_batch_in_one_call() {
    let (device, ctx) = common::headless_context();
    let shader = Shader::new(&ctx, common::INSTANCED_VERTEX_SHADER, common::FRAGMENT_SHADER).unwrap();
    let material = Material::new(shader);
    let mesh = create_box(1.0, 1.0, 1.0);
    let mut camera = Camera::new();

    for i in 0..100 {
        draw_mesh(&mesh, &at_z(-(i as f32)), &material, &mut camera, None);
    }
    camera.render_to_screen(&ctx);

    let draws = device.draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].instances, 100);
    assert_eq!(draws[0].index_count, 36);
    assert_eq!(instance_uploads(&device), vec![100 * 64]);

    let divisors: Vec<(u32, u32)> = device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::EnableVertexAttribute(a) if a.divisor == 1 => Some((a.location, a.offset as u32)),
            _ => None,
        })
        .collect();
    assert_eq!(divisors, vec![(6, 0), (7, 16), (8, 32), (9, 48)]);
}

#[test]
fn instancing_batches_split_on_mesh_changes() {
    let (device, ctx) = common::headless_context();
    let shader = Shader::new(&ctx, common::INSTANCED_VERTEX_SHADER, common::FRAGMENT_SHADER).unwrap();
    let material = Material::new(shader);
    let cube = create_box(1.0, 1.0, 1.0);
    let quad: Mesh = create_quad();
    let mut camera = Camera::new();

    draw_mesh(&cube, &at_z(-1.0), &material, &mut camera, None);
    draw_mesh(&quad, &at_z(-1.0), &material, &mut camera, None);
    draw_mesh(&cube, &at_z(-2.0), &material, &mut camera, None);
    camera.render_to_screen(&ctx);

    let instances: Vec<u32> = device.draw_calls().iter().map(|d| d.instances).collect();
    assert_eq!(instances, vec![2, 1]);
}

#[test]
fn per_object_uniform_disables_single_call_instancing() {
    let (device, ctx) = common::headless_context();
    let shader = Shader::new(&ctx, MIXED_VERTEX_SHADER, common::FRAGMENT_SHADER).unwrap();
    let material = Material::new(shader);
    let mesh = create_box(1.0, 1.0, 1.0);
    let mut camera = Camera::new();

    for i in 0..3 {
        draw_mesh(&mesh, &at_z(-(i as f32)), &material, &mut camera, None);
    }
    camera.render_to_screen(&ctx);

    let draws = device.draw_calls();
    assert_eq!(draws.len(), 3);
    assert!(draws.iter().all(|d| d.instances == 1));
    // the instance data is still uploaded once for the batch
    assert_eq!(instance_uploads(&device), vec![3 * 64]);

    let offsets: Vec<i32> = device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::EnableVertexAttribute(a) if a.divisor == 1 && a.location == 6 => Some(a.offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![0, 64, 128]);
}
