//! Camera Tests
//!
//! Tests for:
//! - Default parameters and reset
//! - Orientation: direction, rotation, up vector
//! - View and projection matrices, overrides
//! - Pixel and scissor rects reaching the device, ahead of clears

mod common;

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Mat4, Quat, Vec2, Vec3};

use myth_gl::renderer::device::{DeviceCommand, PixelRegion, RecordedUniform};
use myth_gl::{Camera, CameraClearFlags, CameraProjection, Color, Rect, Transform, create_quad, draw_mesh};

// ============================================================================
// Parameter Tests
// ============================================================================

#[test]
fn new_camera_has_documented_defaults() {
    let camera = Camera::new();
    assert_eq!(camera.background_color(), Color::CLEAR);
    assert_eq!(camera.projection(), CameraProjection::Perspective);
    assert_eq!(camera.orthographic_size(), 2.0);
    assert_eq!(camera.fov(), FRAC_PI_2);
    assert_eq!(camera.near_clipping_plane(), 1.0);
    assert_eq!(camera.far_clipping_plane(), -1.0);
    assert_eq!(camera.clear_flags(), CameraClearFlags::SOLID_COLOR | CameraClearFlags::DEPTH);
    assert_eq!(camera.pixel_rect(), None);
    assert_eq!(camera.scissor_rect(), None);
    assert_eq!(camera.position(), Vec3::ZERO);
    assert_eq!(camera.rotation(), Quat::IDENTITY);
    assert_eq!(camera.queue_len(), 0);
}

#[test]
fn reset_restores_parameters_but_keeps_queued_draws() {
    let (_device, ctx) = common::headless_context();
    let material = common::basic_material(&ctx);
    let mut camera = Camera::new();
    camera.set_background_color(Color::RED);
    camera.set_projection(CameraProjection::Orthographic);
    camera.set_position(Vec3::new(1.0, 2.0, 3.0));
    camera.set_view_matrix_override(Some(Mat4::IDENTITY));
    draw_mesh(&create_quad(), &Transform::IDENTITY, &material, &mut camera, None);

    camera.reset();

    assert_eq!(camera.background_color(), Color::CLEAR);
    assert_eq!(camera.projection(), CameraProjection::Perspective);
    assert_eq!(camera.position(), Vec3::ZERO);
    assert_eq!(camera.view_matrix_override(), None);
    assert_eq!(camera.queue_len(), 1);
}

// ============================================================================
// Orientation Tests
// ============================================================================

#[test]
fn camera_looks_down_negative_z_by_default() {
    let camera = Camera::new();
    assert_eq!(camera.direction(), Vec3::NEG_Z);
    assert_eq!(camera.upwards_direction(), Vec3::Y);
}

#[test]
fn rotation_turns_the_view_direction() {
    let mut camera = Camera::new();
    camera.set_rotation(Quat::from_rotation_y(FRAC_PI_2));
    assert!(camera.direction().abs_diff_eq(Vec3::NEG_X, 1e-6));

    camera.set_rotation(Quat::from_rotation_y(PI));
    assert!(camera.direction().abs_diff_eq(Vec3::Z, 1e-6));
}

#[test]
fn set_direction_normalizes_and_points_the_camera() {
    let mut camera = Camera::new();
    camera.set_direction(Vec3::new(3.0, 0.0, 0.0));
    assert!(camera.direction().abs_diff_eq(Vec3::X, 1e-6));
    assert!(camera.upwards_direction().abs_diff_eq(Vec3::Y, 1e-6));
}

// ============================================================================
// Matrix Tests
// ============================================================================

#[test]
fn view_matrix_moves_the_world_opposite_the_camera() {
    let mut camera = Camera::new();
    camera.set_position(Vec3::new(0.0, 0.0, 5.0));
    let view = camera.view_matrix();
    assert!(view.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-6));
}

#[test]
fn overrides_replace_computed_matrices() {
    let mut camera = Camera::new();
    let view = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    let projection = Mat4::from_scale(Vec3::splat(0.5));
    camera.set_view_matrix_override(Some(view));
    camera.set_projection_matrix_override(Some(projection));

    assert_eq!(camera.view_matrix(), view);
    assert_eq!(camera.projection_matrix(1.7), projection);
    assert_eq!(camera.view_projection_matrix(1.7), projection * view);
}

#[test]
fn perspective_projection_maps_the_frustum_edge() {
    let mut camera = Camera::new();
    camera.set_far_clipping_plane(100.0);
    let projection = camera.projection_matrix(1.0);

    // 90 degree fov: at depth 1 the frustum spans [-1, 1]
    let corner = projection.project_point3(Vec3::new(1.0, 1.0, -1.0));
    assert!(corner.abs_diff_eq(Vec3::new(1.0, 1.0, -1.0), 1e-5));

    let far = projection.project_point3(Vec3::new(0.0, 0.0, -100.0));
    assert!((far.z - 1.0).abs() < 1e-4);
}

#[test]
fn orthographic_projection_spans_size_times_aspect() {
    let mut camera = Camera::new();
    camera.set_projection(CameraProjection::Orthographic);
    camera.set_orthographic_size(4.0);
    camera.set_near_clipping_plane(0.1);
    camera.set_far_clipping_plane(10.0);

    let projection = camera.projection_matrix(2.0);
    let edge = projection.project_point3(Vec3::new(4.0, 2.0, -1.0));
    assert!(edge.truncate().abs_diff_eq(Vec2::ONE, 1e-6));
}

#[test]
fn inverse_view_projection_undoes_the_transform() {
    let mut camera = Camera::new();
    camera.set_far_clipping_plane(50.0);
    camera.set_position(Vec3::new(2.0, 1.0, 8.0));
    camera.set_direction(Vec3::new(-0.2, -0.1, -1.0));

    let point = Vec3::new(0.5, -0.25, -3.0);
    let clip = camera.view_projection_matrix(1.5).project_point3(point);
    let back = camera.inverse_view_projection_matrix(1.5).project_point3(clip);
    assert!(back.abs_diff_eq(point, 1e-3));
}

// ============================================================================
// Device State Tests
// ============================================================================

#[test]
fn pixel_and_scissor_rects_reach_the_device() {
    let (device, ctx) = common::headless_context();
    let mut camera = Camera::new();
    camera.set_pixel_rect(Some(Rect::from_origin_and_dimensions(Vec2::new(10.0, 20.0), Vec2::new(30.0, 40.0))));
    camera.set_scissor_rect(Some(Rect::new(Vec2::new(16.0, 24.0), Vec2::new(12.0, 22.0))));

    camera.render_to_screen(&ctx);

    let commands = device.commands();
    assert!(commands.contains(&DeviceCommand::SetViewport(PixelRegion::new(10, 20, 30, 40))));
    let scissors: Vec<Option<PixelRegion>> = commands
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::SetScissor(region) => Some(region),
            _ => None,
        })
        .collect();
    assert_eq!(scissors, vec![Some(PixelRegion::new(12, 22, 4, 2)), None]);
}

#[test]
fn scissor_is_enabled_before_the_window_is_cleared() {
    let (device, ctx) = common::headless_context();
    let mut camera = Camera::new();
    camera.set_scissor_rect(Some(Rect::from_origin_and_dimensions(Vec2::ZERO, Vec2::new(10.0, 10.0))));

    camera.render_to_screen(&ctx);

    let commands = device.commands();
    let scissor = commands
        .iter()
        .position(|c| matches!(c, DeviceCommand::SetScissor(Some(_))))
        .unwrap();
    let clear = commands
        .iter()
        .position(|c| matches!(c, DeviceCommand::ClearWindow { .. }))
        .unwrap();
    assert!(scissor < clear, "only the scissored region may be cleared");
}

#[test]
fn view_projection_uses_the_viewport_aspect_ratio() {
    let (device, ctx) = common::headless_context();
    let material = common::basic_material(&ctx);
    let mut camera = Camera::new();
    camera.set_far_clipping_plane(100.0);
    camera.set_pixel_rect(Some(Rect::from_origin_and_dimensions(Vec2::ZERO, Vec2::new(30.0, 40.0))));

    draw_mesh(&create_quad(), &Transform::IDENTITY, &material, &mut camera, None);
    let expected = camera.view_projection_matrix(30.0 / 40.0);
    camera.render_to_screen(&ctx);

    let location = material.shader().property("uViewProjMat").unwrap().location();
    assert_eq!(common::uniform_writes(&device, location), vec![RecordedUniform::Mat4(expected)]);
}
