use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};

use crate::math::Rect;
use crate::renderer::backend;
use crate::renderer::context::GraphicsContext;
use crate::renderer::render_object::RenderObject;
use crate::resources::color::Color;
use crate::resources::render_target::{
    RenderBufferLoadAction, RenderBufferStoreAction, RenderTarget, RenderTargetColorAttachment,
    RenderTargetDepthAttachment,
};
use crate::resources::render_texture::RenderTexture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraProjection {
    #[default]
    Perspective,
    Orthographic,
}

bitflags! {
    /// Which buffers a camera clears before drawing its queue.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CameraClearFlags: u8 {
        const SOLID_COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

impl Default for CameraClearFlags {
    fn default() -> Self {
        CameraClearFlags::SOLID_COLOR | CameraClearFlags::DEPTH
    }
}

/// View/projection parameters plus the queue of draws submitted against it.
///
/// The queue is flushed by exactly one of [`render_to_screen`](Self::render_to_screen),
/// [`render_to`](Self::render_to) or [`render_to_target`](Self::render_to_target),
/// and is always empty afterwards.
#[derive(Debug, Clone)]
pub struct Camera {
    background_color: Color,
    projection: CameraProjection,
    orthographic_size: f32,
    fov: f32,
    near_clipping_plane: f32,
    far_clipping_plane: f32,
    clear_flags: CameraClearFlags,
    pixel_rect: Option<Rect>,
    scissor_rect: Option<Rect>,
    position: Vec3,
    rotation: Quat,
    view_matrix_override: Option<Mat4>,
    projection_matrix_override: Option<Mat4>,

    render_queue: Vec<RenderObject>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            background_color: Color::CLEAR,
            projection: CameraProjection::Perspective,
            orthographic_size: 2.0,
            fov: std::f32::consts::FRAC_PI_2,
            near_clipping_plane: 1.0,
            far_clipping_plane: -1.0,
            clear_flags: CameraClearFlags::default(),
            pixel_rect: None,
            scissor_rect: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            view_matrix_override: None,
            projection_matrix_override: None,
            render_queue: Vec::new(),
        }
    }
}

impl Camera {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores every parameter to its default. Queued draws are kept.
    pub fn reset(&mut self) {
        let queue = std::mem::take(&mut self.render_queue);
        *self = Self {
            render_queue: queue,
            ..Self::default()
        };
    }

    #[must_use]
    pub fn background_color(&self) -> Color {
        self.background_color
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background_color = color;
    }

    #[must_use]
    pub fn projection(&self) -> CameraProjection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: CameraProjection) {
        self.projection = projection;
    }

    /// Height of the view volume, in world units.
    #[must_use]
    pub fn orthographic_size(&self) -> f32 {
        self.orthographic_size
    }

    pub fn set_orthographic_size(&mut self, size: f32) {
        self.orthographic_size = size;
    }

    /// Vertical field of view, in radians.
    #[must_use]
    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
    }

    #[must_use]
    pub fn near_clipping_plane(&self) -> f32 {
        self.near_clipping_plane
    }

    pub fn set_near_clipping_plane(&mut self, distance: f32) {
        self.near_clipping_plane = distance;
    }

    #[must_use]
    pub fn far_clipping_plane(&self) -> f32 {
        self.far_clipping_plane
    }

    pub fn set_far_clipping_plane(&mut self, distance: f32) {
        self.far_clipping_plane = distance;
    }

    #[must_use]
    pub fn clear_flags(&self) -> CameraClearFlags {
        self.clear_flags
    }

    pub fn set_clear_flags(&mut self, flags: CameraClearFlags) {
        self.clear_flags = flags;
    }

    /// Viewport on the target, in pixels. `None` covers the whole target.
    #[must_use]
    pub fn pixel_rect(&self) -> Option<Rect> {
        self.pixel_rect
    }

    pub fn set_pixel_rect(&mut self, rect: Option<Rect>) {
        self.pixel_rect = rect;
    }

    #[must_use]
    pub fn scissor_rect(&self) -> Option<Rect> {
        self.scissor_rect
    }

    pub fn set_scissor_rect(&mut self, rect: Option<Rect>) {
        self.scissor_rect = rect;
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    /// The camera looks down its local -Z.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, direction.normalize());
    }

    #[must_use]
    pub fn upwards_direction(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix_override.unwrap_or_else(|| {
            Mat4::look_at_rh(self.position, self.position + self.direction(), self.upwards_direction())
        })
    }

    #[must_use]
    pub fn view_matrix_override(&self) -> Option<Mat4> {
        self.view_matrix_override
    }

    pub fn set_view_matrix_override(&mut self, matrix: Option<Mat4>) {
        self.view_matrix_override = matrix;
    }

    #[must_use]
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        if let Some(matrix) = self.projection_matrix_override {
            return matrix;
        }
        match self.projection {
            CameraProjection::Perspective => Mat4::perspective_rh_gl(
                self.fov,
                aspect_ratio,
                self.near_clipping_plane,
                self.far_clipping_plane,
            ),
            CameraProjection::Orthographic => {
                let height = self.orthographic_size;
                let width = height * aspect_ratio;
                Mat4::orthographic_rh_gl(
                    -0.5 * width,
                    0.5 * width,
                    -0.5 * height,
                    0.5 * height,
                    self.near_clipping_plane,
                    self.far_clipping_plane,
                )
            }
        }
    }

    #[must_use]
    pub fn projection_matrix_override(&self) -> Option<Mat4> {
        self.projection_matrix_override
    }

    pub fn set_projection_matrix_override(&mut self, matrix: Option<Mat4>) {
        self.projection_matrix_override = matrix;
    }

    #[must_use]
    pub fn view_projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        self.projection_matrix(aspect_ratio) * self.view_matrix()
    }

    #[must_use]
    pub fn inverse_view_projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        self.view_projection_matrix(aspect_ratio).inverse()
    }

    /// Number of draws waiting for the next flush.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.render_queue.len()
    }

    pub(crate) fn enqueue(&mut self, object: RenderObject) {
        self.render_queue.push(object);
    }

    pub(crate) fn take_queue(&mut self) -> Vec<RenderObject> {
        std::mem::take(&mut self.render_queue)
    }

    // ------------------------------------------------------------------------
    // Flushing
    // ------------------------------------------------------------------------

    pub fn render_to_screen(&mut self, ctx: &GraphicsContext) {
        backend::render_scene(ctx, self, None);
    }

    /// Renders into a render texture. Multisampled color and depth are both
    /// resolved into the texture's single-sampled storage afterwards.
    pub fn render_to(&mut self, ctx: &GraphicsContext, render_texture: &RenderTexture) {
        let clear_color = if render_texture.color_format().is_srgb() {
            self.background_color.to_linear()
        } else {
            self.background_color
        };

        let target = RenderTarget::new(
            vec![RenderTargetColorAttachment {
                buffer: render_texture.color_buffer(),
                load_action: if self.clear_flags.contains(CameraClearFlags::SOLID_COLOR) {
                    RenderBufferLoadAction::Clear
                } else {
                    RenderBufferLoadAction::Load
                },
                store_action: RenderBufferStoreAction::Resolve,
                clear_color,
            }],
            RenderTargetDepthAttachment {
                buffer: render_texture.depth_buffer(),
                load_action: if self.clear_flags.contains(CameraClearFlags::DEPTH) {
                    RenderBufferLoadAction::Clear
                } else {
                    RenderBufferLoadAction::Load
                },
                store_action: RenderBufferStoreAction::Resolve,
            },
        );

        backend::render_scene(ctx, self, Some(&target));
    }

    pub fn render_to_target(&mut self, ctx: &GraphicsContext, target: &RenderTarget) {
        backend::render_scene(ctx, self, Some(target));
    }
}
