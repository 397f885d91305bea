//! Immediate-mode entry points
//!
//! `draw_mesh*` only enqueue; nothing touches the device until the camera is
//! flushed. The blit and copy helpers flush straight away.

use glam::{Mat4, UVec2};

use crate::errors::Result;
use crate::math::{Rect, Transform};
use crate::renderer::context::GraphicsContext;
use crate::renderer::device::{
    Attachment, AttachmentSurface, BlitFilter, BlitMask, FramebufferTarget, PixelRegion,
};
use crate::renderer::gpu::GpuFramebuffer;
use crate::renderer::render_object::{ObjectTransform, RenderObject};
use crate::resources::color::Color;
use crate::resources::cubemap::{Cubemap, CubemapFace};
use crate::resources::material::{Material, MaterialPropertyBlock};
use crate::resources::mesh::Mesh;
use crate::resources::render_texture::{RenderBufferStorage, RenderTexture, TextureDimensionality};
use crate::resources::texture::Texture2D;
use crate::scene::camera::{Camera, CameraClearFlags};

const BLIT_TEXTURE_UNIFORM: &str = "uTexture";

// ============================================================================
// Queueing
// ============================================================================

pub fn draw_mesh(
    mesh: &Mesh,
    transform: &Transform,
    material: &Material,
    camera: &mut Camera,
    property_block: Option<&MaterialPropertyBlock>,
) {
    camera.enqueue(RenderObject::new(
        mesh.clone(),
        ObjectTransform::Decomposed(*transform),
        material.clone(),
        property_block.cloned(),
    ));
}

pub fn draw_mesh_with_matrix(
    mesh: &Mesh,
    model_matrix: &Mat4,
    material: &Material,
    camera: &mut Camera,
    property_block: Option<&MaterialPropertyBlock>,
) {
    camera.enqueue(RenderObject::new(
        mesh.clone(),
        ObjectTransform::Matrix(*model_matrix),
        material.clone(),
        property_block.cloned(),
    ));
}

// ============================================================================
// Blits
// ============================================================================

/// A camera whose clip space is the quad's own space.
fn blit_camera() -> Camera {
    let mut camera = Camera::new();
    camera.set_background_color(Color::CLEAR);
    camera.set_view_matrix_override(Some(Mat4::IDENTITY));
    camera.set_projection_matrix_override(Some(Mat4::IDENTITY));
    camera
}

fn screen_blit_camera(rect: Rect) -> Camera {
    let mut camera = blit_camera();
    camera.set_pixel_rect(Some(rect));
    camera.set_clear_flags(CameraClearFlags::empty());
    camera
}

/// Stretches `source` over the whole of `destination`.
pub fn blit(ctx: &GraphicsContext, source: &Texture2D, destination: &RenderTexture) {
    let mut camera = blit_camera();
    let mut material = ctx.blit_material().clone();
    material.set_texture(BLIT_TEXTURE_UNIFORM, source.clone());

    draw_mesh(ctx.quad_mesh(), &Transform::IDENTITY, &material, &mut camera, None);
    camera.render_to(ctx, destination);
}

/// Draws `source` into `rect` on the window without clearing it.
///
/// # Panics
///
/// If `source` has never been rendered to.
pub fn blit_to_screen(ctx: &GraphicsContext, source: &RenderTexture, rect: Rect) {
    blit_to_screen_with_material(ctx, source, rect, ctx.blit_material());
}

/// As [`blit_to_screen`], sampling `source` through `material`'s `uTexture`.
///
/// # Panics
///
/// If `source` has never been rendered to.
pub fn blit_to_screen_with_material(ctx: &GraphicsContext, source: &RenderTexture, rect: Rect, material: &Material) {
    assert!(source.has_been_rendered_to(), "the input texture has not been rendered to");

    let mut camera = screen_blit_camera(rect);
    let mut material = material.clone();
    material.set_render_texture(BLIT_TEXTURE_UNIFORM, source.clone());

    draw_mesh(ctx.quad_mesh(), &Transform::IDENTITY, &material, &mut camera, None);
    camera.render_to_screen(ctx);
}

pub fn blit_texture_to_screen(ctx: &GraphicsContext, source: &Texture2D, rect: Rect) {
    let mut camera = screen_blit_camera(rect);
    let mut material = ctx.blit_material().clone();
    material.set_texture(BLIT_TEXTURE_UNIFORM, source.clone());

    draw_mesh(ctx.quad_mesh(), &Transform::IDENTITY, &material, &mut camera, None);
    camera.render_to_screen(ctx);
}

// ============================================================================
// Copies
// ============================================================================

/// Copies the color content of `source` into `destination`, on the GPU and
/// into its CPU pixel data. A cube source copies its +X face.
///
/// # Panics
///
/// If `source` has never been rendered to.
pub fn copy_texture(ctx: &GraphicsContext, source: &RenderTexture, destination: &mut Texture2D) -> Result<()> {
    copy_texture_face(ctx, source, destination, CubemapFace::PositiveX)
}

/// As [`copy_texture`]; `face` picks the face of a cube source and is
/// ignored for 2D sources.
///
/// # Panics
///
/// If `source` has never been rendered to.
pub fn copy_texture_face(
    ctx: &GraphicsContext,
    source: &RenderTexture,
    destination: &mut Texture2D,
    face: CubemapFace,
) -> Result<()> {
    assert!(source.has_been_rendered_to(), "the input texture has not been rendered to");
    let device = ctx.device();

    let source_surface = match source.color_buffer().ensure_gpu(device)? {
        RenderBufferStorage::SingleSampledTexture(texture)
        | RenderBufferStorage::MultisampledRboAndResolvedTexture { resolved: texture, .. } => {
            AttachmentSurface::Texture(texture)
        }
        RenderBufferStorage::SingleSampledCubemap(texture) => AttachmentSurface::CubemapFace {
            texture,
            face: face.index() as u32,
            mip: 0,
        },
    };
    let destination_texture = destination.ensure_unique_gpu(device)?;

    let read = GpuFramebuffer::new(device)?;
    device.bind_framebuffer(FramebufferTarget::Read, Some(read.id()));
    device.attach(FramebufferTarget::Read, Attachment::Color(0), source_surface);
    device.set_read_buffer(Attachment::Color(0));

    let draw = GpuFramebuffer::new(device)?;
    device.bind_framebuffer(FramebufferTarget::Draw, Some(draw.id()));
    device.attach(
        FramebufferTarget::Draw,
        Attachment::Color(0),
        AttachmentSurface::Texture(destination_texture),
    );
    device.set_draw_buffers(&[Attachment::Color(0)]);

    let source_dims = source.dimensions();
    let destination_dims = destination.dimensions();
    // dimensions may differ, so filter rather than pick
    device.blit_framebuffer(
        PixelRegion::from_dimensions(source_dims.x, source_dims.y),
        PixelRegion::from_dimensions(destination_dims.x, destination_dims.y),
        BlitMask::COLOR,
        BlitFilter::Linear,
    );

    // read back what just landed in the destination
    device.set_viewport(PixelRegion::from_dimensions(destination_dims.x, destination_dims.y));
    device.bind_framebuffer(FramebufferTarget::Read, Some(draw.id()));
    device.set_read_buffer(Attachment::Color(0));
    destination.with_readback_target(|pixels, format, dims| {
        device.read_pixels(
            PixelRegion::from_dimensions(dims.x, dims.y),
            format.pixel_layout(),
            format.pixel_type(),
            format.pixel_alignment(),
            pixels,
        );
    });

    device.bind_framebuffer(FramebufferTarget::Both, None);
    Ok(())
}

/// Copies every face of a cube `source` into mip level `mip` of `destination`.
/// Only the GPU copy of `destination` is written.
///
/// # Panics
///
/// If `source` is not a cube render texture, or `mip` is beyond the last
/// mip level of `destination`.
pub fn copy_texture_to_cubemap(
    ctx: &GraphicsContext,
    source: &RenderTexture,
    destination: &mut Cubemap,
    mip: u32,
) -> Result<()> {
    assert_eq!(
        source.dimensionality(),
        TextureDimensionality::Cube,
        "provided render texture must be a cubemap to call this method"
    );
    let max_mip = destination.width().ilog2();
    assert!(mip <= max_mip, "mip level {mip} is beyond the last mip level ({max_mip}) of the cubemap");

    let device = ctx.device();
    let (_, source_texture) = source.color_buffer().ensure_gpu(device)?.sampled_texture();
    let destination_texture = destination.ensure_unique_gpu(device)?;

    let source_dims = source.dimensions();
    let mip_width = (destination.width() >> mip).max(1);
    let destination_dims = UVec2::splat(mip_width);

    for face in CubemapFace::ALL {
        let face = face.index() as u32;

        let read = GpuFramebuffer::new(device)?;
        device.bind_framebuffer(FramebufferTarget::Read, Some(read.id()));
        device.attach(
            FramebufferTarget::Read,
            Attachment::Color(0),
            AttachmentSurface::CubemapFace {
                texture: source_texture,
                face,
                mip: 0,
            },
        );
        device.set_read_buffer(Attachment::Color(0));

        let draw = GpuFramebuffer::new(device)?;
        device.bind_framebuffer(FramebufferTarget::Draw, Some(draw.id()));
        device.attach(
            FramebufferTarget::Draw,
            Attachment::Color(0),
            AttachmentSurface::CubemapFace {
                texture: destination_texture,
                face,
                mip,
            },
        );
        device.set_draw_buffers(&[Attachment::Color(0)]);

        device.blit_framebuffer(
            PixelRegion::from_dimensions(source_dims.x, source_dims.y),
            PixelRegion::from_dimensions(destination_dims.x, destination_dims.y),
            BlitMask::COLOR,
            BlitFilter::Linear,
        );
    }

    device.bind_framebuffer(FramebufferTarget::Both, None);
    Ok(())
}
