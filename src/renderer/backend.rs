//! Queue flush
//!
//! Turns a camera's queue into device calls: target setup, clears, viewport,
//! ordering, batched state changes, instanced or per-object draws, and the
//! multisample resolve at the end.

use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};
use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::context::GraphicsContext;
use crate::renderer::device::{
    Attachment, AttachmentSurface, AttributeType, BlitFilter, BlitMask, BufferTarget, BufferUsage,
    FramebufferTarget, GraphicsDevice, PixelRegion, RasterState, TextureId, TextureKind, UniformValue,
    VertexAttribute,
};
use crate::renderer::gpu::GpuFramebuffer;
use crate::renderer::queue::{QueueItem, sort_render_queue};
use crate::renderer::render_object::RenderObject;
use crate::resources::material::{Material, MaterialPropertyBlock, MaterialValue};
use crate::resources::render_target::{RenderBufferLoadAction, RenderBufferStoreAction, RenderTarget};
use crate::resources::render_texture::{RenderBufferStorage, TextureDimensionality};
use crate::resources::shader::{Shader, ShaderElement, ShaderPropertyType};
use crate::scene::camera::{Camera, CameraClearFlags};

impl QueueItem for RenderObject {
    fn is_depth_tested(&self) -> bool {
        RenderObject::is_depth_tested(self)
    }

    fn is_transparent(&self) -> bool {
        RenderObject::is_transparent(self)
    }

    fn world_midpoint(&self) -> Vec3 {
        self.world_midpoint
    }

    fn same_material(&self, other: &Self) -> bool {
        self.material == other.material
    }

    fn same_property_block(&self, other: &Self) -> bool {
        self.property_block == other.property_block
    }

    fn same_mesh(&self, other: &Self) -> bool {
        self.mesh == other.mesh
    }
}

/// Per-flush constants shared by every batch.
struct FrameUniforms {
    view: Mat4,
    projection: Mat4,
    view_projection: Mat4,
}

/// Flushes the camera's queue into `target`, or the window when `None`.
///
/// The queue is empty afterwards, whatever happens while drawing.
pub(crate) fn render_scene(ctx: &GraphicsContext, camera: &mut Camera, target: Option<&RenderTarget>) {
    let queue = camera.take_queue();
    let device = ctx.device();

    if let Some(target) = target {
        target.validate();
    }

    // keeps the framebuffer object alive until the resolve is done
    let framebuffer = match target {
        Some(target) => match bind_render_target(device, target) {
            Ok(fb) => Some(fb),
            Err(e) => {
                log::error!("failed to set up render target: {e}");
                device.bind_framebuffer(FramebufferTarget::Both, None);
                return;
            }
        },
        None => {
            device.bind_framebuffer(FramebufferTarget::Both, None);
            None
        }
    };

    let target_dimensions = target.map_or_else(|| ctx.window_dimensions(), RenderTarget::dimensions);
    let viewport = camera
        .pixel_rect()
        .map_or_else(|| PixelRegion::from_dimensions(target_dimensions.x, target_dimensions.y), |r| r.to_pixel_region());
    device.set_viewport(viewport);
    // clears honor the scissor, so it goes first
    device.set_scissor(camera.scissor_rect().map(|r| r.to_pixel_region()));

    match target {
        Some(target) => clear_render_target(device, target),
        None => clear_window(device, camera),
    }

    let aspect_ratio = viewport.width as f32 / viewport.height.max(1) as f32;
    let frame = FrameUniforms {
        view: camera.view_matrix(),
        projection: camera.projection_matrix(aspect_ratio),
        view_projection: camera.view_projection_matrix(aspect_ratio),
    };

    log::trace!(
        "flushing {} queued draws into {}",
        queue.len(),
        if target.is_some() { "render target" } else { "window" }
    );

    let queue = sort_render_queue(queue, camera.position());
    draw_queue(ctx, &queue, &frame);

    device.set_scissor(None);
    device.use_program(None);
    device.bind_vertex_array(None);
    device.set_depth_test(true);
    device.set_blending(true);

    if let Some(target) = target
        && let Err(e) = resolve_render_target(device, target)
    {
        log::error!("failed to resolve render target: {e}");
    }

    device.bind_framebuffer(FramebufferTarget::Both, None);
    drop(framebuffer);
}

// ============================================================================
// Targets
// ============================================================================

fn clear_window(device: &Rc<dyn GraphicsDevice>, camera: &Camera) {
    let flags = camera.clear_flags();
    let color = flags
        .contains(CameraClearFlags::SOLID_COLOR)
        .then(|| camera.background_color().to_linear().to_array());
    let depth = flags.contains(CameraClearFlags::DEPTH);
    if color.is_some() || depth {
        device.clear_window(color, depth);
    }
}

fn attachment_surface(storage: RenderBufferStorage) -> AttachmentSurface {
    match storage {
        RenderBufferStorage::SingleSampledTexture(texture) => AttachmentSurface::Texture(texture),
        RenderBufferStorage::MultisampledRboAndResolvedTexture { multisampled, .. } => {
            AttachmentSurface::Renderbuffer(multisampled)
        }
        RenderBufferStorage::SingleSampledCubemap(texture) => AttachmentSurface::Cubemap(texture),
    }
}

fn bind_render_target(device: &Rc<dyn GraphicsDevice>, target: &RenderTarget) -> Result<GpuFramebuffer> {
    let framebuffer = GpuFramebuffer::new(device)?;
    device.bind_framebuffer(FramebufferTarget::Both, Some(framebuffer.id()));

    let mut draw_buffers: SmallVec<[Attachment; 8]> = SmallVec::new();
    for (i, color) in target.colors.iter().enumerate() {
        let storage = color.buffer.ensure_gpu(device)?;
        let attachment = Attachment::Color(i as u32);
        device.attach(FramebufferTarget::Draw, attachment, attachment_surface(storage));
        color.buffer.mark_rendered_to();
        draw_buffers.push(attachment);
    }
    let depth = target.depth.buffer.ensure_gpu(device)?;
    device.attach(FramebufferTarget::Draw, Attachment::DepthStencil, attachment_surface(depth));
    target.depth.buffer.mark_rendered_to();
    device.set_draw_buffers(&draw_buffers);

    Ok(framebuffer)
}

fn clear_render_target(device: &Rc<dyn GraphicsDevice>, target: &RenderTarget) {
    for (i, color) in target.colors.iter().enumerate() {
        if color.load_action == RenderBufferLoadAction::Clear {
            device.clear_color_attachment(i as u32, color.clear_color.to_array());
        }
    }
    if target.depth.load_action == RenderBufferLoadAction::Clear {
        device.clear_depth_stencil_attachment(1.0, 0);
    }
}

/// Copies multisampled storage into its resolve texture for every attachment
/// that asks for it. Single-sampled storage already is the result.
fn resolve_render_target(device: &Rc<dyn GraphicsDevice>, target: &RenderTarget) -> Result<()> {
    let dimensions = target.dimensions();
    let region = PixelRegion::from_dimensions(dimensions.x, dimensions.y);

    let colors = target
        .colors
        .iter()
        .filter(|c| c.store_action == RenderBufferStoreAction::Resolve)
        .map(|c| (&c.buffer, Attachment::Color(0), BlitMask::COLOR));
    let depth = (target.depth.store_action == RenderBufferStoreAction::Resolve)
        .then_some((&target.depth.buffer, Attachment::DepthStencil, BlitMask::DEPTH));

    for (buffer, attachment, mask) in colors.chain(depth) {
        let Some(RenderBufferStorage::MultisampledRboAndResolvedTexture { multisampled, resolved }) = buffer.storage()
        else {
            continue;
        };

        let read = GpuFramebuffer::new(device)?;
        let draw = GpuFramebuffer::new(device)?;
        device.bind_framebuffer(FramebufferTarget::Read, Some(read.id()));
        device.attach(FramebufferTarget::Read, attachment, AttachmentSurface::Renderbuffer(multisampled));
        device.bind_framebuffer(FramebufferTarget::Draw, Some(draw.id()));
        device.attach(FramebufferTarget::Draw, attachment, AttachmentSurface::Texture(resolved));
        if mask == BlitMask::COLOR {
            device.set_read_buffer(attachment);
            device.set_draw_buffers(&[attachment]);
        }
        device.blit_framebuffer(region, region, mask, BlitFilter::Nearest);
    }

    Ok(())
}

// ============================================================================
// Drawing
// ============================================================================

fn draw_queue(ctx: &GraphicsContext, queue: &[RenderObject], frame: &FrameUniforms) {
    let device = ctx.device();

    for depth_run in queue.chunk_by(|a, b| a.is_depth_tested() == b.is_depth_tested()) {
        device.set_depth_test(depth_run[0].is_depth_tested());

        for blend_run in depth_run.chunk_by(|a, b| a.is_transparent() == b.is_transparent()) {
            device.set_blending(blend_run[0].is_transparent());

            for material_batch in blend_run.chunk_by(|a, b| a.material == b.material) {
                let material = &material_batch[0].material;
                let first_block_slot = bind_material(device, material, frame);

                for block_batch in material_batch.chunk_by(|a, b| a.property_block == b.property_block) {
                    if let Some(block) = &block_batch[0].property_block {
                        bind_property_block(device, material.shader(), block, first_block_slot);
                    }

                    for mesh_batch in block_batch.chunk_by(|a, b| a.mesh == b.mesh) {
                        if let Err(e) = draw_mesh_batch(ctx, material.shader(), mesh_batch) {
                            log::error!("skipping {} draw(s): {e}", mesh_batch.len());
                        }
                    }
                }

                device.set_raster_state(RasterState::default());
            }
        }
    }
}

/// Binds the material's program, render state and values. Returns the first
/// texture unit left free for property blocks.
fn bind_material(device: &Rc<dyn GraphicsDevice>, material: &Material, frame: &FrameUniforms) -> u32 {
    let shader = material.shader();
    device.use_program(Some(shader.program_id()));
    device.set_raster_state(material.raster_state());

    for (element, matrix) in [
        (shader.view_mat(), frame.view),
        (shader.proj_mat(), frame.projection),
        (shader.view_proj_mat(), frame.view_projection),
    ] {
        if let Some(element) = element.filter(|e| e.property_type() == ShaderPropertyType::Mat4) {
            device.set_uniform(element.location(), UniformValue::Mat4(matrix));
        }
    }

    let mut texture_slot = 0;
    bind_values(device, shader, |name| material.value(name), &mut texture_slot);
    texture_slot
}

fn bind_property_block(device: &Rc<dyn GraphicsDevice>, shader: &Shader, block: &MaterialPropertyBlock, first_slot: u32) {
    let mut texture_slot = first_slot;
    bind_values(device, shader, |name| block.value(name), &mut texture_slot);
}

/// Binds every declared uniform that has a value, in reflection order.
fn bind_values<'a>(
    device: &Rc<dyn GraphicsDevice>,
    shader: &Shader,
    lookup: impl Fn(&str) -> Option<&'a MaterialValue>,
    texture_slot: &mut u32,
) {
    for (name, element) in shader.properties() {
        let Some(value) = lookup(name) else {
            continue;
        };
        match bind_value(device, element, value, texture_slot) {
            Ok(true) => {}
            Ok(false) => {
                #[cfg(debug_assertions)]
                log::debug!(
                    "skipping '{name}': shader declares {:?}, value is {}",
                    element.property_type(),
                    value.type_name()
                );
            }
            Err(e) => log::error!("failed to bind '{name}': {e}"),
        }
    }
}

fn upload(device: &Rc<dyn GraphicsDevice>, location: i32, value: UniformValue<'_>) -> bool {
    device.set_uniform(location, value);
    true
}

fn bind_sampler(
    device: &Rc<dyn GraphicsDevice>,
    location: i32,
    kind: TextureKind,
    texture: TextureId,
    texture_slot: &mut u32,
) -> bool {
    device.bind_texture_unit(*texture_slot, kind, texture);
    device.set_uniform(location, UniformValue::Sampler(*texture_slot as i32));
    *texture_slot += 1;
    true
}

/// Uploads one value. `Ok(false)` means its tag does not fit the declared type.
fn bind_value(
    device: &Rc<dyn GraphicsDevice>,
    element: ShaderElement,
    value: &MaterialValue,
    texture_slot: &mut u32,
) -> Result<bool> {
    use ShaderPropertyType as Ty;

    let location = element.location();
    let ty = element.property_type();
    // arrays upload at most the declared element count
    let capacity = element.size().max(0) as usize;

    let bound = match value {
        MaterialValue::Color(c) => ty == Ty::Vec4 && upload(device, location, UniformValue::Vec4(c.to_linear().to_vec4())),
        MaterialValue::ColorArray(colors) => {
            ty == Ty::Vec4 && {
                let linear: Vec<Vec4> = colors.iter().take(capacity).map(|c| c.to_linear().to_vec4()).collect();
                upload(device, location, UniformValue::Vec4Array(&linear))
            }
        }
        MaterialValue::Float(v) => ty == Ty::Float && upload(device, location, UniformValue::Float(*v)),
        MaterialValue::FloatArray(v) => {
            ty == Ty::Float && upload(device, location, UniformValue::FloatArray(&v[..v.len().min(capacity)]))
        }
        MaterialValue::Vec2(v) => ty == Ty::Vec2 && upload(device, location, UniformValue::Vec2(*v)),
        MaterialValue::Vec3(v) => ty == Ty::Vec3 && upload(device, location, UniformValue::Vec3(*v)),
        MaterialValue::Vec3Array(v) => {
            ty == Ty::Vec3 && upload(device, location, UniformValue::Vec3Array(&v[..v.len().min(capacity)]))
        }
        MaterialValue::Vec4(v) => ty == Ty::Vec4 && upload(device, location, UniformValue::Vec4(*v)),
        MaterialValue::Mat3(m) => ty == Ty::Mat3 && upload(device, location, UniformValue::Mat3(*m)),
        MaterialValue::Mat4(m) => ty == Ty::Mat4 && upload(device, location, UniformValue::Mat4(*m)),
        MaterialValue::Mat4Array(v) => {
            ty == Ty::Mat4 && upload(device, location, UniformValue::Mat4Array(&v[..v.len().min(capacity)]))
        }
        MaterialValue::Int(v) => ty == Ty::Int && upload(device, location, UniformValue::Int(*v)),
        MaterialValue::Bool(v) => ty == Ty::Bool && upload(device, location, UniformValue::Bool(*v)),
        MaterialValue::Texture2D(texture) => {
            ty == Ty::Sampler2D && {
                let id = texture.ensure_gpu(device)?;
                bind_sampler(device, location, TextureKind::Texture2D, id, texture_slot)
            }
        }
        MaterialValue::RenderTexture(render_texture) => {
            let expected = match render_texture.dimensionality() {
                TextureDimensionality::Tex2D => Ty::Sampler2D,
                TextureDimensionality::Cube => Ty::SamplerCube,
            };
            ty == expected && {
                let (kind, id) = render_texture.color_buffer().ensure_gpu(device)?.sampled_texture();
                bind_sampler(device, location, kind, id, texture_slot)
            }
        }
        MaterialValue::Cubemap(cubemap) => {
            ty == Ty::SamplerCube && {
                let id = cubemap.ensure_gpu(device)?;
                bind_sampler(device, location, TextureKind::Cubemap, id, texture_slot)
            }
        }
    };

    Ok(bound)
}

// ============================================================================
// Draw Calls
// ============================================================================

/// Where per-instance matrices live inside one instance record.
#[derive(Debug, Clone, Copy)]
struct InstanceLayout {
    stride: usize,
    model: Option<u32>,
    /// location, and whether the attribute is a full 4x4 matrix
    normal: Option<(u32, bool)>,
}

impl InstanceLayout {
    fn for_shader(shader: &Shader) -> Option<Self> {
        let model = shader.instanced_model_mat().map(|e| e.location().max(0) as u32);
        let normal = shader
            .instanced_normal_mat()
            .map(|e| (e.location().max(0) as u32, e.property_type() == ShaderPropertyType::Mat4));
        if model.is_none() && normal.is_none() {
            return None;
        }

        let stride = model.map_or(0, |_| 64) + normal.map_or(0, |(_, is_mat4)| if is_mat4 { 64 } else { 36 });
        Some(Self { stride, model, normal })
    }

    fn normal_offset(&self) -> usize {
        if self.model.is_some() { 64 } else { 0 }
    }

    fn write(&self, object: &RenderObject, out: &mut Vec<u8>) {
        if self.model.is_some() {
            out.extend_from_slice(bytemuck::bytes_of(&object.model_matrix()));
        }
        if let Some((_, is_mat4)) = self.normal {
            let normal = object.normal_matrix();
            if is_mat4 {
                out.extend_from_slice(bytemuck::bytes_of(&Mat4::from_mat3(normal)));
            } else {
                out.extend_from_slice(bytemuck::bytes_of(&normal));
            }
        }
    }

    /// Matrix columns as consecutive attribute locations, pointing at record `instance`.
    fn attributes(&self, instance: usize) -> SmallVec<[VertexAttribute; 8]> {
        let base = instance * self.stride;
        let columns = |location: u32, size: usize, offset: usize| {
            (0..size).map(move |col| VertexAttribute {
                location: location + col as u32,
                components: size as i32,
                ty: AttributeType::Float,
                normalized: false,
                stride: self.stride as i32,
                offset: (offset + col * size * 4) as i32,
                divisor: 1,
            })
        };

        let mut attributes = SmallVec::new();
        if let Some(location) = self.model {
            attributes.extend(columns(location, 4, base));
        }
        if let Some((location, is_mat4)) = self.normal {
            attributes.extend(columns(location, if is_mat4 { 4 } else { 3 }, base + self.normal_offset()));
        }
        attributes
    }
}

fn draw_mesh_batch(ctx: &GraphicsContext, shader: &Shader, batch: &[RenderObject]) -> Result<()> {
    let device = ctx.device();
    let info = batch[0].mesh.ensure_gpu(device)?;
    device.bind_vertex_array(Some(info.vertex_array));

    let instancing = InstanceLayout::for_shader(shader);
    if let Some(layout) = &instancing {
        let mut data = Vec::with_capacity(layout.stride * batch.len());
        for object in batch {
            layout.write(object, &mut data);
        }
        let buffer = ctx.instance_buffer().id();
        device.bind_buffer(BufferTarget::Array, Some(buffer));
        device.upload_buffer(buffer, BufferTarget::Array, &data, BufferUsage::StreamDraw);
    }

    let per_object_uniforms = shader.model_mat().is_some() || shader.normal_mat().is_some();
    match instancing {
        Some(layout) if !per_object_uniforms => {
            for attribute in layout.attributes(0) {
                device.enable_vertex_attribute(&attribute);
            }
            device.draw_indexed(info.topology, info.index_count, info.index_type, batch.len() as u32);
        }
        _ => {
            for (i, object) in batch.iter().enumerate() {
                set_object_uniforms(device, shader, object);
                if let Some(layout) = &instancing {
                    for attribute in layout.attributes(i) {
                        device.enable_vertex_attribute(&attribute);
                    }
                }
                device.draw_indexed(info.topology, info.index_count, info.index_type, 1);
            }
        }
    }

    if let Some(layout) = &instancing {
        for attribute in layout.attributes(0) {
            device.disable_vertex_attribute(attribute.location);
        }
        device.bind_buffer(BufferTarget::Array, None);
    }
    device.bind_vertex_array(None);
    Ok(())
}

fn set_object_uniforms(device: &Rc<dyn GraphicsDevice>, shader: &Shader, object: &RenderObject) {
    if let Some(element) = shader.model_mat().filter(|e| e.property_type() == ShaderPropertyType::Mat4) {
        device.set_uniform(element.location(), UniformValue::Mat4(object.model_matrix()));
    }
    if let Some(element) = shader.normal_mat() {
        let normal = object.normal_matrix();
        match element.property_type() {
            ShaderPropertyType::Mat3 => device.set_uniform(element.location(), UniformValue::Mat3(normal)),
            ShaderPropertyType::Mat4 => device.set_uniform(element.location(), UniformValue::Mat4(Mat4::from_mat3(normal))),
            _ => {}
        }
    }
}
