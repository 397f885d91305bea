//! OpenGL 3.3 core implementation of [`GraphicsDevice`] over `glow`.

use std::num::NonZeroU32;

use glow::HasContext;

use super::{
    ActiveElement, Attachment, AttachmentSurface, AttributeType, BlitFilter, BlitMask, BufferId,
    BufferTarget, BufferUsage, DeviceInfo, FramebufferId, FramebufferTarget, GraphicsDevice,
    ImageUpload, IndexType, InternalFormat, PixelLayout, PixelRegion, PixelType, ProgramId,
    RasterState, RenderbufferId, SamplerFilter, SamplerParams, SamplerWrap, ShaderSources,
    TextureId, TextureKind, TextureTarget, UniformValue, VertexArrayId, VertexAttribute,
};
use crate::errors::{GraphicsError, Result, ShaderStage};
use crate::resources::material::{CullMode, DepthFunction};
use crate::resources::mesh::MeshTopology;
use crate::resources::shader::ShaderPropertyType;

pub struct GlowDevice {
    gl: glow::Context,
}

impl GlowDevice {
    /// Wraps a context that is already current on this thread and applies
    /// the renderer's baseline state.
    pub fn new(gl: glow::Context) -> Result<Self> {
        let version = gl.version();
        if version.major < 3 || (version.major == 3 && version.minor < 3 && !version.is_embedded) {
            return Err(GraphicsError::DeviceInit(format!(
                "OpenGL 3.3 or newer is required (found {}.{})",
                version.major, version.minor
            )));
        }

        unsafe {
            gl.enable(glow::DEPTH_TEST);
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            if !version.is_embedded {
                gl.enable(glow::MULTISAMPLE);
                gl.enable(glow::FRAMEBUFFER_SRGB);
            }
        }

        Ok(Self { gl })
    }

    #[must_use]
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn compile_stage(&self, program: glow::Program, stage: ShaderStage, source: &str) -> Result<glow::Shader> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Geometry => glow::GEOMETRY_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self
                .gl
                .create_shader(kind)
                .map_err(|e| GraphicsError::object_creation("shader", e))?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(GraphicsError::ShaderCompilation { stage, log });
            }
            self.gl.attach_shader(program, shader);
            Ok(shader)
        }
    }
}

// ============================================================================
// Enum Conversions
// ============================================================================

fn texture(id: TextureId) -> glow::Texture {
    glow::NativeTexture(id.0)
}

fn renderbuffer(id: RenderbufferId) -> glow::Renderbuffer {
    glow::NativeRenderbuffer(id.0)
}

fn framebuffer(id: FramebufferId) -> glow::Framebuffer {
    glow::NativeFramebuffer(id.0)
}

fn buffer(id: BufferId) -> glow::Buffer {
    glow::NativeBuffer(id.0)
}

fn vertex_array(id: VertexArrayId) -> glow::VertexArray {
    glow::NativeVertexArray(id.0)
}

fn program(id: ProgramId) -> glow::Program {
    glow::NativeProgram(id.0)
}

fn uniform_location(location: i32) -> glow::UniformLocation {
    glow::NativeUniformLocation(location as u32)
}

fn texture_kind(kind: TextureKind) -> u32 {
    match kind {
        TextureKind::Texture2D => glow::TEXTURE_2D,
        TextureKind::Cubemap => glow::TEXTURE_CUBE_MAP,
    }
}

fn texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::CubemapFace(face) => glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
    }
}

fn internal_format(format: InternalFormat) -> u32 {
    match format {
        InternalFormat::R8 => glow::R8,
        InternalFormat::Rgb8 => glow::RGB8,
        InternalFormat::Srgb8 => glow::SRGB8,
        InternalFormat::Rgba8 => glow::RGBA8,
        InternalFormat::Srgb8Alpha8 => glow::SRGB8_ALPHA8,
        InternalFormat::R32F => glow::R32F,
        InternalFormat::Rgb32F => glow::RGB32F,
        InternalFormat::Rgba32F => glow::RGBA32F,
        InternalFormat::Rgba16F => glow::RGBA16F,
        InternalFormat::Depth24Stencil8 => glow::DEPTH24_STENCIL8,
        InternalFormat::Depth32FStencil8 => glow::DEPTH32F_STENCIL8,
    }
}

fn pixel_layout(layout: PixelLayout) -> u32 {
    match layout {
        PixelLayout::Red => glow::RED,
        PixelLayout::Rgb => glow::RGB,
        PixelLayout::Rgba => glow::RGBA,
        PixelLayout::DepthStencil => glow::DEPTH_STENCIL,
    }
}

fn pixel_type(ty: PixelType) -> u32 {
    match ty {
        PixelType::UnsignedByte => glow::UNSIGNED_BYTE,
        PixelType::HalfFloat => glow::HALF_FLOAT,
        PixelType::Float => glow::FLOAT,
        PixelType::UnsignedInt24_8 => glow::UNSIGNED_INT_24_8,
        PixelType::Float32UnsignedInt24_8 => glow::FLOAT_32_UNSIGNED_INT_24_8_REV,
    }
}

fn sampler_filter(filter: SamplerFilter) -> i32 {
    (match filter {
        SamplerFilter::Nearest => glow::NEAREST,
        SamplerFilter::Linear => glow::LINEAR,
        SamplerFilter::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

fn sampler_wrap(wrap: SamplerWrap) -> i32 {
    (match wrap {
        SamplerWrap::Repeat => glow::REPEAT,
        SamplerWrap::ClampToEdge => glow::CLAMP_TO_EDGE,
        SamplerWrap::MirroredRepeat => glow::MIRRORED_REPEAT,
    }) as i32
}

fn framebuffer_target(target: FramebufferTarget) -> u32 {
    match target {
        FramebufferTarget::Read => glow::READ_FRAMEBUFFER,
        FramebufferTarget::Draw => glow::DRAW_FRAMEBUFFER,
        FramebufferTarget::Both => glow::FRAMEBUFFER,
    }
}

fn attachment(attachment: Attachment) -> u32 {
    match attachment {
        Attachment::Color(i) => glow::COLOR_ATTACHMENT0 + i,
        Attachment::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn topology(topology: MeshTopology) -> u32 {
    match topology {
        MeshTopology::Triangles => glow::TRIANGLES,
        MeshTopology::Lines => glow::LINES,
    }
}

fn property_type(gl_type: u32) -> ShaderPropertyType {
    match gl_type {
        glow::FLOAT => ShaderPropertyType::Float,
        glow::FLOAT_VEC2 => ShaderPropertyType::Vec2,
        glow::FLOAT_VEC3 => ShaderPropertyType::Vec3,
        glow::FLOAT_VEC4 => ShaderPropertyType::Vec4,
        glow::FLOAT_MAT3 => ShaderPropertyType::Mat3,
        glow::FLOAT_MAT4 => ShaderPropertyType::Mat4,
        glow::INT => ShaderPropertyType::Int,
        glow::BOOL => ShaderPropertyType::Bool,
        glow::SAMPLER_2D => ShaderPropertyType::Sampler2D,
        glow::SAMPLER_CUBE => ShaderPropertyType::SamplerCube,
        _ => ShaderPropertyType::Unknown,
    }
}

fn non_zero(raw: u32, kind: &'static str) -> Result<NonZeroU32> {
    NonZeroU32::new(raw).ok_or_else(|| GraphicsError::object_creation(kind, "driver returned object 0"))
}

// ============================================================================
// GraphicsDevice
// ============================================================================

impl GraphicsDevice for GlowDevice {
    fn info(&self) -> DeviceInfo {
        unsafe {
            DeviceInfo {
                vendor: self.gl.get_parameter_string(glow::VENDOR),
                renderer: self.gl.get_parameter_string(glow::RENDERER),
                version: self.gl.get_parameter_string(glow::VERSION),
                shading_language_version: self.gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION),
                max_samples: self.gl.get_parameter_i32(glow::MAX_SAMPLES).max(1) as u32,
            }
        }
    }

    fn create_texture(&self) -> Result<TextureId> {
        let t = unsafe { self.gl.create_texture() }.map_err(|e| GraphicsError::object_creation("texture", e))?;
        Ok(TextureId(non_zero(t.0.get(), "texture")?))
    }

    fn delete_texture(&self, id: TextureId) {
        unsafe { self.gl.delete_texture(texture(id)) }
    }

    fn create_renderbuffer(&self) -> Result<RenderbufferId> {
        let r = unsafe { self.gl.create_renderbuffer() }
            .map_err(|e| GraphicsError::object_creation("renderbuffer", e))?;
        Ok(RenderbufferId(non_zero(r.0.get(), "renderbuffer")?))
    }

    fn delete_renderbuffer(&self, id: RenderbufferId) {
        unsafe { self.gl.delete_renderbuffer(renderbuffer(id)) }
    }

    fn create_framebuffer(&self) -> Result<FramebufferId> {
        let f = unsafe { self.gl.create_framebuffer() }
            .map_err(|e| GraphicsError::object_creation("framebuffer", e))?;
        Ok(FramebufferId(non_zero(f.0.get(), "framebuffer")?))
    }

    fn delete_framebuffer(&self, id: FramebufferId) {
        unsafe { self.gl.delete_framebuffer(framebuffer(id)) }
    }

    fn create_buffer(&self) -> Result<BufferId> {
        let b = unsafe { self.gl.create_buffer() }.map_err(|e| GraphicsError::object_creation("buffer", e))?;
        Ok(BufferId(non_zero(b.0.get(), "buffer")?))
    }

    fn delete_buffer(&self, id: BufferId) {
        unsafe { self.gl.delete_buffer(buffer(id)) }
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId> {
        let v = unsafe { self.gl.create_vertex_array() }
            .map_err(|e| GraphicsError::object_creation("vertex array", e))?;
        Ok(VertexArrayId(non_zero(v.0.get(), "vertex array")?))
    }

    fn delete_vertex_array(&self, id: VertexArrayId) {
        unsafe { self.gl.delete_vertex_array(vertex_array(id)) }
    }

    fn create_program(&self, sources: &ShaderSources<'_>) -> Result<ProgramId> {
        let prog = unsafe { self.gl.create_program() }.map_err(|e| GraphicsError::object_creation("program", e))?;

        let mut stages = Vec::with_capacity(3);
        let compiled = (|| -> Result<()> {
            stages.push(self.compile_stage(prog, ShaderStage::Vertex, sources.vertex)?);
            if let Some(geometry) = sources.geometry {
                stages.push(self.compile_stage(prog, ShaderStage::Geometry, geometry)?);
            }
            stages.push(self.compile_stage(prog, ShaderStage::Fragment, sources.fragment)?);
            Ok(())
        })();

        unsafe {
            if let Err(e) = compiled {
                for shader in stages {
                    self.gl.delete_shader(shader);
                }
                self.gl.delete_program(prog);
                return Err(e);
            }

            self.gl.link_program(prog);
            let linked = self.gl.get_program_link_status(prog);
            for shader in stages {
                self.gl.detach_shader(prog, shader);
                self.gl.delete_shader(shader);
            }
            if !linked {
                let log = self.gl.get_program_info_log(prog);
                self.gl.delete_program(prog);
                return Err(GraphicsError::ProgramLink(log));
            }
        }

        Ok(ProgramId(non_zero(prog.0.get(), "program")?))
    }

    fn delete_program(&self, id: ProgramId) {
        unsafe { self.gl.delete_program(program(id)) }
    }

    fn active_uniforms(&self, id: ProgramId) -> Vec<ActiveElement> {
        let prog = program(id);
        unsafe {
            let count = self.gl.get_active_uniforms(prog);
            (0..count)
                .filter_map(|index| self.gl.get_active_uniform(prog, index))
                .map(|u| {
                    let location = self
                        .gl
                        .get_uniform_location(prog, &u.name)
                        .map_or(-1, |l| l.0 as i32);
                    ActiveElement {
                        location,
                        ty: property_type(u.utype),
                        size: u.size,
                        name: u.name,
                    }
                })
                .collect()
        }
    }

    fn active_attributes(&self, id: ProgramId) -> Vec<ActiveElement> {
        let prog = program(id);
        unsafe {
            let count = self.gl.get_active_attributes(prog);
            (0..count)
                .filter_map(|index| self.gl.get_active_attribute(prog, index))
                .map(|a| {
                    let location = self
                        .gl
                        .get_attrib_location(prog, &a.name)
                        .map_or(-1, |l| l as i32);
                    ActiveElement {
                        location,
                        ty: property_type(a.atype),
                        size: a.size,
                        name: a.name,
                    }
                })
                .collect()
        }
    }

    fn upload_image(&self, id: TextureId, image: &ImageUpload<'_>) {
        let kind = match image.target {
            TextureTarget::Texture2D => glow::TEXTURE_2D,
            TextureTarget::CubemapFace(_) => glow::TEXTURE_CUBE_MAP,
        };
        unsafe {
            self.gl.bind_texture(kind, Some(texture(id)));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, image.unpack_alignment as i32);
            self.gl.tex_image_2d(
                texture_target(image.target),
                0,
                internal_format(image.internal_format) as i32,
                image.width as i32,
                image.height as i32,
                0,
                pixel_layout(image.layout),
                pixel_type(image.pixel_type),
                glow::PixelUnpackData::Slice(image.pixels),
            );
            self.gl.bind_texture(kind, None);
        }
    }

    fn generate_mipmaps(&self, id: TextureId, kind: TextureKind) {
        let target = texture_kind(kind);
        unsafe {
            self.gl.bind_texture(target, Some(texture(id)));
            self.gl.generate_mipmap(target);
            self.gl.bind_texture(target, None);
        }
    }

    fn set_sampler_params(&self, id: TextureId, kind: TextureKind, params: &SamplerParams) {
        let target = texture_kind(kind);
        unsafe {
            self.gl.bind_texture(target, Some(texture(id)));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, sampler_filter(params.min_filter));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, sampler_filter(params.mag_filter));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, sampler_wrap(params.wrap[0]));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, sampler_wrap(params.wrap[1]));
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, sampler_wrap(params.wrap[2]));
            self.gl.bind_texture(target, None);
        }
    }

    fn allocate_renderbuffer(&self, id: RenderbufferId, samples: u32, format: InternalFormat, width: u32, height: u32) {
        unsafe {
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer(id)));
            self.gl.renderbuffer_storage_multisample(
                glow::RENDERBUFFER,
                samples as i32,
                internal_format(format),
                width as i32,
                height as i32,
            );
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn bind_framebuffer(&self, target: FramebufferTarget, fbo: Option<FramebufferId>) {
        unsafe { self.gl.bind_framebuffer(framebuffer_target(target), fbo.map(framebuffer)) }
    }

    fn attach(&self, target: FramebufferTarget, point: Attachment, surface: AttachmentSurface) {
        let target = framebuffer_target(target);
        let point = attachment(point);
        unsafe {
            match surface {
                AttachmentSurface::Texture(id) => {
                    self.gl.framebuffer_texture_2d(target, point, glow::TEXTURE_2D, Some(texture(id)), 0);
                }
                AttachmentSurface::CubemapFace { texture: id, face, mip } => {
                    self.gl.framebuffer_texture_2d(
                        target,
                        point,
                        glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                        Some(texture(id)),
                        mip as i32,
                    );
                }
                AttachmentSurface::Cubemap(id) => {
                    self.gl.framebuffer_texture(target, point, Some(texture(id)), 0);
                }
                AttachmentSurface::Renderbuffer(id) => {
                    self.gl
                        .framebuffer_renderbuffer(target, point, glow::RENDERBUFFER, Some(renderbuffer(id)));
                }
            }
        }
    }

    fn set_draw_buffers(&self, attachments: &[Attachment]) {
        let buffers: Vec<u32> = attachments.iter().copied().map(attachment).collect();
        unsafe { self.gl.draw_buffers(&buffers) }
    }

    fn set_read_buffer(&self, point: Attachment) {
        unsafe { self.gl.read_buffer(attachment(point)) }
    }

    fn clear_color_attachment(&self, draw_buffer: u32, color: [f32; 4]) {
        unsafe { self.gl.clear_buffer_f32_slice(glow::COLOR, draw_buffer, &color) }
    }

    fn clear_depth_stencil_attachment(&self, depth: f32, stencil: i32) {
        unsafe { self.gl.clear_buffer_depth_stencil(glow::DEPTH_STENCIL, 0, depth, stencil) }
    }

    fn clear_window(&self, color: Option<[f32; 4]>, depth: bool) {
        let mut mask = 0;
        unsafe {
            if let Some([r, g, b, a]) = color {
                self.gl.clear_color(r, g, b, a);
                mask |= glow::COLOR_BUFFER_BIT;
            }
            if depth {
                mask |= glow::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                self.gl.clear(mask);
            }
        }
    }

    fn blit_framebuffer(&self, src: PixelRegion, dst: PixelRegion, mask: BlitMask, filter: BlitFilter) {
        let mut gl_mask = 0;
        if mask.contains(BlitMask::COLOR) {
            gl_mask |= glow::COLOR_BUFFER_BIT;
        }
        if mask.contains(BlitMask::DEPTH) {
            gl_mask |= glow::DEPTH_BUFFER_BIT;
        }
        let gl_filter = match filter {
            BlitFilter::Nearest => glow::NEAREST,
            BlitFilter::Linear => glow::LINEAR,
        };
        unsafe {
            self.gl.blit_framebuffer(
                src.x,
                src.y,
                src.x + src.width,
                src.y + src.height,
                dst.x,
                dst.y,
                dst.x + dst.width,
                dst.y + dst.height,
                gl_mask,
                gl_filter,
            );
        }
    }

    fn read_pixels(&self, region: PixelRegion, layout: PixelLayout, ty: PixelType, pack_alignment: u32, out: &mut [u8]) {
        unsafe {
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, pack_alignment as i32);
            self.gl.read_pixels(
                region.x,
                region.y,
                region.width,
                region.height,
                pixel_layout(layout),
                pixel_type(ty),
                glow::PixelPackData::Slice(Some(out)),
            );
        }
    }

    fn set_viewport(&self, r: PixelRegion) {
        unsafe { self.gl.viewport(r.x, r.y, r.width, r.height) }
    }

    fn set_scissor(&self, region: Option<PixelRegion>) {
        unsafe {
            match region {
                Some(r) => {
                    self.gl.enable(glow::SCISSOR_TEST);
                    self.gl.scissor(r.x, r.y, r.width, r.height);
                }
                None => self.gl.disable(glow::SCISSOR_TEST),
            }
        }
    }

    fn set_depth_test(&self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_blending(&self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::BLEND);
                self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            } else {
                self.gl.disable(glow::BLEND);
            }
        }
    }

    fn set_raster_state(&self, state: RasterState) {
        unsafe {
            self.gl.depth_func(match state.depth_function {
                DepthFunction::Less => glow::LESS,
                DepthFunction::LessOrEqual => glow::LEQUAL,
            });
            match state.cull_mode {
                CullMode::Off => self.gl.disable(glow::CULL_FACE),
                CullMode::Back => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::BACK);
                }
                CullMode::Front => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::FRONT);
                }
            }
            self.gl.polygon_mode(
                glow::FRONT_AND_BACK,
                if state.wireframe { glow::LINE } else { glow::FILL },
            );
        }
    }

    fn use_program(&self, id: Option<ProgramId>) {
        unsafe { self.gl.use_program(id.map(program)) }
    }

    fn set_uniform(&self, location: i32, value: UniformValue<'_>) {
        let loc = uniform_location(location);
        let loc = Some(&loc);
        unsafe {
            match value {
                UniformValue::Float(v) => self.gl.uniform_1_f32(loc, v),
                UniformValue::FloatArray(vs) => self.gl.uniform_1_f32_slice(loc, vs),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32(loc, v.x, v.y),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(loc, v.x, v.y, v.z),
                UniformValue::Vec3Array(vs) => self.gl.uniform_3_f32_slice(loc, bytemuck::cast_slice(vs)),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32(loc, v.x, v.y, v.z, v.w),
                UniformValue::Vec4Array(vs) => self.gl.uniform_4_f32_slice(loc, bytemuck::cast_slice(vs)),
                UniformValue::Mat3(m) => self.gl.uniform_matrix_3_f32_slice(loc, false, &m.to_cols_array()),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(loc, false, &m.to_cols_array()),
                UniformValue::Mat4Array(ms) => {
                    self.gl.uniform_matrix_4_f32_slice(loc, false, bytemuck::cast_slice(ms));
                }
                UniformValue::Int(v) | UniformValue::Sampler(v) => self.gl.uniform_1_i32(loc, v),
                UniformValue::Bool(v) => self.gl.uniform_1_i32(loc, i32::from(v)),
            }
        }
    }

    fn bind_texture_unit(&self, unit: u32, kind: TextureKind, id: TextureId) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(texture_kind(kind), Some(texture(id)));
        }
    }

    fn bind_vertex_array(&self, id: Option<VertexArrayId>) {
        unsafe { self.gl.bind_vertex_array(id.map(vertex_array)) }
    }

    fn bind_buffer(&self, target: BufferTarget, id: Option<BufferId>) {
        unsafe { self.gl.bind_buffer(buffer_target(target), id.map(buffer)) }
    }

    fn upload_buffer(&self, id: BufferId, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let target = buffer_target(target);
        let usage = match usage {
            BufferUsage::StaticDraw => glow::STATIC_DRAW,
            BufferUsage::StreamDraw => glow::STREAM_DRAW,
        };
        unsafe {
            self.gl.bind_buffer(target, Some(buffer(id)));
            self.gl.buffer_data_u8_slice(target, data, usage);
        }
    }

    fn enable_vertex_attribute(&self, a: &VertexAttribute) {
        let ty = match a.ty {
            AttributeType::Float => glow::FLOAT,
            AttributeType::UnsignedByte => glow::UNSIGNED_BYTE,
        };
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(a.location, a.components, ty, a.normalized, a.stride, a.offset);
            self.gl.enable_vertex_attrib_array(a.location);
            self.gl.vertex_attrib_divisor(a.location, a.divisor);
        }
    }

    fn disable_vertex_attribute(&self, location: u32) {
        unsafe {
            self.gl.vertex_attrib_divisor(location, 0);
            self.gl.disable_vertex_attrib_array(location);
        }
    }

    fn draw_indexed(&self, mode: MeshTopology, index_count: u32, index_type: IndexType, instances: u32) {
        let element_type = match index_type {
            IndexType::U16 => glow::UNSIGNED_SHORT,
            IndexType::U32 => glow::UNSIGNED_INT,
        };
        unsafe {
            self.gl
                .draw_elements_instanced(topology(mode), index_count as i32, element_type, 0, instances as i32);
        }
    }
}
