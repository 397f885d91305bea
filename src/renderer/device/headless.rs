//! Headless Device
//!
//! A [`GraphicsDevice`] that needs no driver. It is what the test-suite runs
//! against, and it is handy for batch tooling that only needs command counts.
//!
//! Besides recording every call as a [`DeviceCommand`], it keeps enough state
//! to answer "what is in this surface now?":
//!
//! - framebuffer attachment tables, draw/read buffer selection and bindings
//! - per-surface [`SurfaceContent`], updated by uploads, clears, draws, blits
//! - a GLSL declaration scan standing in for driver reflection
//!
//! Read-backs of cleared surfaces return the clear color encoded in the
//! requested pixel layout, honoring the pack alignment.

use std::cell::RefCell;
use std::num::NonZeroU32;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use super::{
    ActiveElement, Attachment, AttachmentSurface, BlitFilter, BlitMask, BufferId, BufferTarget,
    BufferUsage, DeviceInfo, FramebufferId, FramebufferTarget, GraphicsDevice, ImageUpload,
    IndexType, InternalFormat, PixelLayout, PixelRegion, PixelType, ProgramId, RasterState,
    RenderbufferId, SamplerParams, ShaderSources, TextureId, TextureKind, TextureTarget,
    UniformValue, VertexArrayId, VertexAttribute,
};
use crate::errors::{GraphicsError, Result, ShaderStage};
use crate::resources::color::to_unorm8;
use crate::resources::mesh::MeshTopology;
use crate::resources::shader::ShaderPropertyType;

// ============================================================================
// Recorded Commands
// ============================================================================

/// An owned copy of a uniform write.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Float(f32),
    FloatArray(Vec<f32>),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec3Array(Vec<Vec3>),
    Vec4(Vec4),
    Vec4Array(Vec<Vec4>),
    Mat3(Mat3),
    Mat4(Mat4),
    Mat4Array(Vec<Mat4>),
    Int(i32),
    Bool(bool),
    Sampler(i32),
}

impl From<UniformValue<'_>> for RecordedUniform {
    fn from(value: UniformValue<'_>) -> Self {
        match value {
            UniformValue::Float(v) => Self::Float(v),
            UniformValue::FloatArray(v) => Self::FloatArray(v.to_vec()),
            UniformValue::Vec2(v) => Self::Vec2(v),
            UniformValue::Vec3(v) => Self::Vec3(v),
            UniformValue::Vec3Array(v) => Self::Vec3Array(v.to_vec()),
            UniformValue::Vec4(v) => Self::Vec4(v),
            UniformValue::Vec4Array(v) => Self::Vec4Array(v.to_vec()),
            UniformValue::Mat3(v) => Self::Mat3(v),
            UniformValue::Mat4(v) => Self::Mat4(v),
            UniformValue::Mat4Array(v) => Self::Mat4Array(v.to_vec()),
            UniformValue::Int(v) => Self::Int(v),
            UniformValue::Bool(v) => Self::Bool(v),
            UniformValue::Sampler(v) => Self::Sampler(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateTexture(TextureId),
    DeleteTexture(TextureId),
    CreateRenderbuffer(RenderbufferId),
    DeleteRenderbuffer(RenderbufferId),
    CreateFramebuffer(FramebufferId),
    DeleteFramebuffer(FramebufferId),
    CreateBuffer(BufferId),
    DeleteBuffer(BufferId),
    CreateVertexArray(VertexArrayId),
    DeleteVertexArray(VertexArrayId),
    CreateProgram(ProgramId),
    DeleteProgram(ProgramId),
    UploadImage {
        texture: TextureId,
        target: TextureTarget,
        internal_format: InternalFormat,
        width: u32,
        height: u32,
        unpack_alignment: u32,
        has_pixels: bool,
    },
    GenerateMipmaps {
        texture: TextureId,
        kind: TextureKind,
    },
    SetSamplerParams {
        texture: TextureId,
        kind: TextureKind,
        params: SamplerParams,
    },
    AllocateRenderbuffer {
        renderbuffer: RenderbufferId,
        samples: u32,
        format: InternalFormat,
        width: u32,
        height: u32,
    },
    BindFramebuffer {
        target: FramebufferTarget,
        framebuffer: Option<FramebufferId>,
    },
    Attach {
        target: FramebufferTarget,
        attachment: Attachment,
        surface: AttachmentSurface,
    },
    SetDrawBuffers(Vec<Attachment>),
    SetReadBuffer(Attachment),
    ClearColorAttachment {
        draw_buffer: u32,
        color: [f32; 4],
    },
    ClearDepthStencilAttachment {
        depth: f32,
    },
    ClearWindow {
        color: Option<[f32; 4]>,
        depth: bool,
    },
    BlitFramebuffer {
        src: PixelRegion,
        dst: PixelRegion,
        mask: BlitMask,
        filter: BlitFilter,
    },
    ReadPixels {
        region: PixelRegion,
        layout: PixelLayout,
        pixel_type: PixelType,
        pack_alignment: u32,
    },
    SetViewport(PixelRegion),
    SetScissor(Option<PixelRegion>),
    SetDepthTest(bool),
    SetBlending(bool),
    SetRasterState(RasterState),
    UseProgram(Option<ProgramId>),
    SetUniform {
        location: i32,
        value: RecordedUniform,
    },
    BindTextureUnit {
        unit: u32,
        kind: TextureKind,
        texture: TextureId,
    },
    BindVertexArray(Option<VertexArrayId>),
    BindBuffer {
        target: BufferTarget,
        buffer: Option<BufferId>,
    },
    UploadBuffer {
        buffer: BufferId,
        target: BufferTarget,
        len: usize,
        usage: BufferUsage,
    },
    EnableVertexAttribute(VertexAttribute),
    DisableVertexAttribute(u32),
    DrawIndexed(DrawCall),
}

/// A draw, together with the state it was issued under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub framebuffer: Option<FramebufferId>,
    pub topology: MeshTopology,
    pub index_count: u32,
    pub index_type: IndexType,
    pub instances: u32,
    pub depth_test: bool,
    pub blending: bool,
}

/// What a simulated surface currently holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceContent {
    /// Pixel data arrived through an image upload
    Uploaded,
    /// Filled with a color by a clear
    Cleared([f32; 4]),
    /// Filled with a depth value by a clear
    ClearedDepth(f32),
    /// Written by at least one draw since the last clear
    Drawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SurfaceKey {
    Window,
    Texture(TextureId, u32),
    Renderbuffer(RenderbufferId),
}

#[derive(Debug, Clone)]
struct FramebufferState {
    attachments: FxHashMap<Attachment, AttachmentSurface>,
    draw_buffers: Vec<Attachment>,
    read_buffer: Attachment,
}

impl Default for FramebufferState {
    fn default() -> Self {
        Self {
            attachments: FxHashMap::default(),
            draw_buffers: vec![Attachment::Color(0)],
            read_buffer: Attachment::Color(0),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ProgramInfo {
    uniforms: Vec<ActiveElement>,
    attributes: Vec<ActiveElement>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_id: u32,
    live_objects: usize,
    commands: Vec<DeviceCommand>,

    framebuffers: FxHashMap<FramebufferId, FramebufferState>,
    draw_framebuffer: Option<FramebufferId>,
    read_framebuffer: Option<FramebufferId>,
    contents: FxHashMap<SurfaceKey, SurfaceContent>,

    programs: FxHashMap<ProgramId, ProgramInfo>,
    buffers: FxHashMap<BufferId, Vec<u8>>,

    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    depth_test: bool,
    blending: bool,
}

impl HeadlessState {
    fn allocate(&mut self) -> NonZeroU32 {
        self.next_id += 1;
        self.live_objects += 1;
        NonZeroU32::new(self.next_id).unwrap_or(NonZeroU32::MIN)
    }

    fn release(&mut self, command: DeviceCommand) {
        self.live_objects = self.live_objects.saturating_sub(1);
        self.commands.push(command);
    }

    fn framebuffer(&self, id: Option<FramebufferId>) -> Option<&FramebufferState> {
        id.and_then(|id| self.framebuffers.get(&id))
    }

    fn surfaces_of(&self, framebuffer: Option<FramebufferId>, attachment: Attachment) -> Vec<SurfaceKey> {
        match framebuffer {
            None => vec![SurfaceKey::Window],
            Some(_) => self
                .framebuffer(framebuffer)
                .and_then(|fb| fb.attachments.get(&attachment))
                .map(|surface| surface_keys(*surface))
                .unwrap_or_default(),
        }
    }

    fn draw_surfaces(&self, include_depth: bool) -> Vec<SurfaceKey> {
        let Some(fb) = self.framebuffer(self.draw_framebuffer) else {
            return vec![SurfaceKey::Window];
        };
        let mut keys: Vec<SurfaceKey> = fb
            .draw_buffers
            .iter()
            .filter_map(|a| fb.attachments.get(a))
            .flat_map(|s| surface_keys(*s))
            .collect();
        if include_depth {
            if let Some(depth) = fb.attachments.get(&Attachment::DepthStencil) {
                keys.extend(surface_keys(*depth));
            }
        }
        keys
    }

    fn write(&mut self, keys: &[SurfaceKey], content: SurfaceContent) {
        for key in keys {
            self.contents.insert(*key, content);
        }
    }

    fn copy(&mut self, src: &[SurfaceKey], dst: &[SurfaceKey]) {
        let Some(content) = src.first().and_then(|k| self.contents.get(k)).copied() else {
            return;
        };
        self.write(dst, content);
    }
}

fn surface_keys(surface: AttachmentSurface) -> Vec<SurfaceKey> {
    match surface {
        AttachmentSurface::Texture(id) => vec![SurfaceKey::Texture(id, 0)],
        AttachmentSurface::CubemapFace { texture, face, .. } => vec![SurfaceKey::Texture(texture, face)],
        AttachmentSurface::Cubemap(id) => (0..6).map(|face| SurfaceKey::Texture(id, face)).collect(),
        AttachmentSurface::Renderbuffer(id) => vec![SurfaceKey::Renderbuffer(id)],
    }
}

// ============================================================================
// GLSL Declaration Scan
// ============================================================================

fn glsl_property_type(name: &str) -> ShaderPropertyType {
    match name {
        "float" => ShaderPropertyType::Float,
        "vec2" => ShaderPropertyType::Vec2,
        "vec3" => ShaderPropertyType::Vec3,
        "vec4" => ShaderPropertyType::Vec4,
        "mat3" => ShaderPropertyType::Mat3,
        "mat4" => ShaderPropertyType::Mat4,
        "int" => ShaderPropertyType::Int,
        "bool" => ShaderPropertyType::Bool,
        "sampler2D" => ShaderPropertyType::Sampler2D,
        "samplerCube" => ShaderPropertyType::SamplerCube,
        _ => ShaderPropertyType::Unknown,
    }
}

/// Number of consecutive attribute slots a vertex input occupies.
fn attribute_slots(ty: ShaderPropertyType) -> i32 {
    match ty {
        ShaderPropertyType::Mat3 => 3,
        ShaderPropertyType::Mat4 => 4,
        _ => 1,
    }
}

struct Declaration<'a> {
    explicit_location: Option<i32>,
    storage: &'a str,
    ty: &'a str,
    name: &'a str,
    array_size: i32,
}

fn parse_declaration(line: &str) -> Option<Declaration<'_>> {
    let line = line.split("//").next().unwrap_or_default().trim();
    let mut explicit_location = None;
    let mut rest = line;
    if let Some(after) = rest.strip_prefix("layout") {
        let close = after.find(')')?;
        let qualifiers = &after[..close];
        explicit_location = qualifiers.split(',').find_map(|q| {
            let (key, value) = q.trim_start_matches('(').split_once('=')?;
            (key.trim() == "location").then(|| value.trim().parse::<i32>().ok())?
        });
        rest = after[close + 1..].trim_start();
    }

    let decl = rest.strip_suffix(';')?.trim();
    let mut tokens = decl
        .split_whitespace()
        .filter(|t| !matches!(*t, "highp" | "mediump" | "lowp" | "flat" | "smooth"));
    let storage = tokens.next()?;
    if storage != "uniform" && storage != "in" {
        return None;
    }
    let ty = tokens.next()?;
    let full_name = tokens.next()?;

    let (name, array_size) = match full_name.split_once('[') {
        Some((base, len)) => (base, len.trim_end_matches(']').parse().unwrap_or(1)),
        None => (full_name, 1),
    };
    Some(Declaration {
        explicit_location,
        storage,
        ty,
        name,
        array_size,
    })
}

fn reflect(sources: &ShaderSources<'_>) -> ProgramInfo {
    let mut info = ProgramInfo::default();
    let mut next_uniform_location = 0;
    let mut next_attribute_location = 0;

    let stages = [Some(sources.vertex), sources.geometry, Some(sources.fragment)];
    for (stage_index, source) in stages.into_iter().enumerate() {
        let Some(source) = source else { continue };
        let is_vertex_stage = stage_index == 0;

        for decl in source.lines().filter_map(parse_declaration) {
            let ty = glsl_property_type(decl.ty);
            if decl.storage == "uniform" {
                let reported = if decl.array_size > 1 {
                    format!("{}[0]", decl.name)
                } else {
                    decl.name.to_string()
                };
                if info.uniforms.iter().any(|u| u.name == reported) {
                    continue;
                }
                info.uniforms.push(ActiveElement {
                    name: reported,
                    location: decl.explicit_location.unwrap_or(next_uniform_location),
                    ty,
                    size: decl.array_size,
                });
                next_uniform_location += decl.array_size;
            } else if is_vertex_stage {
                let location = decl.explicit_location.unwrap_or(next_attribute_location);
                next_attribute_location = next_attribute_location.max(location + attribute_slots(ty));
                info.attributes.push(ActiveElement {
                    name: decl.name.to_string(),
                    location,
                    ty,
                    size: decl.array_size,
                });
            }
        }
    }
    info
}

fn check_stage(stage: ShaderStage, source: &str) -> Result<()> {
    if source.contains("void main") {
        Ok(())
    } else {
        Err(GraphicsError::ShaderCompilation {
            stage,
            log: "0:1: error: missing entry point 'main'".to_string(),
        })
    }
}

// ============================================================================
// Pixel Encoding
// ============================================================================

fn encode_pixels(color: [f32; 4], region: PixelRegion, layout: PixelLayout, ty: PixelType, pack: u32, out: &mut [u8]) {
    let channels = match layout {
        PixelLayout::Red => 1,
        PixelLayout::Rgb => 3,
        PixelLayout::Rgba => 4,
        PixelLayout::DepthStencil => return,
    };
    let mut pixel = Vec::with_capacity(channels * 4);
    for &c in &color[..channels] {
        match ty {
            PixelType::UnsignedByte => pixel.push(to_unorm8(c)),
            PixelType::Float => pixel.extend_from_slice(&c.to_le_bytes()),
            _ => return,
        }
    }

    let pack = pack.max(1) as usize;
    let row_bytes = region.width.max(0) as usize * pixel.len();
    let row_stride = row_bytes.div_ceil(pack) * pack;
    for row in 0..region.height.max(0) as usize {
        let start = row * row_stride;
        let Some(dst) = out.get_mut(start..start + row_bytes) else {
            break;
        };
        for chunk in dst.chunks_exact_mut(pixel.len()) {
            chunk.copy_from_slice(&pixel);
        }
    }
}

// ============================================================================
// HeadlessDevice
// ============================================================================

pub struct HeadlessDevice {
    max_samples: u32,
    state: RefCell<HeadlessState>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_samples(16)
    }

    #[must_use]
    pub fn with_max_samples(max_samples: u32) -> Self {
        Self {
            max_samples,
            state: RefCell::new(HeadlessState {
                depth_test: true,
                blending: true,
                ..HeadlessState::default()
            }),
        }
    }

    /// Every command recorded since creation (or the last [`Self::clear_commands`]).
    #[must_use]
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.state.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    #[must_use]
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::DrawIndexed(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    /// How many times pixel data (or storage) was specified for `texture`.
    #[must_use]
    pub fn image_uploads(&self, texture: TextureId) -> usize {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| matches!(c, DeviceCommand::UploadImage { texture: t, .. } if *t == texture))
            .count()
    }

    /// Objects created and not yet deleted.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.state.borrow().live_objects
    }

    #[must_use]
    pub fn texture_content(&self, texture: TextureId) -> Option<SurfaceContent> {
        self.state.borrow().contents.get(&SurfaceKey::Texture(texture, 0)).copied()
    }

    #[must_use]
    pub fn cubemap_face_content(&self, texture: TextureId, face: u32) -> Option<SurfaceContent> {
        self.state.borrow().contents.get(&SurfaceKey::Texture(texture, face)).copied()
    }

    #[must_use]
    pub fn renderbuffer_content(&self, renderbuffer: RenderbufferId) -> Option<SurfaceContent> {
        self.state.borrow().contents.get(&SurfaceKey::Renderbuffer(renderbuffer)).copied()
    }

    #[must_use]
    pub fn window_content(&self) -> Option<SurfaceContent> {
        self.state.borrow().contents.get(&SurfaceKey::Window).copied()
    }

    /// Last data uploaded into `buffer`.
    #[must_use]
    pub fn buffer_data(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    fn record(&self, command: DeviceCommand) {
        self.state.borrow_mut().commands.push(command);
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            vendor: "myth".to_string(),
            renderer: "headless".to_string(),
            version: "3.3 (headless)".to_string(),
            shading_language_version: "3.30".to_string(),
            max_samples: self.max_samples,
        }
    }

    fn create_texture(&self) -> Result<TextureId> {
        let mut s = self.state.borrow_mut();
        let id = TextureId(s.allocate());
        s.commands.push(DeviceCommand::CreateTexture(id));
        Ok(id)
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut s = self.state.borrow_mut();
        s.contents
            .retain(|k, _| !matches!(k, SurfaceKey::Texture(t, _) if *t == texture));
        s.release(DeviceCommand::DeleteTexture(texture));
    }

    fn create_renderbuffer(&self) -> Result<RenderbufferId> {
        let mut s = self.state.borrow_mut();
        let id = RenderbufferId(s.allocate());
        s.commands.push(DeviceCommand::CreateRenderbuffer(id));
        Ok(id)
    }

    fn delete_renderbuffer(&self, renderbuffer: RenderbufferId) {
        let mut s = self.state.borrow_mut();
        s.contents.remove(&SurfaceKey::Renderbuffer(renderbuffer));
        s.release(DeviceCommand::DeleteRenderbuffer(renderbuffer));
    }

    fn create_framebuffer(&self) -> Result<FramebufferId> {
        let mut s = self.state.borrow_mut();
        let id = FramebufferId(s.allocate());
        s.framebuffers.insert(id, FramebufferState::default());
        s.commands.push(DeviceCommand::CreateFramebuffer(id));
        Ok(id)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        let mut s = self.state.borrow_mut();
        s.framebuffers.remove(&framebuffer);
        if s.draw_framebuffer == Some(framebuffer) {
            s.draw_framebuffer = None;
        }
        if s.read_framebuffer == Some(framebuffer) {
            s.read_framebuffer = None;
        }
        s.release(DeviceCommand::DeleteFramebuffer(framebuffer));
    }

    fn create_buffer(&self) -> Result<BufferId> {
        let mut s = self.state.borrow_mut();
        let id = BufferId(s.allocate());
        s.commands.push(DeviceCommand::CreateBuffer(id));
        Ok(id)
    }

    fn delete_buffer(&self, buffer: BufferId) {
        let mut s = self.state.borrow_mut();
        s.buffers.remove(&buffer);
        s.release(DeviceCommand::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId> {
        let mut s = self.state.borrow_mut();
        let id = VertexArrayId(s.allocate());
        s.commands.push(DeviceCommand::CreateVertexArray(id));
        Ok(id)
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        self.state
            .borrow_mut()
            .release(DeviceCommand::DeleteVertexArray(vertex_array));
    }

    fn create_program(&self, sources: &ShaderSources<'_>) -> Result<ProgramId> {
        check_stage(ShaderStage::Vertex, sources.vertex)?;
        if let Some(geometry) = sources.geometry {
            check_stage(ShaderStage::Geometry, geometry)?;
        }
        check_stage(ShaderStage::Fragment, sources.fragment)?;

        let mut s = self.state.borrow_mut();
        let id = ProgramId(s.allocate());
        s.programs.insert(id, reflect(sources));
        s.commands.push(DeviceCommand::CreateProgram(id));
        Ok(id)
    }

    fn delete_program(&self, program: ProgramId) {
        let mut s = self.state.borrow_mut();
        s.programs.remove(&program);
        s.release(DeviceCommand::DeleteProgram(program));
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveElement> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveElement> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn upload_image(&self, texture: TextureId, image: &ImageUpload<'_>) {
        let mut s = self.state.borrow_mut();
        let face = match image.target {
            TextureTarget::Texture2D => 0,
            TextureTarget::CubemapFace(face) => face,
        };
        let key = SurfaceKey::Texture(texture, face);
        if image.pixels.is_some() {
            s.contents.insert(key, SurfaceContent::Uploaded);
        } else {
            s.contents.remove(&key);
        }
        s.commands.push(DeviceCommand::UploadImage {
            texture,
            target: image.target,
            internal_format: image.internal_format,
            width: image.width,
            height: image.height,
            unpack_alignment: image.unpack_alignment,
            has_pixels: image.pixels.is_some(),
        });
    }

    fn generate_mipmaps(&self, texture: TextureId, kind: TextureKind) {
        self.record(DeviceCommand::GenerateMipmaps { texture, kind });
    }

    fn set_sampler_params(&self, texture: TextureId, kind: TextureKind, params: &SamplerParams) {
        self.record(DeviceCommand::SetSamplerParams {
            texture,
            kind,
            params: *params,
        });
    }

    fn allocate_renderbuffer(&self, renderbuffer: RenderbufferId, samples: u32, format: InternalFormat, width: u32, height: u32) {
        let mut s = self.state.borrow_mut();
        s.contents.remove(&SurfaceKey::Renderbuffer(renderbuffer));
        s.commands.push(DeviceCommand::AllocateRenderbuffer {
            renderbuffer,
            samples,
            format,
            width,
            height,
        });
    }

    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferId>) {
        let mut s = self.state.borrow_mut();
        match target {
            FramebufferTarget::Read => s.read_framebuffer = framebuffer,
            FramebufferTarget::Draw => s.draw_framebuffer = framebuffer,
            FramebufferTarget::Both => {
                s.read_framebuffer = framebuffer;
                s.draw_framebuffer = framebuffer;
            }
        }
        s.commands.push(DeviceCommand::BindFramebuffer { target, framebuffer });
    }

    fn attach(&self, target: FramebufferTarget, attachment: Attachment, surface: AttachmentSurface) {
        let mut s = self.state.borrow_mut();
        let bound = match target {
            FramebufferTarget::Read => s.read_framebuffer,
            FramebufferTarget::Draw | FramebufferTarget::Both => s.draw_framebuffer,
        };
        if let Some(fb) = bound.and_then(|id| s.framebuffers.get_mut(&id)) {
            fb.attachments.insert(attachment, surface);
        }
        s.commands.push(DeviceCommand::Attach {
            target,
            attachment,
            surface,
        });
    }

    fn set_draw_buffers(&self, attachments: &[Attachment]) {
        let mut s = self.state.borrow_mut();
        if let Some(fb) = s.draw_framebuffer.and_then(|id| s.framebuffers.get_mut(&id)) {
            fb.draw_buffers = attachments.to_vec();
        }
        s.commands.push(DeviceCommand::SetDrawBuffers(attachments.to_vec()));
    }

    fn set_read_buffer(&self, attachment: Attachment) {
        let mut s = self.state.borrow_mut();
        if let Some(fb) = s.read_framebuffer.and_then(|id| s.framebuffers.get_mut(&id)) {
            fb.read_buffer = attachment;
        }
        s.commands.push(DeviceCommand::SetReadBuffer(attachment));
    }

    fn clear_color_attachment(&self, draw_buffer: u32, color: [f32; 4]) {
        let mut s = self.state.borrow_mut();
        let keys = match s.framebuffer(s.draw_framebuffer) {
            Some(fb) => fb
                .draw_buffers
                .get(draw_buffer as usize)
                .and_then(|a| fb.attachments.get(a))
                .map(|surface| surface_keys(*surface))
                .unwrap_or_default(),
            None => vec![SurfaceKey::Window],
        };
        s.write(&keys, SurfaceContent::Cleared(color));
        s.commands.push(DeviceCommand::ClearColorAttachment { draw_buffer, color });
    }

    fn clear_depth_stencil_attachment(&self, depth: f32, _stencil: i32) {
        let mut s = self.state.borrow_mut();
        if s.draw_framebuffer.is_some() {
            let keys = s.surfaces_of(s.draw_framebuffer, Attachment::DepthStencil);
            s.write(&keys, SurfaceContent::ClearedDepth(depth));
        }
        s.commands.push(DeviceCommand::ClearDepthStencilAttachment { depth });
    }

    fn clear_window(&self, color: Option<[f32; 4]>, depth: bool) {
        let mut s = self.state.borrow_mut();
        if let Some(color) = color {
            s.contents.insert(SurfaceKey::Window, SurfaceContent::Cleared(color));
        }
        s.commands.push(DeviceCommand::ClearWindow { color, depth });
    }

    fn blit_framebuffer(&self, src: PixelRegion, dst: PixelRegion, mask: BlitMask, filter: BlitFilter) {
        let mut s = self.state.borrow_mut();
        if mask.contains(BlitMask::COLOR) {
            let read_buffer = s
                .framebuffer(s.read_framebuffer)
                .map_or(Attachment::Color(0), |fb| fb.read_buffer);
            let draw_buffer = s
                .framebuffer(s.draw_framebuffer)
                .and_then(|fb| fb.draw_buffers.first().copied())
                .unwrap_or(Attachment::Color(0));
            let from = s.surfaces_of(s.read_framebuffer, read_buffer);
            let to = s.surfaces_of(s.draw_framebuffer, draw_buffer);
            s.copy(&from, &to);
        }
        if mask.contains(BlitMask::DEPTH) {
            let from = s.surfaces_of(s.read_framebuffer, Attachment::DepthStencil);
            let to = s.surfaces_of(s.draw_framebuffer, Attachment::DepthStencil);
            s.copy(&from, &to);
        }
        s.commands.push(DeviceCommand::BlitFramebuffer { src, dst, mask, filter });
    }

    fn read_pixels(&self, region: PixelRegion, layout: PixelLayout, pixel_type: PixelType, pack_alignment: u32, out: &mut [u8]) {
        let mut s = self.state.borrow_mut();
        let read_buffer = s
            .framebuffer(s.read_framebuffer)
            .map_or(Attachment::Color(0), |fb| fb.read_buffer);
        let source = s.surfaces_of(s.read_framebuffer, read_buffer);
        if let Some(SurfaceContent::Cleared(color)) = source.first().and_then(|k| s.contents.get(k)) {
            encode_pixels(*color, region, layout, pixel_type, pack_alignment, out);
        }
        s.commands.push(DeviceCommand::ReadPixels {
            region,
            layout,
            pixel_type,
            pack_alignment,
        });
    }

    fn set_viewport(&self, region: PixelRegion) {
        self.record(DeviceCommand::SetViewport(region));
    }

    fn set_scissor(&self, region: Option<PixelRegion>) {
        self.record(DeviceCommand::SetScissor(region));
    }

    fn set_depth_test(&self, enabled: bool) {
        let mut s = self.state.borrow_mut();
        s.depth_test = enabled;
        s.commands.push(DeviceCommand::SetDepthTest(enabled));
    }

    fn set_blending(&self, enabled: bool) {
        let mut s = self.state.borrow_mut();
        s.blending = enabled;
        s.commands.push(DeviceCommand::SetBlending(enabled));
    }

    fn set_raster_state(&self, state: RasterState) {
        self.record(DeviceCommand::SetRasterState(state));
    }

    fn use_program(&self, program: Option<ProgramId>) {
        let mut s = self.state.borrow_mut();
        s.program = program;
        s.commands.push(DeviceCommand::UseProgram(program));
    }

    fn set_uniform(&self, location: i32, value: UniformValue<'_>) {
        self.record(DeviceCommand::SetUniform {
            location,
            value: value.into(),
        });
    }

    fn bind_texture_unit(&self, unit: u32, kind: TextureKind, texture: TextureId) {
        self.record(DeviceCommand::BindTextureUnit { unit, kind, texture });
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayId>) {
        let mut s = self.state.borrow_mut();
        s.vertex_array = vertex_array;
        s.commands.push(DeviceCommand::BindVertexArray(vertex_array));
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>) {
        self.record(DeviceCommand::BindBuffer { target, buffer });
    }

    fn upload_buffer(&self, buffer: BufferId, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let mut s = self.state.borrow_mut();
        s.buffers.insert(buffer, data.to_vec());
        s.commands.push(DeviceCommand::UploadBuffer {
            buffer,
            target,
            len: data.len(),
            usage,
        });
    }

    fn enable_vertex_attribute(&self, attribute: &VertexAttribute) {
        self.record(DeviceCommand::EnableVertexAttribute(*attribute));
    }

    fn disable_vertex_attribute(&self, location: u32) {
        self.record(DeviceCommand::DisableVertexAttribute(location));
    }

    fn draw_indexed(&self, topology: MeshTopology, index_count: u32, index_type: IndexType, instances: u32) {
        let mut s = self.state.borrow_mut();
        let keys = s.draw_surfaces(s.depth_test);
        s.write(&keys, SurfaceContent::Drawn);
        let call = DrawCall {
            program: s.program,
            vertex_array: s.vertex_array,
            framebuffer: s.draw_framebuffer,
            topology,
            index_count,
            index_type,
            instances,
            depth_test: s.depth_test,
            blending: s.blending,
        };
        s.commands.push(DeviceCommand::DrawIndexed(call));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_with_layout_and_precision() {
        let decl = parse_declaration("layout(std140, location = 3) in highp mat4 aModelMat; // per instance").unwrap();
        assert_eq!(decl.explicit_location, Some(3));
        assert_eq!(decl.storage, "in");
        assert_eq!(decl.ty, "mat4");
        assert_eq!(decl.name, "aModelMat");
        assert_eq!(decl.array_size, 1);
    }

    #[test]
    fn test_non_declarations_are_ignored() {
        assert!(parse_declaration("out vec4 FragColor;").is_none());
        assert!(parse_declaration("// uniform vec4 uColor;").is_none());
        assert!(parse_declaration("gl_Position = vec4(0.0);").is_none());
    }

    #[test]
    fn test_reflection_shares_uniforms_across_stages() {
        let info = reflect(&ShaderSources {
            vertex: "in vec3 aPos;\nin mat3 aNormalMat;\nin vec2 aTexCoord;\nuniform mat4 uViewProjMat;\nvoid main() {}",
            geometry: None,
            fragment: "uniform mat4 uViewProjMat;\nuniform float uWeights[3];\nuniform vec4 uColor;\nvoid main() {}",
        });

        let uniforms: Vec<(&str, i32, i32)> = info
            .uniforms
            .iter()
            .map(|u| (u.name.as_str(), u.location, u.size))
            .collect();
        assert_eq!(uniforms, vec![("uViewProjMat", 0, 1), ("uWeights[0]", 1, 3), ("uColor", 4, 1)]);

        let attributes: Vec<(&str, i32)> = info.attributes.iter().map(|a| (a.name.as_str(), a.location)).collect();
        assert_eq!(attributes, vec![("aPos", 0), ("aNormalMat", 1), ("aTexCoord", 4)]);
    }

    #[test]
    fn test_pixel_encoding_pads_rows() {
        let mut out = vec![0u8; 8];
        encode_pixels(
            [1.0, 0.0, 1.0, 1.0],
            PixelRegion::from_dimensions(1, 2),
            PixelLayout::Rgb,
            PixelType::UnsignedByte,
            4,
            &mut out,
        );
        assert_eq!(out, vec![255, 0, 255, 0, 255, 0, 255, 0]);
    }
}
