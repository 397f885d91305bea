//! Graphics Device
//!
//! The single seam between the renderer and the hardware API.
//!
//! Everything above this module (resource mirrors, the backend algorithm,
//! blits, screenshots) talks to a [`GraphicsDevice`] trait object; the two
//! implementations are:
//!
//! - [`GlowDevice`]: OpenGL 3.3 core through `glow`
//! - [`HeadlessDevice`]: a software device that records every command and
//!   simulates attachment contents, used by tests and headless tooling
//!
//! All methods take `&self`: the device is shared by every GPU mirror (each
//! mirror holds an `Rc<dyn GraphicsDevice>` so it can release its object on
//! drop) and is only ever driven from the thread that owns the context.

use std::num::NonZeroU32;

use bitflags::bitflags;
use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::errors::Result;
use crate::resources::material::{CullMode, DepthFunction};
use crate::resources::mesh::MeshTopology;
use crate::resources::shader::ShaderPropertyType;

#[cfg(not(target_arch = "wasm32"))]
mod glow_device;
mod headless;

#[cfg(not(target_arch = "wasm32"))]
pub use glow_device::GlowDevice;
pub use headless::{DeviceCommand, DrawCall, HeadlessDevice, RecordedUniform, SurfaceContent};

// ============================================================================
// Object Handles
// ============================================================================

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            #[inline]
            #[must_use]
            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }
    };
}

device_handle!(
    /// A texture object (2D or cubemap).
    TextureId
);
device_handle!(
    /// A renderbuffer object (multisampled color or depth storage).
    RenderbufferId
);
device_handle!(
    /// A framebuffer object. `None` at a binding site means the window.
    FramebufferId
);
device_handle!(
    /// A buffer object (vertex, index or instance data).
    BufferId
);
device_handle!(
    /// A vertex array object.
    VertexArrayId
);
device_handle!(
    /// A linked shader program.
    ProgramId
);

// ============================================================================
// Texture Descriptions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Texture2D,
    Cubemap,
}

/// Where an image upload lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    /// `0..6` in +X, -X, +Y, -Y, +Z, -Z order
    CubemapFace(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    R8,
    Rgb8,
    Srgb8,
    Rgba8,
    Srgb8Alpha8,
    R32F,
    Rgb32F,
    Rgba32F,
    Rgba16F,
    Depth24Stencil8,
    Depth32FStencil8,
}

/// Channel layout of CPU-side pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Red,
    Rgb,
    Rgba,
    DepthStencil,
}

/// Component type of CPU-side pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    UnsignedByte,
    HalfFloat,
    Float,
    UnsignedInt24_8,
    Float32UnsignedInt24_8,
}

impl PixelType {
    #[must_use]
    pub fn size_in_bytes(self) -> usize {
        match self {
            PixelType::UnsignedByte => 1,
            PixelType::HalfFloat => 2,
            PixelType::Float | PixelType::UnsignedInt24_8 => 4,
            PixelType::Float32UnsignedInt24_8 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub target: TextureTarget,
    pub internal_format: InternalFormat,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub pixel_type: PixelType,
    pub unpack_alignment: u32,
    /// `None` allocates storage without initializing it
    pub pixels: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerFilter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerWrap {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerParams {
    pub min_filter: SamplerFilter,
    pub mag_filter: SamplerFilter,
    /// s, t, r
    pub wrap: [SamplerWrap; 3],
}

// ============================================================================
// Framebuffers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    Read,
    Draw,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    DepthStencil,
}

/// The storage bound to a framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentSurface {
    Texture(TextureId),
    CubemapFace { texture: TextureId, face: u32, mip: u32 },
    /// All six faces (layered rendering)
    Cubemap(TextureId),
    Renderbuffer(RenderbufferId),
}

/// An integer pixel region, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRegion {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlitMask: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitFilter {
    Nearest,
    Linear,
}

// ============================================================================
// Pipeline State
// ============================================================================

/// Per-material rasterizer state, applied for a material batch and reset to
/// [`RasterState::default`] afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterState {
    pub depth_function: DepthFunction,
    pub cull_mode: CullMode,
    pub wireframe: bool,
}

/// A value written to a uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    FloatArray(&'a [f32]),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec3Array(&'a [Vec3]),
    Vec4(Vec4),
    Vec4Array(&'a [Vec4]),
    Mat3(Mat3),
    Mat4(Mat4),
    Mat4Array(&'a [Mat4]),
    Int(i32),
    Bool(bool),
    /// Texture unit index for a sampler uniform
    Sampler(i32),
}

// ============================================================================
// Buffers and Vertex Input
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StaticDraw,
    StreamDraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Float,
    UnsignedByte,
}

/// A vertex attribute pointer into the currently bound array buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: i32,
    pub ty: AttributeType,
    pub normalized: bool,
    pub stride: i32,
    pub offset: i32,
    /// 0 = per-vertex, 1 = per-instance
    pub divisor: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

// ============================================================================
// Programs
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ShaderSources<'a> {
    pub vertex: &'a str,
    pub geometry: Option<&'a str>,
    pub fragment: &'a str,
}

/// One row of a program's active-uniform or active-attribute table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveElement {
    /// Name as reported by the driver (may carry a `[0]` suffix)
    pub name: String,
    pub location: i32,
    pub ty: ShaderPropertyType,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    pub shading_language_version: String,
    pub max_samples: u32,
}

// ============================================================================
// The Device Trait
// ============================================================================

pub trait GraphicsDevice {
    fn info(&self) -> DeviceInfo;

    // --- object lifetime ---
    fn create_texture(&self) -> Result<TextureId>;
    fn delete_texture(&self, texture: TextureId);
    fn create_renderbuffer(&self) -> Result<RenderbufferId>;
    fn delete_renderbuffer(&self, renderbuffer: RenderbufferId);
    fn create_framebuffer(&self) -> Result<FramebufferId>;
    fn delete_framebuffer(&self, framebuffer: FramebufferId);
    fn create_buffer(&self) -> Result<BufferId>;
    fn delete_buffer(&self, buffer: BufferId);
    fn create_vertex_array(&self) -> Result<VertexArrayId>;
    fn delete_vertex_array(&self, vertex_array: VertexArrayId);
    fn create_program(&self, sources: &ShaderSources<'_>) -> Result<ProgramId>;
    fn delete_program(&self, program: ProgramId);

    // --- reflection ---
    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveElement>;
    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveElement>;

    // --- textures ---
    fn upload_image(&self, texture: TextureId, image: &ImageUpload<'_>);
    fn generate_mipmaps(&self, texture: TextureId, kind: TextureKind);
    fn set_sampler_params(&self, texture: TextureId, kind: TextureKind, params: &SamplerParams);
    fn allocate_renderbuffer(
        &self,
        renderbuffer: RenderbufferId,
        samples: u32,
        format: InternalFormat,
        width: u32,
        height: u32,
    );

    // --- framebuffers ---
    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferId>);
    fn attach(&self, target: FramebufferTarget, attachment: Attachment, surface: AttachmentSurface);
    fn set_draw_buffers(&self, attachments: &[Attachment]);
    fn set_read_buffer(&self, attachment: Attachment);
    fn clear_color_attachment(&self, draw_buffer: u32, color: [f32; 4]);
    fn clear_depth_stencil_attachment(&self, depth: f32, stencil: i32);
    fn clear_window(&self, color: Option<[f32; 4]>, depth: bool);
    fn blit_framebuffer(&self, src: PixelRegion, dst: PixelRegion, mask: BlitMask, filter: BlitFilter);
    fn read_pixels(
        &self,
        region: PixelRegion,
        layout: PixelLayout,
        pixel_type: PixelType,
        pack_alignment: u32,
        out: &mut [u8],
    );

    // --- pipeline state ---
    fn set_viewport(&self, region: PixelRegion);
    fn set_scissor(&self, region: Option<PixelRegion>);
    fn set_depth_test(&self, enabled: bool);
    fn set_blending(&self, enabled: bool);
    fn set_raster_state(&self, state: RasterState);

    // --- programs ---
    fn use_program(&self, program: Option<ProgramId>);
    fn set_uniform(&self, location: i32, value: UniformValue<'_>);
    fn bind_texture_unit(&self, unit: u32, kind: TextureKind, texture: TextureId);

    // --- geometry ---
    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayId>);
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>);
    fn upload_buffer(&self, buffer: BufferId, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn enable_vertex_attribute(&self, attribute: &VertexAttribute);
    fn disable_vertex_attribute(&self, location: u32);
    fn draw_indexed(&self, topology: MeshTopology, index_count: u32, index_type: IndexType, instances: u32);
}
