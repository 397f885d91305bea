//! Render textures
//!
//! A [`RenderTexture`] is a color [`RenderBuffer`] plus a depth/stencil
//! [`RenderBuffer`] that share one [`RenderTextureDescriptor`].
//!
//! `RenderTexture` is copy-on-write: clones render into and sample the same
//! buffers until one of them is reconfigured, at which point that clone
//! detaches onto fresh buffers. `RenderBuffer`s themselves are shared
//! handles, which is what lets a [`RenderTarget`](super::RenderTarget)
//! reference the buffers of a texture that is later sampled by a material.
//!
//! The GPU storage is chosen at first use from the descriptor:
//!
//! | dimensionality | anti-aliasing | storage                                   |
//! |----------------|---------------|-------------------------------------------|
//! | `Tex2D`        | 1             | single-sampled texture                    |
//! | `Tex2D`        | > 1           | multisampled renderbuffer + resolved texture |
//! | `Cube`         | 1             | single-sampled cubemap                    |
//!
//! Any change to the descriptor drops the storage; it is rebuilt lazily.

use std::cell::RefCell;
use std::rc::Rc;

use glam::UVec2;

use crate::errors::Result;
use crate::renderer::device::{
    GraphicsDevice, ImageUpload, InternalFormat, PixelLayout, PixelType, RenderbufferId,
    SamplerFilter, SamplerParams, SamplerWrap, TextureId, TextureKind, TextureTarget,
};
use crate::renderer::gpu::{GpuRenderbuffer, GpuTexture};
use crate::resources::version_tracker::VersionToken;

// ============================================================================
// Descriptor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimensionality {
    #[default]
    Tex2D,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTextureFormat {
    R8Unorm,
    R8G8B8A8Unorm,
    #[default]
    R8G8B8A8Srgb,
    R16G16B16A16Sfloat,
    R32Sfloat,
}

impl RenderTextureFormat {
    #[must_use]
    pub fn is_srgb(self) -> bool {
        matches!(self, RenderTextureFormat::R8G8B8A8Srgb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthStencilFormat {
    #[default]
    D24UnormS8Uint,
    D32SfloatS8Uint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTextureDescriptor {
    dimensions: UVec2,
    dimensionality: TextureDimensionality,
    anti_aliasing_level: u32,
    color_format: RenderTextureFormat,
    depth_stencil_format: DepthStencilFormat,
}

impl RenderTextureDescriptor {
    #[must_use]
    pub fn new(dimensions: UVec2) -> Self {
        Self {
            dimensions: dimensions.max(UVec2::ONE),
            dimensionality: TextureDimensionality::Tex2D,
            anti_aliasing_level: 1,
            color_format: RenderTextureFormat::default(),
            depth_stencil_format: DepthStencilFormat::default(),
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> UVec2 {
        self.dimensions
    }

    pub fn set_dimensions(&mut self, dimensions: UVec2) {
        self.dimensions = dimensions.max(UVec2::ONE);
    }

    #[must_use]
    pub fn dimensionality(&self) -> TextureDimensionality {
        self.dimensionality
    }

    pub fn set_dimensionality(&mut self, dimensionality: TextureDimensionality) {
        self.dimensionality = dimensionality;
    }

    #[must_use]
    pub fn anti_aliasing_level(&self) -> u32 {
        self.anti_aliasing_level
    }

    pub fn set_anti_aliasing_level(&mut self, level: u32) {
        self.anti_aliasing_level = level.max(1);
    }

    #[must_use]
    pub fn color_format(&self) -> RenderTextureFormat {
        self.color_format
    }

    pub fn set_color_format(&mut self, format: RenderTextureFormat) {
        self.color_format = format;
    }

    #[must_use]
    pub fn depth_stencil_format(&self) -> DepthStencilFormat {
        self.depth_stencil_format
    }

    pub fn set_depth_stencil_format(&mut self, format: DepthStencilFormat) {
        self.depth_stencil_format = format;
    }
}

// ============================================================================
// RenderBuffer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderBufferType {
    Color,
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderBufferFormat {
    Color(RenderTextureFormat),
    DepthStencil(DepthStencilFormat),
}

impl RenderBufferFormat {
    fn internal_format(self) -> InternalFormat {
        match self {
            RenderBufferFormat::Color(RenderTextureFormat::R8Unorm) => InternalFormat::R8,
            RenderBufferFormat::Color(RenderTextureFormat::R8G8B8A8Unorm) => InternalFormat::Rgba8,
            RenderBufferFormat::Color(RenderTextureFormat::R8G8B8A8Srgb) => InternalFormat::Srgb8Alpha8,
            RenderBufferFormat::Color(RenderTextureFormat::R16G16B16A16Sfloat) => InternalFormat::Rgba16F,
            RenderBufferFormat::Color(RenderTextureFormat::R32Sfloat) => InternalFormat::R32F,
            RenderBufferFormat::DepthStencil(DepthStencilFormat::D24UnormS8Uint) => InternalFormat::Depth24Stencil8,
            RenderBufferFormat::DepthStencil(DepthStencilFormat::D32SfloatS8Uint) => InternalFormat::Depth32FStencil8,
        }
    }

    fn pixel_layout(self) -> (PixelLayout, PixelType) {
        match self {
            RenderBufferFormat::Color(RenderTextureFormat::R8Unorm) => (PixelLayout::Red, PixelType::UnsignedByte),
            RenderBufferFormat::Color(RenderTextureFormat::R8G8B8A8Unorm | RenderTextureFormat::R8G8B8A8Srgb) => {
                (PixelLayout::Rgba, PixelType::UnsignedByte)
            }
            RenderBufferFormat::Color(RenderTextureFormat::R16G16B16A16Sfloat) => (PixelLayout::Rgba, PixelType::HalfFloat),
            RenderBufferFormat::Color(RenderTextureFormat::R32Sfloat) => (PixelLayout::Red, PixelType::Float),
            RenderBufferFormat::DepthStencil(DepthStencilFormat::D24UnormS8Uint) => {
                (PixelLayout::DepthStencil, PixelType::UnsignedInt24_8)
            }
            RenderBufferFormat::DepthStencil(DepthStencilFormat::D32SfloatS8Uint) => {
                (PixelLayout::DepthStencil, PixelType::Float32UnsignedInt24_8)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderBufferParams {
    dimensions: UVec2,
    dimensionality: TextureDimensionality,
    anti_aliasing_level: u32,
    format: RenderBufferFormat,
}

impl RenderBufferParams {
    fn color(desc: &RenderTextureDescriptor) -> Self {
        Self {
            dimensions: desc.dimensions,
            dimensionality: desc.dimensionality,
            anti_aliasing_level: desc.anti_aliasing_level,
            format: RenderBufferFormat::Color(desc.color_format),
        }
    }

    fn depth(desc: &RenderTextureDescriptor) -> Self {
        Self {
            dimensions: desc.dimensions,
            dimensionality: desc.dimensionality,
            anti_aliasing_level: desc.anti_aliasing_level,
            format: RenderBufferFormat::DepthStencil(desc.depth_stencil_format),
        }
    }

    fn validate(&self) {
        if self.dimensionality == TextureDimensionality::Cube {
            assert_eq!(
                self.dimensions.x, self.dimensions.y,
                "a cube render buffer must have square dimensions"
            );
            assert_eq!(
                self.anti_aliasing_level, 1,
                "a cube render buffer cannot be anti-aliased"
            );
        }
    }
}

#[derive(Debug)]
enum RenderBufferGpu {
    SingleSampledTexture(GpuTexture),
    MultisampledRboAndResolvedTexture {
        multisampled: GpuRenderbuffer,
        resolved: GpuTexture,
    },
    SingleSampledCubemap(GpuTexture),
}

/// Device ids of a render buffer's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderBufferStorage {
    SingleSampledTexture(TextureId),
    MultisampledRboAndResolvedTexture {
        multisampled: RenderbufferId,
        resolved: TextureId,
    },
    SingleSampledCubemap(TextureId),
}

impl RenderBufferStorage {
    /// The texture a shader samples (the resolved one, for multisampled storage).
    pub(crate) fn sampled_texture(self) -> (TextureKind, TextureId) {
        match self {
            RenderBufferStorage::SingleSampledTexture(texture)
            | RenderBufferStorage::MultisampledRboAndResolvedTexture { resolved: texture, .. } => {
                (TextureKind::Texture2D, texture)
            }
            RenderBufferStorage::SingleSampledCubemap(texture) => (TextureKind::Cubemap, texture),
        }
    }
}

impl RenderBufferGpu {
    fn storage(&self) -> RenderBufferStorage {
        match self {
            RenderBufferGpu::SingleSampledTexture(t) => RenderBufferStorage::SingleSampledTexture(t.id()),
            RenderBufferGpu::MultisampledRboAndResolvedTexture { multisampled, resolved } => {
                RenderBufferStorage::MultisampledRboAndResolvedTexture {
                    multisampled: multisampled.id(),
                    resolved: resolved.id(),
                }
            }
            RenderBufferGpu::SingleSampledCubemap(t) => RenderBufferStorage::SingleSampledCubemap(t.id()),
        }
    }
}

#[derive(Debug)]
struct RenderBufferInner {
    buffer_type: RenderBufferType,
    params: RenderBufferParams,
    token: VersionToken,
    gpu: Option<RenderBufferGpu>,
    rendered_to: bool,
}

/// One attachment's worth of GPU storage. Cloning aliases the buffer.
#[derive(Debug, Clone)]
pub struct RenderBuffer {
    inner: Rc<RefCell<RenderBufferInner>>,
}

const RENDER_BUFFER_SAMPLER: SamplerParams = SamplerParams {
    min_filter: SamplerFilter::Linear,
    mag_filter: SamplerFilter::Linear,
    wrap: [SamplerWrap::ClampToEdge; 3],
};

impl RenderBuffer {
    fn new(buffer_type: RenderBufferType, params: RenderBufferParams) -> Self {
        params.validate();
        Self {
            inner: Rc::new(RefCell::new(RenderBufferInner {
                buffer_type,
                params,
                token: VersionToken::new(),
                gpu: None,
                rendered_to: false,
            })),
        }
    }

    #[must_use]
    pub fn buffer_type(&self) -> RenderBufferType {
        self.inner.borrow().buffer_type
    }

    #[must_use]
    pub fn dimensions(&self) -> UVec2 {
        self.inner.borrow().params.dimensions
    }

    #[must_use]
    pub fn dimensionality(&self) -> TextureDimensionality {
        self.inner.borrow().params.dimensionality
    }

    #[must_use]
    pub fn anti_aliasing_level(&self) -> u32 {
        self.inner.borrow().params.anti_aliasing_level
    }

    /// Token of the current storage layout.
    #[must_use]
    pub fn version(&self) -> VersionToken {
        self.inner.borrow().token
    }

    /// Whether the current storage has been attached to a framebuffer.
    /// Sampling the buffer from a material does not count.
    #[must_use]
    pub fn has_been_rendered_to(&self) -> bool {
        self.inner.borrow().rendered_to
    }

    pub(crate) fn mark_rendered_to(&self) {
        self.inner.borrow_mut().rendered_to = true;
    }

    fn reformat(&self, params: RenderBufferParams) {
        params.validate();
        let mut inner = self.inner.borrow_mut();
        if inner.params != params {
            inner.params = params;
            inner.gpu = None;
            inner.rendered_to = false;
            inner.token.renew();
        }
    }

    /// Device id of the texture shaders sample (the resolve target, when
    /// multisampled), once storage exists.
    #[must_use]
    pub fn texture_id(&self) -> Option<TextureId> {
        self.storage().map(|s| s.sampled_texture().1)
    }

    /// Storage ids, if the buffer has been created on the device.
    pub(crate) fn storage(&self) -> Option<RenderBufferStorage> {
        self.inner.borrow().gpu.as_ref().map(RenderBufferGpu::storage)
    }

    pub(crate) fn ensure_gpu(&self, device: &Rc<dyn GraphicsDevice>) -> Result<RenderBufferStorage> {
        let mut inner = self.inner.borrow_mut();
        if let Some(gpu) = &inner.gpu {
            return Ok(gpu.storage());
        }

        let params = inner.params;
        log::debug!(
            "allocating {:?} render buffer {}x{} ({:?}, {}x AA)",
            inner.buffer_type,
            params.dimensions.x,
            params.dimensions.y,
            params.dimensionality,
            params.anti_aliasing_level
        );

        let gpu = match (params.dimensionality, params.anti_aliasing_level) {
            (TextureDimensionality::Tex2D, aa) if aa <= 1 => {
                RenderBufferGpu::SingleSampledTexture(Self::allocate_texture(device, &params)?)
            }
            (TextureDimensionality::Tex2D, aa) => {
                let multisampled = GpuRenderbuffer::new(device)?;
                device.allocate_renderbuffer(
                    multisampled.id(),
                    aa,
                    params.format.internal_format(),
                    params.dimensions.x,
                    params.dimensions.y,
                );
                RenderBufferGpu::MultisampledRboAndResolvedTexture {
                    multisampled,
                    resolved: Self::allocate_texture(device, &params)?,
                }
            }
            (TextureDimensionality::Cube, _) => RenderBufferGpu::SingleSampledCubemap(Self::allocate_texture(device, &params)?),
        };

        let storage = gpu.storage();
        inner.gpu = Some(gpu);
        Ok(storage)
    }

    fn allocate_texture(device: &Rc<dyn GraphicsDevice>, params: &RenderBufferParams) -> Result<GpuTexture> {
        let texture = GpuTexture::new(device)?;
        let (layout, pixel_type) = params.format.pixel_layout();
        let (kind, targets) = match params.dimensionality {
            TextureDimensionality::Tex2D => (TextureKind::Texture2D, 0..1),
            TextureDimensionality::Cube => (TextureKind::Cubemap, 0..6),
        };
        for face in targets {
            device.upload_image(
                texture.id(),
                &ImageUpload {
                    target: match kind {
                        TextureKind::Texture2D => TextureTarget::Texture2D,
                        TextureKind::Cubemap => TextureTarget::CubemapFace(face),
                    },
                    internal_format: params.format.internal_format(),
                    width: params.dimensions.x,
                    height: params.dimensions.y,
                    layout,
                    pixel_type,
                    unpack_alignment: 4,
                    pixels: None,
                },
            );
        }
        device.set_sampler_params(texture.id(), kind, &RENDER_BUFFER_SAMPLER);
        Ok(texture)
    }
}

impl PartialEq for RenderBuffer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

// ============================================================================
// RenderTexture
// ============================================================================

/// A color + depth/stencil pair that cameras render into and materials sample.
///
/// Cloning is cheap and shares the buffers. Reconfiguring a clone that is
/// still shared gives it its own, unallocated, buffers and leaves the other
/// clones as they were.
#[derive(Debug, Clone)]
pub struct RenderTexture {
    descriptor: Rc<RenderTextureDescriptor>,
    color: RenderBuffer,
    depth: RenderBuffer,
}

impl RenderTexture {
    #[must_use]
    pub fn new(descriptor: RenderTextureDescriptor) -> Self {
        Self {
            color: RenderBuffer::new(RenderBufferType::Color, RenderBufferParams::color(&descriptor)),
            depth: RenderBuffer::new(RenderBufferType::Depth, RenderBufferParams::depth(&descriptor)),
            descriptor: Rc::new(descriptor),
        }
    }

    #[must_use]
    pub fn with_dimensions(dimensions: UVec2) -> Self {
        Self::new(RenderTextureDescriptor::new(dimensions))
    }

    #[must_use]
    pub fn descriptor(&self) -> RenderTextureDescriptor {
        *self.descriptor
    }

    /// Applies a whole descriptor, reformatting whichever buffers it affects.
    pub fn reformat(&mut self, descriptor: RenderTextureDescriptor) {
        if *self.descriptor == descriptor {
            return;
        }
        match Rc::get_mut(&mut self.descriptor) {
            Some(current) => {
                self.color.reformat(RenderBufferParams::color(&descriptor));
                self.depth.reformat(RenderBufferParams::depth(&descriptor));
                *current = descriptor;
            }
            // still shared with a clone: detach
            None => *self = Self::new(descriptor),
        }
    }

    fn update(&mut self, f: impl FnOnce(&mut RenderTextureDescriptor)) {
        let mut descriptor = self.descriptor();
        f(&mut descriptor);
        self.reformat(descriptor);
    }

    #[must_use]
    pub fn dimensions(&self) -> UVec2 {
        self.descriptor.dimensions
    }

    pub fn set_dimensions(&mut self, dimensions: UVec2) {
        self.update(|d| d.set_dimensions(dimensions));
    }

    #[must_use]
    pub fn dimensionality(&self) -> TextureDimensionality {
        self.descriptor.dimensionality
    }

    pub fn set_dimensionality(&mut self, dimensionality: TextureDimensionality) {
        self.update(|d| d.set_dimensionality(dimensionality));
    }

    #[must_use]
    pub fn anti_aliasing_level(&self) -> u32 {
        self.descriptor.anti_aliasing_level
    }

    pub fn set_anti_aliasing_level(&mut self, level: u32) {
        self.update(|d| d.set_anti_aliasing_level(level));
    }

    #[must_use]
    pub fn color_format(&self) -> RenderTextureFormat {
        self.descriptor.color_format
    }

    pub fn set_color_format(&mut self, format: RenderTextureFormat) {
        self.update(|d| d.set_color_format(format));
    }

    #[must_use]
    pub fn depth_stencil_format(&self) -> DepthStencilFormat {
        self.descriptor.depth_stencil_format
    }

    pub fn set_depth_stencil_format(&mut self, format: DepthStencilFormat) {
        self.update(|d| d.set_depth_stencil_format(format));
    }

    #[must_use]
    pub fn color_buffer(&self) -> RenderBuffer {
        self.color.clone()
    }

    #[must_use]
    pub fn depth_buffer(&self) -> RenderBuffer {
        self.depth.clone()
    }

    #[must_use]
    pub fn has_been_rendered_to(&self) -> bool {
        self.color.has_been_rendered_to()
    }
}

impl PartialEq for RenderTexture {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.descriptor, &other.descriptor)
    }
}
