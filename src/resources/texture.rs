//! 2D textures
//!
//! [`Texture2D`] is a copy-on-write handle: cloning shares the pixel store, and
//! the first mutation through a shared handle detaches it. The GPU mirror
//! lives inside the store and is never shared by a detached copy.
//!
//! Two tokens drive the mirror:
//! - `data_token`: pixel data, dimensions or format changed, re-upload
//! - `params_token`: wrap or filter changed, refresh sampler parameters only

use std::cell::RefCell;
use std::rc::Rc;

use glam::UVec2;

use crate::renderer::context::GraphicsContext;
use crate::renderer::device::{
    GraphicsDevice, ImageUpload, InternalFormat, PixelLayout, PixelType, SamplerFilter,
    SamplerParams, SamplerWrap, TextureId, TextureKind, TextureTarget,
};
use crate::renderer::gpu::GpuTexture;
use crate::errors::Result;
use crate::resources::color::{Color, Color32, from_unorm8, to_unorm8};
use crate::resources::version_tracker::VersionToken;

// ============================================================================
// Formats and Sampling Options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureComponentFormat {
    Uint8,
    Float32,
}

impl TextureComponentFormat {
    #[must_use]
    pub fn size_in_bytes(self) -> usize {
        match self {
            TextureComponentFormat::Uint8 => 1,
            TextureComponentFormat::Float32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    R8,
    Rgb24,
    #[default]
    Rgba32,
    RgbFloat,
    RgbaFloat,
}

impl TextureFormat {
    #[must_use]
    pub fn num_components(self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rgb24 | TextureFormat::RgbFloat => 3,
            TextureFormat::Rgba32 | TextureFormat::RgbaFloat => 4,
        }
    }

    #[must_use]
    pub fn component_format(self) -> TextureComponentFormat {
        match self {
            TextureFormat::R8 | TextureFormat::Rgb24 | TextureFormat::Rgba32 => TextureComponentFormat::Uint8,
            TextureFormat::RgbFloat | TextureFormat::RgbaFloat => TextureComponentFormat::Float32,
        }
    }

    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        self.num_components() * self.component_format().size_in_bytes()
    }

    /// Row alignment the driver must assume when unpacking (or packing) rows.
    #[must_use]
    pub fn pixel_alignment(self) -> u32 {
        match self {
            TextureFormat::R8 | TextureFormat::Rgb24 => 1,
            TextureFormat::Rgba32 | TextureFormat::RgbFloat | TextureFormat::RgbaFloat => 4,
        }
    }

    pub(crate) fn pixel_layout(self) -> PixelLayout {
        match self.num_components() {
            1 => PixelLayout::Red,
            3 => PixelLayout::Rgb,
            _ => PixelLayout::Rgba,
        }
    }

    pub(crate) fn pixel_type(self) -> PixelType {
        match self.component_format() {
            TextureComponentFormat::Uint8 => PixelType::UnsignedByte,
            TextureComponentFormat::Float32 => PixelType::Float,
        }
    }

    pub(crate) fn internal_format(self, color_space: ColorSpace) -> InternalFormat {
        match (self, color_space) {
            (TextureFormat::R8, _) => InternalFormat::R8,
            (TextureFormat::Rgb24, ColorSpace::Srgb) => InternalFormat::Srgb8,
            (TextureFormat::Rgb24, ColorSpace::Linear) => InternalFormat::Rgb8,
            (TextureFormat::Rgba32, ColorSpace::Srgb) => InternalFormat::Srgb8Alpha8,
            (TextureFormat::Rgba32, ColorSpace::Linear) => InternalFormat::Rgba8,
            (TextureFormat::RgbFloat, _) => InternalFormat::Rgb32F,
            (TextureFormat::RgbaFloat, _) => InternalFormat::Rgba32F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrapMode {
    #[default]
    Repeat,
    Clamp,
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilterMode {
    #[default]
    Nearest,
    Linear,
    Mipmap,
}

pub(crate) fn sampler_params(wrap: [TextureWrapMode; 3], filter: TextureFilterMode) -> SamplerParams {
    let to_wrap = |w| match w {
        TextureWrapMode::Repeat => SamplerWrap::Repeat,
        TextureWrapMode::Clamp => SamplerWrap::ClampToEdge,
        TextureWrapMode::Mirror => SamplerWrap::MirroredRepeat,
    };
    let (min_filter, mag_filter) = match filter {
        TextureFilterMode::Nearest => (SamplerFilter::Nearest, SamplerFilter::Nearest),
        TextureFilterMode::Linear => (SamplerFilter::Linear, SamplerFilter::Linear),
        TextureFilterMode::Mipmap => (SamplerFilter::LinearMipmapLinear, SamplerFilter::Linear),
    };
    SamplerParams {
        min_filter,
        mag_filter,
        wrap: wrap.map(to_wrap),
    }
}

// ============================================================================
// Pixel Encoding
// ============================================================================

fn read_f32(bytes: &[u8]) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    f32::from_ne_bytes(raw)
}

/// Decodes one pixel. Missing color channels read as 0, missing alpha as 1.
pub(crate) fn decode_pixel(format: TextureFormat, bytes: &[u8]) -> Color {
    let mut rgba = [0.0, 0.0, 0.0, 1.0];
    let n = format.num_components();
    match format.component_format() {
        TextureComponentFormat::Uint8 => {
            for (dst, &b) in rgba.iter_mut().zip(&bytes[..n]) {
                *dst = from_unorm8(b);
            }
        }
        TextureComponentFormat::Float32 => {
            for (dst, chunk) in rgba.iter_mut().zip(bytes[..n * 4].chunks_exact(4)) {
                *dst = read_f32(chunk);
            }
        }
    }
    Color::from(rgba)
}

pub(crate) fn encode_pixel(format: TextureFormat, color: Color, out: &mut Vec<u8>) {
    let rgba = color.to_array();
    let n = format.num_components();
    match format.component_format() {
        TextureComponentFormat::Uint8 => out.extend(rgba[..n].iter().map(|&c| to_unorm8(c))),
        TextureComponentFormat::Float32 => {
            for c in &rgba[..n] {
                out.extend_from_slice(&c.to_ne_bytes());
            }
        }
    }
}

fn decode_pixel32(format: TextureFormat, bytes: &[u8]) -> Color32 {
    match format.component_format() {
        TextureComponentFormat::Uint8 => {
            let mut rgba = [0x00, 0x00, 0x00, 0xff];
            let n = format.num_components();
            rgba[..n].copy_from_slice(&bytes[..n]);
            Color32::new(rgba[0], rgba[1], rgba[2], rgba[3])
        }
        TextureComponentFormat::Float32 => Color32::from(decode_pixel(format, bytes)),
    }
}

fn encode_pixel32(format: TextureFormat, color: Color32, out: &mut Vec<u8>) {
    match format.component_format() {
        TextureComponentFormat::Uint8 => out.extend_from_slice(&color.to_array()[..format.num_components()]),
        TextureComponentFormat::Float32 => encode_pixel(format, Color::from(color), out),
    }
}

// ============================================================================
// Texture2D
// ============================================================================

#[derive(Debug)]
struct Texture2DGpu {
    texture: GpuTexture,
    data_token: Option<VersionToken>,
    params_token: Option<VersionToken>,
}

#[derive(Debug)]
struct Texture2DInner {
    dimensions: UVec2,
    format: TextureFormat,
    color_space: ColorSpace,
    wrap_mode: [TextureWrapMode; 3],
    filter_mode: TextureFilterMode,
    pixel_data: Vec<u8>,
    data_token: VersionToken,
    params_token: VersionToken,
    gpu: RefCell<Option<Texture2DGpu>>,
}

impl Clone for Texture2DInner {
    fn clone(&self) -> Self {
        Self {
            dimensions: self.dimensions,
            format: self.format,
            color_space: self.color_space,
            wrap_mode: self.wrap_mode,
            filter_mode: self.filter_mode,
            pixel_data: self.pixel_data.clone(),
            data_token: self.data_token,
            params_token: self.params_token,
            gpu: RefCell::new(None),
        }
    }
}

/// A 2D texture with CPU-side pixel data and a lazily created GPU mirror.
///
/// Pixel rows run bottom-up, as OpenGL uploads and reads them.
#[derive(Debug, Clone)]
pub struct Texture2D {
    inner: Rc<Texture2DInner>,
}

impl Texture2D {
    #[must_use]
    pub fn new(
        dimensions: UVec2,
        format: TextureFormat,
        color_space: ColorSpace,
        wrap_mode: TextureWrapMode,
        filter_mode: TextureFilterMode,
    ) -> Self {
        assert!(
            dimensions.x > 0 && dimensions.y > 0,
            "a texture must have a non-zero width and height (got {dimensions})"
        );
        let num_bytes = dimensions.x as usize * dimensions.y as usize * format.bytes_per_pixel();
        Self {
            inner: Rc::new(Texture2DInner {
                dimensions,
                format,
                color_space,
                wrap_mode: [wrap_mode; 3],
                filter_mode,
                pixel_data: vec![0xff; num_bytes],
                data_token: VersionToken::new(),
                params_token: VersionToken::new(),
                gpu: RefCell::new(None),
            }),
        }
    }

    /// `RGBA32`, sRGB, repeat-wrapped, nearest-filtered.
    #[must_use]
    pub fn with_dimensions(dimensions: UVec2) -> Self {
        Self::new(
            dimensions,
            TextureFormat::default(),
            ColorSpace::default(),
            TextureWrapMode::default(),
            TextureFilterMode::default(),
        )
    }

    fn upd(&mut self) -> &mut Texture2DInner {
        Rc::make_mut(&mut self.inner)
    }

    #[must_use]
    pub fn dimensions(&self) -> UVec2 {
        self.inner.dimensions
    }

    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.inner.format
    }

    #[must_use]
    pub fn color_space(&self) -> ColorSpace {
        self.inner.color_space
    }

    #[must_use]
    pub fn wrap_mode(&self) -> TextureWrapMode {
        self.inner.wrap_mode[0]
    }

    pub fn set_wrap_mode(&mut self, mode: TextureWrapMode) {
        let inner = self.upd();
        inner.wrap_mode = [mode; 3];
        inner.params_token.renew();
    }

    #[must_use]
    pub fn wrap_mode_u(&self) -> TextureWrapMode {
        self.inner.wrap_mode[0]
    }

    pub fn set_wrap_mode_u(&mut self, mode: TextureWrapMode) {
        self.set_wrap_axis(0, mode);
    }

    #[must_use]
    pub fn wrap_mode_v(&self) -> TextureWrapMode {
        self.inner.wrap_mode[1]
    }

    pub fn set_wrap_mode_v(&mut self, mode: TextureWrapMode) {
        self.set_wrap_axis(1, mode);
    }

    #[must_use]
    pub fn wrap_mode_w(&self) -> TextureWrapMode {
        self.inner.wrap_mode[2]
    }

    pub fn set_wrap_mode_w(&mut self, mode: TextureWrapMode) {
        self.set_wrap_axis(2, mode);
    }

    fn set_wrap_axis(&mut self, axis: usize, mode: TextureWrapMode) {
        let inner = self.upd();
        inner.wrap_mode[axis] = mode;
        inner.params_token.renew();
    }

    #[must_use]
    pub fn filter_mode(&self) -> TextureFilterMode {
        self.inner.filter_mode
    }

    pub fn set_filter_mode(&mut self, mode: TextureFilterMode) {
        let inner = self.upd();
        inner.filter_mode = mode;
        inner.params_token.renew();
    }

    /// Reallocates the pixel store at new dimensions, filled with `0xff`.
    pub fn resize(&mut self, dimensions: UVec2) {
        assert!(dimensions.x > 0 && dimensions.y > 0, "a texture must have a non-zero width and height");
        let inner = self.upd();
        let num_bytes = dimensions.x as usize * dimensions.y as usize * inner.format.bytes_per_pixel();
        inner.dimensions = dimensions;
        inner.pixel_data = vec![0xff; num_bytes];
        inner.data_token.renew();
    }

    fn num_pixels(&self) -> usize {
        self.inner.dimensions.x as usize * self.inner.dimensions.y as usize
    }

    #[must_use]
    pub fn pixels(&self) -> Vec<Color> {
        let format = self.inner.format;
        self.inner
            .pixel_data
            .chunks_exact(format.bytes_per_pixel())
            .map(|px| decode_pixel(format, px))
            .collect()
    }

    pub fn set_pixels(&mut self, pixels: &[Color]) {
        assert_eq!(
            pixels.len(),
            self.num_pixels(),
            "number of pixels must match the texture's width * height"
        );
        let format = self.inner.format;
        let mut data = Vec::with_capacity(pixels.len() * format.bytes_per_pixel());
        for &px in pixels {
            encode_pixel(format, px, &mut data);
        }
        self.replace_pixel_data(data);
    }

    #[must_use]
    pub fn pixels32(&self) -> Vec<Color32> {
        let format = self.inner.format;
        self.inner
            .pixel_data
            .chunks_exact(format.bytes_per_pixel())
            .map(|px| decode_pixel32(format, px))
            .collect()
    }

    pub fn set_pixels32(&mut self, pixels: &[Color32]) {
        assert_eq!(
            pixels.len(),
            self.num_pixels(),
            "number of pixels must match the texture's width * height"
        );
        let format = self.inner.format;
        let mut data = Vec::with_capacity(pixels.len() * format.bytes_per_pixel());
        for &px in pixels {
            encode_pixel32(format, px, &mut data);
        }
        self.replace_pixel_data(data);
    }

    #[must_use]
    pub fn pixel_data(&self) -> &[u8] {
        &self.inner.pixel_data
    }

    pub fn set_pixel_data(&mut self, data: &[u8]) {
        assert_eq!(
            data.len(),
            self.num_pixels() * self.inner.format.bytes_per_pixel(),
            "pixel data must match the texture's dimensions and format"
        );
        self.replace_pixel_data(data.to_vec());
    }

    fn replace_pixel_data(&mut self, data: Vec<u8>) {
        let inner = self.upd();
        inner.pixel_data = data;
        inner.data_token.renew();
    }

    /// Token of the current pixel content.
    #[must_use]
    pub fn version(&self) -> VersionToken {
        self.inner.data_token
    }

    /// Returns the GPU texture, uploading pixel data and refreshing sampler
    /// parameters only if their tokens changed since the last call.
    pub fn gpu_handle(&self, ctx: &GraphicsContext) -> Result<TextureId> {
        self.ensure_gpu(ctx.device())
    }

    pub(crate) fn ensure_gpu(&self, device: &Rc<dyn GraphicsDevice>) -> Result<TextureId> {
        let inner = &*self.inner;
        let mut slot = inner.gpu.borrow_mut();
        let mut gpu = match slot.take() {
            Some(gpu) => gpu,
            None => Texture2DGpu {
                texture: GpuTexture::new(device)?,
                data_token: None,
                params_token: None,
            },
        };
        let id = gpu.texture.id();

        if gpu.data_token != Some(inner.data_token) {
            log::debug!("uploading {}x{} {:?} texture", inner.dimensions.x, inner.dimensions.y, inner.format);
            device.upload_image(
                id,
                &ImageUpload {
                    target: TextureTarget::Texture2D,
                    internal_format: inner.format.internal_format(inner.color_space),
                    width: inner.dimensions.x,
                    height: inner.dimensions.y,
                    layout: inner.format.pixel_layout(),
                    pixel_type: inner.format.pixel_type(),
                    unpack_alignment: inner.format.pixel_alignment(),
                    pixels: Some(&inner.pixel_data),
                },
            );
            device.generate_mipmaps(id, TextureKind::Texture2D);
            gpu.data_token = Some(inner.data_token);
        }

        if gpu.params_token != Some(inner.params_token) {
            device.set_sampler_params(id, TextureKind::Texture2D, &sampler_params(inner.wrap_mode, inner.filter_mode));
            gpu.params_token = Some(inner.params_token);
        }

        *slot = Some(gpu);
        Ok(id)
    }

    /// GPU texture of an unshared copy, for device-side writes that must not
    /// leak into aliases.
    pub(crate) fn ensure_unique_gpu(&mut self, device: &Rc<dyn GraphicsDevice>) -> Result<TextureId> {
        self.upd();
        self.ensure_gpu(device)
    }

    /// Overwrites the CPU copy with data read back from the GPU mirror, which
    /// already holds this content.
    pub(crate) fn with_readback_target<R>(&mut self, f: impl FnOnce(&mut [u8], TextureFormat, UVec2) -> R) -> R {
        let inner = self.upd();
        f(&mut inner.pixel_data, inner.format, inner.dimensions)
    }
}

impl PartialEq for Texture2D {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
