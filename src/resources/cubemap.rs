use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::Result;
use crate::renderer::context::GraphicsContext;
use crate::renderer::device::{GraphicsDevice, ImageUpload, TextureId, TextureKind, TextureTarget};
use crate::renderer::gpu::GpuTexture;
use crate::resources::texture::{ColorSpace, TextureFilterMode, TextureFormat, TextureWrapMode, sampler_params};
use crate::resources::version_tracker::VersionToken;

/// Faces in the order the hardware numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubemapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubemapFace {
    pub const ALL: [CubemapFace; 6] = [
        CubemapFace::PositiveX,
        CubemapFace::NegativeX,
        CubemapFace::PositiveY,
        CubemapFace::NegativeY,
        CubemapFace::PositiveZ,
        CubemapFace::NegativeZ,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
struct CubemapGpu {
    texture: GpuTexture,
    data_token: Option<VersionToken>,
    params_token: Option<VersionToken>,
}

#[derive(Debug)]
struct CubemapInner {
    width: u32,
    format: TextureFormat,
    wrap_mode: [TextureWrapMode; 3],
    filter_mode: TextureFilterMode,
    faces: [Vec<u8>; 6],
    data_token: VersionToken,
    params_token: VersionToken,
    gpu: RefCell<Option<CubemapGpu>>,
}

impl Clone for CubemapInner {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            format: self.format,
            wrap_mode: self.wrap_mode,
            filter_mode: self.filter_mode,
            faces: self.faces.clone(),
            data_token: self.data_token,
            params_token: self.params_token,
            gpu: RefCell::new(None),
        }
    }
}

/// Six square sRGB faces sampled as one `samplerCube`.
#[derive(Debug, Clone)]
pub struct Cubemap {
    inner: Rc<CubemapInner>,
}

impl Cubemap {
    #[must_use]
    pub fn new(width: u32, format: TextureFormat) -> Self {
        assert!(width > 0, "the width of a cubemap must be a positive number");
        let face_bytes = Self::face_len(width, format);
        Self {
            inner: Rc::new(CubemapInner {
                width,
                format,
                wrap_mode: [TextureWrapMode::Clamp; 3],
                filter_mode: TextureFilterMode::Mipmap,
                faces: std::array::from_fn(|_| vec![0; face_bytes]),
                data_token: VersionToken::new(),
                params_token: VersionToken::new(),
                gpu: RefCell::new(None),
            }),
        }
    }

    fn face_len(width: u32, format: TextureFormat) -> usize {
        width as usize * width as usize * format.bytes_per_pixel()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.inner.format
    }

    #[must_use]
    pub fn wrap_mode(&self) -> TextureWrapMode {
        self.inner.wrap_mode[0]
    }

    pub fn set_wrap_mode(&mut self, mode: TextureWrapMode) {
        let inner = Rc::make_mut(&mut self.inner);
        inner.wrap_mode = [mode; 3];
        inner.params_token.renew();
    }

    #[must_use]
    pub fn filter_mode(&self) -> TextureFilterMode {
        self.inner.filter_mode
    }

    pub fn set_filter_mode(&mut self, mode: TextureFilterMode) {
        let inner = Rc::make_mut(&mut self.inner);
        inner.filter_mode = mode;
        inner.params_token.renew();
    }

    #[must_use]
    pub fn pixel_data(&self, face: CubemapFace) -> &[u8] {
        &self.inner.faces[face.index()]
    }

    /// Replaces one face, row by row. All faces are square and equally sized.
    pub fn set_pixel_data(&mut self, face: CubemapFace, data: &[u8]) {
        assert_eq!(
            data.len(),
            Self::face_len(self.inner.width, self.inner.format),
            "incorrect number of bytes for a cubemap face: all faces must be square and of equal size"
        );
        let inner = Rc::make_mut(&mut self.inner);
        inner.faces[face.index()].copy_from_slice(data);
        inner.data_token.renew();
    }

    pub fn gpu_handle(&self, ctx: &GraphicsContext) -> Result<TextureId> {
        self.ensure_gpu(ctx.device())
    }

    pub(crate) fn ensure_unique_gpu(&mut self, device: &Rc<dyn GraphicsDevice>) -> Result<TextureId> {
        Rc::make_mut(&mut self.inner);
        self.ensure_gpu(device)
    }

    pub(crate) fn ensure_gpu(&self, device: &Rc<dyn GraphicsDevice>) -> Result<TextureId> {
        let inner = &*self.inner;
        let mut slot = inner.gpu.borrow_mut();
        let mut gpu = match slot.take() {
            Some(gpu) => gpu,
            None => CubemapGpu {
                texture: GpuTexture::new(device)?,
                data_token: None,
                params_token: None,
            },
        };
        let id = gpu.texture.id();

        if gpu.data_token != Some(inner.data_token) {
            log::debug!("uploading {0}x{0} {1:?} cubemap", inner.width, inner.format);
            for (face, pixels) in inner.faces.iter().enumerate() {
                device.upload_image(
                    id,
                    &ImageUpload {
                        target: TextureTarget::CubemapFace(face as u32),
                        internal_format: inner.format.internal_format(ColorSpace::Srgb),
                        width: inner.width,
                        height: inner.width,
                        layout: inner.format.pixel_layout(),
                        pixel_type: inner.format.pixel_type(),
                        unpack_alignment: inner.format.pixel_alignment(),
                        pixels: Some(pixels),
                    },
                );
            }
            device.generate_mipmaps(id, TextureKind::Cubemap);
            gpu.data_token = Some(inner.data_token);
        }

        if gpu.params_token != Some(inner.params_token) {
            device.set_sampler_params(id, TextureKind::Cubemap, &sampler_params(inner.wrap_mode, inner.filter_mode));
            gpu.params_token = Some(inner.params_token);
        }

        *slot = Some(gpu);
        Ok(id)
    }
}

impl PartialEq for Cubemap {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
