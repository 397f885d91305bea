//! Graphics Context
//!
//! The explicitly owned root of the renderer. It brackets the lifetime of the
//! hardware context and holds everything that would otherwise be global: the
//! device, the built-in blit quad and shader, the instance-data buffer, and
//! the pending screenshot requests.
//!
//! Only one context may be alive per thread; constructing a second one fails
//! with [`GraphicsError::ContextAlreadyActive`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;
use glam::UVec2;

use crate::errors::{GraphicsError, Result};
use crate::renderer::device::{
    DeviceInfo, FramebufferTarget, GraphicsDevice, PixelRegion, ShaderSources,
};
use crate::renderer::gpu::GpuBuffer;
use crate::resources::color::Color;
use crate::resources::material::Material;
use crate::resources::mesh::Mesh;
use crate::resources::primitives::create_quad;
use crate::resources::shader::Shader;
use crate::resources::texture::{ColorSpace, Texture2D, TextureFilterMode, TextureFormat, TextureWrapMode};

const BLIT_VERTEX_SHADER: &str = r"#version 330 core

layout(location = 0) in vec3 aPos;
layout(location = 1) in vec2 aTexCoord;

uniform mat4 uViewProjMat;
uniform mat4 uModelMat;

out vec2 TexCoord;

void main()
{
    TexCoord = aTexCoord;
    gl_Position = uViewProjMat * uModelMat * vec4(aPos, 1.0);
}
";

const BLIT_FRAGMENT_SHADER: &str = r"#version 330 core

uniform sampler2D uTexture;

in vec2 TexCoord;
out vec4 FragColor;

void main()
{
    FragColor = texture(uTexture, TexCoord);
}
";

thread_local! {
    static CONTEXT_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the thread's context slot as taken until dropped.
#[derive(Debug)]
struct ContextGuard;

impl ContextGuard {
    fn acquire() -> Result<Self> {
        CONTEXT_ACTIVE.with(|active| {
            if active.replace(true) {
                Err(GraphicsError::ContextAlreadyActive)
            } else {
                Ok(ContextGuard)
            }
        })
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT_ACTIVE.with(|active| active.set(false));
    }
}

/// Context-level settings supplied by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsContextConfig {
    /// Recorded only: the window owns the swap interval
    pub vsync: bool,
    pub debug_mode: bool,
    pub window_dimensions: UVec2,
}

impl Default for GraphicsContextConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            debug_mode: false,
            window_dimensions: UVec2::new(800, 600),
        }
    }
}

pub struct GraphicsContext {
    device: Rc<dyn GraphicsDevice>,
    info: DeviceInfo,
    vsync: bool,
    debug_mode: Cell<bool>,
    window_dimensions: Cell<UVec2>,

    quad_mesh: Mesh,
    blit_material: Material,
    instance_buffer: GpuBuffer,
    pending_screenshots: RefCell<Vec<oneshot::Sender<Texture2D>>>,

    // dropped last, after every GPU object above
    _guard: ContextGuard,
}

impl GraphicsContext {
    pub fn new(device: Rc<dyn GraphicsDevice>, config: GraphicsContextConfig) -> Result<Self> {
        let guard = ContextGuard::acquire()?;

        let info = device.info();
        log::info!(
            "graphics context: {} / {} / {} (GLSL {})",
            info.vendor,
            info.renderer,
            info.version,
            info.shading_language_version
        );

        let blit_shader = Shader::compile(
            &device,
            &ShaderSources {
                vertex: BLIT_VERTEX_SHADER,
                geometry: None,
                fragment: BLIT_FRAGMENT_SHADER,
            },
        )?;
        let instance_buffer = GpuBuffer::new(&device)?;

        Ok(Self {
            info,
            vsync: config.vsync,
            debug_mode: Cell::new(config.debug_mode),
            window_dimensions: Cell::new(config.window_dimensions),
            quad_mesh: create_quad(),
            blit_material: Material::new(blit_shader),
            instance_buffer,
            pending_screenshots: RefCell::new(Vec::new()),
            device,
            _guard: guard,
        })
    }

    #[must_use]
    pub fn device(&self) -> &Rc<dyn GraphicsDevice> {
        &self.device
    }

    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Highest MSAA sample count the device supports.
    #[must_use]
    pub fn max_antialiasing_level(&self) -> u32 {
        self.info.max_samples.max(1)
    }

    #[must_use]
    pub fn is_vsync_enabled(&self) -> bool {
        self.vsync
    }

    #[must_use]
    pub fn is_in_debug_mode(&self) -> bool {
        self.debug_mode.get()
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        if self.debug_mode.replace(enabled) != enabled {
            log::info!("graphics debug mode {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    #[must_use]
    pub fn backend_vendor_string(&self) -> &str {
        &self.info.vendor
    }

    #[must_use]
    pub fn backend_renderer_string(&self) -> &str {
        &self.info.renderer
    }

    #[must_use]
    pub fn backend_version_string(&self) -> &str {
        &self.info.version
    }

    #[must_use]
    pub fn backend_shading_language_version_string(&self) -> &str {
        &self.info.shading_language_version
    }

    #[must_use]
    pub fn window_dimensions(&self) -> UVec2 {
        self.window_dimensions.get()
    }

    /// Called by the windowing layer whenever the drawable size changes.
    pub fn set_window_dimensions(&self, dimensions: UVec2) {
        self.window_dimensions.set(dimensions);
    }

    /// Clears the window's color (and depth) buffer. `color` is sRGB-encoded.
    pub fn clear_screen(&self, color: Color) {
        self.device.bind_framebuffer(FramebufferTarget::Both, None);
        self.device.clear_window(Some(color.to_linear().to_array()), true);
    }

    /// Resolves with the window contents at the next [`swap_buffers`](Self::swap_buffers).
    ///
    /// The screenshot is an sRGB `Rgba32` texture the size of the window.
    /// Its rows are bottom-up, the first row being the bottom of the window,
    /// which is the row order every [`Texture2D`] uploads with. Flip it
    /// before writing it to a top-down image format.
    ///
    /// The receiver reports `Canceled` if the context is dropped first.
    #[must_use]
    pub fn request_screenshot(&self) -> oneshot::Receiver<Texture2D> {
        let (sender, receiver) = oneshot::channel();
        self.pending_screenshots.borrow_mut().push(sender);
        receiver
    }

    /// Fulfills pending screenshot requests from the back buffer, then calls
    /// `present` to hand the frame to the window.
    pub fn swap_buffers(&self, present: impl FnOnce()) {
        let pending = std::mem::take(&mut *self.pending_screenshots.borrow_mut());
        if !pending.is_empty() {
            let screenshot = self.read_window_pixels();
            log::debug!("fulfilling {} screenshot request(s)", pending.len());
            for sender in pending {
                // the requester may have stopped waiting
                let _ = sender.send(screenshot.clone());
            }
        }
        present();
    }

    /// Reads the back buffer as-is, bottom row first.
    fn read_window_pixels(&self) -> Texture2D {
        let dims = self.window_dimensions().max(UVec2::ONE);
        let mut screenshot = Texture2D::new(
            dims,
            TextureFormat::Rgba32,
            ColorSpace::Srgb,
            TextureWrapMode::Repeat,
            TextureFilterMode::Nearest,
        );
        let format = screenshot.format();
        let mut pixels = vec![0u8; dims.x as usize * dims.y as usize * format.bytes_per_pixel()];

        self.device.bind_framebuffer(FramebufferTarget::Read, None);
        self.device.read_pixels(
            PixelRegion::from_dimensions(dims.x, dims.y),
            format.pixel_layout(),
            format.pixel_type(),
            format.pixel_alignment(),
            &mut pixels,
        );
        screenshot.set_pixel_data(&pixels);
        screenshot
    }

    // --- internals shared by the backend and the blit helpers ---

    pub(crate) fn quad_mesh(&self) -> &Mesh {
        &self.quad_mesh
    }

    pub(crate) fn blit_material(&self) -> &Material {
        &self.blit_material
    }

    pub(crate) fn instance_buffer(&self) -> &GpuBuffer {
        &self.instance_buffer
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("info", &self.info)
            .field("vsync", &self.vsync)
            .field("debug_mode", &self.debug_mode.get())
            .field("window_dimensions", &self.window_dimensions.get())
            .finish_non_exhaustive()
    }
}
