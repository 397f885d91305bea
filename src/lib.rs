//! # Myth GL
//!
//! A retained-resource, immediate-mode OpenGL renderer.
//!
//! Callers own value-semantic resources ([`Texture2D`], [`Mesh`],
//! [`Material`], [`Shader`], [`RenderTexture`]) and submit draws against a
//! [`Camera`] with [`draw_mesh`]. Nothing reaches the GPU until the camera is
//! flushed with [`Camera::render_to_screen`], [`Camera::render_to`] or
//! [`Camera::render_to_target`]; the flush sorts, batches and instances the
//! queue, uploads whatever resources changed since their last use, and
//! leaves the queue empty.
//!
//! All hardware access goes through one [`GraphicsDevice`]: [`GlowDevice`]
//! over an OpenGL 3.3 core context, or [`HeadlessDevice`] for tests and
//! tooling.
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use myth_gl::*;
//!
//! let ctx = GraphicsContext::new(Rc::new(HeadlessDevice::new()), GraphicsContextConfig::default())?;
//! let shader = Shader::new(&ctx, VERTEX_SRC, FRAGMENT_SRC)?;
//! let mut material = Material::new(shader);
//! material.set_color("uColor", Color::RED);
//!
//! let mut camera = Camera::new();
//! draw_mesh(&create_box(1.0, 1.0, 1.0), &Transform::IDENTITY, &material, &mut camera, None);
//! camera.render_to_screen(&ctx);
//! ctx.swap_buffers(|| window.swap());
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod math;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use errors::{GraphicsError, Result};
pub use math::{Aabb, Line, Rect, Transform};
pub use renderer::graphics::{
    blit, blit_texture_to_screen, blit_to_screen, blit_to_screen_with_material, copy_texture,
    copy_texture_face, copy_texture_to_cubemap, draw_mesh, draw_mesh_with_matrix,
};
#[cfg(not(target_arch = "wasm32"))]
pub use renderer::GlowDevice;
pub use renderer::{GraphicsContext, GraphicsContextConfig, GraphicsDevice, HeadlessDevice};
pub use resources::primitives::*;
pub use resources::{
    Color, Color32, ColorSpace, CullMode, Cubemap, CubemapFace, DepthFunction, DepthStencilFormat,
    Material, MaterialPropertyBlock, MaterialValue, Mesh, MeshTopology, RenderBuffer,
    RenderBufferLoadAction, RenderBufferStoreAction, RenderBufferType, RenderTarget,
    RenderTargetColorAttachment, RenderTargetDepthAttachment, RenderTexture, RenderTextureDescriptor,
    RenderTextureFormat, Shader, ShaderPropertyType, Texture2D, TextureDimensionality,
    TextureFilterMode, TextureFormat, TextureWrapMode,
};
pub use scene::{Camera, CameraClearFlags, CameraProjection};
