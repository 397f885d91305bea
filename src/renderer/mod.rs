//! Rendering
//!
//! - `device`: the hardware seam ([`GraphicsDevice`]) and its OpenGL and
//!   headless implementations
//! - `gpu`: owning wrappers around device objects
//! - `context`: the explicitly owned [`GraphicsContext`]
//! - `graphics`: `draw_mesh`, blits and texture copies
//! - `backend`: queue flushing, batching and instancing

pub mod device;
pub mod gpu;
pub mod context;
pub mod graphics;

pub(crate) mod backend;
pub(crate) mod queue;
pub(crate) mod render_object;

pub use context::{GraphicsContext, GraphicsContextConfig};
#[cfg(not(target_arch = "wasm32"))]
pub use device::GlowDevice;
pub use device::{GraphicsDevice, HeadlessDevice};
