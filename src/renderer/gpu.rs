//! GPU object wrappers
//!
//! Each wrapper owns exactly one device object and deletes it on drop. They
//! keep the device alive through an `Rc`, so a mirror can outlive the frame
//! (or the camera) that created it.

use std::fmt;
use std::rc::Rc;

use super::device::{
    BufferId, FramebufferId, GraphicsDevice, ProgramId, RenderbufferId, ShaderSources, TextureId,
    VertexArrayId,
};
use crate::errors::Result;

macro_rules! gpu_object {
    ($(#[$meta:meta])* $name:ident, $id:ty, $create:ident, $delete:ident) => {
        $(#[$meta])*
        pub struct $name {
            device: Rc<dyn GraphicsDevice>,
            id: $id,
        }

        impl $name {
            pub fn new(device: &Rc<dyn GraphicsDevice>) -> Result<Self> {
                let id = device.$create()?;
                Ok(Self {
                    device: Rc::clone(device),
                    id,
                })
            }

            #[inline]
            #[must_use]
            pub fn id(&self) -> $id {
                self.id
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.device.$delete(self.id);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.id).finish()
            }
        }
    };
}

gpu_object!(GpuTexture, TextureId, create_texture, delete_texture);
gpu_object!(GpuRenderbuffer, RenderbufferId, create_renderbuffer, delete_renderbuffer);
gpu_object!(
    /// Framebuffers are transient: built per render pass and dropped with it.
    GpuFramebuffer,
    FramebufferId,
    create_framebuffer,
    delete_framebuffer
);
gpu_object!(GpuBuffer, BufferId, create_buffer, delete_buffer);
gpu_object!(GpuVertexArray, VertexArrayId, create_vertex_array, delete_vertex_array);

/// A linked program.
pub struct GpuProgram {
    device: Rc<dyn GraphicsDevice>,
    id: ProgramId,
}

impl GpuProgram {
    pub fn compile(device: &Rc<dyn GraphicsDevice>, sources: &ShaderSources<'_>) -> Result<Self> {
        let id = device.create_program(sources)?;
        Ok(Self {
            device: Rc::clone(device),
            id,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.id
    }
}

impl Drop for GpuProgram {
    fn drop(&mut self) {
        self.device.delete_program(self.id);
    }
}

impl fmt::Debug for GpuProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GpuProgram").field(&self.id).finish()
    }
}
