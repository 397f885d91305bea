//! Retained resources
//!
//! Value-semantic handles the caller owns and passes to draw calls:
//! - Texture2D / Cubemap: CPU pixel data with a lazily uploaded GPU mirror
//! - RenderTexture / RenderBuffer / RenderTarget: GPU-only draw destinations
//! - Shader: compiled program plus uniform and attribute reflection
//! - Material / MaterialPropertyBlock: named uniform values
//! - Mesh: vertex streams, indices, bounds and a triangle BVH

pub mod color;
pub mod cubemap;
pub mod material;
pub mod mesh;
pub mod primitives;
pub mod render_target;
pub mod render_texture;
pub mod shader;
pub mod texture;
pub mod version_tracker;

pub use color::{Color, Color32};
pub use cubemap::{Cubemap, CubemapFace};
pub use material::{
    CullMode, DepthFunction, Material, MaterialPropertyBlock, MaterialValue, MaterialValueType,
};
pub use mesh::{Mesh, MeshIndices, MeshTopology};
pub use render_target::{
    RenderBufferLoadAction, RenderBufferStoreAction, RenderTarget, RenderTargetColorAttachment,
    RenderTargetDepthAttachment,
};
pub use render_texture::{
    DepthStencilFormat, RenderBuffer, RenderBufferType, RenderTexture, RenderTextureDescriptor,
    RenderTextureFormat, TextureDimensionality,
};
pub use shader::{Shader, ShaderElement, ShaderPropertyType, normalize_shader_element_name};
pub use texture::{
    ColorSpace, Texture2D, TextureComponentFormat, TextureFilterMode, TextureFormat, TextureWrapMode,
};
pub use version_tracker::VersionToken;
