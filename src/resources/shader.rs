//! Shader programs and their reflected property tables.
//!
//! A [`Shader`] is compiled and reflected exactly once. Uniforms are exposed
//! by stable index in reflection order with O(1) name lookup; array uniforms
//! are addressed by their base name (`uColors`, not `uColors[0]`).

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::errors::Result;
use crate::renderer::context::GraphicsContext;
use crate::renderer::device::{ActiveElement, GraphicsDevice, ProgramId, ShaderSources};
use crate::renderer::gpu::GpuProgram;

/// The declared GLSL type of a uniform or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderPropertyType {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
    Unknown,
}

/// One reflected uniform or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderElement {
    location: i32,
    property_type: ShaderPropertyType,
    size: i32,
}

impl ShaderElement {
    #[must_use]
    pub fn new(location: i32, property_type: ShaderPropertyType, size: i32) -> Self {
        Self {
            location,
            property_type,
            size,
        }
    }

    #[must_use]
    pub fn location(&self) -> i32 {
        self.location
    }

    #[must_use]
    pub fn property_type(&self) -> ShaderPropertyType {
        self.property_type
    }

    /// Number of array elements (1 for non-arrays).
    #[must_use]
    pub fn size(&self) -> i32 {
        self.size
    }
}

/// Strips a trailing array subscript: `uLights[0]` -> `uLights`.
#[must_use]
pub fn normalize_shader_element_name(name: &str) -> &str {
    name.find('[').map_or(name, |i| &name[..i])
}

#[derive(Debug)]
struct ShaderProperty {
    name: String,
    element: ShaderElement,
}

#[derive(Debug)]
struct ShaderInner {
    program: GpuProgram,
    uniforms: Vec<ShaderProperty>,
    uniform_lookup: FxHashMap<String, usize>,
    attributes: FxHashMap<String, ShaderElement>,

    model_mat: Option<ShaderElement>,
    normal_mat: Option<ShaderElement>,
    view_mat: Option<ShaderElement>,
    proj_mat: Option<ShaderElement>,
    view_proj_mat: Option<ShaderElement>,
    instanced_model_mat: Option<ShaderElement>,
    instanced_normal_mat: Option<ShaderElement>,
}

/// A compiled program. Cloning shares the program; equality is identity.
#[derive(Debug, Clone)]
pub struct Shader {
    inner: Rc<ShaderInner>,
}

impl Shader {
    pub fn new(ctx: &GraphicsContext, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        Self::compile(
            ctx.device(),
            &ShaderSources {
                vertex: vertex_src,
                geometry: None,
                fragment: fragment_src,
            },
        )
    }

    pub fn with_geometry(
        ctx: &GraphicsContext,
        vertex_src: &str,
        geometry_src: &str,
        fragment_src: &str,
    ) -> Result<Self> {
        Self::compile(
            ctx.device(),
            &ShaderSources {
                vertex: vertex_src,
                geometry: Some(geometry_src),
                fragment: fragment_src,
            },
        )
    }

    pub(crate) fn compile(device: &Rc<dyn GraphicsDevice>, sources: &ShaderSources<'_>) -> Result<Self> {
        let program = GpuProgram::compile(device, sources)?;

        let mut uniforms = Vec::new();
        let mut uniform_lookup = FxHashMap::default();
        for ActiveElement { name, location, ty, size } in device.active_uniforms(program.id()) {
            let name = normalize_shader_element_name(&name).to_owned();
            uniform_lookup.insert(name.clone(), uniforms.len());
            uniforms.push(ShaderProperty {
                name,
                element: ShaderElement::new(location, ty, size),
            });
        }

        let attributes: FxHashMap<String, ShaderElement> = device
            .active_attributes(program.id())
            .into_iter()
            .map(|a| {
                (
                    normalize_shader_element_name(&a.name).to_owned(),
                    ShaderElement::new(a.location, a.ty, a.size),
                )
            })
            .collect();

        let uniform = |name: &str| uniform_lookup.get(name).map(|&i: &usize| uniforms[i].element);
        let inner = ShaderInner {
            model_mat: uniform("uModelMat"),
            normal_mat: uniform("uNormalMat"),
            view_mat: uniform("uViewMat"),
            proj_mat: uniform("uProjMat"),
            view_proj_mat: uniform("uViewProjMat"),
            instanced_model_mat: attributes.get("aModelMat").copied(),
            instanced_normal_mat: attributes.get("aNormalMat").copied(),
            program,
            uniforms,
            uniform_lookup,
            attributes,
        };

        log::debug!(
            "compiled shader program {:?}: {} uniforms, {} attributes",
            inner.program.id(),
            inner.uniforms.len(),
            inner.attributes.len()
        );

        Ok(Self { inner: Rc::new(inner) })
    }

    #[must_use]
    pub fn property_count(&self) -> usize {
        self.inner.uniforms.len()
    }

    #[must_use]
    pub fn find_property_index(&self, name: &str) -> Option<usize> {
        self.inner.uniform_lookup.get(name).copied()
    }

    /// Panics if `index >= property_count()`.
    #[must_use]
    pub fn property_name(&self, index: usize) -> &str {
        &self.inner.uniforms[index].name
    }

    /// Panics if `index >= property_count()`.
    #[must_use]
    pub fn property_type(&self, index: usize) -> ShaderPropertyType {
        self.inner.uniforms[index].element.property_type
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<ShaderElement> {
        self.find_property_index(name).map(|i| self.inner.uniforms[i].element)
    }

    /// Uniforms in reflection order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, ShaderElement)> + '_ {
        self.inner.uniforms.iter().map(|p| (p.name.as_str(), p.element))
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<ShaderElement> {
        self.inner.attributes.get(name).copied()
    }

    pub(crate) fn program_id(&self) -> ProgramId {
        self.inner.program.id()
    }

    // --- well-known slots ---

    pub(crate) fn model_mat(&self) -> Option<ShaderElement> {
        self.inner.model_mat
    }

    pub(crate) fn normal_mat(&self) -> Option<ShaderElement> {
        self.inner.normal_mat
    }

    pub(crate) fn view_mat(&self) -> Option<ShaderElement> {
        self.inner.view_mat
    }

    pub(crate) fn proj_mat(&self) -> Option<ShaderElement> {
        self.inner.proj_mat
    }

    pub(crate) fn view_proj_mat(&self) -> Option<ShaderElement> {
        self.inner.view_proj_mat
    }

    pub(crate) fn instanced_model_mat(&self) -> Option<ShaderElement> {
        self.inner.instanced_model_mat
    }

    pub(crate) fn instanced_normal_mat(&self) -> Option<ShaderElement> {
        self.inner.instanced_normal_mat
    }
}

impl PartialEq for Shader {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
