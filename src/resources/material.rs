//! Materials and per-draw property blocks
//!
//! Both store named, type-tagged [`MaterialValue`]s with copy-on-write
//! semantics. Lookups are queries: a missing name or a different stored type
//! yields `None`.

use std::rc::Rc;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::renderer::device::RasterState;
use crate::resources::color::Color;
use crate::resources::cubemap::Cubemap;
use crate::resources::render_texture::RenderTexture;
use crate::resources::shader::Shader;
use crate::resources::texture::Texture2D;

// ============================================================================
// Render State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFunction {
    #[default]
    Less,
    LessOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    Off,
    Back,
    Front,
}

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialValue {
    Color(Color),
    ColorArray(Vec<Color>),
    Float(f32),
    FloatArray(Vec<f32>),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec3Array(Vec<Vec3>),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    Mat4Array(Vec<Mat4>),
    Int(i32),
    Bool(bool),
    Texture2D(Texture2D),
    RenderTexture(RenderTexture),
    Cubemap(Cubemap),
}

impl MaterialValue {
    /// Name of the stored tag, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            MaterialValue::Color(_) => "Color",
            MaterialValue::ColorArray(_) => "Color[]",
            MaterialValue::Float(_) => "float",
            MaterialValue::FloatArray(_) => "float[]",
            MaterialValue::Vec2(_) => "Vec2",
            MaterialValue::Vec3(_) => "Vec3",
            MaterialValue::Vec3Array(_) => "Vec3[]",
            MaterialValue::Vec4(_) => "Vec4",
            MaterialValue::Mat3(_) => "Mat3",
            MaterialValue::Mat4(_) => "Mat4",
            MaterialValue::Mat4Array(_) => "Mat4[]",
            MaterialValue::Int(_) => "int",
            MaterialValue::Bool(_) => "bool",
            MaterialValue::Texture2D(_) => "Texture2D",
            MaterialValue::RenderTexture(_) => "RenderTexture",
            MaterialValue::Cubemap(_) => "Cubemap",
        }
    }
}

/// A Rust type that maps onto exactly one [`MaterialValue`] tag.
pub trait MaterialValueType: Sized {
    fn from_value(value: &MaterialValue) -> Option<Self>;
    fn into_value(self) -> MaterialValue;
}

macro_rules! impl_material_value_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl MaterialValueType for $ty {
                fn from_value(value: &MaterialValue) -> Option<Self> {
                    match value {
                        MaterialValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }

                fn into_value(self) -> MaterialValue {
                    MaterialValue::$variant(self)
                }
            }
        )*
    };
}

impl_material_value_type!(
    Color => Color,
    Vec<Color> => ColorArray,
    f32 => Float,
    Vec<f32> => FloatArray,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec<Vec3> => Vec3Array,
    Vec4 => Vec4,
    Mat3 => Mat3,
    Mat4 => Mat4,
    Vec<Mat4> => Mat4Array,
    i32 => Int,
    bool => Bool,
    Texture2D => Texture2D,
    RenderTexture => RenderTexture,
    Cubemap => Cubemap,
);

type ValueMap = FxHashMap<String, MaterialValue>;

/// Typed setter/getter pairs over `set`/`get`.
macro_rules! typed_accessors {
    (
        scalars: [$(($setter:ident, $getter:ident, $ty:ty)),* $(,)?],
        arrays: [$(($array_setter:ident, $array_getter:ident, $elem:ty)),* $(,)?]
    ) => {
        $(
            pub fn $setter(&mut self, name: &str, value: $ty) {
                self.set(name, value);
            }

            #[must_use]
            pub fn $getter(&self, name: &str) -> Option<$ty> {
                self.get(name)
            }
        )*
        $(
            pub fn $array_setter(&mut self, name: &str, values: &[$elem]) {
                self.set(name, values.to_vec());
            }

            #[must_use]
            pub fn $array_getter(&self, name: &str) -> Option<Vec<$elem>> {
                self.get(name)
            }
        )*
    };
}

macro_rules! value_accessors {
    () => {
        #[must_use]
        pub fn get<T: MaterialValueType>(&self, name: &str) -> Option<T> {
            self.values().get(name).and_then(T::from_value)
        }

        pub fn set<T: MaterialValueType>(&mut self, name: &str, value: T) {
            self.values_mut().insert(name.to_owned(), value.into_value());
        }

        /// The raw tagged value, regardless of type.
        #[must_use]
        pub fn value(&self, name: &str) -> Option<&MaterialValue> {
            self.values().get(name)
        }

        /// Removes a value; returns whether one was present.
        pub fn unset(&mut self, name: &str) -> bool {
            // checked first so an absent name never detaches a shared copy
            self.values().contains_key(name) && self.values_mut().remove(name).is_some()
        }

        typed_accessors!(
            scalars: [
                (set_color, get_color, Color),
                (set_float, get_float, f32),
                (set_vec2, get_vec2, Vec2),
                (set_vec3, get_vec3, Vec3),
                (set_vec4, get_vec4, Vec4),
                (set_mat3, get_mat3, Mat3),
                (set_mat4, get_mat4, Mat4),
                (set_int, get_int, i32),
                (set_bool, get_bool, bool),
                (set_texture, get_texture, Texture2D),
                (set_render_texture, get_render_texture, RenderTexture),
                (set_cubemap, get_cubemap, Cubemap),
            ],
            arrays: [
                (set_color_array, get_color_array, Color),
                (set_float_array, get_float_array, f32),
                (set_vec3_array, get_vec3_array, Vec3),
                (set_mat4_array, get_mat4_array, Mat4),
            ]
        );
    };
}

// ============================================================================
// MaterialPropertyBlock
// ============================================================================

/// Per-draw overrides applied on top of a material's values.
#[derive(Debug, Clone, Default)]
pub struct MaterialPropertyBlock {
    values: Rc<ValueMap>,
}

impl MaterialPropertyBlock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> &ValueMap {
        &self.values
    }

    fn values_mut(&mut self) -> &mut ValueMap {
        Rc::make_mut(&mut self.values)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.is_empty() {
            self.values_mut().clear();
        }
    }

    value_accessors!();
}

impl PartialEq for MaterialPropertyBlock {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.values, &other.values) || self.values == other.values
    }
}

// ============================================================================
// Material
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct MaterialInner {
    shader: Shader,
    values: ValueMap,
    transparent: bool,
    depth_tested: bool,
    depth_function: DepthFunction,
    cull_mode: CullMode,
    wireframe: bool,
}

/// A shader plus the values bound to its uniforms and its render state.
#[derive(Debug, Clone)]
pub struct Material {
    inner: Rc<MaterialInner>,
}

impl Material {
    #[must_use]
    pub fn new(shader: Shader) -> Self {
        Self {
            inner: Rc::new(MaterialInner {
                shader,
                values: ValueMap::default(),
                transparent: false,
                depth_tested: true,
                depth_function: DepthFunction::default(),
                cull_mode: CullMode::default(),
                wireframe: false,
            }),
        }
    }

    fn upd(&mut self) -> &mut MaterialInner {
        Rc::make_mut(&mut self.inner)
    }

    fn values(&self) -> &ValueMap {
        &self.inner.values
    }

    fn values_mut(&mut self) -> &mut ValueMap {
        &mut self.upd().values
    }

    #[must_use]
    pub fn shader(&self) -> &Shader {
        &self.inner.shader
    }

    /// Transparent materials are blended and drawn back-to-front.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.inner.transparent
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.upd().transparent = transparent;
    }

    #[must_use]
    pub fn is_depth_tested(&self) -> bool {
        self.inner.depth_tested
    }

    pub fn set_depth_tested(&mut self, depth_tested: bool) {
        self.upd().depth_tested = depth_tested;
    }

    #[must_use]
    pub fn depth_function(&self) -> DepthFunction {
        self.inner.depth_function
    }

    pub fn set_depth_function(&mut self, depth_function: DepthFunction) {
        self.upd().depth_function = depth_function;
    }

    #[must_use]
    pub fn cull_mode(&self) -> CullMode {
        self.inner.cull_mode
    }

    pub fn set_cull_mode(&mut self, cull_mode: CullMode) {
        self.upd().cull_mode = cull_mode;
    }

    #[must_use]
    pub fn is_wireframe(&self) -> bool {
        self.inner.wireframe
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.upd().wireframe = wireframe;
    }

    pub(crate) fn raster_state(&self) -> RasterState {
        RasterState {
            depth_function: self.inner.depth_function,
            cull_mode: self.inner.cull_mode,
            wireframe: self.inner.wireframe,
        }
    }

    value_accessors!();
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}
