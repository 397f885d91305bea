//! Meshes
//!
//! CPU-side vertex attributes and indices with copy-on-write semantics, plus
//! a lazily uploaded interleaved vertex buffer.
//!
//! # Vertex layout
//!
//! Present attributes are packed in this order, each at a fixed location:
//!
//! | attribute  | location | type   |
//! |------------|----------|--------|
//! | position   | 0        | `vec3` |
//! | normal     | 2        | `vec3` |
//! | tex coord  | 1        | `vec2` |
//! | color      | 3        | `vec4` |
//! | tangent    | 4        | `vec4` |
//!
//! Bounds are recomputed on every geometry change: `Triangles` meshes get a
//! BVH over the indexed triangles and take their AABB from its root; other
//! topologies take the AABB of the indexed vertices.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::errors::Result;
use crate::math::{Aabb, Bvh, Line, RayCollision, Transform};
use crate::renderer::device::{
    AttributeType, BufferTarget, BufferUsage, GraphicsDevice, IndexType, VertexArrayId, VertexAttribute,
};
use crate::renderer::gpu::{GpuBuffer, GpuVertexArray};
use crate::resources::color::Color;
use crate::resources::version_tracker::VersionToken;

pub const POSITION_LOCATION: u32 = 0;
pub const TEX_COORD_LOCATION: u32 = 1;
pub const NORMAL_LOCATION: u32 = 2;
pub const COLOR_LOCATION: u32 = 3;
pub const TANGENT_LOCATION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeshTopology {
    #[default]
    Triangles,
    Lines,
}

/// Index storage. 32-bit only when some index does not fit in 16 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshIndices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Default for MeshIndices {
    fn default() -> Self {
        MeshIndices::U16(Vec::new())
    }
}

impl MeshIndices {
    #[must_use]
    pub fn from_u32(indices: &[u32]) -> Self {
        if indices.iter().any(|&i| i > u32::from(u16::MAX)) {
            MeshIndices::U32(indices.to_vec())
        } else {
            MeshIndices::U16(indices.iter().map(|&i| i as u16).collect())
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            MeshIndices::U16(v) => v.len(),
            MeshIndices::U32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn index_type(&self) -> IndexType {
        match self {
            MeshIndices::U16(_) => IndexType::U16,
            MeshIndices::U32(_) => IndexType::U32,
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            MeshIndices::U16(v) => Box::new(v.iter().map(|&i| u32::from(i))),
            MeshIndices::U32(v) => Box::new(v.iter().copied()),
        }
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            MeshIndices::U16(v) => bytemuck::cast_slice(v),
            MeshIndices::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// What the backend needs to issue a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MeshDrawInfo {
    pub vertex_array: VertexArrayId,
    pub topology: MeshTopology,
    pub index_count: u32,
    pub index_type: IndexType,
}

#[derive(Debug)]
struct MeshGpu {
    vertex_array: GpuVertexArray,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    token: VersionToken,
}

#[derive(Debug)]
struct MeshInner {
    topology: MeshTopology,
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    colors: Vec<Color>,
    tangents: Vec<Vec4>,
    indices: MeshIndices,

    aabb: Aabb,
    bvh: Bvh,

    token: VersionToken,
    gpu: RefCell<Option<MeshGpu>>,
}

impl Clone for MeshInner {
    fn clone(&self) -> Self {
        Self {
            topology: self.topology,
            vertices: self.vertices.clone(),
            normals: self.normals.clone(),
            tex_coords: self.tex_coords.clone(),
            colors: self.colors.clone(),
            tangents: self.tangents.clone(),
            indices: self.indices.clone(),
            aabb: self.aabb,
            bvh: self.bvh.clone(),
            token: self.token,
            gpu: RefCell::new(None),
        }
    }
}

impl Default for MeshInner {
    fn default() -> Self {
        Self {
            topology: MeshTopology::default(),
            vertices: Vec::new(),
            normals: Vec::new(),
            tex_coords: Vec::new(),
            colors: Vec::new(),
            tangents: Vec::new(),
            indices: MeshIndices::default(),
            aabb: Aabb::default(),
            bvh: Bvh::default(),
            token: VersionToken::new(),
            gpu: RefCell::new(None),
        }
    }
}

impl MeshInner {
    fn recalculate_bounds(&mut self) {
        self.bvh.clear();

        let n = self.vertices.len();
        if self.indices.iter().any(|i| i as usize >= n) {
            // indices set before the vertices they refer to
            self.aabb = Aabb::default();
            return;
        }

        if self.topology == MeshTopology::Triangles {
            match &self.indices {
                MeshIndices::U16(v) => self.bvh.build_from_indexed_triangles(&self.vertices, &v[..v.len() - v.len() % 3]),
                MeshIndices::U32(v) => self.bvh.build_from_indexed_triangles(&self.vertices, &v[..v.len() - v.len() % 3]),
            }
            self.aabb = self.bvh.root_aabb().unwrap_or_default();
        } else {
            self.aabb = Aabb::from_points(self.indices.iter().map(|i| self.vertices[i as usize]));
        }
    }

    fn changed(&mut self) {
        self.recalculate_bounds();
        self.token.renew();
    }
}

/// Vertex and index data with cached bounds and a lazily created GPU mirror.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    inner: Rc<MeshInner>,
}

impl Mesh {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn upd(&mut self) -> &mut MeshInner {
        Rc::make_mut(&mut self.inner)
    }

    #[must_use]
    pub fn topology(&self) -> MeshTopology {
        self.inner.topology
    }

    pub fn set_topology(&mut self, topology: MeshTopology) {
        let inner = self.upd();
        inner.topology = topology;
        inner.changed();
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vec3] {
        &self.inner.vertices
    }

    pub fn set_vertices(&mut self, vertices: &[Vec3]) {
        let inner = self.upd();
        inner.vertices = vertices.to_vec();
        inner.changed();
    }

    /// Applies `f` to every vertex in place.
    pub fn transform_vertices(&mut self, mut f: impl FnMut(Vec3) -> Vec3) {
        let inner = self.upd();
        for v in &mut inner.vertices {
            *v = f(*v);
        }
        inner.changed();
    }

    pub fn transform_vertices_with(&mut self, transform: &Transform) {
        self.transform_vertices(|v| transform.transform_point(v));
    }

    pub fn transform_vertices_with_matrix(&mut self, matrix: &Mat4) {
        self.transform_vertices(|v| matrix.transform_point3(v));
    }

    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.inner.normals
    }

    pub fn set_normals(&mut self, normals: &[Vec3]) {
        let inner = self.upd();
        inner.normals = normals.to_vec();
        inner.token.renew();
    }

    #[must_use]
    pub fn tex_coords(&self) -> &[Vec2] {
        &self.inner.tex_coords
    }

    pub fn set_tex_coords(&mut self, tex_coords: &[Vec2]) {
        let inner = self.upd();
        inner.tex_coords = tex_coords.to_vec();
        inner.token.renew();
    }

    #[must_use]
    pub fn colors(&self) -> &[Color] {
        &self.inner.colors
    }

    pub fn set_colors(&mut self, colors: &[Color]) {
        let inner = self.upd();
        inner.colors = colors.to_vec();
        inner.token.renew();
    }

    #[must_use]
    pub fn tangents(&self) -> &[Vec4] {
        &self.inner.tangents
    }

    pub fn set_tangents(&mut self, tangents: &[Vec4]) {
        let inner = self.upd();
        inner.tangents = tangents.to_vec();
        inner.token.renew();
    }

    #[must_use]
    pub fn num_indices(&self) -> usize {
        self.inner.indices.len()
    }

    /// Logical index values, whatever the storage width.
    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        self.inner.indices.to_vec()
    }

    #[must_use]
    pub fn index_storage(&self) -> &MeshIndices {
        &self.inner.indices
    }

    pub fn set_indices(&mut self, indices: &[u32]) {
        let inner = self.upd();
        inner.indices = MeshIndices::from_u32(indices);
        inner.changed();
    }

    pub fn set_indices_u16(&mut self, indices: &[u16]) {
        let inner = self.upd();
        inner.indices = MeshIndices::U16(indices.to_vec());
        inner.changed();
    }

    /// Drops all vertex data and indices. Topology is kept.
    pub fn clear(&mut self) {
        let inner = self.upd();
        inner.vertices.clear();
        inner.normals.clear();
        inner.tex_coords.clear();
        inner.colors.clear();
        inner.tangents.clear();
        inner.indices = MeshIndices::default();
        inner.changed();
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.inner.aabb
    }

    #[must_use]
    pub fn midpoint(&self) -> Vec3 {
        self.inner.aabb.midpoint()
    }

    #[must_use]
    pub fn bvh(&self) -> &Bvh {
        &self.inner.bvh
    }

    /// Nearest triangle the ray hits, in mesh space.
    #[must_use]
    pub fn closest_ray_collision(&self, ray: &Line) -> Option<RayCollision> {
        let inner = &*self.inner;
        let hit = match &inner.indices {
            MeshIndices::U16(v) => inner.bvh.closest_ray_indexed_triangle_collision(&inner.vertices, v, ray),
            MeshIndices::U32(v) => inner.bvh.closest_ray_indexed_triangle_collision(&inner.vertices, v, ray),
        }?;
        Some(RayCollision {
            distance: hit.distance,
            position: ray.point_at(hit.distance),
        })
    }

    #[must_use]
    pub fn version(&self) -> VersionToken {
        self.inner.token
    }

    // ------------------------------------------------------------------------
    // GPU mirror
    // ------------------------------------------------------------------------

    pub(crate) fn ensure_gpu(&self, device: &Rc<dyn GraphicsDevice>) -> Result<MeshDrawInfo> {
        let inner = &*self.inner;
        let mut slot = inner.gpu.borrow_mut();

        let gpu = match slot.take() {
            Some(gpu) if gpu.token == inner.token => gpu,
            _ => {
                let gpu = MeshGpu {
                    vertex_array: GpuVertexArray::new(device)?,
                    vertex_buffer: GpuBuffer::new(device)?,
                    index_buffer: GpuBuffer::new(device)?,
                    token: inner.token,
                };
                inner.upload(device, &gpu);
                gpu
            }
        };

        let info = MeshDrawInfo {
            vertex_array: gpu.vertex_array.id(),
            topology: inner.topology,
            index_count: inner.indices.len() as u32,
            index_type: inner.indices.index_type(),
        };
        *slot = Some(gpu);
        Ok(info)
    }
}

impl MeshInner {
    fn upload(&self, device: &Rc<dyn GraphicsDevice>, gpu: &MeshGpu) {
        let n = self.vertices.len();
        let check = |len: usize, what: &str| {
            assert!(
                len == 0 || len == n,
                "number of {what} ({len}) does not match the number of vertices ({n})"
            );
            len == n && n > 0
        };
        let has_normals = check(self.normals.len(), "normals");
        let has_tex_coords = check(self.tex_coords.len(), "texture coordinates");
        let has_colors = check(self.colors.len(), "colors");
        let has_tangents = check(self.tangents.len(), "tangents");
        assert!(
            self.indices.iter().all(|i| (i as usize) < n),
            "a mesh index is out of range of its vertices"
        );

        // (location, components, byte offset)
        let mut layout: Vec<(u32, i32, i32)> = Vec::with_capacity(5);
        let mut stride = 0;
        for (present, location, components) in [
            (n > 0, POSITION_LOCATION, 3),
            (has_normals, NORMAL_LOCATION, 3),
            (has_tex_coords, TEX_COORD_LOCATION, 2),
            (has_colors, COLOR_LOCATION, 4),
            (has_tangents, TANGENT_LOCATION, 4),
        ] {
            if present {
                layout.push((location, components, stride));
                stride += components * 4;
            }
        }

        let mut data: Vec<f32> = Vec::with_capacity(n * stride as usize / 4);
        for i in 0..n {
            data.extend_from_slice(&self.vertices[i].to_array());
            if has_normals {
                data.extend_from_slice(&self.normals[i].to_array());
            }
            if has_tex_coords {
                data.extend_from_slice(&self.tex_coords[i].to_array());
            }
            if has_colors {
                data.extend_from_slice(&self.colors[i].to_array());
            }
            if has_tangents {
                data.extend_from_slice(&self.tangents[i].to_array());
            }
        }

        log::debug!(
            "uploading mesh: {n} vertices, {} indices, stride {stride}",
            self.indices.len()
        );

        device.bind_vertex_array(Some(gpu.vertex_array.id()));
        device.bind_buffer(BufferTarget::Array, Some(gpu.vertex_buffer.id()));
        device.upload_buffer(
            gpu.vertex_buffer.id(),
            BufferTarget::Array,
            bytemuck::cast_slice(&data),
            BufferUsage::StaticDraw,
        );
        for (location, components, offset) in layout {
            device.enable_vertex_attribute(&VertexAttribute {
                location,
                components,
                ty: AttributeType::Float,
                normalized: false,
                stride,
                offset,
                divisor: 0,
            });
        }
        device.bind_buffer(BufferTarget::ElementArray, Some(gpu.index_buffer.id()));
        device.upload_buffer(
            gpu.index_buffer.id(),
            BufferTarget::ElementArray,
            self.indices.as_bytes(),
            BufferUsage::StaticDraw,
        );
        device.bind_vertex_array(None);
    }
}

impl PartialEq for Mesh {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
