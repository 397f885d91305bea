//! Bounding volume hierarchy over triangles (or arbitrary boxes).
//!
//! Nodes are stored depth-first: an internal node is immediately followed by
//! its left subtree, and its right child sits `nlhs + 1` slots after it.

use glam::Vec3;

use super::aabb::Aabb;
use super::line::{Line, ray_aabb_collision, ray_triangle_collision};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNode {
    pub bounds: Aabb,
    /// Number of nodes in the left subtree; `-1` marks a leaf
    pub nlhs: i32,
    /// First primitive (leaves only)
    pub first_prim_offset: usize,
    /// Primitive count (leaves only)
    pub num_prims: usize,
}

impl BvhNode {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.nlhs == -1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhPrim {
    pub bounds: Aabb,
    /// Triangles: offset of the first index. Boxes: input position.
    pub id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhCollision {
    pub id: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    prims: Vec<BvhPrim>,
}

impl Bvh {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.prims.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    #[must_use]
    pub fn prims(&self) -> &[BvhPrim] {
        &self.prims
    }

    /// Bounds of the whole hierarchy.
    #[must_use]
    pub fn root_aabb(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| n.bounds)
    }

    /// Builds over `indices` taken three at a time.
    pub fn build_from_indexed_triangles<I>(&mut self, vertices: &[Vec3], indices: &[I])
    where
        I: Copy + Into<u32>,
    {
        self.clear();
        assert!(indices.len() % 3 == 0, "triangle index count must be a multiple of 3");

        for (tri, chunk) in indices.chunks_exact(3).enumerate() {
            let bounds = Aabb::from_points(chunk.iter().map(|&i| vertices[i.into() as usize]));
            self.prims.push(BvhPrim { bounds, id: tri * 3 });
        }

        let n = self.prims.len();
        self.build_recursive(0, n);
    }

    pub fn build_from_aabbs(&mut self, aabbs: &[Aabb]) {
        self.clear();
        self.prims
            .extend(aabbs.iter().enumerate().map(|(id, &bounds)| BvhPrim { bounds, id }));
        let n = self.prims.len();
        self.build_recursive(0, n);
    }

    fn push_leaf(&mut self, bounds: Aabb, begin: usize, n: usize) {
        self.nodes.push(BvhNode {
            bounds,
            nlhs: -1,
            first_prim_offset: begin,
            num_prims: n,
        });
    }

    fn build_recursive(&mut self, begin: usize, n: usize) {
        if n == 0 {
            return;
        }
        let end = begin + n;

        if n == 1 {
            self.push_leaf(self.prims[begin].bounds, begin, 1);
            return;
        }

        let aabb = self.prims[begin + 1..end]
            .iter()
            .fold(self.prims[begin].bounds, |acc, p| acc.union(&p.bounds));

        if aabb.is_effectively_empty() {
            self.push_leaf(aabb, begin, n);
            return;
        }

        // split at the midpoint of the longest axis (compared doubled, to skip a divide)
        let dim = aabb.longest_dimension_index();
        let midpoint_x2 = aabb.min[dim] + aabb.max[dim];
        let mut mid = begin + partition(&mut self.prims[begin..end], |p| {
            p.bounds.min[dim] + p.bounds.max[dim] <= midpoint_x2
        });

        if !(begin < mid && mid < end) {
            mid = begin + n / 2;
        }

        let internal = self.nodes.len();
        self.nodes.push(BvhNode {
            bounds: Aabb::default(),
            nlhs: 0,
            first_prim_offset: 0,
            num_prims: 0,
        });

        self.build_recursive(begin, mid - begin);
        let nlhs = self.nodes.len() - 1 - internal;
        self.nodes[internal].nlhs = nlhs as i32;

        self.build_recursive(mid, end - mid);

        let lhs = self.nodes[internal + 1].bounds;
        let rhs = self.nodes[internal + 1 + nlhs].bounds;
        self.nodes[internal].bounds = lhs.union(&rhs);
    }

    /// Every leaf box the ray passes through, depth-first.
    #[must_use]
    pub fn ray_aabb_collisions(&self, ray: &Line) -> Vec<BvhCollision> {
        let mut out = Vec::new();
        if !self.nodes.is_empty() && !self.prims.is_empty() {
            self.ray_aabb_recursive(ray, 0, &mut out);
        }
        out
    }

    fn ray_aabb_recursive(&self, ray: &Line, node_index: usize, out: &mut Vec<BvhCollision>) -> bool {
        let node = &self.nodes[node_index];
        let Some(hit) = ray_aabb_collision(ray, &node.bounds) else {
            return false;
        };

        if node.is_leaf() {
            out.push(BvhCollision {
                id: self.prims[node.first_prim_offset].id,
                distance: hit.distance,
            });
            return true;
        }

        let lhs = self.ray_aabb_recursive(ray, node_index + 1, out);
        let rhs = self.ray_aabb_recursive(ray, node_index + node.nlhs as usize + 1, out);
        lhs || rhs
    }

    /// The nearest triangle hit. `id` is the offset of its first index.
    #[must_use]
    pub fn closest_ray_indexed_triangle_collision<I>(
        &self,
        vertices: &[Vec3],
        indices: &[I],
        ray: &Line,
    ) -> Option<BvhCollision>
    where
        I: Copy + Into<u32>,
    {
        if self.nodes.is_empty() || self.prims.is_empty() || indices.is_empty() {
            return None;
        }
        assert_eq!(
            indices.len() / 3,
            self.prims.len(),
            "this hierarchy was not built from the supplied indices"
        );

        let mut closest = f32::MAX;
        let mut best = None;
        self.closest_triangle_recursive(vertices, indices, ray, 0, &mut closest, &mut best);
        best
    }

    fn closest_triangle_recursive<I>(
        &self,
        vertices: &[Vec3],
        indices: &[I],
        ray: &Line,
        node_index: usize,
        closest: &mut f32,
        best: &mut Option<BvhCollision>,
    ) where
        I: Copy + Into<u32>,
    {
        let node = &self.nodes[node_index];
        match ray_aabb_collision(ray, &node.bounds) {
            Some(hit) if hit.distance <= *closest => {}
            _ => return,
        }

        if node.is_leaf() {
            for prim in &self.prims[node.first_prim_offset..node.first_prim_offset + node.num_prims] {
                let triangle = [0, 1, 2].map(|k| vertices[indices[prim.id + k].into() as usize]);
                if let Some(hit) = ray_triangle_collision(ray, &triangle)
                    && hit.distance < *closest
                {
                    *closest = hit.distance;
                    *best = Some(BvhCollision {
                        id: prim.id,
                        distance: hit.distance,
                    });
                }
            }
            return;
        }

        self.closest_triangle_recursive(vertices, indices, ray, node_index + 1, closest, best);
        self.closest_triangle_recursive(vertices, indices, ray, node_index + node.nlhs as usize + 1, closest, best);
    }
}

/// Unstable in-place partition; returns the number of elements satisfying `pred`.
fn partition<T>(items: &mut [T], mut pred: impl FnMut(&T) -> bool) -> usize {
    let mut first = 0;
    for i in 0..items.len() {
        if pred(&items[i]) {
            items.swap(first, i);
            first += 1;
        }
    }
    first
}
