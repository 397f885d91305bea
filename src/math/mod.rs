//! Geometry helpers used by meshes, cameras and the backend.

pub mod aabb;
pub mod bvh;
pub mod line;
pub mod rect;
pub mod transform;

pub use aabb::Aabb;
pub use bvh::{Bvh, BvhCollision, BvhNode, BvhPrim};
pub use line::{Line, RayCollision, ray_aabb_collision, ray_triangle_collision};
pub use rect::Rect;
pub use transform::{Transform, normal_matrix, normal_matrix_4x4};
