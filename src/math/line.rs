use glam::Vec3;

use super::aabb::Aabb;

/// A ray: an origin and a (normalized) direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Line {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Line {
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    #[must_use]
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + distance * self.direction
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCollision {
    /// Distance along the ray
    pub distance: f32,
    pub position: Vec3,
}

/// Slab test. The reported distance is where the ray enters the box, which is
/// negative when the origin is inside it.
#[must_use]
pub fn ray_aabb_collision(ray: &Line, aabb: &Aabb) -> Option<RayCollision> {
    let mut t0 = f32::MIN;
    let mut t1 = f32::MAX;

    for i in 0..3 {
        let inv_dir = 1.0 / ray.direction[i];
        let mut t_near = (aabb.min[i] - ray.origin[i]) * inv_dir;
        let mut t_far = (aabb.max[i] - ray.origin[i]) * inv_dir;
        if t_near > t_far {
            std::mem::swap(&mut t_near, &mut t_far);
        }
        t0 = t0.max(t_near);
        t1 = t1.min(t_far);
        if t0 > t1 {
            return None;
        }
    }

    Some(RayCollision {
        distance: t0,
        position: ray.point_at(t0),
    })
}

/// Plane hit followed by an inside-outside test against each edge.
/// Counter-clockwise winding faces the ray's hit side.
#[must_use]
pub fn ray_triangle_collision(ray: &Line, triangle: &[Vec3; 3]) -> Option<RayCollision> {
    let normal = (triangle[1] - triangle[0]).cross(triangle[2] - triangle[0]).normalize();
    let n_dot_dir = normal.dot(ray.direction);
    if n_dot_dir.abs() < f32::EPSILON {
        return None;
    }

    let plane_distance = normal.dot(triangle[0]);
    let t = -(normal.dot(ray.origin) - plane_distance) / n_dot_dir;
    if t < 0.0 {
        return None;
    }

    let p = ray.point_at(t);
    for i in 0..3 {
        let start = triangle[i];
        let end = triangle[(i + 1) % 3];
        if (end - start).cross(p - start).dot(normal) < 0.0 {
            return None;
        }
    }

    Some(RayCollision { distance: t, position: p })
}
