use glam::{Mat4, Vec3};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The tightest box around `points`; a zero-sized box at the origin if empty.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };
        points.fold(Self::new(first, first), |acc, p| Self::new(acc.min.min(p), acc.max.max(p)))
    }

    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    #[must_use]
    pub fn midpoint(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    #[must_use]
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index of the longest axis; ties resolve toward Z.
    #[must_use]
    pub fn longest_dimension_index(&self) -> usize {
        let d = self.dimensions();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    #[must_use]
    pub fn longest_dimension(&self) -> f32 {
        self.dimensions()[self.longest_dimension_index()]
    }

    /// True if any axis has zero extent.
    #[must_use]
    pub fn is_effectively_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] == self.max[i])
    }

    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// The box around this box's transformed corners.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Aabb {
        Aabb::from_points(self.corners().map(|c| matrix.transform_point3(c)))
    }
}
