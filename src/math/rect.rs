use glam::Vec2;

use crate::renderer::device::PixelRegion;

/// A screen-space rectangle in pixels, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub p1: Vec2,
    pub p2: Vec2,
}

impl Rect {
    #[must_use]
    pub const fn new(p1: Vec2, p2: Vec2) -> Self {
        Self { p1, p2 }
    }

    #[must_use]
    pub fn from_origin_and_dimensions(origin: Vec2, dimensions: Vec2) -> Self {
        Self::new(origin, origin + dimensions)
    }

    #[must_use]
    pub fn min(&self) -> Vec2 {
        self.p1.min(self.p2)
    }

    #[must_use]
    pub fn dimensions(&self) -> Vec2 {
        (self.p2 - self.p1).abs()
    }

    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        let d = self.dimensions();
        d.x / d.y
    }

    pub(crate) fn to_pixel_region(self) -> PixelRegion {
        let min = self.min();
        let dims = self.dimensions();
        PixelRegion::new(min.x as i32, min.y as i32, dims.x as i32, dims.y as i32)
    }
}
